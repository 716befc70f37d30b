// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
use super::{BlockId, Operand, RoutineId, ValueId};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum CmpPredicate {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
    PtrToInt,
    IntToPtr,
    BitCast,
}

/// The closed set of instruction kinds.
///
/// The result type of an instruction is the type declared for its result value, so casts and
/// loads do not carry a target type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstKind {
    Binary { op: BinOp, lhs: Operand, rhs: Operand },
    Compare { pred: CmpPredicate, lhs: Operand, rhs: Operand },
    Cast { op: CastOp, value: Operand },
    Select { cond: Operand, if_true: Operand, if_false: Operand },
    /// Reserve `size` bytes of stack memory and produce a pointer to it.
    Alloca { size: u64 },
    Load { ptr: Operand },
    Store { ptr: Operand, value: Operand },
    /// Pointer arithmetic: `base + offset` bytes.
    PtrOffset { base: Operand, offset: Operand },
    Call { callee: RoutineId, args: Vec<Operand> },
    /// Control-flow join. One entry per incoming edge.
    Phi { incoming: Vec<(BlockId, Operand)> },
    /// An operation the IR carries without modeling its semantics (inline assembly, vector
    /// shuffles, target intrinsics, ...).
    Opaque { mnemonic: String, operands: Vec<Operand> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub result: Option<ValueId>,
    pub kind: InstKind,
}

impl Instruction {
    pub fn new(result: Option<ValueId>, kind: InstKind) -> Self {
        Instruction { result, kind }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.kind, InstKind::Phi { .. })
    }

    /// All operands read by this instruction, in order.
    pub fn operands(&self) -> Vec<&Operand> {
        match &self.kind {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Compare { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Select { cond, if_true, if_false } => vec![cond, if_true, if_false],
            InstKind::Alloca { .. } => vec![],
            InstKind::Load { ptr } => vec![ptr],
            InstKind::Store { ptr, value } => vec![ptr, value],
            InstKind::PtrOffset { base, offset } => vec![base, offset],
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Phi { incoming } => incoming.iter().map(|(_, op)| op).collect(),
            InstKind::Opaque { operands, .. } => operands.iter().collect(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match &mut self.kind {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Compare { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Select { cond, if_true, if_false } => vec![cond, if_true, if_false],
            InstKind::Alloca { .. } => vec![],
            InstKind::Load { ptr } => vec![ptr],
            InstKind::Store { ptr, value } => vec![ptr, value],
            InstKind::PtrOffset { base, offset } => vec![base, offset],
            InstKind::Call { args, .. } => args.iter_mut().collect(),
            InstKind::Phi { incoming } => incoming.iter_mut().map(|(_, op)| op).collect(),
            InstKind::Opaque { operands, .. } => operands.iter_mut().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Goto { target: BlockId },
    Branch { cond: Operand, then_bb: BlockId, else_bb: BlockId },
    Return { value: Option<Operand> },
    Unreachable,
}

impl Terminator {
    /// Successor blocks in edge order. A branch with identical targets yields two edges.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto { target } => vec![*target],
            Terminator::Branch { then_bb, else_bb, .. } => vec![*then_bb, *else_bb],
            Terminator::Return { .. } | Terminator::Unreachable => vec![],
        }
    }

    pub fn successors_mut(&mut self) -> Vec<&mut BlockId> {
        match self {
            Terminator::Goto { target } => vec![target],
            Terminator::Branch { then_bb, else_bb, .. } => vec![then_bb, else_bb],
            Terminator::Return { .. } | Terminator::Unreachable => vec![],
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Terminator::Branch { cond, .. } => vec![cond],
            Terminator::Return { value: Some(value) } => vec![value],
            Terminator::Goto { .. } | Terminator::Return { value: None } | Terminator::Unreachable => {
                vec![]
            }
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Terminator::Branch { cond, .. } => vec![cond],
            Terminator::Return { value: Some(value) } => vec![value],
            Terminator::Goto { .. } | Terminator::Return { value: None } | Terminator::Unreachable => {
                vec![]
            }
        }
    }
}
