// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
use super::Type;
use serde::{Deserialize, Serialize};

/// An SSA value of a procedure. Indexes into [super::Procedure::values].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// A basic block of a procedure. Indexes into [super::Procedure::blocks].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// A routine of a compilation unit. Indexes into [super::CompilationUnit::routines].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutineId(pub u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub const ENTRY: BlockId = BlockId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl RoutineId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    /// An integer constant. Only the low `width` bits of `value` are meaningful.
    Int { value: u64, width: u32 },
    /// The null pointer.
    Null,
}

impl Constant {
    pub fn bool(value: bool) -> Constant {
        Constant::Int { value: value as u64, width: 1 }
    }

    pub fn typ(&self) -> Type {
        match self {
            Constant::Int { width, .. } => Type::Int { width: *width },
            Constant::Null => Type::Ptr,
        }
    }
}

/// An instruction operand: either a value produced in the procedure or a constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Const(Constant),
}

impl Operand {
    pub fn int(value: u64, width: u32) -> Operand {
        Operand::Const(Constant::Int { value, width })
    }

    pub fn bool(value: bool) -> Operand {
        Operand::Const(Constant::bool(value))
    }

    pub fn null() -> Operand {
        Operand::Const(Constant::Null)
    }

    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(value) => Some(*value),
            Operand::Const(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Const(Constant::Null))
    }
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Operand::Value(value)
    }
}
