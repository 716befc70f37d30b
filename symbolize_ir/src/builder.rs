// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helper to assemble a [Procedure] instruction by instruction.
//!
//! New blocks start with an `unreachable` terminator, which is replaced when the block gets
//! terminated with [ProcedureBuilder::goto], [ProcedureBuilder::branch] or
//! [ProcedureBuilder::ret].

use crate::{
    BasicBlock, BinOp, BlockId, CastOp, CmpPredicate, InstKind, Instruction, Operand, Procedure,
    RoutineId, Terminator, Type, ValueId,
};

pub struct ProcedureBuilder {
    procedure: Procedure,
    current: BlockId,
}

impl ProcedureBuilder {
    /// Create a builder positioned at the end of the (empty) entry block.
    pub fn new(param_tys: &[Type], return_ty: Type) -> Self {
        let mut procedure = Procedure::new(param_tys, return_ty);
        procedure.blocks.push(BasicBlock::new(vec![], Terminator::Unreachable));
        ProcedureBuilder { procedure, current: BlockId::ENTRY }
    }

    pub fn param(&self, idx: usize) -> ValueId {
        self.procedure.params[idx]
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn new_block(&mut self) -> BlockId {
        let bb = BlockId(self.procedure.blocks.len() as u32);
        self.procedure.blocks.push(BasicBlock::new(vec![], Terminator::Unreachable));
        bb
    }

    pub fn switch_to(&mut self, bb: BlockId) {
        self.current = bb;
    }

    /// Append an instruction to the current block. Returns its result unless `ty` is void.
    pub fn push(&mut self, kind: InstKind, ty: Type) -> Option<ValueId> {
        let result = (!ty.is_void()).then(|| {
            self.procedure.values.push(ty);
            ValueId(self.procedure.values.len() as u32 - 1)
        });
        self.procedure.blocks[self.current.index()].instructions.push(Instruction::new(result, kind));
        result
    }

    fn push_value(&mut self, kind: InstKind, ty: Type) -> ValueId {
        assert!(!ty.is_void(), "Expected a value producing instruction");
        self.push(kind, ty).unwrap()
    }

    pub fn binary(&mut self, op: BinOp, lhs: Operand, rhs: Operand) -> ValueId {
        let ty = self.procedure.operand_ty(&lhs);
        self.push_value(InstKind::Binary { op, lhs, rhs }, ty)
    }

    pub fn compare(&mut self, pred: CmpPredicate, lhs: Operand, rhs: Operand) -> ValueId {
        self.push_value(InstKind::Compare { pred, lhs, rhs }, Type::bool())
    }

    pub fn cast(&mut self, op: CastOp, value: Operand, to: Type) -> ValueId {
        self.push_value(InstKind::Cast { op, value }, to)
    }

    pub fn select(&mut self, cond: Operand, if_true: Operand, if_false: Operand) -> ValueId {
        let ty = self.procedure.operand_ty(&if_true);
        self.push_value(InstKind::Select { cond, if_true, if_false }, ty)
    }

    pub fn alloca(&mut self, size: u64) -> ValueId {
        self.push_value(InstKind::Alloca { size }, Type::Ptr)
    }

    pub fn load(&mut self, ptr: Operand, ty: Type) -> ValueId {
        self.push_value(InstKind::Load { ptr }, ty)
    }

    pub fn store(&mut self, ptr: Operand, value: Operand) {
        self.push(InstKind::Store { ptr, value }, Type::Void);
    }

    pub fn ptr_offset(&mut self, base: Operand, offset: Operand) -> ValueId {
        self.push_value(InstKind::PtrOffset { base, offset }, Type::Ptr)
    }

    pub fn call(&mut self, callee: RoutineId, args: Vec<Operand>, ret: Type) -> Option<ValueId> {
        self.push(InstKind::Call { callee, args }, ret)
    }

    pub fn phi(&mut self, ty: Type, incoming: Vec<(BlockId, Operand)>) -> ValueId {
        self.push_value(InstKind::Phi { incoming }, ty)
    }

    pub fn opaque(&mut self, mnemonic: &str, operands: Vec<Operand>, ty: Type) -> Option<ValueId> {
        self.push(InstKind::Opaque { mnemonic: mnemonic.to_string(), operands }, ty)
    }

    pub fn goto(&mut self, target: BlockId) {
        self.terminate(Terminator::Goto { target });
    }

    pub fn branch(&mut self, cond: Operand, then_bb: BlockId, else_bb: BlockId) {
        self.terminate(Terminator::Branch { cond, then_bb, else_bb });
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.terminate(Terminator::Return { value });
    }

    fn terminate(&mut self, terminator: Terminator) {
        self.procedure.blocks[self.current.index()].terminator = terminator;
    }

    pub fn finish(self) -> Procedure {
        self.procedure
    }
}
