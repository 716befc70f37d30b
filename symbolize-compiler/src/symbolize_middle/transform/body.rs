// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Utility functions that allow us to modify a procedure body.

use itertools::Itertools;
use std::mem;
use symbolize_ir::cfg::ControlFlowGraph;
use symbolize_ir::{
    BasicBlock, BlockId, InstKind, Instruction, Operand, Procedure, RoutineId, Terminator, Type,
    ValueId,
};

/// A procedure that is being rewritten.
///
/// Instructions are addressed by [SourceInstruction], which insertions keep up to date.
pub struct MutableBody {
    procedure: Procedure,
}

/// Denotes whether instrumentation should be inserted before or after the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// We store the index of an instruction to avoid borrow checker issues and unnecessary copies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceInstruction {
    Instruction { idx: usize, bb: BlockId },
    Terminator { bb: BlockId },
}

impl SourceInstruction {
    pub fn bb(&self) -> BlockId {
        match *self {
            SourceInstruction::Instruction { bb, .. } | SourceInstruction::Terminator { bb } => bb,
        }
    }
}

impl MutableBody {
    /// Create a mutable body from the original procedure.
    pub fn from(procedure: Procedure) -> Self {
        MutableBody { procedure }
    }

    /// Create the new procedure consuming this mutable body.
    pub fn into(self) -> Procedure {
        self.procedure
    }

    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.procedure.blocks
    }

    pub fn block(&self, bb: BlockId) -> &BasicBlock {
        self.procedure.block(bb)
    }

    pub fn params(&self) -> &[ValueId] {
        &self.procedure.params
    }

    pub fn value_ty(&self, value: ValueId) -> Type {
        self.procedure.value_ty(value)
    }

    pub fn operand_ty(&self, operand: &Operand) -> Type {
        self.procedure.operand_ty(operand)
    }

    pub fn cfg(&self) -> ControlFlowGraph {
        ControlFlowGraph::new(&self.procedure)
    }

    pub fn instruction(&self, source: SourceInstruction) -> &Instruction {
        let SourceInstruction::Instruction { idx, bb } = source else {
            unreachable!("Expected an instruction, found terminator of {}", source.bb())
        };
        &self.procedure.blocks[bb.index()].instructions[idx]
    }

    pub fn instruction_mut(&mut self, source: SourceInstruction) -> &mut Instruction {
        let SourceInstruction::Instruction { idx, bb } = source else {
            unreachable!("Expected an instruction, found terminator of {}", source.bb())
        };
        &mut self.procedure.blocks[bb.index()].instructions[idx]
    }

    pub fn terminator_mut(&mut self, bb: BlockId) -> &mut Terminator {
        &mut self.procedure.blocks[bb.index()].terminator
    }

    /// Add a new value to the body with the given type.
    pub fn new_value(&mut self, ty: Type) -> ValueId {
        self.procedure.values.push(ty);
        ValueId(self.procedure.values.len() as u32 - 1)
    }

    /// Append a new block to the body.
    pub fn new_block(&mut self, instructions: Vec<Instruction>, terminator: Terminator) -> BlockId {
        self.procedure.blocks.push(BasicBlock::new(instructions, terminator));
        BlockId(self.procedure.blocks.len() as u32 - 1)
    }

    /// Add a new instruction. Return the value where its result is saved unless `ty` is void.
    pub fn new_instruction(
        &mut self,
        kind: InstKind,
        ty: Type,
        source: &mut SourceInstruction,
        position: InsertPosition,
    ) -> Option<ValueId> {
        let result = (!ty.is_void()).then(|| self.new_value(ty));
        self.insert_inst(Instruction::new(result, kind), source, position);
        result
    }

    /// Add a new call to `callee`. Return the value where its result is saved, if any.
    pub fn add_call(
        &mut self,
        callee: RoutineId,
        args: Vec<Operand>,
        ret: Type,
        source: &mut SourceInstruction,
        position: InsertPosition,
    ) -> Option<ValueId> {
        self.new_instruction(InstKind::Call { callee, args }, ret, source, position)
    }

    /// Insert an instruction before or after the source instruction and update the source as
    /// needed.
    ///
    /// After an insertion with [InsertPosition::After], the source points to the new
    /// instruction, so consecutive insertions keep their order.
    pub fn insert_inst(
        &mut self,
        inst: Instruction,
        source: &mut SourceInstruction,
        position: InsertPosition,
    ) {
        match (position, source) {
            (InsertPosition::Before, SourceInstruction::Instruction { idx, bb }) => {
                self.procedure.blocks[bb.index()].instructions.insert(*idx, inst);
                *idx += 1;
            }
            (InsertPosition::Before, SourceInstruction::Terminator { bb }) => {
                // Append instructions at the end of the basic block.
                self.procedure.blocks[bb.index()].instructions.push(inst);
            }
            (InsertPosition::After, SourceInstruction::Instruction { idx, bb }) => {
                self.procedure.blocks[bb.index()].instructions.insert(*idx + 1, inst);
                *idx += 1;
            }
            (InsertPosition::After, SourceInstruction::Terminator { bb }) => {
                unimplemented!("Cannot insert instructions after the terminator of {bb}")
            }
        }
    }

    /// Split a basic block right before the source instruction and use the new terminator in
    /// the basic block that was split.
    ///
    /// The tail of the block moves to a new block together with the original terminator, and
    /// phis of the successors are updated to name the new block as their predecessor. The
    /// source is updated to point to the same instruction which is now in the new basic block.
    pub fn split_bb(&mut self, source: &mut SourceInstruction, new_term: Terminator) -> BlockId {
        let new_bb = BlockId(self.procedure.blocks.len() as u32);
        let (idx, bb) = match source {
            SourceInstruction::Instruction { idx, bb } => {
                let orig = (*idx, *bb);
                *idx = 0;
                *bb = new_bb;
                orig
            }
            SourceInstruction::Terminator { bb } => {
                let orig = (self.procedure.blocks[bb.index()].instructions.len(), *bb);
                *bb = new_bb;
                orig
            }
        };
        let block = &mut self.procedure.blocks[bb.index()];
        let old_term = mem::replace(&mut block.terminator, new_term);
        let remaining = block.instructions.split_off(idx);
        let successors = old_term.successors();
        self.procedure.blocks.push(BasicBlock::new(remaining, old_term));
        for succ in successors.into_iter().unique() {
            self.rename_predecessor(succ, bb, new_bb);
        }
        new_bb
    }

    /// Make the phis of `bb` refer to predecessor `to` instead of `from`.
    pub fn rename_predecessor(&mut self, bb: BlockId, from: BlockId, to: BlockId) {
        for inst in self.procedure.blocks[bb.index()].instructions.iter_mut() {
            if let InstKind::Phi { incoming } = &mut inst.kind {
                for (pred, _) in incoming.iter_mut().filter(|(pred, _)| *pred == from) {
                    *pred = to;
                }
            }
        }
    }

    /// Remove the instruction at the given position and return it.
    pub fn remove_inst(&mut self, bb: BlockId, idx: usize) -> Instruction {
        self.procedure.blocks[bb.index()].instructions.remove(idx)
    }

    /// Find the block and position of the instruction that defines `value`.
    pub fn find_def(&self, value: ValueId) -> Option<SourceInstruction> {
        self.procedure.find_def(value).map(|(bb, idx)| SourceInstruction::Instruction { idx, bb })
    }

    /// Replace every use of `from` by `to`.
    pub fn replace_uses(&mut self, from: ValueId, to: Operand) {
        self.procedure.replace_uses(from, to)
    }

    /// Every instruction that uses `value`. Terminator uses are reported as
    /// [SourceInstruction::Terminator].
    pub fn uses(&self, value: ValueId) -> Vec<SourceInstruction> {
        let mut uses = vec![];
        for (bb, block) in self.procedure.block_ids().zip(&self.procedure.blocks) {
            for (idx, inst) in block.instructions.iter().enumerate() {
                if inst.operands().into_iter().any(|op| *op == Operand::Value(value)) {
                    uses.push(SourceInstruction::Instruction { idx, bb });
                }
            }
            if block.terminator.operands().into_iter().any(|op| *op == Operand::Value(value)) {
                uses.push(SourceInstruction::Terminator { bb });
            }
        }
        uses
    }
}
