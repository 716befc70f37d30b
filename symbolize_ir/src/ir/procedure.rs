// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
use super::{BlockId, Instruction, Operand, Terminator, Type, ValueId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

impl BasicBlock {
    pub fn new(instructions: Vec<Instruction>, terminator: Terminator) -> Self {
        BasicBlock { instructions, terminator }
    }

    /// Number of leading phi instructions.
    pub fn phi_count(&self) -> usize {
        self.instructions.iter().take_while(|inst| inst.is_phi()).count()
    }
}

/// The body of a routine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    /// The values bound to the parameters, in order.
    pub params: Vec<ValueId>,
    pub return_ty: Type,
    /// Type of every SSA value of the procedure, indexed by [ValueId].
    ///
    /// Parameters come first, followed by instruction results in creation order.
    pub values: Vec<Type>,
    /// Block 0 is the entry block.
    pub blocks: Vec<BasicBlock>,
}

impl Procedure {
    /// Create a procedure with one value per parameter type and no blocks.
    pub fn new(param_tys: &[Type], return_ty: Type) -> Self {
        let values = param_tys.to_vec();
        let params = (0..values.len()).map(|idx| ValueId(idx as u32)).collect();
        Procedure { params, return_ty, values, blocks: vec![] }
    }

    pub fn value_ty(&self, value: ValueId) -> Type {
        self.values[value.index()]
    }

    pub fn operand_ty(&self, operand: &Operand) -> Type {
        match operand {
            Operand::Value(value) => self.value_ty(*value),
            Operand::Const(constant) => constant.typ(),
        }
    }

    pub fn block(&self, bb: BlockId) -> &BasicBlock {
        &self.blocks[bb.index()]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(|idx| BlockId(idx as u32))
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|bb| bb.instructions.len()).sum()
    }

    /// Find the block and position of the instruction that defines `value`.
    pub fn find_def(&self, value: ValueId) -> Option<(BlockId, usize)> {
        self.blocks.iter().enumerate().find_map(|(bb, block)| {
            block
                .instructions
                .iter()
                .position(|inst| inst.result == Some(value))
                .map(|idx| (BlockId(bb as u32), idx))
        })
    }

    /// Replace every use of `from` by `to`, in instructions and terminators.
    pub fn replace_uses(&mut self, from: ValueId, to: Operand) {
        for block in self.blocks.iter_mut() {
            let inst_ops = block.instructions.iter_mut().flat_map(|inst| inst.operands_mut());
            for operand in inst_ops.chain(block.terminator.operands_mut()) {
                if *operand == Operand::Value(from) {
                    *operand = to;
                }
            }
        }
    }
}
