// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Notify the runtime whenever a basic block is entered. This lets the runtime follow the
//! path taken by pure concolic executions.

use crate::symbolize_middle::runtime::Runtime;
use crate::symbolize_middle::transform::body::{InsertPosition, MutableBody, SourceInstruction};
use crate::symbolize_middle::transform::site_id;
use symbolize_ir::{BlockId, Operand, Type};

/// Insert `_sym_notify_basic_block(id)` after the phis of every block.
pub fn notify_block_entries(body: &mut MutableBody, runtime: &Runtime, site_tag: u64) {
    for idx in 0..body.blocks().len() {
        let bb = BlockId(idx as u32);
        let mut source = SourceInstruction::Instruction { idx: body.block(bb).phi_count(), bb };
        let args = vec![Operand::int(site_id(site_tag, bb), 64)];
        let position = InsertPosition::Before;
        body.add_call(runtime.notify_basic_block, args, Type::Void, &mut source, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbolize_ir::builder::ProcedureBuilder;
    use symbolize_ir::{CompilationUnit, InstKind};

    #[test]
    fn test_notification_follows_phis() {
        let mut unit = CompilationUnit::new("notify.c");
        let runtime = Runtime::declare(&mut unit).unwrap();
        let mut builder = ProcedureBuilder::new(&[Type::bool()], Type::i32());
        let cond = builder.param(0);
        let (left, join) = (builder.new_block(), builder.new_block());
        builder.branch(cond.into(), left, join);
        builder.switch_to(left);
        builder.goto(join);
        builder.switch_to(join);
        let merged = builder.phi(
            Type::i32(),
            vec![(BlockId::ENTRY, Operand::int(0, 32)), (left, Operand::int(1, 32))],
        );
        builder.ret(Some(merged.into()));

        let mut body = MutableBody::from(builder.finish());
        notify_block_entries(&mut body, &runtime, 3);
        for (bb, block) in body.procedure().block_ids().zip(body.blocks()) {
            let expected = InstKind::Call {
                callee: runtime.notify_basic_block,
                args: vec![Operand::int(site_id(3, bb), 64)],
            };
            assert_eq!(block.instructions[block.phi_count()].kind, expected);
        }
        assert_eq!(body.block(join).phi_count(), 1);
    }
}
