// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Complete the placeholder expressions of merges once every value has an expression.

use crate::symbolize_middle::transform::body::MutableBody;
use crate::symbolize_middle::transform::symbolizer::{ExprMap, Placeholder};
use symbolize_ir::InstKind;
use tracing::trace;

/// Give every placeholder one incoming entry per incoming entry of its concrete phi, with the
/// same predecessors in the same order.
///
/// Placeholders are referenced by value, so merges that depend on each other through loop
/// back-edges need no special treatment.
pub fn resolve_merges(body: &mut MutableBody, exprs: &ExprMap, placeholders: &[Placeholder]) {
    for placeholder in placeholders {
        let concrete = body.find_def(placeholder.concrete).expect("Expected concrete phi");
        let InstKind::Phi { incoming } = &body.instruction(concrete).kind else {
            unreachable!("Expected a phi, found `{}`", body.instruction(concrete))
        };
        let handles: Vec<_> =
            incoming.iter().map(|(pred, value)| (*pred, exprs.lookup(value).operand())).collect();
        trace!(?placeholder, entries = handles.len(), "resolve_merges");
        let source = body.find_def(placeholder.placeholder).expect("Expected placeholder phi");
        if let InstKind::Phi { incoming } = &mut body.instruction_mut(source).kind {
            *incoming = handles;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolize_middle::intercept::InterceptionTable;
    use crate::symbolize_middle::runtime::Runtime;
    use crate::symbolize_middle::transform::symbolizer::Symbolizer;
    use symbolize_ir::builder::ProcedureBuilder;
    use symbolize_ir::verify::verify_procedure;
    use symbolize_ir::{BinOp, BlockId, CompilationUnit, Operand, Type};

    /// Two merges that feed each other through the back-edge.
    #[test]
    fn test_loop_carried_merges() {
        let mut unit = CompilationUnit::new("merge.c");
        let runtime = Runtime::declare(&mut unit).unwrap();
        let mut builder = ProcedureBuilder::new(&[Type::i32()], Type::i32());
        let x = builder.param(0);
        let header = builder.new_block();
        let latch = builder.new_block();
        builder.goto(header);
        builder.switch_to(header);
        let a = builder.phi(Type::i32(), vec![(BlockId::ENTRY, x.into())]);
        let b = builder.phi(Type::i32(), vec![(BlockId::ENTRY, Operand::int(0, 32))]);
        builder.goto(latch);
        builder.switch_to(latch);
        let c = builder.binary(BinOp::Xor, b.into(), Operand::int(1, 32));
        builder.goto(header);
        let mut procedure = builder.finish();
        for (value, next) in [(a, b), (b, c)] {
            let (bb, idx) = procedure.find_def(value).unwrap();
            let inst = &mut procedure.blocks[bb.index()].instructions[idx];
            if let InstKind::Phi { incoming } = &mut inst.kind {
                incoming.push((latch, next.into()));
            }
        }

        let interception = InterceptionTable::default();
        let mut body = MutableBody::from(procedure);
        let symbolized = Symbolizer::new(&unit, &runtime, &interception, 1).symbolize(&mut body);
        resolve_merges(&mut body, &symbolized.exprs, &symbolized.placeholders);
        let procedure = body.into();
        verify_procedure(&unit, &procedure).unwrap();

        let handle = |value| symbolized.exprs.get(value).unwrap().operand();
        let placeholder_of = |value| {
            let placeholder = handle(value).as_value().unwrap();
            let (bb, idx) = procedure.find_def(placeholder).unwrap();
            procedure.block(bb).instructions[idx].kind.clone()
        };
        let expected_a = vec![(BlockId::ENTRY, handle(x)), (latch, handle(b))];
        assert_eq!(placeholder_of(a), InstKind::Phi { incoming: expected_a });
        let expected_b = vec![(BlockId::ENTRY, Operand::null()), (latch, handle(c))];
        assert_eq!(placeholder_of(b), InstKind::Phi { incoming: expected_b });
    }
}
