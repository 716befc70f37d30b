// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Only build the expression of the second operand of `a && b` and `a || b` when the concrete
//! evaluation needs it.
//!
//! The block is split at the combinator's `_sym_build_expr` call:
//!
//! ```text
//!   head:  .. ; br a, eval, join        (for `||`: br a, join, eval)
//!   eval:  <slice computing the expression of b> ; h = build(and, h_a, h_b) ; goto join
//!   join:  h' = phi [h, eval], [h_a, head] ; <rest of the block>
//! ```
//!
//! Only runtime calls move. The concrete instructions stay in the head in their original
//! order, so the concrete outcome does not change.

use crate::symbolize_middle::runtime::Runtime;
use crate::symbolize_middle::transform::body::{InsertPosition, MutableBody, SourceInstruction};
use crate::symbolize_middle::transform::symbolizer::{Combinator, ExprMap, ShortCircuitCandidate};
use std::collections::{BTreeSet, HashMap};
use symbolize_ir::{BlockId, InstKind, Instruction, Operand, Terminator, Type, ValueId};
use tracing::{debug, trace};

/// Rewrite every candidate. Returns the number of blocks added.
pub fn rewrite_short_circuits(
    body: &mut MutableBody,
    runtime: &Runtime,
    exprs: &mut ExprMap,
    candidates: &[ShortCircuitCandidate],
) -> usize {
    let blocks_before = body.blocks().len();
    // Handles of earlier combinators are replaced by the phi of their join block.
    let mut substitutions: HashMap<ValueId, ValueId> = HashMap::new();
    let resolve = |substitutions: &HashMap<ValueId, ValueId>, value: ValueId| {
        substitutions.get(&value).copied().unwrap_or(value)
    };
    for candidate in candidates {
        let handle = resolve(&substitutions, candidate.handle);
        let lhs_handle = candidate.lhs_expr.handle().map(|h| resolve(&substitutions, h));
        let rhs_handle = candidate.rhs_expr.handle().map(|h| resolve(&substitutions, h));
        let Some(SourceInstruction::Instruction { idx, bb }) = body.find_def(handle) else {
            debug!(?candidate, "short-circuit candidate no longer defined");
            continue;
        };
        if !is_build_expr(body.instruction(SourceInstruction::Instruction { idx, bb }), runtime) {
            continue;
        }
        let slice = collect_slice(body, runtime, bb, idx, rhs_handle, lhs_handle);
        trace!(?candidate, ?bb, slice = slice.len(), "rewrite_short_circuits");
        let join_phi = split(body, candidate, bb, idx, &slice, handle, lhs_handle);
        exprs.redirect(handle, join_phi);
        substitutions.insert(handle, join_phi);
    }
    body.blocks().len() - blocks_before
}

fn is_build_expr(inst: &Instruction, runtime: &Runtime) -> bool {
    matches!(inst.kind, InstKind::Call { callee, .. } if callee == runtime.build_expr)
}

/// Positions of the `_sym_build_expr` calls that only contribute to the expression of the
/// second operand. The combinator call at `idx` is not included.
fn collect_slice(
    body: &MutableBody,
    runtime: &Runtime,
    bb: BlockId,
    idx: usize,
    rhs_handle: Option<ValueId>,
    lhs_handle: Option<ValueId>,
) -> BTreeSet<usize> {
    let mut slice = BTreeSet::new();
    let Some(rhs_handle) = rhs_handle else { return slice };
    // A value shared by two members is only accepted once both members are in the slice,
    // so iterate until nothing changes.
    loop {
        let mut changed = false;
        let mut worklist = vec![rhs_handle];
        let mut visited = BTreeSet::new();
        while let Some(value) = worklist.pop() {
            if Some(value) == lhs_handle || !visited.insert(value) {
                continue;
            }
            let Some(SourceInstruction::Instruction { idx: def_idx, bb: def_bb }) =
                body.find_def(value)
            else {
                continue;
            };
            if def_bb != bb || def_idx >= idx {
                continue;
            }
            let inst = &body.block(bb).instructions[def_idx];
            if !is_build_expr(inst, runtime) {
                continue;
            }
            if !slice.contains(&def_idx) {
                let in_slice = |user: &SourceInstruction| {
                    matches!(user, SourceInstruction::Instruction { idx: user_idx, bb: user_bb }
                        if *user_bb == bb && (*user_idx == idx || slice.contains(user_idx)))
                };
                if !body.uses(value).iter().all(in_slice) {
                    continue;
                }
                slice.insert(def_idx);
                changed = true;
            }
            worklist.extend(inst.operands().into_iter().filter_map(Operand::as_value));
        }
        if !changed {
            return slice;
        }
    }
}

fn split(
    body: &mut MutableBody,
    candidate: &ShortCircuitCandidate,
    bb: BlockId,
    idx: usize,
    slice: &BTreeSet<usize>,
    handle: ValueId,
    lhs_handle: Option<ValueId>,
) -> ValueId {
    let join_phi = body.new_value(Type::Ptr);
    body.replace_uses(handle, Operand::Value(join_phi));

    let mut source = SourceInstruction::Instruction { idx, bb };
    let join = body.split_bb(&mut source, Terminator::Unreachable);
    let combinator_call = body.remove_inst(join, 0);
    let mut eval_insts: Vec<_> = slice.iter().rev().map(|pos| body.remove_inst(bb, *pos)).collect();
    eval_insts.reverse();
    eval_insts.push(combinator_call);
    let eval = body.new_block(eval_insts, Terminator::Goto { target: join });

    let (then_bb, else_bb) = match candidate.combinator {
        Combinator::And => (eval, join),
        Combinator::Or => (join, eval),
    };
    *body.terminator_mut(bb) = Terminator::Branch { cond: candidate.lhs, then_bb, else_bb };

    let lhs_expr = lhs_handle.map_or(Operand::null(), Operand::Value);
    let phi = InstKind::Phi { incoming: vec![(eval, Operand::Value(handle)), (bb, lhs_expr)] };
    let mut source = SourceInstruction::Instruction { idx: 0, bb: join };
    body.insert_inst(Instruction::new(Some(join_phi), phi), &mut source, InsertPosition::Before);
    join_phi
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolize_middle::intercept::InterceptionTable;
    use crate::symbolize_middle::transform::merge::resolve_merges;
    use crate::symbolize_middle::transform::symbolizer::{SymExpr, Symbolizer};
    use symbolize_ir::builder::ProcedureBuilder;
    use symbolize_ir::verify::verify_procedure;
    use symbolize_ir::{BinOp, CmpPredicate, CompilationUnit, Procedure};

    fn rewrite(procedure: Procedure) -> (CompilationUnit, Procedure, ExprMap, usize) {
        let mut unit = CompilationUnit::new("short_circuit.c");
        let runtime = Runtime::declare(&mut unit).unwrap();
        let interception = InterceptionTable::default();
        let mut body = MutableBody::from(procedure);
        let symbolized = Symbolizer::new(&unit, &runtime, &interception, 1).symbolize(&mut body);
        let mut exprs = symbolized.exprs;
        resolve_merges(&mut body, &exprs, &symbolized.placeholders);
        let added =
            rewrite_short_circuits(&mut body, &runtime, &mut exprs, &symbolized.candidates);
        (unit, body.into(), exprs, added)
    }

    fn bool_params(count: usize) -> ProcedureBuilder {
        ProcedureBuilder::new(&vec![Type::bool(); count], Type::bool())
    }

    #[test]
    fn test_or_evaluates_on_false() {
        let mut builder = bool_params(2);
        let (p, q) = (builder.param(0), builder.param(1));
        let r = builder.binary(BinOp::Or, p.into(), q.into());
        builder.ret(Some(r.into()));
        let (unit, procedure, exprs, added) = rewrite(builder.finish());

        assert_eq!(added, 2);
        verify_procedure(&unit, &procedure).unwrap();
        let (join, eval) = (BlockId(1), BlockId(2));
        let cond = Operand::Value(p);
        let head = &procedure.block(BlockId::ENTRY).terminator;
        assert_eq!(*head, Terminator::Branch { cond, then_bb: join, else_bb: eval });
        assert_eq!(procedure.block(eval).terminator, Terminator::Goto { target: join });
        let SymExpr::Handle(merged) = exprs.get(r).unwrap() else { panic!("Expected handle") };
        assert_eq!(procedure.block(join).instructions[0].result, Some(merged));
        let InstKind::Phi { incoming } = &procedure.block(join).instructions[0].kind else {
            panic!("Expected phi")
        };
        let preds: Vec<_> = incoming.iter().map(|(pred, _)| *pred).collect();
        assert_eq!(preds, [eval, BlockId::ENTRY]);
        assert_eq!(incoming[1].1, exprs.get(p).unwrap().operand());
    }

    #[test]
    fn test_nested_combinators() {
        let mut builder = bool_params(3);
        let (p, q, s) = (builder.param(0), builder.param(1), builder.param(2));
        let pq = builder.binary(BinOp::And, p.into(), q.into());
        let pqs = builder.binary(BinOp::And, pq.into(), s.into());
        builder.ret(Some(pqs.into()));
        let (unit, procedure, exprs, added) = rewrite(builder.finish());

        assert_eq!(added, 4);
        verify_procedure(&unit, &procedure).unwrap();
        let SymExpr::Handle(inner) = exprs.get(pq).unwrap() else { panic!("Expected handle") };
        let SymExpr::Handle(outer) = exprs.get(pqs).unwrap() else { panic!("Expected handle") };
        assert_eq!(procedure.block(BlockId(1)).instructions[0].result, Some(inner));
        assert_eq!(procedure.block(BlockId(3)).instructions[0].result, Some(outer));
        // The outer combinator reads the merged expression of the inner one.
        let InstKind::Call { args, .. } = &procedure.block(BlockId(4)).instructions[0].kind else {
            panic!("Expected call")
        };
        assert_eq!(args[1], Operand::Value(inner));
    }

    #[test]
    fn test_concrete_lhs_merges_null() {
        let mut builder = bool_params(1);
        let q = builder.param(0);
        let flag = builder.compare(CmpPredicate::Eq, Operand::int(1, 8), Operand::int(1, 8));
        let r = builder.binary(BinOp::And, flag.into(), q.into());
        builder.ret(Some(r.into()));
        let (unit, procedure, _, added) = rewrite(builder.finish());

        assert_eq!(added, 2);
        verify_procedure(&unit, &procedure).unwrap();
        let InstKind::Phi { incoming } = &procedure.block(BlockId(1)).instructions[0].kind else {
            panic!("Expected phi")
        };
        assert_eq!(incoming[1], (BlockId::ENTRY, Operand::null()));
    }

    #[test]
    fn test_concrete_combinator_is_not_split() {
        let mut builder = bool_params(0);
        let r = builder.binary(BinOp::And, Operand::bool(true), Operand::bool(false));
        builder.ret(Some(r.into()));
        let (_, procedure, _, added) = rewrite(builder.finish());
        assert_eq!(added, 0);
        assert_eq!(procedure.blocks.len(), 1);
    }
}
