// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural well-formedness checks for procedures.
//!
//! The verifier enforces the invariants a host compiler expects from any procedure:
//! every block jumps to existing blocks, every value is defined exactly once and its
//! definition dominates every use, phis are grouped at the start of their block with one
//! entry per incoming edge, and every instruction is type consistent.
//! Uses inside unreachable blocks are exempt from the dominance rule.

use crate::cfg::ControlFlowGraph;
use crate::{
    BlockId, CastOp, CompilationUnit, InstKind, Instruction, Operand, Procedure, Terminator, Type,
    ValueId, MAX_INT_WIDTH,
};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("procedure has no blocks")]
    NoBlocks,
    #[error("entry block has predecessors {0:?}")]
    EntryHasPredecessors(Vec<BlockId>),
    #[error("{bb} jumps to missing block {target}")]
    UnknownBlock { bb: BlockId, target: BlockId },
    #[error("{bb} references value {value} which is not declared")]
    UnknownValue { bb: BlockId, value: ValueId },
    #[error("value {0} is defined more than once")]
    MultipleDefinitions(ValueId),
    #[error("{bb} uses value {value} which is never defined")]
    Undefined { bb: BlockId, value: ValueId },
    #[error("definition of {value} does not dominate its use in {bb}")]
    NotDominated { bb: BlockId, value: ValueId },
    #[error("phi {value} in {bb} is not grouped at the start of the block")]
    MisplacedPhi { bb: BlockId, value: ValueId },
    #[error("phi {value} in {bb} has incoming blocks {incoming:?} but predecessors {predecessors:?}")]
    PhiPredecessorMismatch {
        bb: BlockId,
        value: ValueId,
        incoming: Vec<BlockId>,
        predecessors: Vec<BlockId>,
    },
    #[error("`{inst}` in {bb}: {reason}")]
    TypeMismatch { bb: BlockId, inst: String, reason: String },
    #[error("value {value} has unsupported integer width {width}")]
    UnsupportedWidth { value: ValueId, width: u32 },
}

/// Verify that the procedure is well formed. The unit provides callee signatures.
pub fn verify_procedure(unit: &CompilationUnit, procedure: &Procedure) -> Result<(), VerifyError> {
    if procedure.blocks.is_empty() {
        return Err(VerifyError::NoBlocks);
    }
    check_targets(procedure)?;
    check_widths(procedure)?;
    let cfg = ControlFlowGraph::new(procedure);
    if !cfg.predecessors(BlockId::ENTRY).is_empty() {
        return Err(VerifyError::EntryHasPredecessors(cfg.predecessors(BlockId::ENTRY).to_vec()));
    }
    let definitions = collect_definitions(procedure)?;
    let verifier = Verifier { unit, procedure, cfg, definitions };
    for bb in procedure.block_ids() {
        verifier.verify_block(bb)?;
    }
    trace!(blocks = procedure.blocks.len(), "verify_procedure: ok");
    Ok(())
}

fn check_targets(procedure: &Procedure) -> Result<(), VerifyError> {
    for (bb, block) in procedure.block_ids().zip(&procedure.blocks) {
        if let Some(target) =
            block.terminator.successors().into_iter().find(|target| target.index() >= procedure.blocks.len())
        {
            return Err(VerifyError::UnknownBlock { bb, target });
        }
    }
    Ok(())
}

fn check_widths(procedure: &Procedure) -> Result<(), VerifyError> {
    for (idx, ty) in procedure.values.iter().enumerate() {
        if let Type::Int { width } = *ty {
            if width == 0 || width > MAX_INT_WIDTH {
                return Err(VerifyError::UnsupportedWidth { value: ValueId(idx as u32), width });
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
enum DefSite {
    Param,
    Inst { bb: BlockId, idx: usize },
}

fn collect_definitions(procedure: &Procedure) -> Result<Vec<Option<DefSite>>, VerifyError> {
    let mut definitions = vec![None; procedure.values.len()];
    let mut define = |value: ValueId, site: DefSite, bb: BlockId| {
        match definitions.get_mut(value.index()) {
            None => Err(VerifyError::UnknownValue { bb, value }),
            Some(Some(_)) => Err(VerifyError::MultipleDefinitions(value)),
            Some(slot) => {
                *slot = Some(site);
                Ok(())
            }
        }
    };
    for param in &procedure.params {
        define(*param, DefSite::Param, BlockId::ENTRY)?;
    }
    for (bb, block) in procedure.block_ids().zip(&procedure.blocks) {
        for (idx, inst) in block.instructions.iter().enumerate() {
            if let Some(result) = inst.result {
                define(result, DefSite::Inst { bb, idx }, bb)?;
            }
        }
    }
    Ok(definitions)
}

struct Verifier<'a> {
    unit: &'a CompilationUnit,
    procedure: &'a Procedure,
    cfg: ControlFlowGraph,
    definitions: Vec<Option<DefSite>>,
}

impl Verifier<'_> {
    fn verify_block(&self, bb: BlockId) -> Result<(), VerifyError> {
        let block = self.procedure.block(bb);
        let phi_count = block.phi_count();
        for (idx, inst) in block.instructions.iter().enumerate() {
            match &inst.kind {
                InstKind::Phi { incoming } => {
                    let value = inst.result.unwrap_or(ValueId(u32::MAX));
                    if idx >= phi_count {
                        return Err(VerifyError::MisplacedPhi { bb, value });
                    }
                    self.check_phi_edges(bb, value, incoming)?;
                    for (pred, operand) in incoming {
                        self.check_use_at_end(*pred, bb, operand)?;
                    }
                }
                _ => {
                    for operand in inst.operands() {
                        self.check_use(bb, idx, operand)?;
                    }
                }
            }
            self.check_types(inst).map_err(|reason| VerifyError::TypeMismatch {
                bb,
                inst: inst.to_string(),
                reason,
            })?;
        }
        for operand in block.terminator.operands() {
            self.check_use(bb, block.instructions.len(), operand)?;
        }
        self.check_terminator_types(&block.terminator).map_err(|reason| {
            VerifyError::TypeMismatch { bb, inst: block.terminator.to_string(), reason }
        })
    }

    fn check_phi_edges(
        &self,
        bb: BlockId,
        value: ValueId,
        incoming: &[(BlockId, Operand)],
    ) -> Result<(), VerifyError> {
        let mut incoming_blocks: Vec<_> = incoming.iter().map(|(pred, _)| *pred).collect();
        let mut predecessors = self.cfg.predecessors(bb).to_vec();
        incoming_blocks.sort();
        predecessors.sort();
        if incoming_blocks != predecessors {
            return Err(VerifyError::PhiPredecessorMismatch {
                bb,
                value,
                incoming: incoming_blocks,
                predecessors,
            });
        }
        Ok(())
    }

    fn definition(&self, bb: BlockId, value: ValueId) -> Result<DefSite, VerifyError> {
        match self.definitions.get(value.index()) {
            None => Err(VerifyError::UnknownValue { bb, value }),
            Some(None) => Err(VerifyError::Undefined { bb, value }),
            Some(Some(site)) => Ok(*site),
        }
    }

    /// Check a use at position `idx` of block `bb`.
    fn check_use(&self, bb: BlockId, idx: usize, operand: &Operand) -> Result<(), VerifyError> {
        let Some(value) = operand.as_value() else { return Ok(()) };
        let site = self.definition(bb, value)?;
        if !self.cfg.is_reachable(bb) {
            return Ok(());
        }
        let dominated = match site {
            DefSite::Param => true,
            DefSite::Inst { bb: def_bb, idx: def_idx } if def_bb == bb => def_idx < idx,
            DefSite::Inst { bb: def_bb, .. } => self.cfg.dominates(def_bb, bb),
        };
        if dominated { Ok(()) } else { Err(VerifyError::NotDominated { bb, value }) }
    }

    /// Check a phi operand flowing along the edge `pred -> bb`.
    fn check_use_at_end(
        &self,
        pred: BlockId,
        bb: BlockId,
        operand: &Operand,
    ) -> Result<(), VerifyError> {
        let Some(value) = operand.as_value() else { return Ok(()) };
        let site = self.definition(bb, value)?;
        if !self.cfg.is_reachable(pred) {
            return Ok(());
        }
        let dominated = match site {
            DefSite::Param => true,
            DefSite::Inst { bb: def_bb, .. } => self.cfg.dominates(def_bb, pred),
        };
        if dominated { Ok(()) } else { Err(VerifyError::NotDominated { bb, value }) }
    }

    fn result_ty(&self, inst: &Instruction) -> Type {
        inst.result.map_or(Type::Void, |value| self.procedure.value_ty(value))
    }

    fn ty(&self, operand: &Operand) -> Type {
        self.procedure.operand_ty(operand)
    }

    fn check_types(&self, inst: &Instruction) -> Result<(), String> {
        let result = self.result_ty(inst);
        match &inst.kind {
            InstKind::Binary { lhs, rhs, .. } => {
                expect(result.is_int(), "binary operations produce integers")?;
                expect(self.ty(lhs) == result && self.ty(rhs) == result, "operand types differ")
            }
            InstKind::Compare { lhs, rhs, .. } => {
                expect(result.is_bool(), "comparisons produce i1")?;
                expect(self.ty(lhs) == self.ty(rhs), "operand types differ")?;
                expect(!self.ty(lhs).is_void(), "cannot compare void")
            }
            InstKind::Cast { op, value } => check_cast(*op, self.ty(value), result),
            InstKind::Select { cond, if_true, if_false } => {
                expect(self.ty(cond).is_bool(), "select condition must be i1")?;
                expect(!result.is_void(), "select must produce a value")?;
                expect(
                    self.ty(if_true) == result && self.ty(if_false) == result,
                    "select arms must match the result type",
                )
            }
            InstKind::Alloca { .. } => expect(result.is_ptr(), "alloca produces a pointer"),
            InstKind::Load { ptr } => {
                expect(self.ty(ptr).is_ptr(), "load address must be a pointer")?;
                expect(!result.is_void(), "load must produce a value")
            }
            InstKind::Store { ptr, value } => {
                expect(self.ty(ptr).is_ptr(), "store address must be a pointer")?;
                expect(!self.ty(value).is_void(), "cannot store void")?;
                expect(inst.result.is_none(), "store does not produce a value")
            }
            InstKind::PtrOffset { base, offset } => {
                expect(result.is_ptr(), "pointer arithmetic produces a pointer")?;
                expect(self.ty(base).is_ptr(), "base must be a pointer")?;
                expect(self.ty(offset).is_int(), "offset must be an integer")
            }
            InstKind::Call { callee, args } => {
                let Some(routine) = self.unit.routines.get(callee.index()) else {
                    return Err(format!("unknown routine {callee}"));
                };
                let sig = &routine.signature;
                let arity_ok = if sig.variadic {
                    args.len() >= sig.params.len()
                } else {
                    args.len() == sig.params.len()
                };
                if !arity_ok {
                    return Err(format!(
                        "`{}` expects {} arguments, found {}",
                        routine.name,
                        sig.params.len(),
                        args.len()
                    ));
                }
                for (idx, (param, arg)) in sig.params.iter().zip(args).enumerate() {
                    if *param != self.ty(arg) {
                        return Err(format!(
                            "argument {idx} of `{}` expects {param}, found {}",
                            routine.name,
                            self.ty(arg)
                        ));
                    }
                }
                expect(result == sig.ret, "call result does not match the callee return type")
            }
            InstKind::Phi { incoming } => {
                expect(!result.is_void(), "phi must produce a value")?;
                expect(
                    incoming.iter().all(|(_, op)| self.ty(op) == result),
                    "phi operands must match the result type",
                )
            }
            InstKind::Opaque { .. } => Ok(()),
        }
    }

    fn check_terminator_types(&self, terminator: &Terminator) -> Result<(), String> {
        match terminator {
            Terminator::Branch { cond, .. } => {
                expect(self.ty(cond).is_bool(), "branch condition must be i1")
            }
            Terminator::Return { value } => {
                let ty = value.as_ref().map_or(Type::Void, |value| self.ty(value));
                expect(ty == self.procedure.return_ty, "return type mismatch")
            }
            Terminator::Goto { .. } | Terminator::Unreachable => Ok(()),
        }
    }
}

fn check_cast(op: CastOp, from: Type, to: Type) -> Result<(), String> {
    let widths = (from.bit_width(), to.bit_width());
    let ok = match (op, widths) {
        (CastOp::ZExt | CastOp::SExt, (Some(from_w), Some(to_w))) => {
            from.is_int() && to.is_int() && from_w < to_w
        }
        (CastOp::Trunc, (Some(from_w), Some(to_w))) => from.is_int() && to.is_int() && from_w > to_w,
        (CastOp::PtrToInt, _) => from.is_ptr() && to.is_int(),
        (CastOp::IntToPtr, _) => from.is_int() && to.is_ptr(),
        (CastOp::BitCast, (Some(from_w), Some(to_w))) => from_w == to_w,
        _ => false,
    };
    expect(ok, &format!("invalid cast from {from} to {to}"))
}

fn expect(condition: bool, reason: &str) -> Result<(), String> {
    if condition { Ok(()) } else { Err(reason.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProcedureBuilder;
    use crate::{BinOp, CmpPredicate, Signature};

    fn unit() -> CompilationUnit {
        CompilationUnit::new("verify.c")
    }

    #[test]
    fn test_valid_loop() {
        let mut builder = ProcedureBuilder::new(&[Type::i32()], Type::i32());
        let n = builder.param(0);
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        builder.goto(header);
        builder.switch_to(header);
        let placeholder = Operand::int(0, 32);
        let i = builder.phi(Type::i32(), vec![(BlockId::ENTRY, placeholder)]);
        let cond = builder.compare(CmpPredicate::Slt, i.into(), n.into());
        builder.branch(cond.into(), body, exit);
        builder.switch_to(body);
        let next = builder.binary(BinOp::Add, i.into(), Operand::int(1, 32));
        builder.goto(header);
        builder.switch_to(exit);
        builder.ret(Some(i.into()));
        let mut procedure = builder.finish();
        let InstKind::Phi { incoming } = &mut procedure.blocks[1].instructions[0].kind else {
            unreachable!()
        };
        incoming.push((body, next.into()));
        assert_eq!(verify_procedure(&unit(), &procedure), Ok(()));
    }

    #[test]
    fn test_use_before_definition() {
        let mut builder = ProcedureBuilder::new(&[Type::i32()], Type::i32());
        let x = builder.param(0);
        let sum = builder.binary(BinOp::Add, x.into(), x.into());
        builder.ret(Some(sum.into()));
        let mut procedure = builder.finish();
        procedure.blocks[0].instructions[0].kind =
            InstKind::Binary { op: BinOp::Add, lhs: sum.into(), rhs: x.into() };
        assert_eq!(
            verify_procedure(&unit(), &procedure),
            Err(VerifyError::NotDominated { bb: BlockId::ENTRY, value: sum })
        );
    }

    #[test]
    fn test_definition_in_sibling_block() {
        let mut builder = ProcedureBuilder::new(&[Type::bool()], Type::i32());
        let cond = builder.param(0);
        let left = builder.new_block();
        let right = builder.new_block();
        builder.branch(cond.into(), left, right);
        builder.switch_to(left);
        let value = builder.binary(BinOp::Add, Operand::int(1, 32), Operand::int(2, 32));
        builder.ret(Some(value.into()));
        builder.switch_to(right);
        builder.ret(Some(value.into()));
        let result = verify_procedure(&unit(), &builder.finish());
        assert_eq!(result, Err(VerifyError::NotDominated { bb: right, value }));
    }

    #[test]
    fn test_phi_predecessor_mismatch() {
        let mut builder = ProcedureBuilder::new(&[], Type::i32());
        let next = builder.new_block();
        builder.goto(next);
        builder.switch_to(next);
        let phi = builder.phi(Type::i32(), vec![]);
        builder.ret(Some(phi.into()));
        let result = verify_procedure(&unit(), &builder.finish());
        assert!(matches!(result, Err(VerifyError::PhiPredecessorMismatch { .. })));
    }

    #[test]
    fn test_misplaced_phi() {
        let mut builder = ProcedureBuilder::new(&[Type::i32()], Type::i32());
        let x = builder.param(0);
        let next = builder.new_block();
        builder.goto(next);
        builder.switch_to(next);
        builder.binary(BinOp::Add, x.into(), x.into());
        let phi = builder.phi(Type::i32(), vec![(BlockId::ENTRY, x.into())]);
        builder.ret(Some(phi.into()));
        let result = verify_procedure(&unit(), &builder.finish());
        assert_eq!(result, Err(VerifyError::MisplacedPhi { bb: next, value: phi }));
    }

    #[test]
    fn test_call_arity_and_types() {
        let mut unit = unit();
        let callee =
            unit.add_routine("callee", Signature::new(vec![Type::i64()], Type::Void), None).unwrap();
        let mut builder = ProcedureBuilder::new(&[], Type::Void);
        builder.call(callee, vec![Operand::int(1, 32)], Type::Void);
        builder.ret(None);
        let result = verify_procedure(&unit, &builder.finish());
        assert!(matches!(result, Err(VerifyError::TypeMismatch { .. })));
    }

    #[test]
    fn test_wide_integers_are_rejected() {
        let mut builder = ProcedureBuilder::new(&[Type::Int { width: 65 }], Type::Void);
        let wide = builder.param(0);
        builder.ret(None);
        let result = verify_procedure(&unit(), &builder.finish());
        assert_eq!(result, Err(VerifyError::UnsupportedWidth { value: wide, width: 65 }));

        let mut builder = ProcedureBuilder::new(&[Type::i64()], Type::Void);
        let x = builder.param(0);
        let narrow = builder.cast(CastOp::Trunc, x.into(), Type::Int { width: 0 });
        builder.ret(None);
        let result = verify_procedure(&unit(), &builder.finish());
        assert_eq!(result, Err(VerifyError::UnsupportedWidth { value: narrow, width: 0 }));
    }

    #[test]
    fn test_bad_target() {
        let mut builder = ProcedureBuilder::new(&[], Type::Void);
        builder.goto(BlockId(7));
        let result = verify_procedure(&unit(), &builder.finish());
        assert_eq!(result, Err(VerifyError::UnknownBlock { bb: BlockId(0), target: BlockId(7) }));
    }

    #[test]
    fn test_unreachable_block_is_exempt_from_dominance() {
        let mut builder = ProcedureBuilder::new(&[], Type::Void);
        let dead = builder.new_block();
        builder.ret(None);
        builder.switch_to(dead);
        let value = builder.binary(BinOp::Add, Operand::int(1, 8), Operand::int(1, 8));
        let mut procedure = builder.finish();
        procedure.blocks[dead.index()].instructions[0].kind =
            InstKind::Binary { op: BinOp::Add, lhs: value.into(), rhs: Operand::int(1, 8) };
        procedure.blocks[dead.index()].terminator = Terminator::Return { value: None };
        assert_eq!(verify_procedure(&unit(), &procedure), Ok(()));
    }
}
