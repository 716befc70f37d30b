// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Implement the main walk that attaches a symbolic expression to every value of a procedure.
//!
//! Every instruction that computes a value of interest is followed by a call to the runtime
//! that builds the value's expression from the expressions of its operands. Instructions whose
//! operands are all statically concrete are left alone. Merges get a placeholder that is
//! completed by the merge resolver once every incoming value has been visited.

use crate::symbolize_middle::intercept::InterceptionTable;
use crate::symbolize_middle::runtime::{ExprKind, OpcodeTag, Runtime};
use crate::symbolize_middle::transform::body::{InsertPosition, MutableBody, SourceInstruction};
use crate::symbolize_middle::transform::site_id;
use symbolize_ir::{
    BinOp, BlockId, CompilationUnit, InstKind, Instruction, Operand, RoutineId, Terminator, Type,
    ValueId,
};
use tracing::{debug, trace};

mod expr_map;

pub use expr_map::{ExprMap, SymExpr};

/// The placeholder expression of a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placeholder {
    /// The concrete phi.
    pub concrete: ValueId,
    /// The phi that merges the expressions of the incoming values.
    pub placeholder: ValueId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// A boolean combinator `a && b` or `a || b` whose expression was built by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortCircuitCandidate {
    pub combinator: Combinator,
    /// The concrete value of `a`.
    pub lhs: Operand,
    pub lhs_expr: SymExpr,
    pub rhs_expr: SymExpr,
    /// Result of the `_sym_build_expr` call of the combinator.
    pub handle: ValueId,
}

/// Output of the walk.
#[derive(Debug, Default)]
pub struct SymbolizedBody {
    pub exprs: ExprMap,
    pub placeholders: Vec<Placeholder>,
    pub candidates: Vec<ShortCircuitCandidate>,
}

pub struct Symbolizer<'a> {
    unit: &'a CompilationUnit,
    runtime: &'a Runtime,
    interception: &'a InterceptionTable,
    site_tag: u64,
    output: SymbolizedBody,
}

impl<'a> Symbolizer<'a> {
    pub fn new(
        unit: &'a CompilationUnit,
        runtime: &'a Runtime,
        interception: &'a InterceptionTable,
        site_tag: u64,
    ) -> Self {
        Symbolizer { unit, runtime, interception, site_tag, output: SymbolizedBody::default() }
    }

    /// Instrument the body. Blocks are visited in reverse post-order so every definition is
    /// seen before its non-phi uses. Unreachable blocks come last.
    pub fn symbolize(mut self, body: &mut MutableBody) -> SymbolizedBody {
        let entry_start = self.symbolize_params(body);
        let cfg = body.cfg();
        for bb in cfg.visit_order() {
            let start = if bb == BlockId::ENTRY { entry_start } else { 0 };
            self.symbolize_block(body, bb, start);
        }
        self.output
    }

    /// Fetch the expression of every parameter at the start of the entry block.
    ///
    /// Return the number of instructions inserted.
    fn symbolize_params(&mut self, body: &mut MutableBody) -> usize {
        let mut source = SourceInstruction::Instruction { idx: 0, bb: BlockId::ENTRY };
        let params = body.params().to_vec();
        for (idx, param) in params.iter().enumerate() {
            // The runtime indexes parameters with a single byte.
            let Ok(index) = u8::try_from(idx) else {
                debug!(idx, "parameter index out of range");
                self.bind(*param, SymExpr::Absent);
                continue;
            };
            let handle = self.call_runtime(
                body,
                self.runtime.get_parameter_expression,
                vec![Operand::int(u64::from(index), 8)],
                &mut source,
                InsertPosition::Before,
            );
            self.bind(*param, SymExpr::Handle(handle));
        }
        params.len()
    }

    fn symbolize_block(&mut self, body: &mut MutableBody, bb: BlockId, start: usize) {
        trace!(?bb, "symbolize_block");
        let mut idx = start;
        while idx < body.block(bb).instructions.len() {
            let mut source = SourceInstruction::Instruction { idx, bb };
            let inst = body.instruction(source).clone();
            self.visit_instruction(body, &inst, &mut source);
            // Skip over the instructions inserted after the current one.
            let SourceInstruction::Instruction { idx: last, .. } = source else { unreachable!() };
            idx = last + 1;
        }
        let terminator = body.block(bb).terminator.clone();
        if let Terminator::Branch { cond, .. } = terminator {
            let mut source = SourceInstruction::Terminator { bb };
            self.push_path_constraint(body, cond, &mut source, InsertPosition::Before);
        }
    }

    fn visit_instruction(
        &mut self,
        body: &mut MutableBody,
        inst: &Instruction,
        source: &mut SourceInstruction,
    ) {
        match &inst.kind {
            InstKind::Phi { .. } => {
                let placeholder = body
                    .new_instruction(
                        InstKind::Phi { incoming: vec![] },
                        Type::Ptr,
                        source,
                        InsertPosition::After,
                    )
                    .unwrap();
                let concrete = result(inst);
                self.bind(concrete, SymExpr::Handle(placeholder));
                self.output.placeholders.push(Placeholder { concrete, placeholder });
            }
            InstKind::Binary { op, lhs, rhs } => {
                let combinator = match op {
                    _ if !body.value_ty(result(inst)).is_bool() => None,
                    BinOp::And => Some(Combinator::And),
                    BinOp::Or => Some(Combinator::Or),
                    _ => None,
                };
                match combinator {
                    Some(combinator) => {
                        self.visit_combinator(body, inst, combinator, *lhs, *rhs, source)
                    }
                    None => {
                        self.build_expr(body, inst, (*op).into(), &[*lhs, *rhs], source);
                    }
                }
            }
            InstKind::Compare { pred, lhs, rhs } => {
                self.build_expr(body, inst, (*pred).into(), &[*lhs, *rhs], source);
            }
            InstKind::Cast { op, value } => {
                self.build_expr(body, inst, (*op).into(), &[*value], source);
            }
            InstKind::PtrOffset { base, offset } => {
                self.build_expr(body, inst, ExprKind::PtrAdd, &[*base, *offset], source);
            }
            InstKind::Select { cond, if_true, if_false } => {
                let is_bool = body.value_ty(result(inst)).is_bool();
                if is_bool && *if_false == Operand::bool(false) {
                    self.visit_combinator(body, inst, Combinator::And, *cond, *if_true, source);
                } else if is_bool && *if_true == Operand::bool(true) {
                    self.visit_combinator(body, inst, Combinator::Or, *cond, *if_false, source);
                } else {
                    self.visit_select(body, inst, *cond, *if_true, *if_false, source);
                }
            }
            InstKind::Alloca { .. } => self.bind(result(inst), SymExpr::Absent),
            InstKind::Load { ptr } => {
                let size = body.value_ty(result(inst)).byte_size();
                let handle = self.call_runtime(
                    body,
                    self.runtime.read_memory,
                    vec![*ptr, Operand::int(size, 64)],
                    source,
                    InsertPosition::After,
                );
                self.bind(result(inst), SymExpr::Handle(handle));
            }
            InstKind::Store { ptr, value } => {
                let size = body.operand_ty(value).byte_size();
                let expr = self.output.exprs.lookup(value);
                let args = vec![*ptr, Operand::int(size, 64), expr.operand()];
                let write_memory = self.runtime.write_memory;
                body.add_call(write_memory, args, Type::Void, source, InsertPosition::After);
            }
            InstKind::Call { callee, args } => self.visit_call(body, inst, *callee, args, source),
            InstKind::Opaque { mnemonic, .. } => {
                debug!(%mnemonic, "unsupported instruction has no symbolic expression");
                if let Some(value) = inst.result {
                    self.bind(value, SymExpr::Absent);
                }
            }
        }
    }

    /// Emit `_sym_build_expr(tag, h1, .., hn)` after the instruction, unless every operand is
    /// concrete. Return the handle of the new expression.
    fn build_expr(
        &mut self,
        body: &mut MutableBody,
        inst: &Instruction,
        kind: ExprKind,
        operands: &[Operand],
        source: &mut SourceInstruction,
    ) -> Option<ValueId> {
        let value = result(inst);
        let exprs: Vec<_> = operands.iter().map(|op| self.output.exprs.lookup(op)).collect();
        if exprs.iter().all(|expr| expr.is_absent()) {
            self.bind(value, SymExpr::Absent);
            return None;
        }
        let Some(tag) = OpcodeTag::new(kind, body.value_ty(value)) else {
            debug!(?value, ?kind, "result too wide for an expression");
            self.bind(value, SymExpr::Absent);
            return None;
        };
        let args = std::iter::once(tag.operand()).chain(exprs.iter().map(|expr| expr.operand()));
        let build_expr = self.runtime.build_expr;
        let handle =
            self.call_runtime(body, build_expr, args.collect(), source, InsertPosition::After);
        self.bind(value, SymExpr::Handle(handle));
        Some(handle)
    }

    fn visit_combinator(
        &mut self,
        body: &mut MutableBody,
        inst: &Instruction,
        combinator: Combinator,
        lhs: Operand,
        rhs: Operand,
        source: &mut SourceInstruction,
    ) {
        let kind = match combinator {
            Combinator::And => ExprKind::LogicalAnd,
            Combinator::Or => ExprKind::LogicalOr,
        };
        if let Some(handle) = self.build_expr(body, inst, kind, &[lhs, rhs], source) {
            self.output.candidates.push(ShortCircuitCandidate {
                combinator,
                lhs,
                lhs_expr: self.output.exprs.lookup(&lhs),
                rhs_expr: self.output.exprs.lookup(&rhs),
                handle,
            });
        }
    }

    /// The expression of a select is the expression of the chosen arm, and the choice is a
    /// path constraint when the condition is symbolic.
    fn visit_select(
        &mut self,
        body: &mut MutableBody,
        inst: &Instruction,
        cond: Operand,
        if_true: Operand,
        if_false: Operand,
        source: &mut SourceInstruction,
    ) {
        let true_expr = self.output.exprs.lookup(&if_true);
        let false_expr = self.output.exprs.lookup(&if_false);
        if true_expr.is_absent() && false_expr.is_absent() {
            self.bind(result(inst), SymExpr::Absent);
        } else {
            let kind = InstKind::Select {
                cond,
                if_true: true_expr.operand(),
                if_false: false_expr.operand(),
            };
            let handle =
                body.new_instruction(kind, Type::Ptr, source, InsertPosition::After).unwrap();
            self.bind(result(inst), SymExpr::Handle(handle));
        }
        self.push_path_constraint(body, cond, source, InsertPosition::After);
    }

    /// Calls to wrappers pass the expression of every argument next to it, and read the
    /// expression of the result back from the runtime. Other calls are left untouched.
    fn visit_call(
        &mut self,
        body: &mut MutableBody,
        inst: &Instruction,
        callee: RoutineId,
        args: &[Operand],
        source: &mut SourceInstruction,
    ) {
        let unit = self.unit;
        let name = &unit.routine(callee).name;
        if self.runtime.contains(callee) || !self.interception.is_wrapper(name) {
            trace!(callee = %name, "skip call");
            if let Some(value) = inst.result {
                self.bind(value, SymExpr::Absent);
            }
            return;
        }
        let wrapper_args =
            args.iter().flat_map(|arg| [*arg, self.output.exprs.lookup(arg).operand()]).collect();
        if let InstKind::Call { args, .. } = &mut body.instruction_mut(*source).kind {
            *args = wrapper_args;
        }
        if let Some(value) = inst.result {
            let handle = self.call_runtime(
                body,
                self.runtime.get_return_expression,
                vec![],
                source,
                InsertPosition::After,
            );
            self.bind(value, SymExpr::Handle(handle));
        }
    }

    /// Record the concrete outcome of a symbolic condition.
    fn push_path_constraint(
        &mut self,
        body: &mut MutableBody,
        cond: Operand,
        source: &mut SourceInstruction,
        position: InsertPosition,
    ) {
        let Some(handle) = self.output.exprs.lookup(&cond).handle() else { return };
        let site = site_id(self.site_tag, source.bb());
        let args = vec![Operand::Value(handle), cond, Operand::int(site, 64)];
        body.add_call(self.runtime.push_path_constraint, args, Type::Void, source, position);
    }

    fn call_runtime(
        &self,
        body: &mut MutableBody,
        routine: RoutineId,
        args: Vec<Operand>,
        source: &mut SourceInstruction,
        position: InsertPosition,
    ) -> ValueId {
        body.add_call(routine, args, Type::Ptr, source, position).unwrap()
    }

    fn bind(&mut self, value: ValueId, expr: SymExpr) {
        self.output.exprs.insert(value, expr);
    }
}

fn result(inst: &Instruction) -> ValueId {
    inst.result.expect("Expected a value producing instruction")
}
