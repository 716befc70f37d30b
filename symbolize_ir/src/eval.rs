// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A concrete interpreter for compilation units.
//!
//! Routines with a body are interpreted. Calls to declarations are forwarded to an
//! [ExternalRoutines] implementation, which lets tests plug in a runtime that records
//! the calls it receives.

use crate::{
    BinOp, BlockId, CastOp, CmpPredicate, CompilationUnit, Constant, HookEntry, InstKind,
    Instruction, Operand, Procedure, Terminator, Type, ValueId,
};
use itertools::Itertools;
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Default bound on the number of executed instructions.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

const STACK_BASE: u64 = 0x1000;
const STACK_ALIGN: u64 = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("no routine named `{0}`")]
    UnknownRoutine(String),
    #[error("`{0}` is not provided by the external routines")]
    UnknownExternal(String),
    #[error("`{name}` expects {expected} arguments, found {found}")]
    Arity { name: String, expected: usize, found: usize },
    #[error("value {0} read before being assigned")]
    UnassignedValue(ValueId),
    #[error("invalid access of {size} bytes at {address:#x}")]
    InvalidAccess { address: u64, size: u64 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("shift amount {amount} exceeds width {width}")]
    ShiftOverflow { amount: u64, width: u32 },
    #[error("no incoming value from {pred:?} in {bb}")]
    MissingIncoming { bb: BlockId, pred: Option<BlockId> },
    #[error("reached unreachable code in {0}")]
    Unreachable(BlockId),
    #[error("cannot evaluate `{0}`")]
    Unsupported(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("step limit of {0} instructions exceeded")]
    StepLimit(usize),
}

/// A runtime value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtValue {
    Int { value: u64, width: u32 },
    Ptr(u64),
}

impl RtValue {
    /// Build an integer, truncating `value` to `width` bits.
    pub fn int(value: u64, width: u32) -> RtValue {
        RtValue::Int { value: mask(value, width), width }
    }

    pub fn bool(value: bool) -> RtValue {
        RtValue::Int { value: value as u64, width: 1 }
    }

    pub fn null() -> RtValue {
        RtValue::Ptr(0)
    }

    /// The raw bits of the value.
    pub fn bits(&self) -> u64 {
        match self {
            RtValue::Int { value, .. } => *value,
            RtValue::Ptr(address) => *address,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == RtValue::Ptr(0)
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            RtValue::Int { value, width: 1 } => Ok(*value != 0),
            _ => Err(EvalError::TypeError(format!("expected i1, found {self:?}"))),
        }
    }

    fn int_parts(&self) -> Result<(u64, u32), EvalError> {
        match self {
            RtValue::Int { value, width } => Ok((*value, *width)),
            RtValue::Ptr(_) => Err(EvalError::TypeError(format!("expected integer, found {self:?}"))),
        }
    }
}

/// Routines the interpreter cannot execute itself.
pub trait ExternalRoutines {
    /// Execute the routine `name`. Returns `None` for routines that return nothing.
    fn call(&mut self, name: &str, args: &[RtValue]) -> Result<Option<RtValue>, EvalError>;
}

/// Byte addressable memory with a bump allocator for stack slots.
#[derive(Debug, Default)]
pub struct Memory {
    bytes: HashMap<u64, u8>,
    next: u64,
}

impl Memory {
    pub fn allocate(&mut self, size: u64) -> u64 {
        if self.next == 0 {
            self.next = STACK_BASE;
        }
        let address = self.next;
        for offset in 0..size {
            self.bytes.insert(address + offset, 0);
        }
        self.next = (address + size.max(1)).next_multiple_of(STACK_ALIGN);
        address
    }

    pub fn read(&self, address: u64, size: u64) -> Result<u64, EvalError> {
        let mut result = 0u64;
        for offset in (0..size).rev() {
            let byte = self
                .bytes
                .get(&address.wrapping_add(offset))
                .ok_or(EvalError::InvalidAccess { address, size })?;
            result = (result << 8) | *byte as u64;
        }
        Ok(result)
    }

    pub fn write(&mut self, address: u64, size: u64, value: u64) -> Result<(), EvalError> {
        for offset in 0..size {
            let slot = self
                .bytes
                .get_mut(&address.wrapping_add(offset))
                .ok_or(EvalError::InvalidAccess { address, size })?;
            *slot = (value >> (8 * offset)) as u8;
        }
        Ok(())
    }
}

pub struct Interpreter<'a, E: ExternalRoutines> {
    unit: &'a CompilationUnit,
    externals: E,
    memory: Memory,
    steps: usize,
    step_limit: usize,
}

impl<'a, E: ExternalRoutines> Interpreter<'a, E> {
    pub fn new(unit: &'a CompilationUnit, externals: E) -> Self {
        Interpreter {
            unit,
            externals,
            memory: Memory::default(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    pub fn externals(&self) -> &E {
        &self.externals
    }

    pub fn into_externals(self) -> E {
        self.externals
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Run the global constructors in ascending priority.
    pub fn run_ctors(&mut self) -> Result<(), EvalError> {
        let unit = self.unit;
        self.run_hooks(&unit.global_ctors)
    }

    /// Run the global destructors in ascending priority.
    pub fn run_dtors(&mut self) -> Result<(), EvalError> {
        let unit = self.unit;
        self.run_hooks(&unit.global_dtors)
    }

    fn run_hooks(&mut self, hooks: &'a [HookEntry]) -> Result<(), EvalError> {
        let unit = self.unit;
        for hook in hooks.iter().sorted_by_key(|hook| hook.priority) {
            self.call_routine(&unit.routine(hook.routine).name, &[])?;
        }
        Ok(())
    }

    /// Call a routine by name. Declarations are forwarded to the external routines.
    pub fn call_routine(&mut self, name: &str, args: &[RtValue]) -> Result<Option<RtValue>, EvalError> {
        let unit = self.unit;
        let id = unit.find_routine(name).ok_or_else(|| EvalError::UnknownRoutine(name.to_string()))?;
        let routine = unit.routine(id);
        trace!(name, ?args, "call_routine");
        let result = match &routine.body {
            Some(body) => self.run_procedure(name, body, args)?,
            None => self.externals.call(name, args)?,
        };
        match (result, routine.signature.ret) {
            (None, Type::Void) | (Some(_), _) => Ok(result),
            (None, _) => Err(EvalError::TypeError(format!("`{name}` did not return a value"))),
        }
    }

    fn run_procedure(
        &mut self,
        name: &str,
        procedure: &Procedure,
        args: &[RtValue],
    ) -> Result<Option<RtValue>, EvalError> {
        if args.len() != procedure.params.len() {
            return Err(EvalError::Arity {
                name: name.to_string(),
                expected: procedure.params.len(),
                found: args.len(),
            });
        }
        let mut frame = Frame { values: vec![None; procedure.values.len()] };
        for (param, arg) in procedure.params.iter().zip(args) {
            frame.values[param.index()] = Some(*arg);
        }

        let mut bb = BlockId::ENTRY;
        let mut pred: Option<BlockId> = None;
        loop {
            let block = procedure.block(bb);
            let phi_count = block.phi_count();
            // Phis read the values live on the incoming edge, so evaluate all before assigning.
            let phi_values = block.instructions[..phi_count]
                .iter()
                .map(|inst| {
                    let InstKind::Phi { incoming } = &inst.kind else { unreachable!() };
                    let operand = incoming
                        .iter()
                        .find(|(from, _)| Some(*from) == pred)
                        .map(|(_, operand)| operand)
                        .ok_or(EvalError::MissingIncoming { bb, pred })?;
                    frame.operand(operand)
                })
                .collect::<Result<Vec<_>, _>>()?;
            for (inst, value) in block.instructions.iter().zip(phi_values) {
                frame.assign(inst, value);
            }
            for inst in &block.instructions[phi_count..] {
                self.step()?;
                self.execute(procedure, &mut frame, inst)?;
            }
            self.step()?;
            match &block.terminator {
                Terminator::Goto { target } => {
                    pred = Some(bb);
                    bb = *target;
                }
                Terminator::Branch { cond, then_bb, else_bb } => {
                    pred = Some(bb);
                    bb = if frame.operand(cond)?.as_bool()? { *then_bb } else { *else_bb };
                }
                Terminator::Return { value } => {
                    return value.as_ref().map(|value| frame.operand(value)).transpose();
                }
                Terminator::Unreachable => return Err(EvalError::Unreachable(bb)),
            }
        }
    }

    fn step(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(EvalError::StepLimit(self.step_limit));
        }
        Ok(())
    }

    fn execute(
        &mut self,
        procedure: &Procedure,
        frame: &mut Frame,
        inst: &Instruction,
    ) -> Result<(), EvalError> {
        let result_ty = inst.result.map(|value| procedure.value_ty(value));
        let value = match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => {
                Some(binary(*op, frame.operand(lhs)?, frame.operand(rhs)?)?)
            }
            InstKind::Compare { pred, lhs, rhs } => {
                Some(compare(*pred, frame.operand(lhs)?, frame.operand(rhs)?)?)
            }
            InstKind::Cast { op, value } => {
                let to = result_ty.ok_or_else(|| EvalError::Unsupported(inst.to_string()))?;
                Some(cast(*op, frame.operand(value)?, to)?)
            }
            InstKind::Select { cond, if_true, if_false } => {
                let chosen = if frame.operand(cond)?.as_bool()? { if_true } else { if_false };
                Some(frame.operand(chosen)?)
            }
            InstKind::Alloca { size } => Some(RtValue::Ptr(self.memory.allocate(*size))),
            InstKind::Load { ptr } => {
                let address = frame.operand(ptr)?.bits();
                let ty = result_ty.ok_or_else(|| EvalError::Unsupported(inst.to_string()))?;
                let bits = self.memory.read(address, ty.byte_size())?;
                Some(from_bits(bits, ty))
            }
            InstKind::Store { ptr, value } => {
                let address = frame.operand(ptr)?.bits();
                let size = procedure.operand_ty(value).byte_size();
                let value = frame.operand(value)?;
                self.memory.write(address, size, value.bits())?;
                None
            }
            InstKind::PtrOffset { base, offset } => {
                let (offset, width) = frame.operand(offset)?.int_parts()?;
                let base = frame.operand(base)?.bits();
                Some(RtValue::Ptr(base.wrapping_add(sign_extend(offset, width) as u64)))
            }
            InstKind::Call { callee, args } => {
                let args = args.iter().map(|arg| frame.operand(arg)).collect::<Result<Vec<_>, _>>()?;
                let name = self.unit.routine(*callee).name.clone();
                self.call_routine(&name, &args)?
            }
            InstKind::Phi { .. } | InstKind::Opaque { .. } => {
                return Err(EvalError::Unsupported(inst.to_string()));
            }
        };
        if let (Some(value), Some(_)) = (value, inst.result) {
            frame.assign(inst, value);
        }
        Ok(())
    }
}

struct Frame {
    values: Vec<Option<RtValue>>,
}

impl Frame {
    fn operand(&self, operand: &Operand) -> Result<RtValue, EvalError> {
        match operand {
            Operand::Value(value) => self
                .values
                .get(value.index())
                .copied()
                .flatten()
                .ok_or(EvalError::UnassignedValue(*value)),
            Operand::Const(Constant::Int { value, width }) => Ok(RtValue::int(*value, *width)),
            Operand::Const(Constant::Null) => Ok(RtValue::null()),
        }
    }

    fn assign(&mut self, inst: &Instruction, value: RtValue) {
        if let Some(result) = inst.result {
            self.values[result.index()] = Some(value);
        }
    }
}

fn mask(value: u64, width: u32) -> u64 {
    if width >= 64 { value } else { value & ((1u64 << width) - 1) }
}

fn sign_extend(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

fn from_bits(bits: u64, ty: Type) -> RtValue {
    match ty {
        Type::Ptr => RtValue::Ptr(bits),
        Type::Int { width } => RtValue::int(bits, width),
        Type::Void => unreachable!("void values are never loaded"),
    }
}

fn binary(op: BinOp, lhs: RtValue, rhs: RtValue) -> Result<RtValue, EvalError> {
    let (a, width) = lhs.int_parts()?;
    let (b, _) = rhs.int_parts()?;
    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));
    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::UDiv | BinOp::SDiv | BinOp::URem | BinOp::SRem if b == 0 => {
            return Err(EvalError::DivisionByZero);
        }
        BinOp::UDiv => a / b,
        BinOp::SDiv => sa.wrapping_div(sb) as u64,
        BinOp::URem => a % b,
        BinOp::SRem => sa.wrapping_rem(sb) as u64,
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl | BinOp::LShr | BinOp::AShr if b >= width as u64 => {
            return Err(EvalError::ShiftOverflow { amount: b, width });
        }
        BinOp::Shl => a << b,
        BinOp::LShr => a >> b,
        BinOp::AShr => (sa >> b) as u64,
    };
    Ok(RtValue::int(value, width))
}

fn compare(pred: CmpPredicate, lhs: RtValue, rhs: RtValue) -> Result<RtValue, EvalError> {
    let width = match lhs {
        RtValue::Int { width, .. } => width,
        RtValue::Ptr(_) => 64,
    };
    let (a, b) = (lhs.bits(), rhs.bits());
    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));
    let result = match pred {
        CmpPredicate::Eq => a == b,
        CmpPredicate::Ne => a != b,
        CmpPredicate::Ult => a < b,
        CmpPredicate::Ule => a <= b,
        CmpPredicate::Ugt => a > b,
        CmpPredicate::Uge => a >= b,
        CmpPredicate::Slt => sa < sb,
        CmpPredicate::Sle => sa <= sb,
        CmpPredicate::Sgt => sa > sb,
        CmpPredicate::Sge => sa >= sb,
    };
    Ok(RtValue::bool(result))
}

fn cast(op: CastOp, value: RtValue, to: Type) -> Result<RtValue, EvalError> {
    let to_width = to.bit_width().unwrap_or(0);
    Ok(match (op, value) {
        (CastOp::ZExt | CastOp::Trunc, RtValue::Int { value, .. }) => RtValue::int(value, to_width),
        (CastOp::SExt, RtValue::Int { value, width }) => {
            RtValue::int(sign_extend(value, width) as u64, to_width)
        }
        (CastOp::PtrToInt, RtValue::Ptr(address)) => RtValue::int(address, to_width),
        (CastOp::IntToPtr, RtValue::Int { value, .. }) => RtValue::Ptr(value),
        (CastOp::BitCast, value) => from_bits(value.bits(), to),
        (op, value) => {
            return Err(EvalError::TypeError(format!("cannot {op} {value:?} to {to}")));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProcedureBuilder;
    use crate::{Routine, Signature};

    /// External routines that remember every call and return a fixed value.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, Vec<RtValue>)>,
    }

    impl ExternalRoutines for Recorder {
        fn call(&mut self, name: &str, args: &[RtValue]) -> Result<Option<RtValue>, EvalError> {
            self.calls.push((name.to_string(), args.to_vec()));
            match name {
                "get_input" => Ok(Some(RtValue::int(42, 32))),
                "record" => Ok(None),
                _ => Err(EvalError::UnknownExternal(name.to_string())),
            }
        }
    }

    fn unit_with(name: &str, signature: Signature, body: Procedure) -> CompilationUnit {
        let mut unit = CompilationUnit::new("eval.c");
        unit.routines.push(Routine { name: name.to_string(), signature, body: Some(body) });
        unit
    }

    /// sum(n) = 0 + 1 + .. + (n - 1)
    fn sum_procedure() -> Procedure {
        let mut builder = ProcedureBuilder::new(&[Type::i32()], Type::i32());
        let n = builder.param(0);
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        builder.goto(header);
        builder.switch_to(header);
        let i = builder.phi(Type::i32(), vec![(BlockId::ENTRY, Operand::int(0, 32))]);
        let acc = builder.phi(Type::i32(), vec![(BlockId::ENTRY, Operand::int(0, 32))]);
        let cond = builder.compare(CmpPredicate::Slt, i.into(), n.into());
        builder.branch(cond.into(), body, exit);
        builder.switch_to(body);
        let next_acc = builder.binary(BinOp::Add, acc.into(), i.into());
        let next_i = builder.binary(BinOp::Add, i.into(), Operand::int(1, 32));
        builder.goto(header);
        builder.switch_to(exit);
        builder.ret(Some(acc.into()));
        let mut procedure = builder.finish();
        for (idx, next) in [next_i, next_acc].into_iter().enumerate() {
            let InstKind::Phi { incoming } = &mut procedure.blocks[1].instructions[idx].kind else {
                unreachable!()
            };
            incoming.push((body, next.into()));
        }
        procedure
    }

    #[test]
    fn test_loop_with_phis() {
        let unit = unit_with("sum", Signature::new(vec![Type::i32()], Type::i32()), sum_procedure());
        let mut interpreter = Interpreter::new(&unit, Recorder::default());
        let result = interpreter.call_routine("sum", &[RtValue::int(5, 32)]).unwrap();
        assert_eq!(result, Some(RtValue::int(10, 32)));
    }

    #[test]
    fn test_step_limit() {
        let unit = unit_with("sum", Signature::new(vec![Type::i32()], Type::i32()), sum_procedure());
        let mut interpreter = Interpreter::new(&unit, Recorder::default()).with_step_limit(20);
        let result = interpreter.call_routine("sum", &[RtValue::int(1000, 32)]);
        assert_eq!(result, Err(EvalError::StepLimit(20)));
    }

    #[test]
    fn test_memory_and_externals() {
        let mut unit = CompilationUnit::new("eval.c");
        let get_input =
            unit.add_routine("get_input", Signature::new(vec![], Type::i32()), None).unwrap();
        let record =
            unit.add_routine("record", Signature::new(vec![Type::i64()], Type::Void), None).unwrap();
        let mut builder = ProcedureBuilder::new(&[], Type::i64());
        let slot = builder.alloca(4);
        let input = builder.call(get_input, vec![], Type::i32()).unwrap();
        builder.store(slot.into(), input.into());
        let loaded = builder.load(slot.into(), Type::i32());
        let wide = builder.cast(CastOp::SExt, loaded.into(), Type::i64());
        let negated = builder.binary(BinOp::Sub, Operand::int(0, 64), wide.into());
        builder.call(record, vec![negated.into()], Type::Void);
        builder.ret(Some(negated.into()));
        unit.add_routine("main", Signature::new(vec![], Type::i64()), Some(builder.finish())).unwrap();

        let mut interpreter = Interpreter::new(&unit, Recorder::default());
        let result = interpreter.call_routine("main", &[]).unwrap();
        assert_eq!(result, Some(RtValue::int(-42i64 as u64, 64)));
        let calls = interpreter.into_externals().calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ("record".to_string(), vec![RtValue::int(-42i64 as u64, 64)]));
    }

    #[test]
    fn test_invalid_access() {
        let mut builder = ProcedureBuilder::new(&[], Type::i8());
        let value = builder.load(Operand::null(), Type::i8());
        builder.ret(Some(value.into()));
        let unit = unit_with("main", Signature::new(vec![], Type::i8()), builder.finish());
        let mut interpreter = Interpreter::new(&unit, Recorder::default());
        let result = interpreter.call_routine("main", &[]);
        assert_eq!(result, Err(EvalError::InvalidAccess { address: 0, size: 1 }));
    }

    #[test]
    fn test_signed_arithmetic() {
        let minus_seven = RtValue::int(-7i64 as u64, 8);
        let two = RtValue::int(2, 8);
        assert_eq!(binary(BinOp::SDiv, minus_seven, two), Ok(RtValue::int(-3i64 as u64, 8)));
        assert_eq!(binary(BinOp::AShr, minus_seven, two), Ok(RtValue::int(-2i64 as u64, 8)));
        assert_eq!(compare(CmpPredicate::Slt, minus_seven, two), Ok(RtValue::bool(true)));
        assert_eq!(compare(CmpPredicate::Ult, minus_seven, two), Ok(RtValue::bool(false)));
        assert_eq!(binary(BinOp::URem, two, RtValue::int(0, 8)), Err(EvalError::DivisionByZero));
    }
}
