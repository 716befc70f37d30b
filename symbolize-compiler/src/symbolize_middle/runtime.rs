// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! Interface of the symbolic runtime library: routine names, signatures and the
//! encoding of the operation tags passed to the expression builder.

use strum_macros::{AsRefStr, Display, EnumIter, FromRepr};
use symbolize_ir::{
    BinOp, CastOp, CmpPredicate, CompilationUnit, IrError, Operand, RoutineId, Signature, Type,
};

pub const BUILD_EXPR: &str = "_sym_build_expr";
pub const GET_PARAMETER_EXPRESSION: &str = "_sym_get_parameter_expression";
pub const GET_RETURN_EXPRESSION: &str = "_sym_get_return_expression";
pub const READ_MEMORY: &str = "_sym_read_memory";
pub const WRITE_MEMORY: &str = "_sym_write_memory";
pub const PUSH_PATH_CONSTRAINT: &str = "_sym_push_path_constraint";
pub const NOTIFY_BASIC_BLOCK: &str = "_sym_notify_basic_block";
pub const INITIALIZE: &str = "_sym_initialize";
pub const FINALIZE: &str = "_sym_finalize";

/// The runtime routines declared in a compilation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Runtime {
    pub build_expr: RoutineId,
    pub get_parameter_expression: RoutineId,
    pub get_return_expression: RoutineId,
    pub read_memory: RoutineId,
    pub write_memory: RoutineId,
    pub push_path_constraint: RoutineId,
    pub notify_basic_block: RoutineId,
    pub initialize: RoutineId,
    pub finalize: RoutineId,
}

/// Name and signature of every runtime routine.
pub fn runtime_signatures() -> [(&'static str, Signature); 9] {
    [
        (BUILD_EXPR, Signature::variadic(vec![Type::i32()], Type::Ptr)),
        (GET_PARAMETER_EXPRESSION, Signature::new(vec![Type::i8()], Type::Ptr)),
        (GET_RETURN_EXPRESSION, Signature::new(vec![], Type::Ptr)),
        (READ_MEMORY, Signature::new(vec![Type::Ptr, Type::i64()], Type::Ptr)),
        (WRITE_MEMORY, Signature::new(vec![Type::Ptr, Type::i64(), Type::Ptr], Type::Void)),
        (PUSH_PATH_CONSTRAINT, Signature::new(vec![Type::Ptr, Type::bool(), Type::i64()], Type::Void)),
        (NOTIFY_BASIC_BLOCK, Signature::new(vec![Type::i64()], Type::Void)),
        (INITIALIZE, Signature::new(vec![], Type::Void)),
        (FINALIZE, Signature::new(vec![], Type::Void)),
    ]
}

impl Runtime {
    /// Declare the runtime routines, reusing existing declarations with the same signature.
    pub fn declare(unit: &mut CompilationUnit) -> Result<Runtime, IrError> {
        let [b, p, r, rm, wm, pc, nb, i, f] =
            runtime_signatures().map(|(name, sig)| unit.get_or_declare(name, sig));
        Ok(Runtime {
            build_expr: b?,
            get_parameter_expression: p?,
            get_return_expression: r?,
            read_memory: rm?,
            write_memory: wm?,
            push_path_constraint: pc?,
            notify_basic_block: nb?,
            initialize: i?,
            finalize: f?,
        })
    }

    /// Find the runtime routines of a unit that was already initialized.
    pub fn lookup(unit: &CompilationUnit) -> Result<Runtime, IrError> {
        let find = |name: &str| {
            unit.find_routine(name).ok_or_else(|| IrError::UnknownRoutine(name.to_string()))
        };
        Ok(Runtime {
            build_expr: find(BUILD_EXPR)?,
            get_parameter_expression: find(GET_PARAMETER_EXPRESSION)?,
            get_return_expression: find(GET_RETURN_EXPRESSION)?,
            read_memory: find(READ_MEMORY)?,
            write_memory: find(WRITE_MEMORY)?,
            push_path_constraint: find(PUSH_PATH_CONSTRAINT)?,
            notify_basic_block: find(NOTIFY_BASIC_BLOCK)?,
            initialize: find(INITIALIZE)?,
            finalize: find(FINALIZE)?,
        })
    }

    pub fn contains(&self, routine: RoutineId) -> bool {
        [
            self.build_expr,
            self.get_parameter_expression,
            self.get_return_expression,
            self.read_memory,
            self.write_memory,
            self.push_path_constraint,
            self.notify_basic_block,
            self.initialize,
            self.finalize,
        ]
        .contains(&routine)
    }
}

/// The operation an expression node represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, FromRepr)]
#[repr(u16)]
pub enum ExprKind {
    Add = 1,
    Sub,
    Mul,
    UnsignedDiv,
    SignedDiv,
    UnsignedRem,
    SignedRem,
    And,
    Or,
    Xor,
    ShiftLeft,
    LogicalShiftRight,
    ArithmeticShiftRight,
    Equal,
    NotEqual,
    UnsignedLessThan,
    UnsignedLessEqual,
    UnsignedGreaterThan,
    UnsignedGreaterEqual,
    SignedLessThan,
    SignedLessEqual,
    SignedGreaterThan,
    SignedGreaterEqual,
    ZeroExtend,
    SignExtend,
    Truncate,
    PtrToInt,
    IntToPtr,
    BitCast,
    PtrAdd,
    LogicalAnd,
    LogicalOr,
}

impl From<BinOp> for ExprKind {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Add => ExprKind::Add,
            BinOp::Sub => ExprKind::Sub,
            BinOp::Mul => ExprKind::Mul,
            BinOp::UDiv => ExprKind::UnsignedDiv,
            BinOp::SDiv => ExprKind::SignedDiv,
            BinOp::URem => ExprKind::UnsignedRem,
            BinOp::SRem => ExprKind::SignedRem,
            BinOp::And => ExprKind::And,
            BinOp::Or => ExprKind::Or,
            BinOp::Xor => ExprKind::Xor,
            BinOp::Shl => ExprKind::ShiftLeft,
            BinOp::LShr => ExprKind::LogicalShiftRight,
            BinOp::AShr => ExprKind::ArithmeticShiftRight,
        }
    }
}

impl From<CmpPredicate> for ExprKind {
    fn from(pred: CmpPredicate) -> Self {
        match pred {
            CmpPredicate::Eq => ExprKind::Equal,
            CmpPredicate::Ne => ExprKind::NotEqual,
            CmpPredicate::Ult => ExprKind::UnsignedLessThan,
            CmpPredicate::Ule => ExprKind::UnsignedLessEqual,
            CmpPredicate::Ugt => ExprKind::UnsignedGreaterThan,
            CmpPredicate::Uge => ExprKind::UnsignedGreaterEqual,
            CmpPredicate::Slt => ExprKind::SignedLessThan,
            CmpPredicate::Sle => ExprKind::SignedLessEqual,
            CmpPredicate::Sgt => ExprKind::SignedGreaterThan,
            CmpPredicate::Sge => ExprKind::SignedGreaterEqual,
        }
    }
}

impl From<CastOp> for ExprKind {
    fn from(op: CastOp) -> Self {
        match op {
            CastOp::ZExt => ExprKind::ZeroExtend,
            CastOp::SExt => ExprKind::SignExtend,
            CastOp::Trunc => ExprKind::Truncate,
            CastOp::PtrToInt => ExprKind::PtrToInt,
            CastOp::IntToPtr => ExprKind::IntToPtr,
            CastOp::BitCast => ExprKind::BitCast,
        }
    }
}

/// First argument of `_sym_build_expr`: the operation in the upper 16 bits and the bit width
/// of the result in the lower 16 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeTag {
    pub kind: ExprKind,
    pub width: u16,
}

impl OpcodeTag {
    /// Tag of an expression producing a value of `result_ty`, or `None` if the width does not
    /// fit in the tag.
    pub fn new(kind: ExprKind, result_ty: Type) -> Option<Self> {
        let width = u16::try_from(result_ty.bit_width().unwrap_or(0)).ok()?;
        Some(OpcodeTag { kind, width })
    }

    pub fn encode(self) -> u32 {
        (self.kind as u32) << 16 | self.width as u32
    }

    pub fn decode(raw: u32) -> Option<OpcodeTag> {
        let kind = ExprKind::from_repr((raw >> 16) as u16)?;
        Some(OpcodeTag { kind, width: raw as u16 })
    }

    pub fn operand(self) -> Operand {
        Operand::int(self.encode() as u64, 32)
    }
}
