// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This module contains the typesafe representation of the host IR.

// There are a fair number of constructs in this module that are better maintained as
// explicit pattern matching versus using the `matches!` macro.
#![allow(clippy::match_like_matches_macro)]

mod inst;
mod operand;
mod procedure;
mod typ;
mod unit;

pub use inst::{BinOp, CastOp, CmpPredicate, InstKind, Instruction, Terminator};
pub use operand::{BlockId, Constant, Operand, RoutineId, ValueId};
pub use procedure::{BasicBlock, Procedure};
pub use typ::{Type, MAX_INT_WIDTH};
pub use unit::{CompilationUnit, HookEntry, IrError, Routine, Signature};
