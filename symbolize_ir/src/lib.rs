// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! This crate contains the SSA representation that the symbolic instrumentation engine consumes.
//!
//! The representation mirrors the subset of a host compiler IR that the engine needs:
//! 1. [CompilationUnit] is the translation unit. It owns a routine table and the global
//!    constructor / destructor hook lists.
//! 2. [Routine] is either an external declaration or a defined routine with a [Procedure] body.
//! 3. [Procedure] is an ordered list of [BasicBlock]s. Block 0 is the entry block, and every
//!    SSA value produced in the procedure is declared in its value table.
//!
//! Calls reference routines by [RoutineId], so renaming a routine in the table rebinds every
//! call site at once.
//!
//! Besides the data structures, the crate provides a few utilities built on top of them:
//! [cfg] for control-flow queries, [verify] for structural well-formedness checks,
//! [builder] to assemble procedures, and [eval] which runs procedures concretely.

pub mod builder;
pub mod cfg;
mod display;
pub mod eval;
mod ir;
pub mod verify;

pub use ir::*;
