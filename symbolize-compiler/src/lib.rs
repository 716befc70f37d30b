// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compile-time instrumentation for concolic execution.
//!
//! Every value computed by a procedure is paired with a handle to a symbolic expression owned by
//! a runtime library. The instrumented program calls into that runtime to build expressions,
//! shadow memory, record branch outcomes and exchange expressions with wrapped library routines.

pub mod args;
pub mod error;
pub mod session;
pub mod symbolize_middle;
pub mod symbolize_pass;
#[cfg(test)]
mod test_utils;

pub use error::InstrumentError;
pub use symbolize_middle::SymbolizeOptions;
pub use symbolize_pass::SymbolizePass;
