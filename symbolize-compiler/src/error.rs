// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors that abort the instrumentation of a compilation unit.
//!
//! Constructs the engine does not model are not errors. They lose their symbolic
//! counterpart and the instrumentation continues.

use symbolize_ir::verify::VerifyError;
use symbolize_ir::IrError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstrumentError {
    /// The runtime interface or the startup hooks could not be installed.
    #[error("cannot configure the symbolic runtime")]
    Configuration(#[from] IrError),
    /// The rewritten procedure is not well formed.
    #[error("instrumentation of `{procedure}` produced an invalid procedure")]
    InvalidProcedure {
        procedure: String,
        #[source]
        source: VerifyError,
    },
}
