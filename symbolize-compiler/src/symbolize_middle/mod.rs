// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! This module contains the symbolic instrumentation logic that is independent of how the
//! compilation unit was produced.

use std::convert::Infallible;
use std::env;

pub mod intercept;
pub mod module_init;
pub mod runtime;
pub mod transform;

/// Environment variable that enables pure concolic mode.
pub const PURE_CONCOLIC_ENV_VAR: &str = "SYMCC_PC";
/// Environment variable that enables the per-procedure diagnostics.
pub const VERBOSE_ENV_VAR: &str = "SYMCC_VERBOSE";

/// Instrumentation modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymbolizeOptions {
    /// Notify the runtime whenever a basic block is entered.
    pub pure_concolic: bool,
    /// Report every unit and procedure at `info` level instead of `debug`.
    pub verbose: bool,
}

impl SymbolizeOptions {
    /// Read the options from the environment, for hosts that embed the engine.
    pub fn from_env() -> Self {
        SymbolizeOptions {
            pure_concolic: env_flag(PURE_CONCOLIC_ENV_VAR),
            verbose: env_flag(VERBOSE_ENV_VAR),
        }
    }
}

/// A flag is set when the variable is defined with anything but a false-like value.
fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|value| parse_flag(&value).unwrap_or(false))
}

/// Parse a flag value. Empty strings and `0`, `false`, `no`, `off`, `n`, `f` in any case are
/// false, everything else is true. Shared by the command line and [SymbolizeOptions::from_env].
pub fn parse_flag(value: &str) -> Result<bool, Infallible> {
    Ok(!matches!(value.trim().to_lowercase().as_str(), "" | "0" | "false" | "no" | "off" | "n" | "f"))
}
