// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Command line interface of the instrumentation driver.

use crate::symbolize_middle::{
    parse_flag, SymbolizeOptions, PURE_CONCOLIC_ENV_VAR, VERBOSE_ENV_VAR,
};
use clap::ArgAction;
use std::path::PathBuf;

#[derive(Debug, Default, Clone, clap::Parser)]
#[command(name = "symbolize-compiler", version, about = "Instrument a compilation unit")]
pub struct Arguments {
    /// The compilation unit to instrument, in JSON format.
    pub input: PathBuf,
    /// Where to write the instrumented unit. Defaults to the standard output.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Notify the runtime whenever a basic block is entered.
    #[arg(
        long,
        env = PURE_CONCOLIC_ENV_VAR,
        action = ArgAction::SetTrue,
        value_parser = parse_flag
    )]
    pub pure_concolic: bool,
    /// Report the unit and every symbolized procedure.
    #[arg(
        long, short,
        env = VERBOSE_ENV_VAR,
        action = ArgAction::SetTrue,
        value_parser = parse_flag
    )]
    pub verbose: bool,
    /// Filter directive added to the logger, e.g. `debug` or `symbolize_compiler=trace`.
    #[arg(long)]
    pub log_level: Option<String>,
    /// Print the logs in JSON format.
    #[arg(long)]
    pub json_logs: bool,
    /// Print the instrumented unit in textual form.
    #[arg(long)]
    pub dump_ir: bool,
    /// Write the unit unchanged if instrumentation fails instead of aborting.
    #[arg(long)]
    pub allow_uninstrumented: bool,
}

impl Arguments {
    pub fn options(&self) -> SymbolizeOptions {
        SymbolizeOptions { pure_concolic: self.pure_concolic, verbose: self.verbose }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let args = Arguments::try_parse_from(["symbolize-compiler", "unit.json"]).unwrap();
        assert_eq!(args.input, PathBuf::from("unit.json"));
        assert_eq!(args.output, None);
        assert!(!args.dump_ir);
        assert!(!args.allow_uninstrumented);
    }

    #[test]
    fn test_options() {
        let args = Arguments::try_parse_from([
            "symbolize-compiler",
            "unit.json",
            "--pure-concolic",
            "--verbose",
            "--output",
            "out.json",
        ])
        .unwrap();
        assert_eq!(args.options(), SymbolizeOptions { pure_concolic: true, verbose: true });
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_flags_use_shared_parser() {
        let args =
            Arguments::try_parse_from(["symbolize-compiler", "unit.json", "--pure-concolic"])
                .unwrap();
        assert!(args.pure_concolic);
        assert!(Arguments::try_parse_from(["symbolize-compiler", "unit.json", "--verbose=off"])
            .is_err());
        assert_eq!(parse_flag("off"), Ok(false));
    }

    #[test]
    fn test_missing_input() {
        assert!(Arguments::try_parse_from(["symbolize-compiler"]).is_err());
    }
}
