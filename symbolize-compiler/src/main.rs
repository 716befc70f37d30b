// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instrument a serialized compilation unit and write the result.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use symbolize_compiler::args::Arguments;
use symbolize_compiler::{session, SymbolizePass};
use symbolize_ir::CompilationUnit;
use tracing::info;

fn main() -> ExitCode {
    let args = Arguments::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Arguments) -> Result<()> {
    session::init_session(args)?;
    let input = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read `{}`", args.input.display()))?;
    let mut unit: CompilationUnit = serde_json::from_str(&input)
        .with_context(|| format!("failed to parse `{}`", args.input.display()))?;

    let pass = SymbolizePass::new(args.options());
    let report = pass
        .run_unit_or_keep(&mut unit, args.allow_uninstrumented)
        .with_context(|| format!("failed to instrument `{}`", args.input.display()))?;
    if let Some(report) = report {
        info!(
            procedures = report.procedures.len(),
            skipped = report.skipped.len(),
            "instrumented unit"
        );
    }

    if args.dump_ir {
        eprintln!("{unit}");
    }
    let output = serde_json::to_string_pretty(&unit).context("failed to serialize the unit")?;
    match &args.output {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("failed to write `{}`", path.display()))?,
        None => writeln!(io::stdout().lock(), "{output}")?,
    }
    Ok(())
}
