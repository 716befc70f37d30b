// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entry points used by a host compiler: [SymbolizePass::init] once per compilation unit and
//! [SymbolizePass::run] once per procedure.

use crate::error::InstrumentError;
use crate::symbolize_middle::intercept::InterceptionTable;
use crate::symbolize_middle::module_init::{self, CTOR_NAME, DTOR_NAME};
use crate::symbolize_middle::runtime::Runtime;
use crate::symbolize_middle::transform::symbolizer::ExprMap;
use crate::symbolize_middle::transform::{self, InstrumentedBody};
use crate::symbolize_middle::SymbolizeOptions;
use rand::Rng;
use symbolize_ir::verify::verify_procedure;
use symbolize_ir::{CompilationUnit, Routine, RoutineId};
use tracing::{debug, info, trace, warn};

/// Routines whose name contains this marker are coverage callbacks and are never instrumented.
const COVERAGE_CALLBACK_MARKER: &str = "sanitizer_cov_trace";

/// Range of the random tag that identifies the blocks of a procedure in runtime events.
const SITE_TAG_RANGE: std::ops::RangeInclusive<u64> = 1..=1_000_000_000;

/// Summary of the instrumentation of one procedure.
#[derive(Debug)]
pub struct ProcedureReport {
    pub routine: RoutineId,
    pub name: String,
    pub arguments: usize,
    pub site_tag: u64,
    pub exprs: ExprMap,
    pub placeholders: usize,
    pub short_circuits: usize,
    pub blocks_added: usize,
}

/// Summary of the instrumentation of a compilation unit.
#[derive(Debug, Default)]
pub struct UnitReport {
    pub procedures: Vec<ProcedureReport>,
    pub skipped: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SymbolizePass {
    options: SymbolizeOptions,
    interception: InterceptionTable,
}

impl SymbolizePass {
    pub fn new(options: SymbolizeOptions) -> Self {
        SymbolizePass { options, interception: InterceptionTable::default() }
    }

    /// Use a different interception table.
    pub fn with_interception(mut self, interception: InterceptionTable) -> Self {
        self.interception = interception;
        self
    }

    pub fn options(&self) -> &SymbolizeOptions {
        &self.options
    }

    /// Prepare the unit. Must run once before any procedure of the unit is instrumented.
    pub fn init(&self, unit: &mut CompilationUnit) -> Result<Runtime, InstrumentError> {
        if self.options.verbose {
            info!(source = %unit.source_file, "analysing");
        } else {
            debug!(source = %unit.source_file, "analysing");
        }
        if self.options.pure_concolic {
            debug!("instrumenting for pure concolic execution");
        }
        module_init::initialize_unit(unit, &self.interception)
    }

    /// Instrument one procedure. Returns `None` for routines that are not instrumented.
    pub fn run(
        &self,
        unit: &mut CompilationUnit,
        routine: RoutineId,
    ) -> Result<Option<ProcedureReport>, InstrumentError> {
        if is_skipped(unit.routine(routine)) {
            trace!(name = %unit.routine(routine).name, "skip routine");
            return Ok(None);
        }
        let runtime = Runtime::lookup(unit)?;
        let name = unit.routine(routine).name.clone();
        let Some(procedure) = unit.routine_mut(routine).body.take() else { return Ok(None) };
        let arguments = procedure.params.len();
        if self.options.verbose {
            info!(%name, arguments, "symbolizing");
        } else {
            debug!(%name, arguments, "symbolizing");
        }

        let site_tag = rand::thread_rng().gen_range(SITE_TAG_RANGE);
        let original = procedure.clone();
        let InstrumentedBody { procedure, exprs, placeholders, short_circuits, blocks_added } =
            transform::instrument_body(
                procedure,
                unit,
                &runtime,
                &self.interception,
                &self.options,
                site_tag,
            );
        if let Err(source) = verify_procedure(unit, &procedure) {
            unit.routine_mut(routine).body = Some(original);
            return Err(InstrumentError::InvalidProcedure { procedure: name, source });
        }
        unit.routine_mut(routine).body = Some(procedure);
        Ok(Some(ProcedureReport {
            routine,
            name,
            arguments,
            site_tag,
            exprs,
            placeholders,
            short_circuits,
            blocks_added,
        }))
    }

    /// Initialize the unit and instrument every procedure.
    ///
    /// The unit is only updated if every procedure was instrumented.
    pub fn run_unit(&self, unit: &mut CompilationUnit) -> Result<UnitReport, InstrumentError> {
        let mut scratch = unit.clone();
        self.init(&mut scratch)?;
        let mut report = UnitReport::default();
        let routines: Vec<_> = scratch.routine_ids().collect();
        for routine in routines {
            match self.run(&mut scratch, routine)? {
                Some(procedure) => report.procedures.push(procedure),
                None if !scratch.routine(routine).is_declaration() => {
                    report.skipped.push(scratch.routine(routine).name.clone())
                }
                None => {}
            }
        }
        *unit = scratch;
        Ok(report)
    }

    /// Like [SymbolizePass::run_unit], but when `allow_uninstrumented` is set a failure keeps the
    /// unit unchanged and returns `None` instead of an error.
    pub fn run_unit_or_keep(
        &self,
        unit: &mut CompilationUnit,
        allow_uninstrumented: bool,
    ) -> Result<Option<UnitReport>, InstrumentError> {
        match self.run_unit(unit) {
            Ok(report) => Ok(Some(report)),
            Err(err) if allow_uninstrumented => {
                warn!(%err, source = %unit.source_file, "keeping the unit without instrumentation");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// The startup and shutdown hooks, coverage callbacks and declarations are not instrumented.
fn is_skipped(routine: &Routine) -> bool {
    routine.is_declaration()
        || routine.name == CTOR_NAME
        || routine.name == DTOR_NAME
        || routine.name.contains(COVERAGE_CALLBACK_MARKER)
}
