// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! One-time setup of a compilation unit before any procedure gets symbolized.
//!
//! This redirects intercepted routines to their wrappers, declares the runtime interface
//! and installs the hooks that start and stop the runtime.

use crate::error::InstrumentError;
use crate::symbolize_middle::intercept::InterceptionTable;
use crate::symbolize_middle::runtime::Runtime;
use symbolize_ir::builder::ProcedureBuilder;
use symbolize_ir::{CompilationUnit, IrError, RoutineId, Signature, Type};
use tracing::{debug, warn};

/// Startup routine that initializes the runtime.
pub const CTOR_NAME: &str = "__sym_ctor";
/// Shutdown routine that tears the runtime down.
pub const DTOR_NAME: &str = "__sym_dtor";
pub const HOOK_PRIORITY: u32 = 0;

/// Prepare the unit for instrumentation and return the runtime interface.
///
/// The changes are made on a copy of the unit, so the unit is left unchanged on error.
pub fn initialize_unit(
    unit: &mut CompilationUnit,
    table: &InterceptionTable,
) -> Result<Runtime, InstrumentError> {
    let mut scratch = unit.clone();
    redirect_intercepted(&mut scratch, table);
    let runtime = Runtime::declare(&mut scratch)?;
    let ctor = add_hook(&mut scratch, CTOR_NAME, runtime.initialize)?;
    scratch.append_global_ctor(ctor, HOOK_PRIORITY);
    let dtor = add_hook(&mut scratch, DTOR_NAME, runtime.finalize)?;
    scratch.append_global_dtor(dtor, HOOK_PRIORITY);
    debug!(source = %scratch.source_file, ?ctor, ?dtor, "initialize_unit");
    *unit = scratch;
    Ok(runtime)
}

/// Rename every intercepted declaration to its wrapper and switch it to the wrapper ABI.
///
/// Returns the renamed routines. Routines whose wrapper name is already taken are left
/// alone.
pub fn redirect_intercepted(unit: &mut CompilationUnit, table: &InterceptionTable) -> Vec<RoutineId> {
    let candidates: Vec<_> = unit
        .routine_ids()
        .filter_map(|id| {
            let routine = unit.routine(id);
            let wrapper = table.wrapper_for(&routine.name)?;
            routine.is_declaration().then_some((id, wrapper))
        })
        .collect();
    let mut renamed = vec![];
    for (id, wrapper) in candidates {
        match unit.rename_routine(id, wrapper) {
            Ok(()) => {
                let routine = unit.routine_mut(id);
                routine.signature = wrapper_signature(&routine.signature);
                renamed.push(id);
            }
            Err(IrError::NameCollision(name)) => {
                warn!(
                    original = %unit.routine(id).name,
                    wrapper = %name,
                    "cannot intercept routine since its wrapper name is taken"
                );
            }
            Err(err) => unreachable!("unexpected rename failure: {err}"),
        }
    }
    renamed
}

/// Signature of the wrapper of a routine: every parameter is followed by its expression handle.
pub fn wrapper_signature(original: &Signature) -> Signature {
    Signature {
        params: original.params.iter().flat_map(|param| [*param, Type::Ptr]).collect(),
        ret: original.ret,
        variadic: original.variadic,
    }
}

fn add_hook(
    unit: &mut CompilationUnit,
    name: &str,
    runtime_routine: RoutineId,
) -> Result<RoutineId, IrError> {
    let mut builder = ProcedureBuilder::new(&[], Type::Void);
    builder.call(runtime_routine, vec![], Type::Void);
    builder.ret(None);
    unit.add_routine(name, Signature::new(vec![], Type::Void), Some(builder.finish()))
}
