// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
//! This module is responsible for rewriting one procedure body.
//!
//! The transformations run in a fixed order: the main walk, the merge resolver, the
//! short-circuit rewriter and, in pure concolic mode, the block entry notifier. The notifier
//! runs last so blocks added by the short-circuit rewriter get a notification too.

use crate::symbolize_middle::intercept::InterceptionTable;
use crate::symbolize_middle::runtime::Runtime;
use crate::symbolize_middle::SymbolizeOptions;
use body::MutableBody;
use symbolize_ir::{BlockId, CompilationUnit, Procedure};
use symbolizer::{ExprMap, Symbolizer};
use tracing::debug;

pub mod block_notify;
pub mod body;
pub mod merge;
pub mod short_circuit;
pub mod symbolizer;

/// Identifier of a block in the events sent to the runtime: the procedure tag in the upper
/// 32 bits and the block index in the lower 32 bits.
pub fn site_id(site_tag: u64, bb: BlockId) -> u64 {
    site_tag << 32 | bb.0 as u64
}

/// A procedure with its instrumentation.
#[derive(Debug)]
pub struct InstrumentedBody {
    pub procedure: Procedure,
    /// The expression of every value of the original procedure.
    pub exprs: ExprMap,
    pub placeholders: usize,
    pub short_circuits: usize,
    pub blocks_added: usize,
}

/// Instrument one procedure of `unit`. The procedure must have been taken out of the unit.
pub fn instrument_body(
    procedure: Procedure,
    unit: &CompilationUnit,
    runtime: &Runtime,
    interception: &InterceptionTable,
    options: &SymbolizeOptions,
    site_tag: u64,
) -> InstrumentedBody {
    let mut body = MutableBody::from(procedure);
    let symbolized = Symbolizer::new(unit, runtime, interception, site_tag).symbolize(&mut body);
    let mut exprs = symbolized.exprs;
    merge::resolve_merges(&mut body, &exprs, &symbolized.placeholders);
    let candidates = &symbolized.candidates;
    let blocks_added =
        short_circuit::rewrite_short_circuits(&mut body, runtime, &mut exprs, candidates);
    if options.pure_concolic {
        block_notify::notify_block_entries(&mut body, runtime, site_tag);
    }
    debug!(
        values = exprs.len(),
        placeholders = symbolized.placeholders.len(),
        short_circuits = symbolized.candidates.len(),
        blocks_added,
        "instrument_body"
    );
    InstrumentedBody {
        procedure: body.into(),
        exprs,
        placeholders: symbolized.placeholders.len(),
        short_circuits: symbolized.candidates.len(),
        blocks_added,
    }
}
