// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Module used to configure an instrumentation session.

use crate::args::Arguments;
use anyhow::{Context, Result};
use std::panic;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Directive, layer::SubscriberExt, EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

/// Environment variable used to control this session log tracing.
const LOG_ENV_VAR: &str = "SYMCC_LOG";

// Custom panic hook.
#[allow(clippy::type_complexity)]
static PANIC_HOOK: LazyLock<Box<dyn Fn(&panic::PanicHookInfo<'_>) + Sync + Send + 'static>> =
    LazyLock::new(|| {
        let hook = panic::take_hook();
        panic::set_hook(Box::new(|info| {
            // Print stack trace.
            (*PANIC_HOOK)(info);
            eprintln!();
            eprintln!("symbolize-compiler unexpectedly panicked during instrumentation.");
            eprintln!("Rerun with `{LOG_ENV_VAR}=debug` and include the log in your report.");
        }));
        hook
    });

/// Initialize the session.
pub fn init_session(args: &Arguments) -> Result<()> {
    init_panic_hook();
    init_logger(args)
}

/// Initialize the logger using the SYMCC_LOG environment variable and the --log-level argument.
fn init_logger(args: &Arguments) -> Result<()> {
    let default_level = if args.verbose { LevelFilter::INFO } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();
    let filter = match &args.log_level {
        Some(log_level) => filter.add_directive(
            Directive::from_str(log_level)
                .with_context(|| format!("invalid log level `{log_level}`"))?,
        ),
        None => filter,
    };

    if args.json_logs { json_logs(filter) } else { hier_logs(filter) }
}

/// Configure global logger to use a json logger.
fn json_logs(filter: EnvFilter) -> Result<()> {
    use tracing_subscriber::fmt::layer;
    let subscriber = Registry::default().with(filter).with(layer().json());
    tracing::subscriber::set_global_default(subscriber).context("failed to install the logger")
}

/// Configure global logger to use a hierarchical view.
fn hier_logs(filter: EnvFilter) -> Result<()> {
    let use_colors = atty::is(atty::Stream::Stderr);
    let subscriber = Registry::default().with(filter);
    let subscriber = subscriber.with(
        HierarchicalLayer::default()
            .with_writer(std::io::stderr)
            .with_indent_lines(true)
            .with_ansi(use_colors)
            .with_targets(true)
            .with_verbose_exit(true)
            .with_indent_amount(4),
    );
    tracing::subscriber::set_global_default(subscriber).context("failed to install the logger")
}

pub fn init_panic_hook() {
    // Install panic hook
    LazyLock::force(&PANIC_HOOK);
}
