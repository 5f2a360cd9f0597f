//! Operator-facing client for the Rollcall attendance pipeline.
//!
//! Wires [`rollcall_core`] to a file-backed offline queue, the HTTP API
//! client, a terminal notice sink and layered configuration.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod notifier;

use std::process::ExitCode;

use anyhow::Result;
use tracing::warn;

use crate::cli::Cli;
use crate::commands::AppContext;
use crate::config::ConfigLoadError;

/// Exit status for configuration problems.
pub const EXIT_CONFIG: u8 = 2;

/// Run a parsed command line to completion.
pub async fn run(cli: Cli) -> ExitCode {
    logging::init(cli.verbose);

    match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.downcast_ref::<ConfigLoadError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let load = cli.config_loader().load()?;
    for warning in load.warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }

    let mut config = load.config;
    config.apply_overrides(cli.overrides());

    let ctx = AppContext::build(config, cli.offline).await?;
    commands::dispatch(&ctx, cli.command).await
}
