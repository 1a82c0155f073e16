//! raidsim - Deterministic combat simulator
//!
//! Runs batches of a JSON-configured encounter and reports DPS statistics.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raidsim::cli;
use raidsim::headless::run_headless_sim;

fn main() -> ExitCode {
    let args = cli::parse_args();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let result = args.load_config().and_then(run_headless_sim);
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
