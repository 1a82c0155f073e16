//! Command-line interface for raidsim

use clap::Parser;
use std::path::PathBuf;

use crate::headless::HeadlessSimConfig;

/// Deterministic combat simulator for theorycrafting
#[derive(Parser, Debug)]
#[command(name = "raidsim")]
#[command(about = "Deterministic combat simulator for theorycrafting")]
#[command(version)]
pub struct Args {
    /// JSON sim config file
    #[arg(long, value_name = "CONFIG_FILE")]
    pub config: PathBuf,

    /// Number of iterations (overrides the config file)
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Seed of the first iteration (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output path for the batch results JSON
    #[arg(long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Output path for the first iteration's combat log JSON
    #[arg(long, value_name = "EVENTS_PATH")]
    pub events: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Load the config file and apply command-line overrides
    pub fn load_config(&self) -> Result<HeadlessSimConfig, String> {
        let mut config = HeadlessSimConfig::load_from_file(&self.config)?;
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(output) = &self.output {
            config.output_path = Some(output.display().to_string());
        }
        if let Some(events) = &self.events {
            config.events_path = Some(events.display().to_string());
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn parse_args() -> Args {
    Args::parse()
}
