use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod publish;
mod registry;
mod shasums;

use crate::config::PublishConfig;
use crate::registry::HttpRegistry;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let config = match PublishConfig::from_env(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let registry = HttpRegistry::new(&config);
    match publish::run(&config, &registry) {
        Ok(report) if report.failed == 0 => ExitCode::SUCCESS,
        Ok(report) => {
            tracing::warn!(failed = report.failed, "publish finished with failures");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::FAILURE
        }
    }
}
