mod cli;
mod config;
mod export;
mod identity;
mod model;
mod reconcile;
mod report;
mod storage;
mod store;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    init_tracing();

    if let Err(e) = cli::run(Cli::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr. `PREBOX_LOG` wins over `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("PREBOX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("prebox=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
