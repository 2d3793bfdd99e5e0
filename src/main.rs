use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod directory;
mod fixture;
mod graph;
mod ledger;
mod model;
mod sweep;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let cli = RootArgs::parse();
    let verbose = matches!(&cli.command, Command::Run(args) if args.verbose);
    init_tracing(verbose);

    match cli.command {
        Command::Run(args) => workflow::run_sweep(args),
        Command::Events(args) => workflow::run_events(args),
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
