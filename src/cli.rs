//! CLI argument parsing for the remediation sweep.
//!
//! The CLI only collects inputs; configuration precedence and validation live
//! in `config` so a scheduled run and an interactive run resolve identically.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "grem",
    version,
    about = "Lock down public unified groups with a corrective sensitivity label",
    after_help = "Commands:\n  run                     Sweep the tenant once and publish the evidence logs\n  events --log <path>     Extract remediation events from an operational log\n\nExamples:\n  GREM_TENANT_ID=... GREM_CLIENT_ID=... GREM_CLIENT_SECRET=... grem run --label-id <guid>\n  grem run --tenant-fixture tenant.json --label-id <guid> --log-dir ./logs\n  grem events --log ./logs/RemediationLog_20261014_060000.txt --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Events(EventsArgs),
}

/// Inputs for one sweep.
#[derive(Parser, Debug)]
#[command(about = "Run one remediation sweep")]
pub struct RunArgs {
    /// JSON config file (schema_version 1)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run against a tenant snapshot instead of the live directory
    #[arg(long, value_name = "PATH")]
    pub tenant_fixture: Option<PathBuf>,

    /// Sensitivity label id to apply (overrides GREM_LABEL_ID)
    #[arg(long, value_name = "ID")]
    pub label_id: Option<String>,

    /// Directory for the operational log and findings report
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Publish finished artifacts into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "publish_drive")]
    pub publish_dir: Option<PathBuf>,

    /// Publish finished artifacts to this drive id
    #[arg(long, value_name = "DRIVE")]
    pub publish_drive: Option<String>,

    /// Folder within the publish drive
    #[arg(long, value_name = "PATH", requires = "publish_drive")]
    pub publish_folder: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable debug diagnostics on stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Inputs for reading remediation events back out of a log.
#[derive(Parser, Debug)]
#[command(about = "Extract remediation events from an operational log")]
pub struct EventsArgs {
    /// Operational log written by `grem run`
    #[arg(long, value_name = "PATH")]
    pub log: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
