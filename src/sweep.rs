//! The remediation sweep: enumerate, snapshot, then resolve and apply per
//! group, then publish the evidence.
//!
//! ```text
//! Start -> Connect -> Enumerate -> ReportSnapshot
//!       -> for each public group: Resolve -> Apply -> Record
//!       -> Summary -> End -> Publish
//! ```
//!
//! Connect, enumerate, and snapshot failures are fatal and leave a `FATAL:`
//! line in the operational log. Nothing inside the per-group loop can stop
//! the loop: every group yields exactly one outcome.
use crate::config::RunConfig;
use crate::directory::{list_unified_public_groups, EvidenceSink, TenantServices};
use crate::ledger::{report_line, ActionLedger, NONE_FOUND_LINE};
use crate::model::{GroupRecord, RemediationOutcome, RunSummary};
use anyhow::{Context, Result};
use std::time::Instant;

mod apply;
mod publish;
mod resolve;

pub use apply::apply_label;
pub use publish::{publish_evidence, DirectorySink};
pub use resolve::resolve_target;

/// Run one sweep end to end.
///
/// `connect` produces the tenant services; its failure aborts the run
/// before enumeration.
pub fn execute<S, F>(
    config: &RunConfig,
    ledger: &mut ActionLedger,
    connect: F,
    sink: &dyn EvidenceSink,
) -> Result<RunSummary>
where
    S: TenantServices,
    F: FnOnce(&RunConfig) -> Result<S>,
{
    ledger
        .append_action(&format!("JOB START  label={}", config.label_id))
        .context("write job start")?;
    let services = match connect(config) {
        Ok(services) => services,
        Err(err) => return Err(fatal(ledger, "connect", err)),
    };
    run_connected(config, ledger, &services, sink)
}

/// The sweep body once the tenant services are available.
pub fn run_connected<S: TenantServices>(
    config: &RunConfig,
    ledger: &mut ActionLedger,
    services: &S,
    sink: &dyn EvidenceSink,
) -> Result<RunSummary> {
    let started = Instant::now();
    let listing = match list_unified_public_groups(services) {
        Ok(listing) => listing,
        Err(err) => return Err(fatal(ledger, "enumeration", err)),
    };
    let mut summary = RunSummary {
        scanned: listing.scanned,
        public: listing.public.len(),
        ..RunSummary::default()
    };
    tracing::info!(
        scanned = summary.scanned,
        public = summary.public,
        "enumeration complete"
    );

    if let Err(err) = write_report_snapshot(ledger, &listing.public) {
        return Err(fatal(ledger, "report snapshot", err));
    }
    ledger.log_action(&format!(
        "FOUND: {} public of {} unified groups",
        summary.public, summary.scanned
    ));

    for group in &listing.public {
        let outcome = remediate_one(config, ledger, services, group);
        summary.record(outcome);
    }

    ledger.log_action(&format!(
        "SUMMARY: scanned={} public={} remediated={} failed={}",
        summary.scanned, summary.public, summary.remediated, summary.failed
    ));
    ledger.log_action("JOB END");
    tracing::info!(
        remediated = summary.remediated,
        failed = summary.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sweep complete"
    );

    summary.publish_failed = publish_evidence(sink, &ledger.artifacts(), ledger);
    summary.ledger_write_failures = ledger.write_failures();
    Ok(summary)
}

fn remediate_one<S: TenantServices>(
    config: &RunConfig,
    ledger: &mut ActionLedger,
    services: &S,
    group: &GroupRecord,
) -> RemediationOutcome {
    let target = resolve_target(group, services, ledger);
    apply_label(&target, group, &config.label_id, services, ledger)
}

fn write_report_snapshot(
    ledger: &mut ActionLedger,
    groups: &[GroupRecord],
) -> Result<()> {
    if groups.is_empty() {
        return ledger.append_report(NONE_FOUND_LINE);
    }
    for group in groups {
        ledger.append_report(&report_line(group))?;
    }
    Ok(())
}

fn fatal(ledger: &mut ActionLedger, stage: &str, err: anyhow::Error) -> anyhow::Error {
    ledger.log_action(&format!("FATAL: {stage} failed: {err:#}"));
    tracing::error!(stage, error = %format!("{err:#}"), "sweep aborted");
    err.context(format!("sweep aborted during {stage}"))
}
