use crate::cli::{EventsArgs, RunArgs};
use crate::config::{PublishTarget, RunConfig, TenantSource};
use crate::directory::EvidenceSink;
use crate::fixture::TenantFixture;
use crate::graph::{DriveSink, GraphClient};
use crate::ledger::{parse_action_events, ActionLedger};
use crate::model::RunSummary;
use crate::sweep::{self, DirectorySink};
use anyhow::{anyhow, Context, Result};
use std::fs;
use time::OffsetDateTime;

pub fn run_sweep(args: RunArgs) -> Result<()> {
    let config = RunConfig::resolve(&args, &|key| std::env::var(key).ok())?;
    let mut ledger = ActionLedger::create(&config.log_dir, &config.naming, OffsetDateTime::now_utc())?;
    tracing::info!(
        log = %ledger.log_path().display(),
        report = %ledger.report_path().display(),
        "artifacts created"
    );
    let sink = build_sink(&config)?;

    let summary = match &config.tenant {
        TenantSource::Fixture(path) => sweep::execute(
            &config,
            &mut ledger,
            |_| TenantFixture::load(path),
            sink.as_ref(),
        ),
        TenantSource::Live(credentials) => sweep::execute(
            &config,
            &mut ledger,
            |config| GraphClient::connect(credentials, &config.endpoints, config.http_timeout),
            sink.as_ref(),
        ),
    }
    .with_context(|| format!("see {}", ledger.log_path().display()))?;

    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize run summary")?;
        println!("{text}");
    } else {
        print_summary(&summary);
    }
    eprintln!("wrote {}", ledger.log_path().display());
    eprintln!("wrote {}", ledger.report_path().display());
    if summary.publish_failed {
        eprintln!("warning: evidence publish failed; artifacts remain local");
    }
    if summary.ledger_write_failures > 0 {
        eprintln!(
            "warning: {} operational log write(s) failed",
            summary.ledger_write_failures
        );
    }
    Ok(())
}

fn build_sink(config: &RunConfig) -> Result<Box<dyn EvidenceSink>> {
    match &config.publish {
        PublishTarget::Directory(dir) => Ok(Box::new(DirectorySink::new(dir.clone()))),
        PublishTarget::Drive { drive_id, folder } => {
            let credentials = config
                .credentials()
                .ok_or_else(|| anyhow!("drive publishing requires a live tenant"))?;
            let sink = DriveSink::new(
                credentials,
                &config.endpoints,
                config.http_timeout,
                drive_id,
                folder,
            )
            .context("configure drive publishing")?;
            Ok(Box::new(sink))
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "scanned {} unified groups, {} public: {} remediated, {} failed",
        summary.scanned, summary.public, summary.remediated, summary.failed
    );
    for outcome in summary.outcomes.iter().filter(|o| !o.is_success()) {
        println!(
            "  failed {}: {}",
            outcome.group_id,
            outcome.error_detail.as_deref().unwrap_or("unknown error")
        );
    }
}

pub fn run_events(args: EventsArgs) -> Result<()> {
    let text = fs::read_to_string(&args.log)
        .with_context(|| format!("read {}", args.log.display()))?;
    let events = parse_action_events(&text);
    if args.json {
        let text = serde_json::to_string_pretty(&events).context("serialize events")?;
        println!("{text}");
        return Ok(());
    }
    if events.is_empty() {
        println!("no remediation events in {}", args.log.display());
        return Ok(());
    }
    for event in &events {
        println!(
            "{}  {}  '{}'  label={}",
            event.timestamp, event.group_id, event.display_name, event.label_id
        );
    }
    Ok(())
}
