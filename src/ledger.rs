//! Append-only evidence artifacts for a sweep.
//!
//! Each run owns two text files in the log directory:
//!
//! - the operational log (`<log_prefix>_<stamp><suffix>`): every step, the
//!   resolution decisions, successes, and errors, one timestamped line each;
//! - the findings report (`<report_prefix>_<stamp><suffix>`): the public
//!   groups found before any remediation was attempted.
//!
//! # Watcher contract
//!
//! A successful remediation is always recorded as exactly two consecutive
//! lines, written in a single append:
//!
//! ```text
//! 2026-10-14 06:00:03  ACTION: PUBLIC→PRIVATE  GroupId=<id>  Name='<displayName>'
//! 2026-10-14 06:00:03  LABEL:  <labelId>
//! ```
//!
//! The downstream notification flow parses exactly this pair; see
//! [`parse_action_events`].
use crate::model::GroupRecord;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use time::macros::format_description;
use time::OffsetDateTime;

/// Line written to the report when the sweep finds nothing to remediate.
pub const NONE_FOUND_LINE: &str = "No public unified groups found.";

const ACTION_MARKER: &str = "ACTION: PUBLIC→PRIVATE";
const LABEL_MARKER: &str = "LABEL:";
const MAX_NAME_ATTEMPTS: usize = 100;

/// File naming for the two artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactNaming {
    pub log_prefix: String,
    pub report_prefix: String,
    pub suffix: String,
}

/// The two per-run ledger files, held open for append.
pub struct ActionLedger {
    log_path: PathBuf,
    report_path: PathBuf,
    log: File,
    report: File,
    write_failures: usize,
}

impl ActionLedger {
    /// Create both artifacts under `dir`, stamped with `run_started`.
    ///
    /// Files are created exclusively; an existing name gets a `-N`
    /// discriminator so no run ever appends into another run's file.
    pub fn create(dir: &Path, naming: &ArtifactNaming, run_started: OffsetDateTime) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
        let stamp = file_stamp(run_started);
        let (log_path, log) = create_exclusive(dir, &naming.log_prefix, &stamp, &naming.suffix)?;
        let (report_path, report) =
            create_exclusive(dir, &naming.report_prefix, &stamp, &naming.suffix)?;
        Ok(Self {
            log_path,
            report_path,
            log,
            report,
            write_failures: 0,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Both artifacts, operational log first.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        vec![self.log_path.clone(), self.report_path.clone()]
    }

    /// Number of appends that failed through [`ActionLedger::log_action`].
    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    /// Append one timestamped line to the operational log. Line breaks in
    /// `message` are flattened so an entry never spans lines.
    pub fn append_action(&mut self, message: &str) -> Result<()> {
        let line = format!(
            "{}  {}\n",
            line_timestamp(OffsetDateTime::now_utc()),
            single_line(message)
        );
        append_durable(&mut self.log, line.as_bytes())
            .with_context(|| format!("append to {}", self.log_path.display()))
    }

    /// Append one plain line to the findings report.
    pub fn append_report(&mut self, line: &str) -> Result<()> {
        let line = format!("{}\n", single_line(line));
        append_durable(&mut self.report, line.as_bytes())
            .with_context(|| format!("append to {}", self.report_path.display()))
    }

    /// Append to the operational log without failing the caller.
    ///
    /// Used inside the per-item loop; a failed append is reported through
    /// `tracing` and counted.
    pub fn log_action(&mut self, message: &str) {
        if let Err(err) = self.append_action(message) {
            self.write_failures += 1;
            tracing::error!(error = %format!("{err:#}"), message, "ledger append failed");
        }
    }

    /// Record a successful remediation as the two-line watcher event.
    pub fn log_remediation(&mut self, group: &GroupRecord, label_id: &str) {
        let ts = line_timestamp(OffsetDateTime::now_utc());
        let text = format!(
            "{ts}  {ACTION_MARKER}  GroupId={}  Name='{}'\n{ts}  {LABEL_MARKER}  {}\n",
            single_line(&group.id),
            single_line(&group.display_name),
            single_line(label_id),
        );
        if let Err(err) = append_durable(&mut self.log, text.as_bytes())
            .with_context(|| format!("append to {}", self.log_path.display()))
        {
            self.write_failures += 1;
            tracing::error!(
                error = %format!("{err:#}"),
                group_id = %group.id,
                "ledger append failed for remediation event"
            );
        }
    }
}

/// Format a report line for one public group.
pub fn report_line(group: &GroupRecord) -> String {
    format!(
        "{}  |  {}",
        single_line(&group.id),
        single_line(&group.display_name)
    )
}

/// One remediation event recovered from an operational log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionEvent {
    pub timestamp: String,
    pub group_id: String,
    pub display_name: String,
    pub label_id: String,
}

/// Parse the two-line remediation events out of an operational log.
///
/// An ACTION line counts only when the very next line is its LABEL line.
pub fn parse_action_events(text: &str) -> Vec<ActionEvent> {
    let mut events = Vec::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(action) = action_pattern().captures(line) else {
            continue;
        };
        let Some(label) = lines.peek().and_then(|next| label_pattern().captures(next)) else {
            continue;
        };
        events.push(ActionEvent {
            timestamp: action["ts"].to_string(),
            group_id: action["id"].to_string(),
            display_name: action["name"].to_string(),
            label_id: label["label"].to_string(),
        });
        lines.next();
    }
    events
}

fn action_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})  ACTION: PUBLIC→PRIVATE  GroupId=(?P<id>\S+)  Name='(?P<name>.*)'$",
        )
        .expect("regex for action lines")
    })
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}  LABEL:  (?P<label>\S+)$")
            .expect("regex for label lines")
    })
}

pub fn line_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

pub fn file_stamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

pub fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn append_durable(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_data()
}

fn create_exclusive(dir: &Path, prefix: &str, stamp: &str, suffix: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{prefix}_{stamp}{suffix}")
        } else {
            format!("{prefix}_{stamp}-{attempt}{suffix}")
        };
        let path = dir.join(name);
        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("create artifact {}", path.display()))
            }
        }
    }
    Err(anyhow!(
        "no free artifact name for {prefix}_{stamp}{suffix} in {}",
        dir.display()
    ))
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
