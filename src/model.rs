//! Run-scoped records for the remediation sweep.
//!
//! Everything here is owned by a single loop iteration (or by the run summary)
//! and is flattened into ledger text before the run ends.
use serde::Serialize;
use std::fmt;

/// Group visibility as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    /// Any other value (e.g. `HiddenMembership`) or a missing field.
    Other(String),
}

impl Visibility {
    /// Parse a directory visibility string; comparison is case-insensitive.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("public") => Self::Public,
            Some(value) if value.eq_ignore_ascii_case("private") => Self::Private,
            Some(value) => Self::Other(value.to_string()),
            None => Self::Other(String::new()),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "Public"),
            Self::Private => write!(f, "Private"),
            Self::Other(value) if value.is_empty() => write!(f, "<unset>"),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

/// Group kind derived from `groupTypes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Unified,
    Other,
}

impl GroupKind {
    pub fn from_group_types<S: AsRef<str>>(group_types: &[S]) -> Self {
        if group_types
            .iter()
            .any(|kind| kind.as_ref().eq_ignore_ascii_case("unified"))
        {
            Self::Unified
        } else {
            Self::Other
        }
    }
}

/// Read-only snapshot of a group under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: String,
    pub display_name: String,
    pub visibility: Visibility,
    pub kind: GroupKind,
    /// Provisioning hint: the group backs a team.
    pub team_backed: bool,
}

impl GroupRecord {
    pub fn is_unified_public(&self) -> bool {
        self.kind == GroupKind::Unified && self.visibility == Visibility::Public
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Site,
    GroupOnly,
}

/// The resource a correction is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationTarget {
    pub group_id: String,
    pub site_url: Option<String>,
    pub kind: TargetKind,
}

impl RemediationTarget {
    pub fn site(group_id: &str, site_url: String) -> Self {
        Self {
            group_id: group_id.to_string(),
            site_url: Some(site_url),
            kind: TargetKind::Site,
        }
    }

    pub fn group_only(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            site_url: None,
            kind: TargetKind::GroupOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Result of one apply attempt. Constructed only through `success`/`failed`
/// so `label_id` and `error_detail` stay mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationOutcome {
    pub group_id: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl RemediationOutcome {
    pub fn success(group_id: &str, label_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            status: OutcomeStatus::Success,
            label_id: Some(label_id.to_string()),
            error_detail: None,
        }
    }

    pub fn failed(group_id: &str, detail: impl Into<String>) -> Self {
        Self {
            group_id: group_id.to_string(),
            status: OutcomeStatus::Failed,
            label_id: None,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Aggregate counters for one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Unified groups returned by the enumeration.
    pub scanned: usize,
    /// Unified groups with `Public` visibility.
    pub public: usize,
    pub remediated: usize,
    pub failed: usize,
    pub publish_failed: bool,
    /// Ledger appends that failed inside the loop.
    pub ledger_write_failures: usize,
    pub outcomes: Vec<RemediationOutcome>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: RemediationOutcome) {
        if outcome.is_success() {
            self.remediated += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}
