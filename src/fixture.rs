//! In-memory tenant loaded from a JSON snapshot.
//!
//! The snapshot uses the same field names as the directory API so an export
//! of `GET /groups` can be dropped in directly:
//!
//! ```json
//! {
//!   "groups": [
//!     {"id": "g-1", "displayName": "Marketing", "visibility": "Public",
//!      "groupTypes": ["Unified"], "resourceProvisioningOptions": ["Team"]}
//!   ],
//!   "sites": {"g-1": "https://contoso.sharepoint.com/sites/Marketing"},
//!   "locked": ["https://contoso.sharepoint.com/sites/Legal"],
//!   "page_size": 100
//! }
//! ```
//!
//! Label writes are kept in memory with set semantics. Writes to a `locked`
//! group id or site URL are rejected.
use crate::directory::{DirectoryClient, GroupPage, LabelSetter, SiteLookup};
use crate::model::{GroupKind, GroupRecord, Visibility};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const DEFAULT_PAGE_SIZE: usize = 100;
const CURSOR_PREFIX: &str = "offset:";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    #[serde(default)]
    groups: Vec<FixtureGroup>,
    #[serde(default)]
    sites: BTreeMap<String, String>,
    #[serde(default)]
    locked: BTreeSet<String>,
    #[serde(default)]
    page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureGroup {
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    group_types: Vec<String>,
    #[serde(default)]
    resource_provisioning_options: Vec<String>,
}

pub struct TenantFixture {
    groups: Vec<GroupRecord>,
    sites: BTreeMap<String, String>,
    locked: BTreeSet<String>,
    page_size: usize,
    site_labels: RefCell<BTreeMap<String, String>>,
    group_labels: RefCell<BTreeMap<String, String>>,
}

impl TenantFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("read tenant fixture {}", path.display()))?;
        Self::from_json(&bytes).with_context(|| format!("load tenant fixture {}", path.display()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let file: FixtureFile = serde_json::from_slice(bytes).context("parse tenant fixture")?;
        let page_size = file.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(anyhow!("page_size must be greater than zero"));
        }
        let groups = file
            .groups
            .into_iter()
            .map(|group| GroupRecord {
                kind: GroupKind::from_group_types(&group.group_types),
                visibility: Visibility::from_raw(group.visibility.as_deref()),
                team_backed: group
                    .resource_provisioning_options
                    .iter()
                    .any(|option| option.eq_ignore_ascii_case("team")),
                display_name: group.display_name,
                id: group.id,
            })
            .collect();
        Ok(Self {
            groups,
            sites: file
                .sites
                .into_iter()
                .map(|(group_id, url)| (group_id, url.trim().to_string()))
                .collect(),
            locked: file.locked,
            page_size,
            site_labels: RefCell::new(BTreeMap::new()),
            group_labels: RefCell::new(BTreeMap::new()),
        })
    }

    /// Label currently recorded for a group, if any.
    pub fn group_label(&self, group_id: &str) -> Option<String> {
        self.group_labels.borrow().get(group_id).cloned()
    }

    /// Label currently recorded for a site URL, if any.
    pub fn site_label(&self, site_url: &str) -> Option<String> {
        self.site_labels.borrow().get(site_url).cloned()
    }
}

impl DirectoryClient for TenantFixture {
    fn fetch_group_page(&self, cursor: Option<&str>) -> Result<GroupPage> {
        let offset = match cursor {
            None => 0,
            Some(raw) => raw
                .strip_prefix(CURSOR_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| anyhow!("invalid fixture cursor {raw:?}"))?,
        };
        let end = offset.saturating_add(self.page_size).min(self.groups.len());
        let groups = self.groups.get(offset..end).unwrap_or_default().to_vec();
        let next_cursor = (end < self.groups.len()).then(|| format!("{CURSOR_PREFIX}{end}"));
        Ok(GroupPage {
            groups,
            next_cursor,
        })
    }
}

impl SiteLookup for TenantFixture {
    fn lookup_site(&self, group_id: &str) -> Result<Option<String>> {
        Ok(self.sites.get(group_id).cloned())
    }
}

impl LabelSetter for TenantFixture {
    fn set_site_label(&self, site_url: &str, label_id: &str) -> Result<()> {
        if !self.sites.values().any(|url| url == site_url) {
            return Err(anyhow!("site {site_url} not found"));
        }
        if self.locked.contains(site_url) {
            return Err(anyhow!("site {site_url} is locked"));
        }
        self.site_labels
            .borrow_mut()
            .insert(site_url.to_string(), label_id.to_string());
        Ok(())
    }

    fn set_group_label(&self, group_id: &str, label_id: &str) -> Result<()> {
        if !self.groups.iter().any(|group| group.id == group_id) {
            return Err(anyhow!("group {group_id} not found"));
        }
        if self.locked.contains(group_id) {
            return Err(anyhow!("group {group_id} is locked"));
        }
        self.group_labels
            .borrow_mut()
            .insert(group_id.to_string(), label_id.to_string());
        Ok(())
    }
}
