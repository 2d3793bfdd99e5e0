//! Collaborator seams for the directory, site, and label services, plus the
//! enumeration logic that turns raw pages into the remediation worklist.
//!
//! Live implementations sit in `graph`; an in-memory tenant snapshot sits in
//! `fixture`. The orchestrator only sees these traits.
use crate::model::{GroupKind, GroupRecord};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// One page of a group enumeration.
#[derive(Debug, Clone, Default)]
pub struct GroupPage {
    pub groups: Vec<GroupRecord>,
    /// Opaque continuation; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Paged enumeration of unified groups.
pub trait DirectoryClient {
    /// Fetch the page at `cursor`, or the first page for `None`.
    fn fetch_group_page(&self, cursor: Option<&str>) -> Result<GroupPage>;
}

/// Secondary lookup of the site backing a group.
pub trait SiteLookup {
    /// Return the site URL for `group_id`, `None` when the group has none.
    fn lookup_site(&self, group_id: &str) -> Result<Option<String>>;
}

/// Corrective label setters. Both have "set" semantics: reapplying the label
/// a target already carries succeeds.
pub trait LabelSetter {
    fn set_site_label(&self, site_url: &str, label_id: &str) -> Result<()>;
    fn set_group_label(&self, group_id: &str, label_id: &str) -> Result<()>;
}

/// Persist a named blob to a destination.
pub trait EvidenceSink {
    /// Human-readable destination used in log lines.
    fn destination(&self) -> String;
    fn publish(&self, local_path: &Path) -> Result<()>;
}

/// Everything a sweep needs from the tenant side.
pub trait TenantServices: DirectoryClient + SiteLookup + LabelSetter {}

impl<T: DirectoryClient + SiteLookup + LabelSetter> TenantServices for T {}

/// Result of the bulk enumeration.
#[derive(Debug, Clone, Default)]
pub struct GroupListing {
    /// Unified groups seen across all pages.
    pub scanned: usize,
    /// The subset with `Public` visibility, in enumeration order.
    pub public: Vec<GroupRecord>,
}

/// Consume every page and keep the unified public groups.
///
/// The visibility filter is applied here even when the provider filtered
/// server side. Any page error aborts the enumeration.
pub fn list_unified_public_groups(client: &dyn DirectoryClient) -> Result<GroupListing> {
    let mut listing = GroupListing::default();
    let mut seen_cursors = BTreeSet::new();
    let mut cursor: Option<String> = None;
    let mut page_number = 1usize;
    loop {
        let page = client
            .fetch_group_page(cursor.as_deref())
            .with_context(|| format!("enumerate groups (page {page_number})"))?;
        tracing::debug!(
            page = page_number,
            groups = page.groups.len(),
            has_next = page.next_cursor.is_some(),
            "group page fetched"
        );
        for group in page.groups {
            if group.kind != GroupKind::Unified {
                continue;
            }
            listing.scanned += 1;
            if group.is_unified_public() {
                listing.public.push(group);
            }
        }
        match page.next_cursor {
            Some(next) => {
                if !seen_cursors.insert(next.clone()) {
                    return Err(anyhow!(
                        "enumerate groups: provider repeated page cursor after page {page_number}"
                    ));
                }
                cursor = Some(next);
                page_number += 1;
            }
            None => break,
        }
    }
    Ok(listing)
}
