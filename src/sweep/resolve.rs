use crate::directory::SiteLookup;
use crate::ledger::ActionLedger;
use crate::model::{GroupRecord, RemediationTarget};

/// Pick the most specific target for a group's correction.
///
/// A missing or failed site lookup degrades to a group-only target and is
/// logged as information, not as an error.
pub fn resolve_target(
    group: &GroupRecord,
    lookup: &dyn SiteLookup,
    ledger: &mut ActionLedger,
) -> RemediationTarget {
    match lookup.lookup_site(&group.id) {
        Ok(Some(url)) if !url.trim().is_empty() => {
            let url = url.trim().to_string();
            ledger.log_action(&format!(
                "RESOLVE: GroupId={}  Site={url}",
                group.id
            ));
            tracing::debug!(group_id = %group.id, site_url = %url, "resolved site target");
            RemediationTarget::site(&group.id, url)
        }
        Ok(_) => {
            ledger.log_action(&format!(
                "INFO: GroupId={}  no backing site; applying at group level",
                group.id
            ));
            tracing::info!(group_id = %group.id, "no backing site, using group target");
            RemediationTarget::group_only(&group.id)
        }
        Err(err) => {
            ledger.log_action(&format!(
                "INFO: GroupId={}  site lookup unavailable ({err:#}); applying at group level",
                group.id
            ));
            tracing::info!(
                group_id = %group.id,
                error = %format!("{err:#}"),
                "site lookup failed, using group target"
            );
            RemediationTarget::group_only(&group.id)
        }
    }
}
