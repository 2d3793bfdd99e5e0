use crate::directory::LabelSetter;
use crate::ledger::ActionLedger;
use crate::model::{GroupRecord, RemediationOutcome, RemediationTarget, TargetKind};
use anyhow::Context;

/// Apply `label_id` to a resolved target through exactly one path.
///
/// The path is chosen by `target.kind`; a site target without a URL degrades
/// to the group path. A site failure does not fall back to the group setter.
/// Setter errors become a `Failed` outcome.
pub fn apply_label(
    target: &RemediationTarget,
    group: &GroupRecord,
    label_id: &str,
    setter: &dyn LabelSetter,
    ledger: &mut ActionLedger,
) -> RemediationOutcome {
    let site_url = match target.kind {
        TargetKind::Site => target.site_url.as_deref(),
        TargetKind::GroupOnly => None,
    };
    let (path, result) = match site_url {
        Some(url) => (
            "site",
            setter
                .set_site_label(url, label_id)
                .with_context(|| format!("site label on {url}")),
        ),
        None => (
            "group",
            setter
                .set_group_label(&target.group_id, label_id)
                .with_context(|| format!("group label on {}", target.group_id)),
        ),
    };

    match result {
        Ok(()) => {
            ledger.log_remediation(group, label_id);
            tracing::info!(group_id = %group.id, label_id, path, "label applied");
            RemediationOutcome::success(&group.id, label_id)
        }
        Err(err) => {
            let detail = format!("{err:#}");
            ledger.log_action(&format!(
                "ERROR: GroupId={}  Name='{}'  {path}-level label apply failed: {detail}",
                group.id, group.display_name
            ));
            tracing::warn!(group_id = %group.id, path, error = %detail, "label apply failed");
            RemediationOutcome::failed(&group.id, detail)
        }
    }
}
