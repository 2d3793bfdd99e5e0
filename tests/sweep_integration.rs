mod common;

use common::{grem, read, Workspace, LABEL};
use serde_json::{json, Value};

fn three_group_tenant() -> Value {
    json!({
        "groups": [
            {"id": "g-1", "displayName": "Marketing", "visibility": "Public",
             "groupTypes": ["Unified"], "resourceProvisioningOptions": ["Team"]},
            {"id": "g-2", "displayName": "Finance", "visibility": "Private",
             "groupTypes": ["Unified"]},
            {"id": "g-3", "displayName": "Legal", "visibility": "Public",
             "groupTypes": ["Unified"]},
            {"id": "g-4", "displayName": "Helpdesk", "visibility": "Public",
             "groupTypes": ["Unified"]},
            {"id": "sec-1", "displayName": "All Staff", "visibility": "Public",
             "groupTypes": []}
        ],
        "sites": {
            "g-1": "https://contoso.sharepoint.com/sites/Marketing",
            "g-3": "https://contoso.sharepoint.com/sites/Legal"
        },
        "locked": ["https://contoso.sharepoint.com/sites/Legal"],
        "page_size": 2
    })
}

#[test]
fn sweep_writes_report_log_and_published_copies() {
    let ws = Workspace::with_tenant(three_group_tenant());
    let output = ws.run_sweep(&["--label-id", LABEL, "--json"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: Value = serde_json::from_slice(&output.stdout).expect("summary json");
    assert_eq!(summary["scanned"], 4);
    assert_eq!(summary["public"], 3);
    assert_eq!(summary["remediated"], 2);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["publish_failed"], false);
    let failed: Vec<&str> = summary["outcomes"]
        .as_array()
        .expect("outcomes")
        .iter()
        .filter(|o| o["status"] == "failed")
        .filter_map(|o| o["group_id"].as_str())
        .collect();
    assert_eq!(failed, vec!["g-3"]);

    let report = read(&ws.artifact("PublicGroupsReport_"));
    assert_eq!(
        report,
        "g-1  |  Marketing\ng-3  |  Legal\ng-4  |  Helpdesk\n"
    );

    let log_path = ws.artifact("RemediationLog_");
    let log = read(&log_path);
    assert!(log.contains("JOB START"));
    assert!(log.contains("RESOLVE: GroupId=g-1  Site=https://contoso.sharepoint.com/sites/Marketing"));
    assert!(log.contains("INFO: GroupId=g-4  no backing site"));
    assert!(log.contains("ERROR: GroupId=g-3  Name='Legal'  site-level label apply failed"));
    assert!(!log.contains("GroupId=g-2"));
    assert!(!log.contains("GroupId=sec-1"));
    assert!(log.contains("SUMMARY: scanned=4 public=3 remediated=2 failed=1"));
    assert!(log.contains("JOB END"));

    assert_eq!(read(&ws.published("PublicGroupsReport_")), report);
    assert!(read(&ws.published("RemediationLog_")).contains("JOB END"));

    let events = grem()
        .arg("events")
        .arg("--log")
        .arg(&log_path)
        .arg("--json")
        .output()
        .expect("run events");
    assert!(events.status.success());
    let events: Value = serde_json::from_slice(&events.stdout).expect("events json");
    let events = events.as_array().expect("event list");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["group_id"], "g-1");
    assert_eq!(events[0]["display_name"], "Marketing");
    assert_eq!(events[0]["label_id"], LABEL);
    assert_eq!(events[1]["group_id"], "g-4");
}

#[test]
fn sweep_with_no_public_groups_still_publishes() {
    let ws = Workspace::with_tenant(json!({
        "groups": [
            {"id": "g-1", "displayName": "Finance", "visibility": "Private",
             "groupTypes": ["Unified"]}
        ]
    }));
    let output = ws.run_sweep(&["--label-id", LABEL]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert_eq!(
        read(&ws.artifact("PublicGroupsReport_")),
        "No public unified groups found.\n"
    );
    let log = read(&ws.artifact("RemediationLog_"));
    assert!(log.lines().next().is_some_and(|line| line.contains("JOB START")));
    assert!(log.contains("FOUND: 0 public of 1 unified groups"));
    assert!(log.contains("JOB END"));
    assert!(!log.contains("ACTION:"));

    ws.published("RemediationLog_");
    ws.published("PublicGroupsReport_");
}

#[test]
fn missing_label_is_a_config_error() {
    let ws = Workspace::with_tenant(json!({"groups": []}));
    let output = ws.run_sweep(&[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("label id is required"), "stderr: {stderr}");
    assert!(!ws.log_dir().exists());
}

#[test]
fn label_from_environment_is_accepted() {
    let ws = Workspace::with_tenant(json!({"groups": []}));
    let output = grem()
        .env("GREM_LABEL_ID", LABEL)
        .arg("run")
        .arg("--tenant-fixture")
        .arg(ws.tenant_path())
        .arg("--log-dir")
        .arg(ws.log_dir())
        .arg("--json")
        .output()
        .expect("run grem");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let log = read(&ws.artifact("RemediationLog_"));
    assert!(log.contains(&format!("JOB START  label={LABEL}")));
    ws.log_dir().join("published").read_dir().expect("default publish dir");
}

#[test]
fn broken_fixture_aborts_with_fatal_line() {
    let ws = Workspace::with_tenant(json!({"groups": [], "unexpected": true}));
    let output = ws.run_sweep(&["--label-id", LABEL]);
    assert!(!output.status.success());

    let log = read(&ws.artifact("RemediationLog_"));
    assert!(log.contains("FATAL: connect failed"));
    assert!(!ws.publish_dir().exists());
}
