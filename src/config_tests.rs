use super::*;
use clap::Parser;
use std::collections::BTreeMap;

fn args(argv: &[&str]) -> RunArgs {
    let mut full = vec!["run"];
    full.extend_from_slice(argv);
    RunArgs::try_parse_from(full).expect("parse run args")
}

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

fn live_env() -> Vec<(&'static str, &'static str)> {
    vec![
        (ENV_TENANT_ID, "tenant"),
        (ENV_CLIENT_ID, "client"),
        (ENV_CLIENT_SECRET, "secret"),
    ]
}

#[test]
fn fixture_run_needs_no_credentials() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_dir = dir.path().join("logs");
    let config = RunConfig::resolve(
        &args(&[
            "--tenant-fixture",
            "tenant.json",
            "--label-id",
            "label-1",
            "--log-dir",
            log_dir.to_str().expect("utf8"),
        ]),
        &env_of(&[]),
    )
    .expect("resolve");

    assert!(matches!(config.tenant, TenantSource::Fixture(_)));
    assert_eq!(config.label_id, "label-1");
    assert_eq!(config.publish, PublishTarget::Directory(log_dir.join("published")));
    assert_eq!(config.naming.log_prefix, "RemediationLog");
    assert_eq!(config.naming.suffix, ".txt");
    assert_eq!(config.http_timeout, Duration::from_secs(30));
}

#[test]
fn live_run_reads_credentials_and_label_from_env() {
    let mut pairs = live_env();
    pairs.push((ENV_LABEL_ID, " label-env "));
    let config = RunConfig::resolve(&args(&[]), &env_of(&pairs)).expect("resolve");

    let credentials = config.credentials().expect("credentials");
    assert_eq!(credentials.tenant_id, "tenant");
    assert_eq!(config.label_id, "label-env");
    let rendered = format!("{credentials:?}");
    assert!(rendered.contains("<redacted>"));
    assert!(!rendered.contains("\"secret\""));
}

#[test]
fn cli_label_overrides_env_and_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{"schema_version":1,"label_id":"label-file","log_prefix":"Sweep","http_timeout_secs":5}"#,
    )
    .expect("write config");
    let mut pairs = live_env();
    pairs.push((ENV_LABEL_ID, "label-env"));

    let config = RunConfig::resolve(
        &args(&[
            "--config",
            config_path.to_str().expect("utf8"),
            "--label-id",
            "label-cli",
        ]),
        &env_of(&pairs),
    )
    .expect("resolve");
    assert_eq!(config.label_id, "label-cli");
    assert_eq!(config.naming.log_prefix, "Sweep");
    assert_eq!(config.http_timeout, Duration::from_secs(5));

    let config = RunConfig::resolve(
        &args(&["--config", config_path.to_str().expect("utf8")]),
        &env_of(&live_env()),
    )
    .expect("resolve");
    assert_eq!(config.label_id, "label-file");
}

#[test]
fn partial_credentials_are_rejected() {
    let err = RunConfig::resolve(
        &args(&["--label-id", "l"]),
        &env_of(&[(ENV_TENANT_ID, "tenant")]),
    )
    .expect_err("should fail");
    assert!(err.to_string().contains("must all be set"));
}

#[test]
fn missing_label_is_rejected() {
    let err = RunConfig::resolve(&args(&[]), &env_of(&live_env())).expect_err("should fail");
    assert!(err.to_string().contains("label id is required"));
}

#[test]
fn missing_tenant_is_rejected() {
    let err =
        RunConfig::resolve(&args(&["--label-id", "l"]), &env_of(&[])).expect_err("should fail");
    assert!(err.to_string().contains("no tenant"));
}

#[test]
fn unknown_config_fields_and_versions_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"schema_version":1,"labelId":"x"}"#).expect("write");
    assert!(load_config_file(&path).is_err());

    std::fs::write(&path, r#"{"schema_version":2}"#).expect("write");
    let err = load_config_file(&path).expect_err("should fail");
    assert!(err.to_string().contains("schema_version"));
}

#[test]
fn prefixes_must_be_plain_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"schema_version":1,"log_prefix":"../escape"}"#).expect("write");
    let err = RunConfig::resolve(
        &args(&[
            "--config",
            path.to_str().expect("utf8"),
            "--label-id",
            "l",
            "--tenant-fixture",
            "t.json",
        ]),
        &env_of(&[]),
    )
    .expect_err("should fail");
    assert!(err.to_string().contains("log_prefix"));
}

#[test]
fn drive_publish_requires_credentials() {
    let err = RunConfig::resolve(
        &args(&[
            "--label-id",
            "l",
            "--tenant-fixture",
            "t.json",
            "--publish-drive",
            "drive-1",
        ]),
        &env_of(&[]),
    )
    .expect_err("should fail");
    assert!(err.to_string().contains("requires live credentials"));

    let config = RunConfig::resolve(
        &args(&[
            "--label-id",
            "l",
            "--publish-drive",
            "drive-1",
            "--publish-folder",
            "Compliance/Logs",
        ]),
        &env_of(&live_env()),
    )
    .expect("resolve");
    assert_eq!(
        config.publish,
        PublishTarget::Drive {
            drive_id: "drive-1".to_string(),
            folder: "Compliance/Logs".to_string(),
        }
    );
}
