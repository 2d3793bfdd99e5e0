//! Shared test infrastructure for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const LABEL: &str = "3f1c2b4a-7d6e-4f10-9a2b-000000000001";

const ENV_KEYS: [&str; 4] = [
    "GREM_TENANT_ID",
    "GREM_CLIENT_ID",
    "GREM_CLIENT_SECRET",
    "GREM_LABEL_ID",
];

/// A temp workspace holding a tenant snapshot and a log directory.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn with_tenant(snapshot: serde_json::Value) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let text = serde_json::to_string_pretty(&snapshot).expect("serialize snapshot");
        fs::write(dir.path().join("tenant.json"), text).expect("write snapshot");
        Self { dir }
    }

    pub fn tenant_path(&self) -> PathBuf {
        self.dir.path().join("tenant.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    pub fn publish_dir(&self) -> PathBuf {
        self.dir.path().join("published")
    }

    /// Run `grem run` against the snapshot with a clean environment.
    pub fn run_sweep(&self, extra: &[&str]) -> Output {
        let mut cmd = grem();
        cmd.arg("run")
            .arg("--tenant-fixture")
            .arg(self.tenant_path())
            .arg("--log-dir")
            .arg(self.log_dir())
            .arg("--publish-dir")
            .arg(self.publish_dir())
            .args(extra);
        cmd.output().expect("run grem")
    }

    /// The single artifact in the log dir whose name starts with `prefix`.
    pub fn artifact(&self, prefix: &str) -> PathBuf {
        single_with_prefix(&self.log_dir(), prefix)
    }

    pub fn published(&self, prefix: &str) -> PathBuf {
        single_with_prefix(&self.publish_dir(), prefix)
    }
}

pub fn grem() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_grem"));
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn single_with_prefix(dir: &Path, prefix: &str) -> PathBuf {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap_or_else(|err| panic!("read {}: {err}", dir.display()))
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .collect();
    assert_eq!(
        matches.len(),
        1,
        "expected one {prefix}* in {}: {matches:?}",
        dir.display()
    );
    matches.remove(0)
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
}
