//! Run configuration.
//!
//! A `RunConfig` is resolved once at start-up from defaults, an optional JSON
//! config file, the environment, and CLI flags (in increasing precedence), and
//! is then passed by reference to every component. Secrets come only from the
//! environment.
use crate::cli::RunArgs;
use crate::ledger::ArtifactNaming;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const ENV_TENANT_ID: &str = "GREM_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "GREM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "GREM_CLIENT_SECRET";
pub const ENV_LABEL_ID: &str = "GREM_LABEL_ID";

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
const DEFAULT_LOG_PREFIX: &str = "RemediationLog";
const DEFAULT_REPORT_PREFIX: &str = "PublicGroupsReport";
const DEFAULT_ARTIFACT_SUFFIX: &str = ".txt";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// App-only credentials for the client-credentials flow.
#[derive(Clone)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Where the tenant services come from.
#[derive(Debug, Clone)]
pub enum TenantSource {
    Live(Credentials),
    /// In-memory tenant loaded from a JSON snapshot.
    Fixture(PathBuf),
}

/// Where finished artifacts are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    Directory(PathBuf),
    Drive { drive_id: String, folder: String },
}

#[derive(Debug, Clone)]
pub struct GraphEndpoints {
    pub graph_base_url: String,
    pub authority_url: String,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub label_id: String,
    pub log_dir: PathBuf,
    pub naming: ArtifactNaming,
    pub tenant: TenantSource,
    pub publish: PublishTarget,
    pub endpoints: GraphEndpoints,
    pub http_timeout: Duration,
}

/// On-disk config (`--config`). Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub schema_version: u32,
    #[serde(default)]
    pub label_id: Option<String>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_prefix: Option<String>,
    #[serde(default)]
    pub report_prefix: Option<String>,
    #[serde(default)]
    pub artifact_suffix: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub tenant_fixture: Option<PathBuf>,
    #[serde(default)]
    pub publish_dir: Option<PathBuf>,
    #[serde(default)]
    pub publish_drive: Option<String>,
    #[serde(default)]
    pub publish_folder: Option<String>,
    #[serde(default)]
    pub graph_base_url: Option<String>,
    #[serde(default)]
    pub authority_url: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

/// Load and schema-check a config file.
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let file: ConfigFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    if file.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
            file.schema_version
        ));
    }
    Ok(file)
}

/// Default log directory under the platform data dir.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("group-remediate").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

impl RunConfig {
    /// Resolve the run configuration from CLI args and an environment lookup.
    pub fn resolve(args: &RunArgs, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let file = match &args.config {
            Some(path) => load_config_file(path)?,
            None => ConfigFile {
                schema_version: CONFIG_SCHEMA_VERSION,
                ..ConfigFile::default()
            },
        };
        let env_value = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let label_id = args
            .label_id
            .clone()
            .or_else(|| env_value(ENV_LABEL_ID))
            .or(file.label_id)
            .unwrap_or_default();
        let log_dir = args
            .log_dir
            .clone()
            .or(file.log_dir)
            .unwrap_or_else(default_log_dir);
        let naming = ArtifactNaming {
            log_prefix: file
                .log_prefix
                .unwrap_or_else(|| DEFAULT_LOG_PREFIX.to_string()),
            report_prefix: file
                .report_prefix
                .unwrap_or_else(|| DEFAULT_REPORT_PREFIX.to_string()),
            suffix: file
                .artifact_suffix
                .unwrap_or_else(|| DEFAULT_ARTIFACT_SUFFIX.to_string()),
        };

        let tenant_id = env_value(ENV_TENANT_ID).or(file.tenant_id);
        let client_id = env_value(ENV_CLIENT_ID).or(file.client_id);
        let client_secret = env_value(ENV_CLIENT_SECRET);
        let credentials = match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Some(Credentials {
                tenant_id,
                client_id,
                client_secret,
            }),
            (None, None, None) => None,
            _ => {
                return Err(anyhow!(
                    "{ENV_TENANT_ID}, {ENV_CLIENT_ID}, and {ENV_CLIENT_SECRET} must all be set for a live run"
                ))
            }
        };

        let fixture = args.tenant_fixture.clone().or(file.tenant_fixture);
        let tenant = match (fixture, credentials) {
            (Some(path), _) => TenantSource::Fixture(path),
            (None, Some(credentials)) => TenantSource::Live(credentials),
            (None, None) => {
                return Err(anyhow!(
                    "no tenant: set {ENV_TENANT_ID}/{ENV_CLIENT_ID}/{ENV_CLIENT_SECRET} or pass --tenant-fixture"
                ))
            }
        };

        let publish_drive = args.publish_drive.clone().or(file.publish_drive);
        let publish_dir = args.publish_dir.clone().or(file.publish_dir);
        let publish = match (publish_drive, publish_dir) {
            (Some(drive_id), _) => {
                if !matches!(tenant, TenantSource::Live(_)) {
                    return Err(anyhow!("--publish-drive requires live credentials"));
                }
                PublishTarget::Drive {
                    drive_id,
                    folder: args
                        .publish_folder
                        .clone()
                        .or(file.publish_folder)
                        .unwrap_or_default(),
                }
            }
            (None, Some(dir)) => PublishTarget::Directory(dir),
            (None, None) => PublishTarget::Directory(log_dir.join("published")),
        };

        let config = Self {
            label_id: label_id.trim().to_string(),
            log_dir,
            naming,
            tenant,
            publish,
            endpoints: GraphEndpoints {
                graph_base_url: file
                    .graph_base_url
                    .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
                authority_url: file
                    .authority_url
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string()),
            },
            http_timeout: Duration::from_secs(
                file.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        };
        validate_config(&config)?;
        Ok(config)
    }

    /// Live credentials, when the run has them.
    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.tenant {
            TenantSource::Live(credentials) => Some(credentials),
            TenantSource::Fixture(_) => None,
        }
    }
}

/// Reject configs that would produce unusable artifacts or requests.
pub fn validate_config(config: &RunConfig) -> Result<()> {
    if config.label_id.is_empty() {
        return Err(anyhow!(
            "label id is required (--label-id, {ENV_LABEL_ID}, or label_id in config)"
        ));
    }
    validate_name_part(&config.naming.log_prefix, "log_prefix")?;
    validate_name_part(&config.naming.report_prefix, "report_prefix")?;
    validate_name_part(&config.naming.suffix, "artifact_suffix")?;
    if config.naming.log_prefix == config.naming.report_prefix {
        return Err(anyhow!("log_prefix and report_prefix must differ"));
    }
    if config.http_timeout.is_zero() {
        return Err(anyhow!("http_timeout_secs must be greater than zero"));
    }
    for (label, url) in [
        ("graph_base_url", &config.endpoints.graph_base_url),
        ("authority_url", &config.endpoints.authority_url),
    ] {
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(anyhow!("{label} must be an http(s) URL (got {url:?})"));
        }
    }
    if let PublishTarget::Drive { drive_id, .. } = &config.publish {
        if drive_id.trim().is_empty() {
            return Err(anyhow!("publish drive id must be non-empty"));
        }
    }
    Ok(())
}

fn validate_name_part(value: &str, label: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{label} must be non-empty"));
    }
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(anyhow!(
            "{label} must not contain path separators (got {value:?})"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
