//! Live Microsoft Graph / SharePoint collaborators.
//!
//! `GraphClient` implements the directory, site-lookup, and label-setter seams
//! over a blocking `ureq` agent; `DriveSink` uploads finished artifacts to a
//! drive folder. Both authenticate with the client-credentials flow and cache
//! one token per scope.
use crate::config::{Credentials, GraphEndpoints};
use crate::directory::{DirectoryClient, EvidenceSink, GroupPage, LabelSetter, SiteLookup};
use crate::model::{GroupKind, GroupRecord, Visibility};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use ureq::http::Response;
use ureq::{Agent, Body};
use url::Url;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const GROUP_SELECT: &str = "id,displayName,visibility,groupTypes,resourceProvisioningOptions";
const UNIFIED_FILTER: &str = "groupTypes/any(c:c eq 'Unified')";
const PAGE_SIZE: usize = 999;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Non-2xx response from Graph or SharePoint.
#[derive(Debug)]
pub struct GraphHttpError {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for GraphHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body.trim();
        if body.is_empty() {
            write!(f, "HTTP {}", self.status)
        } else {
            write!(f, "HTTP {}: {}", self.status, truncate(body, 512))
        }
    }
}

impl std::error::Error for GraphHttpError {}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Client-credentials token source, cached per scope.
pub struct GraphAuth {
    agent: Agent,
    token_url: Url,
    client_id: String,
    client_secret: String,
    tokens: Mutex<BTreeMap<String, AccessToken>>,
}

impl GraphAuth {
    pub fn new(
        agent: Agent,
        endpoints: &GraphEndpoints,
        credentials: &Credentials,
    ) -> Result<Self> {
        let authority = parse_base(&endpoints.authority_url)?;
        Ok(Self {
            agent,
            token_url: endpoint(
                &authority,
                &[credentials.tenant_id.as_str(), "oauth2", "v2.0", "token"],
            )?,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            tokens: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn token(&self, scope: &str) -> Result<String> {
        {
            let tokens = self
                .tokens
                .lock()
                .map_err(|_| anyhow!("token cache lock poisoned"))?;
            if let Some(token) = tokens.get(scope) {
                if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                    return Ok(token.value.clone());
                }
            }
        }

        let started = Instant::now();
        let response = self
            .agent
            .post(self.token_url.as_str())
            .send_form([
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .with_context(|| format!("request token for {scope}"))?;
        let mut response = check_status(response).context("token request rejected")?;
        let body: serde_json::Value = response
            .body_mut()
            .read_json()
            .context("parse token response")?;
        let value = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("token response missing access_token"))?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(3600);
        tracing::debug!(
            scope,
            expires_in,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "token acquired"
        );

        let mut tokens = self
            .tokens
            .lock()
            .map_err(|_| anyhow!("token cache lock poisoned"))?;
        tokens.insert(
            scope.to_string(),
            AccessToken {
                value: value.clone(),
                expires_at: Instant::now() + Duration::from_secs(expires_in),
            },
        );
        Ok(value)
    }
}

/// Build the shared HTTP agent. Status codes are inspected by the caller so
/// error bodies can be reported.
pub fn build_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Authenticated Graph client for one run.
pub struct GraphClient {
    agent: Agent,
    auth: GraphAuth,
    base_url: Url,
}

impl GraphClient {
    /// Authenticate eagerly so bad credentials fail before enumeration.
    pub fn connect(
        credentials: &Credentials,
        endpoints: &GraphEndpoints,
        timeout: Duration,
    ) -> Result<Self> {
        let agent = build_agent(timeout);
        let auth = GraphAuth::new(agent.clone(), endpoints, credentials)?;
        let base_url = parse_base(&endpoints.graph_base_url)?;
        auth.token(GRAPH_SCOPE)
            .with_context(|| format!("authenticate to tenant {}", credentials.tenant_id))?;
        tracing::info!(tenant_id = %credentials.tenant_id, "graph client connected");
        Ok(Self {
            agent,
            auth,
            base_url,
        })
    }

    fn first_page_url(&self) -> Result<Url> {
        let mut url = endpoint(&self.base_url, &["groups"])?;
        url.query_pairs_mut()
            .append_pair("$filter", UNIFIED_FILTER)
            .append_pair("$select", GROUP_SELECT)
            .append_pair("$top", &PAGE_SIZE.to_string());
        Ok(url)
    }

    fn bearer(&self, scope: &str) -> Result<String> {
        Ok(format!("Bearer {}", self.auth.token(scope)?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphGroup {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    group_types: Vec<String>,
    #[serde(default)]
    resource_provisioning_options: Vec<String>,
}

impl From<GraphGroup> for GroupRecord {
    fn from(group: GraphGroup) -> Self {
        Self {
            kind: GroupKind::from_group_types(&group.group_types),
            visibility: Visibility::from_raw(group.visibility.as_deref()),
            team_backed: group
                .resource_provisioning_options
                .iter()
                .any(|option| option.eq_ignore_ascii_case("team")),
            display_name: group.display_name.unwrap_or_default(),
            id: group.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphGroupPage {
    #[serde(default)]
    value: Vec<GraphGroup>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSite {
    #[serde(default)]
    web_url: Option<String>,
}

impl DirectoryClient for GraphClient {
    fn fetch_group_page(&self, cursor: Option<&str>) -> Result<GroupPage> {
        let url = match cursor {
            Some(next) => {
                let next_url =
                    Url::parse(next).with_context(|| format!("parse nextLink {next}"))?;
                if next_url.origin() != self.base_url.origin() {
                    bail!("nextLink {next} is outside {}", self.base_url);
                }
                next_url
            }
            None => self.first_page_url()?,
        };
        let response = self
            .agent
            .get(url.as_str())
            .header("Authorization", self.bearer(GRAPH_SCOPE)?)
            .header("Accept", "application/json")
            .call()
            .context("list groups")?;
        let mut response = check_status(response).context("list groups")?;
        let page: GraphGroupPage = response
            .body_mut()
            .read_json()
            .context("parse group page")?;
        Ok(GroupPage {
            groups: page.value.into_iter().map(GroupRecord::from).collect(),
            next_cursor: page.next_link.filter(|link| !link.is_empty()),
        })
    }
}

impl SiteLookup for GraphClient {
    fn lookup_site(&self, group_id: &str) -> Result<Option<String>> {
        let mut url = endpoint(&self.base_url, &["groups", group_id, "sites", "root"])?;
        url.query_pairs_mut().append_pair("$select", "webUrl");
        let response = self
            .agent
            .get(url.as_str())
            .header("Authorization", self.bearer(GRAPH_SCOPE)?)
            .header("Accept", "application/json")
            .call()
            .with_context(|| format!("look up site for group {group_id}"))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let mut response = check_status(response)
            .with_context(|| format!("look up site for group {group_id}"))?;
        let site: GraphSite = response.body_mut().read_json().context("parse site")?;
        Ok(site.web_url.filter(|url| !url.trim().is_empty()))
    }
}

impl LabelSetter for GraphClient {
    fn set_site_label(&self, site_url: &str, label_id: &str) -> Result<()> {
        let site = Url::parse(site_url).with_context(|| format!("parse site URL {site_url:?}"))?;
        let scope = format!("{}/.default", site.origin().ascii_serialization());
        let api_url = endpoint(&site, &["_api", "site"])?;
        let body = serde_json::to_vec(&json!({ "SensitivityLabelId": label_id }))
            .context("serialize site label body")?;
        let response = self
            .agent
            .post(api_url.as_str())
            .header("Authorization", self.bearer(&scope)?)
            .header("Accept", "application/json;odata=nometadata")
            .header("Content-Type", "application/json;odata=nometadata")
            .header("X-HTTP-Method", "MERGE")
            .header("IF-MATCH", "*")
            .send(&body[..])
            .with_context(|| format!("set site label on {site_url}"))?;
        check_status(response)?;
        Ok(())
    }

    fn set_group_label(&self, group_id: &str, label_id: &str) -> Result<()> {
        let url = endpoint(&self.base_url, &["groups", group_id])?;
        let response = self
            .agent
            .patch(url.as_str())
            .header("Authorization", self.bearer(GRAPH_SCOPE)?)
            .send_json(json!({ "assignedLabels": [{ "labelId": label_id }] }))
            .with_context(|| format!("set group label on {group_id}"))?;
        check_status(response)?;
        Ok(())
    }
}

/// Uploads artifacts into a drive folder with a simple PUT.
pub struct DriveSink {
    agent: Agent,
    auth: GraphAuth,
    base_url: Url,
    drive_id: String,
    folder: String,
}

impl DriveSink {
    /// Token acquisition is deferred to the first publish.
    pub fn new(
        credentials: &Credentials,
        endpoints: &GraphEndpoints,
        timeout: Duration,
        drive_id: &str,
        folder: &str,
    ) -> Result<Self> {
        let agent = build_agent(timeout);
        Ok(Self {
            auth: GraphAuth::new(agent.clone(), endpoints, credentials)?,
            agent,
            base_url: parse_base(&endpoints.graph_base_url)?,
            drive_id: drive_id.to_string(),
            folder: folder.trim_matches('/').to_string(),
        })
    }

    /// `{base}/drives/{id}/root:/{folder...}/{name}:/content`
    fn upload_url(&self, file_name: &str) -> Result<Url> {
        let item = format!("{file_name}:");
        let mut segments = vec![self.drive_id.as_str(), "root:"];
        segments.extend(self.folder.split('/').filter(|part| !part.is_empty()));
        segments.push(&item);
        segments.push("content");
        let mut url = endpoint(&self.base_url, &["drives"])?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot carry a path", self.base_url))?
            .extend(segments);
        Ok(url)
    }
}

impl EvidenceSink for DriveSink {
    fn destination(&self) -> String {
        format!("drive {}:/{}", self.drive_id, self.folder)
    }

    fn publish(&self, local_path: &Path) -> Result<()> {
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("artifact path has no file name: {}", local_path.display()))?;
        let bytes = std::fs::read(local_path)
            .with_context(|| format!("read artifact {}", local_path.display()))?;
        let token = self.auth.token(GRAPH_SCOPE)?;
        let response = self
            .agent
            .put(self.upload_url(file_name)?.as_str())
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "text/plain")
            .send(&bytes[..])
            .with_context(|| format!("upload {file_name}"))?;
        check_status(response).with_context(|| format!("upload {file_name}"))?;
        Ok(())
    }
}

fn check_status(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(GraphHttpError {
        status: status.as_u16(),
        body,
    }
    .into())
}

fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("parse endpoint URL {raw:?}"))
}

/// `base` with `segments` appended as individually encoded path segments.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| anyhow!("{base} cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
