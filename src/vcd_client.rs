//! vCloud Director API client.
//!
//! Unique responsibility: hold an authenticated vCD session and perform the raw
//! XML requests every other module builds on.
//!
//! Session bootstrap:
//! - GET `{VCD_URL}/versions` to discover the login URL of the configured API version
//! - POST `{LoginUrl}` with `Authorization: Basic user@org:password`
//! - Keep the `x-vcloud-authorization` response header as the session token
//!
//! Every later request carries:
//! - Header: `Accept: application/*+xml;version=<api_version>`
//! - Header: `x-vcloud-authorization: <token>`
//!
//! All configuration is loaded from environment variables.

use std::{env, fmt, sync::Arc, time::Duration};

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::vcd_org::{AdminOrg, Org};
use crate::vcd_task::Task;
use crate::vcd_types::{
    AdminOrgRecord, LinkList, MIME_ADMIN_ORG, MIME_EMPTY, MIME_ORG, MIME_QUERY_LIST, OrgRecord,
    QueryResultRecords, REL_ALTERNATE, REL_DOWN, REL_REMOVE, Session, SupportedVersions,
    TaskRecord, VcdErrorBody, from_xml, parse_href,
};

/// Header carrying the session token.
pub const AUTH_HEADER: &str = "x-vcloud-authorization";

/// Configuration for the vCD client.
#[derive(Clone)]
pub struct VcdClientConfig {
    /// API endpoint, e.g. `https://vcd.example.com/api`.
    /// Env: `VCD_URL` (required)
    pub href: String,

    /// User name.
    /// Env: `VCD_USER` (required)
    pub user: String,

    /// Password.
    /// Env: `VCD_PASSWORD` (required)
    pub password: String,

    /// Organization to log into.
    /// Env: `VCD_ORG` (required)
    pub org: String,

    /// Virtual datacenter resources are managed in.
    /// Env: `VCD_VDC` (required)
    pub vdc: String,

    /// API version sent in the `Accept` header.
    /// Env: `VCD_API_VERSION` (default: "5.6")
    pub api_version: String,

    /// Skip TLS certificate verification.
    /// Env: `VCD_ALLOW_UNVERIFIED_SSL` (default: false)
    pub insecure: bool,

    /// Budget for retried operations, in seconds.
    /// Env: `VCD_MAX_RETRY_TIMEOUT` (default: 60)
    pub max_retry_timeout_secs: u64,

    /// HTTP request timeout in milliseconds.
    /// Env: `VCD_HTTP_TIMEOUT_MS` (default: 120000)
    pub timeout_ms: u64,

    /// Interval between task status polls in milliseconds.
    /// Env: `VCD_TASK_POLL_INTERVAL_MS` (default: 1000)
    pub task_poll_interval_ms: u64,

    /// Delay before re-attempting a call rejected with "is busy", in milliseconds.
    /// Env: `VCD_BUSY_RETRY_DELAY_MS` (default: 3000)
    pub busy_retry_delay_ms: u64,

    /// User agent for HTTP requests.
    /// Env: `VCD_USER_AGENT` (default: "vcd-provider/<version>")
    pub user_agent: String,
}

impl VcdClientConfig {
    /// Build a configuration with default tuning values.
    #[must_use]
    pub fn new(
        href: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        org: impl Into<String>,
        vdc: impl Into<String>,
    ) -> Self {
        Self {
            href: href.into(),
            user: user.into(),
            password: password.into(),
            org: org.into(),
            vdc: vdc.into(),
            api_version: "5.6".to_string(),
            insecure: false,
            max_retry_timeout_secs: 60,
            timeout_ms: 120_000,
            task_poll_interval_ms: 1_000,
            busy_retry_delay_ms: 3_000,
            user_agent: default_user_agent(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// In local dev, this will also attempt to load `.env` from the current directory.
    /// If `.env` is missing, it does not fail.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, VcdError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            href: must_env("VCD_URL")?,
            user: must_env("VCD_USER")?,
            password: must_env("VCD_PASSWORD")?,
            org: must_env("VCD_ORG")?,
            vdc: must_env("VCD_VDC")?,
            api_version: env::var("VCD_API_VERSION").unwrap_or_else(|_| "5.6".to_string()),
            insecure: parse_bool_env("VCD_ALLOW_UNVERIFIED_SSL", false)?,
            max_retry_timeout_secs: parse_u64_env("VCD_MAX_RETRY_TIMEOUT", 60)?,
            timeout_ms: parse_u64_env("VCD_HTTP_TIMEOUT_MS", 120_000)?,
            task_poll_interval_ms: parse_u64_env("VCD_TASK_POLL_INTERVAL_MS", 1_000)?,
            busy_retry_delay_ms: parse_u64_env("VCD_BUSY_RETRY_DELAY_MS", 3_000)?,
            user_agent: env::var("VCD_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
        })
    }

    /// Budget for retried operations.
    #[must_use]
    pub const fn max_retry_timeout(&self) -> Duration {
        Duration::from_secs(self.max_retry_timeout_secs)
    }

    /// Interval between task status polls.
    #[must_use]
    pub const fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }

    /// Delay before re-attempting a busy entity.
    #[must_use]
    pub const fn busy_retry_delay(&self) -> Duration {
        Duration::from_millis(self.busy_retry_delay_ms)
    }

    /// Value of the `Accept` header for the configured API version.
    #[must_use]
    pub fn accept_header(&self) -> String {
        format!("application/*+xml;version={}", self.api_version)
    }
}

impl fmt::Debug for VcdClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VcdClientConfig")
            .field("href", &self.href)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("org", &self.org)
            .field("vdc", &self.vdc)
            .field("api_version", &self.api_version)
            .field("insecure", &self.insecure)
            .field("max_retry_timeout_secs", &self.max_retry_timeout_secs)
            .field("timeout_ms", &self.timeout_ms)
            .field("task_poll_interval_ms", &self.task_poll_interval_ms)
            .field("busy_retry_delay_ms", &self.busy_retry_delay_ms)
            .finish_non_exhaustive()
    }
}

/// Authenticated vCD client.
///
/// Cloning is cheap: clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct VcdClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    cfg: VcdClientConfig,
    http: reqwest::Client,
    token: String,
    org_href: Url,
    query_href: Url,
    logout_href: Url,
}

impl fmt::Debug for VcdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VcdClient")
            .field("cfg", &self.inner.cfg)
            .field("org_href", &self.inner.org_href.as_str())
            .finish_non_exhaustive()
    }
}

impl VcdClient {
    /// Create a client and log into vCD.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built, the endpoint is
    /// unreachable, the credentials are rejected or the session lacks an
    /// org, query or logout link.
    pub async fn connect(cfg: VcdClientConfig) -> Result<Self, VcdError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .user_agent(cfg.user_agent.clone())
            .danger_accept_invalid_certs(cfg.insecure)
            .build()?;

        let login_url = discover_login_url(&http, &cfg).await?;
        tracing::debug!(login_url = %login_url, "discovered vCD login url");

        let (token, session) = authorize(&http, &cfg, login_url).await?;

        let org_link = session
            .links
            .for_name(&cfg.org, MIME_ORG, REL_DOWN)
            .ok_or_else(|| {
                VcdError::Session(format!(
                    "cannot find a Org endpoint: name={}, type={MIME_ORG}, rel={REL_DOWN}",
                    cfg.org
                ))
            })?;
        let org_href = parse_href(&org_link.href)?;

        let query_link = session
            .links
            .for_type(MIME_QUERY_LIST, REL_DOWN)
            .ok_or_else(|| {
                VcdError::Session(format!(
                    "cannot find a Query endpoint: type={MIME_QUERY_LIST}, rel={REL_DOWN}"
                ))
            })?;
        let query_href = parse_href(&query_link.href)?;

        let logout_link = session.links.for_type(MIME_EMPTY, REL_REMOVE).ok_or_else(|| {
            VcdError::Session(format!("cannot find a LogOut endpoint: rel={REL_REMOVE}"))
        })?;
        let logout_href = parse_href(&logout_link.href)?;

        tracing::info!(org = %cfg.org, user = %cfg.user, "authenticated against vCD");

        Ok(Self {
            inner: Arc::new(ClientInner {
                cfg,
                http,
                token,
                org_href,
                query_href,
                logout_href,
            }),
        })
    }

    /// Get a reference to the current configuration.
    #[must_use]
    pub fn config(&self) -> &VcdClientConfig {
        &self.inner.cfg
    }

    /// Close the session.
    ///
    /// # Errors
    ///
    /// Returns an error if vCD rejects the session deletion.
    pub async fn disconnect(&self) -> Result<(), VcdError> {
        self.send_empty(Method::DELETE, self.inner.logout_href.clone())
            .await
            .map_err(|e| VcdError::Session(format!("error processing session delete: {e}")))
    }

    /// Fetch the organization the session is logged into.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn get_org(&self) -> Result<Org, VcdError> {
        let record: OrgRecord = self.get_xml(self.inner.org_href.clone()).await?;
        Ok(Org::new(self.clone(), record))
    }

    /// Fetch the admin view of the organization, used for mutations.
    ///
    /// # Errors
    ///
    /// Returns an error if the org has no admin link or a request fails.
    pub async fn get_admin_org(&self) -> Result<AdminOrg, VcdError> {
        let org = self.get_org().await?;
        let url = org.record().links.url_for_type(MIME_ADMIN_ORG, REL_ALTERNATE)?;
        let record: AdminOrgRecord = self.get_xml(url).await?;
        Ok(AdminOrg::new(self.clone(), record))
    }

    /// Run a typed query against the query service.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn query(&self, params: &[(&str, &str)]) -> Result<QueryResultRecords, VcdError> {
        let url = with_query(&self.inner.query_href, params);
        self.get_xml(url).await
    }

    /// Name of the default storage profile of a VDC.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the VDC has no default profile.
    pub async fn find_default_storage_profile(&self, vdc_name: &str) -> Result<String, VcdError> {
        let filter = format!("(vdcName=={vdc_name};isDefaultStorageProfile==true)");
        let results = self
            .query(&[
                ("type", "orgVdcStorageProfile"),
                ("format", "records"),
                ("filter", &filter),
                ("filterEncoded", "true"),
            ])
            .await?;

        results
            .org_vdc_storage_profile_record
            .into_iter()
            .next()
            .map(|r| r.name)
            .ok_or_else(|| VcdError::NotFound {
                kind: "default storage profile",
                name: vdc_name.to_string(),
            })
    }

    // ------------------------------------------------------------------------
    // Raw request helpers
    // ------------------------------------------------------------------------

    /// GET an href and decode the XML response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status or undecodable body.
    pub async fn get_xml<T: DeserializeOwned>(&self, url: Url) -> Result<T, VcdError> {
        let resp = self.send(self.request(Method::GET, url)).await?;
        let body = resp.text().await?;
        from_xml(&body)
    }

    /// Send an optional XML payload and decode the XML response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status or undecodable body.
    pub async fn send_xml<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        content_type: Option<&str>,
        body: Option<String>,
    ) -> Result<T, VcdError> {
        let mut req = self.request(method, url);
        if let Some(ct) = content_type {
            req = req.header(reqwest::header::CONTENT_TYPE, ct);
        }
        if let Some(body) = body {
            req = req.body(body);
        }
        let resp = self.send(req).await?;
        let text = resp.text().await?;
        from_xml(&text)
    }

    /// Send a request and ignore the response body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-2xx status.
    pub async fn send_empty(&self, method: Method, url: Url) -> Result<(), VcdError> {
        self.send(self.request(method, url)).await?;
        Ok(())
    }

    /// Send an optional XML payload and wrap the returned `<Task>`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status or undecodable body.
    pub async fn execute_task_request(
        &self,
        method: Method,
        url: Url,
        content_type: Option<&str>,
        body: Option<String>,
    ) -> Result<Task, VcdError> {
        let record: TaskRecord = self.send_xml(method, url, content_type, body).await?;
        Ok(Task::from_record(self.clone(), record))
    }

    /// GET an href and return the raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-2xx status.
    pub async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, VcdError> {
        let resp = self.send(self.request(Method::GET, url)).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// PUT raw bytes to an href (file transfer endpoints).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-2xx status.
    pub async fn put_bytes(&self, url: Url, content: Vec<u8>) -> Result<(), VcdError> {
        let req = self
            .request(Method::PUT, url)
            .header(reqwest::header::CONTENT_LENGTH, content.len())
            .body(content);
        self.send(req).await?;
        Ok(())
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, self.inner.cfg.accept_header())
            .header(AUTH_HEADER, &self.inner.token)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, VcdError> {
        check_response(req.send().await?).await
    }
}

// ============================================================================
// Session bootstrap
// ============================================================================

async fn discover_login_url(http: &reqwest::Client, cfg: &VcdClientConfig) -> Result<Url, VcdError> {
    let mut versions_url = parse_href(&cfg.href)?;
    let path = format!("{}/versions", versions_url.path().trim_end_matches('/'));
    versions_url.set_path(&path);

    let resp = check_response(
        http.get(versions_url)
            .header(reqwest::header::ACCEPT, cfg.accept_header())
            .send()
            .await?,
    )
    .await?;
    let body = resp.text().await?;
    let versions: SupportedVersions = from_xml(&body)
        .map_err(|e| VcdError::Session(format!("error decoding versions response: {e}")))?;

    let info = versions
        .version_info
        .iter()
        .find(|v| v.version == cfg.api_version)
        .or_else(|| versions.version_info.last())
        .ok_or_else(|| VcdError::Session("couldn't find a LoginUrl in versions".to_string()))?;

    parse_href(&info.login_url)
}

async fn authorize(
    http: &reqwest::Client,
    cfg: &VcdClientConfig,
    login_url: Url,
) -> Result<(String, Session), VcdError> {
    let resp = check_response(
        http.post(login_url)
            .basic_auth(format!("{}@{}", cfg.user, cfg.org), Some(&cfg.password))
            .header(reqwest::header::ACCEPT, cfg.accept_header())
            .send()
            .await?,
    )
    .await?;

    let token = resp
        .headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| VcdError::Session(format!("login response has no {AUTH_HEADER} header")))?;

    let body = resp.text().await?;
    let session: Session = from_xml(&body)
        .map_err(|e| VcdError::Session(format!("error decoding session response: {e}")))?;

    Ok((token, session))
}

/// Turn a non-2xx response into [`VcdError::Api`].
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, VcdError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let (message, minor_code) = match from_xml::<VcdErrorBody>(&body) {
        Ok(err) if !err.message.is_empty() => (err.message, err.minor_error_code),
        _ => (body, String::new()),
    };

    Err(VcdError::Api {
        status,
        message,
        minor_code,
    })
}

/// Append query parameters to a URL.
#[must_use]
pub fn with_query(url: &Url, params: &[(&str, &str)]) -> Url {
    let mut url = url.clone();
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    url
}

// ============================================================================
// Error type
// ============================================================================

/// Error type for vCD client operations.
#[derive(Debug, thiserror::Error)]
pub enum VcdError {
    /// Missing required environment variable.
    #[error("missing required env var: {0}")]
    MissingEnv(&'static str),

    /// Invalid environment variable value.
    #[error("invalid env var {key}={value:?}: {reason}")]
    InvalidEnv {
        /// The environment variable key.
        key: &'static str,
        /// The environment variable value.
        value: String,
        /// The reason for invalidity.
        reason: &'static str,
    },

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// An href that is not an absolute URL.
    #[error("cannot parse url {href}: {reason}")]
    Url {
        /// The offending href.
        href: String,
        /// Parser message.
        reason: String,
    },

    /// XML encoding or decoding error.
    #[error("xml error: {0}")]
    Xml(String),

    /// Non-2xx API response.
    #[error("API Error: {status}: {message}")]
    Api {
        /// HTTP status code.
        status: StatusCode,
        /// Message from the `<Error>` body, or the raw body.
        message: String,
        /// vCD minor error code (e.g. `BUSY_ENTITY`), empty when unknown.
        minor_code: String,
    },

    /// A navigation link is missing from an object.
    #[error("object does not have a link: type={mime}, rel={rel}")]
    LinkNotFound {
        /// Expected MIME type.
        mime: String,
        /// Expected relation.
        rel: String,
    },

    /// A named object does not exist.
    #[error("{kind} '{name}' was not found")]
    NotFound {
        /// Object kind.
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// A deleted object is still listed.
    #[error("{kind} '{name}' is not deleted yet")]
    StillExists {
        /// Object kind.
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// A task reached a terminal status other than `success`.
    #[error("task {name} did not complete successfully: {description}")]
    TaskFailed {
        /// Task name.
        name: String,
        /// Task description or error message.
        description: String,
    },

    /// A retried operation ran out of time.
    #[error("timeout after {elapsed:?}{}", last_error_suffix(.last.as_deref()))]
    RetryTimeout {
        /// Time spent retrying.
        elapsed: Duration,
        /// Most recent error, if an attempt failed before the deadline.
        last: Option<Box<VcdError>>,
    },

    /// Login, logout or session navigation failure.
    #[error("session error: {0}")]
    Session(String),

    /// Invalid input to a client operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl VcdError {
    /// HTTP status of an API error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error means the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || self.status() == Some(StatusCode::NOT_FOUND)
    }
}

fn last_error_suffix(last: Option<&VcdError>) -> String {
    last.map_or_else(String::new, |e| format!(": {e}"))
}

// ============================================================================
// Helper functions
// ============================================================================

fn default_user_agent() -> String {
    format!("vcd-provider/{}", env!("CARGO_PKG_VERSION"))
}

#[inline]
fn must_env(key: &'static str) -> Result<String, VcdError> {
    env::var(key).map_err(|_| VcdError::MissingEnv(key))
}

#[inline]
fn parse_u64_env(key: &'static str, default: u64) -> Result<u64, VcdError> {
    env::var(key).map_or_else(
        |_| Ok(default),
        |v| {
            v.parse::<u64>().map_err(|_| VcdError::InvalidEnv {
                key,
                value: v,
                reason: "expected an unsigned integer",
            })
        },
    )
}

#[inline]
fn parse_bool_env(key: &'static str, default: bool) -> Result<bool, VcdError> {
    env::var(key).map_or_else(
        |_| Ok(default),
        |v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            _ => Err(VcdError::InvalidEnv {
                key,
                value: v,
                reason: "expected a boolean",
            }),
        },
    )
}
