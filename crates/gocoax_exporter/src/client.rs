//! HTTP client for the goCoax adapter's management API.
//!
//! The adapter exposes numbered commands at `POST /ms/0/<cmd>` that take a
//! JSON `{"data":[...]}` body and answer with `{"data":["0x..", ...]}`.
//! Every request carries basic auth; the session cookie and CSRF token are
//! obtained from the PHY rates page on first use.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moca_core::{MocaVersion, NodeMask};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const CMD_LOCAL_INFO: &str = "0x15";
const CMD_NODE_INFO: &str = "0x16";
const CMD_FMR_INFO: &str = "0x1D";

const LOCAL_INFO_MIN_WORDS: usize = 13;
const NODE_INFO_MIN_WORDS: usize = 5;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(100);

const CSRF_COOKIES: [&str; 2] = ["XSRF-TOKEN", "csrf_token"];

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status code {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid device address {0}")]
    Address(String),
    #[error("insufficient data elements: got {got}, expected at least {expected}")]
    ShortResponse { expected: usize, got: usize },
    #[error("failed to parse hex value {0:?}")]
    BadHex(String),
}

impl ClientError {
    /// Connection failures, timeouts and 5xx answers may succeed on retry.
    fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout(),
            ClientError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Answer to the local info command (0x15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalInfo {
    pub my_node: u8,
    pub nc_node: u8,
    pub network_version: MocaVersion,
    pub node_mask: NodeMask,
}

/// Answer to the per-node info command (0x16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub node: u8,
    pub version: MocaVersion,
}

/// The three queries a scrape needs from an adapter.
pub trait DeviceApi: Send + Sync {
    fn local_info(&self) -> impl Future<Output = Result<LocalInfo, ClientError>> + Send;

    fn node_info(&self, node: u8) -> impl Future<Output = Result<NodeInfo, ClientError>> + Send;

    /// Raw FMR words for the nodes in `node_mask`; `version` is 1 or 2.
    fn fmr_info(
        &self,
        node_mask: NodeMask,
        version: u32,
    ) -> impl Future<Output = Result<Vec<u32>, ClientError>> + Send;
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    data: &'a [u32],
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<String>,
}

pub struct DeviceClient {
    base_url: Url,
    http: reqwest::Client,
    jar: Arc<Jar>,
    username: String,
    password: String,
    session_open: AtomicBool,
}

impl DeviceClient {
    pub fn new(
        address: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(&format!("http://{address}/"))
            .map_err(|_| ClientError::Address(address.to_string()))?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            base_url,
            http,
            jar,
            username: username.to_string(),
            password: password.to_string(),
            session_open: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|_| ClientError::Address(self.base_url.to_string()))
    }

    /// Load the PHY rates page so the adapter hands out its session cookies.
    pub async fn open_session(&self) -> Result<(), ClientError> {
        let url = self.url("phyRates.html")?;
        debug!(url = %url, "Opening device session");

        let resp = self
            .http
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }

        debug!(
            url = %url,
            csrf = self.csrf_token(&url).is_some(),
            "Device session opened"
        );
        self.session_open.store(true, Ordering::Release);
        Ok(())
    }

    fn csrf_token(&self, url: &Url) -> Option<String> {
        let header = self.jar.cookies(url)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            CSRF_COOKIES.contains(&name).then(|| value.to_string())
        })
    }

    /// Run a command, retrying transient failures with exponential backoff.
    async fn command(&self, cmd: &str, data: &[u32]) -> Result<Vec<u32>, ClientError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.command_once(cmd, data).await {
                Ok(words) => return Ok(words),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    warn!(cmd, attempt, error = %e, backoff_ms = backoff.as_millis() as u64, "Retrying device request");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn command_once(&self, cmd: &str, data: &[u32]) -> Result<Vec<u32>, ClientError> {
        if !self.session_open.load(Ordering::Acquire) {
            self.open_session().await?;
        }

        let url = self.url(&format!("ms/0/{cmd}"))?;
        let body = serde_json::to_vec(&ApiRequest { data })?;

        // The adapter's CGI reads the raw JSON body but expects a form content type.
        let mut req = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "text/html, */*")
            .basic_auth(&self.username, Some(&self.password))
            .body(body);
        if let Some(token) = self.csrf_token(&url) {
            req = req.header("X-CSRF-TOKEN", token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                self.session_open.store(false, Ordering::Release);
            }
            return Err(ClientError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: ApiResponse = serde_json::from_slice(&bytes)?;
        let words = parse_hex_words(&parsed.data)?;
        debug!(cmd, words = words.len(), "Device command complete");
        Ok(words)
    }
}

impl DeviceApi for DeviceClient {
    async fn local_info(&self) -> Result<LocalInfo, ClientError> {
        let data = self.command(CMD_LOCAL_INFO, &[]).await?;
        require_len(&data, LOCAL_INFO_MIN_WORDS)?;
        Ok(LocalInfo {
            my_node: (data[0] & 0xFF) as u8,
            nc_node: (data[1] & 0xFF) as u8,
            network_version: MocaVersion((data[11] & 0xFF) as u8),
            node_mask: NodeMask((data[12] & 0xFFFF) as u16),
        })
    }

    async fn node_info(&self, node: u8) -> Result<NodeInfo, ClientError> {
        let data = self.command(CMD_NODE_INFO, &[u32::from(node)]).await?;
        require_len(&data, NODE_INFO_MIN_WORDS)?;
        Ok(NodeInfo {
            node,
            version: MocaVersion((data[4] & 0xFF) as u8),
        })
    }

    async fn fmr_info(&self, node_mask: NodeMask, version: u32) -> Result<Vec<u32>, ClientError> {
        self.command(CMD_FMR_INFO, &[u32::from(node_mask.0), version])
            .await
    }
}

fn require_len(data: &[u32], expected: usize) -> Result<(), ClientError> {
    if data.len() < expected {
        return Err(ClientError::ShortResponse {
            expected,
            got: data.len(),
        });
    }
    Ok(())
}

/// Parse `"0x0000abcd"` strings into words.
pub fn parse_hex_words(values: &[String]) -> Result<Vec<u32>, ClientError> {
    values
        .iter()
        .map(|s| {
            let digits = s
                .trim()
                .strip_prefix("0x")
                .or_else(|| s.trim().strip_prefix("0X"))
                .ok_or_else(|| ClientError::BadHex(s.clone()))?;
            u32::from_str_radix(digits, 16).map_err(|_| ClientError::BadHex(s.clone()))
        })
        .collect()
}
