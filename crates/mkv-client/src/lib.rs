use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_TYPE, COOKIE};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_ENDPOINT_PATH: &str = "/cgi-bin/mkv.cgi";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Options for talking to a controller's web interface.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Whole-request timeout in milliseconds. A slow controller is skipped for the cycle.
    pub timeout_ms: u64,
    pub endpoint_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http client init failed: {0}")]
    Build(reqwest::Error),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("connection failed: {0}")]
    Connect(reqwest::Error),
    #[error("unexpected status {status} ({reason})")]
    Status { status: u16, reason: String },
    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),
}

/// Posts register requests to `http://<address><endpoint_path>` and returns the raw hex dump.
#[derive(Debug, Clone)]
pub struct MkvClient {
    config: ClientConfig,
    http: Client,
}

impl MkvClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(COOKIE, HeaderValue::from_static("LangName=English"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self, address: &str) -> String {
        format!("http://{}{}", address, self.config.endpoint_path)
    }

    /// One POST of `payload`, no retries.
    pub async fn fetch(&self, address: &str, payload: &'static str) -> Result<String, ClientError> {
        let url = self.endpoint(address);
        let response = self
            .http
            .post(&url)
            .body(payload)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "controller rejected register request");
            return Err(ClientError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                ClientError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                }
            } else {
                ClientError::Body(err)
            }
        })?;
        debug!(url = %url, bytes = body.len(), "register dump received");
        Ok(body)
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            ClientError::Connect(err)
        }
    }
}
