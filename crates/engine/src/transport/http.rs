//! REST client for the form backend.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime.

use async_trait::async_trait;

use super::{
    extract_options, FormCatalogSource, OptionSource, SubmissionTransport, SubmitResponse,
    TableData,
};
use crate::error::TransportError;
use crate::options::OptionKey;

pub const DEFAULT_BASE_URL: &str = "https://assignment.devotel.io";
pub const DEFAULT_FORMS_PATH: &str = "/api/insurance/forms";
pub const DEFAULT_SUBMIT_PATH: &str = "/api/insurance/forms/submit";
pub const DEFAULT_SUBMISSIONS_PATH: &str = "/api/insurance/forms/submissions";

/// Where the backend lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub base_url: String,
    pub forms_path: String,
    pub submit_path: String,
    pub submissions_path: String,
    pub auth_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            forms_path: DEFAULT_FORMS_PATH.to_string(),
            submit_path: DEFAULT_SUBMIT_PATH.to_string(),
            submissions_path: DEFAULT_SUBMISSIONS_PATH.to_string(),
            auth_token: None,
        }
    }
}

impl HttpConfig {
    /// Override with `DYNFORM_BASE_URL` / `DYNFORM_AUTH_TOKEN` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DYNFORM_BASE_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(token) = std::env::var("DYNFORM_AUTH_TOKEN") {
            if !token.is_empty() {
                self.auth_token = Some(token);
            }
        }
        self
    }
}

/// Talks to the form backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClient {
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Self {
        HttpClient { config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Join the base URL and an endpoint path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn fetch_submissions(&self) -> Result<TableData, TransportError> {
        let url = self.url(&self.config.submissions_path);
        let body = self.send(Method::Get, url.clone(), Vec::new(), None).await?;
        serde_json::from_value(body).map_err(|e| TransportError::Decode {
            url,
            message: e.to_string(),
        })
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, TransportError> {
        let auth_token = self.config.auth_token.clone();
        tracing::debug!(method = method.as_str(), %url, "http request");

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let result = match method {
                Method::Get => {
                    let mut request = agent
                        .get(&url)
                        .config()
                        .http_status_as_error(false)
                        .build()
                        .header("Content-Type", "application/json");
                    if let Some(ref token) = auth_token {
                        request = request.header("Authorization", &format!("Bearer {}", token));
                    }
                    for (k, v) in &query {
                        request = request.query(k, v);
                    }
                    request.call()
                }
                Method::Post => {
                    let mut request = agent
                        .post(&url)
                        .config()
                        .http_status_as_error(false)
                        .build()
                        .header("Content-Type", "application/json");
                    if let Some(ref token) = auth_token {
                        request = request.header("Authorization", &format!("Bearer {}", token));
                    }
                    request.send_json(body.unwrap_or(serde_json::Value::Null))
                }
            };

            let response = result.map_err(|e| TransportError::Request {
                url: url.clone(),
                message: e.to_string(),
            })?;
            let status = response.status().as_u16();
            let parsed: Result<serde_json::Value, _> = response.into_body().read_json();

            if !(200..300).contains(&status) {
                let message = parsed.ok().and_then(|b| {
                    b.get("message")
                        .and_then(|m| m.as_str())
                        .map(|s| s.to_string())
                });
                return Err(TransportError::Status {
                    url,
                    status,
                    message,
                });
            }

            parsed.map_err(|e| TransportError::Decode {
                url,
                message: format!("failed to parse response as JSON: {}", e),
            })
        })
        .await
        .map_err(|e| TransportError::Join(e.to_string()))?
    }
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[async_trait]
impl FormCatalogSource for HttpClient {
    async fn fetch_forms(&self) -> Result<serde_json::Value, TransportError> {
        let url = self.url(&self.config.forms_path);
        self.send(Method::Get, url, Vec::new(), None).await
    }
}

#[async_trait]
impl OptionSource for HttpClient {
    async fn fetch_options(&self, key: &OptionKey) -> Result<Vec<String>, TransportError> {
        let url = self.url(&key.endpoint);
        let query = vec![(key.depends_on.clone(), key.value.clone())];
        let body = self.send(Method::Get, url.clone(), query, None).await?;
        extract_options(&body).map_err(|message| TransportError::Decode { url, message })
    }
}

#[async_trait]
impl SubmissionTransport for HttpClient {
    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, TransportError> {
        let url = self.url(&self.config.submit_path);
        let body = self
            .send(Method::Post, url.clone(), Vec::new(), Some(payload.clone()))
            .await?;
        serde_json::from_value(body).map_err(|e| TransportError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
