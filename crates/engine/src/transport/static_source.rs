//! In-memory collaborators.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FormCatalogSource, OptionSource, SubmissionTransport, SubmitResponse};
use crate::error::TransportError;
use crate::options::OptionKey;

/// Serves a fixed catalog document.
pub struct StaticCatalog {
    forms: serde_json::Value,
}

impl StaticCatalog {
    pub fn new(forms: serde_json::Value) -> Self {
        Self { forms }
    }
}

#[async_trait]
impl FormCatalogSource for StaticCatalog {
    async fn fetch_forms(&self) -> Result<serde_json::Value, TransportError> {
        Ok(self.forms.clone())
    }
}

/// Options keyed by endpoint, then by dependency value.
///
/// Loaded from JSON shaped `{ "/api/getStates": { "USA": ["CA", "NY"] } }`.
/// A lookup with no entry fails the way a 404 would.
#[derive(Debug, Clone, Default)]
pub struct StaticOptionSource {
    endpoints: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl StaticOptionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, endpoint: &str, value: &str, options: Vec<String>) {
        self.endpoints
            .entry(endpoint.to_string())
            .or_default()
            .insert(value.to_string(), options);
    }

    pub fn from_json(v: &serde_json::Value) -> Result<Self, String> {
        serde_json::from_value(v.clone())
            .map(|endpoints| StaticOptionSource { endpoints })
            .map_err(|e| format!("invalid options table: {}", e))
    }
}

#[async_trait]
impl OptionSource for StaticOptionSource {
    async fn fetch_options(&self, key: &OptionKey) -> Result<Vec<String>, TransportError> {
        self.endpoints
            .get(&key.endpoint)
            .and_then(|values| values.get(&key.value))
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: format!("{}?{}={}", key.endpoint, key.depends_on, key.value),
                status: 404,
                message: None,
            })
    }
}

/// Records every payload and answers with a canned response.
pub struct RecordingTransport {
    response: Result<SubmitResponse, TransportError>,
    submitted: Mutex<Vec<serde_json::Value>>,
}

impl RecordingTransport {
    pub fn accepting() -> Self {
        Self::with_response(Ok(SubmitResponse {
            status: "success".to_string(),
            message: "Form submitted successfully".to_string(),
        }))
    }

    pub fn with_response(response: Result<SubmitResponse, TransportError>) -> Self {
        Self {
            response,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Payloads received so far, oldest first.
    pub fn submitted(&self) -> Vec<serde_json::Value> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SubmissionTransport for RecordingTransport {
    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, TransportError> {
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(payload.clone());
        }
        self.response.clone()
    }
}
