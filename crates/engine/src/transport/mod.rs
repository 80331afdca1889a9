//! Collaborators the engine calls out to.
//!
//! Three seams, each an async trait:
//! - [`FormCatalogSource`] -- fetches the catalog of form schemas
//! - [`OptionSource`] -- fetches dependent options for one [`OptionKey`]
//! - [`SubmissionTransport`] -- sends the final payload
//!
//! [`http::HttpClient`] implements all three against the REST backend;
//! [`static_source`] holds in-memory versions for offline use and tests.

#[cfg(feature = "http")]
pub mod http;
pub mod static_source;

use async_trait::async_trait;
use dynform_schema::DynamicOptions;
use serde::{Deserialize, Serialize};

use crate::error::{OptionFetchError, TransportError};
use crate::options::OptionKey;

// ──────────────────────────────────────────────
// Wire shapes
// ──────────────────────────────────────────────

/// Body returned by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Submitted rows as served by the submissions endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
}

// ──────────────────────────────────────────────
// Traits
// ──────────────────────────────────────────────

/// Source of form schemas. Returns raw JSON; loading happens in
/// `dynform-schema`.
#[async_trait]
pub trait FormCatalogSource: Send + Sync {
    async fn fetch_forms(&self) -> Result<serde_json::Value, TransportError>;
}

/// Fetches the options of a dependent select.
#[async_trait]
pub trait OptionSource: Send + Sync {
    async fn fetch_options(&self, key: &OptionKey) -> Result<Vec<String>, TransportError>;
}

/// Delivers a submission payload.
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, TransportError>;
}

/// One-shot resolution of a dependent select's options.
///
/// An empty dependency value short-circuits to no options without calling
/// the source.
pub async fn resolve_options(
    source: &dyn OptionSource,
    dynamic: &DynamicOptions,
    value: &str,
) -> Result<Vec<String>, OptionFetchError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    let key = OptionKey::new(dynamic, value);
    source
        .fetch_options(&key)
        .await
        .map_err(|e| OptionFetchError::from_transport(&key.endpoint, &e))
}

/// Pull the option list out of a dependent-options response.
///
/// Accepts a bare string array, `{ "options": [...] }`, or the
/// `{ "country": ..., "states": [...] }` shape the insurance backend serves.
pub fn extract_options(body: &serde_json::Value) -> Result<Vec<String>, String> {
    let list = match body {
        serde_json::Value::Array(_) => body,
        serde_json::Value::Object(obj) => obj
            .get("options")
            .or_else(|| obj.get("states"))
            .ok_or_else(|| "response has neither 'options' nor 'states'".to_string())?,
        _ => return Err("response is not a JSON object".to_string()),
    };
    list.as_array()
        .ok_or_else(|| "option list is not an array".to_string())?
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| format!("option {} is not a string", v))
        })
        .collect()
}
