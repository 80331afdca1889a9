//! Dependent option resolution for selects with `dynamicOptions`.
//!
//! Options are cached per [`OptionKey`] (endpoint, dependency field id,
//! method and the dependency's current value). Each dynamic select owns a
//! slot recording the last dependency value it observed and the key it is
//! currently bound to. A fetch result is stored under its key, and only
//! selects whose slot still points at that key see it, so a superseded
//! fetch never reaches a field that has moved on.
//!
//! This module performs no I/O: it hands out [`OptionRequest`]s and takes
//! back [`OptionResponse`]s.

use std::collections::{BTreeMap, HashMap};

use dynform_schema::{DynamicOptions, HttpMethod};
use serde::Serialize;

use crate::error::OptionFetchError;
use crate::value::FieldPath;

/// Memoization key for one dependent-options fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionKey {
    pub endpoint: String,
    pub depends_on: String,
    pub method: HttpMethod,
    pub value: String,
}

impl OptionKey {
    pub fn new(dynamic: &DynamicOptions, value: &str) -> Self {
        OptionKey {
            endpoint: dynamic.endpoint.clone(),
            depends_on: dynamic.depends_on.clone(),
            method: dynamic.method,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub u64);

/// A fetch the host must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRequest {
    pub id: RequestId,
    pub key: OptionKey,
}

/// The outcome of an [`OptionRequest`], delivered back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionResponse {
    pub id: RequestId,
    pub result: Result<Vec<String>, OptionFetchError>,
}

/// What a select currently offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "options", rename_all = "snake_case")]
pub enum OptionsView {
    /// Options fixed in the schema (selects, radios and checkboxes).
    Static(Vec<String>),
    /// Dynamic select whose dependency has no value yet.
    Idle,
    Pending,
    Ready(Vec<String>),
    Failed(OptionFetchError),
}

impl OptionsView {
    /// Selectable values; empty while idle, pending or failed.
    pub fn options(&self) -> &[String] {
        match self {
            OptionsView::Static(options) | OptionsView::Ready(options) => options,
            OptionsView::Idle | OptionsView::Pending | OptionsView::Failed(_) => &[],
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OptionsView::Pending)
    }
}

/// Result of feeding a select's dependency value to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Unchanged,
    /// The dependency value differs from the last one observed. The
    /// select's own answer must be cleared; `request` is the fetch to
    /// issue, if the options are neither cached nor already in flight.
    Changed { request: Option<OptionRequest> },
}

#[derive(Debug, Clone)]
enum CacheStatus {
    Pending(RequestId),
    Ready(Vec<String>),
    Failed(OptionFetchError),
}

#[derive(Debug, Clone, Default)]
struct Slot {
    observed: Option<String>,
    key: Option<OptionKey>,
}

/// Option cache plus per-field slots for one form instance.
#[derive(Debug, Default)]
pub struct OptionResolver {
    cache: HashMap<OptionKey, CacheStatus>,
    slots: BTreeMap<FieldPath, Slot>,
    in_flight: HashMap<RequestId, OptionKey>,
    next_id: u64,
}

impl OptionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the dependency value the select at `path` currently sees.
    ///
    /// Values are compared by content; an empty value means "no selection"
    /// and never produces a request.
    pub fn observe(
        &mut self,
        path: &FieldPath,
        dynamic: &DynamicOptions,
        value: Option<&str>,
    ) -> Observation {
        let value = value.filter(|v| !v.is_empty());
        if let Some(slot) = self.slots.get(path) {
            if slot.observed.as_deref() == value {
                return Observation::Unchanged;
            }
        }

        let key = value.map(|v| OptionKey::new(dynamic, v));
        let request = key.as_ref().and_then(|k| self.request_if_needed(k));
        self.slots.insert(
            path.clone(),
            Slot {
                observed: value.map(|v| v.to_string()),
                key,
            },
        );
        Observation::Changed { request }
    }

    /// Issue a fresh request for the select at `path` if its current options
    /// failed to load.
    pub fn retry(&mut self, path: &FieldPath) -> Option<OptionRequest> {
        let key = self.slots.get(path)?.key.clone()?;
        match self.cache.get(&key) {
            Some(CacheStatus::Failed(_)) => self.request_if_needed(&key),
            _ => None,
        }
    }

    /// Store a fetch result. Returns the selects it was applied to; an empty
    /// list means the result was stale or superseded.
    pub fn complete(&mut self, response: OptionResponse) -> Vec<FieldPath> {
        let Some(key) = self.in_flight.remove(&response.id) else {
            tracing::debug!(id = response.id.0, "ignoring unknown option response");
            return Vec::new();
        };
        match self.cache.get(&key) {
            Some(CacheStatus::Pending(current)) if *current == response.id => {}
            _ => {
                tracing::debug!(id = response.id.0, endpoint = %key.endpoint, "ignoring replaced option response");
                return Vec::new();
            }
        }

        let status = match response.result {
            Ok(options) => CacheStatus::Ready(options),
            Err(err) => {
                tracing::warn!(endpoint = %key.endpoint, error = %err, "option fetch failed");
                CacheStatus::Failed(err)
            }
        };
        self.cache.insert(key.clone(), status);

        let applied: Vec<FieldPath> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.key.as_ref() == Some(&key))
            .map(|(path, _)| path.clone())
            .collect();
        if applied.is_empty() {
            tracing::debug!(endpoint = %key.endpoint, "option response superseded; cached only");
        }
        applied
    }

    /// Current options for the dynamic select at `path`.
    pub fn view(&self, path: &FieldPath) -> OptionsView {
        let Some(key) = self.slots.get(path).and_then(|s| s.key.as_ref()) else {
            return OptionsView::Idle;
        };
        match self.cache.get(key) {
            Some(CacheStatus::Pending(_)) => OptionsView::Pending,
            Some(CacheStatus::Ready(options)) => OptionsView::Ready(options.clone()),
            Some(CacheStatus::Failed(err)) => OptionsView::Failed(err.clone()),
            None => OptionsView::Idle,
        }
    }

    /// Forget every slot, keeping the cache. Used when a form is reset.
    pub fn reset_slots(&mut self) {
        self.slots.clear();
    }

    /// Number of fetches issued and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn request_if_needed(&mut self, key: &OptionKey) -> Option<OptionRequest> {
        match self.cache.get(key) {
            Some(CacheStatus::Ready(_)) | Some(CacheStatus::Pending(_)) => None,
            Some(CacheStatus::Failed(_)) | None => {
                self.next_id += 1;
                let id = RequestId(self.next_id);
                self.cache.insert(key.clone(), CacheStatus::Pending(id));
                self.in_flight.insert(id, key.clone());
                tracing::debug!(id = id.0, endpoint = %key.endpoint, "issuing option fetch");
                Some(OptionRequest {
                    id,
                    key: key.clone(),
                })
            }
        }
    }
}
