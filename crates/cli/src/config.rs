//! `dynform.toml` configuration.
//!
//! # Example
//!
//! ```toml
//! [api]
//! base_url = "https://assignment.devotel.io"
//! forms_path = "/api/insurance/forms"
//! submit_path = "/api/insurance/forms/submit"
//! submissions_path = "/api/insurance/forms/submissions"
//! auth_token = "..."
//! ```
//!
//! Every key is optional. `DYNFORM_BASE_URL` and `DYNFORM_AUTH_TOKEN`
//! override the file.

use std::path::{Path, PathBuf};

use dynform_engine::HttpConfig;
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "dynform.toml";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    #[serde(default)]
    pub api: ApiConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ApiConfig {
    pub base_url: Option<String>,
    pub forms_path: Option<String>,
    pub submit_path: Option<String>,
    pub submissions_path: Option<String>,
    pub auth_token: Option<String>,
}

impl Config {
    /// Load `path`, or `dynform.toml` in the working directory if present.
    /// An explicit path must exist; the implicit one may not.
    pub(crate) fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.clone(),
            message,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub(crate) fn parse(content: &str) -> Result<Config, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Defaults, then the file, then the environment.
    pub(crate) fn http_config(&self) -> HttpConfig {
        let mut http = HttpConfig::default();
        let api = self.api.clone();
        if let Some(v) = api.base_url {
            http.base_url = v;
        }
        if let Some(v) = api.forms_path {
            http.forms_path = v;
        }
        if let Some(v) = api.submit_path {
            http.submit_path = v;
        }
        if let Some(v) = api.submissions_path {
            http.submissions_path = v;
        }
        http.auth_token = api.auth_token;
        http.with_env_overrides()
    }
}
