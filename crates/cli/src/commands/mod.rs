pub(crate) mod check;
pub(crate) mod fill;
pub(crate) mod forms;
pub(crate) mod submissions;

use std::path::Path;
use std::process;

use dynform_engine::{FormCatalogSource, HttpClient, StaticCatalog};

use crate::config::Config;
use crate::{report_error, OutputFormat};

/// Read and parse a JSON file, exiting with a report on failure.
pub(crate) fn read_json(path: &Path, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to create tokio runtime: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

/// Fetch the raw catalog document from a file or from the backend.
pub(crate) async fn fetch_catalog(
    catalog: Option<&Path>,
    config: &Config,
    output: OutputFormat,
    quiet: bool,
) -> serde_json::Value {
    let source: Box<dyn FormCatalogSource> = match catalog {
        Some(path) => Box::new(StaticCatalog::new(read_json(path, output, quiet))),
        None => Box::new(HttpClient::new(config.http_config())),
    };
    match source.fetch_forms().await {
        Ok(doc) => doc,
        Err(e) => {
            report_error(&format!("error fetching forms: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Load a catalog document, exiting if it is not a list of forms.
pub(crate) fn load_catalog(
    doc: &serde_json::Value,
    output: OutputFormat,
    quiet: bool,
) -> dynform_schema::Catalog {
    match dynform_schema::load_catalog(doc) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("invalid catalog: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
