//! `dynform fill`: replay an answer script through a form session.
//!
//! The script is a JSON array applied in order:
//!
//! ```json
//! [
//!   { "path": "address.country", "value": "USA" },
//!   { "path": "address.state", "value": "California" },
//!   { "path": "smoker", "value": null }
//! ]
//! ```
//!
//! A `null` value clears the answer. Dependent options are settled after
//! every step, so a later step can pick from options a previous one loaded.

use std::collections::BTreeMap;
use std::path::Path;
use std::process;
use std::sync::Arc;

use dynform_engine::{
    AnswerValue, FieldPath, FormEngine, FormError, FormSession, HttpClient, OptionSource,
    StaticOptionSource, SubmissionOutcome, ValidationError,
};

use crate::commands::{fetch_catalog, load_catalog, read_json, runtime};
use crate::config::Config;
use crate::{report_error, OutputFormat};

pub(crate) struct FillArgs<'a> {
    pub form_id: &'a str,
    pub answers: &'a Path,
    pub catalog: Option<&'a Path>,
    pub options: Option<&'a Path>,
    pub submit: bool,
}

/// One line of the answer script.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScriptStep {
    pub path: FieldPath,
    pub value: Option<AnswerValue>,
}

pub(crate) fn parse_script(doc: &serde_json::Value) -> Result<Vec<ScriptStep>, String> {
    let steps = doc
        .as_array()
        .ok_or_else(|| "answer script must be a JSON array".to_string())?;
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let path = step
                .get("path")
                .and_then(|p| p.as_str())
                .ok_or_else(|| format!("answer #{}: missing 'path'", i + 1))?;
            let raw = step.get("value").unwrap_or(&serde_json::Value::Null);
            let value = match raw {
                serde_json::Value::Null => None,
                other => Some(AnswerValue::from_json(other).ok_or_else(|| {
                    format!("answer #{}: '{}' is not a usable answer value", i + 1, other)
                })?),
            };
            Ok(ScriptStep {
                path: FieldPath::new(path),
                value,
            })
        })
        .collect()
}

pub(crate) fn cmd_fill(args: &FillArgs<'_>, config: &Config, output: OutputFormat, quiet: bool) {
    let script = match parse_script(&read_json(args.answers, output, quiet)) {
        Ok(s) => s,
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    };
    let options: Arc<dyn OptionSource> = match args.options {
        Some(path) => match StaticOptionSource::from_json(&read_json(path, output, quiet)) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                report_error(&format!("'{}': {}", path.display(), e), output, quiet);
                process::exit(1);
            }
        },
        None => Arc::new(HttpClient::new(config.http_config())),
    };
    let transport = Arc::new(HttpClient::new(config.http_config()));

    let rt = runtime(output, quiet);
    rt.block_on(async {
        let doc = fetch_catalog(args.catalog, config, output, quiet).await;
        let catalog = load_catalog(&doc, output, quiet);
        let Some(loaded) = catalog.find(args.form_id) else {
            report_error(&format!("unknown form '{}'", args.form_id), output, quiet);
            process::exit(1);
        };

        let mut session = FormSession::new(FormEngine::new(loaded.clone()), options, transport);
        session.settle().await;

        for (i, step) in script.iter().enumerate() {
            let result = match &step.value {
                Some(value) => session.set_answer(&step.path, value.clone()),
                None => session.clear_answer(&step.path),
            };
            if let Err(e) = result {
                report_error(
                    &format!("answer #{} ({}): {}", i + 1, step.path, e),
                    output,
                    quiet,
                );
                process::exit(1);
            }
            session.settle().await;
        }

        if args.submit {
            submit(&mut session, output, quiet).await;
        } else {
            let errors = session.engine().validate();
            if !errors.is_empty() {
                print_errors(args.form_id, &errors, output, quiet);
                process::exit(1);
            }
            print_payload(args.form_id, &session.engine().payload(), None, output);
        }
    });
}

async fn submit(session: &mut FormSession, output: OutputFormat, quiet: bool) {
    let form_id = session.engine().form().form_id.clone();
    match session.submit().await {
        Ok(SubmissionOutcome::Success {
            response,
            submitted,
        }) => {
            let response = serde_json::json!({
                "status": response.status,
                "message": response.message,
            });
            print_payload(&form_id, &submitted, Some(&response), output);
        }
        Ok(SubmissionOutcome::Failure { error }) => {
            report_error(&error.message, output, quiet);
            process::exit(1);
        }
        Err(FormError::ValidationFailed { .. }) => {
            print_errors(&form_id, session.engine().errors(), output, quiet);
            process::exit(1);
        }
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn print_errors(
    form_id: &str,
    errors: &BTreeMap<FieldPath, ValidationError>,
    output: OutputFormat,
    quiet: bool,
) {
    match output {
        OutputFormat::Json => {
            let list: Vec<serde_json::Value> = errors
                .iter()
                .map(|(path, err)| {
                    serde_json::json!({
                        "path": path,
                        "message": err.to_string(),
                        "key": err.message_key(),
                    })
                })
                .collect();
            let json = serde_json::json!({
                "form": form_id,
                "valid": false,
                "errors": list,
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            eprintln!("{}: {} field(s) need attention", form_id, errors.len());
            for (path, err) in errors {
                eprintln!("  - {}: {}", path, err);
            }
        }
    }
}

fn print_payload(
    form_id: &str,
    payload: &serde_json::Value,
    response: Option<&serde_json::Value>,
    output: OutputFormat,
) {
    match output {
        OutputFormat::Json => {
            let mut json = serde_json::json!({
                "form": form_id,
                "valid": true,
                "payload": payload,
            });
            if let Some(r) = response {
                json["response"] = r.clone();
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if let Some(r) = response {
                println!(
                    "submitted: {}",
                    r.get("message").and_then(|m| m.as_str()).unwrap_or("")
                );
            }
            println!(
                "{}",
                serde_json::to_string_pretty(payload).unwrap_or_default()
            );
        }
    }
}
