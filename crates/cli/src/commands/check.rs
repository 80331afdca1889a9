use std::path::Path;
use std::process;

use crate::commands::{load_catalog, read_json};
use crate::{report_error, OutputFormat};

static CATALOG_SCHEMA_STR: &str = include_str!("../../../../docs/form-catalog-schema.json");

/// Structural check against the JSON Schema, then a load pass that reports
/// every field the engine would drop. Exits 1 if anything was found.
pub(crate) fn cmd_check(file: &Path, output: OutputFormat, quiet: bool) {
    let schema: serde_json::Value = match serde_json::from_str(CATALOG_SCHEMA_STR) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("internal error: failed to parse embedded catalog schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("internal error: failed to compile schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let doc = read_json(file, output, quiet);
    let schema_errors: Vec<String> = validator
        .iter_errors(&doc)
        .map(|e| e.to_string())
        .collect();

    // Only a non-array document fails loading outright.
    let catalog = load_catalog(&doc, output, quiet);
    let mut issues: Vec<String> = Vec::new();
    for r in &catalog.rejected {
        issues.push(format!(
            "form #{} ({}): {}",
            r.index + 1,
            r.form_id.as_deref().unwrap_or("no id"),
            r.error
        ));
    }
    for loaded in &catalog.forms {
        for issue in &loaded.issues {
            issues.push(format!(
                "{}: field '{}' dropped: {}",
                loaded.form.form_id, issue.path, issue.error
            ));
        }
    }

    let valid = schema_errors.is_empty() && issues.is_empty();
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": valid,
                "forms": catalog.forms.len(),
                "schema_errors": schema_errors,
                "issues": issues,
            });
            let rendered = serde_json::to_string_pretty(&json).unwrap_or_default();
            if valid {
                println!("{}", rendered);
            } else {
                eprintln!("{}", rendered);
            }
        }
        OutputFormat::Text => {
            if valid {
                if !quiet {
                    println!("valid ({} forms)", catalog.forms.len());
                }
            } else if !quiet {
                eprintln!("invalid catalog");
                for err in &schema_errors {
                    eprintln!("  - schema: {}", err);
                }
                for issue in &issues {
                    eprintln!("  - {}", issue);
                }
            }
        }
    }

    if !valid {
        process::exit(1);
    }
}
