use std::path::Path;

use crate::commands::{fetch_catalog, load_catalog, runtime};
use crate::config::Config;
use crate::OutputFormat;

pub(crate) fn cmd_forms(
    catalog: Option<&Path>,
    config: &Config,
    output: OutputFormat,
    quiet: bool,
) {
    let rt = runtime(output, quiet);
    let doc = rt.block_on(fetch_catalog(catalog, config, output, quiet));
    let catalog = load_catalog(&doc, output, quiet);
    let summaries = catalog.summaries();

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "forms": summaries,
                "rejected": catalog.rejected,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if summaries.is_empty() && !quiet {
                println!("no forms");
            }
            for s in &summaries {
                println!(
                    "{:>3}. {} ({}) -- {} fields, {} required",
                    s.order, s.title, s.form_id, s.total_fields, s.required_fields
                );
            }
            if !quiet {
                for r in &catalog.rejected {
                    eprintln!(
                        "skipped form #{} ({}): {}",
                        r.index + 1,
                        r.form_id.as_deref().unwrap_or("no id"),
                        r.error
                    );
                }
            }
        }
    }
}
