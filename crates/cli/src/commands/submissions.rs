use std::process;

use dynform_engine::{HttpClient, TableData};

use crate::commands::runtime;
use crate::config::Config;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_submissions(config: &Config, output: OutputFormat, quiet: bool) {
    let client = HttpClient::new(config.http_config());
    let rt = runtime(output, quiet);
    let table = match rt.block_on(client.fetch_submissions()) {
        Ok(t) => t,
        Err(e) => {
            report_error(&format!("error fetching submissions: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&table).unwrap_or_default()
            );
        }
        OutputFormat::Text => print!("{}", render_table(&table)),
    }
}

/// Tab-separated rows under a header of the declared columns.
pub(crate) fn render_table(table: &TableData) -> String {
    let mut out = table.columns.join("\t");
    out.push('\n');
    for row in &table.data {
        let cells: Vec<String> = table
            .columns
            .iter()
            .map(|c| match row.get(c) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}
