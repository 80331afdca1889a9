mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use commands::check::cmd_check;
use commands::fill::cmd_fill;
use commands::forms::cmd_forms;
use commands::submissions::cmd_submissions;
use config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Dynamic form engine: load form schemas, fill and submit forms.
#[derive(Parser)]
#[command(
    name = "dynform",
    version,
    about = "Dynamic form engine: load form schemas, fill and submit forms"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a dynform.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the forms in a catalog with field counts
    Forms {
        /// Read the catalog from a JSON file instead of the backend
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Check a catalog file against the form JSON Schema and report field issues
    Check {
        /// Path to the catalog JSON file
        file: PathBuf,
    },

    /// Replay an answer script through a form and print the payload
    Fill {
        /// Form ID to fill
        #[arg(long)]
        form: String,
        /// JSON file with an ordered list of {"path", "value"} answers
        #[arg(long)]
        answers: PathBuf,
        /// Read the catalog from a JSON file instead of the backend
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Serve dependent options from a JSON table instead of the backend
        #[arg(long)]
        options: Option<PathBuf>,
        /// Send the payload to the submission endpoint
        #[arg(long)]
        submit: bool,
    },

    /// List submitted forms
    Submissions,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Forms { catalog } => {
            cmd_forms(catalog.as_deref(), &config, cli.output, cli.quiet);
        }
        Commands::Check { file } => {
            cmd_check(&file, cli.output, cli.quiet);
        }
        Commands::Fill {
            form,
            answers,
            catalog,
            options,
            submit,
        } => {
            cmd_fill(
                &commands::fill::FillArgs {
                    form_id: &form,
                    answers: &answers,
                    catalog: catalog.as_deref(),
                    options: options.as_deref(),
                    submit,
                },
                &config,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Submissions => {
            cmd_submissions(&config, cli.output, cli.quiet);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
