//! CLI binary entry point for bulk-json-import

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use bulk_json_import::ReportFormat;
#[cfg(feature = "cli")]
use bulk_json_import::cli::commands::import::{
    InspectArgs, RunArgs, StageArgs, handle_inspect, handle_run, handle_stage,
};
#[cfg(feature = "cli")]
use bulk_json_import::cli::commands::purge::{PurgeArgs, handle_purge};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "bulk-json-import")]
#[command(about = "Bulk import of JSON records with a field mapping")]
#[command(version)]
struct Cli {
    /// Directory holding .bulk-import.toml and the staging directory
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Destination types the host offers (comma-separated, default: post,page)
    #[arg(long, global = true, value_delimiter = ',')]
    types: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Show the record count and the keys available for mapping
    Inspect {
        /// JSON file to inspect
        input: PathBuf,
    },
    /// Validate a JSON file and stage it for import
    Stage {
        /// JSON file to stage
        input: PathBuf,
        /// Destination type for the records
        #[arg(short = 't', long = "type")]
        record_type: String,
        /// Print the upload summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import staged records using a mapping file
    Run {
        /// Staging token printed by `stage`
        #[arg(long)]
        token: String,
        /// Destination type the records were staged for
        #[arg(short = 't', long = "type")]
        record_type: String,
        /// Mapping submission (.json, .yaml or .yml)
        #[arg(short, long)]
        mapping: PathBuf,
        /// Write the created records to this file as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: ReportFormatArg,
    },
    /// Remove staged uploads
    Purge {
        /// Only remove uploads whose time-to-live has passed
        #[arg(long)]
        expired: bool,
    },
}

#[cfg(feature = "cli")]
#[derive(clap::ValueEnum, Clone, Debug)]
enum ReportFormatArg {
    Text,
    Markdown,
    Json,
}

#[cfg(feature = "cli")]
fn convert_report_format(format: ReportFormatArg) -> ReportFormat {
    match format {
        ReportFormatArg::Text => ReportFormat::Text,
        ReportFormatArg::Markdown => ReportFormat::Markdown,
        ReportFormatArg::Json => ReportFormat::Json,
    }
}

#[cfg(feature = "cli")]
fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Inspect { input } => {
            let args = InspectArgs { input };
            handle_inspect(&args).context("inspect failed")?;
        }
        Commands::Stage {
            input,
            record_type,
            json,
        } => {
            let args = StageArgs {
                workspace: cli.workspace,
                input,
                record_type,
                record_types: cli.types,
                json,
            };
            handle_stage(&args).context("upload rejected")?;
        }
        Commands::Run {
            token,
            record_type,
            mapping,
            output,
            format,
        } => {
            let args = RunArgs {
                workspace: cli.workspace,
                token,
                record_type,
                mapping,
                output,
                format: convert_report_format(format),
                record_types: cli.types,
            };
            handle_run(&args).context("import aborted")?;
        }
        Commands::Purge { expired } => {
            let args = PurgeArgs {
                workspace: cli.workspace,
                expired_only: expired,
            };
            handle_purge(&args).context("purge failed")?;
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
