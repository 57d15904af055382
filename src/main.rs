mod bootstrap;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use monthly_report_lib::{
    reset_period_at_db_path, run_monthly_import_at_db_path, Period, RunProgress, RunState,
    Settings, DEFAULT_CHUNK_SIZE,
};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// Load a month of report exports into the reporting database
#[derive(Parser, Debug)]
#[command(name = "monthly-report-loader", version)]
struct Cli {
    /// Directory holding one `YYYYMM` folder per month
    #[arg(long, env = "MONTHLY_REPORT_DATA_ROOT", default_value = "data", global = true)]
    data_root: PathBuf,

    /// SQLite database file (defaults to monthly_report.db under the data root)
    #[arg(long, env = "MONTHLY_REPORT_DB", global = true)]
    db_path: Option<PathBuf>,

    /// Rows per INSERT statement
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, global = true)]
    chunk_size: usize,

    /// Logging level
    #[arg(long, env = "MONTHLY_REPORT_LOG", default_value = "INFO", global = true)]
    log_level: String,

    /// Indent the JSON summary
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalise, classify and load the files under <data-root>/<YYYYMM>
    Run { year_month: String },
    /// Delete every table's rows for a month
    Reset {
        year_month: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum CliResponse {
    #[serde(rename = "success")]
    Success { payload: Value },
    #[serde(rename = "error")]
    Error { message: String },
}

fn print_response(resp: &CliResponse, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(resp)?
    } else {
        serde_json::to_string(resp)?
    };
    println!("{text}");
    Ok(())
}

fn print_progress(progress: RunProgress) {
    let percent = (progress.fraction * 100.0).round();
    match progress.state {
        RunState::Loading { done, total } => eprintln!("[{percent:>3}%] loading {done}/{total}"),
        RunState::Failed { reason } => eprintln!("[{percent:>3}%] failed: {reason}"),
        other => eprintln!("[{percent:>3}%] {other:?}"),
    }
}

fn execute(cli: &Cli, settings: &Settings) -> Result<Value> {
    match &cli.command {
        Command::Run { year_month } => {
            let summary = run_monthly_import_at_db_path(settings, year_month, &mut print_progress)?;
            Ok(serde_json::to_value(summary)?)
        }
        Command::Reset { year_month, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete all loaded data for {year_month}?"))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    bail!("reset of {year_month} cancelled");
                }
            }
            let summary = reset_period_at_db_path(settings, year_month)?;
            Ok(serde_json::to_value(summary)?)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let year_month = match &cli.command {
        Command::Run { year_month } | Command::Reset { year_month, .. } => year_month,
    };
    // validated before any file or database is touched
    let period = match Period::parse(year_month) {
        Ok(period) => period,
        Err(e) => {
            print_response(&CliResponse::Error { message: e.to_string() }, cli.pretty)?;
            std::process::exit(2);
        }
    };

    let mut settings = Settings::new(&cli.data_root).with_chunk_size(cli.chunk_size);
    if let Some(db_path) = &cli.db_path {
        settings = settings.with_db_path(db_path);
    }

    let input_dir = settings.input_dir(period);
    let log_file = input_dir.is_dir().then(|| settings.log_path(period));
    bootstrap::setup_logging(&cli.log_level, log_file.as_deref())?;
    tracing::info!("monthly-report-loader v{} starting", env!("CARGO_PKG_VERSION"));

    match execute(&cli, &settings) {
        Ok(payload) => print_response(&CliResponse::Success { payload }, cli.pretty),
        Err(e) => {
            tracing::error!("{e:#}");
            print_response(&CliResponse::Error { message: format!("{e:#}") }, cli.pretty)?;
            std::process::exit(1);
        }
    }
}
