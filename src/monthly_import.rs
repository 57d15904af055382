use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::catalog::{LoadMode, SourceKind};
use crate::classifier::{classify, Ambiguity, Binding};
use crate::error::{ReportError, Result};
use crate::extract::extract_file;
use crate::normalize::{normalize_directory, NormalizeFailure};
use crate::period::Period;
use crate::report_db::{bulk_load, open_report_db, replace_period_load, reset_period, ResetSummary};
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Validating,
    Normalizing,
    Classifying,
    Loading { done: usize, total: usize },
    Done,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunProgress {
    #[serde(flatten)]
    pub state: RunState,
    pub fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub kind: SourceKind,
    pub file_name: String,
    pub status: FileStatus,
    pub rows_loaded: usize,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    CompletedWithFailures,
    NothingToProcess,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub period: Period,
    pub started_at: String,
    pub finished_at: String,
    pub outcome: RunOutcome,
    pub normalize_failures: Vec<NormalizeFailure>,
    pub ambiguities: Vec<Ambiguity>,
    pub unmatched: Vec<String>,
    pub files: Vec<FileOutcome>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct ProgressReporter<'a> {
    on_progress: &'a mut dyn FnMut(RunProgress),
    fraction: f64,
}

impl ProgressReporter<'_> {
    fn emit(&mut self, state: RunState) {
        self.fraction = match &state {
            RunState::Idle | RunState::Validating => 0.0,
            RunState::Normalizing => 0.05,
            RunState::Classifying => 0.2,
            RunState::Loading { done, total } if *total > 0 => {
                0.2 + 0.8 * (*done as f64 / *total as f64)
            }
            RunState::Loading { .. } => 0.2,
            RunState::Done => 1.0,
            RunState::Failed { .. } => self.fraction,
        };
        (self.on_progress)(RunProgress {
            state,
            fraction: self.fraction,
        });
    }

    fn fail<T>(&mut self, err: ReportError) -> Result<T> {
        error!("monthly import failed: {err}");
        self.emit(RunState::Failed {
            reason: err.to_string(),
        });
        Err(err)
    }
}

fn load_binding(
    conn: &mut Connection,
    binding: &Binding,
    period: Period,
    chunk_size: usize,
) -> Result<(usize, Vec<String>)> {
    let mut extraction = extract_file(binding.entry, &binding.path, period)?;
    let Some(table) = extraction.records.first().map(|r| r.table) else {
        extraction.warnings.push("no rows extracted".to_string());
        return Ok((0, extraction.warnings));
    };
    let loaded = match binding.entry.load_mode {
        LoadMode::Append => bulk_load(conn, table, &extraction.records, chunk_size)?,
        LoadMode::ReplacePeriod => replace_period_load(conn, &extraction.records)?,
    };
    Ok((loaded, extraction.warnings))
}

/// Normalises, classifies, extracts and loads one period's exports.
///
/// Each bound file is loaded in its own transaction; a failing file is
/// recorded in the summary and the run moves on. Only an invalid period,
/// a missing input directory or an unusable database abort the run.
pub fn run_monthly_import_at_db_path(
    settings: &Settings,
    period_text: &str,
    on_progress: &mut dyn FnMut(RunProgress),
) -> Result<RunSummary> {
    let mut progress = ProgressReporter {
        on_progress,
        fraction: 0.0,
    };
    progress.emit(RunState::Idle);

    let run_id = Uuid::new_v4().to_string();
    let started_at = now_rfc3339();

    progress.emit(RunState::Validating);
    let period = match Period::parse(period_text) {
        Ok(period) => period,
        Err(e) => return progress.fail(e),
    };

    let span = info_span!("monthly_import", %period, run_id = %run_id);
    let _guard = span.enter();
    info!("starting monthly import");

    let input_dir = settings.input_dir(period);
    if !input_dir.is_dir() {
        return progress.fail(ReportError::source_read(
            &input_dir,
            "no input directory for this period",
        ));
    }

    progress.emit(RunState::Normalizing);
    let normalized = match normalize_directory(&input_dir, &settings.staging_dir(period), period) {
        Ok(report) => report,
        Err(e) => return progress.fail(e),
    };

    progress.emit(RunState::Classifying);
    let staged = normalized
        .normalized
        .iter()
        .map(|file| file.output.clone())
        .collect::<Vec<_>>();
    let classification = classify(&staged);

    let mut summary = RunSummary {
        run_id,
        period,
        started_at,
        finished_at: String::new(),
        outcome: RunOutcome::NothingToProcess,
        normalize_failures: normalized.failed,
        ambiguities: classification.ambiguities,
        unmatched: classification.unmatched,
        files: Vec::new(),
    };

    if classification.bindings.is_empty() {
        warn!("no recognised files to load");
        summary.finished_at = now_rfc3339();
        progress.emit(RunState::Done);
        return Ok(summary);
    }

    let mut conn = match open_report_db(&settings.db_path) {
        Ok(conn) => conn,
        Err(e) => return progress.fail(e),
    };

    let total = classification.bindings.len();
    progress.emit(RunState::Loading { done: 0, total });
    for (idx, binding) in classification.bindings.iter().enumerate() {
        let file_name = binding.file_name();
        let outcome = match load_binding(&mut conn, binding, period, settings.chunk_size) {
            Ok((rows_loaded, warnings)) => {
                info!("{file_name}: loaded {rows_loaded} row(s)");
                FileOutcome {
                    kind: binding.entry.kind,
                    file_name,
                    status: FileStatus::Loaded,
                    rows_loaded,
                    warnings,
                    error: None,
                }
            }
            Err(e) => {
                error!("{file_name}: {e}");
                FileOutcome {
                    kind: binding.entry.kind,
                    file_name,
                    status: FileStatus::Failed,
                    rows_loaded: 0,
                    warnings: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        summary.files.push(outcome);
        progress.emit(RunState::Loading {
            done: idx + 1,
            total,
        });
    }

    let any_failed = summary.files.iter().any(|f| f.status == FileStatus::Failed)
        || !summary.normalize_failures.is_empty();
    summary.outcome = if any_failed {
        RunOutcome::CompletedWithFailures
    } else {
        RunOutcome::Completed
    };
    summary.finished_at = now_rfc3339();
    info!("monthly import finished: {:?}", summary.outcome);
    progress.emit(RunState::Done);
    Ok(summary)
}

pub fn reset_period_at_db_path(settings: &Settings, period_text: &str) -> Result<ResetSummary> {
    let period = Period::parse(period_text)?;
    let _guard = info_span!("reset_period", %period).entered();
    let mut conn = open_report_db(&settings.db_path)?;
    reset_period(&mut conn, period)
}
