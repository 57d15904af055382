use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::{injected_period, sheet_name_for, staged_file_name, PERIOD_COLUMN_HEADER};
use crate::error::{ReportError, Result};
use crate::period::Period;
use crate::record::Value;
use crate::source_format::{read_delimited_text, sniff_format, SourceFormat};
use crate::workbook::{Grid, Sheet, DEFAULT_SHEET_NAME};

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub sheet: Option<String>,
    pub injected_period: Option<Period>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeFailure {
    pub file_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub normalized: Vec<NormalizedFile>,
    pub failed: Vec<NormalizeFailure>,
}

fn is_spreadsheet_name(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".xlsx") || lower.ends_with(".xls")
}

fn list_input_files(input_dir: &Path) -> Vec<PathBuf> {
    let mut files = WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.file_name()
                .and_then(|s| s.to_str())
                .map(is_spreadsheet_name)
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    files.sort();
    files
}

pub fn normalize_file(path: &Path, staging_dir: &Path, period: Period) -> Result<NormalizedFile> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ReportError::source_read(path, "file name is not valid UTF-8"))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ReportError::source_read(path, "file name has no stem"))?;

    let (mut grid, sheet): (Grid, Option<String>) = match sniff_format(path)? {
        SourceFormat::Spreadsheet => {
            let wanted = sheet_name_for(file_name, period);
            let sheet = Sheet::open(path, wanted.as_deref())?;
            (sheet.to_grid(), Some(sheet.name().to_string()))
        }
        SourceFormat::DelimitedText(encoding) => (read_delimited_text(path, encoding)?, None),
    };

    let injected = injected_period(file_name, period);
    if let Some(value) = injected {
        grid.prepend_column(PERIOD_COLUMN_HEADER, Value::from(value));
    }

    let output = staging_dir.join(staged_file_name(stem));
    grid.write_xlsx(&output, DEFAULT_SHEET_NAME)?;

    Ok(NormalizedFile {
        source: path.to_path_buf(),
        output,
        sheet,
        injected_period: injected,
    })
}

// Staged copies only live for one run.
fn clear_staging_dir(staging_dir: &Path) -> Result<()> {
    let stale = WalkDir::new(staging_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect::<Vec<_>>();
    for path in stale {
        fs::remove_file(&path).map_err(|e| {
            ReportError::source_read(&path, format!("failed to remove stale staged file: {e}"))
        })?;
    }
    Ok(())
}

/// Normalises every `.xls`/`.xlsx` directly under `input_dir`. A failing file
/// is logged and reported and never stops the batch.
pub fn normalize_directory(
    input_dir: &Path,
    staging_dir: &Path,
    period: Period,
) -> Result<NormalizeReport> {
    if !input_dir.is_dir() {
        return Err(ReportError::source_read(input_dir, "input directory not found"));
    }
    fs::create_dir_all(staging_dir).map_err(|e| {
        ReportError::source_read(staging_dir, format!("failed to create staging directory: {e}"))
    })?;
    clear_staging_dir(staging_dir)?;

    let mut report = NormalizeReport::default();
    let mut outputs = HashSet::new();
    for path in list_input_files(input_dir) {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match normalize_file(&path, staging_dir, period) {
            Ok(done) => {
                if !outputs.insert(done.output.clone()) {
                    warn!(
                        "{file_name} overwrote an earlier staged file {}",
                        done.output.display()
                    );
                }
                info!("normalised {file_name} -> {}", done.output.display());
                report.normalized.push(done);
            }
            Err(e) => {
                warn!("failed to normalise {file_name}: {e}");
                report.failed.push(NormalizeFailure {
                    file_name,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        "normalisation finished: {} ok, {} failed",
        report.normalized.len(),
        report.failed.len()
    );
    Ok(report)
}
