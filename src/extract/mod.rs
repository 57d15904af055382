mod financial;
mod matrix;
mod positional;

use serde::Serialize;
use std::path::Path;

use crate::catalog::{CatalogEntry, Layout};
use crate::error::{ReportError, Result};
use crate::period::Period;
use crate::record::Record;
use crate::workbook::Sheet;

pub use financial::{extract_financial_statements, FINANCIAL_LABELS};
pub use matrix::{matrix_spec, ColRule, MatrixSpec, OnEmpty, Pick, RowRule};
pub use positional::extract_positional;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub warnings: Vec<String>,
}

pub fn extract_file(entry: &CatalogEntry, path: &Path, period: Period) -> Result<Extraction> {
    let source_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sheet = Sheet::open(path, None)?;
    extract_sheet(entry, &sheet, period)
        .map_err(|e| match e {
            ReportError::Extraction { message, .. } => ReportError::extraction(&source_name, message),
            other => other,
        })
}

pub fn extract_sheet(entry: &CatalogEntry, sheet: &Sheet, period: Period) -> Result<Extraction> {
    match entry.layout {
        Layout::Positional {
            table,
            start_row,
            start_col,
            required_field,
        } => extract_positional(sheet, table, start_row, start_col, required_field),
        Layout::Matrix => {
            let spec = matrix_spec(entry.kind).ok_or_else(|| {
                ReportError::extraction(sheet.name(), format!("no matrix layout for {:?}", entry.kind))
            })?;
            spec.extract(sheet, period)
        }
        Layout::FinancialStatement => Ok(extract_financial_statements(sheet, period)),
    }
}
