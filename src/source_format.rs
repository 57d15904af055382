use chardetng::EncodingDetector;
use encoding_rs::{Encoding, SHIFT_JIS};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ReportError, Result};
use crate::record::Value;
use crate::workbook::Grid;

const OLE2_SIGNATURE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const ZIP_SIGNATURE: &[u8] = b"PK";
const DETECTION_SAMPLE_BYTES: usize = 10_000;
/// Ledgers come from a Japanese ERP, so detection leans towards Japanese encodings.
const DETECTION_TLD: &[u8] = b"jp";

/// Lines containing any of these are report banners or page furniture.
const BANNER_MARKERS: &[&str] = &["ナブテスコ株式会社", "Japan 元帳", "ページ"];
/// A line containing all of these is a repeated column header.
const COLUMN_HEADER_MARKERS: &[&str] = &["会社コード", "事業領域", "金額"];
const SUBHEADER_LINE: &str = "C 会社 事業 テキスト";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    DelimitedText(&'static Encoding),
}

/// Only `.xls` files can be disguised text; `.xlsx` is always opened as a workbook.
pub fn sniff_format(path: &Path) -> Result<SourceFormat> {
    let is_xls = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("xls"))
        .unwrap_or(false);
    if !is_xls {
        return Ok(SourceFormat::Spreadsheet);
    }

    let mut header = [0_u8; 8];
    let mut file = File::open(path)
        .map_err(|e| ReportError::source_read(path, format!("failed to open file: {e}")))?;
    let read = file
        .read(&mut header)
        .map_err(|e| ReportError::source_read(path, format!("failed to read signature: {e}")))?;
    let header = &header[..read];
    if header.starts_with(OLE2_SIGNATURE) || header.starts_with(ZIP_SIGNATURE) {
        Ok(SourceFormat::Spreadsheet)
    } else {
        Ok(SourceFormat::DelimitedText(SHIFT_JIS))
    }
}

fn coerce_text_cell(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Null;
    }
    let digits = text.trim_start_matches('-');
    let has_leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if !has_leading_zero {
        if let Ok(v) = text.parse::<i64>() {
            return Value::Int(v);
        }
        if text.contains('.') {
            if let Ok(v) = text.parse::<f64>() {
                if v.is_finite() {
                    return Value::Float(v);
                }
            }
        }
    }
    Value::Text(text.to_string())
}

fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Rectangular tab-separated parse. Ragged rows are an error so the caller
/// can fall back to the line-filtering reader.
fn parse_rectangular(text: &str) -> std::result::Result<Grid, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(false)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for rec in reader.records() {
        let rec = rec?;
        rows.push(rec.iter().map(coerce_text_cell).collect::<Vec<_>>());
    }
    Ok(Grid::from_rows(rows))
}

fn is_data_line(line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    if BANNER_MARKERS.iter().any(|m| line.contains(m)) {
        return false;
    }
    if COLUMN_HEADER_MARKERS.iter().all(|m| line.contains(m)) {
        return false;
    }
    if line.contains(SUBHEADER_LINE) {
        return false;
    }
    // Section titles such as ＜資産の部＞.
    !(line.contains('＜') && line.contains('＞'))
}

fn parse_filtered(text: &str) -> Grid {
    let rows = text
        .lines()
        .filter(|line| is_data_line(line))
        .map(|line| line.trim().split('\t').map(coerce_text_cell).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let kept_columns = (0..width)
        .filter(|&col| {
            rows.iter()
                .any(|row| row.get(col).map(|v| !v.is_null()).unwrap_or(false))
        })
        .collect::<Vec<_>>();

    // Ordinal header row so data starts on row 2, like every other staged file.
    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(
        kept_columns
            .iter()
            .map(|&col| Value::Int(col as i64))
            .collect::<Vec<_>>(),
    );
    for row in rows {
        out.push(
            kept_columns
                .iter()
                .map(|&col| row.get(col).cloned().unwrap_or(Value::Null))
                .collect(),
        );
    }
    Grid::from_rows(out)
}

pub fn read_delimited_text(path: &Path, encoding: &'static Encoding) -> Result<Grid> {
    let bytes = std::fs::read(path)
        .map_err(|e| ReportError::source_read(path, format!("failed to read file: {e}")))?;
    info!(
        "reading {} as tab-delimited text ({})",
        path.display(),
        encoding.name()
    );

    if let Some(text) = decode_strict(&bytes, encoding) {
        match parse_rectangular(&text) {
            Ok(grid) => return Ok(grid),
            Err(e) => warn!(
                "{} is not a clean tab-delimited table ({e}), retrying with line filter",
                path.display()
            ),
        }
    } else {
        warn!(
            "{} is not valid {}, retrying with detected encoding",
            path.display(),
            encoding.name()
        );
    }

    let mut detector = EncodingDetector::new();
    let sample = &bytes[..bytes.len().min(DETECTION_SAMPLE_BYTES)];
    detector.feed(sample, sample.len() == bytes.len());
    let detected = detector.guess(Some(DETECTION_TLD), true);
    info!("{} detected encoding: {}", path.display(), detected.name());

    let text = decode_strict(&bytes, detected).ok_or_else(|| {
        ReportError::source_read(
            path,
            format!("content is not valid {}", detected.name()),
        )
    })?;
    let grid = parse_filtered(&text);
    info!("{} parsed {} data rows", path.display(), grid.rows().len().saturating_sub(1));
    Ok(grid)
}
