use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_xlsxwriter::Workbook;
use std::path::Path;

use crate::error::{ReportError, Result};
use crate::record::Value;

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

pub fn value_from_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(v) => Value::Int(*v),
        Data::Float(v) => Value::from_f64(*v),
        Data::Bool(v) => Value::Int(i64::from(*v)),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Value::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// `"A"` -> 1, `"AA"` -> 27. Case-insensitive.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut index = 0_u32;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index)
}

fn open_range(path: &Path, sheet_name: Option<&str>) -> Result<(String, Range<Data>)> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ReportError::source_read(path, format!("failed to open workbook: {e}")))?;
    let name = match sheet_name {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(ReportError::source_read(
                    path,
                    format!("sheet {name:?} not found"),
                ));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReportError::source_read(path, "workbook has no sheets"))?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| ReportError::source_read(path, format!("failed to read sheet {name:?}: {e}")))?;
    Ok((name, range))
}

/// A read-only worksheet addressed with 1-based absolute coordinates, the way
/// report layouts are written down (`AA346` is row 346, column 27).
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    range: Range<Data>,
}

impl Sheet {
    pub fn open(path: &Path, sheet_name: Option<&str>) -> Result<Self> {
        let (name, range) = open_range(path, sheet_name)?;
        Ok(Sheet { name, range })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self, row: u32, col: u32) -> Value {
        if row == 0 || col == 0 {
            return Value::Null;
        }
        self.range
            .get_value((row - 1, col - 1))
            .map(value_from_cell)
            .unwrap_or(Value::Null)
    }

    pub fn max_row(&self) -> u32 {
        self.range.end().map(|(r, _)| r + 1).unwrap_or(0)
    }

    pub fn max_column(&self) -> u32 {
        self.range.end().map(|(_, c)| c + 1).unwrap_or(0)
    }

    pub fn to_grid(&self) -> Grid {
        let mut grid = Grid::default();
        for row in 1..=self.max_row() {
            for col in 1..=self.max_column() {
                let value = self.cell(row, col);
                if !value.is_null() {
                    grid.set((row - 1) as usize, (col - 1) as usize, value);
                }
            }
        }
        grid
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Value>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        Grid { rows }
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn get(&self, row: usize, col: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&NULL)
    }

    pub fn set(&mut self, row: usize, col: usize, value: Value) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, Value::Null);
        }
        cells[col] = value;
    }

    /// Shifts every cell one column right and fills column A with `header`
    /// on the first row and `value` on every later row that has data.
    pub fn prepend_column(&mut self, header: &str, value: Value) {
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let cell = if idx == 0 {
                Value::Text(header.to_string())
            } else if row.iter().all(Value::is_null) {
                Value::Null
            } else {
                value.clone()
            };
            row.insert(0, cell);
        }
    }

    pub fn write_xlsx(&self, path: &Path, sheet_name: &str) -> Result<()> {
        let write_err = |e: rust_xlsxwriter::XlsxError| ReportError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name).map_err(write_err)?;

        for (r, row) in self.rows.iter().enumerate() {
            let r = u32::try_from(r).map_err(|_| ReportError::Write {
                path: path.to_path_buf(),
                message: format!("row {r} out of range"),
            })?;
            for (c, value) in row.iter().enumerate() {
                let c = u16::try_from(c).map_err(|_| ReportError::Write {
                    path: path.to_path_buf(),
                    message: format!("column {c} out of range"),
                })?;
                match value {
                    Value::Null => {}
                    Value::Int(v) => {
                        worksheet.write_number(r, c, *v as f64).map_err(write_err)?;
                    }
                    Value::Float(v) => {
                        worksheet.write_number(r, c, *v).map_err(write_err)?;
                    }
                    Value::Text(v) => {
                        worksheet.write_string(r, c, v).map_err(write_err)?;
                    }
                }
            }
        }

        workbook.save(path).map_err(write_err)?;
        Ok(())
    }
}
