use crate::error::{ReportError, Result};
use crate::record::{positional_field, Record, TargetTable, POSITIONAL_WIDTH};
use crate::workbook::Sheet;

use super::Extraction;

pub fn extract_positional(
    sheet: &Sheet,
    table: TargetTable,
    start_row: u32,
    start_col: u32,
    required_field: Option<usize>,
) -> Result<Extraction> {
    let last_row = sheet.max_row();
    let last_col = sheet.max_column();
    if last_col < start_col || last_row < start_row {
        return Ok(Extraction::default());
    }

    let width = (last_col - start_col + 1) as usize;
    if width > POSITIONAL_WIDTH {
        return Err(ReportError::extraction(
            sheet.name(),
            format!("{width} columns exceed the {POSITIONAL_WIDTH} columns of {table}"),
        ));
    }

    let mut out = Extraction::default();
    for row in start_row..=last_row {
        let values = (start_col..=last_col)
            .map(|col| sheet.cell(row, col))
            .collect::<Vec<_>>();
        // Blank rows are dropped for every positional source, guarded or not.
        // The period column is not written on them, so they would load as all-NULL rows.
        if values.iter().all(|v| v.is_null()) {
            continue;
        }
        if let Some(field) = required_field {
            let missing = field
                .checked_sub(1)
                .and_then(|idx| values.get(idx))
                .map(|v| v.is_null())
                .unwrap_or(true);
            if missing {
                continue;
            }
        }

        let mut record = Record::new(table);
        for (idx, value) in values.into_iter().enumerate() {
            record = record.with(positional_field(idx), value);
        }
        out.records.push(record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use crate::test_support::{temp_path, write_sheet};
    use std::fs;

    #[test]
    fn rows_become_numbered_columns() {
        let path = temp_path("positional_basic", "xlsx");
        write_sheet(
            &path,
            "Sheet1",
            &[
                (1, 1, Value::from("年月")),
                (1, 2, Value::from("部門")),
                (1, 3, Value::from("金額")),
                (2, 1, Value::Int(202405)),
                (2, 2, Value::from("D")),
                (2, 3, Value::Int(100)),
                (4, 1, Value::Int(202405)),
                (4, 2, Value::from("PD")),
            ],
        );
        let sheet = Sheet::open(&path, None).unwrap();

        let out = extract_positional(&sheet, TargetTable::CostCenterReports, 2, 1, None).unwrap();
        // row 3 is blank and skipped
        assert_eq!(out.records.len(), 2);
        assert_eq!(
            out.records[0].field_names(),
            vec!["column1", "column2", "column3"]
        );
        assert_eq!(out.records[0].get("column3"), Some(&Value::Int(100)));
        assert_eq!(out.records[1].get("column3"), Some(&Value::Null));
        assert!(out.warnings.is_empty());

        let guarded = extract_positional(&sheet, TargetTable::Discounts, 2, 1, Some(3)).unwrap();
        assert_eq!(guarded.records.len(), 1);
        assert_eq!(guarded.records[0].get("column2"), Some(&Value::from("D")));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn header_only_sheet_yields_nothing() {
        let path = temp_path("positional_header", "xlsx");
        write_sheet(&path, "Sheet1", &[(1, 1, Value::from("年月"))]);
        let sheet = Sheet::open(&path, None).unwrap();
        let out = extract_positional(&sheet, TargetTable::ItemList, 2, 1, None).unwrap();
        assert!(out.records.is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn too_wide_sheet_is_rejected() {
        let path = temp_path("positional_wide", "xlsx");
        write_sheet(&path, "Sheet1", &[(2, 1, Value::Int(1)), (2, 101, Value::Int(2))]);
        let sheet = Sheet::open(&path, None).unwrap();
        let err = extract_positional(&sheet, TargetTable::ActualExpenses, 2, 1, None).unwrap_err();
        assert!(err.to_string().contains("101 columns"));
        let _ = fs::remove_file(&path);
    }
}
