use tracing::warn;

use crate::period::Period;
use crate::record::{Record, TargetTable, Value, PERIOD_FIELD};
use crate::workbook::Sheet;

use super::Extraction;

/// Column B label (the ledger pads "合計" with two spaces) and its table.
pub const FINANCIAL_LABELS: [(&str, TargetTable); 2] = [
    ("売上原価  合計", TargetTable::FinancialCostOfSales),
    ("営業利益", TargetTable::FinancialOperatingIncome),
];
const LABEL_COLUMN: u32 = 2; // B
const AMOUNT_COLUMN: u32 = 8; // H

fn find_label_row(sheet: &Sheet, label: &str) -> Option<u32> {
    (1..=sheet.max_row()).find(|&row| match sheet.cell(row, LABEL_COLUMN) {
        Value::Text(text) => text == label,
        _ => false,
    })
}

fn parse_amount(value: &Value) -> std::result::Result<f64, String> {
    match value {
        Value::Null => Err("amount is empty".to_string()),
        Value::Int(_) | Value::Float(_) => value.as_f64().ok_or_else(|| "amount is empty".to_string()),
        Value::Text(text) => text
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("amount {text:?} is not a number")),
    }
}

/// Scans column B for each label and takes the amount in column H of the
/// first matching row. A label that cannot be resolved becomes a warning.
pub fn extract_financial_statements(sheet: &Sheet, period: Period) -> Extraction {
    let mut out = Extraction::default();
    for (label, table) in FINANCIAL_LABELS {
        let Some(row) = find_label_row(sheet, label) else {
            let message = format!("no row labelled {label:?} in column B");
            warn!("{}: {message}", sheet.name());
            out.warnings.push(message);
            continue;
        };
        match parse_amount(&sheet.cell(row, AMOUNT_COLUMN)) {
            Ok(amount) => out.records.push(
                Record::new(table)
                    .with(PERIOD_FIELD, period)
                    .with("amount", amount),
            ),
            Err(reason) => {
                let message = format!("{label} (row {row}): {reason}");
                warn!("{}: {message}", sheet.name());
                out.warnings.push(message);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{temp_path, write_sheet};
    use std::fs;

    fn p(token: &str) -> Period {
        Period::parse(token).unwrap()
    }

    #[test]
    fn labels_resolve_to_column_h() {
        let path = temp_path("financial_ok", "xlsx");
        write_sheet(
            &path,
            "Sheet1",
            &[
                (3, 2, Value::from("売上高")),
                (3, 8, Value::Int(9_999_999)),
                (10, 2, Value::from("売上原価  合計")),
                (10, 8, Value::from("1,234,500")),
                (18, 2, Value::from("営業利益")),
                (18, 8, Value::Float(-320.5)),
                (25, 2, Value::from("営業利益")),
                (25, 8, Value::Int(1)),
            ],
        );
        let sheet = Sheet::open(&path, None).unwrap();

        let out = extract_financial_statements(&sheet, p("202405"));
        assert!(out.warnings.is_empty());
        assert_eq!(
            out.records,
            vec![
                Record::new(TargetTable::FinancialCostOfSales)
                    .with("year_month", p("202405"))
                    .with("amount", 1_234_500.0),
                Record::new(TargetTable::FinancialOperatingIncome)
                    .with("year_month", p("202405"))
                    .with("amount", -320.5),
            ]
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unresolved_labels_become_warnings() {
        let path = temp_path("financial_warn", "xlsx");
        write_sheet(
            &path,
            "Sheet1",
            &[
                // single space does not match the ledger label
                (4, 2, Value::from("売上原価 合計")),
                (4, 8, Value::Int(10)),
                (7, 2, Value::from("営業利益")),
                (7, 8, Value::from("△500")),
            ],
        );
        let sheet = Sheet::open(&path, None).unwrap();

        let out = extract_financial_statements(&sheet, p("202405"));
        assert!(out.records.is_empty());
        assert_eq!(out.warnings.len(), 2);
        assert!(out.warnings[0].contains("売上原価  合計"));
        assert!(out.warnings[1].contains("not a number"));
        let _ = fs::remove_file(&path);
    }
}
