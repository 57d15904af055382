use crate::catalog::SourceKind;
use crate::error::{ReportError, Result};
use crate::period::Period;
use crate::record::{Record, TargetTable, Value, PERIOD_FIELD};
use crate::workbook::Sheet;

use super::Extraction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRule {
    Fixed(u32),
    /// Row indexed by month, January first.
    ByMonth([u32; 12]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColRule {
    Fixed(u32),
    /// `month + k`.
    MonthOffset(u32),
    ByMonth([u32; 12]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnEmpty {
    Keep,
    Zero,
    Fail,
}

fn month_index(period: Period) -> usize {
    (period.month() as usize).saturating_sub(1).min(11)
}

impl RowRule {
    fn resolve(&self, period: Period) -> u32 {
        match self {
            RowRule::Fixed(row) => *row,
            RowRule::ByMonth(rows) => rows[month_index(period)],
        }
    }
}

impl ColRule {
    fn resolve(&self, period: Period) -> u32 {
        match self {
            ColRule::Fixed(col) => *col,
            ColRule::MonthOffset(k) => period.month() + k,
            ColRule::ByMonth(cols) => cols[month_index(period)],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub row: RowRule,
    pub col: ColRule,
    pub labels: Vec<(&'static str, &'static str)>,
}

impl Pick {
    pub fn new(row: RowRule, col: ColRule) -> Self {
        Pick {
            row,
            col,
            labels: Vec::new(),
        }
    }

    pub fn label(mut self, field: &'static str, value: &'static str) -> Self {
        self.labels.push((field, value));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSpec {
    pub table: TargetTable,
    pub amount_field: &'static str,
    pub picks: Vec<Pick>,
    pub on_empty: OnEmpty,
    pub scale: f64,
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    text.replace(',', "").trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl MatrixSpec {
    fn amount_at(&self, sheet: &Sheet, row: u32, col: u32) -> Result<Value> {
        let cell = sheet.cell(row, col);
        let number = match &cell {
            Value::Null => {
                return match self.on_empty {
                    OnEmpty::Keep => Ok(Value::Null),
                    OnEmpty::Zero => Ok(Value::Float(0.0)),
                    OnEmpty::Fail => Err(ReportError::extraction(
                        sheet.name(),
                        format!("no {} at row {row}, column {col}", self.amount_field),
                    )),
                };
            }
            Value::Int(_) | Value::Float(_) => cell.as_f64(),
            Value::Text(text) => parse_numeric_text(text),
        };
        match number {
            Some(v) => Ok(Value::Float(v * self.scale)),
            None if self.on_empty == OnEmpty::Keep => Ok(cell),
            None => Err(ReportError::extraction(
                sheet.name(),
                format!("{} at row {row}, column {col} is not numeric: {cell}", self.amount_field),
            )),
        }
    }

    pub fn extract(&self, sheet: &Sheet, period: Period) -> Result<Extraction> {
        let mut out = Extraction::default();
        for pick in &self.picks {
            let row = pick.row.resolve(period);
            let col = pick.col.resolve(period);
            let amount = self.amount_at(sheet, row, col)?;

            let mut record = Record::new(self.table).with(PERIOD_FIELD, period);
            for (field, value) in &pick.labels {
                record = record.with(*field, *value);
            }
            out.records.push(record.with(self.amount_field, amount));
        }
        Ok(out)
    }
}

fn staffing() -> MatrixSpec {
    let picks = (59..=67)
        .map(|row| {
            let segment = if row <= 61 {
                "D"
            } else if row <= 64 {
                "PD"
            } else {
                "F"
            };
            let category = match row % 3 {
                2 => "社員",
                1 => "引入外注者",
                _ => "有期契約社員",
            };
            Pick::new(RowRule::Fixed(row), ColRule::MonthOffset(3))
                .label("segment", segment)
                .label("category", category)
        })
        .collect();
    MatrixSpec {
        table: TargetTable::StaffingSummary,
        amount_field: "headcount",
        picks,
        on_empty: OnEmpty::Keep,
        scale: 1.0,
    }
}

const BACKLOG_SEGMENTS: [(&str, u32); 10] = [
    ("国内D", 6),
    ("国内K", 9),
    ("国内S", 12),
    ("国内BD", 15),
    ("海外D", 21),
    ("海外K", 24),
    ("海外S", 27),
    ("PD", 36),
    ("IP", 39),
    ("AW", 42),
];
const BACKLOG_SUBJECTS: [&str; 3] = ["受注高", "売上高", "受注残高"];

fn sales_backlog() -> MatrixSpec {
    let mut picks = Vec::with_capacity(BACKLOG_SEGMENTS.len() * BACKLOG_SUBJECTS.len());
    for (segment, start_row) in BACKLOG_SEGMENTS {
        for (offset, subject) in (0_u32..).zip(BACKLOG_SUBJECTS) {
            picks.push(
                Pick::new(RowRule::Fixed(start_row + offset), ColRule::MonthOffset(4))
                    .label("segment", segment)
                    .label("subject", subject),
            );
        }
    }
    MatrixSpec {
        table: TargetTable::SalesBacklog,
        amount_field: "amount",
        picks,
        on_empty: OnEmpty::Keep,
        scale: 1.0,
    }
}

fn construction_suspense() -> MatrixSpec {
    let picks = [(2, "D"), (3, "PD"), (4, "F")]
        .into_iter()
        .map(|(row, segment)| {
            Pick::new(RowRule::Fixed(row), ColRule::MonthOffset(1)).label("segment", segment)
        })
        .collect();
    MatrixSpec {
        table: TargetTable::ConstructionSuspenseAccounts,
        amount_field: "amount",
        picks,
        on_empty: OnEmpty::Zero,
        scale: 1.0,
    }
}

/// Month columns skip column J, which holds the first-half subtotal.
const COST_VARIANCE_COLUMNS: [u32; 12] = [4, 5, 6, 7, 8, 9, 11, 12, 13, 14, 15, 16];
const COST_VARIANCE_ROWS: [(&str, u32); 27] = [
    ("材料・購入品在庫_繰越", 5),
    ("材料・購入品在庫_増加", 6),
    ("材料・購入品在庫_減少", 7),
    ("材料・購入品在庫_残高", 8),
    ("購入価格差異_繰越", 13),
    ("購入価格差異_増加", 14),
    ("購入価格差異_仕掛品振替", 15),
    ("購入価格差異_廃却分", 16),
    ("購入価格差異_残高", 17),
    ("製造原価差額_間接費", 22),
    ("製造原価差額_加工費", 23),
    ("調整原差_繰越", 29),
    ("調整原差_間接費差異", 30),
    ("調整原差_購入価額差異", 31),
    ("調整原差_標準原価評価替差額", 32),
    ("調整原差_その他原価差額", 33),
    ("仕掛品在庫_繰越", 40),
    ("仕掛品在庫_増加", 41),
    ("仕掛品在庫_他勘定", 42),
    ("仕掛品在庫_製品振替", 43),
    ("仕掛品在庫_残高", 44),
    ("製品在庫_繰越", 49),
    ("製品在庫_増加", 50),
    ("製品在庫_他勘定", 51),
    ("製品在庫_売上原価振替", 52),
    ("製品在庫_残高", 53),
    ("原価差額負担額", 65),
];

fn cost_variance() -> MatrixSpec {
    let picks = COST_VARIANCE_ROWS
        .into_iter()
        .map(|(subject, row)| {
            Pick::new(RowRule::Fixed(row), ColRule::ByMonth(COST_VARIANCE_COLUMNS))
                .label("segment", "ALL")
                .label("subject", subject)
        })
        .collect();
    MatrixSpec {
        table: TargetTable::PurchaseCostVariance,
        amount_field: "amount",
        picks,
        on_empty: OnEmpty::Zero,
        scale: 1.0,
    }
}

const INVENTORY_SEGMENTS: [(&str, u32); 7] = [
    ("D(N0+N1)", 8),
    ("D(N2)", 9),
    ("K", 10),
    ("S", 11),
    ("BD", 12),
    ("PSD", 13),
    ("F", 14),
];
/// (subject, subject code, amount kind, column). Columns E, G, K and P are subtotals.
const INVENTORY_COLUMNS: [(&str, &str, &str, u32); 12] = [
    ("購入品", "3040", "在庫額", 2),
    ("購入品", "-", "評価減", 3),
    ("購入品", "-", "差額振分け", 4),
    ("購入品", "-", "未着品", 6),
    ("製品", "7920", "在庫額", 8),
    ("製品", "-", "評価減", 9),
    ("製品", "-", "差額振分け", 10),
    ("仕掛", "7900", "在庫額", 12),
    ("仕掛", "4000", "在庫額", 13),
    ("仕掛", "16310", "在庫額", 14),
    ("仕掛", "-", "評価減", 15),
    ("仕掛", "-", "差額振分け", 17),
];

fn itemized_inventory() -> MatrixSpec {
    let mut picks = Vec::with_capacity(INVENTORY_SEGMENTS.len() * INVENTORY_COLUMNS.len());
    for (segment, row) in INVENTORY_SEGMENTS {
        for (subject, code, kind, col) in INVENTORY_COLUMNS {
            picks.push(
                Pick::new(RowRule::Fixed(row), ColRule::Fixed(col))
                    .label("segment", segment)
                    .label("subject", subject)
                    .label("subject_code", code)
                    .label("amount_kind", kind),
            );
        }
    }
    MatrixSpec {
        table: TargetTable::ItemizedInventoryDetails,
        amount_field: "amount",
        picks,
        on_empty: OnEmpty::Zero,
        // sheet is in thousands of yen
        scale: 1000.0,
    }
}

/// Half-year sheets repeat the same six row blocks for both halves.
const DIRECT_EXPENSE_ROWS: [u32; 12] = [346, 349, 352, 355, 358, 361, 346, 349, 352, 355, 358, 361];
const DIRECT_EXPENSE_COLUMN: u32 = 27; // AA

fn direct_expenses() -> MatrixSpec {
    MatrixSpec {
        table: TargetTable::DirectExpenses,
        amount_field: "amount",
        picks: vec![Pick::new(
            RowRule::ByMonth(DIRECT_EXPENSE_ROWS),
            ColRule::Fixed(DIRECT_EXPENSE_COLUMN),
        )
        .label("sbu", "PD")],
        on_empty: OnEmpty::Fail,
        scale: 1.0,
    }
}

pub fn matrix_spec(kind: SourceKind) -> Option<MatrixSpec> {
    match kind {
        SourceKind::Staffing => Some(staffing()),
        SourceKind::SalesBacklog => Some(sales_backlog()),
        SourceKind::ConstructionSuspense => Some(construction_suspense()),
        SourceKind::CostVarianceAdjustment => Some(cost_variance()),
        SourceKind::ItemizedInventory => Some(itemized_inventory()),
        SourceKind::DirectExpenses => Some(direct_expenses()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{temp_path, write_sheet};
    use crate::workbook::column_index;
    use std::fs;

    fn p(token: &str) -> Period {
        Period::parse(token).unwrap()
    }

    fn sheet_with(prefix: &str, cells: &[(u32, u32, Value)]) -> (std::path::PathBuf, Sheet) {
        let path = temp_path(prefix, "xlsx");
        write_sheet(&path, "Sheet1", cells);
        let sheet = Sheet::open(&path, None).unwrap();
        (path, sheet)
    }

    #[test]
    fn staffing_reads_month_column_and_keeps_blanks() {
        let cells = (59..=67)
            .filter(|row| *row != 63)
            .map(|row| (row, 8, Value::Int(i64::from(row) - 50)))
            .chain([(59, 7, Value::Int(999))])
            .collect::<Vec<_>>();
        let (path, sheet) = sheet_with("matrix_staffing", &cells);

        let out = matrix_spec(SourceKind::Staffing)
            .unwrap()
            .extract(&sheet, p("202405"))
            .unwrap();
        assert_eq!(out.records.len(), 9);

        let first = &out.records[0];
        assert_eq!(first.table, TargetTable::StaffingSummary);
        assert_eq!(
            first.field_names(),
            vec!["year_month", "segment", "category", "headcount"]
        );
        assert_eq!(first.get("year_month"), Some(&Value::Int(202405)));
        assert_eq!(first.get("segment"), Some(&Value::from("D")));
        assert_eq!(first.get("category"), Some(&Value::from("社員")));
        assert_eq!(first.get("headcount"), Some(&Value::Float(9.0)));

        let segments = out
            .records
            .iter()
            .map(|r| r.get("segment").cloned().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            segments,
            ["D", "D", "D", "PD", "PD", "PD", "F", "F", "F"]
                .into_iter()
                .map(Value::from)
                .collect::<Vec<_>>()
        );
        // row 63 is blank
        assert_eq!(out.records[4].get("headcount"), Some(&Value::Null));
        assert_eq!(out.records[4].get("category"), Some(&Value::from("有期契約社員")));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn sales_backlog_covers_every_segment_and_subject() {
        let (path, sheet) = sheet_with(
            "matrix_backlog",
            &[(36, 16, Value::Int(500)), (44, 16, Value::from("n/a"))],
        );
        let out = matrix_spec(SourceKind::SalesBacklog)
            .unwrap()
            .extract(&sheet, p("202412"))
            .unwrap();
        assert_eq!(out.records.len(), 30);
        let pd_orders = &out.records[21];
        assert_eq!(pd_orders.get("segment"), Some(&Value::from("PD")));
        assert_eq!(pd_orders.get("subject"), Some(&Value::from("受注高")));
        assert_eq!(pd_orders.get("amount"), Some(&Value::Float(500.0)));
        let aw_backlog = &out.records[29];
        assert_eq!(aw_backlog.get("subject"), Some(&Value::from("受注残高")));
        assert_eq!(aw_backlog.get("amount"), Some(&Value::from("n/a")));
        assert_eq!(out.records[0].get("amount"), Some(&Value::Null));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn construction_suspense_defaults_to_zero() {
        let (path, sheet) = sheet_with("matrix_suspense", &[(3, 4, Value::Float(12.5))]);
        let out = matrix_spec(SourceKind::ConstructionSuspense)
            .unwrap()
            .extract(&sheet, p("202403"))
            .unwrap();
        let amounts = out
            .records
            .iter()
            .map(|r| r.get("amount").cloned().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            amounts,
            vec![Value::Float(0.0), Value::Float(12.5), Value::Float(0.0)]
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn cost_variance_skips_half_year_column() {
        let (path, sheet) = sheet_with(
            "matrix_cost_variance",
            &[
                (5, 10, Value::Int(1)),
                (5, 11, Value::Int(700)),
                (65, 11, Value::from("1,250")),
            ],
        );
        let out = matrix_spec(SourceKind::CostVarianceAdjustment)
            .unwrap()
            .extract(&sheet, p("202407"))
            .unwrap();
        assert_eq!(out.records.len(), 27);
        assert_eq!(out.records[0].get("segment"), Some(&Value::from("ALL")));
        assert_eq!(out.records[0].get("amount"), Some(&Value::Float(700.0)));
        assert_eq!(out.records[1].get("amount"), Some(&Value::Float(0.0)));
        assert_eq!(
            out.records[26].get("subject"),
            Some(&Value::from("原価差額負担額"))
        );
        assert_eq!(out.records[26].get("amount"), Some(&Value::Float(1250.0)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn cost_variance_rejects_non_numeric_text() {
        let (path, sheet) = sheet_with("matrix_cost_text", &[(6, 4, Value::from("abc"))]);
        let err = matrix_spec(SourceKind::CostVarianceAdjustment)
            .unwrap()
            .extract(&sheet, p("202401"))
            .unwrap_err();
        assert!(matches!(err, ReportError::Extraction { .. }));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn inventory_scales_thousands() {
        let (path, sheet) = sheet_with(
            "matrix_inventory",
            &[(8, 2, Value::Float(1.5)), (14, 17, Value::Int(-3))],
        );
        let out = matrix_spec(SourceKind::ItemizedInventory)
            .unwrap()
            .extract(&sheet, p("202405"))
            .unwrap();
        assert_eq!(out.records.len(), 84);

        let first = &out.records[0];
        assert_eq!(
            first.field_names(),
            vec![
                "year_month",
                "segment",
                "subject",
                "subject_code",
                "amount_kind",
                "amount"
            ]
        );
        assert_eq!(first.get("segment"), Some(&Value::from("D(N0+N1)")));
        assert_eq!(first.get("subject_code"), Some(&Value::from("3040")));
        assert_eq!(first.get("amount"), Some(&Value::Float(1500.0)));

        let last = &out.records[83];
        assert_eq!(last.get("segment"), Some(&Value::from("F")));
        assert_eq!(last.get("amount_kind"), Some(&Value::from("差額振分け")));
        assert_eq!(last.get("amount"), Some(&Value::Float(-3000.0)));
        assert_eq!(out.records[1].get("amount"), Some(&Value::Float(0.0)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn direct_expenses_reads_half_year_row() {
        let col = column_index("AA").unwrap();
        let (path, sheet) = sheet_with(
            "matrix_direct",
            &[(349, col, Value::Int(4200)), (361, col, Value::Int(10))],
        );
        let spec = matrix_spec(SourceKind::DirectExpenses).unwrap();

        let out = spec.extract(&sheet, p("202408")).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].field_names(), vec!["year_month", "sbu", "amount"]);
        assert_eq!(out.records[0].get("sbu"), Some(&Value::from("PD")));
        assert_eq!(out.records[0].get("amount"), Some(&Value::Float(4200.0)));

        let december = spec.extract(&sheet, p("202412")).unwrap();
        assert_eq!(december.records[0].get("amount"), Some(&Value::Float(10.0)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn direct_expenses_blank_cell_fails_file() {
        let (path, sheet) = sheet_with("matrix_direct_blank", &[(1, 1, Value::from("x"))]);
        let err = matrix_spec(SourceKind::DirectExpenses)
            .unwrap()
            .extract(&sheet, p("202401"))
            .unwrap_err();
        assert!(err.to_string().contains("row 346"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn extraction_is_deterministic() {
        let (path, sheet) = sheet_with("matrix_determinism", &[(8, 2, Value::Float(2.0))]);
        let spec = matrix_spec(SourceKind::ItemizedInventory).unwrap();
        let a = serde_json::to_string(&spec.extract(&sheet, p("202405")).unwrap()).unwrap();
        let b = serde_json::to_string(&spec.extract(&sheet, p("202405")).unwrap()).unwrap();
        assert_eq!(a, b);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn positional_sources_have_no_matrix() {
        assert!(matrix_spec(SourceKind::ActualExpenses).is_none());
        assert!(matrix_spec(SourceKind::FinancialStatements).is_none());
    }
}
