use glob::{MatchOptions, Pattern};
use serde::Serialize;

use crate::period::Period;
use crate::record::TargetTable;

pub const PERIOD_COLUMN_HEADER: &str = "年月";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

pub fn glob_matches(pattern: &str, file_name: &str) -> bool {
    Pattern::new(pattern)
        .map(|p| p.matches_with(file_name, MATCH_OPTIONS))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SalesBacklog,
    CostCenterReports,
    ActualExpenses,
    SalesReceivables,
    Discounts,
    Staffing,
    ConstructionSuspense,
    CostVarianceAdjustment,
    ItemizedInventory,
    DirectExpenses,
    PurchasePriceGap,
    ItemList,
    FinancialStatements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Every column from `start_col` on becomes `columnN`. When `required_field`
    /// is set, rows whose field at that 1-based position is null are dropped.
    Positional {
        table: TargetTable,
        start_row: u32,
        start_col: u32,
        required_field: Option<usize>,
    },
    Matrix,
    FinancialStatement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Append,
    /// Delete the record's period from its table before inserting it.
    ReplacePeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetRule {
    Literal(&'static str),
    Year,
    YearActuals,
    ShortYearActuals,
    HalfYear,
}

impl SheetRule {
    pub fn resolve(&self, period: Period) -> String {
        match self {
            SheetRule::Literal(name) => (*name).to_string(),
            SheetRule::Year => period.year().to_string(),
            SheetRule::YearActuals => format!("{}年度実績", period.year()),
            SheetRule::ShortYearActuals => format!("{}年度実績", period.short_year()),
            SheetRule::HalfYear => {
                let half = if period.month() < 7 { 6 } else { 12 };
                format!("{}・{}", period.short_year(), half)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodColumn {
    Current,
    /// The source reports on the month before the processing period.
    Previous,
    /// The extractor addresses raw coordinates.
    Omitted,
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub kind: SourceKind,
    /// Glob over the staged (normalised) file name.
    pub pattern: &'static str,
    pub sheet: Option<SheetRule>,
    pub period_column: PeriodColumn,
    pub layout: Layout,
    pub load_mode: LoadMode,
}

impl CatalogEntry {
    pub fn matches(&self, file_name: &str) -> bool {
        glob_matches(self.pattern, file_name)
    }
}

const fn positional(
    kind: SourceKind,
    pattern: &'static str,
    table: TargetTable,
    required_field: Option<usize>,
) -> CatalogEntry {
    CatalogEntry {
        kind,
        pattern,
        sheet: None,
        period_column: PeriodColumn::Current,
        layout: Layout::Positional {
            table,
            start_row: 2,
            start_col: 1,
            required_field,
        },
        load_mode: LoadMode::Append,
    }
}

const fn matrix(kind: SourceKind, pattern: &'static str, sheet: SheetRule) -> CatalogEntry {
    CatalogEntry {
        kind,
        pattern,
        sheet: Some(sheet),
        period_column: PeriodColumn::Omitted,
        layout: Layout::Matrix,
        load_mode: LoadMode::Append,
    }
}

/// Expected inputs in priority order. When two entries could claim the same
/// file, both bind it; when one entry matches several files, the first in
/// name order wins.
pub static CATALOG: [CatalogEntry; 13] = [
    matrix(SourceKind::SalesBacklog, "受注売上受注残*", SheetRule::Year),
    positional(
        SourceKind::CostCenterReports,
        "売上実績*",
        TargetTable::CostCenterReports,
        None,
    ),
    positional(
        SourceKind::ActualExpenses,
        "S4データ*",
        TargetTable::ActualExpenses,
        Some(3),
    ),
    CatalogEntry {
        period_column: PeriodColumn::Omitted,
        ..positional(
            SourceKind::SalesReceivables,
            "*SBU別売上債権（各種売掛金）*",
            TargetTable::SalesReceivables,
            Some(3),
        )
    },
    positional(
        SourceKind::Discounts,
        "*値引き.xlsx",
        TargetTable::Discounts,
        Some(3),
    ),
    matrix(SourceKind::Staffing, "人員集計表*", SheetRule::ShortYearActuals),
    matrix(
        SourceKind::ConstructionSuspense,
        "*建仮計上額.xlsx",
        SheetRule::YearActuals,
    ),
    matrix(
        SourceKind::CostVarianceAdjustment,
        "*原価差額調整計算表 AI.xlsx",
        SheetRule::Literal("年度調整版"),
    ),
    matrix(
        SourceKind::ItemizedInventory,
        "*品目別在庫明細表.xlsx",
        SheetRule::Literal("差額有"),
    ),
    matrix(
        SourceKind::DirectExpenses,
        "PJ管理物件勘定内訳表*",
        SheetRule::HalfYear,
    ),
    CatalogEntry {
        period_column: PeriodColumn::Previous,
        ..positional(
            SourceKind::PurchasePriceGap,
            "*AQZZCO_CT.xlsx",
            TargetTable::PurchasePriceGap,
            None,
        )
    },
    CatalogEntry {
        period_column: PeriodColumn::Previous,
        ..positional(
            SourceKind::ItemList,
            "品目一覧表.xlsx",
            TargetTable::ItemList,
            None,
        )
    },
    CatalogEntry {
        kind: SourceKind::FinancialStatements,
        pattern: "財務諸表*",
        sheet: None,
        period_column: PeriodColumn::Current,
        layout: Layout::FinancialStatement,
        load_mode: LoadMode::ReplacePeriod,
    },
];

pub fn staged_file_name(stem: &str) -> String {
    format!("{stem}.xlsx")
}

fn entry_for_raw(file_name: &str) -> Option<&'static CatalogEntry> {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let staged = staged_file_name(stem);
    CATALOG.iter().find(|entry| entry.matches(&staged))
}

pub fn sheet_name_for(file_name: &str, period: Period) -> Option<String> {
    entry_for_raw(file_name)
        .and_then(|entry| entry.sheet)
        .map(|rule| rule.resolve(period))
}

/// The period value to prepend to a raw file, or `None` when it keeps its own layout.
/// Files outside the catalog get the processing period.
pub fn injected_period(file_name: &str, period: Period) -> Option<Period> {
    match entry_for_raw(file_name).map(|entry| entry.period_column) {
        Some(PeriodColumn::Omitted) => None,
        Some(PeriodColumn::Previous) => Some(period.previous()),
        Some(PeriodColumn::Current) | None => Some(period),
    }
}
