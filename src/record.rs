use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;

use crate::period::Period;

pub const PERIOD_FIELD: &str = "year_month";
pub const POSITIONAL_WIDTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Whole floats collapse to integers so periods and codes survive a
    /// spreadsheet round trip unchanged.
    pub fn from_f64(v: f64) -> Value {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
            Value::Int(v as i64)
        } else {
            Value::Float(v)
        }
    }
}

impl From<Period> for Value {
    fn from(period: Period) -> Self {
        Value::Int(period.as_int())
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Int(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTable {
    PurchaseCostVariance,
    CostCenterReports,
    ActualExpenses,
    SalesReceivables,
    Discounts,
    StaffingSummary,
    SalesBacklog,
    ConstructionSuspenseAccounts,
    ItemizedInventoryDetails,
    DirectExpenses,
    PurchasePriceGap,
    ItemList,
    FinancialCostOfSales,
    FinancialOperatingIncome,
}

/// Which column carries a table's period, and whether it lags by a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodKey {
    pub column: &'static str,
    pub uses_previous_period: bool,
}

impl TargetTable {
    pub const ALL: [TargetTable; 14] = [
        TargetTable::PurchaseCostVariance,
        TargetTable::CostCenterReports,
        TargetTable::ActualExpenses,
        TargetTable::SalesReceivables,
        TargetTable::Discounts,
        TargetTable::StaffingSummary,
        TargetTable::SalesBacklog,
        TargetTable::ConstructionSuspenseAccounts,
        TargetTable::ItemizedInventoryDetails,
        TargetTable::DirectExpenses,
        TargetTable::PurchasePriceGap,
        TargetTable::ItemList,
        TargetTable::FinancialCostOfSales,
        TargetTable::FinancialOperatingIncome,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TargetTable::PurchaseCostVariance => "purchase_cost_variance",
            TargetTable::CostCenterReports => "cost_center_reports",
            TargetTable::ActualExpenses => "actual_expenses",
            TargetTable::SalesReceivables => "sales_receivables",
            TargetTable::Discounts => "discounts",
            TargetTable::StaffingSummary => "staffing_summary",
            TargetTable::SalesBacklog => "sales_backlog",
            TargetTable::ConstructionSuspenseAccounts => "construction_suspense_accounts",
            TargetTable::ItemizedInventoryDetails => "itemized_inventory_details",
            TargetTable::DirectExpenses => "direct_expenses",
            TargetTable::PurchasePriceGap => "purchase_price_gap",
            TargetTable::ItemList => "item_list",
            TargetTable::FinancialCostOfSales => "financial_cost_of_sales",
            TargetTable::FinancialOperatingIncome => "financial_operating_income",
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(
            self,
            TargetTable::CostCenterReports
                | TargetTable::ActualExpenses
                | TargetTable::SalesReceivables
                | TargetTable::Discounts
                | TargetTable::PurchasePriceGap
                | TargetTable::ItemList
        )
    }

    pub fn semantic_columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            TargetTable::PurchaseCostVariance | TargetTable::SalesBacklog => &[
                ("year_month", "INTEGER NOT NULL"),
                ("segment", "TEXT"),
                ("subject", "TEXT"),
                ("amount", "REAL"),
            ],
            TargetTable::StaffingSummary => &[
                ("year_month", "INTEGER NOT NULL"),
                ("segment", "TEXT"),
                ("category", "TEXT"),
                ("headcount", "REAL"),
            ],
            TargetTable::ConstructionSuspenseAccounts => &[
                ("year_month", "INTEGER NOT NULL"),
                ("segment", "TEXT"),
                ("amount", "REAL"),
            ],
            TargetTable::ItemizedInventoryDetails => &[
                ("year_month", "INTEGER NOT NULL"),
                ("segment", "TEXT"),
                ("subject", "TEXT"),
                ("subject_code", "TEXT"),
                ("amount_kind", "TEXT"),
                ("amount", "REAL"),
            ],
            TargetTable::DirectExpenses => &[
                ("year_month", "INTEGER NOT NULL"),
                ("sbu", "TEXT"),
                ("amount", "REAL"),
            ],
            TargetTable::FinancialCostOfSales | TargetTable::FinancialOperatingIncome => {
                &[("year_month", "INTEGER NOT NULL"), ("amount", "REAL")]
            }
            _ => &[],
        }
    }

    pub fn period_key(&self) -> PeriodKey {
        match self {
            TargetTable::CostCenterReports | TargetTable::ActualExpenses | TargetTable::Discounts => {
                PeriodKey {
                    column: "column1",
                    uses_previous_period: false,
                }
            }
            TargetTable::SalesReceivables => PeriodKey {
                column: "column10",
                uses_previous_period: false,
            },
            TargetTable::PurchasePriceGap | TargetTable::ItemList => PeriodKey {
                column: "column1",
                uses_previous_period: true,
            },
            _ => PeriodKey {
                column: PERIOD_FIELD,
                uses_previous_period: false,
            },
        }
    }

    /// The period whose rows a reset of `period` removes from this table.
    pub fn reset_target(&self, period: Period) -> Period {
        if self.period_key().uses_previous_period {
            period.previous()
        } else {
            period
        }
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn positional_field(index: usize) -> String {
    format!("column{}", index + 1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub table: TargetTable,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(table: TargetTable) -> Self {
        Record {
            table,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }
}
