pub mod catalog;
pub mod classifier;
pub mod error;
pub mod extract;
pub mod monthly_import;
pub mod normalize;
pub mod period;
pub mod record;
pub mod report_db;
pub mod settings;
pub mod source_format;
pub mod workbook;

#[cfg(test)]
mod test_support;

pub use catalog::{CatalogEntry, Layout, LoadMode, SourceKind, CATALOG};
pub use classifier::{classify, Ambiguity, Binding, Classification};
pub use error::{ReportError, Result};
pub use extract::{extract_file, Extraction};
pub use monthly_import::{
    reset_period_at_db_path, run_monthly_import_at_db_path, FileOutcome, FileStatus, RunOutcome,
    RunProgress, RunState, RunSummary,
};
pub use normalize::{normalize_directory, NormalizeReport};
pub use period::{validate_year_month, Period};
pub use record::{Record, TargetTable, Value};
pub use report_db::{
    bulk_load, ensure_schema, open_report_db, replace_period_load, reset_period, table_row_counts,
    ResetSummary,
};
pub use settings::{Settings, DEFAULT_CHUNK_SIZE};
