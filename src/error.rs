use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while normalising, extracting or loading a monthly file set.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid year-month {0:?}: expected YYYYMM with month 01-12")]
    InvalidPeriod(String),

    #[error("failed to read {path}: {message}")]
    SourceRead { path: PathBuf, message: String },

    #[error("extraction failed for {source_name}: {message}")]
    Extraction { source_name: String, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("load into {table} failed: {message}")]
    Load { table: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub(crate) fn source_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ReportError::SourceRead {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn extraction(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        ReportError::Extraction {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        ReportError::Load {
            table: table.into(),
            message: message.into(),
        }
    }
}
