use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::period::Period;

pub const STAGING_DIR_NAME: &str = "TMP";
pub const LOG_FILE_NAME: &str = "app.log";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_DATA_ROOT: &str = "data";
const DEFAULT_DB_FILE_NAME: &str = "monthly_report.db";

// Inputs for a period live in `<data_root>/<YYYYMM>/`, staged copies in its `TMP/`.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub data_root: PathBuf,
    pub db_path: PathBuf,
    pub chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(DEFAULT_DATA_ROOT)
    }
}

impl Settings {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        Settings {
            db_path: data_root.join(DEFAULT_DB_FILE_NAME),
            data_root,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn input_dir(&self, period: Period) -> PathBuf {
        self.data_root.join(period.to_string())
    }

    pub fn staging_dir(&self, period: Period) -> PathBuf {
        self.input_dir(period).join(STAGING_DIR_NAME)
    }

    pub fn log_path(&self, period: Period) -> PathBuf {
        self.input_dir(period).join(LOG_FILE_NAME)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
