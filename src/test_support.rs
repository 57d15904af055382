use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::record::Value;
use crate::workbook::Grid;

pub fn temp_path(prefix: &str, ext: &str) -> PathBuf {
    let unique = format!("{prefix}_{}_{}.{}", std::process::id(), Uuid::new_v4(), ext);
    std::env::temp_dir().join(unique)
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}_{}_{}", std::process::id(), Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn write_sheet(path: &Path, sheet_name: &str, cells: &[(u32, u32, Value)]) {
    let mut grid = Grid::default();
    for (row, col, value) in cells {
        grid.set((*row - 1) as usize, (*col - 1) as usize, value.clone());
    }
    grid.write_xlsx(path, sheet_name).expect("write fixture workbook");
}
