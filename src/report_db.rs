use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ReportError, Result};
use crate::period::Period;
use crate::record::{positional_field, Record, TargetTable, Value, POSITIONAL_WIDTH};

/// SQLite's default bound-parameter ceiling.
const SQLITE_MAX_VARIABLES: usize = 32_766;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: TargetTable) -> String {
    let mut columns = vec!["id INTEGER PRIMARY KEY".to_string()];
    if table.is_positional() {
        // untyped so cells keep their spreadsheet type
        columns.extend((0..POSITIONAL_WIDTH).map(|idx| quote_ident(&positional_field(idx))));
    } else {
        columns.extend(
            table
                .semantic_columns()
                .iter()
                .map(|(name, ty)| format!("{} {ty}", quote_ident(name))),
        );
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table.name()),
        columns.join(", ")
    )
}

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    for table in TargetTable::ALL {
        let key = table.period_key().column;
        let sql = format!(
            "{};\nCREATE INDEX IF NOT EXISTS {} ON {} ({});",
            create_table_sql(table),
            quote_ident(&format!("idx_{}_{key}", table.name())),
            quote_ident(table.name()),
            quote_ident(key)
        );
        conn.execute_batch(&sql)
            .map_err(|e| ReportError::load(table.name(), format!("failed to create table: {e}")))?;
    }
    Ok(())
}

pub fn open_report_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

fn insert_sql(table: TargetTable, columns: &[&str], rows: usize) -> String {
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table.name()),
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
        vec![placeholders; rows].join(", ")
    )
}

fn insert_rows(conn: &Connection, table: TargetTable, columns: &[&str], rows: &[Record]) -> Result<()> {
    let sql = insert_sql(table, columns, rows.len());
    let values = rows
        .iter()
        .flat_map(|record| record.fields.iter().map(|(_, value)| value));
    conn.execute(&sql, params_from_iter(values))
        .map_err(|e| ReportError::load(table.name(), format!("insert failed: {e}")))?;
    Ok(())
}

fn check_layout<'a>(table: TargetTable, records: &'a [Record]) -> Result<Vec<&'a str>> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let columns = first.field_names();
    if columns.is_empty() {
        return Err(ReportError::load(table.name(), "records carry no fields"));
    }
    for (idx, record) in records.iter().enumerate() {
        if record.table != table {
            return Err(ReportError::load(
                table.name(),
                format!("record {idx} belongs to {}", record.table),
            ));
        }
        if record.field_names() != columns {
            return Err(ReportError::load(
                table.name(),
                format!("record {idx} has a different field layout"),
            ));
        }
    }
    Ok(columns)
}

/// Inserts `records` into `table` in one transaction using multi-row
/// `INSERT` chunks. Any failure rolls the whole call back.
pub fn bulk_load(
    conn: &mut Connection,
    table: TargetTable,
    records: &[Record],
    chunk_size: usize,
) -> Result<usize> {
    let columns = check_layout(table, records)?;
    if records.is_empty() {
        debug!("nothing to insert into {table}");
        return Ok(0);
    }
    let rows_per_chunk = chunk_size
        .max(1)
        .min(SQLITE_MAX_VARIABLES / columns.len())
        .max(1);

    let tx = conn
        .transaction()
        .map_err(|e| ReportError::load(table.name(), format!("failed to begin transaction: {e}")))?;
    let mut chunks = 0_usize;
    for chunk in records.chunks(rows_per_chunk) {
        insert_rows(&tx, table, &columns, chunk)?;
        chunks += 1;
    }
    tx.commit()
        .map_err(|e| ReportError::load(table.name(), format!("failed to commit: {e}")))?;

    info!(
        "inserted {} rows into {table} in {chunks} chunk(s)",
        records.len()
    );
    Ok(records.len())
}

fn delete_period_rows(conn: &Connection, table: TargetTable, key: &Value) -> Result<usize> {
    let column = table.period_key().column;
    let sql = format!(
        "DELETE FROM {} WHERE {col} = ?1 OR {col} = ?2",
        quote_ident(table.name()),
        col = quote_ident(column)
    );
    conn.execute(&sql, params![key, key.to_string()])
        .map_err(|e| ReportError::load(table.name(), format!("delete failed: {e}")))
}

/// For each record, removes its table's rows for the record's period and
/// inserts the record. All records share one transaction.
pub fn replace_period_load(conn: &mut Connection, records: &[Record]) -> Result<usize> {
    let tx = conn
        .transaction()
        .map_err(|e| ReportError::load("replace", format!("failed to begin transaction: {e}")))?;
    for record in records {
        let table = record.table;
        let column = table.period_key().column;
        let key = record
            .get(column)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ReportError::load(table.name(), format!("record has no {column}")))?;
        let replaced = delete_period_rows(&tx, table, key)?;
        insert_rows(&tx, table, &record.field_names(), std::slice::from_ref(record))?;
        info!("replaced {replaced} row(s) in {table} for {key}");
    }
    tx.commit()
        .map_err(|e| ReportError::load("replace", format!("failed to commit: {e}")))?;
    Ok(records.len())
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetTableRow {
    pub table: String,
    pub column: String,
    pub target_period: Period,
    pub deleted_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetSummary {
    pub period: Period,
    pub table_count: usize,
    pub deleted_rows: usize,
    pub rows: Vec<ResetTableRow>,
}

fn has_period_rows(conn: &Connection, table: TargetTable, target: Period) -> Result<bool> {
    let column = table.period_key().column;
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {col} = ?1 OR {col} = ?2)",
        quote_ident(table.name()),
        col = quote_ident(column)
    );
    conn.query_row(&sql, params![target.as_int(), target.to_string()], |row| {
        row.get::<_, i64>(0)
    })
    .map(|v| v != 0)
    .map_err(|e| ReportError::load(table.name(), format!("failed to probe {column}: {e}")))
}

pub fn reset_period(conn: &mut Connection, period: Period) -> Result<ResetSummary> {
    let tx = conn
        .transaction()
        .map_err(|e| ReportError::load("reset", format!("failed to begin transaction: {e}")))?;

    let mut rows = Vec::with_capacity(TargetTable::ALL.len());
    for table in TargetTable::ALL {
        let target = table.reset_target(period);
        let column = table.period_key().column;
        let deleted_rows = if has_period_rows(&tx, table, target)? {
            let n = delete_period_rows(&tx, table, &Value::from(target))?;
            info!("deleted {n} row(s) from {table} where {column} = {target}");
            n
        } else {
            info!("no rows in {table} where {column} = {target}, skipping");
            0
        };
        rows.push(ResetTableRow {
            table: table.name().to_string(),
            column: column.to_string(),
            target_period: target,
            deleted_rows,
        });
    }

    tx.commit()
        .map_err(|e| ReportError::load("reset", format!("failed to commit: {e}")))?;

    let deleted_rows = rows.iter().map(|r| r.deleted_rows).sum();
    info!("reset of {period} removed {deleted_rows} row(s)");
    Ok(ResetSummary {
        period,
        table_count: rows.len(),
        deleted_rows,
        rows,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub row_count: i64,
}

pub fn table_row_counts(conn: &Connection) -> Result<Vec<TableCount>> {
    let mut rows = Vec::new();
    for table in TargetTable::ALL {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table.name()));
        let row_count = conn
            .query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map_err(|e| ReportError::load(table.name(), format!("failed to count rows: {e}")))?;
        rows.push(TableCount {
            table: table.name().to_string(),
            row_count,
        });
    }
    Ok(rows)
}
