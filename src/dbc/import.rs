//! DBC import - one-time load of a source tree into the working database.
//!
//! Each schema's binary file is parsed, a table is created from the schema,
//! and all records are upserted in batches. The store's checksum of the
//! freshly imported table is recorded in `table_checksums` as the baseline
//! fingerprint, and the source binary is copied to `shared/dbc/baseline/`.

use anyhow::{Context, Result};
use mysql::prelude::Queryable;
use mysql::Conn;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::db::Gateway;
use crate::dbc::codec::{self, Value};
use crate::dbc::schema::{self, Schema};
use crate::dbc::CHECKSUM_TABLE;
use crate::paths;

/// Batch sizing: placeholders per statement and rows per batch are both
/// bounded (placeholders x rows <= 60 000, rows <= 2 000).
pub const MAX_PLACEHOLDERS: usize = 60_000;
pub const MAX_BATCH_ROWS: usize = 2_000;

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
    pub missing: Vec<String>,
}

/// Create `table_checksums` if missing.
pub fn ensure_checksum_table(conn: &mut Conn) -> Result<()> {
    conn.query_drop(format!(
        "CREATE TABLE IF NOT EXISTS `{}` (\n  \
           `table_name` VARCHAR(255) NOT NULL,\n  \
           `fingerprint` BIGINT UNSIGNED NOT NULL DEFAULT 0,\n  \
           PRIMARY KEY (`table_name`)\n\
         ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        CHECKSUM_TABLE
    ))
    .context("Cannot create checksum table")
}

/// Record a fingerprint, inserting or replacing the row.
pub fn record_fingerprint(conn: &mut Conn, table: &str, fingerprint: u64) -> Result<()> {
    conn.exec_drop(
        format!(
            "INSERT INTO `{}` (`table_name`, `fingerprint`) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE `fingerprint`=VALUES(`fingerprint`)",
            CHECKSUM_TABLE
        ),
        (table, fingerprint),
    )
    .with_context(|| format!("Cannot record fingerprint for `{}`", table))
}

/// Ensure a fingerprint row exists (0 if absent); returns the stored value.
pub fn stored_fingerprint(conn: &mut Conn, table: &str) -> Result<u64> {
    conn.exec_drop(
        format!(
            "INSERT IGNORE INTO `{}` (`table_name`, `fingerprint`) VALUES (?, 0)",
            CHECKSUM_TABLE
        ),
        (table,),
    )
    .with_context(|| format!("Cannot ensure fingerprint row for `{}`", table))?;
    let stored: Option<u64> = conn
        .exec_first(
            format!(
                "SELECT `fingerprint` FROM `{}` WHERE `table_name` = ?",
                CHECKSUM_TABLE
            ),
            (table,),
        )
        .with_context(|| format!("Cannot read fingerprint for `{}`", table))?;
    Ok(stored.unwrap_or(0))
}

fn sql_value(value: &Value) -> mysql::Value {
    match value {
        Value::Int32(v) => mysql::Value::Int(*v as i64),
        Value::UInt32(v) => mysql::Value::UInt(*v as u64),
        Value::UInt8(v) => mysql::Value::UInt(*v as u64),
        Value::Int8(v) => mysql::Value::Int(*v as i64),
        // DECIMAL column; the shortest round-trip decimal keeps f32 fidelity.
        Value::Float(v) => mysql::Value::Bytes(format!("{}", v).into_bytes()),
        Value::Text(s) => mysql::Value::Bytes(s.clone().into_bytes()),
    }
}

/// Warn (never fail) about duplicate primary/unique key tuples in the file.
fn warn_duplicate_keys(schema: &Schema, rows: &[Vec<Value>]) {
    let columns = schema.columns();
    let mut groups: Vec<Vec<String>> = Vec::new();
    let pks = schema.present_primary_keys();
    if !pks.is_empty() {
        groups.push(pks);
    }
    for group in &schema.unique_keys {
        if group.iter().all(|k| columns.iter().any(|c| &c.name == k)) {
            groups.push(group.clone());
        }
    }

    for group in groups {
        let indices: Vec<usize> = group
            .iter()
            .filter_map(|k| columns.iter().position(|c| &c.name == k))
            .collect();
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        for row in rows {
            let key: Vec<String> = indices.iter().map(|&i| format!("{:?}", row[i])).collect();
            if !seen.insert(key.join("\x1f")) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            eprintln!(
                "Warning: {}: {} duplicate rows on key ({})",
                schema.file,
                duplicates,
                group.join(", ")
            );
        }
    }
}

/// Upsert all rows in batches.
pub fn insert_rows(conn: &mut Conn, schema: &Schema, rows: &[Vec<Value>]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let per_row = schema.columns().len();
    let batch_rows = (MAX_PLACEHOLDERS / per_row).clamp(1, MAX_BATCH_ROWS);

    for chunk in rows.chunks(batch_rows) {
        let sql = schema.insert_sql(chunk.len());
        let params: Vec<mysql::Value> = chunk
            .iter()
            .flat_map(|row| row.iter().map(sql_value))
            .collect();
        conn.exec_drop(sql, params)
            .with_context(|| format!("Insert into `{}` failed", schema.table_name()))?;
    }
    Ok(())
}

/// Import every schema's file found in `source` into the gateway's
/// database. `skip_existing` leaves already-present tables untouched.
pub fn import_all(
    gateway: &Gateway,
    root: &Path,
    source: &Path,
    skip_existing: bool,
) -> Result<ImportSummary> {
    gateway.create_database()?;
    let mut conn = gateway.connect()?;
    ensure_checksum_table(&mut conn)?;

    let baseline_dir = paths::shared::dbc_baseline_dir(root);
    fs::create_dir_all(&baseline_dir)
        .with_context(|| format!("Cannot create {}", baseline_dir.display()))?;

    let mut summary = ImportSummary::default();
    for schema in schema::all() {
        let src = source.join(&schema.file);
        if !src.is_file() {
            summary.missing.push(schema.file.clone());
            continue;
        }

        let table = schema.table_name();
        if gateway.table_exists(&table)? {
            if skip_existing {
                summary.skipped.push(schema.file.clone());
                continue;
            }
            conn.query_drop(format!("DROP TABLE `{}`", table))
                .with_context(|| format!("Cannot drop `{}`", table))?;
        }

        let bytes =
            fs::read(&src).with_context(|| format!("Cannot read {}", src.display()))?;
        let rows = codec::read(schema, &bytes)?;
        warn_duplicate_keys(schema, &rows);

        let (ddl, synthetic) = schema.create_table_sql();
        if synthetic {
            eprintln!(
                "Warning: {}: no declared primary key column present, using synthetic auto_id",
                schema.file
            );
        }
        conn.query_drop(&ddl)
            .with_context(|| format!("Cannot create `{}`", table))?;

        insert_rows(&mut conn, schema, &rows)?;

        let fingerprint = gateway.checksum_table(&table)?;
        record_fingerprint(&mut conn, &table, fingerprint)?;

        fs::copy(&src, baseline_dir.join(&schema.file))
            .with_context(|| format!("Cannot copy {} to baseline", src.display()))?;

        summary.imported.push(schema.file.clone());
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_row_limits() {
        // Wide table: placeholder budget dominates.
        assert_eq!((MAX_PLACEHOLDERS / 100).clamp(1, MAX_BATCH_ROWS), 600);
        // Narrow table: row cap dominates.
        assert_eq!((MAX_PLACEHOLDERS / 2).clamp(1, MAX_BATCH_ROWS), 2_000);
        // Degenerate: wider than the whole budget still makes progress.
        assert_eq!((MAX_PLACEHOLDERS / 70_000).clamp(1, MAX_BATCH_ROWS), 1);
    }

    #[test]
    fn test_sql_value_mapping() {
        assert_eq!(sql_value(&Value::Int32(-5)), mysql::Value::Int(-5));
        assert_eq!(sql_value(&Value::UInt32(7)), mysql::Value::UInt(7));
        assert_eq!(
            sql_value(&Value::Float(0.5)),
            mysql::Value::Bytes(b"0.5".to_vec())
        );
        assert_eq!(
            sql_value(&Value::Text("x".to_string())),
            mysql::Value::Bytes(b"x".to_vec())
        );
    }
}
