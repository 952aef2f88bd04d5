//! DBC export - re-emit only tables whose fingerprint drifted.
//!
//! The working database's `CHECKSUM TABLE` value is compared against the
//! fingerprint stored at import (or at the previous export). Equal means
//! the table is untouched and no file is written; different means the table
//! is serialized in schema-declared sort order and the stored fingerprint
//! is advanced so the next run is a no-op.
//!
//! `build/dbc/` accumulates across runs: a table exported by an earlier
//! build keeps its file when later builds skip it, so packaging always sees
//! the full set of currently-valid exports. Only files no embedded schema
//! claims are pruned.

use anyhow::{bail, Context, Result};
use mysql::prelude::Queryable;
use std::fs;
use std::path::Path;

use crate::db::Gateway;
use crate::dbc::codec::{self, Value};
use crate::dbc::import::{ensure_checksum_table, record_fingerprint, stored_fingerprint};
use crate::dbc::schema::{self, ColumnType, Schema};
use crate::paths;

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub exported: Vec<String>,
    pub skipped: usize,
}

/// Convert one raw store cell into a codec value for `ctype`.
fn cell_value(raw: &mysql::Value, ctype: ColumnType) -> Result<Value> {
    let text = |raw: &mysql::Value| -> Result<String> {
        match raw {
            mysql::Value::Bytes(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            mysql::Value::NULL => Ok(String::new()),
            other => bail!("Unexpected store value {:?} for text column", other),
        }
    };
    let int = |raw: &mysql::Value| -> Result<i64> {
        match raw {
            mysql::Value::Int(v) => Ok(*v),
            mysql::Value::UInt(v) => Ok(*v as i64),
            mysql::Value::Bytes(bytes) => String::from_utf8_lossy(bytes)
                .parse::<i64>()
                .context("Unparseable integer from store"),
            mysql::Value::NULL => Ok(0),
            other => bail!("Unexpected store value {:?} for integer column", other),
        }
    };

    Ok(match ctype {
        ColumnType::Int32 => Value::Int32(int(raw)? as i32),
        ColumnType::UInt32 => Value::UInt32(int(raw)? as u32),
        ColumnType::UInt8 => Value::UInt8(int(raw)? as u8),
        ColumnType::Int8 => Value::Int8(int(raw)? as i8),
        ColumnType::Float => match raw {
            mysql::Value::Float(v) => Value::Float(*v),
            mysql::Value::Double(v) => Value::Float(*v as f32),
            mysql::Value::NULL => Value::Float(0.0),
            mysql::Value::Bytes(bytes) => Value::Float(
                String::from_utf8_lossy(bytes)
                    .trim()
                    .parse::<f32>()
                    .context("Unparseable decimal from store")?,
            ),
            other => bail!("Unexpected store value {:?} for float column", other),
        },
        ColumnType::Text => Value::Text(text(raw)?),
    })
}

/// Select all rows of a table in schema order, converted to codec values.
fn select_rows(conn: &mut mysql::Conn, schema: &Schema) -> Result<Vec<Vec<Value>>> {
    let columns = schema.columns();
    let mut rows = Vec::new();
    let result = conn
        .query_iter(schema.select_sql())
        .with_context(|| format!("Select from `{}` failed", schema.table_name()))?;
    for row in result {
        let row = row.with_context(|| format!("Row read from `{}` failed", schema.table_name()))?;
        let raw = row.unwrap();
        if raw.len() != columns.len() {
            bail!(
                "`{}` returned {} columns, schema expands to {}",
                schema.table_name(),
                raw.len(),
                columns.len()
            );
        }
        let mut values = Vec::with_capacity(columns.len());
        for (cell, column) in raw.iter().zip(&columns) {
            values.push(cell_value(cell, column.ctype).with_context(|| {
                format!("In `{}`.`{}`", schema.table_name(), column.name)
            })?);
        }
        rows.push(values);
    }
    Ok(rows)
}

/// Drop files no embedded schema claims (leftovers from renamed or retired
/// schemas). Files for tables this run skips stay in place: the directory
/// holds the cumulative valid export set, and packaging ships it in full.
fn prune_stale_files(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let known = entry
            .file_name()
            .to_str()
            .map(|name| schema::all().iter().any(|s| s.file == name))
            .unwrap_or(false);
        if !known {
            fs::remove_file(entry.path())
                .with_context(|| format!("Cannot remove {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Export all drifted tables into `build/dbc/`.
pub fn export_all(gateway: &Gateway, root: &Path) -> Result<ExportSummary> {
    let out_dir = paths::build::dbc_out_dir(root);
    prune_stale_files(&out_dir)?;

    let mut conn = gateway.connect()?;
    ensure_checksum_table(&mut conn)?;

    let mut summary = ExportSummary::default();
    for schema in schema::all() {
        let table = schema.table_name();
        if !gateway.table_exists(&table)? {
            continue;
        }

        let stored = stored_fingerprint(&mut conn, &table)?;
        let current = gateway.checksum_table(&table)?;
        if current == stored {
            summary.skipped += 1;
            continue;
        }

        let rows = select_rows(&mut conn, schema)?;
        let bytes = codec::write(schema, &rows)?;
        let dest = out_dir.join(&schema.file);
        fs::write(&dest, bytes).with_context(|| format!("Cannot write {}", dest.display()))?;

        record_fingerprint(&mut conn, &table, current)?;
        summary.exported.push(schema.file.clone());
    }

    Ok(summary)
}
