//! Relational snapshot export with column masking policies.
//!
//! Settings stored in a SQLite database get the same redaction guarantees
//! as file-based configuration: a column can be masked (fixed placeholder)
//! or hashed (salted SHA-256) on export, and the manifest records exactly
//! which policies were applied and when the snapshot was captured.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::diff::MASK_PLACEHOLDER;

/// Masking and hashing policies for a snapshot export.
///
/// Columns are addressed as `table.column`; a bare column name applies to
/// that column in every table. Masking wins when both policies name the
/// same column.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOptions {
    /// Columns replaced by the placeholder.
    pub mask_columns: Vec<String>,
    /// Columns replaced by the salted hash of their value.
    pub hash_columns: Vec<String>,
    /// Salt prepended to hashed values.
    pub salt: String,
    /// Placeholder substituted for masked values.
    pub placeholder: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            mask_columns: Vec::new(),
            hash_columns: Vec::new(),
            salt: String::new(),
            placeholder: MASK_PLACEHOLDER.to_string(),
        }
    }
}

/// Audit record describing one completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    /// Capture time, UTC RFC 3339.
    pub captured_at: String,
    /// Source dialect; always `"sqlite"` for now.
    pub dialect: Box<str>,
    /// Exported table names, lexical order.
    pub tables: Vec<String>,
    /// Row count per table.
    pub row_counts: BTreeMap<String, u64>,
    /// Qualified names of columns the mask policy applied to.
    pub masked_columns: Vec<String>,
    /// Qualified names of columns the hash policy applied to.
    pub hashed_columns: Vec<String>,
    /// The options the export ran with.
    pub options: ExportOptions,
}

/// One exported table with policy-filtered values.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedTable {
    /// Table name.
    pub name: String,
    /// Column names, in schema order.
    pub columns: Vec<String>,
    /// Rows of rendered values; `None` is SQL `NULL`.
    pub rows: Vec<Vec<Option<String>>>,
}

/// A complete relational snapshot: data plus manifest.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotExport {
    /// Export audit record.
    pub manifest: ExportManifest,
    /// Exported tables, lexical order.
    pub tables: Vec<ExportedTable>,
}

enum Policy {
    Plain,
    Mask,
    Hash,
}

/// Exports every user table through the masking and hashing policies.
pub fn export_snapshot(conn: &Connection, options: &ExportOptions) -> Result<SnapshotExport, rusqlite::Error> {
    let table_names = user_tables(conn)?;

    let mut tables = Vec::with_capacity(table_names.len());
    let mut row_counts = BTreeMap::new();
    let mut masked_columns = Vec::new();
    let mut hashed_columns = Vec::new();

    for name in &table_names {
        let columns = table_columns(conn, name)?;

        let policies: Vec<Policy> = columns.iter().map(|col| policy_for(options, name, col)).collect();
        for (column, policy) in columns.iter().zip(&policies) {
            match policy {
                Policy::Mask => masked_columns.push(format!("{name}.{column}")),
                Policy::Hash => hashed_columns.push(format!("{name}.{column}")),
                Policy::Plain => {}
            }
        }

        let rows = export_rows(conn, name, &columns, &policies, options)?;
        row_counts.insert(name.clone(), rows.len() as u64);
        tables.push(ExportedTable {
            name: name.clone(),
            columns,
            rows,
        });
    }

    Ok(SnapshotExport {
        manifest: ExportManifest {
            captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            dialect: "sqlite".into(),
            tables: table_names,
            row_counts,
            masked_columns,
            hashed_columns,
            options: options.clone(),
        },
        tables,
    })
}

fn user_tables(conn: &Connection) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")?;
    let tables = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
    Ok(tables)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let columns = stmt.query_map([], |row| row.get(1))?.collect::<Result<Vec<String>, _>>()?;
    Ok(columns)
}

fn export_rows(
    conn: &Connection,
    table: &str,
    columns: &[String],
    policies: &[Policy],
    options: &ExportOptions,
) -> Result<Vec<Vec<Option<String>>>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_identifier(table)))?;

    let rows = stmt.query_map([], |row| {
        let mut values = Vec::with_capacity(columns.len());
        for (index, policy) in policies.iter().enumerate() {
            let rendered = render_value(row.get_ref(index)?);
            values.push(match (policy, rendered) {
                (_, None) => None,
                (Policy::Plain, some) => some,
                (Policy::Mask, Some(_)) => Some(options.placeholder.clone()),
                (Policy::Hash, Some(value)) => Some(salted_hash(&options.salt, &value)),
            });
        }
        Ok(values)
    })?;

    rows.collect()
}

fn render_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r) => Some(r.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(hex::encode(b)),
    }
}

fn policy_for(options: &ExportOptions, table: &str, column: &str) -> Policy {
    let qualified = format!("{table}.{column}");
    let names_column = |list: &[String]| list.iter().any(|entry| *entry == qualified || *entry == column);

    if names_column(&options.mask_columns) {
        Policy::Mask
    } else if names_column(&options.hash_columns) {
        Policy::Hash
    } else {
        Policy::Plain
    }
}

fn salted_hash(salt: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
