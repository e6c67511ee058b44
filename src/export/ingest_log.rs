//! Bookkeeping of the archive entries already written to a database.

use crate::naming::quote_identifier;
use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ExportDatabase, SqlType, Table, DEFAULT_TIMESTAMP};
use anyhow::Result;
use rusqlite::params;

pub const INGEST_LOG_TABLE: &str = "_ingest_log";

const INGEST_LOG: Table = Table {
    name: INGEST_LOG_TABLE,
    columns: &[
        sqlite_column!("entry_path", &SqlType::Text, non_null = true),
        sqlite_column!("sha256", &SqlType::Text, non_null = true),
        sqlite_column!("table_name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "ingested_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["entry_path", "sha256"]],
};

pub fn ensure(db: &ExportDatabase) -> Result<()> {
    db.ensure_fixed_table(&INGEST_LOG)
}

/// Whether this exact entry content has been ingested before.
pub fn contains(db: &ExportDatabase, entry_path: &str, sha256: &str) -> Result<bool> {
    let count: i64 = db.connection().query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE entry_path = ?1 AND sha256 = ?2",
            quote_identifier(INGEST_LOG_TABLE)
        ),
        params![entry_path, sha256],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub fn record(db: &ExportDatabase, entry_path: &str, sha256: &str, table_name: &str) -> Result<()> {
    db.connection().execute(
        &format!(
            "INSERT OR IGNORE INTO {} (entry_path, sha256, table_name) VALUES (?1, ?2, ?3)",
            quote_identifier(INGEST_LOG_TABLE)
        ),
        params![entry_path, sha256, table_name],
    )?;
    Ok(())
}
