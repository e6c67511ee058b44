//! SQLite database whose tables are inferred from the rows written to it.

use super::key_policy::{content_hash, KeyPolicy, HASH_ID_COLUMN};
use super::schema::{
    create_table_sql, foreign_keys, key_constraint_sql, table_info, Column, ForeignKey,
    ForeignKeyOnChange, SqlType, Table,
};
use crate::flatten::Row;
use crate::naming::quote_identifier;
use crate::sqlite_column;
use anyhow::{bail, Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of inserting one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The row conflicted with the table's key and was dropped.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    pub inserted: usize,
    pub ignored: usize,
}

impl InsertStats {
    pub fn record(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::Ignored => self.ignored += 1,
        }
    }
}

/// The destination database of a conversion.
///
/// Tables are created on first insert, grow new columns as rows introduce
/// them and never lose or retype existing ones.
pub struct ExportDatabase {
    conn: Connection,
    path: PathBuf,
    /// Known columns per table, filled lazily from `PRAGMA table_info`.
    columns: HashMap<String, Vec<String>>,
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n
                .as_f64()
                .map(SqlValue::Real)
                .unwrap_or_else(|| SqlValue::Text(n.to_string())),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

impl ExportDatabase {
    /// Opens (or creates) the database at `db_path`.
    ///
    /// With `recreate` any existing database file is deleted first.
    pub fn open<P: AsRef<Path>>(db_path: P, recreate: bool) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        if recreate {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                let mut file_name = path.clone().into_os_string();
                file_name.push(suffix);
                remove_if_exists(Path::new(&file_name))?;
            }
            info!("Recreating database at {:?}", path);
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database {:?}", path))?;

        conn.query_row("PRAGMA user_version", [], |r| r.get::<_, i64>(0))
            .with_context(|| format!("Database {:?} is not usable", path))?;
        // References are declared after the fact by rebuilding the referencing table.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;

        Ok(Self {
            conn,
            path,
            columns: HashMap::new(),
        })
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
            columns: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access for queries that do not go through the row API.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            params![table],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Column names of `table`, empty when the table does not exist.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(table_info(&self.conn, table)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    pub fn has_columns(&self, table: &str, required: &[&str]) -> Result<bool> {
        let columns = self.columns(table)?;
        Ok(required
            .iter()
            .all(|r| columns.iter().any(|c| c.eq_ignore_ascii_case(r))))
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
            [],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    /// Creates one of the crate's own fixed tables if it is missing.
    pub fn ensure_fixed_table(&self, table: &Table) -> Result<()> {
        table.create_if_missing(&self.conn)
    }

    /// Inserts `row` into `table` under `policy`, creating or widening the table as needed.
    pub fn insert(&mut self, table: &str, row: &Row, policy: &KeyPolicy) -> Result<InsertOutcome> {
        let mut values: Vec<(&str, Value)> = Vec::with_capacity(row.len() + 1);
        if let KeyPolicy::ContentHash { excluded } = policy {
            values.push((HASH_ID_COLUMN, Value::String(content_hash(row, excluded)?)));
        }
        values.extend(
            row.iter()
                .filter(|(key, _)| {
                    !(matches!(policy, KeyPolicy::ContentHash { .. }) && key.as_str() == HASH_ID_COLUMN)
                })
                .map(|(key, value)| (key.as_str(), value.clone())),
        );

        self.ensure_table(table, &values, policy)?;
        self.ensure_columns(table, &values)?;

        let sql = if values.is_empty() {
            format!("INSERT OR IGNORE INTO {} DEFAULT VALUES", quote_identifier(table))
        } else {
            let columns: Vec<String> = values.iter().map(|(c, _)| quote_identifier(c)).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let changed = stmt.execute(params_from_iter(values.iter().map(|(_, v)| to_sql_value(v))))?;
        Ok(if changed == 0 {
            InsertOutcome::Ignored
        } else {
            InsertOutcome::Inserted
        })
    }

    pub fn insert_all<'r, I>(&mut self, table: &str, rows: I, policy: &KeyPolicy) -> Result<InsertStats>
    where
        I: IntoIterator<Item = &'r Row>,
    {
        let mut stats = InsertStats::default();
        for row in rows {
            stats.record(self.insert(table, row, policy)?);
        }
        Ok(stats)
    }

    fn known_columns(&mut self, table: &str) -> Result<&mut Vec<String>> {
        match self.columns.entry(table.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let columns = table_info(&self.conn, table)?
                    .into_iter()
                    .map(|c| c.name)
                    .collect();
                Ok(entry.insert(columns))
            }
        }
    }

    fn ensure_table(&mut self, table: &str, values: &[(&str, Value)], policy: &KeyPolicy) -> Result<()> {
        if !self.known_columns(table)?.is_empty() {
            return Ok(());
        }

        let key_columns = policy.key_columns();
        let mut definitions: Vec<String> = Vec::new();
        let mut created: Vec<String> = Vec::new();
        for (name, value) in values {
            let column = Column {
                name: *name,
                sql_type: &SqlType::infer(value),
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            definitions.push(column.definition());
            created.push(name.to_string());
        }
        for key in &key_columns {
            if !created.iter().any(|c| c.eq_ignore_ascii_case(key)) {
                let column = sqlite_column!(*key, &SqlType::Text);
                definitions.push(column.definition());
                created.push(key.to_string());
            }
        }
        if definitions.is_empty() {
            bail!("Cannot create table {} from a row without columns", table);
        }

        let constraints = if key_columns.is_empty() {
            vec![]
        } else {
            vec![key_constraint_sql("PRIMARY KEY", &key_columns)]
        };
        debug!("Creating table {} with key {:?}", table, key_columns);
        self.conn
            .execute(&create_table_sql(table, &definitions, &constraints, false), [])
            .with_context(|| format!("Failed to create table {}", table))?;
        self.columns.insert(table.to_string(), created);
        Ok(())
    }

    fn ensure_columns(&mut self, table: &str, values: &[(&str, Value)]) -> Result<()> {
        let known = self.known_columns(table)?.clone();
        let missing: Vec<&(&str, Value)> = values
            .iter()
            .filter(|(name, _)| !known.iter().any(|k| k.eq_ignore_ascii_case(name)))
            .collect();
        for (name, value) in missing {
            debug!("Adding column {} to table {}", name, table);
            let column = Column {
                name: *name,
                sql_type: &SqlType::infer(value),
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            self.conn
                .execute(
                    &format!(
                        "ALTER TABLE {} ADD COLUMN {}",
                        quote_identifier(table),
                        column.definition()
                    ),
                    [],
                )
                .with_context(|| format!("Failed to add column {} to {}", name, table))?;
            self.known_columns(table)?.push(name.to_string());
        }
        Ok(())
    }

    /// Declares `table.column` as referencing `foreign_table.foreign_column`.
    ///
    /// SQLite cannot add constraints in place, so the table is rebuilt inside a
    /// transaction. Returns `false` when either table is missing or the link exists.
    pub fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        foreign_table: &str,
        foreign_column: &str,
    ) -> Result<bool> {
        if !self.table_exists(table)? || !self.table_exists(foreign_table)? {
            return Ok(false);
        }
        let existing = foreign_keys(&self.conn, table)?;
        if existing.iter().any(|fk| {
            fk.from_column == column && fk.foreign_key.foreign_table == foreign_table
        }) {
            return Ok(false);
        }

        let info = table_info(&self.conn, table)?;
        if !info.iter().any(|c| c.name == column) {
            bail!("Table {} has no column {}", table, column);
        }

        let new_key = ForeignKey {
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
            on_delete: ForeignKeyOnChange::NoAction,
        };
        let definitions: Vec<String> = info
            .iter()
            .map(|c| {
                let foreign_key = if c.name == column {
                    Some(&new_key)
                } else {
                    existing
                        .iter()
                        .find(|fk| fk.from_column == c.name)
                        .map(|fk| &fk.foreign_key)
                };
                Column {
                    name: c.name.clone(),
                    sql_type: &c.sql_type,
                    is_primary_key: false,
                    non_null: c.non_null,
                    is_unique: false,
                    default_value: c.default_value.clone(),
                    foreign_key,
                }
                .definition()
            })
            .collect();

        let mut key_columns: Vec<(usize, &str)> = info
            .iter()
            .filter(|c| c.primary_key_position > 0)
            .map(|c| (c.primary_key_position, c.name.as_str()))
            .collect();
        key_columns.sort();
        let key_columns: Vec<&str> = key_columns.into_iter().map(|(_, name)| name).collect();
        let constraints = if key_columns.is_empty() {
            vec![]
        } else {
            vec![key_constraint_sql("PRIMARY KEY", &key_columns)]
        };

        let rebuilt = format!("{}__rebuild", table);
        let column_list: Vec<String> = info.iter().map(|c| quote_identifier(&c.name)).collect();
        let column_list = column_list.join(", ");
        let sql = format!(
            "BEGIN;
             {create};
             INSERT INTO {rebuilt} ({columns}) SELECT {columns} FROM {table};
             DROP TABLE {table};
             ALTER TABLE {rebuilt} RENAME TO {table};
             COMMIT;",
            create = create_table_sql(&rebuilt, &definitions, &constraints, false),
            rebuilt = quote_identifier(&rebuilt),
            columns = column_list,
            table = quote_identifier(table),
        );
        if let Err(e) = self.conn.execute_batch(&sql) {
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("ROLLBACK")?;
            }
            return Err(e).with_context(|| format!("Failed to add foreign key to {}", table));
        }
        self.columns.remove(table);
        Ok(true)
    }

    /// Runs `f` inside a transaction, rolling back everything it wrote if it fails.
    pub fn in_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.conn.execute_batch("BEGIN")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                self.conn.execute_batch("ROLLBACK")?;
                // Tables created or altered inside the transaction are gone again.
                self.columns.clear();
                Err(e)
            }
        }
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Reclaims the space left behind by dropped tables and rebuilt rows.
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM").context("Failed to vacuum database")
    }
}
