use crate::naming::quote_identifier;
use anyhow::Result;
use rusqlite::{params, Connection};
use serde_json::Value;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Allow unused_mut because the variable is only mutated when optional
            // field assignments are passed to the macro (e.g., `non_null = true`)
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
    /// Declared without a type: values keep the storage class they were written with.
    Untyped,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
            SqlType::Untyped => "",
        }
    }

    /// Maps a declared column type back to a [`SqlType`], following SQLite's affinity rules.
    pub fn from_declared(declared: &str) -> SqlType {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("INT") {
            SqlType::Integer
        } else if declared.contains("CHAR") || declared.contains("CLOB") || declared.contains("TEXT")
        {
            SqlType::Text
        } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB")
        {
            SqlType::Real
        } else if declared.is_empty() {
            SqlType::Untyped
        } else if declared.contains("BLOB") {
            SqlType::Blob
        } else {
            SqlType::Text
        }
    }

    /// Column type for a JSON value; lists and objects are stored as text.
    ///
    /// A null says nothing about the column, which is then left untyped.
    pub fn infer(value: &Value) -> SqlType {
        match value {
            Value::Null => SqlType::Untyped,
            Value::Bool(_) => SqlType::Integer,
            Value::Number(n) if n.is_i64() => SqlType::Integer,
            Value::Number(_) => SqlType::Real,
            Value::String(_) | Value::Array(_) | Value::Object(_) => SqlType::Text,
        }
    }
}

#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyOnChange {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Restrict => "RESTRICT",
            ForeignKeyOnChange::SetNull => "SET NULL",
            ForeignKeyOnChange::SetDefault => "SET DEFAULT",
            ForeignKeyOnChange::Cascade => "CASCADE",
        }
    }

    fn from_sql(s: &str) -> ForeignKeyOnChange {
        match s {
            "RESTRICT" => ForeignKeyOnChange::Restrict,
            "SET NULL" => ForeignKeyOnChange::SetNull,
            "SET DEFAULT" => ForeignKeyOnChange::SetDefault,
            "CASCADE" => ForeignKeyOnChange::Cascade,
            _ => ForeignKeyOnChange::NoAction,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForeignKey<S: AsRef<str>> {
    pub foreign_table: S,
    pub foreign_column: S,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<S>,
    pub foreign_key: Option<&'a ForeignKey<S>>,
}

impl<S: AsRef<str>> Column<'_, S> {
    /// Column definition as it appears inside `CREATE TABLE (...)`.
    pub fn definition(&self) -> String {
        let mut sql = quote_identifier(self.name.as_ref());
        if *self.sql_type != SqlType::Untyped {
            sql.push(' ');
            sql.push_str(self.sql_type.as_sql());
        }
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if self.is_unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default_value) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default_value.as_ref()));
        }
        if let Some(foreign_key) = self.foreign_key {
            sql.push_str(&format!(
                " REFERENCES {}({}) ON DELETE {}",
                quote_identifier(foreign_key.foreign_table.as_ref()),
                quote_identifier(foreign_key.foreign_column.as_ref()),
                foreign_key.on_delete.as_sql()
            ));
        }
        sql
    }
}

/// Renders a `CREATE TABLE` statement from column definitions and table constraints.
pub fn create_table_sql(
    name: &str,
    column_definitions: &[String],
    table_constraints: &[String],
    if_not_exists: bool,
) -> String {
    let mut parts: Vec<&str> = column_definitions.iter().map(String::as_str).collect();
    parts.extend(table_constraints.iter().map(String::as_str));
    format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_identifier(name),
        parts.join(", ")
    )
}

/// Renders a `PRIMARY KEY (..)` / `UNIQUE (..)` table constraint.
pub fn key_constraint_sql<S: AsRef<str>>(kind: &str, columns: &[S]) -> String {
    let columns: Vec<String> = columns
        .iter()
        .map(|c| quote_identifier(c.as_ref()))
        .collect();
    format!("{} ({})", kind, columns.join(", "))
}

/// A fixed table owned by this crate (as opposed to tables inferred from export data).
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create_if_missing(&self, conn: &Connection) -> Result<()> {
        let definitions: Vec<String> = self.columns.iter().map(|c| c.definition()).collect();
        let constraints: Vec<String> = self
            .unique_constraints
            .iter()
            .map(|columns| key_constraint_sql("UNIQUE", columns))
            .collect();
        conn.execute(
            &create_table_sql(self.name, &definitions, &constraints, true),
            params![],
        )?;
        Ok(())
    }
}

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: SqlType,
    pub non_null: bool,
    pub default_value: Option<String>,
    /// 1-based position in the primary key, 0 when not part of it.
    pub primary_key_position: usize,
}

/// A foreign key as reported by `PRAGMA foreign_key_list`.
#[derive(Debug, Clone)]
pub struct ForeignKeyInfo {
    pub from_column: String,
    pub foreign_key: ForeignKey<String>,
}

pub fn table_info(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let columns = stmt
        .query_map(params![], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                sql_type: SqlType::from_declared(&row.get::<_, String>(2)?),
                non_null: row.get::<_, i32>(3)? == 1,
                default_value: row.get(4)?,
                primary_key_position: row.get::<_, i64>(5)? as usize,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

pub fn foreign_keys(conn: &Connection, table: &str) -> Result<Vec<ForeignKeyInfo>> {
    // PRAGMA foreign_key_list returns: id, seq, table, from, to, on_update, on_delete, match
    let mut stmt = conn.prepare(&format!(
        "PRAGMA foreign_key_list({})",
        quote_identifier(table)
    ))?;
    let keys = stmt
        .query_map(params![], |row| {
            Ok(ForeignKeyInfo {
                from_column: row.get(3)?,
                foreign_key: ForeignKey {
                    foreign_table: row.get(2)?,
                    foreign_column: row.get(4)?,
                    on_delete: ForeignKeyOnChange::from_sql(&row.get::<_, String>(6)?),
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}
