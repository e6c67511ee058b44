mod schema;
mod key_policy;
mod store;

pub use key_policy::{content_hash, KeyPolicy, HASH_ID_COLUMN};
pub use schema::{
    create_table_sql, foreign_keys, key_constraint_sql, table_info, Column, ColumnInfo,
    ForeignKey, ForeignKeyInfo, ForeignKeyOnChange, SqlType, Table, DEFAULT_TIMESTAMP,
};
pub use store::{ExportDatabase, InsertOutcome, InsertStats};
