use crate::flatten::Row;
use anyhow::Result;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Column holding the synthetic identifier of content-hash keyed tables.
pub const HASH_ID_COLUMN: &str = "_id";

/// How rows of a table are deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPolicy {
    /// No uniqueness constraint, every row is inserted.
    None,
    /// The listed columns form the primary key; conflicting rows are ignored.
    NaturalKey(Vec<String>),
    /// A SHA-256 of the row content (minus `excluded` columns) is the primary key.
    ContentHash { excluded: Vec<String> },
}

impl KeyPolicy {
    pub fn natural_key<S: AsRef<str>>(columns: &[S]) -> Self {
        KeyPolicy::NaturalKey(columns.iter().map(|c| c.as_ref().to_string()).collect())
    }

    pub fn content_hash() -> Self {
        KeyPolicy::ContentHash { excluded: vec![] }
    }

    pub fn content_hash_excluding<S: AsRef<str>>(columns: &[S]) -> Self {
        KeyPolicy::ContentHash {
            excluded: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    /// Columns forming the primary key of tables created under this policy.
    pub fn key_columns(&self) -> Vec<&str> {
        match self {
            KeyPolicy::None => vec![],
            KeyPolicy::NaturalKey(columns) => columns.iter().map(String::as_str).collect(),
            KeyPolicy::ContentHash { .. } => vec![HASH_ID_COLUMN],
        }
    }
}

/// Hex SHA-256 of the row's canonical JSON (keys sorted), skipping `excluded` and the hash column.
pub fn content_hash(row: &Row, excluded: &[String]) -> Result<String> {
    let canonical: BTreeMap<&str, &Value> = row
        .iter()
        .filter(|(key, _)| key.as_str() != HASH_ID_COLUMN && !excluded.contains(key))
        .map(|(key, value)| (key.as_str(), value))
        .collect();
    let json = serde_json::to_string(&canonical)?;
    let digest = Sha256::digest(json.as_bytes());
    Ok(format!("{:x}", digest))
}
