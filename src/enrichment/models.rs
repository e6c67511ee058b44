//! Data models for the enrichment pass.

use crate::sqlite_persistence::KeyPolicy;

/// Column stamped on every enrichment record with the time it was fetched.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// One source identity still lacking an enrichment record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkItem {
    /// A catalog identifier, looked up directly.
    Identifier(String),
    /// A play without identifier, resolved through a text search.
    TextIdentity {
        artist_name: String,
        track_name: String,
    },
}

impl WorkItem {
    pub fn search_query(&self) -> Option<String> {
        match self {
            WorkItem::Identifier(_) => None,
            WorkItem::TextIdentity {
                artist_name,
                track_name,
            } => Some(format!("{} {}", artist_name, track_name)),
        }
    }
}

/// How source rows are matched against existing enrichment records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStrategy {
    Identifier {
        column: String,
    },
    TextIdentity {
        artist_column: String,
        track_column: String,
    },
}

/// A source table and the table its enrichment records go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentTarget {
    pub source_table: String,
    pub dest_table: String,
    pub strategy: ReconcileStrategy,
}

impl EnrichmentTarget {
    pub fn by_identifier(source_table: &str, column: &str, dest_table: &str) -> Self {
        Self {
            source_table: source_table.to_string(),
            dest_table: dest_table.to_string(),
            strategy: ReconcileStrategy::Identifier {
                column: column.to_string(),
            },
        }
    }

    pub fn by_text_identity(
        source_table: &str,
        artist_column: &str,
        track_column: &str,
        dest_table: &str,
    ) -> Self {
        Self {
            source_table: source_table.to_string(),
            dest_table: dest_table.to_string(),
            strategy: ReconcileStrategy::TextIdentity {
                artist_column: artist_column.to_string(),
                track_column: track_column.to_string(),
            },
        }
    }

    /// Identifier-matched records are keyed by catalog id; text-matched ones by content.
    pub fn key_policy(&self) -> KeyPolicy {
        match self.strategy {
            ReconcileStrategy::Identifier { .. } => KeyPolicy::natural_key(&["id"]),
            ReconcileStrategy::TextIdentity { .. } => {
                KeyPolicy::content_hash_excluding(&[UPDATED_AT_COLUMN])
            }
        }
    }
}

/// Outcome of enriching one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub work_set: usize,
    pub enriched: usize,
    /// Records that already existed in the destination table.
    pub ignored: usize,
    /// Searches without any result.
    pub skipped_queries: usize,
    /// Resolved tracks the catalog has no audio features for.
    pub missing_features: usize,
    pub failed: usize,
}
