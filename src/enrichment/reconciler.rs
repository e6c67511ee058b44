//! Computation of the work set: source identities without an enrichment record.

use super::models::{EnrichmentTarget, ReconcileStrategy, WorkItem};
use crate::naming::quote_identifier;
use crate::sqlite_persistence::ExportDatabase;
use anyhow::Result;
use tracing::debug;

pub const URI_COLUMN: &str = "uri";
pub const NAME_COLUMN: &str = "name";
pub const ARTISTS_NAMES_COLUMN: &str = "artists_names";

/// Source identities of `target` that are not yet enriched, in a stable order.
///
/// A missing source table or identity column yields an empty work set.
pub fn work_set(db: &ExportDatabase, target: &EnrichmentTarget) -> Result<Vec<WorkItem>> {
    match &target.strategy {
        ReconcileStrategy::Identifier { column } => identifier_work_set(db, target, column),
        ReconcileStrategy::TextIdentity {
            artist_column,
            track_column,
        } => text_identity_work_set(db, target, artist_column, track_column),
    }
}

fn identifier_work_set(
    db: &ExportDatabase,
    target: &EnrichmentTarget,
    column: &str,
) -> Result<Vec<WorkItem>> {
    if !db.has_columns(&target.source_table, &[column])? {
        debug!("{}.{} does not exist", target.source_table, column);
        return Ok(vec![]);
    }

    let source_column = format!("CAST({} AS TEXT)", quote_identifier(column));
    let mut sql = format!(
        "SELECT DISTINCT {source_column} FROM {source} WHERE {column} IS NOT NULL",
        source_column = source_column,
        source = quote_identifier(&target.source_table),
        column = quote_identifier(column),
    );
    if db.has_columns(&target.dest_table, &[URI_COLUMN])? {
        sql.push_str(&format!(
            " AND {} NOT IN (SELECT {uri} FROM {dest} WHERE {uri} IS NOT NULL)",
            source_column,
            uri = quote_identifier(URI_COLUMN),
            dest = quote_identifier(&target.dest_table),
        ));
    }
    sql.push_str(" ORDER BY 1");

    let mut stmt = db.connection().prepare(&sql)?;
    let items = stmt
        .query_map([], |row| Ok(WorkItem::Identifier(row.get(0)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

fn text_identity_work_set(
    db: &ExportDatabase,
    target: &EnrichmentTarget,
    artist_column: &str,
    track_column: &str,
) -> Result<Vec<WorkItem>> {
    if !db.has_columns(&target.source_table, &[artist_column, track_column])? {
        debug!(
            "{} lacks {} or {}",
            target.source_table, artist_column, track_column
        );
        return Ok(vec![]);
    }

    let artist = quote_identifier(artist_column);
    let track = quote_identifier(track_column);
    let mut sql = format!(
        "SELECT DISTINCT CAST({artist} AS TEXT), CAST({track} AS TEXT) FROM {source} \
         WHERE {artist} IS NOT NULL AND {track} IS NOT NULL",
        artist = artist,
        track = track,
        source = quote_identifier(&target.source_table),
    );
    // Enriched records carry the catalog's names: the first listed artist and the track name.
    if db.has_columns(&target.dest_table, &[ARTISTS_NAMES_COLUMN, NAME_COLUMN])? {
        sql.push_str(&format!(
            " EXCEPT SELECT json_extract({artists}, '$[0]'), CAST({name} AS TEXT) FROM {dest}",
            artists = quote_identifier(ARTISTS_NAMES_COLUMN),
            name = quote_identifier(NAME_COLUMN),
            dest = quote_identifier(&target.dest_table),
        ));
    }
    sql.push_str(" ORDER BY 1, 2");

    let mut stmt = db.connection().prepare(&sql)?;
    let items = stmt
        .query_map([], |row| {
            Ok(WorkItem::TextIdentity {
                artist_name: row.get(0)?,
                track_name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}
