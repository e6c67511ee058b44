//! Lookup of work items in the catalog and storage of the merged records.

use super::models::{EnrichmentReport, EnrichmentTarget, WorkItem, UPDATED_AT_COLUMN};
use super::reconciler::{work_set, ARTISTS_NAMES_COLUMN, NAME_COLUMN, URI_COLUMN};
use crate::catalog::{AudioFeatures, CatalogClient, CatalogTrack};
use crate::flatten::Row;
use crate::naming::quote_identifier;
use crate::progress::create_progress_bar;
use crate::sqlite_persistence::{ExportDatabase, InsertOutcome, KeyPolicy};
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Columns of the streaming history the joined view needs.
const VIEW_SOURCE_COLUMNS: &[&str] = &["_id", "end_time", "artist_name", "track_name", "ms_played"];

/// Columns of the enrichment table the joined view needs.
const VIEW_DEST_COLUMNS: &[&str] = &[
    "artists_uris",
    "artists_names",
    "name",
    "uri",
    "spotify_url",
    "duration_ms",
    "explicit",
    "popularity",
    "preview_url",
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "time_signature",
];

enum ItemOutcome {
    Stored(InsertOutcome),
    NoMatch,
    NoFeatures,
}

/// Combines track metadata and audio features into one record.
///
/// Audio feature values replace metadata values of the same name, unless
/// the feature value is null.
pub fn merge_record(track: &CatalogTrack, features: &AudioFeatures, updated_at: &str) -> Row {
    let mut record = Row::new();
    let artists_uris: Vec<Value> = track
        .artists
        .iter()
        .map(|a| a.uri.clone().map(Value::String).unwrap_or(Value::Null))
        .collect();
    let artists_names: Vec<Value> = track
        .artists
        .iter()
        .map(|a| Value::String(a.name.clone()))
        .collect();

    record.insert("id".to_string(), Value::from(track.id.clone()));
    record.insert("artists_uris".to_string(), Value::Array(artists_uris));
    record.insert(ARTISTS_NAMES_COLUMN.to_string(), Value::Array(artists_names));
    record.insert(
        "spotify_url".to_string(),
        Value::from(track.external_urls.spotify.clone()),
    );
    record.insert("duration_ms".to_string(), Value::from(track.duration_ms));
    record.insert("explicit".to_string(), Value::from(track.explicit));
    record.insert(NAME_COLUMN.to_string(), Value::String(track.name.clone()));
    record.insert("popularity".to_string(), Value::from(track.popularity));
    record.insert("preview_url".to_string(), Value::from(track.preview_url.clone()));
    record.insert("track_number".to_string(), Value::from(track.track_number));
    record.insert("type".to_string(), Value::from(track.item_type.clone()));
    record.insert(URI_COLUMN.to_string(), Value::String(track.uri.clone()));
    record.insert(
        UPDATED_AT_COLUMN.to_string(),
        Value::String(updated_at.to_string()),
    );

    if let Ok(Value::Object(descriptors)) = serde_json::to_value(features) {
        for (key, value) in descriptors {
            if !value.is_null() || !record.contains_key(&key) {
                record.insert(key, value);
            }
        }
    }
    record
}

/// Drives the catalog lookups of enrichment passes against one database.
pub struct Enricher<'a, C: CatalogClient + ?Sized> {
    db: &'a mut ExportDatabase,
    client: &'a C,
    show_progress: bool,
}

impl<'a, C: CatalogClient + ?Sized> Enricher<'a, C> {
    pub fn new(db: &'a mut ExportDatabase, client: &'a C, show_progress: bool) -> Self {
        Self {
            db,
            client,
            show_progress,
        }
    }

    pub fn db(&self) -> &ExportDatabase {
        &*self.db
    }

    /// Enriches every source identity of `target` that has no record yet.
    pub fn enrich(&mut self, target: &EnrichmentTarget) -> Result<EnrichmentReport> {
        let items = work_set(&*self.db, target)?;
        let mut report = EnrichmentReport {
            work_set: items.len(),
            ..Default::default()
        };
        info!(
            "Enriching {} items from {} into {}",
            items.len(),
            target.source_table,
            target.dest_table
        );

        let policy = target.key_policy();
        let pb = create_progress_bar(
            items.len() as u64,
            &format!("Working on {}", target.source_table),
            self.show_progress,
        );
        for item in &items {
            match self.enrich_item(item, &target.dest_table, &policy) {
                Ok(ItemOutcome::Stored(InsertOutcome::Inserted)) => report.enriched += 1,
                Ok(ItemOutcome::Stored(InsertOutcome::Ignored)) => report.ignored += 1,
                Ok(ItemOutcome::NoMatch) => {
                    debug!("No catalog match for {:?}", item);
                    report.skipped_queries += 1;
                }
                Ok(ItemOutcome::NoFeatures) => {
                    debug!("No audio features for {:?}", item);
                    report.missing_features += 1;
                }
                Err(e) => {
                    warn!("Failed to enrich {:?}: {:#}", item, e);
                    report.failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(report)
    }

    fn enrich_item(
        &mut self,
        item: &WorkItem,
        dest_table: &str,
        policy: &KeyPolicy,
    ) -> Result<ItemOutcome> {
        let track = match item {
            WorkItem::Identifier(uri) => self.client.track(uri)?,
            WorkItem::TextIdentity { .. } => {
                let query = item.search_query().unwrap_or_default();
                self.client.search_tracks(&query, 1)?.into_iter().next()
            }
        };
        let Some(track) = track else {
            return Ok(ItemOutcome::NoMatch);
        };

        let features = self
            .client
            .audio_features(std::slice::from_ref(&track.uri))?
            .into_iter()
            .next()
            .flatten();
        let Some(features) = features else {
            return Ok(ItemOutcome::NoFeatures);
        };

        let record = merge_record(&track, &features, &Utc::now().to_rfc3339());
        Ok(ItemOutcome::Stored(self.db.insert(dest_table, &record, policy)?))
    }
}

/// Rebuilds `view` as the streaming history joined with its enrichment records.
///
/// Plays match a record when artist and track name equal the record's first
/// artist and name exactly. Returns `false` when either side lacks a column.
pub fn materialize_streaming_history_view(
    db: &ExportDatabase,
    source_table: &str,
    dest_table: &str,
    view: &str,
) -> Result<bool> {
    if !db.has_columns(source_table, VIEW_SOURCE_COLUMNS)?
        || !db.has_columns(dest_table, VIEW_DEST_COLUMNS)?
    {
        warn!(
            "Not building {}: {} or {} lacks the joined columns",
            view, source_table, dest_table
        );
        return Ok(false);
    }

    let s = |column: &str| format!("s.{}", quote_identifier(column));
    let e = |column: &str| format!("e.{}", quote_identifier(column));
    let mut projection = vec![
        s("_id"),
        s("end_time"),
        format!("{} AS artist", s("artist_name")),
        format!("json_extract({}, '$[0]') AS artist_uri", e("artists_uris")),
        e("name"),
        e("uri"),
        s("ms_played"),
    ];
    projection.extend(
        VIEW_DEST_COLUMNS
            .iter()
            .filter(|c| !matches!(**c, "artists_uris" | "artists_names" | "name" | "uri"))
            .map(|&c| e(c)),
    );

    let sql = format!(
        "DROP TABLE IF EXISTS {view};
         CREATE TABLE {view} AS
         SELECT {projection}
         FROM {source} AS s
         JOIN {dest} AS e
           ON {artist} = json_extract({artists_names}, '$[0]') AND {track} = {name};",
        view = quote_identifier(view),
        projection = projection.join(", "),
        source = quote_identifier(source_table),
        dest = quote_identifier(dest_table),
        artist = s("artist_name"),
        track = s("track_name"),
        artists_names = e(ARTISTS_NAMES_COLUMN),
        name = e(NAME_COLUMN),
    );
    db.execute_batch(&sql)?;
    info!("Built {} with {} rows", view, db.count_rows(view)?);
    Ok(true)
}
