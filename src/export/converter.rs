//! Writing of a whole export archive into the database.

use super::archive::{ArchiveEntry, ExportArchive};
use super::ingest_log;
use super::router::{
    PlaylistShape, Shaped, TableKind, PLAYLIST_ID_COLUMN, PLAYLIST_TABLE, PLAYLIST_TRACKS_TABLE,
};
use crate::progress::create_progress_bar;
use crate::sqlite_persistence::{ExportDatabase, InsertOutcome};
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Re-ingest entries whose content was already ingested.
    pub force: bool,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableReport {
    pub inserted: usize,
    pub ignored: usize,
    pub invalid_rows: usize,
}

impl TableReport {
    fn add(&mut self, other: &TableReport) {
        self.inserted += other.inserted;
        self.ignored += other.ignored;
        self.invalid_rows += other.invalid_rows;
    }
}

/// Outcome of converting one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertReport {
    /// JSON entries found in the archive.
    pub entries: usize,
    /// Entries that could not be read or parsed.
    pub parse_failed: usize,
    /// Entries skipped because the same content was ingested before.
    pub unchanged: usize,
    /// Entries (or library categories) whose content had no usable shape.
    pub unpopulated: usize,
    /// Entries rolled back after a storage error.
    pub failed: usize,
    pub playlists_linked: bool,
    pub tables: BTreeMap<String, TableReport>,
}

impl ConvertReport {
    pub fn table(&self, name: &str) -> TableReport {
        self.tables.get(name).copied().unwrap_or_default()
    }

    pub fn log_summary(&self) {
        info!(
            "Converted {} entries: {} unchanged, {} failed to load, {} not populated, {} failed",
            self.entries, self.unchanged, self.parse_failed, self.unpopulated, self.failed
        );
        for (table, report) in &self.tables {
            info!(
                "  {}: {} inserted, {} ignored, {} invalid rows",
                table, report.inserted, report.ignored, report.invalid_rows
            );
        }
    }
}

/// Ingests export archives into an [`ExportDatabase`].
///
/// Playlists are numbered from 1 in archive order on every run, unchanged
/// entries included, so a playlist keeps its id across re-runs of the same export.
pub struct ExportConverter<'a> {
    db: &'a mut ExportDatabase,
    options: ConvertOptions,
    next_playlist_id: i64,
}

impl<'a> ExportConverter<'a> {
    pub fn new(db: &'a mut ExportDatabase, options: ConvertOptions) -> Self {
        Self {
            db,
            options,
            next_playlist_id: 1,
        }
    }

    pub fn convert(&mut self, archive: &mut ExportArchive) -> Result<ConvertReport> {
        ingest_log::ensure(&*self.db)?;

        let entries = archive.json_entries();
        let mut report = ConvertReport {
            entries: entries.len(),
            ..Default::default()
        };
        info!(
            "Loading {} JSON files from {:?} into {:?}",
            entries.len(),
            archive.path(),
            self.db.path()
        );

        self.next_playlist_id = 1;
        let pb = create_progress_bar(
            entries.len() as u64,
            "Loading JSON files",
            self.options.show_progress,
        );
        for name in &entries {
            pb.set_message(name.clone());
            self.convert_entry(archive, name, &mut report)?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.playlists_linked = self.db.add_foreign_key(
            PLAYLIST_TRACKS_TABLE,
            PLAYLIST_ID_COLUMN,
            PLAYLIST_TABLE,
            PLAYLIST_ID_COLUMN,
        )?;
        if report.playlists_linked {
            debug!("Linked {} to {}", PLAYLIST_TRACKS_TABLE, PLAYLIST_TABLE);
        }
        Ok(report)
    }

    /// Converts one entry; only errors of the ingest log itself abort the run.
    fn convert_entry(
        &mut self,
        archive: &mut ExportArchive,
        name: &str,
        report: &mut ConvertReport,
    ) -> Result<()> {
        let entry = match archive.read(name) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error loading {}: {}. Skipping", name, e);
                report.parse_failed += 1;
                return Ok(());
            }
        };

        let sha256 = entry.sha256();
        if !self.options.force && ingest_log::contains(&*self.db, &entry.path, &sha256)? {
            debug!("{} already ingested", entry.path);
            report.unchanged += 1;
            self.next_playlist_id += unchanged_playlist_count(&entry) as i64;
            return Ok(());
        }

        let value = match entry.parse() {
            Ok(value) => value,
            Err(e) => {
                warn!("Error loading {}: {}. Skipping", entry.path, e);
                report.parse_failed += 1;
                return Ok(());
            }
        };

        let table = entry.table_name();
        let shaped = match TableKind::route(&table).shape(&table, value) {
            Ok(shaped) => shaped,
            Err(e) => {
                warn!("Couldn't populate table {} from {}: {}", table, entry.path, e);
                report.unpopulated += 1;
                return Ok(());
            }
        };
        for (category_table, e) in &shaped.unpopulated {
            warn!("Couldn't populate table {} from {}: {}", category_table, entry.path, e);
            report.unpopulated += 1;
        }

        let first_playlist_id = self.next_playlist_id;
        self.next_playlist_id += shaped.playlists.len() as i64;
        let written = self.db.in_transaction(|db| {
            let tables = write_shaped(db, &shaped, first_playlist_id)?;
            ingest_log::record(db, &entry.path, &sha256, &table)?;
            Ok(tables)
        });
        match written {
            Ok(tables) => {
                for (table, table_report) in tables {
                    debug!("{} -> {}: {:?}", entry.path, table, table_report);
                    report.tables.entry(table).or_default().add(&table_report);
                }
            }
            Err(e) => {
                warn!("Failed to write {}: {:#}. Skipping", entry.path, e);
                report.failed += 1;
            }
        }
        Ok(())
    }
}

/// Playlists an already ingested entry holds, so later entries keep their ids.
fn unchanged_playlist_count(entry: &ArchiveEntry) -> usize {
    let table = entry.table_name();
    if TableKind::route(&table) != TableKind::Playlist {
        return 0;
    }
    entry
        .parse()
        .ok()
        .and_then(|value| TableKind::Playlist.shape(&table, value).ok())
        .map(|shaped| shaped.playlists.len())
        .unwrap_or(0)
}

/// Writes one entry's rows; playlists are numbered from `first_playlist_id`.
fn write_shaped(
    db: &mut ExportDatabase,
    shaped: &Shaped,
    first_playlist_id: i64,
) -> Result<Vec<(String, TableReport)>> {
    let mut tables = Vec::new();
    for batch in &shaped.batches {
        let stats = db.insert_all(&batch.table, &batch.rows, &batch.key_policy)?;
        tables.push((
            batch.table.clone(),
            TableReport {
                inserted: stats.inserted,
                ignored: stats.ignored,
                invalid_rows: batch.invalid_rows,
            },
        ));
    }

    if !shaped.playlists.is_empty() || shaped.invalid_playlists > 0 {
        let mut playlists = TableReport {
            invalid_rows: shaped.invalid_playlists,
            ..Default::default()
        };
        let mut tracks = TableReport::default();
        let playlist_policy = PlaylistShape::playlist_key_policy();
        let track_policy = PlaylistShape::track_key_policy();
        for (playlist_id, playlist) in (first_playlist_id..).zip(&shaped.playlists) {
            match db.insert(PLAYLIST_TABLE, &playlist.playlist_row(playlist_id), &playlist_policy)? {
                InsertOutcome::Inserted => playlists.inserted += 1,
                InsertOutcome::Ignored => playlists.ignored += 1,
            }
            let rows = playlist.track_rows(playlist_id);
            let stats = db.insert_all(PLAYLIST_TRACKS_TABLE, &rows, &track_policy)?;
            tracks.inserted += stats.inserted;
            tracks.ignored += stats.ignored;
        }
        tables.push((PLAYLIST_TABLE.to_string(), playlists));
        tables.push((PLAYLIST_TRACKS_TABLE.to_string(), tracks));
    }
    Ok(tables)
}
