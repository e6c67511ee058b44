//! End-to-end tests for the enrichment pass
//!
//! A converted sample export is enriched against [`FakeCatalog`], which
//! knows three of the four tracks in the streaming history.

mod common;

use common::*;
use spotify_to_sqlite::config::EnrichmentSettings;
use spotify_to_sqlite::enrichment::{enrich_export, enrich_table, ExportEnrichment};
use spotify_to_sqlite::{ConvertOptions, ExportArchive, ExportConverter, ExportDatabase};

fn converted_sample() -> (TestExport, ExportDatabase) {
    let export = TestExport::sample();
    let mut archive = ExportArchive::open(&export.zip_path).unwrap();
    let mut db = ExportDatabase::open(&export.db_path, false).unwrap();
    ExportConverter::new(&mut db, ConvertOptions::default())
        .convert(&mut archive)
        .unwrap();
    (export, db)
}

fn enrich(db: &mut ExportDatabase, catalog: &FakeCatalog) -> ExportEnrichment {
    enrich_export(db, catalog, &EnrichmentSettings::default(), false).unwrap()
}

#[test]
fn test_enrich_sample_export() {
    let (export, mut db) = converted_sample();
    let catalog = FakeCatalog::new();
    let result = enrich(&mut db, &catalog);

    assert_eq!(result.library.work_set, 2);
    assert_eq!(result.library.enriched, 2);
    assert_eq!(result.streaming_history.work_set, 4);
    assert_eq!(result.streaming_history.enriched, 3);
    assert_eq!(result.streaming_history.skipped_queries, 1);
    assert_eq!(result.streaming_history.failed, 0);
    assert!(result.view_built);

    assert_eq!(db.count_rows("library_tracks_audio_features").unwrap(), 2);
    assert_eq!(db.count_rows("streaming_history_audio_features").unwrap(), 3);

    let conn = export.connection();
    let names = query_strings(
        &conn,
        "SELECT name FROM streaming_history_audio_features ORDER BY name",
    );
    assert_eq!(names, vec![TRACK_3_NAME, TRACK_1_NAME, TRACK_2_NAME]);
    assert_eq!(catalog.lookups.borrow().len(), 2);
    assert_eq!(catalog.searches.borrow().len(), 4);
}

#[test]
fn test_unresolvable_search_adds_nothing() {
    let (export, mut db) = converted_sample();
    enrich(&mut db, &FakeCatalog::new());

    let conn = export.connection();
    let unknown: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM streaming_history_audio_features WHERE name = ?1",
            [UNKNOWN_TRACK],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(unknown, 0);
}

#[test]
fn test_joined_view_matches_plays() {
    let (export, mut db) = converted_sample();
    enrich(&mut db, &FakeCatalog::new());

    let conn = export.connection();
    // Four of the five plays have a catalog match.
    let plays: i64 = conn
        .query_row("SELECT COUNT(*) FROM enriched_streaming_history", [], |r| r.get(0))
        .unwrap();
    assert_eq!(plays, 4);

    let columns = query_strings(
        &conn,
        "SELECT name FROM pragma_table_info('enriched_streaming_history') ORDER BY cid",
    );
    assert_eq!(
        &columns[..7],
        &["_id", "end_time", "artist", "artist_uri", "name", "uri", "ms_played"]
    );
    assert!(columns.iter().any(|c| c == "danceability"));

    let uris = query_strings(
        &conn,
        "SELECT DISTINCT uri FROM enriched_streaming_history WHERE artist = 'Daft Punk'",
    );
    assert_eq!(uris, vec![TRACK_1_URI]);
}

#[test]
fn test_resumed_pass_only_retries_leftovers() {
    let (_export, mut db) = converted_sample();
    enrich(&mut db, &FakeCatalog::new());

    let catalog = FakeCatalog::new();
    let result = enrich(&mut db, &catalog);
    assert_eq!(result.library.work_set, 0);
    assert_eq!(result.streaming_history.work_set, 1);
    assert_eq!(result.streaming_history.enriched, 0);
    assert_eq!(result.streaming_history.skipped_queries, 1);
    assert_eq!(
        *catalog.searches.borrow(),
        vec![format!("{} {}", UNKNOWN_ARTIST, UNKNOWN_TRACK)]
    );
    assert_eq!(db.count_rows("streaming_history_audio_features").unwrap(), 3);
    assert!(result.view_built);
}

#[test]
fn test_client_errors_do_not_stop_the_pass() {
    let (_export, mut db) = converted_sample();
    let catalog = FakeCatalog::new()
        .failing_for(&format!("{} {}", ARTIST_2_NAME, TRACK_2_NAME))
        .failing_for(TRACK_1_URI);
    let result = enrich(&mut db, &catalog);

    assert_eq!(result.library.failed, 1);
    assert_eq!(result.library.enriched, 1);
    assert_eq!(result.streaming_history.failed, 1);
    assert_eq!(result.streaming_history.enriched, 2);

    // The failed identities are picked up by the next pass.
    let result = enrich(&mut db, &FakeCatalog::new());
    assert_eq!(result.library.enriched, 1);
    assert_eq!(result.streaming_history.enriched, 1);
}

#[test]
fn test_tracks_without_features_are_counted() {
    let (_export, mut db) = converted_sample();
    let catalog = FakeCatalog::new().without_features_for(TRACK_3_URI);
    let result = enrich(&mut db, &catalog);

    assert_eq!(result.streaming_history.missing_features, 1);
    assert_eq!(result.streaming_history.enriched, 2);
    assert_eq!(db.count_rows("streaming_history_audio_features").unwrap(), 2);
}

#[test]
fn test_enrich_table_defaults_destination() {
    let (_export, mut db) = converted_sample();
    let catalog = FakeCatalog::new();
    let report = enrich_table(&mut db, &catalog, "your_library_tracks", "uri", None, false).unwrap();

    assert_eq!(report.work_set, 2);
    assert_eq!(report.enriched, 2);
    assert!(db.table_exists("your_library_tracks_audio_features").unwrap());

    let report = enrich_table(&mut db, &catalog, "your_library_tracks", "uri", None, false).unwrap();
    assert_eq!(report.work_set, 0);
}

#[test]
fn test_enrich_table_missing_source() {
    let (_export, mut db) = converted_sample();
    let catalog = FakeCatalog::new();
    let report = enrich_table(&mut db, &catalog, "nope", "uri", Some("nope_features"), false).unwrap();

    assert_eq!(report.work_set, 0);
    assert_eq!(catalog.call_count(), 0);
    assert!(!db.table_exists("nope_features").unwrap());
}

#[cfg(feature = "mock")]
#[test]
fn test_enrich_with_mocked_catalog() {
    use spotify_to_sqlite::catalog::MockCatalogClient;

    let (_export, mut db) = converted_sample();
    let mut client = MockCatalogClient::new();
    client.expect_track().returning(|_| Ok(None));
    client.expect_search_tracks().times(4).returning(|_, _| Ok(vec![]));
    client.expect_audio_features().never();

    let result = enrich_export(&mut db, &client, &EnrichmentSettings::default(), false).unwrap();
    assert_eq!(result.library.skipped_queries, 2);
    assert_eq!(result.streaming_history.skipped_queries, 4);
    assert!(!result.view_built);
}
