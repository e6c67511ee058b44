//! Export archive fixtures

#![allow(dead_code)]

use super::constants::*;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A zipped export and a database path inside one temporary directory.
pub struct TestExport {
    pub dir: TempDir,
    pub zip_path: PathBuf,
    pub db_path: PathBuf,
}

impl TestExport {
    /// Writes `entries` (path inside the archive, raw content) to a new zip.
    pub fn with_raw_entries(entries: &[(&str, String)]) -> Self {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("my_spotify_data.zip");
        let db_path = dir.path().join("spotify.db");

        let mut zip = ZipWriter::new(File::create(&zip_path).unwrap());
        zip.add_directory("MyData/", SimpleFileOptions::default())
            .unwrap();
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        Self {
            dir,
            zip_path,
            db_path,
        }
    }

    pub fn with_entries(entries: &[(&str, Value)]) -> Self {
        let raw: Vec<(&str, String)> = entries
            .iter()
            .map(|(name, value)| (*name, value.to_string()))
            .collect();
        Self::with_raw_entries(&raw)
    }

    pub fn sample() -> Self {
        Self::with_entries(&sample_export_entries())
    }

    pub fn connection(&self) -> Connection {
        Connection::open(&self.db_path).unwrap()
    }
}

/// A small but complete export: history split over two files, library,
/// playlists, inferences and user data.
pub fn sample_export_entries() -> Vec<(&'static str, Value)> {
    vec![
        (
            "MyData/StreamingHistory0.json",
            json!([
                {"endTime": "2021-01-01 10:00", "artistName": ARTIST_1_NAME, "trackName": TRACK_1_NAME, "msPlayed": 320000},
                {"endTime": "2021-01-01 10:06", "artistName": ARTIST_2_NAME, "trackName": TRACK_2_NAME, "msPlayed": 330000},
                {"endTime": "2021-01-02 09:00", "artistName": ARTIST_1_NAME, "trackName": TRACK_1_NAME, "msPlayed": 1000}
            ]),
        ),
        (
            "MyData/StreamingHistory1.json",
            json!([
                {"endTime": "2021-01-03 18:30", "artistName": ARTIST_2_NAME, "trackName": TRACK_3_NAME, "msPlayed": 380000},
                {"endTime": "2021-01-04 20:00", "artistName": UNKNOWN_ARTIST, "trackName": UNKNOWN_TRACK, "msPlayed": 5000}
            ]),
        ),
        (
            "MyData/YourLibrary.json",
            json!({
                "tracks": [
                    {"artist": ARTIST_1_NAME, "album": "Discovery", "track": TRACK_1_NAME, "uri": TRACK_1_URI},
                    {"artist": ARTIST_2_NAME, "album": "Mezzanine", "track": TRACK_2_NAME, "uri": TRACK_2_URI}
                ],
                "albums": [
                    {"artist": ARTIST_1_NAME, "album": "Discovery", "uri": "spotify:album:2noRn2Aes5aoNVsU6iWThc"}
                ]
            }),
        ),
        (
            "MyData/Playlist1.json",
            json!({"playlists": [
                {"name": "Morning", "lastModifiedDate": "2021-01-05", "items": [
                    {"track": {"trackName": TRACK_1_NAME, "artistName": ARTIST_1_NAME, "trackUri": TRACK_1_URI}, "addedDate": "2021-01-01"},
                    {"track": {"trackName": TRACK_2_NAME, "artistName": ARTIST_2_NAME, "trackUri": TRACK_2_URI}, "addedDate": "2021-01-01"},
                    {"track": {"trackName": TRACK_3_NAME, "artistName": ARTIST_2_NAME, "trackUri": TRACK_3_URI}, "addedDate": "2021-01-02"}
                ]},
                {"name": "Evening", "lastModifiedDate": "2021-01-06", "items": [
                    {"track": {"trackName": TRACK_2_NAME, "artistName": ARTIST_2_NAME, "trackUri": TRACK_2_URI}, "addedDate": "2021-01-03"},
                    {"track": {"trackName": TRACK_1_NAME, "artistName": ARTIST_1_NAME, "trackUri": TRACK_1_URI}, "addedDate": "2021-01-03"}
                ]}
            ]}),
        ),
        ("MyData/Inferences.json", json!({"inferences": ["a", "b"]})),
        (
            "MyData/Userdata.json",
            json!({"username": "listener", "country": "IT", "address": {"city": "Milano"}}),
        ),
    ]
}

pub fn query_strings(conn: &Connection, sql: &str) -> Vec<String> {
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.query_map([], |r| r.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<String>>>()
        .unwrap()
}

pub fn query_pairs(conn: &Connection, sql: &str) -> Vec<(i64, i64)> {
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<Vec<(i64, i64)>>>()
        .unwrap()
}
