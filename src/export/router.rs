//! Per-table shaping of parsed export entries into insertable rows.

use crate::flatten::{flatten_row, Row};
use crate::naming::column_name;
use crate::sqlite_persistence::KeyPolicy;
use serde_json::{Map, Value};
use thiserror::Error;

pub const PLAYLIST_TABLE: &str = "playlist";
pub const PLAYLIST_TRACKS_TABLE: &str = "playlist_tracks";
pub const PLAYLIST_ID_COLUMN: &str = "playlist_id";
pub const POSITION_COLUMN: &str = "position";
pub const PLAYLIST_TRACK_URI_COLUMN: &str = "track_track_uri";
pub const INFERENCE_COLUMN: &str = "inference";
pub const URI_COLUMN: &str = "uri";

const PLAYLIST_NAME_COLUMN: &str = "name";
const PLAYLISTS_FIELD: &str = "playlists";
const ITEMS_FIELD: &str = "items";
const INFERENCES_FIELD: &str = "inferences";
const INFERENCES_TABLE: &str = "inferences";
const LIBRARY_TABLE: &str = "your_library";
const STREAMING_HISTORY_TABLE: &str = "streaming_history";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("expected a list of objects or an object, found {0}")]
    UnsupportedShape(&'static str),

    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

/// How a table's entries are turned into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Generic,
    Playlist,
    Inferences,
    LibraryFanout,
    ContentHashKeyed,
}

impl TableKind {
    pub fn route(table: &str) -> TableKind {
        match table {
            PLAYLIST_TABLE => TableKind::Playlist,
            INFERENCES_TABLE => TableKind::Inferences,
            LIBRARY_TABLE => TableKind::LibraryFanout,
            t if t == STREAMING_HISTORY_TABLE
                || t.starts_with(&format!("{}_", STREAMING_HISTORY_TABLE)) =>
            {
                TableKind::ContentHashKeyed
            }
            _ => TableKind::Generic,
        }
    }

    /// Shapes the parsed content of an entry that normalized to `table`.
    pub fn shape(self, table: &str, value: Value) -> Result<Shaped, ShapeError> {
        match self {
            TableKind::Generic => {
                let (rows, invalid_rows) = generic_rows(value)?;
                Ok(Shaped::single(TableBatch {
                    table: table.to_string(),
                    rows,
                    key_policy: KeyPolicy::None,
                    invalid_rows,
                }))
            }
            TableKind::ContentHashKeyed => {
                let (rows, invalid_rows) = generic_rows(value)?;
                Ok(Shaped::single(TableBatch {
                    table: table.to_string(),
                    rows,
                    key_policy: KeyPolicy::content_hash(),
                    invalid_rows,
                }))
            }
            TableKind::Inferences => shape_inferences(table, value),
            TableKind::LibraryFanout => shape_library(table, value),
            TableKind::Playlist => shape_playlists(value),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Rows ready to be inserted into one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBatch {
    pub table: String,
    pub rows: Vec<Row>,
    pub key_policy: KeyPolicy,
    /// List members that were not usable as rows.
    pub invalid_rows: usize,
}

/// A playlist row together with the track rows that belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistShape {
    pub playlist: Row,
    pub items: Vec<Row>,
}

impl PlaylistShape {
    /// The playlist row itself, keyed by `playlist_id`.
    pub fn playlist_row(&self, playlist_id: i64) -> Row {
        let mut row = Row::new();
        row.insert(PLAYLIST_ID_COLUMN.to_string(), Value::from(playlist_id));
        for (column, value) in &self.playlist {
            if column != PLAYLIST_ID_COLUMN {
                row.insert(column.clone(), value.clone());
            }
        }
        row
    }

    /// Track rows of this playlist once it has been assigned `playlist_id`.
    pub fn track_rows(&self, playlist_id: i64) -> Vec<Row> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let mut row = Row::new();
                row.insert(PLAYLIST_ID_COLUMN.to_string(), Value::from(playlist_id));
                row.insert(POSITION_COLUMN.to_string(), Value::from(index as i64 + 1));
                for (column, value) in item {
                    if column != PLAYLIST_ID_COLUMN && column != POSITION_COLUMN {
                        row.insert(column.clone(), value.clone());
                    }
                }
                row
            })
            .collect()
    }

    pub fn playlist_key_policy() -> KeyPolicy {
        KeyPolicy::natural_key(&[PLAYLIST_ID_COLUMN])
    }

    pub fn track_key_policy() -> KeyPolicy {
        KeyPolicy::natural_key(&[PLAYLIST_ID_COLUMN, POSITION_COLUMN, PLAYLIST_TRACK_URI_COLUMN])
    }
}

/// Everything one entry contributes to the database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shaped {
    pub batches: Vec<TableBatch>,
    pub playlists: Vec<PlaylistShape>,
    pub invalid_playlists: usize,
    /// Fan-out members that could not be turned into rows.
    pub unpopulated: Vec<(String, ShapeError)>,
}

impl Shaped {
    fn single(batch: TableBatch) -> Self {
        Shaped {
            batches: vec![batch],
            ..Default::default()
        }
    }
}

/// A list of objects or a single object becomes rows; anything else is rejected.
fn generic_rows(value: Value) -> Result<(Vec<Row>, usize), ShapeError> {
    match value {
        Value::Array(items) => {
            let mut rows = Vec::with_capacity(items.len());
            let mut invalid = 0;
            for item in items {
                match item {
                    Value::Object(object) if !object.is_empty() => rows.push(flatten_row(&object)),
                    _ => invalid += 1,
                }
            }
            Ok((rows, invalid))
        }
        Value::Object(object) if object.is_empty() => Ok((vec![], 0)),
        Value::Object(object) => Ok((vec![flatten_row(&object)], 0)),
        other => Err(ShapeError::UnsupportedShape(describe(&other))),
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, ShapeError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(ShapeError::UnsupportedShape(describe(&other))),
    }
}

fn shape_inferences(table: &str, value: Value) -> Result<Shaped, ShapeError> {
    let mut object = into_object(value)?;
    let inferences = match object.shift_remove(INFERENCES_FIELD) {
        Some(Value::Array(values)) => values,
        Some(other) => return Err(ShapeError::UnsupportedShape(describe(&other))),
        None => return Err(ShapeError::MissingField(INFERENCES_FIELD)),
    };
    let rows = inferences
        .into_iter()
        .map(|inference| {
            let mut wrapped = Map::new();
            wrapped.insert(INFERENCE_COLUMN.to_string(), inference);
            flatten_row(&wrapped)
        })
        .collect();
    Ok(Shaped::single(TableBatch {
        table: table.to_string(),
        rows,
        key_policy: KeyPolicy::None,
        invalid_rows: 0,
    }))
}

fn shape_library(table: &str, value: Value) -> Result<Shaped, ShapeError> {
    let object = into_object(value)?;
    let mut shaped = Shaped::default();
    for (category, content) in object {
        let category_table = format!("{}_{}", table, column_name(&category));
        match generic_rows(content) {
            Ok((rows, invalid_rows)) => shaped.batches.push(TableBatch {
                table: category_table,
                rows,
                key_policy: KeyPolicy::natural_key(&[URI_COLUMN]),
                invalid_rows,
            }),
            Err(e) => shaped.unpopulated.push((category_table, e)),
        }
    }
    Ok(shaped)
}

fn shape_playlists(value: Value) -> Result<Shaped, ShapeError> {
    let mut object = into_object(value)?;
    let playlists = match object.shift_remove(PLAYLISTS_FIELD) {
        Some(Value::Array(playlists)) => playlists,
        Some(other) => return Err(ShapeError::UnsupportedShape(describe(&other))),
        None => return Err(ShapeError::MissingField(PLAYLISTS_FIELD)),
    };

    let mut shaped = Shaped::default();
    for playlist in playlists {
        let Value::Object(mut playlist) = playlist else {
            shaped.invalid_playlists += 1;
            continue;
        };
        let items = match playlist.shift_remove(ITEMS_FIELD) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(wrapper) => flatten_row(&wrapper),
                    // Keep the position taken by an unexpected scalar.
                    other => {
                        let mut row = Row::new();
                        row.insert("item".to_string(), other);
                        row
                    }
                })
                .collect(),
            _ => vec![],
        };
        let mut row = flatten_row(&playlist);
        if row.is_empty() {
            row.insert(PLAYLIST_NAME_COLUMN.to_string(), Value::Null);
        }
        shaped.playlists.push(PlaylistShape {
            playlist: row,
            items,
        });
    }
    Ok(shaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route() {
        assert_eq!(TableKind::route("playlist"), TableKind::Playlist);
        assert_eq!(TableKind::route("inferences"), TableKind::Inferences);
        assert_eq!(TableKind::route("your_library"), TableKind::LibraryFanout);
        assert_eq!(TableKind::route("streaming_history"), TableKind::ContentHashKeyed);
        assert_eq!(
            TableKind::route("streaming_history_music"),
            TableKind::ContentHashKeyed
        );
        assert_eq!(TableKind::route("streaming_historyx"), TableKind::Generic);
        assert_eq!(TableKind::route("userdata"), TableKind::Generic);
    }

    #[test]
    fn test_generic_list_and_object() {
        let shaped = TableKind::Generic
            .shape(
                "search_queries",
                json!([{"searchQuery": "a"}, 3, {}, {"searchQuery": "b", "platform": "web"}]),
            )
            .unwrap();
        let batch = &shaped.batches[0];
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.invalid_rows, 2);
        assert_eq!(batch.rows[1]["search_query"], json!("b"));
        assert_eq!(batch.key_policy, KeyPolicy::None);

        let shaped = TableKind::Generic
            .shape("userdata", json!({"username": "me", "address": {"city": "X"}}))
            .unwrap();
        assert_eq!(shaped.batches[0].rows[0]["address_city"], json!("X"));
    }

    #[test]
    fn test_generic_rejects_scalars() {
        assert_eq!(
            TableKind::Generic.shape("t", json!("text")),
            Err(ShapeError::UnsupportedShape("a string"))
        );
        assert_eq!(
            TableKind::Generic.shape("t", Value::Null),
            Err(ShapeError::UnsupportedShape("null"))
        );
    }

    #[test]
    fn test_streaming_history_is_content_hash_keyed() {
        let shaped = TableKind::ContentHashKeyed
            .shape(
                "streaming_history",
                json!([{"endTime": "2021-01-01 10:00", "artistName": "A", "trackName": "T", "msPlayed": 1}]),
            )
            .unwrap();
        let batch = &shaped.batches[0];
        assert_eq!(batch.key_policy, KeyPolicy::content_hash());
        let columns: Vec<&String> = batch.rows[0].keys().collect();
        assert_eq!(columns, vec!["end_time", "artist_name", "track_name", "ms_played"]);
    }

    #[test]
    fn test_inferences_wrapped() {
        let shaped = TableKind::Inferences
            .shape("inferences", json!({"inferences": ["a", "b"]}))
            .unwrap();
        let rows = &shaped.batches[0].rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["inference"], json!("a"));
        assert_eq!(rows[1]["inference"], json!("b"));

        assert_eq!(
            TableKind::Inferences.shape("inferences", json!({})),
            Err(ShapeError::MissingField("inferences"))
        );
    }

    #[test]
    fn test_library_fans_out() {
        let shaped = TableKind::LibraryFanout
            .shape(
                "your_library",
                json!({
                    "tracks": [{"artist": "A", "track": "T", "uri": "spotify:track:1"}],
                    "albums": [{"artist": "A", "album": "L", "uri": "spotify:album:1"}],
                    "bannedTracks": [],
                    "other": "not rows"
                }),
            )
            .unwrap();
        let tables: Vec<&str> = shaped.batches.iter().map(|b| b.table.as_str()).collect();
        assert_eq!(
            tables,
            vec!["your_library_tracks", "your_library_albums", "your_library_banned_tracks"]
        );
        assert!(shaped
            .batches
            .iter()
            .all(|b| b.key_policy == KeyPolicy::natural_key(&["uri"])));
        assert_eq!(
            shaped.unpopulated,
            vec![(
                "your_library_other".to_string(),
                ShapeError::UnsupportedShape("a string")
            )]
        );
        assert_eq!(shaped.clone(), shaped);
    }

    #[test]
    fn test_playlists_shaped() {
        let shaped = TableKind::Playlist
            .shape(
                "playlist",
                json!({"playlists": [
                    {"name": "One", "lastModifiedDate": "2021-01-01", "items": [
                        {"track": {"trackName": "a", "trackUri": "spotify:track:a"}},
                        {"track": {"trackName": "b", "trackUri": "spotify:track:b"}}
                    ]},
                    {"name": "Empty"},
                    "garbage",
                    {"items": []}
                ]}),
            )
            .unwrap();
        assert_eq!(shaped.playlists.len(), 3);
        assert_eq!(shaped.invalid_playlists, 1);
        assert_eq!(shaped.playlists[2].playlist["name"], Value::Null);

        let first = &shaped.playlists[0];
        assert!(!first.playlist.contains_key("items"));
        assert_eq!(first.playlist["last_modified_date"], json!("2021-01-01"));

        let row = first.playlist_row(7);
        let columns: Vec<&String> = row.keys().collect();
        assert_eq!(columns, vec!["playlist_id", "name", "last_modified_date"]);
        assert_eq!(row["playlist_id"], json!(7));

        let rows = first.track_rows(7);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["playlist_id"], json!(7));
        assert_eq!(rows[1]["position"], json!(2));
        assert_eq!(rows[1]["track_track_uri"], json!("spotify:track:b"));

        assert!(shaped.playlists[1].track_rows(8).is_empty());
    }

    #[test]
    fn test_playlist_columns_keep_document_order() {
        let shaped = TableKind::Playlist
            .shape(
                "playlist",
                json!({"playlists": [{
                    "name": "Road trip",
                    "lastModifiedDate": "2021-01-01",
                    "items": [],
                    "description": "long drives",
                    "numberOfFollowers": 3
                }]}),
            )
            .unwrap();
        let columns: Vec<&String> = shaped.playlists[0].playlist.keys().collect();
        assert_eq!(
            columns,
            vec!["name", "last_modified_date", "description", "number_of_followers"]
        );
    }

    #[test]
    fn test_library_categories_keep_numbering() {
        let shaped = TableKind::LibraryFanout
            .shape(
                "your_library",
                json!({
                    "shows": [{"name": "S", "uri": "spotify:show:1"}],
                    "shows2": [{"name": "T", "uri": "spotify:show:2"}]
                }),
            )
            .unwrap();
        let tables: Vec<&str> = shaped.batches.iter().map(|b| b.table.as_str()).collect();
        assert_eq!(tables, vec!["your_library_shows", "your_library_shows2"]);
    }
}
