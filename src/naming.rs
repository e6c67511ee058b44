//! Canonical snake_case naming for tables and columns.
//!
//! Table names are derived from archive entry file names
//! (`StreamingHistory0.json` -> `streaming_history`), so numbered and
//! rotated export files collapse onto one logical table. Column names only
//! get the camelCase -> snake_case treatment.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CAPITALIZED_WORD: Regex = Regex::new("(.)([A-Z][a-z]+)").unwrap();
    static ref DOUBLE_UNDERSCORE_UPPER: Regex = Regex::new("__([A-Z])").unwrap();
    static ref LOWER_THEN_UPPER: Regex = Regex::new("([a-z0-9])([A-Z])").unwrap();
    static ref NON_IDENTIFIER: Regex = Regex::new("[^A-Za-z0-9_]+").unwrap();
    static ref UNDERSCORE_RUN: Regex = Regex::new("_{2,}").unwrap();
    static ref TRAILING_NUMBERING: Regex = Regex::new("[0-9_]+$").unwrap();
}

const JSON_SUFFIX: &str = ".json";
const FALLBACK_TABLE_NAME: &str = "table";
const FALLBACK_COLUMN_NAME: &str = "column";

fn split_words(name: &str) -> String {
    let name = CAPITALIZED_WORD.replace_all(name, "${1}_${2}");
    let name = DOUBLE_UNDERSCORE_UPPER.replace_all(&name, "_${1}");
    LOWER_THEN_UPPER.replace_all(&name, "${1}_${2}").into_owned()
}

fn identifier_chars(name: &str) -> String {
    let name = NON_IDENTIFIER.replace_all(name, "_");
    UNDERSCORE_RUN.replace_all(&name, "_").into_owned()
}

/// `name` without a `.json` extension in any letter case.
fn strip_json_suffix(name: &str) -> &str {
    match name.len().checked_sub(JSON_SUFFIX.len()) {
        Some(split)
            if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(JSON_SUFFIX) =>
        {
            &name[..split]
        }
        _ => name,
    }
}

/// Normalizes a file name or object key into a table name.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(name: &str) -> String {
    let words = split_words(strip_json_suffix(name));
    let cleaned = identifier_chars(&words);
    let table_name = TRAILING_NUMBERING.replace(&cleaned, "").to_lowercase();
    if table_name.is_empty() {
        FALLBACK_TABLE_NAME.to_string()
    } else {
        table_name
    }
}

/// Normalizes a (possibly flattened) object key into a column name.
pub fn column_name(key: &str) -> String {
    let column = identifier_chars(&split_words(key)).to_lowercase();
    if column.is_empty() {
        FALLBACK_COLUMN_NAME.to_string()
    } else {
        column
    }
}

/// Quotes an identifier for use in SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
