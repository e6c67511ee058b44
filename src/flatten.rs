//! Flattening of nested JSON objects into flat rows.

use crate::naming::column_name;
use serde_json::map::Iter;
use serde_json::{Map, Value};

/// A flat row: column name to scalar, null, or list (lists are stored as JSON text).
pub type Row = Map<String, Value>;

const KEY_SEPARATOR: &str = "_";

/// Lazy depth-first iterator over the leaves of a JSON object.
///
/// Nested objects are descended into and their keys joined with `_`;
/// every other value (lists included) is yielded as-is.
pub struct Flatten<'a> {
    stack: Vec<(String, Iter<'a>)>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = (String, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, entries) = self.stack.last_mut()?;
            match entries.next() {
                None => {
                    self.stack.pop();
                }
                Some((key, Value::Object(nested))) => {
                    let path = join_key(prefix, key);
                    self.stack.push((path, nested.iter()));
                }
                Some((key, value)) => return Some((join_key(prefix, key), value)),
            }
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, KEY_SEPARATOR, key)
    }
}

/// Flattens `object` into `(compound_key, value)` pairs, depth-first in key order.
pub fn flatten(object: &Map<String, Value>) -> Flatten<'_> {
    Flatten {
        stack: vec![(String::new(), object.iter())],
    }
}

/// Flattens `object` into a [`Row`] with normalized column names.
///
/// When two paths collide on the same column the later one wins.
pub fn flatten_row(object: &Map<String, Value>) -> Row {
    let mut row = Row::new();
    for (key, value) in flatten(object) {
        row.insert(column_name(&key), value.clone());
    }
    row
}
