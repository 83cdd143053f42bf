//! Row Mapping
//!
//! Converts SQLite result rows into `column -> JSON value` maps.

use rusqlite::types::ValueRef;
use serde_json::{Map, Number, Value};

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

/// Positional statement parameters.
pub type SqlParams = Vec<rusqlite::types::Value>;

/// Reads every column of `row` into a [`Row`].
pub(crate) fn map_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut mapped = Map::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        mapped.insert(name.clone(), to_json(row.get_ref(idx)?));
    }
    Ok(mapped)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        // NaN and infinities have no JSON form
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
