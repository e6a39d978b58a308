use anyhow::{anyhow, Result};
use rusqlite::{types, Row};
use serde_json::{Map, Number, Value as JsonValue};

use std::collections::HashMap;

/// A single row read from a table, keyed by column name
pub type RecordOwned = HashMap<String, types::Value>;

/// Rows read from a table
pub type RecordListOwned = Vec<RecordOwned>;

///
/// Read every column of a result row into a record
pub fn row_to_map(row: &Row) -> rusqlite::Result<RecordOwned> {
    let names = row.as_ref().column_names();
    let mut record = RecordOwned::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        record.insert(name.to_string(), row.get(idx)?);
    }
    Ok(record)
}

///
/// Convert a single rusqlite value to its JSON equivalent
pub fn value_to_json(value: &types::Value) -> Result<JsonValue> {
    let json_value = match value {
        types::Value::Null => JsonValue::Null,
        types::Value::Integer(int) => JsonValue::Number(Number::from(*int)),
        types::Value::Real(real) => Number::from_f64(*real)
            .map(JsonValue::Number)
            .ok_or_else(|| anyhow!("{} has no JSON representation", real))?,
        types::Value::Text(text) => JsonValue::String(text.to_string()),
        types::Value::Blob(blob) => JsonValue::Array(
            blob.iter()
                .map(|b| JsonValue::Number(Number::from(*b)))
                .collect(),
        ),
    };
    Ok(json_value)
}

/// A record as a JSON object, blobs become arrays of bytes
pub fn val_to_json(record: &RecordOwned) -> Result<JsonValue> {
    record
        .iter()
        .map(|(col, value)| Ok((col.clone(), value_to_json(value)?)))
        .collect::<Result<Map<String, JsonValue>>>()
        .map(JsonValue::Object)
}

///
/// Convert a list of records to a JSON array
pub fn list_to_json(list: &[RecordOwned]) -> Result<JsonValue> {
    list.iter()
        .map(val_to_json)
        .collect::<Result<Vec<_>>>()
        .map(JsonValue::Array)
}

///
/// Render bound values for log lines and error reports
pub fn values_to_json(values: &[types::Value]) -> JsonValue {
    JsonValue::Array(
        values
            .iter()
            .map(|v| value_to_json(v).unwrap_or(JsonValue::Null))
            .collect(),
    )
}

pub mod val {
    use rusqlite::types;

    pub fn v_txt(text: &str) -> types::Value {
        types::Value::Text(text.to_string())
    }

    pub fn v_int(num: i64) -> types::Value {
        types::Value::Integer(num)
    }
}
