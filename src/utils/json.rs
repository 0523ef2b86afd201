use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use serde_json::{Map, Number, Value};

/// Convert a JSON value into BSON. Integers that fit in 32 bits become `Int32`.
#[must_use]
pub fn json_to_bson(val: &Value) -> Bson {
    match val {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(map_to_bson(map)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        return i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32);
    }
    if let Some(u) = n.as_u64() {
        return Bson::Double(u as f64);
    }
    n.as_f64().map_or(Bson::Null, Bson::Double)
}

fn map_to_bson(map: &Map<String, Value>) -> BsonDocument {
    map.iter().map(|(k, v)| (k.clone(), json_to_bson(v))).collect()
}

/// Convert BSON back to plain JSON. Non-JSON BSON types fall back to their display form.
#[must_use]
pub fn bson_to_json(val: &Bson) -> Value {
    match val {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(d) => bson_document_to_json(d),
        other => Value::String(other.to_string()),
    }
}

#[must_use]
pub fn bson_document_to_json(doc: &BsonDocument) -> Value {
    Value::Object(doc.iter().map(|(k, v)| (k.clone(), bson_to_json(v))).collect())
}

/// Convert a client-supplied record into a `bson::Document`.
///
/// # Errors
/// Returns `DbError::InvalidDocument` unless the value is a JSON object whose field names are
/// non-empty and do not start with `$`.
pub fn json_value_to_record(val: &Value) -> Result<BsonDocument, DbError> {
    let obj = val
        .as_object()
        .ok_or_else(|| DbError::InvalidDocument(format!("expected JSON object, got {}", kind_of(val))))?;
    for key in obj.keys() {
        if key.is_empty() {
            return Err(DbError::InvalidDocument("field names must not be empty".into()));
        }
        if key.starts_with('$') {
            return Err(DbError::InvalidDocument(format!("field name '{key}' must not start with '$'")));
        }
    }
    Ok(map_to_bson(obj))
}

const fn kind_of(val: &Value) -> &'static str {
    match val {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
