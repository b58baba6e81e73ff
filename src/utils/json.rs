//! JSON <-> BSON conversion for records and predicates.
//!
//! Datetimes travel as RFC 3339 strings on the JSON side; `{"$date": "..."}` is accepted on input.

use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::io;

#[must_use]
pub fn json_to_bson(val: &Value) -> Bson {
    match val {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(obj) => {
            if obj.len() == 1
                && let Some(Value::String(s)) = obj.get("$date")
                && let Ok(dt) = DateTime::parse_from_rfc3339(s)
            {
                return Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis()));
            }
            Bson::Document(map_to_document(obj))
        }
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
    Bson::Double(n.as_f64().unwrap_or(f64::NAN))
}

fn map_to_document(obj: &Map<String, Value>) -> BsonDocument {
    let mut d = BsonDocument::new();
    for (k, v) in obj {
        d.insert(k.clone(), json_to_bson(v));
    }
    d
}

#[must_use]
pub fn bson_to_json(val: &Bson) -> Value {
    match val {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(d) => document_to_json(d),
        Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
            .map_or(Value::Null, |c| Value::String(c.to_rfc3339_opts(SecondsFormat::Millis, true))),
        other => Value::String(other.to_string()),
    }
}

#[must_use]
pub fn document_to_json(doc: &BsonDocument) -> Value {
    Value::Object(doc.iter().map(|(k, v)| (k.clone(), bson_to_json(v))).collect())
}

/// Convert a `serde_json::Value` that must be an object into a `bson::Document`.
/// Returns `io::Error` with `InvalidData` on malformed input.
pub fn json_value_to_bson_document(val: &Value) -> io::Result<BsonDocument> {
    let obj = val
        .as_object()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "expected JSON object"))?;
    Ok(map_to_document(obj))
}

/// Parse a JSON string into a `bson::Document`. The JSON must be a top-level object.
pub fn parse_json_to_bson_document(json: &str) -> io::Result<BsonDocument> {
    let val: Value =
        serde_json::from_str(json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    json_value_to_bson_document(&val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_to_bson_success() {
        let d = parse_json_to_bson_document("{\"a\":1,\"b\":\"x\",\"c\":2.5}").unwrap();
        assert_eq!(d.get("a"), Some(&Bson::Int32(1)));
        assert_eq!(d.get("b"), Some(&Bson::String("x".into())));
        assert_eq!(d.get("c"), Some(&Bson::Double(2.5)));
    }

    #[test]
    fn json_to_bson_rejects_array() {
        let e = parse_json_to_bson_document("[1,2,3]").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn dates_round_trip_as_rfc3339() {
        let v = serde_json::json!({"$date": "2024-01-02T03:04:05.000Z"});
        let b = json_to_bson(&v);
        assert!(matches!(b, Bson::DateTime(_)));
        assert_eq!(bson_to_json(&b), Value::String("2024-01-02T03:04:05.000Z".into()));
    }
}
