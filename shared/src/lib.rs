use serde_json::{Map, Value};
use uuid::Uuid;

/// A stored record: field name to dynamically typed value, in insertion order.
pub type Record = Map<String, Value>;

/// Identifier field used when a handler is not configured otherwise.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Generate a fresh record identifier: 128 random bits as 32 lowercase hex chars.
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Coerce an identifier value to its canonical string form.
///
/// Returns `None` for values that count as "no identifier": null, the empty
/// string and empty arrays/objects. Nested non-empty values are rendered as
/// compact JSON text.
pub fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(fields) if fields.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Read the identifier of `record` in string form, if it has a usable one.
pub fn record_id(record: &Record, id_field: &str) -> Option<String> {
    record.get(id_field).and_then(id_to_string)
}

/// Return `record` with a non-empty string identifier in `id_field`.
///
/// An existing identifier is kept (stringified); otherwise a new one is
/// generated. The field keeps its position when it was already present.
pub fn ensure_id(mut record: Record, id_field: &str) -> Record {
    let id = record_id(&record, id_field).unwrap_or_else(new_record_id);
    record.insert(id_field.to_string(), Value::String(id));
    record
}

/// Shallow-merge `updates` over `existing`, pinning the identifier to `id`.
pub fn merge_update(mut existing: Record, updates: &Record, id_field: &str, id: &str) -> Record {
    for (key, value) in updates {
        existing.insert(key.clone(), value.clone());
    }
    existing.insert(id_field.to_string(), Value::String(id.to_string()));
    existing
}
