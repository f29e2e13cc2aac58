/// Test utilities shared by the handler test modules
///
/// `TestEnvironment` owns a temporary directory that is removed on drop, even
/// when a test panics. `assert_contract` runs the behavior every handler must
/// show, using only flat text values so the CSV store qualifies.

use serde_json::{json, Value};
use shared::Record;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::storage::traits::DatabaseHandler;

/// RAII test environment backed by a temp directory
pub struct TestEnvironment {
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::with_prefix("recordstore-test").expect("create temp dir");
        let base_path = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            base_path,
        }
    }

    /// Path of `relative` inside the environment
    pub fn path(&self, relative: &str) -> PathBuf {
        self.base_path.join(relative)
    }
}

/// Build a record from a JSON object literal
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Exercise create/read/update/delete semantics shared by all backends
pub fn assert_contract(handler: &dyn DatabaseHandler) {
    let id_field = handler.id_field().to_string();

    // demo scenario
    let id = handler
        .create(record(json!({"name": "demo", "status": "created"})))
        .unwrap();
    assert!(!id.is_empty());

    let mut expected = record(json!({"name": "demo", "status": "created"}));
    expected.insert(id_field.clone(), Value::String(id.clone()));
    assert_eq!(handler.read(&id).unwrap(), Some(expected.clone()));

    let updated = handler
        .update(&id, &record(json!({"status": "updated"})))
        .unwrap()
        .unwrap();
    expected.insert("status".to_string(), json!("updated"));
    assert_eq!(updated, expected);
    assert_eq!(handler.read(&id).unwrap(), Some(expected));

    assert!(handler.delete(&id).unwrap());
    assert!(!handler.delete(&id).unwrap());
    assert_eq!(handler.read(&id).unwrap(), None);

    // merge keeps unspecified fields and pins the identifier
    let mut seeded = record(json!({"a": "0", "b": "2"}));
    seeded.insert(id_field.clone(), json!("merge-me"));
    assert_eq!(handler.create(seeded).unwrap(), "merge-me");
    let mut patch = record(json!({"a": "1"}));
    patch.insert(id_field.clone(), json!("renamed"));
    let merged = handler.update("merge-me", &patch).unwrap().unwrap();
    let mut expected = record(json!({"a": "1", "b": "2"}));
    expected.insert(id_field.clone(), json!("merge-me"));
    assert_eq!(merged, expected);
    assert_eq!(handler.read("renamed").unwrap(), None);

    // re-create with the same identifier replaces the whole record
    let mut replacement = record(json!({"c": "3"}));
    replacement.insert(id_field.clone(), json!("merge-me"));
    handler.create(replacement.clone()).unwrap();
    assert_eq!(handler.read("merge-me").unwrap(), Some(replacement));

    // missing identifiers are absent, never errors
    assert_eq!(handler.read("never-created").unwrap(), None);
    assert_eq!(handler.update("never-created", &record(json!({"x": "1"}))).unwrap(), None);
    assert!(!handler.delete("never-created").unwrap());
    assert_eq!(handler.read("never-created").unwrap(), None);

    handler.close().unwrap();
}
