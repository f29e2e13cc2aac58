use anyhow::Result;
use log::{debug, info};
use shared::{ensure_id, merge_update, record_id, Record, DEFAULT_ID_FIELD};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OperationContext, StorageResult};
use crate::storage::files::{copy_file, ensure_parent_dir, rewrite_atomically};
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::traits::DatabaseHandler;

const KIND: BackendKind = BackendKind::Json;

/// JSON-file storage for development and small data sets
#[derive(Debug, Clone)]
pub struct JsonDatabaseHandler {
    file_path: PathBuf,
    id_field: String,
}

impl JsonDatabaseHandler {
    /// Open (or initialize with `[]`) the JSON store at `file_path`
    pub fn new<P: AsRef<Path>>(file_path: P) -> StorageResult<Self> {
        Self::with_id_field(file_path, DEFAULT_ID_FIELD)
    }

    /// Open the store using a custom identifier field
    pub fn with_id_field<P: AsRef<Path>>(file_path: P, id_field: impl Into<String>) -> StorageResult<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        ensure_parent_dir(&file_path).during(KIND, Operation::Open)?;

        if !file_path.exists() {
            fs::write(&file_path, "[]").during(KIND, Operation::Open)?;
            info!("Initialized empty JSON store at {}", file_path.display());
        }

        Ok(Self {
            file_path,
            id_field: id_field.into(),
        })
    }

    /// Location of the backing file
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn read_all(&self) -> Result<Vec<Record>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.file_path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, rows: &[Record]) -> Result<()> {
        rewrite_atomically(&self.file_path, |writer| {
            serde_json::to_writer_pretty(writer, rows)?;
            Ok(())
        })
    }

    fn position_of(&self, rows: &[Record], id: &str) -> Option<usize> {
        rows.iter()
            .position(|row| record_id(row, &self.id_field).as_deref() == Some(id))
    }
}

impl DatabaseHandler for JsonDatabaseHandler {
    fn kind(&self) -> BackendKind {
        KIND
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn create(&self, record: Record) -> StorageResult<String> {
        let record = ensure_id(record, &self.id_field);
        let id = record_id(&record, &self.id_field).unwrap_or_default();

        let mut rows = self.read_all().during(KIND, Operation::Create)?;
        match self.position_of(&rows, &id) {
            Some(index) => rows[index] = record,
            None => rows.push(record),
        }
        self.write_all(&rows).during(KIND, Operation::Create)?;

        debug!("Stored record {} in {}", id, self.file_path.display());
        Ok(id)
    }

    fn read(&self, id: &str) -> StorageResult<Option<Record>> {
        let mut rows = self.read_all().during(KIND, Operation::Read)?;
        Ok(self.position_of(&rows, id).map(|index| rows.swap_remove(index)))
    }

    fn update(&self, id: &str, updates: &Record) -> StorageResult<Option<Record>> {
        let mut rows = self.read_all().during(KIND, Operation::Update)?;
        let Some(index) = self.position_of(&rows, id) else {
            debug!("Record {} not found for update", id);
            return Ok(None);
        };

        let merged = merge_update(rows[index].clone(), updates, &self.id_field, id);
        rows[index] = merged.clone();
        self.write_all(&rows).during(KIND, Operation::Update)?;

        Ok(Some(merged))
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        let mut rows = self.read_all().during(KIND, Operation::Delete)?;
        let initial_len = rows.len();
        rows.retain(|row| record_id(row, &self.id_field).as_deref() != Some(id));

        if rows.len() == initial_len {
            return Ok(false);
        }
        self.write_all(&rows).during(KIND, Operation::Delete)?;
        debug!("Deleted record {} from {}", id, self.file_path.display());
        Ok(true)
    }

    fn backup(&self, target: &Path) -> StorageResult<PathBuf> {
        let out = copy_file(&self.file_path, target).during(KIND, Operation::Backup)?;
        info!("Backed up {} to {}", self.file_path.display(), out.display());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::{assert_contract, record, TestEnvironment};
    use serde_json::json;

    #[test]
    fn test_new_initializes_empty_array() {
        let env = TestEnvironment::new();
        let path = env.path("nested/records.json");

        JsonDatabaseHandler::new(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_contract() {
        let env = TestEnvironment::new();
        let handler = JsonDatabaseHandler::new(env.path("records.json")).unwrap();
        assert_contract(&handler);
    }

    #[test]
    fn test_nested_values_round_trip() {
        let env = TestEnvironment::new();
        let handler = JsonDatabaseHandler::new(env.path("records.json")).unwrap();
        let input = record(json!({"tags": ["a", "b"], "meta": {"n": 1.5, "ok": true}, "none": null}));

        let id = handler.create(input.clone()).unwrap();

        assert_eq!(handler.read(&id).unwrap(), Some(ensure_id(input, "id")));
    }

    #[test]
    fn test_create_with_existing_id_replaces_in_place() {
        let env = TestEnvironment::new();
        let handler = JsonDatabaseHandler::new(env.path("records.json")).unwrap();
        handler.create(record(json!({"id": "a", "v": 1}))).unwrap();
        handler.create(record(json!({"id": "b", "v": 2}))).unwrap();

        handler.create(record(json!({"id": "a", "w": 3}))).unwrap();

        let rows: Vec<Record> = serde_json::from_str(&fs::read_to_string(handler.file_path()).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], record(json!({"id": "a", "w": 3})));
    }

    #[test]
    fn test_file_is_pretty_printed() {
        let env = TestEnvironment::new();
        let handler = JsonDatabaseHandler::new(env.path("records.json")).unwrap();
        handler.create(record(json!({"id": "a"}))).unwrap();

        let text = fs::read_to_string(handler.file_path()).unwrap();
        assert_eq!(text, "[\n  {\n    \"id\": \"a\"\n  }\n]");
    }

    #[test]
    fn test_numeric_ids_match_stringified_lookup() {
        let env = TestEnvironment::new();
        let path = env.path("records.json");
        fs::write(&path, r#"[{"id": 7, "name": "legacy"}]"#).unwrap();
        let handler = JsonDatabaseHandler::new(&path).unwrap();

        let found = handler.read("7").unwrap().unwrap();
        assert_eq!(found["name"], "legacy");
        assert!(handler.delete("7").unwrap());
    }

    #[test]
    fn test_backup_copies_file() {
        let env = TestEnvironment::new();
        let handler = JsonDatabaseHandler::new(env.path("records.json")).unwrap();
        for i in 0..3 {
            handler.create(record(json!({"n": i}))).unwrap();
        }

        let out = handler.backup(&env.path("backups/snap.json")).unwrap();

        let snapshot: Vec<Record> = serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_corrupt_file_reports_backend_and_operation() {
        let env = TestEnvironment::new();
        let path = env.path("records.json");
        fs::write(&path, "{not json").unwrap();
        let handler = JsonDatabaseHandler::new(&path).unwrap();

        let message = handler.read("x").unwrap_err().to_string();
        assert!(message.starts_with("json read failed"), "{}", message);
    }

    #[test]
    fn test_concurrent_creates_keep_file_parseable() {
        let env = TestEnvironment::new();
        let handler = JsonDatabaseHandler::new(env.path("records.json")).unwrap();
        let filler = "x".repeat(20_000);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let handler = &handler;
                let filler = &filler;
                scope.spawn(move || {
                    for n in 0..50 {
                        handler
                            .create(record(json!({"worker": worker, "n": n, "filler": filler})))
                            .unwrap();
                    }
                });
            }
        });

        // Lost updates are allowed; a torn file is not
        let rows: Vec<Record> = serde_json::from_str(&fs::read_to_string(handler.file_path()).unwrap()).unwrap();
        assert!(!rows.is_empty() && rows.len() <= 200);
        assert!(handler.create(record(json!({"after": true}))).is_ok());
    }
}
