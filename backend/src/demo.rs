//! Create/read/update/delete walkthrough used to check backend wiring.

use log::info;
use serde_json::{json, Value};
use shared::Record;

use crate::error::StorageResult;
use crate::storage::DatabaseHandler;

/// What the walkthrough observed at each step
#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub id: String,
    pub fetched: Option<Record>,
    pub updated: Option<Record>,
    pub deleted: bool,
    pub after_delete: Option<Record>,
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Create a record, read it back, update its status and delete it
pub fn run_demo(handler: &dyn DatabaseHandler) -> StorageResult<DemoReport> {
    let id = handler.create(object(json!({"name": "demo", "status": "created"})))?;
    info!("Created record with id={}", id);

    let fetched = handler.read(&id)?;
    info!("Fetched record: {:?}", fetched);

    let updated = handler.update(&id, &object(json!({"status": "updated"})))?;
    info!("Updated record: {:?}", updated);

    let deleted = handler.delete(&id)?;
    info!("Deleted: {}", deleted);

    let after_delete = handler.read(&id)?;

    Ok(DemoReport {
        id,
        fetched,
        updated,
        deleted,
        after_delete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::TestEnvironment;
    use crate::storage::{create_handler, BackendKind, BackendParams};

    #[test]
    fn test_demo_on_every_file_backend() {
        let env = TestEnvironment::new();
        for (kind, file) in [
            (BackendKind::Csv, "demo.csv"),
            (BackendKind::Json, "demo.json"),
            (BackendKind::Sqlite, "demo.db"),
        ] {
            let handler = create_handler(kind, &BackendParams::file(env.path(file))).unwrap();
            let report = run_demo(handler.as_ref()).unwrap();

            assert_eq!(report.id.len(), 32);
            let fetched = report.fetched.unwrap();
            assert_eq!(fetched["status"], json!("created"));
            assert_eq!(fetched["id"], json!(report.id));
            let updated = report.updated.unwrap();
            assert_eq!(updated["status"], json!("updated"));
            assert_eq!(updated["name"], json!("demo"));
            assert!(report.deleted);
            assert_eq!(report.after_delete, None);
        }
    }
}
