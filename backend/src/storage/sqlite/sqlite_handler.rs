use anyhow::Result;
use log::{debug, info};
use shared::{ensure_id, merge_update, record_id, Record, DEFAULT_ID_FIELD};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, Row, SqliteConnection};
use std::path::{Path, PathBuf};

use crate::error::{OperationContext, StorageResult};
use crate::storage::files::{copy_file, ensure_parent_dir};
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::sql::{decode_payload, encode_payload, BlockingRuntime, Dialect, DATA_COLUMN, DEFAULT_TABLE};
use crate::storage::traits::DatabaseHandler;

const KIND: BackendKind = BackendKind::Sqlite;
const DIALECT: Dialect = Dialect::Sqlite;

/// SQLite storage keeping each record as a JSON text blob
#[derive(Debug)]
pub struct SqliteDatabaseHandler {
    db_path: PathBuf,
    table: String,
    id_field: String,
    runtime: BlockingRuntime,
}

impl SqliteDatabaseHandler {
    /// Open (creating if needed) the database at `db_path` with the default
    /// `records` table and `id` field
    pub fn new<P: AsRef<Path>>(db_path: P) -> StorageResult<Self> {
        Self::with_table(db_path, DEFAULT_TABLE, DEFAULT_ID_FIELD)
    }

    pub fn with_table<P: AsRef<Path>>(
        db_path: P,
        table: impl Into<String>,
        id_field: impl Into<String>,
    ) -> StorageResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        ensure_parent_dir(&db_path).during(KIND, Operation::Open)?;

        let handler = Self {
            db_path,
            table: table.into(),
            id_field: id_field.into(),
            runtime: BlockingRuntime::new().during(KIND, Operation::Open)?,
        };
        handler
            .runtime
            .block_on(handler.setup_schema())
            .during(KIND, Operation::Open)?;

        info!(
            "Opened SQLite store {} (table {})",
            handler.db_path.display(),
            handler.table
        );
        Ok(handler)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .create_if_missing(true);
        Ok(SqliteConnection::connect_with(&options).await?)
    }

    async fn setup_schema(&self) -> Result<()> {
        let sql = DIALECT.create_table(&self.table, &self.id_field);
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(&sql).execute(&mut conn).await;
        conn.close().await?;
        outcome?;
        Ok(())
    }

    async fn upsert(&self, id: &str, payload: &str) -> Result<()> {
        let sql = DIALECT.upsert(&self.table, &self.id_field);
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(&sql)
            .bind(id)
            .bind(payload)
            .execute(&mut conn)
            .await;
        conn.close().await?;
        outcome?;
        Ok(())
    }

    async fn fetch_payload(&self, id: &str) -> Result<Option<String>> {
        let sql = DIALECT.select_one(&self.table, &self.id_field);
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(&sql).bind(id).fetch_optional(&mut conn).await;
        conn.close().await?;
        Ok(outcome?.map(|row| row.get::<String, _>(DATA_COLUMN)))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let sql = DIALECT.delete_one(&self.table, &self.id_field);
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(&sql).bind(id).execute(&mut conn).await;
        conn.close().await?;
        Ok(outcome?.rows_affected() > 0)
    }

    fn load(&self, id: &str, operation: Operation) -> StorageResult<Option<Record>> {
        match self.runtime.block_on(self.fetch_payload(id)).during(KIND, operation)? {
            Some(payload) => decode_payload(KIND, operation, &payload).map(Some),
            None => Ok(None),
        }
    }
}

impl DatabaseHandler for SqliteDatabaseHandler {
    fn kind(&self) -> BackendKind {
        KIND
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn create(&self, record: Record) -> StorageResult<String> {
        let record = ensure_id(record, &self.id_field);
        let id = record_id(&record, &self.id_field).unwrap_or_default();
        let payload = encode_payload(KIND, Operation::Create, &record)?;

        self.runtime
            .block_on(self.upsert(&id, &payload))
            .during(KIND, Operation::Create)?;
        debug!("Stored record {} in {}", id, self.table);
        Ok(id)
    }

    fn read(&self, id: &str) -> StorageResult<Option<Record>> {
        self.load(id, Operation::Read)
    }

    fn update(&self, id: &str, updates: &Record) -> StorageResult<Option<Record>> {
        let Some(existing) = self.load(id, Operation::Update)? else {
            debug!("Record {} not found for update", id);
            return Ok(None);
        };

        let merged = merge_update(existing, updates, &self.id_field, id);
        let payload = encode_payload(KIND, Operation::Update, &merged)?;
        self.runtime
            .block_on(self.upsert(id, &payload))
            .during(KIND, Operation::Update)?;
        Ok(Some(merged))
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        let deleted = self
            .runtime
            .block_on(self.remove(id))
            .during(KIND, Operation::Delete)?;

        if deleted {
            debug!("Deleted record {} from {}", id, self.table);
        }
        Ok(deleted)
    }

    fn backup(&self, target: &Path) -> StorageResult<PathBuf> {
        let out = copy_file(&self.db_path, target).during(KIND, Operation::Backup)?;
        info!("Backed up {} to {}", self.db_path.display(), out.display());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::{assert_contract, record, TestEnvironment};
    use serde_json::json;

    #[test]
    fn test_contract() {
        let env = TestEnvironment::new();
        let handler = SqliteDatabaseHandler::new(env.path("app.db")).unwrap();
        assert_contract(&handler);
    }

    #[test]
    fn test_nested_values_round_trip() {
        let env = TestEnvironment::new();
        let handler = SqliteDatabaseHandler::new(env.path("app.db")).unwrap();
        let original = record(json!({
            "id": "nested",
            "count": 3,
            "ratio": 0.5,
            "active": true,
            "tags": ["a", "b"],
            "owner": {"name": "ann", "age": null}
        }));

        let id = handler.create(original.clone()).unwrap();

        assert_eq!(id, "nested");
        assert_eq!(handler.read(&id).unwrap(), Some(original));
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let env = TestEnvironment::new();
        let handler = SqliteDatabaseHandler::new(env.path("app.db")).unwrap();

        let id = handler.create(record(json!({"id": 42, "name": "answer"}))).unwrap();

        assert_eq!(id, "42");
        assert_eq!(handler.read("42").unwrap().unwrap()["id"], json!("42"));
    }

    #[test]
    fn test_data_survives_reopen() {
        let env = TestEnvironment::new();
        let path = env.path("nested/dir/app.db");
        let id = {
            let handler = SqliteDatabaseHandler::new(&path).unwrap();
            handler.create(record(json!({"name": "kept"}))).unwrap()
        };

        let reopened = SqliteDatabaseHandler::new(&path).unwrap();
        assert_eq!(reopened.read(&id).unwrap().unwrap()["name"], json!("kept"));
    }

    #[test]
    fn test_custom_table_and_id_field() {
        let env = TestEnvironment::new();
        let handler = SqliteDatabaseHandler::with_table(env.path("app.db"), "people", "person_id").unwrap();
        assert_eq!(handler.id_field(), "person_id");
        assert_contract(&handler);
    }

    #[test]
    fn test_backup_copy_opens_as_database() {
        let env = TestEnvironment::new();
        let handler = SqliteDatabaseHandler::new(env.path("app.db")).unwrap();
        let ids: Vec<String> = (0..3)
            .map(|n| handler.create(record(json!({"n": n}))).unwrap())
            .collect();

        let out = handler.backup(&env.path("backups/app-copy.db")).unwrap();

        let restored = SqliteDatabaseHandler::new(&out).unwrap();
        for (n, id) in ids.iter().enumerate() {
            assert_eq!(restored.read(id).unwrap().unwrap()["n"], json!(n));
        }
    }
}
