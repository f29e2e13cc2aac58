use anyhow::Result;
use log::{debug, info};
use shared::{ensure_id, merge_update, record_id, Record};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::types::Json;
use sqlx::{Connection, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{OperationContext, StorageError, StorageResult};
use crate::storage::files::write_json_snapshot;
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::sql::dsn::POSTGRES_DEFAULTS;
use crate::storage::sql::{dump, BackupMode, BlockingRuntime, ConnectionParams, Dialect, DATA_COLUMN};
use crate::storage::traits::DatabaseHandler;

const KIND: BackendKind = BackendKind::Postgresql;
const DIALECT: Dialect = Dialect::Postgres;

/// PostgreSQL storage keeping each record in a JSONB column
pub struct PostgresDatabaseHandler {
    params: ConnectionParams,
    options: PgConnectOptions,
    table: String,
    id_field: String,
    backup_mode: BackupMode,
    runtime: BlockingRuntime,
}

/// Driver options for `params`; `sslmode` is honored from the DSN query string
fn connect_options(params: &ConnectionParams) -> StorageResult<PgConnectOptions> {
    let mut options = PgConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .username(&params.user)
        .database(&params.database);
    if !params.password.is_empty() {
        options = options.password(&params.password);
    }
    if let Some(mode) = params.options.get("sslmode") {
        let mode = PgSslMode::from_str(mode).map_err(|e| StorageError::InvalidConfig {
            backend: KIND,
            reason: format!("sslmode: {}", e),
        })?;
        options = options.ssl_mode(mode);
    }
    Ok(options)
}

impl PostgresDatabaseHandler {
    /// Connect using `dsn` and create `table` if it does not exist
    pub fn connect(dsn: &str, table: impl Into<String>, id_field: impl Into<String>) -> StorageResult<Self> {
        let params = ConnectionParams::parse(dsn, &POSTGRES_DEFAULTS)?;
        let handler = Self {
            options: connect_options(&params)?,
            params,
            table: table.into(),
            id_field: id_field.into(),
            backup_mode: BackupMode::default(),
            runtime: BlockingRuntime::new().during(KIND, Operation::Open)?,
        };

        handler
            .runtime
            .block_on(handler.setup_schema())
            .during(KIND, Operation::Open)?;
        info!("Connected to PostgreSQL at {} (table {})", handler.params, handler.table);
        Ok(handler)
    }

    /// Choose between `pg_dump` and the in-process JSON export for backups
    pub fn with_backup_mode(mut self, mode: BackupMode) -> Self {
        self.backup_mode = mode;
        self
    }

    async fn open(&self) -> Result<PgConnection> {
        Ok(PgConnection::connect_with(&self.options).await?)
    }

    async fn setup_schema(&self) -> Result<()> {
        let sql = DIALECT.create_table(&self.table, &self.id_field);
        let mut conn = self.open().await?;
        let outcome = sqlx::query(&sql).execute(&mut conn).await;
        conn.close().await?;
        outcome?;
        Ok(())
    }

    async fn upsert(&self, id: &str, record: &Record) -> Result<()> {
        let sql = DIALECT.upsert(&self.table, &self.id_field);
        let mut conn = self.open().await?;
        let outcome = sqlx::query(&sql)
            .bind(id)
            .bind(Json(record))
            .execute(&mut conn)
            .await;
        conn.close().await?;
        outcome?;
        Ok(())
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<Record>> {
        let sql = DIALECT.select_one(&self.table, &self.id_field);
        let mut conn = self.open().await?;
        let outcome = sqlx::query(&sql).bind(id).fetch_optional(&mut conn).await;
        conn.close().await?;
        match outcome? {
            Some(row) => Ok(Some(row.try_get::<Json<Record>, _>(DATA_COLUMN)?.0)),
            None => Ok(None),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<Record>> {
        let sql = DIALECT.select_all(&self.table);
        let mut conn = self.open().await?;
        let outcome = sqlx::query(&sql).fetch_all(&mut conn).await;
        conn.close().await?;
        outcome?
            .iter()
            .map(|row| -> Result<Record> { Ok(row.try_get::<Json<Record>, _>(DATA_COLUMN)?.0) })
            .collect()
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let sql = DIALECT.delete_one(&self.table, &self.id_field);
        let mut conn = self.open().await?;
        let outcome = sqlx::query(&sql).bind(id).execute(&mut conn).await;
        conn.close().await?;
        Ok(outcome?.rows_affected() > 0)
    }
}

impl DatabaseHandler for PostgresDatabaseHandler {
    fn kind(&self) -> BackendKind {
        KIND
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn create(&self, record: Record) -> StorageResult<String> {
        let record = ensure_id(record, &self.id_field);
        let id = record_id(&record, &self.id_field).unwrap_or_default();
        self.runtime
            .block_on(self.upsert(&id, &record))
            .during(KIND, Operation::Create)?;
        debug!("Stored record {} in {}", id, self.table);
        Ok(id)
    }

    fn read(&self, id: &str) -> StorageResult<Option<Record>> {
        self.runtime.block_on(self.fetch_one(id)).during(KIND, Operation::Read)
    }

    fn update(&self, id: &str, updates: &Record) -> StorageResult<Option<Record>> {
        let existing = self
            .runtime
            .block_on(self.fetch_one(id))
            .during(KIND, Operation::Update)?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let merged = merge_update(existing, updates, &self.id_field, id);
        self.runtime
            .block_on(self.upsert(id, &merged))
            .during(KIND, Operation::Update)?;
        Ok(Some(merged))
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        self.runtime.block_on(self.remove(id)).during(KIND, Operation::Delete)
    }

    fn backup(&self, target: &Path) -> StorageResult<PathBuf> {
        match self.backup_mode {
            BackupMode::DumpTool => dump::pg_dump(&self.params).run_to(target),
            BackupMode::JsonExport => {
                let records = self
                    .runtime
                    .block_on(self.fetch_all())
                    .during(KIND, Operation::Backup)?;
                let out = write_json_snapshot(target, &records).during(KIND, Operation::Backup)?;
                info!("Exported {} records to {}", records.len(), out.display());
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(dsn: &str) -> ConnectionParams {
        ConnectionParams::parse_with_env(dsn, &POSTGRES_DEFAULTS, |_| None).unwrap()
    }

    #[test]
    fn test_connect_options_accept_known_sslmode() {
        assert!(connect_options(&params("postgresql://u:p@db/app?sslmode=require")).is_ok());
    }

    #[test]
    fn test_unknown_sslmode_is_invalid_config() {
        match connect_options(&params("postgresql://u@db/app?sslmode=sometimes")) {
            Err(StorageError::InvalidConfig { backend, reason }) => {
                assert_eq!(backend, BackendKind::Postgresql);
                assert!(reason.contains("sslmode"));
            }
            Err(other) => panic!("expected InvalidConfig, got {}", other),
            Ok(_) => panic!("expected InvalidConfig"),
        }
    }
}
