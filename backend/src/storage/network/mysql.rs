use anyhow::Result;
use log::{debug, info};
use shared::{ensure_id, merge_update, record_id, Record};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::types::Json;
use sqlx::{Connection, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{OperationContext, StorageError, StorageResult};
use crate::storage::files::write_json_snapshot;
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::sql::dsn::{MARIADB_DEFAULTS, MYSQL_DEFAULTS};
use crate::storage::sql::{dump, BackupMode, BlockingRuntime, ConnectionParams, Dialect, DATA_COLUMN};
use crate::storage::traits::DatabaseHandler;

const DIALECT: Dialect = Dialect::MySql;

/// MySQL or MariaDB storage keeping each record in a JSON column.
///
/// Both servers speak the same protocol and SQL; the flavor only decides the
/// environment prefix, the error labels and which dump tool is tried first.
pub struct MySqlDatabaseHandler {
    flavor: BackendKind,
    params: ConnectionParams,
    options: MySqlConnectOptions,
    table: String,
    id_field: String,
    backup_mode: BackupMode,
    runtime: BlockingRuntime,
}

fn connect_options(flavor: BackendKind, params: &ConnectionParams) -> StorageResult<MySqlConnectOptions> {
    let mut options = MySqlConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .username(&params.user)
        .database(&params.database);
    if !params.password.is_empty() {
        options = options.password(&params.password);
    }
    if let Some(mode) = params.options.get("ssl-mode").or_else(|| params.options.get("ssl_mode")) {
        let mode = MySqlSslMode::from_str(mode).map_err(|e| StorageError::InvalidConfig {
            backend: flavor,
            reason: format!("ssl-mode: {}", e),
        })?;
        options = options.ssl_mode(mode);
    }
    Ok(options)
}

impl MySqlDatabaseHandler {
    /// Connect to a MySQL server
    pub fn mysql(dsn: &str, table: impl Into<String>, id_field: impl Into<String>) -> StorageResult<Self> {
        Self::connect(BackendKind::Mysql, dsn, table, id_field)
    }

    /// Connect to a MariaDB server
    pub fn mariadb(dsn: &str, table: impl Into<String>, id_field: impl Into<String>) -> StorageResult<Self> {
        Self::connect(BackendKind::Mariadb, dsn, table, id_field)
    }

    fn connect(
        flavor: BackendKind,
        dsn: &str,
        table: impl Into<String>,
        id_field: impl Into<String>,
    ) -> StorageResult<Self> {
        let defaults = match flavor {
            BackendKind::Mariadb => &MARIADB_DEFAULTS,
            _ => &MYSQL_DEFAULTS,
        };
        let params = ConnectionParams::parse(dsn, defaults)?;
        let handler = Self {
            flavor,
            options: connect_options(flavor, &params)?,
            params,
            table: table.into(),
            id_field: id_field.into(),
            backup_mode: BackupMode::default(),
            runtime: BlockingRuntime::new().during(flavor, Operation::Open)?,
        };

        handler
            .runtime
            .block_on(handler.setup_schema())
            .during(flavor, Operation::Open)?;
        info!("Connected to {} at {} (table {})", flavor, handler.params, handler.table);
        Ok(handler)
    }

    /// Choose between the dump tools and the in-process JSON export for backups
    pub fn with_backup_mode(mut self, mode: BackupMode) -> Self {
        self.backup_mode = mode;
        self
    }

    async fn open(&self) -> Result<MySqlConnection> {
        Ok(MySqlConnection::connect_with(&self.options).await?)
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

        let mut records = Vec::new();
        for row in outcome? {
            records.push(row.try_get::<Json<Record>, _>(DATA_COLUMN)?.0);
        }
        Ok(records)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let sql = DIALECT.delete_one(&self.table, &self.id_field);
        let mut conn = self.open().await?;
        let outcome = sqlx::query(&sql).bind(id).execute(&mut conn).await;
        conn.close().await?;
        Ok(outcome?.rows_affected() > 0)
    }
}

impl DatabaseHandler for MySqlDatabaseHandler {
    fn kind(&self) -> BackendKind {
        self.flavor
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn create(&self, record: Record) -> StorageResult<String> {
        let record = ensure_id(record, &self.id_field);
        let id = record_id(&record, &self.id_field).unwrap_or_default();
        self.runtime
            .block_on(self.upsert(&id, &record))
            .during(self.flavor, Operation::Create)?;
        debug!("Stored record {} in {}", id, self.table);
        Ok(id)
    }

    fn read(&self, id: &str) -> StorageResult<Option<Record>> {
        self.runtime
            .block_on(self.fetch_one(id))
            .during(self.flavor, Operation::Read)
    }

    fn update(&self, id: &str, updates: &Record) -> StorageResult<Option<Record>> {
        let Some(existing) = self
            .runtime
            .block_on(self.fetch_one(id))
            .during(self.flavor, Operation::Update)?
        else {
            return Ok(None);
        };

        let merged = merge_update(existing, updates, &self.id_field, id);
        self.runtime
            .block_on(self.upsert(id, &merged))
            .during(self.flavor, Operation::Update)?;
        Ok(Some(merged))
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        self.runtime
            .block_on(self.remove(id))
            .during(self.flavor, Operation::Delete)
    }

    fn backup(&self, target: &Path) -> StorageResult<PathBuf> {
        match self.backup_mode {
            BackupMode::DumpTool => dump::mysql_dump(self.flavor, &self.params).run_to(target),
            BackupMode::JsonExport => {
                let records = self
                    .runtime
                    .block_on(self.fetch_all())
                    .during(self.flavor, Operation::Backup)?;
                write_json_snapshot(target, &records).during(self.flavor, Operation::Backup)
            }
        }
    }
}
