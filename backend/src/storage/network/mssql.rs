use anyhow::Result;
use log::{debug, info};
use shared::{ensure_id, merge_update, record_id, Record};
use std::path::{Path, PathBuf};
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::{OperationContext, StorageError, StorageResult};
use crate::storage::files::write_json_snapshot;
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::sql::dsn::MSSQL_DEFAULTS;
use crate::storage::sql::{decode_payload, encode_payload, BlockingRuntime, ConnectionParams, Dialect};
use crate::storage::traits::DatabaseHandler;

const KIND: BackendKind = BackendKind::Mssql;
const DIALECT: Dialect = Dialect::MsSql;

type MssqlClient = Client<Compat<TcpStream>>;

/// Whether `dsn` is an ADO.NET style `key=value;...` string rather than a URL
fn is_ado_string(dsn: &str) -> bool {
    !dsn.contains("://") && dsn.contains('=')
}

/// Build the driver config from a URL DSN or an ADO.NET connection string
fn client_config(dsn: &str) -> StorageResult<(Config, String)> {
    if is_ado_string(dsn) {
        let config = Config::from_ado_string(dsn).map_err(|e| StorageError::InvalidConfig {
            backend: KIND,
            reason: format!("cannot parse connection string: {}", e),
        })?;
        let target = config.get_addr();
        return Ok((config, target));
    }

    let params = ConnectionParams::parse(dsn, &MSSQL_DEFAULTS)?;
    Ok((config_from_params(&params), params.to_string()))
}

fn config_from_params(params: &ConnectionParams) -> Config {
    let mut config = Config::new();
    config.host(&params.host);
    config.port(params.port);
    config.database(&params.database);
    config.authentication(AuthMethod::sql_server(&params.user, &params.password));
    let trust = params
        .options
        .get("TrustServerCertificate")
        .or_else(|| params.options.get("trust_server_certificate"))
        .map(|v| v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("true"))
        .unwrap_or(true);
    if trust {
        config.trust_cert();
    }
    config
}

/// SQL Server storage keeping each record as JSON text in an `NVARCHAR(MAX)` column
pub struct MssqlDatabaseHandler {
    config: Config,
    target: String,
    table: String,
    id_field: String,
    runtime: BlockingRuntime,
}

impl MssqlDatabaseHandler {
    /// Connect using a URL DSN or an ADO.NET connection string and create
    /// `table` if it does not exist
    pub fn connect(dsn: &str, table: impl Into<String>, id_field: impl Into<String>) -> StorageResult<Self> {
        let (config, target) = client_config(dsn)?;
        let handler = Self {
            config,
            target,
            table: table.into(),
            id_field: id_field.into(),
            runtime: BlockingRuntime::new().during(KIND, Operation::Open)?,
        };

        handler
            .runtime
            .block_on(handler.setup_schema())
            .during(KIND, Operation::Open)?;
        info!("Connected to SQL Server at {} (table {})", handler.target, handler.table);
        Ok(handler)
    }

    async fn open(&self) -> Result<MssqlClient> {
        let tcp = TcpStream::connect(self.config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Ok(Client::connect(self.config.clone(), tcp.compat_write()).await?)
    }

    async fn setup_schema(&self) -> Result<()> {
        let sql = DIALECT.create_table(&self.table, &self.id_field);
        let mut client = self.open().await?;
        let outcome = client.execute(sql, &[]).await;
        client.close().await?;
        outcome?;
        Ok(())
    }

    async fn upsert(&self, id: &str, payload: String) -> Result<()> {
        let sql = DIALECT.upsert(&self.table, &self.id_field);
        let id = id.to_string();
        let mut client = self.open().await?;
        let outcome = client.execute(sql, &[&id, &payload]).await;
        client.close().await?;
        outcome?;
        Ok(())
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<String>> {
        let sql = DIALECT.select_one(&self.table, &self.id_field);
        let id = id.to_string();
        let mut client = self.open().await?;
        let row = match client.query(sql, &[&id]).await {
            Ok(stream) => stream.into_row().await,
            Err(e) => Err(e),
        };
        client.close().await?;
        match row? {
            Some(row) => Ok(row.try_get::<&str, _>(0)?.map(str::to_string)),
            None => Ok(None),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<String>> {
        let sql = DIALECT.select_all(&self.table);
        let mut client = self.open().await?;
        let rows = match client.query(sql, &[]).await {
            Ok(stream) => stream.into_first_result().await,
            Err(e) => Err(e),
        };
        client.close().await?;

        let mut payloads = Vec::new();
        for row in rows? {
            if let Some(payload) = row.try_get::<&str, _>(0)? {
                payloads.push(payload.to_string());
            }
        }
        Ok(payloads)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let sql = DIALECT.delete_one(&self.table, &self.id_field);
        let id = id.to_string();
        let mut client = self.open().await?;
        let outcome = client.execute(sql, &[&id]).await;
        client.close().await?;
        Ok(outcome?.total() > 0)
    }

    fn load(&self, id: &str, operation: Operation) -> StorageResult<Option<Record>> {
        match self.runtime.block_on(self.fetch_one(id)).during(KIND, operation)? {
            Some(payload) => decode_payload(KIND, operation, &payload).map(Some),
            None => Ok(None),
        }
    }
}

impl DatabaseHandler for MssqlDatabaseHandler {
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
            .block_on(self.upsert(&id, payload))
            .during(KIND, Operation::Create)?;
        debug!("Stored record {} in {}", id, self.table);
        Ok(id)
    }

    fn read(&self, id: &str) -> StorageResult<Option<Record>> {
        self.load(id, Operation::Read)
    }

    fn update(&self, id: &str, updates: &Record) -> StorageResult<Option<Record>> {
        let Some(existing) = self.load(id, Operation::Update)? else {
            return Ok(None);
        };
        let merged = merge_update(existing, updates, &self.id_field, id);
        let payload = encode_payload(KIND, Operation::Update, &merged)?;
        self.runtime
            .block_on(self.upsert(id, payload))
            .during(KIND, Operation::Update)?;
        Ok(Some(merged))
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        self.runtime.block_on(self.remove(id)).during(KIND, Operation::Delete)
    }

    /// SQL Server has no dump tool in reach; every payload is exported as JSON
    fn backup(&self, target: &Path) -> StorageResult<PathBuf> {
        let payloads = self
            .runtime
            .block_on(self.fetch_all())
            .during(KIND, Operation::Backup)?;
        let records = payloads
            .iter()
            .map(|payload| decode_payload(KIND, Operation::Backup, payload))
            .collect::<StorageResult<Vec<_>>>()?;
        let out = write_json_snapshot(target, &records).during(KIND, Operation::Backup)?;
        info!("Exported {} records to {}", records.len(), out.display());
        Ok(out)
    }
}
