use log::{debug, info};
use oracle::Connection;
use shared::{ensure_id, merge_update, record_id, Record};
use std::path::{Path, PathBuf};

use crate::error::{OperationContext, StorageError, StorageResult};
use crate::storage::files::write_json_snapshot;
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::sql::dsn::ORACLE_DEFAULTS;
use crate::storage::sql::{decode_payload, encode_payload, ConnectionParams, Dialect};
use crate::storage::traits::DatabaseHandler;

const KIND: BackendKind = BackendKind::Oracle;
const DIALECT: Dialect = Dialect::Oracle;

/// Marker of the client error raised when the Oracle client libraries cannot be loaded
const CLIENT_LIBRARY_MISSING: &str = "DPI-1047";

/// Map a driver error to the storage taxonomy
fn classify(error: oracle::Error, operation: Operation) -> StorageError {
    let message = error.to_string();
    if message.contains(CLIENT_LIBRARY_MISSING) {
        StorageError::DependencyMissing {
            backend: KIND,
            reason: message,
        }
    } else {
        StorageError::backend(KIND, operation, error)
    }
}

trait OracleContext<T> {
    fn oracle(self, operation: Operation) -> StorageResult<T>;
}

impl<T> OracleContext<T> for Result<T, oracle::Error> {
    fn oracle(self, operation: Operation) -> StorageResult<T> {
        self.map_err(|e| classify(e, operation))
    }
}

/// EZCONNECT descriptor `//host:port/service`; `?service_name=` wins over the path
fn connect_string(params: &ConnectionParams) -> String {
    let service = params
        .options
        .get("service_name")
        .unwrap_or(&params.database);
    format!("//{}:{}/{}", params.host, params.port, service)
}

/// First non-empty value among `candidates`
fn first_set(candidates: impl IntoIterator<Item = Option<String>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Oracle storage keeping each record as JSON text in a `CLOB` column.
///
/// The driver is synchronous, so no runtime is involved.
pub struct OracleDatabaseHandler {
    connect_string: String,
    user: String,
    password: String,
    table: String,
    id_field: String,
}

impl OracleDatabaseHandler {
    /// Connect using `dsn`. Explicit credentials win over the DSN, which wins
    /// over `ORACLE_USER`/`ORA_USER` and `ORACLE_PASSWORD`/`ORA_PASSWORD`.
    pub fn connect(
        dsn: &str,
        user: Option<&str>,
        password: Option<&str>,
        table: impl Into<String>,
        id_field: impl Into<String>,
    ) -> StorageResult<Self> {
        let params = ConnectionParams::parse(dsn, &ORACLE_DEFAULTS)?;
        let env = |key: &str| std::env::var(key).ok();

        let handler = Self {
            connect_string: connect_string(&params),
            user: first_set([user.map(str::to_string), Some(params.user.clone()), env("ORA_USER")]),
            password: first_set([
                password.map(str::to_string),
                Some(params.password.clone()),
                env("ORA_PASSWORD"),
            ]),
            table: table.into(),
            id_field: id_field.into(),
        };

        handler.setup_schema()?;
        info!(
            "Connected to Oracle at {} as {} (table {})",
            handler.connect_string, handler.user, handler.table
        );
        Ok(handler)
    }

    fn open(&self, operation: Operation) -> StorageResult<Connection> {
        Connection::connect(&self.user, &self.password, &self.connect_string).oracle(operation)
    }

    fn setup_schema(&self) -> StorageResult<()> {
        let conn = self.open(Operation::Open)?;
        let outcome = (|| -> Result<(), oracle::Error> {
            let count: i64 =
                conn.query_row_as(Dialect::oracle_table_exists(), &[&self.table.to_uppercase()])?;
            if count == 0 {
                conn.execute(&DIALECT.create_table(&self.table, &self.id_field), &[])?;
                conn.commit()?;
            }
            Ok(())
        })();
        conn.close().oracle(Operation::Open)?;
        outcome.oracle(Operation::Open)
    }

    fn upsert(&self, id: &str, payload: &str, operation: Operation) -> StorageResult<()> {
        let conn = self.open(operation)?;
        let outcome = conn
            .execute(&DIALECT.upsert(&self.table, &self.id_field), &[&id, &payload])
            .and_then(|_| conn.commit());
        conn.close().oracle(operation)?;
        outcome.oracle(operation)
    }

    fn load(&self, id: &str, operation: Operation) -> StorageResult<Option<Record>> {
        let conn = self.open(operation)?;
        let outcome = conn.query_row_as::<String>(&DIALECT.select_one(&self.table, &self.id_field), &[&id]);
        conn.close().oracle(operation)?;
        match outcome {
            Ok(payload) => decode_payload(KIND, operation, &payload).map(Some),
            Err(oracle::Error::NoDataFound) => Ok(None),
            Err(e) => Err(classify(e, operation)),
        }
    }

    fn fetch_all(&self) -> StorageResult<Vec<Record>> {
        let conn = self.open(Operation::Backup)?;
        let outcome = conn
            .query_as::<String>(&DIALECT.select_all(&self.table), &[])
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>());
        conn.close().oracle(Operation::Backup)?;
        outcome
            .oracle(Operation::Backup)?
            .iter()
            .map(|payload| decode_payload(KIND, Operation::Backup, payload))
            .collect()
    }
}

impl DatabaseHandler for OracleDatabaseHandler {
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
        self.upsert(&id, &payload, Operation::Create)?;
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
        self.upsert(id, &payload, Operation::Update)?;
        Ok(Some(merged))
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        let conn = self.open(Operation::Delete)?;
        let outcome = conn
            .execute(&DIALECT.delete_one(&self.table, &self.id_field), &[&id])
            .and_then(|stmt| stmt.row_count())
            .and_then(|count| conn.commit().map(|_| count));
        conn.close().oracle(Operation::Delete)?;
        Ok(outcome.oracle(Operation::Delete)? > 0)
    }

    /// No dump tool is driven for Oracle; every payload is exported as JSON
    fn backup(&self, target: &Path) -> StorageResult<PathBuf> {
        let records = self.fetch_all()?;
        let out = write_json_snapshot(target, &records).during(KIND, Operation::Backup)?;
        info!("Exported {} records to {}", records.len(), out.display());
        Ok(out)
    }
}
