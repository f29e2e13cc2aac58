//! # SQL Building Blocks
//!
//! Pieces shared by the SQLite and networked handlers: per-engine statement
//! text, DSN parsing, the blocking runtime that drives the async drivers and
//! the dump-tool runner used for vendor backups.

pub mod dialect;
pub mod dsn;
pub mod dump;
pub mod runtime;

pub use dialect::{Dialect, DATA_COLUMN};
pub use dsn::{ConnectionParams, EngineDefaults};
pub use dump::DumpCommand;
pub use runtime::BlockingRuntime;

use serde::Deserialize;
use shared::Record;

use crate::error::{OperationContext, StorageResult};
use crate::storage::kind::{BackendKind, Operation};

/// Default table name for SQL-backed stores
pub const DEFAULT_TABLE: &str = "records";

/// How a dump-capable engine produces its backup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// Run the vendor dump utility (`pg_dump`, `mysqldump`, ...)
    #[default]
    DumpTool,
    /// Stream every stored record into a JSON array file in-process
    JsonExport,
}

/// Decode a JSON payload cell back into a record
pub(crate) fn decode_payload(backend: BackendKind, operation: Operation, payload: &str) -> StorageResult<Record> {
    serde_json::from_str(payload).during(backend, operation)
}

/// Encode a record as the JSON payload cell
pub(crate) fn encode_payload(backend: BackendKind, operation: Operation, record: &Record) -> StorageResult<String> {
    serde_json::to_string(record).during(backend, operation)
}
