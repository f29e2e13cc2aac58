//! # recordstore
//!
//! One synchronous CRUD + backup contract over CSV, JSON, SQLite, PostgreSQL,
//! MySQL, MariaDB, SQL Server and Oracle storage.
//!
//! ```no_run
//! use recordstore::storage::{create_handler_from_name, BackendParams};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let handler = create_handler_from_name("json", &BackendParams::file("data/records.json"))?;
//! let record = json!({"name": "demo"}).as_object().cloned().unwrap_or_default();
//! let id = handler.create(record)?;
//! assert!(handler.read(&id)?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod demo;
pub mod error;
pub mod storage;

pub use config::StoreConfig;
pub use error::{StorageError, StorageResult};
pub use shared::Record;
