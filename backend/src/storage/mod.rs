//! # Storage Module
//!
//! One CRUD + backup contract over several storage media. Application code
//! asks the factory for a `Box<dyn DatabaseHandler>` and never depends on the
//! medium behind it.
//!
//! ## Backends
//!
//! - `csv`, `json`: a single file rewritten whole on every mutation
//! - `sqlite`: an embedded database file
//! - `postgresql`, `mysql`, `mariadb`, `mssql`, `oracle`: database servers
//!   reached through a DSN, each behind a cargo feature
//!
//! ## Records
//!
//! A record is a JSON object. Its identifier lives in a configurable field
//! (`id` by default); a missing or empty identifier is replaced by a fresh
//! 32-character hex id on `create`. The SQL backends store the whole record
//! as one JSON payload next to the identifier column.

pub mod csv;
pub mod factory;
pub mod files;
pub mod json;
pub mod kind;
pub mod network;
pub mod sql;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

pub use self::csv::CsvDatabaseHandler;
pub use factory::{create_handler, create_handler_from_name, BackendParams};
pub use json::JsonDatabaseHandler;
pub use kind::{BackendKind, Operation};
pub use sql::BackupMode;
pub use sqlite::SqliteDatabaseHandler;
pub use traits::DatabaseHandler;
