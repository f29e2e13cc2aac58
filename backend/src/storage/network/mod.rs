//! # Networked SQL Storage
//!
//! Handlers for database servers reached through a DSN. Each one stores the
//! record as a JSON payload next to its identifier, opens a fresh connection
//! per call and closes it before returning.
//!
//! Every driver sits behind a cargo feature of the same name; the factory
//! reports a disabled one as `DependencyMissing`.

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle;
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mssql")]
pub use mssql::MssqlDatabaseHandler;
#[cfg(feature = "mysql")]
pub use mysql::MySqlDatabaseHandler;
#[cfg(feature = "oracle")]
pub use oracle::OracleDatabaseHandler;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabaseHandler;
