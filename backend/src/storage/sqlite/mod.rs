//! # SQLite Storage
//!
//! A single database file holding one two-column table: the identifier and
//! the record serialized as JSON text. Every operation opens its own
//! connection and closes it before returning.

pub mod sqlite_handler;

pub use sqlite_handler::SqliteDatabaseHandler;
