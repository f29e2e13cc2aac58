//! # JSON File Storage
//!
//! Keeps every record in one pretty-printed JSON array. Each mutation reads
//! the whole file, changes it in memory and rewrites it through a temp file.
//!
//! Two handlers mutating the same file at the same time race: the last full
//! rewrite wins and the other change is lost. No file locking is attempted.

pub mod json_handler;

pub use json_handler::JsonDatabaseHandler;
