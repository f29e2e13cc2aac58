//! # CSV File Storage
//!
//! Stores records as rows of a single CSV file.
//!
//! ## File Layout
//!
//! ```csv
//! id,name,status
//! 3f2a...,demo,created
//! ```
//!
//! The header is the sorted union of every field name across all stored
//! records and is recomputed on each rewrite, so adding a record with a new
//! field widens every row. Values are flattened to text: nested arrays and
//! objects are written as compact JSON and come back as strings. `null` is
//! written as an empty cell. Every empty cell reads back as `""`, including
//! columns a row only has because another record introduced them.
//!
//! Like the JSON store, mutations read the whole file and rewrite it with no
//! locking; concurrent writers race and the last rewrite wins.

pub mod csv_handler;

pub use csv_handler::CsvDatabaseHandler;
