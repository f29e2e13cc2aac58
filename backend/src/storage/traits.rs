//! # Storage Traits
//!
//! The one contract every storage backend implements. Callers hold a
//! `Box<dyn DatabaseHandler>` and never depend on a concrete adapter.

use shared::Record;
use std::path::{Path, PathBuf};

use crate::error::StorageResult;
use crate::storage::kind::BackendKind;

/// CRUD + backup contract shared by all backends
///
/// Every call is synchronous and self-contained: SQL adapters open one
/// connection per call and close it before returning, file adapters re-read
/// and rewrite their file on every mutation.
pub trait DatabaseHandler: Send + Sync {
    /// Which backend this handler talks to
    fn kind(&self) -> BackendKind;

    /// Name of the identifier field
    fn id_field(&self) -> &str;

    /// Assign/normalize the identifier, then insert or fully replace the record.
    /// Returns the canonical string identifier.
    fn create(&self, record: Record) -> StorageResult<String>;

    /// Look up a record by identifier; `None` when it does not exist
    fn read(&self, id: &str) -> StorageResult<Option<Record>>;

    /// Shallow-merge `updates` into the stored record and persist it.
    /// Returns the merged record, or `None` (and writes nothing) when absent.
    fn update(&self, id: &str, updates: &Record) -> StorageResult<Option<Record>>;

    /// Remove a record; returns true if something was removed
    fn delete(&self, id: &str) -> StorageResult<bool>;

    /// Write a snapshot of the whole data set to `target`
    fn backup(&self, target: &Path) -> StorageResult<PathBuf>;

    /// Release held resources. All adapters connect per call, so this is a no-op.
    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
