//! # Storage Errors
//!
//! Every failure a handler or the factory can report. Missing records are not
//! errors: `read`/`update` return `None` and `delete` returns `false`.

use crate::storage::kind::{BackendKind, Operation};

/// Error type for all storage handler operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unsupported backend '{requested}'. Supported: {}", .supported.join(", "))]
    UnsupportedBackend {
        requested: String,
        supported: Vec<&'static str>,
    },

    #[error("{backend} backend is unavailable: {reason}")]
    DependencyMissing { backend: BackendKind, reason: String },

    #[error("{backend} backend is misconfigured: {reason}")]
    InvalidConfig { backend: BackendKind, reason: String },

    #[error("{backend} backup needs a dump tool but none was found in PATH (tried {})", .tried.join(", "))]
    BackupToolMissing { backend: BackendKind, tried: Vec<String> },

    #[error("{backend} backup failed: {tool} exited with {}{}", exit_code_text(.code), stderr_suffix(.stderr))]
    BackupFailed {
        backend: BackendKind,
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{backend} {operation} failed: {source:#}")]
    Backend {
        backend: BackendKind,
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl StorageError {
    /// Wrap an underlying failure with backend and operation context
    pub fn backend(backend: BackendKind, operation: Operation, source: impl Into<anyhow::Error>) -> Self {
        StorageError::Backend {
            backend,
            operation,
            source: source.into(),
        }
    }

    /// The backend the error belongs to, when it is tied to one
    pub fn backend_kind(&self) -> Option<BackendKind> {
        match self {
            StorageError::UnsupportedBackend { .. } => None,
            StorageError::DependencyMissing { backend, .. }
            | StorageError::InvalidConfig { backend, .. }
            | StorageError::BackupToolMissing { backend, .. }
            | StorageError::BackupFailed { backend, .. }
            | StorageError::Backend { backend, .. } => Some(*backend),
        }
    }
}

/// Result type for storage handler operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Attach backend/operation context to fallible calls
pub trait OperationContext<T> {
    fn during(self, backend: BackendKind, operation: Operation) -> StorageResult<T>;
}

impl<T, E> OperationContext<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn during(self, backend: BackendKind, operation: Operation) -> StorageResult<T> {
        self.map_err(|e| StorageError::backend(backend, operation, e))
    }
}
