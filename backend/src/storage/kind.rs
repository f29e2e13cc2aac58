//! # Backend Kinds
//!
//! The selector values accepted by the factory and carried by every error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StorageError;

/// Which storage medium a handler talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Flat CSV file, one row per record
    Csv,
    /// Flat JSON file holding an array of records
    Json,
    /// Embedded SQLite database file
    Sqlite,
    /// PostgreSQL server
    #[serde(alias = "postgres")]
    Postgresql,
    /// MySQL server
    Mysql,
    /// MariaDB server
    Mariadb,
    /// Microsoft SQL Server
    Mssql,
    /// Oracle Database
    Oracle,
}

impl BackendKind {
    /// Every backend, in the order the factory reports them
    pub const ALL: [BackendKind; 8] = [
        BackendKind::Csv,
        BackendKind::Json,
        BackendKind::Sqlite,
        BackendKind::Postgresql,
        BackendKind::Mysql,
        BackendKind::Mariadb,
        BackendKind::Mssql,
        BackendKind::Oracle,
    ];

    /// Canonical selector string
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Csv => "csv",
            BackendKind::Json => "json",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Postgresql => "postgresql",
            BackendKind::Mysql => "mysql",
            BackendKind::Mariadb => "mariadb",
            BackendKind::Mssql => "mssql",
            BackendKind::Oracle => "oracle",
        }
    }

    /// Selector strings of every known backend
    pub fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(BackendKind::as_str).collect()
    }

    /// Whether the backend reaches a server through a DSN
    pub fn is_networked(&self) -> bool {
        !matches!(self, BackendKind::Csv | BackendKind::Json | BackendKind::Sqlite)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(BackendKind::Csv),
            "json" => Ok(BackendKind::Json),
            "sqlite" => Ok(BackendKind::Sqlite),
            "postgresql" | "postgres" => Ok(BackendKind::Postgresql),
            "mysql" => Ok(BackendKind::Mysql),
            "mariadb" => Ok(BackendKind::Mariadb),
            "mssql" => Ok(BackendKind::Mssql),
            "oracle" => Ok(BackendKind::Oracle),
            _ => Err(StorageError::UnsupportedBackend {
                requested: s.to_string(),
                supported: Self::supported(),
            }),
        }
    }
}

/// Contract operation names used in error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Handler construction, including table bootstrap
    Open,
    Create,
    Read,
    Update,
    Delete,
    Backup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Open => "open",
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Backup => "backup",
        };
        f.write_str(name)
    }
}
