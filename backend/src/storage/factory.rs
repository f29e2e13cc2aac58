//! # Handler Factory
//!
//! Maps a backend selector plus construction parameters to a boxed handler.

use shared::DEFAULT_ID_FIELD;
use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};
use crate::storage::csv::CsvDatabaseHandler;
use crate::storage::json::JsonDatabaseHandler;
use crate::storage::kind::BackendKind;
use crate::storage::sql::DEFAULT_TABLE;
use crate::storage::sqlite::SqliteDatabaseHandler;
use crate::storage::traits::DatabaseHandler;

/// Everything a handler may need at construction
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BackendParams {
    /// Backing file for CSV, JSON and SQLite
    pub path: Option<PathBuf>,
    /// Connection string for the networked engines
    pub dsn: Option<String>,
    /// Explicit credentials; only Oracle reads these
    pub user: Option<String>,
    pub password: Option<String>,
    /// SQL table name, `records` when unset
    pub table: Option<String>,
    /// Identifier field name, `id` when unset
    pub id_field: Option<String>,
}

impl std::fmt::Debug for BackendParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendParams")
            .field("path", &self.path)
            .field("dsn", &self.dsn.as_ref().map(|_| "***"))
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("table", &self.table)
            .field("id_field", &self.id_field)
            .finish()
    }
}

impl BackendParams {
    /// Parameters for a file-backed store
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parameters for a networked store
    pub fn dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: Some(dsn.into()),
            ..Self::default()
        }
    }

    fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(DEFAULT_TABLE)
    }

    fn id_field(&self) -> &str {
        self.id_field.as_deref().unwrap_or(DEFAULT_ID_FIELD)
    }

    fn require_path(&self, kind: BackendKind) -> StorageResult<&PathBuf> {
        self.path.as_ref().ok_or_else(|| StorageError::InvalidConfig {
            backend: kind,
            reason: "a file path is required".to_string(),
        })
    }

    #[cfg(any(feature = "postgres", feature = "mysql", feature = "mssql", feature = "oracle"))]
    fn require_dsn(&self, kind: BackendKind) -> StorageResult<&str> {
        match self.dsn.as_deref() {
            Some(dsn) if !dsn.trim().is_empty() => Ok(dsn),
            _ => Err(StorageError::InvalidConfig {
                backend: kind,
                reason: "a DSN is required".to_string(),
            }),
        }
    }
}

#[cfg(not(all(feature = "postgres", feature = "mysql", feature = "mssql", feature = "oracle")))]
fn feature_disabled(kind: BackendKind, feature: &str) -> StorageError {
    StorageError::DependencyMissing {
        backend: kind,
        reason: format!("recordstore was built without the `{}` feature", feature),
    }
}

/// Build the handler for `kind`
pub fn create_handler(kind: BackendKind, params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    log::info!("Creating {} handler", kind);
    match kind {
        BackendKind::Csv => Ok(Box::new(CsvDatabaseHandler::with_id_field(
            params.require_path(kind)?,
            params.id_field(),
        )?)),
        BackendKind::Json => Ok(Box::new(JsonDatabaseHandler::with_id_field(
            params.require_path(kind)?,
            params.id_field(),
        )?)),
        BackendKind::Sqlite => Ok(Box::new(SqliteDatabaseHandler::with_table(
            params.require_path(kind)?,
            params.table(),
            params.id_field(),
        )?)),
        BackendKind::Postgresql => postgres(params),
        BackendKind::Mysql | BackendKind::Mariadb => mysql(kind, params),
        BackendKind::Mssql => mssql(params),
        BackendKind::Oracle => oracle(params),
    }
}

/// Build the handler named by a selector string such as `"postgres"`
pub fn create_handler_from_name(name: &str, params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    create_handler(name.parse()?, params)
}

#[cfg(feature = "postgres")]
fn postgres(params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    use crate::storage::network::PostgresDatabaseHandler;
    let dsn = params.require_dsn(BackendKind::Postgresql)?;
    Ok(Box::new(PostgresDatabaseHandler::connect(dsn, params.table(), params.id_field())?))
}

#[cfg(not(feature = "postgres"))]
fn postgres(_params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    Err(feature_disabled(BackendKind::Postgresql, "postgres"))
}

#[cfg(feature = "mysql")]
fn mysql(kind: BackendKind, params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    use crate::storage::network::MySqlDatabaseHandler;
    let dsn = params.require_dsn(kind)?;
    let handler = match kind {
        BackendKind::Mariadb => MySqlDatabaseHandler::mariadb(dsn, params.table(), params.id_field())?,
        _ => MySqlDatabaseHandler::mysql(dsn, params.table(), params.id_field())?,
    };
    Ok(Box::new(handler))
}

#[cfg(not(feature = "mysql"))]
fn mysql(kind: BackendKind, _params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    Err(feature_disabled(kind, "mysql"))
}

#[cfg(feature = "mssql")]
fn mssql(params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    use crate::storage::network::MssqlDatabaseHandler;
    let dsn = params.require_dsn(BackendKind::Mssql)?;
    Ok(Box::new(MssqlDatabaseHandler::connect(dsn, params.table(), params.id_field())?))
}

#[cfg(not(feature = "mssql"))]
fn mssql(_params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    Err(feature_disabled(BackendKind::Mssql, "mssql"))
}

#[cfg(feature = "oracle")]
fn oracle(params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    use crate::storage::network::OracleDatabaseHandler;
    let dsn = params.require_dsn(BackendKind::Oracle)?;
    Ok(Box::new(OracleDatabaseHandler::connect(
        dsn,
        params.user.as_deref(),
        params.password.as_deref(),
        params.table(),
        params.id_field(),
    )?))
}

#[cfg(not(feature = "oracle"))]
fn oracle(_params: &BackendParams) -> StorageResult<Box<dyn DatabaseHandler>> {
    Err(feature_disabled(BackendKind::Oracle, "oracle"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::{assert_contract, TestEnvironment};

    fn expect_err(result: StorageResult<Box<dyn DatabaseHandler>>) -> StorageError {
        match result {
            Ok(handler) => panic!("expected an error, got a {} handler", handler.kind()),
            Err(e) => e,
        }
    }

    #[test]
    fn test_file_backends_by_name() {
        let env = TestEnvironment::new();
        for (name, file) in [("csv", "r.csv"), ("JSON", "r.json"), (" sqlite ", "r.db")] {
            let handler = create_handler_from_name(name, &BackendParams::file(env.path(file))).unwrap();
            assert_eq!(handler.kind().as_str(), name.trim().to_lowercase());
            assert_contract(handler.as_ref());
        }
    }

    #[test]
    fn test_custom_id_field_reaches_handler() {
        let env = TestEnvironment::new();
        let params = BackendParams {
            id_field: Some("key".to_string()),
            ..BackendParams::file(env.path("r.json"))
        };
        let handler = create_handler(BackendKind::Json, &params).unwrap();
        assert_eq!(handler.id_field(), "key");
    }

    #[test]
    fn test_unknown_name_lists_supported_backends() {
        let err = expect_err(create_handler_from_name("mongodb", &BackendParams::default()));
        match &err {
            StorageError::UnsupportedBackend { requested, supported } => {
                assert_eq!(requested, "mongodb");
                assert_eq!(supported, &BackendKind::supported());
            }
            other => panic!("expected UnsupportedBackend, got {}", other),
        }
        let message = err.to_string();
        for name in BackendKind::supported() {
            assert!(message.contains(name), "{} missing from {}", name, message);
        }
    }

    #[test]
    fn test_file_backend_without_path_is_invalid_config() {
        let err = expect_err(create_handler(BackendKind::Csv, &BackendParams::default()));
        assert!(matches!(err, StorageError::InvalidConfig { backend: BackendKind::Csv, .. }));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_networked_backend_without_dsn_is_invalid_config() {
        let err = expect_err(create_handler(BackendKind::Postgresql, &BackendParams::dsn("  ")));
        assert!(matches!(err, StorageError::InvalidConfig { backend: BackendKind::Postgresql, .. }));
    }

    #[cfg(not(feature = "mssql"))]
    #[test]
    fn test_disabled_driver_is_dependency_missing() {
        let err = expect_err(create_handler_from_name("mssql", &BackendParams::dsn("mssql://sa@db/master")));
        assert!(matches!(err, StorageError::DependencyMissing { backend: BackendKind::Mssql, .. }));
        assert!(err.to_string().contains("mssql"));
    }

    #[test]
    fn test_params_debug_hides_secrets() {
        let params = BackendParams {
            password: Some("hunter2".to_string()),
            ..BackendParams::dsn("postgresql://u:hunter2@db/app")
        };
        assert!(!format!("{:?}", params).contains("hunter2"));
    }
}
