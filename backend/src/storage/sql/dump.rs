//! External dump-tool backups
//!
//! Runs a vendor dump utility with stdout redirected into the backup file.
//! Candidate tool names are tried in order; a candidate that is not installed
//! falls through to the next one.

use log::{info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{OperationContext, StorageError, StorageResult};
use crate::storage::files::ensure_parent_dir;
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::sql::dsn::ConnectionParams;

/// A dump-tool invocation, not yet run
#[derive(Debug, Clone)]
pub struct DumpCommand {
    backend: BackendKind,
    tools: Vec<String>,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl DumpCommand {
    /// `tools` lists the executable names to try, preferred first
    pub fn new<I, S>(backend: BackendKind, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backend,
            tools: tools.into_iter().map(Into::into).collect(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Value of an environment variable set for the child process
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Run the first available tool, writing its stdout to `target`.
    ///
    /// Fails with `BackupToolMissing` when no candidate is installed and with
    /// `BackupFailed` when the tool exits unsuccessfully.
    pub fn run_to(&self, target: &Path) -> StorageResult<PathBuf> {
        let backend = self.backend;
        ensure_parent_dir(target).during(backend, Operation::Backup)?;

        for tool in &self.tools {
            let output_file = File::create(target).during(backend, Operation::Backup)?;

            let result = Command::new(tool)
                .args(&self.args)
                .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .stdin(Stdio::null())
                .stdout(Stdio::from(output_file))
                .stderr(Stdio::piped())
                .output();

            match result {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!("{} backup: {} not found, trying next candidate", backend, tool);
                }
                Err(e) => {
                    return Err(StorageError::backend(
                        backend,
                        Operation::Backup,
                        anyhow::Error::new(e).context(format!("running {}", tool)),
                    ));
                }
                Ok(output) if output.status.success() => {
                    info!("{} backup written by {} to {}", backend, tool, target.display());
                    return Ok(target.to_path_buf());
                }
                Ok(output) => {
                    return Err(StorageError::BackupFailed {
                        backend,
                        tool: tool.clone(),
                        code: output.status.code(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    });
                }
            }
        }

        // Nothing ran, so the file we opened for stdout is empty
        if let Err(e) = fs::remove_file(target) {
            warn!("Could not remove empty backup file {}: {}", target.display(), e);
        }
        Err(StorageError::BackupToolMissing {
            backend,
            tried: self.tools.clone(),
        })
    }
}

/// `pg_dump` invocation for a PostgreSQL database
#[cfg(any(feature = "postgres", test))]
pub fn pg_dump(params: &ConnectionParams) -> DumpCommand {
    let mut command = DumpCommand::new(BackendKind::Postgresql, ["pg_dump"])
        .arg("-h")
        .arg(&params.host)
        .arg("-p")
        .arg(params.port.to_string())
        .arg("-U")
        .arg(&params.user)
        .arg("--no-password")
        .arg(&params.database);
    if !params.password.is_empty() {
        command = command.env("PGPASSWORD", &params.password);
    }
    command
}

/// `mysqldump`/`mariadb-dump` invocation; the two tools accept the same flags
#[cfg(any(feature = "mysql", test))]
pub fn mysql_dump(backend: BackendKind, params: &ConnectionParams) -> DumpCommand {
    let tools = match backend {
        BackendKind::Mariadb => ["mariadb-dump", "mysqldump"],
        _ => ["mysqldump", "mariadb-dump"],
    };
    let mut command = DumpCommand::new(backend, tools)
        .arg("-h")
        .arg(&params.host)
        .arg("-P")
        .arg(params.port.to_string())
        .arg("-u")
        .arg(&params.user)
        .arg(&params.database);
    if !params.password.is_empty() {
        command = command.env("MYSQL_PWD", &params.password);
    }
    command
}
