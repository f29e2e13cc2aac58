use anyhow::Result;
use csv::{Reader, Writer};
use log::{debug, info};
use serde_json::Value;
use shared::{ensure_id, merge_update, record_id, Record, DEFAULT_ID_FIELD};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{OperationContext, StorageResult};
use crate::storage::files::{copy_file, ensure_parent_dir, rewrite_atomically};
use crate::storage::kind::{BackendKind, Operation};
use crate::storage::traits::DatabaseHandler;

const KIND: BackendKind = BackendKind::Csv;

/// CSV-file storage for development and testing
#[derive(Debug, Clone)]
pub struct CsvDatabaseHandler {
    file_path: PathBuf,
    id_field: String,
}

/// Flatten a value into a single CSV cell
fn to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl CsvDatabaseHandler {
    /// Open (or create empty) the CSV store at `file_path`
    pub fn new<P: AsRef<Path>>(file_path: P) -> StorageResult<Self> {
        Self::with_id_field(file_path, DEFAULT_ID_FIELD)
    }

    /// Open the store using a custom identifier column
    pub fn with_id_field<P: AsRef<Path>>(file_path: P, id_field: impl Into<String>) -> StorageResult<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        ensure_parent_dir(&file_path).during(KIND, Operation::Open)?;

        if !file_path.exists() {
            fs::write(&file_path, "").during(KIND, Operation::Open)?;
            info!("Initialized empty CSV store at {}", file_path.display());
        }

        Ok(Self {
            file_path,
            id_field: id_field.into(),
        })
    }

    /// Location of the backing file
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Load every row; every header column becomes a string field
    fn read_all(&self) -> Result<Vec<Record>> {
        if !self.file_path.exists() || fs::metadata(&self.file_path)?.len() == 0 {
            return Ok(Vec::new());
        }

        let file = File::open(&self.file_path)?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));
        let headers = csv_reader.headers()?.clone();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let row = result?;
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .map(|(name, cell)| (name.to_string(), Value::String(cell.to_string())))
                .collect();
            rows.push(record);
        }
        Ok(rows)
    }

    /// Rewrite the whole file with a header computed from all rows
    fn write_all(&self, rows: &[Record]) -> Result<()> {
        if rows.is_empty() {
            return rewrite_atomically(&self.file_path, |_| Ok(()));
        }

        let columns: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();

        rewrite_atomically(&self.file_path, |writer| {
            let mut csv_writer = Writer::from_writer(writer);
            csv_writer.write_record(&columns)?;
            for row in rows {
                csv_writer.write_record(
                    columns
                        .iter()
                        .map(|column| row.get(*column).map(to_cell).unwrap_or_default()),
                )?;
            }
            csv_writer.flush()?;
            Ok(())
        })
    }

    fn position_of(&self, rows: &[Record], id: &str) -> Option<usize> {
        rows.iter()
            .position(|row| record_id(row, &self.id_field).as_deref() == Some(id))
    }
}

impl DatabaseHandler for CsvDatabaseHandler {
    fn kind(&self) -> BackendKind {
        KIND
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn create(&self, record: Record) -> StorageResult<String> {
        let record = ensure_id(record, &self.id_field);
        let id = record_id(&record, &self.id_field).unwrap_or_default();

        let mut rows = self.read_all().during(KIND, Operation::Create)?;
        match self.position_of(&rows, &id) {
            Some(index) => rows[index] = record,
            None => rows.push(record),
        }
        self.write_all(&rows).during(KIND, Operation::Create)?;

        debug!("Stored record {} in {}", id, self.file_path.display());
        Ok(id)
    }

    fn read(&self, id: &str) -> StorageResult<Option<Record>> {
        let mut rows = self.read_all().during(KIND, Operation::Read)?;
        Ok(self.position_of(&rows, id).map(|index| rows.swap_remove(index)))
    }

    fn update(&self, id: &str, updates: &Record) -> StorageResult<Option<Record>> {
        let mut rows = self.read_all().during(KIND, Operation::Update)?;
        let Some(index) = self.position_of(&rows, id) else {
            debug!("Record {} not found for update", id);
            return Ok(None);
        };

        let merged = merge_update(rows[index].clone(), updates, &self.id_field, id);
        rows[index] = merged.clone();
        self.write_all(&rows).during(KIND, Operation::Update)?;

        Ok(Some(merged))
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        let mut rows = self.read_all().during(KIND, Operation::Delete)?;
        let initial_len = rows.len();
        rows.retain(|row| record_id(row, &self.id_field).as_deref() != Some(id));

        if rows.len() == initial_len {
            return Ok(false);
        }
        self.write_all(&rows).during(KIND, Operation::Delete)?;
        debug!("Deleted record {} from {}", id, self.file_path.display());
        Ok(true)
    }

    fn backup(&self, target: &Path) -> StorageResult<PathBuf> {
        let out = copy_file(&self.file_path, target).during(KIND, Operation::Backup)?;
        info!("Backed up {} to {}", self.file_path.display(), out.display());
        Ok(out)
    }
}
