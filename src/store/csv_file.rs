//! Append-only CSV file store.

use super::{RecordStore, StoreRow};
use crate::error::{LogbookError, Result};
use crate::record::LogEntry;
use async_trait::async_trait;
use chrono::Local;
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, instrument};

/// CSV file store. The header is written once, when the file is created.
pub struct CsvStore {
    path: PathBuf,
    delimiter: u8,
    write_lock: Mutex<()>,
}

impl CsvStore {
    /// Create a store for `path`. The delimiter must be a single ASCII character.
    pub fn new(path: PathBuf, delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() {
            return Err(LogbookError::Config(format!(
                "CSV delimiter must be ASCII, got '{}'",
                delimiter
            )));
        }
        Ok(Self {
            path,
            delimiter: delimiter as u8,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one row, creating the file and its directory if needed.
    pub fn append_row(&self, row: &StoreRow) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LogbookError::Store("CSV writer lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let is_new = std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    /// Read every row back, in insertion order. A missing file has no rows.
    pub fn read_rows(&self) -> Result<Vec<StoreRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_path(&self.path)?;

        let mut rows = Vec::new();
        for result in reader.deserialize() {
            rows.push(result?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl RecordStore for CsvStore {
    #[instrument(skip(self, entry), fields(path = %self.path.display()))]
    async fn append(&self, entry: &LogEntry, domain_id: &str) -> Result<()> {
        let row = StoreRow::from_entry(entry, domain_id, Local::now());
        self.append_row(&row).map_err(|e| match e {
            LogbookError::Store(_) => e,
            other => LogbookError::Store(format!("Failed to write {}: {}", self.path.display(), other)),
        })?;
        debug!("Appended row for {}", domain_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}
