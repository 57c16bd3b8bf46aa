//! Record store abstraction for Logbook.
//!
//! Confirmed log entries are appended as flat rows to a CSV file or a remote
//! spreadsheet. Stores never rewrite or deduplicate rows.

mod csv_file;
mod memory;
mod sheets;

pub use csv_file::CsvStore;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;

use crate::config::{Settings, StoreBackend};
use crate::error::Result;
use crate::record::{format_quantity, LogEntry, RecordStatus};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Format of the Date column.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Trait for record store backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append one row for a confirmed entry.
    async fn append(&self, entry: &LogEntry, domain_id: &str) -> Result<()>;

    /// Short backend name for logs and messages.
    fn name(&self) -> &str;
}

/// The persisted projection of a log entry.
///
/// The order request is never part of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Activity")]
    pub activity: String,
    #[serde(rename = "Hours")]
    pub hours: String,
    #[serde(rename = "MaterialSummary")]
    pub material_summary: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl StoreRow {
    pub fn from_entry(entry: &LogEntry, domain_id: &str, at: DateTime<Local>) -> Self {
        Self {
            date: at.format(DATE_FORMAT).to_string(),
            domain: domain_id.to_string(),
            activity: entry.activity.clone(),
            hours: entry.hours_worked.map(format_quantity).unwrap_or_default(),
            material_summary: entry.material_summary(),
            status: RecordStatus::Ok.to_string(),
        }
    }

    /// Cells in column order.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.domain.clone(),
            self.activity.clone(),
            self.hours.clone(),
            self.material_summary.clone(),
            self.status.clone(),
        ]
    }
}

/// Create the store configured in the settings.
pub fn create_store(settings: &Settings) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match settings.store.backend {
        StoreBackend::Csv => Arc::new(CsvStore::new(settings.csv_path(), settings.store.csv_delimiter)?),
        StoreBackend::Sheets => Arc::new(SheetsStore::new(&settings.store.sheets)?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::debug!("Using {} record store", store.name());
    Ok(store)
}
