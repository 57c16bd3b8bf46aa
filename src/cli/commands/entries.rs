//! Entries command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Settings, StoreBackend};
use crate::store::CsvStore;
use anyhow::Result;

/// Show the most recent rows of the CSV logbook.
pub fn run_entries(limit: usize, settings: &Settings) -> Result<()> {
    preflight::check(Operation::Entries, settings)?;

    if settings.store.backend != StoreBackend::Csv {
        Output::warning(&format!(
            "The active store is '{}'; showing the local CSV file instead.",
            settings.store.backend
        ));
    }

    let store = CsvStore::new(settings.csv_path(), settings.store.csv_delimiter)?;
    let rows = store.read_rows()?;

    if rows.is_empty() {
        Output::info(&format!("No entries in {}", store.path().display()));
        return Ok(());
    }

    let skip = rows.len().saturating_sub(limit);
    Output::header(&format!("Logbook ({} of {} entries)", rows.len() - skip, rows.len()));
    for row in &rows[skip..] {
        Output::row(row);
    }

    Ok(())
}
