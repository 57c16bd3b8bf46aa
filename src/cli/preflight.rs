//! Pre-flight checks before talking to external services.
//!
//! Validates configuration up front so a worker never records a report that
//! cannot be processed or saved.

use crate::config::{Settings, StoreBackend};
use crate::error::{LogbookError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Recording needs the model API and a writable store.
    Record,
    /// The form backend needs the same as recording.
    Serve,
    /// Reading entries back needs nothing external.
    Entries,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Record | Operation::Serve => {
            check_api_key(settings)?;
            check_store(settings)?;
        }
        Operation::Entries => {}
    }
    Ok(())
}

/// The model API key must be present before anything else runs.
fn check_api_key(settings: &Settings) -> Result<()> {
    settings.provider.api_key().map(|_| ())
}

fn check_store(settings: &Settings) -> Result<()> {
    match settings.store.backend {
        StoreBackend::Csv => {
            if !settings.store.csv_delimiter.is_ascii() {
                return Err(LogbookError::Config(
                    "store.csv_delimiter must be a single ASCII character".to_string(),
                ));
            }
        }
        StoreBackend::Sheets => {
            let sheets = &settings.store.sheets;
            if sheets.spreadsheet_id.trim().is_empty() {
                return Err(LogbookError::Config(
                    "store.sheets.spreadsheet_id is not set".to_string(),
                ));
            }
            match std::env::var(&sheets.token_env) {
                Ok(token) if !token.trim().is_empty() => {}
                _ => {
                    return Err(LogbookError::Config(format!(
                        "{} not set. Set it with: export {}='ya29...'",
                        sheets.token_env, sheets.token_env
                    )))
                }
            }
        }
        StoreBackend::Memory => {}
    }
    Ok(())
}
