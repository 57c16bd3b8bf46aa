//! Google Sheets store using the v4 `values:append` endpoint.

use super::{RecordStore, StoreRow};
use crate::config::SheetsSettings;
use crate::error::{LogbookError, Result};
use crate::record::LogEntry;
use async_trait::async_trait;
use chrono::Local;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Remote spreadsheet store. Rows use the same column order as the CSV file.
pub struct SheetsStore {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl SheetsStore {
    /// Create a store, reading the bearer token from the configured environment variable.
    pub fn new(settings: &SheetsSettings) -> Result<Self> {
        if settings.spreadsheet_id.trim().is_empty() {
            return Err(LogbookError::Config(
                "store.sheets.spreadsheet_id is not set".to_string(),
            ));
        }
        let token = std::env::var(&settings.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                LogbookError::Config(format!(
                    "{} is not set. Export an OAuth access token for the Sheets API.",
                    settings.token_env
                ))
            })?;
        Self::with_token(settings, &token)
    }

    pub fn with_token(settings: &SheetsSettings, token: &str) -> Result<Self> {
        let endpoint = append_endpoint(settings)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| LogbookError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// `{api_base}/v4/spreadsheets/{id}/values/{range}:append?...`
fn append_endpoint(settings: &SheetsSettings) -> Result<Url> {
    let mut url = Url::parse(&settings.api_base)
        .map_err(|e| LogbookError::Config(format!("Invalid Sheets API base '{}': {}", settings.api_base, e)))?;

    url.path_segments_mut()
        .map_err(|_| LogbookError::Config(format!("Invalid Sheets API base '{}'", settings.api_base)))?
        .pop_if_empty()
        .extend([
            "v4",
            "spreadsheets",
            settings.spreadsheet_id.trim(),
            "values",
            format!("{}:append", settings.range).as_str(),
        ]);

    url.query_pairs_mut()
        .append_pair("valueInputOption", "USER_ENTERED")
        .append_pair("insertDataOption", "INSERT_ROWS");

    Ok(url)
}

#[async_trait]
impl RecordStore for SheetsStore {
    #[instrument(skip(self, entry))]
    async fn append(&self, entry: &LogEntry, domain_id: &str) -> Result<()> {
        let row = StoreRow::from_entry(entry, domain_id, Local::now());
        let body = serde_json::json!({ "values": [row.cells()] });

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LogbookError::Store(format!("Sheets request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LogbookError::Store(format!(
                "Sheets API returned {}: {}",
                status,
                text.trim()
            )));
        }

        debug!("Appended row to spreadsheet");
        Ok(())
    }

    fn name(&self) -> &str {
        "sheets"
    }
}
