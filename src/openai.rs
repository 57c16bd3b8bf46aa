//! Client for the hosted, OpenAI-compatible model API.

use crate::config::ProviderSettings;
use crate::error::{LogbookError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Shared client type for transcription and chat calls.
pub type ModelClient = Client<OpenAIConfig>;

/// Create a client for the configured provider.
///
/// Fails fast when the API key is missing so misconfiguration never reaches a session.
pub fn create_client(provider: &ProviderSettings) -> Result<ModelClient> {
    let api_key = provider.api_key()?;
    create_client_with_key(
        &provider.api_base,
        &api_key,
        Duration::from_secs(provider.request_timeout_seconds),
    )
}

/// Create a client with an explicit key and HTTP timeout.
pub fn create_client_with_key(api_base: &str, api_key: &str, timeout: Duration) -> Result<ModelClient> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LogbookError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let config = OpenAIConfig::new()
        .with_api_base(api_base)
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}
