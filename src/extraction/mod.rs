//! Extraction module for Logbook.
//!
//! Turns transcripts into records and merges clarification answers into them
//! through a chat model running in JSON mode.

mod extractor;
mod merger;

pub use extractor::Extractor;
pub use merger::ClarificationMerger;

use crate::error::{LogbookError, Result};
use crate::openai::ModelClient;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// One JSON-mode completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Trait for chat models that answer with a single JSON object.
#[async_trait]
pub trait JsonModel: Send + Sync {
    /// Return the raw response text. Errors are transport failures only.
    async fn complete_json(&self, request: &JsonRequest) -> Result<String>;
}

/// JSON-mode chat completions against the configured provider.
pub struct ChatJsonModel {
    client: ModelClient,
    timeout: Duration,
}

impl ChatJsonModel {
    pub fn new(client: ModelClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl JsonModel for ChatJsonModel {
    async fn complete_json(&self, request: &JsonRequest) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| LogbookError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user.clone())
                .build()
                .map_err(|e| LogbookError::OpenAI(e.to_string()))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(request.temperature)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| LogbookError::OpenAI(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(chat_request))
            .await
            .map_err(|_| {
                LogbookError::OpenAI(format!(
                    "language model did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| LogbookError::OpenAI(format!("Chat completion error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LogbookError::OpenAI("Empty response from language model".to_string()))?;

        debug!("Model {} answered with {} bytes", request.model, content.len());
        Ok(content)
    }
}
