//! Whisper transcription through an OpenAI-compatible audio endpoint.

use super::{vocabulary_hint, AudioClip, Transcriber};
use crate::config::{Prompts, Settings};
use crate::domains::DomainProfile;
use crate::error::{LogbookError, Result};
use crate::openai::ModelClient;
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: ModelClient,
    model: String,
    language: Option<String>,
    prompts: Prompts,
    temp_dir: PathBuf,
    timeout: Duration,
    /// One spool file at a time.
    spool: Mutex<()>,
}

impl WhisperTranscriber {
    /// Create a transcriber from settings.
    pub fn new(client: ModelClient, settings: &Settings, prompts: Prompts) -> Self {
        Self {
            client,
            model: settings.transcription.model.clone(),
            language: settings
                .transcription
                .language
                .as_deref()
                .map(str::trim)
                .filter(|lang| !lang.is_empty())
                .map(str::to_string),
            prompts,
            temp_dir: settings.temp_dir(),
            timeout: Duration::from_secs(settings.transcription.timeout_seconds),
            spool: Mutex::new(()),
        }
    }

    /// Write the clip to a fresh temp file. The file is removed when the handle drops.
    fn spool_clip(&self, clip: &AudioClip) -> Result<tempfile::NamedTempFile> {
        std::fs::create_dir_all(&self.temp_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("capture-")
            .suffix(&format!(".{}", clip.format().extension()))
            .tempfile_in(&self.temp_dir)?;
        file.write_all(clip.bytes())?;
        file.flush()?;
        Ok(file)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self, clip, profile), fields(domain = %profile.id, bytes = clip.len()))]
    async fn transcribe(&self, clip: &AudioClip, profile: &DomainProfile) -> Result<String> {
        let _slot = self.spool.lock().await;
        let spool = self
            .spool_clip(clip)
            .map_err(|e| LogbookError::Transcription(format!("Failed to spool audio: {}", e)))?;
        debug!("Spooled audio to {}", spool.path().display());

        let hint = vocabulary_hint(&self.prompts, profile);

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(spool.path())
            .model(&self.model)
            .prompt(hint)
            .response_format(AudioResponseFormat::Json);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| LogbookError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, self.client.audio().transcribe(request))
            .await
            .map_err(|_| {
                LogbookError::Transcription(format!(
                    "speech service did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| LogbookError::Transcription(format!("Whisper API error: {}", e)))?;

        let text = response.text.trim().to_string();
        info!("Transcribed {} characters with {}", text.chars().count(), self.model);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::create_client_with_key;
    use tempfile::TempDir;

    fn transcriber(temp: &TempDir, timeout: Duration) -> WhisperTranscriber {
        let mut settings = Settings::default();
        settings.general.temp_dir = temp.path().join("spool").to_string_lossy().to_string();
        settings.transcription.timeout_seconds = timeout.as_secs();
        // Nothing listens on the discard port, so every call fails fast.
        let client = create_client_with_key("http://127.0.0.1:9/v1", "test", Duration::from_secs(2)).unwrap();
        WhisperTranscriber::new(client, &settings, Prompts::default())
    }

    fn ogg_clip() -> AudioClip {
        let mut bytes = b"OggS".to_vec();
        bytes.extend_from_slice(&[0u8; 60]);
        AudioClip::new(bytes).unwrap()
    }

    #[test]
    fn test_spool_uses_format_suffix() {
        let temp = TempDir::new().unwrap();
        let transcriber = transcriber(&temp, Duration::from_secs(5));
        let spool = transcriber.spool_clip(&ogg_clip()).unwrap();
        let path = spool.path().to_path_buf();
        assert!(path.to_string_lossy().ends_with(".ogg"));
        assert!(path.exists());
        drop(spool);
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_language_sends_no_hint() {
        let temp = TempDir::new().unwrap();
        let client = create_client_with_key("http://127.0.0.1:9/v1", "test", Duration::from_secs(2)).unwrap();
        let mut settings = Settings::default();
        settings.general.temp_dir = temp.path().to_string_lossy().to_string();

        settings.transcription.language = Some("  ".to_string());
        let blank = WhisperTranscriber::new(client.clone(), &settings, Prompts::default());
        assert_eq!(blank.language, None);

        settings.transcription.language = Some("de".to_string());
        let german = WhisperTranscriber::new(client, &settings, Prompts::default());
        assert_eq!(german.language.as_deref(), Some("de"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transcription_error_and_spool_is_released() {
        let temp = TempDir::new().unwrap();
        let transcriber = transcriber(&temp, Duration::from_secs(5));
        let profile = DomainProfile::new("Elektro", &["NYM-J"], "Du bist Elektriker.");

        let err = transcriber.transcribe(&ogg_clip(), &profile).await.unwrap_err();
        assert!(matches!(err, LogbookError::Transcription(_)));
        assert!(err.is_retryable());

        let leftovers = std::fs::read_dir(temp.path().join("spool")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
