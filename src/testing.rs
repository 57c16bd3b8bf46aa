//! Scripted stand-ins for the external services, used by unit tests.

use crate::domains::DomainProfile;
use crate::error::{LogbookError, Result};
use crate::extraction::{JsonModel, JsonRequest};
use crate::record::LogEntry;
use crate::store::RecordStore;
use crate::transcription::{AudioClip, Transcriber};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Chat model that replays canned responses in order.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    repeat: Option<String>,
    requests: Mutex<Vec<JsonRequest>>,
    /// Calls from this index on wait before answering.
    slow_from: Option<(usize, Duration)>,
}

impl ScriptedModel {
    /// `Err` entries are returned as transport failures.
    pub fn new(responses: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            slow_from: None,
        }
    }

    /// Always answers with the same response.
    pub fn repeating(response: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response.to_string()),
            requests: Mutex::new(Vec::new()),
            slow_from: None,
        }
    }

    /// Delay every call from the `call`-th (0-based) on by `delay`.
    pub fn slow_from(mut self, call: usize, delay: Duration) -> Self {
        self.slow_from = Some((call, delay));
        self
    }

    pub fn requests(&self) -> Vec<JsonRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl JsonModel for ScriptedModel {
    async fn complete_json(&self, request: &JsonRequest) -> Result<String> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        if let Some((from, delay)) = self.slow_from {
            if call >= from {
                tokio::time::sleep(delay).await;
            }
        }
        if let Some(response) = &self.repeat {
            return Ok(response.clone());
        }
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(msg)) => Err(LogbookError::OpenAI(msg)),
            None => Err(LogbookError::OpenAI("script exhausted".to_string())),
        }
    }
}

/// Transcriber that replays canned transcripts in order.
pub struct ScriptedTranscriber {
    transcripts: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTranscriber {
    pub fn new(transcripts: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Domain ids of every call so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _clip: &AudioClip, profile: &DomainProfile) -> Result<String> {
        self.calls.lock().unwrap().push(profile.id.clone());
        match self.transcripts.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(LogbookError::Transcription(msg)),
            None => Err(LogbookError::Transcription("script exhausted".to_string())),
        }
    }
}

/// Store whose every append fails.
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn append(&self, _entry: &LogEntry, _domain_id: &str) -> Result<()> {
        Err(LogbookError::Store("spreadsheet unreachable".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A minimal valid WAV header.
pub fn wav_bytes() -> Vec<u8> {
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&36u32.to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&[0u8; 24]);
    bytes
}
