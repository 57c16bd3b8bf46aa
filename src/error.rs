//! Error types for Logbook.

use thiserror::Error;

/// Library-level error type for Logbook operations.
#[derive(Error, Debug)]
pub enum LogbookError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown domain: {0}")]
    DomainNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Record is not ready to be saved: {0}")]
    Validation(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Model API error: {0}")]
    OpenAI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Coarse classification of errors as seen by the session workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal, blocks startup.
    Configuration,
    /// Speech-to-text turn failed; the user may re-record.
    Transcription,
    /// Extraction turn failed; the user may retry or re-record.
    Extraction,
    /// Merge turn failed; the previous record is retained.
    Merge,
    /// Persisting failed; the record stays live.
    Store,
    /// The requested action does not fit the current session state.
    Workflow,
    /// Anything else (local IO, serialization).
    Internal,
}

impl LogbookError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LogbookError::Config(_) | LogbookError::TomlParse(_) => ErrorKind::Configuration,
            LogbookError::Transcription(_) => ErrorKind::Transcription,
            LogbookError::Extraction(_) | LogbookError::OpenAI(_) => ErrorKind::Extraction,
            LogbookError::Merge(_) => ErrorKind::Merge,
            LogbookError::Store(_) | LogbookError::Csv(_) => ErrorKind::Store,
            LogbookError::DomainNotFound(_)
            | LogbookError::SessionNotFound(_)
            | LogbookError::Validation(_)
            | LogbookError::InvalidTransition(_) => ErrorKind::Workflow,
            LogbookError::Io(_) | LogbookError::Json(_) | LogbookError::Http(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the user may re-trigger the same phase after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transcription | ErrorKind::Extraction | ErrorKind::Merge | ErrorKind::Store
        )
    }
}

/// Result type alias for Logbook operations.
pub type Result<T> = std::result::Result<T, LogbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_turn_errors_are_retryable() {
        assert!(LogbookError::Transcription("timeout".into()).is_retryable());
        assert!(LogbookError::Extraction("bad json".into()).is_retryable());
        assert!(LogbookError::Merge("bad json".into()).is_retryable());
        assert!(LogbookError::Store("offline".into()).is_retryable());
    }

    #[test]
    fn test_configuration_is_fatal() {
        let err = LogbookError::Config("GROQ_API_KEY not set".into());
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retryable());
    }
}
