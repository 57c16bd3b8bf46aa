//! Transcription module for Logbook.
//!
//! Sends a recorded report plus the trade's vocabulary hints to a hosted
//! speech-to-text model and returns the plain transcript.

mod whisper;

pub use whisper::WhisperTranscriber;

use crate::config::Prompts;
use crate::domains::DomainProfile;
use crate::error::{LogbookError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a recorded clip, biased towards the profile's vocabulary.
    async fn transcribe(&self, clip: &AudioClip, profile: &DomainProfile) -> Result<String>;
}

/// Audio containers the speech service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
    Flac,
    M4a,
    Webm,
}

impl AudioFormat {
    /// Detect the container from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(AudioFormat::Wav),
            [b'I', b'D', b'3', ..] => Some(AudioFormat::Mp3),
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Some(AudioFormat::Mp3),
            [b'O', b'g', b'g', b'S', ..] => Some(AudioFormat::Ogg),
            [b'f', b'L', b'a', b'C', ..] => Some(AudioFormat::Flac),
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some(AudioFormat::M4a),
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// File extension the service uses to pick a decoder.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::M4a => "m4a",
            AudioFormat::Webm => "webm",
        }
    }
}

/// A non-empty recording in a supported container.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    bytes: Vec<u8>,
    format: AudioFormat,
}

impl AudioClip {
    /// Validate raw bytes from the capture widget.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(LogbookError::Transcription("recording is empty".to_string()));
        }
        let format = AudioFormat::detect(&bytes).ok_or_else(|| {
            LogbookError::Transcription(format!(
                "unsupported audio format ({} bytes, header {:02x?})",
                bytes.len(),
                &bytes[..bytes.len().min(8)]
            ))
        })?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Render the vocabulary hint sent along with the audio.
pub fn vocabulary_hint(prompts: &Prompts, profile: &DomainProfile) -> String {
    let mut vars = HashMap::new();
    vars.insert("domain".to_string(), profile.id.clone());
    vars.insert("keywords".to_string(), profile.keywords());
    prompts.render_with_custom(&prompts.transcription.hint, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::DomainTable;

    fn wav_header() -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&36u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes
    }

    #[test]
    fn test_detect_formats() {
        assert_eq!(AudioFormat::detect(&wav_header()), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::detect(b"ID3\x04\x00"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::detect(&[0xFF, 0xFB, 0x90, 0x00]), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::detect(b"OggS\x00\x02"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::detect(b"fLaC\x00"), Some(AudioFormat::Flac));
        assert_eq!(AudioFormat::detect(b"\x00\x00\x00\x20ftypM4A "), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::detect(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), Some(AudioFormat::Webm));
        assert_eq!(AudioFormat::detect(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_empty_clip_is_rejected() {
        match AudioClip::new(Vec::new()) {
            Err(LogbookError::Transcription(msg)) => assert!(msg.contains("empty")),
            other => panic!("expected transcription error, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_clip_is_rejected() {
        assert!(matches!(
            AudioClip::new(b"hello world".to_vec()),
            Err(LogbookError::Transcription(_))
        ));
    }

    #[test]
    fn test_vocabulary_hint() {
        let table = DomainTable::builtin();
        let profile = table.lookup("Trockenbau").unwrap();
        let hint = vocabulary_hint(&Prompts::default(), profile);
        assert!(hint.starts_with("Hier ist ein Bericht aus dem Bereich Trockenbau."));
        assert!(hint.contains("Gipskarton, Ständerwerk"));
    }
}
