//! Per-worker session state.

use crate::record::Record;
use crate::transcription::AudioClip;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Where a session stands in the capture, extract, clarify, save cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    /// Audio recorded, not yet processed.
    Captured(AudioClip),
    /// A live record waiting to be saved, corrected or discarded.
    Extracted(Record),
    /// A clarification answer is being merged into the held record.
    Clarifying(Record),
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Captured(_) => "captured",
            Phase::Extracted(_) => "extracted",
            Phase::Clarifying(_) => "clarifying",
        }
    }

    /// The live record, if any.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Phase::Extracted(record) | Phase::Clarifying(record) => Some(record),
            _ => None,
        }
    }
}

/// One worker's session. Holds at most one live record.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    domain_id: String,
    phase: Phase,
    transcript: Option<String>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(domain_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain_id: domain_id.to_string(),
            phase: Phase::Idle,
            transcript: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn record(&self) -> Option<&Record> {
        self.phase.record()
    }

    /// Transcript of the last processed report.
    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub(crate) fn set_transcript(&mut self, transcript: Option<String>) {
        self.transcript = transcript;
    }

    /// Move to `next`, logging the transition.
    pub(crate) fn transition(&mut self, next: Phase) {
        tracing::info!(
            session = %self.id,
            from = self.phase.label(),
            to = next.label(),
            "Session transition"
        );
        self.phase = next;
    }

    /// Serializable view for front ends.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            domain: self.domain_id.clone(),
            phase: self.phase.label(),
            record: self.record().cloned(),
            transcript: self.transcript.clone(),
            created_at: self.created_at,
        }
    }
}

/// Snapshot of a session as shown to a front end.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub domain: String,
    pub phase: &'static str,
    pub record: Option<Record>,
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
}
