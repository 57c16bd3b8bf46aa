//! Session workflow for Logbook.
//!
//! Drives a session through capture, extraction, clarification and save.
//! Every operation takes the session by `&mut`, so one session's phases never
//! overlap; callers that share sessions wrap each one in its own mutex.

use crate::config::{Prompts, Settings};
use crate::domains::{DomainProfile, DomainTable};
use crate::error::{LogbookError, Result};
use crate::extraction::{ChatJsonModel, ClarificationMerger, Extractor, JsonModel};
use crate::openai::create_client;
use crate::record::{ensure_saveable, LogEntry, Record};
use crate::session::{Phase, Session};
use crate::store::{create_store, RecordStore};
use crate::transcription::{AudioClip, Transcriber, WhisperTranscriber};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// The main orchestrator for logbook sessions.
pub struct Logbook {
    domains: DomainTable,
    transcriber: Arc<dyn Transcriber>,
    extractor: Extractor,
    merger: ClarificationMerger,
    store: Arc<dyn RecordStore>,
}

impl Logbook {
    /// Create a logbook from settings. Fails when the API key or the store is misconfigured.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let domains = DomainTable::with_overrides(&settings.domains)?;

        let client = create_client(&settings.provider)?;
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(WhisperTranscriber::new(client.clone(), settings, prompts.clone()));
        let model: Arc<dyn JsonModel> = Arc::new(ChatJsonModel::new(
            client,
            Duration::from_secs(settings.extraction.timeout_seconds),
        ));

        let store = create_store(settings)?;
        info!(
            "Logbook ready: {} domains, {} store, extraction with {}",
            domains.len(),
            store.name(),
            settings.extraction.model
        );

        Ok(Self::with_components(settings, prompts, domains, transcriber, model, store))
    }

    /// Create a logbook with custom components.
    pub fn with_components(
        settings: &Settings,
        prompts: Prompts,
        domains: DomainTable,
        transcriber: Arc<dyn Transcriber>,
        model: Arc<dyn JsonModel>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let extractor = Extractor::new(model.clone(), &settings.extraction, prompts.clone());
        let merger = ClarificationMerger::new(model, &settings.extraction, prompts);
        Self {
            domains,
            transcriber,
            extractor,
            merger,
            store,
        }
    }

    pub fn domains(&self) -> &DomainTable {
        &self.domains
    }

    /// The configured store.
    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    fn profile(&self, session: &Session) -> Result<&DomainProfile> {
        self.domains.lookup(session.domain_id())
    }

    /// Start a session for a domain.
    pub fn start_session(&self, domain_id: &str) -> Result<Session> {
        let profile = self.domains.lookup(domain_id)?;
        let session = Session::new(&profile.id);
        info!(session = %session.id(), domain = %profile.id, "Session started");
        Ok(session)
    }

    /// Attach recorded audio.
    ///
    /// Replaces audio that was not processed yet. Rejected while a record is
    /// pending: the worker has to save or discard it first.
    pub fn capture(&self, session: &mut Session, audio: Vec<u8>) -> Result<()> {
        match session.phase() {
            Phase::Idle | Phase::Captured(_) => {}
            other => {
                return Err(LogbookError::InvalidTransition(format!(
                    "cannot record while {}: save or discard the pending record first",
                    other.label()
                )))
            }
        }

        let clip = AudioClip::new(audio)?;
        session.set_transcript(None);
        session.transition(Phase::Captured(clip));
        Ok(())
    }

    /// Transcribe and extract the captured audio.
    ///
    /// On failure the session stays captured so processing can be retried.
    #[instrument(skip(self, session), fields(session = %session.id()))]
    pub async fn process(&self, session: &mut Session) -> Result<Record> {
        let clip = match session.phase() {
            Phase::Captured(clip) => clip.clone(),
            other => {
                return Err(LogbookError::InvalidTransition(format!(
                    "nothing to process while {}",
                    other.label()
                )))
            }
        };
        let profile = self.profile(session)?;

        let transcript = self.transcriber.transcribe(&clip, profile).await?;
        info!("Transcript: {}", transcript);
        let record = self.extractor.extract(&transcript, profile).await?;

        session.set_transcript(Some(transcript));
        session.transition(Phase::Extracted(record.clone()));
        Ok(record)
    }

    /// Capture and process in one step.
    pub async fn report(&self, session: &mut Session, audio: Vec<u8>) -> Result<Record> {
        self.capture(session, audio)?;
        self.process(session).await
    }

    /// Merge a typed clarification answer into the live record.
    ///
    /// A failed merge restores the previous record. If the returned future is
    /// dropped mid-merge the session stays clarifying with the previous record.
    #[instrument(skip(self, session, answer), fields(session = %session.id()))]
    pub async fn answer_text(&self, session: &mut Session, answer: &str) -> Result<Record> {
        let previous = match session.phase() {
            Phase::Extracted(record) | Phase::Clarifying(record) => record.clone(),
            other => {
                return Err(LogbookError::InvalidTransition(format!(
                    "no record to clarify while {}",
                    other.label()
                )))
            }
        };
        let profile = self.profile(session)?;

        session.transition(Phase::Clarifying(previous.clone()));
        match self.merger.merge(&previous, answer, profile).await {
            Ok(merged) => {
                session.transition(Phase::Extracted(merged.clone()));
                Ok(merged)
            }
            Err(e) => {
                warn!("Merge failed, keeping previous record: {}", e);
                session.transition(Phase::Extracted(previous));
                Err(e)
            }
        }
    }

    /// Transcribe a spoken clarification answer and merge it.
    pub async fn answer_audio(&self, session: &mut Session, audio: Vec<u8>) -> Result<Record> {
        if session.record().is_none() {
            return Err(LogbookError::InvalidTransition(format!(
                "no record to clarify while {}",
                session.phase().label()
            )));
        }
        let clip = AudioClip::new(audio)?;
        let profile = self.profile(session)?;
        let answer = self.transcriber.transcribe(&clip, profile).await?;
        info!("Answer transcript: {}", answer);
        self.answer_text(session, &answer).await
    }

    /// Persist the live record to the configured store.
    pub async fn save(&self, session: &mut Session) -> Result<LogEntry> {
        let store = self.store.clone();
        self.save_with(session, store.as_ref()).await
    }

    /// Persist the live record to `store`.
    ///
    /// The record is validated again first. On any failure the session keeps
    /// the identical record.
    #[instrument(skip(self, session, store), fields(session = %session.id(), store = store.name()))]
    pub async fn save_with(&self, session: &mut Session, store: &dyn RecordStore) -> Result<LogEntry> {
        let record = match session.phase() {
            Phase::Extracted(record) => record,
            other => {
                return Err(LogbookError::InvalidTransition(format!(
                    "nothing to save while {}",
                    other.label()
                )))
            }
        };
        ensure_saveable(record)?;

        let entry = record.log_entry.clone();
        if let Err(e) = store.append(&entry, session.domain_id()).await {
            warn!("Save to {} failed, record kept: {}", store.name(), e);
            return Err(e);
        }

        info!("Saved entry to {}", store.name());
        session.set_transcript(None);
        session.transition(Phase::Idle);
        Ok(entry)
    }

    /// Drop whatever the session holds. Returns whether anything was dropped.
    pub fn discard(&self, session: &mut Session) -> bool {
        let had_state = session.phase() != &Phase::Idle;
        session.set_transcript(None);
        if had_state {
            session.transition(Phase::Idle);
        }
        had_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MaterialLine, RecordStatus};
    use crate::store::MemoryStore;
    use crate::testing::{wav_bytes, FailingStore, ScriptedModel, ScriptedTranscriber};

    const INCOMPLETE: &str = r#"{
        "logbuch_eintrag": {"taetigkeit": "Kupferrohre verlegt", "arbeitszeit": null,
            "material_verbraucht": [{"artikel": "Kupferrohr 16 Zoll", "menge": 2, "einheit": "Stück"}]},
        "material_bestellung": null,
        "status": "RUECKFRAGE_NOETIG",
        "fehlende_infos": "Wie viele Stunden?"
    }"#;

    const COMPLETE: &str = r#"{
        "logbuch_eintrag": {"taetigkeit": "Kupferrohre verlegt", "arbeitszeit": 3,
            "material_verbraucht": [{"artikel": "Kupferrohr 16 Zoll", "menge": 2, "einheit": "Stück"}]},
        "material_bestellung": null,
        "status": "OK",
        "fehlende_infos": null
    }"#;

    struct Fixture {
        logbook: Logbook,
        transcriber: Arc<ScriptedTranscriber>,
        store: Arc<MemoryStore>,
    }

    fn fixture(transcripts: Vec<std::result::Result<String, String>>, responses: Vec<&str>) -> Fixture {
        let transcriber = Arc::new(ScriptedTranscriber::new(transcripts));
        let model = Arc::new(ScriptedModel::new(
            responses.into_iter().map(|r| Ok(r.to_string())).collect(),
        ));
        let store = Arc::new(MemoryStore::new());
        let logbook = Logbook::with_components(
            &Settings::default(),
            Prompts::default(),
            DomainTable::builtin(),
            transcriber.clone(),
            model,
            store.clone(),
        );
        Fixture {
            logbook,
            transcriber,
            store,
        }
    }

    fn said(text: &str) -> std::result::Result<String, String> {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn test_full_cycle_with_spoken_answer() {
        let f = fixture(
            vec![said("Zwei Kupferrohre verlegt, 16 Zoll"), said("drei Stunden gearbeitet")],
            vec![INCOMPLETE, COMPLETE],
        );
        let mut session = f.logbook.start_session("sanitär & heizung").unwrap();
        assert_eq!(session.domain_id(), "Sanitär & Heizung");

        let record = f.logbook.report(&mut session, wav_bytes()).await.unwrap();
        assert_eq!(record.status, RecordStatus::NeedsClarification);
        assert_eq!(session.transcript(), Some("Zwei Kupferrohre verlegt, 16 Zoll"));

        let merged = f.logbook.answer_audio(&mut session, wav_bytes()).await.unwrap();
        assert!(merged.is_ok());

        let saved = f.logbook.save(&mut session).await.unwrap();
        assert_eq!(saved.material_summary(), "2 Stück Kupferrohr 16 Zoll");
        assert_eq!(session.phase(), &Phase::Idle);

        let rows = f.store.entries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "Sanitär & Heizung");
        assert_eq!(rows[0].1.hours_worked, Some(3.0));
        assert_eq!(f.transcriber.calls(), vec!["Sanitär & Heizung"; 2]);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_identical_record() {
        let f = fixture(vec![said("Drei Stunden Kupferrohre verlegt")], vec![COMPLETE]);
        let mut session = f.logbook.start_session("Sanitär & Heizung").unwrap();
        let record = f.logbook.report(&mut session, wav_bytes()).await.unwrap();

        let err = f.logbook.save_with(&mut session, &FailingStore).await.unwrap_err();
        assert!(matches!(err, LogbookError::Store(_)));
        assert_eq!(session.phase(), &Phase::Extracted(record));

        // Switching to a working store afterwards succeeds.
        f.logbook.save(&mut session).await.unwrap();
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_record_cannot_be_saved() {
        let f = fixture(vec![said("Zwei Kupferrohre verlegt")], vec![INCOMPLETE]);
        let mut session = f.logbook.start_session("Sanitär & Heizung").unwrap();
        f.logbook.report(&mut session, wav_bytes()).await.unwrap();

        let err = f.logbook.save(&mut session).await.unwrap_err();
        assert!(matches!(err, LogbookError::Validation(_)));
        assert!(f.store.is_empty());
        assert_eq!(session.phase().label(), "extracted");
    }

    #[tokio::test]
    async fn test_new_capture_rejected_while_record_pending() {
        let f = fixture(vec![said("Zwei Kupferrohre verlegt")], vec![INCOMPLETE]);
        let mut session = f.logbook.start_session("Sanitär & Heizung").unwrap();
        let record = f.logbook.report(&mut session, wav_bytes()).await.unwrap();

        let err = f.logbook.capture(&mut session, wav_bytes()).unwrap_err();
        assert!(matches!(err, LogbookError::InvalidTransition(_)));
        assert_eq!(session.record(), Some(&record));

        assert!(f.logbook.discard(&mut session));
        f.logbook.capture(&mut session, wav_bytes()).unwrap();
        assert_eq!(session.phase().label(), "captured");
    }

    #[tokio::test]
    async fn test_transcription_failure_stays_captured() {
        let f = fixture(vec![Err("service unavailable".to_string())], vec![]);
        let mut session = f.logbook.start_session("Elektro").unwrap();

        let err = f.logbook.report(&mut session, wav_bytes()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.phase().label(), "captured");
    }

    #[tokio::test]
    async fn test_empty_audio_is_rejected_without_state_change() {
        let f = fixture(vec![], vec![]);
        let mut session = f.logbook.start_session("Elektro").unwrap();
        let err = f.logbook.capture(&mut session, Vec::new()).unwrap_err();
        assert!(matches!(err, LogbookError::Transcription(_)));
        assert_eq!(session.phase(), &Phase::Idle);
    }

    #[tokio::test]
    async fn test_merge_failure_restores_previous_record() {
        let f = fixture(vec![said("Zwei Kupferrohre verlegt")], vec![INCOMPLETE, "kein json"]);
        let mut session = f.logbook.start_session("Sanitär & Heizung").unwrap();
        let record = f.logbook.report(&mut session, wav_bytes()).await.unwrap();

        let err = f.logbook.answer_text(&mut session, "drei Stunden").await.unwrap_err();
        assert!(matches!(err, LogbookError::Merge(_)));
        assert_eq!(session.phase(), &Phase::Extracted(record));
    }

    #[tokio::test]
    async fn test_abandoned_merge_can_be_answered_again() {
        let f = fixture(vec![said("Zwei Kupferrohre verlegt")], vec![INCOMPLETE, COMPLETE]);
        let mut session = f.logbook.start_session("Sanitär & Heizung").unwrap();
        let record = f.logbook.report(&mut session, wav_bytes()).await.unwrap();

        session.transition(Phase::Clarifying(record));
        assert!(f.logbook.save(&mut session).await.is_err());

        let merged = f.logbook.answer_text(&mut session, "drei Stunden").await.unwrap();
        assert!(merged.is_ok());
        assert_eq!(
            merged.log_entry.materials_consumed,
            vec![MaterialLine::new("Kupferrohr 16 Zoll", 2.0, "Stück")]
        );
    }

    #[tokio::test]
    async fn test_discard_from_any_phase() {
        let f = fixture(vec![], vec![]);
        let mut session = f.logbook.start_session("Trockenbau").unwrap();
        assert!(!f.logbook.discard(&mut session));
        f.logbook.capture(&mut session, wav_bytes()).unwrap();
        assert!(f.logbook.discard(&mut session));
        assert_eq!(session.phase(), &Phase::Idle);
    }

    #[tokio::test]
    async fn test_unknown_domain() {
        let f = fixture(vec![], vec![]);
        assert!(matches!(
            f.logbook.start_session("Dachdecker"),
            Err(LogbookError::DomainNotFound(_))
        ));
    }
}
