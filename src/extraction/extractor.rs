//! First turn: transcript to record.

use super::{JsonModel, JsonRequest};
use crate::config::{ExtractionSettings, Prompts};
use crate::domains::DomainProfile;
use crate::error::{LogbookError, Result};
use crate::record::{finalize, Record};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Extracts a record from a transcript.
pub struct Extractor {
    model: Arc<dyn JsonModel>,
    model_name: String,
    temperature: f32,
    prompts: Prompts,
}

impl Extractor {
    pub fn new(model: Arc<dyn JsonModel>, settings: &ExtractionSettings, prompts: Prompts) -> Self {
        Self {
            model,
            model_name: settings.model.clone(),
            temperature: settings.temperature,
            prompts,
        }
    }

    /// Build the request for a transcript.
    pub fn request(&self, transcript: &str, profile: &DomainProfile) -> JsonRequest {
        let mut vars = HashMap::new();
        vars.insert("persona".to_string(), profile.persona_prompt.clone());
        vars.insert("domain".to_string(), profile.id.clone());
        vars.insert("keywords".to_string(), profile.keywords());
        vars.insert("transcript".to_string(), transcript.to_string());

        JsonRequest {
            model: self.model_name.clone(),
            system: self.prompts.render_with_custom(&self.prompts.extraction.system, &vars),
            user: self.prompts.render_with_custom(&self.prompts.extraction.user, &vars),
            temperature: self.temperature,
        }
    }

    /// Extract a record. Incomplete data is a record with status NEEDS_CLARIFICATION, not an error.
    #[instrument(skip(self, transcript, profile), fields(domain = %profile.id))]
    pub async fn extract(&self, transcript: &str, profile: &DomainProfile) -> Result<Record> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(LogbookError::Extraction("transcript is empty".to_string()));
        }

        let request = self.request(transcript, profile);
        let response = self.model.complete_json(&request).await.map_err(|e| match e {
            LogbookError::OpenAI(msg) => LogbookError::Extraction(msg),
            other => other,
        })?;

        let record = Record::from_model_json(&response).map_err(LogbookError::Extraction)?;
        let record = finalize(record);

        info!(
            "Extracted record: status {}, {} consumed, order: {}",
            record.status,
            record.log_entry.materials_consumed.len(),
            record.has_order()
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::DomainTable;
    use crate::record::RecordStatus;
    use crate::testing::ScriptedModel;

    fn extractor(model: Arc<ScriptedModel>) -> Extractor {
        Extractor::new(model, &ExtractionSettings::default(), Prompts::default())
    }

    fn trockenbau() -> DomainProfile {
        DomainTable::builtin().lookup("Trockenbau").unwrap().clone()
    }

    #[tokio::test]
    async fn test_consumption_and_requirement_are_routed_apart() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(r#"{
            "logbuch_eintrag": {
                "taetigkeit": "Gipskartonplatten verbaut",
                "arbeitszeit": 5,
                "material_verbraucht": [{"artikel": "Gipskartonplatte", "menge": 5, "einheit": "Stück"}]
            },
            "material_bestellung": {
                "hat_bestellung": true,
                "deadline": "morgen",
                "items": [{"artikel": "Gipskartonplatte", "menge": 3, "einheit": "Stück"}]
            },
            "status": "OK",
            "fehlende_infos": null
        }"#
        .to_string())]));
        let extractor = extractor(model.clone());

        let record = extractor
            .extract("Verbraucht 5 Platten, brauche noch 3 Platten für morgen", &trockenbau())
            .await
            .unwrap();

        let consumed = &record.log_entry.materials_consumed;
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].quantity, Some(5.0));
        let order = record.order_request.as_ref().unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, Some(3.0));
        assert_eq!(order.deadline.as_deref(), Some("morgen"));
        assert_eq!(record.status, RecordStatus::Ok);

        let sent = model.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].system.starts_with(&trockenbau().persona_prompt));
        assert_eq!(sent[0].user, "Verbraucht 5 Platten, brauche noch 3 Platten für morgen");
        assert_eq!(sent[0].temperature, 0.0);
    }

    #[tokio::test]
    async fn test_incomplete_ok_is_downgraded() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(r#"{
            "logbuch_eintrag": {"taetigkeit": "Wand gestellt", "arbeitszeit": null,
                "material_verbraucht": [{"artikel": "CW-Profil", "menge": 8, "einheit": "unbekannt"}]},
            "material_bestellung": null,
            "status": "OK",
            "fehlende_infos": null
        }"#
        .to_string())]));

        let record = extractor(model).extract("Wand gestellt, acht CW-Profile", &trockenbau()).await.unwrap();
        assert_eq!(record.status, RecordStatus::NeedsClarification);
        assert_eq!(record.log_entry.materials_consumed[0].unit, None);
        assert!(record.missing_info.unwrap().contains("Arbeitszeit"));
    }

    #[tokio::test]
    async fn test_empty_transcript_never_calls_model() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let err = extractor(model.clone()).extract("   ", &trockenbau()).await.unwrap_err();
        assert!(matches!(err, LogbookError::Extraction(_)));
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_schema_violation_is_extraction_error() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(r#"{"antwort": "alles gut"}"#.to_string())]));
        let err = extractor(model).extract("Alles erledigt", &trockenbau()).await.unwrap_err();
        assert!(matches!(err, LogbookError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_extraction_error() {
        let model = Arc::new(ScriptedModel::new(vec![Err("connection reset".to_string())]));
        let err = extractor(model).extract("Alles erledigt", &trockenbau()).await.unwrap_err();
        match err {
            LogbookError::Extraction(msg) => assert!(msg.contains("connection reset")),
            other => panic!("expected extraction error, got {}", other),
        }
    }
}
