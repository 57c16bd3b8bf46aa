//! Follow-up turns: merging a clarification answer into the previous record.

use super::{JsonModel, JsonRequest};
use crate::config::{ExtractionSettings, Prompts};
use crate::domains::DomainProfile;
use crate::error::{LogbookError, Result};
use crate::record::{finalize, reconcile, Record};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Merges clarification answers into a previous record.
///
/// The model proposes the merged record; [`reconcile`] then holds it to the
/// previous one, and [`finalize`] recomputes the status. `previous` is never
/// modified, so a failed merge leaves the caller's record as it was.
pub struct ClarificationMerger {
    model: Arc<dyn JsonModel>,
    model_name: String,
    temperature: f32,
    prompts: Prompts,
}

impl ClarificationMerger {
    pub fn new(model: Arc<dyn JsonModel>, settings: &ExtractionSettings, prompts: Prompts) -> Self {
        Self {
            model,
            model_name: settings.merge_model().to_string(),
            temperature: settings.temperature,
            prompts,
        }
    }

    pub fn request(&self, previous: &Record, answer: &str, profile: &DomainProfile) -> JsonRequest {
        let mut vars = HashMap::new();
        vars.insert("persona".to_string(), profile.persona_prompt.clone());
        vars.insert("domain".to_string(), profile.id.clone());
        vars.insert("keywords".to_string(), profile.keywords());
        vars.insert("previous".to_string(), previous.to_model_json());
        vars.insert("answer".to_string(), answer.to_string());

        JsonRequest {
            model: self.model_name.clone(),
            system: self.prompts.render_with_custom(&self.prompts.merge.system, &vars),
            user: self.prompts.render_with_custom(&self.prompts.merge.user, &vars),
            temperature: self.temperature,
        }
    }

    #[instrument(skip(self, previous, answer, profile), fields(domain = %profile.id))]
    pub async fn merge(&self, previous: &Record, answer: &str, profile: &DomainProfile) -> Result<Record> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(LogbookError::Merge("answer is empty".to_string()));
        }

        let request = self.request(previous, answer, profile);
        let response = self.model.complete_json(&request).await.map_err(|e| match e {
            LogbookError::OpenAI(msg) => LogbookError::Merge(msg),
            other => other,
        })?;

        let candidate = Record::from_model_json(&response).map_err(LogbookError::Merge)?;
        debug!("Model proposed status {}", candidate.status);

        let merged = finalize(reconcile(previous, candidate, answer));
        info!("Merged answer: status {} -> {}", previous.status, merged.status);
        Ok(merged)
    }
}
