//! Prompt templates for Logbook.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory
//! (`transcription.toml`, `extraction.toml`, `merge.toml`).

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid placeholder regex"))
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub transcription: TranscriptionPrompts,
    pub extraction: ExtractionPrompts,
    pub merge: MergePrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Vocabulary hint sent along with the audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionPrompts {
    pub hint: String,
}

impl Default for TranscriptionPrompts {
    fn default() -> Self {
        Self {
            hint: "Hier ist ein Bericht aus dem Bereich {{domain}}. Fachbegriffe: {{keywords}}. Ganze Sätze."
                .to_string(),
        }
    }
}

/// Prompts for turning a transcript into a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPrompts {
    pub system: String,
    pub user: String,
}

const RECORD_SCHEMA: &str = r#"{
    "logbuch_eintrag": {
        "taetigkeit": "string (Fachsprache Deutsch)",
        "arbeitszeit": "float oder null",
        "material_verbraucht": [ { "artikel": "string (Deutsch)", "menge": "float oder null", "einheit": "string oder null" } ]
    },
    "material_bestellung": {
        "hat_bestellung": "boolean",
        "deadline": "string oder null",
        "items": [ { "artikel": "string (Deutsch)", "menge": "float oder null", "einheit": "string oder null" } ]
    },
    "status": "OK" | "RUECKFRAGE_NOETIG" | "IGNORED",
    "fehlende_infos": "string oder null"
}"#;

impl Default for ExtractionPrompts {
    fn default() -> Self {
        Self {
            system: format!(
                r#"{{{{persona}}}}
DEINE AUFGABE (MULTI-INTENT):
Trenne strikt zwischen:
1. TAGEBUCH (Was wurde getan? Vergangenheit)
2. BESTELLUNG (Was wird gebraucht? Zukunft)

REGELN:
- "Verbraucht/verbaut/verlegt X" -> material_verbraucht. "Brauche/benötige X" -> material_bestellung.items. Niemals beides für dieselbe Angabe.
- "taetigkeit" und "artikel" immer auf Deutsch in Fachsprache, egal in welcher Sprache berichtet wird.
- Unbekannte Werte sind null. Erfinde keine Mengen, Einheiten oder Stunden.
- Fehlt eine Arbeitszeit, eine Menge oder eine Einheit, ist der Status "RUECKFRAGE_NOETIG".
- "fehlende_infos" ist eine kurze Rückfrage in der Sprache des Berichts.
- Enthält der Bericht nichts für das Bautagebuch, ist der Status "IGNORED".

JSON STRUKTUR:
{}
WICHTIG: "Brauche 5 Platten" -> kommt in Bestellung, NICHT in Verbrauch!"#,
                RECORD_SCHEMA
            ),
            user: "{{transcript}}".to_string(),
        }
    }
}

/// Prompts for integrating a follow-up answer into an existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePrompts {
    pub system: String,
    pub user: String,
}

impl Default for MergePrompts {
    fn default() -> Self {
        Self {
            system: format!(
                r#"{{{{persona}}}}
Du bist ein Datenbank-Updater. Integriere die neue Info in das bestehende JSON.

REGELN:
- Das alte JSON ist die Wahrheit. Behalte alle vorhandenen Mengen, Einheiten und Maße.
- Eine Menge darf nur kleiner werden, wenn die neue Info diesen Artikel ausdrücklich korrigiert.
- Zusätzliche Details zu einem Artikel (z.B. Maße) werden an den Artikelnamen angehängt.
- Neue Materialien oder Bestellungen werden ergänzt, Verbrauch und Bestellung bleiben getrennt.
- Lass Abschnitte, die die neue Info nicht betrifft, unverändert.
- Setze den Status auf "OK", wenn alles vollständig ist, sonst "RUECKFRAGE_NOETIG" mit einer neuen Rückfrage in "fehlende_infos".

Antworte nur mit JSON in dieser Struktur:
{}"#,
                RECORD_SCHEMA
            ),
            user: "ALTES JSON: {{previous}}\nNEUE INFO: {{answer}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let transcription_path = custom_path.join("transcription.toml");
            if transcription_path.exists() {
                let content = std::fs::read_to_string(&transcription_path)?;
                prompts.transcription = toml::from_str(&content)?;
            }

            let extraction_path = custom_path.join("extraction.toml");
            if extraction_path.exists() {
                let content = std::fs::read_to_string(&extraction_path)?;
                prompts.extraction = toml::from_str(&content)?;
            }

            let merge_path = custom_path.join("merge.toml");
            if merge_path.exists() {
                let content = std::fs::read_to_string(&merge_path)?;
                prompts.merge = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Single pass: placeholders inside substituted values are left as they are.
    /// Unknown placeholders stay in the output.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        placeholder_regex()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
