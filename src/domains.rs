//! Trade/domain context table.
//!
//! Each [`DomainProfile`] carries vocabulary hints that bias the speech model and
//! a persona prompt that steers extraction. The table is built once at startup
//! and is read-only afterwards.

use crate::error::{LogbookError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Vocabulary and persona for one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainProfile {
    /// Display label, also the key used for lookup and in persisted rows.
    pub id: String,
    /// Technical terms passed to the transcription model, in order.
    #[serde(default)]
    pub vocabulary_hints: Vec<String>,
    /// Role description prepended to the extraction instructions.
    pub persona_prompt: String,
}

impl DomainProfile {
    pub fn new(id: &str, vocabulary_hints: &[&str], persona_prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            vocabulary_hints: vocabulary_hints.iter().map(|s| s.to_string()).collect(),
            persona_prompt: persona_prompt.to_string(),
        }
    }

    /// Vocabulary hints as a single comma-separated string.
    pub fn keywords(&self) -> String {
        self.vocabulary_hints.join(", ")
    }
}

static BUILTIN_DOMAINS: &[(&str, &[&str], &str)] = &[
    (
        "Sanitär & Heizung",
        &[
            "Rohre", "Muffen", "Fittinge", "Hanf", "Abwasser", "HT-Rohr", "Kupfer", "Siphon",
            "Kessel", "Heizkörper", "Ventil", "Presszange",
        ],
        "Du bist ein Bauleiter für Sanitär und Heizung (SHK).",
    ),
    (
        "Elektro",
        &[
            "Kabel", "Ader", "Litze", "Schalter", "Steckdose", "FI-Schalter", "Sicherung",
            "Klemme", "Wago", "Schlitz", "Dose", "Spannung", "Volt", "Ampere",
        ],
        "Du bist ein Bauleiter für Elektrotechnik.",
    ),
    (
        "Trockenbau",
        &[
            "Gipskarton", "Ständerwerk", "Profile", "UW-Profil", "CW-Profil", "Spachteln",
            "Schleifen", "Dämmung", "Dampfbremse", "Rigips", "Schrauben",
        ],
        "Du bist ein Bauleiter für Trockenbau.",
    ),
    (
        "Maler & Lackierer",
        &[
            "Farbe", "Lack", "Grundierung", "Abkleben", "Spachtel", "Vlies", "Tapezieren",
            "Dispersionsfarbe", "Rolle", "Pinsel", "Q3", "Q4",
        ],
        "Du bist ein Bauleiter für Malerarbeiten.",
    ),
    (
        "Allgemein / Bauleitung",
        &[
            "Baustelle", "Begehung", "Abnahme", "Mangel", "Behinderung", "Rapport", "Stunden",
            "Besprechung",
        ],
        "Du bist ein allgemeiner Bauleiter.",
    ),
];

/// Ordered, read-only table of domain profiles.
#[derive(Debug, Clone)]
pub struct DomainTable {
    profiles: Vec<DomainProfile>,
}

impl DomainTable {
    /// Table with the built-in trades.
    pub fn builtin() -> Self {
        Self {
            profiles: BUILTIN_DOMAINS
                .iter()
                .map(|(id, hints, persona)| DomainProfile::new(id, hints, persona))
                .collect(),
        }
    }

    /// Built-in trades plus configured profiles. A configured profile with an
    /// existing id replaces the built-in one in place; new ids are appended.
    pub fn with_overrides(overrides: &[DomainProfile]) -> Result<Self> {
        let mut table = Self::builtin();
        for profile in overrides {
            if profile.id.trim().is_empty() {
                return Err(LogbookError::Config(
                    "Domain profile with empty id".to_string(),
                ));
            }
            match table.profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => {
                    debug!("Overriding built-in domain '{}'", profile.id);
                    *existing = profile.clone();
                }
                None => table.profiles.push(profile.clone()),
            }
        }
        Ok(table)
    }

    /// Look up a profile by id (exact, then case-insensitive).
    pub fn lookup(&self, domain_id: &str) -> Result<&DomainProfile> {
        let wanted = domain_id.trim();
        self.profiles
            .iter()
            .find(|p| p.id == wanted)
            .or_else(|| {
                let lower = wanted.to_lowercase();
                self.profiles.iter().find(|p| p.id.to_lowercase() == lower)
            })
            .ok_or_else(|| LogbookError::DomainNotFound(domain_id.to_string()))
    }

    /// All profiles in selection order.
    pub fn profiles(&self) -> &[DomainProfile] {
        &self.profiles
    }

    /// Profile ids in selection order.
    pub fn ids(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for DomainTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_order() {
        let table = DomainTable::builtin();
        assert_eq!(table.len(), 5);
        assert_eq!(table.ids()[0], "Sanitär & Heizung");
        assert_eq!(table.ids()[4], "Allgemein / Bauleitung");
    }

    #[test]
    fn test_lookup_exact_and_case_insensitive() {
        let table = DomainTable::builtin();
        let profile = table.lookup("Elektro").unwrap();
        assert!(profile.keywords().starts_with("Kabel, Ader"));
        assert_eq!(table.lookup("  elektro ").unwrap().id, "Elektro");
    }

    #[test]
    fn test_lookup_unknown_domain() {
        let table = DomainTable::builtin();
        match table.lookup("Dachdecker") {
            Err(LogbookError::DomainNotFound(id)) => assert_eq!(id, "Dachdecker"),
            other => panic!("expected DomainNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides_replace_in_place_and_append() {
        let overrides = vec![
            DomainProfile::new("Elektro", &["KNX"], "Du bist ein KNX-Fachplaner."),
            DomainProfile::new("Fliesen", &["Fuge"], "Du bist ein Fliesenleger-Meister."),
        ];
        let table = DomainTable::with_overrides(&overrides).unwrap();
        assert_eq!(table.len(), 6);
        assert_eq!(table.ids()[1], "Elektro");
        assert_eq!(table.lookup("Elektro").unwrap().keywords(), "KNX");
        assert_eq!(table.ids()[5], "Fliesen");
    }

    #[test]
    fn test_override_with_empty_id_is_rejected() {
        let overrides = vec![DomainProfile::new(" ", &[], "x")];
        assert!(DomainTable::with_overrides(&overrides).is_err());
    }
}
