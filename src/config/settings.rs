//! Configuration settings for Logbook.

use crate::domains::DomainProfile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name of the CSV logbook inside the data directory.
pub const CSV_FILE_NAME: &str = "baustellentagebuch.csv";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub provider: ProviderSettings,
    pub transcription: TranscriptionSettings,
    pub extraction: ExtractionSettings,
    pub store: StoreSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
    /// Additional or overriding domain profiles.
    pub domains: Vec<DomainProfile>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (audio spool).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.logbook".to_string(),
            temp_dir: "/tmp/logbook".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Hosted model provider (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// HTTP timeout for a single request, in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            request_timeout_seconds: 120,
        }
    }
}

impl ProviderSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> crate::error::Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            Ok(_) => Err(crate::error::LogbookError::Config(format!(
                "{} is empty. Set it with: export {}='...'",
                self.api_key_env, self.api_key_env
            ))),
            Err(_) => Err(crate::error::LogbookError::Config(format!(
                "{} not set. Set it with: export {}='...'",
                self.api_key_env, self.api_key_env
            ))),
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Transcription model.
    pub model: String,
    /// Language hint passed to the model (ISO-639-1). Empty disables the hint.
    pub language: Option<String>,
    /// Upper bound for one transcription round-trip, in seconds.
    pub timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-large-v3".to_string(),
            language: Some("de".to_string()),
            timeout_seconds: 60,
        }
    }
}

/// Extraction and merge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Chat model used for extraction.
    pub model: String,
    /// Chat model used for merging answers (defaults to `model`).
    pub merge_model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound for one extraction or merge round-trip, in seconds.
    pub timeout_seconds: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            merge_model: None,
            temperature: 0.0,
            timeout_seconds: 60,
        }
    }
}

impl ExtractionSettings {
    /// Model used for merge calls.
    pub fn merge_model(&self) -> &str {
        self.merge_model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.model)
    }
}

/// Record store backend type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local append-only delimited file (default).
    #[default]
    Csv,
    /// Remote spreadsheet (Google Sheets values:append).
    Sheets,
    /// In-process store, nothing is written to disk.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" | "file" => Ok(StoreBackend::Csv),
            "sheets" | "spreadsheet" => Ok(StoreBackend::Sheets),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Csv => write!(f, "csv"),
            StoreBackend::Sheets => write!(f, "sheets"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Active backend.
    pub backend: StoreBackend,
    /// Path of the CSV logbook (csv backend). Empty puts it in the data directory.
    pub csv_path: String,
    /// Field delimiter of the CSV logbook.
    pub csv_delimiter: char,
    /// Remote spreadsheet settings (sheets backend).
    pub sheets: SheetsSettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Csv,
            csv_path: String::new(),
            csv_delimiter: ';',
            sheets: SheetsSettings::default(),
        }
    }
}

/// Google Sheets settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    /// Sheets API base URL.
    pub api_base: String,
    /// Target spreadsheet id.
    pub spreadsheet_id: String,
    /// A1 range rows are appended to.
    pub range: String,
    /// Name of the environment variable holding the OAuth bearer token.
    pub token_env: String,
    /// HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id: String::new(),
            range: "Tagebuch!A:F".to_string(),
            token_env: "GOOGLE_SHEETS_TOKEN".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// HTTP form backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Sessions untouched for this long are dropped from the registry, in seconds.
    pub session_ttl_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 30 * 60,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::LogbookError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("logbook")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded CSV logbook path.
    pub fn csv_path(&self) -> PathBuf {
        if self.store.csv_path.trim().is_empty() {
            return self.data_dir().join(CSV_FILE_NAME);
        }
        Self::expand_path(&self.store.csv_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_groq() {
        let settings = Settings::default();
        assert_eq!(settings.provider.api_key_env, "GROQ_API_KEY");
        assert_eq!(settings.transcription.model, "whisper-large-v3");
        assert_eq!(settings.extraction.merge_model(), "llama-3.3-70b-versatile");
        assert_eq!(settings.store.backend, StoreBackend::Csv);
        assert_eq!(settings.store.csv_delimiter, ';');
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [store]
            backend = "sheets"

            [store.sheets]
            spreadsheet_id = "abc123"

            [[domains]]
            id = "Fliesen"
            vocabulary_hints = ["Fliese", "Fuge", "Kleber"]
            persona_prompt = "Du bist ein Bauleiter für Fliesenarbeiten."
        "#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.store.backend, StoreBackend::Sheets);
        assert_eq!(settings.store.sheets.spreadsheet_id, "abc123");
        assert_eq!(settings.store.sheets.range, "Tagebuch!A:F");
        assert_eq!(settings.extraction.timeout_seconds, 60);
        assert_eq!(settings.domains.len(), 1);
        assert_eq!(settings.domains[0].vocabulary_hints.len(), 3);
    }

    #[test]
    fn test_merge_model_override() {
        let mut extraction = ExtractionSettings::default();
        extraction.merge_model = Some("llama-3.1-8b-instant".to_string());
        assert_eq!(extraction.merge_model(), "llama-3.1-8b-instant");
        extraction.merge_model = Some(String::new());
        assert_eq!(extraction.merge_model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("CSV".parse::<StoreBackend>().unwrap(), StoreBackend::Csv);
        assert_eq!("spreadsheet".parse::<StoreBackend>().unwrap(), StoreBackend::Sheets);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_csv_defaults_to_data_dir() {
        let mut settings = Settings::default();
        settings.general.data_dir = "/srv/logbook".to_string();
        assert_eq!(
            settings.csv_path(),
            PathBuf::from("/srv/logbook/baustellentagebuch.csv")
        );

        settings.store.csv_path = "/var/lib/tagebuch.csv".to_string();
        assert_eq!(settings.csv_path(), PathBuf::from("/var/lib/tagebuch.csv"));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut settings = Settings::default();
        settings.store.csv_path = "/srv/logbook/tagebuch.csv".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.csv_path(), PathBuf::from("/srv/logbook/tagebuch.csv"));
    }
}
