//! Configuration module for Logbook.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ExtractionPrompts, MergePrompts, Prompts, TranscriptionPrompts};
pub use settings::{
    ExtractionSettings, GeneralSettings, PromptSettings, ProviderSettings, ServerSettings,
    Settings, SheetsSettings, StoreBackend, StoreSettings, TranscriptionSettings,
};
