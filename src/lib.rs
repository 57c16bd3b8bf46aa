//! Logbook - voice-driven construction site logbook
//!
//! A worker records a spoken status report; Logbook transcribes it, extracts
//! the work done, the material consumed and the material still needed, asks
//! follow-up questions until the entry is complete, and appends it to a CSV
//! file or a spreadsheet.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `domains` - Trade profiles (vocabulary hints and persona)
//! - `transcription` - Speech-to-text adapter
//! - `extraction` - Record extraction and clarification merge
//! - `record` - Record model, normalization, completeness and reconciliation
//! - `store` - Append-only record stores
//! - `session` / `orchestrator` - The session workflow
//!
//! # Example
//!
//! ```rust,no_run
//! use logbook::config::Settings;
//! use logbook::orchestrator::Logbook;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let logbook = Logbook::new(&settings)?;
//!
//!     let mut session = logbook.start_session("Elektro")?;
//!     let record = logbook.report(&mut session, std::fs::read("bericht.wav")?).await?;
//!     if !record.is_ok() {
//!         logbook.answer_text(&mut session, "drei Stunden gearbeitet").await?;
//!     }
//!     logbook.save(&mut session).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod domains;
pub mod error;
pub mod extraction;
pub mod openai;
pub mod orchestrator;
pub mod record;
pub mod session;
pub mod store;
pub mod transcription;

#[cfg(test)]
mod testing;

pub use error::{LogbookError, Result};
