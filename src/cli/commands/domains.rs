//! Domains command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::domains::DomainTable;
use anyhow::Result;

/// List the available trades with their vocabulary.
pub fn run_domains(settings: &Settings) -> Result<()> {
    let table = DomainTable::with_overrides(&settings.domains)?;

    Output::header(&format!("Trades ({})", table.len()));
    for profile in table.profiles() {
        Output::list_item(&profile.id);
        Output::kv("Vocabulary", &profile.keywords());
    }

    Ok(())
}
