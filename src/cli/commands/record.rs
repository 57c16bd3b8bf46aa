//! Interactive record command.
//!
//! Runs one session in the terminal: process the recorded report, then read
//! answers, corrections and commands from stdin until the entry is saved or
//! discarded.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::LogbookError;
use crate::orchestrator::Logbook;
use crate::record::RecordStatus;
use crate::session::Session;
use crate::store::CsvStore;
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// What the worker typed at the prompt.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Save,
    /// Save to the local CSV file instead of the configured store.
    SaveCsv,
    Discard,
    /// Spoken answer stored in a file.
    AudioAnswer(&'a str),
    TextAnswer(&'a str),
}

fn parse_input(line: &str) -> Option<Input<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let lower = line.to_lowercase();
    Some(match lower.as_str() {
        "save" | "speichern" | "s" => Input::Save,
        "save csv" | "speichern csv" => Input::SaveCsv,
        "discard" | "verwerfen" | "exit" | "quit" | "q" => Input::Discard,
        _ => match line.strip_prefix('@') {
            Some(path) => Input::AudioAnswer(path.trim()),
            None => Input::TextAnswer(line),
        },
    })
}

/// Run the record command.
pub async fn run_record(audio: &str, domain: Option<String>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Record, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let logbook = Logbook::new(&settings)?;

    let domain = match domain {
        Some(d) => d,
        None => pick_domain(&logbook)?,
    };
    let mut session = logbook.start_session(&domain)?;

    let bytes = tokio::fs::read(audio).await?;
    logbook.capture(&mut session, bytes)?;

    let spinner = Output::spinner("Transcribing and extracting...");
    let result = logbook.process(&mut session).await;
    spinner.finish_and_clear();
    let record = result?;

    if let Some(transcript) = session.transcript() {
        Output::kv("Transkript", transcript);
    }
    Output::record(&record);

    interact(&logbook, &mut session, &settings).await
}

async fn interact(logbook: &Logbook, session: &mut Session, settings: &Settings) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let Some(record) = session.record() else {
            return Ok(());
        };
        let hint = match record.status {
            RecordStatus::Ok => "'speichern', 'verwerfen' oder Korrektur",
            RecordStatus::NeedsClarification => "Antwort (Text oder @datei), 'verwerfen'",
            RecordStatus::Ignored => "nichts zu speichern, 'verwerfen'",
        };
        print!("\n{} ", style(format!("[{}]>", hint)).green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            Output::warning("Input closed, record discarded.");
            logbook.discard(session);
            return Ok(());
        }

        let Some(input) = parse_input(&line) else {
            continue;
        };

        let outcome = match input {
            Input::Save => logbook.save(session).await.map(|_| None),
            Input::SaveCsv => match CsvStore::new(settings.csv_path(), settings.store.csv_delimiter) {
                Ok(store) => logbook.save_with(session, &store).await.map(|_| None),
                Err(e) => Err(e),
            },
            Input::Discard => {
                logbook.discard(session);
                Output::info("Record discarded.");
                return Ok(());
            }
            Input::AudioAnswer(path) => match read_audio(path).await {
                Ok(bytes) => {
                    let spinner = Output::spinner("Transcribing answer...");
                    let merged = logbook.answer_audio(session, bytes).await;
                    spinner.finish_and_clear();
                    merged.map(Some)
                }
                Err(e) => Err(e),
            },
            Input::TextAnswer(text) => {
                let spinner = Output::spinner("Updating record...");
                let merged = logbook.answer_text(session, text).await;
                spinner.finish_and_clear();
                merged.map(Some)
            }
        };

        match outcome {
            Ok(Some(record)) => Output::record(&record),
            Ok(None) => {
                Output::success("Entry saved to the logbook.");
                return Ok(());
            }
            Err(e @ LogbookError::Store(_)) => {
                Output::error(&format!("{}", e));
                Output::info("The record is kept. Try again, or type 'save csv' to write it locally.");
            }
            Err(e) => Output::error(&format!("{}", e)),
        }
    }
}

async fn read_audio(path: &str) -> crate::error::Result<Vec<u8>> {
    let path = Settings::expand_path(path);
    if !Path::new(&path).exists() {
        return Err(LogbookError::Transcription(format!(
            "audio file not found: {}",
            path.display()
        )));
    }
    Ok(tokio::fs::read(&path).await?)
}

fn pick_domain(logbook: &Logbook) -> anyhow::Result<String> {
    Output::header("Gewerk");
    let ids = logbook.domains().ids();
    for (idx, id) in ids.iter().enumerate() {
        Output::list_item(&format!("{} {}", style(idx + 1).bold(), id));
    }

    let stdin = io::stdin();
    loop {
        print!("{} ", style("Nummer oder Name:").green().bold());
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            anyhow::bail!("no domain selected");
        }
        let line = line.trim();
        if let Ok(n) = line.parse::<usize>() {
            if let Some(id) = ids.get(n.wrapping_sub(1)) {
                return Ok(id.to_string());
            }
        } else if let Ok(profile) = logbook.domains().lookup(line) {
            return Ok(profile.id.clone());
        }
        Output::warning("Unknown domain, try again.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("  Speichern \n"), Some(Input::Save));
        assert_eq!(parse_input("save csv"), Some(Input::SaveCsv));
        assert_eq!(parse_input("verwerfen"), Some(Input::Discard));
        assert_eq!(parse_input(""), None);
    }

    #[test]
    fn test_parse_answers() {
        assert_eq!(
            parse_input("@ ~/antwort.wav"),
            Some(Input::AudioAnswer("~/antwort.wav"))
        );
        assert_eq!(
            parse_input("drei Stunden gearbeitet\n"),
            Some(Input::TextAnswer("drei Stunden gearbeitet"))
        );
    }
}
