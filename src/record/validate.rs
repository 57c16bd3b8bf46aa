//! Normalization and the local completeness check.
//!
//! Whatever status the model reports, a record only counts as OK here when
//! every field of the persisted row is present and usable.

use super::{LogEntry, MaterialLine, Record, RecordStatus};
use crate::error::{LogbookError, Result};
use std::fmt;

/// Values the model uses when it does not know something.
const PLACEHOLDERS: &[&str] = &[
    "", "?", "??", "-", "--", "null", "none", "n/a", "na", "k.a.", "k. a.", "keine angabe",
    "unbekannt", "unknown", "tbd", "xxx",
];

fn is_placeholder(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
}

fn clean_text(value: &str) -> String {
    if is_placeholder(value) {
        return String::new();
    }
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

fn normalize_line(line: &mut MaterialLine) {
    line.article = clean_text(&line.article);
    line.unit = clean_optional(line.unit.take());
}

/// Trim strings and turn placeholder values into absent ones. Idempotent.
pub fn normalize(record: &mut Record) {
    let entry = &mut record.log_entry;
    entry.activity = clean_text(&entry.activity);
    entry.materials_consumed.iter_mut().for_each(normalize_line);

    record.order_request = record.order_request.take().and_then(|mut order| {
        order.items.iter_mut().for_each(normalize_line);
        order.deadline = clean_optional(order.deadline.take());
        if !order.items.is_empty() {
            order.has_order = true;
        }
        (!order.is_empty()).then_some(order)
    });

    record.missing_info = clean_optional(record.missing_info.take());
}

/// A field that keeps a log entry from being persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum MissingField {
    Activity,
    Hours,
    /// Material line without a name (1-based position).
    Article { position: usize },
    Quantity { article: String },
    Unit { article: String },
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingField::Activity => write!(f, "Tätigkeit"),
            MissingField::Hours => write!(f, "Arbeitszeit in Stunden"),
            MissingField::Article { position } => write!(f, "Bezeichnung von Material {}", position),
            MissingField::Quantity { article } => write!(f, "Menge für {}", article),
            MissingField::Unit { article } => write!(f, "Einheit für {}", article),
        }
    }
}

impl MissingField {
    /// Whether a follow-up `question` already asks for this field.
    fn is_asked_in(&self, question: &str) -> bool {
        let question = question.to_lowercase();
        let words: &[&str] = match self {
            MissingField::Activity => &["tätigkeit", "gemacht", "activity"],
            MissingField::Hours => &["stunde", "arbeitszeit", "std", "hour"],
            MissingField::Article { .. } => &["bezeichnung", "welche", "artikel", "material", "which"],
            MissingField::Quantity { .. } => &["menge", "wie viel", "anzahl", "how many", "how much"],
            MissingField::Unit { .. } => &["einheit", "unit"],
        };
        words.iter().any(|word| question.contains(word))
    }
}

/// Everything still missing before `entry` can be persisted, in row order.
pub fn missing_fields(entry: &LogEntry) -> Vec<MissingField> {
    let mut missing = Vec::new();

    if entry.activity.trim().is_empty() {
        missing.push(MissingField::Activity);
    }
    if !entry.hours_worked.is_some_and(|h| h > 0.0) {
        missing.push(MissingField::Hours);
    }

    for (idx, line) in entry.materials_consumed.iter().enumerate() {
        if line.article.trim().is_empty() {
            missing.push(MissingField::Article { position: idx + 1 });
            continue;
        }
        if !line.quantity.is_some_and(|q| q > 0.0) {
            missing.push(MissingField::Quantity {
                article: line.article.clone(),
            });
        }
        if line.unit.as_deref().map_or(true, |u| u.trim().is_empty()) {
            missing.push(MissingField::Unit {
                article: line.article.clone(),
            });
        }
    }

    missing
}

/// Human-readable follow-up question for the missing fields.
pub fn describe_missing(missing: &[MissingField]) -> String {
    if missing.is_empty() {
        return "Bitte Angaben prüfen und bestätigen.".to_string();
    }
    let fields = missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Es fehlen noch: {}.", fields)
}

/// Normalize and recompute status.
///
/// The local check can only downgrade: a record the model marks OK but that is
/// incomplete becomes NEEDS_CLARIFICATION. Ignored records stay ignored.
pub fn finalize(mut record: Record) -> Record {
    normalize(&mut record);
    let missing = missing_fields(&record.log_entry);

    match record.status {
        RecordStatus::Ignored => {}
        RecordStatus::Ok if missing.is_empty() => {
            record.missing_info = None;
        }
        RecordStatus::Ok => {
            record.status = RecordStatus::NeedsClarification;
            record.missing_info = Some(describe_missing(&missing));
        }
        RecordStatus::NeedsClarification => {
            record.missing_info = Some(match record.missing_info.take() {
                None => describe_missing(&missing),
                Some(question) => {
                    let unasked: Vec<MissingField> = missing
                        .into_iter()
                        .filter(|field| !field.is_asked_in(&question))
                        .collect();
                    let note = describe_missing(&unasked);
                    if unasked.is_empty() || question.contains(&note) {
                        question
                    } else {
                        format!("{} {}", question, note)
                    }
                }
            });
        }
    }

    record
}

/// Validation pass run before every save, independent of the reported status.
pub fn ensure_saveable(record: &Record) -> Result<()> {
    match record.status {
        RecordStatus::Ok => {}
        RecordStatus::NeedsClarification => {
            return Err(LogbookError::Validation(
                record
                    .missing_info
                    .clone()
                    .unwrap_or_else(|| "record still needs clarification".to_string()),
            ))
        }
        RecordStatus::Ignored => {
            return Err(LogbookError::Validation(
                "report contains nothing to log".to_string(),
            ))
        }
    }

    let missing = missing_fields(&record.log_entry);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LogbookError::Validation(describe_missing(&missing)))
    }
}
