//! Record model shared by extraction, merge and the store.
//!
//! The serialized form is the JSON schema exchanged with the language model,
//! which keeps the German keys of the extraction prompt.

mod reconcile;
mod validate;

pub use reconcile::reconcile;
pub use validate::{
    describe_missing, ensure_saveable, finalize, missing_fields, normalize, MissingField,
};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One consumed or ordered material position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    #[serde(rename = "artikel", deserialize_with = "string_or_null")]
    pub article: String,
    #[serde(rename = "menge", default)]
    pub quantity: Option<f64>,
    #[serde(rename = "einheit", default)]
    pub unit: Option<String>,
}

impl MaterialLine {
    pub fn new(article: &str, quantity: f64, unit: &str) -> Self {
        Self {
            article: article.to_string(),
            quantity: Some(quantity),
            unit: Some(unit.to_string()),
        }
    }

    /// `"<quantity> <unit> <article>"`, skipping absent parts.
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(q) = self.quantity {
            parts.push(format_quantity(q));
        }
        if let Some(u) = self.unit.as_deref().filter(|u| !u.is_empty()) {
            parts.push(u.to_string());
        }
        parts.push(self.article.clone());
        parts.join(" ")
    }
}

/// Backward-looking part of a report: work done and material consumed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "taetigkeit", deserialize_with = "string_or_null")]
    pub activity: String,
    #[serde(rename = "arbeitszeit", default)]
    pub hours_worked: Option<f64>,
    #[serde(
        rename = "material_verbraucht",
        default,
        deserialize_with = "lines_or_null"
    )]
    pub materials_consumed: Vec<MaterialLine>,
}

impl LogEntry {
    /// Consumed lines joined with `" | "`, in recorded order.
    pub fn material_summary(&self) -> String {
        self.materials_consumed
            .iter()
            .map(MaterialLine::summary)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Forward-looking part of a report: material still needed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(rename = "hat_bestellung", default)]
    pub has_order: bool,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default, deserialize_with = "lines_or_null")]
    pub items: Vec<MaterialLine>,
}

impl OrderRequest {
    /// No order flag, no items and no deadline.
    pub fn is_empty(&self) -> bool {
        !self.has_order && self.items.is_empty() && self.deadline.is_none()
    }
}

/// Completeness state reported for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "RUECKFRAGE_NOETIG", alias = "NEEDS_CLARIFICATION")]
    NeedsClarification,
    /// Nothing loggable was reported.
    #[serde(rename = "IGNORED")]
    Ignored,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Ok => write!(f, "OK"),
            RecordStatus::NeedsClarification => write!(f, "NEEDS_CLARIFICATION"),
            RecordStatus::Ignored => write!(f, "IGNORED"),
        }
    }
}

/// The unit of session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "logbuch_eintrag")]
    pub log_entry: LogEntry,
    #[serde(rename = "material_bestellung", default)]
    pub order_request: Option<OrderRequest>,
    pub status: RecordStatus,
    /// Follow-up question in the reporter's language.
    #[serde(rename = "fehlende_infos", default)]
    pub missing_info: Option<String>,
}

impl Record {
    /// Parse a model response, rejecting anything that does not match the schema.
    ///
    /// Tolerates prose or code fences around the JSON object.
    pub fn from_model_json(response: &str) -> std::result::Result<Self, String> {
        let json_start = response.find('{');
        let json_end = response.rfind('}');

        let json_str = match (json_start, json_end) {
            (Some(start), Some(end)) if end > start => &response[start..=end],
            _ => response,
        };

        let record: Record = serde_json::from_str(json_str).map_err(|e| {
            format!(
                "response does not match the record schema: {}. Response was: {}",
                e,
                preview(response, 500)
            )
        })?;

        record.check_ranges()?;
        Ok(record)
    }

    /// Serialize in the model's schema (used as merge context).
    pub fn to_model_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn is_ok(&self) -> bool {
        self.status == RecordStatus::Ok
    }

    pub fn has_order(&self) -> bool {
        self.order_request
            .as_ref()
            .is_some_and(|o| o.has_order || !o.items.is_empty())
    }

    fn check_ranges(&self) -> std::result::Result<(), String> {
        if let Some(h) = self.log_entry.hours_worked {
            if !h.is_finite() || h < 0.0 {
                return Err(format!("arbeitszeit must be a non-negative number, got {}", h));
            }
        }
        let orders = self
            .order_request
            .as_ref()
            .map(|o| o.items.as_slice())
            .unwrap_or_default();
        for line in self.log_entry.materials_consumed.iter().chain(orders) {
            if let Some(q) = line.quantity {
                if !q.is_finite() || q < 0.0 {
                    return Err(format!(
                        "menge for '{}' must be a non-negative number, got {}",
                        line.article, q
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Print a quantity without a trailing `.0` for whole numbers.
pub fn format_quantity(q: f64) -> String {
    if q.fract() == 0.0 && q.abs() < 1e15 {
        format!("{}", q as i64)
    } else {
        format!("{}", q)
    }
}

fn preview(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn string_or_null<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lines_or_null<'de, D>(deserializer: D) -> std::result::Result<Vec<MaterialLine>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<MaterialLine>>::deserialize(deserializer)?.unwrap_or_default())
}
