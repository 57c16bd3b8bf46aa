//! CLI output formatting utilities.

use crate::record::{format_quantity, MaterialLine, Record, RecordStatus};
use crate::store::StoreRow;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a record the way the worker reviews it.
    pub fn record(record: &Record) {
        let status = match record.status {
            RecordStatus::Ok => style("OK").green().bold(),
            RecordStatus::NeedsClarification => style("RÜCKFRAGE").yellow().bold(),
            RecordStatus::Ignored => style("IGNORIERT").dim(),
        };
        println!("\n{} {}", style("Logbuch").bold().underlined(), status);

        let entry = &record.log_entry;
        Output::kv("Tätigkeit", or_missing(&entry.activity));
        Output::kv(
            "Arbeitszeit",
            &entry
                .hours_worked
                .map(|h| format!("{} h", format_quantity(h)))
                .unwrap_or_else(|| "?".to_string()),
        );
        if entry.materials_consumed.is_empty() {
            Output::kv("Material", "-");
        } else {
            println!("  {}:", style("Material").dim());
            entry.materials_consumed.iter().for_each(Output::material_line);
        }

        if let Some(order) = record.order_request.as_ref().filter(|_| record.has_order()) {
            println!("\n{}", style("Bestellung").bold().underlined());
            Output::kv("Bis", order.deadline.as_deref().unwrap_or("-"));
            order.items.iter().for_each(Output::material_line);
        }

        if let Some(question) = &record.missing_info {
            println!("\n{} {}", style("?").yellow().bold(), question);
        }
    }

    fn material_line(line: &MaterialLine) {
        let quantity = line.quantity.map(format_quantity).unwrap_or_else(|| "?".to_string());
        let unit = line.unit.as_deref().unwrap_or("?");
        println!("    {} {} {} {}", style("*").cyan(), quantity, unit, or_missing(&line.article));
    }

    /// Print one stored logbook row.
    pub fn row(row: &StoreRow) {
        println!(
            "  {} {} {} ({} h)",
            style(&row.date).dim(),
            style(&row.domain).cyan(),
            style(&row.activity).bold(),
            row.hours
        );
        if !row.material_summary.is_empty() {
            println!("      {}", row.material_summary);
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

fn or_missing(value: &str) -> &str {
    if value.trim().is_empty() {
        "?"
    } else {
        value
    }
}
