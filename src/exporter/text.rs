// file: src/exporter/text.rs
// description: chat and table renderings of parsed alerts and intel summaries
// reference: internal output formats

use crate::config::OutputConfig;
use crate::models::{ExtractedRecord, IntelSlot, PairIntel};
use crate::utils::Validator;

/// `label: value` lines in configured order. `is_field` tells field names
/// from section headings: a missing field is skipped, a heading is emitted
/// verbatim.
pub fn render_chat(
    record: &ExtractedRecord,
    output: &OutputConfig,
    is_field: impl Fn(&str) -> bool,
) -> String {
    let mut lines = Vec::new();

    for entry in output.order.iter().filter(|e| !e.is_empty()) {
        match record.get(entry) {
            Some("") => {}
            Some(value) => lines.push(format!("{}: {}", output.label_for(entry), value)),
            None if is_field(entry) => {}
            None => lines.push(entry.clone()),
        }
    }

    if output.auto_append_extra {
        for (field, value) in extra_fields(record, output) {
            lines.push(format!("{}: {}", output.label_for(field), value));
        }
    }

    lines.join("\n")
}

/// One tab-separated row of values in configured order, for pasting into a
/// spreadsheet. Missing fields and headings are both skipped so columns hold
/// values only.
pub fn render_table(record: &ExtractedRecord, output: &OutputConfig) -> String {
    let mut values: Vec<String> = output
        .order
        .iter()
        .filter_map(|field| record.get(field))
        .map(Validator::flatten_lines)
        .collect();

    if output.auto_append_extra {
        values.extend(
            extra_fields(record, output).map(|(_, value)| Validator::flatten_lines(value)),
        );
    }

    values.join("\t")
}

fn extra_fields<'a>(
    record: &'a ExtractedRecord,
    output: &'a OutputConfig,
) -> impl Iterator<Item = (&'a str, &'a str)> {
    record
        .iter()
        .filter(move |(field, value)| {
            !value.is_empty() && !output.order.iter().any(|o| o == field)
        })
}

pub fn render_intel(intel: Option<&PairIntel>) -> String {
    let Some(intel) = intel.filter(|i| i.src_ip_ti.is_attempted() || i.dst_ip_ti.is_attempted())
    else {
        return "No threat intelligence data".to_string();
    };

    let mut lines = Vec::new();
    for (title, slot) in [
        ("Source IP intelligence", &intel.src_ip_ti),
        ("Destination IP intelligence", &intel.dst_ip_ti),
    ] {
        match slot {
            IntelSlot::NotQueried => continue,
            IntelSlot::NoResult => {
                lines.push(format!("=== {} ===", title));
                lines.push("No provider returned a result".to_string());
            }
            IntelSlot::Found(record) => {
                lines.push(format!("=== {} ===", title));
                lines.push(format!("IP: {}", record.ip));
                lines.push(format!(
                    "Malicious: {}",
                    if record.is_malicious { "yes" } else { "no" }
                ));
                if !record.labels.is_empty() {
                    let labels: Vec<&str> = record.labels.iter().map(String::as_str).collect();
                    lines.push(format!("Labels: {}", labels.join(", ")));
                }
                if let Some(location) = record
                    .location
                    .as_ref()
                    .map(|l| l.describe())
                    .filter(|l| !l.is_empty())
                {
                    lines.push(format!("Location: {}", location));
                }
                if !record.sources.is_empty() {
                    let sources: Vec<&str> = record.sources.iter().map(String::as_str).collect();
                    lines.push(format!("Sources: {}", sources.join(", ")));
                }
            }
        }
        lines.push(String::new());
    }

    lines.join("\n").trim().to_string()
}

/// Assessment text with blank lines and edge whitespace removed.
pub fn render_ai(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return "No AI assessment".to_string();
    }
    lines.join("\n")
}
