// file: src/analysis/prompt.rs
// description: context/objective/style/tone/audience/response prompt assembly
// reference: https://towardsdatascience.com/how-i-won-singapores-gpt-4-prompt-engineering-competition-34c195a93d41

use crate::config::{AiConfig, Audience, OutputConfig, ResponseMode};
use crate::models::{ExtractedRecord, IntelSlot, PairIntel, ThreatRecord};

/// Fields always listed first, with an explicit marker when missing.
pub const KEY_FIELDS: [&str; 6] = ["src_ip", "dst_ip", "event_type", "request", "response", "payload"];

const NOT_EXTRACTED: &str = "(not extracted)";

pub fn build_prompt(
    record: &ExtractedRecord,
    intel: Option<&PairIntel>,
    ai: &AiConfig,
    output: &OutputConfig,
) -> String {
    let mut lines: Vec<String> = vec![
        "You are a senior network security threat analyst.".to_string(),
        String::new(),
        "[Context]".to_string(),
        "Below are the parsed fields of one security alert, its request/response payloads \
         and threat intelligence for the addresses involved. Base your assessment on them."
            .to_string(),
        String::new(),
        "=== Key fields ===".to_string(),
    ];

    for key in KEY_FIELDS {
        let value = record.get(key).unwrap_or(NOT_EXTRACTED);
        lines.push(format!("{}: {}", output.label_for(key), value));
    }

    let others: Vec<_> = record
        .iter()
        .filter(|(key, value)| !KEY_FIELDS.contains(key) && !value.is_empty())
        .collect();
    if !others.is_empty() {
        lines.push(String::new());
        lines.push("=== Other fields ===".to_string());
        for (key, value) in others {
            lines.push(format!("{}: {}", key, value));
        }
    }

    if let Some(intel) = intel.filter(|i| i.has_any_record()) {
        lines.push(String::new());
        lines.push("=== Threat intelligence ===".to_string());
        push_slot(&mut lines, "Source", &intel.src_ip_ti);
        push_slot(&mut lines, "Destination", &intel.dst_ip_ti);
    }

    lines.push(String::new());
    lines.push("[Objective]".to_string());
    lines.push(ai.objective.trim().to_string());

    lines.push(String::new());
    lines.push("[Style]".to_string());
    lines.push(
        "Write as a professional threat analyst: clear structure, itemised points, no small talk."
            .to_string(),
    );

    lines.push(String::new());
    lines.push("[Tone]".to_string());
    lines.push(
        "Professional, objective and measured. Judge from the evidence without exaggerating."
            .to_string(),
    );

    lines.push(String::new());
    lines.push("[Audience]".to_string());
    lines.push(audience_line(ai.audience).to_string());

    lines.push(String::new());
    lines.push("[Response]".to_string());
    lines.push(response_line(ai.response_mode).to_string());

    lines.join("\n")
}

fn push_slot(lines: &mut Vec<String>, side: &str, slot: &IntelSlot) {
    let Some(record) = slot.record() else {
        return;
    };
    push_record(lines, side, record);
}

fn push_record(lines: &mut Vec<String>, side: &str, record: &ThreatRecord) {
    lines.push(format!(
        "{} IP: {}; malicious: {}",
        side,
        record.ip,
        if record.is_malicious { "yes" } else { "no" }
    ));
    if !record.labels.is_empty() {
        let labels: Vec<&str> = record.labels.iter().map(String::as_str).collect();
        lines.push(format!("  labels: {}", labels.join(", ")));
    }
    if record.severity.is_known() {
        lines.push(format!("  severity: {}", record.severity));
    }
    if record.confidence.is_known() {
        lines.push(format!("  confidence: {}", record.confidence));
    }
    if let Some(region) = record
        .location
        .as_ref()
        .map(|l| l.region())
        .filter(|r| !r.is_empty())
    {
        lines.push(format!("  location: {}", region));
    }
}

fn audience_line(audience: Audience) -> &'static str {
    match audience {
        Audience::Customer => {
            "Business owners and customers: keep security jargon to a minimum, explain any \
             term you use, and focus on business impact and remediation."
        }
        Audience::Beginner => {
            "Security beginners: avoid obscure abbreviations, and explain terms such as C2 or \
             botnet in brackets the first time they appear."
        }
        Audience::Expert => {
            "Security professionals: technical terms such as ATT&CK, C2 or exploit chains are \
             fine without explanation; emphasise technical detail and evidence."
        }
    }
}

fn response_line(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::Brief => {
            "Give the overall conclusion in one line (for example: \"high risk, block the \
             source IP\"), followed by at most three lines of supporting reasons."
        }
        ResponseMode::Report => {
            "Write a full report in Markdown with the second-level sections \
             \"## Summary\", \"## Threat analysis\" and \"## Remediation\"."
        }
        ResponseMode::Structured => {
            "Answer in exactly this structure, one item per line:\n\
             Threat level: <high/medium/low/info>\n\
             Block recommended: <yes/no> (separately for source and destination if needed)\n\
             Reason: <one or two sentences>\n\
             Risk analysis: <attacker, victim and business impact perspectives>"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThreatRecord;

    fn record(fields: &[(&str, &str)]) -> ExtractedRecord {
        let mut record = ExtractedRecord::new();
        for (key, value) in fields {
            record.set(key, value);
        }
        record
    }

    #[test]
    fn test_key_fields_come_first_with_missing_marker() {
        let record = record(&[("src_ip", "1.2.3.4"), ("rule_id", "9001")]);
        let prompt = build_prompt(&record, None, &AiConfig::default(), &OutputConfig::default());

        let src = prompt.find("源IP: 1.2.3.4").unwrap();
        let missing = prompt.find("目的IP: (not extracted)").unwrap();
        let other = prompt.find("rule_id: 9001").unwrap();
        assert!(src < missing && missing < other);
        assert!(prompt.contains("payload: (not extracted)"));
        assert!(!prompt.contains("=== Threat intelligence ==="));
    }

    #[test]
    fn test_intel_section_and_prompt_options() {
        let mut src = ThreatRecord::neutral("1.2.3.4");
        src.is_malicious = true;
        src.labels.insert("botnet".to_string());
        let intel = PairIntel {
            src_ip_ti: IntelSlot::Found(src),
            dst_ip_ti: IntelSlot::NoResult,
            sources: ["threatbook".to_string()].into_iter().collect(),
        };
        let ai = AiConfig {
            audience: Audience::Customer,
            response_mode: ResponseMode::Report,
            ..AiConfig::default()
        };

        let prompt = build_prompt(
            &record(&[("src_ip", "1.2.3.4")]),
            Some(&intel),
            &ai,
            &OutputConfig::default(),
        );
        assert!(prompt.contains("Source IP: 1.2.3.4; malicious: yes"));
        assert!(prompt.contains("  labels: botnet"));
        assert!(!prompt.contains("Destination IP"));
        assert!(prompt.contains("## Threat analysis"));
        assert!(prompt.contains("Business owners"));
        assert!(prompt.contains(ai.objective.trim()));
    }
}
