// file: src/intel/threatbook.rs
// description: ThreatBook ip reputation over the keyed api or a browser session
// reference: https://x.threatbook.com/v5/apiDocs

use crate::config::{ProviderConfig, RequestMode};
use crate::error::{Result, TriageError};
use crate::intel::provider::ThreatIntelProvider;
use crate::models::{Confidence, Location, Severity, ThreatRecord};
use crate::utils::Validator;
use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0";
const SESSION_REFERER: &str = "https://x.threatbook.com/v5/serviceCenter?tab=apiAuth";
const HTML_SNIPPET_CHARS: usize = 2000;

lazy_static! {
    static ref INITIAL_STATE: Regex =
        Regex::new(r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.*?\})\s*;")
            .expect("Invalid initial state regex");
}

#[derive(Debug, Clone)]
enum Transport {
    Api { url: String, api_key: String },
    Session { url: String, cookie: String },
}

#[derive(Debug, Clone)]
pub struct ThreatBookProvider {
    name: String,
    client: Client,
    transport: Transport,
}

impl ThreatBookProvider {
    /// Fails with `ConfigMissing` when the provider is off or lacks the
    /// credential its request mode needs.
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let transport = match config.request_mode {
            RequestMode::Off => {
                return Err(TriageError::ConfigMissing(format!(
                    "{}: request mode is off",
                    config.name
                )));
            }
            RequestMode::Api => Transport::Api {
                url: config.api_url.clone(),
                api_key: credential(&config.api_key)
                    .ok_or_else(|| {
                        TriageError::ConfigMissing(format!("{}: api_key", config.name))
                    })?
                    .to_string(),
            },
            RequestMode::Http => Transport::Session {
                url: config.web_url.trim_end_matches('/').to_string(),
                cookie: credential(&config.session_cookie)
                    .ok_or_else(|| {
                        TriageError::ConfigMissing(format!("{}: session_cookie", config.name))
                    })?
                    .to_string(),
            },
        };

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            name: config.name.clone(),
            client,
            transport,
        })
    }

    async fn query_api(&self, url: &str, api_key: &str, ip: &str) -> Result<ThreatRecord> {
        debug!("Querying {} api for {}", self.name, ip);

        let response = self
            .client
            .get(url)
            .query(&[("apikey", api_key), ("resource", ip), ("lang", "zh")])
            .send()
            .await
            .map_err(|e| TriageError::provider(&self.name, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriageError::provider(
                &self.name,
                format!("api returned status {}", status),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| TriageError::provider(&self.name, format!("malformed payload: {}", e)))?;

        parse_api_response(&self.name, ip, &payload)
    }

    async fn query_session(&self, url: &str, cookie: &str, ip: &str) -> Result<ThreatRecord> {
        debug!("Querying {} web page for {}", self.name, ip);

        let response = self
            .client
            .get(format!("{}/{}", url, ip))
            .header("User-Agent", USER_AGENT)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Referer", SESSION_REFERER)
            .header("Cookie", cookie)
            .send()
            .await
            .map_err(|e| TriageError::provider(&self.name, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriageError::provider(
                &self.name,
                format!("page returned status {}", status),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| TriageError::provider(&self.name, format!("unreadable page: {}", e)))?;

        parse_session_page(&self.name, ip, &html)
    }
}

impl ThreatIntelProvider for ThreatBookProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn query<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<ThreatRecord>> {
        Box::pin(async move {
            match &self.transport {
                Transport::Api { url, api_key } => self.query_api(url, api_key, ip).await,
                Transport::Session { url, cookie } => self.query_session(url, cookie, ip).await,
            }
        })
    }
}

fn credential(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Normalises a keyed-api reply. A rejected reply (`response_code` other
/// than 0) or one without an entry for `ip` is a neutral record carrying the
/// whole payload.
pub fn parse_api_response(provider: &str, ip: &str, payload: &Value) -> Result<ThreatRecord> {
    let code = payload.get("response_code").and_then(Value::as_i64);
    if code != Some(0) {
        let message = payload
            .get("verbose_msg")
            .and_then(Value::as_str)
            .unwrap_or("unexpected response shape");
        warn!(
            "{} rejected query for {}: response_code {:?}: {}",
            provider, ip, code, message
        );
    }

    let ip_data = payload
        .get("data")
        .or_else(|| payload.get("ips"))
        .and_then(|container| container.get(ip))
        .filter(|data| code == Some(0) && data.as_object().is_some_and(|o| !o.is_empty()));

    let Some(ip_data) = ip_data else {
        let mut record = ThreatRecord::neutral(ip);
        record.raw = Some(payload.clone());
        return Ok(record);
    };

    let mut labels = BTreeSet::new();
    labels.extend(strings(ip_data.get("judgments")));

    if let Some(intelligences) = ip_data.get("intelligences").and_then(Value::as_object) {
        for entry in intelligences.values().filter_map(Value::as_array).flatten() {
            labels.extend(strings(entry.get("intel_types")));
            labels.extend(strings(entry.get("intel_tags")));
        }
    }

    if let Some(classes) = ip_data.get("tags_classes").and_then(Value::as_array) {
        for class in classes {
            labels.extend(strings(class.get("tags")));
        }
    }

    let is_malicious = ip_data
        .get("is_malicious")
        .and_then(Value::as_bool)
        .unwrap_or(!labels.is_empty());

    let basic = ip_data.get("basic");
    let location = Location {
        country: text(basic.and_then(|b| b.pointer("/location/country"))),
        province: text(basic.and_then(|b| b.pointer("/location/province"))),
        city: text(basic.and_then(|b| b.pointer("/location/city"))),
        carrier: text(basic.and_then(|b| b.get("carrier"))),
    };

    Ok(ThreatRecord {
        ip: ip.to_string(),
        is_malicious,
        severity: text(ip_data.get("severity"))
            .map(|s| Severity::from_label(&s))
            .unwrap_or_default(),
        confidence: text(ip_data.get("confidence_level"))
            .map(|c| Confidence::from_label(&c))
            .unwrap_or_default(),
        labels,
        location: (!location.is_empty()).then_some(location),
        raw: Some(ip_data.clone()),
        sources: BTreeSet::new(),
    })
}

/// Normalises the ip page of a logged-in session. Pages without embedded
/// state (login wall, captcha) give a neutral record with an html snippet.
pub fn parse_session_page(provider: &str, ip: &str, html: &str) -> Result<ThreatRecord> {
    let Some(blob) = INITIAL_STATE.captures(html).and_then(|c| c.get(1)) else {
        let mut record = ThreatRecord::neutral(ip);
        let snippet: String = html.chars().take(HTML_SNIPPET_CHARS).collect();
        record.raw = Some(json!({ "html_snippet": snippet }));
        return Ok(record);
    };

    let state: Value = serde_json::from_str(blob.as_str())
        .map_err(|e| TriageError::provider(provider, format!("malformed page state: {}", e)))?;

    let summary = state
        .pointer("/data/summaryInfo")
        .cloned()
        .unwrap_or_else(|| json!({}));

    let labels: BTreeSet<String> = ["judgments", "events"]
        .iter()
        .filter_map(|key| summary.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|item| text(item.get("name")))
        .collect();

    let is_malicious = match summary.get("judge").and_then(Value::as_f64) {
        Some(judge) => judge != 0.0,
        None => !labels.is_empty(),
    };

    let location = summary.get("location");
    let location = Location {
        country: text(location.and_then(|l| l.get("country"))),
        province: text(location.and_then(|l| l.get("province"))),
        city: text(location.and_then(|l| l.get("city"))),
        carrier: text(location.and_then(|l| l.get("carrier"))),
    };

    Ok(ThreatRecord {
        ip: ip.to_string(),
        is_malicious,
        severity: Severity::Unknown,
        confidence: Confidence::Unknown,
        labels,
        location: (!location.is_empty()).then_some(location),
        raw: Some(summary),
        sources: BTreeSet::new(),
    })
}

fn strings(value: Option<&Value>) -> impl Iterator<Item = String> + '_ {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Validator::flatten_lines)
}
