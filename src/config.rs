// file: src/config.rs
// description: application configuration management with toml and environment support
// reference: https://docs.rs/config

use crate::error::{Result, TriageError};
use crate::utils::Validator;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const THREATBOOK_API_URL: &str = "https://api.threatbook.cn/v3/scene/ip_reputation";
pub const THREATBOOK_WEB_URL: &str = "https://x.threatbook.com/v5/ip";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub lists: ListsConfig,
    #[serde(default)]
    pub threat_intel: ThreatIntelConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Regex,
    Fixed,
}

/// One configured extraction rule. `pattern` is accepted as a single-entry shorthand.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleConfig {
    pub fn regex(patterns: &[&str]) -> Self {
        Self {
            mode: MatchMode::Regex,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            pattern: None,
            enabled: true,
        }
    }

    pub fn fixed(patterns: &[&str]) -> Self {
        Self {
            mode: MatchMode::Fixed,
            ..Self::regex(patterns)
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn pattern_list(&self) -> Vec<&str> {
        if !self.patterns.is_empty() {
            return self.patterns.iter().map(String::as_str).collect();
        }
        self.pattern.as_deref().into_iter().collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Baseline fields, always attempted.
    #[serde(default = "default_core_rules")]
    pub core: BTreeMap<String, RuleConfig>,
    /// Operator-defined fields, each individually enabled.
    #[serde(default)]
    pub extra_fields: BTreeMap<String, RuleConfig>,
    #[serde(default)]
    pub log_patterns: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub custom_patterns: BTreeMap<String, Vec<String>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            core: default_core_rules(),
            extra_fields: BTreeMap::new(),
            log_patterns: BTreeMap::new(),
            custom_patterns: BTreeMap::new(),
        }
    }
}

impl ExtractionConfig {
    /// Restores built-in core rules the document left out. Configured ones are kept.
    pub fn fill_core_defaults(&mut self) {
        for (field, rule) in default_core_rules() {
            self.core.entry(field).or_insert(rule);
        }
    }
}

fn default_core_rules() -> BTreeMap<String, RuleConfig> {
    let mut core = BTreeMap::new();
    core.insert(
        "src_ip".to_string(),
        RuleConfig::regex(&[
            r"(?i)(?:源\s*IP|源地址|src[_ ]?ip|source[_ ]?ip)\s*[:：=]?\s*((?:\d{1,3}\.){3}\d{1,3})",
        ]),
    );
    core.insert(
        "dst_ip".to_string(),
        RuleConfig::regex(&[
            r"(?i)(?:目的\s*IP|目的地址|dst[_ ]?ip|dest(?:ination)?[_ ]?ip)\s*[:：=]?\s*((?:\d{1,3}\.){3}\d{1,3})",
        ]),
    );
    core.insert(
        "src_port".to_string(),
        RuleConfig::regex(&[r"(?i)(?:源端口|src[_ ]?port)\s*[:：=]?\s*(\d{1,5})"]),
    );
    core.insert(
        "dst_port".to_string(),
        RuleConfig::regex(&[r"(?i)(?:目的端口|dst[_ ]?port|dest[_ ]?port)\s*[:：=]?\s*(\d{1,5})"]),
    );
    core.insert(
        "protocol".to_string(),
        RuleConfig::regex(&[
            r"(?i)(?:协议|proto(?:col)?)\s*[:：=]?\s*(TCP|UDP|ICMP|HTTPS?)",
            r"\b(TCP|UDP|ICMP|HTTPS?)\b",
        ]),
    );
    core
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListsConfig {
    #[serde(default = "default_whitelist_path")]
    pub whitelist_path: PathBuf,
    #[serde(default = "default_blacklist_path")]
    pub blacklist_path: PathBuf,
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            whitelist_path: default_whitelist_path(),
            blacklist_path: default_blacklist_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Both,
    Src,
    Dst,
}

impl QueryMode {
    pub fn includes_src(self) -> bool {
        matches!(self, QueryMode::Both | QueryMode::Src)
    }

    pub fn includes_dst(self) -> bool {
        matches!(self, QueryMode::Both | QueryMode::Dst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Off,
    /// Keyed API transport.
    #[default]
    Api,
    /// Authenticated browser-session transport.
    Http,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    ThreatBook,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub request_mode: RequestMode,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default = "default_threatbook_api_url")]
    pub api_url: String,
    #[serde(default = "default_threatbook_web_url")]
    pub web_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            kind: ProviderKind::ThreatBook,
            enabled: false,
            request_mode: RequestMode::Api,
            api_key: None,
            session_cookie: None,
            api_url: default_threatbook_api_url(),
            web_url: default_threatbook_web_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThreatIntelConfig {
    #[serde(default)]
    pub query_mode: QueryMode,
    #[serde(default = "default_ti_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl ThreatIntelConfig {
    pub fn has_enabled_provider(&self) -> bool {
        self.providers
            .iter()
            .any(|p| p.enabled && p.request_mode != RequestMode::Off)
    }
}

impl Default for ThreatIntelConfig {
    fn default() -> Self {
        Self {
            query_mode: QueryMode::Both,
            timeout_secs: default_ti_timeout(),
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Customer,
    #[default]
    Expert,
    Beginner,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Structured,
    Brief,
    Report,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_objective")]
    pub objective: String,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl AiConfig {
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            objective: default_objective(),
            audience: Audience::Expert,
            response_mode: ResponseMode::Structured,
            timeout_secs: default_ai_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Display settings. Order and labels are presentation only.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_order")]
    pub order: Vec<String>,
    #[serde(default = "default_labels")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub auto_append_extra: bool,
    #[serde(default)]
    pub static_fields: BTreeMap<String, String>,
}

impl OutputConfig {
    pub fn label_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.labels.get(field).map(String::as_str).unwrap_or(field)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            labels: default_labels(),
            auto_append_extra: false,
            static_fields: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_history_file")]
    pub file: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            file: default_history_file(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(
                config::File::from(Path::new("config/default.toml")).required(false),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ALERT_TRIAGE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        config.extraction.fill_core_defaults();
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    /// Names that denote fields: extraction rule fields, labelled fields and
    /// static fields. Any other output order entry is a heading.
    pub fn field_names(&self) -> BTreeSet<String> {
        let extraction = &self.extraction;
        extraction
            .core
            .keys()
            .chain(extraction.extra_fields.keys())
            .chain(extraction.log_patterns.keys())
            .chain(extraction.custom_patterns.keys())
            .chain(self.output.labels.keys())
            .chain(self.output.static_fields.keys())
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let rules = self
            .extraction
            .core
            .iter()
            .chain(self.extraction.extra_fields.iter());
        for (field, rule) in rules {
            if rule.pattern_list().is_empty() {
                return Err(TriageError::Config(format!(
                    "extraction rule '{}' must define at least one pattern",
                    field
                )));
            }
        }

        if self.threat_intel.timeout_secs == 0 {
            return Err(TriageError::Config(
                "threat_intel.timeout_secs must be greater than 0".to_string(),
            ));
        }

        for provider in &self.threat_intel.providers {
            Validator::validate_url(&provider.api_url)?;
            Validator::validate_url(&provider.web_url)?;
        }

        if self.ai.timeout_secs == 0 {
            return Err(TriageError::Config(
                "ai.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Validator::validate_url(&self.ai.base_url)?;

        if self.history.max_entries == 0 {
            return Err(TriageError::Config(
                "history.max_entries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_whitelist_path() -> PathBuf {
    PathBuf::from("lists/whitelist.txt")
}

fn default_blacklist_path() -> PathBuf {
    PathBuf::from("lists/blocked.txt")
}

fn default_provider_name() -> String {
    "threatbook".to_string()
}

fn default_threatbook_api_url() -> String {
    THREATBOOK_API_URL.to_string()
}

fn default_threatbook_web_url() -> String {
    THREATBOOK_WEB_URL.to_string()
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::default()]
}

fn default_ti_timeout() -> u64 {
    15
}

fn default_ai_base_url() -> String {
    "https://api.siliconflow.cn/v1".to_string()
}

fn default_ai_model() -> String {
    "deepseek-ai/DeepSeek-V2".to_string()
}

fn default_objective() -> String {
    "Assess this alert as a security analyst: give a threat level, whether the source or \
     destination IP should be blocked, and the main reasons and risks."
        .to_string()
}

fn default_ai_timeout() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_order() -> Vec<String> {
    [
        "src_ip",
        "dst_ip",
        "event_name",
        "alert_device",
        "analyst",
        "alert_id",
        "compromised",
        "event_type",
        "suggestion",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_labels() -> BTreeMap<String, String> {
    [
        ("src_ip", "源IP"),
        ("dst_ip", "目的IP"),
        ("event_name", "事件名称"),
        ("alert_device", "告警设备"),
        ("analyst", "研判人员"),
        ("alert_id", "告警编号"),
        ("compromised", "是否失陷"),
        ("event_type", "事件类型"),
        ("suggestion", "处置建议"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_max_entries() -> usize {
    200
}

fn default_history_file() -> PathBuf {
    PathBuf::from("output/log_history.json")
}
