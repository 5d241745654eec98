// file: src/pipeline/orchestrator.rs
// description: runs one alert through parsing, list checks, intel, analysis and rendering
// reference: orchestrates the per-alert triage workflow

use crate::analysis::{AlertAnalyzer, ChatCompletionAnalyzer};
use crate::config::Config;
use crate::error::TriageError;
use crate::exporter::{render_chat, render_table};
use crate::extractor::LogParser;
use crate::intel::IntelAggregator;
use crate::iplist::{FileListStore, IpList, ListSource};
use crate::models::{ExtractedRecord, IpListAlerts, ListHit, ListKind, PipelineResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    ListCheck,
    ThreatIntel,
    Analysis,
    Render,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parsing => "parsing",
            Stage::ListCheck => "list-check",
            Stage::ThreatIntel => "threat-intel",
            Stage::Analysis => "analysis",
            Stage::Render => "render",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-run switches. Stages enabled here still need their configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub enable_ti: bool,
    pub enable_ai: bool,
    /// Operator-entered fields, layered under parsed fields before static ones.
    pub manual_fields: BTreeMap<String, String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            enable_ti: true,
            enable_ai: true,
            manual_fields: BTreeMap::new(),
        }
    }
}

impl RunOptions {
    pub fn offline() -> Self {
        Self {
            enable_ti: false,
            enable_ai: false,
            ..Self::default()
        }
    }
}

/// Holds an immutable configuration snapshot; runs share nothing mutable,
/// so one orchestrator can serve concurrent runs.
pub struct PipelineOrchestrator {
    config: Arc<Config>,
    parser: LogParser,
    lists: Arc<dyn ListSource>,
    intel: Option<IntelAggregator>,
    intel_unavailable: Option<String>,
    analyzer: Option<Arc<dyn AlertAnalyzer>>,
    analyzer_unavailable: Option<String>,
    field_names: BTreeSet<String>,
}

impl PipelineOrchestrator {
    /// Builds every collaborator from configuration. Optional stages whose
    /// configuration is incomplete are left out.
    pub fn new(config: Config) -> Self {
        let lists: Arc<dyn ListSource> = Arc::new(FileListStore::from_config(&config.lists));

        let (intel, intel_unavailable) = if config.threat_intel.has_enabled_provider() {
            match IntelAggregator::from_config(&config.threat_intel) {
                Ok(intel) => (Some(intel), None),
                Err(e) => {
                    warn!("Threat intelligence disabled: {}", e);
                    (None, Some(e.to_string()))
                }
            }
        } else {
            debug!("No threat intelligence provider enabled");
            (None, None)
        };

        let (analyzer, analyzer_unavailable) = if config.ai.enabled {
            match ChatCompletionAnalyzer::from_config(&config.ai, &config.output) {
                Ok(analyzer) => (Some(Arc::new(analyzer) as Arc<dyn AlertAnalyzer>), None),
                Err(e) => {
                    warn!("AI analysis unavailable: {}", e);
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Self {
            parser: LogParser::new(&config.extraction),
            field_names: config.field_names(),
            config: Arc::new(config),
            lists,
            intel,
            intel_unavailable,
            analyzer,
            analyzer_unavailable,
        }
    }

    pub fn with_lists(mut self, lists: Arc<dyn ListSource>) -> Self {
        self.lists = lists;
        self
    }

    pub fn with_intel(mut self, intel: IntelAggregator) -> Self {
        self.intel = Some(intel);
        self.intel_unavailable = None;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn AlertAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self.analyzer_unavailable = None;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parser(&self) -> &LogParser {
        &self.parser
    }

    pub fn intel(&self) -> Option<&IntelAggregator> {
        self.intel.as_ref()
    }

    pub fn lists(&self) -> &Arc<dyn ListSource> {
        &self.lists
    }

    /// Only an empty parse fails the run; every later problem is recorded in
    /// `error` or `warnings` and the run carries on.
    pub async fn run(&self, text: &str, options: &RunOptions) -> PipelineResult {
        debug!("Stage {}", Stage::Parsing);
        let mut parsed = self.parser.parse(text);
        let warnings = std::mem::take(&mut parsed.warnings);

        if parsed.is_empty() {
            debug!("Stage {}", Stage::Failed);
            let mut result = PipelineResult::failed(TriageError::ExtractionEmpty.to_string());
            result.warnings = warnings;
            return result;
        }

        let mut result = PipelineResult {
            warnings,
            ..PipelineResult::default()
        };

        debug!("Stage {}", Stage::ListCheck);
        result.ip_list_alerts = self.check_lists(&parsed, &mut result.warnings);

        let src_ip = parsed.get("src_ip");
        let dst_ip = parsed.get("dst_ip");

        if options.enable_ti
            && let Some(intel) = &self.intel
            && (src_ip.is_some() || dst_ip.is_some())
        {
            debug!("Stage {}", Stage::ThreatIntel);
            let report = intel.query_pair(src_ip, dst_ip).await;
            for e in report.errors {
                result.record_error(format!("threat intelligence: {}", e));
            }
            result.ti_result = Some(report.intel);
        } else if options.enable_ti
            && let Some(reason) = &self.intel_unavailable
        {
            result
                .warnings
                .push(format!("threat intelligence unavailable: {}", reason));
        }

        if options.enable_ai && self.config.ai.enabled {
            debug!("Stage {}", Stage::Analysis);
            result.ai_result = match (&self.analyzer, &self.analyzer_unavailable) {
                (Some(analyzer), _) => match analyzer.analyze(&parsed, result.ti_result.as_ref()).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("{}", e);
                        e.to_string()
                    }
                },
                (None, Some(reason)) => format!("AI analysis unavailable: {}", reason),
                (None, None) => String::new(),
            };
        }

        debug!("Stage {}", Stage::Render);
        let merged = parsed
            .merged_with(&options.manual_fields)
            .merged_with(&self.config.output.static_fields);
        let is_field = |name: &str| {
            self.field_names.contains(name) || options.manual_fields.contains_key(name)
        };
        result.formatted_output = render_chat(&merged, &self.config.output, is_field);
        result.table_output = render_table(&merged, &self.config.output);

        result.parsed_data = parsed;
        result.success = true;
        debug!("Stage {}", Stage::Done);
        result
    }

    /// Whitelist is consulted first; an address on both lists reports as whitelisted.
    fn check_lists(&self, parsed: &ExtractedRecord, warnings: &mut Vec<String>) -> IpListAlerts {
        let whitelist = self.load_list(ListKind::Whitelist, warnings);
        let blacklist = self.load_list(ListKind::Blacklist, warnings);

        let status = |ip: Option<&str>| -> Option<ListHit> {
            let ip = ip?;
            if whitelist.member(ip) {
                Some(ListHit::new(ListKind::Whitelist, ip))
            } else if blacklist.member(ip) {
                Some(ListHit::new(ListKind::Blacklist, ip))
            } else {
                None
            }
        };

        let alerts = IpListAlerts {
            src_ip_status: status(parsed.get("src_ip")),
            dst_ip_status: status(parsed.get("dst_ip")),
        };
        if !alerts.is_empty() {
            info!("List hits: {:?}", alerts);
        }
        alerts
    }

    fn load_list(&self, kind: ListKind, warnings: &mut Vec<String>) -> IpList {
        match self.lists.load_list(kind) {
            Ok(list) => list,
            Err(e) => {
                warn!("{}; treating {} as empty", e, kind);
                warnings.push(e.to_string());
                IpList::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::error::Result;
    use std::collections::HashMap;

    struct MemoryLists(HashMap<ListKind, Vec<String>>);

    impl ListSource for MemoryLists {
        fn load(&self, kind: ListKind) -> Result<Vec<String>> {
            Ok(self.0.get(&kind).cloned().unwrap_or_default())
        }
    }

    struct BrokenLists;

    impl ListSource for BrokenLists {
        fn load(&self, kind: ListKind) -> Result<Vec<String>> {
            Err(TriageError::ListRead {
                path: format!("{}.txt", kind).into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    fn orchestrator(white: &[&str], black: &[&str]) -> PipelineOrchestrator {
        let mut config = Config::default_config();
        config.extraction.core.insert(
            "src_ip".to_string(),
            RuleConfig::regex(&[r"源IP[:：]?\s*([\d.]{7,})"]),
        );
        let lists = MemoryLists(HashMap::from([
            (ListKind::Whitelist, white.iter().map(|s| s.to_string()).collect()),
            (ListKind::Blacklist, black.iter().map(|s| s.to_string()).collect()),
        ]));
        PipelineOrchestrator::new(config).with_lists(Arc::new(lists))
    }

    #[tokio::test]
    async fn test_whitelist_wins_over_blacklist() {
        let orch = orchestrator(&["1.2.3.4"], &["1.2.3.0/24", "8.8.8.8"]);
        let result = orch
            .run("源IP:1.2.3.4 目的IP:8.8.8.8", &RunOptions::offline())
            .await;

        assert!(result.success);
        assert_eq!(
            result.ip_list_alerts.src_ip_status,
            Some(ListHit::new(ListKind::Whitelist, "1.2.3.4"))
        );
        assert_eq!(
            result.ip_list_alerts.dst_ip_status,
            Some(ListHit::new(ListKind::Blacklist, "8.8.8.8"))
        );
    }

    #[tokio::test]
    async fn test_empty_parse_fails() {
        let orch = orchestrator(&[], &[]);
        let result = orch.run("nothing useful here", &RunOptions::offline()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("cannot parse log content"));
        assert!(result.formatted_output.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_lists_are_warnings() {
        let orch = orchestrator(&[], &[]).with_lists(Arc::new(BrokenLists));
        let result = orch.run("源IP:1.2.3.4", &RunOptions::offline()).await;
        assert!(result.success);
        assert!(result.ip_list_alerts.is_empty());
        assert_eq!(result.warnings.len(), 2);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_skipped_stages_leave_results_empty() {
        let orch = orchestrator(&[], &[]);
        let result = orch.run("源IP:1.2.3.4", &RunOptions::default()).await;
        assert!(result.success);
        assert!(result.ti_result.is_none());
        assert!(result.ai_result.is_empty());
    }

    #[tokio::test]
    async fn test_missing_ai_key_is_reported_as_text() {
        let mut config = Config::default_config();
        config.ai.enabled = true;
        let orch = PipelineOrchestrator::new(config)
            .with_lists(Arc::new(MemoryLists(HashMap::new())));

        let result = orch.run("src_ip=1.2.3.4", &RunOptions::default()).await;
        assert!(result.success);
        assert!(result.ai_result.starts_with("AI analysis unavailable"));
    }

    #[tokio::test]
    async fn test_render_merges_without_overwriting() {
        let mut config = Config::default_config();
        config
            .output
            .static_fields
            .insert("analyst".to_string(), "night shift".to_string());
        config
            .output
            .static_fields
            .insert("src_ip".to_string(), "0.0.0.0".to_string());
        let orch = PipelineOrchestrator::new(config)
            .with_lists(Arc::new(MemoryLists(HashMap::new())));

        let options = RunOptions {
            manual_fields: BTreeMap::from([
                ("analyst".to_string(), "alice".to_string()),
                ("compromised".to_string(), "no".to_string()),
            ]),
            ..RunOptions::offline()
        };
        let result = orch.run("src_ip=1.2.3.4", &options).await;

        assert_eq!(result.parsed_data, {
            let mut expected = ExtractedRecord::new();
            expected.set("src_ip", "1.2.3.4");
            expected
        });
        assert_eq!(result.formatted_output, "源IP: 1.2.3.4\n研判人员: alice\n是否失陷: no");
        assert_eq!(result.table_output, "1.2.3.4\talice\tno");
    }

    #[tokio::test]
    async fn test_render_skips_missing_fields_and_keeps_headings() {
        let mut config = Config::default_config();
        config.output.order = ["src_ip", "dst_ip", "【分析研判】", "event_name", "ticket"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let orch = PipelineOrchestrator::new(config)
            .with_lists(Arc::new(MemoryLists(HashMap::new())));

        let options = RunOptions {
            manual_fields: BTreeMap::from([("ticket".to_string(), String::new())]),
            ..RunOptions::offline()
        };
        let result = orch.run("src_ip=1.2.3.4", &options).await;

        assert_eq!(result.formatted_output, "源IP: 1.2.3.4\n【分析研判】");
        assert_eq!(result.table_output, "1.2.3.4");
    }

    #[tokio::test]
    async fn test_missing_intel_credential_is_a_warning() {
        let mut config = Config::default_config();
        config.threat_intel.providers[0].enabled = true;
        config.threat_intel.providers[0].api_key = None;
        let orch = PipelineOrchestrator::new(config)
            .with_lists(Arc::new(MemoryLists(HashMap::new())));
        assert!(orch.intel().is_none());

        let result = orch.run("src_ip=1.2.3.4", &RunOptions::default()).await;
        assert!(result.success);
        assert!(result.ti_result.is_none());
        assert!(result.error.is_none());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("threat intelligence unavailable"));

        let offline = orch.run("src_ip=1.2.3.4", &RunOptions::offline()).await;
        assert!(offline.warnings.is_empty());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ThreatIntel.to_string(), "threat-intel");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }
}
