use alert_triage::config::RuleConfig;
use alert_triage::error::{Result, TriageError};
use alert_triage::{
    AlertAnalyzer, Config, ExtractedRecord, FileListStore, IntelAggregator, IntelSlot, ListHit,
    ListKind, PairIntel, PipelineOrchestrator, QueryMode, RunOptions, ThreatIntelProvider,
    ThreatRecord,
};
use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const ALERT: &str = "告警: 可疑连接\n源IP:1.2.3.4\n目的IP:8.8.8.8\nprotocol: TCP";

struct ScriptedProvider {
    name: &'static str,
    malicious_ip: Option<&'static str>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn flagging(name: &'static str, ip: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            malicious_ip: Some(ip),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            malicious_ip: None,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

impl ThreatIntelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn query<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<ThreatRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.fail {
                return Err(TriageError::provider(self.name, "503 Service Unavailable"));
            }
            let mut record = ThreatRecord::neutral(ip);
            if self.malicious_ip == Some(ip) {
                record.is_malicious = true;
                record.labels.insert("botnet".to_string());
            }
            Ok(record)
        })
    }
}

struct FailingAnalyzer;

impl AlertAnalyzer for FailingAnalyzer {
    fn analyze<'a>(
        &'a self,
        _record: &'a ExtractedRecord,
        _intel: Option<&'a PairIntel>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async { Err(TriageError::AiCall("502: upstream overloaded".to_string())) })
    }
}

struct EchoAnalyzer;

impl AlertAnalyzer for EchoAnalyzer {
    fn analyze<'a>(
        &'a self,
        record: &'a ExtractedRecord,
        intel: Option<&'a PairIntel>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let malicious = intel
                .and_then(|i| i.src_ip_ti.record())
                .is_some_and(|r| r.is_malicious);
            Ok(format!(
                "src={} malicious={}",
                record.get("src_ip").unwrap_or("-"),
                malicious
            ))
        })
    }
}

fn workspace(whitelist: &str, blacklist: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let white = dir.path().join("whitelist.txt");
    let black = dir.path().join("blocked.txt");
    fs::write(&white, whitelist).unwrap();
    fs::write(&black, blacklist).unwrap();

    let mut config = Config::default_config();
    config.lists.whitelist_path = white;
    config.lists.blacklist_path = black;
    config.extraction.core.insert(
        "src_ip".to_string(),
        RuleConfig::regex(&[r"源IP[:：]?\s*([\d.]{7,})"]),
    );
    config.ai.enabled = true;
    (dir, config)
}

fn aggregator(providers: Vec<Arc<ScriptedProvider>>, mode: QueryMode) -> IntelAggregator {
    IntelAggregator::new(
        providers
            .into_iter()
            .map(|p| p as Arc<dyn ThreatIntelProvider>)
            .collect(),
        mode,
    )
}

#[tokio::test]
async fn test_whitelisted_source_end_to_end() {
    let (_dir, config) = workspace("# office\n1.2.0.0/16\n", "8.8.8.0-255\n");
    let orchestrator = PipelineOrchestrator::new(config);

    let result = orchestrator.run(ALERT, &RunOptions::offline()).await;

    assert!(result.success);
    assert_eq!(result.parsed_data.get("src_ip"), Some("1.2.3.4"));
    assert_eq!(result.parsed_data.get("dst_ip"), Some("8.8.8.8"));
    assert_eq!(
        result.ip_list_alerts.src_ip_status,
        Some(ListHit::new(ListKind::Whitelist, "1.2.3.4"))
    );
    assert_eq!(
        result.ip_list_alerts.dst_ip_status,
        Some(ListHit::new(ListKind::Blacklist, "8.8.8.8"))
    );
    assert_eq!(result.formatted_output, "源IP: 1.2.3.4\n目的IP: 8.8.8.8");
    assert_eq!(result.table_output, "1.2.3.4\t8.8.8.8");
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let (_dir, config) = workspace("1.2.3.4\n", "");
    let orchestrator = PipelineOrchestrator::new(config)
        .with_intel(aggregator(
            vec![ScriptedProvider::flagging("A", "8.8.8.8")],
            QueryMode::Both,
        ))
        .with_analyzer(Arc::new(EchoAnalyzer));

    let first = orchestrator.run(ALERT, &RunOptions::default()).await;
    let second = orchestrator.run(ALERT, &RunOptions::default()).await;

    assert_eq!(first.parsed_data, second.parsed_data);
    assert_eq!(first.formatted_output, second.formatted_output);
    assert_eq!(first.table_output, second.table_output);
    assert_eq!(first.ip_list_alerts, second.ip_list_alerts);
}

#[tokio::test]
async fn test_intel_and_analysis_flow_into_result() {
    let (_dir, config) = workspace("", "");
    let orchestrator = PipelineOrchestrator::new(config)
        .with_intel(aggregator(
            vec![
                ScriptedProvider::flagging("A", "9.9.9.9"),
                ScriptedProvider::flagging("B", "1.2.3.4"),
            ],
            QueryMode::Both,
        ))
        .with_analyzer(Arc::new(EchoAnalyzer));

    let result = orchestrator.run(ALERT, &RunOptions::default()).await;

    let intel = result.ti_result.expect("intel stage ran");
    let src = intel.src_ip_ti.record().expect("source record");
    assert!(src.is_malicious);
    assert_eq!(src.labels.iter().collect::<Vec<_>>(), vec!["botnet"]);
    assert_eq!(intel.sources.len(), 2);
    assert!(!intel.dst_ip_ti.record().unwrap().is_malicious);
    assert_eq!(result.ai_result, "src=1.2.3.4 malicious=true");
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_query_mode_src_leaves_destination_unattempted() {
    let (_dir, config) = workspace("", "");
    let provider = ScriptedProvider::flagging("A", "8.8.8.8");
    let orchestrator = PipelineOrchestrator::new(config)
        .with_intel(aggregator(vec![provider.clone()], QueryMode::Src));

    let result = orchestrator.run(ALERT, &RunOptions::default()).await;

    let intel = result.ti_result.unwrap();
    assert!(intel.src_ip_ti.record().is_some());
    assert_eq!(intel.dst_ip_ti, IntelSlot::NotQueried);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_intel_failure_does_not_abort() {
    let (_dir, config) = workspace("", "");
    let orchestrator = PipelineOrchestrator::new(config)
        .with_intel(aggregator(
            vec![ScriptedProvider::failing("A")],
            QueryMode::Both,
        ))
        .with_analyzer(Arc::new(FailingAnalyzer));

    let result = orchestrator.run(ALERT, &RunOptions::default()).await;

    assert!(result.success);
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("1.2.3.4"), "{}", error);
    assert_eq!(result.warnings.len(), 1);
    let intel = result.ti_result.unwrap();
    assert_eq!(intel.src_ip_ti, IntelSlot::NoResult);
    assert!(intel.sources.is_empty());
    assert!(result.ai_result.contains("upstream overloaded"));
    assert!(!result.formatted_output.is_empty());
}

#[tokio::test]
async fn test_disabled_stages_are_not_entered() {
    let (_dir, config) = workspace("", "");
    let provider = ScriptedProvider::flagging("A", "8.8.8.8");
    let orchestrator = PipelineOrchestrator::new(config)
        .with_intel(aggregator(vec![provider.clone()], QueryMode::Both))
        .with_analyzer(Arc::new(FailingAnalyzer));

    let result = orchestrator.run(ALERT, &RunOptions::offline()).await;

    assert!(result.ti_result.is_none());
    assert!(result.ai_result.is_empty());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unparsable_input_fails() {
    let (_dir, config) = workspace("", "");
    let orchestrator = PipelineOrchestrator::new(config);

    let result = orchestrator
        .run("routine heartbeat, nothing to see", &RunOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("cannot parse log content"));
    assert!(result.ti_result.is_none());
}

#[tokio::test]
async fn test_list_store_edits_are_seen_by_next_run() {
    let (_dir, config) = workspace("", "");
    let store = FileListStore::from_config(&config.lists);
    let orchestrator = PipelineOrchestrator::new(config);

    let before = orchestrator.run(ALERT, &RunOptions::offline()).await;
    assert!(before.ip_list_alerts.is_empty());

    assert!(store.add(ListKind::Blacklist, "1.2.3.1-10").unwrap());
    let after = orchestrator.run(ALERT, &RunOptions::offline()).await;
    assert_eq!(
        after.ip_list_alerts.src_ip_status,
        Some(ListHit::new(ListKind::Blacklist, "1.2.3.4"))
    );
}

#[tokio::test]
async fn test_partial_config_file_end_to_end() {
    let (dir, _) = workspace("", "");
    let path = dir.path().join("triage.toml");
    fs::write(
        &path,
        format!(
            r#"
[extraction.extra_fields.event_name]
patterns = ['事件名称[:：]\s*(\S+)']

[lists]
whitelist_path = "{white}"
blacklist_path = "{black}"

[[threat_intel.providers]]
name = "threatbook"
enabled = true
request_mode = "api"

[output]
order = ["event_name", "src_ip", "dst_ip", "【分析研判】", "analyst"]
"#,
            white = dir.path().join("whitelist.txt").display(),
            black = dir.path().join("blocked.txt").display(),
        ),
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    let orchestrator = PipelineOrchestrator::new(config);
    let result = orchestrator
        .run("事件名称: 端口扫描\n源IP: 10.1.1.1", &RunOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(
        result.formatted_output,
        "事件名称: 端口扫描\n源IP: 10.1.1.1\n【分析研判】"
    );
    assert!(result.ti_result.is_none());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("threat intelligence unavailable"));
}
