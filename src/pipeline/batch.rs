// file: src/pipeline/batch.rs
// description: concurrent triage of many alerts with progress reporting
// reference: bounded fan-out with tokio semaphores and futures streams

use crate::error::{Result, TriageError};
use crate::models::PipelineResult;
use crate::pipeline::orchestrator::{PipelineOrchestrator, RunOptions};
use crate::pipeline::progress::{BatchStats, ProgressTracker};
use futures::stream::{self, StreamExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use walkdir::WalkDir;

/// One alert to triage, named after where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    pub name: String,
    pub text: String,
}

impl BatchInput {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub input: BatchInput,
    pub result: PipelineResult,
}

/// Reads files and walks directories. Each file is one alert, or one alert
/// per non-empty line with `per_line`. Hidden files are skipped.
pub fn collect_inputs(paths: &[PathBuf], per_line: bool) -> Result<Vec<BatchInput>> {
    let mut inputs = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(TriageError::Validation(format!(
                "Input does not exist: {}",
                path.display()
            )));
        }

        let files = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file());

        for entry in files {
            let name = entry.path().display().to_string();
            let text = fs::read_to_string(entry.path())?;
            if per_line {
                inputs.extend(
                    text.lines()
                        .enumerate()
                        .filter(|(_, line)| !line.trim().is_empty())
                        .map(|(i, line)| BatchInput::new(format!("{}:{}", name, i + 1), line)),
                );
            } else if !text.trim().is_empty() {
                inputs.push(BatchInput::new(name, text));
            }
        }
    }

    Ok(inputs)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

pub struct BatchRunner {
    orchestrator: Arc<PipelineOrchestrator>,
    max_concurrent_tasks: usize,
    show_progress: bool,
    colored: bool,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, max_concurrent_tasks: usize) -> Self {
        Self {
            orchestrator,
            max_concurrent_tasks: max_concurrent_tasks.max(1),
            show_progress: true,
            colored: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool, colored: bool) -> Self {
        self.show_progress = show_progress;
        self.colored = colored;
        self
    }

    /// Outcomes come back in input order.
    pub async fn run(
        &self,
        inputs: Vec<BatchInput>,
        options: &RunOptions,
    ) -> (Vec<BatchOutcome>, BatchStats) {
        if inputs.is_empty() {
            warn!("No alerts to triage");
            return (Vec::new(), BatchStats::new());
        }

        let progress = Arc::new(if self.show_progress {
            ProgressTracker::with_color(inputs.len(), self.colored)
        } else {
            ProgressTracker::hidden(inputs.len())
        });

        info!(
            "Triaging {} alerts with {} concurrent tasks...",
            inputs.len(),
            self.max_concurrent_tasks
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_tasks));
        let tasks = inputs.into_iter().enumerate().map(|(index, input)| {
            let semaphore = semaphore.clone();
            let orchestrator = self.orchestrator.clone();
            let progress = progress.clone();

            async move {
                let _permit = semaphore.acquire_owned().await.ok()?;

                progress.set_message(format!("Analysing {}", input.name));
                let result = orchestrator.run(&input.text, options).await;

                progress.add_bytes_processed(input.text.len() as u64);
                if result.success {
                    if !result.ip_list_alerts.is_empty() {
                        progress.add_list_hit();
                    }
                    if is_malicious(&result) {
                        progress.add_malicious();
                    }
                    progress.inc_succeeded();
                } else {
                    warn!(
                        "Failed to triage {}: {}",
                        input.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    progress.inc_failed();
                }

                Some((index, BatchOutcome { input, result }))
            }
        });

        let mut outcomes: Vec<(usize, BatchOutcome)> = stream::iter(tasks)
            .buffer_unordered(self.max_concurrent_tasks)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let stats = progress.get_stats();
        progress.finish();
        log_final_stats(&stats);

        (outcomes.into_iter().map(|(_, o)| o).collect(), stats)
    }
}

fn is_malicious(result: &PipelineResult) -> bool {
    result.ti_result.as_ref().is_some_and(|intel| {
        [&intel.src_ip_ti, &intel.dst_ip_ti]
            .into_iter()
            .filter_map(|slot| slot.record())
            .any(|record| record.is_malicious)
    })
}

fn log_final_stats(stats: &BatchStats) {
    info!("=== Batch Triage Summary ===");
    info!("Duration: {} seconds", stats.duration_secs);
    info!("Alerts triaged: {}", stats.alerts_succeeded);
    info!("Alerts unparsed: {}", stats.alerts_failed);
    info!("Success rate: {:.2}%", stats.success_rate());
    info!("Alerts with list hits: {}", stats.list_hits);
    info!("Alerts flagged malicious: {}", stats.malicious_alerts);
    info!("Processing speed: {:.2} alerts/sec", stats.alerts_per_second());
    info!("============================");
}
