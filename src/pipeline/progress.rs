// file: src/pipeline/progress.rs
// description: progress bars and statistics for batch triage
// reference: uses indicatif for progress bars and tracks processing metrics

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub alerts_succeeded: usize,
    pub alerts_failed: usize,
    /// Alerts with at least one whitelist or blacklist hit.
    pub list_hits: usize,
    /// Alerts where threat intelligence flagged an address as malicious.
    pub malicious_alerts: usize,
    pub total_bytes_processed: u64,
    pub duration_secs: u64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.alerts_succeeded + self.alerts_failed
    }

    pub fn alerts_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.total() as f64 / self.duration_secs as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.alerts_succeeded as f64 / total as f64) * 100.0
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    succeeded: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    list_hits: Arc<AtomicUsize>,
    malicious: Arc<AtomicUsize>,
    bytes_processed: Arc<AtomicU64>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_alerts: usize) -> Self {
        Self::with_color(total_alerts, true)
    }

    pub fn with_color(total_alerts: usize, colored: bool) -> Self {
        Self::build(MultiProgress::new(), total_alerts, colored)
    }

    /// Tracks counts without drawing anything.
    pub fn hidden(total_alerts: usize) -> Self {
        Self::build(
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            total_alerts,
            false,
        )
    }

    fn build(multi_progress: MultiProgress, total_alerts: usize, colored: bool) -> Self {
        let main_bar = create_progress_bar(&multi_progress, total_alerts as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            succeeded: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            list_hits: Arc::new(AtomicUsize::new(0)),
            malicious: Arc::new(AtomicUsize::new(0)),
            bytes_processed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn add_list_hit(&self) {
        self.list_hits.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_malicious(&self) {
        self.malicious.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_bytes_processed(&self, bytes: u64) {
        self.bytes_processed.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Triage complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> BatchStats {
        BatchStats {
            alerts_succeeded: self.succeeded.load(Ordering::SeqCst),
            alerts_failed: self.failed.load(Ordering::SeqCst),
            list_hits: self.list_hits.load(Ordering::SeqCst),
            malicious_alerts: self.malicious.load(Ordering::SeqCst),
            total_bytes_processed: self.bytes_processed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn update_detail_bar(&self) {
        let message = format!(
            "List hits: {} | Malicious: {} | Unparsed: {}",
            self.list_hits.load(Ordering::SeqCst),
            self.malicious.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst)
        );
        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    if colored {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .expect("Failed to create progress bar template")
                .progress_chars("█▓▒░"),
        );
    } else {
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}")
                .expect("Failed to create progress bar template")
                .progress_chars("=>-"),
        );
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .expect("Failed to create detail bar template");
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_stats_calculations() {
        let mut stats = BatchStats::new();
        stats.alerts_succeeded = 100;
        stats.alerts_failed = 10;
        stats.duration_secs = 10;

        assert_eq!(stats.alerts_per_second(), 11.0);
        assert!((stats.success_rate() - 90.909).abs() < 0.01);
    }

    #[test]
    fn test_batch_stats_zero_duration() {
        let stats = BatchStats::new();
        assert_eq!(stats.alerts_per_second(), 0.0);
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_progress_tracker_counts() {
        let tracker = ProgressTracker::hidden(10);

        tracker.inc_succeeded();
        tracker.inc_failed();
        tracker.add_list_hit();
        tracker.add_bytes_processed(1024);

        let stats = tracker.get_stats();
        assert_eq!(stats.alerts_succeeded, 1);
        assert_eq!(stats.alerts_failed, 1);
        assert_eq!(stats.list_hits, 1);
        assert_eq!(stats.total_bytes_processed, 1024);
    }
}
