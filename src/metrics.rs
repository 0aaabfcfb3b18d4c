// Session metrics
//
// Lock-free counters for runs, model loads and UI traffic, logged at shutdown.

use crate::models::ModelKind;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters collected over the application lifetime.
#[derive(Debug)]
pub struct Metrics {
    /// Runs accepted by the runner
    pub runs_started: AtomicUsize,

    /// Runs that produced a result
    pub runs_succeeded: AtomicUsize,

    /// Runs that ended in an error
    pub runs_failed: AtomicUsize,

    /// Text-to-image model loads
    pub image_model_loads: AtomicUsize,

    /// Classifier model loads
    pub classifier_model_loads: AtomicUsize,

    /// Total time spent in runs, including model loads
    pub total_run_time_ms: AtomicU64,

    /// UI updates queued onto the event loop
    pub ui_updates: AtomicU64,

    /// UI updates dropped because the bridge channel was full
    pub ui_updates_dropped: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicUsize::new(0),
            runs_succeeded: AtomicUsize::new(0),
            runs_failed: AtomicUsize::new(0),
            image_model_loads: AtomicUsize::new(0),
            classifier_model_loads: AtomicUsize::new(0),
            total_run_time_ms: AtomicU64::new(0),
            ui_updates: AtomicU64::new(0),
            ui_updates_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end of a run and its wall-clock duration
    pub fn record_run_finished(&self, succeeded: bool, duration: Duration) {
        if succeeded {
            self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.runs_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_run_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_model_load(&self, kind: ModelKind) {
        match kind {
            ModelKind::TextToImage => self.image_model_loads.fetch_add(1, Ordering::Relaxed),
            ModelKind::TextClassification => {
                self.classifier_model_loads.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    pub fn model_loads(&self, kind: ModelKind) -> usize {
        match kind {
            ModelKind::TextToImage => self.image_model_loads.load(Ordering::Relaxed),
            ModelKind::TextClassification => self.classifier_model_loads.load(Ordering::Relaxed),
        }
    }

    pub fn record_ui_update(&self) {
        self.ui_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ui_update_dropped(&self) {
        self.ui_updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average run time in milliseconds over finished runs
    pub fn avg_run_time_ms(&self) -> f64 {
        let total = self.total_run_time_ms.load(Ordering::Relaxed);
        let count = self.runs_succeeded.load(Ordering::Relaxed)
            + self.runs_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Runs: {} started, {} succeeded, {} failed (avg: {:.0}ms)",
            self.runs_started.load(Ordering::Relaxed),
            self.runs_succeeded.load(Ordering::Relaxed),
            self.runs_failed.load(Ordering::Relaxed),
            self.avg_run_time_ms()
        );
        tracing::info!(
            "Model loads: {} text-to-image, {} classifier",
            self.image_model_loads.load(Ordering::Relaxed),
            self.classifier_model_loads.load(Ordering::Relaxed)
        );
        tracing::info!(
            "UI updates: {}, dropped: {}",
            self.ui_updates.load(Ordering::Relaxed),
            self.ui_updates_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
