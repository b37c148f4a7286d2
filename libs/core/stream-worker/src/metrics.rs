//! Prometheus instrumentation for stream workers.
//!
//! One recorder per process; every worker in the process reports through it,
//! labeled by stream and processor.

use std::time::Duration;

use metrics::{counter, gauge, histogram, Label};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the process-wide Prometheus recorder. Safe to call repeatedly.
pub fn init_metrics() {
    RECORDER.get_or_init(|| {
        info!("Installing Prometheus recorder");
        let builder = PrometheusBuilder::new();
        builder.install_recorder().expect("Prometheus recorder install failed")
    });
}

/// Handle for rendering, if [`init_metrics`] has run.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    RECORDER.get()
}

/// Current metrics in the Prometheus exposition format.
///
/// Renders empty when the recorder was never installed, so the `/metrics`
/// endpoint stays harmless in processes that skip [`init_metrics`].
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

/// Per-worker metric emitter, pre-labeled with stream and processor.
#[derive(Clone)]
pub struct StreamMetrics {
    stream: String,
    processor: String,
}

impl StreamMetrics {
    pub fn new(stream: impl Into<String>, processor: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            processor: processor.into(),
        }
    }

    fn labels(&self) -> Vec<Label> {
        vec![
            Label::new("stream", self.stream.clone()),
            Label::new("processor", self.processor.clone()),
        ]
    }

    fn with(&self, key: &'static str, value: &str) -> Vec<Label> {
        let mut labels = self.labels();
        labels.push(Label::new(key, value.to_string()));
        labels
    }

    pub fn job_received(&self) {
        counter!("stream_worker_jobs_received_total", self.labels()).increment(1);
    }

    pub fn job_processed(&self, duration: Duration) {
        counter!("stream_worker_jobs_processed_total", self.with("status", "success")).increment(1);
        histogram!("stream_worker_job_duration_seconds", self.labels())
            .record(duration.as_secs_f64());
    }

    pub fn job_failed(&self, category: &str) {
        counter!("stream_worker_jobs_processed_total", self.with("status", "failed")).increment(1);
        counter!("stream_worker_job_errors_total", self.with("category", category)).increment(1);
    }

    pub fn job_retried(&self) {
        counter!("stream_worker_jobs_retried_total", self.labels()).increment(1);
    }

    pub fn job_moved_to_dlq(&self) {
        counter!("stream_worker_jobs_dlq_total", self.labels()).increment(1);
    }

    /// Total entries in the stream. Labeled by stream only: depth is a fact
    /// about the stream, not about any one consumer.
    pub fn stream_depth(&self, depth: i64) {
        gauge!("stream_worker_stream_depth", "stream" => self.stream.clone()).set(depth as f64);
    }

    pub fn pending_count(&self, count: i64) {
        gauge!("stream_worker_pending_count", self.labels()).set(count as f64);
    }

    pub fn message_claimed(&self) {
        counter!("stream_worker_messages_claimed_total", self.labels()).increment(1);
    }
}
