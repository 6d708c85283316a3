//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use canvas_pilot_engine::MacroOutcome;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_fanout_connect() {
    metrics::gauge!("fanout_connections_active").increment(1.0);
}

pub fn record_fanout_disconnect() {
    metrics::gauge!("fanout_connections_active").decrement(1.0);
}

/// Record a macro request with its duration and, when it ran, its widget counts.
pub fn record_macro(kind: &str, duration_secs: f64, outcome: Option<&MacroOutcome>) {
    let labels = [("macro", kind.to_string())];
    metrics::counter!("macro_requests_total", &labels).increment(1);
    metrics::histogram!("macro_request_duration_seconds", &labels).record(duration_secs);
    match outcome {
        Some(outcome) => {
            metrics::counter!("macro_widgets_succeeded_total", &labels)
                .increment(outcome.report.succeeded as u64);
            metrics::counter!("macro_widgets_failed_total", &labels)
                .increment(outcome.report.failed as u64);
        }
        None => metrics::counter!("macro_errors_total", &labels).increment(1),
    }
}
