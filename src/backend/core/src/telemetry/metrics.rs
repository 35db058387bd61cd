//! Prometheus metrics.
//!
//! The recorder is installed once at startup; the handle lives in a global
//! so the `/metrics` endpoint can render without threading it through every
//! layer. Metric emission sites use the `metrics` macros directly and work
//! (as no-ops) even when the recorder was never installed, which keeps unit
//! tests quiet.

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and register metric descriptions.
///
/// Idempotent per process in effect: a second call fails because the
/// `metrics` crate only accepts one global recorder.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        "guildboard_http_requests_total",
        "HTTP requests by method, route, and status"
    );
    describe_histogram!(
        "guildboard_http_request_duration_seconds",
        "HTTP request latency in seconds"
    );
    describe_counter!(
        "guildboard_errors_total",
        "Errors constructed, by code and category"
    );
    describe_counter!(
        "guildboard_bounty_transitions_total",
        "Bounty lifecycle transitions by action and outcome"
    );
    describe_counter!(
        "guildboard_event_feed_requests_total",
        "Event feed page requests"
    );

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}

/// Render the current metrics in Prometheus exposition format. Empty when
/// the recorder was never installed.
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Timer for request duration recording.
pub struct RequestTimer {
    start: Instant,
    method: String,
    route: String,
}

impl RequestTimer {
    pub fn start(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            method: method.into(),
            route: route.into(),
        }
    }

    /// Record the duration and request counter with the final status.
    pub fn finish(self, status: u16) {
        let elapsed = self.start.elapsed().as_secs_f64();
        histogram!(
            "guildboard_http_request_duration_seconds",
            "method" => self.method.clone(),
            "route" => self.route.clone(),
        )
        .record(elapsed);
        counter!(
            "guildboard_http_requests_total",
            "method" => self.method,
            "route" => self.route,
            "status" => status.to_string(),
        )
        .increment(1);
    }
}

/// Count a bounty transition attempt.
pub fn record_transition(action: &str, outcome: &str) {
    counter!(
        "guildboard_bounty_transitions_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

/// Count an event feed page request.
pub fn record_feed_request(backend: &str) {
    counter!(
        "guildboard_event_feed_requests_total",
        "backend" => backend.to_string(),
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_recorder_is_empty() {
        // No recorder installed in unit tests
        assert_eq!(render_metrics(), "");
    }

    #[test]
    fn test_emission_without_recorder_is_a_noop() {
        RequestTimer::start("GET", "/api/v1/bounties").finish(200);
        record_transition("claim", "applied");
        record_feed_request("postgres");
    }
}
