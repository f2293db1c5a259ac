//! Prometheus metrics for observability.
//!
//! Server-side metrics (HTTP, auth, websocket) plus gauges refreshed from
//! application state on every scrape. Core counters (enrichment, sends,
//! retries, tokens) are registered alongside.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;

use prospector_core::{AutomationStatus, ProcessingStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "prospector_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prospector_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "prospector_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "prospector_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "prospector_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prospector_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prospector_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// Times a client fell behind the broadcast channel.
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prospector_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// State gauges (collected on scrape)
// =============================================================================

pub static LEADS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("prospector_leads", "Current lead count by processing status"),
        &["status"],
    )
    .unwrap()
});

pub static LEADS_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("prospector_leads_queued", "Leads waiting to be sent").unwrap()
});

pub static QUOTA_REMAINING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("prospector_quota_remaining", "Remaining enrichment credits").unwrap()
});

pub static SENDERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("prospector_senders", "Linked sender mailboxes").unwrap()
});

pub static DISPATCH_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "prospector_dispatch_running",
        "Whether the dispatch loop is running (1) or stopped (0)",
    )
    .unwrap()
});

pub static PIPELINE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "prospector_pipeline_running",
        "Whether an enrichment run is in progress (1) or not (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let server: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(AUTH_FAILURES_TOTAL.clone()),
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(WS_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_MESSAGES_SENT.clone()),
        Box::new(WS_LAG_EVENTS.clone()),
        Box::new(LEADS_BY_STATUS.clone()),
        Box::new(LEADS_QUEUED.clone()),
        Box::new(QUOTA_REMAINING.clone()),
        Box::new(SENDERS.clone()),
        Box::new(DISPATCH_RUNNING.clone()),
        Box::new(PIPELINE_RUNNING.clone()),
    ];

    for metric in server
        .into_iter()
        .chain(prospector_core::metrics::all_metrics())
    {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges from the current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let leads = state.leads().list().await;
    for status in [
        ProcessingStatus::Pending,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
    ] {
        let count = leads.iter().filter(|l| l.status == status).count();
        LEADS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }
    let queued = leads
        .iter()
        .filter(|l| l.automation == AutomationStatus::Queued)
        .count();
    LEADS_QUEUED.set(queued as i64);

    let session = state.session().snapshot().await;
    QUOTA_REMAINING.set(session.quota as i64);
    SENDERS.set(session.senders.len() as i64);

    DISPATCH_RUNNING.set(state.dispatch().is_running() as i64);
    PIPELINE_RUNNING.set(state.pipeline().is_running() as i64);
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/leads/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/leads/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/senders/42"), "/api/v1/senders/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_includes_server_and_core() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        QUOTA_REMAINING.set(7);
        prospector_core::metrics::PROVIDER_RETRIES.inc();

        let output = encode_metrics();
        assert!(output.contains("# HELP"));
        assert!(output.contains("prospector_http_requests_total"));
        assert!(output.contains("prospector_quota_remaining 7"));
        assert!(output.contains("prospector_provider_retries_total"));
    }
}
