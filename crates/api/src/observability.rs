use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tourbook_domain::triggers::SummaryRefresh;

const HTTP_REQUESTS_TOTAL: &str = "tourbook_api_http_requests_total";
const HTTP_REQUEST_DURATION_SECONDS: &str = "tourbook_api_http_request_duration_seconds";
const REVIEW_SUMMARY_REFRESH_TOTAL: &str = "tourbook_review_summary_refresh_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn register_http_request(method: &str, route: &str, status: StatusCode, elapsed: Duration) {
    let result = if status.is_server_error() {
        "error"
    } else {
        "success"
    };

    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.as_u16().to_string(),
        "result" => result
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn register_summary_refresh(operation: &'static str, refresh: &SummaryRefresh) {
    let outcome = if refresh.is_stale() { "stale" } else { "refreshed" };
    counter!(
        REVIEW_SUMMARY_REFRESH_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}
