//! Prometheus metrics endpoint and domain counters.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

use crate::AppState;

// Metric names as constants for consistency
pub const APPOINTMENTS_CREATED_TOTAL: &str = "appointments_created_total";
pub const APPOINTMENTS_COMPLETED_TOTAL: &str = "appointments_completed_total";
pub const INVOICES_CREATED_TOTAL: &str = "invoices_created_total";
pub const USERS_ONLINE: &str = "users_online";

/// Initialize the Prometheus metrics recorder and return a handle for
/// rendering metrics. Called once during startup.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    describe_counter!(
        APPOINTMENTS_CREATED_TOTAL,
        "Total number of appointments booked"
    );
    describe_counter!(
        APPOINTMENTS_COMPLETED_TOTAL,
        "Total number of appointments marked completed"
    );
    describe_counter!(
        INVOICES_CREATED_TOTAL,
        "Total number of billing transactions by mode (auto/manual)"
    );
    describe_gauge!(USERS_ONLINE, "Number of users currently online");

    handle
}

/// GET /metrics - Returns Prometheus-formatted metrics.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(handle) = &state.metrics_handle else {
        return (StatusCode::NOT_FOUND, String::new());
    };

    // Refresh gauges derived from live state
    let online = state
        .presence
        .snapshot()
        .iter()
        .filter(|p| p.state == crate::presence::PresenceState::Online)
        .count();
    gauge!(USERS_ONLINE).set(online as f64);

    (StatusCode::OK, handle.render())
}
