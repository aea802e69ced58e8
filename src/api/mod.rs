mod ai;
mod appointments;
mod audit;
pub mod auth;
mod doctors;
pub mod error;
pub mod metrics;
mod patients;
mod permissions;
mod presence;
mod transactions;
mod users;
mod validation;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/validate", get(auth::validate))
        .route("/setup-status", get(auth::setup_status))
        .route("/setup", post(auth::setup));

    // WebSocket routes (auth handled in handlers via query param)
    let ws_routes = Router::new().route("/presence/ws", get(presence::presence_ws));

    // Protected API routes
    let api_routes = Router::new()
        // Patients
        .route("/patients", get(patients::list_patients))
        .route("/patients", post(patients::create_patient))
        .route("/patients/:id", get(patients::get_patient))
        .route("/patients/:id", put(patients::update_patient))
        .route("/patients/:id", delete(patients::delete_patient))
        // Doctors
        .route("/doctors", get(doctors::list_doctors))
        .route("/doctors", post(doctors::create_doctor))
        .route("/doctors/:id", get(doctors::get_doctor))
        .route("/doctors/:id", put(doctors::update_doctor))
        .route("/doctors/:id", delete(doctors::delete_doctor))
        // Appointments
        .route("/appointments", get(appointments::list_appointments))
        .route("/appointments", post(appointments::create_appointment))
        .route("/appointments/:id", get(appointments::get_appointment))
        .route("/appointments/:id/status", put(appointments::update_appointment_status))
        // Billing
        .route("/transactions", get(transactions::list_transactions))
        .route("/transactions", post(transactions::create_transaction))
        // Users
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        // Role permissions
        .route("/permissions/:role", get(permissions::get_role_permissions))
        .route("/permissions/:role", put(permissions::set_role_capability))
        // Audit trail
        .route("/audit-logs", get(audit::list_logs))
        .route("/audit-logs/actions", get(audit::list_action_types))
        .route("/audit-logs/sections", get(audit::list_sections))
        // Presence
        .route("/presence", get(presence::list_presence))
        // AI helpers
        .route("/ai/summarize-history", post(ai::summarize_history))
        .route("/ai/suggest-service", post(ai::suggest_service))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        // Merge WS routes (they handle their own auth)
        .merge(ws_routes);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
