//! Audit log API endpoints and helpers.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::db::{audit, AuditLogListResponse, AuditLogQuery, User};
use crate::permissions::Capability;
use crate::AppState;

use super::auth::require_capability;
use super::error::ApiError;

/// Append an audit record outside a transaction, swallowing failures.
///
/// Only for paths where failing the parent operation is worse than a gap in
/// the trail (login). Mutating endpoints record inside their own database
/// transaction instead.
pub async fn audit_best_effort(
    state: &AppState,
    action: &str,
    details: serde_json::Value,
    user_id: &str,
) {
    if let Err(e) = audit::record(&state.db, action, details, user_id).await {
        tracing::warn!(
            action = action,
            user_id = user_id,
            error = %e,
            "Failed to create audit log entry"
        );
    }
}

/// List audit logs with filtering and pagination
///
/// Query parameters:
/// - action: Filter by action (e.g., "patient.create")
/// - section: Filter by section (e.g., "billing")
/// - user_id: Filter by acting user
/// - start_date / end_date: Date range filter (ISO 8601)
/// - page / per_page: Pagination (defaults 1 / 50, max 100)
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, ApiError> {
    require_capability(&state, &user, Capability::ViewAuditLog)?;

    let result = audit::list_audit_logs(&state.db, &query).await?;
    Ok(Json(result))
}

/// Get distinct action types for filtering UI
pub async fn list_action_types(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<String>>, ApiError> {
    require_capability(&state, &user, Capability::ViewAuditLog)?;

    let actions: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT action FROM audit_logs ORDER BY action")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(actions.into_iter().map(|(a,)| a).collect()))
}

/// Get distinct sections for filtering UI
pub async fn list_sections(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<String>>, ApiError> {
    require_capability(&state, &user, Capability::ViewAuditLog)?;

    let sections: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT section FROM audit_logs ORDER BY section")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(sections.into_iter().map(|(s,)| s).collect()))
}
