//! Role permission administration endpoints.
//!
//! Edits apply to the in-memory registry and are persisted per role, so
//! they survive restarts. The admin role is rejected before anything is
//! touched: it is always fully privileged.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{actions, record_tx, User};
use crate::permissions::{Capability, PermissionSet, Role};
use crate::AppState;

use super::auth::require_capability;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SetCapabilityRequest {
    pub capability: Capability,
    pub value: bool,
}

/// Get the effective capability set for a role
///
/// GET /api/permissions/:role
///
/// Unknown roles resolve to the all-false set rather than an error; the
/// fail-closed default is part of the contract.
pub async fn get_role_permissions(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(role): Path<String>,
) -> Result<Json<PermissionSet>, ApiError> {
    require_capability(&state, &user, Capability::ManageSettings)?;

    Ok(Json(state.permissions.permissions_for_str(&role)))
}

/// Update one capability in a role's set
///
/// PUT /api/permissions/:role
pub async fn set_role_capability(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(role): Path<String>,
    Json(req): Json<SetCapabilityRequest>,
) -> Result<Json<PermissionSet>, ApiError> {
    require_capability(&state, &user, Capability::ManageSettings)?;

    let role: Role = role
        .parse()
        .map_err(|e: String| ApiError::validation_field("role", e))?;

    // Updates the working copy; rejects the admin role
    let updated = state.permissions.set_capability(role, req.capability, req.value)?;

    // Persist the edited set so it survives restarts
    let json = serde_json::to_string(&updated)
        .map_err(|e| ApiError::internal(format!("Failed to serialize permissions: {}", e)))?;

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO role_permissions (role, permissions, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(role) DO UPDATE SET permissions = excluded.permissions,
                                        updated_at = excluded.updated_at
        "#,
    )
    .bind(role.to_string())
    .bind(&json)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::PERMISSIONS_UPDATE,
        serde_json::json!({
            "role": role.to_string(),
            "capability": req.capability.to_string(),
            "value": req.value,
        }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        role = %role,
        capability = %req.capability,
        value = req.value,
        "Role permissions updated"
    );

    Ok(Json(updated))
}
