//! User administration API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, record_tx, CreateUserRequest, UpdateUserRequest, User, UserResponse,
};
use crate::permissions::{Capability, Role};
use crate::AppState;

use super::auth::{hash_password, require_capability};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name};

fn validate_role(role: &str) -> Result<Role, String> {
    role.parse::<Role>()
        .map_err(|_| "Invalid role. Must be one of: admin, receptionist, doctor".to_string())
}

/// List all users
///
/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_capability(&state, &user, Capability::ManageUsers)?;

    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create a user account
///
/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_capability(&state, &user, Capability::AddUser)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if req.password.len() < 8 {
        errors.add("password", "Password must be at least 8 characters");
    }
    if let Err(e) = validate_role(&req.role) {
        errors.add("role", e);
    }
    errors.finish()?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("A user with this email already exists"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.name)
    .bind(&req.role)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::USER_CREATE,
        serde_json::json!({ "userId": id, "email": req.email, "role": req.role }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %id, role = %req.role, "User created");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id,
            email: req.email,
            name: req.name,
            role: req.role,
        }),
    ))
}

/// Update a user account (partial; role changes require editUser)
///
/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_capability(&state, &user, Capability::EditUser)?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut target = existing.ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Some(email) = &req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    if let Some(role) = &req.role {
        if let Err(e) = validate_role(role) {
            errors.add("role", e);
        }
    }
    if let Some(password) = &req.password {
        if password.len() < 8 {
            errors.add("password", "Password must be at least 8 characters");
        }
    }
    errors.finish()?;

    if let Some(name) = req.name {
        target.name = name;
    }
    if let Some(email) = req.email {
        target.email = email;
    }
    if let Some(role) = req.role {
        target.role = role;
    }
    if let Some(password) = req.password {
        target.password_hash = hash_password(&password)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    }
    target.updated_at = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, name = ?, role = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&target.email)
    .bind(&target.password_hash)
    .bind(&target.name)
    .bind(&target.role)
    .bind(&target.updated_at)
    .bind(&id)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::USER_UPDATE,
        serde_json::json!({ "userId": target.id, "role": target.role }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    Ok(Json(UserResponse::from(target)))
}

/// Delete a user account
///
/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_capability(&state, &user, Capability::DeleteUser)?;

    if user.id == id {
        return Err(ApiError::conflict("You cannot delete your own account"));
    }

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let target = existing.ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    record_tx(
        &mut tx,
        actions::USER_DELETE,
        serde_json::json!({ "userId": target.id, "email": target.email }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
