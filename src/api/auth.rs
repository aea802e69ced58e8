//! Authentication: password hashing, session tokens, and the server-side
//! authorization gate.
//!
//! Permission checks happen here on every protected request — the UI hiding
//! a button is never the enforcement boundary.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::db::{actions, DbPool, LoginRequest, LoginResponse, Session, User, UserResponse};
use crate::permissions::Capability;
use crate::AppState;
use serde::{Deserialize, Serialize};

use super::audit::audit_best_effort;
use super::error::ApiError;

/// Response for setup status check
#[derive(Serialize)]
pub struct SetupStatusResponse {
    pub needs_setup: bool,
}

/// Request for initial setup
#[derive(Deserialize)]
pub struct SetupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate password strength.
/// Returns None if valid, or Some(error_message) if invalid
fn validate_password_strength(password: &str) -> Option<String> {
    if password.len() < 12 {
        return Some("Password must be at least 12 characters".to_string());
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_uppercase {
        return Some("Password must contain at least one uppercase letter".to_string());
    }
    if !has_lowercase {
        return Some("Password must contain at least one lowercase letter".to_string());
    }
    if !has_digit {
        return Some("Password must contain at least one digit".to_string());
    }

    None
}

/// Check that the acting user's role grants a capability.
///
/// The lookup is fail-closed: a user whose role string is unknown gets the
/// all-false set and every check is denied.
pub fn require_capability(
    state: &AppState,
    user: &User,
    capability: Capability,
) -> Result<(), ApiError> {
    let permissions = state.permissions.permissions_for_str(&user.role);
    if permissions.allows(capability) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "This action requires the {} permission",
            capability
        )))
    }
}

/// Create a session for a user and return the raw token
async fn create_session(db: &DbPool, user_id: &str, session_days: i64) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);

    let expires_at = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(session_days))
        .unwrap_or_else(chrono::Utc::now)
        .to_rfc3339();

    let session_id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&session_id)
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .execute(db)
        .await?;

    Ok(token)
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_days)
        .await
        .map_err(ApiError::from)?;

    // Best-effort: a failed audit write must not lock operators out
    audit_best_effort(
        &state,
        actions::AUTH_LOGIN,
        serde_json::json!({ "email": user.email }),
        &user.id,
    )
    .await;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Validate token endpoint
pub async fn validate(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> impl IntoResponse {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return StatusCode::UNAUTHORIZED,
    };

    let token_hash = hash_token(token);

    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await
    .ok()
    .flatten();

    match session {
        Some(_) => StatusCode::OK,
        None => StatusCode::UNAUTHORIZED,
    }
}

/// Auth middleware that validates tokens
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = match token_from_request(&request) {
        Some(token) => token,
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    // First check the static admin token from config, in constant time
    let admin_token = state.config.auth.admin_token.as_bytes();
    let provided = token.as_bytes();
    if admin_token.len() == provided.len() && admin_token.ct_eq(provided).into() {
        return Ok(next.run(request).await);
    }

    // Otherwise, check for a valid session
    let token_hash = hash_token(&token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    match session {
        Some(_) => Ok(next.run(request).await),
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Extract a token from headers or, for WebSocket/EventSource clients that
/// cannot set custom headers, the `token` query parameter.
fn token_from_request(request: &Request<Body>) -> Option<String> {
    if let Some(header) = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        return Some(header.strip_prefix("Bearer ").unwrap_or(header).to_string());
    }

    if let Some(api_key) = request.headers().get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return Some(api_key.to_string());
    }

    request.uri().query().and_then(|q| {
        q.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next()?;
            if key == "token" {
                Some(value.to_string())
            } else {
                None
            }
        })
    })
}

/// Check if initial setup is needed (no users exist)
pub async fn setup_status(State(state): State<Arc<AppState>>) -> Json<SetupStatusResponse> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await
        .unwrap_or((0,));

    Json(SetupStatusResponse {
        needs_setup: count.0 == 0,
    })
}

/// Initial setup endpoint - creates the first admin user
pub async fn setup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;

    if count.0 > 0 {
        return Err(ApiError::forbidden("Setup has already been completed"));
    }

    if request.email.is_empty() || !request.email.contains('@') {
        return Err(ApiError::validation_field("email", "Invalid email address"));
    }
    if let Some(error) = validate_password_strength(&request.password) {
        return Err(ApiError::validation_field("password", error));
    }
    if request.name.is_empty() {
        return Err(ApiError::validation_field("name", "Name is required"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query("INSERT INTO users (id, email, password_hash, name, role) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(&request.name)
        .bind("admin")
        .execute(&state.db)
        .await?;

    tracing::info!("Created admin user during setup: {}", request.email);

    let token = create_session(&state.db, &id, state.config.auth.session_days).await?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse {
            id,
            email: request.email,
            name: request.name,
            role: "admin".to_string(),
        },
    }))
}

/// Ensure the bootstrap administrator account from the configuration exists.
pub async fn ensure_admin_user(db: &DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_optional(db)
            .await?;

    if existing.map(|(count,)| count).unwrap_or(0) > 0 {
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    sqlx::query("INSERT INTO users (id, email, password_hash, name, role) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(email)
        .bind(&password_hash)
        .bind("Administrator")
        .bind("admin")
        .execute(db)
        .await?;

    tracing::info!("Created bootstrap admin user: {}", email);
    Ok(())
}

/// Get the current user from a token
pub async fn get_current_user(
    pool: &DbPool,
    config: &crate::config::Config,
    token: &str,
) -> Result<User, StatusCode> {
    // For the static admin token, return a synthetic system user
    if token == config.auth.admin_token {
        let now = chrono::Utc::now().to_rfc3339();
        return Ok(User {
            id: "system".to_string(),
            email: "system@clinicore.local".to_string(),
            password_hash: String::new(),
            name: "System Admin".to_string(),
            role: "admin".to_string(),
            created_at: now.clone(),
            updated_at: now,
        });
    }

    let token_hash = hash_token(token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let session = session.ok_or(StatusCode::UNAUTHORIZED)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    user.ok_or(StatusCode::UNAUTHORIZED)
}

/// Extract the token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    headers
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Extractor for getting the current authenticated user from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
        get_current_user(&state.db, &state.config, &token).await
    }
}

/// Token validation for WebSocket endpoints, which pass the token as a
/// query parameter.
pub async fn user_from_ws_token(state: &AppState, token: Option<&str>) -> Option<User> {
    let token = token?;
    get_current_user(&state.db, &state.config, token).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("Sup3rSecretPass!").unwrap();
        assert!(verify_password("Sup3rSecretPass!", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_hash_is_deterministic() {
        let token = "abc123";
        assert_eq!(hash_token(token), hash_token(token));
        assert_ne!(hash_token(token), hash_token("abc124"));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Str0ngEnoughPw").is_none());

        assert!(validate_password_strength("short1A").is_some());
        assert!(validate_password_strength("alllowercase123").is_some());
        assert!(validate_password_strength("ALLUPPERCASE123").is_some());
        assert!(validate_password_strength("NoDigitsInHerePw").is_some());
    }
}
