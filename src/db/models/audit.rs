//! Audit log models and recording helpers.
//!
//! Every mutating operation appends exactly one audit record. Records are
//! written inside the same database transaction as the mutation they
//! describe, so an operation and its trail either both land or neither does.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub details: Option<String>,
    pub section: String,
    pub created_at: String,
}

/// Audit record with details parsed back into JSON, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogResponse {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub section: String,
    pub created_at: String,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(log: AuditLog) -> Self {
        let details = log
            .details
            .as_deref()
            .and_then(|d| serde_json::from_str(d).ok());
        Self {
            id: log.id,
            user_id: log.user_id,
            action: log.action,
            details,
            section: log.section,
            created_at: log.created_at,
        }
    }
}

/// Response for listing audit logs with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLogResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Query parameters for filtering audit logs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    /// Filter by action (e.g., "patient.create")
    pub action: Option<String>,
    /// Filter by section (e.g., "billing")
    pub section: Option<String>,
    /// Filter by acting user ID
    pub user_id: Option<String>,
    /// Start date for filtering (ISO 8601)
    pub start_date: Option<String>,
    /// End date for filtering (ISO 8601)
    pub end_date: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 50, max 100)
    pub per_page: Option<i64>,
}

/// Audit action labels
pub mod actions {
    pub const PATIENT_CREATE: &str = "patient.create";
    pub const PATIENT_UPDATE: &str = "patient.update";
    pub const PATIENT_DELETE: &str = "patient.delete";

    pub const DOCTOR_CREATE: &str = "doctor.create";
    pub const DOCTOR_UPDATE: &str = "doctor.update";
    pub const DOCTOR_DELETE: &str = "doctor.delete";

    pub const APPOINTMENT_CREATE: &str = "appointment.create";
    pub const APPOINTMENT_STATUS_UPDATE: &str = "appointment.status_update";

    pub const TRANSACTION_CREATE_MANUAL: &str = "transaction.create_manual";
    pub const TRANSACTION_CREATE_AUTO: &str = "transaction.create_auto";

    pub const USER_CREATE: &str = "user.create";
    pub const USER_UPDATE: &str = "user.update";
    pub const USER_DELETE: &str = "user.delete";

    pub const PERMISSIONS_UPDATE: &str = "permissions.update";

    pub const AUTH_LOGIN: &str = "auth.login";
}

/// Human-facing section groupings
pub mod sections {
    pub const PATIENTS: &str = "patients";
    pub const DOCTORS: &str = "doctors";
    pub const APPOINTMENTS: &str = "appointments";
    pub const BILLING: &str = "billing";
    pub const USERS: &str = "users";
    pub const SETTINGS: &str = "settings";
    pub const GENERAL: &str = "general";
}

/// Derive the section grouping from an action label.
///
/// Actions outside the table fall back to the generic section.
pub fn section_for(action: &str) -> &'static str {
    match action {
        actions::PATIENT_CREATE | actions::PATIENT_UPDATE | actions::PATIENT_DELETE => {
            sections::PATIENTS
        }
        actions::DOCTOR_CREATE | actions::DOCTOR_UPDATE | actions::DOCTOR_DELETE => {
            sections::DOCTORS
        }
        actions::APPOINTMENT_CREATE | actions::APPOINTMENT_STATUS_UPDATE => sections::APPOINTMENTS,
        actions::TRANSACTION_CREATE_MANUAL | actions::TRANSACTION_CREATE_AUTO => sections::BILLING,
        actions::USER_CREATE | actions::USER_UPDATE | actions::USER_DELETE => sections::USERS,
        actions::PERMISSIONS_UPDATE => sections::SETTINGS,
        _ => sections::GENERAL,
    }
}

/// Append an audit record on an open transaction.
///
/// The caller is expected to have already validated the acting user while
/// loading it for the operation itself.
pub async fn record_tx(
    conn: &mut SqliteConnection,
    action: &str,
    details: serde_json::Value,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, details, section, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(action)
    .bind(details.to_string())
    .bind(section_for(action))
    .bind(&now)
    .execute(conn)
    .await?;

    tracing::debug!(action = action, user_id = user_id, "Audit log recorded");

    Ok(())
}

/// Append a standalone audit record, validating that the acting user exists.
///
/// Fails if the user record is missing (it may have been deleted between the
/// action and the logging).
pub async fn record(
    pool: &SqlitePool,
    action: &str,
    details: serde_json::Value,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(sqlx::Error::RowNotFound);
    }

    let mut conn = pool.acquire().await?;
    record_tx(&mut conn, action, details, user_id).await
}

/// List audit logs with filtering and pagination
pub async fn list_audit_logs(
    pool: &SqlitePool,
    query: &AuditLogQuery,
) -> Result<AuditLogListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // Build dynamic WHERE clause
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(action) = &query.action {
        conditions.push("action = ?");
        bindings.push(action.clone());
    }

    if let Some(section) = &query.section {
        conditions.push("section = ?");
        bindings.push(section.clone());
    }

    if let Some(user_id) = &query.user_id {
        conditions.push("user_id = ?");
        bindings.push(user_id.clone());
    }

    if let Some(start_date) = &query.start_date {
        conditions.push("created_at >= ?");
        bindings.push(start_date.clone());
    }

    if let Some(end_date) = &query.end_date {
        conditions.push("created_at <= ?");
        bindings.push(end_date.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(pool).await?;

    let sql = format!(
        "SELECT * FROM audit_logs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, AuditLog>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }
    query_builder = query_builder.bind(per_page).bind(offset);

    let items = query_builder.fetch_all(pool).await?;

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(AuditLogListResponse {
        items: items.into_iter().map(AuditLogResponse::from).collect(),
        total,
        page,
        per_page,
        total_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_lookup() {
        assert_eq!(section_for(actions::PATIENT_CREATE), sections::PATIENTS);
        assert_eq!(section_for(actions::DOCTOR_DELETE), sections::DOCTORS);
        assert_eq!(
            section_for(actions::APPOINTMENT_STATUS_UPDATE),
            sections::APPOINTMENTS
        );
        assert_eq!(
            section_for(actions::TRANSACTION_CREATE_AUTO),
            sections::BILLING
        );
        assert_eq!(section_for(actions::PERMISSIONS_UPDATE), sections::SETTINGS);
    }

    #[test]
    fn test_section_fallback_is_general() {
        assert_eq!(section_for(actions::AUTH_LOGIN), sections::GENERAL);
        assert_eq!(section_for("something.unmapped"), sections::GENERAL);
        assert_eq!(section_for(""), sections::GENERAL);
    }

    #[tokio::test]
    async fn test_record_rejects_missing_user() {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();

        let err = record(
            &pool,
            actions::AUTH_LOGIN,
            serde_json::json!({}),
            "ghost",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, role) VALUES ('u1', 'u1@c.test', 'x', 'U', 'admin')",
        )
        .execute(&pool)
        .await
        .unwrap();

        for i in 0..3 {
            record(
                &pool,
                actions::PATIENT_CREATE,
                serde_json::json!({ "n": i }),
                "u1",
            )
            .await
            .unwrap();
        }
        record(&pool, actions::DOCTOR_CREATE, serde_json::json!({}), "u1")
            .await
            .unwrap();

        // Filter by section
        let page = list_audit_logs(
            &pool,
            &AuditLogQuery {
                section: Some(sections::PATIENTS.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.items.iter().all(|l| l.action == actions::PATIENT_CREATE));

        // Paginate two at a time
        let page = list_audit_logs(
            &pool,
            &AuditLogQuery {
                per_page: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_details_round_trip() {
        let log = AuditLog {
            id: "l1".to_string(),
            user_id: "u1".to_string(),
            action: actions::PATIENT_CREATE.to_string(),
            details: Some(r#"{"patientName":"Ali"}"#.to_string()),
            section: sections::PATIENTS.to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let response = AuditLogResponse::from(log);
        assert_eq!(
            response.details.unwrap()["patientName"],
            serde_json::json!("Ali")
        );
    }
}
