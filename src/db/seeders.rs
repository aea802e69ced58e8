//! Database seeders for built-in data

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::permissions::{PermissionSet, Role};

/// Seed the default capability sets for the editable roles.
///
/// Runs on every startup but only inserts rows that do not exist yet, so
/// administrator edits survive restarts. The admin role is never stored: it
/// is always fully privileged and resolved in code.
pub async fn seed_role_permissions(pool: &SqlitePool) -> Result<()> {
    let mut seeded = 0;

    for role in [Role::Receptionist, Role::Doctor] {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT role FROM role_permissions WHERE role = ?")
                .bind(role.to_string())
                .fetch_optional(pool)
                .await?;

        if existing.is_none() {
            let defaults = serde_json::to_string(&PermissionSet::for_role(role))?;
            sqlx::query(
                "INSERT INTO role_permissions (role, permissions, updated_at) VALUES (?, ?, ?)",
            )
            .bind(role.to_string())
            .bind(&defaults)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
            seeded += 1;
        }
    }

    if seeded > 0 {
        info!("Seeded {} default role permission set(s)", seeded);
    }

    Ok(())
}
