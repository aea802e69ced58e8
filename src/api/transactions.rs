//! Billing transaction API endpoints.
//!
//! The ledger is append-only: transactions can be listed and created, never
//! edited or voided.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use std::sync::Arc;

use crate::db::{
    actions, record_tx, CreateTransactionRequest, Patient, Transaction, TransactionQuery, User,
};
use crate::permissions::Capability;
use crate::AppState;

use super::auth::require_capability;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::INVOICES_CREATED_TOTAL;
use super::validation::validate_amount;

/// List transactions with optional filters
///
/// GET /api/transactions
///
/// Query parameters: patient_id, status, from, to
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    require_capability(&state, &user, Capability::ViewBilling)?;

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(patient_id) = &query.patient_id {
        conditions.push("patient_id = ?");
        bindings.push(patient_id.clone());
    }
    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(status.clone());
    }
    if let Some(from) = &query.from {
        conditions.push("date >= ?");
        bindings.push(from.clone());
    }
    if let Some(to) = &query.to {
        conditions.push("date <= ?");
        bindings.push(to.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT * FROM transactions {} ORDER BY date DESC",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, Transaction>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }

    let transactions = query_builder.fetch_all(&state.db).await?;

    Ok(Json(transactions))
}

/// Record a manual transaction
///
/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    require_capability(&state, &user, Capability::AddTransaction)?;

    let mut errors = ValidationErrorBuilder::new();
    if req.patient_id.is_empty() {
        errors.add("patient_id", "Patient is required");
    }
    if let Err(e) = validate_amount(req.amount) {
        errors.add("amount", e);
    }
    errors.finish()?;

    let patient: Option<Patient> = sqlx::query_as("SELECT * FROM patients WHERE id = ?")
        .bind(&req.patient_id)
        .fetch_optional(&state.db)
        .await?;
    let patient = patient.ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let transaction = Transaction {
        id: uuid::Uuid::new_v4().to_string(),
        patient_id: patient.id.clone(),
        patient_name: patient.name.clone(),
        appointment_id: None,
        date: chrono::Utc::now().to_rfc3339(),
        amount: req.amount,
        status: req.status.to_string(),
        service: req.service.clone(),
        created_by: user.id.clone(),
    };

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO transactions
            (id, patient_id, patient_name, appointment_id, date, amount, status, service, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&transaction.id)
    .bind(&transaction.patient_id)
    .bind(&transaction.patient_name)
    .bind(&transaction.appointment_id)
    .bind(&transaction.date)
    .bind(transaction.amount)
    .bind(&transaction.status)
    .bind(&transaction.service)
    .bind(&transaction.created_by)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::TRANSACTION_CREATE_MANUAL,
        serde_json::json!({
            "transactionId": transaction.id,
            "patientName": transaction.patient_name,
            "amount": transaction.amount,
        }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    counter!(INVOICES_CREATED_TOTAL, "mode" => "manual").increment(1);

    tracing::info!(
        transaction_id = %transaction.id,
        amount = transaction.amount,
        "Manual transaction recorded"
    );

    Ok((StatusCode::CREATED, Json(transaction)))
}
