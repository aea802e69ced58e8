//! AI helper endpoints: patient-history summaries and billing-service
//! suggestions.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ai;
use crate::db::{Appointment, Patient, User};
use crate::permissions::Capability;
use crate::AppState;

use super::auth::require_capability;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SummarizeHistoryRequest {
    pub patient_id: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeHistoryResponse {
    pub summary: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestServiceRequest {
    pub patient_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestServiceResponse {
    pub service: String,
}

/// Summarize a patient's visit history
///
/// POST /api/ai/summarize-history
pub async fn summarize_history(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<SummarizeHistoryRequest>,
) -> Result<Json<SummarizeHistoryResponse>, ApiError> {
    require_capability(&state, &user, Capability::ViewPatients)?;

    let generator = state
        .text_generator
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("AI helpers are not configured"))?;

    let patient: Option<Patient> = sqlx::query_as("SELECT * FROM patients WHERE id = ?")
        .bind(&req.patient_id)
        .fetch_optional(&state.db)
        .await?;
    let patient = patient.ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let appointments: Vec<Appointment> = sqlx::query_as(
        "SELECT * FROM appointments WHERE patient_id = ? ORDER BY date_time DESC LIMIT 20",
    )
    .bind(&patient.id)
    .fetch_all(&state.db)
    .await?;

    let summary = ai::summarize_patient_history(generator.as_ref(), &patient, &appointments)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Summary generation failed");
            ApiError::external_service("The text-generation service is unavailable")
        })?;

    Ok(Json(SummarizeHistoryResponse { summary }))
}

/// Suggest a billing service label from recent appointments
///
/// POST /api/ai/suggest-service
pub async fn suggest_service(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<SuggestServiceRequest>,
) -> Result<Json<SuggestServiceResponse>, ApiError> {
    require_capability(&state, &user, Capability::AddTransaction)?;

    let generator = state
        .text_generator
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("AI helpers are not configured"))?;

    let recent: Vec<Appointment> = sqlx::query_as(
        "SELECT * FROM appointments WHERE patient_id = ? ORDER BY date_time DESC LIMIT 10",
    )
    .bind(&req.patient_id)
    .fetch_all(&state.db)
    .await?;

    if recent.is_empty() {
        return Err(ApiError::not_found(
            "No appointments found for this patient",
        ));
    }

    let service = ai::suggest_billing_service(generator.as_ref(), &req.patient_id, &recent)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Service suggestion failed");
            ApiError::external_service("The text-generation service is unavailable")
        })?;

    Ok(Json(SuggestServiceResponse { service }))
}
