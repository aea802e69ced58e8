//! Appointment API endpoints.
//!
//! Status changes go through the scheduling engine, which performs the
//! update, any automatic invoicing, and the audit trail atomically.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use std::sync::Arc;

use crate::db::{
    Appointment, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest,
    UpdateAppointmentStatusRequest, User,
};
use crate::permissions::Capability;
use crate::scheduling::{self, TransitionOutcome};
use crate::AppState;

use super::auth::require_capability;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::{APPOINTMENTS_COMPLETED_TOTAL, APPOINTMENTS_CREATED_TOTAL, INVOICES_CREATED_TOTAL};
use super::validation::validate_date_time;

/// List appointments with optional filters
///
/// GET /api/appointments
///
/// Query parameters: patient_id, doctor_id, status, from, to
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    require_capability(&state, &user, Capability::ViewAppointments)?;

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(patient_id) = &query.patient_id {
        conditions.push("patient_id = ?");
        bindings.push(patient_id.clone());
    }
    if let Some(doctor_id) = &query.doctor_id {
        conditions.push("doctor_id = ?");
        bindings.push(doctor_id.clone());
    }
    if let Some(status) = &query.status {
        // Reject unknown statuses instead of silently matching nothing
        status
            .parse::<AppointmentStatus>()
            .map_err(|e| ApiError::validation_field("status", e))?;
        conditions.push("status = ?");
        bindings.push(status.clone());
    }
    if let Some(from) = &query.from {
        conditions.push("date_time >= ?");
        bindings.push(from.clone());
    }
    if let Some(to) = &query.to {
        conditions.push("date_time <= ?");
        bindings.push(to.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT * FROM appointments {} ORDER BY date_time DESC",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, Appointment>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }

    let appointments = query_builder.fetch_all(&state.db).await?;

    Ok(Json(appointments))
}

/// Get an appointment by id
///
/// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    require_capability(&state, &user, Capability::ViewAppointments)?;

    let appointment: Option<Appointment> = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    appointment
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Appointment not found"))
}

/// Book an appointment
///
/// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    require_capability(&state, &user, Capability::AddAppointment)?;

    let mut errors = ValidationErrorBuilder::new();
    if req.patient_id.is_empty() {
        errors.add("patient_id", "Patient is required");
    }
    if req.doctor_id.is_empty() {
        errors.add("doctor_id", "Doctor is required");
    }
    if let Err(e) = validate_date_time(&req.date_time) {
        errors.add("date_time", e);
    }
    errors.finish()?;

    let appointment = scheduling::create_appointment(&state.db, &req, &user.id).await?;

    counter!(APPOINTMENTS_CREATED_TOTAL).increment(1);

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Change an appointment's status
///
/// PUT /api/appointments/:id/status
///
/// A transition to `Completed` automatically invoices the doctor's
/// consultation fee when one is configured; the response carries the
/// created invoice so the UI can surface it.
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    require_capability(&state, &user, Capability::EditAppointment)?;

    let outcome = scheduling::transition_status(&state.db, &id, req.status, &user.id).await?;

    if req.status == AppointmentStatus::Completed {
        counter!(APPOINTMENTS_COMPLETED_TOTAL).increment(1);
    }
    if outcome.invoice.is_some() {
        counter!(INVOICES_CREATED_TOTAL, "mode" => "auto").increment(1);
    }

    Ok(Json(outcome))
}
