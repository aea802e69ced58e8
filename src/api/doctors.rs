//! Doctor record API endpoints.
//!
//! Appointments snapshot the doctor's name and specialty at creation, so
//! edits here never rewrite history; they only affect future bookings.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, doctor::serialize_days, record_tx, CreateDoctorRequest, Doctor, UpdateDoctorRequest,
    User,
};
use crate::permissions::Capability;
use crate::AppState;

use super::auth::require_capability;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_name, validate_service_price};

fn validate_create_request(req: &CreateDoctorRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if req.specialty.trim().is_empty() {
        errors.add("specialty", "Specialty is required");
    }
    if let Err(e) = validate_service_price(&req.service_price) {
        errors.add("service_price", e);
    }

    errors.finish()
}

/// List all doctors
///
/// GET /api/doctors
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    require_capability(&state, &user, Capability::ViewDoctors)?;

    let doctors: Vec<Doctor> = sqlx::query_as("SELECT * FROM doctors ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(doctors))
}

/// Get a doctor by id
///
/// GET /api/doctors/:id
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Doctor>, ApiError> {
    require_capability(&state, &user, Capability::ViewDoctors)?;

    let doctor: Option<Doctor> = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    doctor
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Doctor not found"))
}

/// Add a doctor
///
/// POST /api/doctors
pub async fn create_doctor(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), ApiError> {
    require_capability(&state, &user, Capability::AddDoctor)?;
    validate_create_request(&req)?;

    let now = chrono::Utc::now().to_rfc3339();
    let doctor = Doctor {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        specialty: req.specialty.trim().to_string(),
        service_price: req.service_price,
        free_return_days: req.free_return_days,
        available_days: serialize_days(&req.available_days),
        created_at: now.clone(),
        updated_at: now,
    };

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO doctors
            (id, name, specialty, service_price, free_return_days, available_days, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doctor.id)
    .bind(&doctor.name)
    .bind(&doctor.specialty)
    .bind(doctor.service_price)
    .bind(doctor.free_return_days)
    .bind(&doctor.available_days)
    .bind(&doctor.created_at)
    .bind(&doctor.updated_at)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::DOCTOR_CREATE,
        serde_json::json!({ "doctorId": doctor.id, "doctorName": doctor.name }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(doctor_id = %doctor.id, specialty = %doctor.specialty, "Doctor created");

    Ok((StatusCode::CREATED, Json(doctor)))
}

/// Update a doctor (partial)
///
/// PUT /api/doctors/:id
pub async fn update_doctor(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<Doctor>, ApiError> {
    require_capability(&state, &user, Capability::EditDoctor)?;

    let existing: Option<Doctor> = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut doctor = existing.ok_or_else(|| ApiError::not_found("Doctor not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if req.service_price.is_some() {
        if let Err(e) = validate_service_price(&req.service_price) {
            errors.add("service_price", e);
        }
    }
    errors.finish()?;

    if let Some(name) = req.name {
        doctor.name = name.trim().to_string();
    }
    if let Some(specialty) = req.specialty {
        doctor.specialty = specialty.trim().to_string();
    }
    if let Some(price) = req.service_price {
        doctor.service_price = Some(price);
    }
    if let Some(days) = req.free_return_days {
        doctor.free_return_days = Some(days);
    }
    if let Some(days) = req.available_days {
        doctor.available_days = serialize_days(&days);
    }
    doctor.updated_at = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        UPDATE doctors
        SET name = ?, specialty = ?, service_price = ?, free_return_days = ?,
            available_days = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&doctor.name)
    .bind(&doctor.specialty)
    .bind(doctor.service_price)
    .bind(doctor.free_return_days)
    .bind(&doctor.available_days)
    .bind(&doctor.updated_at)
    .bind(&id)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::DOCTOR_UPDATE,
        serde_json::json!({ "doctorId": doctor.id, "doctorName": doctor.name }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    Ok(Json(doctor))
}

/// Delete a doctor
///
/// DELETE /api/doctors/:id
pub async fn delete_doctor(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_capability(&state, &user, Capability::DeleteDoctor)?;

    let existing: Option<Doctor> = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let doctor = existing.ok_or_else(|| ApiError::not_found("Doctor not found"))?;

    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM doctors WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    record_tx(
        &mut tx,
        actions::DOCTOR_DELETE,
        serde_json::json!({ "doctorId": doctor.id, "doctorName": doctor.name }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(doctor_id = %id, "Doctor deleted");

    Ok(StatusCode::NO_CONTENT)
}
