//! Patient record API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, record_tx, CreatePatientRequest, Patient, UpdatePatientRequest, User,
};
use crate::permissions::Capability;
use crate::AppState;

use super::auth::require_capability;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_dob, validate_name, validate_phone};

fn validate_create_request(req: &CreatePatientRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }
    if let Err(e) = validate_dob(&req.dob) {
        errors.add("dob", e);
    }
    if req.gender.trim().is_empty() {
        errors.add("gender", "Gender is required");
    }

    errors.finish()
}

/// List all patients
///
/// GET /api/patients
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Patient>>, ApiError> {
    require_capability(&state, &user, Capability::ViewPatients)?;

    let patients: Vec<Patient> = sqlx::query_as("SELECT * FROM patients ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(patients))
}

/// Get a patient by id
///
/// GET /api/patients/:id
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    require_capability(&state, &user, Capability::ViewPatients)?;

    let patient: Option<Patient> = sqlx::query_as("SELECT * FROM patients WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    patient
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Patient not found"))
}

/// Create a new patient record
///
/// POST /api/patients
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    require_capability(&state, &user, Capability::AddPatient)?;
    validate_create_request(&req)?;

    let now = chrono::Utc::now().to_rfc3339();
    let patient = Patient {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        dob: req.dob.clone().filter(|d| !d.is_empty()),
        gender: req.gender.clone(),
        phone: req.phone.clone(),
        address: req.address.clone(),
        created_at: now.clone(),
        updated_at: now,
    };

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO patients (id, name, dob, gender, phone, address, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&patient.id)
    .bind(&patient.name)
    .bind(&patient.dob)
    .bind(&patient.gender)
    .bind(&patient.phone)
    .bind(&patient.address)
    .bind(&patient.created_at)
    .bind(&patient.updated_at)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::PATIENT_CREATE,
        serde_json::json!({ "patientId": patient.id, "patientName": patient.name }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(patient_id = %patient.id, "Patient created");

    Ok((StatusCode::CREATED, Json(patient)))
}

/// Update a patient record (partial)
///
/// PUT /api/patients/:id
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    require_capability(&state, &user, Capability::EditPatient)?;

    let existing: Option<Patient> = sqlx::query_as("SELECT * FROM patients WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut patient = existing.ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Some(phone) = &req.phone {
        if let Err(e) = validate_phone(phone) {
            errors.add("phone", e);
        }
    }
    if req.dob.is_some() {
        if let Err(e) = validate_dob(&req.dob) {
            errors.add("dob", e);
        }
    }
    errors.finish()?;

    if let Some(name) = req.name {
        patient.name = name.trim().to_string();
    }
    if let Some(dob) = req.dob {
        patient.dob = if dob.is_empty() { None } else { Some(dob) };
    }
    if let Some(gender) = req.gender {
        patient.gender = gender;
    }
    if let Some(phone) = req.phone {
        patient.phone = phone;
    }
    if let Some(address) = req.address {
        patient.address = if address.is_empty() { None } else { Some(address) };
    }
    patient.updated_at = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        UPDATE patients
        SET name = ?, dob = ?, gender = ?, phone = ?, address = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&patient.name)
    .bind(&patient.dob)
    .bind(&patient.gender)
    .bind(&patient.phone)
    .bind(&patient.address)
    .bind(&patient.updated_at)
    .bind(&id)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::PATIENT_UPDATE,
        serde_json::json!({ "patientId": patient.id, "patientName": patient.name }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    Ok(Json(patient))
}

/// Delete a patient record
///
/// DELETE /api/patients/:id
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_capability(&state, &user, Capability::DeletePatient)?;

    let existing: Option<Patient> = sqlx::query_as("SELECT * FROM patients WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let patient = existing.ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM patients WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    record_tx(
        &mut tx,
        actions::PATIENT_DELETE,
        serde_json::json!({ "patientId": patient.id, "patientName": patient.name }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(patient_id = %id, "Patient deleted");

    Ok(StatusCode::NO_CONTENT)
}
