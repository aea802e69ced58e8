//! Appointment lifecycle engine.
//!
//! Owns the two write paths of the scheduling core: creating an appointment
//! (which snapshots the patient and doctor fields) and moving an appointment
//! through its status lifecycle. A transition to `Completed` conditionally
//! creates a billing transaction for the doctor's consultation fee.
//!
//! Every operation runs inside a single database transaction together with
//! its audit records: the status update, the invoice, and the audit trail
//! either all commit or all roll back. There is no partial success.

use serde::Serialize;
use thiserror::Error;

use crate::db::{
    actions, record_tx, Appointment, AppointmentStatus, CreateAppointmentRequest, DbPool, Doctor,
    Patient, Transaction, TransactionStatus, User,
};

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),
    #[error("Patient not found: {0}")]
    PatientNotFound(String),
    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Result of a status transition
#[derive(Debug, Serialize)]
pub struct TransitionOutcome {
    pub appointment: Appointment,
    /// The invoice created by a `Completed` transition, when the doctor has
    /// a configured consultation fee
    pub invoice: Option<Transaction>,
}

/// Create an appointment in the `Scheduled` state.
///
/// The patient's name and the doctor's name/specialty are copied onto the
/// appointment at this moment and are not kept in sync with later edits;
/// `snapshot_at` records when the copy was taken.
pub async fn create_appointment(
    db: &DbPool,
    req: &CreateAppointmentRequest,
    acting_user_id: &str,
) -> Result<Appointment, SchedulingError> {
    let mut tx = db.begin().await?;

    let user = load_user(&mut tx, acting_user_id).await?;

    let patient: Option<Patient> = sqlx::query_as("SELECT * FROM patients WHERE id = ?")
        .bind(&req.patient_id)
        .fetch_optional(&mut *tx)
        .await?;
    let patient = patient.ok_or_else(|| SchedulingError::PatientNotFound(req.patient_id.clone()))?;

    let doctor: Option<Doctor> = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
        .bind(&req.doctor_id)
        .fetch_optional(&mut *tx)
        .await?;
    let doctor = doctor.ok_or_else(|| SchedulingError::DoctorNotFound(req.doctor_id.clone()))?;

    let now = chrono::Utc::now().to_rfc3339();
    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        patient_id: patient.id.clone(),
        patient_name: patient.name.clone(),
        doctor_id: doctor.id.clone(),
        doctor_name: doctor.name.clone(),
        doctor_specialty: doctor.specialty.clone(),
        date_time: req.date_time.clone(),
        status: AppointmentStatus::Scheduled.to_string(),
        snapshot_at: now.clone(),
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO appointments
            (id, patient_id, patient_name, doctor_id, doctor_name, doctor_specialty,
             date_time, status, snapshot_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&appointment.id)
    .bind(&appointment.patient_id)
    .bind(&appointment.patient_name)
    .bind(&appointment.doctor_id)
    .bind(&appointment.doctor_name)
    .bind(&appointment.doctor_specialty)
    .bind(&appointment.date_time)
    .bind(&appointment.status)
    .bind(&appointment.snapshot_at)
    .bind(&appointment.created_at)
    .bind(&appointment.updated_at)
    .execute(&mut *tx)
    .await?;

    record_tx(
        &mut tx,
        actions::APPOINTMENT_CREATE,
        serde_json::json!({
            "appointmentId": appointment.id,
            "patientName": appointment.patient_name,
            "doctorName": appointment.doctor_name,
        }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        appointment_id = %appointment.id,
        patient_id = %appointment.patient_id,
        doctor_id = %appointment.doctor_id,
        "Appointment created"
    );

    Ok(appointment)
}

/// Move an appointment to a new status.
///
/// On a transition to `Completed`, the appointment's doctor is looked up:
/// if the doctor has a consultation fee configured, exactly one billing
/// transaction is created for it, together with its own audit record. A
/// doctor with no fee produces no invoice. A missing doctor row aborts the
/// whole operation.
///
/// Re-asserting the current status is allowed and still writes one
/// status-change audit record.
pub async fn transition_status(
    db: &DbPool,
    appointment_id: &str,
    new_status: AppointmentStatus,
    acting_user_id: &str,
) -> Result<TransitionOutcome, SchedulingError> {
    let mut tx = db.begin().await?;

    let user = load_user(&mut tx, acting_user_id).await?;

    let appointment: Option<Appointment> = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
        .bind(appointment_id)
        .fetch_optional(&mut *tx)
        .await?;
    let mut appointment = appointment
        .ok_or_else(|| SchedulingError::AppointmentNotFound(appointment_id.to_string()))?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
        .bind(new_status.to_string())
        .bind(&now)
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?;
    appointment.status = new_status.to_string();
    appointment.updated_at = now.clone();

    let mut invoice = None;
    if new_status == AppointmentStatus::Completed {
        let doctor: Option<Doctor> = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
            .bind(&appointment.doctor_id)
            .fetch_optional(&mut *tx)
            .await?;
        let doctor = doctor
            .ok_or_else(|| SchedulingError::DoctorNotFound(appointment.doctor_id.clone()))?;

        if let Some(price) = doctor.service_price {
            let transaction = Transaction {
                id: uuid::Uuid::new_v4().to_string(),
                patient_id: appointment.patient_id.clone(),
                patient_name: appointment.patient_name.clone(),
                appointment_id: Some(appointment.id.clone()),
                date: now.clone(),
                amount: price,
                status: TransactionStatus::Success.to_string(),
                service: Some(format!("{} Consultation", doctor.specialty)),
                created_by: user.id.clone(),
            };

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
                actions::TRANSACTION_CREATE_AUTO,
                serde_json::json!({
                    "transactionId": transaction.id,
                    "patientName": transaction.patient_name,
                    "amount": transaction.amount,
                }),
                &user.id,
            )
            .await?;

            tracing::info!(
                appointment_id = %appointment.id,
                amount = price,
                "Invoice created for completed appointment"
            );

            invoice = Some(transaction);
        } else {
            tracing::info!(
                appointment_id = %appointment.id,
                doctor_id = %doctor.id,
                "No consultation fee configured, skipping invoice"
            );
        }
    }

    record_tx(
        &mut tx,
        actions::APPOINTMENT_STATUS_UPDATE,
        serde_json::json!({
            "appointmentId": appointment.id,
            "newStatus": new_status.to_string(),
        }),
        &user.id,
    )
    .await?;

    tx.commit().await?;

    Ok(TransitionOutcome {
        appointment,
        invoice,
    })
}

async fn load_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user_id: &str,
) -> Result<User, SchedulingError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    user.ok_or_else(|| SchedulingError::UserNotFound(user_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AuditLog, DbPool};

    async fn test_pool() -> DbPool {
        crate::db::connect("sqlite::memory:").await.unwrap()
    }

    async fn insert_user(pool: &DbPool, id: &str) {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, role) VALUES (?, ?, 'x', 'Test User', 'receptionist')",
        )
        .bind(id)
        .bind(format!("{}@clinic.test", id))
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_patient(pool: &DbPool, id: &str, name: &str) {
        sqlx::query("INSERT INTO patients (id, name, gender, phone) VALUES (?, ?, 'male', '555')")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn insert_doctor(pool: &DbPool, id: &str, specialty: &str, price: Option<i64>) {
        sqlx::query(
            "INSERT INTO doctors (id, name, specialty, service_price) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("Dr. {}", id))
        .bind(specialty)
        .bind(price)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn scheduled_appointment(pool: &DbPool, user: &str) -> Appointment {
        create_appointment(
            pool,
            &CreateAppointmentRequest {
                patient_id: "p1".to_string(),
                doctor_id: "d1".to_string(),
                date_time: "2025-06-01T10:00:00Z".to_string(),
            },
            user,
        )
        .await
        .unwrap()
    }

    async fn audit_entries(pool: &DbPool, action: &str) -> Vec<AuditLog> {
        sqlx::query_as("SELECT * FROM audit_logs WHERE action = ? ORDER BY created_at")
            .bind(action)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    async fn transaction_rows(pool: &DbPool) -> Vec<Transaction> {
        sqlx::query_as("SELECT * FROM transactions")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_appointment_snapshots_names() {
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", Some(5000)).await;

        let appointment = scheduled_appointment(&pool, "u1").await;
        assert_eq!(appointment.patient_name, "Ali");
        assert_eq!(appointment.doctor_name, "Dr. d1");
        assert_eq!(appointment.doctor_specialty, "Cardiology");
        assert_eq!(appointment.status, "Scheduled");

        // Edit the doctor after creation; the snapshot must not move
        sqlx::query("UPDATE doctors SET name = 'Dr. Renamed', specialty = 'Dermatology' WHERE id = 'd1'")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE patients SET name = 'Someone Else' WHERE id = 'p1'")
            .execute(&pool)
            .await
            .unwrap();

        let reread: Appointment = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
            .bind(&appointment.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(reread.patient_name, "Ali");
        assert_eq!(reread.doctor_name, "Dr. d1");
        assert_eq!(reread.doctor_specialty, "Cardiology");

        let created = audit_entries(&pool, actions::APPOINTMENT_CREATE).await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].user_id, "u1");
        assert_eq!(created[0].section, "appointments");
    }

    #[tokio::test]
    async fn test_completion_creates_exactly_one_invoice() {
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", Some(5000)).await;
        let appointment = scheduled_appointment(&pool, "u1").await;

        let outcome =
            transition_status(&pool, &appointment.id, AppointmentStatus::Completed, "u1")
                .await
                .unwrap();

        assert_eq!(outcome.appointment.status, "Completed");

        let invoice = outcome.invoice.expect("invoice should be created");
        assert_eq!(invoice.amount, 5000);
        assert_eq!(invoice.status, "Success");
        assert_eq!(invoice.patient_id, "p1");
        assert_eq!(invoice.patient_name, "Ali");
        assert_eq!(invoice.service.as_deref(), Some("Cardiology Consultation"));
        assert_eq!(invoice.appointment_id.as_deref(), Some(appointment.id.as_str()));

        let rows = transaction_rows(&pool).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 5000);

        // Two audit records, both attributed to the acting user
        let status_logs = audit_entries(&pool, actions::APPOINTMENT_STATUS_UPDATE).await;
        let invoice_logs = audit_entries(&pool, actions::TRANSACTION_CREATE_AUTO).await;
        assert_eq!(status_logs.len(), 1);
        assert_eq!(invoice_logs.len(), 1);
        assert_eq!(status_logs[0].user_id, "u1");
        assert_eq!(invoice_logs[0].user_id, "u1");
        assert_eq!(invoice_logs[0].section, "billing");
    }

    #[tokio::test]
    async fn test_completion_without_fee_creates_no_invoice() {
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", None).await;
        let appointment = scheduled_appointment(&pool, "u1").await;

        let outcome =
            transition_status(&pool, &appointment.id, AppointmentStatus::Completed, "u1")
                .await
                .unwrap();

        assert!(outcome.invoice.is_none());
        assert!(transaction_rows(&pool).await.is_empty());

        // Only the status change is audited
        assert_eq!(
            audit_entries(&pool, actions::APPOINTMENT_STATUS_UPDATE)
                .await
                .len(),
            1
        );
        assert!(audit_entries(&pool, actions::TRANSACTION_CREATE_AUTO)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_same_status_transition_still_audits() {
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", Some(5000)).await;
        let appointment = scheduled_appointment(&pool, "u1").await;

        // Re-assert the creation status twice
        for _ in 0..2 {
            let outcome =
                transition_status(&pool, &appointment.id, AppointmentStatus::Scheduled, "u1")
                    .await
                    .unwrap();
            assert_eq!(outcome.appointment.status, "Scheduled");
            assert!(outcome.invoice.is_none());
        }

        // Each call writes exactly one status-change record
        assert_eq!(
            audit_entries(&pool, actions::APPOINTMENT_STATUS_UPDATE)
                .await
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_repeated_completion_bills_each_time() {
        // Documented behavior: completing an already-completed appointment
        // creates another invoice. Callers gate on the previous status.
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", Some(5000)).await;
        let appointment = scheduled_appointment(&pool, "u1").await;

        for _ in 0..2 {
            transition_status(&pool, &appointment.id, AppointmentStatus::Completed, "u1")
                .await
                .unwrap();
        }
        assert_eq!(transaction_rows(&pool).await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_appointment_aborts_without_writes() {
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;

        let err = transition_status(&pool, "nope", AppointmentStatus::Completed, "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::AppointmentNotFound(_)));

        let logs: Vec<AuditLog> = sqlx::query_as("SELECT * FROM audit_logs")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(logs.is_empty());
        assert!(transaction_rows(&pool).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_aborts() {
        let pool = test_pool().await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", Some(5000)).await;

        let err = create_appointment(
            &pool,
            &CreateAppointmentRequest {
                patient_id: "p1".to_string(),
                doctor_id: "d1".to_string(),
                date_time: "2025-06-01T10:00:00Z".to_string(),
            },
            "ghost",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SchedulingError::UserNotFound(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_missing_doctor_at_completion_rolls_back_everything() {
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", Some(5000)).await;
        let appointment = scheduled_appointment(&pool, "u1").await;

        // The doctor disappears between scheduling and completion
        sqlx::query("DELETE FROM doctors WHERE id = 'd1'")
            .execute(&pool)
            .await
            .unwrap();

        let err = transition_status(&pool, &appointment.id, AppointmentStatus::Completed, "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::DoctorNotFound(_)));

        // The whole operation rolled back: status untouched, no invoice,
        // no new audit rows beyond the creation record
        let reread: Appointment = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
            .bind(&appointment.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(reread.status, "Scheduled");
        assert!(transaction_rows(&pool).await.is_empty());
        assert!(audit_entries(&pool, actions::APPOINTMENT_STATUS_UPDATE)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_non_completion_transitions_never_bill() {
        let pool = test_pool().await;
        insert_user(&pool, "u1").await;
        insert_patient(&pool, "p1", "Ali").await;
        insert_doctor(&pool, "d1", "Cardiology", Some(5000)).await;
        let appointment = scheduled_appointment(&pool, "u1").await;

        for status in [
            AppointmentStatus::Waiting,
            AppointmentStatus::FollowUp,
            AppointmentStatus::Scheduled,
        ] {
            let outcome = transition_status(&pool, &appointment.id, status, "u1")
                .await
                .unwrap();
            assert!(outcome.invoice.is_none());
        }
        assert!(transaction_rows(&pool).await.is_empty());
    }
}
