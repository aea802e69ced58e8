//! Appointment model and status lifecycle states.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle stage of a scheduled encounter.
///
/// `Scheduled` is the creation state. Every stage may be assigned from every
/// other stage, including re-asserting the current one; each assignment is
/// audited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    Scheduled,
    Waiting,
    Completed,
    #[serde(rename = "Follow-up")]
    FollowUp,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "Scheduled"),
            Self::Waiting => write!(f, "Waiting"),
            Self::Completed => write!(f, "Completed"),
            Self::FollowUp => write!(f, "Follow-up"),
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(Self::Scheduled),
            "Waiting" => Ok(Self::Waiting),
            "Completed" => Ok(Self::Completed),
            "Follow-up" => Ok(Self::FollowUp),
            _ => Err(format!("Unknown appointment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    /// Snapshot of the patient's name at creation; not re-synced on edits
    pub patient_name: String,
    pub doctor_id: String,
    /// Snapshot of the doctor's name at creation; not re-synced on edits
    pub doctor_name: String,
    /// Snapshot of the doctor's specialty at creation
    pub doctor_specialty: String,
    pub date_time: String,
    pub status: String,
    /// When the denormalized patient/doctor fields were copied
    pub snapshot_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    pub fn status_enum(&self) -> Option<AppointmentStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: String,
    pub doctor_id: String,
    /// RFC 3339 date-time of the encounter
    pub date_time: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

/// Query parameters for filtering appointment lists
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppointmentQuery {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<String>,
    /// Inclusive lower bound on date_time (RFC 3339)
    pub from: Option<String>,
    /// Inclusive upper bound on date_time (RFC 3339)
    pub to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Waiting,
            AppointmentStatus::Completed,
            AppointmentStatus::FollowUp,
        ] {
            let parsed: AppointmentStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_follow_up_wire_format() {
        // Serialized as "Follow-up", not "FollowUp"
        let json = serde_json::to_string(&AppointmentStatus::FollowUp).unwrap();
        assert_eq!(json, r#""Follow-up""#);
        let parsed: AppointmentStatus = serde_json::from_str(r#""Follow-up""#).unwrap();
        assert_eq!(parsed, AppointmentStatus::FollowUp);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!("Cancelled".parse::<AppointmentStatus>().is_err());
        assert!("scheduled".parse::<AppointmentStatus>().is_err());
    }
}
