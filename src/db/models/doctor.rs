use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub specialty: String,
    /// Consultation fee; None disables automatic invoicing on completion
    pub service_price: Option<i64>,
    /// Days within which a follow-up visit is free of charge
    pub free_return_days: Option<i64>,
    /// JSON array of weekday names the doctor accepts appointments
    pub available_days: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Doctor {
    pub fn available_days_list(&self) -> Vec<String> {
        parse_days(self.available_days.as_deref())
    }
}

/// Helper to parse the available-days JSON column
pub fn parse_days(json: Option<&str>) -> Vec<String> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Helper to serialize available days for storage
pub fn serialize_days(days: &[String]) -> Option<String> {
    if days.is_empty() {
        None
    } else {
        serde_json::to_string(days).ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub specialty: String,
    pub service_price: Option<i64>,
    pub free_return_days: Option<i64>,
    #[serde(default)]
    pub available_days: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub service_price: Option<i64>,
    pub free_return_days: Option<i64>,
    pub available_days: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_days() {
        assert_eq!(
            parse_days(Some(r#"["Monday","Wednesday"]"#)),
            vec!["Monday".to_string(), "Wednesday".to_string()]
        );
        assert!(parse_days(None).is_empty());
        assert!(parse_days(Some("not json")).is_empty());
    }

    #[test]
    fn test_serialize_days_empty_is_none() {
        assert_eq!(serialize_days(&[]), None);
        assert_eq!(
            serialize_days(&["Sunday".to_string()]),
            Some(r#"["Sunday"]"#.to_string())
        );
    }
}
