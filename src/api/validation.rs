//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating email addresses (pragmatic, not RFC-complete)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$"
    ).unwrap();

    /// Regex for validating phone numbers (digits, spaces, dashes, optional +)
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9][0-9 \-]{2,19}$"
    ).unwrap();

    /// Regex for validating dates as YYYY-MM-DD
    static ref DATE_REGEX: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}$"
    ).unwrap();
}

/// Validate a person's display name
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }

    if trimmed.len() < 2 {
        return Err("Name is too short (min 2 characters)".to_string());
    }

    if trimmed.len() > 120 {
        return Err("Name is too long (max 120 characters)".to_string());
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a phone number
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.is_empty() {
        return Err("Phone number is required".to_string());
    }

    if !PHONE_REGEX.is_match(phone) {
        return Err("Invalid phone number format".to_string());
    }

    Ok(())
}

/// Validate an RFC 3339 date-time string (e.g. appointment times)
pub fn validate_date_time(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Date-time is required".to_string());
    }

    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| "Invalid date-time, expected RFC 3339 format".to_string())
}

/// Validate an optional date of birth as YYYY-MM-DD
pub fn validate_dob(dob: &Option<String>) -> Result<(), String> {
    if let Some(d) = dob {
        if d.is_empty() {
            return Ok(()); // Empty string treated as not provided
        }

        if !DATE_REGEX.is_match(d) {
            return Err("Invalid date of birth, expected YYYY-MM-DD".to_string());
        }

        if chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() {
            return Err("Invalid date of birth".to_string());
        }
    }

    Ok(())
}

/// Validate a billing amount
pub fn validate_amount(amount: i64) -> Result<(), String> {
    if amount <= 0 {
        return Err("Amount must be greater than zero".to_string());
    }

    Ok(())
}

/// Validate an optional consultation fee
pub fn validate_service_price(price: &Option<i64>) -> Result<(), String> {
    if let Some(p) = price {
        if *p <= 0 {
            return Err("Service price must be greater than zero".to_string());
        }
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ali Hassan").is_ok());
        assert!(validate_name("Dr. Amina El-Sayed").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("  ").is_err());
        assert!(validate_name("A").is_err());
        assert!(validate_name(&"x".repeat(121)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("reception@clinic.example").is_ok());
        assert!(validate_email("a.b+tag@sub.domain.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("555-0123").is_ok());
        assert!(validate_phone("+966 50 123 4567").is_ok());
        assert!(validate_phone("0123456789").is_ok());

        assert!(validate_phone("").is_err());
        assert!(validate_phone("12").is_err());
        assert!(validate_phone("call me").is_err());
    }

    #[test]
    fn test_validate_date_time() {
        assert!(validate_date_time("2025-06-01T10:00:00Z").is_ok());
        assert!(validate_date_time("2025-06-01T10:00:00+03:00").is_ok());

        assert!(validate_date_time("").is_err());
        assert!(validate_date_time("2025-06-01").is_err());
        assert!(validate_date_time("tomorrow at ten").is_err());
    }

    #[test]
    fn test_validate_dob() {
        assert!(validate_dob(&Some("1980-02-03".to_string())).is_ok());
        assert!(validate_dob(&Some("".to_string())).is_ok());
        assert!(validate_dob(&None).is_ok());

        assert!(validate_dob(&Some("03/02/1980".to_string())).is_err());
        assert!(validate_dob(&Some("1980-13-40".to_string())).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(5000).is_ok());
        assert!(validate_amount(1).is_ok());

        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-50).is_err());
    }

    #[test]
    fn test_validate_service_price() {
        assert!(validate_service_price(&Some(5000)).is_ok());
        assert!(validate_service_price(&None).is_ok());

        assert!(validate_service_price(&Some(0)).is_err());
        assert!(validate_service_price(&Some(-1)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "patient_id").is_ok());
        assert!(validate_uuid("", "patient_id").is_err());
        assert!(validate_uuid("not-a-uuid", "patient_id").is_err());
    }
}
