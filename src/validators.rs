/// Input validators
///
/// Field-level checks applied by the handlers before anything reaches the
/// store. Every check trims its input and returns the cleaned value.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_COMPANY_NAME_LENGTH: usize = 30;
const MAX_COMPANY_DESCRIPTION_LENGTH: usize = 250;
const MAX_TEXT_LENGTH: usize = 5000;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref ALPHANUMERIC_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9]+$").unwrap();
}

/// Validates an email address
/// - Checks format using RFC 5322 simplified regex
/// - Verifies length constraints
/// - Rejects a local part longer than 64 characters
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if let Some(at_pos) = trimmed.find('@') {
        if at_pos > 64 {
            return Err(ValidationError::SuspiciousContent("email".to_string()));
        }
    }

    Ok(trimmed.to_string())
}

fn alphanumeric(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if trimmed.len() < min {
        return Err(ValidationError::TooShort(field.to_string(), min));
    }
    if trimmed.len() > max {
        return Err(ValidationError::TooLong(field.to_string(), max));
    }
    if !ALPHANUMERIC_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(field.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Usernames are 3-30 ASCII letters or digits.
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    alphanumeric("username", username, MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH)
}

/// Company names are 1-30 ASCII letters or digits.
pub fn is_valid_company_name(name: &str) -> Result<String, ValidationError> {
    alphanumeric("name", name, 1, MAX_COMPANY_NAME_LENGTH)
}

pub fn is_valid_company_description(description: &str) -> Result<String, ValidationError> {
    is_valid_text("description", description, MAX_COMPANY_DESCRIPTION_LENGTH)
}

/// Free text: non-empty, bounded, no control characters other than newlines.
pub fn is_valid_text(field: &str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if trimmed.len() > max.min(MAX_TEXT_LENGTH) {
        return Err(ValidationError::TooLong(field.to_string(), max.min(MAX_TEXT_LENGTH)));
    }
    if trimmed.chars().any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t') {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

pub fn is_valid_salary(salary: i64) -> Result<i64, ValidationError> {
    if salary < 0 {
        return Err(ValidationError::InvalidValue {
            field: "salary".to_string(),
            value: salary.to_string(),
        });
    }
    Ok(salary)
}
