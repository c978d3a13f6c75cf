use chrono::NaiveDate;
use crate::api::middleware::AppError;

const MAX_TEXT_LENGTH: usize = 255;

/// Validation of user-supplied values before they are bound into statements
pub struct InputValidator;

impl InputValidator {
    /// Trim and require a non-empty value
    pub fn require_text(field: &str, value: &str) -> Result<String, AppError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(format!("{} cannot be empty", field)));
        }
        Self::check_length(field, trimmed)?;
        Ok(trimmed.to_string())
    }

    /// Trim an optional value; blank becomes `None`
    pub fn optional_text(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => {
                Self::check_length(field, v)?;
                Ok(Some(v.to_string()))
            }
            None => Ok(None),
        }
    }

    pub fn email(value: &str) -> Result<String, AppError> {
        let email = Self::require_text("email", value)?;
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
        if !valid {
            return Err(AppError::Validation(format!("Invalid email address: {}", email)));
        }
        Ok(email)
    }

    pub fn positive(field: &str, value: i64) -> Result<i64, AppError> {
        if value <= 0 {
            return Err(AppError::Validation(format!("{} must be greater than zero", field)));
        }
        Ok(value)
    }

    pub fn non_negative(field: &str, value: i64) -> Result<i64, AppError> {
        if value < 0 {
            return Err(AppError::Validation(format!("{} cannot be negative", field)));
        }
        Ok(value)
    }

    pub fn amount(field: &str, value: f64) -> Result<f64, AppError> {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation(format!(
                "{} must be a non-negative number",
                field
            )));
        }
        Ok(value)
    }

    pub fn date_range(from: NaiveDate, to: NaiveDate) -> Result<(), AppError> {
        if from > to {
            return Err(AppError::Validation(format!(
                "Invalid date range: {} is after {}",
                from, to
            )));
        }
        Ok(())
    }

    fn check_length(field: &str, value: &str) -> Result<(), AppError> {
        if value.chars().count() > MAX_TEXT_LENGTH {
            return Err(AppError::Validation(format!(
                "{} cannot be longer than {} characters",
                field, MAX_TEXT_LENGTH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(InputValidator::require_text("firstName", "  Ada ").unwrap(), "Ada");
        assert!(InputValidator::require_text("firstName", "   ").is_err());
        assert!(InputValidator::require_text("firstName", &"x".repeat(256)).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(InputValidator::optional_text("city", None).unwrap(), None);
        assert_eq!(InputValidator::optional_text("city", Some(" ")).unwrap(), None);
        assert_eq!(
            InputValidator::optional_text("city", Some(" Oslo ")).unwrap(),
            Some("Oslo".to_string())
        );
    }

    #[test]
    fn test_email() {
        assert!(InputValidator::email("ada@example.com").is_ok());
        assert!(InputValidator::email("ada.example.com").is_err());
        assert!(InputValidator::email("@example.com").is_err());
        assert!(InputValidator::email("ada@example").is_err());
        assert!(InputValidator::email("ada@@example.com").is_err());
        // Quotes are just data once bound
        assert!(InputValidator::email("o'brien@example.com").is_ok());
    }

    #[test]
    fn test_numbers() {
        assert!(InputValidator::positive("quantity", 0).is_err());
        assert!(InputValidator::positive("quantity", 3).is_ok());
        assert!(InputValidator::non_negative("resolutionTime", -1).is_err());
        assert!(InputValidator::amount("unitPrice", f64::NAN).is_err());
        assert!(InputValidator::amount("unitPrice", -0.5).is_err());
        assert!(InputValidator::amount("unitPrice", 9.99).is_ok());
    }

    #[test]
    fn test_date_range() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(InputValidator::date_range(jan, feb).is_ok());
        assert!(InputValidator::date_range(jan, jan).is_ok());
        assert!(InputValidator::date_range(feb, jan).is_err());
    }
}
