use serde::Deserialize;

use crate::api::middleware::AppError;
use crate::validation::InputValidator;

/// `GET /api/customers` filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    pub segment: Option<String>,
    pub search: Option<String>,
}

impl CustomerFilter {
    /// Segment to filter on; `all` and blank mean no filter
    pub fn segment(&self) -> Option<&str> {
        self.segment
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
    }

    /// Lower-cased `LIKE` pattern for the free-text search
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()))
    }
}

/// Body of `POST /api/customers` and `PUT /api/customers/{id}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
}

/// A validated [`CustomerRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub segment: Option<String>,
}

impl CustomerRequest {
    pub fn validate(&self) -> Result<CustomerInput, AppError> {
        Ok(CustomerInput {
            first_name: InputValidator::require_text("firstName", &self.first_name)?,
            last_name: InputValidator::require_text("lastName", &self.last_name)?,
            email: InputValidator::email(&self.email)?,
            phone: InputValidator::optional_text("phone", self.phone.as_deref())?,
            country: InputValidator::optional_text("country", self.country.as_deref())?,
            city: InputValidator::optional_text("city", self.city.as_deref())?,
            segment: InputValidator::optional_text("segment", self.segment.as_deref())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_segment() {
        let filter = CustomerFilter {
            segment: Some("All".to_string()),
            search: None,
        };
        assert!(filter.segment().is_none());

        let filter = CustomerFilter {
            segment: Some("Premium".to_string()),
            search: Some("  SMITH ".to_string()),
        };
        assert_eq!(filter.segment(), Some("Premium"));
        assert_eq!(filter.search_pattern().as_deref(), Some("%smith%"));
    }

    #[test]
    fn test_request_from_camel_case() {
        let request: CustomerRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "country": "UK",
            "segment": "Premium"
        }))
        .unwrap();

        let input = request.validate().unwrap();
        assert_eq!(input.first_name, "Ada");
        assert_eq!(input.country.as_deref(), Some("UK"));
        assert!(input.phone.is_none());
    }

    #[test]
    fn test_request_validation() {
        let request = CustomerRequest {
            first_name: "".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            country: None,
            city: None,
            segment: None,
        };
        assert!(request.validate().is_err());
    }
}
