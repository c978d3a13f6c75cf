use serde::Deserialize;

use crate::api::middleware::AppError;
use crate::validation::InputValidator;

/// `GET /api/interactions` filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFilter {
    pub customer_id: Option<i64>,
}

/// Body of `POST /api/interactions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    pub customer_id: i64,
    #[serde(rename = "type")]
    pub interaction_type: String,
    pub channel: String,
    pub sentiment: String,
    #[serde(default)]
    pub resolution_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionInput {
    pub customer_id: i64,
    pub interaction_type: String,
    pub channel: String,
    pub sentiment: String,
    pub resolution_time: Option<i64>,
}

impl InteractionRequest {
    pub fn validate(&self) -> Result<InteractionInput, AppError> {
        let resolution_time = match self.resolution_time {
            Some(minutes) => Some(InputValidator::non_negative("resolutionTime", minutes)?),
            None => None,
        };

        Ok(InteractionInput {
            customer_id: InputValidator::positive("customerId", self.customer_id)?,
            interaction_type: InputValidator::require_text("type", &self.interaction_type)?,
            channel: InputValidator::require_text("channel", &self.channel)?,
            sentiment: InputValidator::require_text("sentiment", &self.sentiment)?,
            resolution_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_field_name() {
        let request: InteractionRequest = serde_json::from_value(serde_json::json!({
            "customerId": 4,
            "type": "Support Call",
            "channel": "Phone",
            "sentiment": "Positive",
            "resolutionTime": 15
        }))
        .unwrap();

        let input = request.validate().unwrap();
        assert_eq!(input.interaction_type, "Support Call");
        assert_eq!(input.resolution_time, Some(15));
    }

    #[test]
    fn test_negative_resolution_time() {
        let request = InteractionRequest {
            customer_id: 4,
            interaction_type: "Email".to_string(),
            channel: "Email".to_string(),
            sentiment: "Neutral".to_string(),
            resolution_time: Some(-5),
        };
        assert!(request.validate().is_err());
    }
}
