use serde::Deserialize;

use crate::api::middleware::AppError;
use crate::validation::InputValidator;

/// `GET /api/transactions` filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub customer_id: Option<i64>,
}

/// Body of `POST /api/transactions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub customer_id: i64,
    pub product_name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
    pub payment_method: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionInput {
    pub customer_id: i64,
    pub product_name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
    pub payment_method: String,
}

impl TransactionInput {
    /// Quantity times unit price, rounded to cents
    pub fn total_amount(&self) -> f64 {
        (self.quantity as f64 * self.unit_price * 100.0).round() / 100.0
    }
}

impl TransactionRequest {
    pub fn validate(&self) -> Result<TransactionInput, AppError> {
        Ok(TransactionInput {
            customer_id: InputValidator::positive("customerId", self.customer_id)?,
            product_name: InputValidator::require_text("productName", &self.product_name)?,
            category: InputValidator::optional_text("category", self.category.as_deref())?,
            quantity: InputValidator::positive("quantity", self.quantity)?,
            unit_price: InputValidator::amount("unitPrice", self.unit_price)?,
            payment_method: InputValidator::require_text("paymentMethod", &self.payment_method)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransactionRequest {
        serde_json::from_value(serde_json::json!({
            "customerId": 12,
            "productName": "Headphones",
            "category": "Electronics",
            "quantity": 3,
            "unitPrice": 19.99,
            "paymentMethod": "Credit Card"
        }))
        .unwrap()
    }

    #[test]
    fn test_total_amount() {
        let input = request().validate().unwrap();
        assert_eq!(input.total_amount(), 59.97);
    }

    #[test]
    fn test_rejects_zero_quantity() {
        let mut req = request();
        req.quantity = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_price() {
        let mut req = request();
        req.unit_price = -1.0;
        assert!(req.validate().is_err());
    }
}
