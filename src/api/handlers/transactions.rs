use axum::{extract::State, Json};
use serde_json::json;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::handlers::{next_id, AppState};
use crate::api::middleware::AppError;
use crate::models::tables;
use crate::models::{TransactionFilter, TransactionRequest};
use crate::services::warehouse::{Row, Statement};

pub fn list_statement(filter: &TransactionFilter) -> Statement {
    let mut statement = Statement::new(format!(
        "SELECT t.TRANSACTION_ID, t.CUSTOMER_ID, t.PRODUCT_ID, t.TRANSACTION_DATE, \
         t.QUANTITY, t.UNIT_PRICE, t.DISCOUNT, t.TOTAL_AMOUNT, t.PAYMENT_METHOD, \
         p.PRODUCT_NAME, p.CATEGORY \
         FROM {} t LEFT JOIN {} p ON t.PRODUCT_ID = p.PRODUCT_ID",
        tables::TRANSACTIONS,
        tables::PRODUCTS
    ));

    if let Some(customer_id) = filter.customer_id {
        statement.sql.push_str(" WHERE t.CUSTOMER_ID = ?");
        statement = statement.bind(customer_id);
    }

    statement.sql.push_str(" ORDER BY t.TRANSACTION_DATE DESC LIMIT 50");
    statement
}

/// Latest transactions, optionally for one customer
pub async fn list_transactions(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TransactionFilter>,
) -> Result<Json<Vec<Row>>, AppError> {
    let rows = state
        .executor
        .query(list_statement(&filter))
        .await
        .map_err(AppError::warehouse("Failed to fetch transactions"))?;

    Ok(Json(rows))
}

/// Record a purchase
///
/// Each purchase gets its own product row; the customer's order count,
/// lifetime value and last order date are bumped afterwards.
pub async fn create_transaction(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TransactionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    const CONTEXT: &str = "Failed to add transaction";
    let input = payload.validate()?;
    let total_amount = input.total_amount();
    let executor = &state.executor;

    let transaction_id = next_id(executor, tables::TRANSACTIONS, "TRANSACTION_ID", CONTEXT).await?;
    let product_id = next_id(executor, tables::PRODUCTS, "PRODUCT_ID", CONTEXT).await?;

    let product = Statement::new(format!(
        "INSERT INTO {} (PRODUCT_ID, PRODUCT_NAME, CATEGORY, PRICE) VALUES (?, ?, ?, ?)",
        tables::PRODUCTS
    ))
    .bind(product_id)
    .bind(input.product_name)
    .bind(input.category)
    .bind(input.unit_price);

    let transaction = Statement::new(format!(
        "INSERT INTO {} \
         (TRANSACTION_ID, CUSTOMER_ID, PRODUCT_ID, TRANSACTION_DATE, QUANTITY, UNIT_PRICE, \
         DISCOUNT, TOTAL_AMOUNT, PAYMENT_METHOD) \
         VALUES (?, ?, ?, CURRENT_DATE(), ?, ?, 0, ?, ?)",
        tables::TRANSACTIONS
    ))
    .bind(transaction_id)
    .bind(input.customer_id)
    .bind(product_id)
    .bind(input.quantity)
    .bind(input.unit_price)
    .bind(total_amount)
    .bind(input.payment_method);

    let customer = Statement::new(format!(
        "UPDATE {} SET TOTAL_ORDERS = TOTAL_ORDERS + 1, \
         TOTAL_LIFETIME_VALUE = TOTAL_LIFETIME_VALUE + ?, \
         LAST_ORDER_DATE = CURRENT_DATE() \
         WHERE CUSTOMER_ID = ?",
        tables::CUSTOMERS
    ))
    .bind(total_amount)
    .bind(input.customer_id);

    for statement in [product, transaction, customer] {
        executor
            .query(statement)
            .await
            .map_err(AppError::warehouse(CONTEXT))?;
    }

    tracing::info!(
        "Recorded transaction {} for customer {} ({:.2})",
        transaction_id,
        input.customer_id,
        total_amount
    );

    Ok(Json(json!({ "success": true, "transactionId": transaction_id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::test_support::TestApp;
    use crate::services::warehouse::mock::{row, MockConnector};
    use crate::services::warehouse::Binding;
    use axum::http::StatusCode;

    #[test]
    fn test_list_statement_customer_filter() {
        let statement = list_statement(&TransactionFilter {
            customer_id: Some(7),
        });
        assert!(statement.sql.contains("WHERE t.CUSTOMER_ID = ?"));
        assert_eq!(statement.bindings, vec![Binding::Fixed(7)]);

        let statement = list_statement(&TransactionFilter::default());
        assert!(!statement.sql.contains("WHERE"));
        assert!(statement.sql.ends_with("LIMIT 50"));
    }

    #[tokio::test]
    async fn test_list_rejects_non_numeric_customer() {
        let app = TestApp::new(MockConnector::new());

        let (status, body) = app
            .request("GET", "/api/transactions?customerId=1%3B%20DROP%20TABLE%20X", None)
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(app.connector.executed().is_empty());
    }

    #[tokio::test]
    async fn test_create_transaction() {
        let connector = MockConnector::new().with_responder(|statement| {
            if statement.sql.contains("MAX(TRANSACTION_ID)") {
                Ok(vec![row(&[("MAX_ID", serde_json::json!(900))])])
            } else if statement.sql.contains("MAX(PRODUCT_ID)") {
                Ok(vec![row(&[("MAX_ID", serde_json::json!(30))])])
            } else {
                Ok(Vec::new())
            }
        });
        let app = TestApp::new(connector);

        let (status, body) = app
            .request(
                "POST",
                "/api/transactions",
                Some(serde_json::json!({
                    "customerId": 12,
                    "productName": "Headphones",
                    "category": "Electronics",
                    "quantity": 2,
                    "unitPrice": 49.5,
                    "paymentMethod": "Credit Card"
                })),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactionId"], 900);

        let executed = app.connector.executed();
        assert_eq!(executed.len(), 5);
        assert!(executed[2].sql.contains("PRODUCTS"));
        assert_eq!(executed[2].bindings[0], Binding::Fixed(30));
        assert_eq!(executed[3].bindings[2], Binding::Fixed(30));
        assert_eq!(executed[3].bindings[5], Binding::Real(99.0));
        assert!(executed[4].sql.starts_with("UPDATE"));
        assert_eq!(executed[4].bindings, vec![Binding::Real(99.0), Binding::Fixed(12)]);
    }

    #[tokio::test]
    async fn test_create_transaction_rejects_zero_quantity() {
        let app = TestApp::new(MockConnector::new());

        let (status, _) = app
            .request(
                "POST",
                "/api/transactions",
                Some(serde_json::json!({
                    "customerId": 12,
                    "productName": "Headphones",
                    "quantity": 0,
                    "unitPrice": 49.5,
                    "paymentMethod": "Cash"
                })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.connector.executed().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_body() {
        let app = TestApp::new(MockConnector::new());

        let (status, body) = app
            .request(
                "POST",
                "/api/transactions",
                Some(serde_json::json!({
                    "customerId": "twelve",
                    "productName": "Headphones",
                    "quantity": 1,
                    "unitPrice": 10.0,
                    "paymentMethod": "Cash"
                })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(app.connector.executed().is_empty());
    }
}
