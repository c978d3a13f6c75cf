use axum::{extract::State, Json};
use serde_json::json;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::handlers::{next_id, AppState};
use crate::api::middleware::AppError;
use crate::models::tables;
use crate::models::{CustomerFilter, CustomerRequest};
use crate::services::warehouse::{Binding, Row, Statement};

const CUSTOMER_COLUMNS: &str = "CUSTOMER_ID, FIRST_NAME, LAST_NAME, EMAIL, PHONE, \
     REGISTRATION_DATE, COUNTRY, CITY, CUSTOMER_SEGMENT, \
     TOTAL_LIFETIME_VALUE, TOTAL_ORDERS, LAST_ORDER_DATE";

/// Build the customer listing statement for a filter
pub fn list_statement(filter: &CustomerFilter) -> Statement {
    let mut sql = format!("SELECT {} FROM {} WHERE 1=1", CUSTOMER_COLUMNS, tables::CUSTOMERS);
    let mut bindings: Vec<Binding> = Vec::new();

    if let Some(segment) = filter.segment() {
        sql.push_str(" AND CUSTOMER_SEGMENT = ?");
        bindings.push(segment.into());
    }

    if let Some(pattern) = filter.search_pattern() {
        sql.push_str(
            " AND (LOWER(FIRST_NAME) LIKE ? OR LOWER(LAST_NAME) LIKE ? OR LOWER(EMAIL) LIKE ?)",
        );
        for _ in 0..3 {
            bindings.push(pattern.clone().into());
        }
    }

    sql.push_str(" ORDER BY TOTAL_LIFETIME_VALUE DESC LIMIT 100");
    Statement { sql, bindings }
}

/// List customers, highest lifetime value first
pub async fn list_customers(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CustomerFilter>,
) -> Result<Json<Vec<Row>>, AppError> {
    let rows = state
        .executor
        .query(list_statement(&filter))
        .await
        .map_err(AppError::warehouse("Failed to fetch customers"))?;

    Ok(Json(rows))
}

/// Create a customer with empty order history
pub async fn create_customer(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CustomerRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    const CONTEXT: &str = "Failed to add customer";
    let input = payload.validate()?;

    let customer_id = next_id(&state.executor, tables::CUSTOMERS, "CUSTOMER_ID", CONTEXT).await?;

    let statement = Statement::new(format!(
        "INSERT INTO {} \
         (CUSTOMER_ID, FIRST_NAME, LAST_NAME, EMAIL, PHONE, REGISTRATION_DATE, COUNTRY, CITY, \
         CUSTOMER_SEGMENT, TOTAL_LIFETIME_VALUE, TOTAL_ORDERS, LAST_ORDER_DATE) \
         VALUES (?, ?, ?, ?, ?, CURRENT_DATE(), ?, ?, ?, 0, 0, CURRENT_DATE())",
        tables::CUSTOMERS
    ))
    .bind(customer_id)
    .bind(input.first_name)
    .bind(input.last_name)
    .bind(input.email)
    .bind(input.phone)
    .bind(input.country)
    .bind(input.city)
    .bind(input.segment);

    state
        .executor
        .query(statement)
        .await
        .map_err(AppError::warehouse(CONTEXT))?;

    tracing::info!("Created customer {}", customer_id);

    Ok(Json(json!({ "success": true, "customerId": customer_id })))
}

/// Update a customer's contact details and segment
pub async fn update_customer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CustomerRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let input = payload.validate()?;

    let statement = Statement::new(format!(
        "UPDATE {} SET FIRST_NAME = ?, LAST_NAME = ?, EMAIL = ?, PHONE = ?, \
         COUNTRY = ?, CITY = ?, CUSTOMER_SEGMENT = ? WHERE CUSTOMER_ID = ?",
        tables::CUSTOMERS
    ))
    .bind(input.first_name)
    .bind(input.last_name)
    .bind(input.email)
    .bind(input.phone)
    .bind(input.country)
    .bind(input.city)
    .bind(input.segment)
    .bind(id);

    state
        .executor
        .query(statement)
        .await
        .map_err(AppError::warehouse("Failed to update customer"))?;

    Ok(Json(json!({ "success": true })))
}

/// Delete a customer together with their interactions and transactions
pub async fn delete_customer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    for table in [tables::INTERACTIONS, tables::TRANSACTIONS, tables::CUSTOMERS] {
        let statement =
            Statement::new(format!("DELETE FROM {} WHERE CUSTOMER_ID = ?", table)).bind(id);
        state
            .executor
            .query(statement)
            .await
            .map_err(AppError::warehouse("Failed to delete customer"))?;
    }

    tracing::info!("Deleted customer {}", id);

    Ok(Json(json!({ "success": true })))
}
