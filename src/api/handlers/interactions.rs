use axum::{extract::State, Json};
use serde_json::json;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::handlers::{next_id, AppState};
use crate::api::middleware::AppError;
use crate::models::tables;
use crate::models::{InteractionFilter, InteractionRequest};
use crate::services::warehouse::{Row, Statement};

pub fn list_statement(filter: &InteractionFilter) -> Statement {
    let mut statement = Statement::new(format!(
        "SELECT INTERACTION_ID, CUSTOMER_ID, INTERACTION_DATE, INTERACTION_TYPE, \
         CHANNEL, SENTIMENT, RESOLUTION_TIME_MINUTES FROM {}",
        tables::INTERACTIONS
    ));

    if let Some(customer_id) = filter.customer_id {
        statement.sql.push_str(" WHERE CUSTOMER_ID = ?");
        statement = statement.bind(customer_id);
    }

    statement.sql.push_str(" ORDER BY INTERACTION_DATE DESC LIMIT 50");
    statement
}

pub async fn list_interactions(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<InteractionFilter>,
) -> Result<Json<Vec<Row>>, AppError> {
    let rows = state
        .executor
        .query(list_statement(&filter))
        .await
        .map_err(AppError::warehouse("Failed to fetch interactions"))?;

    Ok(Json(rows))
}

/// Log a customer interaction dated today
pub async fn create_interaction(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<InteractionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    const CONTEXT: &str = "Failed to add interaction";
    let input = payload.validate()?;

    let interaction_id =
        next_id(&state.executor, tables::INTERACTIONS, "INTERACTION_ID", CONTEXT).await?;

    let statement = Statement::new(format!(
        "INSERT INTO {} \
         (INTERACTION_ID, CUSTOMER_ID, INTERACTION_DATE, INTERACTION_TYPE, CHANNEL, \
         SENTIMENT, RESOLUTION_TIME_MINUTES) \
         VALUES (?, ?, CURRENT_DATE(), ?, ?, ?, ?)",
        tables::INTERACTIONS
    ))
    .bind(interaction_id)
    .bind(input.customer_id)
    .bind(input.interaction_type)
    .bind(input.channel)
    .bind(input.sentiment)
    .bind(input.resolution_time);

    state
        .executor
        .query(statement)
        .await
        .map_err(AppError::warehouse(CONTEXT))?;

    tracing::info!(
        "Logged interaction {} for customer {}",
        interaction_id,
        input.customer_id
    );

    Ok(Json(json!({ "success": true, "interactionId": interaction_id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::test_support::TestApp;
    use crate::services::warehouse::mock::{row, MockConnector};
    use crate::services::warehouse::{Binding, WarehouseError};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_list_for_customer() {
        let app = TestApp::new(MockConnector::new());
        app.connector.push_result(Ok(vec![row(&[
            ("INTERACTION_ID", serde_json::json!(3)),
            ("SENTIMENT", serde_json::json!("Positive")),
        ])]));

        let (status, body) = app.request("GET", "/api/interactions?customerId=9", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["SENTIMENT"], "Positive");
        assert_eq!(app.connector.executed()[0].bindings, vec![Binding::Fixed(9)]);
    }

    #[tokio::test]
    async fn test_create_without_resolution_time() {
        let app = TestApp::new(MockConnector::new());
        app.connector.push_result(Ok(vec![row(&[("MAX_ID", serde_json::json!(1))])]));

        let (status, body) = app
            .request(
                "POST",
                "/api/interactions",
                Some(serde_json::json!({
                    "customerId": 9,
                    "type": "Email",
                    "channel": "Email",
                    "sentiment": "Neutral"
                })),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interactionId"], 1);
        let insert = &app.connector.executed()[1];
        assert_eq!(insert.bindings[2], Binding::Text("Email".to_string()));
        assert_eq!(insert.bindings[5], Binding::Null);
    }

    #[tokio::test]
    async fn test_connection_failure_is_503() {
        let app = TestApp::new(MockConnector::new().fail_next_connect(WarehouseError::Connection {
            code: Some(390100),
            message: "Incorrect username or password was specified.".to_string(),
        }));

        let (status, body) = app.request("GET", "/api/interactions", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "WAREHOUSE_UNAVAILABLE");
    }
}
