use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{customers, dashboard, interactions, stats, transactions, AppState};

/// Create router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/api/customers/{id}",
            put(customers::update_customer).delete(customers::delete_customer),
        )
        .route(
            "/api/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/api/interactions",
            get(interactions::list_interactions).post(interactions::create_interaction),
        )
        .route("/api/stats", get(stats::get_stats))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint; reports the warehouse session without opening one
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let warehouse = state.executor.session_status().await;
    Json(json!({ "status": "ok", "warehouse": warehouse }))
}

#[cfg(test)]
mod tests {
    use crate::api::handlers::test_support::TestApp;
    use crate::services::warehouse::mock::MockConnector;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_does_not_connect() {
        let app = TestApp::new(MockConnector::new());

        let (status, body) = app.request("GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["warehouse"], "no_connection");
        assert_eq!(app.connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_health_after_query() {
        let app = TestApp::new(MockConnector::new());
        app.request("GET", "/api/interactions", None).await;

        let (_, body) = app.request("GET", "/health", None).await;
        assert_eq!(body["warehouse"], "connected");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = TestApp::new(MockConnector::new());
        let (status, _) = app.request("GET", "/api/products", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
