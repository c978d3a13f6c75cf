use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::api::extract::ApiQuery;
use crate::api::handlers::{first_value, AppState};
use crate::api::middleware::AppError;
use crate::models::{tables, DateRange};
use crate::services::warehouse::{Row, Statement};

/// Headline counts for the overview cards
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_customers: Value,
    pub total_transactions: Value,
    pub total_revenue: Value,
    pub total_interactions: Value,
    pub segments: Vec<Row>,
    pub sentiment: Vec<Row>,
}

/// `sql` with `WHERE {column} BETWEEN ? AND ?` inserted before `suffix` when bounded
fn filtered(
    sql: String,
    column: &str,
    bounds: Option<(NaiveDate, NaiveDate)>,
    suffix: &str,
) -> Statement {
    match bounds {
        Some((from, to)) => {
            Statement::new(format!("{} WHERE {} BETWEEN ? AND ?{}", sql, column, suffix))
                .bind(from)
                .bind(to)
        }
        None => Statement::new(format!("{}{}", sql, suffix)),
    }
}

fn count_or_zero(rows: &[Row], column: &str) -> Value {
    first_value(rows, column)
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(0))
}

/// Customer, transaction and interaction totals, filtered by date only when
/// both `from` and `to` are given
pub async fn get_stats(
    State(state): State<AppState>,
    ApiQuery(range): ApiQuery<DateRange>,
) -> Result<Json<StatsResponse>, AppError> {
    const CONTEXT: &str = "Failed to fetch stats";
    let bounds = range.bounds()?;
    let executor = &state.executor;

    let customers = filtered(
        format!("SELECT COUNT(*) AS COUNT FROM {}", tables::CUSTOMERS),
        "REGISTRATION_DATE",
        bounds,
        "",
    );
    let transactions = filtered(
        format!(
            "SELECT COUNT(*) AS COUNT, COALESCE(SUM(TOTAL_AMOUNT), 0) AS TOTAL_REVENUE FROM {}",
            tables::TRANSACTIONS
        ),
        "TRANSACTION_DATE",
        bounds,
        "",
    );
    let interactions = filtered(
        format!("SELECT COUNT(*) AS COUNT FROM {}", tables::INTERACTIONS),
        "INTERACTION_DATE",
        bounds,
        "",
    );
    let segments = filtered(
        format!("SELECT CUSTOMER_SEGMENT, COUNT(*) AS COUNT FROM {}", tables::CUSTOMERS),
        "REGISTRATION_DATE",
        bounds,
        " GROUP BY CUSTOMER_SEGMENT",
    );
    let sentiment = filtered(
        format!("SELECT SENTIMENT, COUNT(*) AS COUNT FROM {}", tables::INTERACTIONS),
        "INTERACTION_DATE",
        bounds,
        " GROUP BY SENTIMENT",
    );

    let (customers, transactions, interactions, segments, sentiment) = tokio::try_join!(
        executor.query(customers),
        executor.query(transactions),
        executor.query(interactions),
        executor.query(segments),
        executor.query(sentiment),
    )
    .map_err(AppError::warehouse(CONTEXT))?;

    Ok(Json(StatsResponse {
        total_customers: count_or_zero(&customers, "COUNT"),
        total_transactions: count_or_zero(&transactions, "COUNT"),
        total_revenue: count_or_zero(&transactions, "TOTAL_REVENUE"),
        total_interactions: count_or_zero(&interactions, "COUNT"),
        segments,
        sentiment,
    }))
}
