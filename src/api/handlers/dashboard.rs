use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Serialize;

use crate::api::extract::ApiQuery;
use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{tables, DateRange};
use crate::services::warehouse::{Row, Statement};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// First row of the summary query, or an empty object
    pub stats: Row,
    pub revenue_by_month: Vec<Row>,
    pub revenue_by_category: Vec<Row>,
    pub payment_methods: Vec<Row>,
    pub customers_by_country: Vec<Row>,
    pub monthly_customers: Vec<Row>,
}

/// Bind `(from, to)` once for every `BETWEEN ? AND ?` in `sql`
fn windowed(sql: String, (from, to): (NaiveDate, NaiveDate)) -> Statement {
    let windows = sql.matches("BETWEEN ? AND ?").count();
    (0..windows).fold(Statement::new(sql), |statement, _| statement.bind(from).bind(to))
}

fn summary(bounds: (NaiveDate, NaiveDate)) -> Statement {
    windowed(
        format!(
            "SELECT \
             (SELECT COUNT(*) FROM {customers} WHERE REGISTRATION_DATE BETWEEN ? AND ?) AS TOTAL_CUSTOMERS, \
             (SELECT COALESCE(SUM(TOTAL_AMOUNT), 0) FROM {transactions} WHERE TRANSACTION_DATE BETWEEN ? AND ?) AS TOTAL_REVENUE, \
             (SELECT COUNT(*) FROM {transactions} WHERE TRANSACTION_DATE BETWEEN ? AND ?) AS TOTAL_ORDERS, \
             (SELECT COUNT(*) FROM {interactions} WHERE INTERACTION_DATE BETWEEN ? AND ?) AS TOTAL_INTERACTIONS, \
             (SELECT AVG(TOTAL_AMOUNT) FROM {transactions} WHERE TRANSACTION_DATE BETWEEN ? AND ?) AS AVG_ORDER_VALUE",
            customers = tables::CUSTOMERS,
            transactions = tables::TRANSACTIONS,
            interactions = tables::INTERACTIONS,
        ),
        bounds,
    )
}

fn revenue_by_month(bounds: (NaiveDate, NaiveDate)) -> Statement {
    windowed(
        format!(
            "SELECT TO_CHAR(TRANSACTION_DATE, 'YYYY-MM') AS MONTH, \
             SUM(TOTAL_AMOUNT) AS REVENUE, COUNT(*) AS ORDERS \
             FROM {} WHERE TRANSACTION_DATE BETWEEN ? AND ? \
             GROUP BY TO_CHAR(TRANSACTION_DATE, 'YYYY-MM') ORDER BY MONTH",
            tables::TRANSACTIONS
        ),
        bounds,
    )
}

fn revenue_by_category(bounds: (NaiveDate, NaiveDate)) -> Statement {
    windowed(
        format!(
            "SELECT p.CATEGORY, SUM(t.TOTAL_AMOUNT) AS REVENUE \
             FROM {} t JOIN {} p ON t.PRODUCT_ID = p.PRODUCT_ID \
             WHERE t.TRANSACTION_DATE BETWEEN ? AND ? \
             GROUP BY p.CATEGORY ORDER BY REVENUE DESC",
            tables::TRANSACTIONS,
            tables::PRODUCTS
        ),
        bounds,
    )
}

fn payment_methods(bounds: (NaiveDate, NaiveDate)) -> Statement {
    windowed(
        format!(
            "SELECT PAYMENT_METHOD, COUNT(*) AS COUNT, SUM(TOTAL_AMOUNT) AS REVENUE \
             FROM {} WHERE TRANSACTION_DATE BETWEEN ? AND ? GROUP BY PAYMENT_METHOD",
            tables::TRANSACTIONS
        ),
        bounds,
    )
}

fn customers_by_country(bounds: (NaiveDate, NaiveDate)) -> Statement {
    windowed(
        format!(
            "SELECT COUNTRY, COUNT(*) AS COUNT, SUM(TOTAL_LIFETIME_VALUE) AS TOTAL_VALUE \
             FROM {} WHERE REGISTRATION_DATE BETWEEN ? AND ? \
             GROUP BY COUNTRY ORDER BY COUNT DESC LIMIT 10",
            tables::CUSTOMERS
        ),
        bounds,
    )
}

fn monthly_customers(bounds: (NaiveDate, NaiveDate)) -> Statement {
    windowed(
        format!(
            "SELECT TO_CHAR(REGISTRATION_DATE, 'YYYY-MM') AS MONTH, COUNT(*) AS NEW_CUSTOMERS \
             FROM {} WHERE REGISTRATION_DATE BETWEEN ? AND ? \
             GROUP BY TO_CHAR(REGISTRATION_DATE, 'YYYY-MM') ORDER BY MONTH",
            tables::CUSTOMERS
        ),
        bounds,
    )
}

/// Everything the dashboard page renders, in one round trip
pub async fn get_dashboard(
    State(state): State<AppState>,
    ApiQuery(range): ApiQuery<DateRange>,
) -> Result<Json<DashboardResponse>, AppError> {
    let bounds = range.bounds_or_default()?;
    let executor = &state.executor;

    tracing::debug!("Loading dashboard for {} to {}", bounds.0, bounds.1);

    let (stats, by_month, by_category, payments, by_country, monthly) = tokio::try_join!(
        executor.query(summary(bounds)),
        executor.query(revenue_by_month(bounds)),
        executor.query(revenue_by_category(bounds)),
        executor.query(payment_methods(bounds)),
        executor.query(customers_by_country(bounds)),
        executor.query(monthly_customers(bounds)),
    )
    .map_err(AppError::warehouse("Failed to fetch dashboard data"))?;

    Ok(Json(DashboardResponse {
        stats: stats.into_iter().next().unwrap_or_default(),
        revenue_by_month: by_month,
        revenue_by_category: by_category,
        payment_methods: payments,
        customers_by_country: by_country,
        monthly_customers: monthly,
    }))
}
