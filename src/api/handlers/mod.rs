pub mod customers;
pub mod dashboard;
pub mod interactions;
pub mod stats;
pub mod transactions;

use serde_json::Value;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::services::warehouse::Row;
use crate::services::QueryExecutor;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<QueryExecutor>,
}

/// Next id for `table`, computed as `MAX(column) + 1`
///
/// Not safe against concurrent inserts into the same table; the dashboard
/// tables have no sequences to draw from.
pub(crate) async fn next_id(
    executor: &QueryExecutor,
    table: &str,
    column: &str,
    context: &'static str,
) -> Result<i64, AppError> {
    let rows = executor
        .query(format!(
            "SELECT COALESCE(MAX({}), 0) + 1 AS MAX_ID FROM {}",
            column, table
        ))
        .await
        .map_err(AppError::warehouse(context))?;

    Ok(first_value(&rows, "MAX_ID").and_then(Value::as_i64).unwrap_or(1))
}

/// Column value from the first row, if any
pub(crate) fn first_value<'a>(rows: &'a [Row], column: &str) -> Option<&'a Value> {
    rows.first().and_then(|row| row.get(column))
}
