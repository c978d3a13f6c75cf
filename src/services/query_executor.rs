use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::services::warehouse::{
    Row, SessionManager, SessionStatus, Statement, TransientErrors, WarehouseError,
};

/// Runs statements against the shared warehouse session
///
/// Failures that match [`TransientErrors`] invalidate the cached session and
/// re-run the statement, at most `retries` times per call. The caller always
/// receives the outcome of the last attempt.
pub struct QueryExecutor {
    session: Arc<SessionManager>,
    transient: TransientErrors,
    retries: u32,
    statement_timeout: Option<Duration>,
}

impl QueryExecutor {
    pub const DEFAULT_RETRIES: u32 = 1;

    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            transient: TransientErrors::default(),
            retries: Self::DEFAULT_RETRIES,
            statement_timeout: None,
        }
    }

    pub fn with_transient_errors(mut self, transient: TransientErrors) -> Self {
        self.transient = transient;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub async fn session_status(&self) -> SessionStatus {
        self.session.status().await
    }

    /// Execute a statement with the default retry budget
    pub async fn query(&self, statement: impl Into<Statement>) -> Result<Vec<Row>, WarehouseError> {
        self.query_with_retries(statement, self.retries).await
    }

    /// Execute a statement and deserialize each row into `T`
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<Vec<T>, WarehouseError> {
        self.query(statement)
            .await?
            .into_iter()
            .map(|row| {
                serde_json::from_value(serde_json::Value::Object(row))
                    .map_err(|e| WarehouseError::Decode(e.to_string()))
            })
            .collect()
    }

    /// Execute a statement, retrying transient failures up to `retries` times
    pub async fn query_with_retries(
        &self,
        statement: impl Into<Statement>,
        retries: u32,
    ) -> Result<Vec<Row>, WarehouseError> {
        let statement = statement.into();
        let mut remaining = retries;

        loop {
            let err = match self.run_once(&statement).await {
                Ok(rows) => return Ok(rows),
                Err(err) => err,
            };

            tracing::error!("Query error: {}", err);

            if remaining == 0 || !self.transient.matches(&err) {
                return Err(err);
            }

            remaining -= 1;
            tracing::warn!(
                "Transient warehouse error, reconnecting and retrying ({} retries left)",
                remaining
            );
            self.session.invalidate().await;
        }
    }

    async fn run_once(&self, statement: &Statement) -> Result<Vec<Row>, WarehouseError> {
        let connection = self.session.get_connection().await?;

        let execution = connection.execute(statement);
        match self.statement_timeout {
            Some(limit) => tokio::time::timeout(limit, execution)
                .await
                .map_err(|_| WarehouseError::Timeout(limit))?,
            None => execution.await,
        }
    }
}
