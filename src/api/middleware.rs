use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::warehouse::WarehouseError;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// A statement failed; `context` is what the client is told
    #[error("{context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: WarehouseError,
    },

    /// No warehouse session could be established
    #[error("{context}: {source}")]
    WarehouseUnavailable {
        context: &'static str,
        #[source]
        source: WarehouseError,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Wrap a warehouse failure with the message shown to the client
    ///
    /// Use as `.map_err(AppError::warehouse("Failed to fetch customers"))`.
    pub fn warehouse(context: &'static str) -> impl FnOnce(WarehouseError) -> AppError {
        move |source| {
            if source.is_connection_error() {
                AppError::WarehouseUnavailable { context, source }
            } else {
                AppError::Database { context, source }
            }
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match self {
            // Warehouse messages can echo SQL; they are logged, not returned
            AppError::Database { context, source } => {
                tracing::error!("{}: {}", context, source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetail::new("DATABASE_ERROR", context),
                )
            }
            AppError::WarehouseUnavailable { context, source } => {
                tracing::error!("{}: {}", context, source);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorDetail::new("WAREHOUSE_UNAVAILABLE", context)
                        .with_details("The data warehouse could not be reached. Try again shortly."),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}
