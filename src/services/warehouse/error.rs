use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the warehouse
///
/// `Clone` because a single connection attempt is shared by every caller
/// waiting on it, and each of them receives the same failure.
#[derive(Debug, Clone, Error)]
pub enum WarehouseError {
    #[error("Failed to connect to warehouse: {message}")]
    Connection { code: Option<i64>, message: String },

    #[error("Statement execution failed: {message}")]
    Execution {
        code: Option<i64>,
        sql_state: Option<String>,
        message: String,
    },

    #[error("Warehouse request failed: {0}")]
    Transport(String),

    /// The socket closed or reset under a live session
    #[error("Warehouse terminated connection: {0}")]
    ConnectionLost(String),

    #[error("Unexpected warehouse response: {0}")]
    Protocol(String),

    #[error("Statement did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Authenticator {0} is not supported by this service")]
    UnsupportedAuthenticator(String),

    #[error("Failed to decode row: {0}")]
    Decode(String),
}

impl WarehouseError {
    /// Numeric warehouse error code, when the server reported one
    pub fn code(&self) -> Option<i64> {
        match self {
            WarehouseError::Connection { code, .. } | WarehouseError::Execution { code, .. } => {
                *code
            }
            _ => None,
        }
    }

    /// True for failures that happened while establishing a session
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            WarehouseError::Connection { .. } | WarehouseError::UnsupportedAuthenticator(_)
        )
    }
}

/// Signatures of failures that are worth one reconnect-and-retry
///
/// Matching is a whitelist: an error qualifies when its message contains one
/// of `messages` or its code is one of `codes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientErrors {
    messages: Vec<String>,
    codes: Vec<i64>,
}

/// Session token has expired or the driver reported a terminated connection.
pub const SESSION_EXPIRED_CODES: [i64; 2] = [407002, 390112];

pub const OAUTH_TOKEN_EXPIRED: &str = "OAuth access token expired";
pub const TERMINATED_CONNECTION: &str = "terminated connection";

impl TransientErrors {
    /// An empty set; nothing is retried
    pub fn none() -> Self {
        Self {
            messages: Vec::new(),
            codes: Vec::new(),
        }
    }

    pub fn with_message(mut self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        if !fragment.is_empty() && !self.messages.contains(&fragment) {
            self.messages.push(fragment);
        }
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        if !self.codes.contains(&code) {
            self.codes.push(code);
        }
        self
    }

    pub fn extend<M, C>(mut self, messages: M, codes: C) -> Self
    where
        M: IntoIterator<Item = String>,
        C: IntoIterator<Item = i64>,
    {
        for message in messages {
            self = self.with_message(message);
        }
        for code in codes {
            self = self.with_code(code);
        }
        self
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn codes(&self) -> &[i64] {
        &self.codes
    }

    pub fn matches(&self, error: &WarehouseError) -> bool {
        if let Some(code) = error.code() {
            if self.codes.contains(&code) {
                return true;
            }
        }
        let message = error.to_string();
        self.messages
            .iter()
            .any(|fragment| message.contains(fragment.as_str()))
    }
}

impl Default for TransientErrors {
    fn default() -> Self {
        Self::none()
            .with_message(OAUTH_TOKEN_EXPIRED)
            .with_message(TERMINATED_CONNECTION)
            .extend(Vec::new(), SESSION_EXPIRED_CODES)
    }
}
