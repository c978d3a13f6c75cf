// Warehouse adapter traits: the seam between session management and the driver
use super::credentials::ConnectionConfig;
use super::error::WarehouseError;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One result row: column name to value, in the order the warehouse returned them
pub type Row = Map<String, Value>;

/// Positional bind value for a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Text(String),
    Fixed(i64),
    Real(f64),
    Boolean(bool),
    Null,
}

impl Binding {
    /// Warehouse type tag sent alongside the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Binding::Text(_) | Binding::Null => "TEXT",
            Binding::Fixed(_) => "FIXED",
            Binding::Real(_) => "REAL",
            Binding::Boolean(_) => "BOOLEAN",
        }
    }

    /// Wire representation; bind values always travel as strings
    pub fn wire_value(&self) -> Option<String> {
        match self {
            Binding::Text(s) => Some(s.clone()),
            Binding::Fixed(v) => Some(v.to_string()),
            Binding::Real(v) => Some(v.to_string()),
            Binding::Boolean(v) => Some(v.to_string()),
            Binding::Null => None,
        }
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::Text(value.to_string())
    }
}

impl From<String> for Binding {
    fn from(value: String) -> Self {
        Binding::Text(value)
    }
}

impl From<i64> for Binding {
    fn from(value: i64) -> Self {
        Binding::Fixed(value)
    }
}

impl From<i32> for Binding {
    fn from(value: i32) -> Self {
        Binding::Fixed(value.into())
    }
}

impl From<f64> for Binding {
    fn from(value: f64) -> Self {
        Binding::Real(value)
    }
}

impl From<bool> for Binding {
    fn from(value: bool) -> Self {
        Binding::Boolean(value)
    }
}

impl From<chrono::NaiveDate> for Binding {
    fn from(value: chrono::NaiveDate) -> Self {
        Binding::Text(value.format("%Y-%m-%d").to_string())
    }
}

impl<T: Into<Binding>> From<Option<T>> for Binding {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Binding::Null)
    }
}

/// A complete SQL statement plus its positional bindings
///
/// The text is sent as-is; no templating or escaping happens here.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<Binding>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Binding>) -> Self {
        self.bindings.push(value.into());
        self
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}

/// A live warehouse session
#[async_trait::async_trait]
pub trait WarehouseConnection: Send + Sync {
    /// Execute one statement and return its rows
    /// Statements that produce no result set return an empty vector
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, WarehouseError>;

    /// End the session on the server side
    async fn close(&self) -> Result<(), WarehouseError>;
}

/// Opens warehouse sessions from a resolved configuration
#[async_trait::async_trait]
pub trait WarehouseConnector: Send + Sync {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn WarehouseConnection>, WarehouseError>;
}
