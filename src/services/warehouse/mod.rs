// Warehouse access: credentials, session lifecycle and the Snowflake driver
pub mod adapter;
pub mod converter;
pub mod credentials;
pub mod error;
pub mod session;
pub mod snowflake;
pub mod sso;
pub mod toml_section;

#[cfg(test)]
pub(crate) mod mock;

pub use adapter::{Binding, Row, Statement, WarehouseConnection, WarehouseConnector};
pub use credentials::{Authentication, ConnectionConfig, CredentialResolver};
pub use error::{TransientErrors, WarehouseError};
pub use session::{SessionManager, SessionStatus};
pub use snowflake::SnowflakeConnector;
