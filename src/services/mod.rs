pub mod query_executor;
pub mod warehouse; // Snowflake session, credentials and driver

pub use query_executor::*;
