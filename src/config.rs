use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::warehouse::credentials::DEFAULT_TOKEN_PATH;
use crate::services::warehouse::{CredentialResolver, TransientErrors};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Settings for the warehouse session; credentials themselves are re-read
/// from the environment on every connection attempt
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    pub token_path: String,
    pub config_path: Option<String>,
    pub query_retries: u32,
    /// 0 disables the per-statement timeout
    pub statement_timeout_secs: u64,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub transient_codes: Vec<i64>,
    #[serde(default)]
    pub transient_messages: Vec<String>,
}

impl WarehouseConfig {
    pub fn credential_resolver(&self) -> CredentialResolver {
        let config_path = self
            .config_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(CredentialResolver::default_config_path);
        CredentialResolver::new(&self.token_path, config_path)
    }

    /// Built-in signatures plus any configured extras
    pub fn transient_errors(&self) -> TransientErrors {
        TransientErrors::default().extend(
            self.transient_messages.iter().cloned(),
            self.transient_codes.iter().copied(),
        )
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_secs > 0).then(|| Duration::from_secs(self.statement_timeout_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env before reading any variable
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("warehouse.token_path", DEFAULT_TOKEN_PATH)?
            .set_default("warehouse.query_retries", 1)?
            .set_default("warehouse.statement_timeout_secs", 120)?
            .set_default("warehouse.request_timeout_secs", 60)?;

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(token_path) = env::var("SNOWFLAKE_TOKEN_PATH") {
            builder = builder.set_override("warehouse.token_path", token_path)?;
        }

        if let Ok(config_path) = env::var("SNOWFLAKE_CONFIG_PATH") {
            builder = builder.set_override("warehouse.config_path", config_path)?;
        }

        if let Ok(retries) = env::var("WAREHOUSE_QUERY_RETRIES") {
            builder = builder.set_override("warehouse.query_retries", retries.parse::<u32>().unwrap_or(1))?;
        }

        if let Ok(timeout) = env::var("WAREHOUSE_STATEMENT_TIMEOUT_SECS") {
            builder = builder.set_override(
                "warehouse.statement_timeout_secs",
                timeout.parse::<u64>().unwrap_or(120),
            )?;
        }

        if let Ok(timeout) = env::var("WAREHOUSE_REQUEST_TIMEOUT_SECS") {
            builder = builder.set_override(
                "warehouse.request_timeout_secs",
                timeout.parse::<u64>().unwrap_or(60),
            )?;
        }

        if let Ok(codes) = env::var("WAREHOUSE_TRANSIENT_CODES") {
            builder = builder.set_override("warehouse.transient_codes", parse_codes(&codes))?;
        }

        if let Ok(messages) = env::var("WAREHOUSE_TRANSIENT_MESSAGES") {
            builder = builder.set_override("warehouse.transient_messages", parse_messages(&messages))?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `"407002, 390112"` → `[407002, 390112]`; unparsable entries are dropped
fn parse_codes(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|c| c.trim().parse().ok())
        .collect()
}

/// Messages may contain commas, so they are separated by `|`
fn parse_messages(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}
