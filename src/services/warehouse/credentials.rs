// Credential resolution for warehouse sessions.
//
// Sources, highest priority first: a mounted OAuth token file (switches the
// whole auth strategy), environment variables, the Snowflake CLI config file,
// built-in defaults. Nothing here fails; missing inputs fall through.
use super::toml_section::parse_connection_section;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Token file mounted by the hosting platform inside managed containers
pub const DEFAULT_TOKEN_PATH: &str = "/snowflake/session/token";
pub const DEFAULT_CONNECTION_NAME: &str = "pm";

const DEFAULT_ACCOUNT: &str = "pm";
const DEFAULT_WAREHOUSE: &str = "HLEVEL1";
const DEFAULT_DATABASE: &str = "CUSTOMER_360_DB";
const DEFAULT_SCHEMA: &str = "ANALYTICS";
const DEFAULT_USER: &str = "CUSTOMER360_APP";
const DEFAULT_AUTHENTICATOR: &str = "EXTERNALBROWSER";
pub const OAUTH_AUTHENTICATOR: &str = "oauth";

/// Environment lookup; empty values must be reported as `None`
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// How the session authenticates; the two modes are mutually exclusive
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    OAuth {
        token: String,
        host: Option<String>,
    },
    User {
        username: String,
        authenticator: String,
        password: Option<String>,
    },
}

/// Everything needed to open one warehouse session
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub account: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: Option<String>,
    pub auth: Authentication,
}

impl ConnectionConfig {
    pub fn authenticator(&self) -> &str {
        match &self.auth {
            Authentication::OAuth { .. } => OAUTH_AUTHENTICATOR,
            Authentication::User { authenticator, .. } => authenticator,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match &self.auth {
            Authentication::OAuth { token, .. } => Some(token),
            Authentication::User { .. } => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match &self.auth {
            Authentication::OAuth { .. } => None,
            Authentication::User { username, .. } => Some(username),
        }
    }

    pub fn host(&self) -> Option<&str> {
        match &self.auth {
            Authentication::OAuth { host, .. } => host.as_deref(),
            Authentication::User { .. } => None,
        }
    }
}

// Secrets are masked so configs can be logged freely
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("ConnectionConfig");
        out.field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("authenticator", &self.authenticator());
        match &self.auth {
            Authentication::OAuth { host, .. } => {
                out.field("host", host).field("token", &"***");
            }
            Authentication::User {
                username, password, ..
            } => {
                out.field("username", username)
                    .field("password", &password.as_ref().map(|_| "***"));
            }
        }
        out.finish()
    }
}

/// Builds a [`ConnectionConfig`] from token file, environment and config file
///
/// Sources are re-read on every call; only the caller decides what to cache.
#[derive(Clone)]
pub struct CredentialResolver {
    token_path: PathBuf,
    config_path: Option<PathBuf>,
    env: EnvLookup,
}

impl CredentialResolver {
    pub fn new(token_path: impl Into<PathBuf>, config_path: Option<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            config_path,
            env: Arc::new(process_env),
        }
    }

    /// Replace the process environment with another lookup
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    /// `~/.snowflake/config.toml`, if a home directory is known
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".snowflake").join("config.toml"))
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Read the mounted OAuth token, if one is present
    pub async fn read_token(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => {
                let token = content.trim_end();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) => {
                tracing::trace!("No OAuth token at {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    fn env(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|v| !v.is_empty())
    }

    async fn read_connection_section(&self) -> HashMap<String, String> {
        let Some(path) = &self.config_path else {
            return HashMap::new();
        };

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!("Could not read Snowflake config {}: {}", path.display(), e);
                return HashMap::new();
            }
        };

        let connection_name = self
            .env("SNOWFLAKE_CONNECTION_NAME")
            .unwrap_or_else(|| DEFAULT_CONNECTION_NAME.to_string());
        let section = parse_connection_section(&content, &connection_name);
        if section.is_empty() {
            tracing::debug!(
                "No [connections.{}] section in {}",
                connection_name,
                path.display()
            );
        }
        section
    }

    /// Resolve a configuration, reading the token file first
    pub async fn resolve(&self) -> ConnectionConfig {
        let token = self.read_token().await;
        self.resolve_with_token(token).await
    }

    /// Resolve a configuration around an already-read token
    pub async fn resolve_with_token(&self, token: Option<String>) -> ConnectionConfig {
        let file = self.read_connection_section().await;
        let pick = |env_key: &str, file_key: &str, default: &str| -> String {
            self.env(env_key)
                .or_else(|| file.get(file_key).cloned())
                .unwrap_or_else(|| default.to_string())
        };

        let account = pick("SNOWFLAKE_ACCOUNT", "account", DEFAULT_ACCOUNT);
        let warehouse = pick("SNOWFLAKE_WAREHOUSE", "warehouse", DEFAULT_WAREHOUSE);
        let database = pick("SNOWFLAKE_DATABASE", "database", DEFAULT_DATABASE);
        let schema = pick("SNOWFLAKE_SCHEMA", "schema", DEFAULT_SCHEMA);
        let role = self.env("SNOWFLAKE_ROLE").or_else(|| file.get("role").cloned());

        let auth = match token {
            Some(token) => Authentication::OAuth {
                token,
                host: self.env("SNOWFLAKE_HOST"),
            },
            None => Authentication::User {
                username: pick("SNOWFLAKE_USER", "user", DEFAULT_USER),
                authenticator: file
                    .get("authenticator")
                    .map(|a| a.to_uppercase())
                    .unwrap_or_else(|| DEFAULT_AUTHENTICATOR.to_string()),
                password: self
                    .env("SNOWFLAKE_PASSWORD")
                    .or_else(|| file.get("password").cloned()),
            },
        };

        ConnectionConfig {
            account,
            warehouse,
            database,
            schema,
            role,
            auth,
        }
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_PATH, Self::default_config_path())
    }
}
