// Snowflake adapter using the HTTPS session and query endpoints
use super::adapter::{Row, Statement, WarehouseConnection, WarehouseConnector};
use super::converter::{rows_to_json, RowType};
use super::credentials::{Authentication, ConnectionConfig};
use super::error::WarehouseError;
use super::sso::{RedirectListener, SsoGrant};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const CLIENT_APP_ID: &str = "customer360-backend";
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const ACCEPT_SNOWFLAKE: &str = "application/snowflake";

const PASSWORD_AUTHENTICATOR: &str = "SNOWFLAKE";
const EXTERNAL_BROWSER_AUTHENTICATOR: &str = "EXTERNALBROWSER";

/// Statement still running; poll `getResultUrl`
const QUERY_IN_PROGRESS: &str = "333333";
const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct SnowflakeResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    success: bool,
}

impl SnowflakeResponse {
    fn code_number(&self) -> Option<i64> {
        self.code.as_deref().and_then(|c| c.parse().ok())
    }

    fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "no message returned".to_string())
    }

    fn data<T: DeserializeOwned>(self) -> Result<T, WarehouseError> {
        let data = self
            .data
            .ok_or_else(|| WarehouseError::Protocol("response has no data".to_string()))?;
        serde_json::from_value(data)
            .map_err(|e| WarehouseError::Protocol(format!("Failed to parse response data: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatorData {
    sso_url: String,
    proof_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
    #[serde(default)]
    chunks: Vec<ResultChunk>,
    #[serde(default)]
    qrmk: Option<String>,
    #[serde(default)]
    chunk_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    get_result_url: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultChunk {
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    query_submission_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    bindings: Option<Map<String, Value>>,
}

/// Opens Snowflake sessions over HTTPS
pub struct SnowflakeConnector {
    client: Client,
    sso_timeout: Duration,
}

impl SnowflakeConnector {
    pub const DEFAULT_SSO_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(request_timeout: Duration) -> Result<Self, WarehouseError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| WarehouseError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            sso_timeout: Self::DEFAULT_SSO_TIMEOUT,
        })
    }

    /// How long an external-browser login waits for the SSO redirect
    pub fn with_sso_timeout(mut self, timeout: Duration) -> Self {
        self.sso_timeout = timeout;
        self
    }

    /// `https://<host>` in token mode when a host is given, otherwise the
    /// public account URL
    pub fn base_url(config: &ConnectionConfig) -> Result<Url, WarehouseError> {
        let raw = match config.host() {
            Some(host) if host.contains("://") => host.to_string(),
            Some(host) => format!("https://{}", host),
            None => format!(
                "https://{}.snowflakecomputing.com",
                config.account.to_lowercase().replace('_', "-")
            ),
        };

        Url::parse(&raw)
            .map_err(|e| WarehouseError::Connection {
                code: None,
                message: format!("Invalid warehouse URL {}: {}", raw, e),
            })
    }

    /// Fields common to every login-flow request
    fn client_data(config: &ConnectionConfig) -> Value {
        let account_name = config
            .account
            .split('.')
            .next()
            .unwrap_or(&config.account)
            .to_uppercase();

        json!({
            "CLIENT_APP_ID": CLIENT_APP_ID,
            "CLIENT_APP_VERSION": CLIENT_APP_VERSION,
            "ACCOUNT_NAME": account_name,
        })
    }

    fn login_body(config: &ConnectionConfig, sso: Option<&SsoGrant>) -> Result<Value, WarehouseError> {
        let mut data = Self::client_data(config);

        match &config.auth {
            Authentication::OAuth { token, .. } => {
                data["AUTHENTICATOR"] = json!("OAUTH");
                data["TOKEN"] = json!(token);
            }
            Authentication::User {
                username,
                authenticator,
                password,
            } => match authenticator.as_str() {
                PASSWORD_AUTHENTICATOR => {
                    let password = password.as_ref().ok_or_else(|| WarehouseError::Connection {
                        code: None,
                        message: format!(
                            "Password authentication for user {} needs SNOWFLAKE_PASSWORD",
                            username
                        ),
                    })?;
                    data["AUTHENTICATOR"] = json!(PASSWORD_AUTHENTICATOR);
                    data["LOGIN_NAME"] = json!(username);
                    data["PASSWORD"] = json!(password);
                }
                EXTERNAL_BROWSER_AUTHENTICATOR => {
                    let grant = sso.ok_or_else(|| WarehouseError::Connection {
                        code: None,
                        message: format!("No SSO token obtained for user {}", username),
                    })?;
                    data["AUTHENTICATOR"] = json!(EXTERNAL_BROWSER_AUTHENTICATOR);
                    data["LOGIN_NAME"] = json!(username);
                    data["TOKEN"] = json!(grant.token);
                    data["PROOF_KEY"] = json!(grant.proof_key);
                }
                other => return Err(WarehouseError::UnsupportedAuthenticator(other.to_string())),
            },
        }

        Ok(json!({ "data": data }))
    }

    /// POST one step of the login flow; any failure is a connection error
    async fn post_login_step(&self, url: Url, body: &Value) -> Result<SnowflakeResponse, WarehouseError> {
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| WarehouseError::Connection {
                code: None,
                message: format!("Login request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(WarehouseError::Connection {
                code: None,
                message: format!("Login failed ({}): {}", status, error_body),
            });
        }

        let parsed: SnowflakeResponse = response.json().await.map_err(|e| WarehouseError::Connection {
            code: None,
            message: format!("Failed to parse login response: {}", e),
        })?;

        if !parsed.success {
            return Err(WarehouseError::Connection {
                code: parsed.code_number(),
                message: parsed.message(),
            });
        }

        Ok(parsed)
    }

    /// Run the browser SSO handshake and wait for the identity provider's redirect
    async fn external_browser_grant(
        &self,
        base_url: &Url,
        config: &ConnectionConfig,
        username: &str,
    ) -> Result<SsoGrant, WarehouseError> {
        let listener = RedirectListener::bind().await?;

        let mut url = base_url
            .join("/session/authenticator-request")
            .map_err(|e| WarehouseError::Protocol(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("request_id", &uuid::Uuid::new_v4().to_string());

        let mut data = Self::client_data(config);
        data["LOGIN_NAME"] = json!(username);
        data["AUTHENTICATOR"] = json!(EXTERNAL_BROWSER_AUTHENTICATOR);
        data["BROWSER_MODE_REDIRECT_PORT"] = json!(listener.port().to_string());

        let response = self.post_login_step(url, &json!({ "data": data })).await?;
        let sso: AuthenticatorData = response.data()?;

        tracing::warn!(
            "Warehouse sign-in for {} needs a browser; open this URL within {:?}: {}",
            username,
            self.sso_timeout,
            sso.sso_url
        );

        let token = listener.wait_for_token(self.sso_timeout).await?;
        tracing::info!("SSO redirect received for {}", username);

        Ok(SsoGrant {
            token,
            proof_key: sso.proof_key,
        })
    }
}

#[async_trait::async_trait]
impl WarehouseConnector for SnowflakeConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn WarehouseConnection>, WarehouseError> {
        let base_url = Self::base_url(config)?;

        let sso = match &config.auth {
            Authentication::User {
                username,
                authenticator,
                ..
            } if authenticator == EXTERNAL_BROWSER_AUTHENTICATOR => {
                Some(self.external_browser_grant(&base_url, config, username).await?)
            }
            _ => None,
        };
        let body = Self::login_body(config, sso.as_ref())?;

        let mut login_url = base_url
            .join("/session/v1/login-request")
            .map_err(|e| WarehouseError::Protocol(e.to_string()))?;
        {
            let mut params = login_url.query_pairs_mut();
            params.append_pair("request_id", &uuid::Uuid::new_v4().to_string());
            params.append_pair("warehouse", &config.warehouse);
            params.append_pair("databaseName", &config.database);
            params.append_pair("schemaName", &config.schema);
            if let Some(role) = &config.role {
                params.append_pair("roleName", role);
            }
        }

        let login = self.post_login_step(login_url, &body).await?;
        let data: LoginData = login.data()?;

        Ok(Arc::new(SnowflakeConnection {
            client: self.client.clone(),
            base_url,
            session_token: data.token,
            sequence: AtomicU64::new(0),
        }))
    }
}

/// Sort reqwest failures: a dropped socket means the session is gone
fn request_error(e: reqwest::Error) -> WarehouseError {
    if e.is_timeout() {
        WarehouseError::Transport(e.to_string())
    } else if e.is_connect() || e.is_request() || e.is_body() {
        WarehouseError::ConnectionLost(e.to_string())
    } else {
        WarehouseError::Transport(e.to_string())
    }
}

/// An authenticated Snowflake session
pub struct SnowflakeConnection {
    client: Client,
    base_url: Url,
    session_token: String,
    sequence: AtomicU64,
}

impl SnowflakeConnection {
    fn auth_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.session_token)
    }

    fn bindings(statement: &Statement) -> Option<Map<String, Value>> {
        if statement.bindings.is_empty() {
            return None;
        }

        let bindings = statement
            .bindings
            .iter()
            .enumerate()
            .map(|(idx, binding)| {
                (
                    (idx + 1).to_string(),
                    json!({ "type": binding.type_name(), "value": binding.wire_value() }),
                )
            })
            .collect();
        Some(bindings)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<SnowflakeResponse, WarehouseError> {
        let response = request
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, ACCEPT_SNOWFLAKE)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(WarehouseError::Transport(format!("HTTP {}: {}", status, error_body)));
        }

        response
            .json::<SnowflakeResponse>()
            .await
            .map_err(|e| WarehouseError::Protocol(format!("Failed to parse query response: {}", e)))
    }

    async fn fetch_chunk(&self, chunk: &ResultChunk, data: &QueryData) -> Result<Vec<Vec<Value>>, WarehouseError> {
        let mut request = self.client.get(&chunk.url);
        if let Some(headers) = &data.chunk_headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
        } else if let Some(qrmk) = &data.qrmk {
            request = request
                .header("x-amz-server-side-encryption-customer-algorithm", "AES256")
                .header("x-amz-server-side-encryption-customer-key", qrmk.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(request_error)?;
        if !response.status().is_success() {
            return Err(WarehouseError::Transport(format!(
                "Failed to fetch result chunk: HTTP {}",
                response.status()
            )));
        }

        // Chunks are comma-separated row arrays without the enclosing brackets
        let body = response
            .text()
            .await
            .map_err(|e| WarehouseError::Transport(format!("Failed to read result chunk: {}", e)))?;
        serde_json::from_str(&format!("[{}]", body))
            .map_err(|e| WarehouseError::Protocol(format!("Failed to parse result chunk: {}", e)))
    }
}

#[async_trait::async_trait]
impl WarehouseConnection for SnowflakeConnection {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, WarehouseError> {
        let mut url = self
            .base_url
            .join("/queries/v1/query-request")
            .map_err(|e| WarehouseError::Protocol(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("requestId", &uuid::Uuid::new_v4().to_string());

        let body = QueryRequest {
            sql_text: &statement.sql,
            async_exec: false,
            sequence_id: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            query_submission_time: chrono::Utc::now().timestamp_millis(),
            bindings: Self::bindings(statement),
        };

        let mut response = self.send(self.client.post(url).json(&body)).await?;

        while matches!(
            response.code.as_deref(),
            Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
        ) {
            let data: QueryData = response.data()?;
            let result_path = data.get_result_url.ok_or_else(|| {
                WarehouseError::Protocol("statement in progress without result URL".to_string())
            })?;
            let poll_url = self
                .base_url
                .join(&result_path)
                .map_err(|e| WarehouseError::Protocol(e.to_string()))?;

            tokio::time::sleep(POLL_INTERVAL).await;
            response = self.send(self.client.get(poll_url)).await?;
        }

        if !response.success {
            let code = response.code_number();
            let message = response.message();
            let sql_state = response
                .data
                .as_ref()
                .and_then(|d| d.get("sqlState"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(WarehouseError::Execution {
                code,
                sql_state,
                message,
            });
        }

        // DDL/DML may come back without a result set
        let mut data: QueryData = if response.data.is_some() {
            response.data()?
        } else {
            QueryData::default()
        };

        let mut rowset = std::mem::take(&mut data.rowset);
        for chunk in &data.chunks {
            rowset.extend(self.fetch_chunk(chunk, &data).await?);
        }

        if let Some(state) = &data.sql_state {
            tracing::trace!("Statement finished with SQL state {}", state);
        }

        Ok(rows_to_json(&data.rowtype, rowset))
    }

    async fn close(&self) -> Result<(), WarehouseError> {
        let mut url = self
            .base_url
            .join("/session")
            .map_err(|e| WarehouseError::Protocol(e.to_string()))?;
        url.query_pairs_mut().append_pair("delete", "true");

        let response = self.send(self.client.post(url)).await?;
        if !response.success {
            return Err(WarehouseError::Execution {
                code: response.code_number(),
                sql_state: None,
                message: response.message(),
            });
        }
        Ok(())
    }
}
