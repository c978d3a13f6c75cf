use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::adapter::{WarehouseConnection, WarehouseConnector};
use super::credentials::CredentialResolver;
use super::error::WarehouseError;

type ConnectResult = Result<Arc<dyn WarehouseConnection>, WarehouseError>;
type SharedAttempt = Shared<BoxFuture<'static, ConnectResult>>;

/// Lifecycle of the process-wide warehouse session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NoConnection,
    Connecting,
    Connected,
}

struct InFlight {
    id: u64,
    attempt: SharedAttempt,
}

#[derive(Default)]
struct SessionState {
    connection: Option<Arc<dyn WarehouseConnection>>,
    /// OAuth token the cached connection was built with
    token: Option<String>,
    in_flight: Option<InFlight>,
    next_attempt_id: u64,
}

/// Owns the single warehouse session shared by all request handlers
///
/// At most one connection is cached and at most one connection attempt runs
/// at a time. Callers that arrive while an attempt is in flight wait for that
/// same attempt and see its result, success or failure.
pub struct SessionManager {
    connector: Arc<dyn WarehouseConnector>,
    resolver: CredentialResolver,
    state: Arc<Mutex<SessionState>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn WarehouseConnector>, resolver: CredentialResolver) -> Self {
        Self {
            connector,
            resolver,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Return the live connection, establishing one if needed
    ///
    /// The token file is re-read on every call. A cached connection is reused
    /// when there is no token or the token is unchanged; a rotated token
    /// releases the cached connection and builds a new one.
    pub async fn get_connection(&self) -> ConnectResult {
        let token = self.resolver.read_token().await;

        let attempt = {
            let mut state = self.state.lock().await;

            let token_current = token.is_none() || token == state.token;
            if token_current {
                if let Some(connection) = &state.connection {
                    return Ok(connection.clone());
                }
            }

            let joined = state
                .in_flight
                .as_ref()
                .map(|in_flight| (in_flight.id, in_flight.attempt.clone()));

            match joined {
                Some((id, attempt)) => {
                    tracing::debug!("Joining in-flight warehouse connection attempt {}", id);
                    attempt
                }
                None => {
                    if let Some(stale) = state.connection.take() {
                        tracing::info!("OAuth token changed, reconnecting to warehouse");
                        release(stale);
                    }

                    let id = state.next_attempt_id;
                    state.next_attempt_id += 1;

                    let attempt = self.connect_attempt(id, token).boxed().shared();
                    state.in_flight = Some(InFlight {
                        id,
                        attempt: attempt.clone(),
                    });
                    attempt
                }
            }
        };

        attempt.await
    }

    fn connect_attempt(
        &self,
        id: u64,
        token: Option<String>,
    ) -> impl std::future::Future<Output = ConnectResult> + Send + 'static {
        let connector = self.connector.clone();
        let resolver = self.resolver.clone();
        let state = self.state.clone();

        async move {
            let config = resolver.resolve_with_token(token.clone()).await;
            tracing::info!(
                "Connecting to warehouse account: {}, authenticator: {}",
                config.account,
                config.authenticator()
            );

            let result = connector.connect(&config).await;

            // Runs for success and failure alike so the next caller is never
            // stuck behind a finished attempt
            let mut state = state.lock().await;
            if state.in_flight.as_ref().map(|f| f.id) == Some(id) {
                state.in_flight = None;
            }

            match result {
                Ok(connection) => {
                    tracing::info!("Connected to warehouse account: {}", config.account);
                    state.connection = Some(connection.clone());
                    state.token = token;
                    Ok(connection)
                }
                Err(e) => {
                    tracing::error!("Warehouse connection attempt {} failed: {}", id, e);
                    Err(e)
                }
            }
        }
    }

    /// Forget the cached connection so the next call reconnects
    ///
    /// The handle is dropped, not closed: other in-flight statements may
    /// still be using it.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.connection.take().is_some() {
            tracing::debug!("Invalidated cached warehouse connection");
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.lock().await;
        if state.in_flight.is_some() {
            SessionStatus::Connecting
        } else if state.connection.is_some() {
            SessionStatus::Connected
        } else {
            SessionStatus::NoConnection
        }
    }

    /// Close the cached connection, if any; used on shutdown
    pub async fn shutdown(&self) {
        let connection = self.state.lock().await.connection.take();
        if let Some(connection) = connection {
            if let Err(e) = connection.close().await {
                tracing::warn!("Failed to close warehouse session on shutdown: {}", e);
            }
        }
    }
}

/// Close a superseded connection in the background
fn release(connection: Arc<dyn WarehouseConnection>) {
    tokio::spawn(async move {
        if let Err(e) = connection.close().await {
            tracing::warn!("Failed to release superseded warehouse session: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::warehouse::mock::MockConnector;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, connector: Arc<MockConnector>) -> SessionManager {
        let resolver = CredentialResolver::new(dir.path().join("token"), None).with_env(|_| None);
        SessionManager::new(connector, resolver)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(MockConnector::new().with_connect_delay(Duration::from_millis(50)));
        let manager = Arc::new(manager(&dir, connector.clone()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.get_connection().await }));
        }

        let mut connections = Vec::new();
        for handle in handles {
            connections.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(connector.connect_count(), 1);
        for connection in &connections[1..] {
            assert!(Arc::ptr_eq(&connections[0], connection));
        }
        assert_eq!(manager.status().await, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(
            MockConnector::new()
                .with_connect_delay(Duration::from_millis(50))
                .fail_next_connect(WarehouseError::Connection {
                    code: Some(390100),
                    message: "Incorrect username or password was specified.".to_string(),
                }),
        );
        let manager = Arc::new(manager(&dir, connector.clone()));

        let (a, b, c) = tokio::join!(
            manager.get_connection(),
            manager.get_connection(),
            manager.get_connection()
        );

        assert!(a.is_err() && b.is_err() && c.is_err());
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(manager.status().await, SessionStatus::NoConnection);

        // The failed attempt is not sticky
        assert!(manager.get_connection().await.is_ok());
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_token_rotation_reconnects_once() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "token-a").unwrap();

        let connector = Arc::new(MockConnector::new());
        let manager = manager(&dir, connector.clone());

        let first = manager.get_connection().await.unwrap();
        let again = manager.get_connection().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(connector.connect_count(), 1);

        std::fs::write(&token_path, "token-b").unwrap();
        let rotated = manager.get_connection().await.unwrap();
        let rotated_again = manager.get_connection().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &rotated));
        assert!(Arc::ptr_eq(&rotated, &rotated_again));
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(connector.last_config().unwrap().token(), Some("token-b"));

        // Release happens on a spawned task
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connector.close_count(), 1);
    }

    #[tokio::test]
    async fn test_rotation_seen_by_concurrent_callers_shares_one_attempt() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "a").unwrap();

        let connector = Arc::new(MockConnector::new().with_connect_delay(Duration::from_millis(50)));
        let manager = manager(&dir, connector.clone());

        let stale = manager.get_connection().await.unwrap();
        assert_eq!(connector.connect_count(), 1);

        std::fs::write(&token_path, "b").unwrap();
        let (a, b, c) = tokio::join!(
            manager.get_connection(),
            manager.get_connection(),
            manager.get_connection()
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(connector.connect_count(), 2);
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert!(!Arc::ptr_eq(&stale, &a));
        assert_eq!(connector.last_config().unwrap().token(), Some("b"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connector.close_count(), 1);
    }

    #[tokio::test]
    async fn test_without_token_connection_is_reused() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(MockConnector::new());
        let manager = manager(&dir, connector.clone());

        let first = manager.get_connection().await.unwrap();
        for _ in 0..5 {
            let next = manager.get_connection().await.unwrap();
            assert!(Arc::ptr_eq(&first, &next));
        }
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(connector.close_count(), 0);
    }

    #[tokio::test]
    async fn test_token_disappearing_keeps_connection() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "token-a").unwrap();

        let connector = Arc::new(MockConnector::new());
        let manager = manager(&dir, connector.clone());

        let first = manager.get_connection().await.unwrap();
        std::fs::remove_file(&token_path).unwrap();
        let next = manager.get_connection().await.unwrap();

        assert!(Arc::ptr_eq(&first, &next));
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reconnect() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(MockConnector::new());
        let manager = manager(&dir, connector.clone());

        assert_eq!(manager.status().await, SessionStatus::NoConnection);
        let first = manager.get_connection().await.unwrap();
        manager.invalidate().await;
        assert_eq!(manager.status().await, SessionStatus::NoConnection);

        let second = manager.get_connection().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_count(), 2);
        // Invalidation drops without closing
        assert_eq!(connector.close_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_connection() {
        let dir = TempDir::new().unwrap();
        let connector = Arc::new(MockConnector::new());
        let manager = manager(&dir, connector.clone());

        manager.get_connection().await.unwrap();
        manager.shutdown().await;

        assert_eq!(connector.close_count(), 1);
        assert_eq!(manager.status().await, SessionStatus::NoConnection);
    }
}
