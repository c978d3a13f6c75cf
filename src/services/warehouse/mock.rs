// In-memory warehouse used by tests across the crate
use super::adapter::{Row, Statement, WarehouseConnection, WarehouseConnector};
use super::credentials::ConnectionConfig;
use super::error::WarehouseError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = dyn Fn(&Statement) -> Result<Vec<Row>, WarehouseError> + Send + Sync;

#[derive(Default)]
struct Shared {
    connects: AtomicUsize,
    closes: AtomicUsize,
    connect_failures: Mutex<VecDeque<WarehouseError>>,
    results: Mutex<VecDeque<Result<Vec<Row>, WarehouseError>>>,
    executed: Mutex<Vec<Statement>>,
    configs: Mutex<Vec<ConnectionConfig>>,
}

pub struct MockConnector {
    shared: Arc<Shared>,
    connect_delay: Duration,
    responder: Option<Arc<Responder>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            connect_delay: Duration::ZERO,
            responder: None,
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn fail_next_connect(self, error: WarehouseError) -> Self {
        self.shared.connect_failures.lock().unwrap().push_back(error);
        self
    }

    /// Answer statements that have no queued result
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Statement) -> Result<Vec<Row>, WarehouseError> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Queue the outcome of the next executed statement
    pub fn push_result(&self, result: Result<Vec<Row>, WarehouseError>) {
        self.shared.results.lock().unwrap().push_back(result);
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.shared.executed.lock().unwrap().clone()
    }

    pub fn last_config(&self) -> Option<ConnectionConfig> {
        self.shared.configs.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl WarehouseConnector for MockConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn WarehouseConnection>, WarehouseError> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        self.shared.configs.lock().unwrap().push(config.clone());

        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }

        let failure = self.shared.connect_failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(Arc::new(MockConnection {
            shared: self.shared.clone(),
            responder: self.responder.clone(),
        }))
    }
}

struct MockConnection {
    shared: Arc<Shared>,
    responder: Option<Arc<Responder>>,
}

#[async_trait::async_trait]
impl WarehouseConnection for MockConnection {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, WarehouseError> {
        self.shared.executed.lock().unwrap().push(statement.clone());

        let queued = self.shared.results.lock().unwrap().pop_front();
        match (queued, &self.responder) {
            (Some(result), _) => result,
            (None, Some(responder)) => responder(statement),
            (None, None) => Ok(Vec::new()),
        }
    }

    async fn close(&self) -> Result<(), WarehouseError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Build a row from column/value pairs
pub fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
