//! Shared scripted driver for integration tests.
//!
//! `MockDriver` records every open and execute call and replays a scripted
//! queue of outcomes, so the resilience machinery can be exercised without a
//! SQL Server instance.

#![allow(dead_code)]

use async_trait::async_trait;
use mssql_bridge::config::ConnectionConfig;
use mssql_bridge::db::driver::{
    DriverConnector, DriverPool, DriverResponse, PoolHandle, RowsAffected,
};
use mssql_bridge::error::{DbError, DbResult};
use mssql_bridge::models::{Row, Value};
use mssql_bridge::sql::BoundStatement;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted outcome for one execute() call.
pub enum MockOutcome {
    Rows(Vec<Row>),
    Affected(Vec<u64>),
    ConnectionError(&'static str),
    ExecutionError(&'static str),
    /// Never settles within the request timeout.
    Hang,
}

/// Shared state observed by the connector and every pool it opens.
pub struct MockDriver {
    pub open_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    failed_opens: AtomicUsize,
    open_delay: Mutex<Duration>,
    outcomes: Mutex<VecDeque<MockOutcome>>,
    statements: Mutex<Vec<BoundStatement>>,
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            failed_opens: AtomicUsize::new(0),
            open_delay: Mutex::new(Duration::ZERO),
            outcomes: Mutex::new(VecDeque::new()),
            statements: Mutex::new(Vec::new()),
        })
    }

    /// Queue an outcome for the next unscripted execute() call.
    pub fn script(&self, outcome: MockOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Make the next `n` open() calls fail with a connection error.
    pub fn fail_next_opens(&self, n: usize) {
        self.failed_opens.store(n, Ordering::SeqCst);
    }

    /// Delay every open() by `delay` (virtual time).
    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = delay;
    }

    pub fn opens(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// The most recently executed bound statement.
    pub fn last_statement(&self) -> Option<BoundStatement> {
        self.statements.lock().unwrap().last().cloned()
    }

    fn take_open_failure(&self) -> bool {
        self.failed_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

pub struct MockConnector {
    pub driver: Arc<MockDriver>,
}

#[async_trait]
impl DriverConnector for MockConnector {
    async fn open(&self, _config: &ConnectionConfig) -> DbResult<PoolHandle> {
        self.driver.open_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.driver.open_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.driver.take_open_failure() {
            return Err(DbError::connection("mock server unreachable"));
        }

        Ok(Arc::new(MockPool {
            driver: Arc::clone(&self.driver),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct MockPool {
    driver: Arc<MockDriver>,
    closed: AtomicBool,
}

#[async_trait]
impl DriverPool for MockPool {
    async fn execute(&self, statement: &BoundStatement) -> DbResult<DriverResponse> {
        self.driver.execute_calls.fetch_add(1, Ordering::SeqCst);
        self.driver
            .statements
            .lock()
            .unwrap()
            .push(statement.clone());

        let outcome = self.driver.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(MockOutcome::Rows(rows)) => Ok(DriverResponse {
                rows,
                rows_affected: RowsAffected::Unknown,
            }),
            Some(MockOutcome::Affected(counts)) => Ok(DriverResponse {
                rows: Vec::new(),
                rows_affected: RowsAffected::PerStatement(counts),
            }),
            Some(MockOutcome::ConnectionError(message)) => Err(DbError::connection(message)),
            Some(MockOutcome::ExecutionError(message)) => Err(DbError::execution(message, Some(102))),
            Some(MockOutcome::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(DbError::connection("hung statement woke up"))
            }
            None => Ok(DriverResponse::default()),
        }
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Install a subscriber so `RUST_LOG=debug cargo test` shows the layer's
/// tracing output. Safe to call from every test; only the first wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration for scripted tests. Production-like so the health monitor
/// stays out of the script; the monitor has its own test.
pub fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        environment: "production".to_string(),
        ..ConnectionConfig::default()
    }
}

/// Build a result row from name/value pairs.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
