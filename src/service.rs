//! The explicitly-owned database service.
//!
//! [`Database`] wires the pool manager, executor and health monitor together
//! behind one handle with an explicit lifecycle: construct it once at process
//! start, pass it by reference to whatever needs it, close it on shutdown.
//! There is no ambient global; dropping the service without closing it aborts
//! the monitor and abandons the pool to the runtime.

use crate::config::ConnectionConfig;
use crate::db::driver::DriverConnector;
use crate::db::executor::QueryExecutor;
use crate::db::health::HealthMonitor;
use crate::db::mssql::MssqlConnector;
use crate::db::pool::{PoolManager, PoolState};
use crate::error::DbResult;
use crate::models::{QueryResult, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Database {
    pool: Arc<PoolManager>,
    executor: Arc<QueryExecutor>,
    /// Uses std::sync::Mutex (not tokio) so close() can take the handle
    /// without awaiting.
    monitor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// Create the service against SQL Server.
    ///
    /// The pool itself is built lazily on the first query; construction here
    /// only validates the configuration and starts the health monitor when
    /// the environment calls for one.
    pub async fn connect(config: ConnectionConfig) -> DbResult<Self> {
        Self::connect_with(config, Arc::new(MssqlConnector)).await
    }

    /// Create the service over an arbitrary driver. Used by tests to inject
    /// scripted drivers; production callers use [`Database::connect`].
    pub async fn connect_with(
        config: ConnectionConfig,
        connector: Arc<dyn DriverConnector>,
    ) -> DbResult<Self> {
        config.validate()?;

        let pool = PoolManager::new(config.clone(), connector);
        let executor = Arc::new(QueryExecutor::new(
            Arc::clone(&pool),
            config.retry_policy(),
            config.request_timeout(),
        ));

        let monitor = config.health_monitor_enabled().then(|| {
            info!(
                interval_secs = config.health_interval_secs,
                "starting pool health monitor"
            );
            HealthMonitor::spawn(
                Arc::downgrade(&executor),
                Arc::downgrade(&pool),
                config.health_interval(),
            )
        });

        Ok(Self {
            pool,
            executor,
            monitor: std::sync::Mutex::new(monitor),
        })
    }

    /// Execute one statement and return the normalized result.
    pub async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryResult> {
        self.executor.query(sql, params).await
    }

    /// Issue the trivial liveness statement.
    pub async fn probe(&self) -> DbResult<()> {
        self.executor.probe().await
    }

    /// Tear down and rebuild the pool (manual recovery).
    pub async fn restart(&self) -> DbResult<()> {
        self.pool.restart_pool().await.map(|_| ())
    }

    /// Current pool lifecycle state.
    pub async fn pool_state(&self) -> PoolState {
        self.pool.state().await
    }

    /// Whether the pool is Healthy and connected.
    pub async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }

    /// Stop the health monitor and close the pool. Idempotent; the service
    /// rejects queries afterwards.
    pub async fn close(&self) {
        if let Some(handle) = self.monitor.lock().unwrap().take() {
            handle.abort();
        }
        self.pool.close_pool().await;
    }

    /// Wait for a termination signal (SIGINT/SIGTERM), then close the pool.
    /// Intended to be spawned alongside the application's main loop.
    pub async fn close_on_shutdown_signal(&self) {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, closing connection pool");
        self.close().await;
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate.recv() => {}
            }
        }
        Err(error) => {
            tracing::warn!(error = %error, "SIGTERM handler unavailable, watching SIGINT only");
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
