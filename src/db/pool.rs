//! Connection pool lifecycle management.
//!
//! [`PoolManager`] owns the pool handle and its state machine. Construction is
//! single-flight: the first caller that finds no usable pool spawns one build
//! task and every concurrent caller awaits the same outcome through a shared
//! watch channel, so a burst of requests against a cold or degraded pool
//! produces exactly one construction attempt.
//!
//! State transitions:
//! `Uninitialized -> Connecting` on the first acquisition,
//! `Connecting -> Healthy` when construction succeeds,
//! `Connecting -> Uninitialized` when it fails,
//! `Healthy -> Degraded` when a query surfaces a connection-class error,
//! `Degraded -> Connecting` on the next acquisition, and any non-`Closed`
//! state `-> Closed` on shutdown. `Closed` is terminal.

use crate::config::ConnectionConfig;
use crate::db::driver::{DriverConnector, PoolHandle};
use crate::error::{DbError, DbResult};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// Pool lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Uninitialized,
    Connecting,
    Healthy,
    Degraded,
    Closed,
}

/// Outcome of one construction attempt, shared by every waiter.
type BuildOutcome = Result<PoolHandle, Arc<DbError>>;
type BuildReceiver = watch::Receiver<Option<BuildOutcome>>;

struct PoolInner {
    state: PoolState,
    handle: Option<PoolHandle>,
    /// Present while a construction is in flight; cleared by the build task.
    in_flight: Option<BuildReceiver>,
}

/// Owns the singleton pool handle and serializes its construction.
pub struct PoolManager {
    config: ConnectionConfig,
    connector: Arc<dyn DriverConnector>,
    inner: Mutex<PoolInner>,
    /// Self-reference handed to spawned build tasks.
    weak: Weak<Self>,
}

impl PoolManager {
    /// Create a new pool manager. No connection is opened until the first
    /// acquisition.
    pub fn new(config: ConnectionConfig, connector: Arc<dyn DriverConnector>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            connector,
            inner: Mutex::new(PoolInner {
                state: PoolState::Uninitialized,
                handle: None,
                in_flight: None,
            }),
            weak: weak.clone(),
        })
    }

    /// Get the pool handle, building it if necessary.
    ///
    /// A Healthy pool is returned without blocking. Otherwise this caller
    /// either joins an in-flight construction or becomes the builder; either
    /// way it observes the construction's outcome. A single failed attempt is
    /// reported as-is - retrying is the caller's decision.
    pub async fn get_pool(&self) -> DbResult<PoolHandle> {
        let rx = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                PoolState::Closed => return Err(Self::closed_error()),
                PoolState::Healthy => {
                    if let Some(handle) = &inner.handle {
                        if handle.is_connected() {
                            return Ok(Arc::clone(handle));
                        }
                    }
                }
                _ => {}
            }
            self.spawn_or_join(&mut inner)
        };

        self.await_build(rx).await
    }

    /// Tear down the current handle and build a fresh one, regardless of the
    /// current state. Used for manual recovery and by the health monitor.
    pub async fn restart_pool(&self) -> DbResult<PoolHandle> {
        let rx = {
            let mut inner = self.inner.lock().await;
            if inner.state == PoolState::Closed {
                return Err(Self::closed_error());
            }
            self.spawn_or_join(&mut inner)
        };

        self.await_build(rx).await
    }

    /// Flip a Healthy pool to Degraded after a connection-class failure. The
    /// next acquisition rebuilds. No-op in any other state.
    pub async fn mark_degraded(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == PoolState::Healthy {
            warn!("pool marked degraded after connection-class failure");
            inner.state = PoolState::Degraded;
        }
    }

    /// Close the pool and make the manager terminal. Idempotent.
    pub async fn close_pool(&self) {
        let handle = {
            let mut inner = self.inner.lock().await;
            if inner.state == PoolState::Closed {
                return;
            }
            inner.state = PoolState::Closed;
            inner.in_flight = None;
            inner.handle.take()
        };

        if let Some(handle) = handle {
            let grace = self.config.pool.destroy_timeout();
            if tokio::time::timeout(grace, handle.close()).await.is_err() {
                warn!(grace_secs = grace.as_secs(), "pool close timed out, abandoning handle");
            }
        }
        info!("connection pool closed");
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> PoolState {
        self.inner.lock().await.state
    }

    /// Whether the pool is Healthy and its handle reports itself connected.
    pub async fn is_healthy(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.state == PoolState::Healthy
            && inner
                .handle
                .as_ref()
                .is_some_and(|handle| handle.is_connected())
    }

    /// Join the in-flight construction, or register a new one and spawn its
    /// build task. Must be called with the inner lock held.
    fn spawn_or_join(&self, inner: &mut PoolInner) -> BuildReceiver {
        if let Some(rx) = &inner.in_flight {
            debug!("joining in-flight pool construction");
            return rx.clone();
        }

        let (tx, rx) = watch::channel(None);
        inner.state = PoolState::Connecting;
        let stale = inner.handle.take();
        inner.in_flight = Some(rx.clone());

        // `new` is the only constructor, so `self` always lives inside an
        // Arc and the upgrade succeeds while any caller holds it.
        if let Some(manager) = self.weak.upgrade() {
            tokio::spawn(async move {
                manager.run_build(stale, tx).await;
            });
        }

        rx
    }

    /// The single-flight build task: tear down the stale handle, construct a
    /// fresh one, publish the outcome to every waiter.
    async fn run_build(
        self: Arc<Self>,
        stale: Option<PoolHandle>,
        tx: watch::Sender<Option<BuildOutcome>>,
    ) {
        if let Some(handle) = stale {
            debug!("closing stale pool handle before rebuild");
            // Teardown failures are ignored; the handle is gone either way.
            handle.close().await;
        }

        let outcome: BuildOutcome = self
            .connector
            .open(&self.config)
            .await
            .map_err(Arc::new);

        let discarded = {
            let mut inner = self.inner.lock().await;
            inner.in_flight = None;
            if inner.state == PoolState::Closed {
                // close_pool() won the race; the fresh handle is surplus.
                outcome.as_ref().ok().map(Arc::clone)
            } else {
                match &outcome {
                    Ok(handle) => {
                        inner.handle = Some(Arc::clone(handle));
                        inner.state = PoolState::Healthy;
                        info!(server = %self.config.summary(), "pool construction succeeded");
                    }
                    Err(error) => {
                        inner.state = PoolState::Uninitialized;
                        warn!(error = %error, "pool construction failed");
                    }
                }
                None
            }
        };

        if let Some(handle) = discarded {
            handle.close().await;
            let _ = tx.send(Some(Err(Arc::new(Self::closed_error()))));
            return;
        }

        let _ = tx.send(Some(outcome));
    }

    /// Wait (bounded) for an in-flight construction to publish its outcome.
    async fn await_build(&self, mut rx: BuildReceiver) -> DbResult<PoolHandle> {
        let wait = self.config.pool.acquire_timeout();
        let outcome = tokio::time::timeout(wait, async {
            loop {
                let current = rx.borrow().clone();
                if let Some(outcome) = current {
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    // The build task vanished without publishing.
                    return Err(Arc::new(DbError::connection(
                        "pool construction aborted before completing",
                    )));
                }
            }
        })
        .await;

        match outcome {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(error)) => Err((*error).clone()),
            Err(_) => Err(DbError::pool_exhausted(format!(
                "no healthy pool within {}s",
                wait.as_secs()
            ))),
        }
    }

    fn closed_error() -> DbError {
        DbError::connection("connection pool is closed")
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("server", &self.config.summary())
            .finish_non_exhaustive()
    }
}
