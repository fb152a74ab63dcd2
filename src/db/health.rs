//! Background pool health monitoring.
//!
//! A periodic task probes the store with a trivial statement through the
//! executor and restarts the pool when the probe fails. It runs independently
//! of the request path; probe and restart failures are logged, never
//! propagated. The task holds only weak references and exits when the owning
//! service is dropped.

use crate::db::executor::QueryExecutor;
use crate::db::pool::PoolManager;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct HealthMonitor;

impl HealthMonitor {
    /// Spawn the periodic probe task.
    pub fn spawn(
        executor: Weak<QueryExecutor>,
        pool: Weak<PoolManager>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the first probe should
            // wait a full interval.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let (Some(executor), Some(pool)) = (executor.upgrade(), pool.upgrade()) else {
                    debug!("health monitor exiting: service dropped");
                    return;
                };

                match executor.probe().await {
                    Ok(()) => debug!("health probe ok"),
                    Err(probe_error) => {
                        warn!(error = %probe_error, "health probe failed, restarting pool");
                        match pool.restart_pool().await {
                            Ok(_) => info!("pool restarted after failed health probe"),
                            Err(restart_error) => {
                                error!(error = %restart_error, "pool restart failed")
                            }
                        }
                    }
                }
            }
        })
    }
}
