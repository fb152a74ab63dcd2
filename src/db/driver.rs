//! Driver seam between the data-access layer and the physical SQL client.
//!
//! The pool manager and executor only ever see these object-safe traits, so
//! the layer is driver-agnostic and the resilience machinery can be exercised
//! against scripted drivers in tests. The production implementation lives in
//! [`crate::db::mssql`].

use crate::config::ConnectionConfig;
use crate::error::DbResult;
use crate::models::Row;
use crate::sql::BoundStatement;
use async_trait::async_trait;
use std::sync::Arc;

/// Rows-affected count, in the shapes drivers actually report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RowsAffected {
    /// The driver reported nothing (read statements).
    #[default]
    Unknown,
    /// A single scalar count.
    Total(u64),
    /// One count per executed statement.
    PerStatement(Vec<u64>),
}

impl RowsAffected {
    /// Collapse to a single integer, defaulting to 0 when absent.
    pub fn total(&self) -> u64 {
        match self {
            Self::Unknown => 0,
            Self::Total(count) => *count,
            Self::PerStatement(counts) => counts.iter().sum(),
        }
    }
}

/// The raw outcome of one statement execution, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverResponse {
    pub rows: Vec<Row>,
    pub rows_affected: RowsAffected,
}

/// A live set of physical connections.
///
/// Owned exclusively by the pool manager; callers outside the executor never
/// hold one.
#[async_trait]
pub trait DriverPool: Send + Sync {
    /// Execute a bound statement on one of the pool's connections.
    async fn execute(&self, statement: &BoundStatement) -> DbResult<DriverResponse>;

    /// Whether the pool still considers itself usable.
    fn is_connected(&self) -> bool;

    /// Close the pool. Teardown failures are swallowed by implementations;
    /// close is best-effort by contract.
    async fn close(&self);
}

/// Shared handle to a [`DriverPool`].
pub type PoolHandle = Arc<dyn DriverPool>;

/// Builds a [`DriverPool`] from connection configuration.
#[async_trait]
pub trait DriverConnector: Send + Sync {
    /// Open a new pool. A returned error means construction failed and the
    /// pool state machine reverts to `Uninitialized`.
    async fn open(&self, config: &ConnectionConfig) -> DbResult<PoolHandle>;
}
