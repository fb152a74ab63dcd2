//! Database abstraction layer.
//!
//! This module provides the resilient access machinery:
//! - Pool lifecycle management with single-flight construction
//! - Query execution with bounded retries and request timeouts
//! - Result-shape normalization
//! - The driver seam and its SQL Server implementation
//! - Background health monitoring

pub mod driver;
pub mod executor;
pub mod health;
pub mod mssql;
pub mod normalize;
pub mod pool;

pub use driver::{DriverConnector, DriverPool, DriverResponse, PoolHandle, RowsAffected};
pub use executor::QueryExecutor;
pub use health::HealthMonitor;
pub use mssql::MssqlConnector;
pub use normalize::normalize;
pub use pool::{PoolManager, PoolState};
