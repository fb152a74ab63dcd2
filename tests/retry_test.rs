//! Integration tests for retry and backoff behavior.
//!
//! Connection-class failures retry with linear backoff up to the policy
//! limit; everything else propagates on first occurrence. After exhaustion
//! the caller receives the final attempt's error, annotated with the attempt
//! count.

mod common;

use common::{MockConnector, MockDriver, MockOutcome};
use mssql_bridge::Database;
use mssql_bridge::error::DbError;
use mssql_bridge::models::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

async fn database(driver: &Arc<MockDriver>) -> Database {
    Database::connect_with(
        common::test_config(),
        Arc::new(MockConnector {
            driver: Arc::clone(driver),
        }),
    )
    .await
    .unwrap()
}

/// A first-attempt connection failure followed by a success is invisible to
/// the caller, and waits exactly one backoff of `base_delay * 1`.
#[tokio::test(start_paused = true)]
async fn test_single_retry_succeeds_with_one_backoff() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::ConnectionError("connection closed"));
    driver.script(MockOutcome::Rows(vec![common::row(&[(
        "nombre",
        Value::Text("Ana".into()),
    )])]));
    let db = database(&driver).await;

    let start = Instant::now();
    let result = db.query("SELECT nombre FROM Usuarios", &[]).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(1000));
    assert_eq!(result.row_count(), 1);
    assert_eq!(driver.executes(), 2);
}

/// Exhausting all attempts surfaces the final attempt's error with its
/// original message, not a generic wrapper, and the backoffs are linear.
#[tokio::test(start_paused = true)]
async fn test_exhaustion_surfaces_final_error_with_attempt_count() {
    let driver = MockDriver::new();
    for _ in 0..4 {
        driver.script(MockOutcome::ConnectionError("socket hang up"));
    }
    let db = database(&driver).await;

    let start = Instant::now();
    let err = db.query("SELECT 1", &[]).await.unwrap_err();

    // Backoffs of 1s, 2s and 3s between the four attempts.
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    assert!(matches!(err, DbError::Connection { attempts: 4, .. }));
    assert!(err.to_string().contains("socket hang up"));
    assert_eq!(driver.executes(), 4);
}

/// A statement the server rejected is not retried.
#[tokio::test(start_paused = true)]
async fn test_execution_errors_propagate_immediately() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::ExecutionError("Incorrect syntax near 'FORM'"));
    let db = database(&driver).await;

    let start = Instant::now();
    let err = db.query("SELEC 1", &[]).await.unwrap_err();

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(matches!(err, DbError::QueryExecution { code: Some(102), .. }));
    assert_eq!(driver.executes(), 1);
}

/// A request that exceeds the execution timeout counts as a retryable
/// failure, identically to a connection error.
#[tokio::test(start_paused = true)]
async fn test_request_timeout_is_retried() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::Hang);
    driver.script(MockOutcome::Rows(Vec::new()));
    let db = database(&driver).await;

    let start = Instant::now();
    let result = db.query("SELECT 1", &[]).await.unwrap();

    // 30s request timeout plus one 1s backoff.
    assert_eq!(start.elapsed(), Duration::from_secs(31));
    assert_eq!(result.row_count(), 0);
    assert_eq!(driver.executes(), 2);
}

/// Timeout exhaustion surfaces a timeout error annotated with the attempt
/// count.
#[tokio::test(start_paused = true)]
async fn test_timeout_exhaustion_is_annotated() {
    let driver = MockDriver::new();
    for _ in 0..4 {
        driver.script(MockOutcome::Hang);
    }
    let db = database(&driver).await;

    let err = db.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Timeout { attempts: 4, .. }));
}

/// Each connection-class failure marks the pool Degraded, and the retry path
/// rebuilds it before the next attempt.
#[tokio::test(start_paused = true)]
async fn test_retry_rebuilds_a_degraded_pool() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::ConnectionError("connection reset"));
    driver.script(MockOutcome::Rows(Vec::new()));
    let db = database(&driver).await;

    db.query("SELECT 1", &[]).await.unwrap();

    // One build for the first attempt, one rebuild after degradation.
    assert_eq!(driver.opens(), 2);
    assert!(db.is_healthy().await);
}
