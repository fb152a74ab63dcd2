//! End-to-end tests for the query pipeline: dialect translation, parameter
//! binding and result normalization as observed through the public
//! `query(text, params)` contract.

mod common;

use common::{MockConnector, MockDriver, MockOutcome};
use mssql_bridge::Database;
use mssql_bridge::error::DbError;
use mssql_bridge::models::Value;
use std::sync::Arc;

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

#[tokio::test]
async fn test_dialect_translation_reaches_the_driver() {
    let driver = MockDriver::new();
    let db = database(&driver).await;

    db.query("SELECT DISTINCT a,b FROM `Tareas` LIMIT 5", &[])
        .await
        .unwrap();

    let statement = driver.last_statement().unwrap();
    assert_eq!(statement.text, "SELECT DISTINCT TOP 5 a,b FROM [Tareas]");
    assert!(statement.params.is_empty());
}

#[tokio::test]
async fn test_placeholders_are_bound_as_named_params() {
    let driver = MockDriver::new();
    let db = database(&driver).await;

    db.query(
        "UPDATE Tareas SET estado = ? WHERE id = ?",
        &[Value::Text("lista".into()), Value::Integer(7)],
    )
    .await
    .unwrap();

    let statement = driver.last_statement().unwrap();
    assert_eq!(
        statement.text,
        "UPDATE Tareas SET estado = @param0 WHERE id = @param1"
    );
    assert_eq!(statement.params[0].name, "@param0");
    assert_eq!(statement.params[0].value, Value::Text("lista".into()));
    assert_eq!(statement.params[1].name, "@param1");
    assert_eq!(statement.params[1].value, Value::Integer(7));
}

#[tokio::test]
async fn test_select_result_is_normalized() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::Rows(vec![
        common::row(&[
            ("id", Value::Integer(1)),
            ("nombre", Value::Text("Ana".into())),
        ]),
        common::row(&[
            ("id", Value::Integer(2)),
            ("nombre", Value::Text("Luis".into())),
        ]),
    ]));
    let db = database(&driver).await;

    let result = db.query("SELECT id, nombre FROM Usuarios", &[]).await.unwrap();

    assert_eq!(result.row_count(), 2);
    assert_eq!(result.insert_id, None);
    assert_eq!(result.affected_rows, 0);
    assert_eq!(result.rows[1]["nombre"], Value::Text("Luis".into()));
}

#[tokio::test]
async fn test_insert_surfaces_generated_key() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::Rows(vec![common::row(&[(
        "insertId",
        Value::Integer(42),
    )])]));
    let db = database(&driver).await;

    let result = db
        .query(
            "INSERT INTO Usuarios (nombre) VALUES (?); SELECT SCOPE_IDENTITY() AS insertId",
            &[Value::Text("Ana".into())],
        )
        .await
        .unwrap();

    assert_eq!(result.insert_id, Some(42));
    assert_eq!(result.affected_rows, 0);
}

#[tokio::test]
async fn test_update_normalizes_affected_count() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::Affected(vec![3]));
    let db = database(&driver).await;

    let result = db
        .query(
            "UPDATE Tareas SET estado = ? WHERE proyecto_id = ?",
            &[Value::Text("archivada".into()), Value::Integer(4)],
        )
        .await
        .unwrap();

    assert_eq!(result.affected_rows, 3);
    assert_eq!(result.insert_id, None);
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn test_delete_with_no_reported_count_defaults_to_zero() {
    let driver = MockDriver::new();
    driver.script(MockOutcome::Rows(Vec::new()));
    let db = database(&driver).await;

    let result = db
        .query("DELETE FROM Subtareas WHERE id = ?", &[Value::Integer(9)])
        .await
        .unwrap();

    assert_eq!(result.affected_rows, 0);
}

/// A placeholder/parameter count mismatch is rejected before any network
/// activity: no pool is built and nothing executes.
#[tokio::test]
async fn test_count_mismatch_never_touches_the_driver() {
    let driver = MockDriver::new();
    let db = database(&driver).await;

    let err = db
        .query(
            "INSERT INTO Usuarios (nombre, email) VALUES (?, ?)",
            &[Value::Text("Ana".into())],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Translation { .. }));
    assert_eq!(driver.opens(), 0);
    assert_eq!(driver.executes(), 0);
}

#[tokio::test]
async fn test_probe_issues_select_one() {
    let driver = MockDriver::new();
    let db = database(&driver).await;

    tokio_test::assert_ok!(db.probe().await);

    let statement = driver.last_statement().unwrap();
    assert_eq!(statement.text, "SELECT 1");
}
