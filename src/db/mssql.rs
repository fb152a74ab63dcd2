//! SQL Server driver backend.
//!
//! Implements the driver seam over a `deadpool` managed pool of `tiberius`
//! TDS clients. Acquisition and release of individual connections is
//! delegated to deadpool; this module only realizes bound statements against
//! a checked-out client and converts the driver's rows and affected-row
//! counts into the layer's raw response shape.

use crate::config::ConnectionConfig;
use crate::db::driver::{DriverConnector, DriverPool, DriverResponse, PoolHandle, RowsAffected};
use crate::error::{DbError, DbResult};
use crate::models::{Row, StatementKind, Value};
use crate::sql::BoundStatement;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tiberius::{AuthMethod, Client, ColumnData, EncryptionLevel, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

type TdsClient = Client<Compat<TcpStream>>;

/// deadpool manager that opens TDS clients.
struct TdsManager {
    tds: tiberius::Config,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl managed::Manager for TdsManager {
    type Type = TdsClient;
    type Error = DbError;

    async fn create(&self) -> Result<TdsClient, DbError> {
        let addr = self.tds.get_addr();
        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| DbError::timeout("tcp connect", self.connect_timeout))?
            .map_err(|e| DbError::connection(format!("tcp connect to {addr} failed: {e}")))?;
        tcp.set_nodelay(true)
            .map_err(|e| DbError::connection(format!("set_nodelay failed: {e}")))?;

        let client = Client::connect(self.tds.clone(), tcp.compat_write()).await?;
        debug!(server = %addr, "opened TDS connection");
        Ok(client)
    }

    async fn recycle(&self, _client: &mut TdsClient, metrics: &Metrics) -> RecycleResult<DbError> {
        // Stale connections are discarded rather than revalidated; anything
        // broken beyond that surfaces on execution and is classified there.
        if metrics.last_used() > self.idle_timeout {
            return Err(RecycleError::Message("connection idle past limit".into()));
        }
        Ok(())
    }
}

/// Pool handle over tiberius clients.
pub struct MssqlPool {
    pool: managed::Pool<TdsManager>,
}

#[async_trait]
impl DriverPool for MssqlPool {
    async fn execute(&self, statement: &BoundStatement) -> DbResult<DriverResponse> {
        let mut client = self.pool.get().await.map_err(pool_error)?;
        let sql = positional_text(&statement.text, statement.params.len());
        let params: Vec<&dyn ToSql> = statement
            .params
            .iter()
            .map(|param| &param.value as &dyn ToSql)
            .collect();

        // Writes report affected counts through execute(); everything else
        // goes through query() so recordsets (including the generated-key row
        // an INSERT selects) come back.
        match StatementKind::of(&statement.text) {
            StatementKind::Update | StatementKind::Delete => {
                let result = client
                    .execute(sql, &params)
                    .await
                    .map_err(DbError::from)?;
                Ok(DriverResponse {
                    rows: Vec::new(),
                    rows_affected: RowsAffected::PerStatement(result.rows_affected().to_vec()),
                })
            }
            _ => {
                let stream = client.query(sql, &params).await.map_err(DbError::from)?;
                let results = stream.into_results().await.map_err(DbError::from)?;
                Ok(DriverResponse {
                    rows: convert_rows(results),
                    rows_affected: RowsAffected::Unknown,
                })
            }
        }
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// Builds [`MssqlPool`] handles from connection configuration.
#[derive(Debug, Default)]
pub struct MssqlConnector;

#[async_trait]
impl DriverConnector for MssqlConnector {
    async fn open(&self, config: &ConnectionConfig) -> DbResult<PoolHandle> {
        let manager = TdsManager {
            tds: tds_config(config),
            connect_timeout: config.pool.connect_timeout(),
            idle_timeout: config.pool.idle_timeout(),
        };

        let pool = managed::Pool::builder(manager)
            .max_size(config.pool.max_connections as usize)
            .wait_timeout(Some(config.pool.acquire_timeout()))
            .create_timeout(Some(config.pool.create_timeout()))
            .recycle_timeout(Some(config.pool.destroy_timeout()))
            .runtime(deadpool::Runtime::Tokio1)
            .build()
            .map_err(|e| DbError::configuration(format!("pool construction failed: {e}")))?;

        // deadpool opens lazily; check out min_connections (at least one) up
        // front so an unreachable server fails construction here instead of
        // on the first query.
        let warm = config.pool.min_connections.max(1) as usize;
        let mut seeds = Vec::with_capacity(warm);
        for _ in 0..warm {
            seeds.push(pool.get().await.map_err(pool_error)?);
        }
        drop(seeds);

        info!(server = %config.summary(), "connection pool established");
        Ok(Arc::new(MssqlPool { pool }))
    }
}

fn tds_config(config: &ConnectionConfig) -> tiberius::Config {
    let mut tds = tiberius::Config::new();
    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
    tds.application_name("mssql-bridge");
    if config.encrypt {
        tds.encryption(EncryptionLevel::Required);
    } else {
        tds.encryption(EncryptionLevel::NotSupported);
    }
    if config.trust_server_certificate {
        tds.trust_cert();
    }
    tds
}

fn pool_error(error: managed::PoolError<DbError>) -> DbError {
    match error {
        managed::PoolError::Backend(e) => e,
        managed::PoolError::Timeout(_) => {
            DbError::connection("timed out waiting for a pooled connection")
        }
        other => DbError::connection(format!("connection pool failure: {other}")),
    }
}

/// Rewrite the layer's named placeholders to the driver's positional markers.
/// Names are generated in occurrence order, so `@paramN` maps to `@P(N+1)`
/// one-to-one. Replacement runs highest index first so `@param10` is not
/// clobbered by the `@param1` pass.
fn positional_text(text: &str, param_count: usize) -> String {
    let mut sql = text.to_string();
    for index in (0..param_count).rev() {
        sql = sql.replace(&format!("@param{index}"), &format!("@P{}", index + 1));
    }
    sql
}

impl ToSql for Value {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Value::Null => ColumnData::String(None),
            Value::Bool(b) => ColumnData::Bit(Some(*b)),
            Value::Integer(i) => ColumnData::I64(Some(*i)),
            Value::Float(f) => ColumnData::F64(Some(*f)),
            Value::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Timestamp(ts) => ts.to_sql(),
        }
    }
}

/// Flatten the driver's result sets into the layer's row shape. The layer's
/// contract is one recordset per call; SQL Server can return several, and
/// everything past the first is dropped.
fn convert_rows(results: Vec<Vec<tiberius::Row>>) -> Vec<Row> {
    let extra: usize = results.iter().skip(1).map(Vec::len).sum();
    if extra > 0 {
        warn!(dropped_rows = extra, "statement returned multiple recordsets");
    }
    results
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(convert_row)
        .collect()
}

fn convert_row(row: tiberius::Row) -> Row {
    let columns: Vec<String> = row
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    columns
        .into_iter()
        .zip(row.into_iter().map(convert_column))
        .collect()
}

fn convert_column(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::Bit(v) => v.map_or(Value::Null, Value::Bool),
        ColumnData::U8(v) => v.map_or(Value::Null, |n| Value::Integer(i64::from(n))),
        ColumnData::I16(v) => v.map_or(Value::Null, |n| Value::Integer(i64::from(n))),
        ColumnData::I32(v) => v.map_or(Value::Null, |n| Value::Integer(i64::from(n))),
        ColumnData::I64(v) => v.map_or(Value::Null, Value::Integer),
        ColumnData::F32(v) => v.map_or(Value::Null, |n| Value::Float(f64::from(n))),
        ColumnData::F64(v) => v.map_or(Value::Null, Value::Float),
        ColumnData::String(v) => v.map_or(Value::Null, |s| Value::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(Value::Null, |g| Value::Text(g.to_string())),
        ColumnData::Numeric(v) => v.map_or(Value::Null, |n| {
            if n.dec_part() == 0 {
                Value::Integer(n.int_part() as i64)
            } else {
                Value::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
            }
        }),
        data @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => match NaiveDateTime::from_sql(&data) {
            Ok(Some(naive)) => Value::Timestamp(naive.and_utc()),
            _ => Value::Null,
        },
        data @ ColumnData::DateTimeOffset(_) => match DateTime::<Utc>::from_sql(&data) {
            Ok(Some(ts)) => Value::Timestamp(ts),
            _ => Value::Null,
        },
        ColumnData::Binary(v) => v.map_or(Value::Null, |bytes| {
            Value::Text(bytes.iter().map(|b| format!("{b:02X}")).collect())
        }),
        other => {
            debug!(column_type = ?other, "unmapped column type surfaced as NULL");
            Value::Null
        }
    }
}
