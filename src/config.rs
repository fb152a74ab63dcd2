//! Configuration handling for the data-access layer.
//!
//! Connection parameters come from environment variables (or CLI flags when a
//! binary embeds this crate), each with a documented default. The resulting
//! [`ConnectionConfig`] is immutable after the pool is created; changing any
//! value requires constructing a new [`crate::Database`].

use crate::error::{DbError, DbResult};
use crate::models::RetryPolicy;
use clap::Parser;
use std::time::Duration;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 0;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CREATE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DESTROY_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

// Execution defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 300;

/// Connection pool sizing and lifecycle timeouts.
///
/// All values are fixed at construction time; none are runtime-mutable.
#[derive(Debug, Clone, clap::Args)]
pub struct PoolSettings {
    /// Maximum number of physical connections in the pool.
    #[arg(long, env = "DB_POOL_MAX", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Connections opened eagerly when the pool is built.
    #[arg(long, env = "DB_POOL_MIN", default_value_t = DEFAULT_MIN_CONNECTIONS)]
    pub min_connections: u32,

    /// Idle connections older than this are discarded on checkout.
    #[arg(long, env = "DB_IDLE_TIMEOUT_SECS", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,

    /// Bound on waiting for a pooled connection, and on waiting for an
    /// in-flight pool construction started by another caller.
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS)]
    pub acquire_timeout_secs: u64,

    /// Bound on creating a single physical connection.
    #[arg(long, env = "DB_CREATE_TIMEOUT_SECS", default_value_t = DEFAULT_CREATE_TIMEOUT_SECS)]
    pub create_timeout_secs: u64,

    /// Bound on tearing the pool down during shutdown.
    #[arg(long, env = "DB_DESTROY_TIMEOUT_SECS", default_value_t = DEFAULT_DESTROY_TIMEOUT_SECS)]
    pub destroy_timeout_secs: u64,

    /// Bound on the TCP connect to the server.
    #[arg(long, env = "DB_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
}

impl PoolSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            create_timeout_secs: DEFAULT_CREATE_TIMEOUT_SECS,
            destroy_timeout_secs: DEFAULT_DESTROY_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Connection parameters for the SQL Server pool.
#[derive(Debug, Clone, Parser)]
#[command(name = "mssql-bridge")]
pub struct ConnectionConfig {
    /// Database server hostname.
    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    /// Database server port.
    #[arg(long = "db-port", env = "DB_PORT", default_value_t = 1433)]
    pub port: u16,

    /// Database name.
    #[arg(long = "db-name", env = "DB_NAME", default_value = "taskflow")]
    pub database: String,

    /// SQL login user.
    #[arg(long = "db-user", env = "DB_USER", default_value = "sa")]
    pub user: String,

    /// SQL login password (sensitive - never logged).
    #[arg(
        long = "db-password",
        env = "DB_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    pub password: String,

    /// Encrypt the TDS stream.
    #[arg(long, env = "DB_ENCRYPT")]
    pub encrypt: bool,

    /// Accept the server certificate without validation.
    #[arg(long, env = "DB_TRUST_SERVER_CERTIFICATE")]
    pub trust_server_certificate: bool,

    /// Deployment environment name. The background health monitor only runs
    /// outside production-like environments.
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    /// Bound on a single statement execution.
    #[arg(long, env = "DB_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Retries allowed after a connection-class failure.
    #[arg(long, env = "DB_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Base delay between retries; attempt n waits base * (n + 1).
    #[arg(long, env = "DB_RETRY_BASE_DELAY_MS", default_value_t = DEFAULT_RETRY_BASE_DELAY_MS)]
    pub retry_base_delay_ms: u64,

    /// Interval between background health probes.
    #[arg(long, env = "DB_HEALTH_INTERVAL_SECS", default_value_t = DEFAULT_HEALTH_INTERVAL_SECS)]
    pub health_interval_secs: u64,

    #[command(flatten)]
    pub pool: PoolSettings,
}

impl ConnectionConfig {
    /// Build the configuration from environment variables alone, applying the
    /// documented default for anything unset.
    pub fn from_env() -> Self {
        Self::parse_from(["mssql-bridge"])
    }

    /// Validate the configuration before it is used to build a pool.
    pub fn validate(&self) -> DbResult<()> {
        if self.host.trim().is_empty() {
            return Err(DbError::configuration("DB_HOST must not be empty"));
        }
        if self.port == 0 {
            return Err(DbError::configuration("DB_PORT must not be 0"));
        }
        if self.database.trim().is_empty() {
            return Err(DbError::configuration("DB_NAME must not be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(DbError::configuration("DB_USER must not be empty"));
        }
        if self.pool.max_connections == 0 {
            return Err(DbError::configuration(
                "DB_POOL_MAX must be greater than 0",
            ));
        }
        if self.pool.min_connections > self.pool.max_connections {
            return Err(DbError::configuration(format!(
                "DB_POOL_MIN ({}) cannot exceed DB_POOL_MAX ({})",
                self.pool.min_connections, self.pool.max_connections
            )));
        }
        Ok(())
    }

    /// Redacted connection summary for logging (no credentials).
    pub fn summary(&self) -> String {
        format!(
            "mssql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    /// Whether this configuration is production-like.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
            || self.environment.eq_ignore_ascii_case("prod")
    }

    /// The health monitor runs only in non-production-like environments.
    pub fn health_monitor_enabled(&self) -> bool {
        !self.is_production() && self.health_interval_secs > 0
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1433,
            database: "taskflow".to_string(),
            user: "sa".to_string(),
            password: String::new(),
            encrypt: false,
            trust_server_certificate: false,
            environment: "development".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            health_interval_secs: DEFAULT_HEALTH_INTERVAL_SECS,
            pool: PoolSettings::default(),
        }
    }
}
