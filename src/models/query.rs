//! Query-related data models.
//!
//! This module defines the normalized result shape every statement kind
//! returns, plus the per-call retry policy.

use crate::models::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A result row: column name to value. Column ordering is not significant.
pub type Row = BTreeMap<String, Value>;

/// The normalized result of a statement, regardless of its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Generated key for INSERT statements that return one.
    pub insert_id: Option<i64>,
    /// Rows touched by UPDATE/DELETE statements; 0 for everything else.
    pub affected_rows: u64,
}

impl QueryResult {
    /// Create a result for read statements.
    pub fn read(rows: Vec<Row>) -> Self {
        Self {
            rows,
            insert_id: None,
            affected_rows: 0,
        }
    }

    /// Create a result for write statements (UPDATE/DELETE).
    pub fn write(affected_rows: u64) -> Self {
        Self {
            rows: Vec::new(),
            insert_id: None,
            affected_rows,
        }
    }

    /// Create a result for INSERT statements.
    pub fn insert(rows: Vec<Row>, insert_id: Option<i64>) -> Self {
        Self {
            rows,
            insert_id,
            affected_rows: 0,
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Statement kind, decided by the leading keyword of the original
/// (untranslated) text. Drives result normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Classify a statement by its leading keyword.
    pub fn of(sql: &str) -> Self {
        let keyword = sql
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        match keyword.as_str() {
            "insert" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// Retry behavior for one logical `query()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Attempt n (zero-based) waits `base_delay * (n + 1)` before retrying.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Linear backoff delay before the retry following failed attempt
    /// `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(crate::config::DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}
