//! Result-shape normalization.
//!
//! Every statement kind returns the same [`QueryResult`] shape regardless of
//! which driver fields were populated: reads keep their rows, inserts surface
//! the generated key when one came back, updates and deletes surface the
//! affected-row count collapsed to a single integer.

use crate::db::driver::DriverResponse;
use crate::models::{QueryResult, Row, StatementKind, Value};

/// Convert a raw driver response into the normalized result shape.
pub fn normalize(kind: StatementKind, response: DriverResponse) -> QueryResult {
    match kind {
        StatementKind::Insert => {
            let insert_id = extract_insert_id(&response.rows);
            QueryResult::insert(response.rows, insert_id)
        }
        StatementKind::Update | StatementKind::Delete => {
            QueryResult::write(response.rows_affected.total())
        }
        StatementKind::Other => QueryResult::read(response.rows),
    }
}

/// Pull the generated key out of an INSERT's returned recordset.
///
/// Accepts an `insertId`/`id` column (case-insensitive) in the first row, or
/// a first row that is a single integer column (the `SELECT SCOPE_IDENTITY()`
/// shape). `SCOPE_IDENTITY()` comes back as numeric, which the driver layer
/// may surface as a float.
fn extract_insert_id(rows: &[Row]) -> Option<i64> {
    let first = rows.first()?;

    for (column, value) in first {
        if column.eq_ignore_ascii_case("insertid") || column.eq_ignore_ascii_case("id") {
            return as_integer(value);
        }
    }

    if first.len() == 1 {
        return first.values().next().and_then(as_integer);
    }

    None
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(id) => Some(*id),
        Value::Float(id) => Some(*id as i64),
        _ => None,
    }
}
