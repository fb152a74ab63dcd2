//! Positional-to-named parameter binding.
//!
//! Translated text arrives with `?` placeholders; each is replaced
//! left-to-right by `@param0`, `@param1`, ... in occurrence order, paired with
//! the caller's values. A placeholder/parameter count mismatch is a caller
//! contract violation and is rejected before any network activity.
//!
//! A `?` inside a string literal counts as a placeholder; callers pass
//! literals as parameters instead of embedding them in the text.

use crate::error::{DbError, DbResult};
use crate::models::Value;

/// One named, typed bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    /// Placeholder name as it appears in the text, e.g. `@param0`.
    pub name: String,
    pub value: Value,
}

/// A statement ready for execution: named-placeholder text plus its
/// parameters in occurrence order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub text: String,
    pub params: Vec<BoundParam>,
}

/// Bind an ordered value list against `?` placeholders in the text.
pub fn bind(sql: &str, params: &[Value]) -> DbResult<BoundStatement> {
    let placeholders = sql.matches('?').count();
    if placeholders != params.len() {
        return Err(DbError::translation(format!(
            "statement has {placeholders} placeholder(s) but {} parameter(s) were supplied",
            params.len()
        )));
    }

    let mut text = String::with_capacity(sql.len() + params.len() * 8);
    let mut index = 0usize;
    for ch in sql.chars() {
        if ch == '?' {
            text.push_str("@param");
            text.push_str(&index.to_string());
            index += 1;
        } else {
            text.push(ch);
        }
    }

    let params = params
        .iter()
        .enumerate()
        .map(|(i, value)| BoundParam {
            name: format!("@param{i}"),
            value: value.clone(),
        })
        .collect();

    Ok(BoundStatement { text, params })
}
