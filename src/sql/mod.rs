//! Pure text transformation pipeline.
//!
//! Everything here is side-effect free and runs before any network activity:
//! - Dialect translation (MySQL-flavored text to T-SQL)
//! - Positional-to-named parameter binding

pub mod binder;
pub mod translator;

pub use binder::{BoundParam, BoundStatement, bind};
pub use translator::translate;
