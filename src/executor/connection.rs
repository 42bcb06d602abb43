//! Database connection seam
//!
//! The executor only needs two things from a connection: a scalar count and
//! a forward-only cursor. Backends implement [`SqlConnection`] for their
//! native connection type.

use crate::errors::QueryResult;
use crate::filter::ScalarValue;

/// Forward-only cursor over a result set
pub trait RowSource {
    /// Values of the next row in select-list order, or `None` when exhausted
    fn next_values(&mut self) -> QueryResult<Option<Vec<ScalarValue>>>;
}

/// A connection able to run parameterized statements
pub trait SqlConnection {
    /// Runs a statement returning one integer in one row
    fn query_count(&mut self, sql: &str, params: &[ScalarValue]) -> QueryResult<u64>;

    /// Runs a statement and hands its cursor to `visit`. The cursor is closed
    /// when `visit` returns.
    fn query_rows<T, F>(&mut self, sql: &str, params: &[ScalarValue], visit: F) -> QueryResult<T>
    where
        F: FnOnce(&mut dyn RowSource) -> QueryResult<T>;
}
