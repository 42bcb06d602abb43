//! Query Executor
//!
//! Binds statement parameters in order, runs the statement on one pooled
//! connection, and returns either a count or a lazy row sequence. Database
//! failures surface as `ExecutionFailed` with the cause attached; the
//! connection is released before the error propagates.

mod connection;
#[allow(clippy::module_inception)]
mod executor;
mod row;
mod sqlite;

pub use connection::{RowSource, SqlConnection};
pub use executor::QueryExecutor;
pub use row::{Row, Rows};
pub use sqlite::{
    open_sqlite_pool, parse_geometry_text, prepare_connection, register_spatial_functions,
    SqliteConnectionManager,
};

/// Pool of prepared SQLite connections
pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;
