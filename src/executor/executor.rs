//! Query executor
//!
//! Execution flow for every call:
//! 1. Re-verify placeholder parity
//! 2. Acquire one pooled connection
//! 3. Bind parameters in order and execute
//! 4. Hand the count or the row sequence to the caller
//! 5. Release the connection on every exit path
//!
//! Nothing is retried here.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use r2d2::{ManageConnection, Pool, PooledConnection};

use super::connection::SqlConnection;
use super::row::Rows;
use crate::assembler::{QueryMode, Statement};
use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event, Event, QueryMetrics};

/// Runs assembled statements on pooled connections
pub struct QueryExecutor<M>
where
    M: ManageConnection,
    M::Connection: SqlConnection,
{
    pool: Pool<M>,
    metrics: Arc<QueryMetrics>,
}

impl<M> QueryExecutor<M>
where
    M: ManageConnection,
    M::Connection: SqlConnection,
{
    pub fn new(pool: Pool<M>) -> Self {
        Self::with_metrics(pool, Arc::new(QueryMetrics::new()))
    }

    pub fn with_metrics(pool: Pool<M>, metrics: Arc<QueryMetrics>) -> Self {
        Self { pool, metrics }
    }

    pub fn metrics(&self) -> &Arc<QueryMetrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    /// Executes a `Count` statement
    pub fn count(&self, statement: &Statement) -> QueryResult<u64> {
        statement.verify()?;
        if statement.mode() != QueryMode::Count {
            return Err(QueryError::unsupported_operator(format!(
                "cannot count with a {} statement",
                statement.mode().as_str()
            )));
        }

        let mut conn = self.acquire(statement)?;
        let result = conn.query_count(statement.sql(), statement.params());
        drop(conn);

        self.finish(statement, result, |count| count.to_string())
    }

    /// Executes a statement and passes its rows to `visit`.
    ///
    /// The connection is held only while `visit` runs. Returning early or
    /// leaving rows undrained closes the cursor and releases the connection.
    pub fn rows<T, F>(&self, statement: &Statement, visit: F) -> QueryResult<T>
    where
        F: FnOnce(Rows<'_>) -> QueryResult<T>,
    {
        statement.verify()?;

        let columns: Arc<[String]> = statement.columns().into();
        let returned = Cell::new(0u64);

        let mut conn = self.acquire(statement)?;
        let result = conn.query_rows(statement.sql(), statement.params(), |source| {
            visit(Rows::new(source, columns, &returned))
        });
        drop(conn);

        self.metrics.add_rows_returned(returned.get());
        self.finish(statement, result, |_| returned.get().to_string())
    }

    fn acquire(&self, statement: &Statement) -> QueryResult<ScopedConnection<'_, M>> {
        match self.pool.get() {
            Ok(conn) => {
                self.metrics.increment_connections_acquired();
                log_event(
                    Event::ConnectionAcquired,
                    &[("query_id", statement.query_id().as_str())],
                );
                Ok(ScopedConnection {
                    conn,
                    metrics: &self.metrics,
                })
            }
            Err(err) => {
                let err = QueryError::execution_failed("acquiring connection", err);
                self.record_failure(statement, &err);
                Err(err)
            }
        }
    }

    fn finish<T>(
        &self,
        statement: &Statement,
        result: QueryResult<T>,
        rows: impl FnOnce(&T) -> String,
    ) -> QueryResult<T> {
        match result {
            Ok(value) => {
                self.metrics.increment_statements_executed();
                log_event(
                    Event::QueryExecuted,
                    &[
                        ("query_id", statement.query_id().as_str()),
                        ("mode", statement.mode().as_str()),
                        ("rows", &rows(&value)),
                    ],
                );
                Ok(value)
            }
            Err(err) => {
                if matches!(err, QueryError::ExecutionFailed { .. }) {
                    self.record_failure(statement, &err);
                }
                Err(err)
            }
        }
    }

    fn record_failure(&self, statement: &Statement, err: &QueryError) {
        self.metrics.increment_execution_failures();
        log_event(
            Event::ExecutionFailed,
            &[
                ("query_id", statement.query_id().as_str()),
                ("mode", statement.mode().as_str()),
                ("error", &err.report()),
            ],
        );
    }
}

/// A pooled connection that reports its release
struct ScopedConnection<'a, M: ManageConnection> {
    conn: PooledConnection<M>,
    metrics: &'a QueryMetrics,
}

impl<M: ManageConnection> Deref for ScopedConnection<'_, M> {
    type Target = M::Connection;

    fn deref(&self) -> &M::Connection {
        &self.conn
    }
}

impl<M: ManageConnection> DerefMut for ScopedConnection<'_, M> {
    fn deref_mut(&mut self) -> &mut M::Connection {
        &mut self.conn
    }
}

impl<M: ManageConnection> Drop for ScopedConnection<'_, M> {
    fn drop(&mut self) {
        self.metrics.increment_connections_released();
        log_event(Event::ConnectionReleased, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{PagingSpec, StatementAssembler};
    use crate::compiler::{QueryCompiler, QuerySpec, SqliteDialect};
    use crate::executor::{open_sqlite_pool, SqliteConnectionManager};
    use crate::filter::FilterExpression;
    use crate::mapping::{PropertyMapping, ValueType};
    use std::time::Duration;

    fn setup() -> (tempfile::TempDir, QueryExecutor<SqliteConnectionManager>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE observations (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO observations VALUES (1, 'a'), (2, 'b'), (3, 'c');",
        )
        .unwrap();
        drop(conn);

        let pool = open_sqlite_pool(SqliteConnectionManager::file(&path), 2, Duration::from_secs(5)).unwrap();
        (dir, QueryExecutor::new(pool))
    }

    fn mapping() -> PropertyMapping {
        PropertyMapping::builder("observations", "id")
            .column("name", "name", ValueType::Text)
            .build()
            .unwrap()
    }

    #[test]
    fn test_count_and_rows_release_connections() {
        let (_dir, executor) = setup();
        let mapping = mapping();
        let query = QueryCompiler::new(&mapping, &SqliteDialect)
            .compile(&QuerySpec::new().select(["name"]))
            .unwrap();

        let count = StatementAssembler::assemble(&query, QueryMode::Count, None).unwrap();
        assert_eq!(executor.count(&count).unwrap(), 3);

        let rows = StatementAssembler::assemble(&query, QueryMode::Rows, None).unwrap();
        let names: Vec<String> = executor
            .rows(&rows, |rows| {
                rows.map(|row| row.and_then(|r| r.get_str("name")).map(|n| n.unwrap_or_default()))
                    .collect()
            })
            .unwrap();
        assert_eq!(names, vec!["a", "b", "c"]);

        let snapshot = executor.metrics().snapshot();
        assert_eq!(snapshot.connections_acquired, 2);
        assert_eq!(snapshot.connections_released, 2);
        assert_eq!(snapshot.rows_returned, 3);
        assert_eq!(snapshot.statements_executed, 2);
    }

    #[test]
    fn test_undrained_rows_release_connection() {
        let (_dir, executor) = setup();
        let mapping = mapping();
        let query = QueryCompiler::new(&mapping, &SqliteDialect)
            .compile(&QuerySpec::new())
            .unwrap();
        let statement =
            StatementAssembler::assemble(&query, QueryMode::Rows, Some(&PagingSpec::first(10))).unwrap();

        let first = executor
            .rows(&statement, |mut rows| rows.next().transpose())
            .unwrap();
        assert_eq!(first.unwrap().get_i64("id").unwrap(), Some(1));
        assert_eq!(executor.metrics().connections_in_use(), 0);
    }

    #[test]
    fn test_database_error_is_execution_failed() {
        let (_dir, executor) = setup();
        let mapping = PropertyMapping::builder("missing_table", "id")
            .column("name", "name", ValueType::Text)
            .build()
            .unwrap();
        let query = QueryCompiler::new(&mapping, &SqliteDialect)
            .compile(&QuerySpec::new().filter(FilterExpression::eq("name", "a")))
            .unwrap();
        let statement = StatementAssembler::assemble(&query, QueryMode::Count, None).unwrap();

        let err = executor.count(&statement).unwrap_err();
        assert!(matches!(err, QueryError::ExecutionFailed { .. }));
        assert_eq!(executor.metrics().snapshot().execution_failures, 1);
        assert_eq!(executor.metrics().connections_in_use(), 0);
    }

    #[test]
    fn test_count_rejects_rows_statement() {
        let (_dir, executor) = setup();
        let mapping = mapping();
        let query = QueryCompiler::new(&mapping, &SqliteDialect)
            .compile(&QuerySpec::new())
            .unwrap();
        let statement = StatementAssembler::assemble(&query, QueryMode::Rows, None).unwrap();
        assert!(matches!(
            executor.count(&statement),
            Err(QueryError::UnsupportedOperator(_))
        ));
    }
}
