//! SQLite backend
//!
//! - [`SqlConnection`] for `rusqlite::Connection`
//! - [`open_sqlite_pool`], an r2d2 pool whose connections are prepared on
//!   open (case-sensitive LIKE, spatial functions)
//! - the `bbox_intersects` / `bbox_dwithin` scalar functions
//!
//! Geometries are stored as text: `"minx miny maxx maxy"` for boxes,
//! `"x y"` for points.

use std::time::Duration;

use r2d2::Pool;
pub use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};

use super::connection::{RowSource, SqlConnection};
use crate::compiler::{SQLITE_BBOX_FUNCTION, SQLITE_DWITHIN_FUNCTION};
use crate::errors::{QueryError, QueryResult};
use crate::filter::{Envelope, Point, ScalarValue};

impl ToSql for ScalarValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ScalarValue::Null => ToSqlOutput::Owned(Value::Null),
            ScalarValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            ScalarValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            ScalarValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            ScalarValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            ScalarValue::Timestamp(ts) => {
                ToSqlOutput::Owned(Value::Text(ScalarValue::timestamp_text(ts)))
            }
            ScalarValue::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Integer(i) => ScalarValue::Integer(i),
        ValueRef::Real(f) => ScalarValue::Float(f),
        ValueRef::Text(t) => ScalarValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => ScalarValue::Bytes(b.to_vec()),
    }
}

struct SqliteRowSource<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    column_count: usize,
}

impl RowSource for SqliteRowSource<'_> {
    fn next_values(&mut self) -> QueryResult<Option<Vec<ScalarValue>>> {
        let row = match self.rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(err) => return Err(QueryError::execution_failed("fetching row", err)),
        };

        let mut values = Vec::with_capacity(self.column_count);
        for index in 0..self.column_count {
            let value = row
                .get_ref(index)
                .map_err(|err| QueryError::execution_failed("reading column", err))?;
            values.push(from_value_ref(value));
        }
        Ok(Some(values))
    }
}

impl SqlConnection for Connection {
    fn query_count(&mut self, sql: &str, params: &[ScalarValue]) -> QueryResult<u64> {
        let mut stmt = self
            .prepare(sql)
            .map_err(|err| QueryError::execution_failed("preparing count statement", err))?;
        let count: i64 = stmt
            .query_row(params_from_iter(params.iter()), |row| row.get(0))
            .map_err(|err| QueryError::execution_failed("running count statement", err))?;
        u64::try_from(count).map_err(|_| QueryError::row_decode("count", format!("negative count {}", count)))
    }

    fn query_rows<T, F>(&mut self, sql: &str, params: &[ScalarValue], visit: F) -> QueryResult<T>
    where
        F: FnOnce(&mut dyn RowSource) -> QueryResult<T>,
    {
        let mut stmt = self
            .prepare(sql)
            .map_err(|err| QueryError::execution_failed("preparing rows statement", err))?;
        let column_count = stmt.column_count();
        let rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|err| QueryError::execution_failed("running rows statement", err))?;

        let mut source = SqliteRowSource { rows, column_count };
        visit(&mut source)
    }
}

/// Enables case-sensitive LIKE and registers the spatial functions.
/// Runs on every connection a pool opens.
pub fn prepare_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    // LIKE must honour match_case; folding is done explicitly with LOWER()
    conn.execute_batch("PRAGMA case_sensitive_like = ON")?;
    register_spatial_functions(conn)
}

/// Builds a pool over `manager`, preparing each connection it opens.
/// Replaces any init hook already set on `manager`.
pub fn open_sqlite_pool(
    manager: SqliteConnectionManager,
    max_size: u32,
    connection_timeout: Duration,
) -> QueryResult<Pool<SqliteConnectionManager>> {
    Pool::builder()
        .max_size(max_size)
        .connection_timeout(connection_timeout)
        .build(manager.with_init(prepare_connection))
        .map_err(|err| QueryError::execution_failed("opening connection pool", err))
}

/// Registers `bbox_intersects(geom, minx, miny, maxx, maxy)` and
/// `bbox_dwithin(geom, x, y, distance)`. A NULL or unparsable geometry never
/// matches.
pub fn register_spatial_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(SQLITE_BBOX_FUNCTION, 5, flags, |ctx| {
        let geometry: Option<String> = ctx.get(0)?;
        let Some(geometry) = geometry.as_deref().and_then(parse_geometry_text) else {
            return Ok(false);
        };
        let query = Envelope::new(ctx.get(1)?, ctx.get(2)?, ctx.get(3)?, ctx.get(4)?, geometry.srid);
        Ok(geometry.intersects(&query))
    })?;

    conn.create_scalar_function(SQLITE_DWITHIN_FUNCTION, 4, flags, |ctx| {
        let geometry: Option<String> = ctx.get(0)?;
        let Some(geometry) = geometry.as_deref().and_then(parse_geometry_text) else {
            return Ok(false);
        };
        let center = Point::new(ctx.get(1)?, ctx.get(2)?, geometry.srid);
        let distance: f64 = ctx.get(3)?;
        Ok(geometry.distance_to(&center) <= distance)
    })?;

    Ok(())
}

/// `"minx miny maxx maxy"` or `"x y"`, whitespace or comma separated
pub fn parse_geometry_text(text: &str) -> Option<Envelope> {
    let numbers = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    match numbers.as_slice() {
        [x, y] => Some(Envelope::from_point(&Point::new(*x, *y, 0))),
        [min_x, min_y, max_x, max_y] => Some(Envelope::new(*min_x, *min_y, *max_x, *max_y, 0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register_spatial_functions(&conn).unwrap();
        conn
    }

    #[test]
    fn test_parse_geometry_text() {
        assert_eq!(
            parse_geometry_text("1 2 3 4"),
            Some(Envelope::new(1.0, 2.0, 3.0, 4.0, 0))
        );
        assert_eq!(
            parse_geometry_text("7.1, 50.7"),
            Some(Envelope::new(7.1, 50.7, 7.1, 50.7, 0))
        );
        assert_eq!(parse_geometry_text("1 2 3"), None);
        assert_eq!(parse_geometry_text("a b"), None);
    }

    #[test]
    fn test_bbox_function() {
        let mut conn = memory();
        let hit = conn
            .query_count(
                "SELECT bbox_intersects('0 0 2 2', ?, ?, ?, ?)",
                &[
                    ScalarValue::Float(1.0),
                    ScalarValue::Float(1.0),
                    ScalarValue::Float(3.0),
                    ScalarValue::Float(3.0),
                ],
            )
            .unwrap();
        assert_eq!(hit, 1);

        let miss = conn
            .query_count(
                "SELECT bbox_intersects(NULL, 0, 0, 1, 1)",
                &[],
            )
            .unwrap();
        assert_eq!(miss, 0);
    }

    #[test]
    fn test_dwithin_function() {
        let mut conn = memory();
        let near = conn
            .query_count("SELECT bbox_dwithin('3 4', 0, 0, 5)", &[])
            .unwrap();
        let far = conn
            .query_count("SELECT bbox_dwithin('3 4', 0, 0, 4.9)", &[])
            .unwrap();
        assert_eq!((near, far), (1, 0));
    }

    #[test]
    fn test_rows_decode_scalar_types() {
        let mut conn = memory();
        conn.execute_batch(
            "CREATE TABLE t (i INTEGER, r REAL, s TEXT, n TEXT);
             INSERT INTO t VALUES (1, 2.5, 'x', NULL);",
        )
        .unwrap();

        let values = conn
            .query_rows("SELECT i, r, s, n FROM t WHERE s = ?", &[ScalarValue::from("x")], |source| {
                source.next_values()
            })
            .unwrap()
            .unwrap();
        assert_eq!(
            values,
            vec![
                ScalarValue::Integer(1),
                ScalarValue::Float(2.5),
                ScalarValue::from("x"),
                ScalarValue::Null
            ]
        );
    }

    #[test]
    fn test_timestamp_binds_as_canonical_text() {
        use chrono::{TimeZone, Utc};

        let mut conn = memory();
        let ts = Utc.with_ymd_and_hms(2009, 3, 1, 12, 0, 0).unwrap();
        let n = conn
            .query_count(
                "SELECT ? = '2009-03-01T12:00:00.000Z'",
                &[ScalarValue::Timestamp(ts)],
            )
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_pooled_connections_are_prepared() {
        let pool = open_sqlite_pool(SqliteConnectionManager::memory(), 1, Duration::from_secs(5)).unwrap();
        let mut conn = pool.get().unwrap();

        let folded = conn.query_count("SELECT 'a' LIKE 'A'", &[]).unwrap();
        let near = conn
            .query_count("SELECT bbox_dwithin('3 4', 0, 0, 5)", &[])
            .unwrap();
        assert_eq!((folded, near), (0, 1));
    }

    #[test]
    fn test_bad_sql_is_execution_failure() {
        let mut conn = memory();
        let err = conn.query_count("SELECT FROM", &[]).unwrap_err();
        assert!(matches!(err, QueryError::ExecutionFailed { .. }));
    }
}
