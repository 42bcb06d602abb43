//! Result rows and the lazy row sequence

use std::cell::Cell;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::connection::RowSource;
use crate::compiler::coerce::parse_timestamp;
use crate::errors::{QueryError, QueryResult};
use crate::filter::ScalarValue;

/// One result row, addressed by the labels of the statement's select list
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<ScalarValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<ScalarValue>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    fn index(&self, column: &str) -> QueryResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| QueryError::row_decode(column, "not in select list"))
    }

    pub fn get(&self, column: &str) -> QueryResult<&ScalarValue> {
        let index = self.index(column)?;
        self.values
            .get(index)
            .ok_or_else(|| QueryError::row_decode(column, "missing value"))
    }

    /// Whether the database returned NULL for `column`
    pub fn is_null(&self, column: &str) -> QueryResult<bool> {
        Ok(self.get(column)?.is_null())
    }

    pub fn get_f64(&self, column: &str) -> QueryResult<Option<f64>> {
        match self.get(column)? {
            ScalarValue::Null => Ok(None),
            ScalarValue::Float(f) => Ok(Some(*f)),
            ScalarValue::Integer(i) => Ok(Some(*i as f64)),
            ScalarValue::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| QueryError::row_decode(column, format!("'{}' is not a number", s))),
            other => Err(mismatch(column, "float", other)),
        }
    }

    pub fn get_i64(&self, column: &str) -> QueryResult<Option<i64>> {
        match self.get(column)? {
            ScalarValue::Null => Ok(None),
            ScalarValue::Integer(i) => Ok(Some(*i)),
            ScalarValue::Bool(b) => Ok(Some(i64::from(*b))),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    pub fn get_bool(&self, column: &str) -> QueryResult<Option<bool>> {
        match self.get(column)? {
            ScalarValue::Null => Ok(None),
            ScalarValue::Bool(b) => Ok(Some(*b)),
            ScalarValue::Integer(i) => Ok(Some(*i != 0)),
            other => Err(mismatch(column, "boolean", other)),
        }
    }

    /// Text as stored; numbers are rendered, blobs rejected
    pub fn get_str(&self, column: &str) -> QueryResult<Option<String>> {
        match self.get(column)? {
            ScalarValue::Null => Ok(None),
            ScalarValue::Text(s) => Ok(Some(s.clone())),
            bytes @ ScalarValue::Bytes(_) => Err(mismatch(column, "text", bytes)),
            other => Ok(Some(other.to_string())),
        }
    }

    /// Native timestamps, or text in any form literals accept
    pub fn get_timestamp(&self, column: &str) -> QueryResult<Option<DateTime<Utc>>> {
        match self.get(column)? {
            ScalarValue::Null => Ok(None),
            ScalarValue::Timestamp(ts) => Ok(Some(*ts)),
            ScalarValue::Text(s) => parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| QueryError::row_decode(column, format!("'{}' is not a timestamp", s))),
            other => Err(mismatch(column, "timestamp", other)),
        }
    }

    pub fn get_bytes(&self, column: &str) -> QueryResult<Option<Vec<u8>>> {
        match self.get(column)? {
            ScalarValue::Null => Ok(None),
            ScalarValue::Bytes(b) => Ok(Some(b.clone())),
            ScalarValue::Text(s) => Ok(Some(s.as_bytes().to_vec())),
            other => Err(mismatch(column, "bytes", other)),
        }
    }
}

fn mismatch(column: &str, expected: &str, found: &ScalarValue) -> QueryError {
    QueryError::row_decode(
        column,
        format!("expected {}, found {}", expected, found.type_name()),
    )
}

/// Lazy, single-pass sequence of rows
///
/// Borrowed from an open cursor; it cannot outlive the executor call that
/// created it. An error ends the sequence.
pub struct Rows<'r> {
    source: &'r mut dyn RowSource,
    columns: Arc<[String]>,
    returned: &'r Cell<u64>,
    done: bool,
}

impl<'r> Rows<'r> {
    pub(crate) fn new(source: &'r mut dyn RowSource, columns: Arc<[String]>, returned: &'r Cell<u64>) -> Self {
        Self {
            source,
            columns,
            returned,
            done: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Stops reading; the cursor is released when the executor call returns
    pub fn close(self) {
        drop(self);
    }

    /// Drains the sequence
    pub fn collect_rows(self) -> QueryResult<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for Rows<'_> {
    type Item = QueryResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.source.next_values() {
            Ok(Some(values)) => {
                if values.len() != self.columns.len() {
                    self.done = true;
                    return Some(Err(QueryError::row_decode(
                        "*",
                        format!(
                            "row has {} values for {} columns",
                            values.len(),
                            self.columns.len()
                        ),
                    )));
                }
                self.returned.set(self.returned.get() + 1);
                Some(Ok(Row::new(Arc::clone(&self.columns), values)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for Rows<'_> {}
