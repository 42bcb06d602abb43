//! SQL fragments with a separate parameter list
//!
//! SQL text and values never mix: text is appended with `push_sql`, values with
//! `push_bind`, which writes a `?` and records the value in the same step. The
//! placeholder count and the parameter count therefore move together.

use std::fmt;

use super::alias::ColumnRef;
use crate::errors::{QueryError, QueryResult};
use crate::filter::ScalarValue;

/// SQL text plus the values for its placeholders, in textual order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    sql: String,
    params: Vec<ScalarValue>,
}

impl CompiledPredicate {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[ScalarValue] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<ScalarValue>) {
        (self.sql, self.params)
    }

    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql)
    }

    /// Checks placeholder/parameter parity
    pub fn verify(&self) -> QueryResult<()> {
        verify_parity(&self.sql, self.params.len())
    }
}

impl fmt::Display for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Accumulates one SQL fragment
#[derive(Debug, Default)]
pub struct SqlBuilder {
    sql: String,
    params: Vec<ScalarValue>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends trusted SQL text (keywords, operators, validated identifiers)
    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Appends a placeholder bound to `value`
    pub fn push_bind(&mut self, value: ScalarValue) -> &mut Self {
        self.sql.push('?');
        self.params.push(value);
        self
    }

    /// Appends a comma separated placeholder list
    pub fn push_bind_list(&mut self, values: impl IntoIterator<Item = ScalarValue>) -> &mut Self {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.push_sql(", ");
            }
            self.push_bind(value);
        }
        self
    }

    pub fn push_column(&mut self, column: &ColumnRef) -> &mut Self {
        self.sql.push_str(&column.alias);
        self.sql.push('.');
        self.sql.push_str(&column.column);
        self
    }

    pub fn push_always_true(&mut self) -> &mut Self {
        self.push_sql("1 = 1")
    }

    pub fn push_always_false(&mut self) -> &mut Self {
        self.push_sql("1 = 0")
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn finish(self) -> CompiledPredicate {
        CompiledPredicate {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Counts `?` placeholders, skipping quoted literals and identifiers
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        match quote {
            // a doubled quote closes and reopens, which leaves the state unchanged
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }

    count
}

/// Fails with `ParameterCountMismatch` unless `sql` has exactly `parameters` placeholders
pub fn verify_parity(sql: &str, parameters: usize) -> QueryResult<()> {
    let placeholders = count_placeholders(sql);
    if placeholders != parameters {
        return Err(QueryError::ParameterCountMismatch {
            placeholders,
            parameters,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ValueType;

    #[test]
    fn test_push_bind_keeps_parity() {
        let column = ColumnRef::new("isoqp_title", "title", ValueType::Text);
        let mut out = SqlBuilder::new();
        out.push_column(&column)
            .push_sql(" = ")
            .push_bind(ScalarValue::from("Bonn"));
        let predicate = out.finish();

        assert_eq!(predicate.sql(), "isoqp_title.title = ?");
        assert_eq!(predicate.params(), &[ScalarValue::from("Bonn")]);
        assert!(predicate.verify().is_ok());
    }

    #[test]
    fn test_bind_list() {
        let mut out = SqlBuilder::new();
        out.push_sql("p IN (")
            .push_bind_list(vec![ScalarValue::from("a"), ScalarValue::from("b")])
            .push_sql(")");
        let predicate = out.finish();
        assert_eq!(predicate.sql(), "p IN (?, ?)");
        assert_eq!(predicate.placeholder_count(), 2);
    }

    #[test]
    fn test_count_skips_quoted_text() {
        assert_eq!(count_placeholders("a = ? AND b = '?'"), 1);
        assert_eq!(count_placeholders("a LIKE ? ESCAPE '\\'"), 1);
        assert_eq!(count_placeholders("\"odd?name\" = ?"), 1);
        assert_eq!(count_placeholders("a = 'it''s ?' OR b = ?"), 1);
    }

    #[test]
    fn test_verify_parity_mismatch() {
        let err = verify_parity("a = ? AND b = ?", 1).unwrap_err();
        assert!(matches!(
            err,
            QueryError::ParameterCountMismatch {
                placeholders: 2,
                parameters: 1
            }
        ));
    }
}
