//! Compiled queries and executable statements

use std::fmt;

use super::types::{QueryMode, SortDirection};
use crate::compiler::{verify_parity, CompiledPredicate, JoinClause};
use crate::errors::QueryResult;
use crate::filter::ScalarValue;
use crate::observability::QueryId;

/// A selected column: qualified expression plus the label it is read back by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionColumn {
    pub label: String,
    pub expr: String,
}

impl ProjectionColumn {
    pub fn new(label: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            expr: expr.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: ProjectionColumn,
    pub direction: SortDirection,
}

/// Everything derived from one request, shared by its count and rows
/// statements so both see the same joins and predicate.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub(crate) query_id: QueryId,
    pub(crate) root_table: String,
    pub(crate) root_alias: String,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) predicate: Option<CompiledPredicate>,
    pub(crate) projection: Vec<ProjectionColumn>,
    pub(crate) order_by: Vec<OrderTerm>,
    pub(crate) id: ProjectionColumn,
}

impl CompiledQuery {
    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn root_table(&self) -> &str {
        &self.root_table
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// `None` when the request had no filter
    pub fn predicate(&self) -> Option<&CompiledPredicate> {
        self.predicate.as_ref()
    }

    pub fn projection(&self) -> &[ProjectionColumn] {
        &self.projection
    }

    pub fn order_by(&self) -> &[OrderTerm] {
        &self.order_by
    }

    /// The root identifier column, always the last sort key
    pub fn id_column(&self) -> &ProjectionColumn {
        &self.id
    }
}

/// Final SQL text with its ordered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    query_id: QueryId,
    mode: QueryMode,
    sql: String,
    params: Vec<ScalarValue>,
    columns: Vec<String>,
}

impl Statement {
    pub(crate) fn new(
        query_id: QueryId,
        mode: QueryMode,
        sql: String,
        params: Vec<ScalarValue>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            query_id,
            mode,
            sql,
            params,
            columns,
        }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[ScalarValue] {
        &self.params
    }

    /// Labels of the selected columns, in select-list order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn verify(&self) -> QueryResult<()> {
        verify_parity(&self.sql, self.params.len())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}
