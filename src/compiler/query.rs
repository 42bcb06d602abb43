//! Whole-query compilation
//!
//! A [`QuerySpec`] names a filter, the properties to return and the sort
//! keys. [`QueryCompiler::compile`] resolves all of them against one alias
//! state and produces the [`CompiledQuery`] both statement modes are built from.

use super::compiler::PredicateCompiler;
use super::dialect::SqlDialect;
use super::procedures::ProcedureCatalog;
use crate::assembler::{CompiledQuery, OrderTerm, ProjectionColumn, SortSpec};
use crate::errors::QueryResult;
use crate::filter::FilterExpression;
use crate::mapping::PropertyMapping;
use crate::observability::{log_event, Event, QueryId, QueryMetrics};

/// What to fetch: filter, returned properties, sort keys
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub filter: Option<FilterExpression>,
    pub select: Vec<String>,
    pub sort: Vec<SortSpec>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }
}

pub struct QueryCompiler<'a> {
    mapping: &'a PropertyMapping,
    dialect: &'a dyn SqlDialect,
    procedures: Option<&'a ProcedureCatalog>,
    metrics: Option<&'a QueryMetrics>,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(mapping: &'a PropertyMapping, dialect: &'a dyn SqlDialect) -> Self {
        Self {
            mapping,
            dialect,
            procedures: None,
            metrics: None,
        }
    }

    pub fn with_procedures(mut self, catalog: &'a ProcedureCatalog) -> Self {
        self.procedures = Some(catalog);
        self
    }

    pub fn with_metrics(mut self, metrics: &'a QueryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Compiles filter, projection and sort in one alias scope.
    ///
    /// Fails before anything reaches the database; failures are logged as
    /// `QUERY_REJECTED` and counted.
    pub fn compile(&self, spec: &QuerySpec) -> QueryResult<CompiledQuery> {
        let query_id = QueryId::new();
        match self.compile_inner(query_id.clone(), spec) {
            Ok(query) => {
                if let Some(metrics) = self.metrics {
                    metrics.increment_queries_compiled();
                }
                log_event(
                    Event::QueryCompiled,
                    &[
                        ("query_id", query_id.as_str()),
                        ("joins", &query.joins().len().to_string()),
                        (
                            "params",
                            &query.predicate().map_or(0, |p| p.params().len()).to_string(),
                        ),
                    ],
                );
                Ok(query)
            }
            Err(err) => {
                if let Some(metrics) = self.metrics {
                    metrics.increment_queries_rejected();
                }
                log_event(
                    Event::QueryRejected,
                    &[
                        ("query_id", query_id.as_str()),
                        ("code", err.code()),
                        ("error", &err.report()),
                    ],
                );
                Err(err)
            }
        }
    }

    fn compile_inner(&self, query_id: QueryId, spec: &QuerySpec) -> QueryResult<CompiledQuery> {
        let mut compiler = PredicateCompiler::new(self.mapping, self.dialect);
        if let Some(catalog) = self.procedures {
            compiler = compiler.with_procedures(catalog);
        }

        // 1. Predicate
        let predicate = match &spec.filter {
            Some(filter) => Some(compiler.compile(filter)?),
            None => None,
        };

        // 2. Projection
        let mut projection = Vec::with_capacity(spec.select.len());
        for property in &spec.select {
            let column = compiler.column(property)?;
            projection.push(ProjectionColumn::new(property.clone(), column.to_string()));
        }

        // 3. Sort keys
        let mut order_by = Vec::with_capacity(spec.sort.len());
        for sort in &spec.sort {
            let column = compiler.column(&sort.property)?;
            order_by.push(OrderTerm {
                column: ProjectionColumn::new(sort.property.clone(), column.to_string()),
                direction: sort.direction,
            });
        }

        // 4. Identifier, the final tie-breaker
        let root = self.mapping.root();
        let root_alias = compiler.aliases().root_alias().to_string();
        let id = ProjectionColumn::new(
            root.id_column.clone(),
            format!("{}.{}", root_alias, root.id_column),
        );

        Ok(CompiledQuery {
            query_id,
            root_table: root.table.clone(),
            root_alias,
            joins: compiler.into_aliases().into_joins(),
            predicate,
            projection,
            order_by,
            id,
        })
    }
}
