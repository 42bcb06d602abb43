//! Statement assembly
//!
//! Wraps a [`CompiledQuery`] into the final statement for one mode. Both modes
//! read the same joins and predicate, so a count and a page of rows taken
//! from one compilation always agree.

use super::statement::{CompiledQuery, Statement};
use super::types::{PagingSpec, QueryMode, SortDirection};
use crate::compiler::verify_parity;
use crate::errors::QueryResult;
use crate::filter::ScalarValue;
use crate::observability::{log_event, Event};

/// Label of the single column a count statement returns
pub const COUNT_COLUMN: &str = "count";

pub struct StatementAssembler;

impl StatementAssembler {
    /// Builds the statement for `mode`. Paging applies to `Rows` only.
    pub fn assemble(
        query: &CompiledQuery,
        mode: QueryMode,
        paging: Option<&PagingSpec>,
    ) -> QueryResult<Statement> {
        let mut params: Vec<ScalarValue> = query
            .predicate()
            .map(|p| p.params().to_vec())
            .unwrap_or_default();

        let body = Self::from_where(query);
        let (sql, columns) = match mode {
            QueryMode::Count => (
                format!("SELECT COUNT(DISTINCT {}){}", query.id_column().expr, body),
                vec![COUNT_COLUMN.to_string()],
            ),
            QueryMode::Rows => {
                let grouping = Grouping::new(query);
                let select = Self::select_list(query, &grouping);
                let mut sql = format!("SELECT {}{}", select.join(", "), body);
                sql.push_str(" GROUP BY ");
                sql.push_str(&grouping.keys.join(", "));
                sql.push_str(" ORDER BY ");
                sql.push_str(&Self::order_by(query, &grouping));
                if let Some(paging) = paging {
                    sql.push_str(" LIMIT ? OFFSET ?");
                    params.push(ScalarValue::Integer(to_i64(paging.limit())));
                    params.push(ScalarValue::Integer(to_i64(paging.offset())));
                }
                let labels: Vec<String> = std::iter::once(query.id_column())
                    .chain(query.projection())
                    .map(|c| c.label.clone())
                    .collect();
                (sql, labels)
            }
        };

        if let Err(err) = verify_parity(&sql, params.len()) {
            log_event(
                Event::ParameterMismatch,
                &[
                    ("query_id", query.query_id().as_str()),
                    ("mode", mode.as_str()),
                    ("error", &err.report()),
                ],
            );
            return Err(err);
        }

        log_event(
            Event::StatementAssembled,
            &[
                ("query_id", query.query_id().as_str()),
                ("mode", mode.as_str()),
                ("joins", &query.joins().len().to_string()),
                ("params", &params.len().to_string()),
            ],
        );

        Ok(Statement::new(
            query.query_id().clone(),
            mode,
            sql,
            params,
            columns,
        ))
    }

    /// Id first, then the projection. Joined columns may hold several values
    /// per id and are reduced to their minimum.
    fn select_list(query: &CompiledQuery, grouping: &Grouping) -> Vec<String> {
        std::iter::once(query.id_column().expr.clone())
            .chain(
                query
                    .projection()
                    .iter()
                    .map(|c| grouping.reduce(&c.expr, SortDirection::Asc)),
            )
            .collect()
    }

    fn from_where(query: &CompiledQuery) -> String {
        let mut sql = format!(" FROM {} {}", query.root_table(), query.root_alias());
        for join in query.joins() {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }
        if let Some(predicate) = query.predicate() {
            sql.push_str(" WHERE ");
            sql.push_str(predicate.sql());
        }
        sql
    }

    /// Requested keys in order, tie-broken by the id column. A joined key
    /// sorts by its smallest value ascending and its largest descending.
    fn order_by(query: &CompiledQuery, grouping: &Grouping) -> String {
        let id = &query.id_column().expr;
        let mut terms: Vec<String> = query
            .order_by()
            .iter()
            .map(|t| {
                format!(
                    "{} {}",
                    grouping.reduce(&t.column.expr, t.direction),
                    t.direction.as_sql()
                )
            })
            .collect();
        if !query.order_by().iter().any(|t| &t.column.expr == id) {
            terms.push(format!("{} {}", id, SortDirection::Asc.as_sql()));
        }
        terms.join(", ")
    }
}

/// One output row per root id. Root columns are grouping keys; columns of
/// joined tables are aggregated.
struct Grouping {
    root_prefix: String,
    keys: Vec<String>,
}

impl Grouping {
    fn new(query: &CompiledQuery) -> Self {
        let root_prefix = format!("{}.", query.root_alias());
        let mut keys = vec![query.id_column().expr.clone()];
        let used = query
            .projection()
            .iter()
            .chain(query.order_by().iter().map(|t| &t.column));
        for column in used {
            if column.expr.starts_with(&root_prefix) && !keys.contains(&column.expr) {
                keys.push(column.expr.clone());
            }
        }
        Self { root_prefix, keys }
    }

    fn reduce(&self, expr: &str, direction: SortDirection) -> String {
        if expr.starts_with(&self.root_prefix) {
            return expr.to_string();
        }
        match direction {
            SortDirection::Asc => format!("MIN({})", expr),
            SortDirection::Desc => format!("MAX({})", expr),
        }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::SortSpec;
    use crate::compiler::{PostGisDialect, QueryCompiler, QuerySpec};
    use crate::errors::QueryError;
    use crate::filter::FilterExpression;
    use crate::mapping::{PropertyMapping, ValueType};

    fn mapping() -> PropertyMapping {
        PropertyMapping::builder("datasets", "id")
            .column("identifier", "identifier", ValueType::Text)
            .joined_column("title", "isoqp_title", "title", ValueType::Text, "fk_datasets")
            .build()
            .unwrap()
    }

    fn compile(spec: &QuerySpec) -> CompiledQuery {
        let mapping = mapping();
        QueryCompiler::new(&mapping, &PostGisDialect)
            .compile(spec)
            .unwrap()
    }

    #[test]
    fn test_rows_statement_shape() {
        let query = compile(
            &QuerySpec::new()
                .filter(FilterExpression::eq("title", "Bonn"))
                .select(["identifier"])
                .sort(SortSpec::desc("title")),
        );
        let paging = PagingSpec::new(3, 5).unwrap();
        let statement = StatementAssembler::assemble(&query, QueryMode::Rows, Some(&paging)).unwrap();

        assert_eq!(
            statement.sql(),
            "SELECT datasets.id, datasets.identifier \
             FROM datasets datasets \
             LEFT OUTER JOIN isoqp_title isoqp_title ON datasets.id = isoqp_title.fk_datasets \
             WHERE isoqp_title.title = ? \
             GROUP BY datasets.id, datasets.identifier \
             ORDER BY MAX(isoqp_title.title) DESC, datasets.id ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            statement.params(),
            &[
                ScalarValue::from("Bonn"),
                ScalarValue::Integer(5),
                ScalarValue::Integer(2)
            ]
        );
        assert_eq!(statement.columns(), &["id", "identifier"]);
    }

    #[test]
    fn test_count_ignores_order_and_paging() {
        let query = compile(
            &QuerySpec::new()
                .filter(FilterExpression::eq("title", "Bonn"))
                .sort(SortSpec::asc("title")),
        );
        let paging = PagingSpec::new(1, 10).unwrap();
        let statement = StatementAssembler::assemble(&query, QueryMode::Count, Some(&paging)).unwrap();

        assert_eq!(
            statement.sql(),
            "SELECT COUNT(DISTINCT datasets.id) \
             FROM datasets datasets \
             LEFT OUTER JOIN isoqp_title isoqp_title ON datasets.id = isoqp_title.fk_datasets \
             WHERE isoqp_title.title = ?"
        );
        assert!(!statement.sql().contains("ORDER BY"));
        assert!(!statement.sql().contains("LIMIT"));
        assert_eq!(statement.params(), &[ScalarValue::from("Bonn")]);
        assert_eq!(statement.columns(), &[COUNT_COLUMN]);
    }

    #[test]
    fn test_count_and_rows_share_where_and_joins() {
        let query = compile(&QuerySpec::new().filter(FilterExpression::or(vec![
            FilterExpression::eq("title", "a"),
            FilterExpression::eq("title", "b"),
        ])));
        let count = StatementAssembler::assemble(&query, QueryMode::Count, None).unwrap();
        let rows = StatementAssembler::assemble(&query, QueryMode::Rows, None).unwrap();

        let where_clause = "WHERE (isoqp_title.title = ?) OR (isoqp_title.title = ?)";
        assert!(count.sql().contains(where_clause));
        assert!(rows.sql().contains(where_clause));
        assert_eq!(count.sql().matches("LEFT OUTER JOIN").count(), 1);
        assert_eq!(rows.sql().matches("LEFT OUTER JOIN").count(), 1);
    }

    #[test]
    fn test_no_filter_has_no_where() {
        let query = compile(&QuerySpec::new());
        let statement = StatementAssembler::assemble(&query, QueryMode::Rows, None).unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT datasets.id FROM datasets datasets GROUP BY datasets.id ORDER BY datasets.id ASC"
        );
        assert!(statement.params().is_empty());
    }

    #[test]
    fn test_count_independent_of_sort_keys() {
        let unsorted = compile(&QuerySpec::new().filter(FilterExpression::eq("identifier", "urn:ds:2")));
        let sorted = compile(
            &QuerySpec::new()
                .filter(FilterExpression::eq("identifier", "urn:ds:2"))
                .sort(SortSpec::asc("title")),
        );
        let a = StatementAssembler::assemble(&unsorted, QueryMode::Count, None).unwrap();
        let b = StatementAssembler::assemble(&sorted, QueryMode::Count, None).unwrap();

        // the sort join is still present, but only the id is counted
        assert!(b.sql().starts_with("SELECT COUNT(DISTINCT datasets.id) FROM datasets datasets"));
        assert!(!b.sql().contains("isoqp_title.title"));
        assert_eq!(a.params(), b.params());
    }

    #[test]
    fn test_joined_projection_reduced_per_id() {
        let query = compile(
            &QuerySpec::new()
                .select(["title", "identifier"])
                .sort(SortSpec::asc("title")),
        );
        let statement = StatementAssembler::assemble(&query, QueryMode::Rows, None).unwrap();

        assert_eq!(
            statement.sql(),
            "SELECT datasets.id, MIN(isoqp_title.title), datasets.identifier \
             FROM datasets datasets \
             LEFT OUTER JOIN isoqp_title isoqp_title ON datasets.id = isoqp_title.fk_datasets \
             GROUP BY datasets.id, datasets.identifier \
             ORDER BY MIN(isoqp_title.title) ASC, datasets.id ASC"
        );
        assert_eq!(statement.columns(), &["id", "title", "identifier"]);
    }

    #[test]
    fn test_parity_checked_on_assembly() {
        let mut query = compile(&QuerySpec::new().filter(FilterExpression::eq("title", "x")));
        query.predicate = query.predicate.map(|p| {
            let (sql, _) = p.into_parts();
            let mut out = crate::compiler::SqlBuilder::new();
            out.push_sql(&sql);
            out.finish()
        });

        let result = StatementAssembler::assemble(&query, QueryMode::Count, None);
        assert!(matches!(
            result,
            Err(QueryError::ParameterCountMismatch {
                placeholders: 1,
                parameters: 0
            })
        ));
    }
}
