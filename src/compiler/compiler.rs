//! Predicate compiler
//!
//! Lowers a [`FilterExpression`] into a [`CompiledPredicate`]. The lowering is
//! pure apart from the alias state it owns; one compiler serves one
//! compilation and is consumed by [`PredicateCompiler::into_aliases`].
//!
//! Every operator writes its placeholders through [`SqlBuilder::push_bind`],
//! so parameters are recorded in the textual order of their `?`.

use super::alias::{AliasManager, ColumnRef};
use super::coerce::coerce;
use super::dialect::SqlDialect;
use super::fragment::{CompiledPredicate, SqlBuilder};
use super::like;
use super::procedures::ProcedureCatalog;
use crate::errors::{QueryError, QueryResult};
use crate::filter::{
    ComparisonOp, DistanceOp, Envelope, Expr, FilterExpression, LikeOptions, Point, ScalarValue,
    TemporalRange,
};
use crate::mapping::{PropertyMapping, ValueType};

pub struct PredicateCompiler<'a> {
    mapping: &'a PropertyMapping,
    dialect: &'a dyn SqlDialect,
    procedures: Option<&'a ProcedureCatalog>,
    aliases: AliasManager,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(mapping: &'a PropertyMapping, dialect: &'a dyn SqlDialect) -> Self {
        Self {
            mapping,
            dialect,
            procedures: None,
            aliases: AliasManager::new(&mapping.root().table),
        }
    }

    /// Routes spatial filters on the catalog's location property to the
    /// procedure pre-filter
    pub fn with_procedures(mut self, catalog: &'a ProcedureCatalog) -> Self {
        self.procedures = Some(catalog);
        self
    }

    /// Lowers `filter` into SQL text plus ordered parameters
    pub fn compile(&mut self, filter: &FilterExpression) -> QueryResult<CompiledPredicate> {
        let mut out = SqlBuilder::new();
        self.lower(filter, &mut out)?;
        Ok(out.finish())
    }

    /// Resolves a property to its qualified column, registering its joins
    pub fn column(&mut self, property: &str) -> QueryResult<ColumnRef> {
        let mapping = self.mapping;
        let mapped = mapping.resolve(property)?;
        let alias = self.aliases.alias_for(&mapped.joins);
        Ok(ColumnRef::new(alias, mapped.column.clone(), mapped.value_type))
    }

    pub fn aliases(&self) -> &AliasManager {
        &self.aliases
    }

    pub fn into_aliases(self) -> AliasManager {
        self.aliases
    }

    fn lower(&mut self, filter: &FilterExpression, out: &mut SqlBuilder) -> QueryResult<()> {
        match filter {
            FilterExpression::Include => {
                out.push_always_true();
            }
            FilterExpression::Exclude => {
                out.push_always_false();
            }
            FilterExpression::Comparison { op, left, right } => {
                self.lower_comparison(*op, left, right, out)?;
            }
            FilterExpression::Between {
                property,
                lower,
                upper,
            } => {
                let column = self.column(property)?;
                out.push_column(&column).push_sql(" BETWEEN ");
                self.lower_bound(property, &column, lower, out)?;
                out.push_sql(" AND ");
                self.lower_bound(property, &column, upper, out)?;
            }
            FilterExpression::IsNull { property } => {
                let column = self.column(property)?;
                out.push_column(&column).push_sql(" IS NULL");
            }
            FilterExpression::IsNotNull { property } => {
                let column = self.column(property)?;
                out.push_column(&column).push_sql(" IS NOT NULL");
            }
            FilterExpression::Like {
                property,
                pattern,
                options,
            } => {
                self.lower_like(property, pattern, options, out)?;
            }
            FilterExpression::And(children) => {
                self.lower_junction(" AND ", children, true, out)?;
            }
            FilterExpression::Or(children) => {
                self.lower_junction(" OR ", children, false, out)?;
            }
            FilterExpression::Not(child) => {
                out.push_sql("NOT (");
                self.lower(child, out)?;
                out.push_sql(")");
            }
            FilterExpression::TemporalRange(range) => {
                self.lower_temporal_range(range, out)?;
            }
            FilterExpression::TemporalInstant(instant) => {
                let column = self.time_column("temporal instant")?;
                out.push_column(&column)
                    .push_sql(" = ")
                    .push_bind(ScalarValue::Timestamp(*instant));
            }
            FilterExpression::SpatialBBox { property, envelope } => {
                self.lower_bbox(property, envelope, out)?;
            }
            FilterExpression::SpatialDistance {
                op,
                property,
                center,
                distance,
            } => {
                self.lower_distance(*op, property, center, *distance, out)?;
            }
            FilterExpression::ProcedureRef(identifier) => {
                self.lower_procedure_ref(identifier, out)?;
            }
        }
        Ok(())
    }

    fn lower_comparison(
        &mut self,
        op: ComparisonOp,
        left: &Expr,
        right: &Expr,
        out: &mut SqlBuilder,
    ) -> QueryResult<()> {
        let (property, op, value) = match (left, right) {
            (Expr::Property(p), Expr::Literal(v)) => (p, op, v),
            (Expr::Literal(v), Expr::Property(p)) => (p, op.mirrored(), v),
            (Expr::Property(a), Expr::Property(b)) => {
                return Err(QueryError::unsupported_shape(format!(
                    "both operands of '{}' are property references ({}, {})",
                    op.as_sql(),
                    a,
                    b
                )))
            }
            (Expr::Literal(_), Expr::Literal(_)) => {
                return Err(QueryError::unsupported_shape(format!(
                    "both operands of '{}' are literals",
                    op.as_sql()
                )))
            }
            (l, r) => {
                return Err(QueryError::unsupported_shape(format!(
                    "cannot compare {} with {}",
                    l.kind(),
                    r.kind()
                )))
            }
        };

        if value.is_null() {
            return Err(QueryError::unsupported_shape(format!(
                "comparison of '{}' against null; use an is-null filter",
                property
            )));
        }

        let column = self.column(property)?;
        let value = coerce(property, value, column.value_type)?;
        out.push_column(&column)
            .push_sql(" ")
            .push_sql(op.as_sql())
            .push_sql(" ")
            .push_bind(value);
        Ok(())
    }

    /// A between bound: a literal of the property's type or another property
    fn lower_bound(
        &mut self,
        property: &str,
        column: &ColumnRef,
        bound: &Expr,
        out: &mut SqlBuilder,
    ) -> QueryResult<()> {
        match bound {
            Expr::Literal(value) => {
                out.push_bind(coerce(property, value, column.value_type)?);
            }
            Expr::Property(other) => {
                let other = self.column(other)?;
                out.push_column(&other);
            }
            other => {
                return Err(QueryError::unsupported_shape(format!(
                    "between bound of '{}' is a {}",
                    property,
                    other.kind()
                )))
            }
        }
        Ok(())
    }

    fn lower_like(
        &mut self,
        property: &str,
        pattern: &Expr,
        options: &LikeOptions,
        out: &mut SqlBuilder,
    ) -> QueryResult<()> {
        let text = match pattern {
            Expr::Literal(ScalarValue::Text(text)) => text,
            Expr::Literal(other) => {
                return Err(QueryError::InvalidLiteral {
                    property: property.to_string(),
                    value: other.to_string(),
                    expected: "text pattern",
                })
            }
            other => {
                return Err(QueryError::unsupported_shape(format!(
                    "like pattern of '{}' is a {}",
                    property,
                    other.kind()
                )))
            }
        };

        let column = self.column(property)?;
        if column.value_type == ValueType::Geometry {
            return Err(QueryError::unsupported_shape(format!(
                "geometry property '{}' only supports spatial operators",
                property
            )));
        }

        let sql_pattern = like::translate(text, options);
        let bound = if options.match_case {
            out.push_column(&column);
            sql_pattern.text
        } else {
            self.dialect.lower(out, &column);
            self.dialect.fold_case(&sql_pattern.text)
        };
        out.push_sql(" LIKE ").push_bind(ScalarValue::Text(bound));
        if sql_pattern.escaped {
            out.push_sql(" ESCAPE '\\'");
        }
        Ok(())
    }

    /// Children joined by `keyword`, each parenthesized. An empty conjunction
    /// is true and an empty disjunction is false.
    fn lower_junction(
        &mut self,
        keyword: &str,
        children: &[FilterExpression],
        empty_value: bool,
        out: &mut SqlBuilder,
    ) -> QueryResult<()> {
        if children.is_empty() {
            if empty_value {
                out.push_always_true();
            } else {
                out.push_always_false();
            }
            return Ok(());
        }

        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                out.push_sql(keyword);
            }
            out.push_sql("(");
            self.lower(child, out)?;
            out.push_sql(")");
        }
        Ok(())
    }

    fn time_column(&mut self, what: &str) -> QueryResult<ColumnRef> {
        let mapping = self.mapping;
        let Some(time) = mapping.time_property() else {
            return Err(QueryError::unsupported_operator(format!(
                "{} filter requires a configured time property",
                what
            )));
        };
        self.column(time)
    }

    fn lower_temporal_range(&mut self, range: &TemporalRange, out: &mut SqlBuilder) -> QueryResult<()> {
        let column = self.time_column("temporal range")?;
        let lower_op = if range.inclusive_begin { " >= " } else { " > " };
        let upper_op = if range.inclusive_end { " <= " } else { " < " };

        match (range.begin, range.end) {
            (None, None) => {
                out.push_always_true();
            }
            (Some(begin), Some(end)) => {
                out.push_sql("(")
                    .push_column(&column)
                    .push_sql(lower_op)
                    .push_bind(ScalarValue::Timestamp(begin))
                    .push_sql(" AND ")
                    .push_column(&column)
                    .push_sql(upper_op)
                    .push_bind(ScalarValue::Timestamp(end))
                    .push_sql(")");
            }
            (Some(begin), None) => {
                out.push_sql("(")
                    .push_column(&column)
                    .push_sql(lower_op)
                    .push_bind(ScalarValue::Timestamp(begin))
                    .push_sql(")");
            }
            (None, Some(end)) => {
                out.push_sql("(")
                    .push_column(&column)
                    .push_sql(upper_op)
                    .push_bind(ScalarValue::Timestamp(end))
                    .push_sql(")");
            }
        }
        Ok(())
    }

    fn catalog_for(&self, property: &str) -> Option<&'a ProcedureCatalog> {
        self.procedures
            .filter(|catalog| catalog.location_property() == property)
    }

    fn geometry_column(&mut self, property: &str) -> QueryResult<ColumnRef> {
        let column = self.column(property)?;
        if column.value_type != ValueType::Geometry {
            return Err(QueryError::unsupported_shape(format!(
                "spatial operator on non-geometry property '{}'",
                property
            )));
        }
        Ok(column)
    }

    fn lower_bbox(&mut self, property: &str, envelope: &Envelope, out: &mut SqlBuilder) -> QueryResult<()> {
        envelope.validate()?;

        if let Some(catalog) = self.catalog_for(property) {
            let candidates = catalog.within_envelope(envelope)?;
            return self.lower_procedure_set(candidates, out);
        }

        let column = self.geometry_column(property)?;
        self.dialect.bbox_intersects(out, &column, envelope);
        Ok(())
    }

    fn lower_distance(
        &mut self,
        op: DistanceOp,
        property: &str,
        center: &Point,
        distance: f64,
        out: &mut SqlBuilder,
    ) -> QueryResult<()> {
        if !center.is_finite() {
            return Err(QueryError::InvalidEnvelope(format!(
                "non-finite distance center for '{}'",
                property
            )));
        }
        if !distance.is_finite() || distance < 0.0 {
            return Err(QueryError::InvalidLiteral {
                property: property.to_string(),
                value: distance.to_string(),
                expected: "non-negative distance",
            });
        }

        if let Some(catalog) = self.catalog_for(property) {
            let candidates = match op {
                DistanceOp::DWithin => catalog.within_distance(center, distance)?,
                DistanceOp::Beyond => catalog.beyond_distance(center, distance)?,
            };
            return self.lower_procedure_set(candidates, out);
        }

        let column = self.geometry_column(property)?;
        match op {
            DistanceOp::DWithin => self.dialect.distance_within(out, &column, center, distance),
            DistanceOp::Beyond => {
                out.push_sql("NOT (");
                self.dialect.distance_within(out, &column, center, distance);
                out.push_sql(")");
            }
        }
        Ok(())
    }

    /// Membership in the pre-filtered procedure set. No candidates always
    /// yields a false predicate, never an omitted one.
    fn lower_procedure_set(&mut self, candidates: Vec<String>, out: &mut SqlBuilder) -> QueryResult<()> {
        if candidates.is_empty() {
            out.push_always_false();
            return Ok(());
        }

        let mapping = self.mapping;
        let Some(procedure) = mapping.procedure_property() else {
            // single-procedure deployment: the only procedure is a candidate
            out.push_always_true();
            return Ok(());
        };

        let column = self.column(procedure)?;
        let values = candidates
            .iter()
            .map(|id| coerce(procedure, &ScalarValue::from(id.as_str()), column.value_type))
            .collect::<QueryResult<Vec<_>>>()?;

        out.push_column(&column)
            .push_sql(" IN (")
            .push_bind_list(values)
            .push_sql(")");
        Ok(())
    }

    fn lower_procedure_ref(&mut self, identifier: &str, out: &mut SqlBuilder) -> QueryResult<()> {
        let mapping = self.mapping;
        let Some(procedure) = mapping.procedure_property() else {
            out.push_always_true();
            return Ok(());
        };

        let column = self.column(procedure)?;
        let value = coerce(procedure, &ScalarValue::from(identifier), column.value_type)?;
        out.push_column(&column).push_sql(" = ").push_bind(value);
        Ok(())
    }
}
