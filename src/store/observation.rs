//! Observation store
//!
//! Observations are rows of a single table keyed by time and procedure, with
//! one column per observed property. A request is turned into one filter:
//!
//! ```text
//! (temporal_1 OR temporal_2 ...) AND (procedure_1 OR ...) AND spatial AND result_filter
//! ```
//!
//! Temporal windows are alternatives, not constraints on each other.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assembler::{PagingSpec, QueryMode, SortSpec, StatementAssembler};
use crate::compiler::{ProcedureCatalog, QueryCompiler, QuerySpec, SqlDialect};
use crate::errors::{QueryError, QueryResult};
use crate::executor::{QueryExecutor, Row, SqlConnection};
use crate::filter::{Envelope, FilterExpression, TemporalRange};
use crate::mapping::PropertyMapping;
use crate::observability::{log_event, Event, OperationScope};

/// Location property used when no procedure catalog is configured
pub const DEFAULT_LOCATION_PROPERTY: &str = "location";

#[derive(Debug, Clone, PartialEq)]
pub enum TemporalFilter {
    Range(TemporalRange),
    Instant(DateTime<Utc>),
}

impl TemporalFilter {
    fn to_filter(&self) -> FilterExpression {
        match self {
            TemporalFilter::Range(range) => FilterExpression::during(*range),
            TemporalFilter::Instant(instant) => FilterExpression::at(*instant),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObservationRequest {
    pub temporal: Vec<TemporalFilter>,
    pub procedures: Vec<String>,
    pub spatial: Option<Envelope>,
    pub result_filter: Option<FilterExpression>,
    pub observed_properties: Vec<String>,
    pub sort: Vec<SortSpec>,
    pub paging: Option<PagingSpec>,
}

impl ObservationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn during(mut self, range: TemporalRange) -> Self {
        self.temporal.push(TemporalFilter::Range(range));
        self
    }

    pub fn at(mut self, instant: DateTime<Utc>) -> Self {
        self.temporal.push(TemporalFilter::Instant(instant));
        self
    }

    pub fn procedure(mut self, id: impl Into<String>) -> Self {
        self.procedures.push(id.into());
        self
    }

    pub fn within(mut self, envelope: Envelope) -> Self {
        self.spatial = Some(envelope);
        self
    }

    pub fn result_filter(mut self, filter: FilterExpression) -> Self {
        self.result_filter = Some(filter);
        self
    }

    pub fn observe(mut self, property: impl Into<String>) -> Self {
        self.observed_properties.push(property.into());
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn paging(mut self, paging: PagingSpec) -> Self {
        self.paging = Some(paging);
        self
    }

    /// The combined filter, or `None` if the request constrains nothing
    pub fn to_filter(&self, location_property: &str) -> Option<FilterExpression> {
        let mut parts = Vec::new();

        if let Some(temporal) =
            FilterExpression::any_of(self.temporal.iter().map(TemporalFilter::to_filter).collect())
        {
            parts.push(temporal);
        }
        if let Some(procedures) = FilterExpression::any_of(
            self.procedures
                .iter()
                .map(|p| FilterExpression::procedure(p.clone()))
                .collect(),
        ) {
            parts.push(procedures);
        }
        if let Some(envelope) = self.spatial {
            parts.push(FilterExpression::bbox(location_property, envelope));
        }
        if let Some(filter) = &self.result_filter {
            parts.push(filter.clone());
        }

        FilterExpression::all_of(parts)
    }
}

/// One time-stamped measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub procedure: Option<String>,
    /// One value per observed property, NaN where the database held NULL
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub properties: Vec<String>,
    /// Matches independent of paging
    pub matched: u64,
    pub measurements: Vec<Measurement>,
}

pub struct ObservationStore<M>
where
    M: r2d2::ManageConnection,
    M::Connection: SqlConnection,
{
    mapping: PropertyMapping,
    dialect: &'static dyn SqlDialect,
    procedures: Option<ProcedureCatalog>,
    executor: QueryExecutor<M>,
}

impl<M> ObservationStore<M>
where
    M: r2d2::ManageConnection,
    M::Connection: SqlConnection,
{
    /// The mapping must declare a time property
    pub fn new(
        mapping: PropertyMapping,
        dialect: &'static dyn SqlDialect,
        executor: QueryExecutor<M>,
    ) -> QueryResult<Self> {
        if mapping.time_property().is_none() {
            return Err(QueryError::Config(
                "observation mapping has no time property".to_string(),
            ));
        }

        log_event(
            Event::StoreOpened,
            &[
                ("store", "observation"),
                ("dialect", dialect.name()),
                ("properties", &mapping.len().to_string()),
            ],
        );

        Ok(Self {
            mapping,
            dialect,
            procedures: None,
            executor,
        })
    }

    pub fn with_procedures(mut self, catalog: ProcedureCatalog) -> Self {
        self.procedures = Some(catalog);
        self
    }

    pub fn mapping(&self) -> &PropertyMapping {
        &self.mapping
    }

    pub fn executor(&self) -> &QueryExecutor<M> {
        &self.executor
    }

    fn location_property(&self) -> &str {
        self.procedures
            .as_ref()
            .map_or(DEFAULT_LOCATION_PROPERTY, |c| c.location_property())
    }

    fn time_property(&self) -> QueryResult<&str> {
        self.mapping
            .time_property()
            .ok_or_else(|| QueryError::Config("observation mapping has no time property".to_string()))
    }

    fn compiler(&self) -> QueryCompiler<'_> {
        let compiler = QueryCompiler::new(&self.mapping, self.dialect).with_metrics(self.executor.metrics());
        match &self.procedures {
            Some(catalog) => compiler.with_procedures(catalog),
            None => compiler,
        }
    }

    fn spec(&self, request: &ObservationRequest) -> QueryResult<QuerySpec> {
        let time = self.time_property()?;

        let mut select = vec![time.to_string()];
        if let Some(procedure) = self.mapping.procedure_property() {
            select.push(procedure.to_string());
        }
        select.extend(request.observed_properties.iter().cloned());

        let sort = if request.sort.is_empty() {
            vec![SortSpec::asc(time)]
        } else {
            request.sort.clone()
        };

        Ok(QuerySpec {
            filter: request.to_filter(self.location_property()),
            select,
            sort,
        })
    }

    /// Hits query: number of distinct matching observations
    pub fn count_observations(&self, request: &ObservationRequest) -> QueryResult<u64> {
        let query = self.compiler().compile(&self.spec(request)?)?;
        let statement = StatementAssembler::assemble(&query, QueryMode::Count, None)?;
        self.executor.count(&statement)
    }

    /// Matched count plus the requested page of measurements
    pub fn get_observation(&self, request: &ObservationRequest) -> QueryResult<Observation> {
        let scope = OperationScope::with_fields(
            "GET_OBSERVATION",
            &[("observed", &request.observed_properties.len().to_string())],
        );

        let query = self.compiler().compile(&self.spec(request)?)?;
        let count = StatementAssembler::assemble(&query, QueryMode::Count, None)?;
        let rows = StatementAssembler::assemble(&query, QueryMode::Rows, request.paging.as_ref())?;

        let matched = self.executor.count(&count)?;
        let measurements = self.executor.rows(&rows, |rows| {
            rows.map(|row| row.and_then(|row| self.measurement(&row, &request.observed_properties)))
                .collect::<QueryResult<Vec<_>>>()
        })?;

        scope.complete_with_fields(&[
            ("matched", &matched.to_string()),
            ("returned", &measurements.len().to_string()),
        ]);

        Ok(Observation {
            properties: request.observed_properties.clone(),
            matched,
            measurements,
        })
    }

    fn measurement(&self, row: &Row, observed: &[String]) -> QueryResult<Measurement> {
        let time = self.time_property()?;
        let timestamp = row
            .get_timestamp(time)?
            .ok_or_else(|| QueryError::row_decode(time, "observation without timestamp"))?;

        let procedure = match self.mapping.procedure_property() {
            Some(property) => row.get_str(property)?,
            None => None,
        };

        let values = observed
            .iter()
            .map(|property| Ok(row.get_f64(property)?.unwrap_or(f64::NAN)))
            .collect::<QueryResult<Vec<_>>>()?;

        Ok(Measurement {
            timestamp,
            procedure,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2009, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_temporal_filters_are_alternatives() {
        let request = ObservationRequest::new()
            .during(TemporalRange::half_open(t(0), t(1)))
            .during(TemporalRange::half_open(t(5), t(6)));

        match request.to_filter("location") {
            Some(FilterExpression::Or(children)) => assert_eq!(children.len(), 2),
            other => panic!("expected disjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_request_parts_are_conjoined() {
        let request = ObservationRequest::new()
            .at(t(0))
            .procedure("bonn")
            .procedure("koeln")
            .within(Envelope::new(0.0, 0.0, 1.0, 1.0, 4326));

        match request.to_filter("location") {
            Some(FilterExpression::And(children)) => {
                assert_eq!(children.len(), 3);
                assert!(matches!(children[1], FilterExpression::Or(_)));
                assert!(matches!(children[2], FilterExpression::SpatialBBox { .. }));
            }
            other => panic!("expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_request_has_no_filter() {
        assert!(ObservationRequest::new().to_filter("location").is_none());
    }
}
