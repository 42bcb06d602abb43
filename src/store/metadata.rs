//! Metadata record store
//!
//! Matching datasets are found with a compiled query over the queryables
//! mapping. Record bodies are stored pre-serialized, one per dataset, element
//! set and output format; each matched id is resolved with one narrow lookup
//! and the body is streamed to the caller's writer.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::assembler::{PagingSpec, QueryMode, SortSpec, Statement, StatementAssembler};
use crate::compiler::{QueryCompiler, QuerySpec, SqlDialect};
use crate::errors::{QueryError, QueryResult};
use crate::executor::{QueryExecutor, SqlConnection};
use crate::filter::{FilterExpression, ScalarValue};
use crate::mapping::{check_identifier, PropertyMapping};
use crate::observability::{log_event, Event, OperationScope, QueryId};

use super::xml::XmlFragmentCopier;

/// Level of detail of a returned record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementSet {
    Brief,
    #[default]
    Summary,
    Full,
}

impl ElementSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementSet::Brief => "brief",
            ElementSet::Summary => "summary",
            ElementSet::Full => "full",
        }
    }
}

/// Output schema of a stored body, matching the `format` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    #[serde(alias = "dc")]
    DublinCore,
    #[default]
    Iso,
}

impl RecordFormat {
    pub fn code(&self) -> i64 {
        match self {
            RecordFormat::DublinCore => 1,
            RecordFormat::Iso => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// Count only
    Hits,
    #[default]
    Results,
}

/// Where record bodies live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTables {
    #[serde(default = "default_brief")]
    pub brief: String,
    #[serde(default = "default_summary")]
    pub summary: String,
    #[serde(default = "default_full")]
    pub full: String,
    /// Column referencing the root table id
    #[serde(default = "default_fk_column")]
    pub fk_column: String,
    #[serde(default = "default_data_column")]
    pub data_column: String,
    #[serde(default = "default_format_column")]
    pub format_column: String,
    /// Property compared by get-record-by-id
    #[serde(default = "default_identifier_property")]
    pub identifier_property: String,
}

fn default_brief() -> String {
    "recordbrief".to_string()
}

fn default_summary() -> String {
    "recordsummary".to_string()
}

fn default_full() -> String {
    "recordfull".to_string()
}

fn default_fk_column() -> String {
    "fk_datasets".to_string()
}

fn default_data_column() -> String {
    "data".to_string()
}

fn default_format_column() -> String {
    "format".to_string()
}

fn default_identifier_property() -> String {
    "identifier".to_string()
}

impl Default for RecordTables {
    fn default() -> Self {
        Self {
            brief: default_brief(),
            summary: default_summary(),
            full: default_full(),
            fk_column: default_fk_column(),
            data_column: default_data_column(),
            format_column: default_format_column(),
            identifier_property: default_identifier_property(),
        }
    }
}

impl RecordTables {
    pub fn table(&self, element_set: ElementSet) -> &str {
        match element_set {
            ElementSet::Brief => &self.brief,
            ElementSet::Summary => &self.summary,
            ElementSet::Full => &self.full,
        }
    }

    /// Every name is rendered into the body lookup
    pub fn validate(&self) -> QueryResult<()> {
        for (name, context) in [
            (&self.brief, "brief record table"),
            (&self.summary, "summary record table"),
            (&self.full, "full record table"),
            (&self.fk_column, "record foreign key column"),
            (&self.data_column, "record data column"),
            (&self.format_column, "record format column"),
        ] {
            check_identifier(name, context)?;
        }
        Ok(())
    }

    fn body_lookup_sql(&self, element_set: ElementSet) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = ? AND {} = ?",
            self.data_column,
            self.table(element_set),
            self.fk_column,
            self.format_column
        )
    }
}

/// A search request
#[derive(Debug, Clone)]
pub struct GetRecordsRequest {
    pub filter: Option<FilterExpression>,
    pub sort: Vec<SortSpec>,
    pub paging: PagingSpec,
    pub result_type: ResultType,
    pub element_set: ElementSet,
    pub format: RecordFormat,
}

impl Default for GetRecordsRequest {
    fn default() -> Self {
        Self {
            filter: None,
            sort: Vec::new(),
            paging: PagingSpec::first(10),
            result_type: ResultType::default(),
            element_set: ElementSet::default(),
            format: RecordFormat::default(),
        }
    }
}

impl GetRecordsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn paging(mut self, paging: PagingSpec) -> Self {
        self.paging = paging;
        self
    }

    pub fn result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn element_set(mut self, element_set: ElementSet) -> Self {
        self.element_set = element_set;
        self
    }

    pub fn format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }
}

/// Search result summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// Total matches, independent of paging
    pub matched: u64,
    /// Records in this response
    pub returned: u64,
    /// Start position of the next page; 0 when the result set is exhausted
    pub next_record: u64,
}

impl SearchResults {
    pub fn new(matched: u64, returned: u64, start_position: u64) -> Self {
        let consumed = start_position.saturating_sub(1).saturating_add(returned);
        let next_record = if consumed < matched {
            start_position + returned
        } else {
            0
        };
        Self {
            matched,
            returned,
            next_record,
        }
    }
}

pub struct MetadataStore<M>
where
    M: r2d2::ManageConnection,
    M::Connection: SqlConnection,
{
    mapping: PropertyMapping,
    dialect: &'static dyn SqlDialect,
    executor: QueryExecutor<M>,
    tables: RecordTables,
}

impl<M> MetadataStore<M>
where
    M: r2d2::ManageConnection,
    M::Connection: SqlConnection,
{
    pub fn new(
        mapping: PropertyMapping,
        dialect: &'static dyn SqlDialect,
        executor: QueryExecutor<M>,
        tables: RecordTables,
    ) -> QueryResult<Self> {
        tables.validate()?;
        if !mapping.contains(&tables.identifier_property) {
            return Err(QueryError::Config(format!(
                "identifier property '{}' is not mapped",
                tables.identifier_property
            )));
        }

        log_event(
            Event::StoreOpened,
            &[
                ("store", "metadata"),
                ("dialect", dialect.name()),
                ("properties", &mapping.len().to_string()),
            ],
        );

        Ok(Self {
            mapping,
            dialect,
            executor,
            tables,
        })
    }

    pub fn mapping(&self) -> &PropertyMapping {
        &self.mapping
    }

    pub fn executor(&self) -> &QueryExecutor<M> {
        &self.executor
    }

    /// Counts matches and, for `Results`, writes the requested page of
    /// record bodies to `writer`.
    pub fn get_records<W: Write>(&self, request: &GetRecordsRequest, writer: W) -> QueryResult<SearchResults> {
        let scope = OperationScope::with_fields(
            "GET_RECORDS",
            &[("element_set", request.element_set.as_str())],
        );

        let spec = QuerySpec {
            filter: request.filter.clone(),
            select: Vec::new(),
            sort: request.sort.clone(),
        };
        let query = QueryCompiler::new(&self.mapping, self.dialect)
            .with_metrics(self.executor.metrics())
            .compile(&spec)?;

        let count = StatementAssembler::assemble(&query, QueryMode::Count, None)?;
        let matched = self.executor.count(&count)?;

        if request.result_type == ResultType::Hits {
            let results = SearchResults::new(matched, 0, request.paging.start_position());
            scope.complete_with_fields(&[("matched", &matched.to_string())]);
            return Ok(results);
        }

        let rows = StatementAssembler::assemble(&query, QueryMode::Rows, Some(&request.paging))?;
        let ids = self.matched_ids(&rows, &query.id_column().label)?;

        let mut copier = XmlFragmentCopier::new(writer);
        self.write_bodies(&ids, request.element_set, request.format, &mut copier)?;

        let results = SearchResults::new(matched, ids.len() as u64, request.paging.start_position());
        scope.complete_with_fields(&[
            ("matched", &matched.to_string()),
            ("returned", &results.returned.to_string()),
        ]);
        Ok(results)
    }

    /// Writes the bodies of the records with the given identifiers.
    /// Returns the number of records found.
    pub fn get_record_by_id<W: Write>(
        &self,
        identifiers: &[&str],
        element_set: ElementSet,
        format: RecordFormat,
        writer: W,
    ) -> QueryResult<u64> {
        if identifiers.is_empty() {
            return Ok(0);
        }
        let scope = OperationScope::with_fields(
            "GET_RECORD_BY_ID",
            &[("element_set", element_set.as_str())],
        );

        let filter = FilterExpression::or(
            identifiers
                .iter()
                .map(|id| FilterExpression::eq(self.tables.identifier_property.as_str(), *id))
                .collect(),
        );
        let query = QueryCompiler::new(&self.mapping, self.dialect)
            .with_metrics(self.executor.metrics())
            .compile(&QuerySpec::new().filter(filter))?;
        let rows = StatementAssembler::assemble(&query, QueryMode::Rows, None)?;
        let ids = self.matched_ids(&rows, &query.id_column().label)?;

        let mut copier = XmlFragmentCopier::new(writer);
        self.write_bodies(&ids, element_set, format, &mut copier)?;

        scope.complete_with_fields(&[("found", &ids.len().to_string())]);
        Ok(ids.len() as u64)
    }

    /// Drains the id column, releasing the connection before any body lookup
    fn matched_ids(&self, rows: &Statement, id_label: &str) -> QueryResult<Vec<ScalarValue>> {
        self.executor.rows(rows, |rows| {
            rows.map(|row| row.and_then(|r| r.get(id_label).cloned()))
                .collect()
        })
    }

    fn write_bodies<W: Write>(
        &self,
        ids: &[ScalarValue],
        element_set: ElementSet,
        format: RecordFormat,
        copier: &mut XmlFragmentCopier<W>,
    ) -> QueryResult<()> {
        for id in ids {
            match self.fetch_body(id, element_set, format)? {
                Some(body) => {
                    copier.copy(&body)?;
                    self.executor.metrics().increment_records_written();
                }
                None => log_event(
                    Event::RecordBodyMissing,
                    &[
                        ("id", &id.to_string()),
                        ("element_set", element_set.as_str()),
                        ("format", &format.code().to_string()),
                    ],
                ),
            }
        }
        copier.flush()?;
        Ok(())
    }

    fn fetch_body(
        &self,
        id: &ScalarValue,
        element_set: ElementSet,
        format: RecordFormat,
    ) -> QueryResult<Option<Vec<u8>>> {
        let statement = Statement::new(
            QueryId::new(),
            QueryMode::Rows,
            self.tables.body_lookup_sql(element_set),
            vec![id.clone(), ScalarValue::Integer(format.code())],
            vec![self.tables.data_column.clone()],
        );
        let column = self.tables.data_column.as_str();

        self.executor.rows(&statement, |mut rows| match rows.next() {
            Some(row) => row?.get_bytes(column),
            None => Ok(None),
        })
    }
}
