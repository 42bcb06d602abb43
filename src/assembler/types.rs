//! Sort, paging and mode types

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One requested sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub property: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Result window. `start_position` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPagingSpec")]
pub struct PagingSpec {
    start_position: u64,
    max_records: u64,
}

/// Wire shape of [`PagingSpec`], checked by [`PagingSpec::new`]
#[derive(Deserialize)]
struct RawPagingSpec {
    start_position: u64,
    max_records: u64,
}

impl TryFrom<RawPagingSpec> for PagingSpec {
    type Error = QueryError;

    fn try_from(raw: RawPagingSpec) -> QueryResult<Self> {
        PagingSpec::new(raw.start_position, raw.max_records)
    }
}

impl PagingSpec {
    pub fn new(start_position: u64, max_records: u64) -> QueryResult<Self> {
        if start_position < 1 {
            return Err(QueryError::InvalidPaging(format!(
                "start position must be at least 1, got {}",
                start_position
            )));
        }
        Ok(Self {
            start_position,
            max_records,
        })
    }

    /// The first `max_records` rows
    pub fn first(max_records: u64) -> Self {
        Self {
            start_position: 1,
            max_records,
        }
    }

    pub fn start_position(&self) -> u64 {
        self.start_position
    }

    pub fn max_records(&self) -> u64 {
        self.max_records
    }

    /// Rows skipped before the window
    pub fn offset(&self) -> u64 {
        self.start_position.saturating_sub(1)
    }

    pub fn limit(&self) -> u64 {
        self.max_records
    }
}

/// What a statement returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// The number of distinct matching ids, ignoring sort and paging
    Count,
    /// One row per matching id in the requested order
    Rows,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Count => "count",
            QueryMode::Rows => "rows",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_offset_is_zero_based() {
        let paging = PagingSpec::new(11, 10).unwrap();
        assert_eq!(paging.offset(), 10);
        assert_eq!(paging.limit(), 10);
        assert_eq!(PagingSpec::first(5).offset(), 0);
    }

    #[test]
    fn test_start_position_zero_rejected() {
        assert!(matches!(
            PagingSpec::new(0, 10),
            Err(QueryError::InvalidPaging(_))
        ));
    }

    #[test]
    fn test_paging_from_json_is_validated() {
        let paging: PagingSpec =
            serde_json::from_str(r#"{"start_position": 3, "max_records": 5}"#).unwrap();
        assert_eq!(paging, PagingSpec::new(3, 5).unwrap());
        assert_eq!(paging.offset(), 2);

        let err = serde_json::from_str::<PagingSpec>(r#"{"start_position": 0, "max_records": 5}"#)
            .unwrap_err();
        assert!(err.to_string().contains("start position must be at least 1"));
    }

    #[test]
    fn test_sort_spec_from_json() {
        let spec: SortSpec = serde_json::from_str(r#"{"property": "title"}"#).unwrap();
        assert_eq!(spec, SortSpec::asc("title"));
    }
}
