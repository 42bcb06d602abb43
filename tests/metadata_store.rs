//! Metadata store tests over the built-in ISO queryables
//!
//! Test Categories:
//! 1. Hits and results
//! 2. Record lookup by identifier
//! 3. Missing bodies and multi-valued joins
//! 4. Configuration-driven setup

use std::path::{Path, PathBuf};
use std::time::Duration;

use deegree_sql::assembler::{PagingSpec, SortSpec};
use deegree_sql::compiler::SqliteDialect;
use deegree_sql::executor::{open_sqlite_pool, QueryExecutor, SqliteConnectionManager};
use deegree_sql::filter::FilterExpression;
use deegree_sql::mapping::presets::iso_queryables;
use deegree_sql::store::{
    ElementSet, GetRecordsRequest, MetadataStore, RecordFormat, RecordTables, ResultType,
    SearchResults, StoreConfig,
};
use deegree_sql::QueryError;

const TITLES: [&str; 5] = ["Alpha", "Bravo", "Charlie", "Delta", "Echo"];

// =============================================================================
// Helper Functions
// =============================================================================

/// Five datasets; odd ones mention water. Dataset 4 has no summary body and
/// only dataset 1 has a Dublin Core body.
fn create_database(dir: &Path) -> PathBuf {
    let path = dir.join("csw.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE datasets (id INTEGER PRIMARY KEY, anytext TEXT, modified TEXT);
         CREATE TABLE qp_identifier (id INTEGER PRIMARY KEY, fk_datasets INTEGER, identifier TEXT);
         CREATE TABLE isoqp_title (id INTEGER PRIMARY KEY, fk_datasets INTEGER, title TEXT);
         CREATE TABLE recordbrief (id INTEGER PRIMARY KEY, fk_datasets INTEGER, format INTEGER, data BLOB);
         CREATE TABLE recordsummary (id INTEGER PRIMARY KEY, fk_datasets INTEGER, format INTEGER, data BLOB);
         CREATE TABLE recordfull (id INTEGER PRIMARY KEY, fk_datasets INTEGER, format INTEGER, data BLOB);",
    )
    .unwrap();

    for (index, title) in TITLES.iter().enumerate() {
        let id = index as i64 + 1;
        let anytext = if id % 2 == 1 {
            format!("{} surface water", title.to_lowercase())
        } else {
            format!("{} land use", title.to_lowercase())
        };
        conn.execute(
            "INSERT INTO datasets (id, anytext) VALUES (?1, ?2)",
            rusqlite::params![id, anytext],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO qp_identifier (fk_datasets, identifier) VALUES (?1, ?2)",
            rusqlite::params![id, format!("urn:ds:{}", id)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO isoqp_title (fk_datasets, title) VALUES (?1, ?2)",
            rusqlite::params![id, title],
        )
        .unwrap();

        for set in ["brief", "summary", "full"] {
            if set == "summary" && id == 4 {
                continue;
            }
            let body = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<md id=\"{}\" set=\"{}\"/>", id, set);
            conn.execute(
                &format!("INSERT INTO record{} (fk_datasets, format, data) VALUES (?1, 2, ?2)", set),
                rusqlite::params![id, body.into_bytes()],
            )
            .unwrap();
        }
    }
    conn.execute(
        "INSERT INTO recordsummary (fk_datasets, format, data) VALUES (1, 1, ?1)",
        rusqlite::params![b"\xEF\xBB\xBF<dc id=\"1\"/>".to_vec()],
    )
    .unwrap();
    path
}

fn open_store(path: &Path) -> MetadataStore<SqliteConnectionManager> {
    let pool = open_sqlite_pool(SqliteConnectionManager::file(path), 2, Duration::from_secs(5)).unwrap();
    MetadataStore::new(
        iso_queryables().unwrap(),
        &SqliteDialect,
        QueryExecutor::new(pool),
        RecordTables::default(),
    )
    .unwrap()
}

fn setup() -> (tempfile::TempDir, MetadataStore<SqliteConnectionManager>) {
    let dir = tempfile::tempdir().unwrap();
    let path = create_database(dir.path());
    let store = open_store(&path);
    (dir, store)
}

fn water() -> FilterExpression {
    FilterExpression::like("AnyText", "%water%")
}

// =============================================================================
// Hits and results
// =============================================================================

/// Test: hits reports the match count and writes nothing.
#[test]
fn test_hits() {
    let (_dir, store) = setup();
    let request = GetRecordsRequest::new()
        .filter(water())
        .result_type(ResultType::Hits);

    let mut out = Vec::new();
    let results = store.get_records(&request, &mut out).unwrap();
    assert_eq!(results, SearchResults::new(3, 0, 1));
    assert_eq!(results.next_record, 1);
    assert!(out.is_empty());
    assert_eq!(store.executor().metrics().connections_in_use(), 0);
}

/// Test: results are written in sort order, one page at a time.
#[test]
fn test_results_paged_by_title() {
    let (_dir, store) = setup();
    let first = GetRecordsRequest::new()
        .filter(water())
        .sort(SortSpec::asc("Title"))
        .paging(PagingSpec::first(2));

    let mut out = Vec::new();
    let results = store.get_records(&first, &mut out).unwrap();
    assert_eq!(results.matched, 3);
    assert_eq!(results.returned, 2);
    assert_eq!(results.next_record, 3);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"<md id="1" set="summary"/><md id="3" set="summary"/>"#
    );

    let second = first.clone().paging(PagingSpec::new(3, 2).unwrap());
    let mut out = Vec::new();
    let results = store.get_records(&second, &mut out).unwrap();
    assert_eq!(results.returned, 1);
    assert_eq!(results.next_record, 0);
    assert_eq!(String::from_utf8(out).unwrap(), r#"<md id="5" set="summary"/>"#);
}

/// Test: descending sort on a joined property with the brief element set.
#[test]
fn test_results_descending_brief() {
    let (_dir, store) = setup();
    let request = GetRecordsRequest::new()
        .sort(SortSpec::desc("title"))
        .element_set(ElementSet::Brief)
        .paging(PagingSpec::first(2));

    let mut out = Vec::new();
    let results = store.get_records(&request, &mut out).unwrap();
    assert_eq!(results.matched, 5);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"<md id="5" set="brief"/><md id="4" set="brief"/>"#
    );
}

/// Test: an unknown queryable is rejected before anything is written.
#[test]
fn test_unknown_queryable_rejected() {
    let (_dir, store) = setup();
    let request = GetRecordsRequest::new().filter(FilterExpression::eq("Colour", "blue"));

    let mut out = Vec::new();
    assert!(matches!(
        store.get_records(&request, &mut out),
        Err(QueryError::UnknownProperty(_))
    ));
    assert!(out.is_empty());
    assert_eq!(store.executor().metrics().snapshot().connections_acquired, 0);
}

// =============================================================================
// Record lookup by identifier
// =============================================================================

/// Test: known identifiers are resolved in row order, unknown ones skipped.
#[test]
fn test_get_record_by_id() {
    let (_dir, store) = setup();
    let mut out = Vec::new();
    let found = store
        .get_record_by_id(&["urn:ds:5", "urn:ds:2", "urn:ds:99"], ElementSet::Full, RecordFormat::Iso, &mut out)
        .unwrap();

    assert_eq!(found, 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"<md id="2" set="full"/><md id="5" set="full"/>"#
    );
    assert_eq!(store.executor().metrics().snapshot().records_written, 2);
}

/// Test: the requested output format selects the stored body; the byte order
/// mark is stripped.
#[test]
fn test_get_record_by_id_dublin_core() {
    let (_dir, store) = setup();
    let mut out = Vec::new();
    store
        .get_record_by_id(&["urn:ds:1"], ElementSet::Summary, RecordFormat::DublinCore, &mut out)
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), r#"<dc id="1"/>"#);
}

/// Test: no identifiers means no query at all.
#[test]
fn test_get_record_by_id_empty() {
    let (_dir, store) = setup();
    let mut out = Vec::new();
    assert_eq!(
        store
            .get_record_by_id(&[], ElementSet::Full, RecordFormat::Iso, &mut out)
            .unwrap(),
        0
    );
    assert_eq!(store.executor().metrics().snapshot().statements_executed, 0);
}

// =============================================================================
// Missing bodies and multi-valued joins
// =============================================================================

/// Test: a matched dataset without a stored body is skipped, not an error.
#[test]
fn test_missing_body_skipped() {
    let (_dir, store) = setup();
    let mut out = Vec::new();
    let found = store
        .get_record_by_id(&["urn:ds:4"], ElementSet::Summary, RecordFormat::Iso, &mut out)
        .unwrap();

    assert_eq!(found, 1);
    assert!(out.is_empty());
    assert_eq!(store.executor().metrics().snapshot().records_written, 0);
}

/// Test: a dataset matching through two joined rows is counted and returned once.
#[test]
fn test_multi_valued_join_counts_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_database(dir.path());
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("INSERT INTO isoqp_title (fk_datasets, title) VALUES (2, 'Zulu')", [])
        .unwrap();
    drop(conn);
    let store = open_store(&path);

    let request = GetRecordsRequest::new().filter(FilterExpression::or(vec![
        FilterExpression::eq("title", "Bravo"),
        FilterExpression::eq("title", "Zulu"),
    ]));
    let mut out = Vec::new();
    let results = store.get_records(&request, &mut out).unwrap();

    assert_eq!(results.matched, 1);
    assert_eq!(results.returned, 1);
    assert_eq!(String::from_utf8(out).unwrap(), r#"<md id="2" set="summary"/>"#);
}

fn with_second_title(dir: &Path) -> MetadataStore<SqliteConnectionManager> {
    let path = create_database(dir);
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("INSERT INTO isoqp_title (fk_datasets, title) VALUES (2, 'Zulu')", [])
        .unwrap();
    drop(conn);
    open_store(&path)
}

/// Test: sorting on a multi-valued property changes neither the count nor
/// the number of bodies written.
#[test]
fn test_sort_on_multi_valued_join_keeps_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = with_second_title(dir.path());
    let unsorted = GetRecordsRequest::new().filter(FilterExpression::eq("identifier", "urn:ds:2"));
    let sorted = unsorted.clone().sort(SortSpec::asc("title"));

    let mut out = Vec::new();
    let plain = store.get_records(&unsorted, &mut out).unwrap();
    assert_eq!(plain.matched, 1);
    assert_eq!(plain.returned, 1);

    let mut out = Vec::new();
    let ordered = store.get_records(&sorted, &mut out).unwrap();
    assert_eq!(ordered.matched, plain.matched);
    assert_eq!(ordered.returned, 1);
    assert_eq!(String::from_utf8(out).unwrap(), r#"<md id="2" set="summary"/>"#);
}

/// Test: a multi-valued sort key orders by its largest value when descending.
#[test]
fn test_descending_sort_uses_largest_joined_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = with_second_title(dir.path());
    let request = GetRecordsRequest::new()
        .sort(SortSpec::desc("title"))
        .element_set(ElementSet::Brief)
        .paging(PagingSpec::first(3));

    let mut out = Vec::new();
    let results = store.get_records(&request, &mut out).unwrap();
    assert_eq!(results.matched, 5);
    assert_eq!(results.returned, 3);
    // Zulu, Echo, Delta
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"<md id="2" set="brief"/><md id="5" set="brief"/><md id="4" set="brief"/>"#
    );
}

// =============================================================================
// Configuration-driven setup
// =============================================================================

/// Test: a store assembled from a configuration file and a mapping document.
#[test]
fn test_store_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_database(dir.path());

    let mapping_path = dir.path().join("queryables.json");
    std::fs::write(
        &mapping_path,
        r#"{
            "root": {"table": "datasets", "id_column": "id"},
            "properties": {
                "text": {"table": "datasets", "column": "anytext"},
                "id": {
                    "table": "qp_identifier",
                    "column": "identifier",
                    "joins": [{"from_table": "datasets", "from_column": "id",
                               "to_table": "qp_identifier", "to_column": "fk_datasets"}]
                }
            }
        }"#,
    )
    .unwrap();

    let config_path = dir.path().join("store.json");
    std::fs::write(
        &config_path,
        serde_json::json!({
            "dialect": "sqlite",
            "database": {"path": db, "max_pool_size": 1},
            "log_level": "ERROR",
            "mapping_file": mapping_path,
            "record_tables": {"identifier_property": "id"}
        })
        .to_string(),
    )
    .unwrap();

    let config = StoreConfig::load(&config_path).unwrap();
    config.apply_logging().unwrap();
    let store = MetadataStore::new(
        config.load_mapping().unwrap(),
        config.dialect.dialect(),
        QueryExecutor::new(config.open_pool().unwrap()),
        config.record_tables.clone(),
    )
    .unwrap();

    let mut out = Vec::new();
    let results = store
        .get_records(
            &GetRecordsRequest::new()
                .filter(FilterExpression::like("text", "%land%"))
                .element_set(ElementSet::Full),
            &mut out,
        )
        .unwrap();
    assert_eq!(results.matched, 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"<md id="2" set="full"/><md id="4" set="full"/>"#
    );

    let found = store
        .get_record_by_id(&["urn:ds:3"], ElementSet::Brief, RecordFormat::Iso, Vec::new())
        .unwrap();
    assert_eq!(found, 1);
}

/// Test: the identifier property must exist in the mapping.
#[test]
fn test_unmapped_identifier_property_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_database(dir.path());
    let pool = open_sqlite_pool(SqliteConnectionManager::file(&path), 1, Duration::from_secs(5)).unwrap();
    let tables = RecordTables {
        identifier_property: "fileIdentifier".to_string(),
        ..RecordTables::default()
    };

    let result = MetadataStore::new(iso_queryables().unwrap(), &SqliteDialect, QueryExecutor::new(pool), tables);
    assert!(matches!(result, Err(QueryError::Config(_))));
}
