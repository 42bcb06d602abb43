//! Store configuration
//!
//! ```json
//! {
//!   "dialect": "sqlite",
//!   "database": { "path": "/var/lib/deegree/csw.db", "max_pool_size": 4 },
//!   "log_level": "WARN",
//!   "mapping_file": "/etc/deegree/queryables.json"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::metadata::RecordTables;
use crate::compiler::{DialectKind, ProcedureCatalog};
use crate::errors::{QueryError, QueryResult};
use crate::executor::{open_sqlite_pool, SqliteConnectionManager, SqlitePool};
use crate::mapping::{presets, PropertyMapping};
use crate::observability::{log_event, Event, Logger, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,

    /// Maximum pooled connections (default: 8)
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Wait for a free connection before failing (default: 30000)
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

fn default_max_pool_size() -> u32 {
    8
}

fn default_connection_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub dialect: DialectKind,

    pub database: DatabaseConfig,

    /// Minimum log severity (default: "INFO")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Mapping document; the built-in ISO queryables when absent
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,

    #[serde(default)]
    pub record_tables: RecordTables,

    /// Procedure locations for spatial observation filters
    #[serde(default)]
    pub procedures: Option<ProcedureCatalog>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl StoreConfig {
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let config = Self::from_json(&content)?;

        log_event(
            Event::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("dialect", config.dialect.dialect().name()),
            ],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> QueryResult<Self> {
        let config: StoreConfig = serde_json::from_str(content)
            .map_err(|e| QueryError::Config(format!("malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.database.max_pool_size == 0 {
            return Err(QueryError::Config("max_pool_size must be at least 1".to_string()));
        }
        if self.database.connection_timeout_ms == 0 {
            return Err(QueryError::Config(
                "connection_timeout_ms must be positive".to_string(),
            ));
        }
        self.log_severity()?;
        self.record_tables.validate()
    }

    pub fn log_severity(&self) -> QueryResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| QueryError::Config(format!("unknown log level '{}'", self.log_level)))
    }

    /// Sets the process-wide minimum log severity
    pub fn apply_logging(&self) -> QueryResult<()> {
        Logger::set_min_severity(self.log_severity()?);
        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.database.connection_timeout_ms)
    }

    /// Opens the SQLite pool. Other dialects only render SQL.
    pub fn open_pool(&self) -> QueryResult<SqlitePool> {
        if self.dialect != DialectKind::Sqlite {
            return Err(QueryError::Config(format!(
                "no bundled backend for the '{}' dialect",
                self.dialect.dialect().name()
            )));
        }
        open_sqlite_pool(
            SqliteConnectionManager::file(&self.database.path),
            self.database.max_pool_size,
            self.connection_timeout(),
        )
    }

    pub fn load_mapping(&self) -> QueryResult<PropertyMapping> {
        let mapping = match &self.mapping_file {
            Some(path) => PropertyMapping::load(path)?,
            None => presets::iso_queryables()?,
        };
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_json(r#"{"database": {"path": "csw.db"}}"#).unwrap();
        assert_eq!(config.dialect, DialectKind::PostGis);
        assert_eq!(config.database.max_pool_size, 8);
        assert_eq!(config.connection_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_severity().unwrap(), Severity::Info);
        assert!(config.mapping_file.is_none());
        assert_eq!(config.record_tables, RecordTables::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{"database": {"path": "a.db", "max_pool_size": 0}}"#,
            r#"{"database": {"path": "a.db"}, "log_level": "LOUD"}"#,
            r#"{"database": {"path": "a.db"}, "dialect": "oracle"}"#,
            r#"{"database": {}}"#,
        ] {
            assert!(
                matches!(StoreConfig::from_json(json), Err(QueryError::Config(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn test_postgis_has_no_pool() {
        let config = StoreConfig::from_json(r#"{"database": {"path": "a.db"}}"#).unwrap();
        assert!(matches!(config.open_pool(), Err(QueryError::Config(_))));
    }

    #[test]
    fn test_builtin_mapping_when_no_file() {
        let config = StoreConfig::from_json(r#"{"database": {"path": "a.db"}}"#).unwrap();
        let mapping = config.load_mapping().unwrap();
        assert!(mapping.contains("identifier"));
    }
}
