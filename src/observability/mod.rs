//! Observability: structured logging, typed events, metrics
//!
//! # Principles
//!
//! 1. Observability is read-only and never changes query results
//! 2. No async or background threads
//! 3. Deterministic output (sorted fields, stable event names)
//! 4. A failing log sink never fails a query
//!
//! ```ignore
//! use deegree_sql::observability::{log_event, Event, QueryId};
//!
//! let id = QueryId::new();
//! log_event(Event::QueryCompiled, &[("query_id", id.as_str())]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, QueryMetrics};
pub use scope::OperationScope;

use std::fmt;

use uuid::Uuid;

/// Correlates the log lines of one compiled query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryId(String);

impl QueryId {
    pub fn new() -> Self {
        QueryId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logs an event at its default severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::emit(event.severity(), event.as_str(), fields);
}
