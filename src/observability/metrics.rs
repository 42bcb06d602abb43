//! Query metrics
//!
//! Monotonic counters shared by the compiler, the executor and the stores of
//! one deployment. Relaxed ordering is enough: counters are never used to
//! synchronize anything.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counter registry
#[derive(Debug, Default)]
pub struct QueryMetrics {
    queries_compiled: AtomicU64,
    queries_rejected: AtomicU64,
    statements_executed: AtomicU64,
    execution_failures: AtomicU64,
    rows_returned: AtomicU64,
    connections_acquired: AtomicU64,
    connections_released: AtomicU64,
    records_written: AtomicU64,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_compiled(&self) {
        self.queries_compiled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_statements_executed(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_execution_failures(&self) {
        self.execution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_returned(&self, rows: u64) {
        self.rows_returned.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_connections_acquired(&self) {
        self.connections_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connections_released(&self) {
        self.connections_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Connections currently checked out of the pool by this registry's users
    pub fn connections_in_use(&self) -> u64 {
        let acquired = self.connections_acquired.load(Ordering::Relaxed);
        let released = self.connections_released.load(Ordering::Relaxed);
        acquired.saturating_sub(released)
    }

    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"queries_compiled":{},"queries_rejected":{},"statements_executed":{},"execution_failures":{},"rows_returned":{},"connections_acquired":{},"connections_released":{},"records_written":{}}}"#,
            s.queries_compiled,
            s.queries_rejected,
            s.statements_executed,
            s.execution_failures,
            s.rows_returned,
            s.connections_acquired,
            s.connections_released,
            s.records_written,
        )
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_compiled: self.queries_compiled.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
            execution_failures: self.execution_failures.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            connections_acquired: self.connections_acquired.load(Ordering::Relaxed),
            connections_released: self.connections_released.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_compiled: u64,
    pub queries_rejected: u64,
    pub statements_executed: u64,
    pub execution_failures: u64,
    pub rows_returned: u64,
    pub connections_acquired: u64,
    pub connections_released: u64,
    pub records_written: u64,
}
