//! Scoped operation logging
//!
//! - Logs `{NAME}_BEGIN` on creation
//! - Logs `{NAME}_COMPLETE` or `{NAME}_FAILED` when finished explicitly
//! - Logs `{NAME}_INCOMPLETE` on drop otherwise (early return, panic unwind)

use std::cell::Cell;
use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that logs the begin and end of one operation
///
/// ```ignore
/// let scope = OperationScope::with_fields("QUERY_COUNT", &[("query_id", &id)]);
/// let n = run()?;            // early return logs QUERY_COUNT_INCOMPLETE
/// scope.complete_with_fields(&[("count", &n.to_string())]);
/// ```
pub struct OperationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    started: Instant,
}

impl<'a> OperationScope<'a> {
    /// Logs `{name}_BEGIN` at TRACE level
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// The fields are repeated on every line the scope logs
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        let scope = Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
        };
        scope.emit(Severity::Trace, "BEGIN", &[]);
        scope
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as completed, adding result fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let elapsed = self.started.elapsed().as_millis().to_string();
        let mut fields: Vec<(&str, &str)> = extra_fields.to_vec();
        fields.push(("elapsed_ms", &elapsed));
        self.emit(Severity::Info, "COMPLETE", &fields);
    }

    /// Logs `{name}_FAILED` at ERROR level
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        self.emit(Severity::Error, "FAILED", &[("reason", reason)]);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        if !Logger::enabled(severity) {
            return;
        }
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        fields.extend(extra.iter().copied());
        Logger::emit(severity, &event, &fields);
    }
}

impl Drop for OperationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
