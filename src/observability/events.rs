//! Typed lifecycle events
//!
//! Event names are stable; log consumers match on them.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,
    MappingLoaded,
    StoreOpened,

    // Compilation
    QueryCompiled,
    QueryRejected,
    StatementAssembled,
    ParameterMismatch,

    // Execution
    ConnectionAcquired,
    ConnectionReleased,
    QueryExecuted,
    ExecutionFailed,

    // Materialization
    RecordBodyMissing,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::MappingLoaded => "MAPPING_LOADED",
            Event::StoreOpened => "STORE_OPENED",

            Event::QueryCompiled => "QUERY_COMPILED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::StatementAssembled => "STATEMENT_ASSEMBLED",
            Event::ParameterMismatch => "PARAMETER_MISMATCH",

            Event::ConnectionAcquired => "CONNECTION_ACQUIRED",
            Event::ConnectionReleased => "CONNECTION_RELEASED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::ExecutionFailed => "EXECUTION_FAILED",

            Event::RecordBodyMissing => "RECORD_BODY_MISSING",
        }
    }

    /// Severity the event is normally logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryCompiled
            | Event::StatementAssembled
            | Event::ConnectionAcquired
            | Event::ConnectionReleased => Severity::Trace,
            Event::ConfigLoaded
            | Event::MappingLoaded
            | Event::StoreOpened
            | Event::QueryExecuted => Severity::Info,
            Event::QueryRejected | Event::RecordBodyMissing => Severity::Warn,
            Event::ExecutionFailed => Severity::Error,
            Event::ParameterMismatch => Severity::Fatal,
        }
    }

    /// True if the event reports a defect in this library
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::ParameterMismatch)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Event; 12] = [
        Event::ConfigLoaded,
        Event::MappingLoaded,
        Event::StoreOpened,
        Event::QueryCompiled,
        Event::QueryRejected,
        Event::StatementAssembled,
        Event::ParameterMismatch,
        Event::ConnectionAcquired,
        Event::ConnectionReleased,
        Event::QueryExecuted,
        Event::ExecutionFailed,
        Event::RecordBodyMissing,
    ];

    #[test]
    fn test_all_events_have_string_representation() {
        for event in ALL {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_only_parameter_mismatch_is_fatal() {
        for event in ALL {
            assert_eq!(event.is_fatal(), event == Event::ParameterMismatch);
        }
        assert_eq!(Event::ParameterMismatch.severity(), Severity::Fatal);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::QueryRejected), "QUERY_REJECTED");
    }
}
