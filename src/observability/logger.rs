//! Structured JSON logger
//!
//! - One log line = one event
//! - `event` first, then `severity`, then fields sorted by key
//! - Synchronous, no buffering
//! - Lines below the process-wide minimum severity are dropped
//! - `ERROR` and `FATAL` go to stderr, everything else to stdout

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-statement detail
    Trace = 0,
    Info = 1,
    /// Rejected requests, recoverable issues
    Warn = 2,
    /// Execution failures
    Error = 3,
    /// Invariant violations
    Fatal = 4,
}

const LEVELS: [Severity; 5] = [
    Severity::Trace,
    Severity::Info,
    Severity::Warn,
    Severity::Error,
    Severity::Fatal,
];

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Case-insensitive level name, as found in configuration
    pub fn parse(name: &str) -> Option<Severity> {
        LEVELS
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(name.trim()))
    }

    fn goes_to_stderr(&self) -> bool {
        *self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

pub struct Logger;

impl Logger {
    /// Sets the lowest severity that is written
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> Severity {
        let raw = MIN_SEVERITY.load(Ordering::Relaxed) as usize;
        LEVELS[raw.min(LEVELS.len() - 1)]
    }

    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    /// Writes one line to the stream matching `severity`
    pub fn emit(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        let line = render_line(severity, event, fields);
        // a failing sink never fails the query
        let _ = if severity.goes_to_stderr() {
            write_line(&mut io::stderr().lock(), &line)
        } else {
            write_line(&mut io::stdout().lock(), &line)
        };
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.flush()
}

fn push_json_str(output: &mut String, value: &str) {
    match serde_json::to_string(value) {
        Ok(quoted) => output.push_str(&quoted),
        Err(_) => output.push_str("\"\""),
    }
}

/// Renders one newline-terminated JSON object
pub(crate) fn render_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let mut output = String::with_capacity(128);
    output.push_str("{\"event\":");
    push_json_str(&mut output, event);
    output.push_str(",\"severity\":");
    push_json_str(&mut output, severity.as_str());

    for (key, value) in sorted {
        output.push(',');
        push_json_str(&mut output, key);
        output.push(':');
        push_json_str(&mut output, value);
    }
    output.push_str("}\n");
    output
}
