//! Typed scalar values and spatial envelopes carried by filter literals

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};

/// A typed scalar literal
///
/// Values are bound as statement parameters and never rendered into SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl ScalarValue {
    /// Name of the value kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Bool(_) => "boolean",
            ScalarValue::Integer(_) => "integer",
            ScalarValue::Float(_) => "float",
            ScalarValue::Text(_) => "text",
            ScalarValue::Timestamp(_) => "timestamp",
            ScalarValue::Bytes(_) => "bytes",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Canonical text form of a timestamp as stored and bound: RFC 3339,
    /// millisecond precision, `Z` suffix. Text ordering matches time ordering.
    pub fn timestamp_text(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Integer(i) => write!(f, "{}", i),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Text(s) => write!(f, "{}", s),
            ScalarValue::Timestamp(ts) => write!(f, "{}", ScalarValue::timestamp_text(ts)),
            ScalarValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Text(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Integer(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Integer(value as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for ScalarValue {
    fn from(value: DateTime<Utc>) -> Self {
        ScalarValue::Timestamp(value)
    }
}

/// A 2D point with its spatial reference system identifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub srid: i32,
}

impl Point {
    pub fn new(x: f64, y: f64, srid: i32) -> Self {
        Self { x, y, srid }
    }

    /// Planar distance, in the units of the reference system
    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub srid: i32,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, srid: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            srid,
        }
    }

    /// Rejects non-finite coordinates and inverted corners
    pub fn validate(&self) -> QueryResult<()> {
        let coords = [self.min_x, self.min_y, self.max_x, self.max_y];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(QueryError::InvalidEnvelope(format!(
                "non-finite coordinate in {}",
                self
            )));
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(QueryError::InvalidEnvelope(format!(
                "lower corner exceeds upper corner in {}",
                self
            )));
        }
        Ok(())
    }

    /// Boundary-inclusive containment test
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Shortest planar distance from `point` to this box (0 when inside)
    pub fn distance_to(&self, point: &Point) -> f64 {
        let dx = (self.min_x - point.x).max(0.0).max(point.x - self.max_x);
        let dy = (self.min_y - point.y).max(0.0).max(point.y - self.max_y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Degenerate envelope covering a single point
    pub fn from_point(point: &Point) -> Self {
        Self::new(point.x, point.y, point.x, point.y, point.srid)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BOX({} {}, {} {}; srid={})",
            self.min_x, self.min_y, self.max_x, self.max_y, self.srid
        )
    }
}
