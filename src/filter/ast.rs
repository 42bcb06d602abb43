//! Filter AST
//!
//! An immutable tree built by the protocol-request parser. The compiler matches
//! on it exhaustively, so a new operator is a compile error wherever it is not
//! yet handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value::{Envelope, Point, ScalarValue};

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    /// SQL operator token
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
        }
    }

    /// The operator that keeps the meaning when both operands swap sides
    pub fn mirrored(&self) -> Self {
        match self {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Lte => ComparisonOp::Gte,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Gte => ComparisonOp::Lte,
            other => *other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Distance-based spatial operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceOp {
    /// Within the given distance
    DWithin,
    /// Farther than the given distance
    Beyond,
}

/// Operand of a comparison, between or like
///
/// Only `Literal` and `Property` can be compiled. The other kinds exist
/// because the request parser can produce them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(ScalarValue),
    Property(String),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn literal(value: impl Into<ScalarValue>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn property(name: impl Into<String>) -> Self {
        Expr::Property(name.into())
    }

    /// Short description for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::Property(_) => "property reference",
            Expr::Arithmetic { .. } => "arithmetic expression",
            Expr::Function { .. } => "function call",
        }
    }
}

/// Pattern syntax of a `Like` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikeOptions {
    /// Matches any sequence of characters
    pub wild_card: char,
    /// Matches exactly one character
    pub single_char: char,
    /// Makes the next character literal
    pub escape_char: char,
    pub match_case: bool,
}

impl Default for LikeOptions {
    fn default() -> Self {
        Self {
            wild_card: '%',
            single_char: '_',
            escape_char: '\\',
            match_case: true,
        }
    }
}

impl LikeOptions {
    /// OGC filter style wildcards: `*`, `#`, `!`
    pub fn ogc() -> Self {
        Self {
            wild_card: '*',
            single_char: '#',
            escape_char: '!',
            match_case: true,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.match_case = false;
        self
    }
}

/// A time window over the configured time property
///
/// A missing bound leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalRange {
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub inclusive_begin: bool,
    pub inclusive_end: bool,
}

impl TemporalRange {
    /// `[begin, end]`
    pub fn closed(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
            inclusive_begin: true,
            inclusive_end: true,
        }
    }

    /// `[begin, end)`
    pub fn half_open(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
            inclusive_begin: true,
            inclusive_end: false,
        }
    }

    /// Everything at or after `begin`
    pub fn since(begin: DateTime<Utc>) -> Self {
        Self {
            begin: Some(begin),
            end: None,
            inclusive_begin: true,
            inclusive_end: false,
        }
    }

    /// Everything strictly before `end`
    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            begin: None,
            end: Some(end),
            inclusive_begin: false,
            inclusive_end: false,
        }
    }
}

/// A filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpression {
    /// Matches every row
    Include,
    /// Matches no row
    Exclude,
    Comparison {
        op: ComparisonOp,
        left: Expr,
        right: Expr,
    },
    Between {
        property: String,
        lower: Expr,
        upper: Expr,
    },
    IsNull {
        property: String,
    },
    IsNotNull {
        property: String,
    },
    Like {
        property: String,
        pattern: Expr,
        #[serde(default)]
        options: LikeOptions,
    },
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    Not(Box<FilterExpression>),
    TemporalRange(TemporalRange),
    TemporalInstant(DateTime<Utc>),
    SpatialBBox {
        property: String,
        envelope: Envelope,
    },
    SpatialDistance {
        op: DistanceOp,
        property: String,
        center: Point,
        distance: f64,
    },
    /// Equality against the configured procedure column
    ProcedureRef(String),
}

impl FilterExpression {
    pub fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Self {
        FilterExpression::Comparison { op, left, right }
    }

    /// `property = value`
    pub fn eq(property: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(ComparisonOp::Eq, Expr::property(property), Expr::literal(value))
    }

    pub fn neq(property: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(ComparisonOp::Neq, Expr::property(property), Expr::literal(value))
    }

    pub fn lt(property: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(ComparisonOp::Lt, Expr::property(property), Expr::literal(value))
    }

    pub fn lte(property: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(ComparisonOp::Lte, Expr::property(property), Expr::literal(value))
    }

    pub fn gt(property: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(ComparisonOp::Gt, Expr::property(property), Expr::literal(value))
    }

    pub fn gte(property: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(ComparisonOp::Gte, Expr::property(property), Expr::literal(value))
    }

    /// `lower <= property <= upper` with literal bounds
    pub fn between(
        property: impl Into<String>,
        lower: impl Into<ScalarValue>,
        upper: impl Into<ScalarValue>,
    ) -> Self {
        FilterExpression::Between {
            property: property.into(),
            lower: Expr::literal(lower),
            upper: Expr::literal(upper),
        }
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        FilterExpression::IsNull {
            property: property.into(),
        }
    }

    pub fn is_not_null(property: impl Into<String>) -> Self {
        FilterExpression::IsNotNull {
            property: property.into(),
        }
    }

    /// SQL-style pattern (`%`, `_`, `\`)
    pub fn like(property: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::like_with(property, pattern, LikeOptions::default())
    }

    pub fn like_with(
        property: impl Into<String>,
        pattern: impl Into<String>,
        options: LikeOptions,
    ) -> Self {
        FilterExpression::Like {
            property: property.into(),
            pattern: Expr::literal(pattern.into()),
            options,
        }
    }

    pub fn and(children: Vec<FilterExpression>) -> Self {
        FilterExpression::And(children)
    }

    pub fn or(children: Vec<FilterExpression>) -> Self {
        FilterExpression::Or(children)
    }

    pub fn not(child: FilterExpression) -> Self {
        FilterExpression::Not(Box::new(child))
    }

    pub fn during(range: TemporalRange) -> Self {
        FilterExpression::TemporalRange(range)
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        FilterExpression::TemporalInstant(instant)
    }

    pub fn bbox(property: impl Into<String>, envelope: Envelope) -> Self {
        FilterExpression::SpatialBBox {
            property: property.into(),
            envelope,
        }
    }

    pub fn dwithin(property: impl Into<String>, center: Point, distance: f64) -> Self {
        FilterExpression::SpatialDistance {
            op: DistanceOp::DWithin,
            property: property.into(),
            center,
            distance,
        }
    }

    pub fn beyond(property: impl Into<String>, center: Point, distance: f64) -> Self {
        FilterExpression::SpatialDistance {
            op: DistanceOp::Beyond,
            property: property.into(),
            center,
            distance,
        }
    }

    pub fn procedure(identifier: impl Into<String>) -> Self {
        FilterExpression::ProcedureRef(identifier.into())
    }

    /// Conjunction of the given filters, collapsing trivial cases.
    ///
    /// Returns `None` for an empty list (no constraint).
    pub fn all_of(mut filters: Vec<FilterExpression>) -> Option<Self> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(FilterExpression::And(filters)),
        }
    }

    /// Disjunction of alternative filters, collapsing trivial cases.
    ///
    /// Returns `None` for an empty list (no alternatives given, so no constraint).
    pub fn any_of(mut filters: Vec<FilterExpression>) -> Option<Self> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(FilterExpression::Or(filters)),
        }
    }

    /// Operator name for logs and error messages
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterExpression::Include => "include",
            FilterExpression::Exclude => "exclude",
            FilterExpression::Comparison { .. } => "comparison",
            FilterExpression::Between { .. } => "between",
            FilterExpression::IsNull { .. } => "is_null",
            FilterExpression::IsNotNull { .. } => "is_not_null",
            FilterExpression::Like { .. } => "like",
            FilterExpression::And(_) => "and",
            FilterExpression::Or(_) => "or",
            FilterExpression::Not(_) => "not",
            FilterExpression::TemporalRange(_) => "temporal_range",
            FilterExpression::TemporalInstant(_) => "temporal_instant",
            FilterExpression::SpatialBBox { .. } => "bbox",
            FilterExpression::SpatialDistance { op: DistanceOp::DWithin, .. } => "dwithin",
            FilterExpression::SpatialDistance { op: DistanceOp::Beyond, .. } => "beyond",
            FilterExpression::ProcedureRef(_) => "procedure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirrored_operators() {
        assert_eq!(ComparisonOp::Lt.mirrored(), ComparisonOp::Gt);
        assert_eq!(ComparisonOp::Gte.mirrored(), ComparisonOp::Lte);
        assert_eq!(ComparisonOp::Eq.mirrored(), ComparisonOp::Eq);
        assert_eq!(ComparisonOp::Neq.mirrored(), ComparisonOp::Neq);
    }

    #[test]
    fn test_neq_renders_angle_brackets() {
        assert_eq!(ComparisonOp::Neq.as_sql(), "<>");
    }

    #[test]
    fn test_all_of_collapses() {
        assert_eq!(FilterExpression::all_of(vec![]), None);

        let single = FilterExpression::eq("title", "Bonn");
        assert_eq!(
            FilterExpression::all_of(vec![single.clone()]),
            Some(single.clone())
        );

        let both = FilterExpression::all_of(vec![single.clone(), single.clone()]);
        assert!(matches!(both, Some(FilterExpression::And(ref c)) if c.len() == 2));
    }

    #[test]
    fn test_any_of_builds_or() {
        let a = FilterExpression::procedure("a");
        let b = FilterExpression::procedure("b");
        assert!(matches!(
            FilterExpression::any_of(vec![a, b]),
            Some(FilterExpression::Or(_))
        ));
    }

    #[test]
    fn test_filter_deserializes_from_json() {
        let json = r#"{"comparison":{"op":"eq","left":{"property":"title"},"right":{"literal":{"text":"Bonn"}}}}"#;
        let parsed: FilterExpression = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, FilterExpression::eq("title", "Bonn"));
    }

    #[test]
    fn test_like_options_default_to_sql_wildcards() {
        let opts = LikeOptions::default();
        assert_eq!(opts.wild_card, '%');
        assert_eq!(opts.single_char, '_');
        assert!(opts.match_case);
        assert!(!LikeOptions::ogc().case_insensitive().match_case);
    }
}
