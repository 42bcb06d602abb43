//! SQL dialect seam
//!
//! Everything database-specific about predicate syntax lives behind
//! [`SqlDialect`]: spatial operators, SRID embedding and case folding. The
//! compiler only decides *which* predicate to emit.

use serde::{Deserialize, Serialize};

use super::alias::ColumnRef;
use super::fragment::SqlBuilder;
use crate::filter::{Envelope, Point, ScalarValue};

/// SQLite function testing a stored geometry against a box
pub const SQLITE_BBOX_FUNCTION: &str = "bbox_intersects";

/// SQLite function testing a stored geometry against a distance from a point
pub const SQLITE_DWITHIN_FUNCTION: &str = "bbox_dwithin";

pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Emits a predicate true when `column` intersects `envelope`
    fn bbox_intersects(&self, out: &mut SqlBuilder, column: &ColumnRef, envelope: &Envelope);

    /// Emits a predicate true when `column` lies within `distance` of `center`
    fn distance_within(&self, out: &mut SqlBuilder, column: &ColumnRef, center: &Point, distance: f64);

    /// Emits `column` folded to lower case
    fn lower(&self, out: &mut SqlBuilder, column: &ColumnRef) {
        out.push_sql("LOWER(").push_column(column).push_sql(")");
    }

    /// Folds a bound pattern the way [`SqlDialect::lower`] folds the column
    fn fold_case(&self, text: &str) -> String {
        text.to_lowercase()
    }
}

/// PostgreSQL with PostGIS
#[derive(Debug, Clone, Copy, Default)]
pub struct PostGisDialect;

impl SqlDialect for PostGisDialect {
    fn name(&self) -> &'static str {
        "postgis"
    }

    fn bbox_intersects(&self, out: &mut SqlBuilder, column: &ColumnRef, envelope: &Envelope) {
        out.push_column(column)
            .push_sql(" && ST_SetSRID(ST_MakeBox2D(ST_Point(")
            .push_bind(ScalarValue::Float(envelope.min_x))
            .push_sql(", ")
            .push_bind(ScalarValue::Float(envelope.min_y))
            .push_sql("), ST_Point(")
            .push_bind(ScalarValue::Float(envelope.max_x))
            .push_sql(", ")
            .push_bind(ScalarValue::Float(envelope.max_y))
            .push_sql(")), ")
            .push_bind(ScalarValue::Integer(envelope.srid as i64))
            .push_sql(")");
    }

    fn distance_within(&self, out: &mut SqlBuilder, column: &ColumnRef, center: &Point, distance: f64) {
        out.push_sql("ST_DWithin(")
            .push_column(column)
            .push_sql(", ST_SetSRID(ST_Point(")
            .push_bind(ScalarValue::Float(center.x))
            .push_sql(", ")
            .push_bind(ScalarValue::Float(center.y))
            .push_sql("), ")
            .push_bind(ScalarValue::Integer(center.srid as i64))
            .push_sql("), ")
            .push_bind(ScalarValue::Float(distance))
            .push_sql(")");
    }
}

/// SQLite with the spatial functions registered by the SQLite backend.
///
/// Geometries are stored as `"minx miny maxx maxy"` or `"x y"` text in a single
/// reference system, so SRIDs are not bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn bbox_intersects(&self, out: &mut SqlBuilder, column: &ColumnRef, envelope: &Envelope) {
        out.push_sql(SQLITE_BBOX_FUNCTION)
            .push_sql("(")
            .push_column(column)
            .push_sql(", ")
            .push_bind_list([
                ScalarValue::Float(envelope.min_x),
                ScalarValue::Float(envelope.min_y),
                ScalarValue::Float(envelope.max_x),
                ScalarValue::Float(envelope.max_y),
            ])
            .push_sql(")");
    }

    fn distance_within(&self, out: &mut SqlBuilder, column: &ColumnRef, center: &Point, distance: f64) {
        out.push_sql(SQLITE_DWITHIN_FUNCTION)
            .push_sql("(")
            .push_column(column)
            .push_sql(", ")
            .push_bind_list([
                ScalarValue::Float(center.x),
                ScalarValue::Float(center.y),
                ScalarValue::Float(distance),
            ])
            .push_sql(")");
    }

    /// SQLite's `LOWER()` only folds ASCII letters
    fn fold_case(&self, text: &str) -> String {
        text.to_ascii_lowercase()
    }
}

static POSTGIS: PostGisDialect = PostGisDialect;
static SQLITE: SqliteDialect = SqliteDialect;

/// Dialect selector used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    PostGis,
    Sqlite,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            DialectKind::PostGis => &POSTGIS,
            DialectKind::Sqlite => &SQLITE,
        }
    }
}
