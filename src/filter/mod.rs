//! Filter AST consumed by the predicate compiler
//!
//! The tree is built externally (by the protocol-request parser) and is never
//! mutated by compilation. It references abstract property names only; the
//! [`crate::mapping::PropertyMapping`] decides where they live.

mod ast;
mod value;

pub use ast::{
    ArithmeticOp, ComparisonOp, DistanceOp, Expr, FilterExpression, LikeOptions, TemporalRange,
};
pub use value::{Envelope, Point, ScalarValue};
