//! Predicate Compiler
//!
//! Lowers a filter AST into a parameterized SQL fragment:
//!
//! - [`AliasManager`] assigns table aliases and de-duplicates join paths
//! - [`PredicateCompiler`] walks the filter and emits SQL through [`SqlBuilder`]
//! - [`SqlDialect`] owns spatial syntax and case folding
//! - [`ProcedureCatalog`] answers spatial filters on procedure locations
//! - [`QueryCompiler`] compiles filter, projection and sort in one alias scope
//!
//! No value is ever interpolated into SQL text; every literal becomes a `?`
//! and an entry in the parameter list, in textual order.

mod alias;
pub mod coerce;
#[allow(clippy::module_inception)]
mod compiler;
mod dialect;
mod fragment;
pub mod like;
mod procedures;
mod query;

pub use alias::{AliasManager, ColumnRef, JoinClause};
pub use compiler::PredicateCompiler;
pub use dialect::{
    DialectKind, PostGisDialect, SqlDialect, SqliteDialect, SQLITE_BBOX_FUNCTION,
    SQLITE_DWITHIN_FUNCTION,
};
pub use fragment::{count_placeholders, verify_parity, CompiledPredicate, SqlBuilder};
pub use procedures::{Procedure, ProcedureCatalog};
pub use query::{QueryCompiler, QuerySpec};
