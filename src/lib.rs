//! deegree-sql - filter-to-SQL query translation for the deegree stores
//!
//! Compiles an abstract filter tree against a property mapping into
//! parameterized SQL, assembles count and rows statements from one
//! compilation, and executes them on pooled connections.

pub mod assembler;
pub mod compiler;
pub mod errors;
pub mod executor;
pub mod filter;
pub mod mapping;
pub mod observability;
pub mod store;

pub use errors::{QueryError, QueryResult};
