//! Statement Assembler
//!
//! Turns a compiled query into executable SQL for one mode:
//!
//! - `Count`: `COUNT(DISTINCT id)` over the matches, no ordering or paging
//! - `Rows`: one row per matching id, ordered by the requested keys, then by
//!   id, with `LIMIT ? OFFSET ?` when paged
//!
//! Placeholder parity is verified on every assembly.

#[allow(clippy::module_inception)]
mod assembler;
mod statement;
mod types;

pub use assembler::{StatementAssembler, COUNT_COLUMN};
pub use statement::{CompiledQuery, OrderTerm, ProjectionColumn, Statement};
pub use types::{PagingSpec, QueryMode, SortDirection, SortSpec};
