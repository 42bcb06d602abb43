//! Property mapping: abstract property names to physical columns
//!
//! A mapping is configuration. It is loaded once when a store opens, validated,
//! and then shared read-only by every compilation. There is no process-wide
//! registry; each store owns its own mapping value.

mod errors;
mod loader;
pub mod presets;
mod types;

pub use errors::{MappingError, MappingResult};
pub(crate) use loader::check_identifier;
pub use types::{
    Join, MappedProperty, MappingBuilder, MappingDocument, PropertyMapping, RootTable, ValueType,
};
