//! Result materialization for the observation and metadata stores
//!
//! Both stores own their mapping and executor, compile each request once,
//! and build the count and rows statements from that single compilation.

mod config;
mod metadata;
mod observation;
mod xml;

pub use config::{DatabaseConfig, StoreConfig};
pub use metadata::{
    ElementSet, GetRecordsRequest, MetadataStore, RecordFormat, RecordTables, ResultType,
    SearchResults,
};
pub use observation::{
    Measurement, Observation, ObservationRequest, ObservationStore, TemporalFilter,
    DEFAULT_LOCATION_PROPERTY,
};
pub use xml::{strip_prolog, XmlFragmentCopier};
