//! Reverse-engineering collector for DocBridge.
//!
//! Connects to a live MongoDB-compatible instance through the
//! [`docbridge_core::source::DocumentSource`] abstraction, samples each
//! collection, infers structural schemas, and writes a model package file.
//! Bulk NDJSON sample files can be imported in place of a live connection.

pub mod adapters;
pub mod collect;
pub mod ndjson;
pub mod output;

pub use adapters::MongoSource;
pub use collect::{CollectOptions, collect_database};
pub use output::ModelPackage;
