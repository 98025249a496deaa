//! Core engines and shared types for DocBridge.
//!
//! This crate implements both translation directions between a structural
//! schema model and a live MongoDB-compatible document store:
//! reverse engineering (sample documents, infer a structural schema,
//! translate native indexes into model descriptors) and forward engineering
//! (render a model into an executable script, optionally apply it through an
//! abstract document source).
//!
//! # Architecture
//! - Closed [`value::DocumentValue`] variants instead of runtime type probing
//! - Typed [`script::Statement`] parsing instead of dynamic script evaluation
//! - The [`source::DocumentSource`] trait decouples every engine from the
//!   driver, so tests run against an in-memory source

pub mod codec;
pub mod error;
pub mod index;
pub mod infer;
pub mod logging;
pub mod model;
pub mod sampling;
pub mod script;
pub mod source;
pub mod value;

// Re-export commonly used types
pub use error::{DocBridgeError, ErrorReport, Result, redact_database_url};
pub use index::{
    ClassifiedIndexes, IndexDescriptor, IndexDirection, IndexKey, IndexKind, TtlConfig,
    UniqueKeyGroup,
};
pub use infer::{SchemaInferencer, StructuralSchema, infer_documents};
pub use logging::{LogProgress, ProgressReporter, init_logging};
pub use model::{BucketInfo, CollectionPackage, ContainerModel, EntityModel, ModelFile, ModelInfo};
pub use sampling::{SamplingConfig, SamplingMode, sample_size};
pub use script::{GenerateOptions, ScriptOrigin, ScriptOutput, apply_script, generate, parse_script};
pub use source::{DocumentSource, SampleOptions, SourceError};
pub use value::{DocumentValue, TypeTag};
