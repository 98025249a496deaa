//! Abstract document source consumed by the sampling workflow and the
//! script apply engine.
//!
//! Decouples the core engines from any specific driver: the collector wires
//! in a live MongoDB-compatible adapter, tests wire in an in-memory one.

use async_trait::async_trait;
use mongodb::bson::Document;
use thiserror::Error;

/// Errors surfaced by a document source, already classified so callers can
/// apply the propagation policy without driver knowledge.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Fatal to the whole operation, no retry
    #[error("{0}")]
    Connection(String),

    /// Per-collection: the collection is skipped, other work continues
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Index or collection already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Server-side time bound exceeded
    #[error("Operation exceeded the time limit: {0}")]
    Timeout(String),

    /// Operation interrupted on the server
    #[error("Operation was interrupted: {0}")]
    Interrupted(String),

    /// Any other query failure
    #[error("{0}")]
    Query(String),
}

impl SourceError {
    /// Conflicts that the apply engine treats as success.
    pub fn is_idempotent_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Options for one bounded random-sample fetch.
#[derive(Debug, Clone, Default)]
pub struct SampleOptions {
    pub limit: u64,
    pub query: Option<Document>,
    pub sort: Option<Document>,
    /// Server-side execution bound, the only timeout primitive
    pub max_time_ms: Option<u64>,
}

/// Operations the core needs from a live document store.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Lists database names visible to the connection.
    async fn list_databases(&self) -> Result<Vec<String>, SourceError>;

    /// Lists collection names inside one database.
    async fn list_collections(&self, db: &str) -> Result<Vec<String>, SourceError>;

    /// Counts documents in a collection.
    async fn count(&self, db: &str, collection: &str) -> Result<u64, SourceError>;

    /// Streams a bounded random sample of documents.
    async fn sample_random(
        &self,
        db: &str,
        collection: &str,
        options: &SampleOptions,
    ) -> Result<Vec<Document>, SourceError>;

    /// Fetches a single document matching the query.
    async fn find_one(
        &self,
        db: &str,
        collection: &str,
        query: Document,
    ) -> Result<Option<Document>, SourceError>;

    /// Lists native index definitions for a collection.
    async fn list_indexes(&self, db: &str, collection: &str)
    -> Result<Vec<Document>, SourceError>;

    /// Creates a collection.
    async fn create_collection(&self, db: &str, collection: &str) -> Result<(), SourceError>;

    /// Creates an index from a key document plus options.
    async fn create_index(
        &self,
        db: &str,
        collection: &str,
        keys: Document,
        options: Document,
    ) -> Result<(), SourceError>;

    /// Inserts one document.
    async fn insert_one(
        &self,
        db: &str,
        collection: &str,
        document: Document,
    ) -> Result<(), SourceError>;

    /// Runs a raw database command against the given database.
    async fn run_command(&self, db: &str, command: Document) -> Result<Document, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotent_conflict_classification() {
        assert!(SourceError::AlreadyExists("index ttl".to_string()).is_idempotent_conflict());
        assert!(!SourceError::Timeout("count".to_string()).is_idempotent_conflict());
        assert!(!SourceError::Query("boom".to_string()).is_idempotent_conflict());
    }
}
