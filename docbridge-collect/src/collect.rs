//! Collection sampling workflow.
//!
//! For each collection: count, compute the sample size, fetch the sample in
//! bounded batches, strip underscore-prefixed top-level fields, infer the
//! structural schema, and classify native indexes into bucket settings.
//! Failures are isolated per collection: one bad collection never aborts
//! the others.

use mongodb::bson::{Document, doc};
use serde_json::Value;

use docbridge_core::error::{DocBridgeError, Result};
use docbridge_core::index::{TtlConfig, classify_native};
use docbridge_core::infer::infer_documents;
use docbridge_core::logging::ProgressReporter;
use docbridge_core::model::{BucketInfo, CollectionPackage};
use docbridge_core::sampling::{
    SamplingConfig, batch_limits, extract_foreign_key_candidates, sample_size,
};
use docbridge_core::source::{DocumentSource, SampleOptions, SourceError};
use docbridge_core::value::DocumentValue;

/// Sample bound used during schema inference.
const INFER_SAMPLE_LIMIT: usize = 20;

/// Options governing one collection run.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Keep `system.*` collections instead of filtering them
    pub include_system: bool,
    /// Emit packages for collections with no documents
    pub include_empty: bool,
    pub sampling: SamplingConfig,
    /// Server-side bound passed through to each sampling call
    pub max_time_ms: Option<u64>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            include_system: false,
            include_empty: false,
            sampling: SamplingConfig::default(),
            max_time_ms: None,
        }
    }
}

/// Samples every collection of one database into model packages.
pub async fn collect_database(
    source: &dyn DocumentSource,
    db: &str,
    options: &CollectOptions,
    progress: &dyn ProgressReporter,
) -> Result<Vec<CollectionPackage>> {
    let collections = source
        .list_collections(db)
        .await
        .map_err(|error| connection_error(db, error))?;

    let mut packages = Vec::new();

    for collection in collections {
        if !options.include_system && is_system_collection(&collection) {
            continue;
        }

        match collect_collection(source, db, &collection, options, progress).await {
            Ok(Some(package)) => packages.push(package),
            Ok(None) => {}
            Err(error) => {
                // Isolated per collection: log, report, move on
                progress.progress(
                    &format!("Error of getting collection data: {error}"),
                    db,
                    &collection,
                );
                tracing::error!(db, collection, error = %error, "collection skipped");
            }
        }
    }

    Ok(packages)
}

async fn collect_collection(
    source: &dyn DocumentSource,
    db: &str,
    collection: &str,
    options: &CollectOptions,
    progress: &dyn ProgressReporter,
) -> Result<Option<CollectionPackage>> {
    progress.progress("Loading collection data", db, collection);

    let bucket_info = load_bucket_info(source, db, collection).await?;

    progress.progress("Collection data has loaded", db, collection);
    progress.progress("Loading documents...", db, collection);

    let total = source
        .count(db, collection)
        .await
        .map_err(|error| sampling_error(db, collection, error))?;

    if total == 0 {
        if !options.include_empty {
            return Ok(None);
        }
        return Ok(Some(CollectionPackage {
            db_name: db.to_string(),
            collection_name: collection.to_string(),
            bucket_info,
            empty_bucket: true,
            ..CollectionPackage::default()
        }));
    }

    let size = sample_size(total, &options.sampling);
    let mut raw = Vec::with_capacity(size as usize);
    for limit in batch_limits(size) {
        let batch = source
            .sample_random(
                db,
                collection,
                &SampleOptions {
                    limit,
                    query: None,
                    sort: None,
                    max_time_ms: options.max_time_ms,
                },
            )
            .await
            .map_err(|error| sampling_error(db, collection, error))?;
        raw.extend(batch);
    }

    progress.progress("Documents have loaded", db, collection);

    let values: Vec<DocumentValue> = raw
        .iter()
        .map(|document| DocumentValue::from_document(&strip_private_fields(document)))
        .collect();

    let schema = infer_documents(&values, INFER_SAMPLE_LIMIT);
    let documents: Vec<Value> = values.iter().map(DocumentValue::to_display_json).collect();
    let json_shape = values.first().and_then(DocumentValue::json_shape);
    let relationship_candidates: Vec<Value> = extract_foreign_key_candidates(&values)
        .iter()
        .map(DocumentValue::to_display_json)
        .collect();

    Ok(Some(CollectionPackage {
        db_name: db.to_string(),
        collection_name: collection.to_string(),
        documents,
        json_shape,
        structural_schema: schema.to_json_schema(),
        bucket_info,
        relationship_candidates,
        empty_bucket: false,
    }))
}

/// Reads the shard key and classifies native indexes into bucket settings.
/// The shard-key lookup is a Cosmos-specific custom action and is tolerated
/// on failure.
async fn load_bucket_info(
    source: &dyn DocumentSource,
    db: &str,
    collection: &str,
) -> Result<BucketInfo> {
    let shard_key = match source
        .run_command(
            db,
            doc! { "customAction": "GetCollection", "collection": collection },
        )
        .await
    {
        Ok(result) => result
            .get_document("shardKeyDefinition")
            .ok()
            .and_then(|definition| definition.keys().next().cloned())
            .unwrap_or_default(),
        Err(error) => {
            tracing::debug!(db, collection, error = %error, "shard key lookup unsupported");
            String::new()
        }
    };

    let native = source
        .list_indexes(db, collection)
        .await
        .map_err(|error| sampling_error(db, collection, error))?;
    let classified = classify_native(&native, &shard_key);

    Ok(BucketInfo {
        db_id: db.to_string(),
        shard_key,
        unique_keys: classified.unique_keys,
        indexes: classified.indexes,
        ttl: classified.ttl.unwrap_or(TtlConfig::Off),
    })
}

/// Underscore-prefixed top-level fields are internal bookkeeping and never
/// contribute to the inferred schema.
fn strip_private_fields(document: &Document) -> Document {
    document
        .iter()
        .filter(|(name, _)| !name.starts_with('_'))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn is_system_collection(name: &str) -> bool {
    name.starts_with("system.")
}

fn connection_error(db: &str, error: SourceError) -> DocBridgeError {
    DocBridgeError::connection_failed(format!("listing collections of {db}"), error)
}

/// Maps source errors onto the sampling taxonomy so timeouts and
/// interruptions carry the raise-the-timeout hint.
fn sampling_error(db: &str, collection: &str, error: SourceError) -> DocBridgeError {
    let namespace = format!("{db}.{collection}");
    match error {
        SourceError::Timeout(_) => DocBridgeError::SamplingTimeout { namespace },
        SourceError::Interrupted(_) => DocBridgeError::SamplingInterrupted { namespace },
        SourceError::PermissionDenied(_) => DocBridgeError::PermissionDenied { namespace },
        other => DocBridgeError::statement_failed(format!("sampling of {namespace} failed"), other),
    }
}
