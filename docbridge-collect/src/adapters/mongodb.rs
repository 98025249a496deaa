//! MongoDB-compatible document-source adapter.
//!
//! Implements [`DocumentSource`] over the `mongodb` driver. Connection
//! strings are parsed once and never logged unredacted; server errors are
//! classified into the [`SourceError`] taxonomy so the workflow and apply
//! engine stay driver-agnostic.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client,
    bson::{Bson, Document, doc},
    options::{AggregateOptions, ClientOptions, FindOptions},
};

use docbridge_core::error::redact_database_url;
use docbridge_core::model::ModelInfo;
use docbridge_core::source::{DocumentSource, SampleOptions, SourceError};

/// Server-side bound applied when the caller does not pass one.
const DEFAULT_MAX_TIME_MS: u64 = 120_000;

/// Document source backed by a live MongoDB-compatible instance.
pub struct MongoSource {
    client: Client,
    default_database: Option<String>,
}

impl MongoSource {
    /// Connects to the instance behind `url`.
    ///
    /// Retryable writes are disabled because DocumentDB rejects them; pool
    /// limits keep the sampling fan-out bounded.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Connection` when the connection string cannot
    /// be parsed or the client cannot be built. The URL is redacted in
    /// every error message.
    pub async fn connect(url: &str) -> Result<Self, SourceError> {
        let mut options = ClientOptions::parse(url).await.map_err(|e| {
            SourceError::Connection(format!(
                "failed to parse connection string {}: {e}",
                redact_database_url(url)
            ))
        })?;

        options.max_pool_size = Some(10);
        options.min_pool_size = Some(1);
        options.connect_timeout = Some(Duration::from_secs(10));
        options.retry_writes = Some(false);
        options.app_name.get_or_insert_with(|| "docbridge".to_string());

        let default_database = options.default_database.clone();

        let client = Client::with_options(options).map_err(|e| {
            SourceError::Connection(format!(
                "failed to connect to {}: {e}",
                redact_database_url(url)
            ))
        })?;

        Ok(Self {
            client,
            default_database,
        })
    }

    /// Database named in the connection string, if any.
    pub fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }

    /// Round-trips a ping to verify the connection.
    pub async fn ping(&self) -> Result<(), SourceError> {
        self.run_command("admin", doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Fetches server metadata from buildInfo.
    pub async fn server_info(&self) -> Result<ModelInfo, SourceError> {
        let info = self.run_command("admin", doc! { "buildInfo": 1 }).await?;
        let version = info
            .get_str("version")
            .unwrap_or("")
            .split('.')
            .filter_map(|part| part.parse::<i32>().ok())
            .collect();

        Ok(ModelInfo {
            version,
            api_experience: "mongodb".to_string(),
        })
    }
}

/// Classifies a driver error by server error code.
fn map_error(error: &mongodb::error::Error, context: &str) -> SourceError {
    if let mongodb::error::ErrorKind::Command(command) = error.kind.as_ref() {
        return match command.code {
            18 => SourceError::Connection(
                "Authentication failed. Please, check connection settings and try again"
                    .to_string(),
            ),
            13 => SourceError::PermissionDenied(format!("{context}: {}", command.message)),
            // 48/85/86 are namespace/index conflicts; Cosmos reports an
            // existing shard configuration as code 9
            9 | 48 | 85 | 86 => SourceError::AlreadyExists(context.to_string()),
            50 => SourceError::Timeout(format!("{context}: {}", command.message)),
            11601 => SourceError::Interrupted(format!("{context}: {}", command.message)),
            _ => SourceError::Query(format!("{context}: {}", command.message)),
        };
    }

    SourceError::Query(format!("{context}: {error}"))
}

#[async_trait]
impl DocumentSource for MongoSource {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        self.client
            .list_database_names()
            .await
            .map_err(|e| map_error(&e, "listDatabases"))
    }

    async fn list_collections(&self, db: &str) -> Result<Vec<String>, SourceError> {
        self.client
            .database(db)
            .list_collection_names()
            .await
            .map_err(|e| map_error(&e, &format!("listCollections on {db}")))
    }

    async fn count(&self, db: &str, collection: &str) -> Result<u64, SourceError> {
        self.client
            .database(db)
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .map_err(|e| map_error(&e, &format!("count on {db}.{collection}")))
    }

    async fn sample_random(
        &self,
        db: &str,
        collection: &str,
        options: &SampleOptions,
    ) -> Result<Vec<Document>, SourceError> {
        let handle = self
            .client
            .database(db)
            .collection::<Document>(collection);
        let context = format!("sampling of {db}.{collection}");
        let max_time =
            Duration::from_millis(options.max_time_ms.unwrap_or(DEFAULT_MAX_TIME_MS));

        // A sort request forces a plain bounded find; otherwise the server
        // picks a random sample
        if let Some(sort) = options.sort.clone().filter(|sort| !sort.is_empty()) {
            let find_options = FindOptions::builder()
                .sort(sort)
                .limit(options.limit as i64)
                .max_time(max_time)
                .build();
            let cursor = handle
                .find(options.query.clone().unwrap_or_default())
                .with_options(find_options)
                .await
                .map_err(|e| map_error(&e, &context))?;

            return cursor.try_collect().await.map_err(|e| map_error(&e, &context));
        }

        let mut pipeline = Vec::new();
        if let Some(query) = options.query.clone().filter(|query| !query.is_empty()) {
            pipeline.push(doc! { "$match": query });
        }
        pipeline.push(doc! { "$sample": { "size": options.limit as i64 } });

        let aggregate_options = AggregateOptions::builder().max_time(max_time).build();
        let cursor = handle
            .aggregate(pipeline)
            .with_options(aggregate_options)
            .await
            .map_err(|e| map_error(&e, &context))?;

        cursor.try_collect().await.map_err(|e| map_error(&e, &context))
    }

    async fn find_one(
        &self,
        db: &str,
        collection: &str,
        query: Document,
    ) -> Result<Option<Document>, SourceError> {
        self.client
            .database(db)
            .collection::<Document>(collection)
            .find_one(query)
            .await
            .map_err(|e| map_error(&e, &format!("findOne on {db}.{collection}")))
    }

    async fn list_indexes(
        &self,
        db: &str,
        collection: &str,
    ) -> Result<Vec<Document>, SourceError> {
        let result = self
            .run_command(db, doc! { "listIndexes": collection })
            .await?;

        let batch = result
            .get_document("cursor")
            .and_then(|cursor| cursor.get_array("firstBatch"))
            .cloned()
            .unwrap_or_default();

        Ok(batch
            .into_iter()
            .filter_map(|item| match item {
                Bson::Document(index) => Some(index),
                _ => None,
            })
            .collect())
    }

    async fn create_collection(&self, db: &str, collection: &str) -> Result<(), SourceError> {
        self.client
            .database(db)
            .create_collection(collection)
            .await
            .map_err(|e| map_error(&e, &format!("createCollection {collection}")))
    }

    async fn create_index(
        &self,
        db: &str,
        collection: &str,
        keys: Document,
        options: Document,
    ) -> Result<(), SourceError> {
        let name = options
            .get_str("name")
            .map(str::to_string)
            .unwrap_or_else(|_| default_index_name(&keys));

        let mut index = doc! { "key": keys, "name": name };
        for (key, value) in options {
            if key != "name" {
                index.insert(key, value);
            }
        }

        self.run_command(
            db,
            doc! { "createIndexes": collection, "indexes": [index] },
        )
        .await?;

        Ok(())
    }

    async fn insert_one(
        &self,
        db: &str,
        collection: &str,
        document: Document,
    ) -> Result<(), SourceError> {
        self.client
            .database(db)
            .collection::<Document>(collection)
            .insert_one(document)
            .await
            .map(|_| ())
            .map_err(|e| map_error(&e, &format!("insert into {db}.{collection}")))
    }

    async fn run_command(&self, db: &str, command: Document) -> Result<Document, SourceError> {
        let context = command
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or("command")
            .to_string();

        self.client
            .database(db)
            .run_command(command)
            .await
            .map_err(|e| map_error(&e, &context))
    }
}

/// Server-style generated index name: field and direction pairs joined
/// with underscores.
fn default_index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, direction)| {
            let direction = match direction {
                Bson::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{field}_{direction}")
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_name() {
        assert_eq!(default_index_name(&doc! { "age": 1 }), "age_1");
        assert_eq!(
            default_index_name(&doc! { "a": 1, "b": -1 }),
            "a_1_b_-1"
        );
        assert_eq!(
            default_index_name(&doc! { "loc": "2dsphere" }),
            "loc_2dsphere"
        );
    }
}
