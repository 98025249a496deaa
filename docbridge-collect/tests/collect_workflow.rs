//! End-to-end collection workflow: in-memory source -> collection packages
//! -> model package file -> round-trip read.

use async_trait::async_trait;
use mongodb::bson::{Document, doc, oid::ObjectId};

use docbridge_collect::collect::{CollectOptions, collect_database};
use docbridge_collect::output::{ModelPackage, write_model_package};
use docbridge_core::logging::LogProgress;
use docbridge_core::model::ModelInfo;
use docbridge_core::sampling::{SamplingConfig, SamplingMode};
use docbridge_core::source::{DocumentSource, SampleOptions, SourceError};

struct FixtureSource;

#[async_trait]
impl DocumentSource for FixtureSource {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        Ok(vec!["shop".to_string()])
    }

    async fn list_collections(&self, _db: &str) -> Result<Vec<String>, SourceError> {
        Ok(vec!["orders".to_string(), "system.views".to_string()])
    }

    async fn count(&self, _db: &str, collection: &str) -> Result<u64, SourceError> {
        Ok(if collection == "orders" { 3 } else { 1 })
    }

    async fn sample_random(
        &self,
        _db: &str,
        _collection: &str,
        options: &SampleOptions,
    ) -> Result<Vec<Document>, SourceError> {
        let docs = vec![
            doc! { "_id": ObjectId::new(), "total": 10, "state": "new" },
            doc! { "_id": ObjectId::new(), "total": 20.5 },
            doc! { "_id": ObjectId::new(), "total": 3, "state": "done" },
        ];
        Ok(docs.into_iter().take(options.limit as usize).collect())
    }

    async fn find_one(
        &self,
        _db: &str,
        _collection: &str,
        _query: Document,
    ) -> Result<Option<Document>, SourceError> {
        Ok(None)
    }

    async fn list_indexes(
        &self,
        _db: &str,
        _collection: &str,
    ) -> Result<Vec<Document>, SourceError> {
        Ok(vec![
            doc! { "name": "_id_", "key": { "_id": 1 } },
            doc! { "name": "ttl", "key": { "_ts": 1 }, "expireAfterSeconds": 3600 },
            doc! { "name": "by_state", "key": { "state": 1 } },
        ])
    }

    async fn create_collection(&self, _db: &str, _collection: &str) -> Result<(), SourceError> {
        Ok(())
    }

    async fn create_index(
        &self,
        _db: &str,
        _collection: &str,
        _keys: Document,
        _options: Document,
    ) -> Result<(), SourceError> {
        Ok(())
    }

    async fn insert_one(
        &self,
        _db: &str,
        _collection: &str,
        _document: Document,
    ) -> Result<(), SourceError> {
        Ok(())
    }

    async fn run_command(&self, _db: &str, _command: Document) -> Result<Document, SourceError> {
        Err(SourceError::Query("GetCollection unsupported".to_string()))
    }
}

fn options() -> CollectOptions {
    CollectOptions {
        sampling: SamplingConfig {
            mode: SamplingMode::Absolute,
            absolute_count: 100,
            ..SamplingConfig::default()
        },
        ..CollectOptions::default()
    }
}

#[tokio::test]
async fn collects_and_writes_a_model_package() {
    let packages = collect_database(&FixtureSource, "shop", &options(), &LogProgress)
        .await
        .unwrap();

    assert_eq!(packages.len(), 1);
    let orders = &packages[0];
    assert_eq!(orders.collection_name, "orders");

    // Presence statistics: total in 3/3, state in 2/3
    let schema = &orders.structural_schema;
    assert_eq!(schema["#docs"], 3);
    assert_eq!(schema["properties"]["total"]["%docs"], 100);
    assert_eq!(schema["properties"]["state"]["%docs"], 67);

    // Last observed value wins the type tag
    assert_eq!(schema["properties"]["total"]["type"], "numeric");

    // Native TTL index became a bucket setting, not a secondary index
    assert_eq!(orders.bucket_info.ttl, docbridge_core::index::TtlConfig::On(3600));
    assert_eq!(orders.bucket_info.indexes.len(), 1);
    assert_eq!(orders.bucket_info.indexes[0].name, "by_state");

    let package = ModelPackage::new("shop", ModelInfo::default(), packages);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    write_model_package(&package, &path).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let back: ModelPackage = serde_json::from_str(&text).unwrap();
    assert_eq!(back.collections.len(), 1);
    assert_eq!(back.collections[0].collection_name, "orders");
}
