//! Model types shared by both translation directions.
//!
//! [`ModelFile`] is the forward-engineering input: one container plus its
//! entities, deserialized from the modeling tool's JSON export.
//! [`CollectionPackage`] is the reverse-engineering output for one
//! collection: adjusted sample documents, inferred schemas, and the bucket
//! (database-level) settings recovered from the live instance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::{IndexDescriptor, TtlConfig, UniqueKeyGroup};

/// Database-level settings of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerModel {
    /// Working database name (`use <dbId>;` in the generated script)
    #[serde(rename = "dbId")]
    pub db_id: String,
    /// Shard key field, if the container is sharded
    #[serde(rename = "shardKey", default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<String>,
    #[serde(flatten)]
    pub ttl: TtlConfig,
    /// Field injected into every inserted sample to mark its entity, when
    /// the model distinguishes document kinds inside one collection
    #[serde(
        rename = "docTypeName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub doc_type_field: Option<String>,
}

/// Collection-level settings of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityModel {
    #[serde(rename = "collectionName")]
    pub name: String,
    /// Deactivated entities are still emitted, wrapped in a comment block
    #[serde(rename = "isActivated", default = "activated_default")]
    pub is_activated: bool,
    #[serde(rename = "uniqueKey", default)]
    pub unique_keys: Vec<UniqueKeyGroup>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Sample documents in codec-encoded JSON form
    #[serde(default)]
    pub samples: Vec<Value>,
}

fn activated_default() -> bool {
    true
}

/// Forward-engineering input: a container and its entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub container: ContainerModel,
    pub entities: Vec<EntityModel>,
}

/// Database-level settings recovered from a live instance during reverse
/// engineering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketInfo {
    #[serde(rename = "dbId")]
    pub db_id: String,
    #[serde(rename = "shardKey", default)]
    pub shard_key: String,
    #[serde(rename = "uniqueKey", default)]
    pub unique_keys: Vec<UniqueKeyGroup>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(flatten)]
    pub ttl: TtlConfig,
}

/// Reverse-engineering output for one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPackage {
    #[serde(rename = "dbName")]
    pub db_name: String,
    #[serde(rename = "collectionName")]
    pub collection_name: String,
    /// Display-adjusted sample documents
    #[serde(default)]
    pub documents: Vec<Value>,
    /// Single-document JSON shape of the first sample, when present
    #[serde(
        rename = "jsonSchema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub json_shape: Option<Value>,
    /// Structural schema inferred over the whole sample
    #[serde(rename = "structuralSchema", default)]
    pub structural_schema: Value,
    #[serde(rename = "bucketInfo", default)]
    pub bucket_info: BucketInfo,
    /// Pruned object-id fragments used for relationship hinting
    #[serde(
        rename = "relationshipCandidates",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub relationship_candidates: Vec<Value>,
    #[serde(rename = "emptyBucket", default)]
    pub empty_bucket: bool,
}

/// Target-instance metadata attached to a collected model package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Server version triple reported by buildInfo
    #[serde(default)]
    pub version: Vec<i32>,
    /// Which MongoDB-compatible API the instance speaks
    #[serde(rename = "apiExperience", default)]
    pub api_experience: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_file_round_trip() {
        let model = ModelFile {
            container: ContainerModel {
                db_id: "shop".to_string(),
                shard_key: Some("tenantId".to_string()),
                ttl: TtlConfig::On(3600),
                doc_type_field: None,
            },
            entities: vec![EntityModel {
                name: "orders".to_string(),
                is_activated: true,
                unique_keys: vec![UniqueKeyGroup {
                    fields: vec!["email".to_string()],
                }],
                indexes: vec![],
                samples: vec![json!({"a": 1})],
            }],
        };

        let text = serde_json::to_string(&model).unwrap();
        let back: ModelFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_entity_defaults() {
        let entity: EntityModel =
            serde_json::from_value(json!({ "collectionName": "users" })).unwrap();

        assert!(entity.is_activated);
        assert!(entity.unique_keys.is_empty());
        assert!(entity.indexes.is_empty());
        assert!(entity.samples.is_empty());
    }

    #[test]
    fn test_ttl_serialization_shape() {
        let container = ContainerModel {
            db_id: "shop".to_string(),
            shard_key: None,
            ttl: TtlConfig::OnNoDefault,
            doc_type_field: None,
        };

        let value = serde_json::to_value(&container).unwrap();
        assert_eq!(value["TTL"], json!("On (no default)"));

        let off: ContainerModel = serde_json::from_value(json!({
            "dbId": "shop",
            "TTL": "Off",
        }))
        .unwrap();
        assert_eq!(off.ttl, TtlConfig::Off);
    }
}
