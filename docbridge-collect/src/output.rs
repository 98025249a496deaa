//! Model package output.
//!
//! A model package bundles the collected collection packages with instance
//! metadata and collection-run bookkeeping, serialized as pretty JSON.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docbridge_core::error::{DocBridgeError, Result};
use docbridge_core::model::{CollectionPackage, ModelInfo};

/// Everything one collection run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPackage {
    pub database: String,
    #[serde(rename = "modelInfo")]
    pub model_info: ModelInfo,
    pub collections: Vec<CollectionPackage>,
    #[serde(rename = "collectedAt")]
    pub collected_at: DateTime<Utc>,
    #[serde(rename = "toolVersion")]
    pub tool_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ModelPackage {
    /// Assembles a package stamped with the current time and tool version.
    pub fn new(
        database: impl Into<String>,
        model_info: ModelInfo,
        collections: Vec<CollectionPackage>,
    ) -> Self {
        Self {
            database: database.into(),
            model_info,
            collections,
            collected_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            warnings: Vec::new(),
        }
    }
}

/// Writes a model package as pretty JSON.
pub async fn write_model_package(package: &ModelPackage, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(package)
        .map_err(|e| DocBridgeError::serialization("model package", e))?;

    tokio::fs::write(output_path, json)
        .await
        .map_err(|e| DocBridgeError::Io {
            context: format!("Failed to write to {}", output_path.display()),
            source: e,
        })?;

    tracing::info!(path = %output_path.display(), "model package written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_reread_package() {
        let package = ModelPackage::new(
            "shop",
            ModelInfo {
                version: vec![5, 0, 3],
                api_experience: "mongodb".to_string(),
            },
            vec![CollectionPackage {
                db_name: "shop".to_string(),
                collection_name: "orders".to_string(),
                ..CollectionPackage::default()
            }],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write_model_package(&package, &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: ModelPackage = serde_json::from_str(&text).unwrap();
        assert_eq!(back.database, "shop");
        assert_eq!(back.model_info.version, vec![5, 0, 3]);
        assert_eq!(back.collections.len(), 1);
    }
}
