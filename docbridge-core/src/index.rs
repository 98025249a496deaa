//! Index descriptor translation between native index listings and the model
//! format, in both directions.
//!
//! Reverse engineering classifies a collection's native index list into
//! unique-key groups, an optional TTL setting, and plain secondary indexes.
//! Forward engineering renders model descriptors back into `createIndex`
//! statements with a fixed ordering: unique keys first, then activated
//! secondary indexes, then at most one TTL index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use mongodb::bson::{Bson, Document};

/// Key direction or type inside an index definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDirection {
    Ascending,
    Descending,
    #[serde(rename = "2dsphere")]
    GeoSphere,
}

impl IndexDirection {
    /// Maps a native key value (1, -1, "2dsphere") to a direction. Anything
    /// unrecognized is treated as ascending, matching server defaults.
    pub fn from_native(value: &Bson) -> Self {
        match value {
            Bson::Int32(-1) | Bson::Int64(-1) => Self::Descending,
            Bson::Double(d) if *d == -1.0 => Self::Descending,
            Bson::String(s) if s == "2dsphere" => Self::GeoSphere,
            _ => Self::Ascending,
        }
    }

    /// The value placed in a generated `createIndex` key object.
    pub fn to_native(self) -> Value {
        match self {
            Self::Ascending => json!(1),
            Self::Descending => json!(-1),
            Self::GeoSphere => json!("2dsphere"),
        }
    }
}

/// Shape classification shown in the model UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    #[serde(rename = "Single Field")]
    SingleField,
    Compound,
    Wildcard,
}

/// One field inside an index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    pub name: String,
    #[serde(rename = "type")]
    pub direction: IndexDirection,
}

/// A secondary index in model form. Never mutated after construction;
/// translation always produces a new descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    #[serde(rename = "indexType")]
    pub kind: IndexKind,
    #[serde(rename = "indexKey")]
    pub keys: Vec<IndexKey>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default)]
    pub background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_version: Option<i32>,
    #[serde(default = "default_activated", rename = "isActivated")]
    pub is_activated: bool,
}

fn default_activated() -> bool {
    true
}

/// A declared unique-key group: the field names composing one unique index.
/// The shard key is stripped during classification and re-prepended during
/// generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueKeyGroup {
    #[serde(rename = "attributePath")]
    pub fields: Vec<String>,
}

/// Container-level TTL setting derived from (or rendered into) a TTL index
/// on the `_ts` field.
///
/// Serializes as the flattenable `TTL` / `TTLseconds` field pair of the
/// model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TtlRepr", into = "TtlRepr")]
pub enum TtlConfig {
    Off,
    On(i64),
    OnNoDefault,
}

#[derive(Serialize, Deserialize)]
struct TtlRepr {
    #[serde(rename = "TTL", default)]
    mode: String,
    #[serde(rename = "TTLseconds", default, skip_serializing_if = "Option::is_none")]
    seconds: Option<i64>,
}

impl From<TtlRepr> for TtlConfig {
    fn from(repr: TtlRepr) -> Self {
        match (repr.mode.as_str(), repr.seconds) {
            ("On", Some(seconds)) => Self::On(seconds),
            ("On", None) | ("On (no default)", _) => Self::OnNoDefault,
            _ => Self::Off,
        }
    }
}

impl From<TtlConfig> for TtlRepr {
    fn from(config: TtlConfig) -> Self {
        match config {
            TtlConfig::Off => Self {
                mode: "Off".to_string(),
                seconds: None,
            },
            TtlConfig::On(seconds) => Self {
                mode: "On".to_string(),
                seconds: Some(seconds),
            },
            TtlConfig::OnNoDefault => Self {
                mode: "On (no default)".to_string(),
                seconds: None,
            },
        }
    }
}

impl TtlConfig {
    /// Derives the setting from a native TTL index's `expireAfterSeconds`.
    pub fn from_native(expire_after_seconds: Option<i64>) -> Self {
        match expire_after_seconds {
            None => Self::Off,
            Some(-1) => Self::OnNoDefault,
            Some(seconds) => Self::On(seconds),
        }
    }

    /// The seconds value emitted in the generated TTL index, if any.
    /// "On (no default)" maps to -1.
    pub fn expire_after_seconds(self) -> Option<i64> {
        match self {
            Self::Off => None,
            Self::On(seconds) => Some(seconds),
            Self::OnNoDefault => Some(-1),
        }
    }
}

/// Result of splitting a native index list into the model's three buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedIndexes {
    pub unique_keys: Vec<UniqueKeyGroup>,
    pub ttl: Option<TtlConfig>,
    pub indexes: Vec<IndexDescriptor>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self::Off
    }
}

/// Converts a native index list into model descriptors, dropping the
/// implicit `_id_` primary-key index.
pub fn from_native(native: &[Document]) -> Vec<IndexDescriptor> {
    native
        .iter()
        .filter(|index| index.get_str("name") != Ok("_id_"))
        .filter_map(descriptor_from_native)
        .collect()
}

fn descriptor_from_native(index: &Document) -> Option<IndexDescriptor> {
    let name = index.get_str("name").ok()?.to_string();
    let key = index.get_document("key").ok()?;

    let keys: Vec<IndexKey> = key
        .iter()
        .map(|(field, value)| IndexKey {
            // Wildcard indexes carry a `.$**` suffix on the field path
            name: field.trim_end_matches(".$**").to_string(),
            direction: IndexDirection::from_native(value),
        })
        .collect();

    let kind = if keys.len() > 1 {
        IndexKind::Compound
    } else if key.keys().any(|field| field.ends_with("$**")) {
        IndexKind::Wildcard
    } else {
        IndexKind::SingleField
    };

    Some(IndexDescriptor {
        name,
        kind,
        keys,
        unique: index.get_bool("unique").unwrap_or(false),
        sparse: index.get_bool("sparse").unwrap_or(false),
        background: index.get_bool("background").unwrap_or(false),
        expire_after_seconds: native_expire_seconds(index),
        geo_version: index
            .get_i32("2dsphereIndexVersion")
            .ok()
            .or_else(|| index.get_i64("2dsphereIndexVersion").ok().map(|v| v as i32)),
        is_activated: true,
    })
}

fn native_expire_seconds(index: &Document) -> Option<i64> {
    match index.get("expireAfterSeconds") {
        Some(Bson::Int32(seconds)) => Some(i64::from(*seconds)),
        Some(Bson::Int64(seconds)) => Some(*seconds),
        Some(Bson::Double(seconds)) => Some(*seconds as i64),
        _ => None,
    }
}

/// Splits a native index list into unique-key groups, an optional TTL
/// setting, and plain secondary indexes.
///
/// Unique indexes become attribute-path groups with the shard key removed.
/// The first index carrying `expireAfterSeconds` becomes the TTL setting.
/// Everything else becomes a secondary descriptor, except the synthetic
/// `DocumentDBDefaultIndex` which is dropped.
pub fn classify_native(native: &[Document], shard_key: &str) -> ClassifiedIndexes {
    let mut unique_keys = Vec::new();
    let mut ttl = None;
    let mut indexes = Vec::new();

    for index in native {
        if index.get_str("name") == Ok("_id_") {
            continue;
        }

        if index.get_bool("unique").unwrap_or(false) {
            if let Ok(key) = index.get_document("key") {
                unique_keys.push(UniqueKeyGroup {
                    fields: key
                        .keys()
                        .filter(|field| field.as_str() != shard_key)
                        .cloned()
                        .collect(),
                });
            }
            continue;
        }

        if let Some(seconds) = native_expire_seconds(index) {
            if ttl.is_none() {
                ttl = Some(TtlConfig::from_native(Some(seconds)));
            }
            continue;
        }

        if index
            .get_document("key")
            .map(|key| key.keys().any(|field| field == "DocumentDBDefaultIndex"))
            .unwrap_or(false)
        {
            continue;
        }

        if let Some(descriptor) = descriptor_from_native(index) {
            indexes.push(descriptor);
        }
    }

    ClassifiedIndexes {
        unique_keys,
        ttl,
        indexes,
    }
}

/// Renders the index section for one collection as ordered `createIndex`
/// statements: unique-key groups, then activated secondary indexes, then at
/// most one TTL index. Descriptors with no usable key fields are skipped.
pub fn to_statements(
    collection: &str,
    unique_keys: &[UniqueKeyGroup],
    shard_key: Option<&str>,
    indexes: &[IndexDescriptor],
    ttl: Option<TtlConfig>,
) -> Vec<String> {
    let mut statements = Vec::new();

    for group in unique_keys {
        if let Some(statement) = unique_index_statement(collection, group, shard_key) {
            statements.push(statement);
        }
    }

    for descriptor in indexes.iter().filter(|index| index.is_activated) {
        if let Some(statement) = secondary_index_statement(collection, descriptor) {
            statements.push(statement);
        }
    }

    if let Some(statement) = ttl.and_then(|ttl| ttl_index_statement(collection, ttl)) {
        statements.push(statement);
    }

    statements
}

fn unique_index_statement(
    collection: &str,
    group: &UniqueKeyGroup,
    shard_key: Option<&str>,
) -> Option<String> {
    let fields: Vec<&String> = group.fields.iter().filter(|name| !name.is_empty()).collect();
    if fields.is_empty() {
        return None;
    }

    let mut keys = Map::new();
    if let Some(shard_key) = shard_key.filter(|name| !name.is_empty()) {
        keys.insert(shard_key.to_string(), json!(1));
    }
    for field in fields {
        keys.insert(field.clone(), json!(1));
    }

    let mut options = Map::new();
    options.insert("unique".to_string(), json!(true));

    Some(create_index_statement(collection, keys, options))
}

fn secondary_index_statement(collection: &str, descriptor: &IndexDescriptor) -> Option<String> {
    let keys: Vec<&IndexKey> = descriptor
        .keys
        .iter()
        .filter(|key| !key.name.is_empty())
        .collect();
    if keys.is_empty() {
        return None;
    }

    let mut key_object = Map::new();
    for key in keys {
        key_object.insert(key.name.clone(), key.direction.to_native());
    }

    let mut options = Map::new();
    if !descriptor.name.is_empty() {
        options.insert("name".to_string(), json!(descriptor.name));
    }
    if descriptor.unique {
        options.insert("unique".to_string(), json!(true));
    }
    if descriptor.sparse {
        options.insert("sparse".to_string(), json!(true));
    }
    if descriptor.background {
        options.insert("background".to_string(), json!(true));
    }
    if let Some(version) = descriptor.geo_version {
        options.insert("2dsphereIndexVersion".to_string(), json!(version));
    }

    Some(create_index_statement(collection, key_object, options))
}

fn ttl_index_statement(collection: &str, ttl: TtlConfig) -> Option<String> {
    let seconds = ttl.expire_after_seconds()?;

    let mut keys = Map::new();
    keys.insert("_ts".to_string(), json!(1));

    let mut options = Map::new();
    options.insert("name".to_string(), json!("ttl"));
    options.insert("expireAfterSeconds".to_string(), json!(seconds));

    Some(create_index_statement(collection, keys, options))
}

fn create_index_statement(collection: &str, keys: Map<String, Value>, options: Map<String, Value>) -> String {
    let mut arguments = vec![pretty(&Value::Object(keys))];
    if !options.is_empty() {
        arguments.push(pretty(&Value::Object(options)));
    }

    format!(
        "db.getCollection(\"{}\").createIndex({});",
        collection,
        arguments.join(", ")
    )
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
