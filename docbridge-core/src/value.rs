//! Closed tagged representation of sampled document values.
//!
//! Live documents arrive as `mongodb::bson` values; everything downstream of
//! the document source works on [`DocumentValue`], a closed enum with one
//! case per supported BSON-like type. Values are read-only snapshots: all
//! transforms produce new values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use mongodb::bson::{Bson, Document, oid::ObjectId};
use serde_json::{Value, json};

/// Magnitude boundary above which a plain number is treated as 64-bit.
const INT32_BOUNDARY: f64 = 4_294_967_296.0; // 2^32

/// One case per supported document value type.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal128(mongodb::bson::Decimal128),
    String(String),
    Date(mongodb::bson::DateTime),
    Timestamp { time: u32, increment: u32 },
    Binary { subtype: u8, bytes: Vec<u8> },
    Regex { pattern: String, options: String },
    ObjectId(ObjectId),
    /// Cross-collection database reference; deliberately opaque, see
    /// the sampler policy on foreign-key candidates
    DbRef,
    MinKey,
    MaxKey,
    Code(String),
    CodeWithScope(String),
    Array(Vec<DocumentValue>),
    /// Nested document with field order preserved
    Object(Vec<(String, DocumentValue)>),
}

/// Numeric sub-tag carried alongside the `numeric` type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericMode {
    Int32,
    Int64,
    Double,
    Decimal128,
}

impl NumericMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NumericMode::Int32 => "integer32",
            NumericMode::Int64 => "integer64",
            NumericMode::Double => "double",
            NumericMode::Decimal128 => "decimal128",
        }
    }
}

/// Runtime type tag of a document value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Null,
    Boolean,
    Numeric(NumericMode),
    String,
    Date,
    Timestamp,
    Binary,
    Regex,
    ObjectId,
    Reference,
    MinKey,
    MaxKey,
    JavaScript,
    JavaScriptWithScope,
    Array,
    Object,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Numeric(_) => "numeric",
            TypeTag::String => "string",
            TypeTag::Date => "date",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Binary => "binary",
            TypeTag::Regex => "regex",
            TypeTag::ObjectId => "objectId",
            TypeTag::Reference => "reference",
            TypeTag::MinKey => "minKey",
            TypeTag::MaxKey => "maxKey",
            TypeTag::JavaScript => "JavaScript",
            TypeTag::JavaScriptWithScope => "JavaScript(w/scope)",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        }
    }

    pub fn numeric_mode(self) -> Option<NumericMode> {
        match self {
            TypeTag::Numeric(mode) => Some(mode),
            _ => None,
        }
    }
}

/// Classifies a plain (unwrapped) number: double when it has a fractional
/// part, 32-bit below the 2^32 magnitude boundary, 64-bit otherwise.
pub fn number_mode(value: f64) -> NumericMode {
    if value.fract() != 0.0 {
        NumericMode::Double
    } else if value.abs() < INT32_BOUNDARY {
        NumericMode::Int32
    } else {
        NumericMode::Int64
    }
}

impl DocumentValue {
    /// Converts a top-level BSON document, preserving field order.
    pub fn from_document(document: &Document) -> Self {
        DocumentValue::Object(
            document
                .iter()
                .map(|(name, value)| (name.clone(), DocumentValue::from_bson(value)))
                .collect(),
        )
    }

    /// Converts a single BSON value.
    pub fn from_bson(value: &Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => DocumentValue::Null,
            Bson::Boolean(b) => DocumentValue::Boolean(*b),
            Bson::Int32(i) => DocumentValue::Int32(*i),
            Bson::Int64(i) => DocumentValue::Int64(*i),
            Bson::Double(d) => DocumentValue::Double(*d),
            Bson::Decimal128(d) => DocumentValue::Decimal128(*d),
            Bson::String(s) | Bson::Symbol(s) => DocumentValue::String(s.clone()),
            Bson::DateTime(dt) => DocumentValue::Date(*dt),
            Bson::Timestamp(ts) => DocumentValue::Timestamp {
                time: ts.time,
                increment: ts.increment,
            },
            Bson::Binary(binary) => DocumentValue::Binary {
                subtype: u8::from(binary.subtype),
                bytes: binary.bytes.clone(),
            },
            Bson::RegularExpression(regex) => DocumentValue::Regex {
                pattern: regex.pattern.clone(),
                options: regex.options.clone(),
            },
            Bson::ObjectId(oid) => DocumentValue::ObjectId(*oid),
            Bson::DbPointer(_) => DocumentValue::DbRef,
            Bson::MinKey => DocumentValue::MinKey,
            Bson::MaxKey => DocumentValue::MaxKey,
            Bson::JavaScriptCode(code) => DocumentValue::Code(code.clone()),
            Bson::JavaScriptCodeWithScope(code) => {
                DocumentValue::CodeWithScope(code.code.clone())
            }
            Bson::Array(items) => {
                DocumentValue::Array(items.iter().map(DocumentValue::from_bson).collect())
            }
            Bson::Document(doc) => DocumentValue::from_document(doc),
            #[allow(unreachable_patterns)]
            _ => DocumentValue::Null,
        }
    }

    /// Converts a plain JSON value, e.g. a bulk NDJSON sample line.
    ///
    /// JSON numbers carry no width information, so they are classified by
    /// the numeric policy at tagging time rather than here.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => DocumentValue::Null,
            Value::Bool(b) => DocumentValue::Boolean(*b),
            Value::Number(n) => DocumentValue::Double(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => DocumentValue::String(s.clone()),
            Value::Array(items) => {
                DocumentValue::Array(items.iter().map(DocumentValue::from_json).collect())
            }
            Value::Object(fields) => DocumentValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), DocumentValue::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Runtime type tag, with the numeric disambiguation policy applied:
    /// wrapped longs are 64-bit, fractional doubles stay double, integral
    /// doubles below 2^32 magnitude are 32-bit, anything larger is 64-bit.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            DocumentValue::Null => TypeTag::Null,
            DocumentValue::Boolean(_) => TypeTag::Boolean,
            DocumentValue::Int32(_) => TypeTag::Numeric(NumericMode::Int32),
            DocumentValue::Int64(_) => TypeTag::Numeric(NumericMode::Int64),
            DocumentValue::Double(d) => TypeTag::Numeric(number_mode(*d)),
            DocumentValue::Decimal128(_) => TypeTag::Numeric(NumericMode::Decimal128),
            DocumentValue::String(_) => TypeTag::String,
            DocumentValue::Date(_) => TypeTag::Date,
            DocumentValue::Timestamp { .. } => TypeTag::Timestamp,
            DocumentValue::Binary { .. } => TypeTag::Binary,
            DocumentValue::Regex { .. } => TypeTag::Regex,
            DocumentValue::ObjectId(_) => TypeTag::ObjectId,
            DocumentValue::DbRef => TypeTag::Reference,
            DocumentValue::MinKey => TypeTag::MinKey,
            DocumentValue::MaxKey => TypeTag::MaxKey,
            DocumentValue::Code(_) => TypeTag::JavaScript,
            DocumentValue::CodeWithScope(_) => TypeTag::JavaScriptWithScope,
            DocumentValue::Array(_) => TypeTag::Array,
            DocumentValue::Object(_) => TypeTag::Object,
        }
    }

    /// Renders the value for the model package's sample documents.
    ///
    /// This reproduces the historical adjustment pass, quirks included:
    /// decimals display as `1.0` and wrapped longs as `1`, min/max keys
    /// become empty strings, and integral doubles beyond 2^32 magnitude are
    /// folded modulo 2^32.
    pub fn to_display_json(&self) -> Value {
        match self {
            DocumentValue::Null | DocumentValue::DbRef => Value::Null,
            DocumentValue::Boolean(b) => json!(b),
            DocumentValue::Int32(i) => json!(i),
            DocumentValue::Int64(_) => json!(1),
            DocumentValue::Double(d) => {
                if d.abs() > INT32_BOUNDARY {
                    json!(d.abs() % INT32_BOUNDARY)
                } else {
                    json!(d)
                }
            }
            DocumentValue::Decimal128(_) => json!(1.0),
            DocumentValue::String(s) => json!(s),
            DocumentValue::Date(dt) => json!(rfc3339(*dt)),
            DocumentValue::Timestamp { time, increment } => {
                json!({ "t": time, "i": increment })
            }
            DocumentValue::Binary { bytes, .. } => json!(BASE64.encode(bytes)),
            DocumentValue::Regex { pattern, options } => {
                json!(format!("/{}/{}", pattern, options))
            }
            DocumentValue::ObjectId(oid) => json!(format!("ObjectId(\"{}\")", oid.to_hex())),
            DocumentValue::MinKey | DocumentValue::MaxKey => json!(""),
            DocumentValue::Code(code) | DocumentValue::CodeWithScope(code) => json!(code),
            DocumentValue::Array(items) => {
                Value::Array(items.iter().map(DocumentValue::to_display_json).collect())
            }
            DocumentValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_display_json()))
                    .collect(),
            ),
        }
    }

    /// Single-document JSON-Schema-like shape: `type` plus numeric `mode`,
    /// nested under `properties`/`items`. Plain scalars that need no
    /// annotation yield `None`, as do objects that prune to nothing.
    pub fn json_shape(&self) -> Option<Value> {
        match self {
            DocumentValue::Array(items) => {
                let items = items.first()?.json_shape()?;
                Some(json!({ "items": items }))
            }
            DocumentValue::Regex { .. } => Some(json!({ "type": "regex" })),
            DocumentValue::ObjectId(_) => Some(json!({ "type": "objectId" })),
            DocumentValue::MinKey => Some(json!({ "type": "minKey" })),
            DocumentValue::MaxKey => Some(json!({ "type": "maxKey" })),
            DocumentValue::Code(_) | DocumentValue::CodeWithScope(_) => {
                Some(json!({ "type": "JavaScript" }))
            }
            DocumentValue::Int64(_) => {
                Some(json!({ "type": "numeric", "mode": "integer64" }))
            }
            DocumentValue::Double(d) if d.abs() > INT32_BOUNDARY => {
                Some(json!({ "type": "numeric", "mode": "integer64" }))
            }
            DocumentValue::Decimal128(_) => {
                Some(json!({ "type": "numeric", "mode": "decimal128" }))
            }
            DocumentValue::Binary { .. } => Some(json!({ "type": "binary" })),
            DocumentValue::Date(_) => Some(json!({ "type": "date" })),
            DocumentValue::Object(fields) => {
                let properties: serde_json::Map<String, Value> = fields
                    .iter()
                    .filter_map(|(name, value)| {
                        value.json_shape().map(|shape| (name.clone(), shape))
                    })
                    .collect();

                if properties.is_empty() {
                    return None;
                }

                Some(json!({ "properties": properties }))
            }
            _ => None,
        }
    }

    /// Object fields when the value is a nested document.
    pub fn as_object(&self) -> Option<&[(String, DocumentValue)]> {
        match self {
            DocumentValue::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

fn rfc3339(dt: mongodb::bson::DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| dt.to_string())
}
