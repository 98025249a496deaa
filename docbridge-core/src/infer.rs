//! Structural schema inference over a bounded document sample.
//!
//! The inferencer walks every sampled document and keeps one accumulator per
//! property path: presence count, a bounded deduplicated sample list, and the
//! type tag of the most recently observed value. Last-write-wins tagging is a
//! documented heuristic of the model format, not a bug; mixed-type
//! collections surface whichever type the final sampled document carried.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::value::{DocumentValue, TypeTag};

/// Default bound on retained sample values per property.
pub const DEFAULT_MAX_SAMPLES: usize = 30;

/// Per-property summary node.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    /// Type of the most recently observed value for this property
    pub type_tag: TypeTag,
    /// Number of documents in which the property appeared
    pub doc_count: u64,
    /// `round(doc_count / total_docs * 100)`
    pub doc_percentage: u32,
    /// Bounded, deduplicated raw sample values in observation order
    pub samples: Vec<DocumentValue>,
    /// Element schema for array-typed properties (first-element shape)
    pub items: Option<Box<PropertySchema>>,
    /// Child schema for object-typed properties
    pub properties: Option<BTreeMap<String, PropertySchema>>,
}

/// Inferred structural schema for one collection sample.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralSchema {
    pub total_docs: u64,
    pub properties: BTreeMap<String, PropertySchema>,
}

impl StructuralSchema {
    /// Serializes into the JSON-Schema-like mapping consumed by the host:
    /// `#docs`/`%docs` counters, `type` plus numeric `mode`, bounded
    /// `samples`, nested `properties` and `items`.
    pub fn to_json_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, prop)| (name.clone(), prop.to_json_schema()))
            .collect();

        json!({
            "#docs": self.total_docs,
            "$schema": "http://json-schema.org/schema#",
            "properties": properties,
        })
    }
}

impl PropertySchema {
    fn to_json_schema(&self) -> Value {
        let mut node = serde_json::Map::new();
        node.insert("type".to_string(), json!(self.type_tag.as_str()));
        if let Some(mode) = self.type_tag.numeric_mode() {
            node.insert("mode".to_string(), json!(mode.as_str()));
        }
        node.insert("#docs".to_string(), json!(self.doc_count));
        node.insert("%docs".to_string(), json!(self.doc_percentage));
        node.insert(
            "samples".to_string(),
            Value::Array(
                self.samples
                    .iter()
                    .map(DocumentValue::to_display_json)
                    .collect(),
            ),
        );
        if let Some(ref items) = self.items {
            node.insert("items".to_string(), items.to_json_schema());
        }
        if let Some(ref properties) = self.properties {
            let children: serde_json::Map<String, Value> = properties
                .iter()
                .map(|(name, prop)| (name.clone(), prop.to_json_schema()))
                .collect();
            node.insert("properties".to_string(), json!(children));
        }
        Value::Object(node)
    }
}

/// Accumulates observations for one value slot (a named property, or an
/// array's element position).
#[derive(Debug)]
struct ValueAccumulator {
    type_tag: TypeTag,
    doc_count: u64,
    samples: Vec<DocumentValue>,
    object_fields: Option<SchemaInferencer>,
    array_items: Option<Box<ValueAccumulator>>,
}

impl ValueAccumulator {
    fn new() -> Self {
        Self {
            type_tag: TypeTag::Null,
            doc_count: 0,
            samples: Vec::new(),
            object_fields: None,
            array_items: None,
        }
    }

    fn observe(&mut self, value: &DocumentValue, max_samples: usize) {
        self.doc_count += 1;
        self.type_tag = value.type_tag();
        if self.samples.len() < max_samples && !self.samples.contains(value) {
            self.samples.push(value.clone());
        }

        match value {
            DocumentValue::Object(_) => {
                self.object_fields
                    .get_or_insert_with(|| SchemaInferencer::new(max_samples))
                    .observe_document(value);
            }
            DocumentValue::Array(items) => {
                // First element is the representative shape, not a union
                if let Some(first) = items.first() {
                    self.array_items
                        .get_or_insert_with(|| Box::new(ValueAccumulator::new()))
                        .observe(first, max_samples);
                }
            }
            _ => {}
        }
    }

    fn finish(self, total: u64) -> PropertySchema {
        let doc_percentage = percentage(self.doc_count, total);
        let items_total = self
            .array_items
            .as_ref()
            .map(|acc| acc.doc_count)
            .unwrap_or(0);

        PropertySchema {
            type_tag: self.type_tag,
            doc_count: self.doc_count,
            doc_percentage,
            samples: self.samples,
            items: self
                .array_items
                .map(|acc| Box::new(acc.finish(items_total))),
            properties: self.object_fields.map(|inferencer| {
                let schema = inferencer.finish();
                schema.properties
            }),
        }
    }
}

/// Streaming structural-schema builder.
#[derive(Debug)]
pub struct SchemaInferencer {
    max_samples: usize,
    total_docs: u64,
    properties: BTreeMap<String, ValueAccumulator>,
}

impl SchemaInferencer {
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples,
            total_docs: 0,
            properties: BTreeMap::new(),
        }
    }

    /// Feeds one document. Non-object documents (and empty objects)
    /// contribute only to the total count.
    pub fn observe_document(&mut self, document: &DocumentValue) {
        self.total_docs += 1;

        let Some(fields) = document.as_object() else {
            return;
        };

        for (name, value) in fields {
            self.properties
                .entry(name.clone())
                .or_insert_with(ValueAccumulator::new)
                .observe(value, self.max_samples);
        }
    }

    /// Converts accumulators into the final schema. Inferring over an empty
    /// sequence yields an empty property mapping.
    pub fn finish(self) -> StructuralSchema {
        let total = self.total_docs;
        StructuralSchema {
            total_docs: total,
            properties: self
                .properties
                .into_iter()
                .map(|(name, acc)| (name, acc.finish(total)))
                .collect(),
        }
    }
}

/// One-shot inference over a document slice.
pub fn infer_documents(documents: &[DocumentValue], max_samples: usize) -> StructuralSchema {
    let mut inferencer = SchemaInferencer::new(max_samples);
    for document in documents {
        inferencer.observe_document(document);
    }
    inferencer.finish()
}

fn percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// Discriminator-field suggestion derived from an inferred schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKindSuggestion {
    /// All candidate discriminator fields at or above the presence threshold
    pub document_list: Vec<String>,
    /// Best candidate (empty when none qualifies)
    pub document_kind: String,
    /// Properties below the threshold
    pub other_kinds: Vec<String>,
}

/// Suggests which scalar property most likely discriminates document kinds:
/// the candidate present in at least `probability`% of documents with the
/// fewest distinct samples at the highest presence, skipping excluded names.
pub fn suggest_document_kinds(
    schema: &StructuralSchema,
    probability: u32,
    exclude: &[String],
) -> DocumentKindSuggestion {
    let mut document_list = Vec::new();
    let mut other_kinds = Vec::new();
    let mut document_kind = String::new();
    let mut kind_probability = 0u32;
    let mut min_count = usize::MAX;

    for (name, prop) in &schema.properties {
        if matches!(prop.samples.first(), Some(DocumentValue::Object(_))) {
            continue;
        }

        if prop.doc_percentage >= probability && !prop.samples.is_empty() {
            document_list.push(name.clone());

            if exclude.contains(name) {
                continue;
            }
            if prop.doc_percentage == kind_probability && document_kind == "type" {
                continue;
            }
            if prop.doc_percentage >= kind_probability && prop.samples.len() < min_count {
                min_count = prop.samples.len();
                kind_probability = prop.doc_percentage;
                document_kind = name.clone();
            }
        } else {
            other_kinds.push(name.clone());
        }
    }

    DocumentKindSuggestion {
        document_list,
        document_kind,
        other_kinds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(fields: Vec<(&str, DocumentValue)>) -> DocumentValue {
        DocumentValue::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    #[test]
    fn test_presence_percentages_and_last_value_wins() {
        let documents = vec![
            obj(vec![("a", DocumentValue::Double(1.0))]),
            obj(vec![("a", DocumentValue::String("x".to_string()))]),
            obj(vec![("b", DocumentValue::Double(2.0))]),
        ];

        let schema = infer_documents(&documents, DEFAULT_MAX_SAMPLES);

        assert_eq!(schema.total_docs, 3);
        let a = &schema.properties["a"];
        assert_eq!(a.doc_count, 2);
        assert_eq!(a.doc_percentage, 67);
        assert_eq!(a.type_tag, TypeTag::String);
        let b = &schema.properties["b"];
        assert_eq!(b.doc_percentage, 33);
    }

    #[test]
    fn test_empty_input_yields_empty_schema() {
        let schema = infer_documents(&[], DEFAULT_MAX_SAMPLES);
        assert_eq!(schema.total_docs, 0);
        assert!(schema.properties.is_empty());
    }

    #[test]
    fn test_document_without_properties_counts_toward_total() {
        let documents = vec![obj(vec![]), obj(vec![("a", DocumentValue::Boolean(true))])];
        let schema = infer_documents(&documents, DEFAULT_MAX_SAMPLES);
        assert_eq!(schema.total_docs, 2);
        assert_eq!(schema.properties["a"].doc_percentage, 50);
    }

    #[test]
    fn test_samples_are_bounded_and_deduplicated() {
        let documents: Vec<DocumentValue> = (0..10)
            .map(|i| obj(vec![("n", DocumentValue::Double(f64::from(i % 3)))]))
            .collect();

        let schema = infer_documents(&documents, 2);
        let samples = &schema.properties["n"].samples;
        assert_eq!(samples.len(), 2);
        assert_eq!(schema.properties["n"].doc_count, 10);
    }

    #[test]
    fn test_nested_object_recursion() {
        let documents = vec![
            obj(vec![(
                "address",
                obj(vec![("city", DocumentValue::String("Kyiv".to_string()))]),
            )]),
            obj(vec![(
                "address",
                obj(vec![("zip", DocumentValue::String("01001".to_string()))]),
            )]),
        ];

        let schema = infer_documents(&documents, DEFAULT_MAX_SAMPLES);
        let address = &schema.properties["address"];
        assert_eq!(address.type_tag, TypeTag::Object);
        let children = address.properties.as_ref().unwrap();
        assert_eq!(children["city"].doc_percentage, 50);
        assert_eq!(children["zip"].doc_percentage, 50);
    }

    #[test]
    fn test_array_items_use_first_element() {
        let documents = vec![obj(vec![(
            "tags",
            DocumentValue::Array(vec![
                DocumentValue::String("a".to_string()),
                DocumentValue::Double(1.0),
            ]),
        )])];

        let schema = infer_documents(&documents, DEFAULT_MAX_SAMPLES);
        let tags = &schema.properties["tags"];
        assert_eq!(tags.type_tag, TypeTag::Array);
        let items = tags.items.as_ref().unwrap();
        assert_eq!(items.type_tag, TypeTag::String);
    }

    #[test]
    fn test_json_schema_serialization() {
        let documents = vec![obj(vec![
            ("count", DocumentValue::Int64(5)),
            ("name", DocumentValue::String("n".to_string())),
        ])];

        let schema = infer_documents(&documents, DEFAULT_MAX_SAMPLES);
        let json = schema.to_json_schema();

        assert_eq!(json["#docs"], serde_json::json!(1));
        assert_eq!(json["properties"]["count"]["type"], "numeric");
        assert_eq!(json["properties"]["count"]["mode"], "integer64");
        assert_eq!(json["properties"]["name"]["%docs"], 100);
    }

    #[test]
    fn test_suggest_document_kinds_prefers_fewest_samples() {
        let documents = vec![
            obj(vec![
                ("kind", DocumentValue::String("user".to_string())),
                ("name", DocumentValue::String("ann".to_string())),
            ]),
            obj(vec![
                ("kind", DocumentValue::String("user".to_string())),
                ("name", DocumentValue::String("bob".to_string())),
            ]),
        ];

        let schema = infer_documents(&documents, DEFAULT_MAX_SAMPLES);
        let suggestion = suggest_document_kinds(&schema, 90, &[]);

        assert_eq!(suggestion.document_kind, "kind");
        assert!(suggestion.document_list.contains(&"name".to_string()));
        assert!(suggestion.other_kinds.is_empty());
    }

    #[test]
    fn test_suggest_document_kinds_respects_exclusions() {
        let documents = vec![obj(vec![(
            "kind",
            DocumentValue::String("user".to_string()),
        )])];

        let schema = infer_documents(&documents, DEFAULT_MAX_SAMPLES);
        let suggestion = suggest_document_kinds(&schema, 90, &["kind".to_string()]);

        assert_eq!(suggestion.document_kind, "");
        assert_eq!(suggestion.document_list, vec!["kind".to_string()]);
    }
}
