//! Document sampler policy: how many documents to pull for one collection,
//! how to batch the fetches, and which document fragments qualify as
//! foreign-key candidates for relationship hinting.

use serde::{Deserialize, Serialize};

use crate::value::DocumentValue;

/// Hard ceiling on one collection's sample, regardless of configuration.
pub const MAX_SAMPLE_CAP: u64 = 10_000;

/// Largest single fetch issued against the document source.
pub const FETCH_BATCH_SIZE: u64 = 1_000;

/// Sampling mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    Absolute,
    Relative,
}

/// Sampling configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub mode: SamplingMode,
    #[serde(rename = "absoluteCount", default)]
    pub absolute_count: u64,
    #[serde(rename = "relativePercent", default)]
    pub relative_percent: f64,
    #[serde(rename = "maxCap", default = "default_max_cap")]
    pub max_cap: u64,
}

fn default_max_cap() -> u64 {
    MAX_SAMPLE_CAP
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Relative,
            absolute_count: 0,
            relative_percent: 10.0,
            max_cap: MAX_SAMPLE_CAP,
        }
    }
}

/// Computes the sample size for one collection.
///
/// Absolute mode clamps the requested count to the documents actually
/// available. Relative mode rounds `total * percent / 100`. Both modes are
/// capped at `max_cap`.
pub fn sample_size(total: u64, config: &SamplingConfig) -> u64 {
    let requested = match config.mode {
        SamplingMode::Absolute => config.absolute_count.min(total),
        SamplingMode::Relative => {
            let share = total as f64 / 100.0 * config.relative_percent;
            share.round() as u64
        }
    };

    requested.min(config.max_cap)
}

/// Splits a sample size into per-fetch limits of at most
/// [`FETCH_BATCH_SIZE`] documents each.
pub fn batch_limits(size: u64) -> Vec<u64> {
    if size == 0 {
        return Vec::new();
    }
    if size <= FETCH_BATCH_SIZE {
        return vec![size];
    }

    let full_batches = size / FETCH_BATCH_SIZE;
    let remainder = size % FETCH_BATCH_SIZE;

    let mut limits = vec![FETCH_BATCH_SIZE; full_batches as usize];
    if remainder > 0 {
        limits.push(remainder);
    }
    limits
}

/// Prunes sample documents down to foreign-key candidates: fragments
/// retaining only sub-paths whose leaf is an object-id reference.
///
/// Database references are dropped entirely, not treated as candidates.
/// Branches left empty after pruning are dropped, and documents with no
/// surviving path contribute nothing to the result.
pub fn extract_foreign_key_candidates(documents: &[DocumentValue]) -> Vec<DocumentValue> {
    documents.iter().filter_map(prune_to_object_ids).collect()
}

fn prune_to_object_ids(value: &DocumentValue) -> Option<DocumentValue> {
    match value {
        DocumentValue::ObjectId(_) => Some(value.clone()),
        DocumentValue::Object(fields) => {
            let kept: Vec<(String, DocumentValue)> = fields
                .iter()
                .filter_map(|(name, value)| {
                    prune_to_object_ids(value).map(|pruned| (name.clone(), pruned))
                })
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(DocumentValue::Object(kept))
            }
        }
        DocumentValue::Array(items) => {
            let kept: Vec<DocumentValue> = items.iter().filter_map(prune_to_object_ids).collect();
            if kept.is_empty() {
                None
            } else {
                Some(DocumentValue::Array(kept))
            }
        }
        // DbRef leaves are intentionally non-candidates
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use proptest::prelude::*;

    fn absolute(count: u64) -> SamplingConfig {
        SamplingConfig {
            mode: SamplingMode::Absolute,
            absolute_count: count,
            ..SamplingConfig::default()
        }
    }

    fn relative(percent: f64) -> SamplingConfig {
        SamplingConfig {
            mode: SamplingMode::Relative,
            relative_percent: percent,
            ..SamplingConfig::default()
        }
    }

    #[test]
    fn test_absolute_clamps_to_available() {
        assert_eq!(sample_size(10, &absolute(50)), 10);
        assert_eq!(sample_size(500, &absolute(50)), 50);
    }

    #[test]
    fn test_relative_rounds() {
        assert_eq!(sample_size(1000, &relative(10.0)), 100);
        assert_eq!(sample_size(15, &relative(10.0)), 2); // 1.5 rounds up
        assert_eq!(sample_size(14, &relative(10.0)), 1); // 1.4 rounds down
    }

    #[test]
    fn test_cap_applies_to_both_modes() {
        assert_eq!(sample_size(1_000_000, &relative(100.0)), MAX_SAMPLE_CAP);
        assert_eq!(sample_size(1_000_000, &absolute(50_000)), MAX_SAMPLE_CAP);
    }

    #[test]
    fn test_batch_limits() {
        assert!(batch_limits(0).is_empty());
        assert_eq!(batch_limits(500), vec![500]);
        assert_eq!(batch_limits(1000), vec![1000]);
        assert_eq!(batch_limits(2500), vec![1000, 1000, 500]);
    }

    #[test]
    fn test_foreign_key_candidates_keep_object_id_paths() {
        let id = ObjectId::new();
        let document = DocumentValue::Object(vec![
            ("name".to_string(), DocumentValue::String("x".to_string())),
            (
                "owner".to_string(),
                DocumentValue::Object(vec![
                    ("ref".to_string(), DocumentValue::ObjectId(id)),
                    ("label".to_string(), DocumentValue::String("y".to_string())),
                ]),
            ),
            ("tags".to_string(), DocumentValue::Array(vec![])),
        ]);

        let candidates = extract_foreign_key_candidates(&[document]);
        assert_eq!(
            candidates,
            vec![DocumentValue::Object(vec![(
                "owner".to_string(),
                DocumentValue::Object(vec![("ref".to_string(), DocumentValue::ObjectId(id))]),
            )])]
        );
    }

    #[test]
    fn test_db_refs_are_not_candidates() {
        let document = DocumentValue::Object(vec![(
            "link".to_string(),
            DocumentValue::DbRef,
        )]);

        assert!(extract_foreign_key_candidates(&[document]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_sample_size_never_exceeds_cap(total in 0u64..10_000_000, percent in 0.0f64..100.0) {
            let config = relative(percent);
            prop_assert!(sample_size(total, &config) <= config.max_cap);
        }

        #[test]
        fn prop_relative_monotonic_in_total(a in 0u64..1_000_000, b in 0u64..1_000_000, percent in 0.0f64..100.0) {
            let config = relative(percent);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(sample_size(lo, &config) <= sample_size(hi, &config));
        }

        #[test]
        fn prop_batch_limits_sum_to_size(size in 0u64..50_000) {
            let limits = batch_limits(size);
            prop_assert_eq!(limits.iter().sum::<u64>(), size);
            prop_assert!(limits.iter().all(|limit| *limit <= FETCH_BATCH_SIZE));
        }
    }
}
