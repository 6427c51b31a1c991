//! Snapshot merging for store hydration.
//!
//! A persisted snapshot is deep-merged over the store's default state one
//! top-level field at a time. A field is accepted only if the merged state
//! still deserializes; otherwise that field keeps its default. Hydration
//! therefore never fails because of a single bad field.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other value (arrays included) replaces.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Outcome of merging a snapshot over defaults.
#[derive(Debug)]
pub struct MergeOutcome<S> {
    pub state: S,
    /// Top-level fields from the snapshot that were discarded.
    pub rejected: Vec<String>,
}

/// Merge `snapshot` over `defaults` field by field.
///
/// Returns `None` only if `defaults` itself does not deserialize into `S`.
pub fn merge_fields<S: DeserializeOwned>(
    defaults: Value,
    snapshot: &serde_json::Map<String, Value>,
) -> Option<MergeOutcome<S>> {
    let mut merged = defaults;
    let mut rejected = Vec::new();

    for (field, value) in snapshot {
        let mut candidate = merged.clone();
        match candidate.as_object_mut() {
            Some(object) => match object.get_mut(field) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    object.insert(field.clone(), value.clone());
                }
            },
            None => return None,
        }

        if serde_json::from_value::<S>(candidate.clone()).is_ok() {
            merged = candidate;
        } else {
            rejected.push(field.clone());
        }
    }

    serde_json::from_value::<S>(merged)
        .ok()
        .map(|state| MergeOutcome { state, rejected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Prefs {
        theme: String,
        size: u32,
        flags: Flags,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Flags {
        beta: bool,
        compact: bool,
    }

    fn defaults() -> Value {
        json!({"theme": "light", "size": 12, "flags": {"beta": false, "compact": false}})
    }

    #[test]
    fn deep_merge_merges_nested_objects() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "list": [1, 2]});
        deep_merge(&mut base, &json!({"a": {"y": 3}, "list": [9]}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 3}, "list": [9]}));
    }

    #[test]
    fn missing_fields_keep_defaults() {
        let snapshot = json!({"theme": "dark"});
        let outcome: MergeOutcome<Prefs> =
            merge_fields(defaults(), snapshot.as_object().unwrap()).unwrap();
        assert_eq!(outcome.state.theme, "dark");
        assert_eq!(outcome.state.size, 12);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn nested_partial_snapshot_is_deep_merged() {
        let snapshot = json!({"flags": {"compact": true}});
        let outcome: MergeOutcome<Prefs> =
            merge_fields(defaults(), snapshot.as_object().unwrap()).unwrap();
        assert_eq!(
            outcome.state.flags,
            Flags {
                beta: false,
                compact: true
            }
        );
    }

    #[test]
    fn bad_field_falls_back_to_default() {
        let snapshot = json!({"theme": "dark", "size": "huge"});
        let outcome: MergeOutcome<Prefs> =
            merge_fields(defaults(), snapshot.as_object().unwrap()).unwrap();
        assert_eq!(outcome.state.theme, "dark");
        assert_eq!(outcome.state.size, 12);
        assert_eq!(outcome.rejected, vec!["size".to_string()]);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let snapshot = json!({"legacy": 1});
        let outcome: MergeOutcome<Prefs> =
            merge_fields(defaults(), snapshot.as_object().unwrap()).unwrap();
        assert_eq!(outcome.state.theme, "light");
    }
}
