//! Works out which fields an operator may update for a given result set.

use std::collections::HashSet;
use std::fmt;

use docmaint_core::{FieldSampling, Record, ID_FIELD};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSet {
    names: Vec<String>,
}

impl FieldSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(", "))
    }
}

/// Declared fields for typed shapes. For open shapes, the keys of the sampled
/// records in first-seen order, minus `_`-prefixed store system properties.
/// The identity field is never offered.
pub fn updatable_fields<R: Record>(items: &[R], sampling: FieldSampling) -> FieldSet {
    if let Some(declared) = R::declared_fields() {
        return FieldSet {
            names: declared
                .into_iter()
                .filter(|name| *name != ID_FIELD)
                .map(str::to_string)
                .collect(),
        };
    }

    let sampled = match sampling {
        FieldSampling::FirstRecord => &items[..items.len().min(1)],
        FieldSampling::AllRecords => items,
    };

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for key in sampled.iter().flat_map(|item| item.present_fields()) {
        if key.starts_with('_') || key == ID_FIELD {
            continue;
        }
        if seen.insert(key.clone()) {
            names.push(key);
        }
    }

    FieldSet { names }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmaint_core::{OpenRecord, UsageRecord};
    use serde_json::json;

    fn open_items() -> Vec<OpenRecord> {
        vec![
            serde_json::from_value(json!({"id": "a", "name": "x", "_rid": "r1", "_ts": 1})).unwrap(),
            serde_json::from_value(json!({"id": "b", "region": "eu", "name": "y"})).unwrap(),
        ]
    }

    #[test]
    fn test_typed_fields_ignore_sampling() {
        let items = vec![UsageRecord::default()];
        let first = updatable_fields(&items, FieldSampling::FirstRecord);
        let all = updatable_fields(&items, FieldSampling::AllRecords);

        assert_eq!(first, all);
        assert_eq!(first.names().len(), 16);
        assert!(first.contains("status"));
        assert!(!first.contains("id"));
        assert!(!first.contains("Status"));
    }

    #[test]
    fn test_open_fields_from_first_record_only() {
        let fields = updatable_fields(&open_items(), FieldSampling::FirstRecord);
        assert_eq!(fields.names(), ["name"]);
        assert!(!fields.contains("id"));
        assert!(!fields.contains("region"));
        assert!(!fields.contains("_rid"));
    }

    #[test]
    fn test_open_fields_union_across_records() {
        let fields = updatable_fields(&open_items(), FieldSampling::AllRecords);
        assert_eq!(fields.names(), ["name", "region"]);
        assert_eq!(fields.to_string(), "name, region");
    }

    #[test]
    fn test_open_fields_of_empty_set() {
        let fields = updatable_fields::<OpenRecord>(&[], FieldSampling::FirstRecord);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_identity_only_records_have_nothing_to_update() {
        let items: Vec<OpenRecord> =
            vec![serde_json::from_value(json!({"id": "a", "_etag": "e"})).unwrap()];
        assert!(updatable_fields(&items, FieldSampling::AllRecords).is_empty());
    }
}
