//! Merge result storage and final projection

use crate::types::MergedRecord;
use std::collections::{HashMap, HashSet};

/// Result key: a connection field name and one of its join values.
///
/// Keys are shared by every file using the same field name, so a later hop
/// sees values registered by any earlier file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultKey {
    field: String,
    value: String,
}

/// Merged records plus the join keys that reach them.
///
/// Records live in an arena and keys refer to them by index, so a record
/// registered under several keys is mutated in one place. Keys remember
/// their first insertion order.
#[derive(Debug, Default)]
pub struct ResultSet {
    arena: Vec<MergedRecord>,
    order: Vec<ResultKey>,
    buckets: HashMap<ResultKey, Vec<usize>>,
}

impl ResultSet {
    pub fn new() -> Self {
        ResultSet::default()
    }

    /// Store a record and return its arena index
    pub fn push(&mut self, record: MergedRecord) -> usize {
        self.arena.push(record);
        self.arena.len() - 1
    }

    pub fn record_mut(&mut self, id: usize) -> Option<&mut MergedRecord> {
        self.arena.get_mut(id)
    }

    /// Register `id` as the only record under the key; a record previously
    /// registered there is dropped from the key
    pub fn replace(&mut self, field: &str, value: String, id: usize) {
        let key = ResultKey { field: field.to_string(), value };
        if !self.buckets.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.buckets.insert(key, vec![id]);
    }

    /// Add `id` to the records under the key
    pub fn append(&mut self, field: &str, value: String, id: usize) {
        let key = ResultKey { field: field.to_string(), value };
        match self.buckets.get_mut(&key) {
            Some(ids) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            None => {
                self.order.push(key.clone());
                self.buckets.insert(key, vec![id]);
            }
        }
    }

    /// Snapshot of `(join value, record)` pairs registered under a field
    pub fn entries_for(&self, field: &str) -> Vec<(String, usize)> {
        self.order
            .iter()
            .filter(|key| key.field == field)
            .flat_map(|key| {
                self.buckets
                    .get(key)
                    .into_iter()
                    .flatten()
                    .map(move |id| (key.value.clone(), *id))
            })
            .collect()
    }

    /// Number of registered keys
    pub fn key_count(&self) -> usize {
        self.order.len()
    }

    /// Arena indices reachable from any key, in key order, first appearance only
    pub fn reachable(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.order
            .iter()
            .filter_map(|key| self.buckets.get(key))
            .flatten()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Collect each reachable record once, in discovery order.
///
/// Records no key points at are discarded.
pub fn project(mut results: ResultSet) -> Vec<MergedRecord> {
    results
        .reachable()
        .into_iter()
        .map(|id| std::mem::take(&mut results.arena[id]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn record(value: Value) -> MergedRecord {
        match value {
            Value::Object(obj) => obj,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_shared_record_projected_once() {
        let mut results = ResultSet::new();
        let id = results.push(record(json!({"id": 1})));
        results.replace("id", "1".into(), id);
        results.replace("email", "a@x.io".into(), id);

        if let Some(rec) = results.record_mut(id) {
            rec.insert("extra".to_string(), json!(true));
        }

        let output = project(results);
        assert_eq!(output.len(), 1);
        assert_eq!(Value::Object(output[0].clone()), json!({"id": 1, "extra": true}));
    }

    #[test]
    fn test_replace_drops_previous_record() {
        let mut results = ResultSet::new();
        let first = results.push(record(json!({"n": 1})));
        let second = results.push(record(json!({"n": 2})));
        results.replace("k", "x".into(), first);
        results.replace("k", "x".into(), second);

        assert_eq!(results.key_count(), 1);
        let output = project(results);
        assert_eq!(output, vec![record(json!({"n": 2}))]);
    }

    #[test]
    fn test_append_keeps_every_record() {
        let mut results = ResultSet::new();
        let first = results.push(record(json!({"n": 1})));
        let second = results.push(record(json!({"n": 2})));
        results.append("k", "x".into(), first);
        results.append("k", "x".into(), second);
        results.append("k", "x".into(), first);

        assert_eq!(results.entries_for("k"), vec![("x".to_string(), first), ("x".to_string(), second)]);
    }

    #[test]
    fn test_entries_for_filters_field() {
        let mut results = ResultSet::new();
        let first = results.push(Map::new());
        let second = results.push(Map::new());
        results.replace("k", "1".into(), first);
        results.replace("j", "2".into(), first);
        results.append("k", "3".into(), second);

        assert_eq!(
            results.entries_for("k"),
            vec![("1".to_string(), first), ("3".to_string(), second)]
        );
        assert_eq!(results.entries_for("j"), vec![("2".to_string(), first)]);
        assert!(results.entries_for("missing").is_empty());
    }

    #[test]
    fn test_unregistered_records_are_discarded() {
        let mut results = ResultSet::new();
        results.push(record(json!({"orphan": true})));
        let kept = results.push(record(json!({"kept": true})));
        results.replace("k", "x".into(), kept);

        assert_eq!(project(results), vec![record(json!({"kept": true}))]);
    }

    #[test]
    fn test_discovery_order() {
        let mut results = ResultSet::new();
        let first = results.push(record(json!({"n": 1})));
        let second = results.push(record(json!({"n": 2})));
        results.replace("k", "b".into(), second);
        results.replace("k", "a".into(), first);
        results.replace("j", "z".into(), second);

        let output = project(results);
        assert_eq!(output, vec![record(json!({"n": 2})), record(json!({"n": 1}))]);
    }
}
