//! Per-file lookup from (field, join value) to record

use crate::structure::get_nested_value;
use crate::types::FileDataset;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// Lookup from `(field path, join value)` to the record holding that value.
///
/// Keyed field first, then value, so a value containing a separator can
/// never be confused with another field's key. When several records share a
/// value the last one wins.
#[derive(Debug, Default)]
pub struct JoinIndex<'a> {
    by_field: HashMap<&'a str, HashMap<String, &'a Value>>,
}

impl<'a> JoinIndex<'a> {
    /// Index every record of `file` by each of `fields`.
    ///
    /// Records where a field is missing are not indexed under that field.
    pub fn build(file: &'a FileDataset, fields: &[&'a str]) -> Self {
        let mut by_field: HashMap<&'a str, HashMap<String, &'a Value>> = HashMap::new();

        for record in &file.records {
            for field in fields {
                if let Some(value) = get_nested_value(record, field) {
                    let key = join_value(value);
                    let values = by_field.entry(*field).or_default();
                    if values.insert(key, record).is_some() {
                        trace!(file = %file.id, field = *field, "join value collision, later record wins");
                    }
                }
            }
        }

        JoinIndex { by_field }
    }

    pub fn get(&self, field: &str, value: &str) -> Option<&'a Value> {
        self.by_field.get(field).and_then(|values| values.get(value)).copied()
    }

    /// Total number of (field, value) entries
    pub fn len(&self) -> usize {
        self.by_field.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// String form of a value used for joining.
///
/// Follows the upload format's string coercion: strings verbatim, integral
/// numbers without a fraction, `null` as `"null"`, arrays joined with `,`
/// and objects as `"[object Object]"`. Number 7 and string "7" therefore
/// join with each other.
pub fn join_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return n.to_string();
            }
            match n.as_f64() {
                Some(f) if f == 0.0 => "0".to_string(),
                Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
                _ => n.to_string(),
            }
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => join_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileId, Structure};
    use serde_json::json;

    fn dataset(records: Vec<Value>) -> FileDataset {
        FileDataset {
            id: FileId::new("f"),
            name: "f.json".to_string(),
            structure: Structure::new(),
            records,
        }
    }

    #[test]
    fn test_join_value_coercion() {
        assert_eq!(join_value(&json!("x:y")), "x:y");
        assert_eq!(join_value(&json!(7)), "7");
        assert_eq!(join_value(&json!(7.0)), "7");
        assert_eq!(join_value(&json!(-0.0)), "0");
        assert_eq!(join_value(&json!(2.5)), "2.5");
        assert_eq!(join_value(&json!(true)), "true");
        assert_eq!(join_value(&Value::Null), "null");
        assert_eq!(join_value(&json!([1, null, "a"])), "1,,a");
        assert_eq!(join_value(&json!({"a": 1})), "[object Object]");
    }

    #[test]
    fn test_index_by_each_field() {
        let file = dataset(vec![
            json!({"id": 1, "email": "a@x.io"}),
            json!({"id": 2, "email": "b@x.io"}),
        ]);
        let index = JoinIndex::build(&file, &["id", "email"]);

        assert_eq!(index.len(), 4);
        assert_eq!(index.get("id", "2"), Some(&file.records[1]));
        assert_eq!(index.get("email", "a@x.io"), Some(&file.records[0]));
        assert_eq!(index.get("email", "2"), None);
    }

    #[test]
    fn test_last_record_wins_on_collision() {
        let file = dataset(vec![
            json!({"k": "x", "v": "first"}),
            json!({"k": "x", "v": "second"}),
        ]);
        let index = JoinIndex::build(&file, &["k"]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("k", "x").unwrap()["v"], "second");
    }

    #[test]
    fn test_missing_field_not_indexed() {
        let file = dataset(vec![json!({"other": 1}), json!({"user": {"id": "u1"}})]);
        let index = JoinIndex::build(&file, &["user.id"]);

        assert_eq!(index.len(), 1);
        assert!(index.get("user.id", "u1").is_some());
        assert!(index.get("user.id", "undefined").is_none());
    }

    #[test]
    fn test_numeric_and_string_values_collide() {
        let file = dataset(vec![json!({"k": 7, "src": "number"}), json!({"k": "7", "src": "string"})]);
        let index = JoinIndex::build(&file, &["k"]);

        assert_eq!(index.get("k", "7").unwrap()["src"], "string");
    }

    #[test]
    fn test_separator_in_value_does_not_leak_across_fields() {
        let file = dataset(vec![json!({"a": "b:c", "a:b": "c"})]);
        let index = JoinIndex::build(&file, &["a"]);

        assert!(index.get("a", "b:c").is_some());
        assert!(index.get("a:b", "c").is_none());
    }
}
