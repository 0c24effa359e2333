//! Field discovery and dotted-path access over JSON records

use crate::types::{Structure, TypeLabel};
use serde_json::{Map, Value};

/// Derive the flattened field structure of a record.
///
/// Nested objects are flattened into `parent.child` paths. Arrays are
/// labeled `array` and never recursed into. A non-object record has no
/// fields.
pub fn extract_structure(record: &Value) -> Structure {
    let mut structure = Structure::new();
    if let Value::Object(obj) = record {
        collect_fields(obj, None, &mut structure);
    }
    structure
}

/// Derive the structure of a dataset from its first record only
pub fn dataset_structure(records: &[Value]) -> Structure {
    records.first().map(extract_structure).unwrap_or_default()
}

fn collect_fields(obj: &Map<String, Value>, prefix: Option<&str>, structure: &mut Structure) {
    for (key, value) in obj.iter() {
        let path = match prefix {
            Some(parent) => format!("{}.{}", parent, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => collect_fields(nested, Some(path.as_str()), structure),
            Value::Array(_) => structure.insert(path, TypeLabel::Array),
            scalar => structure.insert(path, TypeLabel::of(scalar)),
        }
    }
}

/// Look up a dotted path in a record.
///
/// Returns `None` when any step is missing or walks through a scalar.
/// Numeric steps index into arrays. A `null` leaf is a present value.
pub fn get_nested_value<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, key| match current {
        Value::Object(obj) => obj.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

/// Copy the listed fields of `record` into `target`, keyed by their path.
///
/// Fields missing from `record` are skipped; present ones overwrite any
/// existing value under the same path.
pub fn project_fields(record: &Value, fields: &[&str], target: &mut Map<String, Value>) {
    for field in fields {
        if let Some(value) = get_nested_value(record, field) {
            target.insert((*field).to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_record() {
        let structure = extract_structure(&json!({
            "id": "1",
            "count": 3,
            "active": true,
            "deleted_at": null
        }));

        let fields: Vec<_> = structure.iter().collect();
        assert_eq!(
            fields,
            vec![
                ("id", TypeLabel::String),
                ("count", TypeLabel::Number),
                ("active", TypeLabel::Boolean),
                ("deleted_at", TypeLabel::Object),
            ]
        );
    }

    #[test]
    fn test_nested_objects_are_flattened() {
        let structure = extract_structure(&json!({
            "user": {
                "name": "Alice",
                "address": {"city": "Hanoi"}
            },
            "tags": ["a", "b"]
        }));

        assert_eq!(structure.get("user.name"), Some(TypeLabel::String));
        assert_eq!(structure.get("user.address.city"), Some(TypeLabel::String));
        assert_eq!(structure.get("tags"), Some(TypeLabel::Array));
        assert!(!structure.contains("user"));
        assert_eq!(structure.len(), 3);
    }

    #[test]
    fn test_arrays_of_objects_not_recursed() {
        let structure = extract_structure(&json!({"posts": [{"id": 1}]}));
        assert_eq!(structure.get("posts"), Some(TypeLabel::Array));
        assert!(!structure.contains("posts.id"));
    }

    #[test]
    fn test_scalar_record_has_no_fields() {
        assert!(extract_structure(&json!(42)).is_empty());
        assert!(extract_structure(&json!(["a"])).is_empty());
    }

    #[test]
    fn test_only_first_record_is_sampled() {
        let records = vec![json!({"a": 1}), json!({"a": 2, "b": 3})];
        let structure = dataset_structure(&records);
        assert!(structure.contains("a"));
        assert!(!structure.contains("b"));
        assert!(dataset_structure(&[]).is_empty());
    }

    #[test]
    fn test_get_nested_value() {
        let record = json!({
            "user": {"profile": {"email": "a@b.c"}, "nick": null},
            "tags": ["x", "y"]
        });

        assert_eq!(get_nested_value(&record, "user.profile.email"), Some(&json!("a@b.c")));
        assert_eq!(get_nested_value(&record, "user.nick"), Some(&Value::Null));
        assert_eq!(get_nested_value(&record, "tags.1"), Some(&json!("y")));
        assert_eq!(get_nested_value(&record, "user.missing"), None);
        assert_eq!(get_nested_value(&record, "user.profile.email.domain"), None);
        assert_eq!(get_nested_value(&record, "user.nick.value"), None);
    }

    #[test]
    fn test_project_fields_skips_missing() {
        let record = json!({"id": 1, "meta": {"source": "crm"}});
        let mut target = Map::new();
        target.insert("id".to_string(), json!(0));

        project_fields(&record, &["id", "meta.source", "absent"], &mut target);

        assert_eq!(Value::Object(target), json!({"id": 1, "meta.source": "crm"}));
    }
}
