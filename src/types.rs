use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier of an ingested file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    /// Generate a fresh id for a newly ingested file
    pub fn generate() -> Self {
        FileId(format!("file-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a declared connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        ConnectionId(id.into())
    }

    pub fn generate() -> Self {
        ConnectionId(format!("connection-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type label shown next to a field path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeLabel {
    String,
    Number,
    Boolean,
    /// Also used for `null`, which has no type of its own in the upload format
    Object,
    Array,
}

impl TypeLabel {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => TypeLabel::String,
            Value::Number(_) => TypeLabel::Number,
            Value::Bool(_) => TypeLabel::Boolean,
            Value::Array(_) => TypeLabel::Array,
            Value::Null | Value::Object(_) => TypeLabel::Object,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeLabel::String => "string",
            TypeLabel::Number => "number",
            TypeLabel::Boolean => "boolean",
            TypeLabel::Object => "object",
            TypeLabel::Array => "array",
        }
    }
}

impl fmt::Display for TypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattened field path to type label mapping, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    fields: Vec<(String, TypeLabel)>,
    /// Path to position in `fields`
    positions: HashMap<String, usize>,
}

impl Structure {
    pub fn new() -> Self {
        Structure::default()
    }

    /// Insert a path, overwriting the label of an identical path in place
    pub fn insert(&mut self, path: impl Into<String>, label: TypeLabel) {
        let path = path.into();
        match self.positions.get(&path) {
            Some(&idx) => self.fields[idx].1 = label,
            None => {
                self.positions.insert(path.clone(), self.fields.len());
                self.fields.push((path, label));
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<TypeLabel> {
        self.positions.get(path).map(|&idx| self.fields[idx].1)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(path, _)| path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeLabel)> {
        self.fields.iter().map(|(path, label)| (path.as_str(), *label))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Structure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (path, label) in &self.fields {
            map.serialize_entry(path, label)?;
        }
        map.end()
    }
}

/// An ingested dataset
#[derive(Debug, Clone, Serialize)]
pub struct FileDataset {
    pub id: FileId,

    /// Uploaded file name, e.g. "users.json"
    pub name: String,

    /// Fields discovered in the first record
    pub structure: Structure,

    /// Records in source order
    pub records: Vec<Value>,
}

/// Whether a field of a file is projected into merge output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelection {
    pub file_id: FileId,
    pub field: String,
    pub selected: bool,
}

/// A declared equality between a field of one file and a field of another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_file: FileId,
    pub source_field: String,
    pub target_file: FileId,
    pub target_field: String,
}

impl Connection {
    pub fn touches(&self, file: &FileId) -> bool {
        self.source_file == *file || self.target_file == *file
    }

    /// True if this connection links `a` and `b` in either direction
    pub fn joins(&self, a: &FileId, b: &FileId) -> bool {
        (self.source_file == *a && self.target_file == *b)
            || (self.source_file == *b && self.target_file == *a)
    }

    /// Orient the connection away from `frontier`.
    ///
    /// Returns `(frontier_field, other_field)`, or `None` if `frontier` is not
    /// an endpoint.
    pub fn oriented_from(&self, frontier: &FileId) -> Option<(&str, &str)> {
        if self.source_file == *frontier {
            Some((self.source_field.as_str(), self.target_field.as_str()))
        } else if self.target_file == *frontier {
            Some((self.target_field.as_str(), self.source_field.as_str()))
        } else {
            None
        }
    }
}

/// One output row: selected field path to value
pub type MergedRecord = Map<String, Value>;
