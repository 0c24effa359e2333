//! Connection-graph merge engine
//!
//! Files are nodes and declared connections are undirected edges. A merge
//! seeds one output record per primary-file record, then walks the graph
//! depth-first from the primary file. Each newly reached file contributes its
//! selected fields to the output records whose join value matches, looked up
//! through a per-file join index.
//!
//! All structures here are rebuilt from an immutable [`MergeInput`] snapshot
//! on every merge.

pub mod graph;
pub mod index;
pub mod project;
pub mod propagate;

pub use graph::ConnectionGraph;
pub use index::{join_value, JoinIndex};
pub use project::{project, ResultSet};
pub use propagate::{merge, MergeOutput, MergeReport};

use crate::error::{MapperError, Result};
use crate::types::{Connection, FieldSelection, FileDataset, FileId};

/// Immutable view of everything a merge reads
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    /// Traversal root and seed of the output records
    pub primary: &'a FileId,
    pub files: &'a [FileDataset],
    pub connections: &'a [Connection],
    pub selections: &'a [FieldSelection],
}

impl<'a> MergeInput<'a> {
    pub fn new(
        primary: &'a FileId,
        files: &'a [FileDataset],
        connections: &'a [Connection],
        selections: &'a [FieldSelection],
    ) -> Self {
        MergeInput {
            primary,
            files,
            connections,
            selections,
        }
    }

    pub fn file(&self, id: &FileId) -> Option<&'a FileDataset> {
        self.files.iter().find(|file| file.id == *id)
    }

    /// Selected field paths of a file, in selection order
    pub fn selected_fields(&self, id: &FileId) -> Vec<&'a str> {
        self.selections
            .iter()
            .filter(|sel| sel.file_id == *id && sel.selected)
            .map(|sel| sel.field.as_str())
            .collect()
    }

    /// Fields of a file that take part in any connection.
    ///
    /// Source-role fields come first, then target-role fields; duplicates
    /// are dropped.
    pub fn connection_fields(&self, id: &FileId) -> Vec<&'a str> {
        let source_role = self
            .connections
            .iter()
            .filter(|conn| conn.source_file == *id)
            .map(|conn| conn.source_field.as_str());
        let target_role = self
            .connections
            .iter()
            .filter(|conn| conn.target_file == *id)
            .map(|conn| conn.target_field.as_str());

        let mut fields: Vec<&'a str> = Vec::new();
        for field in source_role.chain(target_role) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    /// Connections between two files, in declaration order
    pub fn connections_between<'s>(
        &'s self,
        a: &'s FileId,
        b: &'s FileId,
    ) -> impl Iterator<Item = &'a Connection> + 's {
        self.connections.iter().filter(move |conn| conn.joins(a, b))
    }
}

/// Reject merges with fewer than two files or no connections
pub fn check_preconditions(files: usize, connections: usize) -> Result<()> {
    if files < 2 || connections == 0 {
        return Err(MapperError::Precondition { files, connections });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionId, Structure};

    fn file(id: &str) -> FileDataset {
        FileDataset {
            id: FileId::new(id),
            name: format!("{}.json", id),
            structure: Structure::new(),
            records: vec![],
        }
    }

    fn conn(id: &str, source: (&str, &str), target: (&str, &str)) -> Connection {
        Connection {
            id: ConnectionId::new(id),
            source_file: FileId::new(source.0),
            source_field: source.1.to_string(),
            target_file: FileId::new(target.0),
            target_field: target.1.to_string(),
        }
    }

    #[test]
    fn test_connection_fields_union_source_first() {
        let files = vec![file("a"), file("b"), file("c")];
        let connections = vec![
            conn("1", ("c", "ref"), ("b", "id")),
            conn("2", ("b", "code"), ("a", "code")),
            conn("3", ("b", "id"), ("a", "b_id")),
        ];
        let primary = FileId::new("a");
        let input = MergeInput::new(&primary, &files, &connections, &[]);

        assert_eq!(input.connection_fields(&FileId::new("b")), vec!["code", "id"]);
        assert_eq!(input.connection_fields(&FileId::new("a")), vec!["code", "b_id"]);
        assert!(input.connection_fields(&FileId::new("z")).is_empty());
    }

    #[test]
    fn test_selected_fields_filters_deselected() {
        let files = vec![file("a"), file("b")];
        let selections = vec![
            FieldSelection { file_id: FileId::new("a"), field: "id".into(), selected: true },
            FieldSelection { file_id: FileId::new("a"), field: "secret".into(), selected: false },
            FieldSelection { file_id: FileId::new("b"), field: "v".into(), selected: true },
        ];
        let primary = FileId::new("a");
        let input = MergeInput::new(&primary, &files, &[], &selections);

        assert_eq!(input.selected_fields(&primary), vec!["id"]);
    }

    #[test]
    fn test_connections_between_either_direction() {
        let connections = vec![
            conn("1", ("a", "k"), ("b", "k")),
            conn("2", ("b", "x"), ("a", "y")),
            conn("3", ("b", "z"), ("c", "z")),
        ];
        let primary = FileId::new("a");
        let input = MergeInput::new(&primary, &[], &connections, &[]);
        let (a, b) = (FileId::new("a"), FileId::new("b"));

        let ids: Vec<_> = input.connections_between(&a, &b).map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_preconditions() {
        assert!(check_preconditions(2, 1).is_ok());
        assert!(matches!(
            check_preconditions(1, 3),
            Err(MapperError::Precondition { files: 1, connections: 3 })
        ));
        assert!(check_preconditions(4, 0).is_err());
    }
}
