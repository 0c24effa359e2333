//! Undirected file adjacency derived from declared connections

use crate::types::{Connection, FileDataset, FileId};
use std::collections::HashMap;
use tracing::warn;

/// File id to directly connected file ids.
///
/// Nodes and neighbor lists keep insertion order so traversal is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionGraph {
    nodes: Vec<FileId>,
    adjacency: HashMap<FileId, Vec<FileId>>,
}

impl ConnectionGraph {
    /// Build the graph over `files`.
    ///
    /// Every file is a node even without connections. Connections naming a
    /// file outside `files`, or the same file on both ends, add no edge.
    pub fn build(files: &[FileDataset], connections: &[Connection]) -> Self {
        let mut graph = ConnectionGraph::default();

        for file in files {
            if !graph.adjacency.contains_key(&file.id) {
                graph.nodes.push(file.id.clone());
                graph.adjacency.insert(file.id.clone(), Vec::new());
            }
        }

        for conn in connections {
            if conn.source_file == conn.target_file {
                warn!(connection = %conn.id, file = %conn.source_file, "ignoring self-connection");
                continue;
            }
            if !graph.contains(&conn.source_file) || !graph.contains(&conn.target_file) {
                warn!(connection = %conn.id, "ignoring connection to unknown file");
                continue;
            }
            graph.link(&conn.source_file, &conn.target_file);
            graph.link(&conn.target_file, &conn.source_file);
        }

        graph
    }

    fn link(&mut self, from: &FileId, to: &FileId) {
        if let Some(neighbors) = self.adjacency.get_mut(from) {
            if !neighbors.contains(to) {
                neighbors.push(to.clone());
            }
        }
    }

    /// Directly connected files; empty for unknown ids
    pub fn neighbors(&self, id: &FileId) -> &[FileId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.adjacency.contains_key(id)
    }

    pub fn nodes(&self) -> &[FileId] {
        &self.nodes
    }

    /// Number of distinct undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }
}
