//! Depth-first propagation of fields across the connection graph

use super::graph::ConnectionGraph;
use super::index::{join_value, JoinIndex};
use super::project::{project, ResultSet};
use super::{check_preconditions, MergeInput};
use crate::error::{MapperError, Result};
use crate::structure::{get_nested_value, project_fields};
use crate::types::{FileDataset, FileId, MergedRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace};

/// Merged records and a summary of how they were produced
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub records: Vec<MergedRecord>,
    pub report: MergeReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub primary: FileId,

    /// Files whose fields were merged, primary first, in visit order
    pub merged_files: Vec<FileId>,

    /// Files with no connection path to the primary file
    pub unreachable_files: Vec<FileId>,

    pub record_count: usize,
}

/// Merge every file reachable from the primary file into one record set.
///
/// Fails without doing any work when fewer than two files or no connections
/// are given, or when the primary file is not among the files.
pub fn merge(input: &MergeInput<'_>) -> Result<MergeOutput> {
    check_preconditions(input.files.len(), input.connections.len())?;
    let primary = input
        .file(input.primary)
        .ok_or_else(|| MapperError::UnknownFile(input.primary.clone()))?;

    let mut merger = Merger::new(input);
    merger.seed(primary);

    let graph = ConnectionGraph::build(input.files, input.connections);
    let indexes: HashMap<&FileId, JoinIndex<'_>> = input
        .files
        .iter()
        .map(|file| (&file.id, JoinIndex::build(file, &input.connection_fields(&file.id))))
        .collect();

    let mut visited = HashSet::from([primary.id.clone()]);
    merger.visit_order.push(primary.id.clone());
    merger.propagate(&primary.id, &graph, &indexes, &mut visited);

    let unreachable_files: Vec<FileId> = input
        .files
        .iter()
        .filter(|file| !visited.contains(&file.id))
        .map(|file| file.id.clone())
        .collect();
    for file in &unreachable_files {
        debug!(file = %file, "file not connected to primary, skipped");
    }

    let Merger { results, visit_order, .. } = merger;
    let records = project(results);

    info!(
        primary = %primary.id,
        records = records.len(),
        files = visit_order.len(),
        "merge complete"
    );

    Ok(MergeOutput {
        report: MergeReport {
            primary: primary.id.clone(),
            merged_files: visit_order,
            unreachable_files,
            record_count: records.len(),
        },
        records,
    })
}

struct Merger<'i, 'a> {
    input: &'i MergeInput<'a>,
    results: ResultSet,
    visit_order: Vec<FileId>,
}

impl<'i, 'a> Merger<'i, 'a> {
    fn new(input: &'i MergeInput<'a>) -> Self {
        Merger {
            input,
            results: ResultSet::new(),
            visit_order: Vec::new(),
        }
    }

    /// One output record per primary record, registered under each of its
    /// connection field values
    fn seed(&mut self, primary: &FileDataset) {
        let selected = self.input.selected_fields(&primary.id);
        let connection_fields = self.input.connection_fields(&primary.id);

        for record in &primary.records {
            let mut merged = MergedRecord::new();
            project_fields(record, &selected, &mut merged);
            let id = self.results.push(merged);

            for field in &connection_fields {
                if let Some(value) = get_nested_value(record, field) {
                    self.results.replace(field, join_value(value), id);
                }
            }
        }

        debug!(
            file = %primary.id,
            records = primary.records.len(),
            keys = self.results.key_count(),
            "seeded results from primary file"
        );
    }

    fn propagate(
        &mut self,
        current: &FileId,
        graph: &ConnectionGraph,
        indexes: &HashMap<&FileId, JoinIndex<'a>>,
        visited: &mut HashSet<FileId>,
    ) {
        for neighbor in graph.neighbors(current) {
            if !visited.insert(neighbor.clone()) {
                continue;
            }
            self.visit_order.push(neighbor.clone());

            if let Some(index) = indexes.get(neighbor) {
                self.merge_neighbor(current, neighbor, index);
            }

            self.propagate(neighbor, graph, indexes, visited);
        }
    }

    /// Pull the neighbor's selected fields into every result record whose
    /// join value matches, through each connection between the two files
    fn merge_neighbor(&mut self, current: &FileId, neighbor: &FileId, index: &JoinIndex<'a>) {
        let selected = self.input.selected_fields(neighbor);
        let neighbor_fields = self.input.connection_fields(neighbor);
        let mut matched_count = 0usize;

        for conn in self.input.connections_between(current, neighbor) {
            let Some((source_field, target_field)) = conn.oriented_from(current) else {
                continue;
            };

            for (value, id) in self.results.entries_for(source_field) {
                let Some(matched) = index.get(target_field, &value) else {
                    trace!(connection = %conn.id, value = %value, "no match");
                    continue;
                };
                matched_count += 1;

                if let Some(record) = self.results.record_mut(id) {
                    project_fields(matched, &selected, record);
                }

                for field in &neighbor_fields {
                    if let Some(next) = get_nested_value(matched, field) {
                        self.results.append(field, join_value(next), id);
                    }
                }
            }
        }

        debug!(from = %current, to = %neighbor, matches = matched_count, "merged neighbor file");
    }
}
