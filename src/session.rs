//! Session state: ingested files, field selections and connections
//!
//! A [`Session`] is the mutable store the merge engine reads from. Merges
//! never read it directly; they take a [`MergeInput`] snapshot.

use crate::error::{MapperError, Result};
use crate::ingest::{normalize_records, parse_document};
use crate::merge::{self, check_preconditions, ConnectionGraph, MergeInput, MergeOutput};
use crate::structure::dataset_structure;
use crate::types::{Connection, ConnectionId, FieldSelection, FileDataset, FileId};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct Session {
    files: Vec<FileDataset>,
    connections: Vec<Connection>,
    selections: Vec<FieldSelection>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn files(&self) -> &[FileDataset] {
        &self.files
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn selections(&self) -> &[FieldSelection] {
        &self.selections
    }

    pub fn file(&self, id: &FileId) -> Option<&FileDataset> {
        self.files.iter().find(|file| file.id == *id)
    }

    /// Find a file by id, name or name without extension.
    ///
    /// A name or stem shared by several files is an error rather than a
    /// silent pick of the first one.
    pub fn find_file(&self, reference: &str) -> Result<Option<&FileDataset>> {
        if let Some(file) = self.files.iter().find(|file| file.id.as_str() == reference) {
            return Ok(Some(file));
        }

        let by_name: Vec<&FileDataset> = self.files.iter().filter(|file| file.name == reference).collect();
        let candidates = if by_name.is_empty() {
            self.files
                .iter()
                .filter(|file| {
                    Path::new(&file.name)
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .is_some_and(|stem| stem == reference)
                })
                .collect()
        } else {
            by_name
        };

        match candidates.as_slice() {
            [] => Ok(None),
            [file] => Ok(Some(*file)),
            _ => Err(MapperError::AmbiguousFile {
                reference: reference.to_string(),
                count: candidates.len(),
            }),
        }
    }

    /// Find a file by id, name, name without extension, or ingestion position
    pub fn resolve_file(&self, reference: &str) -> Result<&FileDataset> {
        if let Some(file) = self.find_file(reference)? {
            return Ok(file);
        }
        reference
            .parse::<usize>()
            .ok()
            .and_then(|idx| self.files.get(idx))
            .ok_or_else(|| MapperError::UnknownFile(FileId::new(reference)))
    }

    /// Add a parsed document as a new file.
    ///
    /// Every discovered field starts out selected.
    pub fn ingest_value(&mut self, name: impl Into<String>, document: Value) -> FileId {
        let name = name.into();
        let records = normalize_records(document);
        let structure = dataset_structure(&records);
        let id = FileId::generate();

        self.selections.extend(structure.paths().map(|path| FieldSelection {
            file_id: id.clone(),
            field: path.to_string(),
            selected: true,
        }));

        info!(file = %name, id = %id, records = records.len(), fields = structure.len(), "ingested file");

        self.files.push(FileDataset {
            id: id.clone(),
            name,
            structure,
            records,
        });
        id
    }

    /// Parse and add an uploaded file
    pub fn ingest_bytes(&mut self, name: impl Into<String>, bytes: &[u8]) -> Result<FileId> {
        let name = name.into();
        let document = parse_document(&name, bytes)?;
        Ok(self.ingest_value(name, document))
    }

    /// Add several uploads; a file that fails to parse does not affect the others
    pub fn ingest_batch<I, N>(&mut self, uploads: I) -> Vec<Result<FileId>>
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        uploads
            .into_iter()
            .map(|(name, bytes)| {
                let result = self.ingest_bytes(name, &bytes);
                if let Err(err) = &result {
                    warn!(error = %err, "skipping file");
                }
                result
            })
            .collect()
    }

    /// Remove a file with its selections and every connection touching it
    pub fn remove_file(&mut self, id: &FileId) -> Result<FileDataset> {
        let position = self
            .files
            .iter()
            .position(|file| file.id == *id)
            .ok_or_else(|| MapperError::UnknownFile(id.clone()))?;
        let removed = self.files.remove(position);

        let before = self.connections.len();
        self.connections.retain(|conn| !conn.touches(id));
        self.selections.retain(|sel| sel.file_id != *id);

        debug!(file = %id, connections_removed = before - self.connections.len(), "removed file");
        Ok(removed)
    }

    /// Declare that two fields of two different files hold equal values
    pub fn add_connection(
        &mut self,
        source_file: &FileId,
        source_field: impl Into<String>,
        target_file: &FileId,
        target_field: impl Into<String>,
    ) -> Result<ConnectionId> {
        if source_file == target_file {
            return Err(MapperError::SelfConnection(source_file.clone()));
        }
        for file in [source_file, target_file] {
            if self.file(file).is_none() {
                return Err(MapperError::UnknownFile(file.clone()));
            }
        }

        let connection = Connection {
            id: ConnectionId::generate(),
            source_file: source_file.clone(),
            source_field: source_field.into(),
            target_file: target_file.clone(),
            target_field: target_field.into(),
        };
        debug!(
            connection = %connection.id,
            source = %format!("{}#{}", connection.source_file, connection.source_field),
            target = %format!("{}#{}", connection.target_file, connection.target_field),
            "added connection"
        );

        let id = connection.id.clone();
        self.connections.push(connection);
        Ok(id)
    }

    /// Returns whether the connection existed
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|conn| conn.id != *id);
        before != self.connections.len()
    }

    pub fn is_selected(&self, file: &FileId, field: &str) -> Option<bool> {
        self.selections
            .iter()
            .find(|sel| sel.file_id == *file && sel.field == field)
            .map(|sel| sel.selected)
    }

    /// Flip a field's selection and return the new state
    pub fn toggle_selection(&mut self, file: &FileId, field: &str) -> Result<bool> {
        let selection = self.selection_mut(file, field)?;
        selection.selected = !selection.selected;
        Ok(selection.selected)
    }

    pub fn set_selection(&mut self, file: &FileId, field: &str, selected: bool) -> Result<()> {
        self.selection_mut(file, field)?.selected = selected;
        Ok(())
    }

    fn selection_mut(&mut self, file: &FileId, field: &str) -> Result<&mut FieldSelection> {
        self.selections
            .iter_mut()
            .find(|sel| sel.file_id == *file && sel.field == field)
            .ok_or_else(|| MapperError::UnknownField {
                file: file.clone(),
                field: field.to_string(),
            })
    }

    /// Drop all files, connections and selections
    pub fn reset(&mut self) {
        self.files.clear();
        self.connections.clear();
        self.selections.clear();
    }

    /// File adjacency for drawing connections
    pub fn graph(&self) -> ConnectionGraph {
        ConnectionGraph::build(&self.files, &self.connections)
    }

    /// Immutable view for a merge; the primary file defaults to the first one
    pub fn snapshot<'a>(&'a self, primary: Option<&'a FileId>) -> Result<MergeInput<'a>> {
        check_preconditions(self.files.len(), self.connections.len())?;
        let primary = match primary {
            Some(id) => id,
            None => &self.files[0].id,
        };
        Ok(MergeInput::new(primary, &self.files, &self.connections, &self.selections))
    }

    pub fn merge(&self, primary: Option<&FileId>) -> Result<MergeOutput> {
        let input = self.snapshot(primary)?;
        merge::merge(&input)
    }
}
