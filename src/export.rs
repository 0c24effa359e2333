//! Writing merged records out

use crate::error::{MapperError, Result};
use crate::types::MergedRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single JSON array
    #[default]
    Json,
    /// One JSON object per line
    Ndjson,
}

/// Serializes merged records to any writer
pub struct RecordWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) a file, creating missing parent directories
    pub fn create<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(RecordWriter::new(BufWriter::new(file), format))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        RecordWriter {
            writer,
            format,
            pretty: true,
        }
    }

    /// Indent JSON output with two spaces; ignored for NDJSON
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Write all records and return how many were written
    pub fn write_records(&mut self, records: &[MergedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Err(MapperError::NothingToExport);
        }

        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, records)?;
                } else {
                    serde_json::to_writer(&mut self.writer, records)?;
                }
                writeln!(self.writer)?;
            }
            OutputFormat::Ndjson => {
                for record in records {
                    serde_json::to_writer(&mut self.writer, record)?;
                    writeln!(self.writer)?;
                }
            }
        }
        Ok(records.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
