//! TOML mapping files and `FILE#FIELD` references.
//!
//! A mapping file declares which files to merge and how they connect:
//!
//! ```toml
//! primary = "users.json"
//! files = ["users.json", "orders.json"]
//! exclude = ["orders.json#internal_id"]
//!
//! [[connections]]
//! source = "users.json#id"
//! target = "orders.json#user_id"
//!
//! [output]
//! format = "json"   # json | ndjson
//! pretty = true
//! path = "merged.json"
//! ```
//!
//! Relative file paths are resolved against the mapping file's directory.

use crate::export::OutputFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static FIELD_REF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<file>[^#=]+)#(?P<field>[^#=]+)$").unwrap()
});

static CONNECTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<source>[^=]+)=(?P<target>[^=]+)$").unwrap()
});

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Mapping file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read mapping file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse mapping file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid field reference '{0}': expected FILE#FIELD")]
    InvalidFieldRef(String),

    #[error("Invalid connection '{0}': expected FILE#FIELD=FILE#FIELD")]
    InvalidConnection(String),
}

/// A field of a file named by file reference (name, stem or position)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub file: String,
    pub field: String,
}

impl FromStr for FieldRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = FIELD_REF_REGEX
            .captures(s.trim())
            .ok_or_else(|| ConfigError::InvalidFieldRef(s.to_string()))?;
        Ok(FieldRef {
            file: caps["file"].trim().to_string(),
            field: caps["field"].trim().to_string(),
        })
    }
}

/// `FILE#FIELD=FILE#FIELD`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub source: FieldRef,
    pub target: FieldRef,
}

impl FromStr for ConnectionSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = CONNECTION_REGEX
            .captures(s.trim())
            .ok_or_else(|| ConfigError::InvalidConnection(s.to_string()))?;
        let invalid = |_: ConfigError| ConfigError::InvalidConnection(s.to_string());
        Ok(ConnectionSpec {
            source: caps["source"].parse().map_err(invalid)?,
            target: caps["target"].parse().map_err(invalid)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionEntry {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub pretty: bool,
    pub path: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            format: OutputFormat::Json,
            pretty: true,
            path: None,
        }
    }
}

/// Root of a mapping file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MappingConfig {
    /// File reference of the traversal root; defaults to the first file
    pub primary: Option<String>,
    pub files: Vec<PathBuf>,
    /// `FILE#FIELD` entries to leave out of the output
    pub exclude: Vec<String>,
    pub connections: Vec<ConnectionEntry>,
    pub output: OutputSettings,
}

impl MappingConfig {
    /// Load a mapping file, resolving relative paths against its directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for file in self.files.iter_mut() {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
        if let Some(out) = self.output.path.as_mut() {
            if out.is_relative() {
                *out = base.join(&*out);
            }
        }
    }

    pub fn connection_specs(&self) -> Result<Vec<ConnectionSpec>, ConfigError> {
        self.connections
            .iter()
            .map(|entry| -> Result<ConnectionSpec, ConfigError> {
                Ok(ConnectionSpec {
                    source: entry.source.parse()?,
                    target: entry.target.parse()?,
                })
            })
            .collect()
    }

    pub fn exclusions(&self) -> Result<Vec<FieldRef>, ConfigError> {
        self.exclude.iter().map(|entry| entry.parse()).collect()
    }
}
