//! Serializable ingest job configuration.
//!
//! A job file captures everything needed to reproduce a run: the date
//! range and ticker selection, the bundle location, and the sink target.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::ingest::CommitMode;
use crate::sink::DEFAULT_TABLE;

/// A complete ingest job, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    pub job: JobSection,
    pub bundle: BundleSection,
    pub sink: SinkSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSection {
    /// Inclusive range start.
    pub start_date: NaiveDate,
    /// Inclusive range end.
    pub end_date: NaiveDate,
    /// Explicit tickers, in order. Empty or absent means the full universe.
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default = "default_mode")]
    pub mode: CommitMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleSection {
    /// Bundle root directory.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkSection {
    /// SQLite database file.
    pub db: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_mode() -> CommitMode {
    CommitMode::Single
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl JobConfig {
    /// Load a job from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, IngestError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Config(format!("read job file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse a job from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, IngestError> {
        toml::from_str(content).map_err(|e| IngestError::Config(format!("parse job TOML: {e}")))
    }
}
