use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Malformed import syntax inside a single file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("unterminated import statement at line {line}")]
    Unterminated { line: usize },
    #[error("invalid import at line {line}: {detail}")]
    Invalid { line: usize, detail: String },
    #[error("file is not valid UTF-8")]
    InvalidUtf8,
}

/// An import specifier that does not point at any file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("could not resolve import \"{specifier}\" from {}", from.display())]
pub struct UnresolvedImportError {
    pub specifier: String,
    pub from: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NodeErrorKind {
    Read,
    Extraction,
    UnresolvedImport,
}

/// Non-fatal error recorded on a module node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeError {
    pub kind: NodeErrorKind,
    pub message: String,
}

impl NodeError {
    pub fn new(kind: NodeErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl From<ExtractionError> for NodeError {
    fn from(e: ExtractionError) -> Self {
        Self::new(NodeErrorKind::Extraction, e.to_string())
    }
}

impl From<UnresolvedImportError> for NodeError {
    fn from(e: UnresolvedImportError) -> Self {
        Self::new(NodeErrorKind::UnresolvedImport, e.to_string())
    }
}

/// Fatal errors: these stop a run before any output is produced.
#[derive(Debug, Error)]
pub enum DepTreeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no entry files: {0}")]
    NoEntryFiles(String),

    #[error("failed to read entry file {}: {source}", path.display())]
    EntryRead { path: PathBuf, source: std::io::Error },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("graph build cancelled")]
    Cancelled,

    #[error("terminal error: {0}")]
    Terminal(String),
}
