//! Run-level errors.
//!
//! Diagram-level failures are recorded in [`crate::ProcessingResult`]; only
//! problems that stop a whole run surface here.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error(
        "Unsupported input file type: {} (expected .md, .markdown, .puml or .plantuml)",
        .0.display()
    )]
    UnsupportedInput(PathBuf),
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize error log: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ProcessError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
