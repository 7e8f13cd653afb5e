//! Renderer abstraction.
//!
//! The processor only needs two operations from the external toolchain:
//! turn a staged source file into an image, and check source syntax.
//! A failure's `Display` text is the diagnostic fed to the error handler.

use std::io;
use std::path::Path;
use std::time::Duration;

use crate::language::DiagramFormat;

/// Error reported by a [`Renderer`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No usable `PlantUML` installation was found.
    #[error(
        "PlantUML not found. Install it (e.g. `brew install plantuml`), download plantuml.jar \
         from https://plantuml.com/download, or set PLANTUML_JAR"
    )]
    NotInstalled,
    /// The renderer process could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The renderer did not finish within the timeout and was killed.
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
    /// The renderer exited unsuccessfully.
    #[error("{message}")]
    Failed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured stderr, else stdout, else a placeholder.
        message: String,
    },
    /// I/O error while preparing the invocation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// External diagram renderer.
///
/// `render` must leave the image at `output_dir/<source stem>.<format>`.
pub trait Renderer {
    /// Render the staged source file into `output_dir`.
    fn render(
        &self,
        source_path: &Path,
        output_dir: &Path,
        format: DiagramFormat,
    ) -> Result<(), RenderError>;

    /// Check diagram source syntax without producing an image.
    fn check_syntax(&self, source: &str) -> Result<(), RenderError>;
}
