//! Resilient `PlantUML` processing for markdown documents.
//!
//! Diagrams found in a document (fenced `plantuml` blocks or image links to
//! `.puml` files) are classified, staged under a diagrams directory, rendered
//! through an external [`Renderer`] with bounded retries, validated, and
//! replaced by image links in a rewritten copy of the document.
//!
//! # Architecture
//!
//! - [`language`]: diagram type classification and reference documents
//! - [`naming`]: deterministic artifact names and directory layout
//! - [`troubleshoot`]: renderer failure classification
//! - [`validation`]: artifact checks and link generation
//! - [`processor`]: the four-stage workflow and document orchestration
//! - [`renderer`] / [`plantuml`]: the renderer seam and its `PlantUML` implementation
//!
//! # Example
//!
//! ```ignore
//! use rdiag_diagrams::{PlantUmlRenderer, ResilientProcessor};
//!
//! let renderer = PlantUmlRenderer::discover(None, None);
//! let mut processor = ResilientProcessor::new(renderer).max_attempts(3);
//! let outcome = processor.process_markdown(Path::new("docs/design.md"))?;
//! processor.save_error_log()?;
//! ```

mod consts;
mod error;
mod error_log;
mod extract;
pub mod language;
pub mod naming;
pub mod plantuml;
pub mod processor;
pub mod renderer;
mod setup;
pub mod troubleshoot;
pub mod validation;

pub use consts::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT, ERROR_LOG_FILENAME};
pub use error::ProcessError;
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use extract::{DiagramSource, Provenance, extract_diagrams, extract_title};
pub use language::{DiagramFormat, DiagramType, DiagramTypeIdentifier};
pub use naming::{ArtifactName, FileNamingConvention};
pub use plantuml::{PlantUmlCommand, PlantUmlRenderer};
pub use processor::{
    ConversionState, DocumentOutcome, InputKind, ProcessingResult, ResilientProcessor, SyntaxCheck,
};
pub use renderer::{RenderError, Renderer};
pub use setup::SetupReport;
pub use troubleshoot::{ErrorHandler, ErrorResolution};
pub use validation::ValidationEngine;
