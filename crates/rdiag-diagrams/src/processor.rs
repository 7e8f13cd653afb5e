//! Four-stage diagram workflow and document orchestration.
//!
//! Each diagram goes through, in order:
//! 1. identify its type and reference document
//! 2. name and stage its source under the diagrams directory
//! 3. convert, retrying immediately up to the attempt cap
//! 4. validate the image and build the replacement link
//!
//! Diagram failures are data in [`ProcessingResult`]; they never abort the
//! rest of the document.

use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use crate::consts::{DEFAULT_DIAGRAMS_DIR, DEFAULT_MAX_ATTEMPTS, SOURCE_EXTENSION};
use crate::error::ProcessError;
use crate::error_log::{ErrorLog, ErrorLogEntry};
use crate::extract::extract_diagrams;
use crate::language::{DiagramFormat, DiagramType, DiagramTypeIdentifier};
use crate::naming::{ArtifactName, FileNamingConvention};
use crate::renderer::Renderer;
use crate::troubleshoot::{ErrorHandler, ErrorResolution};
use crate::validation::ValidationEngine;

const DEFAULT_REFERENCES_DIR: &str = "references";
const DEFAULT_TROUBLESHOOTING_DIR: &str = "references/troubleshooting";

/// Message recorded when the renderer reports success but left no usable image.
pub const MISSING_IMAGE_MESSAGE: &str = "Image file not created despite successful conversion";

/// Kind of input accepted by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Markdown document with embedded or linked diagrams.
    Markdown,
    /// Standalone diagram source file.
    Diagram,
}

impl InputKind {
    /// Check that `path` exists and has a supported extension.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InputNotFound`] or [`ProcessError::UnsupportedInput`].
    pub fn detect(path: &Path) -> Result<Self, ProcessError> {
        if !path.exists() {
            return Err(ProcessError::InputNotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("md" | "markdown") => Ok(Self::Markdown),
            Some("puml" | "plantuml") => Ok(Self::Diagram),
            _ => Err(ProcessError::UnsupportedInput(path.to_path_buf())),
        }
    }
}

/// Retry loop state of one diagram's conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Pending,
    /// Attempt `attempt` (1-based) is running.
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed and another one is allowed.
    Retrying { attempt: u32 },
    Succeeded { attempt: u32 },
    /// Every allowed attempt failed.
    Exhausted { attempts: u32 },
}

impl ConversionState {
    /// Start the next attempt. Terminal states are left unchanged.
    #[must_use]
    pub fn begin(self) -> Self {
        match self {
            Self::Pending => Self::Attempting { attempt: 1 },
            Self::Retrying { attempt } => Self::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    /// Record the outcome of the running attempt.
    #[must_use]
    pub fn finish(self, success: bool, max_attempts: u32) -> Self {
        match self {
            Self::Attempting { attempt } if success => Self::Succeeded { attempt },
            Self::Attempting { attempt } if attempt >= max_attempts => {
                Self::Exhausted { attempts: attempt }
            }
            Self::Attempting { attempt } => Self::Retrying { attempt },
            other => other,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }

    /// Number of attempts made so far.
    #[must_use]
    pub fn attempts(self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Attempting { attempt }
            | Self::Retrying { attempt }
            | Self::Succeeded { attempt } => attempt,
            Self::Exhausted { attempts } => attempts,
        }
    }
}

/// Outcome of one diagram's workflow.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub diagram_type: DiagramType,
    /// Reference document for the diagram type.
    pub reference_path: PathBuf,
    pub artifact_name: ArtifactName,
    /// Staged diagram source.
    pub source_path: PathBuf,
    /// Rendered image, set once validated.
    pub image_path: Option<PathBuf>,
    /// Replacement link, set once validated.
    pub markdown_link: Option<String>,
    /// The renderer reported success.
    pub converted: bool,
    /// Converted and validated.
    pub success: bool,
    pub attempts: u32,
    pub validation_error: Option<String>,
    /// One entry per failed attempt.
    pub errors: Vec<ErrorResolution>,
    pub external_search_needed: bool,
    /// Fallback queries from the latest unresolved failure.
    pub search_queries: Vec<String>,
}

/// Result of processing a whole markdown document.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    /// One result per processed diagram, in document order.
    pub results: Vec<ProcessingResult>,
    /// Document text with every validated diagram replaced by its link.
    pub rewritten: String,
    /// Diagrams left unprocessed because the run deadline passed.
    pub skipped: usize,
}

impl DocumentOutcome {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Every diagram of the document was processed and validated.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.skipped == 0 && self.results.iter().all(|r| r.success)
    }
}

/// Syntax validation outcome for one diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxCheck {
    pub ordinal: usize,
    pub diagram_type: DiagramType,
    pub reference_path: PathBuf,
    pub valid: bool,
    /// Renderer diagnostic for invalid sources.
    pub diagnostic: Option<String>,
}

/// Where one document's artifacts go and how links to them are written.
struct Layout {
    naming: FileNamingConvention,
    validator: ValidationEngine,
}

/// Runs diagrams through the four-stage workflow with bounded retries.
pub struct ResilientProcessor<R> {
    renderer: R,
    identifier: DiagramTypeIdentifier,
    error_handler: ErrorHandler,
    format: DiagramFormat,
    max_attempts: u32,
    base_dir: Option<PathBuf>,
    diagrams_dir_name: String,
    deadline: Option<Instant>,
    error_log: ErrorLog,
    /// Diagrams directory of the most recent run, where the error log is saved.
    last_diagrams_dir: PathBuf,
}

impl<R: Renderer> ResilientProcessor<R> {
    #[must_use]
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            identifier: DiagramTypeIdentifier::new(DEFAULT_REFERENCES_DIR),
            error_handler: ErrorHandler::new(DEFAULT_TROUBLESHOOTING_DIR),
            format: DiagramFormat::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_dir: None,
            diagrams_dir_name: DEFAULT_DIAGRAMS_DIR.to_owned(),
            deadline: None,
            error_log: ErrorLog::default(),
            last_diagrams_dir: PathBuf::from(DEFAULT_DIAGRAMS_DIR),
        }
    }

    /// Image format to render. Default is PNG.
    #[must_use]
    pub fn format(mut self, format: DiagramFormat) -> Self {
        self.format = format;
        self
    }

    /// Conversion attempts per diagram, at least one. Default is 3.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Directory that receives the diagrams directory.
    ///
    /// Without it, documents use their own directory and standalone
    /// diagrams the current directory.
    #[must_use]
    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Name of the diagrams directory under the base directory.
    #[must_use]
    pub fn diagrams_dir_name(mut self, name: impl Into<String>) -> Self {
        self.diagrams_dir_name = name.into();
        self
    }

    #[must_use]
    pub fn references_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.identifier = DiagramTypeIdentifier::new(dir);
        self
    }

    #[must_use]
    pub fn troubleshooting_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.error_handler = ErrorHandler::new(dir);
        self
    }

    /// Stop starting new diagrams once `deadline` has passed.
    ///
    /// A diagram already in progress always runs to completion.
    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Failed attempts recorded so far.
    #[must_use]
    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Diagrams directory of the most recent run.
    #[must_use]
    pub fn diagrams_dir(&self) -> &Path {
        &self.last_diagrams_dir
    }

    /// Persist the error log into the most recent diagrams directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be serialized or written.
    pub fn save_error_log(&self) -> Result<Option<PathBuf>, ProcessError> {
        self.error_log.save(&self.last_diagrams_dir)
    }

    /// Process one diagram source.
    ///
    /// Artifacts go under the configured base directory (default: current
    /// directory) and the link is relative to it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the source cannot be staged on disk.
    pub fn process_diagram(
        &mut self,
        source: &str,
        document_name: &str,
        ordinal: usize,
        title: Option<&str>,
    ) -> Result<ProcessingResult, ProcessError> {
        let base = self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let layout = self.layout(&base, &base);
        self.run_workflow(&layout, source, document_name, ordinal, title)
    }

    /// Process a standalone diagram file as the single diagram of a document
    /// named after the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the source cannot be staged.
    pub fn process_diagram_file(&mut self, path: &Path) -> Result<ProcessingResult, ProcessError> {
        let source = std::fs::read_to_string(path).map_err(|e| ProcessError::io(path, e))?;
        let layout = self.document_layout(path);
        self.run_workflow(&layout, &source, &document_stem(path), 1, None)
    }

    /// Process every diagram of a markdown document.
    ///
    /// Diagrams are numbered in document order. Validated diagrams are
    /// replaced by their links, last occurrence first, so earlier spans keep
    /// their offsets. Failed diagrams keep their original text.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or a source cannot be staged.
    pub fn process_markdown(&mut self, path: &Path) -> Result<DocumentOutcome, ProcessError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProcessError::io(path, e))?;
        let diagrams = extract_diagrams(&content, path);
        tracing::info!("found {} diagram(s) in {}", diagrams.len(), path.display());

        let layout = self.document_layout(path);
        let document_name = document_stem(path);

        let mut results = Vec::with_capacity(diagrams.len());
        let mut replacements = Vec::new();
        let mut skipped = 0;

        for (index, diagram) in diagrams.iter().enumerate() {
            if self.deadline_passed() {
                skipped = diagrams.len() - index;
                tracing::warn!("run deadline passed, skipping {skipped} remaining diagram(s)");
                break;
            }

            let title = diagram.title();
            let result = self.run_workflow(
                &layout,
                &diagram.text,
                &document_name,
                index + 1,
                title.as_deref(),
            )?;
            if let (true, Some(link)) = (result.success, &result.markdown_link) {
                replacements.push((diagram.span.clone(), link.clone()));
            }
            results.push(result);
        }

        Ok(DocumentOutcome {
            results,
            rewritten: apply_replacements(&content, replacements),
            skipped,
        })
    }

    /// Classify and syntax-check one diagram without converting it.
    #[must_use]
    pub fn validate_diagram(&self, source: &str, ordinal: usize) -> SyntaxCheck {
        let diagram_type = DiagramTypeIdentifier::identify_from_content(source);
        let reference_path = self.identifier.get_reference_path(diagram_type);
        let diagnostic = self.renderer.check_syntax(source).err().map(|e| e.to_string());
        if let Some(diagnostic) = &diagnostic {
            tracing::warn!(ordinal, "syntax check failed: {diagnostic}");
        }
        SyntaxCheck {
            ordinal,
            diagram_type,
            reference_path,
            valid: diagnostic.is_none(),
            diagnostic,
        }
    }

    /// Syntax-check every diagram of a markdown document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn validate_markdown(&self, path: &Path) -> Result<Vec<SyntaxCheck>, ProcessError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProcessError::io(path, e))?;
        Ok(extract_diagrams(&content, path)
            .iter()
            .enumerate()
            .map(|(index, diagram)| self.validate_diagram(&diagram.text, index + 1))
            .collect())
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Layout for a document: base directory override or the document's own directory.
    fn document_layout(&mut self, document: &Path) -> Layout {
        let document_dir = document.parent().unwrap_or(Path::new(".")).to_path_buf();
        let base = self.base_dir.clone().unwrap_or_else(|| document_dir.clone());
        self.layout(&base, &document_dir)
    }

    fn layout(&mut self, base: &Path, link_root: &Path) -> Layout {
        let naming = FileNamingConvention::with_dir_name(base, &self.diagrams_dir_name);
        let prefix = link_prefix(naming.diagrams_dir(), link_root);
        let validator = ValidationEngine::new(naming.diagrams_dir(), prefix);
        self.last_diagrams_dir = naming.diagrams_dir().to_path_buf();
        Layout { naming, validator }
    }

    fn run_workflow(
        &mut self,
        layout: &Layout,
        source: &str,
        document_name: &str,
        ordinal: usize,
        title: Option<&str>,
    ) -> Result<ProcessingResult, ProcessError> {
        // Stage 1: identify
        let diagram_type = DiagramTypeIdentifier::identify_from_content(source);
        let reference_path = self.identifier.get_reference_path(diagram_type);
        tracing::info!(
            ordinal,
            %diagram_type,
            reference = %reference_path.display(),
            "identified diagram type"
        );

        // Stage 2: name and stage
        let diagrams_dir = layout
            .naming
            .ensure_directory()
            .map_err(|e| ProcessError::io(layout.naming.diagrams_dir(), e))?;
        let name =
            FileNamingConvention::generate_filename(document_name, ordinal, diagram_type, title);
        let source_path = layout.naming.get_full_path(&name, SOURCE_EXTENSION);
        std::fs::write(&source_path, source).map_err(|e| ProcessError::io(&source_path, e))?;
        tracing::info!("staged {}", source_path.display());

        let mut result = ProcessingResult {
            diagram_type,
            reference_path,
            artifact_name: name.clone(),
            source_path,
            image_path: None,
            markdown_link: None,
            converted: false,
            success: false,
            attempts: 0,
            validation_error: None,
            errors: Vec::new(),
            external_search_needed: false,
            search_queries: Vec::new(),
        };

        // Stage 3: convert with bounded retry
        let mut state = ConversionState::Pending;
        while !state.is_terminal() {
            state = state.begin();
            let ConversionState::Attempting { attempt } = state else {
                break;
            };

            let succeeded = match self
                .renderer
                .render(&result.source_path, diagrams_dir, self.format)
            {
                Ok(()) => {
                    tracing::info!(attempt, "converted {name}");
                    true
                }
                Err(err) => {
                    let diagnostic = err.to_string();
                    tracing::warn!(attempt, "conversion of {name} failed: {diagnostic}");
                    let resolution =
                        self.error_handler
                            .handle_error(&diagnostic, source, Some(diagram_type));
                    self.error_log.push(ErrorLogEntry::new(&name, &resolution));
                    if !resolution.resolved {
                        result.external_search_needed = true;
                        result.search_queries.clone_from(&resolution.search_queries);
                    }
                    result.errors.push(resolution);
                    false
                }
            };
            state = state.finish(succeeded, self.max_attempts);
        }
        result.attempts = state.attempts();
        result.converted = matches!(state, ConversionState::Succeeded { .. });

        if !result.converted {
            tracing::warn!("giving up on {name} after {} attempt(s)", result.attempts);
            return Ok(result);
        }

        // Stage 4: validate and link
        if layout.validator.verify_image_exists(&name, self.format) {
            result.image_path = Some(layout.validator.image_path(&name, self.format));
            result.markdown_link =
                Some(layout.validator.generate_markdown_link(&name, self.format, title));
            result.success = true;
        } else {
            tracing::warn!("{name}: {MISSING_IMAGE_MESSAGE}");
            result.validation_error = Some(MISSING_IMAGE_MESSAGE.to_owned());
        }

        Ok(result)
    }
}

/// Apply span replacements, last span first.
fn apply_replacements(
    content: &str,
    mut replacements: Vec<(std::ops::Range<usize>, String)>,
) -> String {
    replacements.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));
    let mut rewritten = content.to_owned();
    for (span, link) in replacements {
        rewritten.replace_range(span, &link);
    }
    rewritten
}

fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "standalone".to_owned(), |s| s.to_string_lossy().into_owned())
}

/// Path of `diagrams_dir` as written in links from documents in `link_root`.
fn link_prefix(diagrams_dir: &Path, link_root: &Path) -> String {
    let relative =
        relative_path(diagrams_dir, link_root).unwrap_or_else(|| diagrams_dir.to_path_buf());
    relative.to_string_lossy().replace('\\', "/")
}

fn relative_path(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = normalize(&std::path::absolute(path).ok()?);
    let base = normalize(&std::path::absolute(base).ok()?);

    let mut path_parts = path.components().peekable();
    let mut base_parts = base.components().peekable();
    while let (Some(p), Some(b)) = (path_parts.peek(), base_parts.peek()) {
        if p != b {
            break;
        }
        path_parts.next();
        base_parts.next();
    }
    if path_parts.peek().is_some_and(|c| matches!(c, Component::Prefix(_) | Component::RootDir)) {
        return None;
    }

    let mut relative = PathBuf::new();
    for _ in base_parts {
        relative.push("..");
    }
    relative.extend(path_parts);
    Some(relative)
}

/// Drop `.` components and fold `..` lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
