//! Renderer failure classification.
//!
//! [`ErrorHandler`] matches a renderer's diagnostic text against an ordered
//! table of known failure patterns, each pointing at a troubleshooting guide
//! and (usually) a numbered entry inside it. The first matching pattern wins,
//! so the table order is the priority order.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::consts::SEARCH_SNIPPET_LEN;
use crate::language::DiagramType;

/// Known failure patterns: (regex over lowercased text, guide, error index).
const ERROR_PATTERNS: &[(&str, &str, Option<u32>)] = &[
    (r"cannot find java", "installation_setup_guide.md", Some(1)),
    (r"unable to access jarfile", "installation_setup_guide.md", Some(4)),
    (r"headlessexception", "installation_setup_guide.md", Some(6)),
    (r"no dot executable", "installation_setup_guide.md", Some(2)),
    (r"graphviz has crashed", "installation_setup_guide.md", Some(3)),
    (r"no @startuml.*found", "general_syntax_guide.md", Some(1)),
    (r"syntax error", "general_syntax_guide.md", None),
    (r"duplicate participant", "sequence_diagrams_guide.md", Some(3)),
    (r"empty alt group", "sequence_diagrams_guide.md", Some(11)),
    (r"cannot include file", "preprocessor_includes_guide.md", Some(1)),
    (r"file already included", "preprocessor_includes_guide.md", Some(5)),
    (r"stack overflow", "preprocessor_includes_guide.md", Some(8)),
    (r"failed to generate image", "image_generation_guide.md", Some(1)),
    (r"nullpointerexception", "general_syntax_guide.md", Some(15)),
];

struct ErrorRule {
    pattern: Regex,
    guide: &'static str,
    error_index: Option<u32>,
}

static ERROR_RULES: LazyLock<Vec<ErrorRule>> = LazyLock::new(|| {
    ERROR_PATTERNS
        .iter()
        .map(|(pattern, guide, error_index)| ErrorRule {
            pattern: Regex::new(pattern).unwrap(),
            guide,
            error_index: *error_index,
        })
        .collect()
});

/// Classification of one failed conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResolution {
    /// Diagnostic text as reported by the renderer.
    pub original_error: String,
    /// Troubleshooting guide matched by the diagnostic.
    pub guide: Option<&'static str>,
    /// Entry number inside the matched guide.
    pub error_index: Option<u32>,
    /// Human-readable pointer to the fix.
    pub suggested_fix: Option<String>,
    /// Queries for an external search when no local guide helps.
    pub search_queries: Vec<String>,
    /// Set by the orchestrator once a retry succeeded; never by the handler.
    pub resolved: bool,
}

/// Classifies renderer diagnostics against the troubleshooting guides.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    troubleshooting_dir: PathBuf,
}

impl ErrorHandler {
    #[must_use]
    pub fn new(troubleshooting_dir: impl Into<PathBuf>) -> Self {
        Self {
            troubleshooting_dir: troubleshooting_dir.into(),
        }
    }

    #[must_use]
    pub fn troubleshooting_dir(&self) -> &Path {
        &self.troubleshooting_dir
    }

    /// Location of a troubleshooting guide on disk.
    #[must_use]
    pub fn guide_path(&self, guide: &str) -> PathBuf {
        self.troubleshooting_dir.join(guide)
    }

    /// Classify a failed attempt's diagnostic text.
    ///
    /// Always produces fallback search queries, whether or not a guide matched.
    #[must_use]
    pub fn handle_error(
        &self,
        diagnostic: &str,
        source: &str,
        diagram_type: Option<DiagramType>,
    ) -> ErrorResolution {
        let (guide, error_index) = classify(diagnostic).unzip();
        let error_index = error_index.flatten();

        if let Some(guide) = guide {
            let path = self.guide_path(guide);
            tracing::debug!(
                guide,
                ?error_index,
                guide_available = path.is_file(),
                diagram_type = ?diagram_type,
                source_len = source.len(),
                "classified renderer error"
            );
        } else {
            tracing::debug!(
                diagram_type = ?diagram_type,
                "renderer error matched no known pattern"
            );
        }

        let suggested_fix = guide.map(|guide| match error_index {
            Some(n) => format!("See {guide} error #{n}"),
            None => format!("See {guide}"),
        });

        ErrorResolution {
            original_error: diagnostic.to_owned(),
            guide,
            error_index,
            suggested_fix,
            search_queries: search_queries(diagnostic),
            resolved: false,
        }
    }
}

/// First rule (in table order) whose pattern matches the lowercased diagnostic.
fn classify(diagnostic: &str) -> Option<(&'static str, Option<u32>)> {
    let lower = diagnostic.to_lowercase();
    ERROR_RULES
        .iter()
        .find(|rule| rule.pattern.is_match(&lower))
        .map(|rule| (rule.guide, rule.error_index))
}

/// Build external search queries from the start of the diagnostic.
fn search_queries(diagnostic: &str) -> Vec<String> {
    let snippet: String = diagnostic.chars().take(SEARCH_SNIPPET_LEN).collect();
    let snippet = snippet.replace('\n', " ");
    let snippet = snippet.trim();

    vec![
        format!("PlantUML error: {snippet}"),
        format!("How to fix PlantUML {snippet}"),
        format!("PlantUML {snippet} solution stackoverflow"),
    ]
}
