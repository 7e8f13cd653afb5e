//! Deterministic artifact naming and directory layout.
//!
//! Every diagram of a document gets a name of the form
//! `{document}_{ordinal:03}_{type}_{title prefix}`, e.g.
//! `design_002_sequence_login_flo`. The staged source and the rendered
//! image share that name and differ only by extension.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::consts::{DEFAULT_DIAGRAMS_DIR, ORDINAL_WIDTH, TITLE_PREFIX_LEN};
use crate::language::DiagramType;

/// Title segment used when a diagram has no title.
const DEFAULT_TITLE: &str = "diagram";

/// Sanitized name identifying one diagram's files within the diagrams directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form: underscores become spaces, words are title-cased.
    #[must_use]
    pub fn humanize(&self) -> String {
        let spaced = self.0.replace('_', " ");
        let mut out = String::with_capacity(spaced.len());
        let mut prev_is_alpha = false;
        for c in spaced.chars() {
            if c.is_alphabetic() {
                if prev_is_alpha {
                    out.extend(c.to_lowercase());
                } else {
                    out.extend(c.to_uppercase());
                }
                prev_is_alpha = true;
            } else {
                out.push(c);
                prev_is_alpha = false;
            }
        }
        out
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds artifact names and paths under a diagrams directory.
#[derive(Debug, Clone)]
pub struct FileNamingConvention {
    diagrams_dir: PathBuf,
}

impl FileNamingConvention {
    /// Naming rooted at `base_dir/diagrams`.
    #[must_use]
    pub fn new(base_dir: &Path) -> Self {
        Self::with_dir_name(base_dir, DEFAULT_DIAGRAMS_DIR)
    }

    /// Naming rooted at `base_dir/dir_name`.
    #[must_use]
    pub fn with_dir_name(base_dir: &Path, dir_name: &str) -> Self {
        Self {
            diagrams_dir: base_dir.join(dir_name),
        }
    }

    #[must_use]
    pub fn diagrams_dir(&self) -> &Path {
        &self.diagrams_dir
    }

    /// Create the diagrams directory if it does not exist yet.
    pub fn ensure_directory(&self) -> io::Result<&Path> {
        std::fs::create_dir_all(&self.diagrams_dir)?;
        Ok(&self.diagrams_dir)
    }

    /// Derive the artifact name for one diagram.
    ///
    /// Pure: identical inputs always produce the identical name. Diagrams that
    /// share document, type and title are told apart by `ordinal` alone.
    #[must_use]
    pub fn generate_filename(
        document_name: &str,
        ordinal: usize,
        diagram_type: DiagramType,
        title: Option<&str>,
    ) -> ArtifactName {
        let document = sanitize(document_name.strip_suffix(".md").unwrap_or(document_name));
        let title: String = sanitize(title.unwrap_or(DEFAULT_TITLE))
            .chars()
            .take(TITLE_PREFIX_LEN)
            .collect();

        ArtifactName(format!(
            "{document}_{ordinal:0width$}_{diagram_type}_{title}",
            width = ORDINAL_WIDTH
        ))
    }

    /// Path of an artifact file with the given extension.
    #[must_use]
    pub fn get_full_path(&self, name: &ArtifactName, extension: &str) -> PathBuf {
        self.diagrams_dir.join(format!("{name}.{extension}"))
    }
}

/// Strip characters outside `[A-Za-z0-9_-]` and whitespace, lowercase, and
/// turn whitespace and hyphens into underscores.
///
/// Idempotent: sanitizing a sanitized string returns it unchanged.
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '-'))
        .map(|c| {
            if c.is_whitespace() || c == '-' {
                '_'
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_filename() {
        let name = FileNamingConvention::generate_filename(
            "Design Doc.md",
            2,
            DiagramType::Sequence,
            Some("Login Flow (v2)"),
        );
        assert_eq!(name.as_str(), "design_doc_002_sequence_login_flow");
    }

    #[test]
    fn test_generate_filename_default_title() {
        let name = FileNamingConvention::generate_filename("notes", 1, DiagramType::Class, None);
        assert_eq!(name.as_str(), "notes_001_class_diagram");
    }

    #[test]
    fn test_title_truncated_to_prefix() {
        let name = FileNamingConvention::generate_filename(
            "doc",
            1,
            DiagramType::State,
            Some("Order lifecycle states"),
        );
        assert_eq!(name.as_str(), "doc_001_state_order_life");
    }

    #[test]
    fn test_generate_filename_is_deterministic() {
        let a = FileNamingConvention::generate_filename("api", 7, DiagramType::Er, Some("Schema"));
        let b = FileNamingConvention::generate_filename("api", 7, DiagramType::Er, Some("Schema"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordinal_disambiguates() {
        let a = FileNamingConvention::generate_filename("api", 1, DiagramType::Er, Some("Schema"));
        let b = FileNamingConvention::generate_filename("api", 2, DiagramType::Er, Some("Schema"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_ordinal_wider_than_padding() {
        let name = FileNamingConvention::generate_filename("doc", 1234, DiagramType::Gantt, None);
        assert_eq!(name.as_str(), "doc_1234_gantt_diagram");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Hello World!"), "hello_world");
        assert_eq!(sanitize("a-b c_d"), "a_b_c_d");
        assert_eq!(sanitize("über/../path"), "berpath");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_sanitize_idempotent() {
        for input in ["Login Flow (v2)", "  spaced  out ", "Ünïcode-Title", "a\tb\nc"] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_full_path_and_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let naming = FileNamingConvention::new(tmp.path());
        let name = FileNamingConvention::generate_filename("doc", 1, DiagramType::Sequence, None);

        assert_eq!(
            naming.get_full_path(&name, "puml"),
            tmp.path().join("diagrams/doc_001_sequence_diagram.puml")
        );

        // Idempotent creation
        naming.ensure_directory().unwrap();
        naming.ensure_directory().unwrap();
        assert!(naming.diagrams_dir().is_dir());
    }

    #[test]
    fn test_custom_dir_name() {
        let naming = FileNamingConvention::with_dir_name(Path::new("/base"), "images");
        assert_eq!(naming.diagrams_dir(), Path::new("/base/images"));
    }

    #[test]
    fn test_humanize() {
        let name = FileNamingConvention::generate_filename("doc", 1, DiagramType::Sequence, None);
        assert_eq!(name.humanize(), "Doc 001 Sequence Diagram");
    }
}
