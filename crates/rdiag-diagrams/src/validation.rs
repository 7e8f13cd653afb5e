//! Post-conversion artifact checks and markdown link generation.

use std::path::{Path, PathBuf};

use crate::language::DiagramFormat;
use crate::naming::ArtifactName;

/// Confirms rendered artifacts and builds the links that replace diagram sources.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    diagrams_dir: PathBuf,
    /// Path of the diagrams directory as written in links, relative to the document.
    link_prefix: String,
}

impl ValidationEngine {
    #[must_use]
    pub fn new(diagrams_dir: impl Into<PathBuf>, link_prefix: impl Into<String>) -> Self {
        Self {
            diagrams_dir: diagrams_dir.into(),
            link_prefix: link_prefix.into(),
        }
    }

    #[must_use]
    pub fn image_path(&self, name: &ArtifactName, format: DiagramFormat) -> PathBuf {
        self.diagrams_dir
            .join(format!("{name}.{}", format.as_str()))
    }

    /// True only if the image exists and is non-empty.
    ///
    /// A renderer can exit successfully and still leave a zero-byte file behind.
    #[must_use]
    pub fn verify_image_exists(&self, name: &ArtifactName, format: DiagramFormat) -> bool {
        let path = self.image_path(name, format);
        is_non_empty_file(&path)
    }

    /// Markdown image link for a validated artifact.
    ///
    /// Without a title the humanized artifact name is used as alt text.
    #[must_use]
    pub fn generate_markdown_link(
        &self,
        name: &ArtifactName,
        format: DiagramFormat,
        title: Option<&str>,
    ) -> String {
        let alt = title.map_or_else(|| name.humanize(), str::to_owned);
        let prefix = self.link_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            format!("![{alt}]({name}.{})", format.as_str())
        } else {
            format!("![{alt}]({prefix}/{name}.{})", format.as_str())
        }
    }
}

fn is_non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::DiagramType;
    use crate::naming::FileNamingConvention;
    use pretty_assertions::assert_eq;

    fn artifact() -> ArtifactName {
        FileNamingConvention::generate_filename("doc", 1, DiagramType::Sequence, None)
    }

    #[test]
    fn test_verify_image_exists() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = ValidationEngine::new(tmp.path(), "diagrams");
        let name = artifact();
        let path = tmp.path().join("doc_001_sequence_diagram.png");

        // Missing
        assert!(!engine.verify_image_exists(&name, DiagramFormat::Png));

        // Present but empty
        std::fs::write(&path, b"").unwrap();
        assert!(!engine.verify_image_exists(&name, DiagramFormat::Png));

        // Present and non-empty
        std::fs::write(&path, b"\x89PNG").unwrap();
        assert!(engine.verify_image_exists(&name, DiagramFormat::Png));

        // Other format is a different file
        assert!(!engine.verify_image_exists(&name, DiagramFormat::Svg));
    }

    #[test]
    fn test_directory_is_not_an_image() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("doc_001_sequence_diagram.svg")).unwrap();
        let engine = ValidationEngine::new(tmp.path(), "diagrams");
        assert!(!engine.verify_image_exists(&artifact(), DiagramFormat::Svg));
    }

    #[test]
    fn test_markdown_link_humanized_alt() {
        let engine = ValidationEngine::new("/x/diagrams", "diagrams");
        assert_eq!(
            engine.generate_markdown_link(&artifact(), DiagramFormat::Png, None),
            "![Doc 001 Sequence Diagram](diagrams/doc_001_sequence_diagram.png)"
        );
    }

    #[test]
    fn test_markdown_link_with_title() {
        let engine = ValidationEngine::new("/x/diagrams", "build/diagrams/");
        assert_eq!(
            engine.generate_markdown_link(&artifact(), DiagramFormat::Svg, Some("Login flow")),
            "![Login flow](build/diagrams/doc_001_sequence_diagram.svg)"
        );
    }

    #[test]
    fn test_markdown_link_empty_prefix() {
        let engine = ValidationEngine::new(".", "");
        assert_eq!(
            engine.generate_markdown_link(&artifact(), DiagramFormat::Png, Some("A")),
            "![A](doc_001_sequence_diagram.png)"
        );
    }
}
