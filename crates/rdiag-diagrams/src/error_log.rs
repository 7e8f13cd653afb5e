//! Run-wide log of failed conversion attempts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::consts::{ERROR_LOG_FILENAME, LOG_ERROR_LEN};
use crate::error::ProcessError;
use crate::naming::ArtifactName;
use crate::troubleshoot::ErrorResolution;

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub artifact_name: String,
    /// Diagnostic text, truncated.
    pub error_text: String,
    pub guide_consulted: Option<&'static str>,
    pub resolved: bool,
}

impl ErrorLogEntry {
    /// Entry for a classified failure of `name`, stamped now.
    #[must_use]
    pub fn new(name: &ArtifactName, resolution: &ErrorResolution) -> Self {
        Self {
            timestamp: Utc::now(),
            artifact_name: name.as_str().to_owned(),
            error_text: resolution.original_error.chars().take(LOG_ERROR_LEN).collect(),
            guide_consulted: resolution.guide,
            resolved: resolution.resolved,
        }
    }
}

/// Append-only error log, persisted as `error_log.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorLog {
    entries: Vec<ErrorLogEntry>,
}

impl ErrorLog {
    pub fn push(&mut self, entry: ErrorLogEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[ErrorLogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Write the log into `dir`.
    ///
    /// Nothing is written for an empty log. Returns the file path when written.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<Option<PathBuf>, ProcessError> {
        if self.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(dir).map_err(|e| ProcessError::io(dir, e))?;
        let path = dir.join(ERROR_LOG_FILENAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| ProcessError::io(&path, e))?;
        tracing::info!("error log saved to {}", path.display());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::DiagramType;
    use crate::naming::FileNamingConvention;
    use crate::troubleshoot::ErrorHandler;
    use pretty_assertions::assert_eq;

    fn entry(diagnostic: &str) -> ErrorLogEntry {
        let name = FileNamingConvention::generate_filename("doc", 1, DiagramType::Class, None);
        let resolution = ErrorHandler::new("/guides").handle_error(diagnostic, "", None);
        ErrorLogEntry::new(&name, &resolution)
    }

    #[test]
    fn test_entry_truncates_error() {
        let e = entry(&format!("Syntax Error? {}", "x".repeat(500)));
        assert_eq!(e.error_text.chars().count(), LOG_ERROR_LEN);
        assert_eq!(e.artifact_name, "doc_001_class_diagram");
        assert_eq!(e.guide_consulted, Some("general_syntax_guide.md"));
        assert!(!e.resolved);
    }

    #[test]
    fn test_empty_log_not_saved() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = ErrorLog::default();
        assert_eq!(log.save(tmp.path()).unwrap(), None);
        assert!(!tmp.path().join(ERROR_LOG_FILENAME).exists());
    }

    #[test]
    fn test_save_writes_entries() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut log = ErrorLog::default();
        log.push(entry("boom"));
        log.push(entry("Unable to access jarfile"));

        let path = log.save(&tmp.path().join("diagrams")).unwrap().unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["error_text"], "boom");
        assert_eq!(entries[0]["guide_consulted"], serde_json::Value::Null);
        assert_eq!(entries[1]["guide_consulted"], "installation_setup_guide.md");
        assert_eq!(entries[1]["resolved"], false);
        assert!(entries[0]["timestamp"].is_string());
    }
}
