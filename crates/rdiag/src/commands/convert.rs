//! Default command: convert diagrams and rewrite the document.

use std::path::{Path, PathBuf};

use rdiag_diagrams::{InputKind, PlantUmlRenderer, ProcessingResult, ResilientProcessor};

use crate::error::CliError;
use crate::output::Output;

/// Convert the input. Returns whether every diagram ended validated.
pub(crate) fn run(
    processor: &mut ResilientProcessor<PlantUmlRenderer>,
    input: &Path,
    rewrite_suffix: &str,
    output: &Output,
) -> Result<bool, CliError> {
    let all_succeeded = match InputKind::detect(input)? {
        InputKind::Diagram => {
            let result = processor.process_diagram_file(input)?;
            report_diagram(&result, output);
            result.success
        }
        InputKind::Markdown => convert_markdown(processor, input, rewrite_suffix, output)?,
    };

    if let Some(path) = processor.save_error_log()? {
        output.warning(&format!("Error log saved to: {}", path.display()));
    }
    Ok(all_succeeded)
}

fn convert_markdown(
    processor: &mut ResilientProcessor<PlantUmlRenderer>,
    input: &Path,
    rewrite_suffix: &str,
    output: &Output,
) -> Result<bool, CliError> {
    let outcome = processor.process_markdown(input)?;
    let total = outcome.results.len() + outcome.skipped;

    output.heading(&format!("Processed {} diagram(s)", outcome.results.len()));
    output.info(&format!("Successful: {}/{total}", outcome.succeeded()));
    for (index, result) in outcome.results.iter().enumerate() {
        output.status(
            result.success,
            &format!(
                "{}. {}: {}",
                index + 1,
                result.diagram_type,
                result.source_path.display()
            ),
        );
        if let Some(message) = &result.validation_error {
            output.info(&format!("       {message}"));
        }
    }
    if outcome.skipped > 0 {
        output.warning(&format!(
            "Time limit reached, {} diagram(s) not processed",
            outcome.skipped
        ));
    }

    if outcome.succeeded() > 0 {
        let path = rewrite_path(input, rewrite_suffix);
        std::fs::write(&path, &outcome.rewritten)?;
        output.success(&format!("Updated markdown saved to: {}", path.display()));
    }

    Ok(outcome.all_succeeded())
}

fn report_diagram(result: &ProcessingResult, output: &Output) {
    output.heading(&format!("Diagram type: {}", result.diagram_type));
    output.info(&format!("Source: {}", result.source_path.display()));
    output.status(result.success, &format!("after {} attempt(s)", result.attempts));

    if let (Some(image), Some(link)) = (&result.image_path, &result.markdown_link) {
        output.info(&format!("Image: {}", image.display()));
        output.info(&format!("Markdown: {link}"));
        return;
    }

    if let Some(message) = &result.validation_error {
        output.error(message);
    }
    if !result.errors.is_empty() {
        output.info(&format!("Errors: {}", result.errors.len()));
        if let Some(fix) = result.errors.iter().rev().find_map(|e| e.suggested_fix.as_deref()) {
            output.info(&format!("Suggested fix: {fix}"));
        }
    }
    if result.external_search_needed {
        output.info("Search queries:");
        for query in &result.search_queries {
            output.info(&format!("  - {query}"));
        }
    }
}

/// Sibling path `<stem><suffix>.md` for the rewritten document.
fn rewrite_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}.md"))
}
