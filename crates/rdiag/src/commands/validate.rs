//! `rdiag --validate-only`.

use std::path::Path;

use rdiag_diagrams::{InputKind, PlantUmlRenderer, ProcessError, ResilientProcessor, SyntaxCheck};

use crate::error::CliError;
use crate::output::Output;

/// Syntax-check every diagram of the input. Returns whether all are valid.
pub(crate) fn run(
    processor: &ResilientProcessor<PlantUmlRenderer>,
    input: &Path,
    output: &Output,
) -> Result<bool, CliError> {
    let checks = match InputKind::detect(input)? {
        InputKind::Diagram => {
            let source = std::fs::read_to_string(input).map_err(|source| ProcessError::Io {
                path: input.to_path_buf(),
                source,
            })?;
            vec![processor.validate_diagram(&source, 1)]
        }
        InputKind::Markdown => processor.validate_markdown(input)?,
    };

    output.heading(&format!("Validated {} diagram(s)", checks.len()));
    for check in &checks {
        report(check, output);
    }
    Ok(checks.iter().all(|c| c.valid))
}

fn report(check: &SyntaxCheck, output: &Output) {
    output.status(
        check.valid,
        &format!(
            "{}. {} (reference: {})",
            check.ordinal,
            check.diagram_type,
            check.reference_path.display()
        ),
    );
    if let Some(diagnostic) = &check.diagnostic {
        for line in diagnostic.lines() {
            output.info(&format!("       {line}"));
        }
    }
}
