use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use rdiag_diagrams::{
    DiagramFormat, DiagramType, ProcessError, RenderError, Renderer, ResilientProcessor,
};
use tempfile::TempDir;

/// What the scripted renderer does on one call.
#[derive(Clone, Copy)]
enum Outcome {
    Render,
    Fail(&'static str),
    /// Report success without writing anything.
    SucceedEmpty,
    Timeout,
}

/// Renderer replaying a queue of outcomes; renders once the queue is empty.
struct ScriptedRenderer {
    outcomes: RefCell<VecDeque<Outcome>>,
    calls: Cell<usize>,
}

impl ScriptedRenderer {
    fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into_iter().collect()),
            calls: Cell::new(0),
        }
    }

    fn always(outcome: Outcome, times: usize) -> Self {
        Self::new(std::iter::repeat_n(outcome, times))
    }
}

impl Renderer for ScriptedRenderer {
    fn render(
        &self,
        source_path: &Path,
        output_dir: &Path,
        format: DiagramFormat,
    ) -> Result<(), RenderError> {
        self.calls.set(self.calls.get() + 1);
        let outcome = self.outcomes.borrow_mut().pop_front().unwrap_or(Outcome::Render);
        match outcome {
            Outcome::Render => {
                let stem = source_path.file_stem().unwrap().to_string_lossy();
                std::fs::write(output_dir.join(format!("{stem}.{}", format.as_str())), b"img")?;
                Ok(())
            }
            Outcome::Fail(message) => Err(RenderError::Failed {
                code: Some(1),
                message: message.to_owned(),
            }),
            Outcome::SucceedEmpty => Ok(()),
            Outcome::Timeout => Err(RenderError::Timeout(Duration::from_secs(30))),
        }
    }

    fn check_syntax(&self, source: &str) -> Result<(), RenderError> {
        if source.contains("BROKEN") {
            Err(RenderError::Failed {
                code: Some(200),
                message: "Syntax Error?".to_owned(),
            })
        } else {
            Ok(())
        }
    }
}

const SEQUENCE_BLOCK: &str = "```plantuml\n@startuml\nparticipant A\nA -> B: hi\n@enduml\n```";
const CLASS_BLOCK: &str =
    "```puml\n@startuml\nclass Order\nclass Item extends Base\ninterface Priced\n@enduml\n```";

fn write_doc(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_single_diagram_is_replaced() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(&tmp, "design.md", &format!("# Design\n\n{SEQUENCE_BLOCK}\n\nDone.\n"));

    let mut processor = ResilientProcessor::new(ScriptedRenderer::new([]));
    let outcome = processor.process_markdown(&doc).unwrap();

    assert_eq!(outcome.results.len(), 1);
    let result = &outcome.results[0];
    assert!(result.success);
    assert_eq!(result.diagram_type, DiagramType::Sequence);
    assert_eq!(result.attempts, 1);
    assert!(result.errors.is_empty());
    assert_eq!(
        result.image_path.as_deref(),
        Some(tmp.path().join("diagrams/design_001_sequence_diagram.png").as_path())
    );
    assert!(tmp.path().join("diagrams/design_001_sequence_diagram.puml").is_file());
    assert_eq!(
        outcome.rewritten,
        "# Design\n\n\
         ![Design 001 Sequence Diagram](diagrams/design_001_sequence_diagram.png)\n\n\
         Done.\n"
    );
    assert_eq!(outcome.rewritten.matches("![").count(), 1);
    assert!(outcome.all_succeeded());
    assert!(processor.error_log().is_empty());
}

#[test]
fn test_always_failing_renderer_leaves_document_unchanged() {
    let tmp = TempDir::new().unwrap();
    let content = format!("{SEQUENCE_BLOCK}\n\ntext\n\n{CLASS_BLOCK}\n");
    let doc = write_doc(&tmp, "doc.md", &content);

    let renderer = ScriptedRenderer::always(
        Outcome::Fail("Syntax Error? (Assumed diagram type: sequence)"),
        100,
    );
    let mut processor = ResilientProcessor::new(renderer).max_attempts(3);
    let outcome = processor.process_markdown(&doc).unwrap();

    assert_eq!(outcome.rewritten, content);
    assert_eq!(outcome.results.len(), 2);
    for result in &outcome.results {
        assert!(!result.success);
        assert!(!result.converted);
        assert_eq!(result.errors.len(), 3);
        assert!(result.external_search_needed);
        assert_eq!(result.markdown_link, None);
    }
    assert_eq!(outcome.results[1].diagram_type, DiagramType::Class);
    assert_eq!(processor.renderer().calls.get(), 6);
    assert_eq!(processor.error_log().len(), 6);
    assert_eq!(outcome.succeeded(), 0);

    let log = processor.save_error_log().unwrap().unwrap();
    assert_eq!(log, tmp.path().join("diagrams/error_log.json"));
}

#[test]
fn test_success_after_two_failures() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(&tmp, "retry.md", &format!("{SEQUENCE_BLOCK}\n"));

    let renderer = ScriptedRenderer::new([
        Outcome::Fail("Unable to access jarfile plantuml.jar"),
        Outcome::Fail("something unexpected"),
        Outcome::Render,
    ]);
    let mut processor = ResilientProcessor::new(renderer).max_attempts(3);
    let outcome = processor.process_markdown(&doc).unwrap();

    let result = &outcome.results[0];
    assert!(result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].guide, Some("installation_setup_guide.md"));
    assert_eq!(result.errors[0].error_index, Some(4));
    assert_eq!(result.errors[1].guide, None);
    assert!(result.errors.iter().all(|e| !e.resolved));
    assert_eq!(
        result.search_queries[0],
        "PlantUML error: something unexpected"
    );
    assert!(outcome.rewritten.starts_with("![Retry 001 Sequence Diagram]"));
}

#[test]
fn test_timeouts_are_retried_like_failures() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(&tmp, "slow.md", &format!("{SEQUENCE_BLOCK}\n"));

    let renderer = ScriptedRenderer::new([Outcome::Timeout, Outcome::Timeout, Outcome::Render]);
    let mut processor = ResilientProcessor::new(renderer).max_attempts(3);
    let outcome = processor.process_markdown(&doc).unwrap();

    let result = &outcome.results[0];
    assert!(result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].original_error.contains("timed out"));
    assert_eq!(processor.error_log().len(), 2);
    assert!(outcome.rewritten.starts_with("![Slow 001 Sequence Diagram]"));
}

#[test]
fn test_success_without_image_fails_validation() {
    let tmp = TempDir::new().unwrap();
    let content = format!("{SEQUENCE_BLOCK}\n");
    let doc = write_doc(&tmp, "empty.md", &content);

    let mut processor =
        ResilientProcessor::new(ScriptedRenderer::new([Outcome::SucceedEmpty]));
    let outcome = processor.process_markdown(&doc).unwrap();

    let result = &outcome.results[0];
    assert!(result.converted);
    assert!(!result.success);
    assert!(result.errors.is_empty());
    assert_eq!(
        result.validation_error.as_deref(),
        Some("Image file not created despite successful conversion")
    );
    assert_eq!(result.image_path, None);
    // Never retried
    assert_eq!(processor.renderer().calls.get(), 1);
    assert_eq!(outcome.rewritten, content);
}

#[test]
fn test_replacements_keep_earlier_offsets() {
    let tmp = TempDir::new().unwrap();
    let content = format!("intro\n\n{SEQUENCE_BLOCK}\n\nmiddle\n\n{CLASS_BLOCK}\n\noutro\n");
    let doc = write_doc(&tmp, "two.md", &content);

    let mut processor = ResilientProcessor::new(ScriptedRenderer::new([]));
    let outcome = processor.process_markdown(&doc).unwrap();

    assert_eq!(
        outcome.rewritten,
        "intro\n\n\
         ![Two 001 Sequence Diagram](diagrams/two_001_sequence_diagram.png)\n\n\
         middle\n\n\
         ![Two 002 Class Diagram](diagrams/two_002_class_diagram.png)\n\n\
         outro\n"
    );
}

#[test]
fn test_partial_failure_replaces_only_validated() {
    let tmp = TempDir::new().unwrap();
    let content = format!("{SEQUENCE_BLOCK}\n\n{CLASS_BLOCK}\n");
    let doc = write_doc(&tmp, "mixed.md", &content);

    let renderer = ScriptedRenderer::new([Outcome::Fail("boom")]);
    let mut processor = ResilientProcessor::new(renderer).max_attempts(1);
    let outcome = processor.process_markdown(&doc).unwrap();

    assert!(!outcome.results[0].success);
    assert!(outcome.results[1].success);
    assert_eq!(
        outcome.rewritten,
        format!(
            "{SEQUENCE_BLOCK}\n\n\
             ![Mixed 002 Class Diagram](diagrams/mixed_002_class_diagram.png)\n"
        )
    );
    assert_eq!(outcome.succeeded(), 1);
    assert!(!outcome.all_succeeded());
}

#[test]
fn test_linked_diagram_uses_alt_text() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("flow.puml"),
        "@startuml\nstart\n:step;\nstop\n@enduml\n",
    )
    .unwrap();
    let doc = write_doc(&tmp, "linked.md", "See:\n\n![Login flow](flow.puml)\n");

    let mut processor =
        ResilientProcessor::new(ScriptedRenderer::new([])).format(DiagramFormat::Svg);
    let outcome = processor.process_markdown(&doc).unwrap();

    assert_eq!(outcome.results[0].diagram_type, DiagramType::Activity);
    assert_eq!(
        outcome.rewritten,
        "See:\n\n![Login flow](diagrams/linked_001_activity_login_flow.svg)\n"
    );
}

#[test]
fn test_base_dir_override_links_relative_to_document() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("docs")).unwrap();
    let doc = tmp.path().join("docs/guide.md");
    std::fs::write(&doc, format!("{SEQUENCE_BLOCK}\n")).unwrap();

    let mut processor = ResilientProcessor::new(ScriptedRenderer::new([]))
        .base_dir(tmp.path().join("build"))
        .diagrams_dir_name("img");
    let outcome = processor.process_markdown(&doc).unwrap();

    assert!(tmp.path().join("build/img/guide_001_sequence_diagram.png").is_file());
    assert_eq!(
        outcome.rewritten,
        "![Guide 001 Sequence Diagram](../build/img/guide_001_sequence_diagram.png)\n"
    );
    assert_eq!(processor.diagrams_dir(), tmp.path().join("build/img"));
}

#[test]
fn test_passed_deadline_skips_diagrams() {
    let tmp = TempDir::new().unwrap();
    let content = format!("{SEQUENCE_BLOCK}\n\n{CLASS_BLOCK}\n");
    let doc = write_doc(&tmp, "late.md", &content);

    let mut processor = ResilientProcessor::new(ScriptedRenderer::new([]))
        .deadline(Instant::now().checked_sub(Duration::from_secs(1)).unwrap());
    let outcome = processor.process_markdown(&doc).unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.rewritten, content);
    assert!(!outcome.all_succeeded());
    assert_eq!(processor.renderer().calls.get(), 0);
}

#[test]
fn test_standalone_diagram_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("orders.puml");
    std::fs::write(&path, "@startuml\ntitle Orders\nA -> B\n@enduml\n").unwrap();

    let mut processor = ResilientProcessor::new(ScriptedRenderer::new([]));
    let result = processor.process_diagram_file(&path).unwrap();

    assert!(result.success);
    assert_eq!(result.artifact_name.as_str(), "orders_001_sequence_diagram");
    assert_eq!(
        result.markdown_link.as_deref(),
        Some("![Orders 001 Sequence Diagram](diagrams/orders_001_sequence_diagram.png)")
    );
}

#[test]
fn test_validate_markdown_checks_every_diagram() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(
        &tmp,
        "check.md",
        "```plantuml\n@startuml\nA -> B\n@enduml\n```\n\n\
         ```plantuml\n@startuml\nBROKEN\n@enduml\n```\n",
    );

    let processor = ResilientProcessor::new(ScriptedRenderer::new([])).references_dir("/refs");
    let checks = processor.validate_markdown(&doc).unwrap();

    assert_eq!(checks.len(), 2);
    assert!(checks[0].valid);
    assert_eq!(checks[0].reference_path, Path::new("/refs/sequence_diagrams.md"));
    assert!(!checks[1].valid);
    assert_eq!(checks[1].ordinal, 2);
    assert_eq!(checks[1].diagnostic.as_deref(), Some("Syntax Error?"));
    // Nothing staged or rendered
    assert!(!tmp.path().join("diagrams").exists());
    assert_eq!(processor.renderer().calls.get(), 0);
}

#[test]
fn test_missing_document_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let mut processor = ResilientProcessor::new(ScriptedRenderer::new([]));
    let err = processor
        .process_markdown(&tmp.path().join("nope.md"))
        .unwrap_err();
    assert!(matches!(err, ProcessError::Io { .. }));
}
