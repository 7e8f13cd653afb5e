//! `rdiag --check-setup`.

use rdiag_diagrams::{PlantUmlRenderer, SetupReport};

use crate::output::Output;

/// Print the toolchain report. Returns whether diagrams can be rendered.
pub(crate) fn run(renderer: &PlantUmlRenderer, output: &Output) -> bool {
    let report = SetupReport::collect(renderer);
    output.heading("PlantUML setup");

    match &report.plantuml {
        Some(cmd) => output.status(true, &format!("PlantUML: {cmd}")),
        None => output.status(false, "PlantUML: not found"),
    }

    let needs_java = report.plantuml.as_ref().is_some_and(|cmd| cmd.needs_java());
    match (&report.java, needs_java) {
        (Some(version), _) => output.status(true, &format!("Java: {version}")),
        (None, true) => output.status(false, "Java: not found (required for plantuml.jar)"),
        (None, false) => output.info("  Java: not found"),
    }

    match &report.graphviz {
        Some(version) => output.status(true, &format!("Graphviz: {version}")),
        None => {
            output.warning("  Graphviz: not found (needed for most UML diagrams except sequence)");
        }
    }

    if !report.is_ready() {
        output.warning("Install PlantUML (e.g. `brew install plantuml`) or set PLANTUML_JAR");
    }
    report.is_ready()
}
