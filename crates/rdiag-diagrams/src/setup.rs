//! Local toolchain check.

use std::time::Duration;

use tokio::process::Command;

use crate::plantuml::{PlantUmlCommand, PlantUmlRenderer, run_with_timeout};

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// What the renderer found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    pub plantuml: Option<PlantUmlCommand>,
    /// First line of `java -version`.
    pub java: Option<String>,
    /// First line of `dot -V`.
    pub graphviz: Option<String>,
}

impl SetupReport {
    /// Check Java and Graphviz alongside the renderer's `PlantUML` invocation.
    #[must_use]
    pub fn collect(renderer: &PlantUmlRenderer) -> Self {
        Self {
            plantuml: renderer.plantuml().cloned(),
            java: tool_version("java", "-version"),
            graphviz: tool_version("dot", "-V"),
        }
    }

    /// `PlantUML` was found, with Java when it runs from a jar.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        match &self.plantuml {
            Some(cmd) => !cmd.needs_java() || self.java.is_some(),
            None => false,
        }
    }
}

/// First non-empty output line of `<program> <arg>`.
///
/// Both `java -version` and `dot -V` print to stderr.
fn tool_version(program: &str, arg: &str) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.arg(arg);
    let output = run_with_timeout(cmd, VERSION_TIMEOUT, None).ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    output
        .stderr
        .lines()
        .chain(stdout.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_owned)
}
