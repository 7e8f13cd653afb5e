//! Diagram type classification.
//!
//! Classifies `PlantUML` source text (or a free-text description of what the
//! user wants to draw) into a [`DiagramType`], and maps each type to the
//! reference document an operator should consult.
//!
//! All classifiers are ordered tables; table order is the priority policy.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Diagram kinds recognised by the classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    #[default]
    Sequence,
    Class,
    Activity,
    State,
    Component,
    Deployment,
    UseCase,
    Object,
    Timing,
    Er,
    Gantt,
    MindMap,
    Network,
    Wbs,
    Json,
    Yaml,
    Salt,
    Ditaa,
}

impl DiagramType {
    /// Lowercase tag used in artifact names and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Class => "class",
            Self::Activity => "activity",
            Self::State => "state",
            Self::Component => "component",
            Self::Deployment => "deployment",
            Self::UseCase => "usecase",
            Self::Object => "object",
            Self::Timing => "timing",
            Self::Er => "er",
            Self::Gantt => "gantt",
            Self::MindMap => "mindmap",
            Self::Network => "network",
            Self::Wbs => "wbs",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Salt => "salt",
            Self::Ditaa => "ditaa",
        }
    }
}

impl std::fmt::Display for DiagramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    /// PNG image (default).
    #[default]
    Png,
    /// SVG image.
    Svg,
}

impl DiagramFormat {
    /// Parse format from a string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "png" => Some(Self::Png),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Return format as string representation (also the file extension).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// What a `@start...` marker says about the diagram.
#[derive(Clone, Copy)]
enum StartMarker {
    /// `@startuml`: one of several UML subtypes, decided by keyword scoring.
    Generic,
    /// A marker that names the type directly.
    Exact(DiagramType),
}

/// Start markers, checked in order against the lowercased source.
const START_MARKERS: &[(&str, StartMarker)] = &[
    ("@startuml", StartMarker::Generic),
    ("@startmindmap", StartMarker::Exact(DiagramType::MindMap)),
    ("@startgantt", StartMarker::Exact(DiagramType::Gantt)),
    ("@startsalt", StartMarker::Exact(DiagramType::Salt)),
    ("@startjson", StartMarker::Exact(DiagramType::Json)),
    ("@startyaml", StartMarker::Exact(DiagramType::Yaml)),
    ("@startditaa", StartMarker::Exact(DiagramType::Ditaa)),
    ("@startwbs", StartMarker::Exact(DiagramType::Wbs)),
    ("@startnwdiag", StartMarker::Exact(DiagramType::Network)),
];

/// Keyword sets for scoring `@startuml` subtypes.
///
/// Each keyword present in the source adds one point to its subtype.
const UML_SUBTYPE_KEYWORDS: &[(DiagramType, &[&str])] = &[
    (
        DiagramType::Sequence,
        &["participant", "actor", "->", "-->", "autonumber", "activate"],
    ),
    (
        DiagramType::Class,
        &["class ", "interface ", "abstract ", "extends", "implements", "<|--"],
    ),
    (
        DiagramType::Activity,
        &["start", "stop", "if ", "while ", "fork", "partition"],
    ),
    (DiagramType::State, &["state ", "[*]", "-->", "state \""]),
    (
        DiagramType::Component,
        &["component ", "package ", "[", "]", "interface "],
    ),
    (
        DiagramType::Deployment,
        &["node ", "database ", "cloud ", "artifact "],
    ),
    (DiagramType::UseCase, &["usecase ", "actor ", "(", ")"]),
    (DiagramType::Object, &["object ", "map "]),
    (DiagramType::Timing, &["clock", "concise", "robust", "@"]),
];

/// Intent keywords, scanned in order; the first hit wins.
const INTENT_KEYWORDS: &[(DiagramType, &[&str])] = &[
    (
        DiagramType::Sequence,
        &["sequence", "interaction", "api call", "message", "request", "response"],
    ),
    (
        DiagramType::Class,
        &["class", "oop", "inheritance", "interface", "object-oriented"],
    ),
    (
        DiagramType::Er,
        &["entity", "database", "schema", "table", "relationship", "erd"],
    ),
    (
        DiagramType::Activity,
        &["workflow", "process", "flowchart", "decision", "activity"],
    ),
    (
        DiagramType::State,
        &["state", "transition", "state machine", "fsm"],
    ),
    (
        DiagramType::Component,
        &["component", "module", "architecture", "system"],
    ),
    (
        DiagramType::Deployment,
        &["deployment", "server", "infrastructure", "cloud", "docker"],
    ),
    (
        DiagramType::Gantt,
        &["gantt", "timeline", "schedule", "project plan"],
    ),
    (
        DiagramType::MindMap,
        &["mindmap", "brainstorm", "ideas", "mind map"],
    ),
    (
        DiagramType::UseCase,
        &["use case", "actor", "feature", "user story"],
    ),
    (DiagramType::Network, &["network", "topology", "lan", "wan"]),
    (DiagramType::Wbs, &["wbs", "work breakdown", "hierarchy"]),
    (DiagramType::Json, &["json", "data structure"]),
    (DiagramType::Yaml, &["yaml", "config"]),
    (
        DiagramType::Salt,
        &["wireframe", "ui", "mockup", "interface"],
    ),
];

/// Reference document per diagram type.
const REFERENCE_DOCS: &[(DiagramType, &str)] = &[
    (DiagramType::Sequence, "sequence_diagrams.md"),
    (DiagramType::Class, "class_diagrams.md"),
    (DiagramType::Activity, "activity_diagrams.md"),
    (DiagramType::State, "state_diagrams.md"),
    (DiagramType::Component, "component_diagrams.md"),
    (DiagramType::Deployment, "deployment_diagrams.md"),
    (DiagramType::UseCase, "use_case_diagrams.md"),
    (DiagramType::Object, "object_diagrams.md"),
    (DiagramType::Timing, "timing_diagrams.md"),
    (DiagramType::Er, "er_diagrams.md"),
    (DiagramType::Gantt, "gantt_diagrams.md"),
    (DiagramType::MindMap, "mindmap_diagrams.md"),
    (DiagramType::Network, "network_diagrams.md"),
    (DiagramType::Wbs, "wbs_diagrams.md"),
    (DiagramType::Json, "json_yaml_diagrams.md"),
    (DiagramType::Yaml, "json_yaml_diagrams.md"),
    (DiagramType::Salt, "wireframes_salt.md"),
    (DiagramType::Ditaa, "ditaa_diagrams.md"),
];

/// Reference document used when a type has no dedicated entry.
const REFERENCE_TOC: &str = "toc.md";

/// Classifies diagrams and resolves their reference documents.
#[derive(Debug, Clone)]
pub struct DiagramTypeIdentifier {
    references_dir: PathBuf,
}

impl DiagramTypeIdentifier {
    /// Create an identifier resolving reference documents under `references_dir`.
    #[must_use]
    pub fn new(references_dir: impl Into<PathBuf>) -> Self {
        Self {
            references_dir: references_dir.into(),
        }
    }

    /// Directory holding reference documents.
    #[must_use]
    pub fn references_dir(&self) -> &Path {
        &self.references_dir
    }

    /// Classify diagram source text by its `@start...` marker.
    ///
    /// `@startuml` is refined by keyword scoring; sources without any known
    /// marker fall back to [`DiagramType::default`].
    #[must_use]
    pub fn identify_from_content(source: &str) -> DiagramType {
        let lower = source.to_lowercase();

        let marker = START_MARKERS
            .iter()
            .find(|(tag, _)| lower.contains(tag))
            .map(|(_, marker)| *marker);

        match marker {
            Some(StartMarker::Exact(diagram_type)) => diagram_type,
            Some(StartMarker::Generic) => identify_uml_subtype(&lower),
            None => {
                tracing::debug!("no start marker found, defaulting to {}", DiagramType::default());
                DiagramType::default()
            }
        }
    }

    /// Classify a free-text description of the desired diagram.
    ///
    /// First keyword hit in table order wins; no hit yields the default type.
    #[must_use]
    pub fn identify_from_intent(intent: &str) -> DiagramType {
        let lower = intent.to_lowercase();
        INTENT_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map_or_else(DiagramType::default, |(diagram_type, _)| *diagram_type)
    }

    /// Reference document for a diagram type.
    #[must_use]
    pub fn get_reference_path(&self, diagram_type: DiagramType) -> PathBuf {
        let file = REFERENCE_DOCS
            .iter()
            .find(|(t, _)| *t == diagram_type)
            .map_or(REFERENCE_TOC, |(_, file)| *file);
        self.references_dir.join(file)
    }
}

/// Pick the UML subtype whose keyword set scores strictly highest.
///
/// Ties for the top score and all-zero scores resolve to the default type.
fn identify_uml_subtype(lower: &str) -> DiagramType {
    let mut best = DiagramType::default();
    let mut best_score = 0;
    let mut tied = false;

    for (diagram_type, keywords) in UML_SUBTYPE_KEYWORDS {
        let score = keywords.iter().filter(|k| lower.contains(*k)).count();
        tracing::trace!(subtype = %diagram_type, score, "uml subtype score");
        match score.cmp(&best_score) {
            std::cmp::Ordering::Greater => {
                best = *diagram_type;
                best_score = score;
                tied = false;
            }
            std::cmp::Ordering::Equal if score > 0 => tied = true,
            _ => {}
        }
    }

    if best_score == 0 || tied {
        DiagramType::default()
    } else {
        best
    }
}
