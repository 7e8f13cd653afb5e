//! `PlantUML` diagram discovery in markdown documents.
//!
//! Diagrams appear in two shapes:
//! - fenced code blocks tagged `plantuml` or `puml`
//! - image links pointing at a `.puml` file, resolved relative to the document
//!
//! Both are reported with the byte span they occupy in the document so the
//! processor can later swap that span for an image link.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*title[ \t]+(\S.*?)\s*$").unwrap());

static COMMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*'[ \t]*(\S.*?)\s*$").unwrap());

/// Where a diagram's source text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Fenced code block inside the document.
    Embedded,
    /// External `.puml` file referenced by an image link.
    Linked {
        /// Resolved path of the linked file.
        path: PathBuf,
        /// Alt text of the image link.
        alt: String,
    },
}

/// One diagram found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramSource {
    /// Diagram source text.
    pub text: String,
    /// Embedded block or linked file.
    pub provenance: Provenance,
    /// Document the diagram was found in.
    pub document: PathBuf,
    /// Byte range of the block or link in the document text.
    pub span: Range<usize>,
}

impl DiagramSource {
    /// Title for naming and alt text.
    ///
    /// Linked diagrams prefer their alt text; otherwise the source's `title`
    /// directive or first `'` comment is used.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        if let Provenance::Linked { alt, .. } = &self.provenance
            && !alt.trim().is_empty()
        {
            return Some(alt.trim().to_owned());
        }
        extract_title(&self.text)
    }
}

#[derive(Default)]
enum ScanState {
    #[default]
    Normal,
    InBlock {
        span: Range<usize>,
        text: String,
    },
    InImage {
        span: Range<usize>,
        dest: String,
        alt: String,
    },
}

/// Find every `PlantUML` diagram in `markdown`, ordered by position.
///
/// Linked files that cannot be read are skipped with a warning.
#[must_use]
pub fn extract_diagrams(markdown: &str, document: &Path) -> Vec<DiagramSource> {
    let document_dir = document.parent().unwrap_or(Path::new("."));
    let mut diagrams = Vec::new();
    let mut state = ScanState::Normal;

    for (event, range) in Parser::new_ext(markdown, Options::empty()).into_offset_iter() {
        match (&mut state, event) {
            (ScanState::Normal, Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))))
                if is_plantuml_fence(&info) =>
            {
                state = ScanState::InBlock {
                    span: range,
                    text: String::new(),
                };
            }
            (ScanState::Normal, Event::Start(Tag::Image { dest_url, .. }))
                if is_puml_link(&dest_url) =>
            {
                state = ScanState::InImage {
                    span: range,
                    dest: dest_url.into_string(),
                    alt: String::new(),
                };
            }
            (ScanState::InBlock { text, .. }, Event::Text(chunk)) => text.push_str(&chunk),
            (ScanState::InImage { alt, .. }, Event::Text(chunk) | Event::Code(chunk)) => {
                alt.push_str(&chunk);
            }
            (ScanState::InBlock { .. }, Event::End(TagEnd::CodeBlock)) => {
                if let ScanState::InBlock { span, text } = std::mem::take(&mut state) {
                    diagrams.push(DiagramSource {
                        text,
                        provenance: Provenance::Embedded,
                        document: document.to_path_buf(),
                        span: trim_span(markdown, span),
                    });
                }
            }
            (ScanState::InImage { .. }, Event::End(TagEnd::Image)) => {
                if let ScanState::InImage { span, dest, alt } = std::mem::take(&mut state) {
                    let path = document_dir.join(&dest);
                    match std::fs::read_to_string(&path) {
                        Ok(text) => diagrams.push(DiagramSource {
                            text,
                            provenance: Provenance::Linked { path, alt },
                            document: document.to_path_buf(),
                            span: trim_span(markdown, span),
                        }),
                        Err(e) => {
                            tracing::warn!("linked diagram {dest} not readable ({e}), skipping");
                        }
                    }
                }
            }
            _ => {}
        }
    }

    diagrams.sort_by_key(|d| d.span.start);
    diagrams
}

/// Title from a `title ...` directive, else from the first `'` comment.
#[must_use]
pub fn extract_title(source: &str) -> Option<String> {
    TITLE_PATTERN
        .captures(source)
        .or_else(|| COMMENT_PATTERN.captures(source))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

fn is_plantuml_fence(info: &CowStr<'_>) -> bool {
    matches!(info.split_whitespace().next(), Some("plantuml" | "puml"))
}

fn is_puml_link(dest: &CowStr<'_>) -> bool {
    Path::new(&**dest)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("puml"))
}

/// Exclude trailing line breaks so a replacement keeps the surrounding layout.
fn trim_span(markdown: &str, span: Range<usize>) -> Range<usize> {
    let trimmed = markdown[span.clone()].trim_end_matches(['\n', '\r']);
    span.start..span.start + trimmed.len()
}
