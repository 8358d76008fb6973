//! Domain types for representing a deck, its rewritable text and the
//! outcome of a regeneration run.

use crate::run_log::LogEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Prefix applied to original text when a section could not be regenerated.
pub const REGENERATION_FAILED_MARKER: &str = "REGENERATION-FAILED: ";

/// Prefix applied to original text when the rewrite client failed outright.
pub const FINAL_ERROR_MARKER: &str = "FINAL-ERROR: ";

/// Prefix `text` with a failure marker.
pub fn mark_failed(marker: &str, text: &str) -> String {
    format!("{}{}", marker, text)
}

/// Read-only description of a source deck, produced once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckSnapshot {
    /// Number of slides in the deck.
    pub slide_count: usize,

    /// Canvas width in EMU.
    pub slide_width: u64,

    /// Canvas height in EMU.
    pub slide_height: u64,

    /// Slides in presentation order.
    pub slides: Vec<SlideRecord>,
}

impl DeckSnapshot {
    /// Create an empty snapshot with the given canvas size.
    pub fn new(slide_width: u64, slide_height: u64) -> Self {
        Self {
            slide_count: 0,
            slide_width,
            slide_height,
            slides: Vec::new(),
        }
    }

    /// Add a slide to the snapshot.
    pub fn add_slide(&mut self, slide: SlideRecord) {
        self.slides.push(slide);
        self.slide_count = self.slides.len();
    }
}

/// A single slide and everything the reader found on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideRecord {
    /// 1-based slide number.
    pub number: usize,

    /// Name of the slide layout, or "Unknown".
    pub layout: String,

    /// Shapes in document order.
    pub shapes: Vec<ShapeRecord>,

    /// Display text per shape (group text included).
    pub texts: Vec<String>,

    /// Problems found while reading this slide.
    pub warnings: Vec<String>,
}

impl SlideRecord {
    /// Create a new slide with the given number and layout name.
    pub fn new(number: usize, layout: impl Into<String>) -> Self {
        Self {
            number,
            layout: layout.into(),
            shapes: Vec::new(),
            texts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add a shape, recording its display text.
    pub fn add_shape(&mut self, shape: ShapeRecord) {
        let text = shape.display_text();
        let text = text.trim();
        if !text.is_empty() {
            self.texts.push(text.to_string());
        }
        self.shapes.push(shape);
    }
}

/// Kind of a top-level or grouped shape element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// `p:sp`
    AutoShape,
    /// `p:pic`
    Picture,
    /// `p:grpSp`
    Group,
    /// `p:graphicFrame` (tables, charts, diagrams)
    GraphicFrame,
    /// `p:cxnSp`
    Connector,
    /// `p:contentPart`
    ContentPart,
}

impl ShapeKind {
    /// Map an element local name to a shape kind.
    pub fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"sp" => Some(Self::AutoShape),
            b"pic" => Some(Self::Picture),
            b"grpSp" => Some(Self::Group),
            b"graphicFrame" => Some(Self::GraphicFrame),
            b"cxnSp" => Some(Self::Connector),
            b"contentPart" => Some(Self::ContentPart),
            _ => None,
        }
    }
}

/// Row and column counts of a table shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub rows: usize,
    pub columns: usize,
}

/// Where a run reference came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunSource {
    /// The run belongs to the shape itself and can be rewritten.
    #[default]
    Own,
    /// The run was flattened in from a descendant of a group shape.
    /// `path` holds child indices below the group.
    Grouped { path: Vec<usize> },
}

/// Address of one non-empty run inside a shape's text body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRef {
    pub paragraph_index: usize,
    pub run_index: usize,
    pub text: String,
    #[serde(default)]
    pub source: RunSource,
}

/// A shape and its text map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeRecord {
    /// 0-based position within the slide's shape tree.
    pub index: usize,

    /// Shape name from its non-visual properties.
    pub name: String,

    pub kind: ShapeKind,
    pub has_text: bool,
    pub has_table: bool,
    pub has_chart: bool,

    /// Table dimensions, when the shape holds a table.
    pub table: Option<TableInfo>,

    /// Non-empty runs in shape, paragraph, run order.
    pub text_map: Vec<RunRef>,

    /// Set on group shapes whose descendants carry text.
    pub group_text_warning: Option<String>,
}

impl ShapeRecord {
    /// Create an empty shape record.
    pub fn new(index: usize, kind: ShapeKind) -> Self {
        Self {
            index,
            name: String::new(),
            kind,
            has_text: false,
            has_table: false,
            has_chart: false,
            table: None,
            text_map: Vec::new(),
            group_text_warning: None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == ShapeKind::Group
    }

    /// Runs that may be handed to the writer as rewrite targets.
    pub fn rewritable_runs(&self) -> impl Iterator<Item = &RunRef> {
        let rewritable = !self.is_group();
        self.text_map
            .iter()
            .filter(move |r| rewritable && r.source == RunSource::Own)
    }

    /// Text of the shape: runs of one paragraph concatenated, paragraphs
    /// separated by newlines.
    pub fn display_text(&self) -> String {
        let mut out = String::new();
        let mut last: Option<(&RunSource, usize)> = None;
        for run in &self.text_map {
            let key = (&run.source, run.paragraph_index);
            if last.is_some() && last != Some(key) {
                out.push('\n');
            }
            out.push_str(&run.text);
            last = Some(key);
        }
        out
    }
}

/// Position-addressed view of the deck handed through regeneration and
/// back to the writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMapping {
    pub slide_count: usize,
    pub slides: Vec<SlideContent>,

    /// Deck-wide warnings (group text and read problems).
    pub warnings: Vec<String>,
}

/// One slide of the content mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideContent {
    pub number: usize,
    pub layout: String,

    /// Display texts, group text included.
    pub texts: Vec<String>,

    /// Rewritable runs in shape, paragraph, run order.
    pub text_mappings: Vec<TextMapping>,

    pub warnings: Vec<String>,

    /// Attached by the orchestrator once the slide has been processed.
    pub rewrite: Option<SlideRewrite>,
}

impl SlideContent {
    /// Run texts in mapping order; this is what the rewrite service sees.
    pub fn source_texts(&self) -> Vec<String> {
        self.text_mappings.iter().map(|m| m.text.clone()).collect()
    }

    /// The slide as a rewrite request entry.
    pub fn rewrite_source(&self) -> SlideTexts {
        SlideTexts {
            slide_number: self.number,
            texts: self.source_texts(),
        }
    }

    /// Regenerated text per mapping, if the slide has been processed.
    pub fn regenerated_texts(&self) -> Option<Vec<&str>> {
        self.rewrite.as_ref().map(|r| {
            r.replacements
                .iter()
                .map(|rep| rep.new_text.as_str())
                .collect()
        })
    }
}

/// Exact location of one run: shape, paragraph, run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextMapping {
    pub shape_index: usize,
    pub paragraph_index: usize,
    pub run_index: usize,
    pub text: String,
}

/// A slide's text blocks, as exchanged with the rewrite service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideTexts {
    pub slide_number: usize,
    #[serde(default)]
    pub texts: Vec<String>,
}

impl SlideTexts {
    /// Copy of `self` with every text prefixed by `marker`.
    pub fn placeholder(&self, marker: &str) -> Self {
        Self {
            slide_number: self.slide_number,
            texts: self.texts.iter().map(|t| mark_failed(marker, t)).collect(),
        }
    }
}

/// New text for one mapped run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub mapping: TextMapping,
    pub new_text: String,
}

/// Everything the orchestrator attaches to a processed slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideRewrite {
    /// One entry per text mapping, in mapping order.
    pub replacements: Vec<Replacement>,
    pub before_after: BeforeAfter,
}

impl SlideRewrite {
    /// Pair regenerated texts with the slide's mappings.
    ///
    /// Before/after changes cover only the positions both lists share.
    /// Mappings left without a regenerated text keep a failure-marked copy
    /// of their original text.
    pub fn from_regenerated(slide: &SlideContent, regenerated: Vec<String>) -> Self {
        let mut changes = Vec::with_capacity(regenerated.len());
        let mut regenerated = regenerated.into_iter();
        let mut replacements = Vec::with_capacity(slide.text_mappings.len());

        for mapping in &slide.text_mappings {
            let new_text = match regenerated.next() {
                Some(text) => {
                    changes.push(TextChange {
                        before: mapping.text.clone(),
                        after: text.clone(),
                    });
                    text
                }
                None => mark_failed(REGENERATION_FAILED_MARKER, &mapping.text),
            };
            replacements.push(Replacement {
                mapping: mapping.clone(),
                new_text,
            });
        }

        Self {
            replacements,
            before_after: BeforeAfter {
                slide_number: slide.number,
                changes,
                error: None,
            },
        }
    }

    /// Failure-marked originals with an empty change list.
    pub fn failed(slide: &SlideContent, reason: impl Into<String>) -> Self {
        let replacements = slide
            .text_mappings
            .iter()
            .map(|m| Replacement {
                mapping: m.clone(),
                new_text: mark_failed(REGENERATION_FAILED_MARKER, &m.text),
            })
            .collect();

        Self {
            replacements,
            before_after: BeforeAfter {
                slide_number: slide.number,
                changes: Vec::new(),
                error: Some(reason.into()),
            },
        }
    }
}

/// Per-slide before/after pairs, for reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeforeAfter {
    pub slide_number: usize,
    pub changes: Vec<TextChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub before: String,
    pub after: String,
}

/// Timing and bookkeeping for one processed section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    pub index: usize,
    pub slide_count: usize,
    pub slide_numbers: Vec<usize>,
    pub duration_secs: f64,
    pub regenerated_texts_count: usize,
    pub attempts: usize,
    pub failed: bool,
}

/// Aggregate outcome of one `process` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub total_slides: usize,
    pub section_count: usize,
    pub sections: Vec<SectionReport>,
    pub key_concepts: BTreeSet<String>,
    pub before_after: Vec<BeforeAfter>,
    pub warnings: Vec<String>,
    pub total_duration_secs: f64,
    pub modification_secs: f64,
    pub replaced_runs: usize,
    pub success: bool,
    pub debug_log: Vec<LogEntry>,
}
