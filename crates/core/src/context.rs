//! Running context carried from one section to the next.
//!
//! Both functions are crude on purpose: the summary is a truncated
//! concatenation and key concepts are capitalized phrases.

use crate::types::SlideContent;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// A capitalized word followed by a run of words, digits and spaces.
static CAPITALIZED_PHRASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9]+ [A-Za-z0-9 ]+\b").unwrap());

/// Phrases this short or shorter are ignored.
const MIN_CONCEPT_LEN: usize = 5;

/// Marker appended to a truncated summary.
const ELLIPSIS: &str = "...";

/// Regenerated texts of a slide, or its original texts when it has none.
fn slide_text(slide: &SlideContent) -> String {
    match slide.regenerated_texts() {
        Some(texts) => texts.join(" "),
        None => slide.texts.join(" "),
    }
}

fn section_text(section: &[SlideContent]) -> String {
    section
        .iter()
        .map(slide_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summarize a processed section in at most `max_chars` characters
/// (plus an ellipsis when truncated).
pub fn summarize_section(section: &[SlideContent], max_chars: usize) -> String {
    let full = section_text(section);
    if full.chars().count() <= max_chars {
        return full;
    }
    let mut truncated: String = full.chars().take(max_chars).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Extract capitalized multi-word phrases from a processed section.
pub fn extract_key_concepts(section: &[SlideContent]) -> BTreeSet<String> {
    concepts_in(&section_text(section))
}

/// Capitalized multi-word phrases longer than five characters.
pub fn concepts_in(text: &str) -> BTreeSet<String> {
    CAPITALIZED_PHRASE_REGEX
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|phrase| phrase.len() > MIN_CONCEPT_LEN)
        .map(str::to_string)
        .collect()
}

/// Accumulated context threaded through the sections of one run.
#[derive(Debug, Clone, Default)]
pub struct RunningContext {
    /// Summaries of every processed section, one line each.
    pub summary: String,

    /// Concepts seen so far; never pruned within a run.
    pub key_concepts: BTreeSet<String>,
}

impl RunningContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a processed section into the context.
    pub fn absorb(&mut self, section_index: usize, section: &[SlideContent], max_chars: usize) {
        let summary = summarize_section(section, max_chars);
        self.summary
            .push_str(&format!("\nSection {} Summary: {}", section_index + 1, summary));
        self.key_concepts.extend(extract_key_concepts(section));
    }
}
