//! Derives the position-addressed content mapping from a deck snapshot.

use crate::run_log::RunLog;
use crate::types::{ContentMapping, DeckSnapshot, SlideContent, TextMapping};

/// Build the content mapping for `snapshot`.
///
/// Mappings are emitted in shape order, then paragraph order, then run
/// order. Runs flattened in from group shapes never become mappings; the
/// group's warning is copied to the slide and to the deck-wide list.
pub fn build_content_mapping(snapshot: &DeckSnapshot, log: &RunLog) -> ContentMapping {
    let mut warnings = Vec::new();
    let mut slides = Vec::with_capacity(snapshot.slides.len());

    for slide in &snapshot.slides {
        let mut slide_warnings = slide.warnings.clone();
        let mut text_mappings = Vec::new();

        for shape in &slide.shapes {
            if let Some(warning) = &shape.group_text_warning {
                slide_warnings.push(warning.clone());
            }
            text_mappings.extend(shape.rewritable_runs().map(|run| TextMapping {
                shape_index: shape.index,
                paragraph_index: run.paragraph_index,
                run_index: run.run_index,
                text: run.text.clone(),
            }));
        }

        warnings.extend(
            slide_warnings
                .iter()
                .map(|w| format!("Slide {}: {}", slide.number, w)),
        );

        slides.push(SlideContent {
            number: slide.number,
            layout: slide.layout.clone(),
            texts: slide.texts.clone(),
            text_mappings,
            warnings: slide_warnings,
            rewrite: None,
        });
    }

    let mapped: usize = slides.iter().map(|s| s.text_mappings.len()).sum();
    log.info(
        "map",
        format!(
            "Mapped {} rewritable runs across {} slides ({} warnings)",
            mapped,
            slides.len(),
            warnings.len()
        ),
    );

    ContentMapping {
        slide_count: snapshot.slide_count,
        slides,
        warnings,
    }
}
