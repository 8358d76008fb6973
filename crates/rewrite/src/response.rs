//! Parsing the service's reply into slide entries.

use deck_core::{mark_failed, SlideTexts, REGENERATION_FAILED_MARKER};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap());

/// Why a reply could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("reply contains no JSON array of slides: {0}")]
    Malformed(String),

    #[error("reply has {actual} slide entries, expected {expected}")]
    CountMismatch { expected: usize, actual: usize },
}

/// A reply matched against the slides that were sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub slides: Vec<SlideTexts>,

    /// Adjustments made to fit the reply to the request.
    pub notes: Vec<String>,
}

/// Parse a reply body as an array of slide entries.
///
/// Tries the whole body, then the first fenced code block, then the span
/// from the first `[` to the last `]`.
pub fn parse_slides(body: &str) -> Result<Vec<SlideTexts>, ParseError> {
    let strict_error = match serde_json::from_str::<Vec<SlideTexts>>(body.trim()) {
        Ok(slides) => return Ok(slides),
        Err(e) => e.to_string(),
    };

    if let Some(inner) = FENCED_BLOCK.captures(body).and_then(|c| c.get(1)) {
        if let Ok(slides) = serde_json::from_str::<Vec<SlideTexts>>(inner.as_str().trim()) {
            return Ok(slides);
        }
    }

    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            if let Ok(slides) = serde_json::from_str::<Vec<SlideTexts>>(&body[start..=end]) {
                return Ok(slides);
            }
        }
    }

    Err(ParseError::Malformed(strict_error))
}

/// Fit parsed entries to the slides that were sent.
///
/// The entry count must match. Within a slide, missing blocks become
/// failure-marked originals and extra blocks are dropped, so every
/// returned slide has exactly the sent number of blocks. Slide numbers
/// are taken from the request.
pub fn reconcile(sent: &[SlideTexts], parsed: Vec<SlideTexts>) -> Result<Reconciled, ParseError> {
    if parsed.len() != sent.len() {
        return Err(ParseError::CountMismatch {
            expected: sent.len(),
            actual: parsed.len(),
        });
    }

    let mut notes = Vec::new();
    let slides = sent
        .iter()
        .zip(parsed)
        .map(|(original, mut entry)| {
            if entry.slide_number != original.slide_number {
                notes.push(format!(
                    "Reply entry numbered {} used for slide {}",
                    entry.slide_number, original.slide_number
                ));
                entry.slide_number = original.slide_number;
            }

            let expected = original.texts.len();
            let actual = entry.texts.len();
            if actual > expected {
                notes.push(format!(
                    "Slide {}: dropped {} extra text block(s)",
                    original.slide_number,
                    actual - expected
                ));
                entry.texts.truncate(expected);
            } else if actual < expected {
                notes.push(format!(
                    "Slide {}: {} text block(s) missing, originals kept with marker",
                    original.slide_number,
                    expected - actual
                ));
                entry.texts.extend(
                    original.texts[actual..]
                        .iter()
                        .map(|t| mark_failed(REGENERATION_FAILED_MARKER, t)),
                );
            }
            entry
        })
        .collect();

    Ok(Reconciled { slides, notes })
}
