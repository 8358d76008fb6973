//! Cleanup for text coming back from the rewrite service.
//!
//! Generated text is written straight into slide XML, so it is normalized
//! to NFC and stripped of characters XML 1.0 cannot carry.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Control characters other than tab, line feed and carriage return.
static XML_ILLEGAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x{FFFE}\x{FFFF}]").unwrap());

/// Normalize a regenerated text block before it is written to a run.
///
/// - Composes the text to Unicode NFC
/// - Removes control characters that are illegal in XML 1.0
/// - Turns `\r\n` and lone `\r` into `\n`
///
/// Surrounding whitespace is preserved; runs often rely on it.
pub fn sanitize_generated_text(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let stripped = XML_ILLEGAL_REGEX.replace_all(&composed, "");
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}

/// Whether a run's text carries anything besides whitespace.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
