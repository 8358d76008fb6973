//! Token estimation and sub-batch packing.
//!
//! The estimate is a deterministic heuristic, not a tokenizer: words plus
//! weighted counts of punctuation, JSON-ish brackets and digit/symbol runs,
//! padded by a fifth.

use deck_core::SlideTexts;
use regex::Regex;
use std::sync::LazyLock;

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.,!?;:]").unwrap());
static STRUCTURE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[{}\[\]:"]"#).unwrap());
static SPECIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+|[#@%&*()]").unwrap());

/// Smallest estimate ever returned.
const MIN_TOKENS: usize = 10;

/// Estimate the token cost of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = PUNCTUATION.find_iter(text).count() / 2;
    let structure = STRUCTURE.find_iter(text).count() / 3;
    let special = SPECIAL.find_iter(text).count() / 3;

    let total = (words + punctuation + structure + special) as f64 * 1.2;
    (total as usize).max(MIN_TOKENS)
}

/// Estimated cost of one slide's text blocks.
pub fn slide_tokens(slide: &SlideTexts) -> usize {
    estimate_tokens(&slide.texts.join("\n"))
}

/// Greedily pack slides, in order, into sub-batches whose estimated cost
/// stays within `budget`.
///
/// A slide that alone exceeds the budget becomes its own sub-batch.
pub fn pack_batches(slides: &[SlideTexts], budget: usize) -> Vec<&[SlideTexts]> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut current = 0;

    for (i, slide) in slides.iter().enumerate() {
        let cost = slide_tokens(slide);
        if current + cost > budget && i > start {
            batches.push(&slides[start..i]);
            start = i;
            current = 0;
        }
        current += cost;
    }
    if start < slides.len() {
        batches.push(&slides[start..]);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(number: usize, text: &str) -> SlideTexts {
        SlideTexts {
            slide_number: number,
            texts: vec![text.to_string()],
        }
    }

    #[test]
    fn test_short_text_gets_minimum() {
        assert_eq!(estimate_tokens(""), MIN_TOKENS);
        assert_eq!(estimate_tokens("Join now"), MIN_TOKENS);
    }

    #[test]
    fn test_estimate_counts_words_and_symbols() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        // 12 words * 1.2
        assert_eq!(estimate_tokens(text), 14);

        let text = format!("{} 100 200 300 ...", text);
        // 16 words + 3 dots/2 + 3 numbers/3, * 1.2
        assert_eq!(estimate_tokens(&text), 21);
    }

    #[test]
    fn test_pack_respects_budget_and_order() {
        let slides: Vec<SlideTexts> = (1..=5).map(|n| slide(n, "short")).collect();
        let batches = pack_batches(&slides, 25);

        assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![2, 2, 1]);
        let numbers: Vec<usize> = batches
            .iter()
            .flat_map(|b| b.iter().map(|s| s.slide_number))
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_oversized_slide_is_its_own_batch() {
        let long = "word ".repeat(500);
        let slides = vec![slide(1, "short"), slide(2, &long), slide(3, "short")];
        let batches = pack_batches(&slides, 100);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1][0].slide_number, 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(pack_batches(&[], 100).is_empty());
    }
}
