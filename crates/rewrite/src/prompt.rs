//! Request text for the rewrite service.

use deck_core::SlideTexts;
use std::collections::BTreeSet;
use std::fmt::Write;

/// System message sent with every request.
pub const SYSTEM_MESSAGE: &str = "You are a professional presentation content regenerator.";

const FRAMING: &str = "You are a professional presentation content regenerator. Your task is to completely rewrite the content for a PowerPoint presentation while maintaining the original structure, purpose, and approximate length.
IMPORTANT: This is a PROVEN SALES FRAMEWORK for selling courses. Maintain all persuasive elements, psychological triggers, and call-to-action structures while changing only the specific topic and examples.";

const INSTRUCTIONS: &str = "INSTRUCTIONS:
1. ADAPT each slide's text to the new course topic while PRESERVING the original persuasive structure
2. Keep the same number of text blocks per slide
3. Maintain approximately the same length for each text block
4. Never cut sentences in half - always complete thoughts
5. Preserve all sales psychology elements like:
   - Attention-grabbing hooks and questions
   - Credibility statements
   - Pain points and objection handling
   - Call-to-action language
   - Social proof references
   - Urgency and scarcity elements
6. Return your response as a properly formatted JSON array

FORMAT OF RESPONSE:
[
  {
    \"slide_number\": 1,
    \"texts\": [
      \"Regenerated text for the first text block\",
      \"Regenerated text for the second text block\"
    ]
  },
  {
    \"slide_number\": 2,
    \"texts\": [
      \"Regenerated text for this slide's text block\"
    ]
  }
]

Remember: Your goal is NOT to create entirely new content, but to ADAPT the proven sales framework to the new course topic. The structure and persuasive elements are what make this framework effective.
";

/// Everything a prompt is built from, besides the slides themselves.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub previous_summary: &'a str,
    pub key_concepts: &'a BTreeSet<String>,
    pub user_info: &'a str,
}

/// Compose the user message for one sub-batch.
///
/// Slides are labelled `SLIDE n:` and their blocks `TEXT j:` (1-based).
pub fn build_prompt(slides: &[SlideTexts], context: PromptContext<'_>) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(FRAMING);
    prompt.push_str("\n\n");

    let user_info = context.user_info.trim();
    if !user_info.is_empty() {
        let _ = write!(
            prompt,
            "\nUSER CONTEXT:\nThe content should be tailored to the following industry/use case:\n{}\n\n",
            user_info
        );
    }
    prompt.push('\n');

    if !context.key_concepts.is_empty() {
        prompt.push_str("KEY CONCEPTS TO MAINTAIN CONSISTENCY WITH:\n");
        for concept in context.key_concepts {
            let _ = writeln!(prompt, "- {}", concept);
        }
        prompt.push('\n');
    }

    let _ = write!(
        prompt,
        "\nPREVIOUS CONTENT SUMMARY:\n{}\n\nCURRENT SLIDES TO REGENERATE:\n",
        context.previous_summary
    );
    for slide in slides {
        let _ = writeln!(prompt, "SLIDE {}:", slide.slide_number);
        for (j, text) in slide.texts.iter().enumerate() {
            let _ = writeln!(prompt, "TEXT {}: {}", j + 1, text);
        }
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(INSTRUCTIONS);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slides() -> Vec<SlideTexts> {
        vec![
            SlideTexts {
                slide_number: 4,
                texts: vec!["Learn Day Trading".to_string(), "Start today".to_string()],
            },
            SlideTexts {
                slide_number: 5,
                texts: vec![],
            },
        ]
    }

    #[test]
    fn test_prompt_labels_slides_and_blocks() {
        let concepts = BTreeSet::new();
        let prompt = build_prompt(
            &slides(),
            PromptContext {
                previous_summary: "",
                key_concepts: &concepts,
                user_info: "",
            },
        );

        assert!(prompt.contains("SLIDE 4:\nTEXT 1: Learn Day Trading\nTEXT 2: Start today\n"));
        assert!(prompt.contains("SLIDE 5:\n\n"));
        assert!(prompt.contains("Keep the same number of text blocks per slide"));
        assert!(!prompt.contains("USER CONTEXT"));
        assert!(!prompt.contains("KEY CONCEPTS"));
    }

    #[test]
    fn test_prompt_includes_context() {
        let concepts: BTreeSet<String> = ["Day Trading Course".to_string()].into();
        let prompt = build_prompt(
            &slides(),
            PromptContext {
                previous_summary: "Section 1 Summary: Earlier slides",
                key_concepts: &concepts,
                user_info: "  Real estate investing  ",
            },
        );

        assert!(prompt.contains("industry/use case:\nReal estate investing\n"));
        assert!(prompt.contains("KEY CONCEPTS TO MAINTAIN CONSISTENCY WITH:\n- Day Trading Course\n"));
        assert!(prompt.contains("PREVIOUS CONTENT SUMMARY:\nSection 1 Summary: Earlier slides\n"));
    }
}
