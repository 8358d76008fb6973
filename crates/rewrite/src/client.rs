//! Section rewriting with sub-batching, retry and placeholder fallback.

use crate::config::RewriteConfig;
use crate::prompt::{build_prompt, PromptContext};
use crate::response::{parse_slides, reconcile};
use crate::tokens::{estimate_tokens, pack_batches};
use crate::transport::{ChatRequest, ChatTransport};
use deck_core::{RunLog, SlideTexts, FINAL_ERROR_MARKER, REGENERATION_FAILED_MARKER};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

const STAGE: &str = "rewrite";

/// One section's worth of rewrite input.
#[derive(Debug, Clone, Copy)]
pub struct RewriteRequest<'a> {
    pub slides: &'a [SlideTexts],
    pub previous_summary: &'a str,
    pub key_concepts: &'a BTreeSet<String>,
    pub user_info: &'a str,
}

impl<'a> RewriteRequest<'a> {
    fn prompt_context(&self) -> PromptContext<'a> {
        PromptContext {
            previous_summary: self.previous_summary,
            key_concepts: self.key_concepts,
            user_info: self.user_info,
        }
    }
}

/// Produces regenerated text for a section of slides.
///
/// Implementations return one entry per input slide, in input order, each
/// with as many text blocks as the input. Content problems degrade to
/// failure-marked text rather than errors.
pub trait SectionRewriter: Send + Sync {
    fn rewrite_section(
        &self,
        request: RewriteRequest<'_>,
        log: &RunLog,
    ) -> impl Future<Output = Vec<SlideTexts>> + Send;
}

/// Rewrite client over a chat transport.
pub struct RewriteClient<T> {
    transport: T,
    config: RewriteConfig,
}

impl<T: ChatTransport> RewriteClient<T> {
    pub fn new(transport: T, config: RewriteConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Regenerate one sub-batch, retrying transport and parse failures.
    async fn rewrite_batch(
        &self,
        label: &str,
        batch: &[SlideTexts],
        context: PromptContext<'_>,
        log: &RunLog,
    ) -> Result<Vec<SlideTexts>, String> {
        let prompt = build_prompt(batch, context);
        log.debug(
            STAGE,
            format!(
                "{}: {} slides, prompt {} chars, ~{} tokens",
                label,
                batch.len(),
                prompt.len(),
                estimate_tokens(&prompt)
            ),
        );
        let request = ChatRequest::new(&self.config, prompt);

        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 0..attempts {
            match self.transport.complete(&request).await {
                Ok(body) => match parse_slides(&body).and_then(|parsed| reconcile(batch, parsed)) {
                    Ok(reconciled) => {
                        for note in reconciled.notes {
                            log.warn(STAGE, format!("{}: {}", label, note));
                        }
                        return Ok(reconciled.slides);
                    }
                    Err(e) => {
                        log.warn(
                            STAGE,
                            format!("{}: parse failed on attempt {}: {}", label, attempt + 1, e),
                        );
                        last_error = e.to_string();
                    }
                },
                Err(e) if e.is_retryable() => {
                    log.warn(
                        STAGE,
                        format!("{}: attempt {} failed: {}", label, attempt + 1, e),
                    );
                    last_error = e.to_string();
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
                Err(e) => return Err(e.to_string()),
            }
        }
        Err(format!("gave up after {} attempts: {}", attempts, last_error))
    }

    /// `base * 2^attempt` plus up to one `base` of jitter.
    fn backoff(&self, attempt: usize) -> Duration {
        let base = self.config.backoff_base();
        let exponential = base.saturating_mul(1u32 << attempt.min(16));
        exponential + base.mul_f64(rand::random::<f64>())
    }
}

impl<T: ChatTransport> SectionRewriter for RewriteClient<T> {
    async fn rewrite_section(&self, request: RewriteRequest<'_>, log: &RunLog) -> Vec<SlideTexts> {
        let slides = request.slides;
        if slides.is_empty() {
            return Vec::new();
        }

        let batches = pack_batches(slides, self.config.content_budget());
        log.info(
            STAGE,
            format!("Split {} slides into {} batches", slides.len(), batches.len()),
        );

        let mut regenerated = Vec::with_capacity(slides.len());
        for (i, batch) in batches.iter().enumerate() {
            let label = format!("Batch {}/{}", i + 1, batches.len());
            match self
                .rewrite_batch(&label, batch, request.prompt_context(), log)
                .await
            {
                Ok(result) => regenerated.extend(result),
                Err(reason) => {
                    log.warn(
                        STAGE,
                        format!("{}: falling back to original text: {}", label, reason),
                    );
                    regenerated.extend(
                        batch
                            .iter()
                            .map(|slide| slide.placeholder(REGENERATION_FAILED_MARKER)),
                    );
                }
            }
        }

        if !matches_request(slides, &regenerated) {
            log.warn(
                STAGE,
                format!(
                    "Regenerated content does not match the {} requested slides; using originals",
                    slides.len()
                ),
            );
            return slides
                .iter()
                .map(|slide| slide.placeholder(FINAL_ERROR_MARKER))
                .collect();
        }
        regenerated
    }
}

/// One entry per slide, same numbers, same block counts.
fn matches_request(sent: &[SlideTexts], regenerated: &[SlideTexts]) -> bool {
    sent.len() == regenerated.len()
        && sent.iter().zip(regenerated).all(|(a, b)| {
            a.slide_number == b.slide_number && a.texts.len() == b.texts.len()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{echo_reply, StubTransport};
    use crate::transport::TransportError;

    fn slides(texts: &[&[&str]]) -> Vec<SlideTexts> {
        texts
            .iter()
            .enumerate()
            .map(|(i, blocks)| SlideTexts {
                slide_number: i + 1,
                texts: blocks.iter().map(|t| t.to_string()).collect(),
            })
            .collect()
    }

    fn config() -> RewriteConfig {
        RewriteConfig::default().with_backoff_base(Duration::from_millis(10))
    }

    async fn run<T: ChatTransport>(client: &RewriteClient<T>, input: &[SlideTexts]) -> Vec<SlideTexts> {
        let concepts = BTreeSet::new();
        client
            .rewrite_section(
                RewriteRequest {
                    slides: input,
                    previous_summary: "",
                    key_concepts: &concepts,
                    user_info: "",
                },
                &RunLog::new(),
            )
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_reply_is_used() {
        let client = RewriteClient::new(
            StubTransport::new(|req: &ChatRequest, _| Ok(echo_reply(req.user_prompt(), str::to_uppercase))),
            config(),
        );
        let input = slides(&[&["Learn Day Trading", "Start today"], &["Join now"]]);
        let output = run(&client, &input).await;

        assert_eq!(output[0].texts, vec!["LEARN DAY TRADING", "START TODAY"]);
        assert_eq!(output[1].texts, vec!["JOIN NOW"]);
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_reply_retries_then_placeholder() {
        let client = RewriteClient::new(
            StubTransport::new(|_: &ChatRequest, _| Ok("not json at all".to_string())),
            config(),
        );
        let input = slides(&[&["A", "B"], &["C"]]);
        let output = run(&client, &input).await;

        assert_eq!(client.transport().calls(), 3);
        assert_eq!(output.len(), 2);
        assert_eq!(
            output[0].texts,
            vec![
                format!("{}A", REGENERATION_FAILED_MARKER),
                format!("{}B", REGENERATION_FAILED_MARKER)
            ]
        );
        assert_eq!(output[1].texts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_not_retried() {
        let client = RewriteClient::new(
            StubTransport::new(|_: &ChatRequest, _| {
                Err(TransportError::Status {
                    code: 500,
                    body: "internal".to_string(),
                })
            }),
            config(),
        );
        let input = slides(&[&["Join now"]]);
        let output = run(&client, &input).await;

        assert_eq!(client.transport().calls(), 1);
        assert_eq!(
            output[0].texts,
            vec![format!("{}Join now", REGENERATION_FAILED_MARKER)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let client = RewriteClient::new(
            StubTransport::new(|req: &ChatRequest, call| {
                if call < 2 {
                    Err(TransportError::Timeout("slow".to_string()))
                } else {
                    Ok(echo_reply(req.user_prompt(), |t| format!("new {}", t)))
                }
            }),
            config(),
        );
        let input = slides(&[&["old"]]);
        let output = run(&client, &input).await;

        assert_eq!(client.transport().calls(), 3);
        assert_eq!(output[0].texts, vec!["new old"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_batches_concatenate_in_order() {
        let client = RewriteClient::new(
            StubTransport::new(|req: &ChatRequest, _| Ok(echo_reply(req.user_prompt(), str::to_uppercase))),
            config().with_token_budget(520),
        );
        // 20 tokens of budget: two minimum-cost slides per request
        let input = slides(&[&["a"], &["b"], &["c"], &["d"], &["e"]]);
        let output = run(&client, &input).await;

        assert_eq!(client.transport().calls(), 3);
        let numbers: Vec<usize> = output.iter().map(|s| s.slide_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(output[4].texts, vec!["E"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_does_not_affect_others() {
        let client = RewriteClient::new(
            StubTransport::new(|req: &ChatRequest, _| {
                if req.user_prompt().contains("SLIDE 1:") {
                    Err(TransportError::Status {
                        code: 502,
                        body: String::new(),
                    })
                } else {
                    Ok(echo_reply(req.user_prompt(), str::to_uppercase))
                }
            }),
            config().with_token_budget(510),
        );
        let input = slides(&[&["first"], &["second"]]);
        let output = run(&client, &input).await;

        assert_eq!(
            output[0].texts,
            vec![format!("{}first", REGENERATION_FAILED_MARKER)]
        );
        assert_eq!(output[1].texts, vec!["SECOND"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_section_makes_no_calls() {
        let client = RewriteClient::new(
            StubTransport::new(|_: &ChatRequest, _| Ok("[]".to_string())),
            config(),
        );
        assert!(run(&client, &[]).await.is_empty());
        assert_eq!(client.transport().calls(), 0);
    }

    #[test]
    fn test_backoff_grows_with_jitter_bound() {
        let client = RewriteClient::new(
            StubTransport::new(|_: &ChatRequest, _| Ok(String::new())),
            config().with_backoff_base(Duration::from_millis(100)),
        );
        for attempt in 0..3 {
            let delay = client.backoff(attempt);
            let floor = Duration::from_millis(100 << attempt);
            assert!(delay >= floor && delay <= floor + Duration::from_millis(100));
        }
    }
}
