//! Stub transports for tests of code built on the rewrite client.

use crate::transport::{ChatRequest, ChatTransport, TransportError};
use deck_core::SlideTexts;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Transport answering from a closure; counts calls.
///
/// The closure receives the request and the zero-based call number.
pub struct StubTransport<F> {
    reply: F,
    calls: AtomicUsize,
}

impl<F> StubTransport<F>
where
    F: Fn(&ChatRequest, usize) -> Result<String, TransportError> + Send + Sync,
{
    pub fn new(reply: F) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    /// Requests answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> ChatTransport for StubTransport<F>
where
    F: Fn(&ChatRequest, usize) -> Result<String, TransportError> + Send + Sync,
{
    async fn complete(&self, request: &ChatRequest) -> Result<String, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(request, call)
    }
}

/// Answer a prompt by applying `rewrite` to every `TEXT j:` block of every
/// `SLIDE n:` it lists.
pub fn echo_reply(prompt: &str, rewrite: impl Fn(&str) -> String) -> String {
    let mut slides: Vec<SlideTexts> = Vec::new();
    for line in prompt.lines() {
        if let Some(number) = line
            .strip_prefix("SLIDE ")
            .and_then(|rest| rest.strip_suffix(':'))
            .and_then(|n| n.parse().ok())
        {
            slides.push(SlideTexts {
                slide_number: number,
                texts: Vec::new(),
            });
        } else if let (Some(text), Some(slide)) = (text_block(line), slides.last_mut()) {
            slide.texts.push(rewrite(text));
        }
    }
    serde_json::to_string(&slides).unwrap_or_default()
}

fn text_block(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("TEXT ")?;
    let (index, text) = rest.split_once(": ")?;
    index.parse::<usize>().ok()?;
    Some(text)
}
