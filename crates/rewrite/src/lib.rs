//! Rewrite client for slide text.
//!
//! A section of slides is sized into sub-batches, each sent as one chat
//! request. Transport and parse failures are retried; whatever still fails
//! degrades to failure-marked copies of the input, so callers always get
//! one entry per slide back.

pub mod client;
pub mod config;
pub mod prompt;
pub mod response;
pub mod tokens;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{RewriteClient, RewriteRequest, SectionRewriter};
pub use config::RewriteConfig;
pub use transport::{ChatMessage, ChatRequest, ChatTransport, HttpTransport, TransportError};
