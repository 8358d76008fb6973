//! Deck regeneration pipeline.
//!
//! Reads a deck, maps its runs, drives sections through a rewriter while
//! carrying context forward, and writes the result to a fresh copy of the
//! original.

pub mod orchestrator;
pub mod processor;
pub mod progress;

pub use orchestrator::SectionOrchestrator;
pub use processor::DeckProcessor;
pub use progress::{Progress, ProgressCallback};
