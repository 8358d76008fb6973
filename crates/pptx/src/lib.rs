//! Slide deck (Office Open XML) reading and writing.
//!
//! Decks are ZIP packages of XML parts. The reader inventories every text
//! run by shape, paragraph and run index; the writer copies the package and
//! swaps text at those same indices.

pub mod package;
pub mod reader;
pub mod walker;
pub mod writer;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use reader::DeckReader;
pub use writer::{DeckWriter, WriteReport};
