//! Core domain types, content mapping, sectioning and context distillation
//! for slide-deck text regeneration.

pub mod config;
pub mod context;
pub mod error;
pub mod mapper;
pub mod normalize;
pub mod run_log;
pub mod sections;
pub mod types;

pub use config::ProcessorConfig;
pub use context::{extract_key_concepts, summarize_section, RunningContext};
pub use error::{Error, Result};
pub use mapper::build_content_mapping;
pub use normalize::sanitize_generated_text;
pub use run_log::{LogEntry, RunLog};
pub use sections::split_into_sections;
pub use types::{
    mark_failed, BeforeAfter, ContentMapping, DeckSnapshot, ProcessingResult, Replacement,
    RunRef, RunSource, SectionReport, ShapeKind, ShapeRecord, SlideContent, SlideRecord,
    SlideRewrite, SlideTexts, TableInfo, TextChange, TextMapping, FINAL_ERROR_MARKER,
    REGENERATION_FAILED_MARKER,
};
