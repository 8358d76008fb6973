//! Error types for slide-deck text regeneration.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, rewriting or writing a deck.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open, read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The package is not a slide deck or is missing required parts.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// No API key was configured for the rewrite service.
    #[error("Rewrite service API key not provided (set DEEPSEEK_API_KEY)")]
    MissingApiKey,

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The deck has more slides than the configured limit.
    #[error("Presentation exceeds maximum allowed slides. Max: {max}, Current: {actual}")]
    TooManySlides { max: usize, actual: usize },

    /// The rewrite service could not be reached or answered badly.
    #[error("Rewrite service error: {0}")]
    RewriteError(String),

    /// Failed to serialize a report.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Whether this error is a configuration error (never retried).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::MissingApiKey | Error::InvalidConfig(_) | Error::TooManySlides { .. }
        )
    }
}
