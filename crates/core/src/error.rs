//! Error types for presentation classification and extraction.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing a presentation.
///
/// Only document-level variants ([`Error::Parse`], [`Error::UnsupportedFormat`],
/// [`Error::Merge`], [`Error::Io`]) ever reach the caller. The per-slide
/// variants are recovered inside the classifier and router.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read a file or write an artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source document could not be parsed at all.
    #[error("Failed to parse presentation: {0}")]
    Parse(String),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Per-slide shape analysis failed.
    #[error("Failed to classify slide {slide}: {reason}")]
    Classification { slide: usize, reason: String },

    /// Per-slide extraction failed (remote call or rendering).
    #[error("Failed to extract slide {slide}: {reason}")]
    Extraction { slide: usize, reason: String },

    /// Every configured renderer failed for a slide.
    #[error("All {attempts} rendering methods failed for slide {slide}")]
    RenderingExhausted { slide: usize, attempts: usize },

    /// Per-slide results could not be combined.
    #[error("Failed to merge results: {0}")]
    Merge(String),
}

impl Error {
    /// The error class name reported in a failed outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "IoError",
            Error::Parse(_) => "ParseError",
            Error::UnsupportedFormat(_) => "UnsupportedFormat",
            Error::Classification { .. } => "ClassificationError",
            Error::Extraction { .. } => "ExtractionError",
            Error::RenderingExhausted { .. } => "RenderingExhausted",
            Error::Merge(_) => "MergeError",
        }
    }
}
