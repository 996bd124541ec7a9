//! Visual description seam: image plus prompt in, natural-language text out.

use std::path::Path;
use thiserror::Error;

/// Failure of a description call.
#[derive(Error, Debug)]
pub enum DescribeError {
    /// Network, timeout or rate-limit failure; repeating the call is safe.
    #[error("transient description failure: {0}")]
    Transient(String),

    /// The request was rejected and will not succeed on retry.
    #[error("description request rejected: {0}")]
    Rejected(String),

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

impl DescribeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DescribeError::Transient(_))
    }
}

/// A capability that describes a slide image.
///
/// Implementations must be idempotent: the router may call them again for
/// the same slide. An empty string means the image carries no content
/// (a logo or decoration).
pub trait VisualDescriber: Send + Sync {
    fn describe(&self, image: &Path, prompt: &str) -> Result<String, DescribeError>;
}
