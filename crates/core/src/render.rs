//! Slide rasterization seam and the ordered fallback chain over it.

use crate::error::{Error, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure of a single rendering attempt.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The renderer cannot run here (missing binary, wrong platform).
    #[error("renderer unavailable: {0}")]
    Unavailable(String),

    /// A subprocess exceeded its wall-clock ceiling and was killed.
    #[error("timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// The renderer ran but produced no image.
    #[error("rendering failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One request to rasterize a slide.
#[derive(Debug, Clone)]
pub struct RenderJob<'a> {
    /// Path of the source presentation.
    pub deck: &'a Path,
    /// 1-based slide number.
    pub slide: usize,
    /// Directory rendered images and intermediates are written to.
    pub scratch_dir: &'a Path,
    /// File stem unique to this job; renderers derive every file name from it.
    pub stem: String,
}

impl<'a> RenderJob<'a> {
    /// Create a job with a stem unique to the slide and the current instant.
    pub fn new(deck: &'a Path, slide: usize, scratch_dir: &'a Path) -> Self {
        let deck_stem = deck
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("deck")
            .replace(' ', "_");
        let stem = format!(
            "slide_{}_{}_{}",
            slide,
            deck_stem,
            Utc::now().format("%Y%m%d_%H%M%S_%9f")
        );
        Self {
            deck,
            slide,
            scratch_dir,
            stem,
        }
    }

    /// Path of the final PNG for this job.
    pub fn image_path(&self) -> PathBuf {
        self.scratch_dir.join(format!("{}.png", self.stem))
    }

    /// Path of an intermediate file with the given suffix.
    pub fn intermediate_path(&self, suffix: &str) -> PathBuf {
        self.scratch_dir.join(format!("{}_{}", self.stem, suffix))
    }
}

/// Something that can turn one slide into an image file.
pub trait SlideRenderer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render the slide and return the path of the written image.
    fn render(&self, job: &RenderJob<'_>) -> std::result::Result<PathBuf, RenderError>;
}

/// Renderers tried in priority order until one succeeds.
#[derive(Default)]
pub struct RenderChain {
    renderers: Vec<Box<dyn SlideRenderer>>,
}

impl RenderChain {
    /// Create an empty chain. Every render fails with
    /// [`Error::RenderingExhausted`] until renderers are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a renderer at the lowest priority.
    pub fn with(mut self, renderer: impl SlideRenderer + 'static) -> Self {
        self.renderers.push(Box::new(renderer));
        self
    }

    /// Append a boxed renderer at the lowest priority.
    pub fn push(&mut self, renderer: Box<dyn SlideRenderer>) {
        self.renderers.push(renderer);
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Names of the configured renderers, in order.
    pub fn names(&self) -> Vec<&str> {
        self.renderers.iter().map(|r| r.name()).collect()
    }

    /// Try each renderer in order and return the first image produced.
    ///
    /// A renderer that reports success but leaves no file behind counts as a
    /// failure.
    pub fn render(&self, job: &RenderJob<'_>) -> Result<PathBuf> {
        for renderer in &self.renderers {
            match renderer.render(job) {
                Ok(path) if path.is_file() => {
                    log::debug!(
                        "Slide {} rendered by {}: {}",
                        job.slide,
                        renderer.name(),
                        path.display()
                    );
                    return Ok(path);
                }
                Ok(path) => {
                    log::warn!(
                        "{} reported {} for slide {} but the file is missing",
                        renderer.name(),
                        path.display(),
                        job.slide
                    );
                }
                Err(e) => {
                    log::warn!("{} failed for slide {}: {}", renderer.name(), job.slide, e);
                }
            }
        }
        Err(Error::RenderingExhausted {
            slide: job.slide,
            attempts: self.renderers.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing(Arc<AtomicUsize>);

    impl SlideRenderer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn render(&self, _job: &RenderJob<'_>) -> std::result::Result<PathBuf, RenderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(RenderError::Unavailable("no office suite".into()))
        }
    }

    struct Writing(Arc<AtomicUsize>);

    impl SlideRenderer for Writing {
        fn name(&self) -> &str {
            "writing"
        }

        fn render(&self, job: &RenderJob<'_>) -> std::result::Result<PathBuf, RenderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            let path = job.image_path();
            std::fs::write(&path, b"png")?;
            Ok(path)
        }
    }

    struct Lying;

    impl SlideRenderer for Lying {
        fn name(&self) -> &str {
            "lying"
        }

        fn render(&self, job: &RenderJob<'_>) -> std::result::Result<PathBuf, RenderError> {
            Ok(job.scratch_dir.join("never-written.png"))
        }
    }

    #[test]
    fn test_falls_through_to_first_success() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));
        let chain = RenderChain::new()
            .with(Failing(first.clone()))
            .with(Lying)
            .with(Writing(second.clone()))
            .with(Writing(third.clone()));

        let deck = dir.path().join("deck.pptx");
        let job = RenderJob::new(&deck, 2, dir.path());
        let path = chain.render(&job).unwrap();

        assert_eq!(path, job.image_path());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_exhausted_chain() {
        let dir = tempfile::tempdir().unwrap();
        let chain = RenderChain::new().with(Failing(Arc::new(AtomicUsize::new(0))));
        let deck = dir.path().join("deck.pptx");
        let err = chain.render(&RenderJob::new(&deck, 4, dir.path())).unwrap_err();
        assert!(matches!(err, Error::RenderingExhausted { slide: 4, attempts: 1 }));
    }

    #[test]
    fn test_empty_chain_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.pptx");
        let err = RenderChain::new()
            .render(&RenderJob::new(&deck, 1, dir.path()))
            .unwrap_err();
        assert!(matches!(err, Error::RenderingExhausted { attempts: 0, .. }));
    }

    #[test]
    fn test_job_stems_are_unique_per_slide() {
        let dir = Path::new("/tmp");
        let deck = Path::new("My Deck.pptx");
        let a = RenderJob::new(deck, 1, dir);
        let b = RenderJob::new(deck, 2, dir);
        assert_ne!(a.image_path(), b.image_path());
        assert!(a.stem.starts_with("slide_1_My_Deck_"));
    }
}
