//! Removal of non-content slides (closing, appendix and contact pages).

use crate::text::fold;
use crate::types::Slide;
use serde::Serialize;

/// Phrases that mark a slide as boilerplate wherever they appear on it.
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    "thank you",
    "thanks",
    "appendix",
    "questions",
    "q&a",
    "contact us",
    "contact information",
    "contact:",
];

/// Result of filtering: kept and removed slide indices, both ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub valid: Vec<usize>,
    pub removed: Vec<usize>,
}

/// Substring filter over the folded text of each slide.
#[derive(Debug, Clone)]
pub struct SlideFilter {
    patterns: Vec<String>,
}

impl Default for SlideFilter {
    fn default() -> Self {
        Self::with_patterns(DEFAULT_SKIP_PATTERNS.iter().copied())
    }
}

impl SlideFilter {
    /// Create a filter with the default skip patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter with custom skip patterns.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| fold(p.as_ref().trim()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// The skip pattern a slide matches, if any.
    pub fn matching_pattern(&self, slide: &Slide) -> Option<&str> {
        let text = fold(&slide.text());
        self.patterns
            .iter()
            .find(|p| text.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Split slides into kept and removed indices.
    ///
    /// If any slide could not be read, no filtering happens and every slide is
    /// kept, so unreadable content is never silently dropped.
    pub fn filter(&self, slides: &[Slide]) -> FilterOutcome {
        if let Some(broken) = slides.iter().find(|s| s.read_error.is_some()) {
            log::warn!(
                "Slide {} could not be read ({}); keeping all {} slides unfiltered",
                broken.index,
                broken.read_error.as_deref().unwrap_or_default(),
                slides.len()
            );
            return FilterOutcome {
                valid: slides.iter().map(|s| s.index).collect(),
                removed: Vec::new(),
            };
        }

        let mut outcome = FilterOutcome::default();
        for slide in slides {
            match self.matching_pattern(slide) {
                Some(pattern) => {
                    log::debug!("Skipping slide {} - matches pattern '{}'", slide.index, pattern);
                    outcome.removed.push(slide.index);
                }
                None => outcome.valid.push(slide.index),
            }
        }
        outcome
    }
}
