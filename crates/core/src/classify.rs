//! Slide classification into table, complex and simple categories.
//!
//! Complexity is evaluated first and overrides the table/text check, so a
//! table slide that also carries diagrams or pictures is never treated as a
//! plain table.

use crate::error::{Error, Result};
use crate::types::{Category, ClassificationResult, Shape, ShapeKind, Slide};
use serde::Serialize;

/// Thresholds for the complexity test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexityRules {
    /// A slide with more content shapes than this is complex.
    pub max_content_shapes: usize,
    /// A slide with more visual graphics than this is complex.
    pub max_visual_graphics: usize,
    /// A rectangle whose text is longer than this counts as a text container.
    pub min_rect_text_chars: usize,
}

impl Default for ComplexityRules {
    fn default() -> Self {
        Self {
            max_content_shapes: 6,
            max_visual_graphics: 2,
            min_rect_text_chars: 10,
        }
    }
}

impl ComplexityRules {
    pub fn with_max_content_shapes(mut self, n: usize) -> Self {
        self.max_content_shapes = n;
        self
    }

    pub fn with_max_visual_graphics(mut self, n: usize) -> Self {
        self.max_visual_graphics = n;
        self
    }
}

/// Shape statistics behind a complexity decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplexityReport {
    pub num_content: usize,
    pub num_placeholders: usize,
    pub visual_graphics: usize,
    pub num_pictures: usize,
    pub num_tables: usize,
    pub has_connectors: bool,
    pub has_groups: bool,
}

/// Assigns each slide to exactly one [`Category`].
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: ComplexityRules,
}

impl Classifier {
    /// Create a classifier with the default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom complexity thresholds.
    pub fn with_rules(mut self, rules: ComplexityRules) -> Self {
        self.rules = rules;
        self
    }

    /// Count the shape statistics of a slide, ignoring placeholders.
    pub fn analyze(&self, slide: &Slide) -> Result<ComplexityReport> {
        if let Some(reason) = &slide.read_error {
            return Err(Error::Classification {
                slide: slide.index,
                reason: reason.clone(),
            });
        }

        let mut report = ComplexityReport::default();
        for shape in &slide.shapes {
            if shape.is_placeholder() {
                report.num_placeholders += 1;
                continue;
            }
            report.num_content += 1;

            if shape.name.to_lowercase().contains("connector") {
                report.has_connectors = true;
            }
            if self.is_visual_graphic(shape) {
                report.visual_graphics += 1;
            }
            match shape.kind {
                ShapeKind::Picture => report.num_pictures += 1,
                ShapeKind::Table(_) => report.num_tables += 1,
                ShapeKind::Group(_) => report.has_groups = true,
                ShapeKind::TextBox
                | ShapeKind::AutoShape
                | ShapeKind::Connector
                | ShapeKind::Placeholder
                | ShapeKind::Other => {}
            }
        }
        Ok(report)
    }

    /// Whether the report crosses any complexity threshold.
    pub fn is_complex(&self, report: &ComplexityReport) -> bool {
        report.num_content > self.rules.max_content_shapes
            || report.visual_graphics > self.rules.max_visual_graphics
            || report.has_connectors
            || report.has_groups
            || report.num_pictures > 0
            || (report.num_tables > 0 && report.visual_graphics > 0)
    }

    /// Classify a single slide.
    ///
    /// Returns an error only when the slide could not be analyzed.
    pub fn classify(&self, slide: &Slide) -> Result<Category> {
        let report = self.analyze(slide)?;
        if self.is_complex(&report) {
            log::info!(
                "Slide {} classified as COMPLEX: {} content objects, {} visual graphics, connectors={}, groups={}",
                slide.index,
                report.num_content,
                report.visual_graphics,
                report.has_connectors,
                report.has_groups
            );
            return Ok(Category::Complex);
        }

        let has_table = slide
            .shapes
            .iter()
            .any(|s| matches!(s.kind, ShapeKind::Table(_)));
        let has_textbox_with_text = slide
            .shapes
            .iter()
            .any(|s| matches!(s.kind, ShapeKind::TextBox) && s.own_text().is_some());

        let category = if has_table && has_textbox_with_text {
            log::info!("Slide {} classified as COMPLEX (table + text box)", slide.index);
            Category::Complex
        } else if has_table {
            log::info!("Slide {} classified as TABLE", slide.index);
            Category::Table
        } else {
            log::debug!(
                "Slide {} classified as SIMPLE: {} content objects, {} visual graphics",
                slide.index,
                report.num_content,
                report.visual_graphics
            );
            Category::Simple
        };
        Ok(category)
    }

    /// Classify every slide whose index is in `valid`.
    ///
    /// Slides that cannot be analyzed fall back to [`Category::Simple`].
    pub fn classify_all(&self, slides: &[Slide], valid: &[usize]) -> ClassificationResult {
        let mut result = ClassificationResult::default();
        for slide in slides.iter().filter(|s| valid.contains(&s.index)) {
            let category = match self.classify(slide) {
                Ok(category) => category,
                Err(e) => {
                    log::error!("{}; defaulting to simple", e);
                    Category::Simple
                }
            };
            result.assign(slide.index, category);
        }

        log::info!(
            "Slide classification complete: {} table, {} complex, {} simple",
            result.table.len(),
            result.complex.len(),
            result.simple.len()
        );
        result
    }

    /// Pictures, connectors and auto shapes other than plain text rectangles.
    fn is_visual_graphic(&self, shape: &Shape) -> bool {
        match &shape.kind {
            ShapeKind::Picture | ShapeKind::Connector => true,
            ShapeKind::AutoShape => !self.is_text_rectangle(shape),
            ShapeKind::TextBox
            | ShapeKind::Table(_)
            | ShapeKind::Group(_)
            | ShapeKind::Placeholder
            | ShapeKind::Other => false,
        }
    }

    fn is_text_rectangle(&self, shape: &Shape) -> bool {
        let name = shape.name.to_lowercase();
        let is_rect = name.contains("rectangle") || name.contains("rect");
        match shape.own_text() {
            Some(text) => is_rect && text.chars().count() > self.rules.min_rect_text_chars,
            None => false,
        }
    }
}
