//! Per-category extraction strategies.
//!
//! Each slide is extracted on its own: a failure on one slide becomes a
//! placeholder for that slide and never stops the others.

use crate::context::ExtractionContext;
use crate::describe::VisualDescriber;
use crate::error::{Error, Result};
use crate::prompt::{complex_slide_prompt, table_slide_prompt};
use crate::render::{RenderChain, RenderJob};
use crate::types::{source_id, ClassificationResult, Slide};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

/// How a table or complex slide's content was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// The describer produced content from the rendered image.
    Described,
    /// The describer returned nothing; the slide is decorative.
    Decorative,
    /// No image was available; the raw slide text was used.
    TextOnlyFallback,
    /// Neither an image nor any text was available.
    Unavailable,
    /// Extraction raised an error; the content is a placeholder.
    Failed(String),
}

/// Text block of a simple slide, with its exact slide number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleSlide {
    pub slide: usize,
    pub source: String,
    pub text: String,
}

/// Result of the table strategy for one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRecord {
    pub slide: usize,
    pub description: String,
    pub extracted_text: String,
    pub status: ExtractionStatus,
}

/// Result of the complex strategy for one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexRecord {
    pub slide: usize,
    /// Markdown starting with `## {doc}:slide-{n}`.
    pub markdown: String,
    pub status: ExtractionStatus,
}

/// Everything the router produced, each list in ascending slide order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutedSlides {
    pub simple: Vec<SimpleSlide>,
    pub complex: Vec<ComplexRecord>,
    pub tables: Vec<TableRecord>,
}

impl RoutedSlides {
    /// Slides whose extraction ended in an error placeholder.
    pub fn failed_slides(&self) -> Vec<usize> {
        let mut failed: Vec<usize> = self
            .complex
            .iter()
            .filter(|r| matches!(r.status, ExtractionStatus::Failed(_)))
            .map(|r| r.slide)
            .chain(
                self.tables
                    .iter()
                    .filter(|r| matches!(r.status, ExtractionStatus::Failed(_)))
                    .map(|r| r.slide),
            )
            .collect();
        failed.sort_unstable();
        failed
    }
}

/// Dispatches classified slides to their extraction strategy.
pub struct Router<'a> {
    ctx: &'a ExtractionContext,
    renderers: &'a RenderChain,
    describer: Option<&'a dyn VisualDescriber>,
}

impl<'a> Router<'a> {
    /// Create a router. Without a describer, table and complex slides use
    /// their text directly.
    pub fn new(
        ctx: &'a ExtractionContext,
        renderers: &'a RenderChain,
        describer: Option<&'a dyn VisualDescriber>,
    ) -> Self {
        Self {
            ctx,
            renderers,
            describer,
        }
    }

    /// Extract every classified slide.
    pub fn route(&self, slides: &[Slide], classes: &ClassificationResult) -> RoutedSlides {
        log::info!(
            "Routing {} table, {} complex and {} simple slides",
            classes.table.len(),
            classes.complex.len(),
            classes.simple.len()
        );

        let mut simple: Vec<SimpleSlide> = pick(slides, &classes.simple)
            .into_iter()
            .filter_map(|s| self.extract_simple(s))
            .collect();
        let mut tables = self.run_each(pick(slides, &classes.table), |s| self.extract_table(s));
        let mut complex = self.run_each(pick(slides, &classes.complex), |s| self.extract_complex(s));

        simple.sort_by_key(|r| r.slide);
        tables.sort_by_key(|r| r.slide);
        complex.sort_by_key(|r| r.slide);

        RoutedSlides {
            simple,
            complex,
            tables,
        }
    }

    /// Simple strategy: the slide's text as one block.
    ///
    /// Returns `None` for a slide without any text.
    pub fn extract_simple(&self, slide: &Slide) -> Option<SimpleSlide> {
        let text = slide.text();
        if text.is_empty() {
            log::warn!("No text found in slide {}", slide.index);
            return None;
        }
        log::debug!(
            "Extracted {} characters of text from slide {}",
            text.len(),
            slide.index
        );
        Some(SimpleSlide {
            slide: slide.index,
            source: source_id(&self.ctx.doc_name, slide.index),
            text,
        })
    }

    /// Table strategy: slide text plus an image read with the text as authority.
    pub fn extract_table(&self, slide: &Slide) -> TableRecord {
        let extracted_text = slide.text();
        let prompt = table_slide_prompt(&self.ctx.doc_name, slide.index, &extracted_text);
        let (description, status) = self.describe_or_placeholder(slide, &extracted_text, &prompt);
        log::info!(
            "Table slide {} processed: {} characters ({:?})",
            slide.index,
            description.len(),
            status
        );
        TableRecord {
            slide: slide.index,
            description,
            extracted_text,
            status,
        }
    }

    /// Complex strategy: rendered image described with the slide text as context.
    pub fn extract_complex(&self, slide: &Slide) -> ComplexRecord {
        let slide_text = slide.text();
        let prompt = complex_slide_prompt(&self.ctx.doc_name, slide.index, &slide_text);
        let (description, status) = self.describe_or_placeholder(slide, &slide_text, &prompt);
        log::info!(
            "Complex slide {} processed: {} characters ({:?})",
            slide.index,
            description.len(),
            status
        );
        ComplexRecord {
            slide: slide.index,
            markdown: format!(
                "## {}\n\n{}",
                source_id(&self.ctx.doc_name, slide.index),
                description
            ),
            status,
        }
    }

    /// Describe a slide, turning any error into a placeholder for that slide.
    fn describe_or_placeholder(
        &self,
        slide: &Slide,
        slide_text: &str,
        prompt: &str,
    ) -> (String, ExtractionStatus) {
        match self.describe(slide, slide_text, prompt) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Error processing slide {}: {}", slide.index, e);
                (
                    format!("[Error processing slide {}: {}]", slide.index, e),
                    ExtractionStatus::Failed(e.to_string()),
                )
            }
        }
    }

    fn describe(
        &self,
        slide: &Slide,
        slide_text: &str,
        prompt: &str,
    ) -> Result<(String, ExtractionStatus)> {
        let Some(describer) = self.describer else {
            return Ok(text_only_fallback(slide.index, slide_text));
        };

        let scratch_dir = self.ctx.scratch_dir();
        let job = RenderJob::new(&self.ctx.deck_path, slide.index, &scratch_dir);
        let image = match self.renderers.render(&job) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("{}; using text-only fallback", e);
                return Ok(text_only_fallback(slide.index, slide_text));
            }
        };

        let described = describer.describe(&image, prompt);
        self.discard_scratch(&image);

        let description = described.map_err(|e| Error::Extraction {
            slide: slide.index,
            reason: e.to_string(),
        })?;
        let description = description.trim();
        if description.is_empty() {
            log::warn!("Empty description for slide {}", slide.index);
            return Ok((
                format!("[No content extracted from slide {}]", slide.index),
                ExtractionStatus::Decorative,
            ));
        }
        Ok((description.to_string(), ExtractionStatus::Described))
    }

    fn discard_scratch(&self, image: &Path) {
        if self.ctx.keep_scratch {
            return;
        }
        if let Err(e) = std::fs::remove_file(image) {
            log::debug!("Could not remove {}: {}", image.display(), e);
        }
    }

    /// Apply `f` to each slide, on a bounded pool when more than one worker is
    /// configured. Output order matches input order.
    fn run_each<T, F>(&self, slides: Vec<&Slide>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&Slide) -> T + Sync,
    {
        if self.ctx.workers <= 1 || slides.len() <= 1 {
            return slides.into_iter().map(f).collect();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.ctx.workers)
            .build()
        {
            Ok(pool) => pool.install(|| slides.par_iter().map(|s| f(*s)).collect()),
            Err(e) => {
                log::warn!("Worker pool unavailable ({}); extracting sequentially", e);
                slides.into_iter().map(f).collect()
            }
        }
    }
}

/// Slides whose index is in the ascending `indices` list.
fn pick<'s>(slides: &'s [Slide], indices: &[usize]) -> Vec<&'s Slide> {
    slides
        .iter()
        .filter(|s| indices.binary_search(&s.index).is_ok())
        .collect()
}

/// Content for a slide that could not be rendered.
fn text_only_fallback(slide: usize, slide_text: &str) -> (String, ExtractionStatus) {
    let slide_text = slide_text.trim();
    if slide_text.is_empty() {
        (
            format!("[Slide {}: Image processing failed and no text content available]", slide),
            ExtractionStatus::Unavailable,
        )
    } else {
        (
            format!(
                "**Slide {} Content (text-only fallback):**\n{}\n\n*Note: Image processing failed, using text extraction only*",
                slide, slide_text
            ),
            ExtractionStatus::TextOnlyFallback,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::DescribeError;
    use crate::render::{RenderError, SlideRenderer};
    use crate::types::{Shape, ShapeKind, TableGrid};
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FileRenderer;

    impl SlideRenderer for FileRenderer {
        fn name(&self) -> &str {
            "file"
        }

        fn render(&self, job: &RenderJob<'_>) -> std::result::Result<PathBuf, RenderError> {
            let path = job.image_path();
            std::fs::write(&path, b"png")?;
            Ok(path)
        }
    }

    /// Describes every slide except those listed, which fail.
    struct ScriptedDescriber {
        fail_on: Vec<usize>,
        empty_on: Vec<usize>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedDescriber {
        fn new() -> Self {
            Self {
                fail_on: Vec::new(),
                empty_on: Vec::new(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl VisualDescriber for ScriptedDescriber {
        fn describe(&self, image: &Path, prompt: &str) -> std::result::Result<String, DescribeError> {
            assert!(image.is_file());
            self.prompts.lock().unwrap().push(prompt.to_string());
            let slide: usize = image
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('_').nth(1))
                .and_then(|n| n.parse().ok())
                .unwrap();
            if self.fail_on.contains(&slide) {
                return Err(DescribeError::Transient("deadline exceeded".into()));
            }
            if self.empty_on.contains(&slide) {
                return Ok("   ".into());
            }
            Ok(format!("Description of slide {}", slide))
        }
    }

    fn context(dir: &Path) -> ExtractionContext {
        let ctx = ExtractionContext::new(dir.join("deck.pptx"))
            .with_output_dir(dir)
            .with_snapshots(false);
        ctx.prepare().unwrap();
        ctx
    }

    fn text_slide(index: usize, text: &str) -> Slide {
        Slide::new(
            index,
            vec![Shape::new("TextBox 1", ShapeKind::TextBox).with_text(text)],
        )
    }

    fn picture_slide(index: usize, text: &str) -> Slide {
        Slide::new(
            index,
            vec![
                Shape::new("TextBox 1", ShapeKind::TextBox).with_text(text),
                Shape::new("Picture 2", ShapeKind::Picture),
            ],
        )
    }

    fn classes(table: &[usize], complex: &[usize], simple: &[usize]) -> ClassificationResult {
        ClassificationResult {
            table: table.to_vec(),
            complex: complex.to_vec(),
            simple: simple.to_vec(),
        }
    }

    #[test]
    fn test_simple_strategy_keeps_shape_order() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new();
        let router = Router::new(&ctx, &chain, None);
        let slide = Slide::new(
            4,
            vec![
                Shape::new("Title 1", ShapeKind::Placeholder).with_text("Goals"),
                Shape::new("TextBox 2", ShapeKind::TextBox).with_text("Grow revenue"),
            ],
        );
        let block = router.extract_simple(&slide).unwrap();
        assert_eq!(block.slide, 4);
        assert_eq!(block.source, "deck.pptx:slide-4");
        assert_eq!(block.text, "Goals\nGrow revenue");
        assert!(router.extract_simple(&Slide::new(5, Vec::new())).is_none());
    }

    #[test]
    fn test_table_strategy_joins_cells() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new().with(FileRenderer);
        let describer = ScriptedDescriber::new();
        let router = Router::new(&ctx, &chain, Some(&describer));
        let slide = Slide::new(
            3,
            vec![Shape::new(
                "Table 1",
                ShapeKind::Table(TableGrid::new(vec![
                    vec!["Name".into(), "Owner".into()],
                    vec!["Launch".into(), "".into()],
                ])),
            )],
        );

        let record = router.extract_table(&slide);
        assert_eq!(record.extracted_text, "Name | Owner\nLaunch");
        assert_eq!(record.description, "Description of slide 3");
        assert_eq!(record.status, ExtractionStatus::Described);
        let prompts = describer.prompts.lock().unwrap();
        assert!(prompts[0].contains("authoritative"));
        assert!(prompts[0].contains("Name | Owner"));
    }

    #[test]
    fn test_complex_strategy_formats_header_and_cleans_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new().with(FileRenderer);
        let describer = ScriptedDescriber::new();
        let router = Router::new(&ctx, &chain, Some(&describer));

        let record = router.extract_complex(&picture_slide(7, "Org chart"));
        assert_eq!(record.markdown, "## deck.pptx:slide-7\n\nDescription of slide 7");
        assert_eq!(
            std::fs::read_dir(ctx.scratch_dir()).unwrap().count(),
            0,
            "rendered image should be removed"
        );
    }

    #[test]
    fn test_keep_scratch_leaves_images() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path()).with_keep_scratch(true);
        let chain = RenderChain::new().with(FileRenderer);
        let describer = ScriptedDescriber::new();
        let router = Router::new(&ctx, &chain, Some(&describer));
        router.extract_complex(&picture_slide(1, "x"));
        assert_eq!(std::fs::read_dir(ctx.scratch_dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_rendering_exhausted_uses_text_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new();
        let describer = ScriptedDescriber::new();
        let router = Router::new(&ctx, &chain, Some(&describer));

        let record = router.extract_complex(&picture_slide(2, "Timeline"));
        assert_eq!(record.status, ExtractionStatus::TextOnlyFallback);
        assert!(record.markdown.contains("(text-only fallback)"));
        assert!(record.markdown.contains("Timeline"));
        assert!(describer.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_render_and_no_text_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new();
        let router = Router::new(&ctx, &chain, None);
        let slide = Slide::new(6, vec![Shape::new("Picture 1", ShapeKind::Picture)]);

        let record = router.extract_complex(&slide);
        assert_eq!(record.status, ExtractionStatus::Unavailable);
        assert!(record
            .markdown
            .ends_with("[Slide 6: Image processing failed and no text content available]"));
    }

    #[test]
    fn test_empty_description_is_decorative() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new().with(FileRenderer);
        let mut describer = ScriptedDescriber::new();
        describer.empty_on = vec![9];
        let router = Router::new(&ctx, &chain, Some(&describer));

        let record = router.extract_complex(&picture_slide(9, "logo"));
        assert_eq!(record.status, ExtractionStatus::Decorative);
        assert!(record.markdown.ends_with("[No content extracted from slide 9]"));
    }

    #[test]
    fn test_failure_is_isolated_to_its_slide() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new().with(FileRenderer);
        let mut describer = ScriptedDescriber::new();
        describer.fail_on = vec![3];
        let router = Router::new(&ctx, &chain, Some(&describer));

        let slides: Vec<Slide> = (1..=5).map(|i| picture_slide(i, "content")).collect();
        let routed = router.route(&slides, &classes(&[], &[1, 2, 3, 4, 5], &[]));

        assert_eq!(routed.complex.len(), 5);
        assert_eq!(routed.failed_slides(), vec![3]);
        let failed = &routed.complex[2];
        assert!(failed.markdown.contains("[Error processing slide 3:"));
        for record in routed.complex.iter().filter(|r| r.slide != 3) {
            assert_eq!(
                record.markdown,
                format!("## deck.pptx:slide-{}\n\nDescription of slide {}", record.slide, record.slide)
            );
        }
    }

    #[test]
    fn test_worker_pool_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path()).with_workers(4);
        let chain = RenderChain::new().with(FileRenderer);
        let describer = ScriptedDescriber::new();
        let router = Router::new(&ctx, &chain, Some(&describer));

        let slides: Vec<Slide> = (1..=12).map(|i| picture_slide(i, "content")).collect();
        let complex: Vec<usize> = (1..=12).collect();
        let routed = router.route(&slides, &classes(&[], &complex, &[]));

        let order: Vec<usize> = routed.complex.iter().map(|r| r.slide).collect();
        assert_eq!(order, complex);
        assert!(routed.failed_slides().is_empty());
    }

    #[test]
    fn test_route_dispatches_by_category() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let chain = RenderChain::new();
        let router = Router::new(&ctx, &chain, None);
        let slides = vec![
            text_slide(1, "Intro"),
            Slide::new(
                2,
                vec![Shape::new(
                    "Table 1",
                    ShapeKind::Table(TableGrid::new(vec![vec!["a".into()]])),
                )],
            ),
            picture_slide(3, "Chart"),
            text_slide(4, "Wrap-up"),
        ];
        let routed = router.route(&slides, &classes(&[2], &[3], &[1, 4]));
        assert_eq!(
            routed.simple.iter().map(|s| s.slide).collect::<Vec<_>>(),
            vec![1, 4]
        );
        assert_eq!(routed.tables[0].slide, 2);
        assert_eq!(routed.tables[0].status, ExtractionStatus::TextOnlyFallback);
        assert_eq!(routed.complex[0].slide, 3);
    }
}
