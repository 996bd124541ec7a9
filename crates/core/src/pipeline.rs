//! End-to-end processing of one presentation: filter, classify, route, merge.
//!
//! The pipeline never returns an error. Document-level failures are reported
//! in [`ProcessingOutcome`] with `success == false`, keeping whatever partial
//! results were produced before the failure.

use crate::classify::Classifier;
use crate::context::ExtractionContext;
use crate::describe::VisualDescriber;
use crate::error::{Error, Result};
use crate::filter::SlideFilter;
use crate::merge::{merge, simple_section_markdown};
use crate::render::RenderChain;
use crate::router::{RoutedSlides, Router};
use crate::sink::{deliver, RecordSink, SinkReport};
use crate::types::{ClassificationResult, MergedDocument, Slide};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A parser that turns a presentation file into slides.
pub trait SlideSource {
    /// Read every slide in presentation order.
    ///
    /// Fails with [`Error::Parse`] or [`Error::UnsupportedFormat`] when the
    /// document cannot be read at all.
    fn open(&self, path: &Path) -> Result<Vec<Slide>>;
}

/// Counts describing a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_slides: usize,
    pub removed_slides: usize,
    pub table_slides: usize,
    pub complex_slides: usize,
    pub simple_slides: usize,
    pub records: usize,
}

/// Markdown files written during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshots {
    pub raw_text: Option<PathBuf>,
    pub final_markdown: Option<PathBuf>,
}

/// Result of processing one presentation. Always produced, even on failure.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub success: bool,
    pub source_file: String,
    pub error: Option<String>,
    pub exception_type: Option<String>,
    pub removed_slides: Vec<usize>,
    pub classification: Option<ClassificationResult>,
    /// Slides whose extraction produced an error placeholder.
    pub failed_slides: Vec<usize>,
    pub document: Option<MergedDocument>,
    pub snapshots: Snapshots,
    pub sink: Option<SinkReport>,
    pub summary: Summary,
    pub last_updated: DateTime<Utc>,
}

impl ProcessingOutcome {
    fn new(source_file: &str) -> Self {
        Self {
            success: false,
            source_file: source_file.to_string(),
            error: None,
            exception_type: None,
            removed_slides: Vec::new(),
            classification: None,
            failed_slides: Vec::new(),
            document: None,
            snapshots: Snapshots::default(),
            sink: None,
            summary: Summary::default(),
            last_updated: Utc::now(),
        }
    }

    fn fail(&mut self, error: &Error) {
        self.success = false;
        self.error = Some(error.to_string());
        self.exception_type = Some(error.kind().to_string());
    }
}

/// The four stages wired to their collaborators.
pub struct Pipeline {
    source: Box<dyn SlideSource>,
    filter: SlideFilter,
    classifier: Classifier,
    renderers: RenderChain,
    describer: Option<Box<dyn VisualDescriber>>,
    sink: Option<Box<dyn RecordSink>>,
}

impl Pipeline {
    /// Create a pipeline with default filter and classifier, no renderers,
    /// no describer and no sink.
    pub fn new(source: impl SlideSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            filter: SlideFilter::default(),
            classifier: Classifier::default(),
            renderers: RenderChain::new(),
            describer: None,
            sink: None,
        }
    }

    pub fn with_filter(mut self, filter: SlideFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_renderers(mut self, renderers: RenderChain) -> Self {
        self.renderers = renderers;
        self
    }

    pub fn with_describer(mut self, describer: impl VisualDescriber + 'static) -> Self {
        self.describer = Some(Box::new(describer));
        self
    }

    pub fn with_sink(mut self, sink: impl RecordSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Process the deck named by the context.
    pub fn process(&self, ctx: &ExtractionContext) -> ProcessingOutcome {
        let mut outcome = ProcessingOutcome::new(&ctx.doc_name);
        log::info!("Starting presentation processing: {}", ctx.deck_path.display());

        match self.run(ctx, &mut outcome) {
            Ok(()) => {
                outcome.success = true;
                log::info!("Completed presentation processing for {}", ctx.doc_name);
            }
            Err(e) => {
                log::error!("Processing {} failed: {}", ctx.doc_name, e);
                outcome.fail(&e);
            }
        }
        outcome.last_updated = Utc::now();
        outcome
    }

    fn run(&self, ctx: &ExtractionContext, outcome: &mut ProcessingOutcome) -> Result<()> {
        ctx.prepare()?;
        let slides = self.source.open(&ctx.deck_path)?;
        outcome.summary.total_slides = slides.len();

        let filtered = self.filter.filter(&slides);
        log::info!(
            "Filtered {} useless slides, processing {} slides",
            filtered.removed.len(),
            filtered.valid.len()
        );
        outcome.removed_slides = filtered.removed.clone();
        outcome.summary.removed_slides = filtered.removed.len();

        let classes = self.classifier.classify_all(&slides, &filtered.valid);
        outcome.summary.table_slides = classes.table.len();
        outcome.summary.complex_slides = classes.complex.len();
        outcome.summary.simple_slides = classes.simple.len();
        outcome.classification = Some(classes.clone());

        let router = Router::new(ctx, &self.renderers, self.describer.as_deref());
        let routed = router.route(&slides, &classes);
        outcome.failed_slides = routed.failed_slides();

        let timestamp = Utc::now();
        if ctx.write_snapshots {
            outcome.snapshots.raw_text = write_raw_snapshot(ctx, &routed, timestamp);
        }

        let document = merge(
            &routed.simple,
            &routed.complex,
            &routed.tables,
            &ctx.doc_name,
            timestamp,
        )?;
        outcome.summary.records = document.records.len();

        if ctx.write_snapshots {
            outcome.snapshots.final_markdown = write_final_snapshot(ctx, &document, timestamp);
        }
        if let Some(sink) = &self.sink {
            outcome.sink = Some(deliver(&document.records, sink.as_ref()));
        }
        outcome.document = Some(document);
        Ok(())
    }
}

fn snapshot_path(ctx: &ExtractionContext, kind: &str, timestamp: DateTime<Utc>) -> PathBuf {
    ctx.output_dir.join(format!(
        "{}_{}_{}.md",
        ctx.doc_stem(),
        kind,
        timestamp.format("%Y%m%d_%H%M%S")
    ))
}

/// Simple-slide text and complex descriptions, before merging.
fn write_raw_snapshot(
    ctx: &ExtractionContext,
    routed: &RoutedSlides,
    timestamp: DateTime<Utc>,
) -> Option<PathBuf> {
    if routed.simple.is_empty() && routed.complex.is_empty() {
        log::debug!("No raw text extraction content to save");
        return None;
    }

    let mut content = format!(
        "# Raw Text Extraction from {}\n\n*Generated on {}*\n\n## Simple Slides - Text Extraction\n\n{}\n\n## Complex Slides (Image-based extraction)\n\n",
        ctx.doc_name,
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        simple_section_markdown(&routed.simple)
    );
    if routed.complex.is_empty() {
        content.push_str("*No complex slides in this presentation*\n");
    }
    for record in &routed.complex {
        content.push_str(record.markdown.trim());
        content.push_str("\n\n");
    }

    write_snapshot(snapshot_path(ctx, "raw_text_extraction", timestamp), &content)
}

fn write_final_snapshot(
    ctx: &ExtractionContext,
    document: &MergedDocument,
    timestamp: DateTime<Utc>,
) -> Option<PathBuf> {
    let content = format!(
        "# Complete Analysis of {}\n\n*Generated on {}*\n\n{}\n",
        ctx.doc_name,
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        document.markdown
    );
    write_snapshot(snapshot_path(ctx, "final_enhanced", timestamp), &content)
}

/// Snapshots are optional artifacts; a failed write is logged, not fatal.
fn write_snapshot(path: PathBuf, content: &str) -> Option<PathBuf> {
    match std::fs::write(&path, content) {
        Ok(()) => {
            log::info!("Saved snapshot: {}", path.display());
            Some(path)
        }
        Err(e) => {
            log::warn!("Failed to write snapshot {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::DescribeError;
    use crate::render::{RenderError, RenderJob, SlideRenderer};
    use crate::sink::SinkError;
    use crate::types::{Category, ExtractionRecord, Shape, ShapeKind, TableGrid};
    use std::sync::{Arc, Mutex};

    struct StaticSource(Vec<Slide>);

    impl SlideSource for StaticSource {
        fn open(&self, _path: &Path) -> Result<Vec<Slide>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    impl SlideSource for BrokenSource {
        fn open(&self, path: &Path) -> Result<Vec<Slide>> {
            Err(Error::Parse(format!("{} is not a zip archive", path.display())))
        }
    }

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

    struct EchoDescriber;

    impl VisualDescriber for EchoDescriber {
        fn describe(&self, _image: &Path, prompt: &str) -> std::result::Result<String, DescribeError> {
            if prompt.contains("table slide") {
                Ok("Table analysis".into())
            } else {
                Ok("Diagram analysis".into())
            }
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink(Arc<Mutex<Vec<ExtractionRecord>>>);

    impl RecordSink for MemorySink {
        fn accept(&self, record: &ExtractionRecord) -> std::result::Result<(), SinkError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn textbox(text: &str) -> Shape {
        Shape::new("TextBox 1", ShapeKind::TextBox).with_text(text)
    }

    fn sample_deck() -> Vec<Slide> {
        vec![
            Slide::new(1, vec![textbox("Project Kickoff")]),
            Slide::new(
                2,
                vec![Shape::new(
                    "Table 1",
                    ShapeKind::Table(TableGrid::new(vec![
                        vec!["Task".into(), "Owner".into()],
                        vec!["Design".into(), "Ana".into()],
                    ])),
                )],
            ),
            Slide::new(
                3,
                vec![textbox("Architecture"), Shape::new("Picture 2", ShapeKind::Picture)],
            ),
            Slide::new(4, vec![textbox("Next steps: hire two engineers")]),
            Slide::new(5, vec![textbox("Thank You")]),
        ]
    }

    fn context(dir: &Path) -> ExtractionContext {
        ExtractionContext::new(dir.join("review.pptx")).with_output_dir(dir.join("out"))
    }

    #[test]
    fn test_full_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let sink = MemorySink::default();
        let pipeline = Pipeline::new(StaticSource(sample_deck()))
            .with_renderers(RenderChain::new().with(FileRenderer))
            .with_describer(EchoDescriber)
            .with_sink(sink.clone());

        let outcome = pipeline.process(&ctx);
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.removed_slides, vec![5]);

        let classes = outcome.classification.as_ref().unwrap();
        assert_eq!(classes.simple, vec![1, 4]);
        assert_eq!(classes.table, vec![2]);
        assert_eq!(classes.complex, vec![3]);

        let document = outcome.document.as_ref().unwrap();
        let order: Vec<(usize, Category)> =
            document.records.iter().map(|r| (r.slide, r.category)).collect();
        assert_eq!(
            order,
            vec![
                (1, Category::Simple),
                (4, Category::Simple),
                (3, Category::Complex),
                (2, Category::Table)
            ]
        );
        assert!(document.markdown.contains("## review.pptx:slide-3\n\nDiagram analysis"));
        assert!(document.markdown.contains("## review.pptx:slide-2\n\nTable analysis"));

        assert_eq!(outcome.summary.records, 4);
        assert_eq!(outcome.sink.as_ref().unwrap().accepted, 4);
        assert_eq!(sink.0.lock().unwrap().len(), 4);

        let final_md = std::fs::read_to_string(outcome.snapshots.final_markdown.unwrap()).unwrap();
        assert!(final_md.starts_with("# Complete Analysis of review.pptx"));
        let raw_md = std::fs::read_to_string(outcome.snapshots.raw_text.unwrap()).unwrap();
        assert!(raw_md.contains("## review.pptx:slide-1\n\nProject Kickoff"));
    }

    #[test]
    fn test_parse_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = Pipeline::new(BrokenSource).process(&context(dir.path()));
        assert!(!outcome.success);
        assert_eq!(outcome.exception_type.as_deref(), Some("ParseError"));
        assert!(outcome.error.unwrap().contains("not a zip archive"));
        assert!(outcome.document.is_none());
    }

    #[test]
    fn test_empty_presentation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path()).with_snapshots(false);
        let outcome = Pipeline::new(StaticSource(Vec::new())).process(&ctx);
        assert!(outcome.success);
        assert!(outcome.removed_slides.is_empty());
        let document = outcome.document.unwrap();
        assert!(document.records.is_empty());
        assert!(document.markdown.is_empty());
        assert_eq!(outcome.snapshots, Snapshots::default());
    }

    #[test]
    fn test_offline_run_uses_text_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path()).with_snapshots(false);
        let outcome = Pipeline::new(StaticSource(sample_deck())).process(&ctx);
        assert!(outcome.success);
        let document = outcome.document.unwrap();
        assert!(document.markdown.contains("(text-only fallback)"));
        assert!(outcome.failed_slides.is_empty());
    }

    #[test]
    fn test_outcome_serializes_with_success_flag() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = Pipeline::new(BrokenSource).process(&context(dir.path()));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["exception_type"], "ParseError");
    }
}
