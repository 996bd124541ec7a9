//! Slide classification and extraction routing for presentation decks.
//!
//! A deck flows through four stages: [`SlideFilter`] drops boilerplate slides,
//! [`Classifier`] assigns each remaining slide a [`Category`], [`Router`]
//! extracts each slide with the strategy for its category, and [`merge`]
//! combines the results into one attributed [`MergedDocument`]. [`Pipeline`]
//! wires the stages together.

pub mod classify;
pub mod context;
pub mod describe;
pub mod error;
pub mod filter;
pub mod merge;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod router;
pub mod sink;
pub mod text;
pub mod types;

pub use classify::{Classifier, ComplexityReport, ComplexityRules};
pub use context::ExtractionContext;
pub use describe::{DescribeError, VisualDescriber};
pub use error::{Error, Result};
pub use filter::{FilterOutcome, SlideFilter, DEFAULT_SKIP_PATTERNS};
pub use merge::merge;
pub use pipeline::{Pipeline, ProcessingOutcome, SlideSource, Snapshots, Summary};
pub use render::{RenderChain, RenderError, RenderJob, SlideRenderer};
pub use router::{ComplexRecord, ExtractionStatus, RoutedSlides, Router, SimpleSlide, TableRecord};
pub use sink::{deliver, JsonLinesSink, RecordSink, SinkError, SinkReport};
pub use types::{
    source_id, Category, ClassificationResult, ExtractionRecord, Geometry, MergedDocument,
    Presentation, PresentationFormat, Shape, ShapeKind, Slide, TableGrid,
};
