//! PPTX (Office Open XML) backend: shape-tree parsing and slide rendering.
//!
//! Parses .pptx files, which are ZIP archives of XML parts, into the slide
//! model used by `deck-core`, and renders single slides to PNG through
//! external office tooling.

pub mod excerpt;
pub mod parser;
pub mod render;

pub use excerpt::write_single_slide_deck;
pub use parser::PptxParser;
pub use render::{
    run_with_timeout, CommandRenderer, OfficeSuiteRenderer, SingleSlideRenderer,
    DEFAULT_RENDER_TIMEOUT,
};
