//! Per-run settings and output locations, passed explicitly to each stage.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Name of the scratch subdirectory used when none is configured.
const DEFAULT_SCRATCH_DIR: &str = "slide_images";

/// Everything a run needs to know about where it reads from and writes to.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    /// Display name of the document, used in source identifiers.
    pub doc_name: String,

    /// Path of the presentation being processed.
    pub deck_path: PathBuf,

    /// Directory for snapshot markdown files.
    pub output_dir: PathBuf,

    scratch_dir: Option<PathBuf>,

    /// Slides extracted concurrently; 1 means sequential.
    pub workers: usize,

    /// Keep rendered images after the description call.
    pub keep_scratch: bool,

    /// Write raw and final markdown snapshots to `output_dir`.
    pub write_snapshots: bool,
}

impl ExtractionContext {
    /// Create a context for a deck, writing into the current directory.
    pub fn new(deck_path: impl Into<PathBuf>) -> Self {
        let deck_path = deck_path.into();
        let doc_name = deck_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self {
            doc_name,
            deck_path,
            output_dir: PathBuf::from("."),
            scratch_dir: None,
            workers: 1,
            keep_scratch: false,
            write_snapshots: true,
        }
    }

    /// Override the document name used in source identifiers.
    pub fn with_doc_name(mut self, name: impl Into<String>) -> Self {
        self.doc_name = name.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Set the number of concurrent slide extractions (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    pub fn with_snapshots(mut self, write: bool) -> Self {
        self.write_snapshots = write;
        self
    }

    /// Directory rendered images go to.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(DEFAULT_SCRATCH_DIR))
    }

    /// File stem of the deck, for naming snapshots.
    pub fn doc_stem(&self) -> &str {
        Path::new(&self.doc_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
    }

    /// Create the output and scratch directories.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(self.scratch_dir())?;
        Ok(())
    }
}
