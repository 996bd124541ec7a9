//! CLI tool for classifying presentation slides and extracting them for ingestion.

use anyhow::{Context, Result};
use clap::Parser;
use deck_core::{ExtractionContext, JsonLinesSink, Pipeline, ProcessingOutcome, RenderChain};
use deck_pptx::{CommandRenderer, OfficeSuiteRenderer, PptxParser, SingleSlideRenderer};
use deck_vision::{GeminiConfig, GeminiDescriber};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Classify slides and extract their content into attributed markdown.
#[derive(Parser, Debug)]
#[command(name = "deck-extract")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input presentation file(s) (.pptx)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for rendered slide images (default: <output>/slide_images)
    #[arg(long)]
    scratch: Option<PathBuf>,

    /// Print the merged markdown to stdout instead of writing to file
    #[arg(short, long)]
    print: bool,

    /// Print the processing outcome as JSON
    #[arg(long, conflicts_with = "print")]
    json: bool,

    /// Append extraction records to this JSON Lines file
    #[arg(long)]
    records: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model used for slide images
    #[arg(long, default_value = deck_vision::DEFAULT_MODEL)]
    model: String,

    /// Skip visual description; table and complex slides use their text
    #[arg(long)]
    offline: bool,

    /// Path of the soffice binary
    #[arg(long, default_value = "soffice")]
    soffice: PathBuf,

    /// Path of the pdftoppm binary
    #[arg(long, default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// Native slide export command, tried first ({input}, {slide}, {output})
    #[arg(long)]
    native_export_cmd: Option<String>,

    /// Timeout in seconds for each external conversion
    #[arg(long, default_value = "60")]
    render_timeout: u64,

    /// Slides described concurrently
    #[arg(short, long, default_value = "1")]
    jobs: usize,

    /// Keep rendered slide images
    #[arg(long)]
    keep_scratch: bool,

    /// Do not write raw and final markdown snapshots
    #[arg(long)]
    no_snapshots: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let pipeline = build_pipeline(&args)?;
    let mut failures = 0;

    for input_path in &args.input {
        if args.verbose {
            eprintln!("Processing: {}", input_path.display());
        }

        let ctx = build_context(input_path, &args);
        let outcome = pipeline.process(&ctx);
        if !outcome.success {
            failures += 1;
            eprintln!(
                "Error processing {}: {}",
                input_path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }

        if let Err(e) = report(input_path, &outcome, &args) {
            failures += 1;
            eprintln!("Error writing results for {}: {:#}", input_path.display(), e);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} presentations failed", failures, args.input.len());
    }
    Ok(())
}

/// Wire the parser, renderers, describer and sink selected by the flags.
fn build_pipeline(args: &Args) -> Result<Pipeline> {
    let timeout = Duration::from_secs(args.render_timeout);
    let mut renderers = RenderChain::new();
    if let Some(template) = &args.native_export_cmd {
        renderers.push(Box::new(CommandRenderer::new(template).with_timeout(timeout)));
    }
    renderers.push(Box::new(
        SingleSlideRenderer::new(&args.soffice).with_timeout(timeout),
    ));
    renderers.push(Box::new(
        OfficeSuiteRenderer::new(&args.soffice, &args.pdftoppm).with_timeout(timeout),
    ));
    log::debug!("Renderers: {}", renderers.names().join(", "));

    let mut pipeline = Pipeline::new(PptxParser::new()).with_renderers(renderers);

    match (&args.api_key, args.offline) {
        (_, true) => log::info!("Offline mode: visual description disabled"),
        (None, false) => {
            log::warn!("GEMINI_API_KEY is not set; table and complex slides use their text only")
        }
        (Some(key), false) => {
            let config = GeminiConfig::new(key.as_str()).with_model(args.model.as_str());
            let describer =
                GeminiDescriber::new(config).context("Failed to create Gemini client")?;
            pipeline = pipeline.with_describer(describer);
        }
    }

    if let Some(path) = &args.records {
        let sink = JsonLinesSink::open(path)
            .with_context(|| format!("Failed to open records file {}", path.display()))?;
        pipeline = pipeline.with_sink(sink);
    }

    Ok(pipeline)
}

fn build_context(input_path: &Path, args: &Args) -> ExtractionContext {
    let output_dir = resolve_output_dir(input_path, args.output.as_ref());
    let mut ctx = ExtractionContext::new(input_path)
        .with_output_dir(output_dir)
        .with_workers(args.jobs)
        .with_keep_scratch(args.keep_scratch)
        .with_snapshots(!args.no_snapshots);
    if let Some(scratch) = &args.scratch {
        ctx = ctx.with_scratch_dir(scratch);
    }
    ctx
}

/// Print or write the result of one presentation.
fn report(input_path: &Path, outcome: &ProcessingOutcome, args: &Args) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(outcome).context("Failed to serialize outcome")?;
        println!("{}", json);
        return Ok(());
    }

    let Some(document) = &outcome.document else {
        return Ok(());
    };

    if args.print {
        println!("{}", document.markdown);
    } else {
        let output_path = get_output_path(input_path, args.output.as_ref())?;
        write_output(&output_path, &document.markdown)?;
        if args.verbose {
            eprintln!("Written to: {}", output_path.display());
        }
    }

    if args.verbose {
        let summary = &outcome.summary;
        eprintln!(
            "  {} slides: {} removed, {} table, {} complex, {} simple; {} records",
            summary.total_slides,
            summary.removed_slides,
            summary.table_slides,
            summary.complex_slides,
            summary.simple_slides,
            summary.records
        );
        if !outcome.failed_slides.is_empty() {
            eprintln!("  Slides with extraction errors: {:?}", outcome.failed_slides);
        }
        if let Some(sink) = &outcome.sink {
            eprintln!(
                "  Records delivered: {} accepted, {} rejected",
                sink.accepted,
                sink.rejected.len()
            );
            if let Some(err) = &sink.flush_error {
                eprintln!("  Records file could not be flushed: {}", err);
            }
        }
    }
    Ok(())
}

fn resolve_output_dir(input_path: &Path, output_dir: Option<&PathBuf>) -> PathBuf {
    match output_dir {
        Some(dir) => dir.clone(),
        None => input_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Determine the output path for a processed file.
fn get_output_path(input_path: &Path, output_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let dir = resolve_output_dir(input_path, output_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir.join(format!("{}.md", stem)))
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
