//! Slide renderers backed by external programs.
//!
//! Each renderer writes only to paths derived from its [`RenderJob`] stem, so
//! concurrent jobs never share a file.

use crate::excerpt::write_single_slide_deck;
use deck_core::{RenderError, RenderJob, SlideRenderer};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use url::Url;

/// Wall-clock ceiling for one external conversion.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run a command to completion, killing it once `timeout` has passed.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<(), RenderError> {
    let program = command.get_program().to_string_lossy().to_string();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => RenderError::Unavailable(format!("{} not found", program)),
            _ => RenderError::Io(e),
        })?;

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            if status.success() {
                return Ok(());
            }
            return Err(RenderError::Failed(format!("{} exited with {}", program, status)));
        }
        if started.elapsed() >= timeout {
            log::warn!("{} exceeded {:?}; killing it", program, timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(RenderError::TimedOut(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn remove_quietly(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    if let Err(e) = result {
        if e.kind() != ErrorKind::NotFound {
            log::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// `file:///` URL of a path, made absolute against the working directory.
fn file_url(path: &Path) -> Result<Url, RenderError> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute).map_err(|()| {
        RenderError::Failed(format!("cannot express {} as a file URL", absolute.display()))
    })
}

/// `soffice` invocation with a profile private to this job.
fn soffice_command(soffice: &Path, profile_dir: &Path) -> Result<Command, RenderError> {
    let mut command = Command::new(soffice);
    command
        .arg(format!("-env:UserInstallation={}", file_url(profile_dir)?))
        .arg("--headless");
    Ok(command)
}

/// Renders with a user-supplied command template.
///
/// `{input}`, `{slide}` and `{output}` in the template are replaced with the
/// deck path, the 1-based slide number and the PNG path to write.
pub struct CommandRenderer {
    name: String,
    template: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(template: &str) -> Self {
        Self {
            name: "native-export".to_string(),
            template: template.split_whitespace().map(str::to_string).collect(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn expand(&self, job: &RenderJob<'_>, output: &Path) -> Vec<String> {
        self.template
            .iter()
            .map(|arg| {
                arg.replace("{input}", &job.deck.to_string_lossy())
                    .replace("{slide}", &job.slide.to_string())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect()
    }
}

impl SlideRenderer for CommandRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<PathBuf, RenderError> {
        let output = job.image_path();
        let args = self.expand(job, &output);
        let Some((program, rest)) = args.split_first() else {
            return Err(RenderError::Unavailable("empty export command".into()));
        };
        run_with_timeout(Command::new(program).args(rest), self.timeout)?;
        Ok(output)
    }
}

/// Renders a single-slide copy of the deck straight to PNG with `soffice`.
pub struct SingleSlideRenderer {
    soffice: PathBuf,
    timeout: Duration,
}

impl SingleSlideRenderer {
    pub fn new(soffice: impl Into<PathBuf>) -> Self {
        Self {
            soffice: soffice.into(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn convert(&self, job: &RenderJob<'_>, single: &Path, profile: &Path) -> Result<PathBuf, RenderError> {
        write_single_slide_deck(job.deck, job.slide, single)?;
        run_with_timeout(
            soffice_command(&self.soffice, profile)?
                .args(["--convert-to", "png", "--outdir"])
                .arg(job.scratch_dir)
                .arg(single),
            self.timeout,
        )?;

        let produced = single.with_extension("png");
        if !produced.is_file() {
            return Err(RenderError::Failed(format!(
                "soffice produced no {}",
                produced.display()
            )));
        }
        let output = job.image_path();
        std::fs::rename(&produced, &output)?;
        Ok(output)
    }
}

impl SlideRenderer for SingleSlideRenderer {
    fn name(&self) -> &str {
        "single-slide"
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<PathBuf, RenderError> {
        let single = job.intermediate_path("single.pptx");
        let profile = job.intermediate_path("profile");
        let result = self.convert(job, &single, &profile);
        remove_quietly(&single);
        remove_quietly(&profile);
        result
    }
}

/// Converts a single-slide copy of the deck to PDF with `soffice`, then
/// rasterizes its only page with `pdftoppm`.
///
/// Exporting the whole deck would misnumber pages after any hidden slide,
/// since hidden slides are left out of the PDF.
pub struct OfficeSuiteRenderer {
    soffice: PathBuf,
    pdftoppm: PathBuf,
    timeout: Duration,
}

impl OfficeSuiteRenderer {
    pub fn new(soffice: impl Into<PathBuf>, pdftoppm: impl Into<PathBuf>) -> Self {
        Self {
            soffice: soffice.into(),
            pdftoppm: pdftoppm.into(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `pdftoppm` call writing the first page of `pdf` to `{prefix}.png`.
    fn rasterize_command(&self, pdf: &Path, prefix: &Path) -> Command {
        let mut command = Command::new(&self.pdftoppm);
        command
            .args(["-f", "1", "-l", "1", "-png", "-singlefile"])
            .arg(pdf)
            .arg(prefix);
        command
    }

    fn convert(&self, job: &RenderJob<'_>, single: &Path, profile: &Path) -> Result<PathBuf, RenderError> {
        write_single_slide_deck(job.deck, job.slide, single)?;
        run_with_timeout(
            soffice_command(&self.soffice, profile)?
                .args(["--convert-to", "pdf", "--outdir"])
                .arg(job.scratch_dir)
                .arg(single),
            self.timeout,
        )?;

        let pdf = single.with_extension("pdf");
        if !pdf.is_file() {
            return Err(RenderError::Failed(format!("soffice produced no {}", pdf.display())));
        }

        let prefix = job.scratch_dir.join(&job.stem);
        let result = run_with_timeout(&mut self.rasterize_command(&pdf, &prefix), self.timeout);
        remove_quietly(&pdf);
        result?;
        Ok(job.image_path())
    }
}

impl SlideRenderer for OfficeSuiteRenderer {
    fn name(&self) -> &str {
        "office-suite"
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<PathBuf, RenderError> {
        let single = job.intermediate_path("excerpt.pptx");
        let profile = job.intermediate_path("profile");
        let result = self.convert(job, &single, &profile);
        remove_quietly(&single);
        remove_quietly(&profile);
        result
    }
}
