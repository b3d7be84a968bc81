//! Rasterisation: render leading pages to PNG through an external process.
//!
//! The pipeline only knows the [`PageRenderer`] port. The shipped
//! implementation shells out to poppler's `pdftoppm`; an in-process
//! rasteriser can replace it without touching the orchestrator.
//!
//! A non-zero exit is fatal and never retried: it means the PDF is
//! structurally broken or encrypted, not that the tool hiccupped.

use crate::error::ExtractError;
use crate::output::RenderedPage;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// File prefix handed to the rasteriser; images land as `pg-<n>.png`.
pub const OUTPUT_PREFIX: &str = "pg";

/// Port for the rasterisation step of Stage B.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render pages `1..=last_page` of `pdf_path` into `out_dir`.
    ///
    /// Returns the pages sorted by page number. `out_dir` is owned by the
    /// caller and removed after the call, so implementations may write
    /// freely into it.
    async fn render(
        &self,
        pdf_path: &Path,
        last_page: usize,
        out_dir: &Path,
    ) -> Result<Vec<RenderedPage>, ExtractError>;
}

/// [`PageRenderer`] that runs `pdftoppm -f 1 -l N -png -r DPI in.pdf prefix`.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    program: PathBuf,
    dpi: u32,
}

impl PdftoppmRenderer {
    pub fn new(program: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            program: program.into(),
            dpi,
        }
    }

    fn args(&self, pdf_path: &Path, last_page: usize, prefix: &Path) -> Vec<OsString> {
        vec![
            "-f".into(),
            "1".into(),
            "-l".into(),
            last_page.to_string().into(),
            "-png".into(),
            "-r".into(),
            self.dpi.to_string().into(),
            pdf_path.as_os_str().to_owned(),
            prefix.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render(
        &self,
        pdf_path: &Path,
        last_page: usize,
        out_dir: &Path,
    ) -> Result<Vec<RenderedPage>, ExtractError> {
        let prefix = out_dir.join(OUTPUT_PREFIX);
        let args = self.args(pdf_path, last_page, &prefix);
        let command_line = describe_command(&self.program, &args);
        debug!("Running: {}", command_line);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| ExtractError::ToolUnavailable {
                tool: "pdftoppm",
                path: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(ExtractError::RenderFailed {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            });
        }

        let pages = collect_page_images(out_dir, OUTPUT_PREFIX).await?;
        info!("Rendered {} pages at {} DPI", pages.len(), self.dpi);
        Ok(pages)
    }
}

/// Load every `<prefix>-<n>.png` in `dir`, sorted by `n` numerically.
///
/// `pdftoppm` zero-pads the suffix to the width of the last page number,
/// and lexical order breaks past page 9 anyway, so the suffix is parsed.
/// An empty result is an error carrying the directory listing.
pub async fn collect_page_images(
    dir: &Path,
    prefix: &str,
) -> Result<Vec<RenderedPage>, ExtractError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ExtractError::io(format!("listing {}", dir.display()), e))?;

    let mut listing = Vec::new();
    let mut numbered: Vec<(usize, PathBuf)> = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExtractError::io(format!("listing {}", dir.display()), e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(n) = page_number_from_file_name(&name, prefix) {
            numbered.push((n, entry.path()));
        }
        listing.push(name);
    }

    if numbered.is_empty() {
        listing.sort();
        return Err(ExtractError::RenderProducedNoImages {
            dir: dir.to_path_buf(),
            listing,
        });
    }

    numbered.sort_by_key(|(n, _)| *n);

    let mut pages = Vec::with_capacity(numbered.len());
    for (index, path) in numbered {
        let image_bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ExtractError::io(format!("reading {}", path.display()), e))?;
        pages.push(RenderedPage { index, image_bytes });
    }
    Ok(pages)
}

/// Parse `n` out of `<prefix>-<n>.png`; anything else is `None`.
pub fn page_number_from_file_name(name: &str, prefix: &str) -> Option<usize> {
    let stem = name.strip_suffix(".png")?;
    let suffix = stem.strip_prefix(prefix)?.strip_prefix('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

fn describe_command(program: &Path, args: &[OsString]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
