//! Site emission: writes rendered pages and copies static assets.
//!
//! The emitter only ever creates or overwrites files it owns; pre-existing
//! files in the output directory that correspond to no rendered page are
//! left alone. Output paths are disjoint by construction (derivation is
//! injective over unique source paths), so re-running with unchanged inputs
//! produces byte-identical files.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::render::RenderedPage;

/// What the emitter wrote.
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Output paths written, in emission order.
    pub written: Vec<PathBuf>,
    pub assets_copied: usize,
}

/// Writes every rendered page under `output_dir`, creating intermediate
/// directories as needed. A write failure is fatal; the error carries the
/// list of pages that made it to disk before the failure.
pub fn emit_pages(output_dir: &Path, pages: &[RenderedPage]) -> Result<EmitReport, BuildError> {
    let mut written = Vec::with_capacity(pages.len());

    for page in pages {
        let path = output_dir.join(&page.output_path);
        match write_page(&path, &page.html) {
            Ok(()) => {
                debug!("Wrote {}", path.display());
                written.push(path);
            }
            Err(source) => {
                return Err(BuildError::WriteFailure {
                    path,
                    written,
                    source,
                });
            }
        }
    }

    Ok(EmitReport {
        written,
        assets_copied: 0,
    })
}

fn write_page(path: &Path, html: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
}

/// Copies the configured static directories into the output tree verbatim.
/// Assets are passthrough inputs, never transformed.
pub fn copy_static_assets(output_dir: &Path, static_dirs: &[PathBuf]) -> Result<usize> {
    let mut copied = 0;
    for dir in static_dirs {
        if !dir.exists() {
            log::warn!("Static directory '{}' does not exist, skipping", dir.display());
            continue;
        }
        info!("Copying static assets from {}", dir.display());
        copied += copy_dir_recursive(dir, output_dir)?;
    }
    Ok(copied)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<usize> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

    let mut copied = 0;
    for entry in std::fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if src_path.is_dir() {
            copied += copy_dir_recursive(&src_path, &dest_path)?;
        } else {
            std::fs::copy(&src_path, &dest_path).with_context(|| {
                format!(
                    "Failed to copy asset {} to {}",
                    src_path.display(),
                    dest_path.display()
                )
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}
