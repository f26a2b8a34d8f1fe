//! Build orchestration: load, build navigation, render, emit.
//!
//! Data flows strictly forward through the four stages. Loading and
//! rendering fan out across a rayon pool; the navigation tree is built
//! between them and shared read-only, which is the run's single
//! synchronization barrier.

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use std::time::{Duration, Instant};

use crate::config::SiteConfig;
use crate::content::{self, ContentItem};
use crate::emit;
use crate::error::{BuildError, BuildWarning};
use crate::navigation;
use crate::render::{RenderedPage, Renderer};

/// Summary of one completed run.
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub files_loaded: usize,
    pub pages_emitted: usize,
    pub assets_copied: usize,
    pub warnings: usize,
    pub warning_details: Vec<BuildWarning>,
    pub build_time: Duration,
}

pub struct SiteBuilder {
    config: SiteConfig,
    parallel_jobs: usize,
}

impl SiteBuilder {
    pub fn new(config: SiteConfig) -> Self {
        let parallel_jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            config,
            parallel_jobs,
        }
    }

    pub fn set_parallel_jobs(&mut self, jobs: usize) {
        if jobs > 0 {
            self.parallel_jobs = jobs;
        }
    }

    /// Runs the full pipeline. A run either completes or fails outright; no
    /// output is emitted when a structural error (metadata failures,
    /// unresolved navigation) is found.
    pub fn build(&self) -> Result<BuildStats> {
        let start = Instant::now();
        info!("Starting build");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_jobs)
            .build()?;

        // Load phase: fail-soft per file, fail-loud at the end.
        let outcome = pool.install(|| content::load_content(&self.config))?;
        if !outcome.errors.is_empty() {
            for error in &outcome.errors {
                log::error!("{}", error);
            }
            return Err(BuildError::MetadataFailures(outcome.errors).into());
        }
        let content = outcome.content;
        info!("Loaded {} content items", content.len());

        // Navigation barrier: the tree must be complete and immutable
        // before any page renders.
        let nav = navigation::build_navigation(&self.config, &content)?;

        let renderer = Renderer::new(&self.config, &content, &nav)?;
        let items: Vec<&ContentItem> = content.iter().collect();
        let pages: Result<Vec<RenderedPage>> = pool.install(|| {
            items
                .into_par_iter()
                .map(|item| renderer.render_page(item))
                .collect()
        });
        let pages = pages?;
        info!(
            "Rendered {} pages with {} parallel jobs",
            pages.len(),
            self.parallel_jobs
        );

        let warning_details: Vec<BuildWarning> = pages
            .iter()
            .flat_map(|page| page.warnings.iter().cloned())
            .collect();
        for warning in &warning_details {
            warn!("{}", warning);
        }

        std::fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.config.output_dir.display()
            )
        })?;
        let report = emit::emit_pages(&self.config.output_dir, &pages)?;
        let assets_copied =
            emit::copy_static_assets(&self.config.output_dir, &self.config.static_dirs)?;

        let stats = BuildStats {
            files_loaded: content.len(),
            pages_emitted: report.written.len(),
            assets_copied,
            warnings: warning_details.len(),
            warning_details,
            build_time: start.elapsed(),
        };
        info!("Build completed in {:?}", stats.build_time);
        Ok(stats)
    }

    /// Removes the output directory.
    pub fn clean(&self) -> Result<()> {
        if self.config.output_dir.exists() {
            std::fs::remove_dir_all(&self.config.output_dir).with_context(|| {
                format!(
                    "Failed to remove output directory: {}",
                    self.config.output_dir.display()
                )
            })?;
        }
        Ok(())
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }
}
