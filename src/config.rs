//! Site configuration loaded from `site.toml`.
//!
//! One configuration object per run: site title, source and output
//! directories, include/exclude globs, static asset directories, template
//! settings, and the declared navigation sections. Immutable after loading.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A declared navigation entry: a label plus either an internal content
/// target (source-relative path, with or without extension) or an absolute
/// URL. Order of entries and children is significant.
#[derive(Debug, Clone, Deserialize)]
pub struct NavEntry {
    pub label: String,
    /// Internal content path or absolute URL. Entries without a target are
    /// pure containers for their children.
    #[serde(default)]
    pub target: Option<String>,
    /// Section-level template override for content under this entry.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub children: Vec<NavEntry>,
}

/// Raw `site.toml` structure for deserialization.
#[derive(Debug, Deserialize)]
struct SiteToml {
    site: SiteMeta,
    #[serde(default)]
    nav: Vec<NavEntry>,
}

#[derive(Debug, Deserialize)]
struct SiteMeta {
    title: String,
    #[serde(default)]
    source_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
    #[serde(default)]
    static_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    templates_dir: Option<PathBuf>,
    #[serde(default)]
    default_template: Option<String>,
}

/// Process-wide configuration for one generation run.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub title: String,
    /// Content roots, scanned in order. Relative paths inside different
    /// roots share one identity space.
    pub source_dirs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Directories copied verbatim into the output tree.
    pub static_dirs: Vec<PathBuf>,
    /// Directory holding minijinja templates (`*.html`).
    pub templates_dir: Option<PathBuf>,
    /// Global default template name.
    pub default_template: String,
    /// Ordered top-level navigation sections.
    pub nav: Vec<NavEntry>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            source_dirs: vec![PathBuf::from(".")],
            output_dir: PathBuf::from("_site"),
            include_patterns: vec!["**/*.md".to_string()],
            exclude_patterns: Vec::new(),
            static_dirs: Vec::new(),
            templates_dir: None,
            default_template: "default.html".to_string(),
            nav: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a TOML file. Relative directories are
    /// resolved against the file's parent directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let raw: SiteToml = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        let defaults = SiteConfig::default();
        let config = Self {
            title: raw.site.title,
            source_dirs: raw
                .site
                .source_dirs
                .unwrap_or_else(|| vec![PathBuf::from(".")])
                .into_iter()
                .map(|p| resolve(p))
                .collect(),
            output_dir: resolve(raw.site.output_dir.unwrap_or_else(|| defaults.output_dir.clone())),
            include_patterns: raw.site.include.unwrap_or(defaults.include_patterns),
            exclude_patterns: raw.site.exclude.unwrap_or_default(),
            static_dirs: raw
                .site
                .static_dirs
                .unwrap_or_default()
                .into_iter()
                .map(|p| resolve(p))
                .collect(),
            templates_dir: raw.site.templates_dir.map(resolve),
            default_template: raw.site.default_template.unwrap_or(defaults.default_template),
            nav: raw.nav,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.source_dirs.is_empty() {
            return Err(anyhow!("at least one source directory is required"));
        }
        for entry in &self.nav {
            validate_entry(entry)?;
        }
        Ok(())
    }
}

fn validate_entry(entry: &NavEntry) -> Result<()> {
    if entry.target.is_none() && entry.children.is_empty() {
        return Err(anyhow!(
            "navigation entry '{}' has neither a target nor children",
            entry.label
        ));
    }
    if let Some(target) = &entry.target {
        if !is_external_target(target) && !crate::matching::is_plain_relative(Path::new(target)) {
            return Err(anyhow!(
                "navigation entry '{}' has a target outside the source tree: '{}'",
                entry.label,
                target
            ));
        }
    }
    for child in &entry.children {
        validate_entry(child)?;
    }
    Ok(())
}

/// True for targets that are absolute URLs rather than content references.
pub fn is_external_target(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("mailto:")
}
