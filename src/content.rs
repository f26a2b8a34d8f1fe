//! Content discovery and loading.
//!
//! The loader walks the configured source roots, matches files against the
//! include/exclude globs, and parses each file's metadata header (YAML front
//! matter delimited by `---` lines) separately from its body. Each file
//! becomes one immutable [`ContentItem`], keyed by its root-relative source
//! path. Parsing one file is a pure function of its bytes, so files are
//! parsed in parallel.

use anyhow::Result;
use indexmap::IndexMap;
use log::debug;
use rayon::prelude::*;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::SiteConfig;
use crate::error::{BuildError, MetadataParseError};
use crate::matching;

/// Extension given to every emitted document.
pub const OUTPUT_EXTENSION: &str = "html";

/// One loaded content file. Immutable after load.
#[derive(Debug, Clone)]
pub struct ContentItem {
    /// Absolute path of the source file.
    pub source_path: PathBuf,
    /// Root-relative source path with forward slashes. This is the item's
    /// identity.
    pub rel_path: String,
    pub title: String,
    /// Declared metadata keys. Order of declaration is preserved; values are
    /// arbitrary YAML scalars or sequences.
    pub metadata: IndexMap<String, Value>,
    /// Markup body, opaque to the loader.
    pub body: String,
    /// Root-relative output path, derived from `rel_path`.
    pub output_path: String,
}

impl ContentItem {
    /// Directory part of the item's identity ("" for top-level files).
    pub fn rel_dir(&self) -> &str {
        match self.rel_path.rfind('/') {
            Some(idx) => &self.rel_path[..idx],
            None => "",
        }
    }

    /// The `template` metadata key, when declared as a string.
    pub fn declared_template(&self) -> Option<&str> {
        self.metadata.get("template").and_then(Value::as_str)
    }
}

/// Derives the output path for a source identity: same directory structure,
/// source extension replaced by [`OUTPUT_EXTENSION`]. Deterministic and
/// injective over identities that differ in more than their extension.
pub fn derive_output_path(rel_path: &str) -> String {
    match rel_path.rfind('.') {
        Some(idx) if !rel_path[idx + 1..].contains('/') => {
            format!("{}.{}", &rel_path[..idx], OUTPUT_EXTENSION)
        }
        _ => format!("{}.{}", rel_path, OUTPUT_EXTENSION),
    }
}

/// The loaded content set, keyed by identity. Iteration follows discovery
/// order, which is sorted and therefore deterministic.
#[derive(Debug, Default)]
pub struct ContentSet {
    items: IndexMap<String, ContentItem>,
    /// Output path -> identity, for collision detection.
    outputs: HashMap<String, String>,
}

impl ContentSet {
    pub fn insert(&mut self, item: ContentItem) -> Result<(), BuildError> {
        if let Some(existing) = self.items.get(&item.rel_path) {
            return Err(BuildError::DuplicateContent {
                identity: item.rel_path.clone(),
                first: existing.source_path.clone(),
                second: item.source_path,
            });
        }
        if let Some(prior) = self.outputs.get(&item.output_path) {
            let existing = &self.items[prior];
            return Err(BuildError::DuplicateContent {
                identity: item.output_path.clone(),
                first: existing.source_path.clone(),
                second: item.source_path,
            });
        }
        self.outputs
            .insert(item.output_path.clone(), item.rel_path.clone());
        self.items.insert(item.rel_path.clone(), item);
        Ok(())
    }

    pub fn get(&self, rel_path: &str) -> Option<&ContentItem> {
        self.items.get(rel_path)
    }

    pub fn contains(&self, rel_path: &str) -> bool {
        self.items.contains_key(rel_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of the load phase: the content set plus the per-file metadata
/// errors collected along the way. The caller decides whether any errors
/// make the run fatal (they do, at the end of the phase).
#[derive(Debug)]
pub struct LoadOutcome {
    pub content: ContentSet,
    pub errors: Vec<MetadataParseError>,
}

/// Discovers and parses all content under the configured roots.
///
/// Per-file parse failures are collected in the outcome rather than aborting
/// the walk; identity and output-path collisions are fatal immediately.
pub fn load_content(config: &SiteConfig) -> Result<LoadOutcome> {
    let mut discovered: Vec<(PathBuf, PathBuf)> = Vec::new();

    for root in &config.source_dirs {
        let exclude = effective_excludes(config, root);
        for path in matching::matching_files(root, &config.include_patterns, &exclude)? {
            discovered.push((root.clone(), path));
        }
    }
    debug!("Discovered {} source files", discovered.len());

    let parsed: Vec<Result<ContentItem, MetadataParseError>> = discovered
        .par_iter()
        .map(|(root, path)| parse_file(root, path))
        .collect();

    let mut content = ContentSet::default();
    let mut errors = Vec::new();
    for result in parsed {
        match result {
            Ok(item) => content.insert(item)?,
            Err(err) => errors.push(err),
        }
    }

    Ok(LoadOutcome { content, errors })
}

/// Exclude patterns for one root: configured excludes, hidden files and
/// directories, and the output directory when it lives inside the root.
fn effective_excludes(config: &SiteConfig, root: &Path) -> Vec<String> {
    let mut exclude = config.exclude_patterns.clone();
    exclude.push(".*/**".to_string());
    exclude.push("**/.*".to_string());
    exclude.push(".*".to_string());

    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let canonical_output = config
        .output_dir
        .canonicalize()
        .unwrap_or_else(|_| config.output_dir.clone());
    if let Ok(rel) = canonical_output.strip_prefix(&canonical_root) {
        let rel = matching::normalize_path(rel);
        if !rel.is_empty() {
            debug!("Excluding output directory '{}' from discovery", rel);
            exclude.push(format!("{}/**", rel));
        }
    }

    exclude
}

/// Parses one source file into a [`ContentItem`].
pub fn parse_file(root: &Path, path: &Path) -> Result<ContentItem, MetadataParseError> {
    let raw = std::fs::read_to_string(path).map_err(|e| MetadataParseError {
        path: path.to_path_buf(),
        detail: format!("failed to read file: {}", e),
    })?;

    let rel_path = matching::normalize_path(path.strip_prefix(root).unwrap_or(path));
    parse_item(path.to_path_buf(), rel_path, &raw)
}

/// Parses already-read content. Split out so tests can exercise the parser
/// without touching the filesystem.
pub fn parse_item(
    source_path: PathBuf,
    rel_path: String,
    raw: &str,
) -> Result<ContentItem, MetadataParseError> {
    let (header, body) = split_front_matter(raw).map_err(|detail| MetadataParseError {
        path: source_path.clone(),
        detail,
    })?;

    let metadata: IndexMap<String, Value> = match header {
        Some(header) if !header.trim().is_empty() => {
            serde_yaml::from_str(header).map_err(|e| MetadataParseError {
                path: source_path.clone(),
                detail: e.to_string(),
            })?
        }
        _ => IndexMap::new(),
    };

    let title = extract_title(&metadata, body, &rel_path);
    let output_path = derive_output_path(&rel_path);

    Ok(ContentItem {
        source_path,
        rel_path,
        title,
        metadata,
        body: body.to_string(),
        output_path,
    })
}

/// Splits YAML front matter from the body. Returns `(None, content)` when no
/// header is present; an opening delimiter without a closing one is a parse
/// error.
fn split_front_matter(content: &str) -> Result<(Option<&str>, &str), String> {
    let rest = match content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return Ok((None, content)),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(header), body));
        }
        offset += line.len();
    }

    Err("unterminated metadata header (missing closing '---')".to_string())
}

/// Title precedence: `title` metadata key, first level-one heading, file
/// stem.
fn extract_title(metadata: &IndexMap<String, Value>, body: &str, rel_path: &str) -> String {
    if let Some(title) = metadata.get("title").and_then(Value::as_str) {
        return title.to_string();
    }

    for line in body.lines() {
        if let Some(heading) = line.strip_prefix("# ") {
            return heading.trim().to_string();
        }
    }

    Path::new(rel_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn item(rel: &str, raw: &str) -> Result<ContentItem, MetadataParseError> {
        parse_item(PathBuf::from(rel), rel.to_string(), raw)
    }

    #[test]
    fn test_front_matter_split() {
        let doc = item(
            "about.md",
            "---\ntitle: About Us\nauthors:\n  - Ada\n  - Grace\n---\n\nBody text.\n",
        )
        .unwrap();
        assert_eq!(doc.title, "About Us");
        assert_eq!(doc.metadata["authors"].as_sequence().unwrap().len(), 2);
        assert_eq!(doc.body.trim(), "Body text.");
    }

    #[test]
    fn test_missing_metadata_defaults_empty() {
        let doc = item("note.md", "Just a body, no header.\n").unwrap();
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body.trim(), "Just a body, no header.");
    }

    #[test]
    fn test_title_falls_back_to_heading_then_stem() {
        let doc = item("posts/pandas-intro.md", "# Working with DataFrames\n\ntext").unwrap();
        assert_eq!(doc.title, "Working with DataFrames");

        let doc = item("posts/pandas-intro.md", "no heading here").unwrap();
        assert_eq!(doc.title, "pandas-intro");
    }

    #[test]
    fn test_unterminated_header_is_parse_error() {
        let err = item("bad.md", "---\ntitle: Oops\n\nbody").unwrap_err();
        assert!(err.detail.contains("unterminated"));
        assert_eq!(err.path, PathBuf::from("bad.md"));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = item("bad.md", "---\ntitle: [unclosed\n---\nbody").unwrap_err();
        assert!(!err.detail.is_empty());
    }

    #[test]
    fn test_output_path_derivation() {
        assert_eq!(derive_output_path("index.md"), "index.html");
        assert_eq!(derive_output_path("posts/a.md"), "posts/a.html");
        // No extension: one is appended rather than replaced
        assert_eq!(derive_output_path("LICENSE"), "LICENSE.html");
        // A dot in a directory name is not an extension
        assert_eq!(derive_output_path("v1.2/notes"), "v1.2/notes.html");
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut set = ContentSet::default();
        set.insert(item("a.md", "one").unwrap()).unwrap();
        let err = set.insert(item("a.md", "two").unwrap()).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateContent { .. }));
    }

    #[test]
    fn test_output_collision_rejected() {
        let mut set = ContentSet::default();
        set.insert(item("a.md", "one").unwrap()).unwrap();
        let err = set.insert(item("a.markdown", "two").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::DuplicateContent { identity, .. } if identity == "a.html"
        ));
    }

    #[test]
    fn test_load_collects_errors_without_stopping() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.md"), "---\ntitle: Good\n---\nok").unwrap();
        fs::write(tmp.path().join("bad.md"), "---\ntitle: Bad\nno close").unwrap();
        fs::write(tmp.path().join("also-good.md"), "plain body").unwrap();

        let config = SiteConfig {
            source_dirs: vec![tmp.path().to_path_buf()],
            ..SiteConfig::default()
        };
        let outcome = load_content(&config).unwrap();

        assert_eq!(outcome.content.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].path.ends_with("bad.md"));
    }

    #[test]
    fn test_output_dir_inside_source_is_excluded() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("_site");
        fs::create_dir_all(&out).unwrap();
        fs::write(tmp.path().join("index.md"), "x").unwrap();
        fs::write(out.join("stale.md"), "x").unwrap();

        let config = SiteConfig {
            source_dirs: vec![tmp.path().to_path_buf()],
            output_dir: out,
            ..SiteConfig::default()
        };
        let outcome = load_content(&config).unwrap();
        assert_eq!(outcome.content.len(), 1);
        assert!(outcome.content.contains("index.md"));
    }

    proptest! {
        /// Output derivation is deterministic and keeps the directory part
        /// intact, so two sources in different directories never collide.
        #[test]
        fn prop_output_path_deterministic_and_dir_preserving(
            dirs in proptest::collection::vec("[a-z]{1,8}", 0..3),
            stem in "[a-z][a-z0-9-]{0,12}",
        ) {
            let rel = if dirs.is_empty() {
                format!("{}.md", stem)
            } else {
                format!("{}/{}.md", dirs.join("/"), stem)
            };

            let first = derive_output_path(&rel);
            let second = derive_output_path(&rel);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.ends_with(".html"));

            let expected_dir = dirs.join("/");
            let dir_of = |p: &str| p.rfind('/').map(|i| p[..i].to_string()).unwrap_or_default();
            prop_assert_eq!(dir_of(&first), expected_dir);
        }

        /// Distinct stems in the same directory derive distinct outputs.
        #[test]
        fn prop_output_path_injective_over_stems(
            a in "[a-z]{1,10}",
            b in "[a-z]{1,10}",
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(
                derive_output_path(&format!("{}.md", a)),
                derive_output_path(&format!("{}.md", b))
            );
        }
    }
}
