//! Error and warning types for the build pipeline.
//!
//! Structural errors (duplicate content, dangling navigation targets, write
//! failures) abort the run; content-level problems (a broken inline link)
//! are collected as warnings and reported without blocking emission.

use std::path::PathBuf;
use thiserror::Error;

/// A content file whose metadata header could not be parsed.
///
/// These are collected per file during loading so that one bad header does
/// not hide problems in the rest of the tree; the run still aborts at the
/// end of the load phase if any occurred.
#[derive(Debug, Clone, Error)]
#[error("{}: {detail}", path.display())]
pub struct MetadataParseError {
    /// Source file with the malformed header.
    pub path: PathBuf,
    /// Parser detail, including the position when the parser provides one.
    pub detail: String,
}

/// Fatal build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Two source files map to the same identity or output path.
    #[error(
        "duplicate content '{identity}': '{}' collides with '{}'",
        first.display(),
        second.display()
    )]
    DuplicateContent {
        identity: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// One or more content files had malformed metadata headers.
    #[error("{} content file(s) had malformed metadata headers", .0.len())]
    MetadataFailures(Vec<MetadataParseError>),

    /// A navigation entry references content that does not exist.
    #[error("navigation entry '{label}' references missing content '{target}'")]
    UnresolvedLink { label: String, target: String },

    /// Writing an output file failed. `written` lists the pages that were
    /// emitted successfully before the failure, for partial-publish
    /// diagnostics.
    #[error("failed to write '{}' ({} page(s) written before failure)", path.display(), written.len())]
    WriteFailure {
        path: PathBuf,
        written: Vec<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

/// A non-fatal problem found while rendering a page.
#[derive(Debug, Clone)]
pub struct BuildWarning {
    /// Output path of the page the warning belongs to.
    pub page: String,
    pub message: String,
}

impl BuildWarning {
    /// An inline link that references content not present in the loaded set.
    pub fn broken_cross_link(page: impl Into<String>, href: &str) -> Self {
        Self {
            page: page.into(),
            message: format!("inline link to missing content '{}'", href),
        }
    }
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.page, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_failures_display_counts_files() {
        let err = BuildError::MetadataFailures(vec![
            MetadataParseError {
                path: PathBuf::from("a.md"),
                detail: "bad header".to_string(),
            },
            MetadataParseError {
                path: PathBuf::from("b.md"),
                detail: "bad header".to_string(),
            },
        ]);
        assert!(err.to_string().contains("2 content file(s)"));
    }

    #[test]
    fn test_broken_cross_link_warning_names_href() {
        let warning = BuildWarning::broken_cross_link("posts/one.html", "missing.md");
        assert!(warning.to_string().contains("missing.md"));
        assert!(warning.to_string().contains("posts/one.html"));
    }
}
