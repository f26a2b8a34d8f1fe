//! Glob-style pattern matching for content discovery.
//!
//! Include and exclude patterns in the site configuration use shell-style
//! globs: `**` spans directories, `*` and `?` stop at directory separators,
//! `[seq]` / `[!seq]` match character classes. Patterns are translated to
//! anchored regexes and cached.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref PATTERN_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Translates a glob pattern into an anchored regex pattern.
pub fn translate_pattern(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        // "**/" spans zero or more whole directory components
                        out.push_str("(?:[^/]+/)*");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                if chars.peek() == Some(&'!') || chars.peek() == Some(&'^') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == ']' && !class.is_empty() && class != "^" {
                        closed = true;
                        break;
                    }
                    class.push(ch);
                }
                if closed {
                    out.push('[');
                    out.push_str(&class);
                    out.push(']');
                } else {
                    // Unterminated class, treat the bracket literally
                    out.push_str("\\[");
                    out.push_str(&regex::escape(&class));
                }
            }
            '\\' | '.' | '^' | '$' | '+' | '{' | '}' | '|' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out.push('$');
    out
}

/// Compiles a glob pattern, consulting the process-wide cache.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERN_CACHE.lock().unwrap();
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(&translate_pattern(pattern))?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Tests a normalized relative path against a glob pattern.
pub fn pattern_match(name: &str, pattern: &str) -> Result<bool, regex::Error> {
    Ok(compile_pattern(pattern)?.is_match(name))
}

/// Normalizes a path to forward slashes so patterns behave the same on all
/// platforms.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Resolves a relative link against the directory of a content file,
/// collapsing `.` and `..` components. Returns `None` if the link escapes
/// the content root.
pub fn resolve_relative(base_dir: &str, link: &str) -> Option<String> {
    let mut segments: Vec<&str> = if base_dir.is_empty() {
        Vec::new()
    } else {
        base_dir.split('/').collect()
    };

    for part in link.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    Some(segments.join("/"))
}

/// Walks a root directory and returns the files whose root-relative paths
/// match at least one include pattern and no exclude pattern. Results are
/// sorted so discovery order is deterministic.
pub fn matching_files(
    root: &Path,
    include_patterns: &[String],
    exclude_patterns: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let include: Vec<Regex> = include_patterns
        .iter()
        .map(|p| compile_pattern(p))
        .collect::<Result<_, _>>()?;
    let exclude: Vec<Regex> = exclude_patterns
        .iter()
        .map(|p| compile_pattern(p))
        .collect::<Result<_, _>>()?;

    let mut matched = Vec::new();
    walk(root, root, &include, &exclude, &mut matched)?;
    matched.sort();
    Ok(matched)
}

fn walk(
    dir: &Path,
    root: &Path,
    include: &[Regex],
    exclude: &[Regex],
    matched: &mut Vec<PathBuf>,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, root, include, exclude, matched)?;
        } else if path.is_file() {
            let relative = normalize_path(path.strip_prefix(root)?);
            let included = include.iter().any(|re| re.is_match(&relative));
            let excluded = exclude.iter().any(|re| re.is_match(&relative));
            if included && !excluded {
                matched.push(path);
            }
        }
    }

    Ok(())
}

/// True when every component of `path` is a plain name (no `..`, no root,
/// no drive prefix). Used to reject configured paths that would escape the
/// source tree.
pub fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_translate_pattern() {
        assert_eq!(translate_pattern("*.md"), "^[^/]*\\.md$");
        assert_eq!(translate_pattern("**"), "^.*$");
        assert_eq!(translate_pattern("**/index.md"), "^(?:[^/]+/)*index\\.md$");
        assert_eq!(translate_pattern("posts/*.md"), "^posts/[^/]*\\.md$");
        assert_eq!(translate_pattern("[abc].md"), "^[abc]\\.md$");
        assert_eq!(translate_pattern("[!abc].md"), "^[^abc]\\.md$");
    }

    #[test]
    fn test_pattern_match() {
        assert!(pattern_match("index.md", "*.md").unwrap());
        assert!(pattern_match("posts/intro.md", "**/*.md").unwrap());
        assert!(pattern_match("a/b/c.md", "a/**/*.md").unwrap());
        assert!(!pattern_match("posts/intro.md", "*.md").unwrap());
        assert!(!pattern_match("notes.txt", "**/*.md").unwrap());
        assert!(pattern_match("a.md", "[abc].md").unwrap());
        assert!(!pattern_match("a.md", "[!abc].md").unwrap());
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("posts", "intro.md").as_deref(),
            Some("posts/intro.md")
        );
        assert_eq!(
            resolve_relative("posts", "../about.md").as_deref(),
            Some("about.md")
        );
        assert_eq!(
            resolve_relative("", "./guide/setup.md").as_deref(),
            Some("guide/setup.md")
        );
        // Escaping the root is rejected
        assert_eq!(resolve_relative("", "../outside.md"), None);
    }

    #[test]
    fn test_matching_files_respects_excludes() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("posts")).unwrap();
        fs::create_dir_all(tmp.path().join("drafts")).unwrap();
        fs::write(tmp.path().join("index.md"), "x").unwrap();
        fs::write(tmp.path().join("posts/one.md"), "x").unwrap();
        fs::write(tmp.path().join("drafts/wip.md"), "x").unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let files = matching_files(
            tmp.path(),
            &["**/*.md".to_string()],
            &["drafts/**".to_string()],
        )
        .unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| normalize_path(p.strip_prefix(tmp.path()).unwrap()))
            .collect();
        assert_eq!(names, vec!["index.md", "posts/one.md"]);
    }
}
