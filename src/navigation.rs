//! Navigation model: declared sections cross-linked to loaded content.
//!
//! The tree is built once, after loading and before any rendering, and is
//! shared immutably across all page renders. Which node is "active" for a
//! page is a pure function of (page path, tree) computed per render call;
//! no active flag is ever stored on the shared tree.

use serde::Serialize;
use std::path::Path;

use crate::config::{is_external_target, NavEntry, SiteConfig};
use crate::content::{ContentItem, ContentSet};
use crate::error::BuildError;

/// Where a navigation node points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavTarget {
    /// Resolved internal target: the output path of a content item.
    Page(String),
    /// Absolute URL, passed through unvalidated.
    External(String),
    /// No page of its own; the node only groups its children.
    Container,
}

/// One entry in a menu or sidebar. Child order reflects declared order.
#[derive(Debug, Clone)]
pub struct NavigationNode {
    pub label: String,
    pub target: NavTarget,
    pub children: Vec<NavigationNode>,
}

/// Scope of a section-level template override.
#[derive(Debug, Clone)]
enum TemplateScope {
    /// Applies to every item whose identity starts with this `dir/` prefix.
    Prefix(String),
    /// Applies to exactly one item identity.
    Exact(String),
}

/// The immutable navigation model for one run.
#[derive(Debug, Default)]
pub struct NavigationTree {
    pub roots: Vec<NavigationNode>,
    section_templates: Vec<(TemplateScope, String)>,
}

impl NavigationTree {
    /// Section-level template for an item, if any declared nav entry covers
    /// it. The most specific (longest-scope) declaration wins.
    pub fn section_template(&self, item: &ContentItem) -> Option<&str> {
        let mut best: Option<(usize, &str)> = None;
        for (scope, template) in &self.section_templates {
            let specificity = match scope {
                TemplateScope::Exact(path) if path == &item.rel_path => usize::MAX,
                TemplateScope::Prefix(prefix) if item.rel_path.starts_with(prefix.as_str()) => {
                    prefix.len()
                }
                _ => continue,
            };
            if best.map_or(true, |(len, _)| specificity > len) {
                best = Some((specificity, template));
            }
        }
        best.map(|(_, t)| t)
    }
}

/// Builds the navigation tree from the declared sections, resolving internal
/// targets against the loaded content. Unresolved internal references are
/// fatal: broken navigation must not silently publish.
pub fn build_navigation(
    config: &SiteConfig,
    content: &ContentSet,
) -> Result<NavigationTree, BuildError> {
    let mut tree = NavigationTree::default();
    for entry in &config.nav {
        let node = build_node(entry, content, &mut tree.section_templates)?;
        tree.roots.push(node);
    }
    Ok(tree)
}

fn build_node(
    entry: &NavEntry,
    content: &ContentSet,
    templates: &mut Vec<(TemplateScope, String)>,
) -> Result<NavigationNode, BuildError> {
    let target = match entry.target.as_deref() {
        None => NavTarget::Container,
        Some(t) if is_external_target(t) => NavTarget::External(t.to_string()),
        Some(t) => resolve_internal(entry, t, content, templates)?,
    };

    let mut children = Vec::with_capacity(entry.children.len());
    for child in &entry.children {
        children.push(build_node(child, content, templates)?);
    }

    Ok(NavigationNode {
        label: entry.label.clone(),
        target,
        children,
    })
}

fn resolve_internal(
    entry: &NavEntry,
    target: &str,
    content: &ContentSet,
    templates: &mut Vec<(TemplateScope, String)>,
) -> Result<NavTarget, BuildError> {
    let target = target.trim_end_matches('/');

    // A reference to a specific content item resolves directly.
    if let Some(item) = resolve_content_ref(content, target) {
        if let Some(template) = &entry.template {
            templates.push((TemplateScope::Exact(item.rel_path.clone()), template.clone()));
        }
        return Ok(NavTarget::Page(item.output_path.clone()));
    }

    // A container path resolves to the section's explicit index item when
    // one exists.
    if let Some(index) = find_section_index(content, target) {
        if let Some(template) = &entry.template {
            templates.push((
                TemplateScope::Prefix(format!("{}/", target)),
                template.clone(),
            ));
        }
        return Ok(NavTarget::Page(index.output_path.clone()));
    }

    // A container without an index is a pure container, but only when it
    // actually contains something to navigate to. Declared children do not
    // excuse a dangling target.
    let is_container = content
        .iter()
        .any(|item| item.rel_path.starts_with(&format!("{}/", target)));
    if is_container {
        if let Some(template) = &entry.template {
            templates.push((
                TemplateScope::Prefix(format!("{}/", target)),
                template.clone(),
            ));
        }
        return Ok(NavTarget::Container);
    }

    Err(BuildError::UnresolvedLink {
        label: entry.label.clone(),
        target: target.to_string(),
    })
}

/// Resolves a declared reference to a content item, with or without the
/// source extension.
fn resolve_content_ref<'a>(content: &'a ContentSet, target: &str) -> Option<&'a ContentItem> {
    if let Some(item) = content.get(target) {
        return Some(item);
    }
    content.iter().find(|item| strip_extension(&item.rel_path) == target)
}

/// The explicit `index.*` item of a section, when present. The explicit file
/// is authoritative; there is no implicit default.
fn find_section_index<'a>(content: &'a ContentSet, section: &str) -> Option<&'a ContentItem> {
    content.iter().find(|item| {
        item.rel_dir() == section
            && Path::new(&item.rel_path).file_stem() == Some(std::ffi::OsStr::new("index"))
    })
}

fn strip_extension(rel_path: &str) -> &str {
    match rel_path.rfind('.') {
        Some(idx) if !rel_path[idx + 1..].contains('/') => &rel_path[..idx],
        _ => rel_path,
    }
}

/// Number of leading path segments two paths share.
fn common_prefix_segments(a: &str, b: &str) -> usize {
    a.split('/')
        .zip(b.split('/'))
        .take_while(|(x, y)| x == y)
        .count()
}

/// Determines the active node for a page: the internal target sharing the
/// longest path prefix with the page's output path, ties broken by the most
/// specific (longest) target. Pure function of its arguments; repeated calls
/// return the same node.
pub fn active_node<'a>(tree: &'a NavigationTree, page_path: &str) -> Option<&'a NavigationNode> {
    let mut best: Option<(usize, usize, &NavigationNode)> = None;

    fn visit<'a>(
        node: &'a NavigationNode,
        page_path: &str,
        best: &mut Option<(usize, usize, &'a NavigationNode)>,
    ) {
        if let NavTarget::Page(target) = &node.target {
            let shared = common_prefix_segments(page_path, target);
            if shared > 0 {
                let specificity = target.len();
                let better = match best {
                    None => true,
                    Some((s, len, _)) => shared > *s || (shared == *s && specificity > *len),
                };
                if better {
                    *best = Some((shared, specificity, node));
                }
            }
        }
        for child in &node.children {
            visit(child, page_path, best);
        }
    }

    for root in &tree.roots {
        visit(root, page_path, &mut best);
    }
    best.map(|(_, _, node)| node)
}

/// Ancestor chain from a root down to the active node, inclusive. Empty when
/// no node is active for the page.
pub fn active_trail<'a>(tree: &'a NavigationTree, page_path: &str) -> Vec<&'a NavigationNode> {
    let Some(active) = active_node(tree, page_path) else {
        return Vec::new();
    };

    fn descend<'a>(
        node: &'a NavigationNode,
        active: &NavigationNode,
        trail: &mut Vec<&'a NavigationNode>,
    ) -> bool {
        trail.push(node);
        if std::ptr::eq(node, active) {
            return true;
        }
        for child in &node.children {
            if descend(child, active, trail) {
                return true;
            }
        }
        trail.pop();
        false
    }

    let mut trail = Vec::new();
    for root in &tree.roots {
        if descend(root, active, &mut trail) {
            break;
        }
    }
    trail
}

/// Serializable navigation snapshot for one page, with hrefs rewritten
/// relative to that page and active state resolved. Derived per render call
/// so the shared tree never carries per-page state.
#[derive(Debug, Serialize)]
pub struct NavView {
    pub label: String,
    pub href: Option<String>,
    pub external: bool,
    pub active: bool,
    pub in_trail: bool,
    pub children: Vec<NavView>,
}

/// One breadcrumb in the ancestor chain of the active node.
#[derive(Debug, Serialize)]
pub struct Crumb {
    pub label: String,
    pub href: Option<String>,
}

/// Rewrites an output path as an href relative to the page it appears on.
pub fn relative_href(from_page: &str, to_target: &str) -> String {
    let base = match from_page.rfind('/') {
        Some(idx) => &from_page[..idx],
        None => "",
    };
    match pathdiff::diff_paths(Path::new(to_target), Path::new(base)) {
        Some(diff) => crate::matching::normalize_path(&diff),
        None => to_target.to_string(),
    }
}

/// Builds the per-page navigation view.
pub fn page_nav(tree: &NavigationTree, page_path: &str) -> Vec<NavView> {
    let active = active_node(tree, page_path);
    let trail = active_trail(tree, page_path);

    fn view(
        node: &NavigationNode,
        page_path: &str,
        active: Option<&NavigationNode>,
        trail: &[&NavigationNode],
    ) -> NavView {
        let (href, external) = match &node.target {
            NavTarget::Page(target) => (Some(relative_href(page_path, target)), false),
            NavTarget::External(url) => (Some(url.clone()), true),
            NavTarget::Container => (None, false),
        };
        NavView {
            label: node.label.clone(),
            href,
            external,
            active: active.is_some_and(|a| std::ptr::eq(node, a)),
            in_trail: trail.iter().any(|n| std::ptr::eq(node, *n)),
            children: node
                .children
                .iter()
                .map(|c| view(c, page_path, active, trail))
                .collect(),
        }
    }

    tree.roots
        .iter()
        .map(|root| view(root, page_path, active, &trail))
        .collect()
}

/// Builds the breadcrumb list for a page from the active trail.
pub fn breadcrumbs(tree: &NavigationTree, page_path: &str) -> Vec<Crumb> {
    active_trail(tree, page_path)
        .iter()
        .map(|node| Crumb {
            label: node.label.clone(),
            href: match &node.target {
                NavTarget::Page(target) => Some(relative_href(page_path, target)),
                NavTarget::External(url) => Some(url.clone()),
                NavTarget::Container => None,
            },
        })
        .collect()
}
