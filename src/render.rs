//! Template rendering: one ContentItem + navigation model + site config in,
//! one RenderedPage out.
//!
//! Rendering a page is pure with respect to other pages. The renderer holds
//! only immutable state (template environment, syntax definitions, shared
//! references to the content set and navigation tree), so pages render in
//! any order, including in parallel.

use anyhow::{Context, Result};
use log::debug;
use minijinja::{context, Environment};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashSet;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::SiteConfig;
use crate::content::{ContentItem, ContentSet};
use crate::error::BuildWarning;
use crate::matching;
use crate::navigation::{self, NavigationTree};

/// Fallback page template, compiled into the binary.
const DEFAULT_TEMPLATE: &str = include_str!("../templates/default.html");

/// Output of rendering one content item. Write-once.
#[derive(Debug)]
pub struct RenderedPage {
    /// Root-relative output path.
    pub output_path: String,
    pub html: String,
    /// Broken inline cross-links found while rendering. Non-fatal: the page
    /// is still emitted.
    pub warnings: Vec<BuildWarning>,
}

/// Immutable rendering context shared across all pages of one run.
pub struct Renderer<'a> {
    config: &'a SiteConfig,
    content: &'a ContentSet,
    nav: &'a NavigationTree,
    env: Environment<'static>,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    highlight_theme: String,
}

impl<'a> Renderer<'a> {
    pub fn new(
        config: &'a SiteConfig,
        content: &'a ContentSet,
        nav: &'a NavigationTree,
    ) -> Result<Self> {
        let mut env = Environment::new();
        let mut loaded = HashSet::new();

        if let Some(dir) = &config.templates_dir {
            for entry in std::fs::read_dir(dir)
                .with_context(|| format!("Failed to read templates directory: {}", dir.display()))?
            {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "html") {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let source = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read template {}", path.display()))?;
                    debug!("Loaded template '{}'", name);
                    env.add_template_owned(name.clone(), source)?;
                    loaded.insert(name);
                }
            }
        }

        // The global default always exists: fall back to the built-in page
        // template unless the templates directory provides one.
        if !loaded.contains(&config.default_template) {
            env.add_template_owned(config.default_template.clone(), DEFAULT_TEMPLATE.to_string())?;
        }

        Ok(Self {
            config,
            content,
            nav,
            env,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            highlight_theme: "InspiredGitHub".to_string(),
        })
    }

    /// Template selection: page metadata > section declaration > global
    /// default. An explicit ordered fallback, not inheritance.
    pub fn template_for<'b>(&'b self, item: &'b ContentItem) -> &'b str {
        item.declared_template()
            .or_else(|| self.nav.section_template(item))
            .unwrap_or(&self.config.default_template)
    }

    /// Renders one content item to a page. Pure with respect to other pages.
    pub fn render_page(&self, item: &ContentItem) -> Result<RenderedPage> {
        let (body_html, warnings) = self.render_body(item);

        let template_name = self.template_for(item);
        let template = self.env.get_template(template_name).with_context(|| {
            format!(
                "Template '{}' for '{}' is not available",
                template_name, item.rel_path
            )
        })?;

        let nav_view = navigation::page_nav(self.nav, &item.output_path);
        let crumbs = navigation::breadcrumbs(self.nav, &item.output_path);

        let html = template
            .render(context! {
                site => context! { title => self.config.title.as_str() },
                page => context! {
                    title => item.title.as_str(),
                    path => item.output_path.as_str(),
                    metadata => minijinja::Value::from_serialize(&item.metadata),
                    content => minijinja::Value::from_safe_string(body_html),
                },
                nav => minijinja::Value::from_serialize(&nav_view),
                breadcrumbs => minijinja::Value::from_serialize(&crumbs),
            })
            .with_context(|| format!("Failed to render '{}'", item.rel_path))?;

        Ok(RenderedPage {
            output_path: item.output_path.clone(),
            html,
            warnings,
        })
    }

    /// Converts the Markdown body to HTML: code blocks become highlighted
    /// literal text, relative links between content items are rewritten to
    /// their resolved output paths.
    fn render_body(&self, item: &ContentItem) -> (String, Vec<BuildWarning>) {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut warnings = Vec::new();
        let mut events = Vec::new();
        let mut code_buf = String::new();
        let mut code_lang: Option<String> = None;
        let mut in_code = false;

        for event in Parser::new_ext(&item.body, options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code = true;
                    code_buf.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                            Some(lang.split_whitespace().next().unwrap_or("").to_string())
                        }
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code = false;
                    let html = self.highlight_code(&code_buf, code_lang.as_deref());
                    events.push(Event::Html(html.into()));
                }
                Event::Text(text) if in_code => code_buf.push_str(&text),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => {
                    let (dest, warning) = self.rewrite_href(item, &dest_url);
                    if let Some(warning) = warning {
                        warnings.push(warning);
                    }
                    events.push(Event::Start(Tag::Link {
                        link_type,
                        dest_url: dest.into(),
                        title,
                        id,
                    }));
                }
                other => events.push(other),
            }
        }

        let mut html = String::new();
        pulldown_cmark::html::push_html(&mut html, events.into_iter());
        (html, warnings)
    }

    /// Rewrites a relative reference to another content item into an href
    /// pointing at its output path. References to missing content yield a
    /// warning and keep the original href.
    fn rewrite_href(&self, item: &ContentItem, dest: &str) -> (String, Option<BuildWarning>) {
        if dest.contains("://")
            || dest.starts_with("mailto:")
            || dest.starts_with('#')
            || dest.starts_with('/')
        {
            return (dest.to_string(), None);
        }

        let (path, fragment) = match dest.split_once('#') {
            Some((p, f)) => (p, Some(f)),
            None => (dest, None),
        };

        // Only source references get rewritten; everything else (images,
        // hand-placed assets) passes through untouched.
        if !path.ends_with(".md") && !path.ends_with(".markdown") {
            return (dest.to_string(), None);
        }

        let resolved = matching::resolve_relative(item.rel_dir(), path)
            .and_then(|target| self.content.get(&target));

        match resolved {
            Some(target) => {
                let mut href = navigation::relative_href(&item.output_path, &target.output_path);
                if let Some(fragment) = fragment {
                    href.push('#');
                    href.push_str(fragment);
                }
                (href, None)
            }
            None => (
                dest.to_string(),
                Some(BuildWarning::broken_cross_link(&item.output_path, dest)),
            ),
        }
    }

    /// Highlights a code sample as literal text, falling back to an escaped
    /// plain block when the language is unknown or highlighting fails.
    /// Embedded code is never executed.
    fn highlight_code(&self, code: &str, language: Option<&str>) -> String {
        let theme = &self.theme_set.themes[&self.highlight_theme];

        let syntax = language
            .and_then(|lang| {
                self.syntax_set
                    .find_syntax_by_token(lang)
                    .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            })
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        match highlighted_html_for_string(code, &self.syntax_set, syntax, theme) {
            Ok(html) => html,
            Err(_) => {
                let escaped = html_escape::encode_text(code);
                format!("<pre><code>{}</code></pre>", escaped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_item;
    use crate::navigation::build_navigation;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn content_of(files: &[(&str, &str)]) -> ContentSet {
        let mut set = ContentSet::default();
        for (rel, raw) in files {
            set.insert(parse_item(PathBuf::from(rel), rel.to_string(), raw).unwrap())
                .unwrap();
        }
        set
    }

    fn site_config(title: &str) -> SiteConfig {
        SiteConfig {
            title: title.to_string(),
            ..SiteConfig::default()
        }
    }

    #[test]
    fn test_render_page_with_builtin_template() {
        let config = site_config("Lab Site");
        let content = content_of(&[("index.md", "---\ntitle: Welcome\n---\n\nHello *world*.")]);
        let nav = NavigationTree::default();
        let renderer = Renderer::new(&config, &content, &nav).unwrap();

        let page = renderer
            .render_page(content.get("index.md").unwrap())
            .unwrap();
        assert_eq!(page.output_path, "index.html");
        assert!(page.html.contains("Welcome — Lab Site"));
        assert!(page.html.contains("<em>world</em>"));
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn test_code_blocks_are_literal_highlighted_text() {
        let config = site_config("Lab Site");
        let content = content_of(&[(
            "post.md",
            "# Demo\n\n```python\nimport pandas as pd\nprint(pd.__version__)\n```\n",
        )]);
        let nav = NavigationTree::default();
        let renderer = Renderer::new(&config, &content, &nav).unwrap();

        let page = renderer.render_page(content.get("post.md").unwrap()).unwrap();
        assert!(page.html.contains("pandas"));
        assert!(page.html.contains("<pre"));
        // The sample is inert text, not an execution result
        assert!(!page.html.contains("0.25.3"));
    }

    #[test]
    fn test_cross_links_rewritten_to_output_paths() {
        let config = site_config("Lab Site");
        let content = content_of(&[
            ("about.md", "# About"),
            ("posts/one.md", "See [about](../about.md#team) for details."),
        ]);
        let nav = NavigationTree::default();
        let renderer = Renderer::new(&config, &content, &nav).unwrap();

        let page = renderer
            .render_page(content.get("posts/one.md").unwrap())
            .unwrap();
        assert!(page.html.contains(r#"href="../about.html#team""#));
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn test_broken_cross_link_warns_but_still_renders() {
        let config = site_config("Lab Site");
        let content = content_of(&[("post.md", "Broken [link](missing.md) here.")]);
        let nav = NavigationTree::default();
        let renderer = Renderer::new(&config, &content, &nav).unwrap();

        let page = renderer.render_page(content.get("post.md").unwrap()).unwrap();
        assert_eq!(page.warnings.len(), 1);
        assert!(page.warnings[0].message.contains("missing.md"));
        // Original href preserved
        assert!(page.html.contains(r#"href="missing.md""#));
    }

    #[test]
    fn test_external_and_asset_links_untouched() {
        let config = site_config("Lab Site");
        let content = content_of(&[(
            "post.md",
            "[ext](https://example.org/page.md) and [asset](data/table.csv)",
        )]);
        let nav = NavigationTree::default();
        let renderer = Renderer::new(&config, &content, &nav).unwrap();

        let page = renderer.render_page(content.get("post.md").unwrap()).unwrap();
        assert!(page.html.contains(r#"href="https://example.org/page.md""#));
        assert!(page.html.contains(r#"href="data/table.csv""#));
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn test_template_override_chain() {
        let tmp = TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("default.html"), "G|{{ page.title }}").unwrap();
        fs::write(templates.join("section.html"), "S|{{ page.title }}").unwrap();
        fs::write(templates.join("special.html"), "P|{{ page.title }}").unwrap();

        let mut config = site_config("Lab Site");
        config.templates_dir = Some(templates);
        config.nav = vec![crate::config::NavEntry {
            label: "Research".to_string(),
            target: Some("research".to_string()),
            template: Some("section.html".to_string()),
            children: Vec::new(),
        }];

        let content = content_of(&[
            ("research/index.md", "# Research"),
            ("research/grants.md", "# Grants"),
            (
                "research/special.md",
                "---\ntemplate: special.html\n---\n# Special",
            ),
            ("about.md", "# About"),
        ]);
        let nav = build_navigation(&config, &content).unwrap();
        let renderer = Renderer::new(&config, &content, &nav).unwrap();

        // Page declares nothing, section declares S: S wins over G
        let page = renderer
            .render_page(content.get("research/grants.md").unwrap())
            .unwrap();
        assert!(page.html.starts_with("S|"));

        // Page-level declaration beats the section
        let page = renderer
            .render_page(content.get("research/special.md").unwrap())
            .unwrap();
        assert!(page.html.starts_with("P|"));

        // Outside the section the global default applies
        let page = renderer.render_page(content.get("about.md").unwrap()).unwrap();
        assert!(page.html.starts_with("G|"));
    }

    #[test]
    fn test_rendering_is_pure_across_repeated_calls() {
        let config = site_config("Lab Site");
        let content = content_of(&[("index.md", "# Home\n\nStable output.")]);
        let nav = NavigationTree::default();
        let renderer = Renderer::new(&config, &content, &nav).unwrap();

        let item = content.get("index.md").unwrap();
        let first = renderer.render_page(item).unwrap().html;
        let second = renderer.render_page(item).unwrap().html;
        assert_eq!(first, second);
    }
}
