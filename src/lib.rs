//! Sitepress
//!
//! A minimal static site generator: discovers Markdown content, builds a
//! declarative navigation model, renders pages through templates, and emits
//! a mirrored HTML tree.

pub mod builder;
pub mod config;
pub mod content;
pub mod emit;
pub mod error;
pub mod matching;
pub mod navigation;
pub mod render;

pub use builder::{BuildStats, SiteBuilder};
pub use config::{NavEntry, SiteConfig};
pub use content::{ContentItem, ContentSet};
pub use error::{BuildError, BuildWarning, MetadataParseError};
pub use navigation::{NavTarget, NavigationNode, NavigationTree};
pub use render::{RenderedPage, Renderer};
