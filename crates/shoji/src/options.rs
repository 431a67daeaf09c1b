//! Per-render options.

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Layout selection for a single render call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutChoice {
    /// Use the layout the template declares via `{{!< name}}`, falling
    /// back to the engine's default layout.
    #[default]
    Auto,
    /// Render the bare template without wrapping.
    None,
    /// Wrap the rendered body with the named layout.
    Named(String),
}

/// Options for a single render call.
///
/// The engine never mutates these: locals are cloned before the layout
/// pass injects the rendered body under the `body` key.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Memoize compiled templates and layouts keyed by resolved path.
    pub cache: bool,
    /// Layout selection.
    pub layout: LayoutChoice,
    /// Base views directory. Anchors no-prefix layout resolution and the
    /// relative paths reported in errors.
    pub views: Option<PathBuf>,
    /// Data passed to the template.
    pub locals: Value,
}

impl RenderOptions {
    /// Options with defaults: caching off, automatic layout selection,
    /// null locals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable compiled-template caching for this call.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Wrap the rendered body with the named layout.
    pub fn with_layout(mut self, name: impl Into<String>) -> Self {
        self.layout = LayoutChoice::Named(name.into());
        self
    }

    /// Explicitly disable layout wrapping for this call.
    pub fn no_layout(mut self) -> Self {
        self.layout = LayoutChoice::None;
        self
    }

    /// Set the base views directory.
    pub fn with_views(mut self, views: impl Into<PathBuf>) -> Self {
        self.views = Some(views.into());
        self
    }

    /// Set the data passed to the template.
    pub fn with_locals(mut self, locals: Value) -> Self {
        self.locals = locals;
        self
    }

    pub(crate) fn views_dir(&self) -> Option<&Path> {
        self.views.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_chain() {
        let options = RenderOptions::new()
            .with_cache(true)
            .with_layout("default")
            .with_views("/srv/views")
            .with_locals(json!({ "title": "Home" }));

        assert!(options.cache);
        assert_eq!(options.layout, LayoutChoice::Named("default".to_string()));
        assert_eq!(options.views, Some(PathBuf::from("/srv/views")));
        assert_eq!(options.locals["title"], "Home");
    }

    #[test]
    fn no_layout_overrides_auto() {
        let options = RenderOptions::new().no_layout();
        assert_eq!(options.layout, LayoutChoice::None);
    }
}
