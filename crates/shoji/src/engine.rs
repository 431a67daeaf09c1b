//! Engine factory, configuration, and registration surface.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, RwLock};

use handlebars::{Handlebars, HelperDef};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{EngineError, Result};
use crate::helpers::{AsyncHelperFn, AsyncHelperShim};
use crate::partials;

/// Engine-scoped configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Template file extension. Appended to layout references that carry
    /// none.
    pub extname: String,
    /// Base directory for layout lookup. When unset, layouts resolve
    /// against the views directory passed at render time.
    pub layouts_dir: Option<PathBuf>,
    /// Directories scanned recursively for partials, in order.
    pub partials_dir: Vec<PathBuf>,
    /// Layout applied when neither the render options nor the template
    /// name one.
    pub default_layout: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extname: "hbs".to_string(),
            layouts_dir: None,
            partials_dir: Vec::new(),
            default_layout: None,
        }
    }
}

impl EngineConfig {
    /// Configuration with defaults: `hbs` extension, no layout or partial
    /// directories, no default layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template file extension (without the leading dot).
    pub fn with_extname(mut self, extname: impl Into<String>) -> Self {
        self.extname = extname.into();
        self
    }

    /// Set the base directory for layout lookup.
    pub fn with_layouts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layouts_dir = Some(dir.into());
        self
    }

    /// Add a directory to scan for partials.
    pub fn with_partials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.partials_dir.push(dir.into());
        self
    }

    /// Set the layout used when no other selection applies.
    pub fn with_default_layout(mut self, name: impl Into<String>) -> Self {
        self.default_layout = Some(name.into());
        self
    }
}

/// Metadata tracked alongside a cached compiled template.
#[derive(Debug, Clone, Default)]
pub(crate) struct TemplateMeta {
    /// Layout the source declares via `{{!< name}}`.
    pub declared_layout: Option<String>,
}

/// An isolated view engine instance.
///
/// Each engine owns its handlebars registry (compiled templates, partials,
/// helpers) and its template metadata cache. Instances are `Send + Sync`;
/// any number of renders may run concurrently against one engine, each
/// with its own pending async-helper state.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) registry: RwLock<Handlebars<'static>>,
    pub(crate) meta: RwLock<HashMap<PathBuf, TemplateMeta>>,
    pub(crate) seq: Arc<AtomicU64>,
    pub(crate) partials_loaded: OnceCell<()>,
}

impl Engine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let mut registry = Handlebars::new();
        // Missing locals render as empty output, matching the usual view
        // engine contract.
        registry.set_strict_mode(false);

        Self {
            config,
            registry: RwLock::new(registry),
            meta: RwLock::new(HashMap::new()),
            seq: Arc::new(AtomicU64::new(0)),
            partials_loaded: OnceCell::new(),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a named partial.
    ///
    /// Empty and comment-only sources are valid and render as empty
    /// output. Re-registering a name replaces its previous source; the
    /// operation is safe to repeat across renders.
    pub fn register_partial(&self, name: &str, source: &str) -> Result<()> {
        let mut registry = self.registry.write().unwrap();
        registry
            .register_partial(name, source)
            .map_err(|e| EngineError::Compile {
                file: name.to_string(),
                source: Box::new(e),
            })?;
        // The partial may in turn reference partials nobody registers.
        partials::backfill_missing(&mut registry, source)
    }

    /// Register a synchronous helper on the underlying registry.
    pub fn register_helper(&self, name: &str, def: Box<dyn HelperDef + Send + Sync>) {
        self.registry.write().unwrap().register_helper(name, def);
    }

    /// Register an asynchronous helper.
    ///
    /// The helper receives its first parameter (or the current template
    /// data when called without one) and produces its output through a
    /// future. Rendering completes only after every invoked helper's
    /// future has resolved; its result replaces the internal placeholder
    /// the synchronous pass emitted.
    pub fn register_async_helper<F, Fut>(&self, name: &str, helper: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        use futures::FutureExt;
        let inner: AsyncHelperFn = Arc::new(move |value| helper(value).boxed());
        let shim = AsyncHelperShim::new(inner, Arc::clone(&self.seq));
        self.registry.write().unwrap().register_helper(name, Box::new(shim));
    }

    pub(crate) fn cached_meta(&self, path: &std::path::Path) -> Option<TemplateMeta> {
        self.meta.read().unwrap().get(path).cloned()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engines_are_isolated() {
        let a = Engine::new(EngineConfig::new());
        let b = Engine::new(EngineConfig::new());

        a.register_partial("shared", "from a").unwrap();

        assert!(a.registry.read().unwrap().has_template("shared"));
        assert!(!b.registry.read().unwrap().has_template("shared"));
    }

    #[test]
    fn empty_and_comment_partials_register() {
        let engine = Engine::default();
        engine.register_partial("empty", "").unwrap();
        engine.register_partial("comment", "{{! just a comment}}").unwrap();
        // Idempotent re-registration.
        engine.register_partial("empty", "").unwrap();
    }
}
