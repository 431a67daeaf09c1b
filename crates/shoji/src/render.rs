//! The render pipeline.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::fs;
use tracing::debug;

use shoji_common_fs::path as fspath;

use crate::engine::{Engine, TemplateMeta};
use crate::error::{EngineError, Result};
use crate::helpers::{self, PendingMap, PendingScope};
use crate::layout;
use crate::options::{LayoutChoice, RenderOptions};
use crate::partials;

impl Engine {
    /// Render the template at `template_path` with the given options.
    ///
    /// Reads and compiles the template (or reuses the cached compilation
    /// when `options.cache` is set), executes it against the locals, waits
    /// for any async helpers invoked along the way, and wraps the body in
    /// a layout when one applies. Errors carry the offending file as a
    /// bracketed relative path.
    pub async fn render(
        &self,
        template_path: impl AsRef<Path>,
        options: &RenderOptions,
    ) -> Result<String> {
        self.ensure_partials().await?;

        // This call's pending async-helper futures. A render that fails
        // drops the map, and with it whatever its helpers parked.
        let pending = PendingMap::default();

        let path = fspath::normalize(template_path.as_ref());
        let (body, meta) = self
            .render_file(&path, &options.locals, options, &pending)
            .await?;
        let body = helpers::resolve_pending(&pending, body).await;

        let first = match self.select_layout(&meta, options) {
            Some(name) => name,
            None => return Ok(body),
        };

        // Layouts may declare a parent layout of their own; follow the
        // chain with a cycle guard.
        let mut html = body;
        let mut next = Some((path, first));
        let mut seen = HashSet::new();
        while let Some((from, name)) = next {
            let layout_path = layout::resolve(&from, &name, &self.config, options.views_dir());
            if !seen.insert(layout_path.clone()) {
                break;
            }
            debug!(layout = %layout_path.display(), "wrapping with layout");

            let locals = with_body(&options.locals, html);
            let (rendered, layout_meta) = self
                .render_file(&layout_path, &locals, options, &pending)
                .await?;
            html = helpers::resolve_pending(&pending, rendered).await;
            next = layout_meta.declared_layout.map(|n| (layout_path, n));
        }

        Ok(html)
    }

    /// Layout selected for the template itself. Wrapping layouts only ever
    /// chain through their own `{{!< name}}` declarations.
    fn select_layout(&self, meta: &TemplateMeta, options: &RenderOptions) -> Option<String> {
        match &options.layout {
            LayoutChoice::Named(name) => Some(name.clone()),
            LayoutChoice::None => None,
            LayoutChoice::Auto => meta
                .declared_layout
                .clone()
                .or_else(|| self.config.default_layout.clone()),
        }
    }

    /// Read, compile (or reuse from cache), and execute one template file.
    async fn render_file(
        &self,
        path: &Path,
        locals: &Value,
        options: &RenderOptions,
        pending: &PendingMap,
    ) -> Result<(String, TemplateMeta)> {
        let file = fspath::display_name(path, options.views_dir());
        let key = path.to_string_lossy().into_owned();

        if options.cache {
            if let Some(meta) = self.cached_meta(path) {
                debug!(file = %file, "template cache hit");
                let registry = self.registry.read().unwrap();
                let html = {
                    let _scope = PendingScope::enter(Arc::clone(pending));
                    registry.render(&key, locals)
                }
                .map_err(|e| EngineError::Render {
                    file,
                    source: Box::new(e),
                })?;
                return Ok((html, meta));
            }
        }

        debug!(file = %file, cache = options.cache, "compiling template");
        let source = fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Read {
                file: file.clone(),
                source: e,
            })?;
        let meta = TemplateMeta {
            declared_layout: layout::declared_layout(&source),
        };

        {
            let mut registry = self.registry.write().unwrap();
            partials::backfill_missing(&mut registry, &source)?;
            if options.cache {
                registry
                    .register_template_string(&key, &source)
                    .map_err(|e| EngineError::Compile {
                        file: file.clone(),
                        source: Box::new(e),
                    })?;
            }
        }
        if options.cache {
            self.meta
                .write()
                .unwrap()
                .insert(path.to_path_buf(), meta.clone());
        }

        let registry = self.registry.read().unwrap();
        let html = {
            let _scope = PendingScope::enter(Arc::clone(pending));
            if options.cache {
                registry.render(&key, locals)
            } else {
                registry.render_template(&source, locals)
            }
        }
        .map_err(|e| EngineError::Render {
            file,
            source: Box::new(e),
        })?;

        Ok((html, meta))
    }
}

/// Clone `locals` with the rendered body injected under the `body` key.
/// Non-object locals are replaced by an object holding only the body.
fn with_body(locals: &Value, body: String) -> Value {
    let mut map = match locals {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    map.insert("body".to_string(), Value::String(body));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_injection_preserves_locals() {
        let locals = json!({ "title": "Home" });
        let merged = with_body(&locals, "<p>hi</p>".to_string());

        assert_eq!(merged["title"], "Home");
        assert_eq!(merged["body"], "<p>hi</p>");
        // The caller's locals stay untouched.
        assert!(locals.get("body").is_none());
    }

    #[test]
    fn body_injection_handles_non_object_locals() {
        let merged = with_body(&Value::Null, "x".to_string());
        assert_eq!(merged, json!({ "body": "x" }));
    }
}
