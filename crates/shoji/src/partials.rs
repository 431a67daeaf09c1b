//! Partial registration and directory loading.

use std::path::Path;
use std::sync::OnceLock;

use handlebars::Handlebars;
use regex::Regex;
use tokio::fs;
use tracing::debug;

use shoji_common_fs::path as fspath;

use crate::engine::Engine;
use crate::error::{EngineError, Result};

fn partial_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches `{{> name}}`, `{{#> name}}` and whitespace-control variants.
    RE.get_or_init(|| {
        Regex::new(r"\{\{~?#?>\s*([A-Za-z0-9_$./-]+)").expect("valid partial ref regex")
    })
}

/// Partial names referenced by `source`.
pub(crate) fn referenced_partials(source: &str) -> Vec<String> {
    partial_ref_re()
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .collect()
}

/// Register an empty partial for every referenced name that is not yet
/// known, so unresolved references render as empty output instead of
/// failing. Insert-if-absent: a real registration, before or after, wins.
pub(crate) fn backfill_missing(registry: &mut Handlebars<'static>, source: &str) -> Result<()> {
    for name in referenced_partials(source) {
        if !registry.has_template(&name) {
            registry
                .register_partial(&name, "")
                .map_err(|e| EngineError::Compile {
                    file: name.clone(),
                    source: Box::new(e),
                })?;
            debug!(name = %name, "backfilled empty partial");
        }
    }
    Ok(())
}

/// A partial found while scanning a directory.
pub(crate) struct PartialFile {
    /// Registered name: relative path minus the extension.
    pub name: String,
    /// Template source.
    pub source: String,
    /// Display path for error annotation.
    pub file: String,
}

/// Collect every `*.{extname}` file under `dir`, recursively. A missing
/// directory yields no partials rather than an error.
pub(crate) async fn collect_dir(dir: &Path, extname: &str) -> Result<Vec<PartialFile>> {
    let mut found = Vec::new();

    if fs::metadata(dir).await.is_err() {
        debug!(dir = %dir.display(), "partial directory missing, skipped");
        return Ok(found);
    }

    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                stack.push(path);
            } else if path.extension().map(|e| e == extname).unwrap_or(false) {
                if let Some(rel) = fspath::relative_to(&path, dir) {
                    let name = rel
                        .with_extension("")
                        .to_string_lossy()
                        .replace('\\', "/");
                    let file = rel.to_string_lossy().replace('\\', "/");
                    let source =
                        fs::read_to_string(&path)
                            .await
                            .map_err(|e| EngineError::Read {
                                file: file.clone(),
                                source: e,
                            })?;
                    found.push(PartialFile { name, source, file });
                }
            }
        }
    }

    Ok(found)
}

impl Engine {
    /// Load the configured partial directories, once per engine instance.
    /// A failed load is retried on the next render rather than being
    /// cached as permanent.
    pub(crate) async fn ensure_partials(&self) -> Result<()> {
        self.partials_loaded
            .get_or_try_init(|| async {
                let mut files = Vec::new();
                for dir in &self.config.partials_dir {
                    files.extend(collect_dir(dir, &self.config.extname).await?);
                }

                let mut registry = self.registry.write().unwrap();
                for partial in &files {
                    registry
                        .register_partial(&partial.name, &partial.source)
                        .map_err(|e| EngineError::Compile {
                            file: partial.file.clone(),
                            source: Box::new(e),
                        })?;
                    debug!(name = %partial.name, "registered partial");
                }
                // Second pass: partials may reference partials that exist
                // nowhere on disk.
                for partial in &files {
                    backfill_missing(&mut registry, &partial.source)?;
                }
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_partial_references() {
        let source = "<html>{{> header}}{{#> wrapper}}x{{/wrapper}}{{~> sub/item }}</html>";
        assert_eq!(
            referenced_partials(source),
            vec!["header", "wrapper", "sub/item"]
        );
    }

    #[test]
    fn ignores_comments_and_plain_expressions() {
        assert!(referenced_partials("{{! comment}} {{value}} {{#if x}}{{/if}}").is_empty());
    }

    #[test]
    fn backfill_does_not_clobber_registered_partials() {
        let mut registry = Handlebars::new();
        registry.register_partial("header", "<h1>real</h1>").unwrap();

        backfill_missing(&mut registry, "{{> header}}{{> ghost}}").unwrap();

        let html = registry
            .render_template("{{> header}}|{{> ghost}}", &serde_json::json!({}))
            .unwrap();
        assert_eq!(html, "<h1>real</h1>|");
    }
}
