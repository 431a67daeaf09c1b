//! Layout resolution.
//!
//! A layout reference comes from the render options, from a `{{!< name}}`
//! declaration at the top of a template, or from the engine's default
//! layout. References are plain names with optional directory segments
//! (`sub/child`) and optional extension.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use shoji_common_fs::path as fspath;

use crate::engine::EngineConfig;

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{!<\s+([A-Za-z0-9_$./-]+)\s*\}\}").expect("valid declaration regex")
    })
}

/// Layout name declared in a template source via `{{!< name}}`, if any.
pub(crate) fn declared_layout(source: &str) -> Option<String> {
    declaration_re()
        .captures(source)
        .map(|c| c[1].to_string())
}

/// Resolve a layout reference to a concrete template path.
///
/// References starting with `.` resolve against the directory containing
/// `template_path`; all others resolve against the configured layouts
/// directory when present, else against the views directory. When neither
/// is configured the template's own directory anchors the lookup. The
/// engine extension is appended to references without one, and the result
/// is normalized lexically.
pub(crate) fn resolve(
    template_path: &Path,
    name: &str,
    config: &EngineConfig,
    views: Option<&Path>,
) -> PathBuf {
    let template_dir = || {
        template_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    };

    let base = if name.starts_with('.') {
        template_dir()
    } else if let Some(dir) = &config.layouts_dir {
        dir.clone()
    } else if let Some(views) = views {
        views.to_path_buf()
    } else {
        template_dir()
    };

    fspath::normalize(fspath::ensure_extension(base.join(name), &config.extname))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn dot_prefix_is_template_relative() {
        let resolved = resolve(
            Path::new("/srv/views/sub/sub.hbs"),
            "./relativeLayout",
            &config(),
            Some(Path::new("/srv/views")),
        );
        assert_eq!(resolved, PathBuf::from("/srv/views/sub/relativeLayout.hbs"));
    }

    #[test]
    fn layouts_dir_anchors_bare_names() {
        let config = config().with_layouts_dir("/srv/views/layouts");
        let resolved = resolve(
            Path::new("/srv/views/sub/sub.hbs"),
            "default",
            &config,
            Some(Path::new("/srv/views")),
        );
        assert_eq!(resolved, PathBuf::from("/srv/views/layouts/default.hbs"));
    }

    #[test]
    fn nested_names_under_layouts_dir() {
        let config = config().with_layouts_dir("/srv/views/layouts");
        let resolved = resolve(
            Path::new("/srv/views/page.hbs"),
            "sub/child",
            &config,
            None,
        );
        assert_eq!(resolved, PathBuf::from("/srv/views/layouts/sub/child.hbs"));
    }

    #[test]
    fn views_dir_is_the_fallback_anchor() {
        let resolved = resolve(
            Path::new("/srv/views/sub/sub.hbs"),
            "layouts/sub/child",
            &config(),
            Some(Path::new("/srv/views")),
        );
        assert_eq!(resolved, PathBuf::from("/srv/views/layouts/sub/child.hbs"));
    }

    #[test]
    fn explicit_extension_is_kept() {
        let resolved = resolve(
            Path::new("/srv/views/page.hbs"),
            "wrapper.html",
            &config(),
            Some(Path::new("/srv/views")),
        );
        assert_eq!(resolved, PathBuf::from("/srv/views/wrapper.html"));
    }

    #[test]
    fn declarations_are_scanned() {
        assert_eq!(
            declared_layout("{{!< layouts/default}}\n<p>body</p>"),
            Some("layouts/default".to_string())
        );
        assert_eq!(declared_layout("{{! a plain comment }}"), None);
        assert_eq!(declared_layout("no declaration here"), None);
    }
}
