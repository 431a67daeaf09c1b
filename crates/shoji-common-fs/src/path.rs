//! Path manipulation utilities.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by resolving `.` and `..` without hitting the filesystem.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();

    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `..` above the root stays at the root.
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(Component::ParentDir),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        PathBuf::from(".")
    } else {
        parts.iter().map(|c| c.as_os_str()).collect()
    }
}

/// Make a path relative to a base path.
///
/// Both inputs are normalized first. Returns `None` when one path is
/// absolute and the other is not, or when the base contains unresolvable
/// `..` segments past the shared prefix.
pub fn relative_to(path: impl AsRef<Path>, base: impl AsRef<Path>) -> Option<PathBuf> {
    let path = normalize(path);
    let base = normalize(base);

    if path.is_absolute() != base.is_absolute() {
        return None;
    }

    let mut path_components = path.components().peekable();
    let mut base_components = base.components().peekable();

    // Skip the common prefix.
    while let (Some(p), Some(b)) = (path_components.peek(), base_components.peek()) {
        if p != b {
            break;
        }
        path_components.next();
        base_components.next();
    }

    let mut result = PathBuf::new();
    for component in base_components {
        match component {
            Component::Normal(_) => result.push(".."),
            Component::CurDir => {}
            _ => return None,
        }
    }
    for component in path_components {
        result.push(component.as_os_str());
    }

    if result.as_os_str().is_empty() {
        result.push(".");
    }
    Some(result)
}

/// Display path for diagnostics: relative to `root` when the path lives
/// under it, otherwise the basename.
pub fn display_name(path: impl AsRef<Path>, root: Option<&Path>) -> String {
    let path = path.as_ref();

    if let Some(root) = root {
        if let Some(rel) = relative_to(path, root) {
            let descends = !rel
                .components()
                .any(|c| matches!(c, Component::ParentDir));
            if descends {
                return rel.to_string_lossy().into_owned();
            }
        }
    }

    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Append `ext` to a path that has no extension; leave others untouched.
pub fn ensure_extension(path: impl Into<PathBuf>, ext: &str) -> PathBuf {
    let path = path.into();
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(ext)
    }
}
