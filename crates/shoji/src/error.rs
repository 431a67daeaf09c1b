//! Error types for the Shoji view engine.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while loading or rendering templates, partials, and
/// layouts.
///
/// File-scoped variants carry the offending file as a bracketed relative
/// path (for example `[front/error.hbs]` or `[layouts/default.hbs]`), so
/// failures in multi-file compositions are traceable from the message
/// alone. Paths are made relative to the views directory when the file
/// lives under it, otherwise the basename is used.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A template, partial, or layout file could not be read.
    #[error("[{file}] {source}")]
    Read {
        /// Display path of the failing file.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A template, partial, or layout failed to compile.
    #[error("[{file}] {source}")]
    Compile {
        /// Display path (or registered name) of the failing source.
        file: String,
        /// Underlying compile error.
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    /// Execution of a compiled template failed.
    #[error("[{file}] {source}")]
    Render {
        /// Display path of the file being executed.
        file: String,
        /// Underlying render error.
        #[source]
        source: Box<handlebars::RenderError>,
    },

    /// Non-template I/O failure, e.g. while scanning a partial directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
