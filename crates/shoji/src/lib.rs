//! Shoji: a Handlebars view engine for web servers.
//!
//! This crate connects the [`handlebars`] templating crate to a server's
//! rendering contract and adds the pieces a view layer needs:
//!
//! - **Layouts**: a rendered body is wrapped by a layout chosen through
//!   the render options, a `{{!< name}}` declaration in the template, or
//!   an engine-wide default. References resolve relative to the template
//!   (`./name`), a configured layouts directory, or the views directory,
//!   and may point into subfolders (`sub/child`).
//! - **Partials**: registered by name or auto-loaded from one or more
//!   partial directories. Empty and comment-only partials are valid, and
//!   referencing an unregistered partial renders as empty output.
//! - **Async helpers**: helpers that produce their result through a
//!   future. The renderer joins every pending result before returning,
//!   so final output never contains internal placeholders.
//! - **Caching**: compiled templates and layouts are memoized per
//!   resolved path when the caller enables it.
//!
//! ```rust,ignore
//! use serde_json::json;
//! use shoji::{Engine, EngineConfig, RenderOptions};
//!
//! let engine = Engine::new(
//!     EngineConfig::new()
//!         .with_layouts_dir("views/layouts")
//!         .with_partials_dir("views/partials"),
//! );
//!
//! let html = engine
//!     .render(
//!         "views/index.hbs",
//!         &RenderOptions::new()
//!             .with_cache(true)
//!             .with_layout("default")
//!             .with_views("views")
//!             .with_locals(json!({ "title": "Home" })),
//!     )
//!     .await?;
//! ```

pub mod engine;
pub mod error;
pub mod options;

mod helpers;
mod layout;
mod partials;
mod render;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, Result};
pub use options::{LayoutChoice, RenderOptions};

// Sync helper authors need the handlebars types in scope.
pub use handlebars;
