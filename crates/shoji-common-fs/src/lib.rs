//! File system path utilities for Shoji.
//!
//! Everything here is lexical: paths are resolved without touching the
//! filesystem, so results are deterministic regardless of what exists on
//! disk.

pub mod path;

pub use path::{display_name, ensure_extension, normalize, relative_to};
