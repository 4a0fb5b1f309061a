//! Error types
//!
//! Most binding failures are deliberately silent (stale observers, missing
//! parent paths, values already present); see the binding module docs. The
//! errors here cover malformed input that would otherwise write garbage.

use std::path::PathBuf;
use thiserror::Error;

/// A write payload did not fit the linked observers/paths
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A per-target value list has the wrong length
    #[error("expected {expected} values for the linked targets, got {found}")]
    ShapeMismatch { expected: usize, found: usize },

    /// One observer is linked to several paths, so the value must be an array
    #[error("binding links one observer to {paths} paths and needs an array value")]
    NotAnArray { paths: usize },
}

/// Failure loading [`Settings`](crate::config::Settings)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
