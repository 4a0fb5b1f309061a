//! Configuration for history stacks and bindings
//!
//! All settings have sensible defaults and can be loaded from JSON:
//!
//! ```
//! use ui_binding_core::config::Settings;
//!
//! let settings = Settings::from_json_str(r#"{
//!     "history": { "max_depth": 50 },
//!     "binding": { "history_prefix": "inspector: ", "history_combine": true }
//! }"#).unwrap();
//!
//! assert_eq!(settings.history.max_depth, 50);
//! assert!(settings.history.enabled);
//! assert!(settings.binding.history_combine);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Limits and switches for a [`History`](crate::History) stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of stored actions; the oldest is dropped beyond this
    pub max_depth: usize,
    /// Whether `add` records actions
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            enabled: true,
        }
    }
}

impl HistoryConfig {
    /// Configuration without a depth limit
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            enabled: true,
        }
    }
}

/// History naming options carried by every binding
///
/// The history action name for a write is
/// `history_prefix + (history_name or first path) + history_postfix`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingOptions {
    pub history_prefix: Option<String>,
    pub history_postfix: Option<String>,
    pub history_name: Option<String>,
    /// Merge consecutive actions with the same name (continuous drags)
    pub history_combine: bool,
}

impl BindingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.history_prefix = Some(prefix.into());
        self
    }

    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.history_postfix = Some(postfix.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.history_name = Some(name.into());
        self
    }

    pub fn combine(mut self, combine: bool) -> Self {
        self.history_combine = combine;
        self
    }

    /// Compose the history action name for a write to `paths`
    pub fn action_name(&self, paths: &[String]) -> String {
        let base = self
            .history_name
            .as_deref()
            .or_else(|| paths.first().map(String::as_str))
            .unwrap_or_default();
        format!(
            "{}{}{}",
            self.history_prefix.as_deref().unwrap_or_default(),
            base,
            self.history_postfix.as_deref().unwrap_or_default()
        )
    }
}

/// Root settings document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub history: HistoryConfig,
    pub binding: BindingOptions,
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded binding settings");
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
