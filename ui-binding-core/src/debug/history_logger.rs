//! History logging with pattern-based filtering and in-memory storage
//!
//! Subscribes to a [`History`] and logs every add, undo and redo. Action names
//! can be filtered with glob patterns; accepted entries go to `tracing` and,
//! optionally, into a ring buffer for display in an inspector panel.
//!
//! # Example
//!
//! ```
//! use ui_binding_core::debug::{HistoryLogConfig, HistoryLogger, HistoryLoggerConfig};
//! use ui_binding_core::{History, HistoryAction};
//!
//! let history = History::default();
//! let logger = HistoryLogger::with_log(
//!     &history,
//!     HistoryLogConfig::new(50, HistoryLoggerConfig::new(None, Some("*(drag)"))),
//! );
//!
//! history.add(HistoryAction::new("entity.name", || {}, || {}));
//! history.add(HistoryAction::new("entity.x (drag)", || {}, || {}));
//! history.undo();
//!
//! let log = logger.log().unwrap();
//! let names: Vec<String> = log.borrow().entries().map(|e| e.name.clone()).collect();
//! assert_eq!(names, vec!["entity.name"]);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use crate::events::EventHandle;
use crate::history::{History, HistoryEvent};

/// Glob filter over history action names.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// # Examples
///
/// - `entity.*` matches entity.name, entity.position.x, etc.
/// - `*(drag)` matches every continuous drag action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLoggerConfig {
    /// If non-empty, only log actions matching these patterns
    pub include_patterns: Vec<String>,
    /// Exclude actions matching these patterns (applied after include)
    pub exclude_patterns: Vec<String>,
}

impl HistoryLoggerConfig {
    /// Create a config from comma-separated pattern strings
    ///
    /// ```
    /// use ui_binding_core::debug::HistoryLoggerConfig;
    ///
    /// let config = HistoryLoggerConfig::new(Some("entity.*,scene"), Some("entity.tmp*"));
    /// assert!(config.should_log("entity.name"));
    /// assert!(config.should_log("scene"));
    /// assert!(!config.should_log("entity.tmp.x"));
    /// assert!(!config.should_log("asset.name"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Check if an action name passes the include/exclude patterns
    pub fn should_log(&self, name: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| glob_match(p, name))
        {
            return false;
        }
        !self.exclude_patterns.iter().any(|p| glob_match(p, name))
    }
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// What happened to a history action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLogKind {
    Added,
    Combined,
    Undone,
    Redone,
}

impl fmt::Display for HistoryLogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HistoryLogKind::Added => "add",
            HistoryLogKind::Combined => "combine",
            HistoryLogKind::Undone => "undo",
            HistoryLogKind::Redone => "redo",
        })
    }
}

impl From<&HistoryEvent> for HistoryLogKind {
    fn from(event: &HistoryEvent) -> Self {
        match event {
            HistoryEvent::Added { combined: false, .. } => HistoryLogKind::Added,
            HistoryEvent::Added { combined: true, .. } => HistoryLogKind::Combined,
            HistoryEvent::Undone { .. } => HistoryLogKind::Undone,
            HistoryEvent::Redone { .. } => HistoryLogKind::Redone,
        }
    }
}

/// An entry in the history log
#[derive(Debug, Clone)]
pub struct HistoryLogEntry {
    pub kind: HistoryLogKind,
    /// History action name
    pub name: String,
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
}

impl HistoryLogEntry {
    pub fn new(kind: HistoryLogKind, name: String, sequence: u64) -> Self {
        Self {
            kind,
            name,
            timestamp: Instant::now(),
            sequence,
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the history log ring buffer
#[derive(Debug, Clone)]
pub struct HistoryLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    pub filter: HistoryLoggerConfig,
}

impl Default for HistoryLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: HistoryLoggerConfig::default(),
        }
    }
}

impl HistoryLogConfig {
    pub fn new(capacity: usize, filter: HistoryLoggerConfig) -> Self {
        Self { capacity, filter }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }
}

/// In-memory ring buffer of recent history activity
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryLogEntry>,
    config: HistoryLogConfig,
    next_sequence: u64,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(HistoryLogConfig::default())
    }
}

impl HistoryLog {
    pub fn new(config: HistoryLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity.min(1024)),
            config,
            next_sequence: 0,
        }
    }

    /// Log an event (if it passes the filter)
    ///
    /// Returns the entry if it was logged, None if filtered out.
    pub fn log(&mut self, event: &HistoryEvent) -> Option<&HistoryLogEntry> {
        let name = event.action_name();
        if !self.config.filter.should_log(name) || self.config.capacity == 0 {
            return None;
        }

        let entry = HistoryLogEntry::new(event.into(), name.to_string(), self.next_sequence);
        self.next_sequence += 1;

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.entries.back()
    }

    /// All entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryLogEntry> {
        self.entries.iter()
    }

    /// The most recent N entries, newest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &HistoryLogEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &HistoryLogConfig {
        &self.config
    }
}

/// Logs the activity of one [`History`]
///
/// Supports two modes:
/// - **Tracing only**: logs via `tracing::debug!()`
/// - **With storage**: also keeps a [`HistoryLog`] ring buffer
///
/// Logging stops when [`detach`](Self::detach) is called or the logger drops.
pub struct HistoryLogger {
    log: Option<Rc<RefCell<HistoryLog>>>,
    handles: Vec<EventHandle>,
}

impl fmt::Debug for HistoryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryLogger")
            .field("storing", &self.log.is_some())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl HistoryLogger {
    /// Log to tracing only
    pub fn new(history: &History, config: HistoryLoggerConfig) -> Self {
        Self::attach(history, Rc::new(config), None)
    }

    /// Log to tracing and keep entries in memory
    pub fn with_log(history: &History, config: HistoryLogConfig) -> Self {
        let filter = Rc::new(config.filter.clone());
        let log = Rc::new(RefCell::new(HistoryLog::new(config)));
        Self::attach(history, filter, Some(log))
    }

    fn attach(
        history: &History,
        filter: Rc<HistoryLoggerConfig>,
        log: Option<Rc<RefCell<HistoryLog>>>,
    ) -> Self {
        let handles = ["add", "undo", "redo"]
            .into_iter()
            .map(|name| {
                let filter = Rc::clone(&filter);
                let log = log.clone();
                history.on(name, move |event| {
                    let action = event.action_name();
                    if filter.should_log(action) {
                        tracing::debug!(action = %action, kind = %HistoryLogKind::from(event), "history");
                    }
                    if let Some(log) = &log {
                        log.borrow_mut().log(event);
                    }
                })
            })
            .collect();

        Self { log, handles }
    }

    /// The in-memory log (if storage is enabled)
    pub fn log(&self) -> Option<&Rc<RefCell<HistoryLog>>> {
        self.log.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.handles.iter().any(EventHandle::is_bound)
    }

    /// Stop logging
    pub fn detach(&mut self) {
        for handle in &mut self.handles {
            handle.unbind();
        }
    }
}

impl Drop for HistoryLogger {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        match pattern.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == text[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    backtrack = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}
