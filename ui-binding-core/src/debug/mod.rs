//! Debugging aids
//!
//! - [`HistoryLogger`]: logs undo/redo activity via `tracing`, optionally into
//!   an in-memory [`HistoryLog`]
//! - [`glob_match`]: the pattern matcher used by the log filter

pub mod history_logger;

pub use history_logger::{
    glob_match, HistoryLog, HistoryLogConfig, HistoryLogEntry, HistoryLogKind, HistoryLogger,
    HistoryLoggerConfig,
};
