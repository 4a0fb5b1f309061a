//! Undo/redo stack of named actions
//!
//! Each [`HistoryAction`] pairs an `undo` and a `redo` closure. Actions are
//! pushed *after* their effect has already been applied; `redo` is only called
//! when stepping forward again.
//!
//! ```text
//! add(a) add(b) add(c)      [a, b, c]   current = c
//! undo() undo()             [a, b, c]   current = a   (b, c redoable)
//! add(d)                    [a, d]      current = d   (redo tail dropped)
//! ```
//!
//! # Combining
//!
//! An action added with `combine = true` whose name equals the current
//! action's name does not create a new entry: it replaces the current action's
//! `redo` and keeps the original `undo`. A continuous slider drag therefore
//! undoes back to the value before the drag started.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::config::HistoryConfig;
use crate::events::{EventHandle, Events};

/// One undoable step
#[derive(Clone)]
pub struct HistoryAction {
    /// Label shown in undo/redo UI, also the key for combining
    pub name: String,
    /// Reverts the action's effect
    pub undo: Rc<dyn Fn()>,
    /// Re-applies the action's effect
    pub redo: Rc<dyn Fn()>,
    /// Merge into the current action if it has the same name
    pub combine: bool,
}

impl fmt::Debug for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryAction")
            .field("name", &self.name)
            .field("combine", &self.combine)
            .finish_non_exhaustive()
    }
}

impl HistoryAction {
    pub fn new(
        name: impl Into<String>,
        undo: impl Fn() + 'static,
        redo: impl Fn() + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            undo: Rc::new(undo),
            redo: Rc::new(redo),
            combine: false,
        }
    }

    /// Set whether this action may merge into the previous one
    pub fn combine(mut self, combine: bool) -> Self {
        self.combine = combine;
        self
    }
}

/// Notifications emitted by [`History`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// An action was added (or combined into the current one)
    Added { name: String, combined: bool },
    /// An action was undone
    Undone { name: String },
    /// An action was redone
    Redone { name: String },
}

impl HistoryEvent {
    /// Event name used when emitting
    pub fn event_name(&self) -> &'static str {
        match self {
            HistoryEvent::Added { .. } => "add",
            HistoryEvent::Undone { .. } => "undo",
            HistoryEvent::Redone { .. } => "redo",
        }
    }

    /// Name of the action concerned
    pub fn action_name(&self) -> &str {
        match self {
            HistoryEvent::Added { name, .. }
            | HistoryEvent::Undone { name }
            | HistoryEvent::Redone { name } => name,
        }
    }
}

struct HistoryInner {
    actions: VecDeque<HistoryAction>,
    /// Index of the action the next `undo` reverts
    current: Option<usize>,
    config: HistoryConfig,
    executing: bool,
}

impl HistoryInner {
    fn can_redo(&self) -> bool {
        let next = self.current.map_or(0, |i| i + 1);
        next < self.actions.len()
    }
}

/// Shared undo/redo stack. Clones refer to the same stack.
#[derive(Clone)]
pub struct History {
    inner: Rc<RefCell<HistoryInner>>,
    events: Events<HistoryEvent>,
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("History")
            .field("len", &inner.actions.len())
            .field("current", &inner.current)
            .field("enabled", &inner.config.enabled)
            .field("executing", &inner.executing)
            .finish()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HistoryInner {
                actions: VecDeque::new(),
                current: None,
                config,
                executing: false,
            })),
            events: Events::new(),
        }
    }

    /// Record an action whose effect has already been applied.
    ///
    /// Returns `false` if the action was ignored: history disabled, empty
    /// name, or an undo/redo closure is currently running.
    pub fn add(&self, action: HistoryAction) -> bool {
        let combined = {
            let mut inner = self.inner.borrow_mut();
            if !inner.config.enabled || action.name.is_empty() {
                return false;
            }
            if inner.executing {
                tracing::trace!(action = %action.name, "History add ignored during undo/redo");
                return false;
            }

            // Adding after undo starts a new branch
            let keep = inner.current.map_or(0, |i| i + 1);
            inner.actions.truncate(keep);

            let combined = match (action.combine, inner.current) {
                (true, Some(idx)) if inner.actions[idx].name == action.name => {
                    inner.actions[idx].redo = Rc::clone(&action.redo);
                    true
                }
                _ => {
                    inner.actions.push_back(action.clone());
                    inner.current = Some(inner.actions.len() - 1);
                    false
                }
            };

            while inner.actions.len() > inner.config.max_depth.max(1) {
                inner.actions.pop_front();
                inner.current = inner.current.and_then(|i| i.checked_sub(1));
            }
            combined
        };

        tracing::debug!(action = %action.name, combined, "History action added");
        self.events.emit(
            "add",
            &HistoryEvent::Added {
                name: action.name,
                combined,
            },
        );
        true
    }

    /// Undo the current action. Returns `false` if there was nothing to undo.
    pub fn undo(&self) -> bool {
        let (name, undo) = {
            let mut inner = self.inner.borrow_mut();
            let Some(idx) = inner.current else {
                return false;
            };
            if inner.executing {
                return false;
            }
            inner.executing = true;
            let action = &inner.actions[idx];
            (action.name.clone(), Rc::clone(&action.undo))
        };

        undo();

        {
            let mut inner = self.inner.borrow_mut();
            inner.executing = false;
            inner.current = inner.current.and_then(|i| i.checked_sub(1));
        }

        tracing::debug!(action = %name, "History undo");
        self.events.emit("undo", &HistoryEvent::Undone { name });
        true
    }

    /// Redo the next action. Returns `false` if there was nothing to redo.
    pub fn redo(&self) -> bool {
        let (name, redo) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.can_redo() || inner.executing {
                return false;
            }
            let idx = inner.current.map_or(0, |i| i + 1);
            inner.current = Some(idx);
            inner.executing = true;
            let action = &inner.actions[idx];
            (action.name.clone(), Rc::clone(&action.redo))
        };

        redo();

        self.inner.borrow_mut().executing = false;

        tracing::debug!(action = %name, "History redo");
        self.events.emit("redo", &HistoryEvent::Redone { name });
        true
    }

    pub fn can_undo(&self) -> bool {
        self.inner.borrow().current.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.inner.borrow().can_redo()
    }

    /// Number of stored actions (undoable and redoable)
    pub fn len(&self) -> usize {
        self.inner.borrow().actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().actions.is_empty()
    }

    /// Name of the action the next `undo` would revert
    pub fn current_name(&self) -> Option<String> {
        let inner = self.inner.borrow();
        inner.current.map(|i| inner.actions[i].name.clone())
    }

    /// Names of all stored actions, oldest first
    pub fn names(&self) -> Vec<String> {
        self.inner
            .borrow()
            .actions
            .iter()
            .map(|a| a.name.clone())
            .collect()
    }

    /// Drop every stored action
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.actions.clear();
        inner.current = None;
    }

    pub fn enabled(&self) -> bool {
        self.inner.borrow().config.enabled
    }

    /// Enable or disable recording. Disabled history ignores `add`.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().config.enabled = enabled;
    }

    /// Whether an undo or redo closure is running right now
    pub fn is_executing(&self) -> bool {
        self.inner.borrow().executing
    }

    pub fn config(&self) -> HistoryConfig {
        self.inner.borrow().config.clone()
    }

    /// Subscribe to `"add"`, `"undo"` or `"redo"` notifications
    pub fn on(&self, name: &str, handler: impl Fn(&HistoryEvent) + 'static) -> EventHandle {
        self.events.on(name, handler)
    }

    pub fn events(&self) -> &Events<HistoryEvent> {
        &self.events
    }
}
