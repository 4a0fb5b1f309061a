//! Observable, path-addressable data nodes
//!
//! An [`Observer`] owns a [`Value`] tree and emits an event for every mutation.
//! Events are named `"{path}:{kind}"` and additionally `"*:{kind}"`, where kind
//! is one of `set`, `unset`, `insert` and `remove`:
//!
//! ```
//! use ui_binding_core::{Observer, Value};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let entity = Observer::new();
//! let hits = Rc::new(Cell::new(0));
//! let h = Rc::clone(&hits);
//! let _handle = entity.on("position.x:set", move |_| h.set(h.get() + 1));
//!
//! entity.set("position.x", Value::from(4));
//! assert_eq!(entity.get("position.x"), Some(Value::from(4)));
//! assert_eq!(hits.get(), 1);
//! ```
//!
//! Observers can be superseded by a newer instance ([`Observer::supersede`]) or
//! destroyed. [`Observer::latest`] follows the redirection, so holders of old
//! handles always reach the live entity, or nothing.

use bitflags::bitflags;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::events::{EventHandle, Events};
use crate::history::{History, HistoryAction};
use crate::path;
use crate::value::Value;

bitflags! {
    /// Kinds of observer mutation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeKind: u8 {
        const SET = 1 << 0;
        const UNSET = 1 << 1;
        const INSERT = 1 << 2;
        const REMOVE = 1 << 3;
    }
}

impl ChangeKind {
    /// Event name suffix for a single kind (`"set"`, `"unset"`, ...)
    pub fn event_suffix(self) -> Option<&'static str> {
        match self {
            k if k == ChangeKind::SET => Some("set"),
            k if k == ChangeKind::UNSET => Some("unset"),
            k if k == ChangeKind::INSERT => Some("insert"),
            k if k == ChangeKind::REMOVE => Some("remove"),
            _ => None,
        }
    }

    /// Event name for `path` (`"position.x:set"`)
    pub fn event_name(self, path: &str) -> Option<String> {
        self.event_suffix().map(|suffix| format!("{path}:{suffix}"))
    }
}

/// Payload of every observer event
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverEvent {
    pub kind: ChangeKind,
    pub path: String,
    /// New value (`set`), inserted or removed element
    pub value: Option<Value>,
    /// Value before a `set` or `unset`
    pub previous: Option<Value>,
    /// Position of an inserted or removed element
    pub index: Option<usize>,
}

/// Per-observer undo recording
///
/// When attached and enabled, the observer's own `set`/`unset`/`insert`/
/// `remove_value` calls are recorded into `history` as actions named
/// `"{prefix}{path}"`.
#[derive(Debug, Clone)]
pub struct ObserverHistory {
    history: History,
    prefix: String,
    enabled: bool,
}

impl ObserverHistory {
    pub fn new(history: History) -> Self {
        Self {
            history,
            prefix: String::new(),
            enabled: true,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

struct ObserverInner {
    data: RefCell<Value>,
    events: Events<ObserverEvent>,
    history: RefCell<Option<ObserverHistory>>,
    superseded_by: RefCell<Option<Weak<ObserverInner>>>,
    destroyed: Cell<bool>,
}

/// Shared handle to an observable data tree. Clones refer to the same node.
#[derive(Clone)]
pub struct Observer {
    inner: Rc<ObserverInner>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("data", &*self.inner.data.borrow())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

impl PartialEq for Observer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Observer {}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer {
    /// Create an observer holding an empty object
    pub fn new() -> Self {
        Self::with_value(Value::object())
    }

    pub fn with_value(data: Value) -> Self {
        Self {
            inner: Rc::new(ObserverInner {
                data: RefCell::new(data),
                events: Events::new(),
                history: RefCell::new(None),
                superseded_by: RefCell::new(None),
                destroyed: Cell::new(false),
            }),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        Self::with_value(Value::from(json))
    }

    /// Weak handle that does not keep the observer alive
    pub fn downgrade(&self) -> WeakObserver {
        WeakObserver {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same node
    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy of the whole tree
    pub fn snapshot(&self) -> Value {
        self.inner.data.borrow().clone()
    }

    pub fn has(&self, path: &str) -> bool {
        path::lookup(&self.inner.data.borrow(), path).is_some()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        path::lookup(&self.inner.data.borrow(), path).cloned()
    }

    /// Whether the array at `path` holds an element equal to `value`
    pub fn contains(&self, path: &str, value: &Value) -> bool {
        path::lookup(&self.inner.data.borrow(), path)
            .and_then(Value::as_array)
            .is_some_and(|items| items.contains(value))
    }

    /// Write `value` at `path`, creating missing intermediate objects.
    ///
    /// Returns `false` when nothing changed: the value was already equal, or
    /// the path runs through a scalar.
    pub fn set(&self, path: &str, value: Value) -> bool {
        let previous = {
            let mut data = self.inner.data.borrow_mut();
            if path::lookup(&data, path) == Some(&value) {
                return false;
            }
            match path::assign(&mut data, path, value.clone()) {
                Ok(previous) => previous,
                Err(()) => {
                    tracing::trace!(path = %path, "Observer set through non-container skipped");
                    return false;
                }
            }
        };

        self.record(path, previous.clone(), Some(value.clone()));
        self.emit(ObserverEvent {
            kind: ChangeKind::SET,
            path: path.to_string(),
            value: Some(value),
            previous,
            index: None,
        });
        true
    }

    /// Remove the value at `path`, returning it
    pub fn unset(&self, path: &str) -> Option<Value> {
        let previous = path::remove(&mut self.inner.data.borrow_mut(), path)?;

        self.record(path, Some(previous.clone()), None);
        self.emit(ObserverEvent {
            kind: ChangeKind::UNSET,
            path: path.to_string(),
            value: None,
            previous: Some(previous.clone()),
            index: None,
        });
        Some(previous)
    }

    /// Insert into the array at `path`, appending when `index` is `None`.
    ///
    /// Indices past the end are clamped. Returns `false` if `path` does not
    /// hold an array.
    pub fn insert(&self, path: &str, value: Value, index: Option<usize>) -> bool {
        let index = {
            let mut data = self.inner.data.borrow_mut();
            let Some(items) = path::lookup_mut(&mut data, path).and_then(Value::as_array_mut) else {
                tracing::trace!(path = %path, "Observer insert into non-array skipped");
                return false;
            };
            let index = index.unwrap_or(items.len()).min(items.len());
            items.insert(index, value.clone());
            index
        };

        if let Some(recorder) = self.active_history() {
            let weak = self.downgrade();
            let undo_value = value.clone();
            let redo_weak = weak.clone();
            let redo_value = value.clone();
            let redo_path = path.to_string();
            let undo_path = path.to_string();
            recorder.history.add(HistoryAction::new(
                format!("{}{}", recorder.prefix, path),
                move || {
                    if let Some(observer) = weak.latest() {
                        observer.remove_value(&undo_path, &undo_value);
                    }
                },
                move || {
                    if let Some(observer) = redo_weak.latest() {
                        observer.insert(&redo_path, redo_value.clone(), Some(index));
                    }
                },
            ));
        }

        self.emit(ObserverEvent {
            kind: ChangeKind::INSERT,
            path: path.to_string(),
            value: Some(value),
            previous: None,
            index: Some(index),
        });
        true
    }

    /// Remove the first element equal to `value` from the array at `path`
    pub fn remove_value(&self, path: &str, value: &Value) -> bool {
        let index = {
            let mut data = self.inner.data.borrow_mut();
            let Some(items) = path::lookup_mut(&mut data, path).and_then(Value::as_array_mut) else {
                return false;
            };
            let Some(index) = items.iter().position(|item| item == value) else {
                return false;
            };
            items.remove(index);
            index
        };

        if let Some(recorder) = self.active_history() {
            let weak = self.downgrade();
            let redo_weak = weak.clone();
            let undo_value = value.clone();
            let redo_value = value.clone();
            let undo_path = path.to_string();
            let redo_path = path.to_string();
            recorder.history.add(HistoryAction::new(
                format!("{}{}", recorder.prefix, path),
                move || {
                    if let Some(observer) = weak.latest() {
                        observer.insert(&undo_path, undo_value.clone(), Some(index));
                    }
                },
                move || {
                    if let Some(observer) = redo_weak.latest() {
                        observer.remove_value(&redo_path, &redo_value);
                    }
                },
            ));
        }

        self.emit(ObserverEvent {
            kind: ChangeKind::REMOVE,
            path: path.to_string(),
            value: Some(value.clone()),
            previous: None,
            index: Some(index),
        });
        true
    }

    /// Subscribe to an event such as `"position.x:set"` or `"*:unset"`
    pub fn on(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&ObserverEvent) + 'static,
    ) -> EventHandle {
        self.inner.events.on(name, handler)
    }

    pub fn events(&self) -> &Events<ObserverEvent> {
        &self.inner.events
    }

    /// The live instance this observer maps to
    ///
    /// Returns `None` once the observer (or the one it redirects to) has been
    /// destroyed or dropped.
    pub fn latest(&self) -> Option<Observer> {
        let mut current = self.clone();
        loop {
            if current.inner.destroyed.get() {
                return None;
            }
            let next = match &*current.inner.superseded_by.borrow() {
                None => return Some(current.clone()),
                Some(weak) => weak.upgrade()?,
            };
            current = Observer { inner: next };
        }
    }

    /// Redirect [`latest`](Self::latest) to `newer`
    ///
    /// Returns `false` and leaves the observer unchanged when `newer` already
    /// redirects (directly or through its chain) back to this observer.
    pub fn supersede(&self, newer: &Observer) -> bool {
        let mut current = Some(Rc::clone(&newer.inner));
        while let Some(node) = current {
            if Rc::ptr_eq(&node, &self.inner) {
                tracing::debug!("Supersede rejected, redirect would form a cycle");
                return false;
            }
            current = node.superseded_by.borrow().as_ref().and_then(Weak::upgrade);
        }
        *self.inner.superseded_by.borrow_mut() = Some(Rc::downgrade(&newer.inner));
        true
    }

    /// Mark the observer defunct and drop its handlers
    pub fn destroy(&self) {
        self.inner.destroyed.set(true);
        self.inner.events.unbind_all();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Record this observer's own mutations into `history`
    pub fn attach_history(&self, history: ObserverHistory) {
        *self.inner.history.borrow_mut() = Some(history);
    }

    pub fn detach_history(&self) -> Option<ObserverHistory> {
        self.inner.history.borrow_mut().take()
    }

    /// Whether per-observer history is attached and enabled
    pub fn history_enabled(&self) -> bool {
        self.inner
            .history
            .borrow()
            .as_ref()
            .is_some_and(|h| h.enabled)
    }

    /// Toggle per-observer recording. No-op without attached history.
    pub fn set_history_enabled(&self, enabled: bool) {
        if let Some(history) = self.inner.history.borrow_mut().as_mut() {
            history.enabled = enabled;
        }
    }

    /// Disable per-observer recording until the guard drops
    pub fn suspend_history(&self) -> HistorySuspendGuard<'_> {
        let restore = self.history_enabled();
        if restore {
            self.set_history_enabled(false);
        }
        HistorySuspendGuard {
            observer: self,
            restore,
        }
    }

    fn active_history(&self) -> Option<ObserverHistory> {
        self.inner
            .history
            .borrow()
            .as_ref()
            .filter(|h| h.enabled)
            .cloned()
    }

    fn record(&self, path: &str, previous: Option<Value>, next: Option<Value>) {
        let Some(recorder) = self.active_history() else {
            return;
        };

        let apply = |weak: WeakObserver, path: String, value: Option<Value>| {
            move || {
                if let Some(observer) = weak.latest() {
                    match &value {
                        Some(value) => {
                            observer.set(&path, value.clone());
                        }
                        None => {
                            observer.unset(&path);
                        }
                    }
                }
            }
        };

        recorder.history.add(HistoryAction::new(
            format!("{}{}", recorder.prefix, path),
            apply(self.downgrade(), path.to_string(), previous),
            apply(self.downgrade(), path.to_string(), next),
        ));
    }

    fn emit(&self, event: ObserverEvent) {
        let Some(suffix) = event.kind.event_suffix() else {
            return;
        };
        self.inner
            .events
            .emit(&format!("{}:{}", event.path, suffix), &event);
        self.inner.events.emit(&format!("*:{suffix}"), &event);
    }
}

/// Weak observer handle held by bindings
#[derive(Clone, Default)]
pub struct WeakObserver {
    inner: Weak<ObserverInner>,
}

impl fmt::Debug for WeakObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObserver")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl WeakObserver {
    pub fn upgrade(&self) -> Option<Observer> {
        self.inner.upgrade().map(|inner| Observer { inner })
    }

    /// Upgrade and follow supersession; `None` for stale handles
    pub fn latest(&self) -> Option<Observer> {
        self.upgrade().and_then(|observer| observer.latest())
    }

    pub fn ptr_eq(&self, other: &WeakObserver) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl From<&Observer> for WeakObserver {
    fn from(observer: &Observer) -> Self {
        observer.downgrade()
    }
}

/// Restores an observer's history flag on drop
///
/// Returned by [`Observer::suspend_history`].
#[must_use = "history is re-enabled as soon as the guard drops"]
pub struct HistorySuspendGuard<'a> {
    observer: &'a Observer,
    restore: bool,
}

impl Drop for HistorySuspendGuard<'_> {
    fn drop(&mut self) {
        if self.restore {
            self.observer.set_history_enabled(true);
        }
    }
}
