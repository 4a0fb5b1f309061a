//! Bindings between observers and bindable elements
//!
//! A binding links a set of observers and a set of paths to one element:
//!
//! - [`ElementToObservers`]: element edits are written into the observers,
//!   one history action per edit.
//! - [`ObserversToElement`]: observer changes are mirrored onto the element
//!   on the next tick.
//! - [`TwoWay`]: both of the above, sharing one `applying_change` latch.
//!
//! # Fan-out
//!
//! How observers and paths pair up depends on their counts:
//!
//! | observers | paths | targets |
//! |---|---|---|
//! | 1 | n > 1 | `(observer, paths[i])` for every path; values are arrays |
//! | n | 1 | `(observers[i], paths[0])` |
//! | n | n | `(observers[i], paths[i])` |
//!
//! See [`fan_out`] and [`path_at`].

mod element_to_observers;
mod observers_to_element;
mod two_way;

pub use element_to_observers::ElementToObservers;
pub use observers_to_element::{CustomUpdate, ObserversToElement};
pub use two_way::TwoWay;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::BindingOptions;
use crate::element::WeakElement;
use crate::error::BindError;
use crate::events::{EventHandle, Events};
use crate::history::History;
use crate::observer::{Observer, WeakObserver};
use crate::value::Value;

/// Path used for the observer at `index`: `paths[index]`, else `paths[0]`
pub fn path_at(paths: &[String], index: usize) -> Option<&str> {
    paths.get(index).or_else(|| paths.first()).map(String::as_str)
}

/// One observer linked to several paths (a curve with several channels)
pub fn is_multi_path(observers: &[WeakObserver], paths: &[String]) -> bool {
    observers.len() == 1 && paths.len() > 1
}

/// Resolve the `(observer, path)` pairs a binding reads from and writes to
pub fn fan_out<'a>(
    observers: &'a [WeakObserver],
    paths: &'a [String],
) -> Vec<(&'a WeakObserver, &'a str)> {
    if is_multi_path(observers, paths) {
        return paths.iter().map(|path| (&observers[0], path.as_str())).collect();
    }
    observers
        .iter()
        .enumerate()
        .filter_map(|(i, observer)| path_at(paths, i).map(|path| (observer, path)))
        .collect()
}

/// Normalized observers and paths passed to [`Binding::link`]
#[derive(Debug, Clone, Default)]
pub struct LinkTargets {
    pub observers: Vec<WeakObserver>,
    pub paths: Vec<String>,
}

impl LinkTargets {
    pub fn new(observers: impl IntoObservers, paths: impl IntoPaths) -> Self {
        Self {
            observers: observers.into_observers(),
            paths: paths.into_paths(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty() || self.paths.is_empty()
    }
}

/// Single observer or list of observers
pub trait IntoObservers {
    fn into_observers(self) -> Vec<WeakObserver>;
}

impl IntoObservers for &Observer {
    fn into_observers(self) -> Vec<WeakObserver> {
        vec![self.downgrade()]
    }
}

impl IntoObservers for &[Observer] {
    fn into_observers(self) -> Vec<WeakObserver> {
        self.iter().map(Observer::downgrade).collect()
    }
}

impl IntoObservers for &Vec<Observer> {
    fn into_observers(self) -> Vec<WeakObserver> {
        self.as_slice().into_observers()
    }
}

impl IntoObservers for Vec<Observer> {
    fn into_observers(self) -> Vec<WeakObserver> {
        self.as_slice().into_observers()
    }
}

impl<const N: usize> IntoObservers for [&Observer; N] {
    fn into_observers(self) -> Vec<WeakObserver> {
        self.iter().map(|observer| observer.downgrade()).collect()
    }
}

impl IntoObservers for WeakObserver {
    fn into_observers(self) -> Vec<WeakObserver> {
        vec![self]
    }
}

impl IntoObservers for Vec<WeakObserver> {
    fn into_observers(self) -> Vec<WeakObserver> {
        self
    }
}

/// Single path or list of paths
pub trait IntoPaths {
    fn into_paths(self) -> Vec<String>;
}

impl IntoPaths for &str {
    fn into_paths(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoPaths for String {
    fn into_paths(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoPaths for &[&str] {
    fn into_paths(self) -> Vec<String> {
        self.iter().map(|path| path.to_string()).collect()
    }
}

impl<const N: usize> IntoPaths for [&str; N] {
    fn into_paths(self) -> Vec<String> {
        self.iter().map(|path| path.to_string()).collect()
    }
}

impl IntoPaths for Vec<&str> {
    fn into_paths(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoPaths for &[String] {
    fn into_paths(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoPaths for Vec<String> {
    fn into_paths(self) -> Vec<String> {
        self
    }
}

/// Targets captured by a write, as reported in binding events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteContext {
    pub observers: usize,
    pub paths: Vec<String>,
}

/// Notifications emitted by bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingEvent {
    /// The `applying_change` latch flipped
    ApplyingChange(bool),
    /// A history action is about to be recorded
    HistoryInit(WriteContext),
    /// A write ran (initially, or via redo)
    HistoryRedo(WriteContext),
    /// A write was undone
    HistoryUndo(WriteContext),
}

impl BindingEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            BindingEvent::ApplyingChange(_) => "applying-change",
            BindingEvent::HistoryInit(_) => "history:init",
            BindingEvent::HistoryRedo(_) => "history:redo",
            BindingEvent::HistoryUndo(_) => "history:undo",
        }
    }
}

struct BaseInner {
    observers: RefCell<Vec<WeakObserver>>,
    paths: RefCell<Vec<String>>,
    linked: Cell<bool>,
    applying_change: Cell<bool>,
    element: RefCell<Option<WeakElement>>,
    history: RefCell<Option<History>>,
    options: RefCell<BindingOptions>,
    events: Events<BindingEvent>,
}

/// State shared by every binding kind. Clones share the state.
#[derive(Clone)]
pub struct BindingBase {
    inner: Rc<BaseInner>,
}

impl fmt::Debug for BindingBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingBase")
            .field("observers", &self.inner.observers.borrow().len())
            .field("paths", &*self.inner.paths.borrow())
            .field("linked", &self.inner.linked.get())
            .field("applying_change", &self.inner.applying_change.get())
            .field("options", &*self.inner.options.borrow())
            .finish()
    }
}

impl Default for BindingBase {
    fn default() -> Self {
        Self::new(BindingOptions::default())
    }
}

impl BindingBase {
    pub fn new(options: BindingOptions) -> Self {
        Self {
            inner: Rc::new(BaseInner {
                observers: RefCell::new(Vec::new()),
                paths: RefCell::new(Vec::new()),
                linked: Cell::new(false),
                applying_change: Cell::new(false),
                element: RefCell::new(None),
                history: RefCell::new(None),
                options: RefCell::new(options),
                events: Events::new(),
            }),
        }
    }

    /// Weak handle that does not keep the state alive
    pub fn downgrade(&self) -> WeakBindingBase {
        WeakBindingBase {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Replace the current link
    pub fn link(&self, targets: LinkTargets) {
        if targets.is_empty() {
            tracing::debug!(
                observers = targets.observers.len(),
                paths = targets.paths.len(),
                "Binding linked to nothing"
            );
        }
        *self.inner.observers.borrow_mut() = targets.observers;
        *self.inner.paths.borrow_mut() = targets.paths;
        self.inner.linked.set(true);
    }

    pub fn unlink(&self) {
        self.inner.observers.borrow_mut().clear();
        self.inner.paths.borrow_mut().clear();
        self.inner.linked.set(false);
    }

    pub fn linked(&self) -> bool {
        self.inner.linked.get()
    }

    /// Copy of the linked observers
    pub fn observers(&self) -> Vec<WeakObserver> {
        self.inner.observers.borrow().clone()
    }

    /// Copy of the linked paths
    pub fn paths(&self) -> Vec<String> {
        self.inner.paths.borrow().clone()
    }

    /// Copy of the current link
    pub fn targets(&self) -> LinkTargets {
        LinkTargets {
            observers: self.observers(),
            paths: self.paths(),
        }
    }

    pub fn applying_change(&self) -> bool {
        self.inner.applying_change.get()
    }

    /// Set the latch, emitting `applying-change` when it flips
    pub fn set_applying_change(&self, value: bool) {
        if self.inner.applying_change.replace(value) == value {
            return;
        }
        self.emit(BindingEvent::ApplyingChange(value));
    }

    pub fn element(&self) -> Option<WeakElement> {
        self.inner.element.borrow().clone()
    }

    pub fn set_element(&self, element: Option<WeakElement>) {
        *self.inner.element.borrow_mut() = element;
    }

    pub fn history(&self) -> Option<History> {
        self.inner.history.borrow().clone()
    }

    pub fn set_history(&self, history: Option<History>) {
        *self.inner.history.borrow_mut() = history;
    }

    /// Whether the attached history records actions; `false` without one
    pub fn history_enabled(&self) -> bool {
        self.inner
            .history
            .borrow()
            .as_ref()
            .is_some_and(History::enabled)
    }

    /// No-op without an attached history
    pub fn set_history_enabled(&self, enabled: bool) {
        if let Some(history) = self.inner.history.borrow().as_ref() {
            history.set_enabled(enabled);
        }
    }

    pub fn options(&self) -> BindingOptions {
        self.inner.options.borrow().clone()
    }

    pub fn set_options(&self, options: BindingOptions) {
        *self.inner.options.borrow_mut() = options;
    }

    /// History action name for a write to `paths`
    pub fn action_name(&self, paths: &[String]) -> String {
        self.inner.options.borrow().action_name(paths)
    }

    /// Subscribe to binding events by name (see [`BindingEvent::event_name`])
    pub fn on(&self, name: &str, handler: impl Fn(&BindingEvent) + 'static) -> EventHandle {
        self.inner.events.on(name, handler)
    }

    pub fn events(&self) -> &Events<BindingEvent> {
        &self.inner.events
    }

    fn emit(&self, event: BindingEvent) {
        self.inner.events.emit(event.event_name(), &event);
    }
}

/// Weak reference to a [`BindingBase`]
#[derive(Clone)]
pub struct WeakBindingBase {
    inner: Weak<BaseInner>,
}

impl WeakBindingBase {
    pub fn upgrade(&self) -> Option<BindingBase> {
        self.inner.upgrade().map(|inner| BindingBase { inner })
    }
}

/// A link between observers and an element
///
/// Write operations default to no-ops returning `Ok(false)`; only bindings
/// that write into observers override them.
pub trait Binding {
    fn base(&self) -> &BindingBase;

    /// Link to `targets`, replacing any existing link
    fn link(&self, targets: LinkTargets) {
        self.unlink();
        self.base().link(targets);
    }

    fn unlink(&self) {
        self.base().unlink();
    }

    /// Fresh, unlinked binding with the same configuration
    fn clone_binding(&self) -> Box<dyn Binding>;

    fn set_element(&self, element: Option<WeakElement>) {
        self.base().set_element(element);
    }

    fn linked(&self) -> bool {
        self.base().linked()
    }

    fn applying_change(&self) -> bool {
        self.base().applying_change()
    }

    /// Write one value to every target
    fn set_value(&self, _value: Option<Value>) -> Result<bool, BindError> {
        Ok(false)
    }

    /// Write one value per target
    fn set_values(&self, _values: Vec<Option<Value>>) -> Result<bool, BindError> {
        Ok(false)
    }

    fn add_value(&self, value: Value) -> Result<bool, BindError> {
        self.add_values(vec![value])
    }

    /// Insert values missing from the array at every target
    fn add_values(&self, _values: Vec<Value>) -> Result<bool, BindError> {
        Ok(false)
    }

    fn remove_value(&self, value: Value) -> Result<bool, BindError> {
        self.remove_values(vec![value])
    }

    /// Remove values present in the array at every target
    fn remove_values(&self, _values: Vec<Value>) -> Result<bool, BindError> {
        Ok(false)
    }
}

impl fmt::Debug for dyn Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.base(), f)
    }
}
