use std::rc::Rc;

use super::{fan_out, is_multi_path, Binding, BindingBase, BindingEvent, LinkTargets, WriteContext};
use crate::config::BindingOptions;
use crate::error::BindError;
use crate::events::Events;
use crate::history::{History, HistoryAction};
use crate::observer::WeakObserver;
use crate::path;
use crate::value::Value;

/// Writes element edits into the linked observers
///
/// Every successful write is recorded as one [`HistoryAction`] when a
/// [`History`] is attached. The action owns a snapshot of the observers and
/// paths, so relinking later does not change what undo and redo touch.
///
/// Silent skips (no error, the rest of the batch continues):
/// - the observer was dropped or destroyed
/// - the parent of the target path does not exist
/// - the value is already present (add) or already absent (remove)
/// - the target of an add/remove does not hold an array
///
/// Whole-call no-ops (`Ok(false)`): nothing linked, or a write already running.
#[derive(Debug, Clone)]
pub struct ElementToObservers {
    base: BindingBase,
}

impl Default for ElementToObservers {
    fn default() -> Self {
        Self::new(BindingOptions::default())
    }
}

/// Value payload of a write before fan-out
enum Payload {
    Broadcast(Option<Value>),
    PerTarget(Vec<Option<Value>>),
}

/// Observers and paths captured when a write starts
#[derive(Debug)]
struct Snapshot {
    observers: Vec<WeakObserver>,
    paths: Vec<String>,
}

impl Snapshot {
    fn targets(&self) -> Vec<(&WeakObserver, &str)> {
        fan_out(&self.observers, &self.paths)
    }

    fn context(&self) -> WriteContext {
        WriteContext {
            observers: self.observers.len(),
            paths: self.paths.clone(),
        }
    }

    /// Pair each target with its value, rejecting payloads of the wrong shape
    fn distribute(&self, payload: Payload) -> Result<Vec<Option<Value>>, BindError> {
        let expected = self.targets().len();
        let values = match payload {
            Payload::PerTarget(values) => values,
            Payload::Broadcast(value) if !is_multi_path(&self.observers, &self.paths) => {
                vec![value; expected]
            }
            Payload::Broadcast(None) => vec![None; expected],
            Payload::Broadcast(Some(Value::Array(items))) => items.into_iter().map(Some).collect(),
            Payload::Broadcast(Some(_)) => {
                return Err(BindError::NotAnArray {
                    paths: self.paths.len(),
                })
            }
        };

        if values.len() != expected {
            return Err(BindError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(values)
    }

    /// Read the current value at every target
    fn read(&self) -> Vec<Option<Value>> {
        self.targets()
            .into_iter()
            .map(|(observer, path)| observer.latest().and_then(|o| o.get(path)))
            .collect()
    }

    fn write(&self, values: &[Option<Value>]) {
        for ((observer, path), value) in self.targets().into_iter().zip(values) {
            let Some(observer) = observer.latest() else {
                tracing::trace!(path = %path, "Skipping write to stale observer");
                continue;
            };
            let _suspend = observer.suspend_history();

            match value {
                Some(value) => {
                    if let Some(parent) = path::parent(path) {
                        if !observer.has(parent) {
                            tracing::trace!(path = %path, parent = %parent, "Skipping write, parent path missing");
                            continue;
                        }
                    }
                    observer.set(path, value.clone());
                }
                None => {
                    observer.unset(path);
                }
            }
        }
    }
}

/// One insert or removal computed by an add/remove request
#[derive(Debug)]
struct MembershipRecord {
    observer: WeakObserver,
    path: String,
    value: Value,
    /// Position the value was removed from
    index: Option<usize>,
}

impl MembershipRecord {
    fn insert(&self) {
        if let Some(observer) = self.observer.latest() {
            let _suspend = observer.suspend_history();
            if !observer.contains(&self.path, &self.value) {
                observer.insert(&self.path, self.value.clone(), self.index);
            }
        }
    }

    fn remove(&self) {
        if let Some(observer) = self.observer.latest() {
            let _suspend = observer.suspend_history();
            observer.remove_value(&self.path, &self.value);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Membership {
    Add,
    Remove,
}

impl ElementToObservers {
    pub fn new(options: BindingOptions) -> Self {
        Self {
            base: BindingBase::new(options),
        }
    }

    /// Record writes into `history`
    pub fn with_history(self, history: History) -> Self {
        self.base.set_history(Some(history));
        self
    }

    fn events(&self) -> Events<BindingEvent> {
        self.base.events().clone()
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let LinkTargets { observers, paths } = self.base.targets();
        if observers.is_empty() || paths.is_empty() {
            return None;
        }
        Some(Snapshot { observers, paths })
    }

    fn write(&self, payload: Payload) -> Result<bool, BindError> {
        if self.base.applying_change() {
            tracing::trace!("Write ignored, binding is applying a change");
            return Ok(false);
        }
        let Some(snapshot) = self.snapshot() else {
            return Ok(false);
        };
        let values = snapshot.distribute(payload)?;

        self.base.set_applying_change(true);

        let snapshot = Rc::new(snapshot);
        let values = Rc::new(values);
        let events = self.events();

        let execute = {
            let snapshot = Rc::clone(&snapshot);
            let values = Rc::clone(&values);
            let events = events.clone();
            move || {
                snapshot.write(&values);
                events.emit("history:redo", &BindingEvent::HistoryRedo(snapshot.context()));
            }
        };

        if let Some(history) = self.base.history() {
            let previous = snapshot.read();
            events.emit("history:init", &BindingEvent::HistoryInit(snapshot.context()));

            let undo = {
                let snapshot = Rc::clone(&snapshot);
                move || {
                    snapshot.write(&previous);
                    events.emit("history:undo", &BindingEvent::HistoryUndo(snapshot.context()));
                }
            };
            let name = self.base.action_name(&snapshot.paths);
            let combine = self.base.options().history_combine;
            history.add(HistoryAction::new(name, undo, execute.clone()).combine(combine));
        }

        tracing::debug!(
            observers = snapshot.observers.len(),
            paths = ?snapshot.paths,
            "Binding write"
        );
        execute();

        self.base.set_applying_change(false);
        Ok(true)
    }

    fn update_membership(&self, values: Vec<Value>, op: Membership) -> Result<bool, BindError> {
        if self.base.applying_change() {
            return Ok(false);
        }
        let Some(snapshot) = self.snapshot() else {
            return Ok(false);
        };

        self.base.set_applying_change(true);

        let mut records: Vec<MembershipRecord> = Vec::new();
        for (observer, path) in snapshot.targets() {
            let current = match observer.latest().and_then(|o| o.get(path)) {
                Some(Value::Array(items)) => items,
                _ => {
                    tracing::trace!(path = %path, "Skipping membership change on non-array");
                    continue;
                }
            };

            for value in &values {
                let duplicate = records
                    .iter()
                    .any(|r| r.observer.ptr_eq(observer) && r.path == path && &r.value == value);
                if duplicate {
                    continue;
                }
                let position = current.iter().position(|item| item == value);
                let index = match (op, position) {
                    (Membership::Add, None) => None,
                    (Membership::Remove, Some(index)) => Some(index),
                    _ => continue,
                };
                records.push(MembershipRecord {
                    observer: observer.clone(),
                    path: path.to_string(),
                    value: value.clone(),
                    index,
                });
            }
        }

        if records.is_empty() {
            self.base.set_applying_change(false);
            return Ok(false);
        }

        // Undo re-inserts removed values in ascending original position
        let records = Rc::new(records);
        let mut undo_order: Vec<usize> = (0..records.len()).collect();
        undo_order.sort_by_key(|&i| records[i].index);

        let execute = {
            let records = Rc::clone(&records);
            move || {
                for record in records.iter() {
                    match op {
                        Membership::Add => record.insert(),
                        Membership::Remove => record.remove(),
                    }
                }
            }
        };

        if let Some(history) = self.base.history() {
            let undo = {
                let records = Rc::clone(&records);
                move || {
                    for &i in &undo_order {
                        match op {
                            Membership::Add => records[i].remove(),
                            Membership::Remove => records[i].insert(),
                        }
                    }
                }
            };
            let name = self.base.action_name(&snapshot.paths);
            let combine = self.base.options().history_combine;
            history.add(HistoryAction::new(name, undo, execute.clone()).combine(combine));
        }

        tracing::debug!(records = records.len(), paths = ?snapshot.paths, "Binding membership change");
        execute();

        self.base.set_applying_change(false);
        Ok(true)
    }
}

impl Binding for ElementToObservers {
    fn base(&self) -> &BindingBase {
        &self.base
    }

    fn clone_binding(&self) -> Box<dyn Binding> {
        let clone = ElementToObservers::new(self.base.options());
        clone.base.set_history(self.base.history());
        Box::new(clone)
    }

    fn set_value(&self, value: Option<Value>) -> Result<bool, BindError> {
        self.write(Payload::Broadcast(value))
    }

    fn set_values(&self, values: Vec<Option<Value>>) -> Result<bool, BindError> {
        self.write(Payload::PerTarget(values))
    }

    fn add_values(&self, values: Vec<Value>) -> Result<bool, BindError> {
        self.update_membership(values, Membership::Add)
    }

    fn remove_values(&self, values: Vec<Value>) -> Result<bool, BindError> {
        self.update_membership(values, Membership::Remove)
    }
}
