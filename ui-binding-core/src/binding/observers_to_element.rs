use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{fan_out, is_multi_path, path_at, Binding, BindingBase, LinkTargets};
use crate::config::BindingOptions;
use crate::element::{Bindable, RenderChangesGuard};
use crate::events::EventHandle;
use crate::observer::{ChangeKind, WeakObserver};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::value::Value;

/// Replaces the default observer-to-element mapping
///
/// Receives the element plus the linked observers and paths.
pub type CustomUpdate = Rc<dyn Fn(&mut dyn Bindable, &[WeakObserver], &[String])>;

struct ReadInner {
    base: BindingBase,
    scheduler: Rc<dyn Scheduler>,
    custom_update: Option<CustomUpdate>,
    kinds: ChangeKind,
    subscriptions: RefCell<Vec<EventHandle>>,
    pending: RefCell<Option<TaskHandle>>,
}

/// Mirrors observer values onto the element
///
/// Linking assigns the element once, synchronously, with `render_changes`
/// turned off. After that every `set`/`unset`/`insert`/`remove` at a linked
/// path schedules a single update on the [`Scheduler`]; further events are
/// ignored until it runs, and it reads the state current at that point.
///
/// Subscriptions are made on each observer's [`latest`](crate::Observer::latest)
/// at link time. Reads follow later supersession, but change events from an
/// observer superseded after linking are not seen until the binding is
/// linked again.
///
/// | link shape | element receives |
/// |---|---|
/// | 1 observer, 1 path | `set_value(value)` |
/// | 1 observer, n paths | `set_value(Some(Array))`, one entry per path |
/// | n observers | `set_values(values)`, one entry per observer |
#[derive(Clone)]
pub struct ObserversToElement {
    inner: Rc<ReadInner>,
}

impl fmt::Debug for ObserversToElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserversToElement")
            .field("base", &self.inner.base)
            .field("kinds", &self.inner.kinds)
            .field("subscriptions", &self.inner.subscriptions.borrow().len())
            .field("pending", &self.inner.pending.borrow().is_some())
            .finish()
    }
}

impl ObserversToElement {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self::build(
            BindingBase::new(BindingOptions::default()),
            scheduler,
            None,
            ChangeKind::all(),
        )
    }

    fn build(
        base: BindingBase,
        scheduler: Rc<dyn Scheduler>,
        custom_update: Option<CustomUpdate>,
        kinds: ChangeKind,
    ) -> Self {
        Self {
            inner: Rc::new(ReadInner {
                base,
                scheduler,
                custom_update,
                kinds,
                subscriptions: RefCell::new(Vec::new()),
                pending: RefCell::new(None),
            }),
        }
    }

    /// Use `update` instead of the default value mapping
    pub fn with_custom_update(
        self,
        update: impl Fn(&mut dyn Bindable, &[WeakObserver], &[String]) + 'static,
    ) -> Self {
        Self::build(
            self.inner.base.clone(),
            Rc::clone(&self.inner.scheduler),
            Some(Rc::new(update)),
            self.inner.kinds,
        )
    }

    /// Only react to the given kinds of change (all by default)
    pub fn with_kinds(self, kinds: ChangeKind) -> Self {
        Self::build(
            self.inner.base.clone(),
            Rc::clone(&self.inner.scheduler),
            self.inner.custom_update.clone(),
            kinds,
        )
    }

    /// Fresh, unlinked binding with the same scheduler and custom update
    pub fn clone_unlinked(&self) -> Self {
        Self::build(
            BindingBase::new(self.inner.base.options()),
            Rc::clone(&self.inner.scheduler),
            self.inner.custom_update.clone(),
            self.inner.kinds,
        )
    }

    /// Whether a deferred update is waiting to run
    pub fn has_pending_update(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    /// Apply the observer values now, cancelling any pending update
    pub fn update_element(&self) {
        self.inner.update_element();
    }
}

impl Drop for ReadInner {
    fn drop(&mut self) {
        for mut handle in self.subscriptions.get_mut().drain(..) {
            handle.unbind();
        }
        if let Some(handle) = self.pending.get_mut().take() {
            handle.cancel();
        }
    }
}

impl ReadInner {
    fn defer_update(self: &Rc<Self>) {
        if self.base.applying_change() {
            return;
        }
        self.base.set_applying_change(true);

        let weak: Weak<ReadInner> = Rc::downgrade(self);
        let handle = self.scheduler.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.pending.borrow_mut().take();
                inner.update_element();
            }
        }));
        *self.pending.borrow_mut() = Some(handle);
    }

    fn cancel_pending(&self) -> bool {
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    fn update_element(&self) {
        self.cancel_pending();
        self.base.set_applying_change(true);

        if let Some(element) = self.base.element().and_then(|weak| weak.upgrade()) {
            let observers = self.base.observers();
            let paths = self.base.paths();
            let mut element = element.borrow_mut();

            if let Some(update) = &self.custom_update {
                update(&mut *element, &observers, &paths);
            } else if is_multi_path(&observers, &paths) {
                let values = fan_out(&observers, &paths)
                    .into_iter()
                    .map(|(observer, path)| read(observer, path).unwrap_or_default())
                    .collect();
                element.set_value(Some(Value::Array(values)));
            } else if observers.len() == 1 {
                element.set_value(path_at(&paths, 0).and_then(|path| read(&observers[0], path)));
            } else {
                let values = observers
                    .iter()
                    .enumerate()
                    .map(|(i, observer)| path_at(&paths, i).and_then(|path| read(observer, path)))
                    .collect();
                element.set_values(values);
            }
            tracing::trace!(observers = observers.len(), paths = ?paths, "Element updated");
        }

        self.base.set_applying_change(false);
    }

    fn subscribe(self: &Rc<Self>) {
        let observers = self.base.observers();
        let paths = self.base.paths();
        let mut handles = Vec::new();

        for (observer, path) in fan_out(&observers, &paths) {
            let Some(observer) = observer.latest() else {
                continue;
            };
            for kind in self.kinds.iter() {
                let Some(name) = kind.event_name(path) else {
                    continue;
                };
                let weak = Rc::downgrade(self);
                handles.push(observer.on(name, move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.defer_update();
                    }
                }));
            }
        }
        *self.subscriptions.borrow_mut() = handles;
    }
}

fn read(observer: &WeakObserver, path: &str) -> Option<Value> {
    observer.latest().and_then(|observer| observer.get(path))
}

impl Binding for ObserversToElement {
    fn base(&self) -> &BindingBase {
        &self.inner.base
    }

    fn link(&self, targets: LinkTargets) {
        self.unlink();
        self.inner.base.link(targets);

        if let Some(element) = self.inner.base.element().and_then(|weak| weak.upgrade()) {
            let _quiet = RenderChangesGuard::new(element);
            self.inner.update_element();
        }

        self.inner.subscribe();
    }

    fn unlink(&self) {
        for mut handle in self.inner.subscriptions.borrow_mut().drain(..) {
            handle.unbind();
        }
        if self.inner.cancel_pending() {
            self.inner.base.set_applying_change(false);
        }
        self.inner.base.unlink();
    }

    fn clone_binding(&self) -> Box<dyn Binding> {
        Box::new(self.clone_unlinked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementRef;
    use crate::observer::Observer;
    use crate::scheduler::TickQueue;
    use serde_json::json;

    #[derive(Default)]
    struct Gauge {
        value: Option<Value>,
        values: Option<Vec<Option<Value>>>,
        assignments: usize,
        render_changes: bool,
        flash_during_assign: Vec<bool>,
    }

    impl Bindable for Gauge {
        fn value(&self) -> Option<Value> {
            self.value.clone()
        }

        fn set_value(&mut self, value: Option<Value>) {
            self.value = value;
            self.assignments += 1;
            self.flash_during_assign.push(self.render_changes);
        }

        fn set_values(&mut self, values: Vec<Option<Value>>) {
            self.values = Some(values);
            self.assignments += 1;
        }

        fn render_changes(&self) -> bool {
            self.render_changes
        }

        fn set_render_changes(&mut self, render_changes: bool) {
            self.render_changes = render_changes;
        }
    }

    fn setup(queue: &TickQueue) -> (ObserversToElement, Rc<RefCell<Gauge>>) {
        let gauge = Rc::new(RefCell::new(Gauge {
            render_changes: true,
            ..Gauge::default()
        }));
        let binding = ObserversToElement::new(Rc::new(queue.clone()));
        let element: ElementRef = gauge.clone();
        binding.set_element(Some(Rc::downgrade(&element)));
        (binding, gauge)
    }

    #[test]
    fn test_link_updates_synchronously_without_flash() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let entity = Observer::from_json(json!({"x": 7}));

        binding.link(LinkTargets::new(&entity, "x"));

        let gauge = gauge.borrow();
        assert_eq!(gauge.value, Some(Value::from(7)));
        assert_eq!(gauge.flash_during_assign, vec![false]);
        assert!(gauge.render_changes);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_burst_coalesces_into_one_update() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let entity = Observer::from_json(json!({"x": 0}));
        binding.link(LinkTargets::new(&entity, "x"));
        gauge.borrow_mut().assignments = 0;

        entity.set("x", Value::from(1));
        entity.set("x", Value::from(2));
        entity.set("x", Value::from(3));

        assert_eq!(gauge.borrow().assignments, 0);
        assert!(binding.has_pending_update());
        assert_eq!(queue.pending(), 1);

        queue.run_pending();
        assert_eq!(gauge.borrow().assignments, 1);
        assert_eq!(gauge.borrow().value, Some(Value::from(3)));
        assert!(!binding.applying_change());
        assert!(!binding.has_pending_update());
    }

    #[test]
    fn test_multi_path_reads_array() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let entity = Observer::from_json(json!({"r": 1, "g": 2}));

        binding.link(LinkTargets::new(&entity, ["r", "g", "b"]));
        assert_eq!(
            gauge.borrow().value,
            Some(Value::from(vec![Value::from(1), Value::from(2), Value::Null]))
        );
    }

    #[test]
    fn test_many_observers_read_values() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let a = Observer::from_json(json!({"x": 1}));
        let b = Observer::new();

        binding.link(LinkTargets::new([&a, &b], "x"));
        assert_eq!(gauge.borrow().values, Some(vec![Some(Value::from(1)), None]));

        b.set("x", Value::from(2));
        queue.run_pending();
        assert_eq!(
            gauge.borrow().values,
            Some(vec![Some(Value::from(1)), Some(Value::from(2))])
        );
    }

    #[test]
    fn test_insert_and_remove_trigger_update() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let entity = Observer::from_json(json!({"tags": []}));
        binding.link(LinkTargets::new(&entity, "tags"));

        entity.insert("tags", Value::from("a"), None);
        queue.run_pending();
        assert_eq!(gauge.borrow().value, Some(Value::from(vec!["a"])));

        entity.remove_value("tags", &Value::from("a"));
        queue.run_pending();
        assert_eq!(gauge.borrow().value, Some(Value::from(Vec::<Value>::new())));
    }

    #[test]
    fn test_kinds_filter() {
        let queue = TickQueue::new();
        let (binding, _gauge) = setup(&queue);
        let binding = binding.with_kinds(ChangeKind::SET);
        let entity = Observer::from_json(json!({"x": 1}));
        binding.link(LinkTargets::new(&entity, "x"));

        entity.unset("x");
        assert!(queue.is_idle());
        entity.set("x", Value::from(2));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_unlink_cancels_pending_update() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let entity = Observer::from_json(json!({"x": 0}));
        binding.link(LinkTargets::new(&entity, "x"));

        entity.set("x", Value::from(5));
        binding.unlink();
        assert!(!binding.applying_change());

        queue.run_pending();
        assert_eq!(gauge.borrow().value, Some(Value::from(0)));

        entity.set("x", Value::from(6));
        assert!(queue.is_idle());
    }

    #[test]
    fn test_relink_replaces_subscriptions() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let first = Observer::from_json(json!({"x": 1}));
        let second = Observer::from_json(json!({"x": 2}));

        binding.link(LinkTargets::new(&first, "x"));
        binding.link(LinkTargets::new(&second, "x"));
        assert_eq!(gauge.borrow().value, Some(Value::from(2)));

        first.set("x", Value::from(10));
        assert!(queue.is_idle());
    }

    #[test]
    fn test_relink_after_supersession_follows_newer_observer() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let old = Observer::from_json(json!({"x": 1}));
        let newer = Observer::from_json(json!({"x": 2}));

        binding.link(LinkTargets::new(&old, "x"));
        old.supersede(&newer);
        newer.set("x", Value::from(3));
        assert!(queue.is_idle());

        binding.link(LinkTargets::new(&old, "x"));
        assert_eq!(gauge.borrow().value, Some(Value::from(3)));

        newer.set("x", Value::from(4));
        queue.run_pending();
        assert_eq!(gauge.borrow().value, Some(Value::from(4)));

        old.set("x", Value::from(9));
        assert!(queue.is_idle());
    }

    #[test]
    fn test_custom_update() {
        let queue = TickQueue::new();
        let (binding, gauge) = setup(&queue);
        let binding = binding.with_custom_update(|element, observers, paths| {
            let count = observers.len() + paths.len();
            element.set_value(Some(Value::from(count as i64)));
        });
        let entity = Observer::new();

        binding.link(LinkTargets::new(&entity, ["a", "b"]));
        assert_eq!(gauge.borrow().value, Some(Value::from(3)));
    }

    #[test]
    fn test_update_without_element_clears_latch() {
        let queue = TickQueue::new();
        let binding = ObserversToElement::new(Rc::new(queue.clone()));
        let entity = Observer::new();
        binding.link(LinkTargets::new(&entity, "x"));

        entity.set("x", Value::from(1));
        assert!(binding.applying_change());
        queue.run_pending();
        assert!(!binding.applying_change());
    }

    #[test]
    fn test_clone_binding_is_unlinked() {
        let queue = TickQueue::new();
        let (binding, _gauge) = setup(&queue);
        let entity = Observer::new();
        binding.link(LinkTargets::new(&entity, "x"));

        let clone = binding.clone_binding();
        assert!(!clone.linked());
        assert!(clone.base().element().is_none());
        assert!(clone.base().paths().is_empty());
    }
}
