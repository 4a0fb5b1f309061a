//! Test utilities for ui-binding applications
//!
//! - [`TestElement`]: a [`Bindable`] that records every assignment
//! - [`TestHarness`]: shared [`History`] and [`TickQueue`] with builders for
//!   observers, elements and bindings
//! - Assertion macros for observer values and element assignments
//!
//! # Example
//!
//! ```
//! use ui_binding_core::testing::TestHarness;
//! use ui_binding_core::{assert_assigned, assert_observer_value, BindingOptions};
//!
//! let harness = TestHarness::new();
//! let entity = harness.observer(serde_json::json!({"name": "crate"}));
//! let field = harness.bind(harness.two_way(BindingOptions::default()));
//! field.link(&entity, "name");
//!
//! field.commit(Some("barrel".into())).unwrap();
//! assert_observer_value!(entity, "name", "barrel");
//!
//! harness.history().undo();
//! harness.tick();
//! assert_assigned!(field.element(), last = "crate");
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::binding::{ElementToObservers, ObserversToElement, TwoWay};
use crate::config::{BindingOptions, HistoryConfig};
use crate::element::{collapse_values, Bindable, BoundElement};
use crate::history::History;
use crate::observer::{Observer, ObserverHistory};
use crate::scheduler::{Scheduler, TickQueue};
use crate::value::Value;

/// One assignment seen by a [`TestElement`]
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub value: Option<Value>,
    /// The element's `render_changes` flag at the time of the assignment
    pub render_changes: bool,
}

/// Element that records what it was given
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestElement {
    pub value: Option<Value>,
    pub render_changes: bool,
    pub assignments: Vec<Assignment>,
    /// Arguments of every `set_values` call
    pub multi_assignments: Vec<Vec<Option<Value>>>,
}

impl TestElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `render_changes` on
    pub fn rendering_changes() -> Self {
        Self {
            render_changes: true,
            ..Self::default()
        }
    }

    pub fn last_assigned(&self) -> Option<&Assignment> {
        self.assignments.last()
    }

    pub fn assigned_values(&self) -> Vec<Option<Value>> {
        self.assignments.iter().map(|a| a.value.clone()).collect()
    }

    pub fn clear_assignments(&mut self) {
        self.assignments.clear();
        self.multi_assignments.clear();
    }
}

impl Bindable for TestElement {
    fn value(&self) -> Option<Value> {
        self.value.clone()
    }

    fn set_value(&mut self, value: Option<Value>) {
        self.assignments.push(Assignment {
            value: value.clone(),
            render_changes: self.render_changes,
        });
        self.value = value;
    }

    fn set_values(&mut self, values: Vec<Option<Value>>) {
        self.set_value(collapse_values(&values));
        self.multi_assignments.push(values);
    }

    fn render_changes(&self) -> bool {
        self.render_changes
    }

    fn set_render_changes(&mut self, render_changes: bool) {
        self.render_changes = render_changes;
    }
}

/// Shared fixtures for binding tests
///
/// Every binding built here records into the harness history and schedules
/// deferred updates on the harness queue. Call [`tick`](Self::tick) to run them.
#[derive(Debug, Clone, Default)]
pub struct TestHarness {
    history: History,
    queue: TickQueue,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_config(config: HistoryConfig) -> Self {
        Self {
            history: History::new(config),
            queue: TickQueue::new(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn queue(&self) -> &TickQueue {
        &self.queue
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::new(self.queue.clone())
    }

    /// Observer over a JSON document
    pub fn observer(&self, json: serde_json::Value) -> Observer {
        Observer::from_json(json)
    }

    /// Observer that records its own mutations into the harness history
    pub fn tracked_observer(&self, json: serde_json::Value, prefix: &str) -> Observer {
        let observer = Observer::from_json(json);
        observer.attach_history(ObserverHistory::new(self.history.clone()).prefix(prefix));
        observer
    }

    pub fn element(&self) -> Rc<RefCell<TestElement>> {
        Rc::new(RefCell::new(TestElement::new()))
    }

    pub fn element_to_observers(&self, options: BindingOptions) -> ElementToObservers {
        ElementToObservers::new(options).with_history(self.history.clone())
    }

    pub fn observers_to_element(&self) -> ObserversToElement {
        ObserversToElement::new(self.scheduler())
    }

    pub fn two_way(&self, options: BindingOptions) -> TwoWay {
        TwoWay::new(options, self.scheduler()).with_history(self.history.clone())
    }

    /// A fresh [`TestElement`] driven by `binding`
    pub fn bind(
        &self,
        binding: impl crate::binding::Binding + 'static,
    ) -> BoundElement<TestElement> {
        BoundElement::with_binding(TestElement::new(), binding)
    }

    /// Run one tick of deferred updates
    pub fn tick(&self) -> usize {
        self.queue.run_pending()
    }

    /// Run ticks until nothing is queued, up to `max_ticks`
    pub fn settle(&self, max_ticks: usize) -> usize {
        let mut ran = 0;
        for _ in 0..max_ticks {
            if self.queue.is_idle() {
                break;
            }
            ran += self.tick();
        }
        ran
    }
}

/// Assert the value an observer holds at a path.
///
/// # Example
///
/// ```
/// use ui_binding_core::{assert_observer_value, Observer};
///
/// let entity = Observer::from_json(serde_json::json!({"x": 1, "tags": ["a"]}));
/// assert_observer_value!(entity, "x", 1);
/// assert_observer_value!(entity, "tags", vec!["a"]);
/// assert_observer_value!(entity, "missing", None);
/// ```
#[macro_export]
macro_rules! assert_observer_value {
    ($observer:expr, $path:expr, None) => {
        assert_eq!(
            $observer.get($path),
            None,
            "Expected `{}` to be unset",
            $path
        );
    };
    ($observer:expr, $path:expr, $expected:expr) => {
        assert_eq!(
            $observer.get($path),
            Some($crate::Value::from($expected)),
            "Unexpected value at `{}`",
            $path
        );
    };
}

/// Assert what a [`TestElement`] was assigned.
///
/// Accepts the element itself or an `Rc<RefCell<TestElement>>`.
///
/// # Example
///
/// ```
/// use ui_binding_core::assert_assigned;
/// use ui_binding_core::testing::TestElement;
/// use ui_binding_core::Bindable;
///
/// let mut element = TestElement::new();
/// element.set_value(Some(3.into()));
/// element.set_value(None);
///
/// assert_assigned!(element, count = 2);
/// assert_assigned!(element, last = None);
/// ```
#[macro_export]
macro_rules! assert_assigned {
    ($element:expr, count = $count:expr) => {{
        let element = $crate::testing::__element_ref(&$element);
        assert_eq!(
            element.assignments.len(),
            $count,
            "Unexpected assignments: {:?}",
            element.assignments
        );
    }};
    ($element:expr, last = None) => {{
        let element = $crate::testing::__element_ref(&$element);
        assert_eq!(
            element.last_assigned().map(|a| a.value.clone()),
            Some(None),
            "Expected the last assignment to clear the element, got: {:?}",
            element.assignments
        );
    }};
    ($element:expr, last = $value:expr) => {{
        let element = $crate::testing::__element_ref(&$element);
        assert_eq!(
            element.last_assigned().map(|a| a.value.clone()),
            Some(Some($crate::Value::from($value))),
            "Unexpected last assignment, got: {:?}",
            element.assignments
        );
    }};
}

/// Read access used by [`assert_assigned!`]
#[doc(hidden)]
pub trait ElementSnapshot {
    fn snapshot(&self) -> TestElement;
}

impl ElementSnapshot for TestElement {
    fn snapshot(&self) -> TestElement {
        self.clone()
    }
}

impl ElementSnapshot for Rc<RefCell<TestElement>> {
    fn snapshot(&self) -> TestElement {
        self.borrow().clone()
    }
}

impl ElementSnapshot for &Rc<RefCell<TestElement>> {
    fn snapshot(&self) -> TestElement {
        self.borrow().clone()
    }
}

#[doc(hidden)]
pub fn __element_ref(element: &impl ElementSnapshot) -> TestElement {
    element.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, LinkTargets};
    use serde_json::json;

    #[test]
    fn test_element_records_render_flag() {
        let mut element = TestElement::rendering_changes();
        element.set_value(Some(Value::from(1)));
        element.set_render_changes(false);
        element.set_value(Some(Value::from(2)));

        assert!(element.assignments[0].render_changes);
        assert!(!element.assignments[1].render_changes);
        assert_assigned!(element, count = 2);
        assert_assigned!(element, last = 2);
    }

    #[test]
    fn test_set_values_collapses() {
        let mut element = TestElement::new();
        element.set_values(vec![Some(Value::from(1)), Some(Value::from(1))]);
        element.set_values(vec![Some(Value::from(1)), Some(Value::from(2))]);

        assert_eq!(element.multi_assignments.len(), 2);
        assert_eq!(
            element.assigned_values(),
            vec![Some(Value::from(1)), None]
        );
    }

    #[test]
    fn test_harness_round_trip() {
        let harness = TestHarness::new();
        let entity = harness.observer(json!({"x": 1}));
        let element = harness.bind(harness.two_way(BindingOptions::default()));
        element.link(&entity, "x");
        assert_assigned!(element.element(), last = 1);

        element.commit(Some(Value::from(2))).unwrap();
        assert_observer_value!(entity, "x", 2);
        assert_eq!(harness.history().len(), 1);

        harness.history().undo();
        assert_eq!(harness.tick(), 1);
        assert_assigned!(element.element(), last = 1);
        assert_eq!(harness.settle(4), 0);
    }

    #[test]
    fn test_tracked_observer_records_history() {
        let harness = TestHarness::new();
        let entity = harness.tracked_observer(json!({}), "entity.");
        entity.set("name", Value::from("a"));

        assert_eq!(harness.history().current_name().as_deref(), Some("entity.name"));
        assert_observer_value!(entity, "name", "a");
        harness.history().undo();
        assert_observer_value!(entity, "name", None);
    }

    #[test]
    fn test_observers_to_element_on_harness_queue() {
        let harness = TestHarness::new();
        let entity = harness.observer(json!({"x": 1}));
        let binding = harness.observers_to_element();
        let element = harness.bind(binding.clone());
        binding.link(LinkTargets::new(&entity, "x"));

        entity.set("x", Value::from(5));
        assert_eq!(harness.queue().pending(), 1);
        harness.tick();
        assert_assigned!(element.element(), last = 5);
    }
}
