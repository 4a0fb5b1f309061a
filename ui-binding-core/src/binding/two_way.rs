use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{
    Binding, BindingBase, BindingEvent, ElementToObservers, LinkTargets, ObserversToElement,
    WeakBindingBase,
};
use crate::config::BindingOptions;
use crate::element::{Bindable, WeakElement};
use crate::error::BindError;
use crate::events::EventHandle;
use crate::history::History;
use crate::observer::WeakObserver;
use crate::scheduler::Scheduler;
use crate::value::Value;

struct TwoWayInner {
    base: BindingBase,
    write: ElementToObservers,
    read: ObserversToElement,
    mirrors: RefCell<Vec<EventHandle>>,
}

impl Drop for TwoWayInner {
    fn drop(&mut self) {
        for mut handle in self.mirrors.get_mut().drain(..) {
            handle.unbind();
        }
    }
}

/// Element edits go to the observers, observer changes come back to the element
///
/// Built from an [`ElementToObservers`] and an [`ObserversToElement`]. The
/// halves share one latch: while either is applying a change the other
/// ignores its input, so a write is never echoed back onto the element.
#[derive(Clone)]
pub struct TwoWay {
    inner: Rc<TwoWayInner>,
}

impl fmt::Debug for TwoWay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoWay")
            .field("base", &self.inner.base)
            .field("read", &self.inner.read)
            .finish()
    }
}

impl TwoWay {
    pub fn new(options: BindingOptions, scheduler: Rc<dyn Scheduler>) -> Self {
        Self::from_parts(
            BindingBase::new(options.clone()),
            ElementToObservers::new(options),
            ObserversToElement::new(scheduler),
        )
    }

    fn from_parts(base: BindingBase, write: ElementToObservers, read: ObserversToElement) -> Self {
        let bases = [base.clone(), write.base().clone(), read.base().clone()];

        // Each latch flip is copied onto the other two bases. Flips only emit
        // on change, so the copies stop after one round.
        let mut mirrors = Vec::with_capacity(bases.len());
        for (i, source) in bases.iter().enumerate() {
            let others: Vec<WeakBindingBase> = bases
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| other.downgrade())
                .collect();
            mirrors.push(source.on("applying-change", move |event| {
                if let BindingEvent::ApplyingChange(value) = event {
                    for other in others.iter().filter_map(WeakBindingBase::upgrade) {
                        other.set_applying_change(*value);
                    }
                }
            }));
        }

        Self {
            inner: Rc::new(TwoWayInner {
                base,
                write,
                read,
                mirrors: RefCell::new(mirrors),
            }),
        }
    }

    /// Record writes into `history`
    pub fn with_history(self, history: History) -> Self {
        self.inner.base.set_history(Some(history.clone()));
        self.inner.write.base().set_history(Some(history));
        self
    }

    /// Use `update` instead of the default observer-to-element mapping
    pub fn with_custom_update(
        self,
        update: impl Fn(&mut dyn Bindable, &[WeakObserver], &[String]) + 'static,
    ) -> Self {
        let read = self.inner.read.clone().with_custom_update(update);
        Self::from_parts(self.inner.base.clone(), self.inner.write.clone(), read)
    }

    /// The observer-to-element half
    pub fn read_half(&self) -> &ObserversToElement {
        &self.inner.read
    }

    /// The element-to-observer half
    pub fn write_half(&self) -> &ElementToObservers {
        &self.inner.write
    }
}

impl Binding for TwoWay {
    fn base(&self) -> &BindingBase {
        &self.inner.base
    }

    fn link(&self, targets: LinkTargets) {
        self.unlink();
        self.inner.base.link(targets.clone());
        self.inner.write.link(targets.clone());
        self.inner.read.link(targets);
    }

    fn unlink(&self) {
        self.inner.read.unlink();
        self.inner.write.unlink();
        self.inner.base.unlink();
    }

    fn set_element(&self, element: Option<WeakElement>) {
        self.inner.base.set_element(element.clone());
        self.inner.write.set_element(element.clone());
        self.inner.read.set_element(element);
    }

    fn clone_binding(&self) -> Box<dyn Binding> {
        let options = self.inner.base.options();
        let history = self.inner.base.history();

        let base = BindingBase::new(options.clone());
        base.set_history(history.clone());
        let write = ElementToObservers::new(options);
        write.base().set_history(history);

        Box::new(Self::from_parts(base, write, self.inner.read.clone_unlinked()))
    }

    fn set_value(&self, value: Option<Value>) -> Result<bool, BindError> {
        if self.applying_change() {
            return Ok(false);
        }
        self.inner.write.set_value(value)
    }

    fn set_values(&self, values: Vec<Option<Value>>) -> Result<bool, BindError> {
        if self.applying_change() {
            return Ok(false);
        }
        self.inner.write.set_values(values)
    }

    fn add_values(&self, values: Vec<Value>) -> Result<bool, BindError> {
        if self.applying_change() {
            return Ok(false);
        }
        self.inner.write.add_values(values)
    }

    fn remove_values(&self, values: Vec<Value>) -> Result<bool, BindError> {
        if self.applying_change() {
            return Ok(false);
        }
        self.inner.write.remove_values(values)
    }
}
