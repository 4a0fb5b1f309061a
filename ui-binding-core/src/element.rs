//! Element side of a binding
//!
//! Widgets are represented only by the [`Bindable`] trait. A [`BoundElement`]
//! owns a widget together with its binding and keeps the two pointing at each
//! other.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::binding::{Binding, IntoObservers, IntoPaths, LinkTargets};
use crate::error::BindError;
use crate::value::Value;

/// Shared element reference handed to bindings
pub type ElementRef = Rc<RefCell<dyn Bindable>>;

/// Weak element reference held by bindings
pub type WeakElement = Weak<RefCell<dyn Bindable>>;

/// A UI element that holds a value a binding can read and assign
///
/// Use `#[derive(Bindable)]` from the facade crate for plain structs.
pub trait Bindable {
    fn value(&self) -> Option<Value>;

    fn set_value(&mut self, value: Option<Value>);

    /// Show one value per linked observer
    ///
    /// The default shows the shared value when all entries are equal and
    /// nothing (`None`) when they differ.
    fn set_values(&mut self, values: Vec<Option<Value>>) {
        self.set_value(collapse_values(&values));
    }

    /// Whether assignments flash a visual change indicator
    fn render_changes(&self) -> bool {
        false
    }

    fn set_render_changes(&mut self, _render_changes: bool) {}
}

/// The value shared by every entry, or `None` when they differ
pub fn collapse_values(values: &[Option<Value>]) -> Option<Value> {
    let first = values.first().cloned().flatten();
    if values.iter().all(|value| *value == first) {
        first
    } else {
        None
    }
}

/// Disables `render_changes` on an element until dropped
pub(crate) struct RenderChangesGuard {
    element: ElementRef,
    restore: bool,
}

impl RenderChangesGuard {
    pub(crate) fn new(element: ElementRef) -> Self {
        let restore = element.borrow().render_changes();
        element.borrow_mut().set_render_changes(false);
        Self { element, restore }
    }
}

impl Drop for RenderChangesGuard {
    fn drop(&mut self) {
        if let Ok(mut element) = self.element.try_borrow_mut() {
            element.set_render_changes(self.restore);
        }
    }
}

/// An element and the binding that drives it
pub struct BoundElement<E> {
    element: Rc<RefCell<E>>,
    binding: Option<Box<dyn Binding>>,
}

impl<E: fmt::Debug> fmt::Debug for BoundElement<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundElement")
            .field("element", &self.element)
            .field("binding", &self.binding)
            .finish()
    }
}

impl<E: Bindable + 'static> BoundElement<E> {
    pub fn new(element: E) -> Self {
        Self {
            element: Rc::new(RefCell::new(element)),
            binding: None,
        }
    }

    pub fn with_binding(element: E, binding: impl Binding + 'static) -> Self {
        let mut bound = Self::new(element);
        bound.set_binding(Some(Box::new(binding)));
        bound
    }

    pub fn element(&self) -> &Rc<RefCell<E>> {
        &self.element
    }

    pub fn value(&self) -> Option<Value> {
        self.element.borrow().value()
    }

    pub fn binding(&self) -> Option<&dyn Binding> {
        self.binding.as_deref()
    }

    /// Replace the binding
    ///
    /// The old binding is unlinked and detached; the new one is attached and,
    /// if the old one was linked, linked to the same observers and paths.
    pub fn set_binding(&mut self, binding: Option<Box<dyn Binding>>) -> Option<Box<dyn Binding>> {
        let previous = self.binding.take();
        let relink = previous.as_ref().and_then(|old| {
            let targets = old.linked().then(|| old.base().targets());
            old.unlink();
            old.set_element(None);
            targets
        });

        if let Some(binding) = binding {
            let element: ElementRef = self.element.clone();
            binding.set_element(Some(Rc::downgrade(&element)));
            if let Some(targets) = relink {
                binding.link(targets);
            }
            self.binding = Some(binding);
        }
        previous
    }

    /// Link the binding. No-op without a binding.
    pub fn link(&self, observers: impl IntoObservers, paths: impl IntoPaths) {
        if let Some(binding) = &self.binding {
            binding.link(LinkTargets::new(observers, paths));
        }
    }

    pub fn unlink(&self) {
        if let Some(binding) = &self.binding {
            binding.unlink();
        }
    }

    /// Push a user edit through the binding, then assign it to the element
    ///
    /// A rejected payload leaves the element untouched.
    pub fn commit(&self, value: Option<Value>) -> Result<bool, BindError> {
        let written = match &self.binding {
            Some(binding) => binding.set_value(value.clone())?,
            None => false,
        };
        self.element.borrow_mut().set_value(value);
        Ok(written)
    }

    /// Push one value per observer as a user edit, then assign the element
    pub fn commit_values(&self, values: Vec<Option<Value>>) -> Result<bool, BindError> {
        let written = match &self.binding {
            Some(binding) => binding.set_values(values.clone())?,
            None => false,
        };
        self.element.borrow_mut().set_values(values);
        Ok(written)
    }
}

impl<E> Drop for BoundElement<E> {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.unlink();
            binding.set_element(None);
        }
    }
}
