//! Per-instance publish/subscribe
//!
//! Every observer, history stack and binding owns an [`Events`] emitter.
//! Handlers are keyed by event name (for observers: `"position.x:set"`,
//! `"*:insert"`, ...) and receive a reference to the payload.
//!
//! Emission snapshots the handler list before calling anything, so handlers may
//! freely subscribe, unbind or emit again while being called.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<dyn Fn(&T)>;

struct EventsInner<T> {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, Handler<T>)>>,
}

/// Event emitter shared by cloning (clones see the same handlers)
pub struct Events<T> {
    inner: Rc<RefCell<EventsInner<T>>>,
}

impl<T> Clone for Events<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Events<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Events<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let count: usize = inner.handlers.values().map(Vec::len).sum();
        f.debug_struct("Events")
            .field("event_names", &inner.handlers.len())
            .field("handler_count", &count)
            .finish()
    }
}

impl<T> Events<T> {
    /// Create an emitter with no handlers
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(EventsInner {
                next_id: 0,
                handlers: HashMap::new(),
            })),
        }
    }

    /// Whether any handler is registered for `name`
    pub fn has_handlers(&self, name: &str) -> bool {
        self.inner
            .borrow()
            .handlers
            .get(name)
            .is_some_and(|list| !list.is_empty())
    }

    /// Total number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.inner.borrow().handlers.values().map(Vec::len).sum()
    }

    /// Call every handler registered for `name`, in registration order
    pub fn emit(&self, name: &str, payload: &T) {
        let handlers: Vec<Handler<T>> = match self.inner.borrow().handlers.get(name) {
            Some(list) => list.iter().map(|(_, h)| Rc::clone(h)).collect(),
            None => return,
        };
        for handler in handlers {
            handler(payload);
        }
    }

    /// Remove every handler
    pub fn unbind_all(&self) {
        self.inner.borrow_mut().handlers.clear();
    }
}

impl<T: 'static> Events<T> {
    /// Register a handler for `name`
    ///
    /// The handler stays registered until the returned [`EventHandle`] is
    /// unbound. Dropping the handle does *not* unbind.
    pub fn on(&self, name: impl Into<String>, handler: impl Fn(&T) + 'static) -> EventHandle {
        let name = name.into();
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .handlers
                .entry(name.clone())
                .or_default()
                .push((id, Rc::new(handler)));
            id
        };

        let weak: Weak<RefCell<EventsInner<T>>> = Rc::downgrade(&self.inner);
        EventHandle::new(name.clone(), move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.borrow_mut();
                let now_empty = match inner.handlers.get_mut(&name) {
                    Some(list) => {
                        list.retain(|(handler_id, _)| *handler_id != id);
                        list.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    inner.handlers.remove(&name);
                }
            }
        })
    }
}

/// Handle returned by [`Events::on`], used to remove the handler
pub struct EventHandle {
    name: String,
    unbind: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandle")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl EventHandle {
    fn new(name: String, unbind: impl FnOnce() + 'static) -> Self {
        Self {
            name,
            unbind: Some(Box::new(unbind)),
        }
    }

    /// The event name this handle was registered for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`unbind`](Self::unbind) has not been called yet
    pub fn is_bound(&self) -> bool {
        self.unbind.is_some()
    }

    /// Remove the handler from its emitter. Idempotent.
    pub fn unbind(&mut self) {
        if let Some(unbind) = self.unbind.take() {
            unbind();
        }
    }
}
