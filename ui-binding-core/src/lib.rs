//! Core types for ui-binding
//!
//! This crate keeps UI elements and observable data in sync, and records the
//! edits an element makes so they can be undone.
//!
//! # Core Concepts
//!
//! - **Observer**: a shared, observable JSON-like document addressed by dotted paths
//! - **History**: an undo/redo stack of named actions
//! - **Binding**: links an element to one or more (observer, path) targets
//! - **Bindable**: the element side, anything holding a value
//!
//! Three binding kinds are provided:
//!
//! - [`ElementToObservers`]: element edits are written to the observers and
//!   recorded in history
//! - [`ObserversToElement`]: observer changes are coalesced and shown on the
//!   element on the next tick
//! - [`TwoWay`]: both, sharing one re-entrancy latch
//!
//! # Basic Example
//!
//! ```
//! use std::rc::Rc;
//! use ui_binding_core::prelude::*;
//! use ui_binding_core::testing::TestElement;
//!
//! let history = History::default();
//! let queue = TickQueue::new();
//! let entity = Observer::from_json(serde_json::json!({"position": {"x": 0}}));
//!
//! let binding = TwoWay::new(BindingOptions::new().prefix("entity."), Rc::new(queue.clone()))
//!     .with_history(history.clone());
//! let field = BoundElement::with_binding(TestElement::new(), binding);
//! field.link(&entity, "position.x");
//!
//! field.commit(Some(Value::from(12))).unwrap();
//! assert_eq!(entity.get("position.x"), Some(Value::from(12)));
//! assert_eq!(history.current_name().as_deref(), Some("entity.position.x"));
//!
//! history.undo();
//! queue.run_pending();
//! assert_eq!(field.value(), Some(Value::from(0)));
//! ```
//!
//! See [`binding`] for how observers and paths pair up.

pub mod binding;
pub mod config;
pub mod debug;
pub mod element;
pub mod error;
pub mod events;
pub mod history;
pub mod observer;
pub mod path;
pub mod scheduler;
pub mod testing;
pub mod value;

// Binding exports
pub use binding::{
    Binding, BindingBase, BindingEvent, CustomUpdate, ElementToObservers, IntoObservers,
    IntoPaths, LinkTargets, ObserversToElement, TwoWay, WeakBindingBase, WriteContext,
};
pub use element::{collapse_values, Bindable, BoundElement, ElementRef, WeakElement};

// Data exports
pub use history::{History, HistoryAction, HistoryEvent};
pub use observer::{
    ChangeKind, HistorySuspendGuard, Observer, ObserverEvent, ObserverHistory, WeakObserver,
};
pub use value::Value;

// Infrastructure exports
pub use config::{BindingOptions, HistoryConfig, Settings};
pub use error::{BindError, ConfigError};
pub use events::{EventHandle, Events};
#[cfg(feature = "tasks")]
pub use scheduler::LocalTaskScheduler;
pub use scheduler::{Scheduler, TaskHandle, TickQueue};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::binding::{
        Binding, ElementToObservers, IntoObservers, IntoPaths, LinkTargets, ObserversToElement,
        TwoWay,
    };
    pub use crate::config::{BindingOptions, HistoryConfig, Settings};
    pub use crate::element::{Bindable, BoundElement};
    pub use crate::error::BindError;
    pub use crate::history::{History, HistoryAction};
    pub use crate::observer::{ChangeKind, Observer, ObserverHistory, WeakObserver};
    #[cfg(feature = "tasks")]
    pub use crate::scheduler::LocalTaskScheduler;
    pub use crate::scheduler::{Scheduler, TickQueue};
    pub use crate::value::Value;
}
