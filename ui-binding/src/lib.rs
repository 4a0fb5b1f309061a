//! ui-binding: keep UI elements and observable data in sync
//!
//! Elements hold a value; observers hold JSON-like documents. A binding links
//! an element to one or more (observer, path) targets and moves values in one
//! or both directions, recording element edits in an undo/redo [`History`].
//!
//! # Example
//! ```
//! use std::rc::Rc;
//! use ui_binding::prelude::*;
//!
//! #[derive(Bindable, Default)]
//! struct TextField {
//!     value: Option<Value>,
//! }
//!
//! let history = History::default();
//! let queue = TickQueue::new();
//! let entity = Observer::from_json(serde_json::json!({"name": "box"}));
//!
//! let binding = TwoWay::new(BindingOptions::default(), Rc::new(queue.clone()))
//!     .with_history(history.clone());
//! let field = BoundElement::with_binding(TextField::default(), binding);
//! field.link(&entity, "name");
//! assert_eq!(field.value(), Some(Value::from("box")));
//!
//! field.commit(Some(Value::from("crate"))).unwrap();
//! assert_eq!(entity.get("name"), Some(Value::from("crate")));
//!
//! history.undo();
//! queue.run_pending();
//! assert_eq!(field.value(), Some(Value::from("box")));
//! ```

// Re-export everything from core
pub use ui_binding_core::*;

// Re-export derive macros
pub use ui_binding_macros::Bindable;

/// Prelude for convenient imports
pub mod prelude {
    pub use ui_binding_core::prelude::*;

    // Derive macros
    pub use ui_binding_macros::Bindable;
}
