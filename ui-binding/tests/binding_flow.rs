//! End-to-end binding scenarios across observers, elements and history

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use ui_binding::debug::{HistoryLogConfig, HistoryLogKind, HistoryLogger};
use ui_binding::testing::{TestElement, TestHarness};
use ui_binding::prelude::*;
use ui_binding::{assert_assigned, assert_observer_value, BindingEvent, ElementRef};

#[test]
fn test_inspector_edits_selection() {
    let harness = TestHarness::new();
    let a = harness.observer(json!({"position": {"x": 1}}));
    let b = harness.observer(json!({"position": {"x": 2}}));

    let field = harness.bind(harness.two_way(BindingOptions::new().prefix("entity.")));
    field.link(vec![a.clone(), b.clone()], "position.x");

    // differing values show as nothing
    assert_assigned!(field.element(), last = None);
    assert_eq!(field.element().borrow().multi_assignments.len(), 1);

    field.commit(Some(Value::from(10))).unwrap();
    assert_observer_value!(a, "position.x", 10);
    assert_observer_value!(b, "position.x", 10);
    assert_eq!(
        harness.history().current_name().as_deref(),
        Some("entity.position.x")
    );

    harness.history().undo();
    harness.tick();
    assert_observer_value!(a, "position.x", 1);
    assert_observer_value!(b, "position.x", 2);
    assert_assigned!(field.element(), last = None);

    harness.history().redo();
    harness.tick();
    assert_observer_value!(a, "position.x", 10);
    assert_assigned!(field.element(), last = 10);
}

#[test]
fn test_vector_field_over_three_paths() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"scale": {"x": 1, "y": 2}}));

    let field = harness.bind(harness.two_way(BindingOptions::new().name("scale")));
    field.link(&entity, ["scale.x", "scale.y", "scale.z"]);
    assert_assigned!(field.element(), last = vec![Value::from(1), Value::from(2), Value::Null]);

    field.commit(Some(Value::from(vec![3, 4, 5]))).unwrap();
    assert_observer_value!(entity, "scale.z", 5);
    assert_eq!(harness.history().current_name().as_deref(), Some("scale"));

    harness.history().undo();
    harness.tick();
    assert_observer_value!(entity, "scale.z", None);
    assert_assigned!(field.element(), last = vec![Value::from(1), Value::from(2), Value::Null]);

    assert_eq!(
        field.commit(Some(Value::from(vec![1, 2]))),
        Err(BindError::ShapeMismatch {
            expected: 3,
            found: 2
        })
    );
    assert_observer_value!(entity, "scale.x", 1);
    assert_assigned!(field.element(), last = vec![Value::from(1), Value::from(2), Value::Null]);
}

#[test]
fn test_rejected_commit_keeps_element_in_sync() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"scale": {"x": 1, "y": 2, "z": 3}}));

    let field = harness.bind(harness.two_way(BindingOptions::new().name("scale")));
    field.link(&entity, ["scale.x", "scale.y", "scale.z"]);

    assert!(field.commit(Some(Value::from(vec![9, 9]))).is_err());
    assert_assigned!(field.element(), count = 1);
    assert_eq!(field.value(), Some(Value::from(vec![1, 2, 3])));
    assert_observer_value!(entity, "scale.x", 1);
    assert!(harness.history().is_empty());
}

#[test]
fn test_tag_list_add_remove() {
    let harness = TestHarness::new();
    let a = harness.observer(json!({"tags": ["enemy"]}));
    let b = harness.observer(json!({"tags": []}));

    let binding = harness.element_to_observers(BindingOptions::new().name("tags"));
    binding.link(LinkTargets::new(vec![a.clone(), b.clone()], "tags"));

    assert_eq!(binding.add_value(Value::from("enemy")), Ok(true));
    assert_observer_value!(a, "tags", vec!["enemy"]);
    assert_observer_value!(b, "tags", vec!["enemy"]);

    // present everywhere: nothing to do and nothing recorded
    let depth = harness.history().len();
    assert_eq!(binding.add_value(Value::from("enemy")), Ok(false));
    assert_eq!(harness.history().len(), depth);

    assert_eq!(binding.remove_value(Value::from("enemy")), Ok(true));
    assert_observer_value!(a, "tags", Vec::<Value>::new());

    harness.history().undo();
    assert_observer_value!(a, "tags", vec!["enemy"]);
    assert_observer_value!(b, "tags", vec!["enemy"]);

    harness.history().undo();
    assert_observer_value!(a, "tags", vec!["enemy"]);
    assert_observer_value!(b, "tags", Vec::<Value>::new());
}

#[test]
fn test_drag_combines_into_one_action() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"x": 0}));

    let drag = harness.element_to_observers(BindingOptions::new().postfix(" (drag)").combine(true));
    drag.link(LinkTargets::new(&entity, "x"));
    for x in 1..=5 {
        drag.set_value(Some(Value::from(x))).unwrap();
    }

    assert_eq!(harness.history().len(), 1);
    assert_eq!(
        harness.history().current_name().as_deref(),
        Some("x (drag)")
    );

    harness.history().undo();
    assert_observer_value!(entity, "x", 0);
    harness.history().redo();
    assert_observer_value!(entity, "x", 5);
}

#[test]
fn test_binding_write_does_not_double_record() {
    let harness = TestHarness::new();
    let entity = harness.tracked_observer(json!({"name": "a"}), "entity.");

    let field = harness.bind(harness.two_way(BindingOptions::new().prefix("inspector.")));
    field.link(&entity, "name");
    field.commit(Some(Value::from("b"))).unwrap();

    assert_eq!(harness.history().names(), vec!["inspector.name".to_string()]);
    assert!(entity.history_enabled());

    // the observer still records its own edits afterwards
    entity.set("name", Value::from("c"));
    assert_eq!(
        harness.history().current_name().as_deref(),
        Some("entity.name")
    );
}

#[test]
fn test_external_changes_coalesce() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"x": 0}));

    let field = harness.bind(harness.observers_to_element());
    field.link(&entity, "x");
    field.element().borrow_mut().clear_assignments();

    entity.set("x", Value::from(1));
    entity.set("x", Value::from(2));
    entity.unset("x");
    entity.set("x", Value::from(3));
    assert_eq!(harness.queue().pending(), 1);

    harness.tick();
    assert_assigned!(field.element(), count = 1);
    assert_assigned!(field.element(), last = 3);
    assert!(field.element().borrow().last_assigned().is_some_and(|a| !a.render_changes));
}

#[test]
fn test_initial_sync_suppresses_render_changes() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"x": 0}));

    let field = BoundElement::with_binding(
        TestElement::rendering_changes(),
        harness.observers_to_element(),
    );
    field.link(&entity, "x");
    entity.set("x", Value::from(1));
    harness.tick();

    let element = field.element().borrow();
    assert!(!element.assignments[0].render_changes);
    assert!(element.assignments[1].render_changes);
    assert!(element.render_changes);
}

#[test]
fn test_swapping_binding_relinks() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"x": 1}));

    let mut field = harness.bind(harness.element_to_observers(BindingOptions::default()));
    field.link(&entity, "x");

    let previous = field.set_binding(Some(Box::new(harness.two_way(BindingOptions::default()))));
    assert!(previous.is_some_and(|old| !old.linked()));
    assert!(field.binding().is_some_and(|binding| binding.linked()));
    assert_assigned!(field.element(), last = 1);

    entity.set("x", Value::from(2));
    harness.tick();
    assert_assigned!(field.element(), last = 2);
}

#[test]
fn test_cloned_binding_is_independent() {
    let harness = TestHarness::new();
    let a = harness.observer(json!({"x": 0}));
    let b = harness.observer(json!({"x": 0}));

    let original = harness.two_way(BindingOptions::new().name("x"));
    let clone = original.clone_binding();
    let first = harness.bind(original);
    first.link(&a, "x");

    let element = Rc::new(RefCell::new(TestElement::new()));
    let dyn_element: ElementRef = element.clone();
    clone.set_element(Some(Rc::downgrade(&dyn_element)));
    clone.link(LinkTargets::new(&b, "x"));

    clone.set_value(Some(Value::from(9))).unwrap();
    assert_observer_value!(a, "x", 0);
    assert_observer_value!(b, "x", 9);

    a.set("x", Value::from(4));
    harness.tick();
    assert_assigned!(element, last = 0);
    assert_assigned!(first.element(), last = 4);
}

#[test]
fn test_replaced_document_keeps_history_working() {
    let harness = TestHarness::new();
    let old = harness.observer(json!({"x": 0}));

    let binding = harness.element_to_observers(BindingOptions::default());
    binding.link(LinkTargets::new(&old, "x"));
    binding.set_value(Some(Value::from(1))).unwrap();

    // the document is reloaded into a new observer
    let new = harness.observer(old.snapshot().into());
    old.supersede(&new);

    harness.history().undo();
    assert_observer_value!(new, "x", 0);
    harness.history().redo();
    assert_observer_value!(new, "x", 1);
}

#[test]
fn test_destroyed_observer_is_skipped() {
    let harness = TestHarness::new();
    let a = harness.observer(json!({"x": 0}));
    let b = harness.observer(json!({"x": 0}));

    let binding = harness.element_to_observers(BindingOptions::default());
    binding.link(LinkTargets::new(vec![a.clone(), b.clone()], "x"));
    a.destroy();

    assert_eq!(binding.set_value(Some(Value::from(3))), Ok(true));
    assert_observer_value!(b, "x", 3);
}

#[test]
fn test_binding_events_around_undo() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"x": 0}));
    let binding = harness.element_to_observers(BindingOptions::default());
    binding.link(LinkTargets::new(&entity, "x"));

    let seen = Rc::new(RefCell::new(Vec::new()));
    for name in ["history:init", "history:undo", "history:redo"] {
        let seen = seen.clone();
        binding.base().on(name, move |event: &BindingEvent| {
            seen.borrow_mut().push(event.event_name());
        });
    }

    binding.set_value(Some(Value::from(1))).unwrap();
    harness.history().undo();
    harness.history().redo();

    assert_eq!(
        *seen.borrow(),
        vec!["history:init", "history:redo", "history:undo", "history:redo"]
    );
}

#[test]
fn test_settings_drive_history_and_naming() {
    let settings = Settings::from_json_str(
        r#"{
            "history": {"max_depth": 2},
            "binding": {"history_prefix": "scene.", "history_combine": false}
        }"#,
    )
    .unwrap();

    let harness = TestHarness::with_history_config(settings.history.clone());
    let entity = harness.observer(json!({}));
    let binding = harness.element_to_observers(settings.binding.clone());
    binding.link(LinkTargets::new(&entity, "a"));

    for value in 1..=3 {
        binding.set_value(Some(Value::from(value))).unwrap();
    }

    assert_eq!(harness.history().len(), 2);
    assert_eq!(harness.history().current_name().as_deref(), Some("scene.a"));
}

#[test]
fn test_history_logger_sees_binding_actions() {
    let harness = TestHarness::new();
    let entity = harness.observer(json!({"x": 0}));
    let logger = HistoryLogger::with_log(harness.history(), HistoryLogConfig::default());

    let binding = harness.element_to_observers(BindingOptions::default());
    binding.link(LinkTargets::new(&entity, "x"));
    binding.set_value(Some(Value::from(1))).unwrap();
    harness.history().undo();

    let log = logger.log().unwrap().borrow();
    let kinds: Vec<HistoryLogKind> = log.entries().map(|entry| entry.kind).collect();
    assert_eq!(kinds, vec![HistoryLogKind::Added, HistoryLogKind::Undone]);
}

#[test]
fn test_observer_history_prefix() {
    let harness = TestHarness::new();
    let entity = Observer::from_json(json!({"x": 0}));
    entity.attach_history(ObserverHistory::new(harness.history().clone()).prefix("node."));

    entity.set("x", Value::from(1));
    assert_eq!(harness.history().current_name().as_deref(), Some("node.x"));
}

#[cfg(feature = "tasks")]
#[tokio::test]
async fn test_local_task_scheduler_end_to_end() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let entity = Observer::from_json(json!({"x": 0}));
            let binding = ObserversToElement::new(Rc::new(LocalTaskScheduler::new()));
            let field = BoundElement::with_binding(TestElement::new(), binding);
            field.link(&entity, "x");

            entity.set("x", Value::from(1));
            entity.set("x", Value::from(2));
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;

            assert_assigned!(field.element(), count = 2);
            assert_assigned!(field.element(), last = 2);
        })
        .await;
}
