//! Tests for #[derive(Bindable)] macro

use std::rc::Rc;

use ui_binding::prelude::*;

#[test]
fn test_value_field_by_name() {
    #[derive(Bindable, Default)]
    struct Label {
        value: Option<Value>,
        caption: String,
    }

    let mut label = Label::default();
    label.set_value(Some(Value::from("hello")));
    assert_eq!(label.value(), Some(Value::from("hello")));
    assert!(label.caption.is_empty());
    assert!(!label.render_changes());
}

#[test]
fn test_marked_value_field() {
    #[derive(Bindable, Default)]
    struct Slider {
        #[bindable(value)]
        position: Option<Value>,
        value: u8,
    }

    let mut slider = Slider::default();
    slider.set_value(Some(Value::from(0.5)));
    assert_eq!(slider.position, Some(Value::from(0.5)));
    assert_eq!(slider.value, 0);
}

#[test]
fn test_render_changes_field() {
    #[derive(Bindable, Default)]
    struct Field {
        value: Option<Value>,
        #[bindable(render_changes)]
        flash: bool,
    }

    let mut field = Field::default();
    field.set_render_changes(true);
    assert!(field.flash);
    assert!(field.render_changes());
}

#[test]
fn test_values_field_keeps_per_observer_values() {
    #[derive(Bindable, Default)]
    struct MultiField {
        value: Option<Value>,
        #[bindable(values)]
        per_observer: Vec<Option<Value>>,
    }

    let mut field = MultiField::default();
    field.set_values(vec![Some(Value::from(1)), Some(Value::from(2))]);
    assert_eq!(field.value, None);
    assert_eq!(field.per_observer.len(), 2);

    field.set_values(vec![Some(Value::from(3)), Some(Value::from(3))]);
    assert_eq!(field.value, Some(Value::from(3)));
}

#[test]
fn test_on_change_hook() {
    #[derive(Bindable, Default)]
    #[bindable(on_change = "refresh")]
    struct NumberField {
        value: Option<Value>,
        text: String,
    }

    impl NumberField {
        fn refresh(&mut self) {
            self.text = self
                .value
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
        }
    }

    let mut field = NumberField::default();
    field.set_value(Some(Value::from(7)));
    assert_eq!(field.text, Value::from(7).to_string());

    field.set_value(None);
    assert!(field.text.is_empty());
}

#[test]
fn test_generic_struct() {
    #[derive(Bindable, Default)]
    struct Tagged<T: Default> {
        value: Option<Value>,
        tag: T,
    }

    let mut field: Tagged<u32> = Tagged::default();
    field.set_value(Some(Value::from(true)));
    assert_eq!(field.value(), Some(Value::from(true)));
    assert_eq!(field.tag, 0);
}

#[test]
fn test_derived_element_in_two_way_binding() {
    #[derive(Bindable, Default)]
    struct Checkbox {
        #[bindable(value)]
        checked: Option<Value>,
        #[bindable(render_changes)]
        flash: bool,
    }

    let history = History::default();
    let queue = TickQueue::new();
    let entity = Observer::from_json(serde_json::json!({"enabled": false}));

    let binding = TwoWay::new(BindingOptions::default(), Rc::new(queue.clone()))
        .with_history(history.clone());
    let checkbox = BoundElement::with_binding(
        Checkbox {
            flash: true,
            ..Checkbox::default()
        },
        binding,
    );
    checkbox.link(&entity, "enabled");
    assert_eq!(checkbox.value(), Some(Value::from(false)));
    assert!(checkbox.element().borrow().flash);

    checkbox.commit(Some(Value::from(true))).unwrap();
    assert_eq!(entity.get("enabled"), Some(Value::from(true)));

    history.undo();
    queue.run_pending();
    assert_eq!(checkbox.element().borrow().checked, Some(Value::from(false)));
}
