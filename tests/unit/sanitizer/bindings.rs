use super::*;
use serde_json::json;

fn schema() -> Value {
    json!({
        "title": {"type": "string", "contentType": "text/plain"},
        "fontSize": {"type": "number", "unit": "px"},
        "opacity": {"type": "number"},
        "color": {"type": "color"},
    })
}

#[test]
fn string_with_content_type_goes_to_text_content() {
    let mut values = BTreeMap::new();
    values.insert("title".to_string(), json!("Breaking News"));
    let bindings = derive_bindings(&schema(), &values, &BTreeMap::new());
    assert_eq!(bindings.text_content.get("title").unwrap(), "Breaking News");
    assert_eq!(bindings.text_types.get("title").unwrap(), "text/plain");
}

#[test]
fn number_with_unit_becomes_css_variable() {
    let mut values = BTreeMap::new();
    values.insert("fontSize".to_string(), json!(24));
    let bindings = derive_bindings(&schema(), &values, &BTreeMap::new());
    assert_eq!(bindings.css_variables.get("--fontSize").unwrap(), "24px");
}

#[test]
fn number_without_unit_has_no_suffix() {
    let mut values = BTreeMap::new();
    values.insert("opacity".to_string(), json!(0.5));
    let bindings = derive_bindings(&schema(), &values, &BTreeMap::new());
    assert_eq!(bindings.css_variables.get("--opacity").unwrap(), "0.5");
}

#[test]
fn other_types_stringify_into_css_variable() {
    let mut values = BTreeMap::new();
    values.insert("color".to_string(), json!("#ff0000"));
    let bindings = derive_bindings(&schema(), &values, &BTreeMap::new());
    assert_eq!(bindings.css_variables.get("--color").unwrap(), "#ff0000");
}

#[test]
fn unspecified_keys_are_skipped() {
    let bindings = derive_bindings(&schema(), &BTreeMap::new(), &BTreeMap::new());
    assert!(bindings.css_variables.is_empty());
    assert!(bindings.text_content.is_empty());
}

#[test]
fn values_take_priority_over_defaults() {
    let mut values = BTreeMap::new();
    values.insert("opacity".to_string(), json!(1.0));
    let mut defaults = BTreeMap::new();
    defaults.insert("opacity".to_string(), json!(0.2));
    let bindings = derive_bindings(&schema(), &values, &defaults);
    assert_eq!(bindings.css_variables.get("--opacity").unwrap(), "1.0");
}

#[test]
fn null_value_falls_through_to_default() {
    let mut values = BTreeMap::new();
    values.insert("opacity".to_string(), Value::Null);
    let mut defaults = BTreeMap::new();
    defaults.insert("opacity".to_string(), json!(0.2));
    let bindings = derive_bindings(&schema(), &values, &defaults);
    assert_eq!(bindings.css_variables.get("--opacity").unwrap(), "0.2");
}

#[test]
fn known_animation_value_maps_to_class() {
    let mut values = BTreeMap::new();
    values.insert("animation".to_string(), json!("slide-up"));
    let bindings = derive_bindings(&schema(), &values, &BTreeMap::new());
    assert_eq!(bindings.animation_class, "anim-slide-up");
}

#[test]
fn unknown_animation_value_falls_back_to_ease_out() {
    let mut values = BTreeMap::new();
    values.insert("animation".to_string(), json!("bounce-crazy"));
    let bindings = derive_bindings(&schema(), &values, &BTreeMap::new());
    assert_eq!(bindings.animation_class, "anim-ease-out");
}

#[test]
fn missing_animation_value_falls_back_to_ease_out() {
    let bindings = derive_bindings(&schema(), &BTreeMap::new(), &BTreeMap::new());
    assert_eq!(bindings.animation_class, "anim-ease-out");
}
