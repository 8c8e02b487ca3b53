use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const ANIMATION_KEY: &str = "animation";
const KNOWN_ANIMATIONS: &[&str] = &[
    "ease",
    "ease-in",
    "ease-out",
    "ease-in-out",
    "linear",
    "slide-up",
    "slide-down",
    "slide-left",
    "slide-right",
];
const DEFAULT_ANIMATION_CLASS: &str = "anim-ease-out";

/// One entry of a template's values schema.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Bindings derived from a template's schema plus the layer's current values.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedBindings {
    pub css_variables: BTreeMap<String, String>,
    pub text_content: BTreeMap<String, String>,
    pub text_types: BTreeMap<String, String>,
    pub animation_class: String,
}

/// Derive CSS variables, text substitutions, and the animation class from a template's schema
/// and the layer's resolved values (`spec.md` §4.2).
pub fn derive_bindings(
    schema: &Value,
    values: &BTreeMap<String, Value>,
    defaults: &BTreeMap<String, Value>,
) -> DerivedBindings {
    let mut out = DerivedBindings {
        animation_class: DEFAULT_ANIMATION_CLASS.to_string(),
        ..Default::default()
    };

    let Some(schema_obj) = schema.as_object() else {
        return out;
    };

    for (key, raw_entry) in schema_obj {
        let Ok(entry) = serde_json::from_value::<SchemaEntry>(raw_entry.clone()) else {
            continue;
        };
        let Some(value) = resolve(key, values, defaults) else {
            continue;
        };

        match (entry.kind.as_str(), &entry.content_type) {
            ("string", Some(content_type)) => {
                out.text_content
                    .insert(key.clone(), json_to_display_string(value));
                out.text_types.insert(key.clone(), content_type.clone());
            }
            ("number", _) => {
                let unit = entry.unit.clone().unwrap_or_default();
                out.css_variables.insert(
                    format!("--{key}"),
                    format!("{}{unit}", json_to_display_string(value)),
                );
            }
            _ => {
                out.css_variables
                    .insert(format!("--{key}"), json_to_display_string(value));
            }
        }
    }

    if let Some(anim_value) = resolve(ANIMATION_KEY, values, defaults) {
        if let Some(s) = anim_value.as_str() {
            if KNOWN_ANIMATIONS.contains(&s) {
                out.animation_class = format!("anim-{s}");
            }
        }
    }

    out
}

/// `values[key] ?? defaults[key]`, skipping explicit `null`.
fn resolve<'a>(
    key: &str,
    values: &'a BTreeMap<String, Value>,
    defaults: &'a BTreeMap<String, Value>,
) -> Option<&'a Value> {
    values
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| defaults.get(key).filter(|v| !v.is_null()))
}

fn json_to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sanitizer/bindings.rs"]
mod tests;
