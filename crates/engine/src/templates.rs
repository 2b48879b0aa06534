//! Fixed-point template propagation over the input bag.
//!
//! Group and call actions may declare an `inputs` template: a nested JSON
//! object whose string leaves contain `{{ dotted.path }}` placeholders. The
//! propagator renders every leaf against the live bag and writes the result
//! into both the template and the bag at the same key path, then repeats
//! until a pass changes nothing. Chained references therefore resolve no
//! matter in which key order they are declared.
//!
//! Rendering is plain dotted-path substitution:
//!
//! - strings render raw, numbers and booleans via `Display`, `null` as empty
//! - objects and arrays render as compact JSON
//! - a placeholder whose path is absent stays verbatim so a later pass (or a
//!   later walker visit) can still resolve it
//!
//! Passes are bounded; a template that keeps changing past the bound fails
//! with [`EngineError::TemplateCycle`].

use serde_json::{Map as JsonMap, Value};
use tracing::{debug, warn};

use crate::{
    error::{EngineError, EngineResult},
    inputs::{InputBag, lookup_path, set_segments},
};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Structured unresolved template reference diagnostic.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnresolvedTemplateRef {
    /// Key path of the template leaf containing the placeholder.
    pub source_path: String,
    /// Placeholder path without delimiters.
    pub expression: String,
}

/// Extracts placeholder paths from a string.
///
/// Returned expressions are trimmed and do not include `{{` or `}}`.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let mut expressions = Vec::new();
    let mut remainder = text;

    while let Some(start) = remainder.find(OPEN) {
        let after_start = &remainder[start + OPEN.len()..];
        let Some(end) = after_start.find(CLOSE) else {
            break;
        };
        let expression = after_start[..end].trim();
        if !expression.is_empty() {
            expressions.push(expression.to_string());
        }
        remainder = &after_start[end + CLOSE.len()..];
    }

    expressions
}

/// Renders `text` against the current contents of `inputs`.
pub fn render_template(text: &str, inputs: &InputBag) -> String {
    inputs.update(|bag| render_str(text, bag))
}

fn render_str(text: &str, bag: &JsonMap<String, Value>) -> String {
    let mut rendered = String::with_capacity(text.len());
    let mut remainder = text;

    while let Some(start) = remainder.find(OPEN) {
        let after_start = &remainder[start + OPEN.len()..];
        let Some(end) = after_start.find(CLOSE) else {
            break;
        };
        rendered.push_str(&remainder[..start]);
        let placeholder = &remainder[start..start + OPEN.len() + end + CLOSE.len()];
        let expression = after_start[..end].trim();
        match lookup_path(bag, expression).filter(|_| !expression.is_empty()) {
            Some(value) => rendered.push_str(&render_value(value)),
            None => rendered.push_str(placeholder),
        }
        remainder = &after_start[end + CLOSE.len()..];
    }

    rendered.push_str(remainder);
    rendered
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Propagates `schema` into `inputs` until a fixed point is reached.
///
/// # Arguments
/// - `schema`: Template object; rendered in place.
/// - `inputs`: Live input bag used both as render source and write target.
/// - `max_passes`: Upper bound on passes before the template is declared cyclic.
///
/// # Errors
/// Returns [`EngineError::TemplateCycle`] when the last allowed pass still
/// changed something, naming the key paths that kept changing.
pub fn propagate(schema: &mut JsonMap<String, Value>, inputs: &InputBag, max_passes: usize) -> EngineResult<()> {
    inputs.update(|bag| {
        let mut changed = Vec::new();
        for pass in 1..=max_passes {
            changed.clear();
            let mut prefix = Vec::new();
            replace_pass(schema, bag, &mut prefix, &mut changed);
            if changed.is_empty() {
                debug!(passes = pass, keys = schema.len(), "template propagation reached a fixed point");
                report_unresolved(schema, bag);
                return Ok(());
            }
        }
        Err(EngineError::TemplateCycle {
            passes: max_passes,
            keys: changed,
        })
    })
}

/// One pass over `schema`; pushes the key path of every leaf that changed
/// either in the template or in the bag.
fn replace_pass(schema: &mut JsonMap<String, Value>, bag: &mut JsonMap<String, Value>, prefix: &mut Vec<String>, changed: &mut Vec<String>) {
    for (key, value) in schema.iter_mut() {
        prefix.push(key.clone());
        match value {
            Value::String(text) => {
                let rendered = render_str(text, bag);
                let template_changed = rendered != *text;
                if template_changed {
                    *text = rendered.clone();
                }
                if write_leaf(bag, prefix, Value::String(rendered)) || template_changed {
                    changed.push(prefix.join("."));
                }
            }
            Value::Object(nested) => {
                if ensure_object(bag, prefix) {
                    changed.push(prefix.join("."));
                }
                replace_pass(nested, bag, prefix, changed);
            }
            Value::Array(items) => {
                let mut template_changed = false;
                for item in items.iter_mut() {
                    if let Value::String(text) = item {
                        let rendered = render_str(text, bag);
                        if rendered != *text {
                            *text = rendered;
                            template_changed = true;
                        }
                    }
                }
                if write_leaf(bag, prefix, Value::Array(items.clone())) || template_changed {
                    changed.push(prefix.join("."));
                }
            }
            scalar => {
                if write_leaf(bag, prefix, scalar.clone()) {
                    changed.push(prefix.join("."));
                }
            }
        }
        prefix.pop();
    }
}

fn value_at<'a>(bag: &'a JsonMap<String, Value>, segments: &[String]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    rest.iter()
        .try_fold(bag.get(first)?, |current, segment| current.as_object()?.get(segment))
}

/// Writes `value` at `segments`, returning whether the bag changed.
fn write_leaf(bag: &mut JsonMap<String, Value>, segments: &[String], value: Value) -> bool {
    if value_at(bag, segments) == Some(&value) {
        return false;
    }
    set_segments(bag, segments, value);
    true
}

/// Makes sure an object exists at `segments` so the template shape merges into it.
fn ensure_object(bag: &mut JsonMap<String, Value>, segments: &[String]) -> bool {
    if value_at(bag, segments).is_some_and(Value::is_object) {
        return false;
    }
    set_segments(bag, segments, Value::Object(JsonMap::new()));
    true
}

/// Collects placeholders in `value` that do not resolve against `bag`.
pub fn collect_unresolved(value: &Value, source_path: &str, bag: &JsonMap<String, Value>, unresolved: &mut Vec<UnresolvedTemplateRef>) {
    match value {
        Value::String(text) => {
            for expression in extract_placeholders(text) {
                if lookup_path(bag, &expression).is_none() {
                    unresolved.push(UnresolvedTemplateRef {
                        source_path: source_path.to_string(),
                        expression,
                    });
                }
            }
        }
        Value::Array(values) => {
            for (index, nested) in values.iter().enumerate() {
                collect_unresolved(nested, &format!("{source_path}[{index}]"), bag, unresolved);
            }
        }
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if source_path.is_empty() { key.clone() } else { format!("{source_path}.{key}") };
                collect_unresolved(nested, &path, bag, unresolved);
            }
        }
        _ => {}
    }
}

fn report_unresolved(schema: &JsonMap<String, Value>, bag: &JsonMap<String, Value>) {
    let mut unresolved = Vec::new();
    for (key, value) in schema {
        collect_unresolved(value, key, bag, &mut unresolved);
    }
    for reference in unresolved {
        warn!(
            source = %reference.source_path,
            expression = %reference.expression,
            "unresolved template reference left in place"
        );
    }
}
