//! The console stringifier.
//!
//! Rules: `null` and `undefined` by name, numbers through the canonical
//! ECMAScript ToString, bigints as bare digits, arrays as `[e1, e2, ...]`
//! with elements recursively stringified (strings unquoted at the top
//! level, quoted inside containers), objects as `{k: v, ...}` in insertion
//! order, functions as `[Function]`, classes as `[class Name]`, instances
//! as `ClassName { k: v, ... }`.

use tsi_common::numeric::{format_bigint, format_number};

use crate::interp::Interpreter;
use crate::value::Value;

/// Stringify one value at top level (console.log argument position).
#[must_use]
pub fn display_value(interp: &Interpreter, value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        _ => inspect(interp, value, 0),
    }
}

/// Stringify for nesting inside containers: strings are quoted.
fn inspect(interp: &Interpreter, value: &Value, depth: usize) -> String {
    if depth > 6 {
        return "...".to_string();
    }
    match value {
        Value::Number(n) => format_number(*n),
        Value::String(s) => format!("\"{s}\""),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::BigInt(v) => format_bigint(v),
        Value::Symbol(id) => format!("Symbol({})", interp.symbols.description(*id)),
        Value::Array(array) => {
            let array = array.borrow();
            let parts: Vec<String> = array
                .elements
                .iter()
                .map(|element| inspect(interp, element, depth + 1))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(object) => {
            let object = object.borrow();
            if object.properties.is_empty() && object.accessors.is_empty() {
                return "{}".to_string();
            }
            let parts: Vec<String> = object
                .properties
                .iter()
                .map(|(key, val)| format!("{key}: {}", inspect(interp, val, depth + 1)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::Instance(instance) => {
            let instance = instance.borrow();
            let class_name = interp.class(instance.class).name.clone();
            if instance.fields.is_empty() {
                return format!("{class_name} {{}}");
            }
            let parts: Vec<String> = instance
                .fields
                .iter()
                .map(|(key, val)| format!("{key}: {}", inspect(interp, val, depth + 1)))
                .collect();
            format!("{class_name} {{ {} }}", parts.join(", "))
        }
        Value::Function(_) => "[Function]".to_string(),
        Value::Class(id) => format!("[class {}]", interp.class(*id).name),
        Value::Regex(r) => format!("/{}/{}", r.pattern, r.flags),
        Value::Date(ms) => format!("Date({})", format_number(*ms.borrow())),
        Value::Promise(_) => "Promise".to_string(),
        Value::Map(map) => {
            let map = map.borrow();
            let parts: Vec<String> = map
                .entries
                .iter()
                .map(|(key, val)| {
                    format!(
                        "{} => {}",
                        inspect(interp, &key.0, depth + 1),
                        inspect(interp, val, depth + 1)
                    )
                })
                .collect();
            format!("Map({}) {{{}}}", map.entries.len(), parts.join(", "))
        }
        Value::Set(set) => {
            let set = set.borrow();
            let parts: Vec<String> = set
                .entries
                .iter()
                .map(|(key, _)| inspect(interp, &key.0, depth + 1))
                .collect();
            format!("Set({}) {{{}}}", set.entries.len(), parts.join(", "))
        }
        Value::Generator(_) => "[Generator]".to_string(),
    }
}
