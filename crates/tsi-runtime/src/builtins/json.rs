//! JSON.parse / JSON.stringify, backed by serde_json.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::interp::Interpreter;
use crate::value::{ArrayData, ObjectData, Value};

use super::{arg, host_object, native};

pub(crate) fn install(interp: &mut Interpreter) {
    let json = host_object(vec![
        (
            "parse",
            native("parse", 1, |interp, _this, args| {
                let text = interp.to_js_string(&arg(args, 0));
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(parsed) => Ok(from_json(&parsed)),
                    Err(error) => Err(interp.make_error(
                        ErrorKind::SyntaxError,
                        &format!("Unexpected token in JSON: {error}"),
                    )),
                }
            }),
        ),
        (
            "stringify",
            native("stringify", 3, |interp, _this, args| {
                let value = arg(args, 0);
                let Some(json) = to_json(interp, &value) else {
                    return Ok(Value::Undefined);
                };
                // Third argument: indentation width or string.
                let text = match arg(args, 2) {
                    Value::Number(n) if n >= 1.0 => {
                        let indent = " ".repeat((n as usize).min(10));
                        pretty_with_indent(&json, &indent)
                    }
                    Value::String(s) if !s.is_empty() => pretty_with_indent(&json, &s),
                    _ => serde_json::to_string(&json).unwrap_or_default(),
                };
                Ok(Value::string(text))
            }),
        ),
    ]);
    interp.globals.declare("JSON", json, false);
}

fn pretty_with_indent(json: &serde_json::Value, indent: &str) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(json, &mut serializer).ok();
    String::from_utf8(out).unwrap_or_default()
}

/// JSON -> runtime value.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Array(ArrayData::new(items.iter().map(from_json).collect()))
        }
        serde_json::Value::Object(entries) => {
            let object = ObjectData::new();
            {
                let mut data = object.borrow_mut();
                for (key, value) in entries {
                    data.properties.insert(key.clone(), from_json(value));
                }
            }
            Value::Object(object)
        }
    }
}

/// Runtime value -> JSON. Functions, symbols and undefined are dropped,
/// matching JSON.stringify.
pub fn to_json(interp: &Interpreter, value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Null => Some(serde_json::Value::Null),
        Value::Undefined | Value::Function(_) | Value::Symbol(_) | Value::Class(_) => None,
        Value::Boolean(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => {
            if n.is_finite() {
                serde_json::Number::from_f64(*n).map(serde_json::Value::Number)
            } else {
                Some(serde_json::Value::Null)
            }
        }
        Value::BigInt(_) => None,
        Value::String(s) => Some(serde_json::Value::String(s.to_string())),
        Value::Array(data) => {
            let items: Vec<serde_json::Value> = data
                .borrow()
                .elements
                .iter()
                .map(|element| to_json(interp, element).unwrap_or(serde_json::Value::Null))
                .collect();
            Some(serde_json::Value::Array(items))
        }
        Value::Object(data) => {
            let mut map = serde_json::Map::new();
            for (key, entry) in &data.borrow().properties {
                if let Some(converted) = to_json(interp, entry) {
                    map.insert(key.clone(), converted);
                }
            }
            Some(serde_json::Value::Object(map))
        }
        Value::Instance(data) => {
            let mut map = serde_json::Map::new();
            for (key, entry) in &data.borrow().fields {
                if let Some(converted) = to_json(interp, entry) {
                    map.insert(key.clone(), converted);
                }
            }
            Some(serde_json::Value::Object(map))
        }
        Value::Date(ms) => serde_json::Number::from_f64(*Rc::clone(ms).borrow())
            .map(serde_json::Value::Number),
        _ => Some(serde_json::Value::Null),
    }
}
