//! Member dispatch for built-in value types.
//!
//! Property access on arrays, strings, numbers, functions, generators,
//! promises, collections, regexes and dates routes here. Methods are
//! plain native functions; the receiver arrives as `this` at the call
//! site, so extracted methods behave like detached built-ins.

use std::rc::Rc;

use tsi_common::numeric::format_number;
use tsi_common::span::Span;

use crate::error::ErrorKind;
use crate::generator::GeneratorResume;
use crate::interp::driver::GenStep;
use crate::interp::Interpreter;
use crate::value::*;

use super::{arg, number_arg};

/// Build a native function value (unwrapped helper shared by the tables).
pub(crate) fn native_fn(
    name: &str,
    arity: usize,
    func: impl Fn(&mut Interpreter, Value, &[Value]) -> Result<Value, Value> + 'static,
) -> Result<Value, Value> {
    Ok(Value::Function(FunctionValue::native(name, arity, func)))
}

fn expect_array(
    interp: &mut Interpreter,
    this: &Value,
) -> Result<Rc<std::cell::RefCell<ArrayData>>, Value> {
    match this {
        Value::Array(data) => Ok(Rc::clone(data)),
        _ => Err(interp.make_error(ErrorKind::TypeError, "Receiver is not an array")),
    }
}

fn frozen_array_guard(interp: &mut Interpreter, data: &ArrayData, op: &str) -> Option<Value> {
    if data.frozen {
        if interp.options.strict {
            return Some(
                interp.make_error(ErrorKind::TypeError, &format!("Cannot {op} a frozen array")),
            );
        }
        return Some(Value::Undefined);
    }
    None
}

// =============================================================================
// Arrays
// =============================================================================

pub fn array_member(interp: &mut Interpreter, name: &str, object: &Value) -> Result<Value, Value> {
    let Value::Array(data) = object else {
        return Ok(Value::Undefined);
    };
    match name {
        "length" => {
            return Ok(Value::Number(data.borrow().elements.len() as f64));
        }
        _ => {}
    }
    match name {
        "push" => native_fn("push", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            {
                let snapshot = array.borrow();
                if snapshot.frozen || snapshot.sealed {
                    drop(snapshot);
                    if interp.options.strict {
                        return Err(interp.make_error(
                            ErrorKind::TypeError,
                            "Cannot add property to a sealed array",
                        ));
                    }
                    return Ok(Value::Number(array.borrow().elements.len() as f64));
                }
            }
            array.borrow_mut().elements.extend(args.iter().cloned());
            Ok(Value::Number(array.borrow().elements.len() as f64))
        }),
        "pop" => native_fn("pop", 0, |interp, this, _args| {
            let array = expect_array(interp, &this)?;
            let blocked = {
                let snapshot = array.borrow();
                snapshot.frozen || snapshot.sealed
            };
            if blocked {
                if interp.options.strict {
                    return Err(interp
                        .make_error(ErrorKind::TypeError, "Cannot remove from a sealed array"));
                }
                return Ok(Value::Undefined);
            }
            Ok(array.borrow_mut().elements.pop().unwrap_or(Value::Undefined))
        }),
        "shift" => native_fn("shift", 0, |interp, this, _args| {
            let array = expect_array(interp, &this)?;
            let blocked = {
                let snapshot = array.borrow();
                snapshot.frozen || snapshot.sealed
            };
            if blocked {
                if interp.options.strict {
                    return Err(interp
                        .make_error(ErrorKind::TypeError, "Cannot remove from a sealed array"));
                }
                return Ok(Value::Undefined);
            }
            let mut data = array.borrow_mut();
            if data.elements.is_empty() {
                Ok(Value::Undefined)
            } else {
                Ok(data.elements.remove(0))
            }
        }),
        "unshift" => native_fn("unshift", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let mut data = array.borrow_mut();
            if let Some(thrown) = frozen_array_guard(interp, &data, "extend") {
                return match thrown {
                    Value::Undefined => Ok(Value::Number(data.elements.len() as f64)),
                    error => Err(error),
                };
            }
            for (i, value) in args.iter().enumerate() {
                data.elements.insert(i, value.clone());
            }
            Ok(Value::Number(data.elements.len() as f64))
        }),
        "slice" => native_fn("slice", 2, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let len = array.borrow().elements.len() as f64;
            let start = resolve_index(number_arg(interp, args, 0).unwrap_or(0.0), len);
            let end = match args.get(1) {
                Some(Value::Undefined) | None => len as usize,
                Some(_) => resolve_index(number_arg(interp, args, 1)?, len),
            };
            let data = array.borrow();
            let slice = data
                .elements
                .get(start..end.max(start))
                .map(|s| s.to_vec())
                .unwrap_or_default();
            Ok(Value::Array(ArrayData::new(slice)))
        }),
        "splice" => native_fn("splice", 2, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            {
                let snapshot = array.borrow();
                if snapshot.frozen || snapshot.sealed {
                    drop(snapshot);
                    if interp.options.strict {
                        return Err(
                            interp.make_error(ErrorKind::TypeError, "Cannot splice a sealed array")
                        );
                    }
                    return Ok(Value::Array(ArrayData::new(Vec::new())));
                }
            }
            let len = array.borrow().elements.len() as f64;
            let start = resolve_index(number_arg(interp, args, 0).unwrap_or(0.0), len);
            let delete_count = match args.get(1) {
                Some(_) => number_arg(interp, args, 1)?.max(0.0) as usize,
                None => len as usize - start,
            };
            let mut data = array.borrow_mut();
            let end = (start + delete_count).min(data.elements.len());
            let removed: Vec<Value> = data.elements.drain(start..end).collect();
            for (i, value) in args.iter().skip(2).enumerate() {
                data.elements.insert(start + i, value.clone());
            }
            Ok(Value::Array(ArrayData::new(removed)))
        }),
        "concat" => native_fn("concat", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let mut out = array.borrow().elements.clone();
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.borrow().elements.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::Array(ArrayData::new(out)))
        }),
        "join" => native_fn("join", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let separator = match args.first() {
                Some(Value::Undefined) | None => ",".to_string(),
                Some(value) => interp.to_js_string(value),
            };
            let parts: Vec<String> = array
                .borrow()
                .elements
                .iter()
                .map(|element| match element {
                    Value::Null | Value::Undefined => String::new(),
                    other => interp.to_js_string(other),
                })
                .collect();
            Ok(Value::string(parts.join(&separator)))
        }),
        "indexOf" => native_fn("indexOf", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let needle = arg(args, 0);
            let found = array
                .borrow()
                .elements
                .iter()
                .position(|element| element.same_value(&needle));
            Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
        }),
        "lastIndexOf" => native_fn("lastIndexOf", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let needle = arg(args, 0);
            let found = array
                .borrow()
                .elements
                .iter()
                .rposition(|element| element.same_value(&needle));
            Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
        }),
        "includes" => native_fn("includes", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let needle = arg(args, 0);
            let found = array
                .borrow()
                .elements
                .iter()
                .any(|element| element.same_value(&needle));
            Ok(Value::Boolean(found))
        }),
        "find" | "findIndex" => {
            let return_index = name == "findIndex";
            native_fn(name, 1, move |interp, this, args| {
                let array = expect_array(interp, &this)?;
                let Value::Function(callback) = arg(args, 0) else {
                    return Err(interp.make_error(ErrorKind::TypeError, "Predicate must be a function"));
                };
                let elements = array.borrow().elements.clone();
                for (i, element) in elements.iter().enumerate() {
                    let keep = interp.call_function(
                        &callback,
                        None,
                        vec![element.clone(), Value::Number(i as f64)],
                        Span::dummy(),
                    )?;
                    if keep.is_truthy() {
                        return Ok(if return_index {
                            Value::Number(i as f64)
                        } else {
                            element.clone()
                        });
                    }
                }
                Ok(if return_index {
                    Value::Number(-1.0)
                } else {
                    Value::Undefined
                })
            })
        }
        "filter" => native_fn("filter", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let Value::Function(callback) = arg(args, 0) else {
                return Err(interp.make_error(ErrorKind::TypeError, "Predicate must be a function"));
            };
            let elements = array.borrow().elements.clone();
            let mut out = Vec::new();
            for (i, element) in elements.iter().enumerate() {
                let keep = interp.call_function(
                    &callback,
                    None,
                    vec![element.clone(), Value::Number(i as f64)],
                    Span::dummy(),
                )?;
                if keep.is_truthy() {
                    out.push(element.clone());
                }
            }
            Ok(Value::Array(ArrayData::new(out)))
        }),
        "map" => native_fn("map", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let Value::Function(callback) = arg(args, 0) else {
                return Err(interp.make_error(ErrorKind::TypeError, "Mapper must be a function"));
            };
            let elements = array.borrow().elements.clone();
            let mut out = Vec::with_capacity(elements.len());
            for (i, element) in elements.iter().enumerate() {
                out.push(interp.call_function(
                    &callback,
                    None,
                    vec![element.clone(), Value::Number(i as f64)],
                    Span::dummy(),
                )?);
            }
            Ok(Value::Array(ArrayData::new(out)))
        }),
        "forEach" => native_fn("forEach", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let Value::Function(callback) = arg(args, 0) else {
                return Err(interp.make_error(ErrorKind::TypeError, "Callback must be a function"));
            };
            let elements = array.borrow().elements.clone();
            for (i, element) in elements.iter().enumerate() {
                interp.call_function(
                    &callback,
                    None,
                    vec![element.clone(), Value::Number(i as f64)],
                    Span::dummy(),
                )?;
            }
            Ok(Value::Undefined)
        }),
        "reduce" | "reduceRight" => {
            let from_right = name == "reduceRight";
            native_fn(name, 2, move |interp, this, args| {
                let array = expect_array(interp, &this)?;
                let Value::Function(callback) = arg(args, 0) else {
                    return Err(interp.make_error(ErrorKind::TypeError, "Reducer must be a function"));
                };
                let mut elements = array.borrow().elements.clone();
                if from_right {
                    elements.reverse();
                }
                let mut iterator = elements.into_iter().enumerate();
                let mut accumulator = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match iterator.next() {
                        Some((_, first)) => first,
                        None => {
                            return Err(interp.make_error(
                                ErrorKind::TypeError,
                                "Reduce of empty array with no initial value",
                            ));
                        }
                    },
                };
                for (i, element) in iterator {
                    accumulator = interp.call_function(
                        &callback,
                        None,
                        vec![accumulator, element, Value::Number(i as f64)],
                        Span::dummy(),
                    )?;
                }
                Ok(accumulator)
            })
        }
        "some" | "every" => {
            let want_all = name == "every";
            native_fn(name, 1, move |interp, this, args| {
                let array = expect_array(interp, &this)?;
                let Value::Function(callback) = arg(args, 0) else {
                    return Err(interp.make_error(ErrorKind::TypeError, "Predicate must be a function"));
                };
                let elements = array.borrow().elements.clone();
                for (i, element) in elements.iter().enumerate() {
                    let keep = interp.call_function(
                        &callback,
                        None,
                        vec![element.clone(), Value::Number(i as f64)],
                        Span::dummy(),
                    )?;
                    if keep.is_truthy() != want_all {
                        return Ok(Value::Boolean(!want_all));
                    }
                }
                Ok(Value::Boolean(want_all))
            })
        }
        "reverse" => native_fn("reverse", 0, |interp, this, _args| {
            let array = expect_array(interp, &this)?;
            let frozen = array.borrow().frozen;
            if frozen {
                if interp.options.strict {
                    return Err(
                        interp.make_error(ErrorKind::TypeError, "Cannot reverse a frozen array")
                    );
                }
                return Ok(this);
            }
            array.borrow_mut().elements.reverse();
            Ok(this)
        }),
        "sort" => native_fn("sort", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let frozen = array.borrow().frozen;
            if frozen {
                if interp.options.strict {
                    return Err(interp.make_error(ErrorKind::TypeError, "Cannot sort a frozen array"));
                }
                return Ok(this);
            }
            let mut elements = array.borrow().elements.clone();
            match arg(args, 0) {
                Value::Function(comparator) => {
                    // Insertion sort keeps the comparator fallible.
                    for i in 1..elements.len() {
                        let mut j = i;
                        while j > 0 {
                            let ordering = interp.call_function(
                                &comparator,
                                None,
                                vec![elements[j - 1].clone(), elements[j].clone()],
                                Span::dummy(),
                            )?;
                            let ordering = interp.to_number(&ordering, Span::dummy())?;
                            if ordering > 0.0 {
                                elements.swap(j - 1, j);
                                j -= 1;
                            } else {
                                break;
                            }
                        }
                    }
                }
                _ => {
                    // Default sort compares string forms.
                    elements.sort_by(|a, b| {
                        interp.to_js_string(a).cmp(&interp.to_js_string(b))
                    });
                }
            }
            array.borrow_mut().elements = elements;
            Ok(this)
        }),
        "flat" => native_fn("flat", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let depth = match args.first() {
                Some(Value::Undefined) | None => 1,
                Some(_) => number_arg(interp, args, 0)?.max(0.0) as usize,
            };
            fn flatten(elements: &[Value], depth: usize, out: &mut Vec<Value>) {
                for element in elements {
                    match element {
                        Value::Array(inner) if depth > 0 => {
                            flatten(&inner.borrow().elements, depth - 1, out);
                        }
                        other => out.push(other.clone()),
                    }
                }
            }
            let mut out = Vec::new();
            flatten(&array.borrow().elements, depth, &mut out);
            Ok(Value::Array(ArrayData::new(out)))
        }),
        "fill" => native_fn("fill", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let frozen = array.borrow().frozen;
            if frozen {
                if interp.options.strict {
                    return Err(interp.make_error(ErrorKind::TypeError, "Cannot fill a frozen array"));
                }
                return Ok(this);
            }
            let value = arg(args, 0);
            for slot in array.borrow_mut().elements.iter_mut() {
                *slot = value.clone();
            }
            Ok(this)
        }),
        "at" => native_fn("at", 1, |interp, this, args| {
            let array = expect_array(interp, &this)?;
            let len = array.borrow().elements.len() as f64;
            let mut index = number_arg(interp, args, 0)?;
            if index < 0.0 {
                index += len;
            }
            if index < 0.0 || index >= len {
                return Ok(Value::Undefined);
            }
            Ok(array.borrow().elements[index as usize].clone())
        }),
        "keys" | "values" | "entries" => {
            let mode = name.to_string();
            native_fn(name, 0, move |interp, this, _args| {
                let array = expect_array(interp, &this)?;
                let elements = array.borrow().elements.clone();
                let items: Vec<Value> = match mode.as_str() {
                    "keys" => (0..elements.len())
                        .map(|i| Value::Number(i as f64))
                        .collect(),
                    "values" => elements,
                    _ => elements
                        .into_iter()
                        .enumerate()
                        .map(|(i, value)| {
                            Value::Array(ArrayData::new(vec![Value::Number(i as f64), value]))
                        })
                        .collect(),
                };
                // An exhausted-on-demand iterator object.
                Ok(make_list_iterator(items))
            })
        }
        "toString" => native_fn("toString", 0, |interp, this, _args| {
            Ok(Value::string(interp.to_js_string(&this)))
        }),
        _ => Ok(Value::Undefined),
    }
}

fn resolve_index(value: f64, len: f64) -> usize {
    let resolved = if value < 0.0 { len + value } else { value };
    resolved.clamp(0.0, len) as usize
}

/// A plain-object iterator over a finished list (`{ next() }`).
fn make_list_iterator(items: Vec<Value>) -> Value {
    let object = ObjectData::new();
    let index = std::cell::Cell::new(0usize);
    let items = Rc::new(items);
    let next = FunctionValue::native("next", 0, move |_interp, _this, _args| {
        let result = ObjectData::new();
        let i = index.get();
        {
            let mut data = result.borrow_mut();
            if let Some(value) = items.get(i) {
                index.set(i + 1);
                data.properties.insert("value".to_string(), value.clone());
                data.properties
                    .insert("done".to_string(), Value::Boolean(false));
            } else {
                data.properties
                    .insert("value".to_string(), Value::Undefined);
                data.properties
                    .insert("done".to_string(), Value::Boolean(true));
            }
        }
        Ok(Value::Object(result))
    });
    object
        .borrow_mut()
        .properties
        .insert("next".to_string(), Value::Function(next));
    Value::Object(object)
}

// =============================================================================
// Strings
// =============================================================================

pub fn string_member(interp: &mut Interpreter, name: &str, object: &Value) -> Result<Value, Value> {
    let Value::String(s) = object else {
        return Ok(Value::Undefined);
    };
    if name == "length" {
        return Ok(Value::Number(s.chars().count() as f64));
    }
    let receiver = |interp: &mut Interpreter, this: &Value| -> Result<String, Value> {
        match this {
            Value::String(s) => Ok(s.to_string()),
            other => Ok(interp.to_js_string(other)),
        }
    };
    match name {
        "charAt" => native_fn("charAt", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let index = number_arg(interp, args, 0)? as usize;
            Ok(Value::string(
                s.chars().nth(index).map(|c| c.to_string()).unwrap_or_default(),
            ))
        }),
        "charCodeAt" => native_fn("charCodeAt", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let index = number_arg(interp, args, 0)? as usize;
            // UTF-16 code units, matching JS indexing.
            let units: Vec<u16> = s.encode_utf16().collect();
            Ok(units
                .get(index)
                .map(|&u| Value::Number(f64::from(u)))
                .unwrap_or(Value::Number(f64::NAN)))
        }),
        "codePointAt" => native_fn("codePointAt", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let index = number_arg(interp, args, 0)? as usize;
            Ok(s
                .chars()
                .nth(index)
                .map(|c| Value::Number(f64::from(u32::from(c))))
                .unwrap_or(Value::Undefined))
        }),
        "indexOf" => native_fn("indexOf", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let needle = interp.to_js_string(&arg(args, 0));
            Ok(Value::Number(
                s.find(&needle)
                    .map(|byte| s[..byte].chars().count() as f64)
                    .unwrap_or(-1.0),
            ))
        }),
        "lastIndexOf" => native_fn("lastIndexOf", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let needle = interp.to_js_string(&arg(args, 0));
            Ok(Value::Number(
                s.rfind(&needle)
                    .map(|byte| s[..byte].chars().count() as f64)
                    .unwrap_or(-1.0),
            ))
        }),
        "includes" => native_fn("includes", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let needle = interp.to_js_string(&arg(args, 0));
            Ok(Value::Boolean(s.contains(&needle)))
        }),
        "startsWith" => native_fn("startsWith", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let needle = interp.to_js_string(&arg(args, 0));
            Ok(Value::Boolean(s.starts_with(&needle)))
        }),
        "endsWith" => native_fn("endsWith", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let needle = interp.to_js_string(&arg(args, 0));
            Ok(Value::Boolean(s.ends_with(&needle)))
        }),
        "slice" | "substring" => {
            let is_substring = name == "substring";
            native_fn(name, 2, move |interp, this, args| {
                let s = receiver(interp, &this)?;
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as f64;
                let mut start = number_arg(interp, args, 0).unwrap_or(0.0);
                let mut end = match args.get(1) {
                    Some(Value::Undefined) | None => len,
                    Some(_) => number_arg(interp, args, 1)?,
                };
                if is_substring {
                    start = start.max(0.0).min(len);
                    end = end.max(0.0).min(len);
                    if start > end {
                        std::mem::swap(&mut start, &mut end);
                    }
                } else {
                    if start < 0.0 {
                        start += len;
                    }
                    if end < 0.0 {
                        end += len;
                    }
                    start = start.clamp(0.0, len);
                    end = end.clamp(0.0, len);
                }
                let out: String = chars
                    .get(start as usize..(end as usize).max(start as usize))
                    .map(|cs| cs.iter().collect())
                    .unwrap_or_default();
                Ok(Value::string(out))
            })
        }
        "toUpperCase" => native_fn("toUpperCase", 0, move |interp, this, _args| {
            let s = receiver(interp, &this)?;
            Ok(Value::string(s.to_uppercase()))
        }),
        "toLowerCase" => native_fn("toLowerCase", 0, move |interp, this, _args| {
            let s = receiver(interp, &this)?;
            Ok(Value::string(s.to_lowercase()))
        }),
        "trim" => native_fn("trim", 0, move |interp, this, _args| {
            let s = receiver(interp, &this)?;
            Ok(Value::string(s.trim().to_string()))
        }),
        "trimStart" => native_fn("trimStart", 0, move |interp, this, _args| {
            let s = receiver(interp, &this)?;
            Ok(Value::string(s.trim_start().to_string()))
        }),
        "trimEnd" => native_fn("trimEnd", 0, move |interp, this, _args| {
            let s = receiver(interp, &this)?;
            Ok(Value::string(s.trim_end().to_string()))
        }),
        "split" => native_fn("split", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let parts: Vec<Value> = match args.first() {
                Some(Value::Undefined) | None => vec![Value::string(s)],
                Some(separator) => {
                    let separator = interp.to_js_string(separator);
                    if separator.is_empty() {
                        s.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        s.split(&separator)
                            .map(|part| Value::string(part.to_string()))
                            .collect()
                    }
                }
            };
            Ok(Value::Array(ArrayData::new(parts)))
        }),
        "repeat" => native_fn("repeat", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let count = number_arg(interp, args, 0)?;
            if count < 0.0 || !count.is_finite() {
                return Err(interp.make_error(ErrorKind::RangeError, "Invalid count value"));
            }
            Ok(Value::string(s.repeat(count as usize)))
        }),
        "padStart" | "padEnd" => {
            let at_start = name == "padStart";
            native_fn(name, 2, move |interp, this, args| {
                let s = receiver(interp, &this)?;
                let target = number_arg(interp, args, 0)? as usize;
                let pad = match args.get(1) {
                    Some(Value::Undefined) | None => " ".to_string(),
                    Some(value) => interp.to_js_string(value),
                };
                let current = s.chars().count();
                if current >= target || pad.is_empty() {
                    return Ok(Value::string(s));
                }
                let needed = target - current;
                let padding: String = pad.chars().cycle().take(needed).collect();
                Ok(Value::string(if at_start {
                    format!("{padding}{s}")
                } else {
                    format!("{s}{padding}")
                }))
            })
        }
        "replace" | "replaceAll" => {
            let all = name == "replaceAll";
            native_fn(name, 2, move |interp, this, args| {
                let s = receiver(interp, &this)?;
                let replacement = interp.to_js_string(&arg(args, 1));
                match arg(args, 0) {
                    Value::Regex(regex) => {
                        let Some(compiled) = &regex.compiled else {
                            return Ok(Value::string(s));
                        };
                        let global = all || regex.flags.contains('g');
                        let out = if global {
                            compiled.replace_all(&s, replacement.as_str()).to_string()
                        } else {
                            compiled.replace(&s, replacement.as_str()).to_string()
                        };
                        Ok(Value::string(out))
                    }
                    pattern => {
                        let pattern = interp.to_js_string(&pattern);
                        let out = if all {
                            s.replace(&pattern, &replacement)
                        } else {
                            s.replacen(&pattern, &replacement, 1)
                        };
                        Ok(Value::string(out))
                    }
                }
            })
        }
        "concat" => native_fn("concat", 1, move |interp, this, args| {
            let mut s = receiver(interp, &this)?;
            for value in args {
                s.push_str(&interp.to_js_string(value));
            }
            Ok(Value::string(s))
        }),
        "at" => native_fn("at", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let chars: Vec<char> = s.chars().collect();
            let mut index = number_arg(interp, args, 0)?;
            if index < 0.0 {
                index += chars.len() as f64;
            }
            if index < 0.0 || index >= chars.len() as f64 {
                return Ok(Value::Undefined);
            }
            Ok(Value::string(chars[index as usize].to_string()))
        }),
        "match" => native_fn("match", 1, move |interp, this, args| {
            let s = receiver(interp, &this)?;
            let Value::Regex(regex) = arg(args, 0) else {
                return Ok(Value::Null);
            };
            let Some(compiled) = &regex.compiled else {
                return Ok(Value::Null);
            };
            if regex.flags.contains('g') {
                let matches: Vec<Value> = compiled
                    .find_iter(&s)
                    .map(|m| Value::string(m.as_str().to_string()))
                    .collect();
                if matches.is_empty() {
                    return Ok(Value::Null);
                }
                return Ok(Value::Array(ArrayData::new(matches)));
            }
            match compiled.captures(&s) {
                Some(captures) => {
                    let groups: Vec<Value> = captures
                        .iter()
                        .map(|group| match group {
                            Some(m) => Value::string(m.as_str().to_string()),
                            None => Value::Undefined,
                        })
                        .collect();
                    Ok(Value::Array(ArrayData::new(groups)))
                }
                None => Ok(Value::Null),
            }
        }),
        "toString" | "valueOf" => native_fn(name, 0, move |interp, this, _args| {
            Ok(Value::string(receiver(interp, &this)?))
        }),
        _ => Ok(Value::Undefined),
    }
}

// =============================================================================
// Numbers / bigints / booleans
// =============================================================================

pub fn primitive_member(
    _interp: &mut Interpreter,
    name: &str,
    _object: &Value,
) -> Result<Value, Value> {
    match name {
        "toFixed" => native_fn("toFixed", 1, |interp, this, args| {
            let n = interp.to_number(&this, Span::dummy())?;
            let digits = number_arg(interp, args, 0).unwrap_or(0.0) as usize;
            Ok(Value::string(format!("{n:.digits$}")))
        }),
        "toPrecision" => native_fn("toPrecision", 1, |interp, this, args| {
            let n = interp.to_number(&this, Span::dummy())?;
            match args.first() {
                Some(Value::Undefined) | None => Ok(Value::string(format_number(n))),
                Some(_) => {
                    let precision = number_arg(interp, args, 0)? as usize;
                    Ok(Value::string(format!("{n:.*}", precision.saturating_sub(1))))
                }
            }
        }),
        "toString" => native_fn("toString", 1, |interp, this, args| {
            match args.first() {
                Some(Value::Number(radix)) if *radix != 10.0 => {
                    let n = interp.to_number(&this, Span::dummy())?;
                    Ok(Value::string(to_radix_string(n, *radix as u32)))
                }
                _ => Ok(Value::string(interp.to_js_string(&this))),
            }
        }),
        "valueOf" => native_fn("valueOf", 0, |_interp, this, _args| Ok(this)),
        _ => Ok(Value::Undefined),
    }
}

fn to_radix_string(n: f64, radix: u32) -> String {
    if !(2..=36).contains(&radix) || !n.is_finite() {
        return format_number(n);
    }
    let negative = n < 0.0;
    let mut value = n.abs().trunc() as u64;
    if value == 0 {
        return "0".to_string();
    }
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    while value > 0 {
        out.push(digits[(value % u64::from(radix)) as usize]);
        value /= u64::from(radix);
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// =============================================================================
// Functions
// =============================================================================

pub fn function_member(
    _interp: &mut Interpreter,
    name: &str,
    func: &Rc<FunctionValue>,
) -> Result<Value, Value> {
    match name {
        "name" => Ok(Value::string(
            func.name.borrow().clone().unwrap_or_default(),
        )),
        "length" => Ok(Value::Number(func.length as f64)),
        "call" => native_fn("call", 1, |interp, this, args| {
            let Value::Function(target) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not callable"));
            };
            let bound_this = arg(args, 0);
            let rest = args.get(1..).map(|s| s.to_vec()).unwrap_or_default();
            interp.call_function(&target, Some(bound_this), rest, Span::dummy())
        }),
        "apply" => native_fn("apply", 2, |interp, this, args| {
            let Value::Function(target) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not callable"));
            };
            let bound_this = arg(args, 0);
            let mut call_args = Vec::new();
            if let Some(list) = args.get(1) {
                if !list.is_nullish() {
                    interp.spread_into(list, &mut call_args, Span::dummy())?;
                }
            }
            interp.call_function(&target, Some(bound_this), call_args, Span::dummy())
        }),
        "bind" => native_fn("bind", 1, |interp, this, args| {
            let Value::Function(target) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not callable"));
            };
            let bound_this = arg(args, 0);
            let bound_args = args.get(1..).map(|s| s.to_vec()).unwrap_or_default();
            Ok(Value::Function(Rc::new(FunctionValue {
                kind: FnKind::Bound {
                    target: Rc::clone(&target),
                    bound_this,
                    bound_args,
                },
                env: None,
                this_binding: std::cell::RefCell::new(None),
                home_class: std::cell::RefCell::new(*target.home_class.borrow()),
                name: std::cell::RefCell::new(
                    target.name.borrow().clone().map(|n| format!("bound {n}")),
                ),
                length: target.length,
                lowered_body: std::cell::RefCell::new(None),
                props: std::cell::RefCell::new(indexmap::IndexMap::new()),
            })))
        }),
        "toString" => native_fn("toString", 0, |interp, this, _args| {
            Ok(Value::string(interp.to_js_string(&this)))
        }),
        _ => Ok(Value::Undefined),
    }
}

// =============================================================================
// Generators
// =============================================================================

pub fn generator_member(
    _interp: &mut Interpreter,
    name: &str,
    _object: &Value,
) -> Result<Value, Value> {
    match name {
        "next" | "return" | "throw" => {
            let mode = name.to_string();
            native_fn(name, 1, move |interp, this, args| {
                let Value::Generator(state) = this else {
                    return Err(
                        interp.make_error(ErrorKind::TypeError, "Receiver is not a generator")
                    );
                };
                let resume = match mode.as_str() {
                    "next" => GeneratorResume::Next(arg(args, 0)),
                    "return" => GeneratorResume::Return(arg(args, 0)),
                    _ => GeneratorResume::Throw(arg(args, 0)),
                };
                let step = interp.resume_generator(&state, resume)?;
                let result = ObjectData::new();
                {
                    let mut data = result.borrow_mut();
                    match step {
                        GenStep::Yielded(value) => {
                            data.properties.insert("value".to_string(), value);
                            data.properties
                                .insert("done".to_string(), Value::Boolean(false));
                        }
                        GenStep::Done(value) => {
                            data.properties.insert("value".to_string(), value);
                            data.properties
                                .insert("done".to_string(), Value::Boolean(true));
                        }
                    }
                }
                Ok(Value::Object(result))
            })
        }
        _ => Ok(Value::Undefined),
    }
}

// =============================================================================
// Promises
// =============================================================================

pub fn promise_member(
    _interp: &mut Interpreter,
    name: &str,
    _object: &Value,
) -> Result<Value, Value> {
    match name {
        "then" => native_fn("then", 2, |interp, this, args| {
            let Value::Promise(promise) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a promise"));
            };
            let on_fulfilled = match arg(args, 0) {
                Value::Function(f) => Some(f),
                _ => None,
            };
            let on_rejected = match arg(args, 1) {
                Value::Function(f) => Some(f),
                _ => None,
            };
            Ok(interp.promise_then(&promise, on_fulfilled, on_rejected))
        }),
        "catch" => native_fn("catch", 1, |interp, this, args| {
            let Value::Promise(promise) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a promise"));
            };
            let on_rejected = match arg(args, 0) {
                Value::Function(f) => Some(f),
                _ => None,
            };
            Ok(interp.promise_then(&promise, None, on_rejected))
        }),
        "finally" => native_fn("finally", 1, |interp, this, args| {
            let Value::Promise(promise) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a promise"));
            };
            // The callback observes nothing and changes nothing.
            let handler = match arg(args, 0) {
                Value::Function(f) => Some(f),
                _ => None,
            };
            let wrap = |handler: Option<Rc<FunctionValue>>| {
                handler.map(|callback| {
                    FunctionValue::native("", 1, move |interp, _this, args| {
                        interp.call_function(&callback, None, Vec::new(), Span::dummy())?;
                        Ok(arg(args, 0))
                    })
                })
            };
            Ok(interp.promise_then(&promise, wrap(handler.clone()), wrap(handler)))
        }),
        _ => Ok(Value::Undefined),
    }
}

// =============================================================================
// Maps and sets
// =============================================================================

pub fn collection_member(
    _interp: &mut Interpreter,
    name: &str,
    object: &Value,
) -> Result<Value, Value> {
    if name == "size" {
        return Ok(Value::Number(match object {
            Value::Map(map) => map.borrow().entries.len() as f64,
            Value::Set(set) => set.borrow().entries.len() as f64,
            _ => 0.0,
        }));
    }
    match name {
        "get" => native_fn("get", 1, |interp, this, args| {
            let Value::Map(map) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a Map"));
            };
            Ok(map
                .borrow()
                .entries
                .get(&ValueKey(arg(args, 0)))
                .cloned()
                .unwrap_or(Value::Undefined))
        }),
        "set" => native_fn("set", 2, |interp, this, args| {
            let Value::Map(map) = &this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a Map"));
            };
            map.borrow_mut()
                .entries
                .insert(ValueKey(arg(args, 0)), arg(args, 1));
            Ok(this.clone())
        }),
        "add" => native_fn("add", 1, |interp, this, args| {
            let Value::Set(set) = &this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a Set"));
            };
            set.borrow_mut().entries.insert(ValueKey(arg(args, 0)), ());
            Ok(this.clone())
        }),
        "has" => native_fn("has", 1, |interp, this, args| {
            let key = ValueKey(arg(args, 0));
            let found = match this {
                Value::Map(map) => map.borrow().entries.contains_key(&key),
                Value::Set(set) => set.borrow().entries.contains_key(&key),
                _ => {
                    return Err(
                        interp.make_error(ErrorKind::TypeError, "Receiver is not a collection")
                    );
                }
            };
            Ok(Value::Boolean(found))
        }),
        "delete" => native_fn("delete", 1, |interp, this, args| {
            let key = ValueKey(arg(args, 0));
            let removed = match this {
                Value::Map(map) => map.borrow_mut().entries.shift_remove(&key).is_some(),
                Value::Set(set) => set.borrow_mut().entries.shift_remove(&key).is_some(),
                _ => {
                    return Err(
                        interp.make_error(ErrorKind::TypeError, "Receiver is not a collection")
                    );
                }
            };
            Ok(Value::Boolean(removed))
        }),
        "clear" => native_fn("clear", 0, |interp, this, _args| {
            match this {
                Value::Map(map) => map.borrow_mut().entries.clear(),
                Value::Set(set) => set.borrow_mut().entries.clear(),
                _ => {
                    return Err(
                        interp.make_error(ErrorKind::TypeError, "Receiver is not a collection")
                    );
                }
            }
            Ok(Value::Undefined)
        }),
        "forEach" => native_fn("forEach", 1, |interp, this, args| {
            let Value::Function(callback) = arg(args, 0) else {
                return Err(interp.make_error(ErrorKind::TypeError, "Callback must be a function"));
            };
            let pairs: Vec<(Value, Value)> = match &this {
                Value::Map(map) => map
                    .borrow()
                    .entries
                    .iter()
                    .map(|(key, value)| (value.clone(), key.0.clone()))
                    .collect(),
                Value::Set(set) => set
                    .borrow()
                    .entries
                    .keys()
                    .map(|key| (key.0.clone(), key.0.clone()))
                    .collect(),
                _ => Vec::new(),
            };
            for (value, key) in pairs {
                interp.call_function(
                    &callback,
                    None,
                    vec![value, key, this.clone()],
                    Span::dummy(),
                )?;
            }
            Ok(Value::Undefined)
        }),
        "keys" | "values" | "entries" => {
            let mode = name.to_string();
            native_fn(name, 0, move |interp, this, _args| {
                let items: Vec<Value> = match (&this, mode.as_str()) {
                    (Value::Map(map), "keys") => {
                        map.borrow().entries.keys().map(|k| k.0.clone()).collect()
                    }
                    (Value::Map(map), "values") => {
                        map.borrow().entries.values().cloned().collect()
                    }
                    (Value::Map(map), _) => map
                        .borrow()
                        .entries
                        .iter()
                        .map(|(key, value)| {
                            Value::Array(ArrayData::new(vec![key.0.clone(), value.clone()]))
                        })
                        .collect(),
                    (Value::Set(set), "entries") => set
                        .borrow()
                        .entries
                        .keys()
                        .map(|key| {
                            Value::Array(ArrayData::new(vec![key.0.clone(), key.0.clone()]))
                        })
                        .collect(),
                    (Value::Set(set), _) => {
                        set.borrow().entries.keys().map(|k| k.0.clone()).collect()
                    }
                    _ => {
                        return Err(
                            interp.make_error(ErrorKind::TypeError, "Receiver is not a collection")
                        );
                    }
                };
                Ok(make_list_iterator(items))
            })
        }
        _ => Ok(Value::Undefined),
    }
}

// =============================================================================
// Regex and date
// =============================================================================

pub fn regex_member(_interp: &mut Interpreter, name: &str, object: &Value) -> Result<Value, Value> {
    let Value::Regex(regex) = object else {
        return Ok(Value::Undefined);
    };
    match name {
        "source" => Ok(Value::string(regex.pattern.clone())),
        "flags" => Ok(Value::string(regex.flags.clone())),
        "test" => native_fn("test", 1, |interp, this, args| {
            let Value::Regex(regex) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a RegExp"));
            };
            let text = interp.to_js_string(&arg(args, 0));
            Ok(Value::Boolean(
                regex
                    .compiled
                    .as_ref()
                    .map(|compiled| compiled.is_match(&text))
                    .unwrap_or(false),
            ))
        }),
        "exec" => native_fn("exec", 1, |interp, this, args| {
            let Value::Regex(regex) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a RegExp"));
            };
            let text = interp.to_js_string(&arg(args, 0));
            let Some(compiled) = &regex.compiled else {
                return Ok(Value::Null);
            };
            match compiled.captures(&text) {
                Some(captures) => {
                    let groups: Vec<Value> = captures
                        .iter()
                        .map(|group| match group {
                            Some(m) => Value::string(m.as_str().to_string()),
                            None => Value::Undefined,
                        })
                        .collect();
                    Ok(Value::Array(ArrayData::new(groups)))
                }
                None => Ok(Value::Null),
            }
        }),
        _ => Ok(Value::Undefined),
    }
}

pub fn date_member(_interp: &mut Interpreter, name: &str, _object: &Value) -> Result<Value, Value> {
    match name {
        "getTime" | "valueOf" => native_fn(name, 0, |interp, this, _args| {
            let Value::Date(ms) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a Date"));
            };
            Ok(Value::Number(*ms.borrow()))
        }),
        "toISOString" => native_fn("toISOString", 0, |interp, this, _args| {
            let Value::Date(ms) = this else {
                return Err(interp.make_error(ErrorKind::TypeError, "Receiver is not a Date"));
            };
            // Epoch-relative rendering without a calendar library.
            Ok(Value::string(format!("@{}ms", format_number(*ms.borrow()))))
        }),
        _ => Ok(Value::Undefined),
    }
}

// =============================================================================
// Plain objects
// =============================================================================

pub fn object_member(interp: &mut Interpreter, name: &str, object: &Value) -> Result<Value, Value> {
    match name {
        "hasOwnProperty" => native_fn("hasOwnProperty", 1, |interp, this, args| {
            let key = interp.to_js_string(&arg(args, 0));
            let found = match &this {
                Value::Object(data) => {
                    let data = data.borrow();
                    data.properties.contains_key(&key) || data.accessors.contains_key(&key)
                }
                Value::Instance(data) => data.borrow().fields.contains_key(&key),
                _ => false,
            };
            Ok(Value::Boolean(found))
        }),
        "toString" => native_fn("toString", 0, |interp, this, _args| {
            Ok(Value::string(interp.to_js_string(&this)))
        }),
        _ => {
            let _ = (interp, object);
            Ok(Value::Undefined)
        }
    }
}
