//! The iteration protocol.
//!
//! `for (x of iterable)` first looks for a `Symbol.iterator` method on the
//! iterable; arrays, strings, maps, sets and generator objects respond
//! positively, and plain objects may carry their own. Each step calls
//! `next()` and unpacks `{ value, done }`.

use std::rc::Rc;

use tsi_common::span::Span;

use crate::error::ErrorKind;
use crate::generator::GeneratorResume;
use crate::value::*;

use super::Interpreter;

/// A live iterator over a runtime value.
pub enum ValueIterator {
    Array {
        array: Rc<std::cell::RefCell<ArrayData>>,
        index: usize,
    },
    String {
        chars: Vec<String>,
        index: usize,
    },
    /// Maps iterate as [key, value] pairs, snapshot at creation.
    MapEntries {
        entries: Vec<(Value, Value)>,
        index: usize,
    },
    SetEntries {
        entries: Vec<Value>,
        index: usize,
    },
    Generator {
        state: Rc<std::cell::RefCell<crate::generator::GeneratorState>>,
        /// Return value of a completed generator (read by yield* delegation).
        done_value: Option<Value>,
    },
    /// User-provided protocol object: repeated `next()` calls.
    Protocol {
        iterator: Value,
    },
}

impl ValueIterator {
    /// Advance; `Ok(None)` when done. `sent` feeds generator delegates.
    pub fn next(&mut self, interp: &mut Interpreter, sent: Value) -> Result<Option<Value>, Value> {
        match self {
            ValueIterator::Array { array, index } => {
                let element = array.borrow().elements.get(*index).cloned();
                *index += 1;
                Ok(element)
            }
            ValueIterator::String { chars, index } => {
                let ch = chars.get(*index).cloned();
                *index += 1;
                Ok(ch.map(Value::string))
            }
            ValueIterator::MapEntries { entries, index } => {
                let entry = entries.get(*index).cloned();
                *index += 1;
                Ok(entry.map(|(key, value)| {
                    Value::Array(ArrayData::new(vec![key, value]))
                }))
            }
            ValueIterator::SetEntries { entries, index } => {
                let entry = entries.get(*index).cloned();
                *index += 1;
                Ok(entry)
            }
            ValueIterator::Generator { state, done_value } => {
                let state = Rc::clone(state);
                let step = interp.resume_generator(&state, GeneratorResume::Next(sent))?;
                match step {
                    super::driver::GenStep::Yielded(value) => Ok(Some(value)),
                    super::driver::GenStep::Done(value) => {
                        *done_value = Some(value);
                        Ok(None)
                    }
                }
            }
            ValueIterator::Protocol { iterator } => {
                let next_fn = interp.get_property(iterator, "next", Span::dummy())?;
                let result =
                    interp.call_value(&next_fn, Some(iterator.clone()), vec![sent], Span::dummy())?;
                let done = interp
                    .get_property(&result, "done", Span::dummy())
                    .unwrap_or(Value::Undefined);
                if done.is_truthy() {
                    return Ok(None);
                }
                let value = interp
                    .get_property(&result, "value", Span::dummy())
                    .unwrap_or(Value::Undefined);
                Ok(Some(value))
            }
        }
    }

    /// Forward `return(value)` to delegates that understand it.
    pub fn close(&mut self, interp: &mut Interpreter, value: Value) -> Result<(), Value> {
        if let ValueIterator::Generator { state, .. } = self {
            let state = Rc::clone(state);
            interp.resume_generator(&state, GeneratorResume::Return(value))?;
        }
        Ok(())
    }

    /// Forward `throw(error)` to generator delegates; other iterators
    /// surface the error at the delegation site.
    pub fn throw(
        &mut self,
        interp: &mut Interpreter,
        error: Value,
    ) -> Result<Option<Value>, Value> {
        if let ValueIterator::Generator { state, done_value } = self {
            let state = Rc::clone(state);
            let step = interp.resume_generator(&state, GeneratorResume::Throw(error))?;
            return match step {
                super::driver::GenStep::Yielded(value) => Ok(Some(value)),
                super::driver::GenStep::Done(value) => {
                    *done_value = Some(value);
                    Ok(None)
                }
            };
        }
        Err(error)
    }
}

impl Interpreter {
    /// Resolve a value to an iterator, or TypeError.
    pub fn get_iterator(&mut self, value: &Value, span: Span) -> Result<ValueIterator, Value> {
        match value {
            Value::Array(array) => Ok(ValueIterator::Array {
                array: Rc::clone(array),
                index: 0,
            }),
            Value::String(s) => Ok(ValueIterator::String {
                chars: s.chars().map(|ch| ch.to_string()).collect(),
                index: 0,
            }),
            Value::Map(map) => Ok(ValueIterator::MapEntries {
                entries: map
                    .borrow()
                    .entries
                    .iter()
                    .map(|(key, val)| (key.0.clone(), val.clone()))
                    .collect(),
                index: 0,
            }),
            Value::Set(set) => Ok(ValueIterator::SetEntries {
                entries: set.borrow().entries.keys().map(|k| k.0.clone()).collect(),
                index: 0,
            }),
            Value::Generator(generator) => Ok(ValueIterator::Generator {
                state: Rc::clone(generator),
                done_value: None,
            }),
            Value::Object(data) => {
                // A Symbol.iterator method, or an object that is already an
                // iterator (has `next`).
                let iterator_method = data.borrow().symbols.get(&self.sym_iterator).cloned();
                if let Some(method) = iterator_method {
                    let iterator = self.call_value(&method, Some(value.clone()), Vec::new(), span)?;
                    return Ok(ValueIterator::Protocol { iterator });
                }
                if data.borrow().properties.contains_key("next") {
                    return Ok(ValueIterator::Protocol {
                        iterator: value.clone(),
                    });
                }
                Err(self.make_error(
                    ErrorKind::TypeError,
                    "value is not iterable (no Symbol.iterator method)",
                ))
            }
            other => Err(self.make_error(
                ErrorKind::TypeError,
                &format!("{} is not iterable", self.to_js_string(other)),
            )),
        }
    }
}
