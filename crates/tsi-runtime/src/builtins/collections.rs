//! Map, Set, WeakMap and WeakSet constructors.
//!
//! Weak variants share the strong representation (reference counting
//! keeps entries alive anyway); the flag only hides them from iteration.

use std::cell::RefCell;
use std::rc::Rc;

use tsi_common::span::Span;

use crate::interp::Interpreter;
use crate::value::{MapData, SetData, Value, ValueKey};

use super::declare_fn;

pub(crate) fn install(interp: &mut Interpreter) {
    for (name, weak) in [("Map", false), ("WeakMap", true)] {
        declare_fn(interp, name, 0, move |interp, _this, args| {
            let map = Rc::new(RefCell::new(MapData {
                entries: indexmap::IndexMap::new(),
                weak,
            }));
            // `new Map([[k, v], ...])` seeds from entry pairs.
            if let Some(initial) = args.first() {
                if !initial.is_nullish() {
                    let mut pairs = Vec::new();
                    interp.spread_into(initial, &mut pairs, Span::dummy())?;
                    for pair in pairs {
                        let key = interp.get_index(&pair, &Value::Number(0.0), Span::dummy())?;
                        let value = interp.get_index(&pair, &Value::Number(1.0), Span::dummy())?;
                        map.borrow_mut().entries.insert(ValueKey(key), value);
                    }
                }
            }
            Ok(Value::Map(map))
        });
    }
    for (name, weak) in [("Set", false), ("WeakSet", true)] {
        declare_fn(interp, name, 0, move |interp, _this, args| {
            let set = Rc::new(RefCell::new(SetData {
                entries: indexmap::IndexMap::new(),
                weak,
            }));
            if let Some(initial) = args.first() {
                if !initial.is_nullish() {
                    let mut items = Vec::new();
                    interp.spread_into(initial, &mut items, Span::dummy())?;
                    for item in items {
                        set.borrow_mut().entries.insert(ValueKey(item), ());
                    }
                }
            }
            Ok(Value::Set(set))
        });
    }
}
