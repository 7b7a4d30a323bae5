//! The host capability table.
//!
//! `install` populates the global environment with host objects indexed by
//! name (`console`, `Math`, `JSON`, ...). Each member entry is a value, a
//! native callable, or a constructor. The table is immutable during
//! program evaluation: globals are declared non-mutable and container
//! objects are frozen where the surface allows it.

mod collections;
mod console;
mod json;
mod members;

pub use members::{
    array_member, collection_member, date_member, function_member, generator_member,
    object_member, primitive_member, promise_member, regex_member, string_member,
};

use std::rc::Rc;

use tsi_common::span::Span;
use tsi_parser::ast::ClassData;

use crate::error::ErrorKind;
use crate::interp::Interpreter;
use crate::value::*;

/// Install the whole capability table.
pub fn install(interp: &mut Interpreter) {
    install_error_classes(interp);
    console::install(interp);
    install_math(interp);
    json::install(interp);
    install_object(interp);
    install_array(interp);
    install_primitive_wrappers(interp);
    install_symbol(interp);
    install_promise(interp);
    collections::install(interp);
    install_timers(interp);
    install_global_functions(interp);

    let globals = Rc::clone(&interp.globals);
    globals.declare("undefined", Value::Undefined, false);
    globals.declare("NaN", Value::Number(f64::NAN), false);
    globals.declare("Infinity", Value::Number(f64::INFINITY), false);
    let global_this = ObjectData::new();
    globals.declare("globalThis", Value::Object(global_this), false);
}

/// Declare a native function as a global.
fn declare_fn(
    interp: &mut Interpreter,
    name: &str,
    arity: usize,
    func: impl Fn(&mut Interpreter, Value, &[Value]) -> Result<Value, Value> + 'static,
) -> Rc<FunctionValue> {
    let value = FunctionValue::native(name, arity, func);
    interp
        .globals
        .declare(name, Value::Function(Rc::clone(&value)), false);
    value
}

/// Build a frozen host object from named members.
fn host_object(entries: Vec<(&str, Value)>) -> Value {
    let object = ObjectData::new();
    {
        let mut data = object.borrow_mut();
        for (name, value) in entries {
            data.properties.insert(name.to_string(), value);
        }
        data.frozen = true;
        data.sealed = true;
    }
    Value::Object(object)
}

fn native(
    name: &str,
    arity: usize,
    func: impl Fn(&mut Interpreter, Value, &[Value]) -> Result<Value, Value> + 'static,
) -> Value {
    Value::Function(FunctionValue::native(name, arity, func))
}

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

pub(crate) fn number_arg(
    interp: &mut Interpreter,
    args: &[Value],
    index: usize,
) -> Result<f64, Value> {
    let value = arg(args, index);
    interp.to_number(&value, Span::dummy())
}

// =============================================================================
// Error classes
// =============================================================================

/// Error classes live in the class arena so `instanceof` and subclassing
/// work through the ordinary nominal chain. Their constructors are native
/// (they set `name`/`message`/`stack`).
fn install_error_classes(interp: &mut Interpreter) {
    let base = install_one_error_class(interp, ErrorKind::Error, None);
    for kind in [
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ] {
        install_one_error_class(interp, kind, Some(base));
    }
}

fn install_one_error_class(
    interp: &mut Interpreter,
    kind: ErrorKind,
    parent: Option<ClassId>,
) -> ClassId {
    let decl = Rc::new(ClassData {
        name: Some(kind.name().to_string()),
        superclass: None,
        super_type_args: Vec::new(),
        implements: Vec::new(),
        members: Vec::new(),
        type_params: Vec::new(),
        is_abstract: false,
        decorators: Vec::new(),
        span: Span::dummy(),
    });
    let class_id = ClassId(interp.classes.len() as u32);
    let ctor = FunctionValue::native(kind.name(), 1, move |interp, this, args| {
        if let Value::Instance(instance) = &this {
            let message = match arg(args, 0) {
                Value::Undefined => String::new(),
                other => interp.to_js_string(&other),
            };
            let mut data = instance.borrow_mut();
            data.fields
                .insert("name".to_string(), Value::string(kind.name()));
            data.fields
                .insert("message".to_string(), Value::string(message.clone()));
            drop(data);
            let stack = interp.render_stack(kind.name(), &message);
            instance
                .borrow_mut()
                .fields
                .insert("stack".to_string(), Value::string(stack));
        }
        Ok(Value::Undefined)
    });
    interp.classes.push(RuntimeClass {
        name: kind.name().to_string(),
        decl,
        parent,
        env: Rc::clone(&interp.globals),
        ctor: Some(ctor),
        methods: Default::default(),
        getters: Default::default(),
        setters: Default::default(),
        static_methods: Default::default(),
        static_getters: Default::default(),
        statics: std::cell::RefCell::new(indexmap::IndexMap::new()),
    });
    interp.error_classes.push((kind, class_id));
    interp
        .globals
        .declare(kind.name(), Value::Class(class_id), false);
    class_id
}

// =============================================================================
// Math
// =============================================================================

fn install_math(interp: &mut Interpreter) {
    fn unary(name: &'static str, op: fn(f64) -> f64) -> (&'static str, Value) {
        (
            name,
            native(name, 1, move |interp, _this, args| {
                let x = number_arg(interp, args, 0)?;
                Ok(Value::Number(op(x)))
            }),
        )
    }
    let math = host_object(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("LN2", Value::Number(std::f64::consts::LN_2)),
        ("LN10", Value::Number(std::f64::consts::LN_10)),
        ("SQRT2", Value::Number(std::f64::consts::SQRT_2)),
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("round", |x| (x + 0.5).floor()),
        unary("trunc", f64::trunc),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("sign", f64::signum),
        unary("log", f64::ln),
        unary("log2", f64::log2),
        unary("log10", f64::log10),
        unary("exp", f64::exp),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("asin", f64::asin),
        unary("acos", f64::acos),
        unary("atan", f64::atan),
        (
            "atan2",
            native("atan2", 2, |interp, _this, args| {
                let y = number_arg(interp, args, 0)?;
                let x = number_arg(interp, args, 1)?;
                Ok(Value::Number(y.atan2(x)))
            }),
        ),
        (
            "pow",
            native("pow", 2, |interp, _this, args| {
                let base = number_arg(interp, args, 0)?;
                let exp = number_arg(interp, args, 1)?;
                Ok(Value::Number(base.powf(exp)))
            }),
        ),
        (
            "hypot",
            native("hypot", 2, |interp, _this, args| {
                let mut sum = 0.0;
                for i in 0..args.len() {
                    let x = number_arg(interp, args, i)?;
                    sum += x * x;
                }
                Ok(Value::Number(sum.sqrt()))
            }),
        ),
        (
            "min",
            native("min", 2, |interp, _this, args| {
                let mut best = f64::INFINITY;
                for i in 0..args.len() {
                    let x = number_arg(interp, args, i)?;
                    if x.is_nan() {
                        return Ok(Value::Number(f64::NAN));
                    }
                    best = best.min(x);
                }
                Ok(Value::Number(best))
            }),
        ),
        (
            "max",
            native("max", 2, |interp, _this, args| {
                let mut best = f64::NEG_INFINITY;
                for i in 0..args.len() {
                    let x = number_arg(interp, args, i)?;
                    if x.is_nan() {
                        return Ok(Value::Number(f64::NAN));
                    }
                    best = best.max(x);
                }
                Ok(Value::Number(best))
            }),
        ),
        (
            "random",
            native("random", 0, |interp, _this, _args| {
                // Deterministic engine: a linear congruential walk keeps
                // runs reproducible.
                let state = interp
                    .event_loop
                    .rng_state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                interp.event_loop.rng_state = state;
                let value = ((state >> 11) as f64) / ((1u64 << 53) as f64);
                Ok(Value::Number(value))
            }),
        ),
    ]);
    interp.globals.declare("Math", math, false);
}

// =============================================================================
// Object
// =============================================================================

fn install_object(interp: &mut Interpreter) {
    let object_fn = declare_fn(interp, "Object", 1, |_interp, _this, args| {
        Ok(match arg(args, 0) {
            Value::Undefined | Value::Null => Value::Object(ObjectData::new()),
            other => other,
        })
    });
    let mut props = object_fn.props.borrow_mut();

    props.insert(
        "freeze".to_string(),
        native("freeze", 1, |_interp, _this, args| {
            let value = arg(args, 0);
            match &value {
                Value::Object(data) => {
                    let mut data = data.borrow_mut();
                    data.frozen = true;
                    data.sealed = true;
                }
                Value::Array(data) => {
                    let mut data = data.borrow_mut();
                    data.frozen = true;
                    data.sealed = true;
                }
                Value::Instance(data) => {
                    let mut data = data.borrow_mut();
                    data.frozen = true;
                    data.sealed = true;
                }
                _ => {}
            }
            Ok(value)
        }),
    );
    props.insert(
        "seal".to_string(),
        native("seal", 1, |_interp, _this, args| {
            let value = arg(args, 0);
            match &value {
                Value::Object(data) => data.borrow_mut().sealed = true,
                Value::Array(data) => data.borrow_mut().sealed = true,
                Value::Instance(data) => data.borrow_mut().sealed = true,
                _ => {}
            }
            Ok(value)
        }),
    );
    props.insert(
        "isFrozen".to_string(),
        native("isFrozen", 1, |_interp, _this, args| {
            let frozen = match arg(args, 0) {
                Value::Object(data) => data.borrow().frozen,
                Value::Array(data) => data.borrow().frozen,
                Value::Instance(data) => data.borrow().frozen,
                // Primitives are trivially frozen.
                _ => true,
            };
            Ok(Value::Boolean(frozen))
        }),
    );
    props.insert(
        "isSealed".to_string(),
        native("isSealed", 1, |_interp, _this, args| {
            let sealed = match arg(args, 0) {
                Value::Object(data) => data.borrow().sealed,
                Value::Array(data) => data.borrow().sealed,
                Value::Instance(data) => data.borrow().sealed,
                _ => true,
            };
            Ok(Value::Boolean(sealed))
        }),
    );
    props.insert(
        "keys".to_string(),
        native("keys", 1, |_interp, _this, args| {
            let keys: Vec<Value> = match arg(args, 0) {
                Value::Object(data) => data
                    .borrow()
                    .properties
                    .keys()
                    .map(|k| Value::string(k.clone()))
                    .collect(),
                Value::Instance(data) => data
                    .borrow()
                    .fields
                    .keys()
                    .map(|k| Value::string(k.clone()))
                    .collect(),
                Value::Array(data) => (0..data.borrow().elements.len())
                    .map(|i| Value::string(i.to_string()))
                    .collect(),
                _ => Vec::new(),
            };
            Ok(Value::Array(ArrayData::new(keys)))
        }),
    );
    props.insert(
        "values".to_string(),
        native("values", 1, |_interp, _this, args| {
            let values: Vec<Value> = match arg(args, 0) {
                Value::Object(data) => data.borrow().properties.values().cloned().collect(),
                Value::Instance(data) => data.borrow().fields.values().cloned().collect(),
                Value::Array(data) => data.borrow().elements.clone(),
                _ => Vec::new(),
            };
            Ok(Value::Array(ArrayData::new(values)))
        }),
    );
    props.insert(
        "entries".to_string(),
        native("entries", 1, |_interp, _this, args| {
            let entries: Vec<Value> = match arg(args, 0) {
                Value::Object(data) => data
                    .borrow()
                    .properties
                    .iter()
                    .map(|(key, value)| {
                        Value::Array(ArrayData::new(vec![
                            Value::string(key.clone()),
                            value.clone(),
                        ]))
                    })
                    .collect(),
                Value::Instance(data) => data
                    .borrow()
                    .fields
                    .iter()
                    .map(|(key, value)| {
                        Value::Array(ArrayData::new(vec![
                            Value::string(key.clone()),
                            value.clone(),
                        ]))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Ok(Value::Array(ArrayData::new(entries)))
        }),
    );
    props.insert(
        "assign".to_string(),
        native("assign", 2, |interp, _this, args| {
            let target = arg(args, 0);
            for source in args.iter().skip(1) {
                match source {
                    Value::Object(data) => {
                        let entries: Vec<(String, Value)> = data
                            .borrow()
                            .properties
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect();
                        for (key, value) in entries {
                            interp.set_property(&target, &key, value, Span::dummy())?;
                        }
                    }
                    Value::Instance(data) => {
                        let entries: Vec<(String, Value)> = data
                            .borrow()
                            .fields
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect();
                        for (key, value) in entries {
                            interp.set_property(&target, &key, value, Span::dummy())?;
                        }
                    }
                    _ => {}
                }
            }
            Ok(target)
        }),
    );
    props.insert(
        "getOwnPropertyNames".to_string(),
        native("getOwnPropertyNames", 1, |interp, this, args| {
            // Same shape as Object.keys for the supported subset.
            let keys_fn = interp
                .globals
                .lookup("Object")
                .and_then(|object| match object {
                    Value::Function(f) => f.props.borrow().get("keys").cloned(),
                    _ => None,
                });
            match keys_fn {
                Some(keys) => interp.call_value(&keys, Some(this), args.to_vec(), Span::dummy()),
                None => Ok(Value::Array(ArrayData::new(Vec::new()))),
            }
        }),
    );
    props.insert(
        "defineProperty".to_string(),
        native("defineProperty", 3, |interp, _this, args| {
            // Descriptor support is limited to value/get/set capture.
            let target = arg(args, 0);
            let key = interp.to_js_string(&arg(args, 1));
            let descriptor = arg(args, 2);
            let value = interp.get_property(&descriptor, "value", Span::dummy())?;
            if !matches!(value, Value::Undefined) {
                interp.set_property(&target, &key, value, Span::dummy())?;
            }
            if let (Value::Object(data), Ok(getter)) = (
                &target,
                interp.get_property(&descriptor, "get", Span::dummy()),
            ) {
                if let Value::Function(getter) = getter {
                    data.borrow_mut().accessors.insert(
                        key.clone(),
                        Accessor {
                            getter: Some(getter),
                            setter: None,
                        },
                    );
                }
            }
            Ok(target)
        }),
    );
    props.insert(
        "create".to_string(),
        native("create", 1, |_interp, _this, _args| {
            Ok(Value::Object(ObjectData::new()))
        }),
    );
}

// =============================================================================
// Array statics
// =============================================================================

fn install_array(interp: &mut Interpreter) {
    let array_fn = declare_fn(interp, "Array", 1, |_interp, _this, args| {
        // `Array(n)` makes a hole-free array of undefined.
        if args.len() == 1 {
            if let Value::Number(n) = args[0] {
                let len = n.max(0.0) as usize;
                return Ok(Value::Array(ArrayData::new(vec![Value::Undefined; len])));
            }
        }
        Ok(Value::Array(ArrayData::new(args.to_vec())))
    });
    let mut props = array_fn.props.borrow_mut();
    props.insert(
        "isArray".to_string(),
        native("isArray", 1, |_interp, _this, args| {
            Ok(Value::Boolean(matches!(arg(args, 0), Value::Array(_))))
        }),
    );
    props.insert(
        "from".to_string(),
        native("from", 1, |interp, _this, args| {
            let source = arg(args, 0);
            let mut out = Vec::new();
            interp.spread_into(&source, &mut out, Span::dummy())?;
            if let Value::Function(mapper) = arg(args, 1) {
                for (i, slot) in out.iter_mut().enumerate() {
                    let mapped = interp.call_function(
                        &mapper,
                        None,
                        vec![slot.clone(), Value::Number(i as f64)],
                        Span::dummy(),
                    )?;
                    *slot = mapped;
                }
            }
            Ok(Value::Array(ArrayData::new(out)))
        }),
    );
    props.insert(
        "of".to_string(),
        native("of", 0, |_interp, _this, args| {
            Ok(Value::Array(ArrayData::new(args.to_vec())))
        }),
    );
}

// =============================================================================
// Number / String / Boolean wrappers
// =============================================================================

fn install_primitive_wrappers(interp: &mut Interpreter) {
    let number_fn = declare_fn(interp, "Number", 1, |interp, _this, args| {
        let n = number_arg(interp, args, 0)?;
        Ok(Value::Number(n))
    });
    {
        let mut props = number_fn.props.borrow_mut();
        props.insert(
            "isInteger".to_string(),
            native("isInteger", 1, |_interp, _this, args| {
                Ok(Value::Boolean(matches!(
                    arg(args, 0),
                    Value::Number(n) if n.is_finite() && n.fract() == 0.0
                )))
            }),
        );
        props.insert(
            "isFinite".to_string(),
            native("isFinite", 1, |_interp, _this, args| {
                Ok(Value::Boolean(
                    matches!(arg(args, 0), Value::Number(n) if n.is_finite()),
                ))
            }),
        );
        props.insert(
            "isNaN".to_string(),
            native("isNaN", 1, |_interp, _this, args| {
                Ok(Value::Boolean(
                    matches!(arg(args, 0), Value::Number(n) if n.is_nan()),
                ))
            }),
        );
        props.insert(
            "isSafeInteger".to_string(),
            native("isSafeInteger", 1, |_interp, _this, args| {
                Ok(Value::Boolean(matches!(
                    arg(args, 0),
                    Value::Number(n)
                        if n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0
                )))
            }),
        );
        props.insert(
            "parseFloat".to_string(),
            native("parseFloat", 1, |interp, _this, args| {
                parse_float(interp, args)
            }),
        );
        props.insert(
            "parseInt".to_string(),
            native("parseInt", 2, |interp, _this, args| parse_int(interp, args)),
        );
        props.insert(
            "MAX_SAFE_INTEGER".to_string(),
            Value::Number(9_007_199_254_740_991.0),
        );
        props.insert(
            "MIN_SAFE_INTEGER".to_string(),
            Value::Number(-9_007_199_254_740_991.0),
        );
        props.insert("MAX_VALUE".to_string(), Value::Number(f64::MAX));
        props.insert("MIN_VALUE".to_string(), Value::Number(f64::MIN_POSITIVE));
        props.insert("EPSILON".to_string(), Value::Number(f64::EPSILON));
        props.insert(
            "POSITIVE_INFINITY".to_string(),
            Value::Number(f64::INFINITY),
        );
        props.insert(
            "NEGATIVE_INFINITY".to_string(),
            Value::Number(f64::NEG_INFINITY),
        );
        props.insert("NaN".to_string(), Value::Number(f64::NAN));
    }

    declare_fn(interp, "String", 1, |interp, _this, args| {
        Ok(Value::string(match args.first() {
            Some(value) => interp.to_js_string(value),
            None => String::new(),
        }))
    });
    declare_fn(interp, "Boolean", 1, |_interp, _this, args| {
        Ok(Value::Boolean(arg(args, 0).is_truthy()))
    });
}

// =============================================================================
// Symbol
// =============================================================================

fn install_symbol(interp: &mut Interpreter) {
    let iterator_symbol = Value::Symbol(interp.sym_iterator);
    let symbol_fn = declare_fn(interp, "Symbol", 1, |interp, _this, args| {
        let description = match args.first() {
            Some(Value::Undefined) | None => String::new(),
            Some(value) => interp.to_js_string(value),
        };
        Ok(Value::Symbol(interp.symbols.make(&description)))
    });
    let mut props = symbol_fn.props.borrow_mut();
    props.insert("iterator".to_string(), iterator_symbol);
    props.insert(
        "for".to_string(),
        native("for", 1, |interp, _this, args| {
            let key = interp.to_js_string(&arg(args, 0));
            Ok(Value::Symbol(interp.symbols.for_key(&key)))
        }),
    );
}

// =============================================================================
// Promise
// =============================================================================

fn install_promise(interp: &mut Interpreter) {
    let promise_fn = declare_fn(interp, "Promise", 1, |interp, _this, args| {
        // new Promise(executor): run the executor synchronously with
        // resolve/reject callbacks bound to the fresh promise.
        let promise = PromiseData::pending();
        let Value::Function(executor) = arg(args, 0) else {
            return Err(
                interp.make_error(ErrorKind::TypeError, "Promise resolver is not a function")
            );
        };
        let resolve_target = Rc::clone(&promise);
        let resolve = FunctionValue::native("resolve", 1, move |interp, _this, args| {
            interp.resolve_promise(&resolve_target, arg(args, 0));
            Ok(Value::Undefined)
        });
        let reject_target = Rc::clone(&promise);
        let reject = FunctionValue::native("reject", 1, move |interp, _this, args| {
            interp.reject_promise(&reject_target, arg(args, 0));
            Ok(Value::Undefined)
        });
        let result = interp.call_function(
            &executor,
            None,
            vec![Value::Function(resolve), Value::Function(reject)],
            Span::dummy(),
        );
        if let Err(thrown) = result {
            interp.reject_promise(&promise, thrown);
        }
        Ok(Value::Promise(promise))
    });
    let mut props = promise_fn.props.borrow_mut();
    props.insert(
        "resolve".to_string(),
        native("resolve", 1, |interp, _this, args| {
            let promise = PromiseData::pending();
            interp.resolve_promise(&promise, arg(args, 0));
            Ok(Value::Promise(promise))
        }),
    );
    props.insert(
        "reject".to_string(),
        native("reject", 1, |interp, _this, args| {
            let promise = PromiseData::pending();
            interp.reject_promise(&promise, arg(args, 0));
            Ok(Value::Promise(promise))
        }),
    );
    props.insert(
        "all".to_string(),
        native("all", 1, |interp, _this, args| {
            promise_combinator(interp, args, Combinator::All)
        }),
    );
    props.insert(
        "race".to_string(),
        native("race", 1, |interp, _this, args| {
            promise_combinator(interp, args, Combinator::Race)
        }),
    );
    props.insert(
        "allSettled".to_string(),
        native("allSettled", 1, |interp, _this, args| {
            promise_combinator(interp, args, Combinator::AllSettled)
        }),
    );
}

enum Combinator {
    All,
    Race,
    AllSettled,
}

fn promise_combinator(
    interp: &mut Interpreter,
    args: &[Value],
    kind: Combinator,
) -> Result<Value, Value> {
    let mut inputs = Vec::new();
    interp.spread_into(&arg(args, 0), &mut inputs, Span::dummy())?;
    let result = PromiseData::pending();

    match kind {
        Combinator::Race => {
            for input in inputs {
                match input {
                    Value::Promise(p) => {
                        let settled = Rc::clone(&result);
                        attach_native(interp, &p, move |interp, ok, value| {
                            if ok {
                                interp.resolve_promise(&settled, value);
                            } else {
                                interp.reject_promise(&settled, value);
                            }
                        });
                    }
                    other => {
                        interp.resolve_promise(&result, other);
                        break;
                    }
                }
            }
        }
        Combinator::All | Combinator::AllSettled => {
            let settled_all = matches!(kind, Combinator::AllSettled);
            let total = inputs.len();
            let slots = Rc::new(std::cell::RefCell::new(vec![Value::Undefined; total]));
            let remaining = Rc::new(std::cell::Cell::new(total));
            if total == 0 {
                interp.resolve_promise(&result, Value::Array(ArrayData::new(Vec::new())));
            }
            for (i, input) in inputs.into_iter().enumerate() {
                let slots = Rc::clone(&slots);
                let remaining = Rc::clone(&remaining);
                let settled = Rc::clone(&result);
                let complete = move |interp: &mut Interpreter, ok: bool, value: Value| {
                    if !ok && !settled_all {
                        interp.reject_promise(&settled, value);
                        return;
                    }
                    let entry = if settled_all {
                        let object = ObjectData::new();
                        {
                            let mut data = object.borrow_mut();
                            if ok {
                                data.properties
                                    .insert("status".to_string(), Value::string("fulfilled"));
                                data.properties.insert("value".to_string(), value);
                            } else {
                                data.properties
                                    .insert("status".to_string(), Value::string("rejected"));
                                data.properties.insert("reason".to_string(), value);
                            }
                        }
                        Value::Object(object)
                    } else {
                        value
                    };
                    slots.borrow_mut()[i] = entry;
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let values = slots.borrow().clone();
                        interp.resolve_promise(&settled, Value::Array(ArrayData::new(values)));
                    }
                };
                match input {
                    Value::Promise(p) => attach_native(interp, &p, complete),
                    other => complete(interp, true, other),
                }
            }
        }
    }
    Ok(Value::Promise(result))
}

/// Attach a Rust-side reaction through real then-handlers so ordering
/// matches user-visible `then` callbacks.
fn attach_native(
    interp: &mut Interpreter,
    promise: &Rc<std::cell::RefCell<PromiseData>>,
    complete: impl Fn(&mut Interpreter, bool, Value) + Clone + 'static,
) {
    let on_ok = {
        let complete = complete.clone();
        FunctionValue::native("", 1, move |interp, _this, args| {
            complete(interp, true, arg(args, 0));
            Ok(Value::Undefined)
        })
    };
    let on_err = FunctionValue::native("", 1, move |interp, _this, args| {
        complete(interp, false, arg(args, 0));
        Ok(Value::Undefined)
    });
    interp.promise_then(promise, Some(on_ok), Some(on_err));
}

// =============================================================================
// Timers
// =============================================================================

fn install_timers(interp: &mut Interpreter) {
    declare_fn(interp, "setTimeout", 2, |interp, _this, args| {
        let Value::Function(callback) = arg(args, 0) else {
            return Err(interp.make_error(ErrorKind::TypeError, "Timer callback must be a function"));
        };
        let delay = number_arg(interp, args, 1).unwrap_or(0.0);
        let extra = args.get(2..).map(|s| s.to_vec()).unwrap_or_default();
        let id = interp.event_loop.schedule_timer(delay, callback, extra, None);
        Ok(Value::Number(f64::from(id)))
    });
    declare_fn(interp, "setInterval", 2, |interp, _this, args| {
        let Value::Function(callback) = arg(args, 0) else {
            return Err(interp.make_error(ErrorKind::TypeError, "Timer callback must be a function"));
        };
        let delay = number_arg(interp, args, 1).unwrap_or(0.0);
        let extra = args.get(2..).map(|s| s.to_vec()).unwrap_or_default();
        let id = interp
            .event_loop
            .schedule_timer(delay, callback, extra, Some(delay));
        Ok(Value::Number(f64::from(id)))
    });
    for name in ["clearTimeout", "clearInterval"] {
        declare_fn(interp, name, 1, |interp, _this, args| {
            if let Value::Number(id) = arg(args, 0) {
                interp.event_loop.cancel_timer(id as u32);
            }
            Ok(Value::Undefined)
        });
    }
}

// =============================================================================
// Global functions
// =============================================================================

fn parse_int(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Value> {
    let text = interp.to_js_string(&arg(args, 0));
    let radix = match arg(args, 1) {
        Value::Number(r) if r != 0.0 => r as u32,
        _ => 10,
    };
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = if radix == 16 {
        digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
    } else {
        digits
    };
    // Longest valid prefix.
    let mut end = 0;
    for (i, ch) in digits.char_indices() {
        if ch.to_digit(radix).is_some() {
            end = i + ch.len_utf8();
        } else {
            break;
        }
    }
    if end == 0 {
        return Ok(Value::Number(f64::NAN));
    }
    let value = i64::from_str_radix(&digits[..end], radix)
        .map(|v| v as f64)
        .unwrap_or(f64::NAN);
    Ok(Value::Number(if negative { -value } else { value }))
}

fn parse_float(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Value> {
    let text = interp.to_js_string(&arg(args, 0));
    let trimmed = text.trim();
    // Longest valid float prefix.
    let mut end = trimmed.len();
    while end > 0 && trimmed[..end].parse::<f64>().is_err() {
        end -= 1;
    }
    if end == 0 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(trimmed[..end].parse::<f64>().unwrap_or(f64::NAN)))
}

fn install_global_functions(interp: &mut Interpreter) {
    declare_fn(interp, "parseInt", 2, |interp, _this, args| {
        parse_int(interp, args)
    });
    declare_fn(interp, "parseFloat", 1, |interp, _this, args| {
        parse_float(interp, args)
    });
    declare_fn(interp, "isNaN", 1, |interp, _this, args| {
        let n = number_arg(interp, args, 0)?;
        Ok(Value::Boolean(n.is_nan()))
    });
    declare_fn(interp, "isFinite", 1, |interp, _this, args| {
        let n = number_arg(interp, args, 0)?;
        Ok(Value::Boolean(n.is_finite()))
    });
    declare_fn(interp, "structuredClone", 1, |interp, _this, args| {
        deep_clone(interp, &arg(args, 0))
    });

    // Date and RegExp constructors.
    let date_fn = declare_fn(interp, "Date", 1, |interp, _this, args| {
        let ms = match args.first() {
            Some(value) => interp.to_number(value, Span::dummy())?,
            // The engine's clock is virtual and deterministic.
            None => interp.event_loop.now,
        };
        Ok(Value::Date(Rc::new(std::cell::RefCell::new(ms))))
    });
    date_fn.props.borrow_mut().insert(
        "now".to_string(),
        native("now", 0, |interp, _this, _args| {
            Ok(Value::Number(interp.event_loop.now))
        }),
    );

    declare_fn(interp, "RegExp", 2, |interp, _this, args| {
        let pattern = interp.to_js_string(&arg(args, 0));
        let flags = match args.get(1) {
            Some(Value::String(s)) => s.to_string(),
            _ => String::new(),
        };
        Ok(interp.make_regex(&pattern, &flags))
    });
}

fn deep_clone(interp: &mut Interpreter, value: &Value) -> Result<Value, Value> {
    Ok(match value {
        Value::Array(data) => {
            let mut out = Vec::new();
            let elements = data.borrow().elements.clone();
            for element in &elements {
                out.push(deep_clone(interp, element)?);
            }
            Value::Array(ArrayData::new(out))
        }
        Value::Object(data) => {
            let clone = ObjectData::new();
            let entries: Vec<(String, Value)> = data
                .borrow()
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (key, entry) in entries {
                let cloned = deep_clone(interp, &entry)?;
                clone.borrow_mut().properties.insert(key, cloned);
            }
            Value::Object(clone)
        }
        other => other.clone(),
    })
}

impl Interpreter {
    /// Build a regex value, compiling the pattern through the regex crate
    /// where its dialect allows.
    pub fn make_regex(&mut self, pattern: &str, flags: &str) -> Value {
        let mut translated = pattern.to_string();
        if flags.contains('i') {
            translated = format!("(?i){translated}");
        }
        if flags.contains('s') {
            translated = format!("(?s){translated}");
        }
        if flags.contains('m') {
            translated = format!("(?m){translated}");
        }
        let compiled = regex::Regex::new(&translated).ok();
        if compiled.is_none() {
            tracing::warn!(pattern, "regex pattern outside the supported dialect");
        }
        Value::Regex(Rc::new(RegexValue {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
            compiled,
        }))
    }
}
