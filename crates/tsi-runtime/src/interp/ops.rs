//! Expression evaluation and operator semantics.
//!
//! All operations follow ECMAScript semantics for the supported subset:
//! `+` stringifies when either side is a string, `===` never coerces,
//! `==` applies loose equality, Number and BigInt never mix silently,
//! optional chains short-circuit on nullish to `undefined`.

use std::rc::Rc;

use num_bigint::BigInt;
use tsi_common::numeric::{format_bigint, format_number};
use tsi_common::span::Span;
use tsi_parser::ast::*;

use crate::env::{EnvRef, Environment};
use crate::error::ErrorKind;
use crate::value::*;

use super::Interpreter;

type EvalResult = Result<Value, Value>;

impl Interpreter {
    // =========================================================================
    // Entry
    // =========================================================================

    pub fn eval(&mut self, expr: &Expr, env: &EnvRef) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(self.eval_literal(lit)),
            ExprKind::Variable(name) => self.eval_variable(name, expr.span, env),
            ExprKind::This => {
                if let Some(value) = env.lookup("this") {
                    Ok(value)
                } else if self
                    .ctor_frames
                    .last()
                    .map(|frame| !frame.super_called)
                    .unwrap_or(false)
                {
                    Err(self.make_error(
                        ErrorKind::ReferenceError,
                        "Must call super constructor in derived class before accessing 'this'",
                    ))
                } else {
                    Ok(Value::Undefined)
                }
            }
            ExprKind::Super { .. } => Err(self.make_error(
                ErrorKind::SyntaxError,
                "'super' is only valid in calls and member accesses",
            )),
            ExprKind::Grouping(inner) => self.eval(inner, env),

            ExprKind::Binary { op, left, right } => {
                // `typeof` probing of unbound names must not throw, and the
                // compare itself happens on the resulting string.
                let lhs = self.eval(left, env)?;
                let rhs = self.eval(right, env)?;
                self.binary_op(*op, lhs, rhs, expr.span)
            }
            ExprKind::Logical { op, left, right } => {
                let lhs = self.eval(left, env)?;
                match op {
                    LogicalOp::And => {
                        if lhs.is_truthy() {
                            self.eval(right, env)
                        } else {
                            Ok(lhs)
                        }
                    }
                    LogicalOp::Or => {
                        if lhs.is_truthy() {
                            Ok(lhs)
                        } else {
                            self.eval(right, env)
                        }
                    }
                }
            }
            ExprKind::NullishCoalescing { left, right } => {
                let lhs = self.eval(left, env)?;
                if lhs.is_nullish() {
                    self.eval(right, env)
                } else {
                    Ok(lhs)
                }
            }
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, env),
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let test = self.eval(cond, env)?;
                if test.is_truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            ExprKind::Delete(target) => self.eval_delete(target, env),

            ExprKind::Assign { target, value } => {
                let value = self.eval(value, env)?;
                self.write_target(target, value.clone(), env, expr.span)?;
                Ok(value)
            }
            ExprKind::CompoundAssign { target, op, value } => {
                // Atomic on the target reference: read, combine, write.
                let current = self.read_target(target, env, expr.span)?;
                let rhs = self.eval(value, env)?;
                let combined = self.binary_op(*op, current, rhs, expr.span)?;
                self.write_target(target, combined.clone(), env, expr.span)?;
                Ok(combined)
            }
            ExprKind::LogicalAssign { target, op, value } => {
                let current = self.read_target(target, env, expr.span)?;
                let should_assign = match op {
                    LogicalAssignOp::AndAnd => current.is_truthy(),
                    LogicalAssignOp::OrOr => !current.is_truthy(),
                    LogicalAssignOp::Nullish => current.is_nullish(),
                };
                if should_assign {
                    let rhs = self.eval(value, env)?;
                    self.write_target(target, rhs.clone(), env, expr.span)?;
                    Ok(rhs)
                } else {
                    Ok(current)
                }
            }
            ExprKind::Update { op, prefix, target } => {
                let current = self.read_target(target, env, expr.span)?;
                let (old, new) = match current {
                    Value::Number(n) => {
                        let delta = if *op == UpdateOp::Increment { 1.0 } else { -1.0 };
                        (Value::Number(n), Value::Number(n + delta))
                    }
                    Value::BigInt(v) => {
                        let one = BigInt::from(1);
                        let next = if *op == UpdateOp::Increment {
                            (*v).clone() + one
                        } else {
                            (*v).clone() - one
                        };
                        (Value::BigInt(v), Value::BigInt(Rc::new(next)))
                    }
                    other => {
                        let n = self.to_number(&other, expr.span)?;
                        let delta = if *op == UpdateOp::Increment { 1.0 } else { -1.0 };
                        (Value::Number(n), Value::Number(n + delta))
                    }
                };
                self.write_target(target, new.clone(), env, expr.span)?;
                Ok(if *prefix { new } else { old })
            }

            ExprKind::Get { .. } | ExprKind::GetIndex { .. } | ExprKind::Call { .. } => {
                // Member/call chains go through the chain evaluator so an
                // optional link short-circuits the whole chain.
                Ok(self.eval_chain(expr, env)?.unwrap_or(Value::Undefined))
            }
            ExprKind::PrivateGet { object, name } => {
                let object = self.eval(object, env)?;
                self.private_get(&object, name)
            }
            ExprKind::New {
                callee,
                args,
                ..
            } => self.eval_new(callee, args, env, expr.span),
            ExprKind::Function(func) => Ok(self.make_closure(func, env)),

            ExprKind::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    if element.spread {
                        let spread = self.eval(&element.expr, env)?;
                        self.spread_into(&spread, &mut values, element.expr.span)?;
                    } else {
                        values.push(self.eval(&element.expr, env)?);
                    }
                }
                Ok(Value::Array(ArrayData::new(values)))
            }
            ExprKind::ObjectLiteral(properties) => self.eval_object_literal(properties, env),
            ExprKind::Spread(inner) => self.eval(inner, env),

            ExprKind::TemplateLiteral { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(&quasi.cooked);
                    if let Some(sub) = exprs.get(i) {
                        let value = self.eval(sub, env)?;
                        out.push_str(&self.to_js_string(&value));
                    }
                }
                Ok(Value::string(out))
            }
            ExprKind::TaggedTemplate { tag, quasis, exprs } => {
                self.eval_tagged_template(expr.id, tag, quasis, exprs, env, expr.span)
            }
            ExprKind::RegexLiteral { pattern, flags } => {
                Ok(self.make_regex(pattern, flags))
            }

            // Runtime pass-throughs.
            ExprKind::TypeAssertion { expr: inner, .. }
            | ExprKind::Satisfies { expr: inner, .. }
            | ExprKind::NonNull(inner) => self.eval(inner, env),

            ExprKind::Await(_) | ExprKind::Yield { .. } => Err(self.make_error(
                ErrorKind::SyntaxError,
                "suspension point outside an async or generator body",
            )),
            ExprKind::DynamicImport(path) => self.eval_dynamic_import(path, env),
            ExprKind::ImportMeta => {
                let object = ObjectData::new();
                let path = self.current_module.clone().unwrap_or_default();
                object
                    .borrow_mut()
                    .properties
                    .insert("url".to_string(), Value::string(path.clone()));
                object
                    .borrow_mut()
                    .properties
                    .insert("path".to_string(), Value::string(path));
                Ok(Value::Object(object))
            }
            ExprKind::ClassExpr(class) => self.eval_class(class, env),
        }
    }

    pub(crate) fn eval_literal(&mut self, lit: &Lit) -> Value {
        match lit {
            Lit::Number(n) => Value::Number(*n),
            Lit::String(s) => Value::string(s.clone()),
            Lit::Boolean(b) => Value::Boolean(*b),
            Lit::BigInt(v) => Value::BigInt(Rc::new(v.clone())),
            Lit::Null => Value::Null,
            Lit::Undefined => Value::Undefined,
        }
    }

    fn eval_variable(&mut self, name: &str, _span: Span, env: &EnvRef) -> EvalResult {
        match env.lookup(name) {
            Some(value) => Ok(value),
            None => Err(self.make_error(
                ErrorKind::ReferenceError,
                &format!("{name} is not defined"),
            )),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, env: &EnvRef) -> EvalResult {
        if op == UnaryOp::Typeof {
            // typeof on an unbound name answers "undefined", not a throw.
            if let ExprKind::Variable(name) = &operand.kind {
                if !env.has(name) {
                    return Ok(Value::string("undefined"));
                }
            }
            let value = self.eval(operand, env)?;
            return Ok(Value::string(value.type_of()));
        }
        let value = self.eval(operand, env)?;
        match op {
            UnaryOp::Minus => match value {
                Value::BigInt(v) => Ok(Value::BigInt(Rc::new(-(*v).clone()))),
                other => Ok(Value::Number(-self.to_number(&other, operand.span)?)),
            },
            UnaryOp::Plus => match value {
                Value::BigInt(_) => Err(self.make_error(
                    ErrorKind::TypeError,
                    "Cannot convert a BigInt value to a number",
                )),
                other => Ok(Value::Number(self.to_number(&other, operand.span)?)),
            },
            UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
            UnaryOp::BitNot => match value {
                Value::BigInt(v) => Ok(Value::BigInt(Rc::new(!(*v).clone()))),
                other => {
                    let n = self.to_number(&other, operand.span)?;
                    Ok(Value::Number(f64::from(!to_int32(n))))
                }
            },
            UnaryOp::Void => Ok(Value::Undefined),
            UnaryOp::Typeof => unreachable!("handled above"),
        }
    }

    fn eval_delete(&mut self, target: &Expr, env: &EnvRef) -> EvalResult {
        match &target.kind {
            ExprKind::Get { object, name, .. } => {
                let object = self.eval(object, env)?;
                self.delete_property(&object, name)
            }
            ExprKind::GetIndex { object, index, .. } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                let key = self.to_js_string(&key);
                self.delete_property(&object, &key)
            }
            _ => Ok(Value::Boolean(true)),
        }
    }

    fn delete_property(&mut self, object: &Value, name: &str) -> EvalResult {
        match object {
            Value::Object(data) => {
                let mut data = data.borrow_mut();
                if data.frozen || data.sealed {
                    if self.options.strict {
                        return Err(self.make_error(
                            ErrorKind::TypeError,
                            &format!("Cannot delete property '{name}' of a sealed object"),
                        ));
                    }
                    return Ok(Value::Boolean(false));
                }
                data.properties.shift_remove(name);
                data.accessors.shift_remove(name);
                Ok(Value::Boolean(true))
            }
            Value::Instance(data) => {
                let mut data = data.borrow_mut();
                if data.frozen || data.sealed {
                    if self.options.strict {
                        return Err(self.make_error(
                            ErrorKind::TypeError,
                            &format!("Cannot delete property '{name}' of a sealed object"),
                        ));
                    }
                    return Ok(Value::Boolean(false));
                }
                data.fields.shift_remove(name);
                Ok(Value::Boolean(true))
            }
            _ => Ok(Value::Boolean(true)),
        }
    }

    // =========================================================================
    // Optional chains
    // =========================================================================

    /// Evaluate a member/call chain. `None` means an optional link saw a
    /// nullish base and the whole chain short-circuits to undefined.
    pub(crate) fn eval_chain(&mut self, expr: &Expr, env: &EnvRef) -> Result<Option<Value>, Value> {
        match &expr.kind {
            ExprKind::Get {
                object,
                name,
                optional,
            } => {
                // Const-enum accesses were folded by the checker.
                if let Some(inlined) = self.type_map.inlined_enum_values.get(&expr.id).cloned() {
                    return Ok(Some(match inlined {
                        tsi_checker::state::EnumValue::Number(n) => Value::Number(n),
                        tsi_checker::state::EnumValue::String(s) => Value::string(s),
                    }));
                }
                let Some(base) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                self.get_property(&base, name, expr.span).map(Some)
            }
            ExprKind::GetIndex {
                object,
                index,
                optional,
            } => {
                let Some(base) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index, env)?;
                self.get_index(&base, &key, expr.span).map(Some)
            }
            ExprKind::Call {
                callee,
                args,
                optional,
                ..
            } => {
                // `super(...)` and `super.m(...)` resolve statically.
                if let ExprKind::Super { method } = &callee.kind {
                    let arg_values = self.eval_args(args, env)?;
                    return self
                        .call_super(method.as_deref(), arg_values, env, expr.span)
                        .map(Some);
                }
                // Method call: receiver is the chain base.
                let (callee_value, this) = match &callee.kind {
                    ExprKind::Get {
                        object,
                        name,
                        optional: get_optional,
                    } => {
                        let Some(base) = self.eval_chain(object, env)? else {
                            return Ok(None);
                        };
                        if *get_optional && base.is_nullish() {
                            return Ok(None);
                        }
                        let method = self.get_property(&base, name, callee.span)?;
                        (method, Some(base))
                    }
                    ExprKind::GetIndex {
                        object,
                        index,
                        optional: get_optional,
                    } => {
                        let Some(base) = self.eval_chain(object, env)? else {
                            return Ok(None);
                        };
                        if *get_optional && base.is_nullish() {
                            return Ok(None);
                        }
                        let key = self.eval(index, env)?;
                        let method = self.get_index(&base, &key, callee.span)?;
                        (method, Some(base))
                    }
                    _ => {
                        let Some(value) = self.eval_chain_or_plain(callee, env)? else {
                            return Ok(None);
                        };
                        (value, None)
                    }
                };
                if *optional && callee_value.is_nullish() {
                    return Ok(None);
                }
                let arg_values = self.eval_args(args, env)?;
                self.call_value(&callee_value, this, arg_values, expr.span)
                    .map(Some)
            }
            _ => self.eval(expr, env).map(Some),
        }
    }

    fn eval_chain_or_plain(&mut self, expr: &Expr, env: &EnvRef) -> Result<Option<Value>, Value> {
        match &expr.kind {
            ExprKind::Get { .. } | ExprKind::GetIndex { .. } | ExprKind::Call { .. } => {
                self.eval_chain(expr, env)
            }
            _ => self.eval(expr, env).map(Some),
        }
    }

    pub(crate) fn eval_args(
        &mut self,
        args: &[Argument],
        env: &EnvRef,
    ) -> Result<Vec<Value>, Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            if arg.spread {
                let spread = self.eval(&arg.expr, env)?;
                self.spread_into(&spread, &mut values, arg.expr.span)?;
            } else {
                values.push(self.eval(&arg.expr, env)?);
            }
        }
        Ok(values)
    }

    pub(crate) fn spread_into(
        &mut self,
        value: &Value,
        out: &mut Vec<Value>,
        span: Span,
    ) -> Result<(), Value> {
        let mut iterator = self.get_iterator(value, span)?;
        while let Some(item) = iterator.next(self, Value::Undefined)? {
            out.push(item);
        }
        Ok(())
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call any callable value.
    pub fn call_value(
        &mut self,
        callee: &Value,
        this: Option<Value>,
        args: Vec<Value>,
        span: Span,
    ) -> EvalResult {
        match callee {
            Value::Function(func) => self.call_function(func, this, args, span),
            Value::Class(_) => Err(self.make_error(
                ErrorKind::TypeError,
                "Class constructor cannot be invoked without 'new'",
            )),
            other => Err(self.make_error(
                ErrorKind::TypeError,
                &format!("{} is not a function", self.to_js_string(other)),
            )),
        }
    }

    pub fn call_function(
        &mut self,
        func: &Rc<FunctionValue>,
        this: Option<Value>,
        args: Vec<Value>,
        span: Span,
    ) -> EvalResult {
        match &func.kind {
            FnKind::Native { func: native, .. } => {
                let native = Rc::clone(native);
                let name = func.name.borrow().clone().unwrap_or_default();
                self.push_frame(&name, span)?;
                let result = native(self, this.unwrap_or(Value::Undefined), &args);
                self.pop_frame();
                result
            }
            FnKind::Bound {
                target,
                bound_this,
                bound_args,
            } => {
                let mut all = bound_args.clone();
                all.extend(args);
                let target = Rc::clone(target);
                let bound_this = bound_this.clone();
                self.call_function(&target, Some(bound_this), all, span)
            }
            FnKind::Script(data) => {
                let data = Rc::clone(data);
                if data.flags.contains(FunctionFlags::GENERATOR) {
                    return self.make_generator_object(func, this, args);
                }
                if data.flags.contains(FunctionFlags::ASYNC) {
                    return self.start_async_call(func, this, args);
                }
                let name = func.name.borrow().clone().unwrap_or_else(|| "<anonymous>".into());
                self.push_frame(&name, span)?;
                self.home_stack.push(*func.home_class.borrow());
                let env = match self.bind_call_env(func, &data, this, args) {
                    Ok(env) => env,
                    Err(thrown) => {
                        self.home_stack.pop();
                        self.pop_frame();
                        return Err(thrown);
                    }
                };
                let result = match &data.body {
                    FunctionBody::Block(stmts) => match self.exec_stmts(stmts, &env) {
                        crate::completion::Completion::Return(value) => Ok(value),
                        crate::completion::Completion::Normal(_) => Ok(Value::Undefined),
                        crate::completion::Completion::Throw(thrown) => Err(thrown),
                        other => Err(self.make_error(
                            ErrorKind::SyntaxError,
                            &format!("illegal completion escaping a function body: {other:?}"),
                        )),
                    },
                    FunctionBody::Expr(expr) => self.eval(expr, &env),
                };
                self.home_stack.pop();
                self.pop_frame();
                result
            }
        }
    }

    /// Function-entry frame: bind `this` (non-arrows), then parameters
    /// with defaults and rest collection.
    pub(crate) fn bind_call_env(
        &mut self,
        func: &Rc<FunctionValue>,
        data: &Rc<FunctionData>,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<EnvRef, Value> {
        let parent = func
            .env
            .clone()
            .unwrap_or_else(|| Rc::clone(&self.globals));
        let env = Environment::child(&parent);
        if !data.flags.contains(FunctionFlags::ARROW) {
            let this_value = func.this_binding.borrow().clone().or(this);
            if let Some(this_value) = this_value {
                env.declare("this", this_value, false);
            }
        }
        for (i, param) in data.params.iter().enumerate() {
            if param.rest {
                let rest: Vec<Value> = args.get(i..).map(|s| s.to_vec()).unwrap_or_default();
                env.declare(&param.name, Value::Array(ArrayData::new(rest)), true);
                break;
            }
            let mut value = args.get(i).cloned().unwrap_or(Value::Undefined);
            if matches!(value, Value::Undefined) {
                if let Some(default) = &param.default {
                    value = self.eval(default, &env)?;
                }
            }
            env.declare(&param.name, value, true);
        }
        Ok(env)
    }

    fn eval_tagged_template(
        &mut self,
        site: NodeId,
        tag: &Expr,
        quasis: &[TemplateElement],
        exprs: &[Expr],
        env: &EnvRef,
        span: Span,
    ) -> EvalResult {
        // The cooked array is interned per call site so repeated calls
        // observe the same reference.
        let cooked = match self.tagged_cache.get(&site.0) {
            Some(value) => value.clone(),
            None => {
                let values: Vec<Value> = quasis
                    .iter()
                    .map(|q| Value::string(q.cooked.clone()))
                    .collect();
                let array = Value::Array(ArrayData::new(values));
                if let Value::Array(data) = &array {
                    data.borrow_mut().frozen = true;
                }
                self.tagged_cache.insert(site.0, array.clone());
                array
            }
        };
        let (tag_value, this) = match &tag.kind {
            ExprKind::Get { object, name, .. } => {
                let base = self.eval(object, env)?;
                let method = self.get_property(&base, name, tag.span)?;
                (method, Some(base))
            }
            _ => (self.eval(tag, env)?, None),
        };
        let mut call_args = vec![cooked];
        for sub in exprs {
            call_args.push(self.eval(sub, env)?);
        }
        self.call_value(&tag_value, this, call_args, span)
    }

    fn eval_object_literal(
        &mut self,
        properties: &[ObjectProperty],
        env: &EnvRef,
    ) -> EvalResult {
        let object = ObjectData::new();
        for property in properties {
            match property {
                ObjectProperty::KeyValue { key, value } => {
                    let key = self.eval_property_key(key, env)?;
                    let value = self.eval(value, env)?;
                    object.borrow_mut().properties.insert(key, value);
                }
                ObjectProperty::Shorthand { name, span, .. } => {
                    let value = match env.lookup(name) {
                        Some(value) => value,
                        None => {
                            let _ = span;
                            return Err(self.make_error(
                                ErrorKind::ReferenceError,
                                &format!("{name} is not defined"),
                            ));
                        }
                    };
                    object.borrow_mut().properties.insert(name.clone(), value);
                }
                ObjectProperty::Spread(inner) => {
                    let spread = self.eval(inner, env)?;
                    match &spread {
                        Value::Object(source) => {
                            let source = source.borrow();
                            for (key, value) in &source.properties {
                                object
                                    .borrow_mut()
                                    .properties
                                    .insert(key.clone(), value.clone());
                            }
                        }
                        Value::Instance(source) => {
                            let source = source.borrow();
                            for (key, value) in &source.fields {
                                object
                                    .borrow_mut()
                                    .properties
                                    .insert(key.clone(), value.clone());
                            }
                        }
                        Value::Array(source) => {
                            for (i, value) in source.borrow().elements.iter().enumerate() {
                                object
                                    .borrow_mut()
                                    .properties
                                    .insert(i.to_string(), value.clone());
                            }
                        }
                        _ => {}
                    }
                }
                ObjectProperty::Method { key, func } => {
                    let key = self.eval_property_key(key, env)?;
                    let value = self.make_closure(func, env);
                    if let Value::Function(f) = &value {
                        let mut name = f.name.borrow_mut();
                        if name.is_none() {
                            *name = Some(key.clone());
                        }
                    }
                    object.borrow_mut().properties.insert(key, value);
                }
                ObjectProperty::Getter { key, func } => {
                    let key = self.eval_property_key(key, env)?;
                    let Value::Function(getter) = self.make_closure(func, env) else {
                        unreachable!();
                    };
                    let mut data = object.borrow_mut();
                    let accessor = data.accessors.entry(key).or_insert(Accessor {
                        getter: None,
                        setter: None,
                    });
                    accessor.getter = Some(getter);
                }
                ObjectProperty::Setter { key, func } => {
                    let key = self.eval_property_key(key, env)?;
                    let Value::Function(setter) = self.make_closure(func, env) else {
                        unreachable!();
                    };
                    let mut data = object.borrow_mut();
                    let accessor = data.accessors.entry(key).or_insert(Accessor {
                        getter: None,
                        setter: None,
                    });
                    accessor.setter = Some(setter);
                }
            }
        }
        Ok(Value::Object(object))
    }

    pub(crate) fn eval_property_key(
        &mut self,
        key: &PropertyKey,
        env: &EnvRef,
    ) -> Result<String, Value> {
        match key {
            PropertyKey::Ident(name) | PropertyKey::String(name) => Ok(name.clone()),
            PropertyKey::Private(name) => Ok(format!("#{name}")),
            PropertyKey::Number(n) => Ok(format_number(*n)),
            PropertyKey::Computed(expr) => {
                let value = self.eval(expr, env)?;
                Ok(self.to_js_string(&value))
            }
        }
    }

    // =========================================================================
    // Assignment targets
    // =========================================================================

    pub(crate) fn read_target(
        &mut self,
        target: &AssignTarget,
        env: &EnvRef,
        span: Span,
    ) -> EvalResult {
        match target {
            AssignTarget::Name(name) => match env.lookup(name) {
                Some(value) => Ok(value),
                None => Err(self.make_error(
                    ErrorKind::ReferenceError,
                    &format!("{name} is not defined"),
                )),
            },
            AssignTarget::Property { object, name } => {
                let object = self.eval(object, env)?;
                self.get_property(&object, name, span)
            }
            AssignTarget::Index { object, index } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                self.get_index(&object, &key, span)
            }
            AssignTarget::Private { object, name } => {
                let object = self.eval(object, env)?;
                self.private_get(&object, name)
            }
        }
    }

    pub(crate) fn write_target(
        &mut self,
        target: &AssignTarget,
        value: Value,
        env: &EnvRef,
        span: Span,
    ) -> Result<(), Value> {
        match target {
            AssignTarget::Name(name) => match env.assign(name, value) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    if self.options.strict {
                        Err(self.make_error(
                            ErrorKind::TypeError,
                            &format!("Assignment to constant variable '{name}'"),
                        ))
                    } else {
                        Ok(())
                    }
                }
                Err(()) => Err(self.make_error(
                    ErrorKind::ReferenceError,
                    &format!("{name} is not defined"),
                )),
            },
            AssignTarget::Property { object, name } => {
                let object = self.eval(object, env)?;
                self.set_property(&object, name, value, span)
            }
            AssignTarget::Index { object, index } => {
                let object = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                self.set_index(&object, &key, value, span)
            }
            AssignTarget::Private { object, name } => {
                let object = self.eval(object, env)?;
                if let Value::Instance(instance) = &object {
                    let frozen = instance.borrow().frozen;
                    if frozen {
                        return self.frozen_write_failure(name);
                    }
                    instance
                        .borrow_mut()
                        .private_fields
                        .insert(name.clone(), value);
                    Ok(())
                } else {
                    Err(self.make_error(
                        ErrorKind::TypeError,
                        "Private fields only exist on class instances",
                    ))
                }
            }
        }
    }

    pub(crate) fn frozen_write_failure(&mut self, name: &str) -> Result<(), Value> {
        if self.options.strict {
            Err(self.make_error(
                ErrorKind::TypeError,
                &format!("Cannot assign to read only property '{name}' of a frozen object"),
            ))
        } else {
            // Non-strict: silent no-op, value observationally unchanged.
            Ok(())
        }
    }

    // =========================================================================
    // Operators
    // =========================================================================

    pub fn binary_op(&mut self, op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> EvalResult {
        use BinaryOp::*;
        match op {
            Add => self.op_add(lhs, rhs, span),
            Sub | Mul | Div | Rem | Exp => self.op_arith(op, lhs, rhs, span),
            Shl | Shr | UShr | BitAnd | BitOr | BitXor => self.op_bitwise(op, lhs, rhs, span),
            EqEqEq => Ok(Value::Boolean(lhs.same_value(&rhs))),
            NotEqEq => Ok(Value::Boolean(!lhs.same_value(&rhs))),
            EqEq => Ok(Value::Boolean(self.loose_equals(&lhs, &rhs))),
            NotEq => Ok(Value::Boolean(!self.loose_equals(&lhs, &rhs))),
            Lt | LtEq | Gt | GtEq => self.op_compare(op, lhs, rhs, span),
            In => self.op_in(lhs, rhs),
            Instanceof => self.op_instanceof(lhs, rhs),
        }
    }

    fn op_add(&mut self, lhs: Value, rhs: Value, span: Span) -> EvalResult {
        // String on either side concatenates.
        if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
            let mut out = self.to_js_string(&lhs);
            out.push_str(&self.to_js_string(&rhs));
            return Ok(Value::string(out));
        }
        match (&lhs, &rhs) {
            (Value::BigInt(a), Value::BigInt(b)) => {
                Ok(Value::BigInt(Rc::new((**a).clone() + (**b).clone())))
            }
            (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(self.make_error(
                ErrorKind::TypeError,
                "Cannot mix BigInt and other types, use explicit conversions",
            )),
            _ => {
                let a = self.to_number(&lhs, span)?;
                let b = self.to_number(&rhs, span)?;
                Ok(Value::Number(a + b))
            }
        }
    }

    fn op_arith(&mut self, op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> EvalResult {
        use BinaryOp::*;
        match (&lhs, &rhs) {
            (Value::BigInt(a), Value::BigInt(b)) => {
                let a = (**a).clone();
                let b = (**b).clone();
                let result = match op {
                    Sub => a - b,
                    Mul => a * b,
                    Div => {
                        if b == BigInt::from(0) {
                            return Err(
                                self.make_error(ErrorKind::RangeError, "Division by zero")
                            );
                        }
                        a / b
                    }
                    Rem => {
                        if b == BigInt::from(0) {
                            return Err(
                                self.make_error(ErrorKind::RangeError, "Division by zero")
                            );
                        }
                        a % b
                    }
                    Exp => {
                        let exp = u32::try_from(b).map_err(|_| {
                            self.make_error(
                                ErrorKind::RangeError,
                                "Exponent must be non-negative",
                            )
                        })?;
                        a.pow(exp)
                    }
                    _ => unreachable!(),
                };
                Ok(Value::BigInt(Rc::new(result)))
            }
            (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(self.make_error(
                ErrorKind::TypeError,
                "Cannot mix BigInt and other types, use explicit conversions",
            )),
            _ => {
                let a = self.to_number(&lhs, span)?;
                let b = self.to_number(&rhs, span)?;
                let result = match op {
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    Rem => a % b,
                    Exp => a.powf(b),
                    _ => unreachable!(),
                };
                Ok(Value::Number(result))
            }
        }
    }

    fn op_bitwise(&mut self, op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> EvalResult {
        use BinaryOp::*;
        if let (Value::BigInt(a), Value::BigInt(b)) = (&lhs, &rhs) {
            let a = (**a).clone();
            let b = (**b).clone();
            let result = match op {
                BitAnd => a & b,
                BitOr => a | b,
                BitXor => a ^ b,
                Shl => {
                    let shift = u32::try_from(b).unwrap_or(0);
                    a << shift
                }
                Shr => {
                    let shift = u32::try_from(b).unwrap_or(0);
                    a >> shift
                }
                _ => {
                    return Err(self.make_error(
                        ErrorKind::TypeError,
                        "BigInts have no unsigned right shift",
                    ));
                }
            };
            return Ok(Value::BigInt(Rc::new(result)));
        }
        let a = self.to_number(&lhs, span)?;
        let b = self.to_number(&rhs, span)?;
        let result = match op {
            Shl => f64::from(to_int32(a).wrapping_shl(to_uint32(b) & 31)),
            Shr => f64::from(to_int32(a).wrapping_shr(to_uint32(b) & 31)),
            UShr => f64::from(to_uint32(a).wrapping_shr(to_uint32(b) & 31)),
            BitAnd => f64::from(to_int32(a) & to_int32(b)),
            BitOr => f64::from(to_int32(a) | to_int32(b)),
            BitXor => f64::from(to_int32(a) ^ to_int32(b)),
            _ => unreachable!(),
        };
        Ok(Value::Number(result))
    }

    fn op_compare(&mut self, op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> EvalResult {
        use BinaryOp::*;
        // String-string comparison is lexicographic.
        if let (Value::String(a), Value::String(b)) = (&lhs, &rhs) {
            let result = match op {
                Lt => a < b,
                LtEq => a <= b,
                Gt => a > b,
                GtEq => a >= b,
                _ => unreachable!(),
            };
            return Ok(Value::Boolean(result));
        }
        if let (Value::BigInt(a), Value::BigInt(b)) = (&lhs, &rhs) {
            let result = match op {
                Lt => a < b,
                LtEq => a <= b,
                Gt => a > b,
                GtEq => a >= b,
                _ => unreachable!(),
            };
            return Ok(Value::Boolean(result));
        }
        let a = self.comparable_number(&lhs, span)?;
        let b = self.comparable_number(&rhs, span)?;
        let result = match op {
            Lt => a < b,
            LtEq => a <= b,
            Gt => a > b,
            GtEq => a >= b,
            _ => unreachable!(),
        };
        Ok(Value::Boolean(result))
    }

    fn comparable_number(&mut self, value: &Value, span: Span) -> Result<f64, Value> {
        match value {
            // Cross-type bigint comparisons go through f64.
            Value::BigInt(v) => Ok(bigint_to_f64(v)),
            other => self.to_number(other, span),
        }
    }

    fn op_in(&mut self, key: Value, object: Value) -> EvalResult {
        let result = match &object {
            Value::Object(data) => {
                let data = data.borrow();
                match &key {
                    Value::Symbol(id) => data.symbols.contains_key(id),
                    other => {
                        let key = self.to_js_string(other);
                        data.properties.contains_key(&key) || data.accessors.contains_key(&key)
                    }
                }
            }
            Value::Instance(data) => {
                let data = data.borrow();
                match &key {
                    Value::Symbol(id) => data.symbols.contains_key(id),
                    other => {
                        let key = self.to_js_string(other);
                        data.fields.contains_key(&key)
                            || self.find_method(data.class, &key).is_some()
                    }
                }
            }
            Value::Array(data) => {
                let key = self.to_js_string(&key);
                key.parse::<usize>()
                    .map(|i| i < data.borrow().elements.len())
                    .unwrap_or(key == "length")
            }
            _ => {
                return Err(self.make_error(
                    ErrorKind::TypeError,
                    "Cannot use 'in' operator on a non-object",
                ));
            }
        };
        Ok(Value::Boolean(result))
    }

    fn op_instanceof(&mut self, value: Value, class: Value) -> EvalResult {
        match &class {
            Value::Class(class_id) => {
                let Value::Instance(instance) = &value else {
                    return Ok(Value::Boolean(false));
                };
                let mut current = Some(instance.borrow().class);
                while let Some(id) = current {
                    if id == *class_id {
                        return Ok(Value::Boolean(true));
                    }
                    current = self.class(id).parent;
                }
                Ok(Value::Boolean(false))
            }
            // Built-in constructor functions check the value tag.
            Value::Function(func) => {
                let name = func.name.borrow().clone().unwrap_or_default();
                let result = match name.as_str() {
                    "Array" => matches!(value, Value::Array(_)),
                    "Map" => matches!(value, Value::Map(_)),
                    "Set" => matches!(value, Value::Set(_)),
                    "Promise" => matches!(value, Value::Promise(_)),
                    "RegExp" => matches!(value, Value::Regex(_)),
                    "Date" => matches!(value, Value::Date(_)),
                    "Function" => matches!(value, Value::Function(_)),
                    "Object" => matches!(
                        value,
                        Value::Object(_) | Value::Instance(_) | Value::Array(_)
                    ),
                    _ => false,
                };
                Ok(Value::Boolean(result))
            }
            _ => Err(self.make_error(
                ErrorKind::TypeError,
                "Right-hand side of 'instanceof' is not callable",
            )),
        }
    }

    /// Standard loose equality for the supported subset.
    pub fn loose_equals(&mut self, lhs: &Value, rhs: &Value) -> bool {
        match (lhs, rhs) {
            // Same-type comparisons fall through to strict.
            (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Boolean(_), Value::Boolean(_))
            | (Value::BigInt(_), Value::BigInt(_)) => lhs.same_value(rhs),
            (Value::Null | Value::Undefined, Value::Null | Value::Undefined) => true,
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                string_to_number(s).map(|v| v == *n).unwrap_or(false)
            }
            (Value::Boolean(b), other) | (other, Value::Boolean(b)) => {
                let as_number = Value::Number(if *b { 1.0 } else { 0.0 });
                self.loose_equals(&as_number, other)
            }
            (Value::BigInt(a), Value::Number(n)) | (Value::Number(n), Value::BigInt(a)) => {
                n.fract() == 0.0 && bigint_to_f64(a) == *n
            }
            (Value::BigInt(a), Value::String(s)) | (Value::String(s), Value::BigInt(a)) => {
                s.parse::<BigInt>().map(|v| v == **a).unwrap_or(false)
            }
            _ => lhs.same_value(rhs),
        }
    }

    // =========================================================================
    // Coercions
    // =========================================================================

    pub fn to_number(&mut self, value: &Value, _span: Span) -> Result<f64, Value> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Boolean(true) => Ok(1.0),
            Value::Boolean(false) | Value::Null => Ok(0.0),
            Value::Undefined => Ok(f64::NAN),
            Value::String(s) => Ok(string_to_number(s).unwrap_or(f64::NAN)),
            Value::BigInt(_) => Err(self.make_error(
                ErrorKind::TypeError,
                "Cannot convert a BigInt value to a number",
            )),
            Value::Array(data) => {
                // Single-element arrays coerce through their element.
                let data = data.borrow();
                match data.elements.len() {
                    0 => Ok(0.0),
                    1 => {
                        let element = data.elements[0].clone();
                        drop(data);
                        self.to_number(&element, _span)
                    }
                    _ => Ok(f64::NAN),
                }
            }
            _ => Ok(f64::NAN),
        }
    }

    /// ECMAScript ToString for the supported subset (string coercion, not
    /// the console stringifier).
    pub fn to_js_string(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::BigInt(v) => format_bigint(v),
            Value::Symbol(id) => format!("Symbol({})", self.symbols.description(*id)),
            Value::Array(data) => {
                let data = data.borrow();
                let parts: Vec<String> = data
                    .elements
                    .iter()
                    .map(|e| match e {
                        Value::Null | Value::Undefined => String::new(),
                        other => self.to_js_string(other),
                    })
                    .collect();
                parts.join(",")
            }
            Value::Function(_) => "function".to_string(),
            Value::Class(id) => format!("class {}", self.class(*id).name),
            Value::Regex(r) => format!("/{}/{}", r.pattern, r.flags),
            Value::Date(ms) => format_number(*ms.borrow()),
            Value::Instance(instance) => {
                // Error instances stringify as "Name: message".
                let data = instance.borrow();
                let class_name = self.class(data.class).name.clone();
                if let Some(Value::String(message)) = data.fields.get("message") {
                    if self.is_error_class(data.class) {
                        return format!("{class_name}: {message}");
                    }
                }
                "[object Object]".to_string()
            }
            _ => "[object Object]".to_string(),
        }
    }
}

// =============================================================================
// Numeric helpers
// =============================================================================

/// ECMAScript ToInt32.
#[must_use]
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let m = n.trunc() as i64;
    (m & 0xFFFF_FFFF) as u32 as i32
}

/// ECMAScript ToUint32.
#[must_use]
pub fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

fn bigint_to_f64(v: &BigInt) -> f64 {
    // Truncating conversion is fine for comparison purposes.
    v.to_string().parse::<f64>().unwrap_or(f64::NAN)
}

/// ECMAScript StringToNumber (trimmed subset).
#[must_use]
pub fn string_to_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    trimmed.parse::<f64>().ok()
}
