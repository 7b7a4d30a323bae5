//! Class evaluation, instantiation and property access.
//!
//! Instantiation allocates the instance, runs field initializers in
//! declaration order with `this` bound to the new instance, then the
//! constructor body. In derived classes `this` stays unbound until
//! `super()` runs; a derived class with no explicit constructor gets the
//! pass-through behaviour (all arguments forwarded to the parent).
//! `super.method(...)` performs static lookup in the superclass's method
//! table and binds the current instance.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use tsi_common::span::Span;
use tsi_parser::ast::*;

use crate::completion::Completion;
use crate::env::{EnvRef, Environment};
use crate::error::ErrorKind;
use crate::value::*;

use super::{CtorFrame, Interpreter};

type EvalResult = Result<Value, Value>;

impl Interpreter {
    // =========================================================================
    // Class evaluation
    // =========================================================================

    /// Evaluate a class declaration or expression to a class handle.
    pub fn eval_class(&mut self, class: &Rc<ClassData>, env: &EnvRef) -> EvalResult {
        let parent = match &class.superclass {
            Some(expr) => match self.eval(expr, env)? {
                Value::Class(id) => Some(id),
                other => {
                    return Err(self.make_error(
                        ErrorKind::TypeError,
                        &format!(
                            "Class extends value {} is not a constructor",
                            self.to_js_string(&other)
                        ),
                    ));
                }
            },
            None => None,
        };

        let class_id = ClassId(self.classes.len() as u32);
        let name = class
            .name
            .clone()
            .unwrap_or_else(|| "<anonymous>".to_string());
        // The class's own name is in scope inside its body (methods, field
        // initializers, statics) without leaking out of class expressions.
        let class_scope = Environment::child(env);
        self.classes.push(RuntimeClass {
            name,
            decl: Rc::clone(class),
            parent,
            env: Rc::clone(&class_scope),
            ctor: None,
            methods: Default::default(),
            getters: Default::default(),
            setters: Default::default(),
            static_methods: Default::default(),
            static_getters: Default::default(),
            statics: RefCell::new(IndexMap::new()),
        });

        // Decorator expressions evaluate as metadata capture points.
        for decorator in &class.decorators {
            self.eval(&decorator.expr, env)?;
        }
        let env = &class_scope;

        // Populate method tables; every method remembers its home class.
        for member in &class.members {
            match member {
                ClassMember::Constructor { func, .. } => {
                    let value = self.member_closure(func, env, class_id);
                    self.classes[class_id.0 as usize].ctor = Some(value);
                }
                ClassMember::Method {
                    key,
                    func,
                    modifiers,
                    decorators,
                } => {
                    for decorator in decorators {
                        self.eval(&decorator.expr, env)?;
                    }
                    let member_name = self.member_key(key, env)?;
                    let value = self.member_closure(func, env, class_id);
                    let entry = &mut self.classes[class_id.0 as usize];
                    if modifiers.contains(MemberModifiers::STATIC) {
                        entry.static_methods.insert(member_name, value);
                    } else {
                        entry.methods.insert(member_name, value);
                    }
                }
                ClassMember::Getter {
                    key,
                    func,
                    modifiers,
                    decorators,
                } => {
                    for decorator in decorators {
                        self.eval(&decorator.expr, env)?;
                    }
                    let member_name = self.member_key(key, env)?;
                    let value = self.member_closure(func, env, class_id);
                    let entry = &mut self.classes[class_id.0 as usize];
                    if modifiers.contains(MemberModifiers::STATIC) {
                        entry.static_getters.insert(member_name, value);
                    } else {
                        entry.getters.insert(member_name, value);
                    }
                }
                ClassMember::Setter {
                    key,
                    func,
                    decorators,
                    ..
                } => {
                    for decorator in decorators {
                        self.eval(&decorator.expr, env)?;
                    }
                    let member_name = self.member_key(key, env)?;
                    let value = self.member_closure(func, env, class_id);
                    self.classes[class_id.0 as usize]
                        .setters
                        .insert(member_name, value);
                }
                ClassMember::Field { decorators, .. } => {
                    for decorator in decorators {
                        self.eval(&decorator.expr, env)?;
                    }
                    // Instance fields evaluate at construction time.
                }
                ClassMember::StaticBlock(_) => {}
            }
        }

        // The class binding is visible to its own static initializers.
        let class_value = Value::Class(class_id);
        if let Some(name) = &class.name {
            class_scope.declare(name, class_value.clone(), false);
        }

        // Static fields and static blocks run now, with `this` bound to
        // the class handle.
        for member in &class.members {
            match member {
                ClassMember::Field {
                    key,
                    init,
                    modifiers,
                    ..
                } if modifiers.contains(MemberModifiers::STATIC) => {
                    let member_name = self.member_key(key, env)?;
                    let static_env = Environment::child(env);
                    static_env.declare("this", class_value.clone(), false);
                    let value = match init {
                        Some(init) => self.eval(init, &static_env)?,
                        None => Value::Undefined,
                    };
                    self.classes[class_id.0 as usize]
                        .statics
                        .borrow_mut()
                        .insert(member_name, value);
                }
                ClassMember::StaticBlock(stmts) => {
                    let block_env = Environment::child(env);
                    block_env.declare("this", class_value.clone(), false);
                    match self.exec_stmts(stmts, &block_env) {
                        Completion::Normal(_) => {}
                        Completion::Throw(thrown) => return Err(thrown),
                        other => {
                            return Err(self.make_error(
                                ErrorKind::SyntaxError,
                                &format!("illegal completion in static block: {other:?}"),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(class_value)
    }

    fn member_key(&mut self, key: &PropertyKey, env: &EnvRef) -> Result<String, Value> {
        self.eval_property_key(key, env)
    }

    fn member_closure(
        &mut self,
        func: &Rc<FunctionData>,
        env: &EnvRef,
        home: ClassId,
    ) -> Rc<FunctionValue> {
        let Value::Function(value) = self.make_closure(func, env) else {
            unreachable!("closures are functions");
        };
        *value.home_class.borrow_mut() = Some(home);
        value
    }

    // =========================================================================
    // Instantiation
    // =========================================================================

    pub fn eval_new(
        &mut self,
        callee: &Expr,
        args: &[Argument],
        env: &EnvRef,
        span: Span,
    ) -> EvalResult {
        let callee_value = self.eval(callee, env)?;
        let arg_values = self.eval_args(args, env)?;
        match callee_value {
            Value::Class(class_id) => self.instantiate(class_id, arg_values, span),
            // Built-in constructors (Promise, Map, Set, Date, RegExp,
            // error classes) are native functions that construct.
            Value::Function(func) => self.call_function(&func, None, arg_values, span),
            other => Err(self.make_error(
                ErrorKind::TypeError,
                &format!("{} is not a constructor", self.to_js_string(&other)),
            )),
        }
    }

    /// Allocate and initialize an instance of a class.
    pub fn instantiate(&mut self, class_id: ClassId, args: Vec<Value>, span: Span) -> EvalResult {
        if self.class(class_id).decl.is_abstract {
            let name = self.class(class_id).name.clone();
            return Err(self.make_error(
                ErrorKind::TypeError,
                &format!("Cannot instantiate abstract class {name}"),
            ));
        }
        let instance = Value::Instance(InstanceData::new(class_id));
        self.initialize_instance(class_id, &instance, args, span)?;
        Ok(instance)
    }

    /// Run the construction protocol for one class level.
    pub(crate) fn initialize_instance(
        &mut self,
        class_id: ClassId,
        instance: &Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<(), Value> {
        let parent = self.class(class_id).parent;
        let ctor = self.class(class_id).ctor.clone();

        match ctor {
            Some(ctor_fn) if ctor_fn.script_data().is_none() => {
                // Native constructor (built-in error classes): fields, then
                // the native body with `this` bound.
                self.run_field_initializers(class_id, instance)?;
                self.call_function(&ctor_fn, Some(instance.clone()), args, span)?;
            }
            Some(ctor_fn) => {
                let data = ctor_fn.script_data().cloned().ok_or_else(|| {
                    self.make_error(ErrorKind::TypeError, "constructor is not a script function")
                })?;
                let name = format!("new {}", self.class(class_id).name);
                self.push_frame(&name, span)?;
                self.home_stack.push(Some(class_id));

                if parent.is_some() {
                    // Derived: `this` stays unbound until super() runs.
                    let entry_env = match self.bind_call_env(&ctor_fn, &data, None, args) {
                        Ok(env) => env,
                        Err(thrown) => {
                            self.home_stack.pop();
                            self.pop_frame();
                            return Err(thrown);
                        }
                    };
                    self.ctor_frames.push(CtorFrame {
                        instance: instance.clone(),
                        entry_env: Rc::clone(&entry_env),
                        class: class_id,
                        super_called: false,
                    });
                    let result = self.run_ctor_body(&data, &entry_env);
                    let frame = self.ctor_frames.pop();
                    self.home_stack.pop();
                    self.pop_frame();
                    result?;
                    if let Some(frame) = frame {
                        if !frame.super_called {
                            return Err(self.make_error(
                                ErrorKind::ReferenceError,
                                "Must call super constructor in derived class before returning",
                            ));
                        }
                    }
                } else {
                    // Base class: fields first, then the body with `this`.
                    self.run_field_initializers(class_id, instance)?;
                    let entry_env =
                        match self.bind_call_env(&ctor_fn, &data, Some(instance.clone()), args) {
                            Ok(env) => env,
                            Err(thrown) => {
                                self.home_stack.pop();
                                self.pop_frame();
                                return Err(thrown);
                            }
                        };
                    self.assign_parameter_properties(&data, instance, &entry_env)?;
                    let result = self.run_ctor_body(&data, &entry_env);
                    self.home_stack.pop();
                    self.pop_frame();
                    result?;
                }
            }
            None => {
                // No explicit constructor: pass-through to the parent, then
                // own field initializers.
                if let Some(parent_id) = parent {
                    self.initialize_instance(parent_id, instance, args, span)?;
                }
                self.run_field_initializers(class_id, instance)?;
            }
        }
        Ok(())
    }

    fn run_ctor_body(&mut self, data: &Rc<FunctionData>, env: &EnvRef) -> Result<(), Value> {
        match &data.body {
            FunctionBody::Block(stmts) => match self.exec_stmts(stmts, env) {
                Completion::Normal(_) | Completion::Return(_) => Ok(()),
                Completion::Throw(thrown) => Err(thrown),
                other => Err(self.make_error(
                    ErrorKind::SyntaxError,
                    &format!("illegal completion in constructor: {other:?}"),
                )),
            },
            FunctionBody::Expr(expr) => self.eval(expr, env).map(|_| ()),
        }
    }

    /// Instance field initializers, declaration order, `this` bound.
    pub(crate) fn run_field_initializers(
        &mut self,
        class_id: ClassId,
        instance: &Value,
    ) -> Result<(), Value> {
        let decl = Rc::clone(&self.class(class_id).decl);
        let class_env = Rc::clone(&self.class(class_id).env);
        for member in &decl.members {
            let ClassMember::Field {
                key,
                init,
                modifiers,
                ..
            } = member
            else {
                continue;
            };
            if modifiers.contains(MemberModifiers::STATIC)
                || modifiers.contains(MemberModifiers::DECLARE)
            {
                continue;
            }
            let field_env = Environment::child(&class_env);
            field_env.declare("this", instance.clone(), false);
            let value = match init {
                Some(init) => self.eval(init, &field_env)?,
                None => Value::Undefined,
            };
            let name = self.member_key(key, &field_env)?;
            if let Value::Instance(data) = instance {
                if let PropertyKey::Private(private_name) = key {
                    data.borrow_mut()
                        .private_fields
                        .insert(private_name.clone(), value);
                } else {
                    data.borrow_mut().fields.insert(name, value);
                }
            }
        }
        Ok(())
    }

    /// `constructor(public x: number)` materialises fields from arguments.
    fn assign_parameter_properties(
        &mut self,
        data: &Rc<FunctionData>,
        instance: &Value,
        entry_env: &EnvRef,
    ) -> Result<(), Value> {
        let property_bits = MemberModifiers::PUBLIC
            | MemberModifiers::PRIVATE
            | MemberModifiers::PROTECTED
            | MemberModifiers::READONLY;
        for param in &data.params {
            if !param.modifiers.intersects(property_bits) {
                continue;
            }
            let value = entry_env.lookup(&param.name).unwrap_or(Value::Undefined);
            if let Value::Instance(data) = instance {
                data.borrow_mut().fields.insert(param.name.clone(), value);
            }
        }
        Ok(())
    }

    // =========================================================================
    // super
    // =========================================================================

    pub(crate) fn call_super(
        &mut self,
        method: Option<&str>,
        args: Vec<Value>,
        env: &EnvRef,
        span: Span,
    ) -> EvalResult {
        match method {
            None => {
                // super(...) inside a derived constructor.
                let Some(frame_index) = self.ctor_frames.len().checked_sub(1) else {
                    return Err(self.make_error(
                        ErrorKind::SyntaxError,
                        "'super' call outside a derived constructor",
                    ));
                };
                let (class_id, instance, entry_env, already_called) = {
                    let frame = &self.ctor_frames[frame_index];
                    (
                        frame.class,
                        frame.instance.clone(),
                        Rc::clone(&frame.entry_env),
                        frame.super_called,
                    )
                };
                if already_called {
                    return Err(self.make_error(
                        ErrorKind::ReferenceError,
                        "Super constructor may only be called once",
                    ));
                }
                let Some(parent_id) = self.class(class_id).parent else {
                    return Err(self.make_error(
                        ErrorKind::SyntaxError,
                        "'super' call in a class with no base class",
                    ));
                };
                self.initialize_instance(parent_id, &instance, args, span)?;
                // `this` becomes available, own fields initialise, and
                // parameter properties land.
                entry_env.declare("this", instance.clone(), false);
                self.ctor_frames[frame_index].super_called = true;
                self.run_field_initializers(class_id, &instance)?;
                let ctor = self.class(class_id).ctor.clone();
                if let Some(ctor_fn) = ctor {
                    if let Some(data) = ctor_fn.script_data().cloned() {
                        self.assign_parameter_properties(&data, &instance, &entry_env)?;
                    }
                }
                Ok(Value::Undefined)
            }
            Some(name) => {
                // super.method(...): static lookup in the parent chain,
                // current instance bound.
                let home = self.home_stack.last().copied().flatten();
                let Some(home_id) = home else {
                    return Err(self.make_error(
                        ErrorKind::SyntaxError,
                        "'super' member access outside a class method",
                    ));
                };
                let Some(parent_id) = self.class(home_id).parent else {
                    return Err(self.make_error(
                        ErrorKind::SyntaxError,
                        "'super' member access in a class with no base class",
                    ));
                };
                let Some(method_fn) = self.find_method(parent_id, name) else {
                    let parent_name = self.class(parent_id).name.clone();
                    return Err(self.make_error(
                        ErrorKind::TypeError,
                        &format!("(intermediate value).{name} is not a function on {parent_name}"),
                    ));
                };
                let this = env.lookup("this").unwrap_or(Value::Undefined);
                self.call_function(&method_fn, Some(this), args, span)
            }
        }
    }

    /// Method lookup: hash-map walk up the superclass chain.
    pub fn find_method(&self, class_id: ClassId, name: &str) -> Option<Rc<FunctionValue>> {
        let mut current = Some(class_id);
        while let Some(id) = current {
            if let Some(method) = self.class(id).methods.get(name) {
                return Some(Rc::clone(method));
            }
            current = self.class(id).parent;
        }
        None
    }

    fn find_getter(&self, class_id: ClassId, name: &str) -> Option<Rc<FunctionValue>> {
        let mut current = Some(class_id);
        while let Some(id) = current {
            if let Some(getter) = self.class(id).getters.get(name) {
                return Some(Rc::clone(getter));
            }
            current = self.class(id).parent;
        }
        None
    }

    fn find_setter(&self, class_id: ClassId, name: &str) -> Option<Rc<FunctionValue>> {
        let mut current = Some(class_id);
        while let Some(id) = current {
            if let Some(setter) = self.class(id).setters.get(name) {
                return Some(Rc::clone(setter));
            }
            current = self.class(id).parent;
        }
        None
    }

    // =========================================================================
    // Property access
    // =========================================================================

    pub fn get_property(&mut self, object: &Value, name: &str, span: Span) -> EvalResult {
        match object {
            Value::Null | Value::Undefined => Err(self.make_error(
                ErrorKind::TypeError,
                &format!(
                    "Cannot read properties of {} (reading '{name}')",
                    self.to_js_string(object)
                ),
            )),
            Value::Object(data) => {
                let accessor = data.borrow().accessors.get(name).cloned();
                if let Some(accessor) = accessor {
                    if let Some(getter) = accessor.getter {
                        return self.call_function(&getter, Some(object.clone()), Vec::new(), span);
                    }
                    return Ok(Value::Undefined);
                }
                if let Some(value) = data.borrow().properties.get(name) {
                    return Ok(value.clone());
                }
                crate::builtins::object_member(self, name, object)
            }
            Value::Instance(data) => {
                let class_id = data.borrow().class;
                if let Some(value) = data.borrow().fields.get(name) {
                    return Ok(value.clone());
                }
                if let Some(getter) = self.find_getter(class_id, name) {
                    return self.call_function(&getter, Some(object.clone()), Vec::new(), span);
                }
                if let Some(method) = self.find_method(class_id, name) {
                    return Ok(Value::Function(method));
                }
                if name == "constructor" {
                    return Ok(Value::Class(class_id));
                }
                crate::builtins::object_member(self, name, object)
            }
            Value::Class(class_id) => {
                let class_id = *class_id;
                if let Some(value) = self.class(class_id).statics.borrow().get(name) {
                    return Ok(value.clone());
                }
                if let Some(method) = self.class(class_id).static_methods.get(name) {
                    return Ok(Value::Function(Rc::clone(method)));
                }
                let static_getter = self.class(class_id).static_getters.get(name).cloned();
                if let Some(getter) = static_getter {
                    return self.call_function(&getter, Some(object.clone()), Vec::new(), span);
                }
                // Statics inherit up the chain.
                if let Some(parent) = self.class(class_id).parent {
                    let parent_value = Value::Class(parent);
                    let inherited = self.get_property(&parent_value, name, span);
                    if let Ok(value) = &inherited {
                        if !matches!(value, Value::Undefined) {
                            return inherited;
                        }
                    }
                }
                match name {
                    "name" => Ok(Value::string(self.class(class_id).name.clone())),
                    _ => Ok(Value::Undefined),
                }
            }
            Value::Array(_) => crate::builtins::array_member(self, name, object),
            Value::String(_) => crate::builtins::string_member(self, name, object),
            Value::Number(_) | Value::BigInt(_) | Value::Boolean(_) => {
                crate::builtins::primitive_member(self, name, object)
            }
            Value::Function(func) => {
                if let Some(value) = func.props.borrow().get(name) {
                    return Ok(value.clone());
                }
                crate::builtins::function_member(self, name, func)
            }
            Value::Generator(_) => crate::builtins::generator_member(self, name, object),
            Value::Promise(_) => crate::builtins::promise_member(self, name, object),
            Value::Map(_) | Value::Set(_) => crate::builtins::collection_member(self, name, object),
            Value::Regex(_) => crate::builtins::regex_member(self, name, object),
            Value::Date(_) => crate::builtins::date_member(self, name, object),
            Value::Symbol(_) => match name {
                "description" => {
                    let Value::Symbol(id) = object else { unreachable!() };
                    Ok(Value::string(self.symbols.description(*id).to_string()))
                }
                _ => Ok(Value::Undefined),
            },
        }
    }

    pub fn set_property(
        &mut self,
        object: &Value,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), Value> {
        match object {
            Value::Null | Value::Undefined => Err(self.make_error(
                ErrorKind::TypeError,
                &format!(
                    "Cannot set properties of {} (setting '{name}')",
                    self.to_js_string(object)
                ),
            )),
            Value::Object(data) => {
                let frozen = data.borrow().frozen;
                if frozen {
                    return self.frozen_write_failure(name);
                }
                let accessor = data.borrow().accessors.get(name).cloned();
                if let Some(accessor) = accessor {
                    if let Some(setter) = accessor.setter {
                        self.call_function(&setter, Some(object.clone()), vec![value], span)?;
                        return Ok(());
                    }
                    return self.frozen_write_failure(name);
                }
                let sealed = data.borrow().sealed;
                let exists = data.borrow().properties.contains_key(name);
                if sealed && !exists {
                    return self.frozen_write_failure(name);
                }
                data.borrow_mut()
                    .properties
                    .insert(name.to_string(), value);
                Ok(())
            }
            Value::Instance(data) => {
                let frozen = data.borrow().frozen;
                if frozen {
                    return self.frozen_write_failure(name);
                }
                let class_id = data.borrow().class;
                if let Some(setter) = self.find_setter(class_id, name) {
                    self.call_function(&setter, Some(object.clone()), vec![value], span)?;
                    return Ok(());
                }
                // A getter with no setter makes the member read-only.
                if self.find_getter(class_id, name).is_some() {
                    return self.frozen_write_failure(name);
                }
                let sealed = data.borrow().sealed;
                let exists = data.borrow().fields.contains_key(name);
                if sealed && !exists {
                    return self.frozen_write_failure(name);
                }
                data.borrow_mut().fields.insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class_id) => {
                self.class(*class_id)
                    .statics
                    .borrow_mut()
                    .insert(name.to_string(), value);
                Ok(())
            }
            Value::Array(data) => {
                let frozen = data.borrow().frozen;
                if frozen {
                    return self.frozen_write_failure(name);
                }
                if name == "length" {
                    if let Value::Number(n) = value {
                        let new_len = n.max(0.0) as usize;
                        let mut data = data.borrow_mut();
                        data.elements.resize(new_len, Value::Undefined);
                        return Ok(());
                    }
                }
                if let Ok(index) = name.parse::<usize>() {
                    return self.set_array_index(data, index, value);
                }
                Ok(())
            }
            Value::Function(func) => {
                func.props.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            _ => {
                if self.options.strict {
                    Err(self.make_error(
                        ErrorKind::TypeError,
                        &format!("Cannot create property '{name}' on a primitive"),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn set_array_index(
        &mut self,
        data: &Rc<RefCell<ArrayData>>,
        index: usize,
        value: Value,
    ) -> Result<(), Value> {
        let sealed = data.borrow().sealed;
        let len = data.borrow().elements.len();
        if index >= len {
            if sealed {
                return self.frozen_write_failure(&index.to_string());
            }
            data.borrow_mut()
                .elements
                .resize(index + 1, Value::Undefined);
        }
        data.borrow_mut().elements[index] = value;
        Ok(())
    }

    pub fn get_index(&mut self, object: &Value, key: &Value, span: Span) -> EvalResult {
        match (object, key) {
            (Value::Array(data), Value::Number(n)) => {
                let index = *n;
                if index.fract() != 0.0 || index < 0.0 {
                    return Ok(Value::Undefined);
                }
                Ok(data
                    .borrow()
                    .elements
                    .get(index as usize)
                    .cloned()
                    .unwrap_or(Value::Undefined))
            }
            (Value::String(s), Value::Number(n)) => {
                let index = *n;
                if index.fract() != 0.0 || index < 0.0 {
                    return Ok(Value::Undefined);
                }
                Ok(s
                    .chars()
                    .nth(index as usize)
                    .map(|ch| Value::string(ch.to_string()))
                    .unwrap_or(Value::Undefined))
            }
            (Value::Object(data), Value::Symbol(id)) => Ok(data
                .borrow()
                .symbols
                .get(id)
                .cloned()
                .unwrap_or(Value::Undefined)),
            (Value::Instance(data), Value::Symbol(id)) => Ok(data
                .borrow()
                .symbols
                .get(id)
                .cloned()
                .unwrap_or(Value::Undefined)),
            (Value::Null | Value::Undefined, _) => Err(self.make_error(
                ErrorKind::TypeError,
                &format!(
                    "Cannot read properties of {} (reading '{}')",
                    self.to_js_string(object),
                    self.to_js_string(key)
                ),
            )),
            _ => {
                let name = self.to_js_string(key);
                self.get_property(object, &name, span)
            }
        }
    }

    pub fn set_index(
        &mut self,
        object: &Value,
        key: &Value,
        value: Value,
        span: Span,
    ) -> Result<(), Value> {
        match (object, key) {
            (Value::Array(data), Value::Number(n)) => {
                let frozen = data.borrow().frozen;
                if frozen {
                    return self.frozen_write_failure(&self.to_js_string(key).clone());
                }
                let index = *n;
                if index.fract() != 0.0 || index < 0.0 {
                    return Ok(());
                }
                self.set_array_index(data, index as usize, value)
            }
            (Value::Object(data), Value::Symbol(id)) => {
                let frozen = data.borrow().frozen;
                if frozen {
                    return self.frozen_write_failure("symbol");
                }
                data.borrow_mut().symbols.insert(*id, value);
                Ok(())
            }
            (Value::Instance(data), Value::Symbol(id)) => {
                let frozen = data.borrow().frozen;
                if frozen {
                    return self.frozen_write_failure("symbol");
                }
                data.borrow_mut().symbols.insert(*id, value);
                Ok(())
            }
            _ => {
                let name = self.to_js_string(key);
                self.set_property(object, &name, value, span)
            }
        }
    }

    pub(crate) fn private_get(&mut self, object: &Value, name: &str) -> EvalResult {
        match object {
            Value::Instance(data) => {
                let data = data.borrow();
                match data.private_fields.get(name) {
                    Some(value) => Ok(value.clone()),
                    None => {
                        // A private method?
                        drop(data);
                        let Value::Instance(inner) = object else {
                            unreachable!();
                        };
                        let class_id = inner.borrow().class;
                        if let Some(method) = self.find_method(class_id, &format!("#{name}")) {
                            return Ok(Value::Function(method));
                        }
                        Err(self.make_error(
                            ErrorKind::TypeError,
                            &format!(
                                "Cannot read private member #{name} from an object whose class did not declare it"
                            ),
                        ))
                    }
                }
            }
            _ => Err(self.make_error(
                ErrorKind::TypeError,
                &format!("Cannot read private member #{name} from a non-instance"),
            )),
        }
    }

    // =========================================================================
    // Errors
    // =========================================================================

    /// Construct an instance of a built-in error class, stack captured at
    /// throw time.
    pub fn make_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let class_id = self
            .error_classes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| *id);
        let Some(class_id) = class_id else {
            // Builtins not installed yet (early bootstrap): degrade to a
            // plain string payload.
            return Value::string(format!("{}: {message}", kind.name()));
        };
        let instance = InstanceData::new(class_id);
        {
            let mut data = instance.borrow_mut();
            data.fields
                .insert("name".to_string(), Value::string(kind.name()));
            data.fields
                .insert("message".to_string(), Value::string(message));
            data.fields.insert(
                "stack".to_string(),
                Value::string(self.render_stack(kind.name(), message)),
            );
        }
        Value::Instance(instance)
    }

    pub(crate) fn render_stack(&self, name: &str, message: &str) -> String {
        let mut out = format!("{name}: {message}");
        for frame in self.call_stack.iter().rev() {
            out.push_str(&format!(
                "\n    at {} ({}..{})",
                if frame.function.is_empty() {
                    "<anonymous>"
                } else {
                    &frame.function
                },
                frame.span.start,
                frame.span.end
            ));
        }
        out
    }

    #[must_use]
    pub fn is_error_class(&self, class_id: ClassId) -> bool {
        let mut current = Some(class_id);
        while let Some(id) = current {
            if self.error_classes.iter().any(|(_, eid)| *eid == id) {
                return true;
            }
            current = self.class(id).parent;
        }
        false
    }
}
