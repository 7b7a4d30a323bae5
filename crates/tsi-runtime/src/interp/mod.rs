//! The tree-walking interpreter.
//!
//! Statements produce `Completion`s; expressions evaluate to values or a
//! thrown value (`Err`). The only suspension points are `await` and
//! `yield`, which never appear here directly: generator and async bodies
//! are normalised and run by the resumable driver in `driver`.

pub mod classes;
pub mod driver;
pub mod iter;
pub mod ops;
pub mod promises;

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use tsi_common::limits::{MAX_CALL_DEPTH, MAX_MICROTASK_DRAINS};
use tsi_common::options::EngineOptions;
use tsi_common::span::Span;
use tsi_checker::TypeMap;
use tsi_parser::ast::*;

use crate::completion::Completion;
use crate::env::{EnvRef, Environment};
use crate::error::{EngineFault, ErrorKind, StackFrame};
use crate::event_loop::EventLoop;
use crate::value::*;

/// Receives console output; one logical record per call.
pub trait ConsoleSink {
    fn write_line(&mut self, text: &str);
}

/// Default sink: standard output.
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn write_line(&mut self, text: &str) {
        use std::io::Write;
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }
}

/// In-memory sink for tests and embedders.
#[derive(Default)]
pub struct BufferSink {
    pub lines: Vec<String>,
}

impl ConsoleSink for BufferSink {
    fn write_line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

/// Outcome of running a program to completion.
pub struct RunOutcome {
    /// Value of the final expression statement, if any.
    pub value: Option<Value>,
    /// The thrown value that escaped top level, rendered, if any.
    pub unhandled_error: Option<String>,
}

/// One export of an evaluated module.
#[derive(Clone)]
pub struct ModuleRecord {
    pub namespace: Rc<RefCell<ObjectData>>,
}

/// The engine: every piece of state lives here and is threaded into each
/// operation. No module-level mutable state exists.
pub struct Interpreter {
    pub options: EngineOptions,
    pub type_map: Rc<TypeMap>,
    pub globals: EnvRef,
    pub classes: Vec<RuntimeClass>,
    pub symbols: SymbolRegistry,
    /// Well-known `Symbol.iterator`.
    pub sym_iterator: SymbolId,
    pub event_loop: EventLoop,
    pub sink: Rc<RefCell<dyn ConsoleSink>>,
    /// Frames captured into Error instances at throw time.
    pub call_stack: Vec<StackFrame>,
    call_depth: u32,
    /// Cooked-array cache per tagged-template call site.
    tagged_cache: FxHashMap<u32, Value>,
    /// Evaluated modules by normalised path.
    pub modules: FxHashMap<String, ModuleRecord>,
    /// Path of the module currently evaluating (for `import.meta`).
    pub current_module: Option<String>,
    /// Home class of the running function, for `super` resolution.
    pub(crate) home_stack: Vec<Option<ClassId>>,
    /// Pending constructions awaiting their `super()` call.
    pub(crate) ctor_frames: Vec<CtorFrame>,
    /// Built-in error classes installed in the arena.
    pub(crate) error_classes: Vec<(ErrorKind, ClassId)>,
    /// Host interruption flag: when set, a synthetic throw is injected at
    /// the next statement boundary.
    pub interrupt: Rc<std::cell::Cell<bool>>,
    pub fault: Option<EngineFault>,
}

/// A derived-class construction in progress: `this` stays unbound in the
/// constructor environment until `super()` runs.
pub(crate) struct CtorFrame {
    pub instance: Value,
    pub entry_env: EnvRef,
    pub class: ClassId,
    pub super_called: bool,
}

impl Interpreter {
    #[must_use]
    pub fn new(options: EngineOptions, type_map: TypeMap) -> Interpreter {
        Interpreter::with_sink(options, type_map, Rc::new(RefCell::new(StdoutSink)))
    }

    #[must_use]
    pub fn with_sink(
        options: EngineOptions,
        type_map: TypeMap,
        sink: Rc<RefCell<dyn ConsoleSink>>,
    ) -> Interpreter {
        let globals = Environment::root();
        let mut symbols = SymbolRegistry::default();
        let sym_iterator = symbols.make("Symbol.iterator");
        let mut interp = Interpreter {
            options,
            type_map: Rc::new(type_map),
            globals,
            classes: Vec::new(),
            symbols,
            sym_iterator,
            event_loop: EventLoop::default(),
            sink,
            call_stack: Vec::new(),
            call_depth: 0,
            tagged_cache: FxHashMap::default(),
            modules: FxHashMap::default(),
            current_module: None,
            home_stack: Vec::new(),
            ctor_frames: Vec::new(),
            error_classes: Vec::new(),
            interrupt: Rc::new(std::cell::Cell::new(false)),
            fault: None,
        };
        crate::builtins::install(&mut interp);
        interp
    }

    pub fn class(&self, id: ClassId) -> &RuntimeClass {
        &self.classes[id.0 as usize]
    }

    // =========================================================================
    // Program execution
    // =========================================================================

    /// Run a checked program: execute every top-level statement, drain the
    /// microtask queue at the end of the synchronous turn, then flush
    /// timers on the virtual clock.
    pub fn run_program(&mut self, program: &Program) -> Result<RunOutcome, EngineFault> {
        let env = Rc::clone(&self.globals);
        self.run_program_in(program, &env)
    }

    /// Run a program in a specific environment (module evaluation).
    pub fn run_program_in(
        &mut self,
        program: &Program,
        env: &EnvRef,
    ) -> Result<RunOutcome, EngineFault> {
        let env = Rc::clone(env);
        self.hoist_functions(&program.statements, &env);
        let mut last_value = None;
        for stmt in &program.statements {
            match self.exec_stmt(stmt, &env) {
                Completion::Normal(value) => {
                    if value.is_some() {
                        last_value = value;
                    }
                }
                Completion::Throw(thrown) => {
                    if let Some(fault) = self.fault.take() {
                        return Err(fault);
                    }
                    return Ok(RunOutcome {
                        value: None,
                        unhandled_error: Some(self.render_thrown(&thrown)),
                    });
                }
                // Parser validation keeps these out of top level.
                other => {
                    return Err(EngineFault::Internal(format!(
                        "abrupt completion at top level: {other:?}"
                    )));
                }
            }
        }
        // The synchronous turn ends here: drain the microtask queue before
        // any macrotask fires.
        if let Err(thrown) = self.drain_microtasks() {
            if let Some(fault) = self.fault.take() {
                return Err(fault);
            }
            return Ok(RunOutcome {
                value: None,
                unhandled_error: Some(self.render_thrown(&thrown)),
            });
        }
        // Timers only fire when a flush was asked for; otherwise the
        // macrotask queue is left pending for the host.
        if self.options.flush_timers {
            if let Err(thrown) = self.flush_timers() {
                if let Some(fault) = self.fault.take() {
                    return Err(fault);
                }
                return Ok(RunOutcome {
                    value: None,
                    unhandled_error: Some(self.render_thrown(&thrown)),
                });
            }
        }
        if let Some(fault) = self.fault.take() {
            return Err(fault);
        }
        Ok(RunOutcome {
            value: last_value,
            unhandled_error: None,
        })
    }

    /// Drain pending microtasks (bounded against runaway loops).
    pub fn drain_microtasks(&mut self) -> Result<(), Value> {
        let mut drained = 0u32;
        while let Some(task) = self.event_loop.microtasks.pop_front() {
            drained += 1;
            if drained > MAX_MICROTASK_DRAINS {
                self.fault = Some(EngineFault::MicrotaskRunaway);
                return Err(Value::Undefined);
            }
            self.run_microtask(task)?;
        }
        Ok(())
    }

    /// Advance the virtual clock through every pending timer, draining
    /// microtasks after each macrotask.
    pub fn flush_timers(&mut self) -> Result<(), Value> {
        let mut fired = 0u32;
        while let Some(entry) = self.event_loop.take_next_timer() {
            fired += 1;
            // A zero-period interval would never let the flush finish;
            // bound the total macrotask count per flush instead.
            if fired > 100_000 {
                self.fault = Some(EngineFault::MicrotaskRunaway);
                return Err(Value::Undefined);
            }
            let callback = Rc::clone(&entry.callback);
            let args = entry.args.clone();
            if entry.interval.is_some() {
                self.event_loop.requeue_interval(&entry);
            }
            self.call_function(&callback, None, args, Span::dummy())?;
            self.drain_microtasks()?;
        }
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn exec_stmts(&mut self, stmts: &[Stmt], env: &EnvRef) -> Completion {
        self.hoist_functions(stmts, env);
        for stmt in stmts {
            let completion = self.exec_stmt(stmt, env);
            if completion.is_abrupt() {
                return completion;
            }
        }
        Completion::normal()
    }

    /// Function declarations are callable before their statement executes.
    pub(crate) fn hoist_functions(&mut self, stmts: &[Stmt], env: &EnvRef) {
        for stmt in stmts {
            let inner = match &stmt.kind {
                StmtKind::Export(ExportKind::Decl(inner)) => inner,
                _ => stmt,
            };
            if let StmtKind::Function(func) = &inner.kind {
                if let Some(name) = &func.name {
                    let value = self.make_closure(func, env);
                    env.declare(name, value, false);
                }
            }
        }
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt, env: &EnvRef) -> Completion {
        // Host interruption lands at statement boundaries.
        if self.interrupt.get() {
            self.interrupt.set(false);
            let error = self.make_error(ErrorKind::Error, "Execution interrupted by host");
            return Completion::Throw(error);
        }
        match &stmt.kind {
            StmtKind::Expression(expr) => match self.eval(expr, env) {
                Ok(value) => Completion::Normal(Some(value)),
                Err(thrown) => Completion::Throw(thrown),
            },
            StmtKind::Var { kind, decls } => self.exec_var(*kind, decls, env),
            StmtKind::Function(_) => Completion::normal(),
            StmtKind::Class(class) => match self.eval_class(class, env) {
                Ok(value) => {
                    if let Some(name) = &class.name {
                        env.declare(name, value, false);
                    }
                    Completion::normal()
                }
                Err(thrown) => Completion::Throw(thrown),
            },
            StmtKind::Interface { .. } | StmtKind::TypeAlias { .. } => Completion::normal(),
            StmtKind::Enum {
                name,
                is_const,
                members,
            } => self.exec_enum(name, *is_const, members, env),
            StmtKind::Namespace { name, body } => self.exec_namespace(name, body, env),
            StmtKind::Import { .. } => {
                // Imports were wired by the module driver before execution.
                Completion::normal()
            }
            StmtKind::Export(kind) => match kind {
                ExportKind::Decl(inner) => self.exec_stmt(inner, env),
                ExportKind::DefaultExpr(expr) => match self.eval(expr, env) {
                    Ok(value) => {
                        env.declare("%default", value, false);
                        Completion::normal()
                    }
                    Err(thrown) => Completion::Throw(thrown),
                },
                ExportKind::Named(_) | ExportKind::Star { .. } => Completion::normal(),
            },

            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let test = match self.eval(cond, env) {
                    Ok(value) => value,
                    Err(thrown) => return Completion::Throw(thrown),
                };
                if test.is_truthy() {
                    self.exec_stmt(then, env)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, env)
                } else {
                    Completion::normal()
                }
            }
            StmtKind::While { cond, body, step } => self.exec_while(cond, body, step, None, env),
            StmtKind::DoWhile { body, cond } => {
                loop {
                    let completion = self.exec_stmt(body, env);
                    match completion {
                        Completion::Normal(_) => {}
                        ref c if c.break_matches(None) => break,
                        ref c if c.continue_matches(None) => {}
                        other => return other,
                    }
                    match self.eval(cond, env) {
                        Ok(value) if value.is_truthy() => {}
                        Ok(_) => break,
                        Err(thrown) => return Completion::Throw(thrown),
                    }
                }
                Completion::normal()
            }
            StmtKind::ForOf {
                binding,
                binding_kind,
                iterable,
                body,
            } => self.exec_for_of(binding, *binding_kind, iterable, body, None, env),
            StmtKind::ForIn {
                binding,
                binding_kind,
                object,
                body,
            } => self.exec_for_in(binding, *binding_kind, object, body, None, env),
            StmtKind::Switch {
                discriminant,
                cases,
            } => self.exec_switch(discriminant, cases, env),
            StmtKind::Block(stmts) => {
                let block_env = Environment::child(env);
                self.exec_stmts(stmts, &block_env)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => match self.eval(expr, env) {
                        Ok(value) => value,
                        Err(thrown) => return Completion::Throw(thrown),
                    },
                    None => Value::Undefined,
                };
                Completion::Return(value)
            }
            StmtKind::Break(label) => Completion::Break(label.clone()),
            StmtKind::Continue(label) => Completion::Continue(label.clone()),
            StmtKind::Labeled { label, body } => {
                let completion = match &body.kind {
                    // A labeled loop owns its label for continue.
                    StmtKind::While { cond, body: inner, step } => {
                        self.exec_while(cond, inner, step, Some(label.as_str()), env)
                    }
                    StmtKind::ForOf {
                        binding,
                        binding_kind,
                        iterable,
                        body: inner,
                    } => self.exec_for_of(
                        binding,
                        *binding_kind,
                        iterable,
                        inner,
                        Some(label.as_str()),
                        env,
                    ),
                    StmtKind::ForIn {
                        binding,
                        binding_kind,
                        object,
                        body: inner,
                    } => self.exec_for_in(
                        binding,
                        *binding_kind,
                        object,
                        inner,
                        Some(label.as_str()),
                        env,
                    ),
                    // A labeled block desugared from `for` forwards the
                    // label to its inner while loop.
                    StmtKind::Block(stmts) => {
                        let block_env = Environment::child(env);
                        self.exec_labeled_block(stmts, label, &block_env)
                    }
                    _ => self.exec_stmt(body, env),
                };
                if completion.break_matches(Some(label)) {
                    Completion::normal()
                } else {
                    completion
                }
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => self.exec_try(block, catch.as_ref(), finally.as_deref(), env),
            StmtKind::Throw(expr) => match self.eval(expr, env) {
                Ok(value) => Completion::Throw(value),
                Err(thrown) => Completion::Throw(thrown),
            },
            StmtKind::Empty => Completion::normal(),
        }
    }

    fn exec_var(&mut self, kind: VarKind, decls: &[VarDeclarator], env: &EnvRef) -> Completion {
        for decl in decls {
            let value = match &decl.init {
                Some(init) => match self.eval(init, env) {
                    Ok(value) => value,
                    Err(thrown) => return Completion::Throw(thrown),
                },
                None => Value::Undefined,
            };
            // Name functions declared via `const f = () => {}`.
            if let Value::Function(func) = &value {
                let mut name = func.name.borrow_mut();
                if name.is_none() {
                    *name = Some(decl.name.clone());
                }
            }
            env.declare(&decl.name, value, kind != VarKind::Const);
        }
        Completion::normal()
    }

    fn exec_while(
        &mut self,
        cond: &Expr,
        body: &Stmt,
        step: &Option<Expr>,
        label: Option<&str>,
        env: &EnvRef,
    ) -> Completion {
        loop {
            match self.eval(cond, env) {
                Ok(value) if value.is_truthy() => {}
                Ok(_) => break,
                Err(thrown) => return Completion::Throw(thrown),
            }
            let completion = self.exec_stmt(body, env);
            match completion {
                Completion::Normal(_) => {}
                ref c if c.break_matches(label) => return Completion::normal(),
                ref c if c.continue_matches(label) => {
                    // The desugared `for` step runs after continue too.
                }
                other => return other,
            }
            if let Some(step) = step {
                if let Err(thrown) = self.eval(step, env) {
                    return Completion::Throw(thrown);
                }
            }
        }
        Completion::normal()
    }

    /// A labeled block from `for`-desugaring: the label reaches the inner
    /// while loop so `continue label` re-enters the right loop.
    fn exec_labeled_block(&mut self, stmts: &[Stmt], label: &str, env: &EnvRef) -> Completion {
        self.hoist_functions(stmts, env);
        for stmt in stmts {
            let completion = match &stmt.kind {
                StmtKind::While { cond, body, step } => {
                    self.exec_while(cond, body, step, Some(label), env)
                }
                _ => self.exec_stmt(stmt, env),
            };
            if completion.is_abrupt() {
                return completion;
            }
        }
        Completion::normal()
    }

    fn exec_for_of(
        &mut self,
        binding: &str,
        binding_kind: VarKind,
        iterable: &Expr,
        body: &Stmt,
        label: Option<&str>,
        env: &EnvRef,
    ) -> Completion {
        let subject = match self.eval(iterable, env) {
            Ok(value) => value,
            Err(thrown) => return Completion::Throw(thrown),
        };
        let mut iterator = match self.get_iterator(&subject, iterable.span) {
            Ok(iterator) => iterator,
            Err(thrown) => return Completion::Throw(thrown),
        };
        loop {
            let next = match iterator.next(self, Value::Undefined) {
                Ok(Some(value)) => value,
                Ok(None) => break,
                Err(thrown) => return Completion::Throw(thrown),
            };
            let loop_env = Environment::child(env);
            loop_env.declare(binding, next, binding_kind != VarKind::Const);
            let completion = self.exec_stmt(body, &loop_env);
            match completion {
                Completion::Normal(_) => {}
                ref c if c.break_matches(label) => return Completion::normal(),
                ref c if c.continue_matches(label) => {}
                other => return other,
            }
        }
        Completion::normal()
    }

    fn exec_for_in(
        &mut self,
        binding: &str,
        binding_kind: VarKind,
        object: &Expr,
        body: &Stmt,
        label: Option<&str>,
        env: &EnvRef,
    ) -> Completion {
        let subject = match self.eval(object, env) {
            Ok(value) => value,
            Err(thrown) => return Completion::Throw(thrown),
        };
        // Own string keys in insertion order; symbol keys never enumerate.
        let keys: Vec<String> = match &subject {
            Value::Object(object) => object.borrow().properties.keys().cloned().collect(),
            Value::Instance(instance) => instance.borrow().fields.keys().cloned().collect(),
            Value::Array(array) => (0..array.borrow().elements.len())
                .map(|i| i.to_string())
                .collect(),
            _ => Vec::new(),
        };
        for key in keys {
            let loop_env = Environment::child(env);
            loop_env.declare(binding, Value::string(key), binding_kind != VarKind::Const);
            let completion = self.exec_stmt(body, &loop_env);
            match completion {
                Completion::Normal(_) => {}
                ref c if c.break_matches(label) => return Completion::normal(),
                ref c if c.continue_matches(label) => {}
                other => return other,
            }
        }
        Completion::normal()
    }

    fn exec_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        env: &EnvRef,
    ) -> Completion {
        let subject = match self.eval(discriminant, env) {
            Ok(value) => value,
            Err(thrown) => return Completion::Throw(thrown),
        };
        let switch_env = Environment::child(env);
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let test_value = match self.eval(test, &switch_env) {
                    Ok(value) => value,
                    Err(thrown) => return Completion::Throw(thrown),
                };
                if subject.same_value(&test_value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Completion::normal();
        };
        // Fall through until break.
        for case in &cases[start..] {
            for stmt in &case.body {
                let completion = self.exec_stmt(stmt, &switch_env);
                match completion {
                    Completion::Normal(_) => {}
                    ref c if c.break_matches(None) => return Completion::normal(),
                    other => return other,
                }
            }
        }
        Completion::normal()
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        catch: Option<&CatchClause>,
        finally: Option<&[Stmt]>,
        env: &EnvRef,
    ) -> Completion {
        let block_env = Environment::child(env);
        let mut completion = self.exec_stmts(block, &block_env);

        if let (Completion::Throw(thrown), Some(catch)) = (&completion, catch) {
            let catch_env = Environment::child(env);
            if let Some(binding) = &catch.binding {
                catch_env.declare(binding, thrown.clone(), true);
            }
            completion = self.exec_stmts(&catch.body, &catch_env);
        }

        if let Some(finally) = finally {
            let finally_env = Environment::child(env);
            let finally_completion = self.exec_stmts(finally, &finally_env);
            // An abrupt finally supersedes the original completion.
            if finally_completion.is_abrupt() {
                return finally_completion;
            }
        }
        completion
    }

    fn exec_enum(
        &mut self,
        name: &str,
        is_const: bool,
        members: &[EnumMember],
        env: &EnvRef,
    ) -> Completion {
        if is_const && !self.options.preserve_const_enums {
            // Member accesses were inlined by the checker.
            return Completion::normal();
        }
        let object = ObjectData::new();
        {
            let mut data = object.borrow_mut();
            let mut next_auto = 0.0f64;
            for member in members {
                let value = match &member.init {
                    None => {
                        let v = Value::Number(next_auto);
                        next_auto += 1.0;
                        v
                    }
                    Some(init) => match self.eval(init, env) {
                        Ok(value) => {
                            if let Value::Number(n) = &value {
                                next_auto = n + 1.0;
                            }
                            value
                        }
                        Err(thrown) => return Completion::Throw(thrown),
                    },
                };
                // Numeric members get a reverse mapping.
                if let Value::Number(n) = &value {
                    data.properties
                        .insert(tsi_common::numeric::format_number(*n), Value::string(member.name.clone()));
                }
                data.properties.insert(member.name.clone(), value);
            }
            data.frozen = true;
            data.sealed = true;
        }
        env.declare(name, Value::Object(object), false);
        Completion::normal()
    }

    fn exec_namespace(&mut self, name: &str, body: &[Stmt], env: &EnvRef) -> Completion {
        let ns_env = Environment::child(env);
        let completion = self.exec_stmts(body, &ns_env);
        if completion.is_abrupt() {
            return completion;
        }
        // Only exported members surface on the frozen namespace object;
        // everything else stays private to the namespace body.
        let object = ObjectData::new();
        {
            let mut data = object.borrow_mut();
            for stmt in body {
                let StmtKind::Export(ExportKind::Decl(inner)) = &stmt.kind else {
                    continue;
                };
                for declared in declared_names(inner) {
                    if let Some(value) = ns_env.lookup(&declared) {
                        data.properties.insert(declared, value);
                    }
                }
            }
            data.frozen = true;
            data.sealed = true;
        }
        env.declare(name, Value::Object(object), false);
        Completion::normal()
    }

    // =========================================================================
    // Closures
    // =========================================================================

    /// Build a function value capturing the current environment. Named
    /// function expressions get a dedicated frame holding their own
    /// binding so recursion works without polluting the outer scope.
    pub fn make_closure(&mut self, func: &Rc<FunctionData>, env: &EnvRef) -> Value {
        let capture_env = if func.name.is_some() && !func.flags.contains(FunctionFlags::ARROW) {
            let self_frame = Environment::child(env);
            self_frame
        } else {
            Rc::clone(env)
        };
        let value = FunctionValue::script(Rc::clone(func), Rc::clone(&capture_env));
        if let Some(name) = &func.name {
            if !Rc::ptr_eq(&capture_env, env) {
                capture_env.declare(name, Value::Function(Rc::clone(&value)), false);
            }
        }
        Value::Function(value)
    }

    // =========================================================================
    // Stack and faults
    // =========================================================================

    pub(crate) fn push_frame(&mut self, name: &str, span: Span) -> Result<(), Value> {
        self.call_depth += 1;
        if self.call_depth > MAX_CALL_DEPTH {
            self.call_depth -= 1;
            self.fault = Some(EngineFault::StackOverflow);
            return Err(self.make_error(ErrorKind::RangeError, "Maximum call stack size exceeded"));
        }
        self.call_stack.push(StackFrame {
            function: name.to_string(),
            span,
        });
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
        self.call_stack.pop();
    }

    /// `import(path)`: resolve against the registered module graph and
    /// answer a promise of the namespace object.
    pub(crate) fn eval_dynamic_import(
        &mut self,
        path: &Expr,
        env: &EnvRef,
    ) -> Result<Value, Value> {
        let specifier = self.eval(path, env)?;
        let specifier = self.to_js_string(&specifier);
        let resolved = tsi_common::modpath::with_default_extension(&tsi_common::modpath::resolve(
            &specifier,
            self.current_module.as_deref(),
        ));
        let promise = PromiseData::pending();
        match self.modules.get(&resolved) {
            Some(record) => {
                let namespace = Value::Object(Rc::clone(&record.namespace));
                self.resolve_promise(&promise, namespace);
            }
            None => {
                let error = self.make_error(
                    crate::error::ErrorKind::Error,
                    &format!("Cannot find module '{specifier}'"),
                );
                self.reject_promise(&promise, error);
            }
        }
        Ok(Value::Promise(promise))
    }

    /// Render a thrown value for host-side reporting.
    pub fn render_thrown(&self, thrown: &Value) -> String {
        if let Value::Instance(instance) = thrown {
            let data = instance.borrow();
            let class_name = self.class(data.class).name.clone();
            if let Some(Value::String(message)) = data.fields.get("message") {
                return format!("{class_name}: {message}");
            }
        }
        crate::stringify::display_value(self, thrown)
    }
}

/// Value-level names a statement declares (for namespace objects).
fn declared_names(stmt: &Stmt) -> Vec<String> {
    match &stmt.kind {
        StmtKind::Var { decls, .. } => decls
            .iter()
            .filter(|d| !d.synthetic)
            .map(|d| d.name.clone())
            .collect(),
        StmtKind::Function(func) => func.name.clone().into_iter().collect(),
        StmtKind::Class(class) => class.name.clone().into_iter().collect(),
        StmtKind::Enum { name, .. } | StmtKind::Namespace { name, .. } => vec![name.clone()],
        _ => Vec::new(),
    }
}
