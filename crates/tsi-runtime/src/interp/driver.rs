//! The resumable statement driver for generators and async bodies.
//!
//! Bodies are normalised (`lower`) so suspension only happens at the
//! canonical statement `let %slot = yield expr;`. A suspension unwinds by
//! returning `RCompletion::Suspend` through the statement executors, each
//! of which records its position on the trail; resuming descends the
//! recorded path with the saved environments, delivers the resume value
//! (or injected throw/return) at the leaf, and continues executing
//! normally. Try frames are re-entered through their executors, so a
//! throw delivered at the leaf still runs the surrounding catch/finally.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use tsi_parser::ast::*;

use crate::completion::Completion;
use crate::env::{EnvRef, Environment};
use crate::error::ErrorKind;
use crate::generator::{
    GenFrame, GeneratorResume, GeneratorState, IterHandle, PathSeg, SuspendKind,
};
use crate::lower;
use crate::value::*;

use super::Interpreter;

/// One observable step of a generator.
pub enum GenStep {
    Yielded(Value),
    /// The body finished; the payload is its return value.
    Done(Value),
}

/// Extended completion for resumable execution.
pub(crate) enum RCompletion {
    Done(Completion),
    Suspend { value: Value, kind: SuspendKind },
}

/// Descent state while resuming.
pub(crate) struct Cursor {
    frames: Vec<GenFrame>,
    pos: usize,
    resume: Option<GeneratorResume>,
}

impl Cursor {
    fn empty() -> Cursor {
        Cursor {
            frames: Vec::new(),
            pos: 0,
            resume: None,
        }
    }

    fn active(&self) -> bool {
        self.pos < self.frames.len()
    }

    /// Consume the next frame, which must be a list-index frame.
    fn take_index(&mut self) -> Option<(usize, EnvRef)> {
        if !self.active() {
            return None;
        }
        if let PathSeg::Index(i) = self.frames[self.pos].seg {
            let env = Rc::clone(&self.frames[self.pos].env);
            self.pos += 1;
            Some((i, env))
        } else {
            None
        }
    }

    /// Consume the next frame, which must be a construct segment.
    fn take_seg(&mut self) -> Option<PathSeg> {
        if !self.active() {
            return None;
        }
        let seg = self.frames[self.pos].seg.clone();
        self.pos += 1;
        Some(seg)
    }

    /// Whether the leaf has been reached with a pending resume signal.
    fn at_leaf(&self) -> bool {
        !self.active() && self.resume.is_some()
    }

    fn take_resume(&mut self) -> Option<GeneratorResume> {
        self.resume.take()
    }
}

/// Per-run driver context.
pub(crate) struct DriverCtx {
    cursor: Cursor,
    trail: Vec<GenFrame>,
    delegates: FxHashMap<u32, IterHandle>,
}

impl Interpreter {
    // =========================================================================
    // Generator objects
    // =========================================================================

    /// Calling a generator function returns a suspended generator object.
    pub(crate) fn make_generator_object(
        &mut self,
        func: &Rc<FunctionValue>,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, Value> {
        let data = func
            .script_data()
            .cloned()
            .ok_or_else(|| self.make_error(ErrorKind::TypeError, "not a generator function"))?;
        let body = lower::lowered_body_of(func);
        let env = self.bind_call_env(func, &data, this.clone(), args)?;
        let state = GeneratorState::new(Rc::clone(func), body, env, this);
        Ok(Value::Generator(Rc::new(RefCell::new(state))))
    }

    /// Drive a generator until its next yield or completion.
    pub fn resume_generator(
        &mut self,
        generator: &Rc<RefCell<GeneratorState>>,
        resume: GeneratorResume,
    ) -> Result<GenStep, Value> {
        if generator.borrow().running {
            return Err(self.make_error(ErrorKind::TypeError, "Generator is already running"));
        }
        if generator.borrow().done {
            return match resume {
                GeneratorResume::Next(_) => Ok(GenStep::Done(Value::Undefined)),
                GeneratorResume::Return(value) => Ok(GenStep::Done(value)),
                GeneratorResume::Throw(error) => Err(error),
            };
        }
        let started = generator.borrow().started;
        if !started {
            match resume {
                GeneratorResume::Next(_) => {}
                GeneratorResume::Return(value) => {
                    generator.borrow_mut().done = true;
                    return Ok(GenStep::Done(value));
                }
                GeneratorResume::Throw(error) => {
                    generator.borrow_mut().done = true;
                    return Err(error);
                }
            }
        }

        let (body, env, frames, delegates, func) = {
            let mut state = generator.borrow_mut();
            state.running = true;
            state.started = true;
            (
                Rc::clone(&state.body),
                Rc::clone(&state.env),
                std::mem::take(&mut state.frames),
                std::mem::take(&mut state.delegates),
                Rc::clone(&state.func),
            )
        };

        let cursor = Cursor {
            resume: if frames.is_empty() { None } else { Some(resume) },
            frames,
            pos: 0,
        };
        let mut ctx = DriverCtx {
            cursor,
            trail: Vec::new(),
            delegates,
        };

        self.home_stack.push(*func.home_class.borrow());
        let result = self.exec_res_list(&body, &env, &mut ctx);
        self.home_stack.pop();

        let mut state = generator.borrow_mut();
        state.running = false;
        state.delegates = ctx.delegates;
        match result {
            RCompletion::Suspend {
                value,
                kind: SuspendKind::Yield,
            } => {
                ctx.trail.reverse();
                state.frames = ctx.trail;
                Ok(GenStep::Yielded(value))
            }
            RCompletion::Suspend {
                kind: SuspendKind::Await,
                ..
            } => {
                state.done = true;
                drop(state);
                Err(self.make_error(
                    ErrorKind::SyntaxError,
                    "'await' is only valid in async functions",
                ))
            }
            RCompletion::Done(Completion::Normal(_)) => {
                state.done = true;
                Ok(GenStep::Done(Value::Undefined))
            }
            RCompletion::Done(Completion::Return(value)) => {
                state.done = true;
                Ok(GenStep::Done(value))
            }
            RCompletion::Done(Completion::Throw(error)) => {
                state.done = true;
                drop(state);
                Err(error)
            }
            RCompletion::Done(other) => {
                state.done = true;
                drop(state);
                Err(self.make_error(
                    ErrorKind::SyntaxError,
                    &format!("illegal completion escaping a generator body: {other:?}"),
                ))
            }
        }
    }

    /// Drive an async body until its next await, yield point or end.
    /// Settlement of `result_promise` happens here.
    pub(crate) fn resume_async(
        &mut self,
        generator: &Rc<RefCell<GeneratorState>>,
        result_promise: &Rc<RefCell<PromiseData>>,
        resume: GeneratorResume,
    ) -> Result<(), Value> {
        if generator.borrow().done {
            return Ok(());
        }
        let (body, env, frames, delegates, func) = {
            let mut state = generator.borrow_mut();
            state.running = true;
            state.started = true;
            (
                Rc::clone(&state.body),
                Rc::clone(&state.env),
                std::mem::take(&mut state.frames),
                std::mem::take(&mut state.delegates),
                Rc::clone(&state.func),
            )
        };
        let cursor = Cursor {
            resume: if frames.is_empty() { None } else { Some(resume) },
            frames,
            pos: 0,
        };
        let mut ctx = DriverCtx {
            cursor,
            trail: Vec::new(),
            delegates,
        };

        self.home_stack.push(*func.home_class.borrow());
        let result = self.exec_res_list(&body, &env, &mut ctx);
        self.home_stack.pop();

        {
            let mut state = generator.borrow_mut();
            state.running = false;
            state.delegates = ctx.delegates;
        }
        match result {
            RCompletion::Suspend {
                value,
                kind: SuspendKind::Await,
            } => {
                ctx.trail.reverse();
                generator.borrow_mut().frames = ctx.trail;
                // Attach the continuation to the awaited value; microtasks
                // deliver the resumption after the current turn.
                self.await_value(value, generator, result_promise);
                Ok(())
            }
            RCompletion::Suspend {
                kind: SuspendKind::Yield,
                ..
            } => {
                generator.borrow_mut().done = true;
                let error = self.make_error(
                    ErrorKind::SyntaxError,
                    "'yield' is not valid inside an async function",
                );
                self.reject_promise(result_promise, error);
                Ok(())
            }
            RCompletion::Done(Completion::Normal(_)) => {
                generator.borrow_mut().done = true;
                self.resolve_promise(result_promise, Value::Undefined);
                Ok(())
            }
            RCompletion::Done(Completion::Return(value)) => {
                generator.borrow_mut().done = true;
                self.resolve_promise(result_promise, value);
                Ok(())
            }
            RCompletion::Done(Completion::Throw(error)) => {
                generator.borrow_mut().done = true;
                self.reject_promise(result_promise, error);
                Ok(())
            }
            RCompletion::Done(other) => {
                generator.borrow_mut().done = true;
                let error = self.make_error(
                    ErrorKind::SyntaxError,
                    &format!("illegal completion escaping an async body: {other:?}"),
                );
                self.reject_promise(result_promise, error);
                Ok(())
            }
        }
    }

    /// An async call: evaluate the body until the first await, then return
    /// the result promise.
    pub(crate) fn start_async_call(
        &mut self,
        func: &Rc<FunctionValue>,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, Value> {
        let data = func
            .script_data()
            .cloned()
            .ok_or_else(|| self.make_error(ErrorKind::TypeError, "not an async function"))?;
        let body = lower::lowered_body_of(func);
        let env = self.bind_call_env(func, &data, this.clone(), args)?;
        let state = Rc::new(RefCell::new(GeneratorState::new(
            Rc::clone(func),
            body,
            env,
            this,
        )));
        let result_promise = PromiseData::pending();
        self.resume_async(&state, &result_promise, GeneratorResume::Next(Value::Undefined))?;
        Ok(Value::Promise(result_promise))
    }

    // =========================================================================
    // Resumable executors
    // =========================================================================

    fn exec_res_list(
        &mut self,
        stmts: &[Stmt],
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let mut env = Rc::clone(env);
        let mut start = 0;
        let mut resuming = false;
        if let Some((index, frame_env)) = ctx.cursor.take_index() {
            start = index;
            env = frame_env;
            resuming = true;
        } else {
            self.hoist_functions(stmts, &env);
        }
        for (i, stmt) in stmts.iter().enumerate().skip(start) {
            let result = if resuming && i == start {
                self.exec_res_stmt(stmt, &env, ctx)
            } else {
                let mut fresh = DriverCtx {
                    cursor: Cursor::empty(),
                    trail: std::mem::take(&mut ctx.trail),
                    delegates: std::mem::take(&mut ctx.delegates),
                };
                let r = self.exec_res_stmt(stmt, &env, &mut fresh);
                ctx.trail = fresh.trail;
                ctx.delegates = fresh.delegates;
                r
            };
            match result {
                RCompletion::Done(completion) if completion.is_abrupt() => {
                    return RCompletion::Done(completion);
                }
                RCompletion::Done(_) => {}
                RCompletion::Suspend { value, kind } => {
                    ctx.trail.push(GenFrame {
                        seg: PathSeg::Index(i),
                        env: Rc::clone(&env),
                    });
                    return RCompletion::Suspend { value, kind };
                }
            }
        }
        RCompletion::Done(Completion::normal())
    }

    fn exec_res_stmt(&mut self, stmt: &Stmt, env: &EnvRef, ctx: &mut DriverCtx) -> RCompletion {
        // The canonical suspend statement.
        if let Some((decl, init)) = lower::as_suspend_decl(stmt) {
            return self.exec_suspend_stmt(decl, init, env, ctx);
        }
        // Statements without suspend points run on the ordinary executor.
        if !lower::stmt_suspends(stmt) && !ctx.cursor.active() {
            return RCompletion::Done(self.exec_stmt(stmt, env));
        }

        match &stmt.kind {
            StmtKind::Block(stmts) => {
                let block_env = if ctx.cursor.active() {
                    Rc::clone(env) // overridden inside exec_res_list
                } else {
                    Environment::child(env)
                };
                self.exec_res_list(stmts, &block_env, ctx)
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if ctx.cursor.active() {
                    match ctx.cursor.take_seg() {
                        Some(PathSeg::IfThen) => Some(then.as_ref()),
                        Some(PathSeg::IfElse) => otherwise.as_deref(),
                        _ => None,
                    }
                } else {
                    let test = match self.eval(cond, env) {
                        Ok(value) => value,
                        Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                    };
                    if test.is_truthy() {
                        Some(then.as_ref())
                    } else {
                        otherwise.as_deref()
                    }
                };
                let Some(branch) = branch else {
                    return RCompletion::Done(Completion::normal());
                };
                let is_then = std::ptr::eq(branch, then.as_ref());
                let result = self.exec_res_stmt(branch, env, ctx);
                if let RCompletion::Suspend { value, kind } = result {
                    ctx.trail.push(GenFrame {
                        seg: if is_then { PathSeg::IfThen } else { PathSeg::IfElse },
                        env: Rc::clone(env),
                    });
                    return RCompletion::Suspend { value, kind };
                }
                result
            }
            StmtKind::While { cond, body, step } => {
                self.exec_res_while(cond, body, step, None, env, ctx)
            }
            StmtKind::Labeled { label, body } => {
                let resuming = matches!(
                    ctx.cursor.frames.get(ctx.cursor.pos).map(|f| &f.seg),
                    Some(PathSeg::LabelBody)
                );
                if resuming {
                    ctx.cursor.take_seg();
                }
                let result = match &body.kind {
                    StmtKind::While { cond, body: inner, step } => {
                        self.exec_res_while(cond, inner, step, Some(label.as_str()), env, ctx)
                    }
                    _ => self.exec_res_stmt(body, env, ctx),
                };
                match result {
                    RCompletion::Suspend { value, kind } => {
                        ctx.trail.push(GenFrame {
                            seg: PathSeg::LabelBody,
                            env: Rc::clone(env),
                        });
                        RCompletion::Suspend { value, kind }
                    }
                    RCompletion::Done(completion) if completion.break_matches(Some(label)) => {
                        RCompletion::Done(Completion::normal())
                    }
                    other => other,
                }
            }
            StmtKind::ForOf {
                binding,
                binding_kind,
                iterable,
                body,
            } => self.exec_res_for_of(binding, *binding_kind, iterable, body, None, env, ctx),
            StmtKind::ForIn {
                binding,
                binding_kind,
                object,
                body,
            } => self.exec_res_for_in(binding, *binding_kind, object, body, env, ctx),
            StmtKind::Try {
                block,
                catch,
                finally,
            } => self.exec_res_try(block, catch.as_ref(), finally.as_deref(), env, ctx),
            StmtKind::Switch {
                discriminant,
                cases,
            } => self.exec_res_switch(discriminant, cases, env, ctx),
            _ => RCompletion::Done(self.exec_stmt(stmt, env)),
        }
    }

    /// `let %slot = yield expr;` / `let %slot = await expr;` and the
    /// delegating `yield*`.
    fn exec_suspend_stmt(
        &mut self,
        decl: &VarDeclarator,
        init: &Expr,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let delegate_key = init.id.0;
        let is_delegate = matches!(
            init.kind,
            ExprKind::Yield { delegate: true, .. }
        );

        // Resumption lands here.
        if ctx.cursor.at_leaf() {
            let resume = ctx.cursor.take_resume().expect("pending resume");
            if is_delegate {
                return self.step_delegate(decl, delegate_key, resume, env, ctx);
            }
            return match resume {
                GeneratorResume::Next(value) => {
                    env.declare(&decl.name, value, true);
                    RCompletion::Done(Completion::normal())
                }
                GeneratorResume::Throw(error) => RCompletion::Done(Completion::Throw(error)),
                GeneratorResume::Return(value) => RCompletion::Done(Completion::Return(value)),
            };
        }

        // First arrival: evaluate the operand and suspend.
        match &init.kind {
            ExprKind::Await(inner) => {
                let value = match self.eval(inner, env) {
                    Ok(value) => value,
                    Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                };
                RCompletion::Suspend {
                    value,
                    kind: SuspendKind::Await,
                }
            }
            ExprKind::Yield {
                value,
                delegate: false,
            } => {
                let value = match value {
                    Some(inner) => match self.eval(inner, env) {
                        Ok(value) => value,
                        Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                    },
                    None => Value::Undefined,
                };
                RCompletion::Suspend {
                    value,
                    kind: SuspendKind::Yield,
                }
            }
            ExprKind::Yield {
                value,
                delegate: true,
            } => {
                let subject = match value {
                    Some(inner) => match self.eval(inner, env) {
                        Ok(value) => value,
                        Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                    },
                    None => Value::Undefined,
                };
                let iterator = match self.get_iterator(&subject, init.span) {
                    Ok(iterator) => iterator,
                    Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                };
                let handle: IterHandle = Rc::new(RefCell::new(iterator));
                ctx.delegates.insert(delegate_key, Rc::clone(&handle));
                self.advance_delegate(decl, delegate_key, handle, Value::Undefined, env, ctx)
            }
            _ => RCompletion::Done(self.exec_stmt(
                &Stmt {
                    span: decl.span,
                    kind: StmtKind::Var {
                        kind: VarKind::Let,
                        decls: vec![decl.clone()],
                    },
                },
                env,
            )),
        }
    }

    /// Resume a `yield*` delegation with the outer resume signal.
    fn step_delegate(
        &mut self,
        decl: &VarDeclarator,
        key: u32,
        resume: GeneratorResume,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let Some(handle) = ctx.delegates.get(&key).cloned() else {
            // No live delegate: the resume applies directly.
            return match resume {
                GeneratorResume::Next(value) => {
                    env.declare(&decl.name, value, true);
                    RCompletion::Done(Completion::normal())
                }
                GeneratorResume::Throw(error) => RCompletion::Done(Completion::Throw(error)),
                GeneratorResume::Return(value) => RCompletion::Done(Completion::Return(value)),
            };
        };
        match resume {
            GeneratorResume::Next(value) => {
                self.advance_delegate(decl, key, handle, value, env, ctx)
            }
            GeneratorResume::Throw(error) => {
                let result = handle.borrow_mut().throw(self, error);
                match result {
                    Ok(Some(yielded)) => RCompletion::Suspend {
                        value: yielded,
                        kind: SuspendKind::Yield,
                    },
                    Ok(None) => {
                        self.finish_delegate(decl, key, &handle, env, ctx)
                    }
                    Err(thrown) => {
                        ctx.delegates.remove(&key);
                        RCompletion::Done(Completion::Throw(thrown))
                    }
                }
            }
            GeneratorResume::Return(value) => {
                let close = handle.borrow_mut().close(self, value.clone());
                ctx.delegates.remove(&key);
                match close {
                    Ok(()) => RCompletion::Done(Completion::Return(value)),
                    Err(thrown) => RCompletion::Done(Completion::Throw(thrown)),
                }
            }
        }
    }

    fn advance_delegate(
        &mut self,
        decl: &VarDeclarator,
        key: u32,
        handle: IterHandle,
        sent: Value,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let step = handle.borrow_mut().next(self, sent);
        match step {
            Ok(Some(yielded)) => RCompletion::Suspend {
                value: yielded,
                kind: SuspendKind::Yield,
            },
            Ok(None) => self.finish_delegate(decl, key, &handle, env, ctx),
            Err(thrown) => {
                ctx.delegates.remove(&key);
                RCompletion::Done(Completion::Throw(thrown))
            }
        }
    }

    fn finish_delegate(
        &mut self,
        decl: &VarDeclarator,
        key: u32,
        handle: &IterHandle,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let done_value = match &*handle.borrow() {
            super::iter::ValueIterator::Generator { done_value, .. } => {
                done_value.clone().unwrap_or(Value::Undefined)
            }
            _ => Value::Undefined,
        };
        ctx.delegates.remove(&key);
        env.declare(&decl.name, done_value, true);
        RCompletion::Done(Completion::normal())
    }

    fn exec_res_while(
        &mut self,
        cond: &Expr,
        body: &Stmt,
        step: &Option<Expr>,
        label: Option<&str>,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let mut resuming = matches!(
            ctx.cursor.frames.get(ctx.cursor.pos).map(|f| &f.seg),
            Some(PathSeg::LoopBody)
        );
        if resuming {
            ctx.cursor.take_seg();
        }
        loop {
            if !resuming {
                match self.eval(cond, env) {
                    Ok(value) if value.is_truthy() => {}
                    Ok(_) => break,
                    Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                }
            }
            let result = if resuming {
                resuming = false;
                self.exec_res_stmt(body, env, ctx)
            } else {
                let mut fresh = DriverCtx {
                    cursor: Cursor::empty(),
                    trail: std::mem::take(&mut ctx.trail),
                    delegates: std::mem::take(&mut ctx.delegates),
                };
                let r = self.exec_res_stmt(body, env, &mut fresh);
                ctx.trail = fresh.trail;
                ctx.delegates = fresh.delegates;
                r
            };
            match result {
                RCompletion::Suspend { value, kind } => {
                    ctx.trail.push(GenFrame {
                        seg: PathSeg::LoopBody,
                        env: Rc::clone(env),
                    });
                    return RCompletion::Suspend { value, kind };
                }
                RCompletion::Done(completion) => match completion {
                    Completion::Normal(_) => {}
                    ref c if c.break_matches(label) => return RCompletion::Done(Completion::normal()),
                    ref c if c.continue_matches(label) => {}
                    other => return RCompletion::Done(other),
                },
            }
            if let Some(step) = step {
                if let Err(thrown) = self.eval(step, env) {
                    return RCompletion::Done(Completion::Throw(thrown));
                }
            }
        }
        RCompletion::Done(Completion::normal())
    }

    fn exec_res_for_of(
        &mut self,
        binding: &str,
        binding_kind: VarKind,
        iterable: &Expr,
        body: &Stmt,
        label: Option<&str>,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let (handle, mut resuming) = match ctx.cursor.frames.get(ctx.cursor.pos).map(|f| f.seg.clone())
        {
            Some(PathSeg::ForOfBody(handle)) => {
                ctx.cursor.take_seg();
                (handle, true)
            }
            _ => {
                let subject = match self.eval(iterable, env) {
                    Ok(value) => value,
                    Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                };
                let iterator = match self.get_iterator(&subject, iterable.span) {
                    Ok(iterator) => iterator,
                    Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                };
                (Rc::new(RefCell::new(iterator)), false)
            }
        };
        loop {
            let result = if resuming {
                resuming = false;
                self.exec_res_stmt(body, env, ctx)
            } else {
                let next = {
                    let step = handle.borrow_mut().next(self, Value::Undefined);
                    match step {
                        Ok(Some(value)) => value,
                        Ok(None) => break,
                        Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                    }
                };
                let loop_env = Environment::child(env);
                loop_env.declare(binding, next, binding_kind != VarKind::Const);
                let mut fresh = DriverCtx {
                    cursor: Cursor::empty(),
                    trail: std::mem::take(&mut ctx.trail),
                    delegates: std::mem::take(&mut ctx.delegates),
                };
                let r = self.exec_res_stmt(body, &loop_env, &mut fresh);
                ctx.trail = fresh.trail;
                ctx.delegates = fresh.delegates;
                r
            };
            match result {
                RCompletion::Suspend { value, kind } => {
                    ctx.trail.push(GenFrame {
                        seg: PathSeg::ForOfBody(Rc::clone(&handle)),
                        env: Rc::clone(env),
                    });
                    return RCompletion::Suspend { value, kind };
                }
                RCompletion::Done(completion) => match completion {
                    Completion::Normal(_) => {}
                    ref c if c.break_matches(label) => return RCompletion::Done(Completion::normal()),
                    ref c if c.continue_matches(label) => {}
                    other => return RCompletion::Done(other),
                },
            }
        }
        RCompletion::Done(Completion::normal())
    }

    fn exec_res_for_in(
        &mut self,
        binding: &str,
        binding_kind: VarKind,
        object: &Expr,
        body: &Stmt,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        // Key lists are snapshots; reuse the for-of machinery over them.
        let (handle, mut resuming) = match ctx.cursor.frames.get(ctx.cursor.pos).map(|f| f.seg.clone())
        {
            Some(PathSeg::ForInBody(handle)) => {
                ctx.cursor.take_seg();
                (handle, true)
            }
            _ => {
                let subject = match self.eval(object, env) {
                    Ok(value) => value,
                    Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                };
                let keys: Vec<Value> = match &subject {
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
                let iterator = super::iter::ValueIterator::SetEntries {
                    entries: keys,
                    index: 0,
                };
                (Rc::new(RefCell::new(iterator)), false)
            }
        };
        loop {
            let result = if resuming {
                resuming = false;
                self.exec_res_stmt(body, env, ctx)
            } else {
                let next = {
                    let step = handle.borrow_mut().next(self, Value::Undefined);
                    match step {
                        Ok(Some(value)) => value,
                        Ok(None) => break,
                        Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                    }
                };
                let loop_env = Environment::child(env);
                loop_env.declare(binding, next, binding_kind != VarKind::Const);
                self.exec_res_stmt(body, &loop_env, ctx)
            };
            match result {
                RCompletion::Suspend { value, kind } => {
                    ctx.trail.push(GenFrame {
                        seg: PathSeg::ForInBody(Rc::clone(&handle)),
                        env: Rc::clone(env),
                    });
                    return RCompletion::Suspend { value, kind };
                }
                RCompletion::Done(completion) => match completion {
                    Completion::Normal(_) => {}
                    ref c if c.break_matches(None) => return RCompletion::Done(Completion::normal()),
                    ref c if c.continue_matches(None) => {}
                    other => return RCompletion::Done(other),
                },
            }
        }
        RCompletion::Done(Completion::normal())
    }

    fn exec_res_try(
        &mut self,
        block: &[Stmt],
        catch: Option<&CatchClause>,
        finally: Option<&[Stmt]>,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let mut pending: Option<Completion> = None;
        let mut skip_body = false;

        match ctx.cursor.frames.get(ctx.cursor.pos).map(|f| f.seg.clone()) {
            Some(PathSeg::TryBlock) => {
                ctx.cursor.take_seg();
                let result = self.exec_res_list(block, env, ctx);
                match result {
                    RCompletion::Suspend { value, kind } => {
                        ctx.trail.push(GenFrame {
                            seg: PathSeg::TryBlock,
                            env: Rc::clone(env),
                        });
                        return RCompletion::Suspend { value, kind };
                    }
                    RCompletion::Done(completion) => {
                        match self.apply_catch(completion, catch, env, ctx) {
                            Ok(completion) => pending = Some(completion),
                            Err(suspend) => return suspend,
                        }
                    }
                }
                skip_body = true;
            }
            Some(PathSeg::CatchBlock) => {
                ctx.cursor.take_seg();
                let result = self.exec_res_list(
                    catch.map(|c| c.body.as_slice()).unwrap_or_default(),
                    env,
                    ctx,
                );
                match result {
                    RCompletion::Suspend { value, kind } => {
                        ctx.trail.push(GenFrame {
                            seg: PathSeg::CatchBlock,
                            env: Rc::clone(env),
                        });
                        return RCompletion::Suspend { value, kind };
                    }
                    RCompletion::Done(completion) => pending = Some(completion),
                }
                skip_body = true;
            }
            Some(PathSeg::FinallyBlock(saved)) => {
                ctx.cursor.take_seg();
                let result = self.exec_res_list(finally.unwrap_or_default(), env, ctx);
                return self.finish_finally(result, saved.map(|b| *b), env, ctx);
            }
            _ => {}
        }

        if !skip_body {
            let mut fresh = DriverCtx {
                cursor: Cursor::empty(),
                trail: std::mem::take(&mut ctx.trail),
                delegates: std::mem::take(&mut ctx.delegates),
            };
            let block_env = Environment::child(env);
            let result = self.exec_res_list(block, &block_env, &mut fresh);
            ctx.trail = fresh.trail;
            ctx.delegates = fresh.delegates;
            match result {
                RCompletion::Suspend { value, kind } => {
                    ctx.trail.push(GenFrame {
                        seg: PathSeg::TryBlock,
                        env: Rc::clone(env),
                    });
                    return RCompletion::Suspend { value, kind };
                }
                RCompletion::Done(completion) => {
                    match self.apply_catch(completion, catch, env, ctx) {
                        Ok(completion) => pending = Some(completion),
                        Err(suspend) => return suspend,
                    }
                }
            }
        }

        let pending = pending.unwrap_or_else(Completion::normal);
        if let Some(finally) = finally {
            let mut fresh = DriverCtx {
                cursor: Cursor::empty(),
                trail: std::mem::take(&mut ctx.trail),
                delegates: std::mem::take(&mut ctx.delegates),
            };
            let finally_env = Environment::child(env);
            let result = self.exec_res_list(finally, &finally_env, &mut fresh);
            ctx.trail = fresh.trail;
            ctx.delegates = fresh.delegates;
            return self.finish_finally(result, Some(pending), env, ctx);
        }
        RCompletion::Done(pending)
    }

    /// Run the catch clause against a completion from the try block.
    /// Suspension inside the catch propagates via `Err`-like control by
    /// returning through `Result`.
    fn apply_catch(
        &mut self,
        completion: Completion,
        catch: Option<&CatchClause>,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> Result<Completion, RCompletion> {
        let Completion::Throw(thrown) = completion else {
            return Ok(completion);
        };
        let Some(catch) = catch else {
            return Ok(Completion::Throw(thrown));
        };
        let catch_env = Environment::child(env);
        if let Some(binding) = &catch.binding {
            catch_env.declare(binding, thrown, true);
        }
        let mut fresh = DriverCtx {
            cursor: Cursor::empty(),
            trail: std::mem::take(&mut ctx.trail),
            delegates: std::mem::take(&mut ctx.delegates),
        };
        let result = self.exec_res_list(&catch.body, &catch_env, &mut fresh);
        ctx.trail = fresh.trail;
        ctx.delegates = fresh.delegates;
        match result {
            RCompletion::Suspend { value, kind } => {
                ctx.trail.push(GenFrame {
                    seg: PathSeg::CatchBlock,
                    env: Rc::clone(env),
                });
                Err(RCompletion::Suspend { value, kind })
            }
            RCompletion::Done(completion) => Ok(completion),
        }
    }

    fn finish_finally(
        &mut self,
        result: RCompletion,
        pending: Option<Completion>,
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        match result {
            RCompletion::Suspend { value, kind } => {
                ctx.trail.push(GenFrame {
                    seg: PathSeg::FinallyBlock(pending.map(Box::new)),
                    env: Rc::clone(env),
                });
                RCompletion::Suspend { value, kind }
            }
            RCompletion::Done(finally_completion) => {
                if finally_completion.is_abrupt() {
                    RCompletion::Done(finally_completion)
                } else {
                    RCompletion::Done(pending.unwrap_or_else(Completion::normal))
                }
            }
        }
    }

    fn exec_res_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        env: &EnvRef,
        ctx: &mut DriverCtx,
    ) -> RCompletion {
        let (start_case, switch_env, mut resuming) =
            match ctx.cursor.frames.get(ctx.cursor.pos).map(|f| f.seg.clone()) {
                Some(PathSeg::Case(index)) => {
                    ctx.cursor.take_seg();
                    let env_for_resume = ctx
                        .cursor
                        .frames
                        .get(ctx.cursor.pos)
                        .map(|f| Rc::clone(&f.env))
                        .unwrap_or_else(|| Environment::child(env));
                    (Some(index), env_for_resume, true)
                }
                _ => {
                    let subject = match self.eval(discriminant, env) {
                        Ok(value) => value,
                        Err(thrown) => return RCompletion::Done(Completion::Throw(thrown)),
                    };
                    let switch_env = Environment::child(env);
                    let mut matched = None;
                    for (i, case) in cases.iter().enumerate() {
                        if let Some(test) = &case.test {
                            let test_value = match self.eval(test, &switch_env) {
                                Ok(value) => value,
                                Err(thrown) => {
                                    return RCompletion::Done(Completion::Throw(thrown));
                                }
                            };
                            if subject.same_value(&test_value) {
                                matched = Some(i);
                                break;
                            }
                        }
                    }
                    let matched =
                        matched.or_else(|| cases.iter().position(|case| case.test.is_none()));
                    (matched, switch_env, false)
                }
            };
        let Some(start_case) = start_case else {
            return RCompletion::Done(Completion::normal());
        };
        for (case_index, case) in cases.iter().enumerate().skip(start_case) {
            let result = if resuming && case_index == start_case {
                resuming = false;
                self.exec_res_list(&case.body, &switch_env, ctx)
            } else {
                let mut fresh = DriverCtx {
                    cursor: Cursor::empty(),
                    trail: std::mem::take(&mut ctx.trail),
                    delegates: std::mem::take(&mut ctx.delegates),
                };
                let r = self.exec_res_list(&case.body, &switch_env, &mut fresh);
                ctx.trail = fresh.trail;
                ctx.delegates = fresh.delegates;
                r
            };
            match result {
                RCompletion::Suspend { value, kind } => {
                    ctx.trail.push(GenFrame {
                        seg: PathSeg::Case(case_index),
                        env: Rc::clone(&switch_env),
                    });
                    return RCompletion::Suspend { value, kind };
                }
                RCompletion::Done(completion) => match completion {
                    Completion::Normal(_) => {}
                    ref c if c.break_matches(None) => {
                        return RCompletion::Done(Completion::normal());
                    }
                    other => return RCompletion::Done(other),
                },
            }
        }
        RCompletion::Done(Completion::normal())
    }
}
