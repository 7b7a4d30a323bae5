//! Promise state machine and microtask execution.
//!
//! Three states with once-only transitions; `then`/`catch`/`finally`
//! enqueue callbacks that run after the current synchronous turn, FIFO in
//! attachment order. Awaiting attaches the suspended async body as a
//! continuation delivered through the microtask queue.

use std::cell::RefCell;
use std::rc::Rc;

use tsi_common::span::Span;

use crate::event_loop::Microtask;
use crate::generator::{GeneratorResume, GeneratorState};
use crate::value::*;

use super::Interpreter;

impl Interpreter {
    // =========================================================================
    // Settlement (once-only)
    // =========================================================================

    /// Fulfil a promise. Settling an already-settled promise is a no-op.
    /// Resolving with another promise adopts its eventual state.
    pub fn resolve_promise(&mut self, promise: &Rc<RefCell<PromiseData>>, value: Value) {
        if !matches!(
            promise.borrow().status,
            Some(PromiseStatus::Pending) | None
        ) {
            return;
        }
        if let Value::Promise(inner) = &value {
            // Adoption: settle when the inner promise settles.
            let status = inner.borrow().status.clone();
            match status {
                Some(PromiseStatus::Fulfilled(inner_value)) => {
                    self.resolve_promise(promise, inner_value);
                }
                Some(PromiseStatus::Rejected(error)) => {
                    self.reject_promise(promise, error);
                }
                _ => {
                    let derived = Rc::clone(promise);
                    inner.borrow_mut().reactions.push(PromiseReaction {
                        on_fulfilled: None,
                        on_rejected: None,
                        derived,
                    });
                }
            }
            return;
        }
        promise.borrow_mut().status = Some(PromiseStatus::Fulfilled(value.clone()));
        self.fire_reactions(promise, true, value);
    }

    /// Reject a promise; once-only like resolution.
    pub fn reject_promise(&mut self, promise: &Rc<RefCell<PromiseData>>, error: Value) {
        if !matches!(
            promise.borrow().status,
            Some(PromiseStatus::Pending) | None
        ) {
            return;
        }
        promise.borrow_mut().status = Some(PromiseStatus::Rejected(error.clone()));
        self.fire_reactions(promise, false, error);
    }

    fn fire_reactions(
        &mut self,
        promise: &Rc<RefCell<PromiseData>>,
        fulfilled: bool,
        value: Value,
    ) {
        let reactions = std::mem::take(&mut promise.borrow_mut().reactions);
        for reaction in reactions {
            self.schedule_reaction(reaction, fulfilled, value.clone());
        }
        let waiting = std::mem::take(&mut promise.borrow_mut().waiting);
        for continuation in waiting {
            let resume = if fulfilled {
                GeneratorResume::Next(value.clone())
            } else {
                GeneratorResume::Throw(value.clone())
            };
            self.event_loop.enqueue_microtask(Microtask::ResumeAsync {
                generator: continuation.generator,
                result_promise: continuation.result_promise,
                resume,
            });
        }
    }

    fn schedule_reaction(&mut self, reaction: PromiseReaction, fulfilled: bool, value: Value) {
        let handler = if fulfilled {
            reaction.on_fulfilled.clone()
        } else {
            reaction.on_rejected.clone()
        };
        match handler {
            Some(func) => {
                self.event_loop.enqueue_microtask(Microtask::Call {
                    func,
                    args: vec![value],
                    derived: Some(reaction.derived),
                });
            }
            None => {
                // Pass-through: the derived promise settles the same way.
                self.event_loop.enqueue_microtask(Microtask::Settle {
                    promise: reaction.derived,
                    fulfilled,
                    value,
                });
            }
        }
    }

    // =========================================================================
    // then / catch / finally
    // =========================================================================

    /// Attach reactions, returning the derived promise.
    pub fn promise_then(
        &mut self,
        promise: &Rc<RefCell<PromiseData>>,
        on_fulfilled: Option<Rc<FunctionValue>>,
        on_rejected: Option<Rc<FunctionValue>>,
    ) -> Value {
        let derived = PromiseData::pending();
        let status = promise.borrow().status.clone();
        match status {
            Some(PromiseStatus::Fulfilled(value)) => {
                self.schedule_reaction(
                    PromiseReaction {
                        on_fulfilled,
                        on_rejected,
                        derived: Rc::clone(&derived),
                    },
                    true,
                    value,
                );
            }
            Some(PromiseStatus::Rejected(error)) => {
                self.schedule_reaction(
                    PromiseReaction {
                        on_fulfilled,
                        on_rejected,
                        derived: Rc::clone(&derived),
                    },
                    false,
                    error,
                );
            }
            _ => {
                promise.borrow_mut().reactions.push(PromiseReaction {
                    on_fulfilled,
                    on_rejected,
                    derived: Rc::clone(&derived),
                });
            }
        }
        Value::Promise(derived)
    }

    // =========================================================================
    // await
    // =========================================================================

    /// Attach a suspended async body to an awaited value. Non-promise
    /// values still defer one microtask, preserving ordering guarantees.
    pub(crate) fn await_value(
        &mut self,
        value: Value,
        generator: &Rc<RefCell<GeneratorState>>,
        result_promise: &Rc<RefCell<PromiseData>>,
    ) {
        match &value {
            Value::Promise(awaited) => {
                let status = awaited.borrow().status.clone();
                match status {
                    Some(PromiseStatus::Fulfilled(inner)) => {
                        self.event_loop.enqueue_microtask(Microtask::ResumeAsync {
                            generator: Rc::clone(generator),
                            result_promise: Rc::clone(result_promise),
                            resume: GeneratorResume::Next(inner),
                        });
                    }
                    Some(PromiseStatus::Rejected(error)) => {
                        self.event_loop.enqueue_microtask(Microtask::ResumeAsync {
                            generator: Rc::clone(generator),
                            result_promise: Rc::clone(result_promise),
                            resume: GeneratorResume::Throw(error),
                        });
                    }
                    _ => {
                        awaited.borrow_mut().waiting.push(AsyncContinuation {
                            generator: Rc::clone(generator),
                            result_promise: Rc::clone(result_promise),
                        });
                    }
                }
            }
            other => {
                self.event_loop.enqueue_microtask(Microtask::ResumeAsync {
                    generator: Rc::clone(generator),
                    result_promise: Rc::clone(result_promise),
                    resume: GeneratorResume::Next(other.clone()),
                });
            }
        }
    }

    // =========================================================================
    // Microtask dispatch
    // =========================================================================

    pub(crate) fn run_microtask(&mut self, task: Microtask) -> Result<(), Value> {
        match task {
            Microtask::Call {
                func,
                args,
                derived,
            } => {
                let result = self.call_function(&func, None, args, Span::dummy());
                match (result, derived) {
                    (Ok(value), Some(promise)) => {
                        self.resolve_promise(&promise, value);
                        Ok(())
                    }
                    (Err(error), Some(promise)) => {
                        self.reject_promise(&promise, error);
                        Ok(())
                    }
                    (Ok(_), None) => Ok(()),
                    (Err(error), None) => Err(error),
                }
            }
            Microtask::Settle {
                promise,
                fulfilled,
                value,
            } => {
                if fulfilled {
                    self.resolve_promise(&promise, value);
                } else {
                    self.reject_promise(&promise, value);
                }
                Ok(())
            }
            Microtask::ResumeAsync {
                generator,
                result_promise,
                resume,
            } => self.resume_async(&generator, &result_promise, resume),
        }
    }
}
