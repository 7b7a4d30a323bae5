//! The event loop: a microtask queue and a macrotask (timer) queue on a
//! deterministic virtual clock.
//!
//! Microtasks drain at the end of each synchronous turn (the top-level
//! script, each macrotask, each settled `await`); promise reactions run
//! FIFO in attachment order. Timers fire when the virtual clock is
//! advanced by `flush`; equal due-times fire in insertion order.
//! Cancellation sets a bit checked at dispatch time.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::generator::GeneratorResume;
use crate::value::{FunctionValue, PromiseData, Value};

/// One queued microtask.
pub enum Microtask {
    /// Invoke a callback (promise reaction).
    Call {
        func: Rc<FunctionValue>,
        args: Vec<Value>,
        /// Promise settled by the callback's outcome, if any.
        derived: Option<Rc<RefCell<PromiseData>>>,
    },
    /// Settle a derived promise directly (then-chaining without handler).
    Settle {
        promise: Rc<RefCell<PromiseData>>,
        fulfilled: bool,
        value: Value,
    },
    /// Resume a suspended async function body.
    ResumeAsync {
        generator: Rc<RefCell<crate::generator::GeneratorState>>,
        result_promise: Rc<RefCell<PromiseData>>,
        resume: GeneratorResume,
    },
}

/// One queued timer.
pub struct TimerEntry {
    pub id: u32,
    pub due: f64,
    pub seq: u64,
    pub callback: Rc<FunctionValue>,
    pub args: Vec<Value>,
    pub cancelled: bool,
    /// Repeat period for `setInterval`.
    pub interval: Option<f64>,
    /// How many times this entry has fired (bounds interval replay in a
    /// deterministic flush).
    pub fires: u32,
}

/// Deterministic scheduler state.
#[derive(Default)]
pub struct EventLoop {
    pub microtasks: VecDeque<Microtask>,
    pub timers: Vec<TimerEntry>,
    /// Virtual clock in milliseconds; advanced only by flushing.
    pub now: f64,
    /// Deterministic PRNG state for Math.random.
    pub rng_state: u64,
    next_timer_id: u32,
    next_seq: u64,
}

impl EventLoop {
    pub fn enqueue_microtask(&mut self, task: Microtask) {
        self.microtasks.push_back(task);
    }

    pub fn schedule_timer(
        &mut self,
        delay: f64,
        callback: Rc<FunctionValue>,
        args: Vec<Value>,
        interval: Option<f64>,
    ) -> u32 {
        self.next_timer_id += 1;
        self.next_seq += 1;
        let id = self.next_timer_id;
        self.timers.push(TimerEntry {
            id,
            due: self.now + delay.max(0.0),
            seq: self.next_seq,
            callback,
            args,
            cancelled: false,
            interval,
            fires: 0,
        });
        id
    }

    /// Mark a pending timer cancelled; checked at dispatch time.
    pub fn cancel_timer(&mut self, id: u32) {
        for timer in &mut self.timers {
            if timer.id == id {
                timer.cancelled = true;
            }
        }
    }

    /// The next timer to fire: earliest due time, insertion order on ties.
    /// Cancelled entries are discarded.
    pub fn take_next_timer(&mut self) -> Option<TimerEntry> {
        self.timers.retain(|t| !t.cancelled);
        if self.timers.is_empty() {
            return None;
        }
        let mut best = 0;
        for (i, timer) in self.timers.iter().enumerate() {
            let current = &self.timers[best];
            if (timer.due, timer.seq) < (current.due, current.seq) {
                best = i;
            }
        }
        let entry = self.timers.remove(best);
        // Advancing the virtual clock is what "waiting" means here.
        if entry.due > self.now {
            self.now = entry.due;
        }
        Some(entry)
    }

    /// Requeue a repeating timer for its next period. Replay is bounded
    /// so a never-cleared interval cannot wedge a deterministic flush.
    pub fn requeue_interval(&mut self, entry: &TimerEntry) {
        const MAX_INTERVAL_REPLAY: u32 = 1_000;
        if let Some(period) = entry.interval {
            if entry.fires >= MAX_INTERVAL_REPLAY {
                return;
            }
            self.next_seq += 1;
            self.timers.push(TimerEntry {
                id: entry.id,
                due: self.now + period.max(0.0),
                seq: self.next_seq,
                callback: Rc::clone(&entry.callback),
                args: entry.args.clone(),
                cancelled: false,
                interval: entry.interval,
                fires: entry.fires + 1,
            });
        }
    }

    #[must_use]
    pub fn has_pending_timers(&self) -> bool {
        self.timers.iter().any(|t| !t.cancelled)
    }
}
