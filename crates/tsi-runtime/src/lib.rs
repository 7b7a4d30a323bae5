//! Runtime half of the tsi engine.
//!
//! This crate provides:
//! - `value` - the closed runtime value universe and the class arena
//! - `env` - frame-chain environments with closure capture by reference
//! - `completion` - the abrupt-completion algebra for statement execution
//! - `error` - runtime error construction with stack capture
//! - `interp` - the tree-walking interpreter
//! - `lower` - yield/await normalisation of generator and async bodies
//! - `generator` - the resumable statement driver
//! - `event_loop` - microtask/macrotask queues on a deterministic clock
//! - `builtins` - the host capability table
//! - `stringify` - the console stringifier
//!
//! The engine has no module-level mutable state: everything lives in the
//! `Interpreter` value threaded through every operation.

pub mod completion;
pub mod env;
pub mod error;
pub mod value;

pub mod event_loop;
pub mod stringify;

mod generator;
mod lower;

pub mod builtins;
pub mod interp;

pub use completion::Completion;
pub use error::{EngineFault, ErrorKind};
pub use interp::{ConsoleSink, Interpreter, RunOutcome};
pub use value::Value;
