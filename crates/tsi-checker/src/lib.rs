//! Type checker for the tsi engine.
//!
//! This crate is organized into several submodules:
//! - `types` - the closed type universe, `TypeId` interning, canonical unions
//! - `env` - twin scope stacks for type names and value names
//! - `state` - `CheckerState` shared state and the check entry point
//! - `hoist` - pass 1: declaration hoisting with placeholder registration
//! - `stmts` / `exprs` - pass 2: statement and expression checking
//! - `assignable` - the memoised compatibility relation
//! - `narrow` - flow-sensitive narrowing over recognised guards
//! - `calls` - call checking, overload resolution, generic inference
//! - `classes` - class hierarchy checks (override variance, abstractness)
//! - `type_map` - the expression-to-type table consumed by back ends
//!
//! The checker accumulates diagnostics and continues where possible,
//! stopping propagation within the offending statement only. Checking is
//! deterministic: a given program yields the same error set and type map
//! on every run.

pub mod types;
pub use types::{Type, TypeId, TypeInterner};

pub mod env;
pub mod state;
pub use state::{CheckResult, CheckerState, check_program};

mod assignable;
mod calls;
mod classes;
mod exprs;
mod hoist;
mod narrow;
mod stmts;

pub mod type_map;
pub use type_map::TypeMap;
