//! Centralized limits and thresholds.
//!
//! Exceeding a hard limit surfaces as an engine fault, never as silent
//! truncation.

/// Maximum parser recursion depth before reporting PARSE_DEPTH_EXCEEDED.
pub const MAX_PARSE_DEPTH: u32 = 512;

/// Maximum interpreter call-stack depth before raising a stack-overflow
/// engine fault.
pub const MAX_CALL_DEPTH: u32 = 2048;

/// Maximum depth of a reference path the checker will narrow
/// (e.g. `a.b.c.d` counts 4).
pub const MAX_NARROWING_PATH_DEPTH: u32 = 5;

/// Maximum recursion when comparing types for assignability.
/// Deeply self-referential types beyond this are assumed compatible,
/// matching the checker's coinductive reading of recursive types.
pub const MAX_TYPE_RELATION_DEPTH: u32 = 64;

/// Maximum number of microtask drains per synchronous turn; a program that
/// schedules beyond this is reported as a non-terminating microtask loop.
pub const MAX_MICROTASK_DRAINS: u32 = 100_000;
