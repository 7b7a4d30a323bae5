//! Runtime error construction.
//!
//! Errors observable by user code are ordinary instances of the Error
//! classes, raised as Throw completions. Host-side failures (stack
//! overflow, internal bugs) surface as a non-recoverable `EngineFault`.

use std::fmt;

use tsi_common::span::Span;

/// The built-in error class taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }
}

/// One frame of a captured stack: function name and source position.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function: String,
    pub span: Span,
}

/// Non-user-recoverable failure: implementation bug, stack exhaustion,
/// allocation failure. Unlike thrown values these abort evaluation.
#[derive(Debug, Clone)]
pub enum EngineFault {
    StackOverflow,
    MicrotaskRunaway,
    Internal(String),
}

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineFault::StackOverflow => write!(f, "call stack exhausted"),
            EngineFault::MicrotaskRunaway => write!(f, "microtask queue failed to drain"),
            EngineFault::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for EngineFault {}
