//! Common types and utilities for the tsi TypeScript-subset engine.
//!
//! This crate provides foundational types used across all tsi crates:
//! - Source spans (`Span`, `Spanned`, `SpanBuilder`)
//! - Position/Range types for line/column source locations
//! - Diagnostic records shared by every phase
//! - Engine options (`EngineOptions`, `DecoratorMode`)
//! - Numeric literal parsing and canonical number formatting
//! - Engine limits and thresholds

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::{Span, SpanBuilder, Spanned};

// Position/Range types for line/column source locations
pub mod position;
pub use position::{LineMap, Position};

// Diagnostics shared by lexer, parser, checker, resolver and runtime
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, diagnostic_codes};

// Engine configuration
pub mod options;
pub use options::{DecoratorMode, EngineOptions};

// Module specifier arithmetic (pure path math, no filesystem)
pub mod modpath;

// Numeric literal parsing and ECMAScript number formatting
pub mod numeric;

// Centralized limits and thresholds
pub mod limits;
