//! AST and parser for the tsi TypeScript-subset engine.
//!
//! This crate provides:
//! - `ast` - the immutable expression/statement tree shared by the checker
//!   and the interpreter
//! - `types_ast` - the parallel type-annotation vocabulary (consumed only
//!   by the checker; never influences runtime semantics)
//! - `Parser` - recursive descent with Pratt-style expression precedence,
//!   automatic semicolon insertion, `for`-to-`while` and destructuring
//!   desugaring, and panic recovery at statement boundaries
//! - `printer` - canonical source printer used by round-trip tests

pub mod ast;
pub mod types_ast;

mod desugar;
mod parser;
pub mod printer;

pub use parser::{ParseResult, Parser};
