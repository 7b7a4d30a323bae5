//! Diagnostic types shared by every engine phase.
//!
//! The lexer, parser, checker and module resolver all report problems as
//! `Diagnostic` records; a non-empty error set collected before execution
//! prevents the interpreter from running. Runtime throws are not
//! diagnostics — they travel as thrown values — but an unhandled throw is
//! rendered through the same record so hosts see one shape.

use serde::Serialize;

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Message = 2,
}

/// Related information for a diagnostic (e.g., "declared here" locations).
#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticRelatedInformation {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
}

/// A diagnostic message with optional related information.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    /// Related spans (e.g., where the conflicting declaration lives)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub const fn error(file: String, start: u32, length: u32, message: String, code: u32) -> Self {
        Self {
            file,
            start,
            length,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
            related_information: Vec::new(),
        }
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, file: String, start: u32, length: u32, message: String) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            file,
            start,
            length,
            message_text: message,
        });
        self
    }

    /// Whether this diagnostic is an error (as opposed to warning/message).
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

// =============================================================================
// Diagnostic codes
// =============================================================================

/// Stable numeric codes, grouped by phase:
/// 1xxx lex, 2xxx parse, 3xxx type-check, 4xxx module resolution,
/// 5xxx runtime reporting, 9xxx engine faults.
pub mod diagnostic_codes {
    // --- Lexer (1xxx) ---
    pub const UNEXPECTED_CHARACTER: u32 = 1001;
    pub const UNTERMINATED_STRING_LITERAL: u32 = 1002;
    pub const UNTERMINATED_TEMPLATE_LITERAL: u32 = 1003;
    pub const UNTERMINATED_COMMENT: u32 = 1004;
    pub const UNTERMINATED_REGEX_LITERAL: u32 = 1005;
    pub const INVALID_NUMERIC_LITERAL: u32 = 1006;
    pub const INVALID_ESCAPE_SEQUENCE: u32 = 1007;
    pub const OCTAL_ESCAPE_IN_STRICT_MODE: u32 = 1008;

    // --- Parser (2xxx) ---
    pub const UNEXPECTED_TOKEN: u32 = 2001;
    pub const EXPECTED_TOKEN: u32 = 2002;
    pub const EXPECTED_EXPRESSION: u32 = 2003;
    pub const EXPECTED_IDENTIFIER: u32 = 2004;
    pub const INVALID_ASSIGNMENT_TARGET: u32 = 2005;
    pub const DECORATORS_NOT_ENABLED: u32 = 2006;
    pub const SUPER_OUTSIDE_CLASS: u32 = 2007;
    pub const DUPLICATE_LABEL: u32 = 2008;
    pub const ILLEGAL_BREAK_OR_CONTINUE: u32 = 2009;
    pub const INVALID_DESTRUCTURING_TARGET: u32 = 2010;
    pub const REST_MUST_BE_LAST: u32 = 2011;
    pub const YIELD_OUTSIDE_GENERATOR: u32 = 2012;
    pub const AWAIT_OUTSIDE_ASYNC: u32 = 2013;
    pub const PARSE_DEPTH_EXCEEDED: u32 = 2014;

    // --- Type checker (3xxx) ---
    pub const NOT_IN_SCOPE: u32 = 3001;
    pub const TYPE_NOT_ASSIGNABLE: u32 = 3002;
    pub const PROPERTY_DOES_NOT_EXIST: u32 = 3003;
    pub const EXCESS_PROPERTY: u32 = 3004;
    pub const NOT_CALLABLE: u32 = 3005;
    pub const ARGUMENT_COUNT_MISMATCH: u32 = 3006;
    pub const ARGUMENT_NOT_ASSIGNABLE: u32 = 3007;
    pub const NO_OVERLOAD_MATCHES: u32 = 3008;
    pub const CANNOT_ASSIGN_TO_CONST: u32 = 3009;
    pub const DUPLICATE_DECLARATION: u32 = 3010;
    pub const UNKNOWN_TYPE_NAME: u32 = 3011;
    pub const WRONG_TYPE_ARGUMENT_COUNT: u32 = 3012;
    pub const ABSTRACT_MEMBER_NOT_IMPLEMENTED: u32 = 3013;
    pub const INVALID_OVERRIDE: u32 = 3014;
    pub const OVERRIDE_MISSING_BASE: u32 = 3015;
    pub const OVERRIDE_KEYWORD_REQUIRED: u32 = 3016;
    pub const CANNOT_INSTANTIATE_ABSTRACT: u32 = 3017;
    pub const IMPLICIT_ANY: u32 = 3018;
    pub const OPERATOR_TYPE_MISMATCH: u32 = 3019;
    pub const NOT_ITERABLE: u32 = 3020;
    pub const POSSIBLY_NULL_OR_UNDEFINED: u32 = 3021;
    pub const SUPER_CALL_REQUIRED_BEFORE_THIS: u32 = 3022;
    pub const UNKNOWN_TYPE_SYNTAX: u32 = 3023;
    pub const CONST_ENUM_MEMBER_NOT_CONSTANT: u32 = 3024;
    pub const PRIVATE_MEMBER_ACCESS: u32 = 3025;

    // --- Module resolution (4xxx) ---
    pub const MODULE_NOT_FOUND: u32 = 4001;
    pub const CIRCULAR_IMPORT: u32 = 4002;
    pub const EXPORT_NOT_FOUND: u32 = 4003;

    // --- Runtime reporting (5xxx) ---
    pub const UNHANDLED_THROW: u32 = 5001;

    // --- Engine faults (9xxx) ---
    pub const STACK_OVERFLOW: u32 = 9001;
    pub const INTERNAL_ERROR: u32 = 9002;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_replaces_placeholders() {
        assert_eq!(
            format_message("Type '{0}' is not assignable to type '{1}'.", &["A", "B"]),
            "Type 'A' is not assignable to type 'B'."
        );
    }

    #[test]
    fn related_information_is_appended() {
        let d = Diagnostic::error("a.ts".into(), 0, 1, "dup".into(), 3010).with_related(
            "a.ts".into(),
            10,
            1,
            "first declared here".into(),
        );
        assert_eq!(d.related_information.len(), 1);
        assert!(d.is_error());
    }
}
