//! Recursive-descent parser.
//!
//! Statements are parsed here; expression precedence lives in `exprs`,
//! type syntax in `types`, and pattern lowering in the crate-level
//! `desugar` module. The parser owns panic recovery: a failed production
//! records a diagnostic and unwinds (via `Recover`) to the nearest
//! statement boundary, where scanning resynchronises on `;`, `}` or EOF so
//! one run can report multiple errors.

mod classes;
mod exprs;
mod stmts;
mod types;

use tsi_common::diagnostics::{Diagnostic, diagnostic_codes};
use tsi_common::limits::MAX_PARSE_DEPTH;
use tsi_common::options::DecoratorMode;
use tsi_common::span::Span;
use tsi_scanner::{Scanner, Token, TokenKind, TokenValue};

use crate::ast::{NodeId, Program, Stmt, StmtKind};

/// Marker for a production that already reported its diagnostic and wants
/// statement-boundary recovery.
pub(crate) struct Recover;

pub(crate) type PResult<T> = Result<T, Recover>;

/// Result of parsing one source file.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Whether any error-category diagnostic was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Recursive-descent parser over the scanner's token sequence.
pub struct Parser {
    pub(crate) file_name: String,
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) decorator_mode: DecoratorMode,
    next_node_id: u32,
    depth: u32,
    /// (allow_yield, allow_await) for the enclosing function-like scope.
    pub(crate) fn_context: Vec<(bool, bool)>,
    /// Labels in scope, innermost last.
    pub(crate) labels: Vec<String>,
    /// Nesting depth of constructs that accept unlabeled break/continue.
    pub(crate) loop_depth: u32,
    /// Nesting depth of switch statements (unlabeled break only).
    pub(crate) switch_depth: u32,
    /// Counter for desugaring temporaries.
    pub(crate) temp_counter: u32,
}

impl Parser {
    /// Build a parser for one source file. Scanner diagnostics carry over.
    pub fn new(file_name: impl Into<String>, source: &str) -> Self {
        let file_name = file_name.into();
        let (tokens, diagnostics) = Scanner::new(file_name.clone(), source).scan();
        Parser {
            file_name,
            tokens,
            pos: 0,
            diagnostics,
            decorator_mode: DecoratorMode::None,
            next_node_id: 0,
            depth: 0,
            fn_context: vec![(false, true)],
            labels: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
            temp_counter: 0,
        }
    }

    /// Gate decorator syntax.
    #[must_use]
    pub fn with_decorator_mode(mut self, mode: DecoratorMode) -> Self {
        self.decorator_mode = mode;
        self
    }

    /// Parse the whole token stream into a program.
    pub fn parse_program(mut self) -> ParseResult {
        let mut statements = Vec::new();
        while !self.at(TokenKind::EndOfFile) {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(Recover) => self.synchronize(),
            }
        }
        ParseResult {
            program: Program {
                file_name: self.file_name,
                statements,
                node_count: self.next_node_id,
            },
            diagnostics: self.diagnostics,
        }
    }

    // =========================================================================
    // Token access
    // =========================================================================

    pub(crate) fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| &self.tokens[self.tokens.len() - 1])
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .unwrap_or_else(|| &self.tokens[self.tokens.len() - 1])
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            self.error_here(
                format!(
                    "Expected '{}' but found '{}'.",
                    kind.display_name(),
                    self.describe_current()
                ),
                diagnostic_codes::EXPECTED_TOKEN,
            );
            Err(Recover)
        }
    }

    /// Expect an identifier with a specific spelling (e.g. `from`).
    pub(crate) fn expect_contextual(&mut self, text: &str) -> PResult<()> {
        if self.kind().is_identifier_like() && self.peek().text == text {
            self.advance();
            Ok(())
        } else {
            self.error_here(
                format!("Expected '{}' but found '{}'.", text, self.describe_current()),
                diagnostic_codes::EXPECTED_TOKEN,
            );
            Err(Recover)
        }
    }

    /// Expect an identifier (or contextual keyword usable as one).
    pub(crate) fn expect_identifier(&mut self) -> PResult<String> {
        if self.kind().is_identifier_like() {
            let token = self.advance();
            Ok(identifier_text(&token))
        } else {
            self.error_here(
                format!("Expected identifier but found '{}'.", self.describe_current()),
                diagnostic_codes::EXPECTED_IDENTIFIER,
            );
            Err(Recover)
        }
    }

    pub(crate) fn describe_current(&self) -> String {
        let token = self.peek();
        if token.text.is_empty() {
            token.kind.display_name().to_string()
        } else {
            token.text.clone()
        }
    }

    // =========================================================================
    // Diagnostics and recovery
    // =========================================================================

    pub(crate) fn error_here(&mut self, message: String, code: u32) {
        let span = self.span();
        self.error_at(span, message, code);
    }

    pub(crate) fn error_at(&mut self, span: Span, message: String, code: u32) {
        self.diagnostics.push(Diagnostic::error(
            self.file_name.clone(),
            span.start,
            span.len(),
            message,
            code,
        ));
    }

    /// Skip to the next statement boundary: past a `;`, or stopping before
    /// a `}` / EOF / token that can begin a statement.
    pub(crate) fn synchronize(&mut self) {
        loop {
            match self.kind() {
                TokenKind::EndOfFile | TokenKind::RightBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Class
                | TokenKind::Function
                | TokenKind::Const
                | TokenKind::Let
                | TokenKind::Var
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Switch
                | TokenKind::Try
                | TokenKind::Throw
                | TokenKind::Import
                | TokenKind::Export
                | TokenKind::Interface
                | TokenKind::Enum => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Automatic semicolon insertion: a real `;`, or a `}` / EOF / line
    /// break before the next token.
    pub(crate) fn expect_semicolon(&mut self) {
        if self.eat(TokenKind::Semicolon) {
            return;
        }
        let token = self.peek();
        if matches!(token.kind, TokenKind::RightBrace | TokenKind::EndOfFile)
            || token.newline_before
        {
            return;
        }
        self.error_here(
            format!("Expected ';' but found '{}'.", self.describe_current()),
            diagnostic_codes::EXPECTED_TOKEN,
        );
        // Recoverable: skip the offending token so loops make progress.
        self.advance();
    }

    pub(crate) fn enter_depth(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            self.error_here(
                "Expression nesting too deep.".to_string(),
                diagnostic_codes::PARSE_DEPTH_EXCEEDED,
            );
            return Err(Recover);
        }
        Ok(())
    }

    pub(crate) fn exit_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub(crate) fn fresh_temp(&mut self, prefix: &str) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        // `%` cannot start an identifier, so lowering temporaries can never
        // collide with user bindings.
        format!("%{prefix}{n}")
    }

    pub(crate) fn allow_yield(&self) -> bool {
        self.fn_context.last().map(|c| c.0).unwrap_or(false)
    }

    pub(crate) fn allow_await(&self) -> bool {
        self.fn_context.last().map(|c| c.1).unwrap_or(false)
    }

    /// Split a composite `>`-leading token so type-argument lists can close
    /// inside shift/comparison tokens (`Array<Array<T>>`).
    pub(crate) fn split_greater_than(&mut self) -> bool {
        use TokenKind::*;
        let token = self.peek().clone();
        let rest: Option<(TokenKind, u32)> = match token.kind {
            GreaterThan => {
                self.advance();
                return true;
            }
            GreaterThanGreaterThan => Some((GreaterThan, 1)),
            GreaterThanGreaterThanGreaterThan => Some((GreaterThanGreaterThan, 1)),
            GreaterThanEquals => Some((Equals, 1)),
            GreaterThanGreaterThanEquals => Some((GreaterThanEquals, 1)),
            GreaterThanGreaterThanGreaterThanEquals => Some((GreaterThanGreaterThanEquals, 1)),
            _ => None,
        };
        if let Some((remainder, consumed)) = rest {
            let new_span = Span::new(token.span.start + consumed, token.span.end);
            self.tokens[self.pos] = Token {
                kind: remainder,
                span: new_span,
                value: TokenValue::None,
                text: String::new(),
                newline_before: false,
            };
            true
        } else {
            false
        }
    }

    /// Wrap loose statements in a block when a single statement is required.
    pub(crate) fn into_block(stmt: Stmt) -> Vec<Stmt> {
        match stmt.kind {
            StmtKind::Block(stmts) => stmts,
            _ => vec![stmt],
        }
    }
}

/// The identifier spelling of an identifier-like token.
pub(crate) fn identifier_text(token: &Token) -> String {
    if token.text.is_empty() {
        token.kind.display_name().to_string()
    } else {
        token.text.clone()
    }
}
