//! Expression parsing.
//!
//! Pratt-style precedence ladder, low to high: assignment, ternary,
//! nullish-coalescing, logical-or, logical-and, bitwise or/xor/and,
//! equality, comparison (`instanceof`/`in`/`as`/`satisfies`), shift,
//! additive, multiplicative, exponentiation (right-associative), prefix
//! unary, postfix update, call/member/optional-chain, primary.
//!
//! Arrow functions are disambiguated by a speculative scan over the
//! parenthesised parameter list: the construct is accepted only when the
//! matching `)` is followed by `=>` (directly, or through a return-type
//! annotation).

use std::rc::Rc;

use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;
use tsi_scanner::{TokenKind, TokenValue};

use crate::ast::*;
use crate::parser::{PResult, Parser, Recover, identifier_text};

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_assignment_expr()
    }

    pub(crate) fn mk(&mut self, span: Span, kind: ExprKind) -> Expr {
        Expr {
            id: self.next_id(),
            span,
            kind,
        }
    }

    fn span_to_here(&self, start: Span) -> Span {
        let end = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span.end)
            .unwrap_or(start.end);
        Span::new(start.start, end)
    }

    // =========================================================================
    // Assignment level
    // =========================================================================

    pub(crate) fn parse_assignment_expr(&mut self) -> PResult<Expr> {
        self.enter_depth()?;
        let result = self.parse_assignment_inner();
        self.exit_depth();
        result
    }

    fn parse_assignment_inner(&mut self) -> PResult<Expr> {
        let start = self.span();

        // yield binds loosest of all.
        if self.at(TokenKind::Yield) && self.allow_yield() {
            self.advance();
            let delegate = self.eat(TokenKind::Star);
            let value = if self.expression_follows() && !self.peek().newline_before {
                Some(Box::new(self.parse_assignment_expr()?))
            } else {
                None
            };
            let span = self.span_to_here(start);
            return Ok(self.mk(span, ExprKind::Yield { value, delegate }));
        }
        if self.at(TokenKind::Yield) && !self.allow_yield() {
            self.error_here(
                "'yield' is only allowed inside a generator function.".to_string(),
                diagnostic_codes::YIELD_OUTSIDE_GENERATOR,
            );
        }

        // Arrow-function lookahead.
        if let Some(expr) = self.try_parse_arrow()? {
            return Ok(expr);
        }

        let lhs = self.parse_conditional()?;

        let op = match self.kind() {
            TokenKind::Equals => None,
            TokenKind::PlusEquals => Some(BinaryOp::Add),
            TokenKind::MinusEquals => Some(BinaryOp::Sub),
            TokenKind::StarEquals => Some(BinaryOp::Mul),
            TokenKind::SlashEquals => Some(BinaryOp::Div),
            TokenKind::PercentEquals => Some(BinaryOp::Rem),
            TokenKind::StarStarEquals => Some(BinaryOp::Exp),
            TokenKind::LessThanLessThanEquals => Some(BinaryOp::Shl),
            TokenKind::GreaterThanGreaterThanEquals => Some(BinaryOp::Shr),
            TokenKind::GreaterThanGreaterThanGreaterThanEquals => Some(BinaryOp::UShr),
            TokenKind::AmpersandAmpersandEquals
            | TokenKind::BarBarEquals
            | TokenKind::QuestionQuestionEquals => {
                let logical_op = match self.kind() {
                    TokenKind::AmpersandAmpersandEquals => LogicalAssignOp::AndAnd,
                    TokenKind::BarBarEquals => LogicalAssignOp::OrOr,
                    _ => LogicalAssignOp::Nullish,
                };
                self.advance();
                let target = self.to_assign_target(&lhs)?;
                let value = Box::new(self.parse_assignment_expr()?);
                let span = self.span_to_here(start);
                return Ok(self.mk(
                    span,
                    ExprKind::LogicalAssign {
                        target,
                        op: logical_op,
                        value,
                    },
                ));
            }
            _ => return Ok(lhs),
        };

        self.advance();
        let target = self.to_assign_target(&lhs)?;
        let value = Box::new(self.parse_assignment_expr()?);
        let span = self.span_to_here(start);
        Ok(match op {
            None => self.mk(span, ExprKind::Assign { target, value }),
            Some(op) => self.mk(span, ExprKind::CompoundAssign { target, op, value }),
        })
    }

    fn expression_follows(&self) -> bool {
        !matches!(
            self.kind(),
            TokenKind::Semicolon
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::EndOfFile
        )
    }

    pub(crate) fn to_assign_target(&mut self, expr: &Expr) -> PResult<AssignTarget> {
        match &expr.kind {
            ExprKind::Variable(name) => Ok(AssignTarget::Name(name.clone())),
            ExprKind::Get {
                object,
                name,
                optional: false,
            } => Ok(AssignTarget::Property {
                object: object.clone(),
                name: name.clone(),
            }),
            ExprKind::GetIndex {
                object,
                index,
                optional: false,
            } => Ok(AssignTarget::Index {
                object: object.clone(),
                index: index.clone(),
            }),
            ExprKind::PrivateGet { object, name } => Ok(AssignTarget::Private {
                object: object.clone(),
                name: name.clone(),
            }),
            ExprKind::Grouping(inner) => self.to_assign_target(inner),
            ExprKind::NonNull(inner) => self.to_assign_target(inner),
            _ => {
                self.error_at(
                    expr.span,
                    "Invalid assignment target.".to_string(),
                    diagnostic_codes::INVALID_ASSIGNMENT_TARGET,
                );
                Err(Recover)
            }
        }
    }

    // =========================================================================
    // Arrow lookahead
    // =========================================================================

    /// Recognise and parse an arrow function at the current position, or
    /// return None leaving the position untouched.
    fn try_parse_arrow(&mut self) -> PResult<Option<Expr>> {
        let is_async = self.at(TokenKind::Async)
            && !self.peek_ahead(1).newline_before
            && matches!(
                self.peek_ahead(1).kind,
                TokenKind::LeftParen | TokenKind::LessThan
            )
            || (self.at(TokenKind::Async)
                && self.peek_ahead(1).kind.is_identifier_like()
                && self.peek_ahead(2).kind == TokenKind::Arrow);
        let offset = usize::from(is_async);

        // Single identifier arrow: `x => ...`.
        if self.peek_ahead(offset).kind.is_identifier_like()
            && self.peek_ahead(offset).kind != TokenKind::Async
            && self.peek_ahead(offset + 1).kind == TokenKind::Arrow
        {
            let start = self.span();
            if is_async {
                self.advance();
            }
            let name_token = self.advance();
            let param = Param {
                name: identifier_text(&name_token),
                type_ann: None,
                optional: false,
                rest: false,
                default: None,
                modifiers: MemberModifiers::empty(),
                span: name_token.span,
            };
            return Ok(Some(self.parse_arrow_rest(vec![param], Vec::new(), is_async, start)?));
        }

        // Parenthesised parameter list: `(...) => ...`.
        if self.peek_ahead(offset).kind == TokenKind::LeftParen
            && self.paren_list_is_arrow(offset)
        {
            let start = self.span();
            if is_async {
                self.advance();
            }
            let (params, prologue) = self.parse_param_list()?;
            if !prologue.is_empty() {
                return Ok(Some(self.parse_arrow_with_prologue(
                    params, prologue, Vec::new(), is_async, start,
                )?));
            }
            return Ok(Some(self.parse_arrow_rest(params, Vec::new(), is_async, start)?));
        }

        // Generic arrow: `<T>(x: T) => ...`.
        if self.peek_ahead(offset).kind == TokenKind::LessThan {
            if let Some(after_params) = self.scan_matching_angle(offset) {
                if self.peek_ahead(after_params).kind == TokenKind::LeftParen
                    && self.paren_list_is_arrow(after_params)
                {
                    let start = self.span();
                    if is_async {
                        self.advance();
                    }
                    let type_params = self.parse_optional_type_params()?;
                    let (params, prologue) = self.parse_param_list()?;
                    if !prologue.is_empty() {
                        return Ok(Some(self.parse_arrow_with_prologue(
                            params, prologue, type_params, is_async, start,
                        )?));
                    }
                    return Ok(Some(self.parse_arrow_rest(params, type_params, is_async, start)?));
                }
            }
        }

        Ok(None)
    }

    /// Scan a parenthesised list starting at `peek_ahead(offset)` and decide
    /// whether it is an arrow parameter list (cover grammar check).
    fn paren_list_is_arrow(&self, offset: usize) -> bool {
        let mut i = offset;
        debug_assert_eq!(self.peek_ahead(i).kind, TokenKind::LeftParen);
        let mut depth = 0u32;
        loop {
            let kind = self.peek_ahead(i).kind;
            match kind {
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && kind == TokenKind::RightParen {
                        break;
                    }
                }
                TokenKind::EndOfFile => return false,
                _ => {}
            }
            i += 1;
            if i > self.pos + 4096 {
                return false;
            }
        }
        // After the matching `)`: `=>` directly, or a `:` return type with a
        // `=>` before the expression can end.
        match self.peek_ahead(i + 1).kind {
            TokenKind::Arrow => true,
            TokenKind::Colon => {
                let mut j = i + 2;
                let mut angle_depth = 0i32;
                loop {
                    match self.peek_ahead(j).kind {
                        TokenKind::Arrow if angle_depth == 0 => return true,
                        TokenKind::LessThan => angle_depth += 1,
                        TokenKind::GreaterThan => angle_depth -= 1,
                        TokenKind::Semicolon
                        | TokenKind::RightParen
                        | TokenKind::RightBracket
                        | TokenKind::RightBrace
                        | TokenKind::Comma
                        | TokenKind::EndOfFile => return false,
                        _ => {}
                    }
                    j += 1;
                    if j > i + 256 {
                        return false;
                    }
                }
            }
            _ => false,
        }
    }

    /// Find the token index just past a matching `<...>` starting at
    /// `peek_ahead(offset)`, or None if the angles never balance.
    fn scan_matching_angle(&self, offset: usize) -> Option<usize> {
        let mut depth = 0i32;
        let mut i = offset;
        loop {
            match self.peek_ahead(i).kind {
                TokenKind::LessThan => depth += 1,
                TokenKind::GreaterThan => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i + 1);
                    }
                }
                TokenKind::GreaterThanGreaterThan => {
                    depth -= 2;
                    if depth <= 0 {
                        return Some(i + 1);
                    }
                }
                TokenKind::GreaterThanGreaterThanGreaterThan => {
                    depth -= 3;
                    if depth <= 0 {
                        return Some(i + 1);
                    }
                }
                TokenKind::Semicolon | TokenKind::EndOfFile | TokenKind::LeftBrace => return None,
                _ => {}
            }
            i += 1;
            if i > offset + 256 {
                return None;
            }
        }
    }

    fn parse_arrow_rest(
        &mut self,
        params: Vec<Param>,
        type_params: Vec<crate::types_ast::TypeParam>,
        is_async: bool,
        start: Span,
    ) -> PResult<Expr> {
        self.parse_arrow_with_prologue(params, Vec::new(), type_params, is_async, start)
    }

    fn parse_arrow_with_prologue(
        &mut self,
        params: Vec<Param>,
        prologue: Vec<Stmt>,
        type_params: Vec<crate::types_ast::TypeParam>,
        is_async: bool,
        start: Span,
    ) -> PResult<Expr> {
        let return_type = if self.eat(TokenKind::Colon) {
            Some(self.parse_return_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Arrow)?;

        let mut flags = FunctionFlags::ARROW;
        if is_async {
            flags |= FunctionFlags::ASYNC;
        }
        self.fn_context.push((false, is_async));
        let body = if self.at(TokenKind::LeftBrace) {
            let mut stmts_result = self.parse_block();
            if let Ok(stmts) = &mut stmts_result {
                if !prologue.is_empty() {
                    let mut all = prologue;
                    all.append(stmts);
                    *stmts = all;
                }
            }
            stmts_result.map(FunctionBody::Block)
        } else {
            let expr_result = self.parse_assignment_expr();
            match expr_result {
                Ok(expr) if prologue.is_empty() => Ok(FunctionBody::Expr(Box::new(expr))),
                Ok(expr) => {
                    // Destructured params force a block body around the
                    // implicit return.
                    let mut stmts = prologue;
                    let span = expr.span;
                    stmts.push(Stmt {
                        span,
                        kind: StmtKind::Return(Some(expr)),
                    });
                    Ok(FunctionBody::Block(stmts))
                }
                Err(e) => Err(e),
            }
        };
        self.fn_context.pop();
        let body = body?;

        let span = self.span_to_here(start);
        let func = FunctionData {
            name: None,
            params,
            body,
            flags,
            type_params,
            return_type,
            span,
        };
        Ok(self.mk(span, ExprKind::Function(Rc::new(func))))
    }

    // =========================================================================
    // Binary precedence ladder
    // =========================================================================

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let start = self.span();
        let cond = self.parse_nullish()?;
        if self.at(TokenKind::Question) {
            self.advance();
            let then = Box::new(self.parse_assignment_expr()?);
            self.expect(TokenKind::Colon)?;
            let otherwise = Box::new(self.parse_assignment_expr()?);
            let span = self.span_to_here(start);
            return Ok(self.mk(
                span,
                ExprKind::Ternary {
                    cond: Box::new(cond),
                    then,
                    otherwise,
                },
            ));
        }
        Ok(cond)
    }

    fn parse_nullish(&mut self) -> PResult<Expr> {
        let start = self.span();
        let mut left = self.parse_logical_or()?;
        while self.eat(TokenKind::QuestionQuestion) {
            let right = self.parse_logical_or()?;
            let span = self.span_to_here(start);
            left = self.mk(
                span,
                ExprKind::NullishCoalescing {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        let start = self.span();
        let mut left = self.parse_logical_and()?;
        while self.eat(TokenKind::BarBar) {
            let right = self.parse_logical_and()?;
            let span = self.span_to_here(start);
            left = self.mk(
                span,
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        let start = self.span();
        let mut left = self.parse_bit_or()?;
        while self.eat(TokenKind::AmpersandAmpersand) {
            let right = self.parse_bit_or()?;
            let span = self.span_to_here(start);
            left = self.mk(
                span,
                ExprKind::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> PResult<Expr> {
        self.parse_binary_level(0)
    }

    /// Table-driven levels for the plain left-associative binary operators.
    fn parse_binary_level(&mut self, level: usize) -> PResult<Expr> {
        const LEVELS: &[&[(TokenKind, BinaryOp)]] = &[
            &[(TokenKind::Bar, BinaryOp::BitOr)],
            &[(TokenKind::Caret, BinaryOp::BitXor)],
            &[(TokenKind::Ampersand, BinaryOp::BitAnd)],
            &[
                (TokenKind::EqualsEquals, BinaryOp::EqEq),
                (TokenKind::ExclamationEquals, BinaryOp::NotEq),
                (TokenKind::EqualsEqualsEquals, BinaryOp::EqEqEq),
                (TokenKind::ExclamationEqualsEquals, BinaryOp::NotEqEq),
            ],
            &[
                (TokenKind::LessThan, BinaryOp::Lt),
                (TokenKind::LessThanEquals, BinaryOp::LtEq),
                (TokenKind::GreaterThan, BinaryOp::Gt),
                (TokenKind::GreaterThanEquals, BinaryOp::GtEq),
                (TokenKind::In, BinaryOp::In),
                (TokenKind::Instanceof, BinaryOp::Instanceof),
            ],
            &[
                (TokenKind::LessThanLessThan, BinaryOp::Shl),
                (TokenKind::GreaterThanGreaterThan, BinaryOp::Shr),
                (
                    TokenKind::GreaterThanGreaterThanGreaterThan,
                    BinaryOp::UShr,
                ),
            ],
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
        ];

        if level >= LEVELS.len() {
            return self.parse_exponent();
        }

        let start = self.span();
        let mut left = self.parse_binary_level(level + 1)?;
        'outer: loop {
            // `as` / `satisfies` sit at comparison precedence.
            if level == 4 {
                if self.at(TokenKind::As) && !self.peek().newline_before {
                    self.advance();
                    let type_ann = self.parse_type()?;
                    let span = self.span_to_here(start);
                    left = self.mk(
                        span,
                        ExprKind::TypeAssertion {
                            expr: Box::new(left),
                            type_ann,
                        },
                    );
                    continue 'outer;
                }
                if self.at(TokenKind::Satisfies) && !self.peek().newline_before {
                    self.advance();
                    let type_ann = self.parse_type()?;
                    let span = self.span_to_here(start);
                    left = self.mk(
                        span,
                        ExprKind::Satisfies {
                            expr: Box::new(left),
                            type_ann,
                        },
                    );
                    continue 'outer;
                }
            }
            for &(token, op) in LEVELS[level] {
                if self.at(token) {
                    self.advance();
                    let right = self.parse_binary_level(level + 1)?;
                    let span = self.span_to_here(start);
                    left = self.mk(
                        span,
                        ExprKind::Binary {
                            op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                    );
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    /// `**` is right-associative.
    fn parse_exponent(&mut self) -> PResult<Expr> {
        let start = self.span();
        let base = self.parse_unary()?;
        if self.eat(TokenKind::StarStar) {
            let exponent = self.parse_exponent()?;
            let span = self.span_to_here(start);
            return Ok(self.mk(
                span,
                ExprKind::Binary {
                    op: BinaryOp::Exp,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
            ));
        }
        Ok(base)
    }

    // =========================================================================
    // Unary / postfix
    // =========================================================================

    fn parse_unary(&mut self) -> PResult<Expr> {
        self.enter_depth()?;
        let result = self.parse_unary_inner();
        self.exit_depth();
        result
    }

    fn parse_unary_inner(&mut self) -> PResult<Expr> {
        let start = self.span();
        let op = match self.kind() {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Exclamation => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            let span = self.span_to_here(start);
            return Ok(self.mk(span, ExprKind::Unary { op, operand }));
        }

        if self.at(TokenKind::Delete) {
            self.advance();
            let target = Box::new(self.parse_unary()?);
            let span = self.span_to_here(start);
            return Ok(self.mk(span, ExprKind::Delete(target)));
        }

        if self.at(TokenKind::Await) {
            if !self.allow_await() {
                self.error_here(
                    "'await' is only allowed inside an async function.".to_string(),
                    diagnostic_codes::AWAIT_OUTSIDE_ASYNC,
                );
            }
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            let span = self.span_to_here(start);
            return Ok(self.mk(span, ExprKind::Await(operand)));
        }

        if matches!(self.kind(), TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if self.at(TokenKind::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            let operand = self.parse_unary()?;
            let target = self.to_assign_target(&operand)?;
            let span = self.span_to_here(start);
            return Ok(self.mk(
                span,
                ExprKind::Update {
                    op,
                    prefix: true,
                    target,
                },
            ));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let start = self.span();
        let expr = self.parse_call_member(true)?;
        if matches!(self.kind(), TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.peek().newline_before
        {
            let op = if self.at(TokenKind::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            let target = self.to_assign_target(&expr)?;
            let span = self.span_to_here(start);
            return Ok(self.mk(
                span,
                ExprKind::Update {
                    op,
                    prefix: false,
                    target,
                },
            ));
        }
        Ok(expr)
    }

    // =========================================================================
    // Call / member chains
    // =========================================================================

    /// Restricted chain for decorator expressions: name, dots, one call.
    pub(crate) fn parse_call_chain_only(&mut self) -> PResult<Expr> {
        let start = self.span();
        let name = self.expect_identifier()?;
        let mut expr = self.mk(start, ExprKind::Variable(name));
        loop {
            if self.eat(TokenKind::Dot) {
                let member = self.expect_identifier()?;
                let span = self.span_to_here(start);
                expr = self.mk(
                    span,
                    ExprKind::Get {
                        object: Box::new(expr),
                        name: member,
                        optional: false,
                    },
                );
            } else if self.at(TokenKind::LeftParen) {
                let args = self.parse_arguments()?;
                let span = self.span_to_here(start);
                expr = self.mk(
                    span,
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                        type_args: Vec::new(),
                        optional: false,
                    },
                );
                return Ok(expr);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_call_member(&mut self, allow_call: bool) -> PResult<Expr> {
        let start = self.span();
        let mut expr = if self.at(TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    if self.at(TokenKind::PrivateIdentifier) {
                        let token = self.advance();
                        let span = self.span_to_here(start);
                        expr = self.mk(
                            span,
                            ExprKind::PrivateGet {
                                object: Box::new(expr),
                                name: token.text.trim_start_matches('#').to_string(),
                            },
                        );
                    } else {
                        let name = self.expect_identifier()?;
                        let span = self.span_to_here(start);
                        expr = self.mk(
                            span,
                            ExprKind::Get {
                                object: Box::new(expr),
                                name,
                                optional: false,
                            },
                        );
                    }
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    match self.kind() {
                        TokenKind::LeftParen => {
                            let args = self.parse_arguments()?;
                            let span = self.span_to_here(start);
                            expr = self.mk(
                                span,
                                ExprKind::Call {
                                    callee: Box::new(expr),
                                    args,
                                    type_args: Vec::new(),
                                    optional: true,
                                },
                            );
                        }
                        TokenKind::LeftBracket => {
                            self.advance();
                            let index = Box::new(self.parse_expression()?);
                            self.expect(TokenKind::RightBracket)?;
                            let span = self.span_to_here(start);
                            expr = self.mk(
                                span,
                                ExprKind::GetIndex {
                                    object: Box::new(expr),
                                    index,
                                    optional: true,
                                },
                            );
                        }
                        _ => {
                            let name = self.expect_identifier()?;
                            let span = self.span_to_here(start);
                            expr = self.mk(
                                span,
                                ExprKind::Get {
                                    object: Box::new(expr),
                                    name,
                                    optional: true,
                                },
                            );
                        }
                    }
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = Box::new(self.parse_expression()?);
                    self.expect(TokenKind::RightBracket)?;
                    let span = self.span_to_here(start);
                    expr = self.mk(
                        span,
                        ExprKind::GetIndex {
                            object: Box::new(expr),
                            index,
                            optional: false,
                        },
                    );
                }
                TokenKind::LeftParen if allow_call => {
                    let args = self.parse_arguments()?;
                    let span = self.span_to_here(start);
                    expr = self.mk(
                        span,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            type_args: Vec::new(),
                            optional: false,
                        },
                    );
                }
                // Explicit type arguments on a call: `f<T>(x)`.
                TokenKind::LessThan if allow_call => {
                    let Some(after) = self.scan_matching_angle(0) else {
                        return Ok(expr);
                    };
                    if self.peek_ahead(after).kind != TokenKind::LeftParen {
                        return Ok(expr);
                    }
                    let type_args = self.parse_type_argument_list()?;
                    let args = self.parse_arguments()?;
                    let span = self.span_to_here(start);
                    expr = self.mk(
                        span,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            type_args,
                            optional: false,
                        },
                    );
                }
                // Tagged template literal.
                TokenKind::NoSubstitutionTemplate | TokenKind::TemplateHead => {
                    let (quasis, exprs) = self.parse_template_parts()?;
                    let span = self.span_to_here(start);
                    expr = self.mk(
                        span,
                        ExprKind::TaggedTemplate {
                            tag: Box::new(expr),
                            quasis,
                            exprs,
                        },
                    );
                }
                // Non-null assertion: postfix `!` not followed by `=`.
                TokenKind::Exclamation if !self.peek().newline_before => {
                    self.advance();
                    let span = self.span_to_here(start);
                    expr = self.mk(span, ExprKind::NonNull(Box::new(expr)));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_new(&mut self) -> PResult<Expr> {
        let start = self.span();
        self.advance();
        // `new.target` is not part of the supported subset; `import.meta`
        // handles its own dot.
        let mut callee = self.parse_primary()?;
        // Member accesses bind tighter than the `new` arguments.
        loop {
            if self.eat(TokenKind::Dot) {
                let name = self.expect_identifier()?;
                let span = self.span_to_here(start);
                callee = self.mk(
                    span,
                    ExprKind::Get {
                        object: Box::new(callee),
                        name,
                        optional: false,
                    },
                );
            } else if self.at(TokenKind::LeftBracket) {
                self.advance();
                let index = Box::new(self.parse_expression()?);
                self.expect(TokenKind::RightBracket)?;
                let span = self.span_to_here(start);
                callee = self.mk(
                    span,
                    ExprKind::GetIndex {
                        object: Box::new(callee),
                        index,
                        optional: false,
                    },
                );
            } else {
                break;
            }
        }
        let type_args = if self.at(TokenKind::LessThan) {
            match self.scan_matching_angle(0) {
                Some(after) if self.peek_ahead(after).kind == TokenKind::LeftParen => {
                    self.parse_type_argument_list()?
                }
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };
        let args = if self.at(TokenKind::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let span = self.span_to_here(start);
        Ok(self.mk(
            span,
            ExprKind::New {
                callee: Box::new(callee),
                args,
                type_args,
            },
        ))
    }

    pub(crate) fn parse_arguments(&mut self) -> PResult<Vec<Argument>> {
        self.expect(TokenKind::LeftParen)?;
        let mut args = Vec::new();
        while !self.at(TokenKind::RightParen) && !self.at(TokenKind::EndOfFile) {
            let spread = self.eat(TokenKind::DotDotDot);
            let expr = self.parse_assignment_expr()?;
            args.push(Argument { spread, expr });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(args)
    }

    // =========================================================================
    // Primary expressions
    // =========================================================================

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.span();
        match self.kind() {
            TokenKind::NumericLiteral => {
                let token = self.advance();
                let value = token.number_value().unwrap_or(f64::NAN);
                Ok(self.mk(start, ExprKind::Literal(Lit::Number(value))))
            }
            TokenKind::BigIntLiteral => {
                let token = self.advance();
                let value = match token.value {
                    TokenValue::BigInt(v) => v,
                    _ => num_bigint::BigInt::from(0),
                };
                Ok(self.mk(start, ExprKind::Literal(Lit::BigInt(value))))
            }
            TokenKind::StringLiteral => {
                let token = self.advance();
                let value = token.string_value().unwrap_or_default().to_string();
                Ok(self.mk(start, ExprKind::Literal(Lit::String(value))))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.mk(start, ExprKind::Literal(Lit::Boolean(true))))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.mk(start, ExprKind::Literal(Lit::Boolean(false))))
            }
            TokenKind::Null => {
                self.advance();
                Ok(self.mk(start, ExprKind::Literal(Lit::Null)))
            }
            TokenKind::RegexLiteral => {
                let token = self.advance();
                let (pattern, flags) = match token.value {
                    TokenValue::Regex { pattern, flags } => (pattern, flags),
                    _ => (String::new(), String::new()),
                };
                Ok(self.mk(start, ExprKind::RegexLiteral { pattern, flags }))
            }
            TokenKind::This => {
                self.advance();
                Ok(self.mk(start, ExprKind::This))
            }
            TokenKind::Super => {
                self.advance();
                if self.eat(TokenKind::Dot) {
                    let method = self.expect_identifier()?;
                    let span = self.span_to_here(start);
                    Ok(self.mk(
                        span,
                        ExprKind::Super {
                            method: Some(method),
                        },
                    ))
                } else {
                    Ok(self.mk(start, ExprKind::Super { method: None }))
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParen)?;
                let span = self.span_to_here(start);
                Ok(self.mk(span, ExprKind::Grouping(Box::new(inner))))
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            TokenKind::NoSubstitutionTemplate | TokenKind::TemplateHead => {
                let (quasis, exprs) = self.parse_template_parts()?;
                let span = self.span_to_here(start);
                Ok(self.mk(span, ExprKind::TemplateLiteral { quasis, exprs }))
            }
            TokenKind::Function => {
                let func = self.parse_function(false, false)?;
                let span = self.span_to_here(start);
                Ok(self.mk(span, ExprKind::Function(Rc::new(func))))
            }
            TokenKind::Async
                if self.peek_ahead(1).kind == TokenKind::Function
                    && !self.peek_ahead(1).newline_before =>
            {
                self.advance();
                let func = self.parse_function(true, false)?;
                let span = self.span_to_here(start);
                Ok(self.mk(span, ExprKind::Function(Rc::new(func))))
            }
            TokenKind::Class => {
                let class = self.parse_class(Vec::new())?;
                let span = self.span_to_here(start);
                Ok(self.mk(span, ExprKind::ClassExpr(Rc::new(class))))
            }
            TokenKind::Import => {
                self.advance();
                if self.eat(TokenKind::Dot) {
                    self.expect_contextual("meta")?;
                    let span = self.span_to_here(start);
                    return Ok(self.mk(span, ExprKind::ImportMeta));
                }
                self.expect(TokenKind::LeftParen)?;
                let path = Box::new(self.parse_assignment_expr()?);
                self.expect(TokenKind::RightParen)?;
                let span = self.span_to_here(start);
                Ok(self.mk(span, ExprKind::DynamicImport(path)))
            }
            // Old-style type assertion `<T>expr` (arrow lookahead has
            // already rejected a generic arrow here).
            TokenKind::LessThan => {
                self.advance();
                let type_ann = self.parse_type()?;
                if !self.split_greater_than() {
                    self.error_here(
                        "Expected '>' to close type assertion.".to_string(),
                        diagnostic_codes::EXPECTED_TOKEN,
                    );
                    return Err(Recover);
                }
                let expr = Box::new(self.parse_unary()?);
                let span = self.span_to_here(start);
                Ok(self.mk(span, ExprKind::TypeAssertion { expr, type_ann }))
            }
            kind if kind.is_identifier_like() => {
                let token = self.advance();
                Ok(self.mk(start, ExprKind::Variable(identifier_text(&token))))
            }
            _ => {
                self.error_here(
                    format!("Expected expression but found '{}'.", self.describe_current()),
                    diagnostic_codes::EXPECTED_EXPRESSION,
                );
                Err(Recover)
            }
        }
    }

    fn parse_template_parts(&mut self) -> PResult<(Vec<TemplateElement>, Vec<Expr>)> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let head = self.advance();
        let (cooked, raw) = template_value(&head);
        quasis.push(TemplateElement { cooked, raw });
        if head.kind == TokenKind::NoSubstitutionTemplate {
            return Ok((quasis, exprs));
        }
        loop {
            exprs.push(self.parse_expression()?);
            match self.kind() {
                TokenKind::TemplateMiddle => {
                    let token = self.advance();
                    let (cooked, raw) = template_value(&token);
                    quasis.push(TemplateElement { cooked, raw });
                }
                TokenKind::TemplateTail => {
                    let token = self.advance();
                    let (cooked, raw) = template_value(&token);
                    quasis.push(TemplateElement { cooked, raw });
                    return Ok((quasis, exprs));
                }
                _ => {
                    self.error_here(
                        "Unterminated template literal.".to_string(),
                        diagnostic_codes::UNEXPECTED_TOKEN,
                    );
                    return Err(Recover);
                }
            }
        }
    }

    fn parse_array_literal(&mut self) -> PResult<Expr> {
        let start = self.span();
        self.advance();
        let mut elements = Vec::new();
        while !self.at(TokenKind::RightBracket) && !self.at(TokenKind::EndOfFile) {
            if self.at(TokenKind::Comma) {
                // Elision: a hole reads as undefined.
                let span = self.span();
                self.advance();
                let hole = self.mk(span, ExprKind::Literal(Lit::Undefined));
                elements.push(ArrayElement {
                    spread: false,
                    expr: hole,
                });
                continue;
            }
            let spread = self.eat(TokenKind::DotDotDot);
            let expr = self.parse_assignment_expr()?;
            elements.push(ArrayElement { spread, expr });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBracket)?;
        let span = self.span_to_here(start);
        Ok(self.mk(span, ExprKind::ArrayLiteral(elements)))
    }

    fn parse_object_literal(&mut self) -> PResult<Expr> {
        let start = self.span();
        self.advance();
        let mut properties = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at(TokenKind::EndOfFile) {
            properties.push(self.parse_object_property()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace)?;
        let span = self.span_to_here(start);
        Ok(self.mk(span, ExprKind::ObjectLiteral(properties)))
    }

    fn parse_object_property(&mut self) -> PResult<ObjectProperty> {
        let start = self.span();
        if self.eat(TokenKind::DotDotDot) {
            let expr = self.parse_assignment_expr()?;
            return Ok(ObjectProperty::Spread(expr));
        }

        // Getter/setter: `get key() {}` / `set key(v) {}`.
        let accessor = match self.kind() {
            TokenKind::Get | TokenKind::Set
                if self.property_key_follows(1) =>
            {
                Some(self.advance().kind)
            }
            _ => None,
        };
        if let Some(kind) = accessor {
            let key = self.parse_property_key()?;
            let func = self.parse_method_tail(false, false, start)?;
            return Ok(if kind == TokenKind::Get {
                ObjectProperty::Getter {
                    key,
                    func: Rc::new(func),
                }
            } else {
                ObjectProperty::Setter {
                    key,
                    func: Rc::new(func),
                }
            });
        }

        let is_async = self.at(TokenKind::Async)
            && !self.peek_ahead(1).newline_before
            && (self.property_key_follows(1) || self.peek_ahead(1).kind == TokenKind::Star);
        if is_async {
            self.advance();
        }
        let is_generator = self.eat(TokenKind::Star);

        let key = self.parse_property_key()?;

        // Method shorthand.
        if self.at(TokenKind::LeftParen) || self.at(TokenKind::LessThan) {
            let func = self.parse_method_tail(is_async, is_generator, start)?;
            return Ok(ObjectProperty::Method {
                key,
                func: Rc::new(func),
            });
        }

        if is_async || is_generator {
            self.error_here(
                "Expected method body after async/generator property name.".to_string(),
                diagnostic_codes::UNEXPECTED_TOKEN,
            );
            return Err(Recover);
        }

        if self.eat(TokenKind::Colon) {
            let value = self.parse_assignment_expr()?;
            return Ok(ObjectProperty::KeyValue { key, value });
        }

        // Shorthand `{ a }`.
        match key {
            PropertyKey::Ident(name) => {
                let id = self.next_id();
                Ok(ObjectProperty::Shorthand {
                    name,
                    id,
                    span: start,
                })
            }
            _ => {
                self.error_here(
                    "Expected ':' after property name.".to_string(),
                    diagnostic_codes::EXPECTED_TOKEN,
                );
                Err(Recover)
            }
        }
    }

    /// Whether the token at `offset` looks like a property key (so `get`/
    /// `set`/`async` in key position are treated as modifiers, not keys).
    pub(crate) fn property_key_follows(&self, offset: usize) -> bool {
        let kind = self.peek_ahead(offset).kind;
        kind.is_identifier_like()
            || matches!(
                kind,
                TokenKind::StringLiteral
                    | TokenKind::NumericLiteral
                    | TokenKind::LeftBracket
                    | TokenKind::PrivateIdentifier
            )
    }

    pub(crate) fn parse_property_key(&mut self) -> PResult<PropertyKey> {
        match self.kind() {
            TokenKind::StringLiteral => {
                let token = self.advance();
                Ok(PropertyKey::String(
                    token.string_value().unwrap_or_default().to_string(),
                ))
            }
            TokenKind::NumericLiteral => {
                let token = self.advance();
                Ok(PropertyKey::Number(token.number_value().unwrap_or(f64::NAN)))
            }
            TokenKind::PrivateIdentifier => {
                let token = self.advance();
                Ok(PropertyKey::Private(
                    token.text.trim_start_matches('#').to_string(),
                ))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let expr = self.parse_assignment_expr()?;
                self.expect(TokenKind::RightBracket)?;
                Ok(PropertyKey::Computed(Box::new(expr)))
            }
            kind if kind.is_identifier_like() => {
                let token = self.advance();
                Ok(PropertyKey::Ident(identifier_text(&token)))
            }
            _ => {
                self.error_here(
                    format!("Expected property name but found '{}'.", self.describe_current()),
                    diagnostic_codes::EXPECTED_IDENTIFIER,
                );
                Err(Recover)
            }
        }
    }

    /// Parse `(params) [: type] { body }` for methods and accessors.
    pub(crate) fn parse_method_tail(
        &mut self,
        is_async: bool,
        is_generator: bool,
        start: Span,
    ) -> PResult<FunctionData> {
        let type_params = self.parse_optional_type_params()?;
        let mut flags = FunctionFlags::empty();
        if is_async {
            flags |= FunctionFlags::ASYNC;
        }
        if is_generator {
            flags |= FunctionFlags::GENERATOR;
        }
        self.fn_context.push((is_generator, is_async));
        let result = self.parse_function_rest(None, type_params, flags, start);
        self.fn_context.pop();
        result
    }
}

fn template_value(token: &tsi_scanner::Token) -> (String, String) {
    match &token.value {
        TokenValue::Template { cooked, raw } => (cooked.clone(), raw.clone()),
        _ => (String::new(), String::new()),
    }
}
