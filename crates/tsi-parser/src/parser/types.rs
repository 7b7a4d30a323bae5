//! Type-annotation parsing.
//!
//! Produces the parallel `TypeNode` vocabulary. Unrecognised syntax is
//! captured as `TypeNodeKind::Unknown` carrying the offending text so the
//! checker can diagnose it with a proper span instead of the parser
//! aborting the statement.

use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;
use tsi_scanner::TokenKind;

use crate::ast::Lit;
use crate::parser::{PResult, Parser, Recover, identifier_text};
use crate::types_ast::*;

impl Parser {
    // =========================================================================
    // Entry points
    // =========================================================================

    pub(crate) fn parse_type(&mut self) -> PResult<TypeNode> {
        self.enter_depth()?;
        let result = self.parse_conditional_type();
        self.exit_depth();
        result
    }

    /// Return-type position also accepts type predicates (`x is T`).
    pub(crate) fn parse_return_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        if self.kind().is_identifier_like() && self.peek_ahead(1).kind == TokenKind::Is {
            let param = self.expect_identifier()?;
            self.expect(TokenKind::Is)?;
            let type_ann = self.parse_type()?;
            let span = self.type_span(start);
            return Ok(TypeNode::new(
                span,
                TypeNodeKind::Predicate {
                    param,
                    type_ann: Box::new(type_ann),
                },
            ));
        }
        self.parse_type()
    }

    /// `<T extends U = D, ...>` if present.
    pub(crate) fn parse_optional_type_params(&mut self) -> PResult<Vec<TypeParam>> {
        if !self.at(TokenKind::LessThan) {
            return Ok(Vec::new());
        }
        self.advance();
        let mut params = Vec::new();
        loop {
            let start = self.span();
            let name = self.expect_identifier()?;
            let constraint = if self.eat(TokenKind::Extends) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.eat(TokenKind::Equals) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(TypeParam {
                name,
                constraint,
                default,
                span: start,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if !self.split_greater_than() {
            self.error_here(
                "Expected '>' to close type parameter list.".to_string(),
                diagnostic_codes::EXPECTED_TOKEN,
            );
            return Err(Recover);
        }
        Ok(params)
    }

    /// `<T, U>` argument list (caller has verified the `<`).
    pub(crate) fn parse_type_argument_list(&mut self) -> PResult<Vec<TypeNode>> {
        self.expect(TokenKind::LessThan)?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if !self.split_greater_than() {
            self.error_here(
                "Expected '>' to close type argument list.".to_string(),
                diagnostic_codes::EXPECTED_TOKEN,
            );
            return Err(Recover);
        }
        Ok(args)
    }

    /// A bare (possibly qualified, possibly generic) type reference, as in
    /// `extends`/`implements` clauses.
    pub(crate) fn parse_type_reference(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        let mut name = self.expect_identifier()?;
        while self.eat(TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        let type_args = if self.at(TokenKind::LessThan) {
            self.parse_type_argument_list()?
        } else {
            Vec::new()
        };
        let span = self.type_span(start);
        Ok(TypeNode::new(span, TypeNodeKind::Ref { name, type_args }))
    }

    fn type_span(&self, start: Span) -> Span {
        let end = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span.end)
            .unwrap_or(start.end);
        Span::new(start.start, end)
    }

    // =========================================================================
    // Ladder
    // =========================================================================

    /// `C extends E ? T : F` or a plain union type.
    fn parse_conditional_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        let check = self.parse_union_type()?;
        if self.at(TokenKind::Extends) {
            self.advance();
            let extends = self.parse_union_type()?;
            self.expect(TokenKind::Question)?;
            let true_type = self.parse_type()?;
            self.expect(TokenKind::Colon)?;
            let false_type = self.parse_type()?;
            let span = self.type_span(start);
            return Ok(TypeNode::new(
                span,
                TypeNodeKind::Conditional {
                    check: Box::new(check),
                    extends: Box::new(extends),
                    true_type: Box::new(true_type),
                    false_type: Box::new(false_type),
                },
            ));
        }
        Ok(check)
    }

    fn parse_union_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        self.eat(TokenKind::Bar);
        let first = self.parse_intersection_type()?;
        if !self.at(TokenKind::Bar) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.eat(TokenKind::Bar) {
            members.push(self.parse_intersection_type()?);
        }
        let span = self.type_span(start);
        Ok(TypeNode::new(span, TypeNodeKind::Union(members)))
    }

    fn parse_intersection_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        self.eat(TokenKind::Ampersand);
        let first = self.parse_postfix_type()?;
        if !self.at(TokenKind::Ampersand) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.eat(TokenKind::Ampersand) {
            members.push(self.parse_postfix_type()?);
        }
        let span = self.type_span(start);
        Ok(TypeNode::new(span, TypeNodeKind::Intersection(members)))
    }

    /// `T[]` array suffixes and `T[K]` indexed access.
    fn parse_postfix_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        let mut ty = self.parse_primary_type()?;
        while self.at(TokenKind::LeftBracket) && !self.peek().newline_before {
            self.advance();
            if self.eat(TokenKind::RightBracket) {
                let span = self.type_span(start);
                ty = TypeNode::new(span, TypeNodeKind::Array(Box::new(ty)));
            } else {
                let index = self.parse_type()?;
                self.expect(TokenKind::RightBracket)?;
                let span = self.type_span(start);
                ty = TypeNode::new(
                    span,
                    TypeNodeKind::IndexedAccess {
                        object: Box::new(ty),
                        index: Box::new(index),
                    },
                );
            }
        }
        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        match self.kind() {
            TokenKind::Void => {
                self.advance();
                Ok(TypeNode::new(start, TypeNodeKind::Keyword(TypeKeyword::Void)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(TypeNode::new(start, TypeNodeKind::Keyword(TypeKeyword::Null)))
            }
            TokenKind::This => {
                self.advance();
                Ok(TypeNode::new(start, TypeNodeKind::Keyword(TypeKeyword::This)))
            }
            TokenKind::True => {
                self.advance();
                Ok(TypeNode::new(start, TypeNodeKind::Literal(Lit::Boolean(true))))
            }
            TokenKind::False => {
                self.advance();
                Ok(TypeNode::new(start, TypeNodeKind::Literal(Lit::Boolean(false))))
            }
            TokenKind::StringLiteral => {
                let token = self.advance();
                Ok(TypeNode::new(
                    start,
                    TypeNodeKind::Literal(Lit::String(
                        token.string_value().unwrap_or_default().to_string(),
                    )),
                ))
            }
            TokenKind::NumericLiteral => {
                let token = self.advance();
                Ok(TypeNode::new(
                    start,
                    TypeNodeKind::Literal(Lit::Number(token.number_value().unwrap_or(f64::NAN))),
                ))
            }
            TokenKind::Minus if self.peek_ahead(1).kind == TokenKind::NumericLiteral => {
                self.advance();
                let token = self.advance();
                let value = -token.number_value().unwrap_or(f64::NAN);
                let span = self.type_span(start);
                Ok(TypeNode::new(span, TypeNodeKind::Literal(Lit::Number(value))))
            }
            TokenKind::Typeof => {
                self.advance();
                let mut name = self.expect_identifier()?;
                while self.eat(TokenKind::Dot) {
                    name.push('.');
                    name.push_str(&self.expect_identifier()?);
                }
                let span = self.type_span(start);
                Ok(TypeNode::new(span, TypeNodeKind::TypeQuery(name)))
            }
            TokenKind::Keyof => {
                self.advance();
                let inner = self.parse_postfix_type()?;
                let span = self.type_span(start);
                Ok(TypeNode::new(span, TypeNodeKind::Keyof(Box::new(inner))))
            }
            TokenKind::Readonly => {
                self.advance();
                let inner = self.parse_postfix_type()?;
                let span = self.type_span(start);
                Ok(TypeNode::new(span, TypeNodeKind::Readonly(Box::new(inner))))
            }
            TokenKind::Infer => {
                self.advance();
                let name = self.expect_identifier()?;
                let span = self.type_span(start);
                Ok(TypeNode::new(span, TypeNodeKind::Infer(name)))
            }
            TokenKind::New => {
                // Constructor types are outside the checked subset; preserve.
                self.preserve_unknown_type(start)
            }
            TokenKind::LeftParen => self.parse_paren_or_function_type(),
            TokenKind::LessThan => {
                // Generic function type: `<T>(x: T) => T`.
                let type_params = self.parse_optional_type_params()?;
                self.parse_function_type(type_params, start)
            }
            TokenKind::LeftBracket => self.parse_tuple_type(),
            TokenKind::LeftBrace => self.parse_object_or_mapped_type(),
            TokenKind::TemplateHead | TokenKind::NoSubstitutionTemplate => {
                self.parse_template_literal_type()
            }
            kind if kind.is_identifier_like() => {
                let token = self.advance();
                let text = identifier_text(&token);
                if let Some(keyword) = type_keyword(&text) {
                    return Ok(TypeNode::new(start, TypeNodeKind::Keyword(keyword)));
                }
                let mut name = text;
                while self.at(TokenKind::Dot)
                    && self.peek_ahead(1).kind.is_identifier_like()
                {
                    self.advance();
                    name.push('.');
                    name.push_str(&self.expect_identifier()?);
                }
                let type_args = if self.at(TokenKind::LessThan)
                    && self.type_args_follow()
                {
                    self.parse_type_argument_list()?
                } else {
                    Vec::new()
                };
                let span = self.type_span(start);
                Ok(TypeNode::new(span, TypeNodeKind::Ref { name, type_args }))
            }
            _ => self.preserve_unknown_type(start),
        }
    }

    /// Whether a `<` in type position opens a type-argument list (it always
    /// does in type position; this guards against stray comparisons after
    /// error recovery).
    fn type_args_follow(&self) -> bool {
        !matches!(
            self.peek_ahead(1).kind,
            TokenKind::EndOfFile | TokenKind::Semicolon
        )
    }

    /// Capture a token we cannot interpret as type syntax.
    fn preserve_unknown_type(&mut self, start: Span) -> PResult<TypeNode> {
        let token = self.advance();
        let text = if token.text.is_empty() {
            token.kind.display_name().to_string()
        } else {
            token.text
        };
        tracing::warn!(text = %text, "preserving unknown type syntax");
        Ok(TypeNode::new(start, TypeNodeKind::Unknown(text)))
    }

    fn parse_paren_or_function_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        if self.paren_starts_function_type() {
            return self.parse_function_type(Vec::new(), start);
        }
        self.advance();
        let inner = self.parse_type()?;
        self.expect(TokenKind::RightParen)?;
        let span = self.type_span(start);
        Ok(TypeNode::new(
            span,
            TypeNodeKind::Parenthesized(Box::new(inner)),
        ))
    }

    /// Distinguish `(T)` from `(x: T) => U` by scanning to the matching `)`.
    fn paren_starts_function_type(&self) -> bool {
        // `()` is always a function type.
        if self.peek_ahead(1).kind == TokenKind::RightParen {
            return true;
        }
        // `(name:` / `(name?` / `(...` are parameter-list shapes.
        if self.peek_ahead(1).kind == TokenKind::DotDotDot {
            return true;
        }
        if self.peek_ahead(1).kind.is_identifier_like()
            && matches!(
                self.peek_ahead(2).kind,
                TokenKind::Colon | TokenKind::Question | TokenKind::Comma
            )
        {
            return true;
        }
        // Otherwise scan for `) =>`.
        let mut depth = 0u32;
        let mut i = 0;
        loop {
            match self.peek_ahead(i).kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_ahead(i + 1).kind == TokenKind::Arrow;
                    }
                }
                TokenKind::EndOfFile | TokenKind::Semicolon => return false,
                _ => {}
            }
            i += 1;
            if i > 256 {
                return false;
            }
        }
    }

    fn parse_function_type(
        &mut self,
        type_params: Vec<TypeParam>,
        start: Span,
    ) -> PResult<TypeNode> {
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RightParen) && !self.at(TokenKind::EndOfFile) {
            let rest = self.eat(TokenKind::DotDotDot);
            let name = self.expect_identifier()?;
            let optional = self.eat(TokenKind::Question);
            let type_ann = if self.eat(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(TypeFnParam {
                name,
                type_ann,
                optional,
                rest,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::Arrow)?;
        let return_type = self.parse_type()?;
        let span = self.type_span(start);
        Ok(TypeNode::new(
            span,
            TypeNodeKind::Function {
                params,
                return_type: Box::new(return_type),
                type_params,
            },
        ))
    }

    fn parse_tuple_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        self.advance();
        let mut elements = Vec::new();
        let mut rest = None;
        while !self.at(TokenKind::RightBracket) && !self.at(TokenKind::EndOfFile) {
            if self.eat(TokenKind::DotDotDot) {
                rest = Some(Box::new(self.parse_type()?));
            } else {
                elements.push(self.parse_type()?);
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBracket)?;
        let span = self.type_span(start);
        Ok(TypeNode::new(span, TypeNodeKind::Tuple { elements, rest }))
    }

    fn parse_object_or_mapped_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        // Mapped type signature: `{ [K in ...`; optionally preceded by
        // `readonly` / `+readonly` / `-readonly`.
        let mut probe = 1;
        let mut readonly = MappedModifier::None;
        match self.peek_ahead(probe).kind {
            TokenKind::Plus => {
                if self.peek_ahead(probe + 1).kind == TokenKind::Readonly {
                    readonly = MappedModifier::Add;
                    probe += 2;
                }
            }
            TokenKind::Minus => {
                if self.peek_ahead(probe + 1).kind == TokenKind::Readonly {
                    readonly = MappedModifier::Remove;
                    probe += 2;
                }
            }
            TokenKind::Readonly => {
                if self.peek_ahead(probe + 1).kind == TokenKind::LeftBracket {
                    readonly = MappedModifier::Add;
                    probe += 1;
                }
            }
            _ => {}
        }
        let is_mapped = self.peek_ahead(probe).kind == TokenKind::LeftBracket
            && self.peek_ahead(probe + 1).kind.is_identifier_like()
            && self.peek_ahead(probe + 2).kind == TokenKind::In;

        if is_mapped {
            self.advance(); // {
            if readonly != MappedModifier::None {
                // Consume the readonly (and sign) tokens probed above.
                if matches!(self.kind(), TokenKind::Plus | TokenKind::Minus) {
                    self.advance();
                }
                self.advance();
            }
            self.expect(TokenKind::LeftBracket)?;
            let param_name = self.expect_identifier()?;
            self.expect(TokenKind::In)?;
            let in_type = self.parse_type()?;
            let as_type = if self.eat(TokenKind::As) {
                Some(Box::new(self.parse_type()?))
            } else {
                None
            };
            self.expect(TokenKind::RightBracket)?;
            let optional = if self.eat(TokenKind::Question) {
                MappedModifier::Add
            } else if self.at(TokenKind::Plus)
                && self.peek_ahead(1).kind == TokenKind::Question
            {
                self.advance();
                self.advance();
                MappedModifier::Add
            } else if self.at(TokenKind::Minus)
                && self.peek_ahead(1).kind == TokenKind::Question
            {
                self.advance();
                self.advance();
                MappedModifier::Remove
            } else {
                MappedModifier::None
            };
            self.expect(TokenKind::Colon)?;
            let value_type = self.parse_type()?;
            self.eat(TokenKind::Semicolon);
            self.expect(TokenKind::RightBrace)?;
            let span = self.type_span(start);
            return Ok(TypeNode::new(
                span,
                TypeNodeKind::Mapped {
                    param_name,
                    in_type: Box::new(in_type),
                    as_type,
                    value_type: Box::new(value_type),
                    optional,
                    readonly,
                },
            ));
        }

        // Plain object type.
        self.advance();
        let mut members = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at(TokenKind::EndOfFile) {
            members.push(self.parse_type_member()?);
            if !self.eat(TokenKind::Semicolon) {
                self.eat(TokenKind::Comma);
            }
        }
        self.expect(TokenKind::RightBrace)?;
        let span = self.type_span(start);
        Ok(TypeNode::new(span, TypeNodeKind::Object(members)))
    }

    fn parse_type_member(&mut self) -> PResult<TypeMember> {
        let readonly = self.at(TokenKind::Readonly)
            && (self.peek_ahead(1).kind.is_identifier_like()
                || self.peek_ahead(1).kind == TokenKind::LeftBracket);
        if readonly {
            self.advance();
        }

        // Call signature.
        if self.at(TokenKind::LeftParen) || self.at(TokenKind::LessThan) {
            let type_params = self.parse_optional_type_params()?;
            let (params, return_type) = self.parse_signature()?;
            return Ok(TypeMember::Call {
                params,
                return_type: Box::new(return_type),
                type_params,
            });
        }

        // Index signature.
        if self.at(TokenKind::LeftBracket) {
            self.advance();
            let key_name = self.expect_identifier()?;
            self.expect(TokenKind::Colon)?;
            let key_type = self.parse_type()?;
            self.expect(TokenKind::RightBracket)?;
            self.expect(TokenKind::Colon)?;
            let value_type = self.parse_type()?;
            return Ok(TypeMember::IndexSignature {
                key_name,
                key_type: Box::new(key_type),
                value_type: Box::new(value_type),
            });
        }

        let name = if self.at(TokenKind::StringLiteral) {
            self.advance().string_value().unwrap_or_default().to_string()
        } else {
            self.expect_identifier()?
        };
        let optional = self.eat(TokenKind::Question);

        if self.at(TokenKind::LeftParen) || self.at(TokenKind::LessThan) {
            let type_params = self.parse_optional_type_params()?;
            let (params, return_type) = self.parse_signature()?;
            return Ok(TypeMember::Method {
                name,
                params,
                return_type: Box::new(return_type),
                type_params,
                optional,
            });
        }

        self.expect(TokenKind::Colon)?;
        let type_ann = self.parse_type()?;
        Ok(TypeMember::Property {
            name,
            type_ann,
            optional,
            readonly,
        })
    }

    fn parse_signature(&mut self) -> PResult<(Vec<TypeFnParam>, TypeNode)> {
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RightParen) && !self.at(TokenKind::EndOfFile) {
            let rest = self.eat(TokenKind::DotDotDot);
            let name = self.expect_identifier()?;
            let optional = self.eat(TokenKind::Question);
            let type_ann = if self.eat(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(TypeFnParam {
                name,
                type_ann,
                optional,
                rest,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        let return_type = if self.eat(TokenKind::Colon) {
            self.parse_return_type()?
        } else {
            TypeNode::new(self.span(), TypeNodeKind::Keyword(TypeKeyword::Any))
        };
        Ok((params, return_type))
    }

    fn parse_template_literal_type(&mut self) -> PResult<TypeNode> {
        let start = self.span();
        let head = self.advance();
        let mut quasis = Vec::new();
        let mut types = Vec::new();
        let cooked = match &head.value {
            tsi_scanner::TokenValue::Template { cooked, .. } => cooked.clone(),
            _ => String::new(),
        };
        quasis.push(cooked);
        if head.kind == TokenKind::NoSubstitutionTemplate {
            let span = self.type_span(start);
            return Ok(TypeNode::new(
                span,
                TypeNodeKind::TemplateLiteral { quasis, types },
            ));
        }
        loop {
            types.push(self.parse_type()?);
            match self.kind() {
                TokenKind::TemplateMiddle | TokenKind::TemplateTail => {
                    let token = self.advance();
                    let cooked = match &token.value {
                        tsi_scanner::TokenValue::Template { cooked, .. } => cooked.clone(),
                        _ => String::new(),
                    };
                    quasis.push(cooked);
                    if token.kind == TokenKind::TemplateTail {
                        let span = self.type_span(start);
                        return Ok(TypeNode::new(
                            span,
                            TypeNodeKind::TemplateLiteral { quasis, types },
                        ));
                    }
                }
                _ => {
                    self.error_here(
                        "Unterminated template literal type.".to_string(),
                        diagnostic_codes::UNEXPECTED_TOKEN,
                    );
                    return Err(Recover);
                }
            }
        }
    }
}

/// Type keywords are contextual: spelled as identifiers.
fn type_keyword(text: &str) -> Option<TypeKeyword> {
    let keyword = match text {
        "number" => TypeKeyword::Number,
        "string" => TypeKeyword::String,
        "boolean" => TypeKeyword::Boolean,
        "bigint" => TypeKeyword::Bigint,
        "symbol" => TypeKeyword::Symbol,
        "object" => TypeKeyword::Object,
        "undefined" => TypeKeyword::Undefined,
        "any" => TypeKeyword::Any,
        "unknown" => TypeKeyword::Unknown,
        "never" => TypeKeyword::Never,
        _ => return None,
    };
    Some(keyword)
}
