//! Class parsing: declarations, expressions, members and modifiers.

use std::rc::Rc;

use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;
use tsi_scanner::TokenKind;

use crate::ast::*;
use crate::parser::{PResult, Parser};

impl Parser {
    /// Parse `class Name<T> extends Base implements I { ... }` with the
    /// `class` keyword current.
    pub(crate) fn parse_class(&mut self, decorators: Vec<Decorator>) -> PResult<ClassData> {
        let start = self.span();
        self.expect(TokenKind::Class)?;
        let name = if self.kind().is_identifier_like() {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let type_params = self.parse_optional_type_params()?;

        let (superclass, super_type_args) = if self.eat(TokenKind::Extends) {
            let expr = self.parse_call_chain_only()?;
            let args = if self.at(TokenKind::LessThan) {
                self.parse_type_argument_list()?
            } else {
                Vec::new()
            };
            (Some(expr), args)
        } else {
            (None, Vec::new())
        };

        let mut implements = Vec::new();
        if self.eat(TokenKind::Implements) {
            loop {
                implements.push(self.parse_type_reference()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::LeftBrace)?;
        let mut members = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at(TokenKind::EndOfFile) {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            match self.parse_class_member() {
                Ok(member) => members.push(member),
                Err(e) => {
                    self.synchronize();
                    if self.at(TokenKind::EndOfFile) {
                        return Err(e);
                    }
                }
            }
        }
        self.expect(TokenKind::RightBrace)?;

        let end = self.tokens[self.pos.saturating_sub(1)].span.end;
        Ok(ClassData {
            name,
            superclass,
            super_type_args,
            implements,
            members,
            type_params,
            is_abstract: false,
            decorators,
            span: Span::new(start.start, end),
        })
    }

    fn parse_class_member(&mut self) -> PResult<ClassMember> {
        let start = self.span();
        let decorators = self.parse_decorators()?;

        let mut modifiers = MemberModifiers::empty();
        loop {
            // A modifier keyword directly followed by `(`, `=`, `:`, `;` or
            // `?` is actually a member name.
            let next = self.peek_ahead(1).kind;
            let is_name_position = matches!(
                next,
                TokenKind::LeftParen
                    | TokenKind::Equals
                    | TokenKind::Colon
                    | TokenKind::Semicolon
                    | TokenKind::Question
                    | TokenKind::LessThan
            );
            match self.kind() {
                TokenKind::Static if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::STATIC;
                }
                TokenKind::Public if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::PUBLIC;
                }
                TokenKind::Private if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::PRIVATE;
                }
                TokenKind::Protected if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::PROTECTED;
                }
                TokenKind::Readonly if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::READONLY;
                }
                TokenKind::Abstract if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::ABSTRACT;
                }
                TokenKind::Override if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::OVERRIDE;
                }
                TokenKind::Declare if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::DECLARE;
                }
                TokenKind::Accessor if !is_name_position => {
                    self.advance();
                    modifiers |= MemberModifiers::ACCESSOR;
                }
                _ => break,
            }
        }

        // Static initialization block.
        if modifiers.contains(MemberModifiers::STATIC) && self.at(TokenKind::LeftBrace) {
            let body = self.parse_block()?;
            return Ok(ClassMember::StaticBlock(body));
        }

        // Getter/setter.
        let accessor_kind = match self.kind() {
            TokenKind::Get | TokenKind::Set if self.property_key_follows(1) => {
                Some(self.advance().kind)
            }
            _ => None,
        };
        if let Some(kind) = accessor_kind {
            let key = self.parse_property_key()?;
            let func = self.parse_method_tail(false, false, start)?;
            return Ok(if kind == TokenKind::Get {
                ClassMember::Getter {
                    key,
                    func: Rc::new(func),
                    modifiers,
                    decorators,
                }
            } else {
                ClassMember::Setter {
                    key,
                    func: Rc::new(func),
                    modifiers,
                    decorators,
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

        // Method (or constructor).
        if self.at(TokenKind::LeftParen) || self.at(TokenKind::LessThan) {
            let mut func = self.parse_method_tail(is_async, is_generator, start)?;
            if let Some(name) = key.static_name() {
                func.name = Some(name.clone());
                if name == "constructor" && !is_async && !is_generator {
                    self.check_constructor_modifiers(modifiers, start);
                    return Ok(ClassMember::Constructor {
                        func: Rc::new(func),
                        decorators,
                    });
                }
            }
            return Ok(ClassMember::Method {
                key,
                func: Rc::new(func),
                modifiers,
                decorators,
            });
        }

        if is_async || is_generator {
            self.error_here(
                "Expected method body.".to_string(),
                diagnostic_codes::UNEXPECTED_TOKEN,
            );
        }

        // Field: optional `?`/`!`, type annotation, initializer.
        self.eat(TokenKind::Question);
        self.eat(TokenKind::Exclamation);
        let type_ann = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat(TokenKind::Equals) {
            Some(self.parse_assignment_expr()?)
        } else {
            None
        };
        self.expect_semicolon();
        let end = self.tokens[self.pos.saturating_sub(1)].span.end;
        Ok(ClassMember::Field {
            key,
            type_ann,
            init,
            modifiers,
            decorators,
            span: Span::new(start.start, end),
        })
    }

    fn check_constructor_modifiers(&mut self, modifiers: MemberModifiers, span: Span) {
        if modifiers.intersects(MemberModifiers::STATIC | MemberModifiers::ABSTRACT) {
            self.error_at(
                span,
                "A constructor cannot be 'static' or 'abstract'.".to_string(),
                diagnostic_codes::UNEXPECTED_TOKEN,
            );
        }
    }
}
