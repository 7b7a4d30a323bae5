//! Destructuring lowering.
//!
//! Array and object binding patterns are parsed into a small internal
//! `Pattern` tree, then lowered to fresh temporaries plus element reads
//! preserving left-to-right evaluation. Later phases (checker,
//! interpreter) only ever see plain bindings.
//!
//! `const { a, b: c = 5, ...rest } = obj` lowers to the declarator list:
//!
//! ```text
//! const %tmp0 = obj;
//! const a = %tmp0.a;
//! const %def1 = %tmp0.b;
//! const c = %def1 === undefined ? 5 : %def1;
//! const %rest2 = Object.assign({}, %tmp0);
//! const %drop3 = delete %rest2.a;        // throwaway, ordering only
//! const %drop4 = delete %rest2.b;
//! const rest = %rest2;
//! ```

use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;
use tsi_scanner::TokenKind;

use crate::ast::*;
use crate::parser::{PResult, Parser};
use crate::types_ast::TypeNode;

/// A binding pattern, before lowering.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    Ident { name: String },
    Array {
        elements: Vec<Option<PatternElement>>,
        rest: Option<Box<Pattern>>,
    },
    Object {
        props: Vec<ObjectPatternProp>,
        rest: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct PatternElement {
    pub pattern: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectPatternProp {
    pub key: String,
    pub value: Pattern,
    pub default: Option<Expr>,
}

// =============================================================================
// Parsing
// =============================================================================

pub(crate) fn parse_pattern(p: &mut Parser) -> PResult<Pattern> {
    match p.kind() {
        TokenKind::LeftBracket => parse_array_pattern(p),
        TokenKind::LeftBrace => parse_object_pattern(p),
        _ => {
            let name = p.expect_identifier()?;
            Ok(Pattern::Ident { name })
        }
    }
}

fn parse_array_pattern(p: &mut Parser) -> PResult<Pattern> {
    p.expect(TokenKind::LeftBracket)?;
    let mut elements = Vec::new();
    let mut rest = None;
    while !p.at(TokenKind::RightBracket) && !p.at(TokenKind::EndOfFile) {
        if p.at(TokenKind::Comma) {
            p.advance();
            elements.push(None);
            continue;
        }
        if p.eat(TokenKind::DotDotDot) {
            rest = Some(Box::new(parse_pattern(p)?));
            if !p.at(TokenKind::RightBracket) {
                p.error_here(
                    "A rest element must be last in a destructuring pattern.".to_string(),
                    diagnostic_codes::REST_MUST_BE_LAST,
                );
            }
            break;
        }
        let pattern = parse_pattern(p)?;
        let default = if p.eat(TokenKind::Equals) {
            Some(p.parse_assignment_expr()?)
        } else {
            None
        };
        elements.push(Some(PatternElement { pattern, default }));
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::RightBracket)?;
    Ok(Pattern::Array { elements, rest })
}

fn parse_object_pattern(p: &mut Parser) -> PResult<Pattern> {
    p.expect(TokenKind::LeftBrace)?;
    let mut props = Vec::new();
    let mut rest = None;
    while !p.at(TokenKind::RightBrace) && !p.at(TokenKind::EndOfFile) {
        if p.eat(TokenKind::DotDotDot) {
            rest = Some(p.expect_identifier()?);
            if !p.at(TokenKind::RightBrace) {
                p.error_here(
                    "A rest element must be last in a destructuring pattern.".to_string(),
                    diagnostic_codes::REST_MUST_BE_LAST,
                );
            }
            break;
        }
        let key = if p.at(TokenKind::StringLiteral) {
            p.advance().string_value().unwrap_or_default().to_string()
        } else {
            p.expect_identifier()?
        };
        let value = if p.eat(TokenKind::Colon) {
            parse_pattern(p)?
        } else {
            Pattern::Ident { name: key.clone() }
        };
        let default = if p.eat(TokenKind::Equals) {
            Some(p.parse_assignment_expr()?)
        } else {
            None
        };
        props.push(ObjectPatternProp {
            key,
            value,
            default,
        });
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::RightBrace)?;
    Ok(Pattern::Object { props, rest })
}

// =============================================================================
// Lowering
// =============================================================================

/// Lower a pattern declaration `<pattern> = init` into plain declarators.
pub(crate) fn lower_pattern_declaration(
    p: &mut Parser,
    pattern: &Pattern,
    init: Expr,
    _type_ann: Option<TypeNode>,
    _kind: VarKind,
    span: Span,
    decls: &mut Vec<VarDeclarator>,
) {
    let temp = p.fresh_temp("tmp");
    decls.push(VarDeclarator {
        name: temp.clone(),
        type_ann: None,
        init: Some(init),
        synthetic: true,
        span,
    });
    lower_into(p, pattern, &temp, span, decls);
}

/// Lower a parameter (or loop-binding) pattern into prologue statements
/// that re-bind the pattern names from `source_name`.
pub(crate) fn lower_param_pattern(
    p: &mut Parser,
    pattern: &Pattern,
    source_name: &str,
    span: Span,
    prologue: &mut Vec<Stmt>,
) {
    let mut decls = Vec::new();
    lower_into(p, pattern, source_name, span, &mut decls);
    prologue.push(Stmt {
        span,
        kind: StmtKind::Var {
            kind: VarKind::Let,
            decls,
        },
    });
}

/// Emit declarators binding every name in `pattern` from reads off the
/// binding `source`.
fn lower_into(
    p: &mut Parser,
    pattern: &Pattern,
    source: &str,
    span: Span,
    decls: &mut Vec<VarDeclarator>,
) {
    match pattern {
        Pattern::Ident { name } => {
            // Degenerate alias (only reachable from rest patterns).
            let read = var(p, source, span);
            decls.push(plain(name, read, span));
        }
        Pattern::Array { elements, rest } => {
            for (i, element) in elements.iter().enumerate() {
                let Some(element) = element else { continue };
                let read = index_read(p, source, i, span);
                lower_element(p, &element.pattern, &element.default, read, span, decls);
            }
            if let Some(rest_pattern) = rest {
                // remainder = source.slice(n)
                let object = var(p, source, span);
                let slice = p.mk(
                    span,
                    ExprKind::Get {
                        object: Box::new(object),
                        name: "slice".to_string(),
                        optional: false,
                    },
                );
                let start_idx = p.mk(span, ExprKind::Literal(Lit::Number(elements.len() as f64)));
                let call = p.mk(
                    span,
                    ExprKind::Call {
                        callee: Box::new(slice),
                        args: vec![Argument {
                            spread: false,
                            expr: start_idx,
                        }],
                        type_args: Vec::new(),
                        optional: false,
                    },
                );
                lower_element(p, rest_pattern, &None, call, span, decls);
            }
        }
        Pattern::Object { props, rest } => {
            for prop in props {
                let read = prop_read(p, source, &prop.key, span);
                lower_element(p, &prop.value, &prop.default, read, span, decls);
            }
            if let Some(rest_name) = rest {
                // remainder = Object.assign({}, source) with matched keys
                // removed; the delete results bind to throwaway temporaries
                // purely to keep declarator-list evaluation order.
                let copy_temp = p.fresh_temp("rest");
                let object_var = var(p, "Object", span);
                let assign = p.mk(
                    span,
                    ExprKind::Get {
                        object: Box::new(object_var),
                        name: "assign".to_string(),
                        optional: false,
                    },
                );
                let empty = p.mk(span, ExprKind::ObjectLiteral(Vec::new()));
                let source_var = var(p, source, span);
                let copy = p.mk(
                    span,
                    ExprKind::Call {
                        callee: Box::new(assign),
                        args: vec![
                            Argument {
                                spread: false,
                                expr: empty,
                            },
                            Argument {
                                spread: false,
                                expr: source_var,
                            },
                        ],
                        type_args: Vec::new(),
                        optional: false,
                    },
                );
                decls.push(VarDeclarator {
                    name: copy_temp.clone(),
                    type_ann: None,
                    init: Some(copy),
                    synthetic: true,
                    span,
                });
                for prop in props {
                    let read = prop_read(p, &copy_temp, &prop.key, span);
                    let deleted = p.mk(span, ExprKind::Delete(Box::new(read)));
                    let drop_temp = p.fresh_temp("drop");
                    decls.push(VarDeclarator {
                        name: drop_temp,
                        type_ann: None,
                        init: Some(deleted),
                        synthetic: true,
                        span,
                    });
                }
                let rest_value = var(p, &copy_temp, span);
                decls.push(plain(rest_name, rest_value, span));
            }
        }
    }
}

/// Bind one pattern element from an already-built read, applying defaults
/// through a single-evaluation temporary.
fn lower_element(
    p: &mut Parser,
    pattern: &Pattern,
    default: &Option<Expr>,
    read: Expr,
    span: Span,
    decls: &mut Vec<VarDeclarator>,
) {
    let value_source: String = if let Some(default_expr) = default {
        let raw_temp = p.fresh_temp("def");
        decls.push(VarDeclarator {
            name: raw_temp.clone(),
            type_ann: None,
            init: Some(read),
            synthetic: true,
            span,
        });
        let defaulted_temp = p.fresh_temp("val");
        let probe = var(p, &raw_temp, span);
        let undef = p.mk(span, ExprKind::Literal(Lit::Undefined));
        let cond = p.mk(
            span,
            ExprKind::Binary {
                op: BinaryOp::EqEqEq,
                left: Box::new(probe),
                right: Box::new(undef),
            },
        );
        let fallback = var(p, &raw_temp, span);
        let ternary = p.mk(
            span,
            ExprKind::Ternary {
                cond: Box::new(cond),
                then: Box::new(default_expr.clone()),
                otherwise: Box::new(fallback),
            },
        );
        decls.push(VarDeclarator {
            name: defaulted_temp.clone(),
            type_ann: None,
            init: Some(ternary),
            synthetic: true,
            span,
        });
        defaulted_temp
    } else {
        match pattern {
            Pattern::Ident { name } => {
                decls.push(plain(name, read, span));
                return;
            }
            _ => {
                let temp = p.fresh_temp("tmp");
                decls.push(VarDeclarator {
                    name: temp.clone(),
                    type_ann: None,
                    init: Some(read),
                    synthetic: true,
                    span,
                });
                temp
            }
        }
    };

    match pattern {
        Pattern::Ident { name } => {
            let read = var(p, &value_source, span);
            decls.push(plain(name, read, span));
        }
        _ => lower_into(p, pattern, &value_source, span, decls),
    }
}

fn var(p: &mut Parser, name: &str, span: Span) -> Expr {
    p.mk(span, ExprKind::Variable(name.to_string()))
}

fn prop_read(p: &mut Parser, source: &str, key: &str, span: Span) -> Expr {
    let object = var(p, source, span);
    p.mk(
        span,
        ExprKind::Get {
            object: Box::new(object),
            name: key.to_string(),
            optional: false,
        },
    )
}

fn index_read(p: &mut Parser, source: &str, index: usize, span: Span) -> Expr {
    let object = var(p, source, span);
    let idx = p.mk(span, ExprKind::Literal(Lit::Number(index as f64)));
    p.mk(
        span,
        ExprKind::GetIndex {
            object: Box::new(object),
            index: Box::new(idx),
            optional: false,
        },
    )
}

fn plain(name: &str, init: Expr, span: Span) -> VarDeclarator {
    VarDeclarator {
        name: name.to_string(),
        type_ann: None,
        init: Some(init),
        synthetic: false,
        span,
    }
}
