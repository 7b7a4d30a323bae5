//! Body normalisation for generators and async functions.
//!
//! Rewrites a function body so that every `yield` and `await` appears only
//! in the canonical statement form `let %slot = yield expr;`. Expressions
//! containing suspend points are decomposed into temporaries preserving
//! left-to-right evaluation; short-circuit operators and ternaries whose
//! right side suspends become `if` statements; loop conditions that
//! suspend are rotated into `while (true) { let %c = await e; if (!%c)
//! break; ... }`. `do/while` and plain value positions reduce to the same
//! shapes. Nested function bodies are left alone (their suspends belong to
//! them).
//!
//! The rewrite runs once per function, on first call, and the result is
//! cached on the function value.

use std::cell::Cell;
use std::rc::Rc;

use tsi_common::span::Span;
use tsi_parser::ast::*;

use crate::value::FunctionValue;

/// Counter for fresh slot names; node ids are not reused because the
/// checker's type map must stay valid for untouched expressions.
pub struct Lowerer {
    next_slot: Cell<u32>,
    next_node: Cell<u32>,
}

impl Lowerer {
    #[must_use]
    pub fn new(node_count: u32) -> Lowerer {
        Lowerer {
            next_slot: Cell::new(0),
            next_node: Cell::new(node_count),
        }
    }

    fn fresh_slot(&self) -> String {
        let n = self.next_slot.get();
        self.next_slot.set(n + 1);
        format!("%s{n}")
    }

    fn fresh_id(&self) -> NodeId {
        let n = self.next_node.get();
        self.next_node.set(n + 1);
        NodeId(n)
    }

    fn mk(&self, span: Span, kind: ExprKind) -> Expr {
        Expr {
            id: self.fresh_id(),
            span,
            kind,
        }
    }

    /// Normalise a whole body.
    #[must_use]
    pub fn lower_body(&self, stmts: &[Stmt]) -> Vec<Stmt> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.lower_stmt(stmt, &mut out);
        }
        out
    }

    fn lower_stmt(&self, stmt: &Stmt, out: &mut Vec<Stmt>) {
        if !stmt_suspends(stmt) {
            out.push(stmt.clone());
            return;
        }
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                let lowered = self.lower_expr(expr, out);
                out.push(Stmt {
                    span,
                    kind: StmtKind::Expression(lowered),
                });
            }
            StmtKind::Var { kind, decls } => {
                // Split so each declarator's initializer suspends in order.
                for decl in decls {
                    let mut lowered = decl.clone();
                    if let Some(init) = &decl.init {
                        lowered.init = Some(self.lower_init(init, out));
                    }
                    out.push(Stmt {
                        span: decl.span,
                        kind: StmtKind::Var {
                            kind: *kind,
                            decls: vec![lowered],
                        },
                    });
                }
            }
            StmtKind::Return(Some(expr)) => {
                let lowered = self.lower_expr(expr, out);
                out.push(Stmt {
                    span,
                    kind: StmtKind::Return(Some(lowered)),
                });
            }
            StmtKind::Throw(expr) => {
                let lowered = self.lower_expr(expr, out);
                out.push(Stmt {
                    span,
                    kind: StmtKind::Throw(lowered),
                });
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.lower_expr(cond, out);
                let then = self.lower_block_stmt(then);
                let otherwise = otherwise.as_ref().map(|s| Box::new(self.lower_block_stmt(s)));
                out.push(Stmt {
                    span,
                    kind: StmtKind::If {
                        cond,
                        then: Box::new(then),
                        otherwise,
                    },
                });
            }
            StmtKind::While { cond, body, step } => {
                if expr_suspends(cond) || step.as_ref().map(|s| expr_suspends(s)).unwrap_or(false) {
                    // Rotate the loop: test and step move into the body.
                    let mut rotated = Vec::new();
                    let cond_value = self.lower_expr(cond, &mut rotated);
                    let break_if_false = Stmt {
                        span,
                        kind: StmtKind::If {
                            cond: self.mk(
                                span,
                                ExprKind::Unary {
                                    op: UnaryOp::Not,
                                    operand: Box::new(cond_value),
                                },
                            ),
                            then: Box::new(Stmt {
                                span,
                                kind: StmtKind::Break(None),
                            }),
                            otherwise: None,
                        },
                    };
                    rotated.push(break_if_false);
                    rotated.push(self.lower_block_stmt(body));
                    if let Some(step) = step {
                        let mut step_stmts = Vec::new();
                        let lowered = self.lower_expr(step, &mut step_stmts);
                        step_stmts.push(Stmt {
                            span,
                            kind: StmtKind::Expression(lowered),
                        });
                        rotated.extend(step_stmts);
                    }
                    out.push(Stmt {
                        span,
                        kind: StmtKind::While {
                            cond: self.mk(span, ExprKind::Literal(Lit::Boolean(true))),
                            body: Box::new(Stmt {
                                span,
                                kind: StmtKind::Block(rotated),
                            }),
                            step: None,
                        },
                    });
                } else {
                    out.push(Stmt {
                        span,
                        kind: StmtKind::While {
                            cond: cond.clone(),
                            body: Box::new(self.lower_block_stmt(body)),
                            step: step.clone(),
                        },
                    });
                }
            }
            StmtKind::DoWhile { body, cond } => {
                // `do body while (c)` becomes `while (true) { body; if (!c) break; }`
                let mut rotated = vec![self.lower_block_stmt(body)];
                let mut tail = Vec::new();
                let cond_value = self.lower_expr(cond, &mut tail);
                tail.push(Stmt {
                    span,
                    kind: StmtKind::If {
                        cond: self.mk(
                            span,
                            ExprKind::Unary {
                                op: UnaryOp::Not,
                                operand: Box::new(cond_value),
                            },
                        ),
                        then: Box::new(Stmt {
                            span,
                            kind: StmtKind::Break(None),
                        }),
                        otherwise: None,
                    },
                });
                rotated.extend(tail);
                out.push(Stmt {
                    span,
                    kind: StmtKind::While {
                        cond: self.mk(span, ExprKind::Literal(Lit::Boolean(true))),
                        body: Box::new(Stmt {
                            span,
                            kind: StmtKind::Block(rotated),
                        }),
                        step: None,
                    },
                });
            }
            StmtKind::ForOf {
                binding,
                binding_kind,
                iterable,
                body,
            } => {
                let iterable = self.lower_expr(iterable, out);
                out.push(Stmt {
                    span,
                    kind: StmtKind::ForOf {
                        binding: binding.clone(),
                        binding_kind: *binding_kind,
                        iterable,
                        body: Box::new(self.lower_block_stmt(body)),
                    },
                });
            }
            StmtKind::ForIn {
                binding,
                binding_kind,
                object,
                body,
            } => {
                let object = self.lower_expr(object, out);
                out.push(Stmt {
                    span,
                    kind: StmtKind::ForIn {
                        binding: binding.clone(),
                        binding_kind: *binding_kind,
                        object,
                        body: Box::new(self.lower_block_stmt(body)),
                    },
                });
            }
            StmtKind::Block(stmts) => {
                out.push(Stmt {
                    span,
                    kind: StmtKind::Block(self.lower_body(stmts)),
                });
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                let discriminant = self.lower_expr(discriminant, out);
                let cases = cases
                    .iter()
                    .map(|case| SwitchCase {
                        // Suspending case tests are outside the supported
                        // subset; bodies normalise fully.
                        test: case.test.clone(),
                        body: self.lower_body(&case.body),
                        span: case.span,
                    })
                    .collect();
                out.push(Stmt {
                    span,
                    kind: StmtKind::Switch {
                        discriminant,
                        cases,
                    },
                });
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                out.push(Stmt {
                    span,
                    kind: StmtKind::Try {
                        block: self.lower_body(block),
                        catch: catch.as_ref().map(|c| CatchClause {
                            binding: c.binding.clone(),
                            type_ann: c.type_ann.clone(),
                            body: self.lower_body(&c.body),
                        }),
                        finally: finally.as_ref().map(|f| self.lower_body(f)),
                    },
                });
            }
            StmtKind::Labeled { label, body } => {
                out.push(Stmt {
                    span,
                    kind: StmtKind::Labeled {
                        label: label.clone(),
                        body: Box::new(self.lower_block_stmt(body)),
                    },
                });
            }
            _ => out.push(stmt.clone()),
        }
    }

    fn lower_block_stmt(&self, stmt: &Stmt) -> Stmt {
        if !stmt_suspends(stmt) {
            return stmt.clone();
        }
        let mut out = Vec::new();
        self.lower_stmt(stmt, &mut out);
        if out.len() == 1 {
            out.pop().expect("one statement")
        } else {
            Stmt {
                span: stmt.span,
                kind: StmtKind::Block(out),
            }
        }
    }

    /// Lower a declarator initializer: a direct `yield`/`await` keeps the
    /// canonical form in place; anything else decomposes.
    fn lower_init(&self, init: &Expr, out: &mut Vec<Stmt>) -> Expr {
        match &init.kind {
            ExprKind::Yield { .. } | ExprKind::Await(_) if !expr_operand_suspends(init) => {
                init.clone()
            }
            _ => self.lower_expr(init, out),
        }
    }

    /// Hoist suspend points out of an expression, in evaluation order.
    /// Returns the residual expression referencing `%slot` temporaries.
    fn lower_expr(&self, expr: &Expr, out: &mut Vec<Stmt>) -> Expr {
        if !expr_suspends(expr) {
            return expr.clone();
        }
        let span = expr.span;
        match &expr.kind {
            ExprKind::Yield { value, delegate } => {
                let value = value
                    .as_ref()
                    .map(|v| Box::new(self.lower_expr(v, out)));
                let slot = self.fresh_slot();
                let suspend = self.mk(
                    span,
                    ExprKind::Yield {
                        value,
                        delegate: *delegate,
                    },
                );
                out.push(self.slot_decl(&slot, suspend, span));
                self.mk(span, ExprKind::Variable(slot))
            }
            ExprKind::Await(inner) => {
                let inner = self.lower_expr(inner, out);
                let slot = self.fresh_slot();
                let suspend = self.mk(span, ExprKind::Await(Box::new(inner)));
                out.push(self.slot_decl(&slot, suspend, span));
                self.mk(span, ExprKind::Variable(slot))
            }
            ExprKind::Grouping(inner) => {
                let inner = self.lower_expr(inner, out);
                self.mk(span, ExprKind::Grouping(Box::new(inner)))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.lower_operand(left, out);
                let right = self.lower_expr(right, out);
                self.mk(
                    span,
                    ExprKind::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                )
            }
            // Short-circuit shapes: the right side must not run unless the
            // left side says so, which means statements.
            ExprKind::Logical { op, left, right } => {
                let left = self.lower_expr(left, out);
                let slot = self.fresh_slot();
                out.push(self.slot_decl(&slot, left, span));
                let guard = match op {
                    LogicalOp::And => self.mk(span, ExprKind::Variable(slot.clone())),
                    LogicalOp::Or => self.mk(
                        span,
                        ExprKind::Unary {
                            op: UnaryOp::Not,
                            operand: Box::new(self.mk(span, ExprKind::Variable(slot.clone()))),
                        },
                    ),
                };
                let mut branch = Vec::new();
                let right = self.lower_expr(right, &mut branch);
                branch.push(Stmt {
                    span,
                    kind: StmtKind::Expression(self.mk(
                        span,
                        ExprKind::Assign {
                            target: AssignTarget::Name(slot.clone()),
                            value: Box::new(right),
                        },
                    )),
                });
                out.push(Stmt {
                    span,
                    kind: StmtKind::If {
                        cond: guard,
                        then: Box::new(Stmt {
                            span,
                            kind: StmtKind::Block(branch),
                        }),
                        otherwise: None,
                    },
                });
                self.mk(span, ExprKind::Variable(slot))
            }
            ExprKind::NullishCoalescing { left, right } => {
                let left = self.lower_expr(left, out);
                let slot = self.fresh_slot();
                out.push(self.slot_decl(&slot, left, span));
                let probe = self.mk(span, ExprKind::Variable(slot.clone()));
                let null_lit = self.mk(span, ExprKind::Literal(Lit::Null));
                let is_nullish = self.mk(
                    span,
                    ExprKind::Binary {
                        op: BinaryOp::EqEq,
                        left: Box::new(probe),
                        right: Box::new(null_lit),
                    },
                );
                let mut branch = Vec::new();
                let right = self.lower_expr(right, &mut branch);
                branch.push(Stmt {
                    span,
                    kind: StmtKind::Expression(self.mk(
                        span,
                        ExprKind::Assign {
                            target: AssignTarget::Name(slot.clone()),
                            value: Box::new(right),
                        },
                    )),
                });
                out.push(Stmt {
                    span,
                    kind: StmtKind::If {
                        cond: is_nullish,
                        then: Box::new(Stmt {
                            span,
                            kind: StmtKind::Block(branch),
                        }),
                        otherwise: None,
                    },
                });
                self.mk(span, ExprKind::Variable(slot))
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.lower_expr(cond, out);
                let slot = self.fresh_slot();
                out.push(self.slot_decl(
                    &slot,
                    self.mk(span, ExprKind::Literal(Lit::Undefined)),
                    span,
                ));
                let mut then_branch = Vec::new();
                let then_value = self.lower_expr(then, &mut then_branch);
                then_branch.push(self.slot_assign(&slot, then_value, span));
                let mut else_branch = Vec::new();
                let else_value = self.lower_expr(otherwise, &mut else_branch);
                else_branch.push(self.slot_assign(&slot, else_value, span));
                out.push(Stmt {
                    span,
                    kind: StmtKind::If {
                        cond,
                        then: Box::new(Stmt {
                            span,
                            kind: StmtKind::Block(then_branch),
                        }),
                        otherwise: Some(Box::new(Stmt {
                            span,
                            kind: StmtKind::Block(else_branch),
                        })),
                    },
                });
                self.mk(span, ExprKind::Variable(slot))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.lower_expr(operand, out);
                self.mk(
                    span,
                    ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                )
            }
            ExprKind::Call {
                callee,
                args,
                type_args,
                optional,
            } => {
                let callee = self.lower_operand(callee, out);
                let args = args
                    .iter()
                    .map(|arg| Argument {
                        spread: arg.spread,
                        expr: self.lower_operand(&arg.expr, out),
                    })
                    .collect();
                self.mk(
                    span,
                    ExprKind::Call {
                        callee: Box::new(callee),
                        args,
                        type_args: type_args.clone(),
                        optional: *optional,
                    },
                )
            }
            ExprKind::New {
                callee,
                args,
                type_args,
            } => {
                let callee = self.lower_operand(callee, out);
                let args = args
                    .iter()
                    .map(|arg| Argument {
                        spread: arg.spread,
                        expr: self.lower_operand(&arg.expr, out),
                    })
                    .collect();
                self.mk(
                    span,
                    ExprKind::New {
                        callee: Box::new(callee),
                        args,
                        type_args: type_args.clone(),
                    },
                )
            }
            ExprKind::Get {
                object,
                name,
                optional,
            } => {
                let object = self.lower_operand(object, out);
                self.mk(
                    span,
                    ExprKind::Get {
                        object: Box::new(object),
                        name: name.clone(),
                        optional: *optional,
                    },
                )
            }
            ExprKind::GetIndex {
                object,
                index,
                optional,
            } => {
                let object = self.lower_operand(object, out);
                let index = self.lower_operand(index, out);
                self.mk(
                    span,
                    ExprKind::GetIndex {
                        object: Box::new(object),
                        index: Box::new(index),
                        optional: *optional,
                    },
                )
            }
            ExprKind::Assign { target, value } => {
                let value = self.lower_expr(value, out);
                self.mk(
                    span,
                    ExprKind::Assign {
                        target: target.clone(),
                        value: Box::new(value),
                    },
                )
            }
            ExprKind::CompoundAssign { target, op, value } => {
                let value = self.lower_expr(value, out);
                self.mk(
                    span,
                    ExprKind::CompoundAssign {
                        target: target.clone(),
                        op: *op,
                        value: Box::new(value),
                    },
                )
            }
            ExprKind::ArrayLiteral(elements) => {
                let elements = elements
                    .iter()
                    .map(|element| ArrayElement {
                        spread: element.spread,
                        expr: self.lower_operand(&element.expr, out),
                    })
                    .collect();
                self.mk(span, ExprKind::ArrayLiteral(elements))
            }
            ExprKind::ObjectLiteral(properties) => {
                let properties = properties
                    .iter()
                    .map(|property| match property {
                        ObjectProperty::KeyValue { key, value } => ObjectProperty::KeyValue {
                            key: key.clone(),
                            value: self.lower_operand(value, out),
                        },
                        ObjectProperty::Spread(inner) => {
                            ObjectProperty::Spread(self.lower_operand(inner, out))
                        }
                        other => other.clone(),
                    })
                    .collect();
                self.mk(span, ExprKind::ObjectLiteral(properties))
            }
            ExprKind::TemplateLiteral { quasis, exprs } => {
                let exprs = exprs
                    .iter()
                    .map(|sub| self.lower_operand(sub, out))
                    .collect();
                self.mk(
                    span,
                    ExprKind::TemplateLiteral {
                        quasis: quasis.clone(),
                        exprs,
                    },
                )
            }
            ExprKind::TypeAssertion { expr: inner, type_ann } => {
                let inner = self.lower_expr(inner, out);
                self.mk(
                    span,
                    ExprKind::TypeAssertion {
                        expr: Box::new(inner),
                        type_ann: type_ann.clone(),
                    },
                )
            }
            ExprKind::NonNull(inner) => {
                let inner = self.lower_expr(inner, out);
                self.mk(span, ExprKind::NonNull(Box::new(inner)))
            }
            // Remaining shapes cannot contain suspends after parsing rules
            // (functions own their yields; literals are leaves).
            _ => expr.clone(),
        }
    }

    /// Lower a sub-expression that must preserve ordering with its
    /// siblings: once any later sibling suspends, this one is pinned into
    /// a temporary even if it does not suspend itself.
    fn lower_operand(&self, expr: &Expr, out: &mut Vec<Stmt>) -> Expr {
        if expr_suspends(expr) {
            return self.lower_expr(expr, out);
        }
        // Pure-enough shapes (names, literals) stay in place.
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::This => expr.clone(),
            _ => {
                let slot = self.fresh_slot();
                out.push(self.slot_decl(&slot, expr.clone(), expr.span));
                self.mk(expr.span, ExprKind::Variable(slot))
            }
        }
    }

    fn slot_decl(&self, slot: &str, init: Expr, span: Span) -> Stmt {
        Stmt {
            span,
            kind: StmtKind::Var {
                kind: VarKind::Let,
                decls: vec![VarDeclarator {
                    name: slot.to_string(),
                    type_ann: None,
                    init: Some(init),
                    synthetic: true,
                    span,
                }],
            },
        }
    }

    fn slot_assign(&self, slot: &str, value: Expr, span: Span) -> Stmt {
        Stmt {
            span,
            kind: StmtKind::Expression(self.mk(
                span,
                ExprKind::Assign {
                    target: AssignTarget::Name(slot.to_string()),
                    value: Box::new(value),
                },
            )),
        }
    }
}

/// Whether the canonical suspend statement shape applies: a single
/// synthetic declarator initialised directly by `yield`/`await`.
#[must_use]
pub fn as_suspend_decl(stmt: &Stmt) -> Option<(&VarDeclarator, &Expr)> {
    let StmtKind::Var { decls, .. } = &stmt.kind else {
        return None;
    };
    let [decl] = decls.as_slice() else {
        return None;
    };
    let init = decl.init.as_ref()?;
    match &init.kind {
        ExprKind::Yield { .. } | ExprKind::Await(_) => Some((decl, init)),
        _ => None,
    }
}

/// Normalise a function body once, caching on the function value.
pub fn lowered_body_of(func: &Rc<FunctionValue>) -> Rc<Vec<Stmt>> {
    if let Some(cached) = func.lowered_body.borrow().as_ref() {
        return Rc::clone(cached);
    }
    let data = func.script_data().expect("script function");
    let stmts: Vec<Stmt> = match &data.body {
        FunctionBody::Block(stmts) => {
            let lowerer = Lowerer::new(u32::MAX / 2);
            lowerer.lower_body(stmts)
        }
        FunctionBody::Expr(expr) => {
            let lowerer = Lowerer::new(u32::MAX / 2);
            let mut out = Vec::new();
            let value = lowerer.lower_expr(expr, &mut out);
            out.push(Stmt {
                span: expr.span,
                kind: StmtKind::Return(Some(value)),
            });
            out
        }
    };
    let body = Rc::new(stmts);
    *func.lowered_body.borrow_mut() = Some(Rc::clone(&body));
    body
}

// =============================================================================
// Suspend detection
// =============================================================================

fn expr_operand_suspends(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Yield { value, .. } => value.as_ref().map(|v| expr_suspends(v)).unwrap_or(false),
        ExprKind::Await(inner) => expr_suspends(inner),
        _ => false,
    }
}

/// Whether an expression contains a suspend point (not counting nested
/// function bodies).
#[must_use]
pub fn expr_suspends(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Yield { .. } | ExprKind::Await(_) => true,
        ExprKind::Literal(_)
        | ExprKind::Variable(_)
        | ExprKind::This
        | ExprKind::Super { .. }
        | ExprKind::RegexLiteral { .. }
        | ExprKind::ImportMeta
        | ExprKind::Function(_)
        | ExprKind::ClassExpr(_) => false,
        ExprKind::Grouping(inner)
        | ExprKind::Delete(inner)
        | ExprKind::NonNull(inner)
        | ExprKind::Spread(inner)
        | ExprKind::DynamicImport(inner) => expr_suspends(inner),
        ExprKind::Unary { operand, .. } => expr_suspends(operand),
        ExprKind::Binary { left, right, .. } => expr_suspends(left) || expr_suspends(right),
        ExprKind::Logical { left, right, .. } => expr_suspends(left) || expr_suspends(right),
        ExprKind::NullishCoalescing { left, right } => expr_suspends(left) || expr_suspends(right),
        ExprKind::Ternary {
            cond,
            then,
            otherwise,
        } => expr_suspends(cond) || expr_suspends(then) || expr_suspends(otherwise),
        ExprKind::Assign { target, value } => {
            target_suspends(target) || expr_suspends(value)
        }
        ExprKind::CompoundAssign { target, value, .. }
        | ExprKind::LogicalAssign { target, value, .. } => {
            target_suspends(target) || expr_suspends(value)
        }
        ExprKind::Update { target, .. } => target_suspends(target),
        ExprKind::Get { object, .. } => expr_suspends(object),
        ExprKind::GetIndex { object, index, .. } => expr_suspends(object) || expr_suspends(index),
        ExprKind::PrivateGet { object, .. } => expr_suspends(object),
        ExprKind::Call { callee, args, .. } => {
            expr_suspends(callee) || args.iter().any(|a| expr_suspends(&a.expr))
        }
        ExprKind::New { callee, args, .. } => {
            expr_suspends(callee) || args.iter().any(|a| expr_suspends(&a.expr))
        }
        ExprKind::ArrayLiteral(elements) => elements.iter().any(|e| expr_suspends(&e.expr)),
        ExprKind::ObjectLiteral(properties) => properties.iter().any(|p| match p {
            ObjectProperty::KeyValue { value, .. } => expr_suspends(value),
            ObjectProperty::Spread(inner) => expr_suspends(inner),
            _ => false,
        }),
        ExprKind::TemplateLiteral { exprs, .. } | ExprKind::TaggedTemplate { exprs, .. } => {
            exprs.iter().any(expr_suspends)
        }
        ExprKind::TypeAssertion { expr: inner, .. } | ExprKind::Satisfies { expr: inner, .. } => {
            expr_suspends(inner)
        }
    }
}

fn target_suspends(target: &AssignTarget) -> bool {
    match target {
        AssignTarget::Name(_) => false,
        AssignTarget::Property { object, .. } | AssignTarget::Private { object, .. } => {
            expr_suspends(object)
        }
        AssignTarget::Index { object, index } => expr_suspends(object) || expr_suspends(index),
    }
}

/// Whether a statement contains a suspend point outside nested functions.
#[must_use]
pub fn stmt_suspends(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Expression(expr) | StmtKind::Throw(expr) => expr_suspends(expr),
        StmtKind::Var { decls, .. } => decls
            .iter()
            .any(|d| d.init.as_ref().map(|i| expr_suspends(i)).unwrap_or(false)),
        StmtKind::Return(value) => value.as_ref().map(expr_suspends).unwrap_or(false),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            expr_suspends(cond)
                || stmt_suspends(then)
                || otherwise.as_ref().map(|s| stmt_suspends(s)).unwrap_or(false)
        }
        StmtKind::While { cond, body, step } => {
            expr_suspends(cond)
                || stmt_suspends(body)
                || step.as_ref().map(expr_suspends).unwrap_or(false)
        }
        StmtKind::DoWhile { body, cond } => stmt_suspends(body) || expr_suspends(cond),
        StmtKind::ForOf { iterable, body, .. } => expr_suspends(iterable) || stmt_suspends(body),
        StmtKind::ForIn { object, body, .. } => expr_suspends(object) || stmt_suspends(body),
        StmtKind::Switch {
            discriminant,
            cases,
        } => {
            expr_suspends(discriminant)
                || cases.iter().any(|case| {
                    case.test.as_ref().map(expr_suspends).unwrap_or(false)
                        || case.body.iter().any(stmt_suspends)
                })
        }
        StmtKind::Block(stmts) => stmts.iter().any(stmt_suspends),
        StmtKind::Labeled { body, .. } => stmt_suspends(body),
        StmtKind::Try {
            block,
            catch,
            finally,
        } => {
            block.iter().any(stmt_suspends)
                || catch
                    .as_ref()
                    .map(|c| c.body.iter().any(stmt_suspends))
                    .unwrap_or(false)
                || finally
                    .as_ref()
                    .map(|f| f.iter().any(stmt_suspends))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsi_parser::Parser;

    fn generator_body(source: &str) -> Vec<Stmt> {
        let result = Parser::new("test.ts", source).parse_program();
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        let StmtKind::Function(func) = &result.program.statements[0].kind else {
            panic!("expected function");
        };
        let FunctionBody::Block(stmts) = &func.body else {
            panic!("expected block body");
        };
        Lowerer::new(result.program.node_count).lower_body(stmts)
    }

    fn count_suspend_decls(stmts: &[Stmt]) -> usize {
        let mut count = 0;
        for stmt in stmts {
            if as_suspend_decl(stmt).is_some() {
                count += 1;
            }
            match &stmt.kind {
                StmtKind::Block(inner) => count += count_suspend_decls(inner),
                StmtKind::While { body, .. } => count += count_suspend_decls(&[(**body).clone()]),
                StmtKind::If { then, otherwise, .. } => {
                    count += count_suspend_decls(&[(**then).clone()]);
                    if let Some(otherwise) = otherwise {
                        count += count_suspend_decls(&[(**otherwise).clone()]);
                    }
                }
                _ => {}
            }
        }
        count
    }

    #[test]
    fn yields_are_hoisted_to_statement_position() {
        let body = generator_body("function* g() { const x = f(yield 1, yield 2); }");
        // Two canonical suspend statements precede the call.
        assert_eq!(count_suspend_decls(&body), 2);
        // The final statement is the rewritten declaration of x.
        let StmtKind::Var { decls, .. } = &body.last().unwrap().kind else {
            panic!("expected trailing declaration");
        };
        assert_eq!(decls[0].name, "x");
    }

    #[test]
    fn direct_yield_initializer_keeps_its_binding() {
        let body = generator_body("function* g() { const a = yield 1; }");
        assert_eq!(body.len(), 1);
        let (decl, init) = as_suspend_decl(&body[0]).expect("canonical form");
        assert_eq!(decl.name, "a");
        assert!(matches!(init.kind, ExprKind::Yield { .. }));
    }

    #[test]
    fn short_circuit_right_sides_become_branches() {
        let body = generator_body("function* g() { const v = ready() && (yield 1); }");
        // The && shape must not evaluate its right side eagerly: the yield
        // lands inside an if statement.
        assert!(body.iter().any(|stmt| matches!(stmt.kind, StmtKind::If { .. })));
    }

    #[test]
    fn suspending_loop_conditions_rotate() {
        let body = generator_body("function* g() { while (yield 1) { work(); } }");
        let StmtKind::While { cond, .. } = &body[0].kind else {
            panic!("expected while");
        };
        assert!(matches!(cond.kind, ExprKind::Literal(Lit::Boolean(true))));
    }

    #[test]
    fn statements_without_suspends_are_untouched() {
        let body = generator_body("function* g() { const a = 1; work(a); yield a; }");
        assert!(matches!(&body[0].kind, StmtKind::Var { decls, .. } if decls[0].name == "a"));
        assert!(matches!(&body[1].kind, StmtKind::Expression(_)));
        assert_eq!(count_suspend_decls(&body), 1);
    }
}
