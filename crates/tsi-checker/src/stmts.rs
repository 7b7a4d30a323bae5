//! Pass 2: statement checking.

use rustc_hash::FxHashMap;
use tsi_common::diagnostics::diagnostic_codes;
use tsi_parser::ast::*;

use crate::env::{Binding, BindingKind};
use crate::state::CheckerState;
use crate::types::{Type, TypeId};

impl CheckerState {
    /// Hoist and check a statement list, marking dead code and releasing
    /// any narrowing overlays retained by terminating `if` branches.
    pub fn check_body(&mut self, stmts: &[Stmt]) {
        self.hoist_statements(stmts);
        let overlay_mark = self.retained_overlays;
        let mut terminated = false;
        for (i, stmt) in stmts.iter().enumerate() {
            if terminated {
                self.type_map.dead_code.push(stmt.span);
            }
            self.check_stmt(stmt);
            if !terminated && Self::definitely_terminates(stmt) && i + 1 < stmts.len() {
                terminated = true;
            }
        }
        while self.retained_overlays > overlay_mark {
            self.scopes.pop_narrowing();
            self.retained_overlays -= 1;
        }
    }

    pub fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Var { kind, decls } => self.check_var(*kind, decls),
            StmtKind::Function(func) => {
                // The binding was hoisted; checking validates the body.
                self.check_function_like(func);
            }
            StmtKind::Class(class) => self.check_class(class),
            StmtKind::Interface { .. } | StmtKind::TypeAlias { .. } | StmtKind::Enum { .. } => {
                // Fully handled during hoisting.
            }
            StmtKind::Namespace { body, .. } => {
                self.scopes.push();
                self.check_body(body);
                self.scopes.pop();
            }
            StmtKind::Import { .. } => {}
            StmtKind::Export(kind) => match kind {
                ExportKind::Decl(inner) => self.check_stmt(inner),
                ExportKind::DefaultExpr(expr) => {
                    self.check_expr(expr);
                }
                ExportKind::Named(specs) => {
                    for spec in specs {
                        if self.scopes.lookup_value(&spec.local).is_none() {
                            crate::state::not_in_scope(self, &spec.local, stmt.span);
                        }
                    }
                }
                ExportKind::Star { .. } => {}
            },

            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.check_expr(cond);
                let mut then_refinements = FxHashMap::default();
                self.narrow_condition(cond, true, &mut then_refinements);
                self.scopes.push_narrowing(then_refinements);
                self.check_stmt(then);
                self.scopes.pop_narrowing();

                let mut else_refinements = FxHashMap::default();
                self.narrow_condition(cond, false, &mut else_refinements);
                self.scopes.push_narrowing(else_refinements);
                if let Some(otherwise) = otherwise {
                    self.check_stmt(otherwise);
                }
                // A terminating then-branch leaves the negative refinement
                // in force for the rest of the enclosing body.
                if Self::definitely_terminates(then) {
                    self.retained_overlays += 1;
                } else {
                    self.scopes.pop_narrowing();
                }
            }
            StmtKind::While { cond, body, step } => {
                self.check_expr(cond);
                let mut refinements = FxHashMap::default();
                self.narrow_condition(cond, true, &mut refinements);
                self.scopes.push_narrowing(refinements);
                self.check_stmt(body);
                if let Some(step) = step {
                    self.check_expr(step);
                }
                self.scopes.pop_narrowing();
            }
            StmtKind::DoWhile { body, cond } => {
                self.check_stmt(body);
                self.check_expr(cond);
            }
            StmtKind::ForOf {
                binding,
                binding_kind,
                iterable,
                body,
            } => {
                let iterable_ty = self.check_expr(iterable);
                let element_ty = self.element_type_of_iterable(iterable_ty, iterable.span);
                self.scopes.push();
                self.scopes.declare_value(
                    binding,
                    Binding {
                        ty: element_ty,
                        kind: binding_kind_of(*binding_kind),
                    },
                );
                self.check_stmt(body);
                self.scopes.pop();
            }
            StmtKind::ForIn {
                binding,
                binding_kind,
                object,
                body,
            } => {
                self.check_expr(object);
                self.scopes.push();
                self.scopes.declare_value(
                    binding,
                    Binding {
                        ty: TypeId::STRING,
                        kind: binding_kind_of(*binding_kind),
                    },
                );
                self.check_stmt(body);
                self.scopes.pop();
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                let discriminant_ty = self.check_expr(discriminant);
                for case in cases {
                    if let Some(test) = &case.test {
                        let test_ty = self.check_expr(test);
                        // Cases must overlap the discriminant.
                        let widened = self.types.widen(test_ty);
                        let disc_w = self.types.widen(discriminant_ty);
                        if !self.is_assignable(disc_w, widened)
                            && !self.is_assignable(widened, disc_w)
                        {
                            let test_text = self.display_type(test_ty);
                            let disc_text = self.display_type(discriminant_ty);
                            self.error_at(
                                test.span,
                                format!(
                                    "Type '{test_text}' is not comparable to type '{disc_text}'."
                                ),
                                diagnostic_codes::TYPE_NOT_ASSIGNABLE,
                            );
                        }
                    }
                    // Discriminant-equality refinement inside the case body.
                    self.scopes.push();
                    let mut refinements = FxHashMap::default();
                    if let (Some(path), Some(test)) =
                        (self.reference_path(discriminant), &case.test)
                    {
                        if let ExprKind::Literal(lit) = &test.kind {
                            let lit_ty = self.literal_type(lit);
                            if let Some(narrowed) = self.narrow_to_path(&path, lit_ty) {
                                refinements.insert(path.clone(), narrowed);
                            }
                        }
                    }
                    self.scopes.push_narrowing(refinements);
                    self.check_body(&case.body);
                    self.scopes.pop_narrowing();
                    self.scopes.pop();
                }
            }
            StmtKind::Block(stmts) => {
                self.scopes.push();
                self.check_body(stmts);
                self.scopes.pop();
            }
            StmtKind::Return(value) => {
                let value_ty = match value {
                    Some(expr) => self.check_expr(expr),
                    None => TypeId::UNDEFINED,
                };
                if let Some(Some(expected)) = self.return_types.last().copied() {
                    if expected != TypeId::VOID && expected != TypeId::ANY {
                        let span = value.as_ref().map(|e| e.span).unwrap_or(stmt.span);
                        self.check_assignment(expected, value_ty, span);
                    }
                }
            }
            StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Empty => {}
            StmtKind::Labeled { body, .. } => self.check_stmt(body),
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                self.scopes.push();
                self.check_body(block);
                self.scopes.pop();
                if let Some(catch) = catch {
                    self.scopes.push();
                    if let Some(binding) = &catch.binding {
                        let ty = catch
                            .type_ann
                            .as_ref()
                            .map(|node| self.resolve_type(node))
                            .unwrap_or(TypeId::ANY);
                        self.scopes.declare_value(
                            binding,
                            Binding {
                                ty,
                                kind: BindingKind::Let,
                            },
                        );
                    }
                    self.check_body(&catch.body);
                    self.scopes.pop();
                }
                if let Some(finally) = finally {
                    self.scopes.push();
                    self.check_body(finally);
                    self.scopes.pop();
                }
            }
            StmtKind::Throw(expr) => {
                self.check_expr(expr);
            }
        }
    }

    fn check_var(&mut self, kind: VarKind, decls: &[VarDeclarator]) {
        for decl in decls {
            let annotated = decl.type_ann.as_ref().map(|node| self.resolve_type(node));
            let init_ty = decl.init.as_ref().map(|expr| self.check_expr(expr));

            let binding_ty = match (annotated, init_ty) {
                (Some(expected), Some(actual)) => {
                    self.check_assignment(expected, actual, decl.span);
                    expected
                }
                (Some(expected), None) => expected,
                (None, Some(actual)) => {
                    if kind == VarKind::Const {
                        // Const bindings keep literal types; freshness ends
                        // at the binding either way.
                        self.types.without_freshness(actual)
                    } else {
                        self.types.widen(actual)
                    }
                }
                (None, None) => {
                    if self.options.no_implicit_any && !decl.synthetic {
                        self.error_at(
                            decl.span,
                            format!("Variable '{}' implicitly has an 'any' type.", decl.name),
                            diagnostic_codes::IMPLICIT_ANY,
                        );
                    }
                    TypeId::ANY
                }
            };

            // `var` was hoisted; refine its placeholder in place.
            if kind == VarKind::Var {
                self.scopes.update_value_type(&decl.name, binding_ty);
            } else {
                if self.scopes.declared_here(&decl.name) && !decl.synthetic {
                    self.error_at(
                        decl.span,
                        format!("Duplicate declaration of '{}'.", decl.name),
                        diagnostic_codes::DUPLICATE_DECLARATION,
                    );
                }
                self.scopes.declare_value(
                    &decl.name,
                    Binding {
                        ty: binding_ty,
                        kind: binding_kind_of(kind),
                    },
                );
            }
        }
    }

    fn element_type_of_iterable(&mut self, iterable: TypeId, span: tsi_common::span::Span) -> TypeId {
        if iterable == TypeId::ANY || iterable == TypeId::ERROR {
            return TypeId::ANY;
        }
        match self.types.get(iterable).clone() {
            Type::Array(element) => element,
            Type::Tuple { elements, rest } => {
                let mut members = elements;
                if let Some(rest) = rest {
                    members.push(rest);
                }
                self.types.union(members)
            }
            Type::String | Type::StringLiteral(_) => TypeId::STRING,
            Type::Union(members) => {
                let mut result = Vec::new();
                for member in members {
                    result.push(self.element_type_of_iterable(member, span));
                }
                self.types.union(result)
            }
            // Maps, sets and generator objects type their elements
            // opaquely in the single-file surface.
            Type::Instance(..) | Type::Interface(_) | Type::Record { .. } => TypeId::ANY,
            _ => {
                let shown = self.display_type(iterable);
                self.error_at(
                    span,
                    format!("Type '{shown}' is not iterable."),
                    diagnostic_codes::NOT_ITERABLE,
                );
                TypeId::ERROR
            }
        }
    }

    fn narrow_to_path(&mut self, path: &str, target: TypeId) -> Option<TypeId> {
        let root = path.split('.').next()?;
        let base = self.scopes.lookup_value(root)?.ty;
        if path == root {
            Some(self.narrow_to(base, target))
        } else {
            None
        }
    }

    /// Conservative termination check used for dead-code marking and
    /// post-if refinement retention.
    fn definitely_terminates(stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Return(_) | StmtKind::Throw(_) | StmtKind::Break(_)
            | StmtKind::Continue(_) => true,
            StmtKind::Block(stmts) => stmts.iter().any(Self::definitely_terminates),
            StmtKind::If {
                then,
                otherwise: Some(otherwise),
                ..
            } => Self::definitely_terminates(then) && Self::definitely_terminates(otherwise),
            _ => false,
        }
    }
}

fn binding_kind_of(kind: VarKind) -> BindingKind {
    match kind {
        VarKind::Var => BindingKind::Var,
        VarKind::Let => BindingKind::Let,
        VarKind::Const => BindingKind::Const,
    }
}
