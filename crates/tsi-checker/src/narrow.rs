//! Flow-sensitive narrowing.
//!
//! `narrow_condition` inspects a guard expression and produces refinements
//! for the assumed branch. Recognised guards: `typeof x === "…"`, equality
//! against literals and null/undefined, `instanceof`, user-defined type
//! predicates, truthiness, the `in` operator, and discriminated-union tag
//! comparisons. Narrowing applies to stable reference paths (a variable or
//! a chain of static property accesses) up to a fixed depth; assignments
//! invalidate the mutated path.

use rustc_hash::FxHashMap;
use tsi_common::limits::MAX_NARROWING_PATH_DEPTH;
use tsi_parser::ast::{BinaryOp, Expr, ExprKind, Lit, LogicalOp, UnaryOp};

use crate::state::CheckerState;
use crate::types::{Type, TypeId};

impl CheckerState {
    /// A stable reference path for an expression, if it has one.
    pub(crate) fn reference_path(&self, expr: &Expr) -> Option<String> {
        fn walk(expr: &Expr, depth: u32) -> Option<String> {
            if depth > MAX_NARROWING_PATH_DEPTH {
                return None;
            }
            match &expr.kind {
                ExprKind::Variable(name) => Some(name.clone()),
                ExprKind::Get {
                    object,
                    name,
                    optional: false,
                } => Some(format!("{}.{name}", walk(object, depth + 1)?)),
                ExprKind::GetIndex {
                    object,
                    index,
                    optional: false,
                } => {
                    // Constant-index accesses participate; dynamic ones
                    // are not stable.
                    let ExprKind::Literal(Lit::Number(n)) = &index.kind else {
                        return None;
                    };
                    Some(format!(
                        "{}.{}",
                        walk(object, depth + 1)?,
                        tsi_common::numeric::format_number(*n)
                    ))
                }
                ExprKind::Grouping(inner) | ExprKind::NonNull(inner) => walk(inner, depth),
                ExprKind::This => Some("this".to_string()),
                _ => None,
            }
        }
        walk(expr, 1)
    }

    /// The current (possibly already-narrowed) type of a reference path.
    fn current_path_type(&mut self, path: &str) -> Option<TypeId> {
        if let Some(ty) = self.scopes.narrowed(path) {
            return Some(ty);
        }
        let mut segments = path.split('.');
        let root = segments.next()?;
        let mut ty = if root == "this" {
            self.this_type()
        } else {
            self.scopes.lookup_value(root)?.ty
        };
        let mut prefix = root.to_string();
        for segment in segments {
            prefix.push('.');
            prefix.push_str(segment);
            if let Some(narrowed) = self.scopes.narrowed(&prefix) {
                ty = narrowed;
                continue;
            }
            ty = self.property_type(ty, segment, tsi_common::span::Span::dummy(), false);
            if ty == TypeId::ERROR {
                return None;
            }
        }
        Some(ty)
    }

    /// Compute refinements for `cond` under the given branch assumption.
    pub(crate) fn narrow_condition(
        &mut self,
        cond: &Expr,
        assumed: bool,
        out: &mut FxHashMap<String, TypeId>,
    ) {
        match &cond.kind {
            ExprKind::Grouping(inner) => self.narrow_condition(inner, assumed, out),
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.narrow_condition(operand, !assumed, out),
            ExprKind::Logical { op, left, right } => {
                // `a && b` narrows both in the then-branch; `a || b`
                // narrows both (negatively) in the else-branch.
                let both = match op {
                    LogicalOp::And => assumed,
                    LogicalOp::Or => !assumed,
                };
                if both {
                    self.narrow_condition(left, assumed, out);
                    self.narrow_condition(right, assumed, out);
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.narrow_binary(*op, left, right, assumed, out);
            }
            ExprKind::Call { callee, args, .. } => {
                // User-defined type predicate: `isFish(pet)`.
                let Some(callee_ty) = self
                    .reference_path(callee)
                    .and_then(|path| self.current_path_type(&path))
                else {
                    return;
                };
                let Type::Function(shape) = self.types.get(callee_ty).clone() else {
                    return;
                };
                let Some((param_name, narrowed_ty)) = shape.predicate else {
                    return;
                };
                let Some(position) = shape.params.iter().position(|p| p.name == param_name)
                else {
                    return;
                };
                let Some(arg) = args.get(position) else {
                    return;
                };
                let Some(path) = self.reference_path(&arg.expr) else {
                    return;
                };
                if assumed {
                    out.insert(path, narrowed_ty);
                } else if let Some(base) = self.current_path_type(&path) {
                    let excluded = self.exclude_type(base, narrowed_ty);
                    out.insert(path, excluded);
                }
            }
            // Truthiness on a bare reference.
            _ => {
                let Some(path) = self.reference_path(cond) else {
                    return;
                };
                let Some(base) = self.current_path_type(&path) else {
                    return;
                };
                let narrowed = if assumed {
                    self.remove_falsy(base)
                } else {
                    self.keep_falsy(base)
                };
                out.insert(path, narrowed);
            }
        }
    }

    fn narrow_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        assumed: bool,
        out: &mut FxHashMap<String, TypeId>,
    ) {
        use BinaryOp::*;
        match op {
            EqEqEq | EqEq | NotEqEq | NotEq => {
                let positive = matches!(op, EqEqEq | EqEq) == assumed;
                let loose = matches!(op, EqEq | NotEq);
                // typeof guard, either side.
                if self.try_typeof_guard(left, right, positive, out) {
                    return;
                }
                if self.try_typeof_guard(right, left, positive, out) {
                    return;
                }
                // Literal comparison (covers discriminant tags via paths).
                if self.try_literal_guard(left, right, positive, loose, out) {
                    return;
                }
                let _ = self.try_literal_guard(right, left, positive, loose, out);
            }
            Instanceof => {
                let Some(path) = self.reference_path(left) else {
                    return;
                };
                let ExprKind::Variable(class_name) = &right.kind else {
                    return;
                };
                let Some(crate::env::TypeBinding::Class(class_id)) =
                    self.scopes.lookup_type(class_name).cloned()
                else {
                    return;
                };
                let instance = self.types.intern(Type::Instance(class_id, Vec::new()));
                if assumed {
                    out.insert(path, instance);
                } else if let Some(base) = self.current_path_type(&path) {
                    let excluded = self.exclude_type(base, instance);
                    out.insert(path, excluded);
                }
            }
            In => {
                // `"k" in x` keeps union members carrying field k.
                let ExprKind::Literal(Lit::String(key)) = &left.kind else {
                    return;
                };
                let Some(path) = self.reference_path(right) else {
                    return;
                };
                let Some(base) = self.current_path_type(&path) else {
                    return;
                };
                let key = key.clone();
                let narrowed = self.filter_union(base, |state, member| {
                    let has = state
                        .structural_view(member)
                        .map(|view| match state.types.get(view) {
                            Type::Record { fields, .. } => {
                                fields.iter().any(|(name, _)| *name == key)
                            }
                            _ => false,
                        })
                        .unwrap_or(false);
                    has == assumed
                });
                out.insert(path, narrowed);
            }
            _ => {}
        }
    }

    /// `typeof path === "kind"` (the literal may sit on either side).
    fn try_typeof_guard(
        &mut self,
        typeof_side: &Expr,
        literal_side: &Expr,
        positive: bool,
        out: &mut FxHashMap<String, TypeId>,
    ) -> bool {
        let ExprKind::Unary {
            op: UnaryOp::Typeof,
            operand,
        } = &typeof_side.kind
        else {
            return false;
        };
        let ExprKind::Literal(Lit::String(kind)) = &literal_side.kind else {
            return false;
        };
        let Some(path) = self.reference_path(operand) else {
            return false;
        };
        let Some(base) = self.current_path_type(&path) else {
            return false;
        };
        let Some(target) = typeof_target(kind) else {
            return false;
        };
        let narrowed = if positive {
            self.narrow_to(base, target)
        } else {
            self.exclude_type(base, target)
        };
        out.insert(path, narrowed);
        true
    }

    /// `path === <literal>` narrows to the literal; `!==` excludes it.
    fn try_literal_guard(
        &mut self,
        path_side: &Expr,
        literal_side: &Expr,
        positive: bool,
        loose: bool,
        out: &mut FxHashMap<String, TypeId>,
    ) -> bool {
        let literal_ty = match &literal_side.kind {
            ExprKind::Literal(Lit::Null) => {
                // Loose null checks cover undefined too.
                if loose {
                    let undef = TypeId::UNDEFINED;
                    let null = TypeId::NULL;
                    let both = self.types.union(vec![null, undef]);
                    both
                } else {
                    TypeId::NULL
                }
            }
            ExprKind::Literal(Lit::Undefined) => TypeId::UNDEFINED,
            ExprKind::Variable(name) if name == "undefined" => TypeId::UNDEFINED,
            ExprKind::Literal(lit) => self.literal_type(lit),
            _ => return false,
        };
        let Some(path) = self.reference_path(path_side) else {
            return false;
        };
        let Some(base) = self.current_path_type(&path) else {
            return false;
        };
        let narrowed = if positive {
            self.narrow_to(base, literal_ty)
        } else {
            self.exclude_type(base, literal_ty)
        };
        out.insert(path.clone(), narrowed);

        // Discriminant compare: `x.tag === "a"` also narrows `x` itself.
        if let Some((parent, field)) = path.rsplit_once('.') {
            if let Some(parent_ty) = self.current_path_type(parent) {
                if matches!(self.types.get(parent_ty), Type::Union(_)) {
                    let field = field.to_string();
                    let narrowed_parent = self.filter_union(parent_ty, |state, member| {
                        let member_field = state.property_type(
                            member,
                            &field,
                            tsi_common::span::Span::dummy(),
                            false,
                        );
                        let overlaps = state.is_assignable(literal_ty, member_field)
                            || state.is_assignable(member_field, literal_ty);
                        overlaps == positive
                    });
                    out.insert(parent.to_string(), narrowed_parent);
                }
            }
        }
        true
    }

    // =========================================================================
    // Refinement combinators
    // =========================================================================

    /// Refine `base` to its portion compatible with `target`.
    pub(crate) fn narrow_to(&mut self, base: TypeId, target: TypeId) -> TypeId {
        if base == TypeId::ANY || base == TypeId::ERROR {
            return target;
        }
        match self.types.get(base).clone() {
            Type::Union(members) => {
                let kept: Vec<TypeId> = members
                    .into_iter()
                    .filter(|&m| self.is_assignable(target, m) || self.is_assignable(m, target))
                    .collect();
                if kept.is_empty() {
                    target
                } else {
                    self.types.union(kept)
                }
            }
            _ => {
                if self.is_assignable(target, base) {
                    base
                } else {
                    target
                }
            }
        }
    }

    /// Remove the portion of `base` compatible with `target`.
    pub(crate) fn exclude_type(&mut self, base: TypeId, target: TypeId) -> TypeId {
        match self.types.get(base).clone() {
            Type::Union(members) => {
                let kept: Vec<TypeId> = members
                    .into_iter()
                    .filter(|&m| !self.is_assignable(target, m))
                    .collect();
                self.types.union(kept)
            }
            Type::Boolean => {
                // boolean splits into its two literals.
                if let Some(value) = match self.types.get(target) {
                    Type::BooleanLiteral(b) => Some(*b),
                    _ => None,
                } {
                    return self.types.boolean_literal(!value);
                }
                base
            }
            _ => {
                if self.is_assignable(target, base) && base == target {
                    TypeId::NEVER
                } else {
                    base
                }
            }
        }
    }

    fn filter_union(
        &mut self,
        base: TypeId,
        mut keep: impl FnMut(&mut CheckerState, TypeId) -> bool,
    ) -> TypeId {
        match self.types.get(base).clone() {
            Type::Union(members) => {
                let kept: Vec<TypeId> = members
                    .into_iter()
                    .filter(|&m| keep(self, m))
                    .collect();
                self.types.union(kept)
            }
            _ => base,
        }
    }

    /// Truthy refinement: drop null/undefined and the `false` literal.
    fn remove_falsy(&mut self, base: TypeId) -> TypeId {
        let non_null = self.types.remove_nullish(base);
        match self.types.get(non_null).clone() {
            Type::Union(members) => {
                let kept: Vec<TypeId> = members
                    .into_iter()
                    .filter(|&m| !matches!(self.types.get(m), Type::BooleanLiteral(false)))
                    .collect();
                self.types.union(kept)
            }
            _ => non_null,
        }
    }

    /// Falsy refinement: keep the nullish/false portion where the type
    /// tracks it; primitives keep themselves (literal falsiness is not
    /// tracked for string/number, matching the checker's coarse model).
    fn keep_falsy(&mut self, base: TypeId) -> TypeId {
        match self.types.get(base).clone() {
            Type::Union(members) => {
                let filtered: Vec<TypeId> = members
                    .into_iter()
                    .filter(|&m| {
                        m == TypeId::NULL
                            || m == TypeId::UNDEFINED
                            || matches!(self.types.get(m), Type::BooleanLiteral(false))
                            || m == TypeId::NUMBER
                            || m == TypeId::STRING
                            || m == TypeId::BOOLEAN
                    })
                    .collect();
                let kept: Vec<TypeId> = filtered
                    .into_iter()
                    .map(|m| {
                        if m == TypeId::BOOLEAN {
                            self.types.boolean_literal(false)
                        } else {
                            m
                        }
                    })
                    .collect();
                self.types.union(kept)
            }
            _ => base,
        }
    }
}

/// Map a typeof result string to the type it selects.
fn typeof_target(kind: &str) -> Option<TypeId> {
    match kind {
        "number" => Some(TypeId::NUMBER),
        "string" => Some(TypeId::STRING),
        "boolean" => Some(TypeId::BOOLEAN),
        "bigint" => Some(TypeId::BIGINT),
        "symbol" => Some(TypeId::SYMBOL),
        "undefined" => Some(TypeId::UNDEFINED),
        // "object" and "function" select structured types; the coarse
        // model keeps the base type for those.
        _ => None,
    }
}
