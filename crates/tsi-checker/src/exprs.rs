//! Pass 2: expression checking.
//!
//! One dispatcher over expression variants; every computed type lands in
//! the type map keyed by node identity. On error the expression types as
//! `ERROR`, which is compatible in both directions so a single mistake
//! does not cascade.

use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;
use tsi_parser::ast::*;

use crate::env::{Binding, BindingKind, TypeBinding};
use crate::state::{CheckerState, Visibility};
use crate::type_map::ResolvedIdent;
use crate::types::{FieldInfo, FunctionShape, Type, TypeId};

impl CheckerState {
    /// Compute (and record) the type of an expression.
    pub fn check_expr(&mut self, expr: &Expr) -> TypeId {
        let ty = self.check_expr_inner(expr);
        self.type_map.record_expr(expr.id, ty);
        ty
    }

    fn check_expr_inner(&mut self, expr: &Expr) -> TypeId {
        match &expr.kind {
            ExprKind::Literal(lit) => self.literal_type(lit),
            ExprKind::Variable(name) => self.check_variable(name, expr),
            ExprKind::This => self.this_type(),
            ExprKind::Super { method } => self.check_super(method.as_deref(), expr.span),
            ExprKind::Grouping(inner) => self.check_expr(inner),

            ExprKind::Binary { op, left, right } => {
                let left_ty = self.check_expr(left);
                let right_ty = self.check_expr(right);
                self.binary_type(*op, left_ty, right_ty, expr.span)
            }
            ExprKind::Logical { left, right, .. } => {
                let left_ty = self.check_expr(left);
                let mut refinements = rustc_hash::FxHashMap::default();
                self.narrow_condition(left, true, &mut refinements);
                self.scopes.push_narrowing(refinements);
                let right_ty = self.check_expr(right);
                self.scopes.pop_narrowing();
                self.types.union(vec![left_ty, right_ty])
            }
            ExprKind::NullishCoalescing { left, right } => {
                let left_ty = self.check_expr(left);
                let right_ty = self.check_expr(right);
                let non_null = self.types.remove_nullish(left_ty);
                self.types.union(vec![non_null, right_ty])
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expr(operand);
                match op {
                    UnaryOp::Minus | UnaryOp::Plus | UnaryOp::BitNot => {
                        if operand_ty == TypeId::BIGINT {
                            TypeId::BIGINT
                        } else {
                            TypeId::NUMBER
                        }
                    }
                    UnaryOp::Not => TypeId::BOOLEAN,
                    UnaryOp::Typeof => TypeId::STRING,
                    UnaryOp::Void => TypeId::UNDEFINED,
                }
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.check_expr(cond);
                let mut then_refinements = rustc_hash::FxHashMap::default();
                self.narrow_condition(cond, true, &mut then_refinements);
                self.scopes.push_narrowing(then_refinements);
                let then_ty = self.check_expr(then);
                self.scopes.pop_narrowing();

                let mut else_refinements = rustc_hash::FxHashMap::default();
                self.narrow_condition(cond, false, &mut else_refinements);
                self.scopes.push_narrowing(else_refinements);
                let else_ty = self.check_expr(otherwise);
                self.scopes.pop_narrowing();

                self.types.union(vec![then_ty, else_ty])
            }
            ExprKind::Delete(target) => {
                self.check_expr(target);
                TypeId::BOOLEAN
            }

            ExprKind::Assign { target, value } => self.check_assign(target, value, expr.span),
            ExprKind::CompoundAssign { target, op, value } => {
                let target_ty = self.check_target_read(target, expr.span);
                let value_ty = self.check_expr(value);
                let result = self.binary_type(*op, target_ty, value_ty, expr.span);
                self.invalidate_target(target);
                result
            }
            ExprKind::LogicalAssign { target, value, .. } => {
                let target_ty = self.check_target_read(target, expr.span);
                let value_ty = self.check_expr(value);
                self.invalidate_target(target);
                self.types.union(vec![target_ty, value_ty])
            }
            ExprKind::Update { target, .. } => {
                let target_ty = self.check_target_read(target, expr.span);
                if target_ty != TypeId::ANY
                    && target_ty != TypeId::ERROR
                    && target_ty != TypeId::BIGINT
                    && !self.is_assignable(TypeId::NUMBER, target_ty)
                {
                    let shown = self.display_type(target_ty);
                    self.error_at(
                        expr.span,
                        format!(
                            "An arithmetic operand must be of type 'number' or 'bigint', got '{shown}'."
                        ),
                        diagnostic_codes::OPERATOR_TYPE_MISMATCH,
                    );
                }
                self.invalidate_target(target);
                if target_ty == TypeId::BIGINT {
                    TypeId::BIGINT
                } else {
                    TypeId::NUMBER
                }
            }

            ExprKind::Get {
                object,
                name,
                optional,
            } => {
                let object_ty = self.check_expr(object);
                let base = if *optional {
                    self.types.remove_nullish(object_ty)
                } else {
                    object_ty
                };
                // Const-enum member accesses fold to their computed values.
                if let Type::Enum(enum_id) = self.types.get(base) {
                    let info = self.enum_info(*enum_id).clone();
                    if let Some(index) = info.members.iter().position(|(n, _)| n == name) {
                        if info.is_const && !self.options.preserve_const_enums {
                            self.type_map
                                .inlined_enum_values
                                .insert(expr.id, info.members[index].1.clone());
                        }
                        return self
                            .types
                            .intern(Type::EnumMember(*enum_id, index as u32));
                    }
                }
                let mut result = self.property_type(base, name, expr.span, true);
                if *optional && self.types.is_nullish_candidate(object_ty) {
                    result = self.types.union(vec![result, TypeId::UNDEFINED]);
                }
                // Record the narrowed view for back ends observing this site.
                if let Some(path) = self.reference_path(expr) {
                    if let Some(narrowed) = self.scopes.narrowed(&path) {
                        self.type_map.record_narrowed(expr.id, narrowed);
                        return narrowed;
                    }
                }
                result
            }
            ExprKind::GetIndex {
                object,
                index,
                optional,
            } => {
                let object_ty = self.check_expr(object);
                let index_ty = self.check_expr(index);
                let base = if *optional {
                    self.types.remove_nullish(object_ty)
                } else {
                    object_ty
                };
                let mut result = self.index_type(base, index_ty, expr.span);
                if *optional && self.types.is_nullish_candidate(object_ty) {
                    result = self.types.union(vec![result, TypeId::UNDEFINED]);
                }
                result
            }
            ExprKind::PrivateGet { object, name } => {
                let object_ty = self.check_expr(object);
                let _ = object_ty;
                match self.class_stack.last().copied() {
                    Some(class_id) => match self.class(class_id).instance.get(name) {
                        Some(member) => member.ty,
                        None => {
                            let class_name = self.class(class_id).name.clone();
                            self.error_at(
                                expr.span,
                                format!(
                                    "Property '#{name}' does not exist on class '{class_name}'."
                                ),
                                diagnostic_codes::PROPERTY_DOES_NOT_EXIST,
                            );
                            TypeId::ERROR
                        }
                    },
                    None => {
                        self.error_at(
                            expr.span,
                            "Private fields are only accessible inside class bodies.".to_string(),
                            diagnostic_codes::PRIVATE_MEMBER_ACCESS,
                        );
                        TypeId::ERROR
                    }
                }
            }

            ExprKind::Call {
                callee,
                args,
                type_args,
                optional,
            } => self.check_call_expr(callee, args, type_args, *optional, expr.span),
            ExprKind::New {
                callee,
                args,
                type_args,
            } => self.check_new(callee, args, type_args, expr.span),
            ExprKind::Function(func) => self.check_function_like(func),

            ExprKind::ArrayLiteral(elements) => {
                let mut member_types = Vec::new();
                for element in elements {
                    let ty = self.check_expr(&element.expr);
                    if element.spread {
                        match self.types.get(ty) {
                            Type::Array(inner) => member_types.push(*inner),
                            Type::Tuple { elements, .. } => {
                                member_types.extend(elements.iter().copied());
                            }
                            _ => member_types.push(TypeId::ANY),
                        }
                    } else {
                        member_types.push(self.types.widen(ty));
                    }
                }
                let element_ty = self.types.union(member_types);
                let element_ty = if element_ty == TypeId::NEVER {
                    TypeId::ANY
                } else {
                    element_ty
                };
                self.types.array(element_ty)
            }
            ExprKind::ObjectLiteral(properties) => self.check_object_literal(properties),
            ExprKind::Spread(inner) => self.check_expr(inner),

            ExprKind::TemplateLiteral { exprs, .. } => {
                for sub in exprs {
                    self.check_expr(sub);
                }
                TypeId::STRING
            }
            ExprKind::TaggedTemplate { tag, exprs, .. } => {
                let tag_ty = self.check_expr(tag);
                for sub in exprs {
                    self.check_expr(sub);
                }
                match self.types.get(tag_ty) {
                    Type::Function(shape) => shape.ret,
                    _ => TypeId::ANY,
                }
            }
            ExprKind::RegexLiteral { .. } => TypeId::ANY,

            ExprKind::TypeAssertion { expr: inner, type_ann } => {
                self.check_expr(inner);
                self.resolve_type(type_ann)
            }
            ExprKind::Satisfies { expr: inner, type_ann } => {
                let expr_ty = self.check_expr(inner);
                let target = self.resolve_type(type_ann);
                self.check_assignment(target, expr_ty, inner.span);
                expr_ty
            }
            ExprKind::NonNull(inner) => {
                let inner_ty = self.check_expr(inner);
                self.types.remove_nullish(inner_ty)
            }

            ExprKind::Await(inner) => {
                let inner_ty = self.check_expr(inner);
                // Promise payloads are opaque in the single-file surface;
                // awaiting a non-promise passes the value through.
                inner_ty
            }
            ExprKind::Yield { value, .. } => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
                TypeId::ANY
            }
            ExprKind::DynamicImport(path) => {
                self.check_expr(path);
                TypeId::ANY
            }
            ExprKind::ImportMeta => {
                let url = TypeId::STRING;
                self.record(vec![("url", url), ("path", url)])
            }
            ExprKind::ClassExpr(_) => TypeId::ANY,
        }
    }

    pub(crate) fn literal_type(&mut self, lit: &Lit) -> TypeId {
        match lit {
            Lit::Number(n) => self.types.number_literal(*n),
            Lit::String(s) => {
                let s = s.clone();
                self.types.string_literal(&s)
            }
            Lit::Boolean(b) => self.types.boolean_literal(*b),
            Lit::BigInt(_) => TypeId::BIGINT,
            Lit::Null => TypeId::NULL,
            Lit::Undefined => TypeId::UNDEFINED,
        }
    }

    fn check_variable(&mut self, name: &str, expr: &Expr) -> TypeId {
        if let Some(narrowed) = self.scopes.narrowed(name) {
            self.type_map.record_narrowed(expr.id, narrowed);
            return narrowed;
        }
        match self.scopes.lookup_value(name) {
            Some(binding) => {
                let ty = binding.ty;
                self.type_map.record_ident(
                    expr.id,
                    ResolvedIdent {
                        scope_depth: self.scopes.depth() as u32,
                    },
                );
                ty
            }
            None => crate::state::not_in_scope(self, name, expr.span),
        }
    }

    pub(crate) fn this_type(&mut self) -> TypeId {
        match self.class_stack.last().copied() {
            Some(id) => self.types.intern(Type::Instance(id, Vec::new())),
            None => TypeId::ANY,
        }
    }

    fn check_super(&mut self, method: Option<&str>, span: Span) -> TypeId {
        let Some(&class_id) = self.class_stack.last() else {
            self.error_at(
                span,
                "'super' is only allowed inside a class body.".to_string(),
                diagnostic_codes::SUPER_OUTSIDE_CLASS,
            );
            return TypeId::ERROR;
        };
        let Some(super_id) = self.class(class_id).superclass else {
            self.error_at(
                span,
                "'super' requires the class to extend another class.".to_string(),
                diagnostic_codes::SUPER_OUTSIDE_CLASS,
            );
            return TypeId::ERROR;
        };
        match method {
            None => {
                // `super(...)`: the constructor callee.
                self.class(super_id)
                    .ctor
                    .unwrap_or_else(|| self.fn_variadic(TypeId::VOID))
            }
            Some(name) => match self.find_instance_member(super_id, name) {
                Some((_, member)) => member.ty,
                None => {
                    let super_name = self.class(super_id).name.clone();
                    self.error_at(
                        span,
                        format!("Property '{name}' does not exist on type '{super_name}'."),
                        diagnostic_codes::PROPERTY_DOES_NOT_EXIST,
                    );
                    TypeId::ERROR
                }
            },
        }
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    fn check_assign(&mut self, target: &AssignTarget, value: &Expr, span: Span) -> TypeId {
        let value_ty = self.check_expr(value);
        match target {
            AssignTarget::Name(name) => {
                let binding = self
                    .scopes
                    .lookup_value(name)
                    .map(|b| (b.ty, b.is_mutable() || b.kind == BindingKind::Builtin));
                match binding {
                    Some((slot, mutable)) => {
                        if !mutable {
                            self.error_at(
                                span,
                                format!("Cannot assign to '{name}' because it is a constant."),
                                diagnostic_codes::CANNOT_ASSIGN_TO_CONST,
                            );
                        }
                        self.check_assignment(slot, value_ty, span);
                    }
                    None => {
                        crate::state::not_in_scope(self, name, span);
                    }
                }
                self.scopes.invalidate_path(name);
            }
            AssignTarget::Property { object, name } => {
                let object_ty = self.check_expr(object);
                let slot = self.property_type(object_ty, name, span, false);
                self.check_readonly_write(object_ty, name, span);
                if slot != TypeId::ERROR {
                    self.check_assignment(slot, value_ty, span);
                }
                self.invalidate_target(target);
            }
            AssignTarget::Index { object, index } => {
                let object_ty = self.check_expr(object);
                let index_ty = self.check_expr(index);
                let slot = self.index_type(object_ty, index_ty, span);
                if slot != TypeId::ERROR && slot != TypeId::UNDEFINED {
                    self.check_assignment(slot, value_ty, span);
                }
            }
            AssignTarget::Private { object, name } => {
                self.check_expr(object);
                if let Some(&class_id) = self.class_stack.last() {
                    if let Some(member) = self.class(class_id).instance.get(name) {
                        let slot = member.ty;
                        self.check_assignment(slot, value_ty, span);
                    }
                }
            }
        }
        value_ty
    }

    fn check_readonly_write(&mut self, object_ty: TypeId, name: &str, span: Span) {
        let readonly = match self.types.get(object_ty) {
            Type::Record { fields, .. } => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, info)| info.readonly)
                .unwrap_or(false),
            Type::Instance(id, _) => self
                .find_instance_member(*id, name)
                .map(|(_, member)| member.readonly)
                .unwrap_or(false),
            Type::Interface(_) => {
                let view = self.structural_view(object_ty);
                view.map(|record| match self.types.get(record) {
                    Type::Record { fields, .. } => fields
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, info)| info.readonly)
                        .unwrap_or(false),
                    _ => false,
                })
                .unwrap_or(false)
            }
            _ => false,
        };
        if readonly {
            self.error_at(
                span,
                format!("Cannot assign to '{name}' because it is a read-only property."),
                diagnostic_codes::CANNOT_ASSIGN_TO_CONST,
            );
        }
    }

    /// Type of an assignment target read (for compound ops).
    pub(crate) fn check_target_read(&mut self, target: &AssignTarget, span: Span) -> TypeId {
        match target {
            AssignTarget::Name(name) => {
                let binding = self
                    .scopes
                    .lookup_value(name)
                    .map(|b| (b.ty, b.is_mutable() || b.kind == BindingKind::Builtin));
                match binding {
                    Some((ty, mutable)) => {
                        if !mutable {
                            self.error_at(
                                span,
                                format!("Cannot assign to '{name}' because it is a constant."),
                                diagnostic_codes::CANNOT_ASSIGN_TO_CONST,
                            );
                        }
                        ty
                    }
                    None => crate::state::not_in_scope(self, name, span),
                }
            }
            AssignTarget::Property { object, name } => {
                let object_ty = self.check_expr(object);
                self.property_type(object_ty, name, span, false)
            }
            AssignTarget::Index { object, index } => {
                let object_ty = self.check_expr(object);
                let index_ty = self.check_expr(index);
                self.index_type(object_ty, index_ty, span)
            }
            AssignTarget::Private { object, name } => {
                self.check_expr(object);
                self.class_stack
                    .last()
                    .and_then(|&id| self.class(id).instance.get(name).map(|m| m.ty))
                    .unwrap_or(TypeId::ANY)
            }
        }
    }

    /// Reassignment invalidates narrowings for the mutated path.
    pub(crate) fn invalidate_target(&mut self, target: &AssignTarget) {
        match target {
            AssignTarget::Name(name) => self.scopes.invalidate_path(name),
            AssignTarget::Property { object, name } => {
                if let Some(base) = self.reference_path(object) {
                    self.scopes.invalidate_path(&format!("{base}.{name}"));
                    self.scopes.invalidate_path(&base);
                }
            }
            AssignTarget::Index { object, .. } => {
                if let Some(base) = self.reference_path(object) {
                    self.scopes.invalidate_path(&base);
                }
            }
            AssignTarget::Private { .. } => {}
        }
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn binary_type(&mut self, op: BinaryOp, left: TypeId, right: TypeId, span: Span) -> TypeId {
        use BinaryOp::*;
        let left_w = self.types.widen(left);
        let right_w = self.types.widen(right);
        match op {
            Add => {
                if left_w == TypeId::STRING || right_w == TypeId::STRING {
                    return TypeId::STRING;
                }
                if left_w == TypeId::BIGINT || right_w == TypeId::BIGINT {
                    if left_w != right_w
                        && left_w != TypeId::ANY
                        && right_w != TypeId::ANY
                        && left_w != TypeId::ERROR
                        && right_w != TypeId::ERROR
                    {
                        self.error_at(
                            span,
                            "Operator '+' cannot mix 'bigint' and 'number' operands.".to_string(),
                            diagnostic_codes::OPERATOR_TYPE_MISMATCH,
                        );
                        return TypeId::ERROR;
                    }
                    return TypeId::BIGINT;
                }
                if left_w == TypeId::ANY || right_w == TypeId::ANY {
                    return TypeId::ANY;
                }
                TypeId::NUMBER
            }
            Sub | Mul | Div | Rem | Exp => {
                if left_w == TypeId::BIGINT && right_w == TypeId::BIGINT {
                    TypeId::BIGINT
                } else if (left_w == TypeId::BIGINT) != (right_w == TypeId::BIGINT)
                    && left_w != TypeId::ANY
                    && right_w != TypeId::ANY
                {
                    self.error_at(
                        span,
                        "Arithmetic cannot mix 'bigint' and 'number' operands.".to_string(),
                        diagnostic_codes::OPERATOR_TYPE_MISMATCH,
                    );
                    TypeId::ERROR
                } else {
                    TypeId::NUMBER
                }
            }
            Shl | Shr | UShr | BitAnd | BitOr | BitXor => {
                if left_w == TypeId::BIGINT && right_w == TypeId::BIGINT {
                    TypeId::BIGINT
                } else {
                    TypeId::NUMBER
                }
            }
            EqEq | NotEq | EqEqEq | NotEqEq | Lt | LtEq | Gt | GtEq | In | Instanceof => {
                TypeId::BOOLEAN
            }
        }
    }

    // =========================================================================
    // Property and index access
    // =========================================================================

    /// The type of `object.name`. `report` gates the not-found diagnostic
    /// (narrowing probes pass false).
    pub(crate) fn property_type(
        &mut self,
        object: TypeId,
        name: &str,
        span: Span,
        report: bool,
    ) -> TypeId {
        if object == TypeId::ANY || object == TypeId::ERROR {
            return TypeId::ANY;
        }
        match self.types.get(object).clone() {
            Type::Record {
                fields,
                string_index,
                ..
            } => {
                if let Some((_, info)) = fields.iter().find(|(n, _)| n == name) {
                    if info.optional && self.options.exact_optional_property_types {
                        return self.types.union(vec![info.ty, TypeId::UNDEFINED]);
                    }
                    return info.ty;
                }
                if let Some(index_ty) = string_index {
                    return index_ty;
                }
                self.property_missing(object, name, span, report)
            }
            Type::Instance(class_id, _) => {
                match self.find_instance_member(class_id, name) {
                    Some((owner, member)) => {
                        let ty = member.ty;
                        let visibility = member.visibility;
                        if visibility == Visibility::Private
                            && self.class_stack.last() != Some(&owner)
                        {
                            let class_name = self.class(owner).name.clone();
                            self.error_at(
                                span,
                                format!(
                                    "Property '{name}' is private and only accessible within class '{class_name}'."
                                ),
                                diagnostic_codes::PRIVATE_MEMBER_ACCESS,
                            );
                        }
                        ty
                    }
                    None => self.property_missing(object, name, span, report),
                }
            }
            Type::Class(class_id) => match self.class(class_id).statics.get(name) {
                Some(member) => member.ty,
                None => self.property_missing(object, name, span, report),
            },
            Type::Interface(_) => {
                let view = self.structural_view(object);
                match view {
                    Some(record) => self.property_type(record, name, span, report),
                    None => TypeId::ANY,
                }
            }
            Type::Array(element) => self.array_member_type(element, name, object, span, report),
            Type::Tuple { elements, .. } => {
                if name == "length" {
                    return self.types.number_literal(elements.len() as f64);
                }
                let element = self.types.union(elements);
                self.array_member_type(element, name, object, span, report)
            }
            Type::String | Type::StringLiteral(_) => self.string_member_type(name),
            Type::Union(members) => {
                let mut result = Vec::new();
                for member in members {
                    let ty = self.property_type(member, name, span, report);
                    if ty == TypeId::ERROR {
                        return TypeId::ERROR;
                    }
                    result.push(ty);
                }
                self.types.union(result)
            }
            Type::Enum(_) | Type::EnumMember(..) => {
                // Enum member objects expose the primitive surface.
                TypeId::ANY
            }
            Type::Function(_) | Type::Overloads(_) => match name {
                "length" => TypeId::NUMBER,
                "name" => TypeId::STRING,
                "call" | "apply" | "bind" => TypeId::ANY,
                _ => self.property_missing(object, name, span, report),
            },
            Type::Number | Type::NumberLiteral(_) => match name {
                "toFixed" | "toPrecision" | "toString" => self.fn_variadic(TypeId::STRING),
                _ => self.property_missing(object, name, span, report),
            },
            Type::TypeParam(_) | Type::Infer(_) => TypeId::ANY,
            _ => self.property_missing(object, name, span, report),
        }
    }

    fn property_missing(
        &mut self,
        object: TypeId,
        name: &str,
        span: Span,
        report: bool,
    ) -> TypeId {
        if report {
            let shown = self.display_type(object);
            self.error_at(
                span,
                format!("Property '{name}' does not exist on type '{shown}'."),
                diagnostic_codes::PROPERTY_DOES_NOT_EXIST,
            );
        }
        TypeId::ERROR
    }

    /// Built-in members on arrays. Generic callbacks are modelled with a
    /// `U` type parameter so call-site inference flows element types.
    fn array_member_type(
        &mut self,
        element: TypeId,
        name: &str,
        object: TypeId,
        span: Span,
        report: bool,
    ) -> TypeId {
        let array_ty = self.types.array(element);
        let number = TypeId::NUMBER;
        match name {
            "length" => number,
            "push" | "unshift" => {
                let shape = FunctionShape {
                    params: vec![crate::types::ParamInfo {
                        name: "items".to_string(),
                        ty: array_ty,
                        optional: false,
                        rest: true,
                    }],
                    ret: number,
                    type_params: Vec::new(),
                    this_type: None,
                    predicate: None,
                };
                self.types.intern(Type::Function(shape))
            }
            "pop" | "shift" => {
                let ret = self.types.union(vec![element, TypeId::UNDEFINED]);
                self.fn_of(vec![], ret)
            }
            "slice" => self.fn_of(vec![("start", number), ("end", number)], array_ty),
            "splice" | "concat" | "flat" | "reverse" | "sort" | "fill" => {
                self.fn_variadic(array_ty)
            }
            "join" => self.fn_of(vec![("separator", TypeId::STRING)], TypeId::STRING),
            "indexOf" | "lastIndexOf" | "findIndex" => self.fn_variadic(number),
            "includes" | "some" | "every" => self.fn_variadic(TypeId::BOOLEAN),
            "find" => {
                let ret = self.types.union(vec![element, TypeId::UNDEFINED]);
                self.fn_variadic(ret)
            }
            "filter" => {
                let callback = self.fn_of(
                    vec![("value", element), ("index", number)],
                    TypeId::BOOLEAN,
                );
                self.fn_of(vec![("predicate", callback)], array_ty)
            }
            "map" => {
                let u = self.types.intern(Type::TypeParam("U".to_string()));
                let u_array = self.types.array(u);
                let callback = self.fn_of(vec![("value", element), ("index", number)], u);
                let shape = FunctionShape {
                    params: vec![crate::types::ParamInfo {
                        name: "callback".to_string(),
                        ty: callback,
                        optional: false,
                        rest: false,
                    }],
                    ret: u_array,
                    type_params: vec!["U".to_string()],
                    this_type: None,
                    predicate: None,
                };
                self.types.intern(Type::Function(shape))
            }
            "reduce" | "reduceRight" => {
                let u = self.types.intern(Type::TypeParam("U".to_string()));
                let callback = self.fn_of(
                    vec![("accumulator", u), ("value", element), ("index", number)],
                    u,
                );
                let shape = FunctionShape {
                    params: vec![
                        crate::types::ParamInfo {
                            name: "callback".to_string(),
                            ty: callback,
                            optional: false,
                            rest: false,
                        },
                        crate::types::ParamInfo {
                            name: "initial".to_string(),
                            ty: u,
                            optional: true,
                            rest: false,
                        },
                    ],
                    ret: u,
                    type_params: vec!["U".to_string()],
                    this_type: None,
                    predicate: None,
                };
                self.types.intern(Type::Function(shape))
            }
            "forEach" => {
                let callback = self.fn_of(vec![("value", element), ("index", number)], TypeId::VOID);
                self.fn_of(vec![("callback", callback)], TypeId::VOID)
            }
            "keys" | "values" | "entries" | "at" => self.fn_variadic(TypeId::ANY),
            _ => self.property_missing(object, name, span, report),
        }
    }

    fn string_member_type(&mut self, name: &str) -> TypeId {
        let string = TypeId::STRING;
        let number = TypeId::NUMBER;
        match name {
            "length" => number,
            "charAt" | "slice" | "substring" | "toUpperCase" | "toLowerCase" | "trim"
            | "trimStart" | "trimEnd" | "repeat" | "padStart" | "padEnd" | "replace"
            | "replaceAll" | "concat" | "normalize" | "at" => self.fn_variadic(string),
            "charCodeAt" | "codePointAt" | "indexOf" | "lastIndexOf" | "search"
            | "localeCompare" => self.fn_variadic(number),
            "includes" | "startsWith" | "endsWith" => self.fn_variadic(TypeId::BOOLEAN),
            "split" => {
                let string_array = self.types.array(string);
                self.fn_variadic(string_array)
            }
            "match" | "matchAll" => self.fn_variadic(TypeId::ANY),
            "toString" | "valueOf" => self.fn_of(vec![], string),
            _ => TypeId::ANY,
        }
    }

    /// The type of `object[index]`.
    pub(crate) fn index_type(&mut self, object: TypeId, index: TypeId, span: Span) -> TypeId {
        if object == TypeId::ANY || object == TypeId::ERROR {
            return TypeId::ANY;
        }
        let index_w = self.types.widen(index);
        match self.types.get(object).clone() {
            Type::Array(element) => {
                if index_w == TypeId::NUMBER || index_w == TypeId::ANY {
                    element
                } else {
                    self.error_at(
                        span,
                        "Array index must be a number.".to_string(),
                        diagnostic_codes::OPERATOR_TYPE_MISMATCH,
                    );
                    TypeId::ERROR
                }
            }
            Type::Tuple { elements, rest } => {
                if let Some(n) = self.types.number_literal_value(index) {
                    let idx = n as usize;
                    elements
                        .get(idx)
                        .copied()
                        .or(rest)
                        .unwrap_or(TypeId::UNDEFINED)
                } else {
                    let mut members = elements;
                    if let Some(rest) = rest {
                        members.push(rest);
                    }
                    self.types.union(members)
                }
            }
            Type::Record {
                fields,
                string_index,
                number_index,
                ..
            } => {
                if let Some(key) = self.types.string_literal_value(index).map(str::to_string) {
                    if let Some((_, info)) = fields.iter().find(|(n, _)| *n == key) {
                        return info.ty;
                    }
                }
                if index_w == TypeId::NUMBER {
                    if let Some(ty) = number_index.or(string_index) {
                        return ty;
                    }
                } else if let Some(ty) = string_index {
                    return ty;
                }
                TypeId::ANY
            }
            Type::String | Type::StringLiteral(_) => TypeId::STRING,
            Type::Union(members) => {
                let mut result = Vec::new();
                for member in members {
                    result.push(self.index_type(member, index, span));
                }
                self.types.union(result)
            }
            _ => TypeId::ANY,
        }
    }

    // =========================================================================
    // Object literals
    // =========================================================================

    fn check_object_literal(&mut self, properties: &[ObjectProperty]) -> TypeId {
        let mut fields: Vec<(String, FieldInfo)> = Vec::new();
        let mut push_field = |fields: &mut Vec<(String, FieldInfo)>, name: String, ty: TypeId| {
            fields.retain(|(n, _)| *n != name);
            fields.push((
                name,
                FieldInfo {
                    ty,
                    optional: false,
                    readonly: false,
                },
            ));
        };
        for property in properties {
            match property {
                ObjectProperty::KeyValue { key, value } => {
                    let value_ty = self.check_expr(value);
                    let value_ty = self.types.widen(value_ty);
                    if let Some(name) = key.static_name() {
                        push_field(&mut fields, name, value_ty);
                    } else if let PropertyKey::Computed(expr) = key {
                        self.check_expr(expr);
                    }
                }
                ObjectProperty::Shorthand { name, id, span } => {
                    let ty = match self.scopes.lookup_value(name) {
                        Some(binding) => binding.ty,
                        None => crate::state::not_in_scope(self, name, *span),
                    };
                    self.type_map.record_expr(*id, ty);
                    let ty = self.types.widen(ty);
                    push_field(&mut fields, name.clone(), ty);
                }
                ObjectProperty::Spread(expr) => {
                    let spread_ty = self.check_expr(expr);
                    if let Type::Record {
                        fields: spread_fields,
                        ..
                    } = self.types.get(spread_ty).clone()
                    {
                        for (name, info) in spread_fields {
                            push_field(&mut fields, name, info.ty);
                        }
                    }
                }
                ObjectProperty::Method { key, func } => {
                    let ty = self.check_function_like(func);
                    if let Some(name) = key.static_name() {
                        push_field(&mut fields, name, ty);
                    }
                }
                ObjectProperty::Getter { key, func } => {
                    self.check_function_like(func);
                    let ty = func
                        .return_type
                        .as_ref()
                        .map(|node| self.resolve_type(node))
                        .unwrap_or(TypeId::ANY);
                    if let Some(name) = key.static_name() {
                        push_field(&mut fields, name, ty);
                    }
                }
                ObjectProperty::Setter { key, func } => {
                    self.check_function_like(func);
                    if let Some(name) = key.static_name() {
                        if !fields.iter().any(|(n, _)| *n == name) {
                            let ty = func
                                .params
                                .first()
                                .and_then(|p| p.type_ann.as_ref())
                                .map(|node| self.resolve_type(node))
                                .unwrap_or(TypeId::ANY);
                            push_field(&mut fields, name, ty);
                        }
                    }
                }
            }
        }
        self.types.intern(Type::Record {
            fields,
            string_index: None,
            number_index: None,
            fresh: true,
        })
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Check a function-shaped node: build its signature, then check the
    /// body in a fresh scope with parameters declared.
    pub(crate) fn check_function_like(&mut self, func: &FunctionData) -> TypeId {
        let fn_ty = self.build_function_type(func);
        let shape = match self.types.get(fn_ty) {
            Type::Function(shape) => shape.clone(),
            _ => return fn_ty,
        };

        self.scopes.push();
        for param in &func.type_params {
            let ty = self.types.intern(Type::TypeParam(param.name.clone()));
            self.scopes
                .declare_type(param.name.as_str(), TypeBinding::Param(ty));
        }
        for (param, info) in func.params.iter().zip(shape.params.iter()) {
            let mut ty = info.ty;
            if param.rest {
                // Inside the body a rest parameter is the collected array.
                ty = match self.types.get(ty) {
                    Type::Array(_) => ty,
                    _ => self.types.array(ty),
                };
            } else if info.optional && info.ty != TypeId::ANY {
                ty = self.types.union(vec![info.ty, TypeId::UNDEFINED]);
            }
            if let Some(default) = &param.default {
                let default_ty = self.check_expr(default);
                if info.ty != TypeId::ANY {
                    self.check_assignment(info.ty, default_ty, param.span);
                }
            }
            self.scopes.declare_value(
                &param.name,
                Binding {
                    ty,
                    kind: BindingKind::Param,
                },
            );
        }

        // Generators and async bodies return wrapped values; only check
        // plain function returns against the annotation directly.
        let declared_ret = if func.flags.contains(FunctionFlags::ASYNC)
            || func.flags.contains(FunctionFlags::GENERATOR)
        {
            None
        } else {
            func.return_type.as_ref().map(|_| shape.ret)
        };
        self.return_types.push(declared_ret);

        match &func.body {
            FunctionBody::Block(stmts) => {
                self.check_body(stmts);
            }
            FunctionBody::Expr(expr) => {
                let body_ty = self.check_expr(expr);
                if let Some(expected) = declared_ret {
                    self.check_assignment(expected, body_ty, expr.span);
                }
            }
        }

        self.return_types.pop();
        self.scopes.pop();
        fn_ty
    }
}
