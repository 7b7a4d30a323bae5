//! Call checking: overload resolution by first-match applicability,
//! generic inference from argument types, optional-parameter padding and
//! rest collection.

use rustc_hash::FxHashMap;
use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;
use tsi_parser::ast::{Argument, Expr};
use tsi_parser::types_ast::TypeNode;

use crate::state::CheckerState;
use crate::types::{FunctionShape, Type, TypeId};

impl CheckerState {
    pub(crate) fn check_call_expr(
        &mut self,
        callee: &Expr,
        args: &[Argument],
        type_args: &[TypeNode],
        optional: bool,
        span: Span,
    ) -> TypeId {
        let callee_ty = self.check_expr(callee);
        let callee_ty = if optional {
            self.types.remove_nullish(callee_ty)
        } else {
            callee_ty
        };

        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let ty = self.check_expr(&arg.expr);
            arg_types.push((ty, arg.spread, arg.expr.span));
        }

        let explicit: Vec<TypeId> = type_args.iter().map(|node| self.resolve_type(node)).collect();
        let mut result = self.check_call(callee_ty, &arg_types, &explicit, span);
        if optional {
            result = self.types.union(vec![result, TypeId::UNDEFINED]);
        }
        result
    }

    /// Resolve a call against a callee type.
    pub fn check_call(
        &mut self,
        callee: TypeId,
        args: &[(TypeId, bool, Span)],
        explicit_type_args: &[TypeId],
        span: Span,
    ) -> TypeId {
        if callee == TypeId::ANY || callee == TypeId::ERROR {
            return TypeId::ANY;
        }
        match self.types.get(callee).clone() {
            Type::Function(shape) => {
                self.apply_signature(&shape, args, explicit_type_args, span, true)
                    .unwrap_or(TypeId::ERROR)
            }
            Type::Overloads(signatures) => {
                // First-match applicability, trial runs silent.
                for &sig in &signatures {
                    if let Type::Function(shape) = self.types.get(sig).clone() {
                        if let Some(ret) =
                            self.apply_signature(&shape, args, explicit_type_args, span, false)
                        {
                            return ret;
                        }
                    }
                }
                self.error_at(
                    span,
                    "No overload matches this call.".to_string(),
                    diagnostic_codes::NO_OVERLOAD_MATCHES,
                );
                TypeId::ERROR
            }
            Type::Class(id) => {
                let name = self.class(id).name.clone();
                self.error_at(
                    span,
                    format!("Class '{name}' cannot be invoked without 'new'."),
                    diagnostic_codes::NOT_CALLABLE,
                );
                TypeId::ERROR
            }
            Type::Union(members) => {
                let mut results = Vec::new();
                for member in members {
                    results.push(self.check_call(member, args, explicit_type_args, span));
                }
                self.types.union(results)
            }
            _ => {
                let shown = self.display_type(callee);
                self.error_at(
                    span,
                    format!("Type '{shown}' is not callable."),
                    diagnostic_codes::NOT_CALLABLE,
                );
                TypeId::ERROR
            }
        }
    }

    /// Try one signature. Returns the (instantiated) return type on
    /// success; `None` when inapplicable. `report` controls diagnostics.
    fn apply_signature(
        &mut self,
        shape: &FunctionShape,
        args: &[(TypeId, bool, Span)],
        explicit_type_args: &[TypeId],
        span: Span,
        report: bool,
    ) -> Option<TypeId> {
        // Bind type parameters: explicit arguments win, the rest infer.
        let mut bindings: FxHashMap<String, TypeId> = FxHashMap::default();
        for (name, &arg) in shape.type_params.iter().zip(explicit_type_args.iter()) {
            bindings.insert(name.clone(), arg);
        }
        if !shape.type_params.is_empty() && explicit_type_args.len() < shape.type_params.len() {
            for (i, param) in shape.params.iter().enumerate() {
                if let Some(&(arg_ty, _, _)) = args.get(i) {
                    self.infer_type_params(param.ty, arg_ty, &shape.type_params, &mut bindings);
                }
            }
            for name in &shape.type_params {
                bindings.entry(name.clone()).or_insert(TypeId::ANY);
            }
        }

        let has_rest = shape.params.last().map(|p| p.rest).unwrap_or(false);
        let required = shape
            .params
            .iter()
            .take_while(|p| !p.optional && !p.rest)
            .count();
        let has_spread_arg = args.iter().any(|&(_, spread, _)| spread);

        if !has_spread_arg {
            if args.len() < required {
                if report {
                    self.error_at(
                        span,
                        format!(
                            "Expected at least {required} argument(s), but got {}.",
                            args.len()
                        ),
                        diagnostic_codes::ARGUMENT_COUNT_MISMATCH,
                    );
                }
                return None;
            }
            if !has_rest && args.len() > shape.params.len() {
                if report {
                    self.error_at(
                        span,
                        format!(
                            "Expected at most {} argument(s), but got {}.",
                            shape.params.len(),
                            args.len()
                        ),
                        diagnostic_codes::ARGUMENT_COUNT_MISMATCH,
                    );
                }
                return None;
            }
        }

        for (i, &(arg_ty, spread, arg_span)) in args.iter().enumerate() {
            if spread {
                // A spread argument feeds the remaining parameters; element
                // checks are best-effort against the rest element type.
                continue;
            }
            let param = if i < shape.params.len() {
                &shape.params[i]
            } else if has_rest {
                shape.params.last().expect("rest param")
            } else {
                break;
            };
            let mut expected = self.instantiate(param.ty, &bindings);
            if param.rest {
                // A variadic rest parameter collects remaining arguments
                // into an array of its element type.
                expected = match self.types.get(expected) {
                    Type::Array(element) => *element,
                    _ => expected,
                };
            }
            let widened_arg = self.types.widen(arg_ty);
            let ok = self.is_assignable(expected, arg_ty) || self.is_assignable(expected, widened_arg);
            if !ok {
                if report {
                    let arg_text = self.display_type(arg_ty);
                    let expected_text = self.display_type(expected);
                    self.error_at(
                        arg_span,
                        format!(
                            "Argument of type '{arg_text}' is not assignable to parameter of type '{expected_text}'."
                        ),
                        diagnostic_codes::ARGUMENT_NOT_ASSIGNABLE,
                    );
                    // Applicable-with-errors: keep the signature.
                } else {
                    return None;
                }
            }
        }

        Some(self.instantiate(shape.ret, &bindings))
    }

    /// Structural inference: walk parameter and argument types together,
    /// binding the first type found for each in-scope parameter name.
    fn infer_type_params(
        &mut self,
        param: TypeId,
        arg: TypeId,
        names: &[String],
        bindings: &mut FxHashMap<String, TypeId>,
    ) {
        match self.types.get(param).clone() {
            Type::TypeParam(name) if names.contains(&name) => {
                let widened = self.types.widen(arg);
                bindings.entry(name).or_insert(widened);
            }
            Type::Array(param_el) => {
                if let Type::Array(arg_el) = self.types.get(arg).clone() {
                    self.infer_type_params(param_el, arg_el, names, bindings);
                }
            }
            Type::Function(param_shape) => {
                if let Type::Function(arg_shape) = self.types.get(arg).clone() {
                    for (p, a) in param_shape.params.iter().zip(arg_shape.params.iter()) {
                        self.infer_type_params(p.ty, a.ty, names, bindings);
                    }
                    self.infer_type_params(param_shape.ret, arg_shape.ret, names, bindings);
                }
            }
            Type::Union(members) => {
                for member in members {
                    self.infer_type_params(member, arg, names, bindings);
                }
            }
            Type::Record { fields, .. } => {
                if let Type::Record {
                    fields: arg_fields, ..
                } = self.types.get(arg).clone()
                {
                    for (name, info) in &fields {
                        if let Some((_, arg_info)) = arg_fields.iter().find(|(n, _)| n == name) {
                            self.infer_type_params(info.ty, arg_info.ty, names, bindings);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Substitute bound type parameters through a type.
    pub(crate) fn instantiate(
        &mut self,
        ty: TypeId,
        bindings: &FxHashMap<String, TypeId>,
    ) -> TypeId {
        if bindings.is_empty() {
            return ty;
        }
        match self.types.get(ty).clone() {
            Type::TypeParam(name) | Type::Infer(name) => {
                bindings.get(&name).copied().unwrap_or(ty)
            }
            Type::Array(element) => {
                let element = self.instantiate(element, bindings);
                self.types.array(element)
            }
            Type::Tuple { elements, rest } => {
                let elements = elements
                    .into_iter()
                    .map(|e| self.instantiate(e, bindings))
                    .collect();
                let rest = rest.map(|r| self.instantiate(r, bindings));
                self.types.intern(Type::Tuple { elements, rest })
            }
            Type::Union(members) => {
                let members = members
                    .into_iter()
                    .map(|m| self.instantiate(m, bindings))
                    .collect();
                self.types.union(members)
            }
            Type::Intersection(members) => {
                let members = members
                    .into_iter()
                    .map(|m| self.instantiate(m, bindings))
                    .collect();
                self.types.intersection(members)
            }
            Type::Record {
                fields,
                string_index,
                number_index,
                fresh,
            } => {
                let fields = fields
                    .into_iter()
                    .map(|(name, mut info)| {
                        info.ty = self.instantiate(info.ty, bindings);
                        (name, info)
                    })
                    .collect();
                let string_index = string_index.map(|t| self.instantiate(t, bindings));
                let number_index = number_index.map(|t| self.instantiate(t, bindings));
                self.types.intern(Type::Record {
                    fields,
                    string_index,
                    number_index,
                    fresh,
                })
            }
            Type::Function(mut shape) => {
                // Inner shadowing parameters stay free.
                let mut inner = bindings.clone();
                for name in &shape.type_params {
                    inner.remove(name);
                }
                for param in &mut shape.params {
                    param.ty = self.instantiate(param.ty, &inner);
                }
                shape.ret = self.instantiate(shape.ret, &inner);
                self.types.intern(Type::Function(shape))
            }
            Type::Instance(id, args) => {
                let args = args
                    .into_iter()
                    .map(|a| self.instantiate(a, bindings))
                    .collect();
                self.types.intern(Type::Instance(id, args))
            }
            _ => ty,
        }
    }

    // =========================================================================
    // `new` expressions
    // =========================================================================

    pub(crate) fn check_new(
        &mut self,
        callee: &Expr,
        args: &[Argument],
        type_args: &[TypeNode],
        span: Span,
    ) -> TypeId {
        let callee_ty = self.check_expr(callee);
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let ty = self.check_expr(&arg.expr);
            arg_types.push((ty, arg.spread, arg.expr.span));
        }
        if callee_ty == TypeId::ANY || callee_ty == TypeId::ERROR {
            return TypeId::ANY;
        }
        let Type::Class(class_id) = self.types.get(callee_ty).clone() else {
            let shown = self.display_type(callee_ty);
            self.error_at(
                span,
                format!("Type '{shown}' is not constructable."),
                diagnostic_codes::NOT_CALLABLE,
            );
            return TypeId::ERROR;
        };

        if self.class(class_id).is_abstract {
            let name = self.class(class_id).name.clone();
            self.error_at(
                span,
                format!("Cannot create an instance of abstract class '{name}'."),
                diagnostic_codes::CANNOT_INSTANTIATE_ABSTRACT,
            );
        }

        // Check against the closest declared constructor on the chain;
        // a class with no constructor anywhere accepts any arguments
        // (pass-through construction).
        let mut ctor = self.class(class_id).ctor;
        if ctor.is_none() {
            for cid in self.superclass_chain(class_id) {
                if let Some(c) = self.class(cid).ctor {
                    ctor = Some(c);
                    break;
                }
            }
        }
        if let Some(ctor_ty) = ctor {
            if let Type::Function(shape) = self.types.get(ctor_ty).clone() {
                let explicit: Vec<TypeId> =
                    type_args.iter().map(|node| self.resolve_type(node)).collect();
                self.apply_signature(&shape, &arg_types, &explicit, span, true);
            }
        }

        let resolved_args: Vec<TypeId> =
            type_args.iter().map(|node| self.resolve_type(node)).collect();
        self.types.intern(Type::Instance(class_id, resolved_args))
    }
}
