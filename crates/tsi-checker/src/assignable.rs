//! The compatibility relation.
//!
//! Structural subtyping, except between nominal classes (superclass chain
//! first) and enums (declaration identity). Memoised per (expected,
//! actual) pair; in-progress pairs are assumed compatible, which gives
//! recursive types their coinductive reading.

use tracing::trace;
use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;

use crate::state::CheckerState;
use crate::types::{FieldInfo, FunctionShape, Type, TypeId};

impl CheckerState {
    /// `assignable(expected, actual)`: may a value of `actual` flow into a
    /// slot of `expected`?
    pub fn is_assignable(&mut self, expected: TypeId, actual: TypeId) -> bool {
        if expected == actual {
            return true;
        }
        // `any` and the recovery type are compatible in both directions.
        if expected == TypeId::ANY
            || actual == TypeId::ANY
            || expected == TypeId::ERROR
            || actual == TypeId::ERROR
        {
            return true;
        }
        // `never` flows everywhere; nothing flows into `never`.
        if actual == TypeId::NEVER {
            return true;
        }
        if expected == TypeId::NEVER {
            return false;
        }
        // Everything flows into `unknown`.
        if expected == TypeId::UNKNOWN {
            return true;
        }
        if actual == TypeId::UNKNOWN {
            return false;
        }

        let key = (expected, actual);
        if let Some(&cached) = self.relation_cache.get(&key) {
            return cached;
        }
        if !self.relation_in_progress.insert(key) {
            // Cycle: assume compatible.
            return true;
        }
        let result = self.assignable_uncached(expected, actual);
        self.relation_in_progress.remove(&key);
        self.relation_cache.insert(key, result);
        trace!(expected = expected.0, actual = actual.0, result, "assignability computed");
        result
    }

    fn assignable_uncached(&mut self, expected: TypeId, actual: TypeId) -> bool {
        let expected_ty = self.types.get(expected).clone();
        let actual_ty = self.types.get(actual).clone();

        // Literal types widen into their base primitives.
        match (&expected_ty, &actual_ty) {
            (Type::Number, Type::NumberLiteral(_))
            | (Type::String, Type::StringLiteral(_))
            | (Type::Boolean, Type::BooleanLiteral(_)) => return true,
            (Type::String, Type::Template { .. }) => return true,
            _ => {}
        }

        // Enums are nominal; numeric enums widen to number, string enums
        // to string.
        match (&expected_ty, &actual_ty) {
            (_, Type::EnumMember(enum_id, _)) => {
                let whole = self.types.intern(Type::Enum(*enum_id));
                if expected == whole {
                    return true;
                }
                let info = self.enum_info(*enum_id);
                let numeric = info
                    .members
                    .iter()
                    .all(|(_, v)| matches!(v, crate::state::EnumValue::Number(_)));
                return if numeric {
                    self.is_assignable(expected, TypeId::NUMBER)
                } else {
                    self.is_assignable(expected, TypeId::STRING)
                };
            }
            (_, Type::Enum(enum_id)) => {
                let info = self.enum_info(*enum_id);
                let numeric = info
                    .members
                    .iter()
                    .all(|(_, v)| matches!(v, crate::state::EnumValue::Number(_)));
                return if numeric {
                    self.is_assignable(expected, TypeId::NUMBER)
                } else {
                    self.is_assignable(expected, TypeId::STRING)
                };
            }
            _ => {}
        }

        // Union on the actual side: every member must flow in.
        if let Type::Union(members) = &actual_ty {
            let members = members.clone();
            return members.iter().all(|&m| self.is_assignable(expected, m));
        }
        // Union on the expected side: at least one member accepts.
        if let Type::Union(members) = &expected_ty {
            let members = members.clone();
            return members.iter().any(|&m| self.is_assignable(m, actual));
        }
        // Intersections.
        if let Type::Intersection(members) = &expected_ty {
            let members = members.clone();
            return members.iter().all(|&m| self.is_assignable(m, actual));
        }
        if let Type::Intersection(members) = &actual_ty {
            let members = members.clone();
            return members.iter().any(|&m| self.is_assignable(expected, m));
        }

        match (&expected_ty, &actual_ty) {
            // Arrays are covariant in their element.
            (Type::Array(exp_el), Type::Array(act_el)) => self.is_assignable(*exp_el, *act_el),
            (Type::Array(exp_el), Type::Tuple { elements, rest }) => {
                let elements = elements.clone();
                let rest = *rest;
                elements.iter().all(|&e| self.is_assignable(*exp_el, e))
                    && rest.map(|r| self.is_assignable(*exp_el, r)).unwrap_or(true)
            }
            // An array value may flow into a tuple slot when its element
            // type satisfies every position (array literals have no tuple
            // identity of their own).
            (Type::Tuple { elements, rest }, Type::Array(act_el)) => {
                let elements = elements.clone();
                let rest = *rest;
                let act_el = *act_el;
                elements.iter().all(|&e| self.is_assignable(e, act_el))
                    && rest.map(|r| self.is_assignable(r, act_el)).unwrap_or(true)
            }
            (
                Type::Tuple {
                    elements: exp_els,
                    rest: exp_rest,
                },
                Type::Tuple {
                    elements: act_els,
                    rest: act_rest,
                },
            ) => {
                if act_els.len() < exp_els.len() {
                    return false;
                }
                let exp_els = exp_els.clone();
                let act_els = act_els.clone();
                let exp_rest = *exp_rest;
                let act_rest = *act_rest;
                for (e, a) in exp_els.iter().zip(act_els.iter()) {
                    if !self.is_assignable(*e, *a) {
                        return false;
                    }
                }
                match (exp_rest, act_rest) {
                    (Some(er), Some(ar)) => self.is_assignable(er, ar),
                    (None, Some(_)) => false,
                    _ => true,
                }
            }

            // Records: structural.
            (Type::Record { .. }, Type::Record { .. }) => {
                self.record_assignable(expected, actual)
            }

            // Functions: contravariant parameters, covariant return.
            (Type::Function(exp), Type::Function(act)) => {
                let exp = exp.clone();
                let act = act.clone();
                self.function_assignable(&exp, &act)
            }
            (Type::Function(_), Type::Overloads(sigs)) => {
                let sigs = sigs.clone();
                sigs.iter().any(|&sig| self.is_assignable(expected, sig))
            }

            // Class instances: nominal through the superclass chain.
            (Type::Instance(exp_id, exp_args), Type::Instance(act_id, act_args)) => {
                if exp_id == act_id {
                    let exp_args = exp_args.clone();
                    let act_args = act_args.clone();
                    return exp_args.len() == act_args.len()
                        && exp_args
                            .iter()
                            .zip(act_args.iter())
                            .all(|(&e, &a)| self.is_assignable(e, a))
                        || exp_args.is_empty()
                        || act_args.is_empty();
                }
                self.superclass_chain(*act_id).contains(exp_id)
            }

            // Instances match interfaces structurally.
            (Type::Interface(_), Type::Instance(..))
            | (Type::Interface(_), Type::Record { .. })
            | (Type::Interface(_), Type::Interface(_)) => {
                let view = self.structural_view(expected);
                let Some(expected_record) = view else {
                    return false;
                };
                self.record_assignable(expected_record, actual)
            }
            // Records accept instances that carry the right members.
            (Type::Record { .. }, Type::Instance(..)) => {
                self.record_assignable(expected, actual)
            }

            (Type::TypeParam(a), Type::TypeParam(b)) => a == b,
            // An unconstrained type parameter accepts nothing concrete but
            // itself; concrete slots accept a parameter optimistically.
            (_, Type::TypeParam(_)) => true,

            (Type::Template { .. }, Type::StringLiteral(_)) => {
                // Literal-against-template matching for the common prefix/
                // suffix case.
                self.template_matches(expected, actual)
            }

            _ => false,
        }
    }

    /// Structural check between record-shaped types. `actual` may be a
    /// record, interface or class instance; it is first flattened to a
    /// field view.
    fn record_assignable(&mut self, expected: TypeId, actual: TypeId) -> bool {
        let Some(expected_view) = self.structural_view(expected) else {
            return false;
        };
        let Some(actual_view) = self.structural_view(actual) else {
            return false;
        };
        let Type::Record {
            fields: exp_fields,
            string_index: exp_string_index,
            number_index: _,
            ..
        } = self.types.get(expected_view).clone()
        else {
            return false;
        };
        let Type::Record {
            fields: act_fields, ..
        } = self.types.get(actual_view).clone()
        else {
            return false;
        };

        for (name, exp_info) in &exp_fields {
            match act_fields.iter().find(|(n, _)| n == name) {
                Some((_, act_info)) => {
                    if !self.is_assignable(exp_info.ty, act_info.ty) {
                        return false;
                    }
                }
                None => {
                    if !exp_info.optional {
                        return false;
                    }
                }
            }
        }
        // Index signature on the expected side constrains every actual
        // field.
        if let Some(index_ty) = exp_string_index {
            for (_, act_info) in &act_fields {
                if !self.is_assignable(index_ty, act_info.ty) {
                    return false;
                }
            }
        }
        true
    }

    /// Flatten a type into a plain record view for structural checks.
    pub(crate) fn structural_view(&mut self, ty: TypeId) -> Option<TypeId> {
        match self.types.get(ty).clone() {
            Type::Record { .. } => Some(ty),
            Type::Interface(id) => {
                let mut fields: Vec<(String, FieldInfo)> = Vec::new();
                let info = self.interface(id).clone();
                for parent in &info.extends {
                    if let Some(parent_view) = self.structural_view(*parent) {
                        if let Type::Record {
                            fields: parent_fields,
                            ..
                        } = self.types.get(parent_view).clone()
                        {
                            for (name, field) in parent_fields {
                                if !fields.iter().any(|(n, _)| *n == name) {
                                    fields.push((name, field));
                                }
                            }
                        }
                    }
                }
                for (name, field) in &info.members {
                    fields.retain(|(n, _)| n != name);
                    fields.push((name.clone(), field.clone()));
                }
                Some(self.types.intern(Type::Record {
                    fields,
                    string_index: None,
                    number_index: None,
                    fresh: false,
                }))
            }
            Type::Instance(id, _) => {
                let mut fields: Vec<(String, FieldInfo)> = Vec::new();
                let mut classes = vec![id];
                classes.extend(self.superclass_chain(id));
                // Derived members win over base members.
                for cid in classes.iter().rev() {
                    let members = self.class(*cid).instance.clone();
                    for (name, member) in members {
                        if member.is_private_name {
                            continue;
                        }
                        fields.retain(|(n, _)| *n != name);
                        fields.push((
                            name,
                            FieldInfo {
                                ty: member.ty,
                                optional: false,
                                readonly: member.readonly,
                            },
                        ));
                    }
                }
                Some(self.types.intern(Type::Record {
                    fields,
                    string_index: None,
                    number_index: None,
                    fresh: false,
                }))
            }
            _ => None,
        }
    }

    /// Contravariant parameters, covariant return. The target may declare
    /// fewer parameters than the source provides.
    fn function_assignable(&mut self, expected: &FunctionShape, actual: &FunctionShape) -> bool {
        for (exp_param, act_param) in expected.params.iter().zip(actual.params.iter()) {
            if act_param.rest {
                // A rest parameter matches an array of its element type.
                let element = match self.types.get(act_param.ty) {
                    Type::Array(element) => *element,
                    _ => act_param.ty,
                };
                if !self.is_assignable(element, exp_param.ty) {
                    return false;
                }
                break;
            }
            if !self.is_assignable(act_param.ty, exp_param.ty) {
                return false;
            }
        }
        // Extra required parameters on the actual side cannot be fed.
        let actual_required = actual
            .params
            .iter()
            .take_while(|p| !p.optional && !p.rest)
            .count();
        if actual_required > expected.params.len() {
            return false;
        }
        if expected.ret == TypeId::VOID {
            // Any return type may flow into a void-returning slot.
            return true;
        }
        self.is_assignable(expected.ret, actual.ret)
    }

    fn template_matches(&mut self, template: TypeId, literal: TypeId) -> bool {
        let Type::Template { quasis, .. } = self.types.get(template).clone() else {
            return false;
        };
        let Some(value) = self.types.string_literal_value(literal) else {
            return false;
        };
        let first = quasis.first().map(String::as_str).unwrap_or("");
        let last = quasis.last().map(String::as_str).unwrap_or("");
        value.starts_with(first) && value.ends_with(last)
    }

    // =========================================================================
    // Assignment-site checks
    // =========================================================================

    /// Check a value flowing into a slot; report both the plain mismatch
    /// and, for fresh object literals, excess properties.
    pub fn check_assignment(&mut self, expected: TypeId, actual: TypeId, span: Span) {
        if self.options.excess_property_checks {
            self.check_excess_properties(expected, actual, span);
        }
        if !self.is_assignable(expected, actual) {
            let actual_text = self.display_type(actual);
            let expected_text = self.display_type(expected);
            self.error_at(
                span,
                format!("Type '{actual_text}' is not assignable to type '{expected_text}'."),
                diagnostic_codes::TYPE_NOT_ASSIGNABLE,
            );
        }
    }

    /// Excess-property check: applied only when the source is a fresh
    /// object literal flowing directly into a known record shape.
    fn check_excess_properties(&mut self, expected: TypeId, actual: TypeId, span: Span) {
        let Type::Record {
            fields: act_fields,
            fresh: true,
            ..
        } = self.types.get(actual).clone()
        else {
            return;
        };
        let mut targets = Vec::new();
        match self.types.get(expected).clone() {
            Type::Union(members) => targets.extend(members),
            _ => targets.push(expected),
        }
        let mut known: Vec<String> = Vec::new();
        let mut any_record_target = false;
        for target in targets {
            let Some(view) = self.structural_view(target) else {
                // A non-structural target (any, primitives) suppresses the
                // check entirely.
                return;
            };
            if let Type::Record {
                fields,
                string_index,
                number_index,
                ..
            } = self.types.get(view).clone()
            {
                if string_index.is_some() || number_index.is_some() {
                    return;
                }
                any_record_target = true;
                known.extend(fields.iter().map(|(name, _)| name.clone()));
            }
        }
        if !any_record_target {
            return;
        }
        for (name, _) in &act_fields {
            if !known.contains(name) {
                let expected_text = self.display_type(expected);
                self.error_at(
                    span,
                    format!(
                        "Object literal may only specify known properties, and '{name}' does not exist in type '{expected_text}'."
                    ),
                    diagnostic_codes::EXCESS_PROPERTY,
                );
            }
        }
    }
}
