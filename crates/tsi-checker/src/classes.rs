//! Class checking: member bodies, override variance, abstractness and
//! the `override` keyword agreement.

use tsi_common::diagnostics::diagnostic_codes;
use tsi_parser::ast::*;

use crate::env::TypeBinding;
use crate::state::{CheckerState, MemberKind};
use crate::types::{ClassId, Type, TypeId};

impl CheckerState {
    pub(crate) fn check_class(&mut self, class: &ClassData) {
        let Some(name) = &class.name else { return };
        let Some(TypeBinding::Class(class_id)) = self.scopes.lookup_type(name).cloned() else {
            return;
        };

        self.class_stack.push(class_id);
        self.scopes.push();
        for param in &class.type_params {
            let ty = self.types.intern(Type::TypeParam(param.name.clone()));
            self.scopes
                .declare_type(param.name.as_str(), TypeBinding::Param(ty));
        }

        // Decorator expressions are metadata capture points; their
        // expressions still resolve and type.
        for decorator in &class.decorators {
            self.check_expr(&decorator.expr);
        }
        if self.options.emit_decorator_metadata {
            self.capture_decorator_metadata(class, class_id);
        }

        self.check_override_rules(class_id);
        self.check_abstract_rules(class, class_id);
        self.check_implements(class, class_id);

        for member in &class.members {
            match member {
                ClassMember::Constructor { func, .. } => {
                    self.check_function_like(func);
                }
                ClassMember::Method { func, decorators, .. }
                | ClassMember::Getter { func, decorators, .. }
                | ClassMember::Setter { func, decorators, .. } => {
                    for decorator in decorators {
                        self.check_expr(&decorator.expr);
                    }
                    self.check_function_like(func);
                }
                ClassMember::Field {
                    key,
                    init,
                    decorators,
                    modifiers,
                    span,
                    ..
                } => {
                    for decorator in decorators {
                        self.check_expr(&decorator.expr);
                    }
                    if let Some(init) = init {
                        let init_ty = self.check_expr(init);
                        if let Some(member_name) = key.static_name() {
                            let declared = if modifiers.contains(MemberModifiers::STATIC) {
                                self.class(class_id).statics.get(&member_name).map(|m| m.ty)
                            } else {
                                self.class(class_id).instance.get(&member_name).map(|m| m.ty)
                            };
                            if let Some(declared) = declared {
                                if declared != TypeId::ANY {
                                    self.check_assignment(declared, init_ty, *span);
                                }
                            }
                        }
                    }
                }
                ClassMember::StaticBlock(stmts) => {
                    self.scopes.push();
                    self.check_body(stmts);
                    self.scopes.pop();
                }
            }
        }

        self.scopes.pop();
        self.class_stack.pop();
    }

    /// Overriding members must be compatible with the member they replace:
    /// covariant returns, contravariant parameters (the derived member
    /// must be assignable to the base slot). The `override` keyword must
    /// match reality.
    fn check_override_rules(&mut self, class_id: ClassId) {
        let chain = self.superclass_chain(class_id);
        let members: Vec<(String, crate::state::MemberInfo)> = self
            .class(class_id)
            .instance
            .iter()
            .map(|(n, m)| (n.clone(), m.clone()))
            .collect();

        for (name, member) in members {
            let base = chain.iter().find_map(|&cid| {
                self.class(cid)
                    .instance
                    .get(&name)
                    .map(|m| (cid, m.clone()))
            });
            match base {
                Some((_, base_member)) => {
                    if !self.is_assignable(base_member.ty, member.ty) {
                        let derived_text = self.display_type(member.ty);
                        let base_text = self.display_type(base_member.ty);
                        self.error_at(
                            member.span,
                            format!(
                                "Member '{name}' of type '{derived_text}' is not compatible with the inherited member of type '{base_text}'."
                            ),
                            diagnostic_codes::INVALID_OVERRIDE,
                        );
                    }
                    if self.options.strict
                        && !member.has_override
                        && member.kind == MemberKind::Method
                    {
                        self.error_at(
                            member.span,
                            format!(
                                "Member '{name}' overrides an inherited member and must carry the 'override' modifier."
                            ),
                            diagnostic_codes::OVERRIDE_KEYWORD_REQUIRED,
                        );
                    }
                }
                None => {
                    if member.has_override {
                        self.error_at(
                            member.span,
                            format!(
                                "Member '{name}' is marked 'override' but no base class declares it."
                            ),
                            diagnostic_codes::OVERRIDE_MISSING_BASE,
                        );
                    }
                }
            }
        }
    }

    /// Every abstract member on the chain must be implemented unless this
    /// class is itself abstract.
    fn check_abstract_rules(&mut self, class: &ClassData, class_id: ClassId) {
        if self.class(class_id).is_abstract {
            return;
        }
        let chain = self.superclass_chain(class_id);
        let mut missing = Vec::new();
        for &cid in &chain {
            let names: Vec<(String, tsi_common::span::Span)> = self
                .class(cid)
                .instance
                .iter()
                .filter(|(_, m)| m.is_abstract)
                .map(|(n, m)| (n.clone(), m.span))
                .collect();
            for (name, _) in names {
                let implemented = self
                    .class(class_id)
                    .instance
                    .get(&name)
                    .map(|m| !m.is_abstract)
                    .unwrap_or(false)
                    || chain.iter().take_while(|&&c| c != cid).any(|&between| {
                        self.class(between)
                            .instance
                            .get(&name)
                            .map(|m| !m.is_abstract)
                            .unwrap_or(false)
                    });
                if !implemented {
                    missing.push(name);
                }
            }
        }
        for name in missing {
            self.error_at(
                class.span,
                format!(
                    "Non-abstract class '{}' does not implement inherited abstract member '{name}'.",
                    self.class(class_id).name
                ),
                diagnostic_codes::ABSTRACT_MEMBER_NOT_IMPLEMENTED,
            );
        }
    }

    /// `implements` clauses are checked structurally against the instance
    /// shape.
    fn check_implements(&mut self, class: &ClassData, class_id: ClassId) {
        if class.implements.is_empty() {
            return;
        }
        let instance = self.types.intern(Type::Instance(class_id, Vec::new()));
        let clauses = class.implements.clone();
        for clause in &clauses {
            let target = self.resolve_type(clause);
            if target == TypeId::ERROR {
                continue;
            }
            if !self.is_assignable(target, instance) {
                let class_name = self.class(class_id).name.clone();
                let target_text = self.display_type(target);
                self.error_at(
                    clause.span,
                    format!(
                        "Class '{class_name}' incorrectly implements interface '{target_text}'."
                    ),
                    diagnostic_codes::TYPE_NOT_ASSIGNABLE,
                );
            }
        }
    }

    /// Capture design-time type strings for decorated members.
    fn capture_decorator_metadata(&mut self, class: &ClassData, class_id: ClassId) {
        let class_name = self.class(class_id).name.clone();
        for member in &class.members {
            let (key, decorators) = match member {
                ClassMember::Method { key, decorators, .. }
                | ClassMember::Getter { key, decorators, .. }
                | ClassMember::Setter { key, decorators, .. }
                | ClassMember::Field { key, decorators, .. } => (key, decorators),
                _ => continue,
            };
            if decorators.is_empty() {
                continue;
            }
            let Some(member_name) = key.static_name() else {
                continue;
            };
            if let Some(info) = self.class(class_id).instance.get(&member_name) {
                let type_text = self.display_type(info.ty);
                self.type_map
                    .decorator_metadata
                    .insert((class_name.clone(), member_name), type_text);
            }
        }
    }
}
