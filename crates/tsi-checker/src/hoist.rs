//! Pass 1: declaration hoisting, plus type-annotation resolution.
//!
//! Hoisting runs in two sweeps so forward references work: first every
//! declaration is registered under a placeholder, then signatures are
//! resolved (which may reference any registered name).

use rustc_hash::FxHashMap;
use tsi_common::diagnostics::diagnostic_codes;
use tsi_common::span::Span;
use tsi_parser::ast::*;
use tsi_parser::types_ast::{TypeKeyword, TypeNode, TypeNodeKind};

use crate::env::{Binding, BindingKind, TypeBinding};
use crate::state::{
    CheckerState, ClassInfo, EnumInfo, EnumValue, InterfaceInfo, MemberInfo, MemberKind,
    Visibility,
};
use crate::types::{
    ClassId, EnumId, FieldInfo, FunctionShape, InterfaceId, ParamInfo, Type, TypeId,
};

impl CheckerState {
    /// Hoist every declaration in a statement list into the current scope.
    pub fn hoist_statements(&mut self, stmts: &[Stmt]) {
        // Sweep 1: register names with placeholders.
        for stmt in stmts {
            self.register_declaration(stmt);
        }
        // Sweep 2: resolve signatures.
        for stmt in stmts {
            self.resolve_declaration(stmt);
        }
    }

    fn register_declaration(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Export(ExportKind::Decl(inner)) => self.register_declaration(inner),
            StmtKind::Function(func) => {
                if let Some(name) = &func.name {
                    // Repeated function declarations are overload clauses,
                    // not duplicates.
                    let existing_function = self.scopes.declared_here(name)
                        && self
                            .scopes
                            .lookup_value(name)
                            .map(|b| b.kind == BindingKind::Function)
                            .unwrap_or(false);
                    if !existing_function {
                        self.declare_unique(name, TypeId::ANY, BindingKind::Function, stmt.span);
                    }
                }
            }
            StmtKind::Class(class) => {
                let id = ClassId(self.classes.len() as u32);
                let name = class.name.clone().unwrap_or_else(|| "<anonymous>".into());
                self.classes.push(ClassInfo {
                    name: name.clone(),
                    span: class.span,
                    superclass: None,
                    type_params: class.type_params.iter().map(|p| p.name.clone()).collect(),
                    instance: Default::default(),
                    statics: Default::default(),
                    ctor: None,
                    is_abstract: class.is_abstract,
                });
                let class_ty = self.types.intern(Type::Class(id));
                self.declare_unique(&name, class_ty, BindingKind::Class, stmt.span);
                self.scopes.declare_type(&name, TypeBinding::Class(id));
                self.type_map.class_ids.insert(name, id);
            }
            StmtKind::Interface {
                name, type_params, ..
            } => {
                let id = InterfaceId(self.interfaces.len() as u32);
                self.interfaces.push(InterfaceInfo {
                    name: name.clone(),
                    span: stmt.span,
                    members: Default::default(),
                    extends: Vec::new(),
                    type_params: type_params.iter().map(|p| p.name.clone()).collect(),
                });
                self.scopes.declare_type(name, TypeBinding::Interface(id));
            }
            StmtKind::TypeAlias {
                name,
                type_params,
                type_ann,
            } => {
                self.scopes.declare_type(
                    name,
                    TypeBinding::Alias {
                        params: type_params.iter().map(|p| p.name.clone()).collect(),
                        node: type_ann.clone(),
                    },
                );
            }
            StmtKind::Enum {
                name,
                is_const,
                members,
            } => {
                let id = EnumId(self.enums.len() as u32);
                let values = self.compute_enum_values(members);
                self.enums.push(EnumInfo {
                    name: name.clone(),
                    span: stmt.span,
                    is_const: *is_const,
                    members: values,
                });
                let enum_ty = self.types.intern(Type::Enum(id));
                self.declare_unique(name, enum_ty, BindingKind::Enum, stmt.span);
                self.scopes.declare_type(name, TypeBinding::Enum(id));
            }
            StmtKind::Namespace { name, .. } => {
                self.declare_unique(name, TypeId::ANY, BindingKind::Namespace, stmt.span);
            }
            StmtKind::Import { clause, type_only, .. } => {
                if *type_only {
                    return;
                }
                // Imported bindings type as `any` in single-file checking;
                // the module driver re-checks against real export types.
                match clause {
                    ImportClause::Default(local) | ImportClause::Namespace(local) => {
                        self.declare_unique(local, TypeId::ANY, BindingKind::Import, stmt.span);
                    }
                    ImportClause::Named(specs) => {
                        for spec in specs {
                            if !spec.type_only {
                                self.declare_unique(
                                    &spec.local,
                                    TypeId::ANY,
                                    BindingKind::Import,
                                    stmt.span,
                                );
                            }
                        }
                    }
                    ImportClause::Bare => {}
                }
            }
            // `var` hoists to function scope; let/const stay in TDZ until
            // their statement is checked.
            StmtKind::Var {
                kind: VarKind::Var,
                decls,
            } => {
                for decl in decls {
                    self.scopes.declare_value(
                        &decl.name,
                        Binding {
                            ty: TypeId::ANY,
                            kind: BindingKind::Var,
                        },
                    );
                }
            }
            _ => {}
        }
    }

    fn resolve_declaration(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Export(ExportKind::Decl(inner)) => self.resolve_declaration(inner),
            StmtKind::Function(func) => {
                if let Some(name) = &func.name {
                    let new_ty = self.build_function_type(func);
                    // Successive clauses for one name accumulate into an
                    // overloaded callable, declaration order preserved.
                    let existing = self
                        .scopes
                        .lookup_value(name)
                        .filter(|b| b.kind == BindingKind::Function)
                        .map(|b| b.ty);
                    let combined = match existing {
                        Some(ty) if ty != TypeId::ANY && ty != new_ty => {
                            match self.types.get(ty).clone() {
                                Type::Overloads(mut signatures) => {
                                    signatures.push(new_ty);
                                    self.types.intern(Type::Overloads(signatures))
                                }
                                Type::Function(_) => {
                                    self.types.intern(Type::Overloads(vec![ty, new_ty]))
                                }
                                _ => new_ty,
                            }
                        }
                        _ => new_ty,
                    };
                    self.scopes.update_value_type(name, combined);
                }
            }
            StmtKind::Class(class) => {
                self.resolve_class(class);
            }
            StmtKind::Interface {
                name,
                extends,
                members,
                type_params,
                ..
            } => {
                let Some(TypeBinding::Interface(id)) = self.scopes.lookup_type(name).cloned()
                else {
                    return;
                };
                self.scopes.push();
                for param in type_params {
                    let ty = self.types.intern(Type::TypeParam(param.name.clone()));
                    self.scopes.declare_type(param.name.as_str(), TypeBinding::Param(ty));
                }
                let extends: Vec<TypeId> =
                    extends.iter().map(|node| self.resolve_type(node)).collect();
                let mut resolved = indexmap::IndexMap::new();
                for member in members {
                    match member {
                        InterfaceMember::Property {
                            name,
                            type_ann,
                            optional,
                            readonly,
                        } => {
                            let ty = self.resolve_type(type_ann);
                            resolved.insert(
                                name.clone(),
                                FieldInfo {
                                    ty,
                                    optional: *optional,
                                    readonly: *readonly,
                                },
                            );
                        }
                        InterfaceMember::Method {
                            name,
                            params,
                            return_type,
                            type_params,
                            optional,
                        } => {
                            let ty = self.build_signature(params, return_type.as_ref(), type_params);
                            resolved.insert(
                                name.clone(),
                                FieldInfo {
                                    ty,
                                    optional: *optional,
                                    readonly: false,
                                },
                            );
                        }
                        InterfaceMember::IndexSignature { .. } => {
                            // Index signatures on interfaces fold into the
                            // structural view during assignability.
                        }
                    }
                }
                self.scopes.pop();
                let info = &mut self.interfaces[id.0 as usize];
                info.members = resolved;
                info.extends = extends;
            }
            _ => {}
        }
    }

    fn declare_unique(&mut self, name: &str, ty: TypeId, kind: BindingKind, span: Span) {
        if self.scopes.declared_here(name) {
            self.error_at(
                span,
                format!("Duplicate declaration of '{name}'."),
                diagnostic_codes::DUPLICATE_DECLARATION,
            );
        }
        self.scopes.declare_value(name, Binding { ty, kind });
    }

    // =========================================================================
    // Enums
    // =========================================================================

    /// Compute member values: auto-incrementing numbers unless a constant
    /// initializer says otherwise.
    fn compute_enum_values(&mut self, members: &[EnumMember]) -> Vec<(String, EnumValue)> {
        let mut values = Vec::new();
        let mut next_auto = 0.0f64;
        for member in members {
            let value = match &member.init {
                None => {
                    let v = EnumValue::Number(next_auto);
                    next_auto += 1.0;
                    v
                }
                Some(init) => match self.fold_enum_constant(init, &values) {
                    Some(EnumValue::Number(n)) => {
                        next_auto = n + 1.0;
                        EnumValue::Number(n)
                    }
                    Some(EnumValue::String(s)) => EnumValue::String(s),
                    None => {
                        self.error_at(
                            member.span,
                            format!(
                                "Enum member '{}' must have a constant initializer.",
                                member.name
                            ),
                            diagnostic_codes::CONST_ENUM_MEMBER_NOT_CONSTANT,
                        );
                        EnumValue::Number(f64::NAN)
                    }
                },
            };
            values.push((member.name.clone(), value));
        }
        values
    }

    /// Constant-fold an enum initializer: literals, unary minus, `+`/`-`/
    /// `*`, and references to earlier members of the same enum.
    fn fold_enum_constant(
        &self,
        expr: &Expr,
        earlier: &[(String, EnumValue)],
    ) -> Option<EnumValue> {
        match &expr.kind {
            ExprKind::Literal(Lit::Number(n)) => Some(EnumValue::Number(*n)),
            ExprKind::Literal(Lit::String(s)) => Some(EnumValue::String(s.clone())),
            ExprKind::Grouping(inner) => self.fold_enum_constant(inner, earlier),
            ExprKind::Unary {
                op: UnaryOp::Minus,
                operand,
            } => match self.fold_enum_constant(operand, earlier)? {
                EnumValue::Number(n) => Some(EnumValue::Number(-n)),
                EnumValue::String(_) => None,
            },
            ExprKind::Variable(name) => earlier
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            ExprKind::Binary { op, left, right } => {
                let left = self.fold_enum_constant(left, earlier)?;
                let right = self.fold_enum_constant(right, earlier)?;
                match (op, left, right) {
                    (BinaryOp::Add, EnumValue::Number(a), EnumValue::Number(b)) => {
                        Some(EnumValue::Number(a + b))
                    }
                    (BinaryOp::Add, EnumValue::String(a), EnumValue::String(b)) => {
                        Some(EnumValue::String(format!("{a}{b}")))
                    }
                    (BinaryOp::Sub, EnumValue::Number(a), EnumValue::Number(b)) => {
                        Some(EnumValue::Number(a - b))
                    }
                    (BinaryOp::Mul, EnumValue::Number(a), EnumValue::Number(b)) => {
                        Some(EnumValue::Number(a * b))
                    }
                    (BinaryOp::Shl, EnumValue::Number(a), EnumValue::Number(b)) => {
                        Some(EnumValue::Number(((a as i64) << (b as i64)) as f64))
                    }
                    (BinaryOp::BitOr, EnumValue::Number(a), EnumValue::Number(b)) => {
                        Some(EnumValue::Number(((a as i64) | (b as i64)) as f64))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Build the function type for a declaration or expression, resolving
    /// parameter and return annotations. Unannotated parameters are `any`
    /// (diagnosed under `no_implicit_any`).
    pub fn build_function_type(&mut self, func: &FunctionData) -> TypeId {
        self.scopes.push();
        for param in &func.type_params {
            let ty = self.types.intern(Type::TypeParam(param.name.clone()));
            self.scopes
                .declare_type(param.name.as_str(), TypeBinding::Param(ty));
        }
        let params = self.resolve_params(&func.params);
        let (ret, predicate) = match &func.return_type {
            Some(node) => self.resolve_return_type(node),
            None => (TypeId::ANY, None),
        };
        // Async functions return promises; the awaited payload stays in the
        // signature for await-unwrapping.
        self.scopes.pop();
        let shape = FunctionShape {
            params,
            ret,
            type_params: func.type_params.iter().map(|p| p.name.clone()).collect(),
            this_type: None,
            predicate,
        };
        self.types.intern(Type::Function(shape))
    }

    pub(crate) fn resolve_params(&mut self, params: &[Param]) -> Vec<ParamInfo> {
        params
            .iter()
            .map(|param| {
                let ty = match &param.type_ann {
                    Some(node) => self.resolve_type(node),
                    None => {
                        if self.options.no_implicit_any && !param.name.starts_with('%') {
                            self.error_at(
                                param.span,
                                format!(
                                    "Parameter '{}' implicitly has an 'any' type.",
                                    param.name
                                ),
                                diagnostic_codes::IMPLICIT_ANY,
                            );
                        }
                        TypeId::ANY
                    }
                };
                ParamInfo {
                    name: param.name.clone(),
                    ty,
                    optional: param.optional || param.default.is_some(),
                    rest: param.rest,
                }
            })
            .collect()
    }

    fn build_signature(
        &mut self,
        params: &[Param],
        return_type: Option<&TypeNode>,
        type_params: &[tsi_parser::types_ast::TypeParam],
    ) -> TypeId {
        self.scopes.push();
        for param in type_params {
            let ty = self.types.intern(Type::TypeParam(param.name.clone()));
            self.scopes
                .declare_type(param.name.as_str(), TypeBinding::Param(ty));
        }
        let params = self.resolve_params(params);
        let (ret, predicate) = match return_type {
            Some(node) => self.resolve_return_type(node),
            None => (TypeId::ANY, None),
        };
        self.scopes.pop();
        self.types.intern(Type::Function(FunctionShape {
            params,
            ret,
            type_params: type_params.iter().map(|p| p.name.clone()).collect(),
            this_type: None,
            predicate,
        }))
    }

    pub(crate) fn resolve_return_type(
        &mut self,
        node: &TypeNode,
    ) -> (TypeId, Option<(String, TypeId)>) {
        if let TypeNodeKind::Predicate { param, type_ann } = &node.kind {
            let narrowed = self.resolve_type(type_ann);
            return (TypeId::BOOLEAN, Some((param.clone(), narrowed)));
        }
        (self.resolve_type(node), None)
    }

    // =========================================================================
    // Classes
    // =========================================================================

    fn resolve_class(&mut self, class: &ClassData) {
        let Some(name) = &class.name else { return };
        let Some(TypeBinding::Class(id)) = self.scopes.lookup_type(name).cloned() else {
            return;
        };

        // Superclass link: the extends expression must name a class.
        let superclass = class.superclass.as_ref().and_then(|expr| {
            if let ExprKind::Variable(super_name) = &expr.kind {
                match self.scopes.lookup_type(super_name) {
                    Some(TypeBinding::Class(super_id)) => Some(*super_id),
                    _ => {
                        self.error_at(
                            expr.span,
                            format!("Cannot find class '{super_name}' to extend."),
                            diagnostic_codes::UNKNOWN_TYPE_NAME,
                        );
                        None
                    }
                }
            } else {
                None
            }
        });
        self.class_mut(id).superclass = superclass;
        self.type_map.class_hierarchy.insert(id, superclass);

        self.scopes.push();
        for param in &class.type_params {
            let ty = self.types.intern(Type::TypeParam(param.name.clone()));
            self.scopes
                .declare_type(param.name.as_str(), TypeBinding::Param(ty));
        }

        for member in &class.members {
            match member {
                ClassMember::Constructor { func, .. } => {
                    let ctor_ty = self.build_function_type(func);
                    self.class_mut(id).ctor = Some(ctor_ty);
                    // Parameter properties become instance fields.
                    for param in &func.params {
                        let vis_bits = MemberModifiers::PUBLIC
                            | MemberModifiers::PRIVATE
                            | MemberModifiers::PROTECTED
                            | MemberModifiers::READONLY;
                        if param.modifiers.intersects(vis_bits) {
                            let ty = match &param.type_ann {
                                Some(node) => self.resolve_type(node),
                                None => TypeId::ANY,
                            };
                            let info = MemberInfo {
                                ty,
                                kind: MemberKind::Field,
                                visibility: visibility_of(param.modifiers),
                                readonly: param.modifiers.contains(MemberModifiers::READONLY),
                                is_abstract: false,
                                has_override: false,
                                is_private_name: false,
                                span: param.span,
                            };
                            self.class_mut(id).instance.insert(param.name.clone(), info);
                        }
                    }
                }
                ClassMember::Method {
                    key,
                    func,
                    modifiers,
                    ..
                } => {
                    let Some(member_name) = key.static_name() else {
                        continue;
                    };
                    let ty = self.build_function_type(func);
                    let info = MemberInfo {
                        ty,
                        kind: MemberKind::Method,
                        visibility: visibility_of(*modifiers),
                        readonly: false,
                        is_abstract: modifiers.contains(MemberModifiers::ABSTRACT),
                        has_override: modifiers.contains(MemberModifiers::OVERRIDE),
                        is_private_name: matches!(key, PropertyKey::Private(_)),
                        span: func.span,
                    };
                    self.insert_member(id, modifiers, member_name, info);
                }
                ClassMember::Getter {
                    key,
                    func,
                    modifiers,
                    ..
                } => {
                    let Some(member_name) = key.static_name() else {
                        continue;
                    };
                    let ty = match &func.return_type {
                        Some(node) => self.resolve_type(node),
                        None => TypeId::ANY,
                    };
                    let info = MemberInfo {
                        ty,
                        kind: MemberKind::Accessor,
                        visibility: visibility_of(*modifiers),
                        readonly: false,
                        is_abstract: modifiers.contains(MemberModifiers::ABSTRACT),
                        has_override: modifiers.contains(MemberModifiers::OVERRIDE),
                        is_private_name: matches!(key, PropertyKey::Private(_)),
                        span: func.span,
                    };
                    self.insert_member(id, modifiers, member_name, info);
                }
                ClassMember::Setter {
                    key,
                    func,
                    modifiers,
                    ..
                } => {
                    let Some(member_name) = key.static_name() else {
                        continue;
                    };
                    // A setter without a getter still makes the member
                    // writable; keep the parameter type when present.
                    let ty = func
                        .params
                        .first()
                        .and_then(|p| p.type_ann.as_ref())
                        .map(|node| self.resolve_type(node))
                        .unwrap_or(TypeId::ANY);
                    let target = if modifiers.contains(MemberModifiers::STATIC) {
                        self.class(id).statics.get(&member_name).cloned()
                    } else {
                        self.class(id).instance.get(&member_name).cloned()
                    };
                    if target.is_none() {
                        let info = MemberInfo {
                            ty,
                            kind: MemberKind::Accessor,
                            visibility: visibility_of(*modifiers),
                            readonly: false,
                            is_abstract: false,
                            has_override: modifiers.contains(MemberModifiers::OVERRIDE),
                            is_private_name: matches!(key, PropertyKey::Private(_)),
                            span: func.span,
                        };
                        self.insert_member(id, modifiers, member_name, info);
                    }
                }
                ClassMember::Field {
                    key,
                    type_ann,
                    init,
                    modifiers,
                    span,
                    ..
                } => {
                    let Some(member_name) = key.static_name() else {
                        continue;
                    };
                    let ty = match type_ann {
                        Some(node) => self.resolve_type(node),
                        None => match init {
                            // Initializer types are computed in pass 2; use a
                            // widened literal guess where trivially available.
                            Some(expr) => self.trivial_literal_type(expr),
                            None => TypeId::ANY,
                        },
                    };
                    let info = MemberInfo {
                        ty,
                        kind: MemberKind::Field,
                        visibility: visibility_of(*modifiers),
                        readonly: modifiers.contains(MemberModifiers::READONLY),
                        is_abstract: modifiers.contains(MemberModifiers::ABSTRACT),
                        has_override: modifiers.contains(MemberModifiers::OVERRIDE),
                        is_private_name: matches!(key, PropertyKey::Private(_)),
                        span: *span,
                    };
                    self.insert_member(id, modifiers, member_name, info);
                }
                ClassMember::StaticBlock(_) => {}
            }
        }
        self.scopes.pop();
    }

    fn insert_member(
        &mut self,
        id: ClassId,
        modifiers: &MemberModifiers,
        name: String,
        info: MemberInfo,
    ) {
        if modifiers.contains(MemberModifiers::STATIC) {
            self.class_mut(id).statics.insert(name, info);
        } else {
            self.class_mut(id).instance.insert(name, info);
        }
    }

    /// Shallow literal-shape guess used for unannotated field declarations
    /// before pass 2 computes real initializer types.
    fn trivial_literal_type(&mut self, expr: &Expr) -> TypeId {
        match &expr.kind {
            ExprKind::Literal(Lit::Number(_)) => TypeId::NUMBER,
            ExprKind::Literal(Lit::String(_)) => TypeId::STRING,
            ExprKind::Literal(Lit::Boolean(_)) => TypeId::BOOLEAN,
            ExprKind::Literal(Lit::BigInt(_)) => TypeId::BIGINT,
            ExprKind::Literal(Lit::Null) => TypeId::NULL,
            ExprKind::Literal(Lit::Undefined) => TypeId::UNDEFINED,
            _ => TypeId::ANY,
        }
    }

    // =========================================================================
    // Type-annotation resolution
    // =========================================================================

    /// Resolve a type annotation to an interned type.
    pub fn resolve_type(&mut self, node: &TypeNode) -> TypeId {
        match &node.kind {
            TypeNodeKind::Keyword(keyword) => match keyword {
                TypeKeyword::Number => TypeId::NUMBER,
                TypeKeyword::String => TypeId::STRING,
                TypeKeyword::Boolean => TypeId::BOOLEAN,
                TypeKeyword::Bigint => TypeId::BIGINT,
                TypeKeyword::Symbol => TypeId::SYMBOL,
                TypeKeyword::Object => {
                    let empty = Vec::new();
                    self.types.intern(Type::Record {
                        fields: empty,
                        string_index: Some(TypeId::ANY),
                        number_index: None,
                        fresh: false,
                    })
                }
                TypeKeyword::Null => TypeId::NULL,
                TypeKeyword::Undefined => TypeId::UNDEFINED,
                TypeKeyword::Void => TypeId::VOID,
                TypeKeyword::Any => TypeId::ANY,
                TypeKeyword::Unknown => TypeId::UNKNOWN,
                TypeKeyword::Never => TypeId::NEVER,
                TypeKeyword::This => self
                    .class_stack
                    .last()
                    .copied()
                    .map(|id| self.types.intern(Type::Instance(id, Vec::new())))
                    .unwrap_or(TypeId::ANY),
            },
            TypeNodeKind::Literal(lit) => match lit {
                Lit::Number(n) => self.types.number_literal(*n),
                Lit::String(s) => {
                    let s = s.clone();
                    self.types.string_literal(&s)
                }
                Lit::Boolean(b) => self.types.boolean_literal(*b),
                Lit::BigInt(_) => TypeId::BIGINT,
                Lit::Null => TypeId::NULL,
                Lit::Undefined => TypeId::UNDEFINED,
            },
            TypeNodeKind::Ref { name, type_args } => self.resolve_type_ref(name, type_args, node.span),
            TypeNodeKind::Array(element) => {
                let element = self.resolve_type(element);
                self.types.array(element)
            }
            TypeNodeKind::Tuple { elements, rest } => {
                let elements: Vec<TypeId> =
                    elements.iter().map(|e| self.resolve_type(e)).collect();
                let rest = rest.as_ref().map(|r| self.resolve_type(r));
                self.types.intern(Type::Tuple { elements, rest })
            }
            TypeNodeKind::Union(members) => {
                let members: Vec<TypeId> = members.iter().map(|m| self.resolve_type(m)).collect();
                self.types.union(members)
            }
            TypeNodeKind::Intersection(members) => {
                let members: Vec<TypeId> = members.iter().map(|m| self.resolve_type(m)).collect();
                self.types.intersection(members)
            }
            TypeNodeKind::Function {
                params,
                return_type,
                type_params,
            } => {
                self.scopes.push();
                for param in type_params {
                    let ty = self.types.intern(Type::TypeParam(param.name.clone()));
                    self.scopes
                        .declare_type(param.name.as_str(), TypeBinding::Param(ty));
                }
                let params: Vec<ParamInfo> = params
                    .iter()
                    .map(|p| {
                        let ty = p
                            .type_ann
                            .as_ref()
                            .map(|node| self.resolve_type(node))
                            .unwrap_or(TypeId::ANY);
                        ParamInfo {
                            name: p.name.clone(),
                            ty,
                            optional: p.optional,
                            rest: p.rest,
                        }
                    })
                    .collect();
                let ret = self.resolve_type(return_type);
                self.scopes.pop();
                self.types.intern(Type::Function(FunctionShape {
                    params,
                    ret,
                    type_params: type_params.iter().map(|p| p.name.clone()).collect(),
                    this_type: None,
                    predicate: None,
                }))
            }
            TypeNodeKind::Object(members) => {
                let mut fields = Vec::new();
                let mut string_index = None;
                let mut number_index = None;
                for member in members {
                    match member {
                        tsi_parser::types_ast::TypeMember::Property {
                            name,
                            type_ann,
                            optional,
                            readonly,
                        } => {
                            let ty = self.resolve_type(type_ann);
                            fields.push((
                                name.clone(),
                                FieldInfo {
                                    ty,
                                    optional: *optional,
                                    readonly: *readonly,
                                },
                            ));
                        }
                        tsi_parser::types_ast::TypeMember::Method {
                            name,
                            params,
                            return_type,
                            type_params,
                            optional,
                        } => {
                            self.scopes.push();
                            for param in type_params {
                                let ty =
                                    self.types.intern(Type::TypeParam(param.name.clone()));
                                self.scopes
                                    .declare_type(param.name.as_str(), TypeBinding::Param(ty));
                            }
                            let params: Vec<ParamInfo> = params
                                .iter()
                                .map(|p| {
                                    let ty = p
                                        .type_ann
                                        .as_ref()
                                        .map(|node| self.resolve_type(node))
                                        .unwrap_or(TypeId::ANY);
                                    ParamInfo {
                                        name: p.name.clone(),
                                        ty,
                                        optional: p.optional,
                                        rest: p.rest,
                                    }
                                })
                                .collect();
                            let ret = self.resolve_type(return_type);
                            self.scopes.pop();
                            let ty = self.types.intern(Type::Function(FunctionShape {
                                params,
                                ret,
                                type_params: type_params
                                    .iter()
                                    .map(|p| p.name.clone())
                                    .collect(),
                                this_type: None,
                                predicate: None,
                            }));
                            fields.push((
                                name.clone(),
                                FieldInfo {
                                    ty,
                                    optional: *optional,
                                    readonly: false,
                                },
                            ));
                        }
                        tsi_parser::types_ast::TypeMember::IndexSignature {
                            key_type,
                            value_type,
                            ..
                        } => {
                            let key = self.resolve_type(key_type);
                            let value = self.resolve_type(value_type);
                            if key == TypeId::NUMBER {
                                number_index = Some(value);
                            } else {
                                string_index = Some(value);
                            }
                        }
                        tsi_parser::types_ast::TypeMember::Call { .. } => {}
                    }
                }
                self.types.intern(Type::Record {
                    fields,
                    string_index,
                    number_index,
                    fresh: false,
                })
            }
            TypeNodeKind::Parenthesized(inner) => self.resolve_type(inner),
            TypeNodeKind::Keyof(inner) => {
                let inner = self.resolve_type(inner);
                self.keyof(inner)
            }
            TypeNodeKind::Readonly(inner) => self.resolve_type(inner),
            TypeNodeKind::TypeQuery(name) => {
                let root = name.split('.').next().unwrap_or(name);
                match self.scopes.lookup_value(root) {
                    Some(binding) => binding.ty,
                    None => {
                        self.error_at(
                            node.span,
                            format!("Cannot find name '{root}'."),
                            diagnostic_codes::NOT_IN_SCOPE,
                        );
                        TypeId::ERROR
                    }
                }
            }
            TypeNodeKind::IndexedAccess { object, index } => {
                let object = self.resolve_type(object);
                let index = self.resolve_type(index);
                self.indexed_access(object, index)
            }
            TypeNodeKind::TemplateLiteral { quasis, types } => {
                let types: Vec<TypeId> = types.iter().map(|t| self.resolve_type(t)).collect();
                // All-literal substitutions collapse to a string literal.
                if types
                    .iter()
                    .all(|&t| self.types.string_literal_value(t).is_some()
                        || self.types.number_literal_value(t).is_some())
                {
                    let mut out = String::new();
                    for (i, quasi) in quasis.iter().enumerate() {
                        out.push_str(quasi);
                        if let Some(&t) = types.get(i) {
                            if let Some(s) = self.types.string_literal_value(t) {
                                out.push_str(&s.to_string());
                            } else if let Some(n) = self.types.number_literal_value(t) {
                                out.push_str(&tsi_common::numeric::format_number(n));
                            }
                        }
                    }
                    return self.types.string_literal(&out);
                }
                self.types.intern(Type::Template {
                    quasis: quasis.clone(),
                    types,
                })
            }
            TypeNodeKind::Mapped {
                param_name,
                in_type,
                value_type,
                optional,
                ..
            } => {
                // Evaluate the common shape: `{ [K in keyof T]: V }` and
                // `{ [K in "a" | "b"]: V }` produce records.
                let domain = self.resolve_type(in_type);
                let keys = self.union_string_literals(domain);
                if let Some(keys) = keys {
                    self.scopes.push();
                    let param_ty = self.types.intern(Type::TypeParam(param_name.clone()));
                    self.scopes
                        .declare_type(param_name.as_str(), TypeBinding::Param(param_ty));
                    let value = self.resolve_type(value_type);
                    self.scopes.pop();
                    let optional = *optional == tsi_parser::types_ast::MappedModifier::Add;
                    let fields = keys
                        .into_iter()
                        .map(|key| {
                            (
                                key,
                                FieldInfo {
                                    ty: value,
                                    optional,
                                    readonly: false,
                                },
                            )
                        })
                        .collect();
                    return self.types.intern(Type::Record {
                        fields,
                        string_index: None,
                        number_index: None,
                        fresh: false,
                    });
                }
                TypeId::ANY
            }
            TypeNodeKind::Conditional {
                check,
                extends,
                true_type,
                false_type,
            } => {
                let check_ty = self.resolve_type(check);
                // Distribute over naked unions.
                if let Type::Union(members) = self.types.get(check_ty).clone() {
                    let resolved: Vec<TypeId> = members
                        .iter()
                        .map(|&member| {
                            self.resolve_conditional_arm(member, extends, true_type, false_type)
                        })
                        .collect();
                    return self.types.union(resolved);
                }
                self.resolve_conditional_arm(check_ty, extends, true_type, false_type)
            }
            TypeNodeKind::Infer(name) => self.types.intern(Type::Infer(name.clone())),
            TypeNodeKind::Predicate { .. } => TypeId::BOOLEAN,
            TypeNodeKind::Unknown(text) => {
                self.error_at(
                    node.span,
                    format!("Unsupported type syntax '{text}'."),
                    diagnostic_codes::UNKNOWN_TYPE_SYNTAX,
                );
                TypeId::ERROR
            }
        }
    }

    fn resolve_conditional_arm(
        &mut self,
        check: TypeId,
        extends: &TypeNode,
        true_type: &TypeNode,
        false_type: &TypeNode,
    ) -> TypeId {
        let extends_ty = self.resolve_type(extends);
        if self.is_assignable(extends_ty, check) {
            self.resolve_type(true_type)
        } else {
            self.resolve_type(false_type)
        }
    }

    fn resolve_type_ref(&mut self, name: &str, type_args: &[TypeNode], span: Span) -> TypeId {
        let root = name.split('.').next().unwrap_or(name);
        let binding = self.scopes.lookup_type(root).cloned();
        match binding {
            Some(TypeBinding::Class(id)) => {
                let args: Vec<TypeId> = type_args.iter().map(|a| self.resolve_type(a)).collect();
                let expected = self.class(id).type_params.len();
                if !args.is_empty() && args.len() != expected {
                    self.error_at(
                        span,
                        format!(
                            "Generic type '{}' requires {} type argument(s).",
                            self.class(id).name,
                            expected
                        ),
                        diagnostic_codes::WRONG_TYPE_ARGUMENT_COUNT,
                    );
                }
                self.types.intern(Type::Instance(id, args))
            }
            Some(TypeBinding::Interface(id)) => self.types.intern(Type::Interface(id)),
            Some(TypeBinding::Enum(id)) => self.types.intern(Type::Enum(id)),
            Some(TypeBinding::Param(ty)) => ty,
            Some(TypeBinding::Alias { params, node }) => {
                // Self-referential aliases terminate as opaque references.
                if self.alias_expansion_stack.iter().any(|n| n == root) {
                    return self.types.intern(Type::Ref(root.to_string()));
                }
                if params.is_empty() {
                    self.alias_expansion_stack.push(root.to_string());
                    let resolved = self.resolve_type(&node);
                    self.alias_expansion_stack.pop();
                    return resolved;
                }
                if type_args.len() != params.len() {
                    self.error_at(
                        span,
                        format!(
                            "Generic type '{root}' requires {} type argument(s).",
                            params.len()
                        ),
                        diagnostic_codes::WRONG_TYPE_ARGUMENT_COUNT,
                    );
                    return TypeId::ERROR;
                }
                // Bind alias parameters, then expand the alias body.
                self.scopes.push();
                for (param, arg) in params.iter().zip(type_args) {
                    let arg_ty = self.resolve_type(arg);
                    self.scopes.declare_type(param, TypeBinding::Param(arg_ty));
                }
                self.alias_expansion_stack.push(root.to_string());
                let resolved = self.resolve_type(&node);
                self.alias_expansion_stack.pop();
                self.scopes.pop();
                resolved
            }
            None => {
                // Well-known generic containers map onto engine types.
                match (root, type_args.len()) {
                    ("Array", 1) => {
                        let element = self.resolve_type(&type_args[0]);
                        self.types.array(element)
                    }
                    ("Promise", 1) | ("Map", 2) | ("Set", 1) | ("Record", 2)
                    | ("Partial", 1) | ("Readonly", 1) => self.resolve_builtin_generic(root, type_args),
                    _ => {
                        self.error_at(
                            span,
                            format!("Cannot find type name '{root}'."),
                            diagnostic_codes::UNKNOWN_TYPE_NAME,
                        );
                        TypeId::ERROR
                    }
                }
            }
        }
    }

    fn resolve_builtin_generic(&mut self, root: &str, type_args: &[TypeNode]) -> TypeId {
        match root {
            "Record" => {
                let key = self.resolve_type(&type_args[0]);
                let value = self.resolve_type(&type_args[1]);
                if let Some(keys) = self.union_string_literals(key) {
                    let fields = keys
                        .into_iter()
                        .map(|k| {
                            (
                                k,
                                FieldInfo {
                                    ty: value,
                                    optional: false,
                                    readonly: false,
                                },
                            )
                        })
                        .collect();
                    self.types.intern(Type::Record {
                        fields,
                        string_index: None,
                        number_index: None,
                        fresh: false,
                    })
                } else {
                    self.types.intern(Type::Record {
                        fields: Vec::new(),
                        string_index: Some(value),
                        number_index: None,
                        fresh: false,
                    })
                }
            }
            "Partial" | "Readonly" => {
                let inner = self.resolve_type(&type_args[0]);
                match self.types.get(inner).clone() {
                    Type::Record {
                        fields,
                        string_index,
                        number_index,
                        ..
                    } => {
                        let fields = fields
                            .into_iter()
                            .map(|(name, mut info)| {
                                if root == "Partial" {
                                    info.optional = true;
                                } else {
                                    info.readonly = true;
                                }
                                (name, info)
                            })
                            .collect();
                        self.types.intern(Type::Record {
                            fields,
                            string_index,
                            number_index,
                            fresh: false,
                        })
                    }
                    _ => inner,
                }
            }
            // Promise/Map/Set carry their payloads opaquely; member access
            // dispatches through the dynamic surface.
            _ => TypeId::ANY,
        }
    }

    /// `keyof T`: union of string-literal key types.
    pub(crate) fn keyof(&mut self, ty: TypeId) -> TypeId {
        let keys: Vec<String> = match self.types.get(ty) {
            Type::Record { fields, .. } => fields.iter().map(|(name, _)| name.clone()).collect(),
            Type::Interface(id) => self
                .interface(*id)
                .members
                .keys()
                .cloned()
                .collect(),
            Type::Instance(id, _) => {
                let mut keys: Vec<String> = self.class(*id).instance.keys().cloned().collect();
                for cid in self.superclass_chain(*id) {
                    keys.extend(self.class(cid).instance.keys().cloned());
                }
                keys
            }
            _ => return TypeId::STRING,
        };
        let literal_ids: Vec<TypeId> = keys
            .iter()
            .map(|key| self.types.string_literal(key))
            .collect();
        self.types.union(literal_ids)
    }

    /// `T[K]` for record/tuple/array shapes.
    pub(crate) fn indexed_access(&mut self, object: TypeId, index: TypeId) -> TypeId {
        match (self.types.get(object).clone(), self.types.get(index).clone()) {
            (Type::Record { fields, .. }, Type::StringLiteral(key)) => fields
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, info)| info.ty)
                .unwrap_or(TypeId::UNDEFINED),
            (Type::Record { fields, .. }, Type::Union(keys)) => {
                let mut members = Vec::new();
                for key in keys {
                    if let Some(k) = self.types.string_literal_value(key).map(str::to_string) {
                        if let Some((_, info)) = fields.iter().find(|(name, _)| *name == k) {
                            members.push(info.ty);
                        }
                    }
                }
                self.types.union(members)
            }
            (Type::Array(element), _) if index == TypeId::NUMBER => element,
            (Type::Tuple { elements, .. }, Type::NumberLiteral(bits)) => {
                let idx = f64::from_bits(bits) as usize;
                elements.get(idx).copied().unwrap_or(TypeId::UNDEFINED)
            }
            _ => TypeId::ANY,
        }
    }

    /// Extract a union of string-literal members (or a single literal) as
    /// plain strings; `None` for anything else.
    pub(crate) fn union_string_literals(&self, ty: TypeId) -> Option<Vec<String>> {
        match self.types.get(ty) {
            Type::StringLiteral(s) => Some(vec![s.clone()]),
            Type::Union(members) => {
                let mut keys = Vec::new();
                for &member in members {
                    keys.push(self.types.string_literal_value(member)?.to_string());
                }
                Some(keys)
            }
            _ => None,
        }
    }
}

fn visibility_of(modifiers: MemberModifiers) -> Visibility {
    if modifiers.contains(MemberModifiers::PRIVATE) {
        Visibility::Private
    } else if modifiers.contains(MemberModifiers::PROTECTED) {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}
