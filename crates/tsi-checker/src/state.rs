//! Shared checker state and the check entry point.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tsi_common::diagnostics::{Diagnostic, diagnostic_codes};
use tsi_common::options::EngineOptions;
use tsi_common::span::Span;
use tsi_parser::ast::Program;

use crate::env::{Binding, BindingKind, Scopes};
use crate::type_map::TypeMap;
use crate::types::{
    ClassId, EnumId, FieldInfo, FunctionShape, InterfaceId, ParamInfo, Type, TypeId, TypeInterner,
};

/// Member visibility on classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// What kind of member a class entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
    Accessor,
}

/// One resolved member of a class.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub ty: TypeId,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub readonly: bool,
    pub is_abstract: bool,
    pub has_override: bool,
    pub is_private_name: bool,
    pub span: Span,
}

/// One class in the arena. Back-references (superclass) are stored as
/// indices, never owning pointers, so class graphs may be cyclic in the
/// value world without ownership cycles here.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub span: Span,
    pub superclass: Option<ClassId>,
    pub type_params: Vec<String>,
    pub instance: IndexMap<String, MemberInfo>,
    pub statics: IndexMap<String, MemberInfo>,
    /// Constructor signature (a `Type::Function` id), if declared.
    pub ctor: Option<TypeId>,
    pub is_abstract: bool,
}

/// One interface in the arena. Nominal identity by declaration site;
/// matching is structural.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub span: Span,
    pub members: IndexMap<String, FieldInfo>,
    pub extends: Vec<TypeId>,
    pub type_params: Vec<String>,
}

/// A computed enum member value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumValue {
    Number(f64),
    String(String),
}

/// One enum in the arena.
#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub name: String,
    pub span: Span,
    pub is_const: bool,
    pub members: Vec<(String, EnumValue)>,
}

/// Result of checking one program.
pub struct CheckResult {
    pub type_map: TypeMap,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Shared state for type checking one program.
pub struct CheckerState {
    pub file_name: String,
    pub options: EngineOptions,
    pub types: TypeInterner,
    pub scopes: Scopes,
    pub diagnostics: Vec<Diagnostic>,
    pub type_map: TypeMap,

    // --- Arenas ---
    pub classes: Vec<ClassInfo>,
    pub interfaces: Vec<InterfaceInfo>,
    pub enums: Vec<EnumInfo>,

    // --- Caches ---
    /// Memoised `assignable(expected, actual)` results.
    pub relation_cache: FxHashMap<(TypeId, TypeId), bool>,
    /// Pairs currently being related (coinductive cycle guard).
    pub relation_in_progress: FxHashSet<(TypeId, TypeId)>,

    // --- Context ---
    /// Expected return type of the enclosing function, if annotated.
    pub return_types: Vec<Option<TypeId>>,
    /// The class whose body is being checked (for `this` and `super`).
    pub class_stack: Vec<ClassId>,
    /// Narrowing overlays left in force past their `if` statement (the
    /// then-branch terminated); popped at the enclosing body boundary.
    pub(crate) retained_overlays: usize,
    /// Aliases currently expanding (self-referential aliases terminate as
    /// opaque references).
    pub(crate) alias_expansion_stack: Vec<String>,
    /// Deduplication of (start, code) pairs.
    emitted: FxHashSet<(u32, u32)>,
}

impl CheckerState {
    #[must_use]
    pub fn new(file_name: String, options: EngineOptions) -> Self {
        let mut state = CheckerState {
            file_name,
            options,
            types: TypeInterner::new(),
            scopes: Scopes::new(),
            diagnostics: Vec::new(),
            type_map: TypeMap::default(),
            classes: Vec::new(),
            interfaces: Vec::new(),
            enums: Vec::new(),
            relation_cache: FxHashMap::default(),
            relation_in_progress: FxHashSet::default(),
            return_types: Vec::new(),
            class_stack: Vec::new(),
            retained_overlays: 0,
            alias_expansion_stack: Vec::new(),
            emitted: FxHashSet::default(),
        };
        state.install_globals();
        state
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn error_at(&mut self, span: Span, message: String, code: u32) {
        if !self.emitted.insert((span.start, code)) {
            return;
        }
        self.diagnostics.push(Diagnostic::error(
            self.file_name.clone(),
            span.start,
            span.len(),
            message,
            code,
        ));
    }

    // =========================================================================
    // Arena access
    // =========================================================================

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.0 as usize]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassInfo {
        &mut self.classes[id.0 as usize]
    }

    pub fn interface(&self, id: InterfaceId) -> &InterfaceInfo {
        &self.interfaces[id.0 as usize]
    }

    pub fn enum_info(&self, id: EnumId) -> &EnumInfo {
        &self.enums[id.0 as usize]
    }

    /// Walk a class's superclass chain, innermost first (excluding self).
    pub fn superclass_chain(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = self.class(id).superclass;
        while let Some(cid) = current {
            if chain.contains(&cid) {
                break;
            }
            chain.push(cid);
            current = self.class(cid).superclass;
        }
        chain
    }

    /// Find a member on a class or its superclass chain.
    pub fn find_instance_member(&self, id: ClassId, name: &str) -> Option<(ClassId, &MemberInfo)> {
        if let Some(member) = self.class(id).instance.get(name) {
            return Some((id, member));
        }
        for cid in self.superclass_chain(id) {
            if let Some(member) = self.class(cid).instance.get(name) {
                return Some((cid, member));
            }
        }
        None
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// Render a type for diagnostics.
    pub fn display_type(&self, id: TypeId) -> String {
        match self.types.get(id) {
            Type::Any => "any".to_string(),
            Type::Unknown => "unknown".to_string(),
            Type::Never => "never".to_string(),
            Type::Void => "void".to_string(),
            Type::Number => "number".to_string(),
            Type::String => "string".to_string(),
            Type::Boolean => "boolean".to_string(),
            Type::Bigint => "bigint".to_string(),
            Type::Null => "null".to_string(),
            Type::Undefined => "undefined".to_string(),
            Type::Symbol => "symbol".to_string(),
            Type::Error => "error".to_string(),
            Type::NumberLiteral(bits) => tsi_common::numeric::format_number(f64::from_bits(*bits)),
            Type::StringLiteral(s) => format!("\"{s}\""),
            Type::BooleanLiteral(b) => b.to_string(),
            Type::Array(element) => {
                let inner = self.display_type(*element);
                if inner.contains(' ') {
                    format!("({inner})[]")
                } else {
                    format!("{inner}[]")
                }
            }
            Type::Tuple { elements, rest } => {
                let mut parts: Vec<String> =
                    elements.iter().map(|&e| self.display_type(e)).collect();
                if let Some(rest) = rest {
                    parts.push(format!("...{}[]", self.display_type(*rest)));
                }
                format!("[{}]", parts.join(", "))
            }
            Type::Record { fields, .. } => {
                if fields.is_empty() {
                    return "{}".to_string();
                }
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, info)| {
                        format!(
                            "{name}{}: {}",
                            if info.optional { "?" } else { "" },
                            self.display_type(info.ty)
                        )
                    })
                    .collect();
                format!("{{ {} }}", parts.join("; "))
            }
            Type::Function(shape) => {
                let params: Vec<String> = shape
                    .params
                    .iter()
                    .map(|p| {
                        format!(
                            "{}{}{}: {}",
                            if p.rest { "..." } else { "" },
                            p.name,
                            if p.optional { "?" } else { "" },
                            self.display_type(p.ty)
                        )
                    })
                    .collect();
                format!("({}) => {}", params.join(", "), self.display_type(shape.ret))
            }
            Type::Overloads(sigs) => format!("{{ {} overloads }}", sigs.len()),
            Type::Class(id) => format!("typeof {}", self.class(*id).name),
            Type::Instance(id, args) => {
                let name = &self.class(*id).name;
                if args.is_empty() {
                    name.clone()
                } else {
                    let args: Vec<String> = args.iter().map(|&a| self.display_type(a)).collect();
                    format!("{name}<{}>", args.join(", "))
                }
            }
            Type::Interface(id) => self.interface(*id).name.clone(),
            Type::Enum(id) => self.enum_info(*id).name.clone(),
            Type::EnumMember(id, index) => {
                let info = self.enum_info(*id);
                let member = info
                    .members
                    .get(*index as usize)
                    .map(|(name, _)| name.as_str())
                    .unwrap_or("?");
                format!("{}.{member}", info.name)
            }
            Type::Union(members) => {
                let parts: Vec<String> = members.iter().map(|&m| self.display_type(m)).collect();
                parts.join(" | ")
            }
            Type::Intersection(members) => {
                let parts: Vec<String> = members.iter().map(|&m| self.display_type(m)).collect();
                parts.join(" & ")
            }
            Type::Ref(name) => name.clone(),
            Type::TypeParam(name) => name.clone(),
            Type::Infer(name) => format!("infer {name}"),
            Type::Template { quasis, types } => {
                let mut out = String::from("`");
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if i < types.len() {
                        out.push_str("${");
                        out.push_str(&self.display_type(types[i]));
                        out.push('}');
                    }
                }
                out.push('`');
                out
            }
        }
    }

    // =========================================================================
    // Globals
    // =========================================================================

    /// Declare the host-provided globals the interpreter's capability table
    /// will back at runtime.
    fn install_globals(&mut self) {
        let void_fn_any = self.fn_variadic(TypeId::VOID);
        let any_fn_any = self.fn_variadic(TypeId::ANY);
        let string_fn_any = self.fn_variadic(TypeId::STRING);
        let number_fn_any = self.fn_variadic(TypeId::NUMBER);
        let boolean_fn_any = self.fn_variadic(TypeId::BOOLEAN);

        let console = self.record(vec![
            ("log", void_fn_any),
            ("error", void_fn_any),
            ("warn", void_fn_any),
            ("info", void_fn_any),
            ("debug", void_fn_any),
        ]);
        self.declare_builtin("console", console);

        let unary_number = self.fn_of(vec![("x", TypeId::NUMBER)], TypeId::NUMBER);
        let binary_number = self.fn_of(
            vec![("a", TypeId::NUMBER), ("b", TypeId::NUMBER)],
            TypeId::NUMBER,
        );
        let math = self.record(vec![
            ("PI", TypeId::NUMBER),
            ("E", TypeId::NUMBER),
            ("abs", unary_number),
            ("floor", unary_number),
            ("ceil", unary_number),
            ("round", unary_number),
            ("trunc", unary_number),
            ("sqrt", unary_number),
            ("cbrt", unary_number),
            ("sign", unary_number),
            ("log", unary_number),
            ("log2", unary_number),
            ("log10", unary_number),
            ("exp", unary_number),
            ("sin", unary_number),
            ("cos", unary_number),
            ("tan", unary_number),
            ("atan2", binary_number),
            ("pow", binary_number),
            ("min", number_fn_any),
            ("max", number_fn_any),
            ("random", number_fn_any),
            ("hypot", number_fn_any),
        ]);
        self.declare_builtin("Math", math);

        let parse = self.fn_of(vec![("text", TypeId::STRING)], TypeId::ANY);
        let json = self.record(vec![("parse", parse), ("stringify", string_fn_any)]);
        self.declare_builtin("JSON", json);

        // Object.freeze/seal keep the argument type.
        let freeze_ty = {
            let t = self.types.intern(Type::TypeParam("T".to_string()));
            self.types.intern(Type::Function(FunctionShape {
                params: vec![ParamInfo {
                    name: "value".to_string(),
                    ty: t,
                    optional: false,
                    rest: false,
                }],
                ret: t,
                type_params: vec!["T".to_string()],
                this_type: None,
                predicate: None,
            }))
        };
        let string_array = self.types.array(TypeId::STRING);
        let keys_ty = self.fn_of(vec![("value", TypeId::ANY)], string_array);
        let any_array = self.types.array(TypeId::ANY);
        let values_ty = self.fn_of(vec![("value", TypeId::ANY)], any_array);
        let object = self.record(vec![
            ("freeze", freeze_ty),
            ("seal", freeze_ty),
            ("isFrozen", boolean_fn_any),
            ("isSealed", boolean_fn_any),
            ("keys", keys_ty),
            ("values", values_ty),
            ("entries", values_ty),
            ("assign", any_fn_any),
            ("getOwnPropertyNames", keys_ty),
            ("defineProperty", any_fn_any),
            ("create", any_fn_any),
        ]);
        self.declare_builtin("Object", object);

        let is_array = self.fn_of(vec![("value", TypeId::ANY)], TypeId::BOOLEAN);
        let array = self.record(vec![
            ("isArray", is_array),
            ("from", any_fn_any),
            ("of", any_fn_any),
        ]);
        self.declare_builtin("Array", array);

        let number_obj = self.record(vec![
            ("isInteger", boolean_fn_any),
            ("isFinite", boolean_fn_any),
            ("isNaN", boolean_fn_any),
            ("isSafeInteger", boolean_fn_any),
            ("parseFloat", number_fn_any),
            ("parseInt", number_fn_any),
            ("MAX_SAFE_INTEGER", TypeId::NUMBER),
            ("MIN_SAFE_INTEGER", TypeId::NUMBER),
            ("MAX_VALUE", TypeId::NUMBER),
            ("MIN_VALUE", TypeId::NUMBER),
            ("EPSILON", TypeId::NUMBER),
            ("POSITIVE_INFINITY", TypeId::NUMBER),
            ("NEGATIVE_INFINITY", TypeId::NUMBER),
            ("NaN", TypeId::NUMBER),
        ]);
        self.declare_builtin("Number", number_obj);

        // Error classes are real nominal classes so `extends Error`,
        // `instanceof` narrowing and `.message` reads check properly.
        self.install_error_classes();

        // Remaining host surfaces participate as `any`: their members are
        // dispatched dynamically through the capability table.
        for name in [
            "String", "Boolean", "Symbol", "Promise", "Map", "Set", "WeakMap", "WeakSet", "Date",
            "RegExp", "globalThis",
        ] {
            self.declare_builtin(name, TypeId::ANY);
        }
        for (name, ty) in [
            ("parseInt", number_fn_any),
            ("parseFloat", number_fn_any),
            ("isNaN", boolean_fn_any),
            ("isFinite", boolean_fn_any),
            ("setTimeout", number_fn_any),
            ("clearTimeout", void_fn_any),
            ("setInterval", number_fn_any),
            ("clearInterval", void_fn_any),
            ("structuredClone", any_fn_any),
        ] {
            self.declare_builtin(name, ty);
        }
        self.declare_builtin("undefined", TypeId::UNDEFINED);
        self.declare_builtin("NaN", TypeId::NUMBER);
        self.declare_builtin("Infinity", TypeId::NUMBER);
    }

    fn install_error_classes(&mut self) {
        let message_param = ParamInfo {
            name: "message".to_string(),
            ty: TypeId::STRING,
            optional: true,
            rest: false,
        };
        let names = ["Error", "TypeError", "RangeError", "ReferenceError", "SyntaxError"];
        let mut base_id = None;
        for name in names {
            let id = ClassId(self.classes.len() as u32);
            let ctor = self.types.intern(Type::Function(FunctionShape {
                params: vec![message_param.clone()],
                ret: TypeId::VOID,
                type_params: Vec::new(),
                this_type: None,
                predicate: None,
            }));
            let mut instance = IndexMap::new();
            for (field, ty) in [
                ("name", TypeId::STRING),
                ("message", TypeId::STRING),
                ("stack", TypeId::STRING),
            ] {
                instance.insert(
                    field.to_string(),
                    MemberInfo {
                        ty,
                        kind: MemberKind::Field,
                        visibility: Visibility::Public,
                        readonly: false,
                        is_abstract: false,
                        has_override: false,
                        is_private_name: false,
                        span: Span::dummy(),
                    },
                );
            }
            self.classes.push(ClassInfo {
                name: name.to_string(),
                span: Span::dummy(),
                superclass: if name == "Error" { None } else { base_id },
                type_params: Vec::new(),
                instance,
                statics: IndexMap::new(),
                ctor: Some(ctor),
                is_abstract: false,
            });
            if name == "Error" {
                base_id = Some(id);
            }
            let class_ty = self.types.intern(Type::Class(id));
            self.declare_builtin(name, class_ty);
            self.scopes
                .declare_type(name, crate::env::TypeBinding::Class(id));
        }
    }

    fn declare_builtin(&mut self, name: &str, ty: TypeId) {
        self.scopes.declare_value(
            name,
            Binding {
                ty,
                kind: BindingKind::Builtin,
            },
        );
    }

    /// `(…args: any[]) => ret`
    pub fn fn_variadic(&mut self, ret: TypeId) -> TypeId {
        let any_array = self.types.array(TypeId::ANY);
        self.types.intern(Type::Function(FunctionShape {
            params: vec![ParamInfo {
                name: "args".to_string(),
                ty: any_array,
                optional: false,
                rest: true,
            }],
            ret,
            type_params: Vec::new(),
            this_type: None,
            predicate: None,
        }))
    }

    pub fn fn_of(&mut self, params: Vec<(&str, TypeId)>, ret: TypeId) -> TypeId {
        let params = params
            .into_iter()
            .map(|(name, ty)| ParamInfo {
                name: name.to_string(),
                ty,
                optional: false,
                rest: false,
            })
            .collect();
        self.types.intern(Type::Function(FunctionShape {
            params,
            ret,
            type_params: Vec::new(),
            this_type: None,
            predicate: None,
        }))
    }

    pub fn record(&mut self, fields: Vec<(&str, TypeId)>) -> TypeId {
        let fields = fields
            .into_iter()
            .map(|(name, ty)| {
                (
                    name.to_string(),
                    FieldInfo {
                        ty,
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
    }
}

/// Check a parsed program: hoist declarations, then check statements.
/// Accumulates diagnostics; never panics on malformed input.
pub fn check_program(program: &Program, options: &EngineOptions) -> CheckResult {
    let mut state = CheckerState::new(program.file_name.clone(), options.clone());
    state.check_body(&program.statements);
    CheckResult {
        type_map: state.type_map,
        diagnostics: state.diagnostics,
    }
}

/// Report a name that failed to resolve.
pub(crate) fn not_in_scope(state: &mut CheckerState, name: &str, span: Span) -> TypeId {
    state.error_at(
        span,
        format!("Cannot find name '{name}'."),
        diagnostic_codes::NOT_IN_SCOPE,
    );
    TypeId::ERROR
}
