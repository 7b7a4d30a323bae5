//! The type-annotation vocabulary.
//!
//! Type syntax is parsed into this parallel tree and never influences
//! runtime semantics directly; only the checker (and the compile surface)
//! consume it. Unrecognised type syntax is preserved as raw text so the
//! checker can diagnose it instead of the parser bailing out.

use tsi_common::span::Span;

use crate::ast::Lit;

/// Built-in keyword types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKeyword {
    Number,
    String,
    Boolean,
    Bigint,
    Symbol,
    Object,
    Null,
    Undefined,
    Void,
    Any,
    Unknown,
    Never,
    This,
}

/// A parameter of a function type or call signature.
#[derive(Debug, Clone)]
pub struct TypeFnParam {
    pub name: String,
    pub type_ann: Option<TypeNode>,
    pub optional: bool,
    pub rest: bool,
}

/// A declared type parameter (`<T extends U = D>`).
#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Option<TypeNode>,
    pub default: Option<TypeNode>,
    pub span: Span,
}

/// One member of an inline object type.
#[derive(Debug, Clone)]
pub enum TypeMember {
    Property {
        name: String,
        type_ann: TypeNode,
        optional: bool,
        readonly: bool,
    },
    Method {
        name: String,
        params: Vec<TypeFnParam>,
        return_type: Box<TypeNode>,
        type_params: Vec<TypeParam>,
        optional: bool,
    },
    IndexSignature {
        key_name: String,
        key_type: Box<TypeNode>,
        value_type: Box<TypeNode>,
    },
    Call {
        params: Vec<TypeFnParam>,
        return_type: Box<TypeNode>,
        type_params: Vec<TypeParam>,
    },
}

/// Modifier position in mapped types (`+?`, `-?`, `+readonly`, `-readonly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappedModifier {
    #[default]
    None,
    Add,
    Remove,
}

/// A type annotation node.
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub span: Span,
    pub kind: TypeNodeKind,
}

/// Type annotation variants.
#[derive(Debug, Clone)]
pub enum TypeNodeKind {
    Keyword(TypeKeyword),
    /// A (possibly qualified) reference: `Foo`, `ns.Foo`, `Foo<T>`.
    Ref {
        name: String,
        type_args: Vec<TypeNode>,
    },
    Literal(Lit),
    Array(Box<TypeNode>),
    Tuple {
        elements: Vec<TypeNode>,
        rest: Option<Box<TypeNode>>,
    },
    Union(Vec<TypeNode>),
    Intersection(Vec<TypeNode>),
    Function {
        params: Vec<TypeFnParam>,
        return_type: Box<TypeNode>,
        type_params: Vec<TypeParam>,
    },
    Object(Vec<TypeMember>),
    Parenthesized(Box<TypeNode>),
    /// `keyof T`
    Keyof(Box<TypeNode>),
    /// `readonly T` (array/tuple positions)
    Readonly(Box<TypeNode>),
    /// `typeof name`
    TypeQuery(String),
    /// `T[K]`
    IndexedAccess {
        object: Box<TypeNode>,
        index: Box<TypeNode>,
    },
    /// `` `a${T}b` ``
    TemplateLiteral {
        quasis: Vec<String>,
        types: Vec<TypeNode>,
    },
    /// `{ [K in T as R]?: V }`
    Mapped {
        param_name: String,
        in_type: Box<TypeNode>,
        as_type: Option<Box<TypeNode>>,
        value_type: Box<TypeNode>,
        optional: MappedModifier,
        readonly: MappedModifier,
    },
    /// `C extends E ? T : F`
    Conditional {
        check: Box<TypeNode>,
        extends: Box<TypeNode>,
        true_type: Box<TypeNode>,
        false_type: Box<TypeNode>,
    },
    /// `infer R`
    Infer(String),
    /// `x is T`
    Predicate {
        param: String,
        type_ann: Box<TypeNode>,
    },
    /// Unrecognised syntax preserved verbatim for the checker to diagnose.
    Unknown(String),
}

impl TypeNode {
    #[must_use]
    pub fn new(span: Span, kind: TypeNodeKind) -> Self {
        TypeNode { span, kind }
    }
}
