//! The abstract syntax tree.
//!
//! Two disjoint sums, `Expr` and `Stmt`, plus auxiliary records for
//! parameters, property keys and class members. Nodes are created by the
//! parser and never mutated afterwards. Every expression carries a
//! `NodeId` unique within its program; the checker's type map and the
//! interpreter's per-call-site caches key off that identity.
//!
//! The parser desugars eagerly: `for` loops arrive here as `While` inside
//! a `Block`, and destructuring patterns arrive as fresh temporaries plus
//! element reads, so later phases only ever see plain bindings.

use bitflags::bitflags;
use num_bigint::BigInt;
use std::rc::Rc;
use tsi_common::span::{Span, Spanned};

use crate::types_ast::{TypeNode, TypeParam};

/// Identity of an expression node, unique within one parsed program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression node: identity + location + variant.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

/// Literal values appearing directly in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Number(f64),
    String(String),
    Boolean(bool),
    BigInt(BigInt),
    Null,
    Undefined,
}

/// Binary (non-logical) operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    In,
    Instanceof,
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
}

/// Increment/decrement operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

/// The place an assignment (or update) writes to.
///
/// Reads use `Get`/`GetIndex`/`PrivateGet` expression variants; writes of
/// every flavor go through one target shape so the interpreter has a single
/// write path to enforce frozen/sealed bits on.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    /// A plain binding.
    Name(String),
    /// `obj.prop`
    Property { object: Box<Expr>, name: String },
    /// `obj[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
    /// `obj.#field`
    Private { object: Box<Expr>, name: String },
}

/// One element of an array literal.
#[derive(Debug, Clone)]
pub struct ArrayElement {
    pub spread: bool,
    pub expr: Expr,
}

/// One argument at a call site.
#[derive(Debug, Clone)]
pub struct Argument {
    pub spread: bool,
    pub expr: Expr,
}

/// A property key in object literals, classes and interfaces.
#[derive(Debug, Clone)]
pub enum PropertyKey {
    Ident(String),
    String(String),
    Number(f64),
    /// `#name` (class bodies only)
    Private(String),
    Computed(Box<Expr>),
}

impl PropertyKey {
    /// Static (non-computed) key text, if known at parse time.
    #[must_use]
    pub fn static_name(&self) -> Option<String> {
        match self {
            PropertyKey::Ident(s) | PropertyKey::String(s) | PropertyKey::Private(s) => {
                Some(s.clone())
            }
            PropertyKey::Number(n) => Some(tsi_common::numeric::format_number(*n)),
            PropertyKey::Computed(_) => None,
        }
    }
}

/// One property of an object literal.
#[derive(Debug, Clone)]
pub enum ObjectProperty {
    KeyValue { key: PropertyKey, value: Expr },
    Shorthand { name: String, id: NodeId, span: Span },
    Spread(Expr),
    Method { key: PropertyKey, func: Rc<FunctionData> },
    Getter { key: PropertyKey, func: Rc<FunctionData> },
    Setter { key: PropertyKey, func: Rc<FunctionData> },
}

/// One fragment of a template literal (between substitutions).
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateElement {
    pub cooked: String,
    pub raw: String,
}

bitflags! {
    /// Shape flags on function-like nodes. Generator and async flags are
    /// set only on function-shaped nodes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u8 {
        const ASYNC = 1 << 0;
        const GENERATOR = 1 << 1;
        /// Arrow function: inherits `this` from the enclosing frame.
        const ARROW = 1 << 2;
        /// Body executes in strict mode.
        const STRICT = 1 << 3;
    }
}

/// A formal parameter after pattern lowering: always a plain name.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_ann: Option<TypeNode>,
    pub optional: bool,
    pub rest: bool,
    pub default: Option<Expr>,
    /// Parameter-property visibility (`constructor(public x: number)`),
    /// recorded so the class can materialise the field.
    pub modifiers: MemberModifiers,
    pub span: Span,
}

/// A function body: block statements, or a bare expression (arrows).
#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Box<Expr>),
}

/// Shared payload of function declarations, function/arrow expressions
/// and class methods.
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub flags: FunctionFlags,
    pub type_params: Vec<TypeParam>,
    pub return_type: Option<TypeNode>,
    pub span: Span,
}

impl FunctionData {
    /// Count of required parameters (the reflected `length`).
    #[must_use]
    pub fn required_param_count(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !p.optional && !p.rest && p.default.is_none())
            .count()
    }
}

/// Expression variants.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Lit),
    Variable(String),
    This,
    /// `super.name` reference; `super(...)` is a Call with Super callee.
    Super { method: Option<String> },
    Grouping(Box<Expr>),

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    NullishCoalescing {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Delete(Box<Expr>),

    Assign {
        target: AssignTarget,
        value: Box<Expr>,
    },
    CompoundAssign {
        target: AssignTarget,
        op: BinaryOp,
        value: Box<Expr>,
    },
    /// `&&=`, `||=`, `??=`
    LogicalAssign {
        target: AssignTarget,
        op: LogicalAssignOp,
        value: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: AssignTarget,
    },

    /// `obj.name`
    Get {
        object: Box<Expr>,
        name: String,
        optional: bool,
    },
    /// `obj[index]`
    GetIndex {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    /// `obj.#name`
    PrivateGet {
        object: Box<Expr>,
        name: String,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
        type_args: Vec<TypeNode>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Argument>,
        type_args: Vec<TypeNode>,
    },
    /// Function and arrow-function expressions.
    Function(Rc<FunctionData>),

    ArrayLiteral(Vec<ArrayElement>),
    ObjectLiteral(Vec<ObjectProperty>),
    Spread(Box<Expr>),

    TemplateLiteral {
        quasis: Vec<TemplateElement>,
        exprs: Vec<Expr>,
    },
    TaggedTemplate {
        tag: Box<Expr>,
        quasis: Vec<TemplateElement>,
        exprs: Vec<Expr>,
    },
    RegexLiteral {
        pattern: String,
        flags: String,
    },

    /// `expr as T` / `<T>expr` - runtime pass-through.
    TypeAssertion {
        expr: Box<Expr>,
        type_ann: TypeNode,
    },
    /// `expr satisfies T` - runtime pass-through.
    Satisfies {
        expr: Box<Expr>,
        type_ann: TypeNode,
    },
    /// `expr!` - runtime pass-through.
    NonNull(Box<Expr>),

    Await(Box<Expr>),
    Yield {
        value: Option<Box<Expr>>,
        delegate: bool,
    },
    /// `import(path)`
    DynamicImport(Box<Expr>),
    ImportMeta,
    ClassExpr(Rc<ClassData>),
}

/// Operators usable in logical assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalAssignOp {
    AndAnd,
    OrOr,
    Nullish,
}

// =============================================================================
// Statements
// =============================================================================

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

/// One declarator of a `var`/`let`/`const` statement. Patterns are lowered
/// by the parser, so the name is always plain.
#[derive(Debug, Clone)]
pub struct VarDeclarator {
    pub name: String,
    pub type_ann: Option<TypeNode>,
    pub init: Option<Expr>,
    /// Synthesised by destructuring lowering (hidden from `for-in` etc.).
    pub synthetic: bool,
    pub span: Span,
}

bitflags! {
    /// Modifiers on class members and parameter properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MemberModifiers: u16 {
        const STATIC = 1 << 0;
        const PUBLIC = 1 << 1;
        const PRIVATE = 1 << 2;
        const PROTECTED = 1 << 3;
        const READONLY = 1 << 4;
        const ABSTRACT = 1 << 5;
        const OVERRIDE = 1 << 6;
        const DECLARE = 1 << 7;
        const ACCESSOR = 1 << 8;
    }
}

/// A decorator attached to a class or member (metadata capture point).
#[derive(Debug, Clone)]
pub struct Decorator {
    pub expr: Expr,
    pub span: Span,
}

/// One member of a class body.
#[derive(Debug, Clone)]
pub enum ClassMember {
    Constructor {
        func: Rc<FunctionData>,
        decorators: Vec<Decorator>,
    },
    Method {
        key: PropertyKey,
        func: Rc<FunctionData>,
        modifiers: MemberModifiers,
        decorators: Vec<Decorator>,
    },
    Getter {
        key: PropertyKey,
        func: Rc<FunctionData>,
        modifiers: MemberModifiers,
        decorators: Vec<Decorator>,
    },
    Setter {
        key: PropertyKey,
        func: Rc<FunctionData>,
        modifiers: MemberModifiers,
        decorators: Vec<Decorator>,
    },
    /// Instance or static field; `accessor` fields carry the ACCESSOR bit.
    Field {
        key: PropertyKey,
        type_ann: Option<TypeNode>,
        init: Option<Expr>,
        modifiers: MemberModifiers,
        decorators: Vec<Decorator>,
        span: Span,
    },
    StaticBlock(Vec<Stmt>),
}

/// A class declaration or expression.
#[derive(Debug, Clone)]
pub struct ClassData {
    pub name: Option<String>,
    pub superclass: Option<Expr>,
    pub super_type_args: Vec<TypeNode>,
    pub implements: Vec<TypeNode>,
    pub members: Vec<ClassMember>,
    pub type_params: Vec<TypeParam>,
    pub is_abstract: bool,
    pub decorators: Vec<Decorator>,
    pub span: Span,
}

impl ClassData {
    /// The explicit constructor, if one was written.
    #[must_use]
    pub fn constructor(&self) -> Option<&Rc<FunctionData>> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Constructor { func, .. } => Some(func),
            _ => None,
        })
    }
}

/// One member of an interface body.
#[derive(Debug, Clone)]
pub enum InterfaceMember {
    Property {
        name: String,
        type_ann: TypeNode,
        optional: bool,
        readonly: bool,
    },
    Method {
        name: String,
        params: Vec<Param>,
        return_type: Option<TypeNode>,
        type_params: Vec<TypeParam>,
        optional: bool,
    },
    IndexSignature {
        key_name: String,
        key_type: TypeNode,
        value_type: TypeNode,
    },
}

/// One member of an enum declaration.
#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

/// An import binding clause.
#[derive(Debug, Clone)]
pub enum ImportClause {
    /// `import d from "m"`
    Default(String),
    /// `import * as ns from "m"`
    Namespace(String),
    /// `import { a, b as c } from "m"`
    Named(Vec<ImportSpecifier>),
    /// `import "m"` (side effects only)
    Bare,
}

#[derive(Debug, Clone)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
    pub type_only: bool,
}

/// What an `export` statement exports.
#[derive(Debug, Clone)]
pub enum ExportKind {
    /// `export <declaration>`
    Decl(Box<Stmt>),
    /// `export default <expr>`
    DefaultExpr(Expr),
    /// `export { a, b as c }`
    Named(Vec<ExportSpecifier>),
    /// `export * from "m"`
    Star { source: String },
}

#[derive(Debug, Clone)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

/// One arm of a `switch`.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A statement node.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

impl Spanned for Stmt {
    fn span(&self) -> Span {
        self.span
    }
}

/// Statement variants. `For` never appears: the parser lowers it to a
/// `Block { init, While }` shape before handing the tree out.
#[derive(Debug, Clone)]
pub enum StmtKind {
    Expression(Expr),
    Var {
        kind: VarKind,
        decls: Vec<VarDeclarator>,
    },
    Function(Rc<FunctionData>),
    Class(Rc<ClassData>),
    Interface {
        name: String,
        type_params: Vec<TypeParam>,
        extends: Vec<TypeNode>,
        members: Vec<InterfaceMember>,
    },
    TypeAlias {
        name: String,
        type_params: Vec<TypeParam>,
        type_ann: TypeNode,
    },
    Enum {
        name: String,
        is_const: bool,
        members: Vec<EnumMember>,
    },
    Namespace {
        name: String,
        body: Vec<Stmt>,
    },
    Import {
        clause: ImportClause,
        source: String,
        type_only: bool,
    },
    Export(ExportKind),

    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        /// Set when this loop was desugared from a `for` statement; the
        /// step expression runs after `continue` as well.
        step: Option<Expr>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    ForOf {
        binding: String,
        binding_kind: VarKind,
        iterable: Expr,
        body: Box<Stmt>,
    },
    ForIn {
        binding: String,
        binding_kind: VarKind,
        object: Expr,
        body: Box<Stmt>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Try {
        block: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    Empty,
}

/// The `catch` clause of a try statement.
#[derive(Debug, Clone)]
pub struct CatchClause {
    /// Binding for the thrown value; `None` for `catch {}`.
    pub binding: Option<String>,
    pub type_ann: Option<TypeNode>,
    pub body: Vec<Stmt>,
}

/// A whole parsed program (or module).
#[derive(Debug, Clone)]
pub struct Program {
    pub file_name: String,
    pub statements: Vec<Stmt>,
    /// One past the highest `NodeId` handed out while parsing.
    pub node_count: u32,
}
