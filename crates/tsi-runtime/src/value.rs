//! The runtime value universe.
//!
//! A closed tag set. Number and BigInt are distinct and never coerce into
//! each other. `Undefined` is a singleton observably distinct from `Null`.
//! Heap values (objects, arrays, instances, functions) are reference-
//! counted; cycles between them are permitted and never broken while the
//! engine runs. Classes live in an arena owned by the interpreter and are
//! referenced by stable `ClassId` indices; instances hold a class index
//! plus a field map.

use indexmap::IndexMap;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use tsi_parser::ast::{ClassData, FunctionData};

use crate::env::EnvRef;
use crate::generator::GeneratorState;
use crate::interp::Interpreter;

/// Index into the interpreter's runtime class arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// Interned symbol identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    String(Rc<str>),
    Boolean(bool),
    Null,
    Undefined,
    BigInt(Rc<BigInt>),
    Symbol(SymbolId),
    Array(Rc<RefCell<ArrayData>>),
    Object(Rc<RefCell<ObjectData>>),
    Instance(Rc<RefCell<InstanceData>>),
    Function(Rc<FunctionValue>),
    Class(ClassId),
    Regex(Rc<RegexValue>),
    Date(Rc<RefCell<f64>>),
    Promise(Rc<RefCell<PromiseData>>),
    Map(Rc<RefCell<MapData>>),
    Set(Rc<RefCell<SetData>>),
    Generator(Rc<RefCell<GeneratorState>>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// The `typeof` string for this value.
    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Undefined => "undefined",
            Value::BigInt(_) => "bigint",
            Value::Symbol(_) => "symbol",
            Value::Function(_) | Value::Class(_) => "function",
            // typeof null === "object"
            _ => "object",
        }
    }

    /// ECMAScript ToBoolean.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Null | Value::Undefined => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::BigInt(v) => **v != BigInt::from(0),
            _ => true,
        }
    }

    /// Reference identity for heap values, value identity for primitives
    /// (the `===` relation without coercion).
    #[must_use]
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => Rc::ptr_eq(a, b),
            (Value::Date(a), Value::Date(b)) => Rc::ptr_eq(a, b),
            (Value::Promise(a), Value::Promise(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Generator(a), Value::Generator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Null => write!(f, "Null"),
            Value::Undefined => write!(f, "Undefined"),
            Value::BigInt(v) => write!(f, "BigInt({v})"),
            Value::Symbol(id) => write!(f, "Symbol({})", id.0),
            Value::Array(_) => write!(f, "Array"),
            Value::Object(_) => write!(f, "Object"),
            Value::Instance(_) => write!(f, "Instance"),
            Value::Function(func) => write!(f, "Function({:?})", func.name.borrow()),
            Value::Class(id) => write!(f, "Class({})", id.0),
            Value::Regex(r) => write!(f, "Regex(/{}/{})", r.pattern, r.flags),
            Value::Date(_) => write!(f, "Date"),
            Value::Promise(_) => write!(f, "Promise"),
            Value::Map(_) => write!(f, "Map"),
            Value::Set(_) => write!(f, "Set"),
            Value::Generator(_) => write!(f, "Generator"),
        }
    }
}

// =============================================================================
// Arrays
// =============================================================================

/// Ordered sequence of values with frozen/sealed bits enforced on every
/// write path (assignment, push, splice, reverse, ...).
#[derive(Debug, Default)]
pub struct ArrayData {
    pub elements: Vec<Value>,
    pub frozen: bool,
    pub sealed: bool,
}

impl ArrayData {
    pub fn new(elements: Vec<Value>) -> Rc<RefCell<ArrayData>> {
        Rc::new(RefCell::new(ArrayData {
            elements,
            frozen: false,
            sealed: false,
        }))
    }
}

// =============================================================================
// Objects
// =============================================================================

/// A getter/setter pair attached to an object key.
#[derive(Clone)]
pub struct Accessor {
    pub getter: Option<Rc<FunctionValue>>,
    pub setter: Option<Rc<FunctionValue>>,
}

/// Plain object: string keys in insertion order, optional symbol-keyed
/// slots, optional accessors, frozen/sealed bits.
#[derive(Default)]
pub struct ObjectData {
    pub properties: IndexMap<String, Value>,
    pub symbols: FxHashMap<SymbolId, Value>,
    pub accessors: IndexMap<String, Accessor>,
    pub frozen: bool,
    pub sealed: bool,
}

impl ObjectData {
    pub fn new() -> Rc<RefCell<ObjectData>> {
        Rc::new(RefCell::new(ObjectData::default()))
    }
}

// =============================================================================
// Instances
// =============================================================================

/// A class instance: class index plus field map. Methods are found on the
/// class arena entry, not copied per instance.
pub struct InstanceData {
    pub class: ClassId,
    pub fields: IndexMap<String, Value>,
    /// `#name` fields, fenced from ordinary property access.
    pub private_fields: FxHashMap<String, Value>,
    pub symbols: FxHashMap<SymbolId, Value>,
    pub frozen: bool,
    pub sealed: bool,
}

impl InstanceData {
    pub fn new(class: ClassId) -> Rc<RefCell<InstanceData>> {
        Rc::new(RefCell::new(InstanceData {
            class,
            fields: IndexMap::new(),
            private_fields: FxHashMap::default(),
            symbols: FxHashMap::default(),
            frozen: false,
            sealed: false,
        }))
    }
}

// =============================================================================
// Functions
// =============================================================================

/// A native (host) function: receives the interpreter, the receiver and
/// the argument slice; may throw by returning `Err`.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, Value, &[Value]) -> Result<Value, Value>>;

/// How a function value executes.
pub enum FnKind {
    /// Parsed source function.
    Script(Rc<FunctionData>),
    /// Host-provided callable from the capability table.
    Native { func: NativeFn, arity: usize },
    /// `f.bind(thisArg, ...)` result.
    Bound {
        target: Rc<FunctionValue>,
        bound_this: Value,
        bound_args: Vec<Value>,
    },
}

/// A function value: formal parameters and body (via the shared AST
/// payload), the captured environment, flags, an optional `this` binding
/// and the reflected `length`/`name`.
pub struct FunctionValue {
    pub kind: FnKind,
    /// Lexical closure: the environment active at the creation point.
    pub env: Option<EnvRef>,
    /// `this` for arrows (captured) and bound methods.
    pub this_binding: RefCell<Option<Value>>,
    /// Home class for `super` resolution inside methods.
    pub home_class: RefCell<Option<ClassId>>,
    pub name: RefCell<Option<String>>,
    /// Count of required parameters.
    pub length: usize,
    /// Normalised body for generator/async functions, built on first call.
    pub lowered_body: RefCell<Option<Rc<Vec<tsi_parser::ast::Stmt>>>>,
    /// Own properties (functions are objects: `Promise.resolve`, statics).
    pub props: RefCell<IndexMap<String, Value>>,
}

impl FunctionValue {
    #[must_use]
    pub fn script(func: Rc<FunctionData>, env: EnvRef) -> Rc<FunctionValue> {
        let length = func.required_param_count();
        let name = func.name.clone();
        Rc::new(FunctionValue {
            kind: FnKind::Script(func),
            env: Some(env),
            this_binding: RefCell::new(None),
            home_class: RefCell::new(None),
            name: RefCell::new(name),
            length,
            lowered_body: RefCell::new(None),
            props: RefCell::new(IndexMap::new()),
        })
    }

    #[must_use]
    pub fn native(
        name: &str,
        arity: usize,
        func: impl Fn(&mut Interpreter, Value, &[Value]) -> Result<Value, Value> + 'static,
    ) -> Rc<FunctionValue> {
        Rc::new(FunctionValue {
            kind: FnKind::Native {
                func: Rc::new(func),
                arity,
            },
            env: None,
            this_binding: RefCell::new(None),
            home_class: RefCell::new(None),
            name: RefCell::new(Some(name.to_string())),
            length: arity,
            lowered_body: RefCell::new(None),
            props: RefCell::new(IndexMap::new()),
        })
    }

    /// The script payload, unwrapping bound functions.
    #[must_use]
    pub fn script_data(&self) -> Option<&Rc<FunctionData>> {
        match &self.kind {
            FnKind::Script(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_arrow(&self) -> bool {
        self.script_data()
            .map(|d| d.flags.contains(tsi_parser::ast::FunctionFlags::ARROW))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.script_data()
            .map(|d| d.flags.contains(tsi_parser::ast::FunctionFlags::ASYNC))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_generator(&self) -> bool {
        self.script_data()
            .map(|d| d.flags.contains(tsi_parser::ast::FunctionFlags::GENERATOR))
            .unwrap_or(false)
    }
}

// =============================================================================
// Classes
// =============================================================================

/// One class in the interpreter's arena. The method table lives here;
/// back-references are indices, so the classes-reference-methods-
/// reference-class cycle involves no owning pointers.
pub struct RuntimeClass {
    pub name: String,
    pub decl: Rc<ClassData>,
    pub parent: Option<ClassId>,
    /// Environment captured at class evaluation (field initializers and
    /// methods close over it).
    pub env: EnvRef,
    pub ctor: Option<Rc<FunctionValue>>,
    pub methods: FxHashMap<String, Rc<FunctionValue>>,
    pub getters: FxHashMap<String, Rc<FunctionValue>>,
    pub setters: FxHashMap<String, Rc<FunctionValue>>,
    pub static_methods: FxHashMap<String, Rc<FunctionValue>>,
    pub static_getters: FxHashMap<String, Rc<FunctionValue>>,
    /// Static fields, mutable at runtime.
    pub statics: RefCell<IndexMap<String, Value>>,
}

// =============================================================================
// Regex, promises, collections
// =============================================================================

/// Compiled regex literal. The translated program is built once at value
/// construction; the original pattern/flags are kept for display.
pub struct RegexValue {
    pub pattern: String,
    pub flags: String,
    pub compiled: Option<regex::Regex>,
}

/// Promise status; transitions are once-only.
#[derive(Clone)]
pub enum PromiseStatus {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

/// A reaction registered by then/catch/finally.
pub struct PromiseReaction {
    pub on_fulfilled: Option<Rc<FunctionValue>>,
    pub on_rejected: Option<Rc<FunctionValue>>,
    /// The derived promise settled by the reaction's outcome.
    pub derived: Rc<RefCell<PromiseData>>,
}

/// Continuation of a suspended async function body.
pub struct AsyncContinuation {
    pub generator: Rc<RefCell<GeneratorState>>,
    pub result_promise: Rc<RefCell<PromiseData>>,
}

#[derive(Default)]
pub struct PromiseData {
    pub status: Option<PromiseStatus>,
    pub reactions: Vec<PromiseReaction>,
    /// Async bodies waiting on this promise.
    pub waiting: Vec<AsyncContinuation>,
}

impl PromiseData {
    pub fn pending() -> Rc<RefCell<PromiseData>> {
        Rc::new(RefCell::new(PromiseData {
            status: Some(PromiseStatus::Pending),
            reactions: Vec::new(),
            waiting: Vec::new(),
        }))
    }
}

/// Key wrapper giving map/set keys `===` semantics.
#[derive(Clone)]
pub struct ValueKey(pub Value);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_value(&other.0)
    }
}
impl Eq for ValueKey {}

impl std::hash::Hash for ValueKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Number(n) => n.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Null => 0u8.hash(state),
            Value::Undefined => 1u8.hash(state),
            Value::BigInt(v) => v.hash(state),
            Value::Symbol(id) => id.hash(state),
            Value::Array(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Object(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Instance(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Function(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Class(id) => id.0.hash(state),
            Value::Regex(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Date(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Promise(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Map(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Set(rc) => (Rc::as_ptr(rc) as usize).hash(state),
            Value::Generator(rc) => (Rc::as_ptr(rc) as usize).hash(state),
        }
    }
}

/// Map entries keep insertion order.
#[derive(Default)]
pub struct MapData {
    pub entries: IndexMap<ValueKey, Value>,
    /// WeakMap surfaces share the representation (no GC pressure here);
    /// the flag only changes iteration visibility.
    pub weak: bool,
}

#[derive(Default)]
pub struct SetData {
    pub entries: IndexMap<ValueKey, ()>,
    pub weak: bool,
}

/// Symbol registry: descriptions plus the `Symbol.for` table.
#[derive(Default)]
pub struct SymbolRegistry {
    descriptions: Vec<String>,
    for_table: FxHashMap<String, SymbolId>,
}

impl SymbolRegistry {
    pub fn make(&mut self, description: &str) -> SymbolId {
        let id = SymbolId(self.descriptions.len() as u32);
        self.descriptions.push(description.to_string());
        id
    }

    pub fn for_key(&mut self, key: &str) -> SymbolId {
        if let Some(&id) = self.for_table.get(key) {
            return id;
        }
        let id = self.make(key);
        self.for_table.insert(key.to_string(), id);
        id
    }

    #[must_use]
    pub fn description(&self, id: SymbolId) -> &str {
        self.descriptions
            .get(id.0 as usize)
            .map(String::as_str)
            .unwrap_or("")
    }
}
