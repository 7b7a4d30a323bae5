//! The type universe and interner.
//!
//! Every type is interned to a `TypeId`; structurally equal types share an
//! id, which makes the compatibility relation cheap to memoise. Unions are
//! canonicalised on construction: flattened, deduplicated, `never` members
//! dropped, members ordered by id.

use rustc_hash::FxHashMap;

/// Interned type handle. Ids below `FIRST_DYNAMIC` are the pinned
/// singletons for primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const ANY: TypeId = TypeId(0);
    pub const UNKNOWN: TypeId = TypeId(1);
    pub const NEVER: TypeId = TypeId(2);
    pub const VOID: TypeId = TypeId(3);
    pub const NUMBER: TypeId = TypeId(4);
    pub const STRING: TypeId = TypeId(5);
    pub const BOOLEAN: TypeId = TypeId(6);
    pub const BIGINT: TypeId = TypeId(7);
    pub const NULL: TypeId = TypeId(8);
    pub const UNDEFINED: TypeId = TypeId(9);
    pub const SYMBOL: TypeId = TypeId(10);
    /// Recovery type: produced after a diagnostic, compatible both ways to
    /// suppress cascading errors.
    pub const ERROR: TypeId = TypeId(11);

    pub(crate) const FIRST_DYNAMIC: u32 = 12;
}

/// Index of a class entry in the checker's class arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Index of an interface entry in the checker's interface arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u32);

/// Index of an enum entry in the checker's enum arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub u32);

/// One field of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    pub ty: TypeId,
    pub optional: bool,
    pub readonly: bool,
}

/// One parameter of a function type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeId,
    pub optional: bool,
    pub rest: bool,
}

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub params: Vec<ParamInfo>,
    pub ret: TypeId,
    /// Names of in-scope type parameters (order matters for inference).
    pub type_params: Vec<String>,
    pub this_type: Option<TypeId>,
    /// Return type is a predicate `param is T`: (param name, narrowed type).
    pub predicate: Option<(String, TypeId)>,
}

/// The closed, discriminated type vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Any,
    Unknown,
    Never,
    Void,
    Number,
    String,
    Boolean,
    Bigint,
    Null,
    Undefined,
    Symbol,
    Error,

    /// Number literal type; the payload is the f64 bit pattern so the
    /// variant can be hashed.
    NumberLiteral(u64),
    StringLiteral(String),
    BooleanLiteral(bool),

    Array(TypeId),
    Tuple {
        elements: Vec<TypeId>,
        rest: Option<TypeId>,
    },
    /// Structural object type. Fields keep insertion order.
    Record {
        fields: Vec<(String, FieldInfo)>,
        string_index: Option<TypeId>,
        number_index: Option<TypeId>,
        /// Fresh object literals get the excess-property check.
        fresh: bool,
    },
    Function(FunctionShape),
    /// An overloaded callable: candidate signatures in declaration order.
    Overloads(Vec<TypeId>),

    /// Constructor-side of a class (the value `C` itself).
    Class(ClassId),
    /// Instance-side projection of a class.
    Instance(ClassId, Vec<TypeId>),
    Interface(InterfaceId),
    /// A whole enum (the value `E` and the type of its members).
    Enum(EnumId),
    /// A single enum member.
    EnumMember(EnumId, u32),

    Union(Vec<TypeId>),
    Intersection(Vec<TypeId>),

    /// Unresolved reference kept for diagnostics after a resolution error.
    Ref(String),
    /// In-scope generic type parameter.
    TypeParam(String),
    /// Inference placeholder inside conditional types.
    Infer(String),
    /// Template literal type.
    Template {
        quasis: Vec<String>,
        types: Vec<TypeId>,
    },
}

/// Interning store for types.
pub struct TypeInterner {
    types: Vec<Type>,
    dedup: FxHashMap<Type, TypeId>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        let singletons = [
            Type::Any,
            Type::Unknown,
            Type::Never,
            Type::Void,
            Type::Number,
            Type::String,
            Type::Boolean,
            Type::Bigint,
            Type::Null,
            Type::Undefined,
            Type::Symbol,
            Type::Error,
        ];
        let mut dedup = FxHashMap::default();
        for (i, ty) in singletons.iter().enumerate() {
            dedup.insert(ty.clone(), TypeId(i as u32));
        }
        debug_assert_eq!(singletons.len() as u32, TypeId::FIRST_DYNAMIC);
        TypeInterner {
            types: singletons.to_vec(),
            dedup,
        }
    }

    /// Intern a type, returning its stable id.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.dedup.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.dedup.insert(ty, id);
        id
    }

    /// Look up the type behind an id.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn number_literal(&mut self, value: f64) -> TypeId {
        self.intern(Type::NumberLiteral(value.to_bits()))
    }

    pub fn string_literal(&mut self, value: &str) -> TypeId {
        self.intern(Type::StringLiteral(value.to_string()))
    }

    pub fn boolean_literal(&mut self, value: bool) -> TypeId {
        self.intern(Type::BooleanLiteral(value))
    }

    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.intern(Type::Array(element))
    }

    /// Build a canonical union: flattened, deduplicated, `never` dropped,
    /// ordered by id. `any` absorbs everything.
    pub fn union(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::new();
        self.flatten_union(&members, &mut flat);
        flat.retain(|&id| id != TypeId::NEVER);
        if flat.iter().any(|&id| id == TypeId::ANY) {
            return TypeId::ANY;
        }
        flat.sort_unstable();
        flat.dedup();
        match flat.len() {
            0 => TypeId::NEVER,
            1 => flat[0],
            _ => self.intern(Type::Union(flat)),
        }
    }

    fn flatten_union(&self, members: &[TypeId], out: &mut Vec<TypeId>) {
        for &id in members {
            match self.get(id) {
                Type::Union(inner) => {
                    let inner = inner.clone();
                    self.flatten_union(&inner, out);
                }
                _ => out.push(id),
            }
        }
    }

    pub fn intersection(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::new();
        for &id in &members {
            match self.get(id) {
                Type::Intersection(inner) => flat.extend(inner.iter().copied()),
                _ => flat.push(id),
            }
        }
        if flat.iter().any(|&id| id == TypeId::NEVER) {
            return TypeId::NEVER;
        }
        if flat.iter().any(|&id| id == TypeId::ANY) {
            return TypeId::ANY;
        }
        flat.sort_unstable();
        flat.dedup();
        match flat.len() {
            0 => TypeId::UNKNOWN,
            1 => flat[0],
            _ => self.intern(Type::Intersection(flat)),
        }
    }

    /// Widen a literal type to its base primitive (assignment to a mutable
    /// binding). Also clears object-literal freshness.
    pub fn widen(&mut self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::NumberLiteral(_) => TypeId::NUMBER,
            Type::BooleanLiteral(_) => TypeId::BOOLEAN,
            Type::StringLiteral(_) => TypeId::STRING,
            Type::Union(members) => {
                let members = members.clone();
                let widened: Vec<TypeId> = members.iter().map(|&m| self.widen(m)).collect();
                self.union(widened)
            }
            Type::Record { fresh: true, .. } => {
                let Type::Record {
                    fields,
                    string_index,
                    number_index,
                    ..
                } = self.get(id).clone()
                else {
                    unreachable!();
                };
                self.intern(Type::Record {
                    fields,
                    string_index,
                    number_index,
                    fresh: false,
                })
            }
            _ => id,
        }
    }

    /// Drop object-literal freshness without widening literal types
    /// (binding a literal to a name ends its excess-property window).
    pub fn without_freshness(&mut self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Record { fresh: true, .. } => {
                let Type::Record {
                    fields,
                    string_index,
                    number_index,
                    ..
                } = self.get(id).clone()
                else {
                    unreachable!();
                };
                self.intern(Type::Record {
                    fields,
                    string_index,
                    number_index,
                    fresh: false,
                })
            }
            _ => id,
        }
    }

    /// Strip `null` and `undefined` from a type (non-null assertion,
    /// optional-chain happy path).
    pub fn remove_nullish(&mut self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Union(members) => {
                let members: Vec<TypeId> = members
                    .iter()
                    .copied()
                    .filter(|&m| m != TypeId::NULL && m != TypeId::UNDEFINED)
                    .collect();
                self.union(members)
            }
            _ if id == TypeId::NULL || id == TypeId::UNDEFINED => TypeId::NEVER,
            _ => id,
        }
    }

    /// Whether a type admits `null`/`undefined` members.
    #[must_use]
    pub fn is_nullish_candidate(&self, id: TypeId) -> bool {
        match self.get(id) {
            Type::Union(members) => members
                .iter()
                .any(|&m| m == TypeId::NULL || m == TypeId::UNDEFINED),
            _ => id == TypeId::NULL || id == TypeId::UNDEFINED || id == TypeId::ANY,
        }
    }

    /// The number payload of a number-literal type.
    #[must_use]
    pub fn number_literal_value(&self, id: TypeId) -> Option<f64> {
        match self.get(id) {
            Type::NumberLiteral(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// The string payload of a string-literal type.
    #[must_use]
    pub fn string_literal_value(&self, id: TypeId) -> Option<&str> {
        match self.get(id) {
            Type::StringLiteral(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedupes() {
        let mut interner = TypeInterner::new();
        let a = interner.array(TypeId::NUMBER);
        let b = interner.array(TypeId::NUMBER);
        assert_eq!(a, b);
        let c = interner.array(TypeId::STRING);
        assert_ne!(a, c);
    }

    #[test]
    fn unions_flatten_and_dedupe() {
        let mut interner = TypeInterner::new();
        let ab = interner.union(vec![TypeId::NUMBER, TypeId::STRING]);
        let nested = interner.union(vec![ab, TypeId::NUMBER, TypeId::BOOLEAN]);
        let Type::Union(members) = interner.get(nested) else {
            panic!("expected union");
        };
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn unions_never_contain_never() {
        let mut interner = TypeInterner::new();
        let u = interner.union(vec![TypeId::NUMBER, TypeId::NEVER]);
        assert_eq!(u, TypeId::NUMBER);
        let n = interner.union(vec![TypeId::NEVER, TypeId::NEVER]);
        assert_eq!(n, TypeId::NEVER);
    }

    #[test]
    fn any_absorbs_unions() {
        let mut interner = TypeInterner::new();
        let u = interner.union(vec![TypeId::NUMBER, TypeId::ANY]);
        assert_eq!(u, TypeId::ANY);
    }

    #[test]
    fn union_order_is_canonical() {
        let mut interner = TypeInterner::new();
        let a = interner.union(vec![TypeId::STRING, TypeId::NUMBER]);
        let b = interner.union(vec![TypeId::NUMBER, TypeId::STRING]);
        assert_eq!(a, b);
    }

    #[test]
    fn widening_drops_literals_and_freshness() {
        let mut interner = TypeInterner::new();
        let lit = interner.number_literal(3.0);
        assert_eq!(interner.widen(lit), TypeId::NUMBER);

        let fresh = interner.intern(Type::Record {
            fields: vec![(
                "a".to_string(),
                FieldInfo {
                    ty: TypeId::NUMBER,
                    optional: false,
                    readonly: false,
                },
            )],
            string_index: None,
            number_index: None,
            fresh: true,
        });
        let widened = interner.widen(fresh);
        assert!(matches!(
            interner.get(widened),
            Type::Record { fresh: false, .. }
        ));
    }

    #[test]
    fn remove_nullish_filters_union() {
        let mut interner = TypeInterner::new();
        let u = interner.union(vec![TypeId::STRING, TypeId::NULL, TypeId::UNDEFINED]);
        assert_eq!(interner.remove_nullish(u), TypeId::STRING);
    }
}
