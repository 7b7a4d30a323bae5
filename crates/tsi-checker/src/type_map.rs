//! The type map: AST expression identity to resolved type, plus the side
//! tables back ends consume (resolved identifiers, class hierarchies,
//! narrowed observation sites, inlined const-enum values, decorator
//! metadata).

use rustc_hash::FxHashMap;
use tsi_common::span::Span;
use tsi_parser::ast::NodeId;

use crate::state::EnumValue;
use crate::types::{ClassId, TypeId};

/// Where an identifier resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdent {
    /// Scope depth at the resolution site (1 = global).
    pub scope_depth: u32,
}

/// Output of the checker, consumed by the interpreter and the compile
/// surface.
#[derive(Debug, Default)]
pub struct TypeMap {
    /// Resolved type per expression node.
    expr_types: FxHashMap<NodeId, TypeId>,
    /// Identifier resolution sites.
    resolved_idents: FxHashMap<NodeId, ResolvedIdent>,
    /// Narrowed type at observation sites (reads under active guards).
    narrowed: FxHashMap<NodeId, TypeId>,
    /// Class declaration order: name at declaration site -> arena id.
    pub class_ids: FxHashMap<String, ClassId>,
    /// Superclass edges by arena id.
    pub class_hierarchy: FxHashMap<ClassId, Option<ClassId>>,
    /// Member accesses on const enums, folded to their computed values
    /// (empty when `preserve_const_enums` is set).
    pub inlined_enum_values: FxHashMap<NodeId, EnumValue>,
    /// Design-time type strings captured for decorated members
    /// (populated only under `emit_decorator_metadata`).
    pub decorator_metadata: FxHashMap<(String, String), String>,
    /// Statement spans the checker proved unreachable.
    pub dead_code: Vec<Span>,
}

impl TypeMap {
    pub fn record_expr(&mut self, id: NodeId, ty: TypeId) {
        self.expr_types.insert(id, ty);
    }

    #[must_use]
    pub fn expr_type(&self, id: NodeId) -> Option<TypeId> {
        self.expr_types.get(&id).copied()
    }

    pub fn record_ident(&mut self, id: NodeId, resolution: ResolvedIdent) {
        self.resolved_idents.insert(id, resolution);
    }

    #[must_use]
    pub fn ident_resolution(&self, id: NodeId) -> Option<ResolvedIdent> {
        self.resolved_idents.get(&id).copied()
    }

    pub fn record_narrowed(&mut self, id: NodeId, ty: TypeId) {
        self.narrowed.insert(id, ty);
    }

    #[must_use]
    pub fn narrowed_type(&self, id: NodeId) -> Option<TypeId> {
        self.narrowed.get(&id).copied()
    }

    #[must_use]
    pub fn expr_count(&self) -> usize {
        self.expr_types.len()
    }
}
