//! Scope stacks for the checker.
//!
//! Two stacks share scope boundaries: one for value bindings and one for
//! type names. Block, function, class, catch, module and `for`-initializer
//! constructs each push a frame. Narrowing overlays sit on a separate
//! stack so flow-sensitive refinements can shadow a binding's declared
//! type without mutating it.

use rustc_hash::FxHashMap;
use tsi_parser::types_ast::TypeNode;

use crate::types::{ClassId, EnumId, InterfaceId, TypeId};

/// What kind of declaration produced a value binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Param,
    Function,
    Class,
    Enum,
    Namespace,
    Import,
    Builtin,
}

/// A value binding.
#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: TypeId,
    pub kind: BindingKind,
}

impl Binding {
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        matches!(
            self.kind,
            BindingKind::Var | BindingKind::Let | BindingKind::Param
        )
    }
}

/// A type-name binding.
#[derive(Debug, Clone)]
pub enum TypeBinding {
    /// `type X<T> = ...` (expanded lazily at each reference).
    Alias {
        params: Vec<String>,
        node: TypeNode,
    },
    Class(ClassId),
    Interface(InterfaceId),
    Enum(EnumId),
    /// In-scope generic parameter, bound to its `TypeParam` type.
    Param(TypeId),
}

#[derive(Default)]
struct Frame {
    values: FxHashMap<String, Binding>,
    types: FxHashMap<String, TypeBinding>,
}

/// The twin scope stacks plus narrowing overlays.
pub struct Scopes {
    frames: Vec<Frame>,
    /// Flow-sensitive refinements keyed by reference path ("x", "x.a.b").
    narrowing: Vec<FxHashMap<String, TypeId>>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    #[must_use]
    pub fn new() -> Self {
        Scopes {
            frames: vec![Frame::default()],
            narrowing: Vec::new(),
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "popping the global scope");
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Declare a value binding in the innermost frame. Returns false if the
    /// name was already declared in this frame.
    pub fn declare_value(&mut self, name: &str, binding: Binding) -> bool {
        let frame = self.frames.last_mut().expect("scope frame");
        frame.values.insert(name.to_string(), binding).is_none()
    }

    /// Overwrite a binding's type wherever it is declared (hoisting
    /// placeholder resolution).
    pub fn update_value_type(&mut self, name: &str, ty: TypeId) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(binding) = frame.values.get_mut(name) {
                binding.ty = ty;
                return;
            }
        }
    }

    /// Walk outward for a value binding.
    #[must_use]
    pub fn lookup_value(&self, name: &str) -> Option<&Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.values.get(name))
    }

    /// Whether a name is declared in the innermost frame.
    #[must_use]
    pub fn declared_here(&self, name: &str) -> bool {
        self.frames
            .last()
            .map(|f| f.values.contains_key(name))
            .unwrap_or(false)
    }

    // =========================================================================
    // Types
    // =========================================================================

    pub fn declare_type(&mut self, name: &str, binding: TypeBinding) -> bool {
        let frame = self.frames.last_mut().expect("scope frame");
        frame.types.insert(name.to_string(), binding).is_none()
    }

    #[must_use]
    pub fn lookup_type(&self, name: &str) -> Option<&TypeBinding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.types.get(name))
    }

    // =========================================================================
    // Narrowing overlays
    // =========================================================================

    pub fn push_narrowing(&mut self, refinements: FxHashMap<String, TypeId>) {
        self.narrowing.push(refinements);
    }

    pub fn pop_narrowing(&mut self) {
        self.narrowing.pop();
    }

    /// The narrowed type for a reference path, innermost overlay first.
    #[must_use]
    pub fn narrowed(&self, path: &str) -> Option<TypeId> {
        self.narrowing
            .iter()
            .rev()
            .find_map(|overlay| overlay.get(path).copied())
    }

    /// Drop refinements for a mutated path and everything under it, in all
    /// active overlays.
    pub fn invalidate_path(&mut self, path: &str) {
        let prefix = format!("{path}.");
        for overlay in &mut self.narrowing {
            overlay.retain(|key, _| key != path && !key.starts_with(&prefix));
        }
    }

    /// Drop every refinement (worst-case invalidation: opaque calls that
    /// could mutate anything are NOT treated this way; only explicit
    /// assignments invalidate, per path).
    pub fn clear_narrowing_frames(&mut self) {
        for overlay in &mut self.narrowing {
            overlay.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(ty: TypeId) -> Binding {
        Binding {
            ty,
            kind: BindingKind::Let,
        }
    }

    #[test]
    fn lookup_walks_outward() {
        let mut scopes = Scopes::new();
        scopes.declare_value("a", binding(TypeId::NUMBER));
        scopes.push();
        scopes.declare_value("b", binding(TypeId::STRING));
        assert_eq!(scopes.lookup_value("a").unwrap().ty, TypeId::NUMBER);
        assert_eq!(scopes.lookup_value("b").unwrap().ty, TypeId::STRING);
        scopes.pop();
        assert!(scopes.lookup_value("b").is_none());
    }

    #[test]
    fn shadowing_in_inner_frame() {
        let mut scopes = Scopes::new();
        scopes.declare_value("x", binding(TypeId::NUMBER));
        scopes.push();
        scopes.declare_value("x", binding(TypeId::STRING));
        assert_eq!(scopes.lookup_value("x").unwrap().ty, TypeId::STRING);
        scopes.pop();
        assert_eq!(scopes.lookup_value("x").unwrap().ty, TypeId::NUMBER);
    }

    #[test]
    fn redeclaration_in_same_frame_is_detected() {
        let mut scopes = Scopes::new();
        assert!(scopes.declare_value("x", binding(TypeId::NUMBER)));
        assert!(!scopes.declare_value("x", binding(TypeId::STRING)));
    }

    #[test]
    fn narrowing_overlays_shadow_and_invalidate() {
        let mut scopes = Scopes::new();
        scopes.declare_value("x", binding(TypeId::NUMBER));
        let mut overlay = FxHashMap::default();
        overlay.insert("x".to_string(), TypeId::STRING);
        overlay.insert("x.y".to_string(), TypeId::BOOLEAN);
        scopes.push_narrowing(overlay);
        assert_eq!(scopes.narrowed("x"), Some(TypeId::STRING));
        scopes.invalidate_path("x");
        assert_eq!(scopes.narrowed("x"), None);
        assert_eq!(scopes.narrowed("x.y"), None);
        scopes.pop_narrowing();
    }
}
