//! Environments: a linked list of frames, each mapping identifiers to
//! slots. Lookup walks outward. A frame is created on function entry,
//! block entry, `catch` binding, class body, module evaluation and
//! `for`-initializer; function values share the frame chain active at
//! their creation point (the lexical closure).

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// Shared handle to one environment frame.
pub type EnvRef = Rc<Environment>;

/// One binding slot.
#[derive(Clone)]
pub struct Slot {
    pub value: Value,
    pub mutable: bool,
}

/// One frame in the chain.
pub struct Environment {
    parent: Option<EnvRef>,
    slots: RefCell<FxHashMap<String, Slot>>,
}

impl Environment {
    #[must_use]
    pub fn root() -> EnvRef {
        Rc::new(Environment {
            parent: None,
            slots: RefCell::new(FxHashMap::default()),
        })
    }

    #[must_use]
    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(Environment {
            parent: Some(Rc::clone(parent)),
            slots: RefCell::new(FxHashMap::default()),
        })
    }

    /// Declare (or redeclare) a binding in this frame.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.slots
            .borrow_mut()
            .insert(name.to_string(), Slot { value, mutable });
    }

    /// Read a binding, walking outward.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(slot) = self.slots.borrow().get(name) {
            return Some(slot.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Whether the name resolves anywhere on the chain.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
            || self.parent.as_ref().map(|p| p.has(name)).unwrap_or(false)
    }

    /// Assign to an existing binding, walking outward. Returns `Err(())`
    /// when the name is unbound, `Ok(false)` when it is immutable.
    pub fn assign(&self, name: &str, value: Value) -> Result<bool, ()> {
        if let Some(slot) = self.slots.borrow_mut().get_mut(name) {
            if !slot.mutable {
                return Ok(false);
            }
            slot.value = value;
            return Ok(true);
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let root = Environment::root();
        root.declare("a", Value::Number(1.0), true);
        let inner = Environment::child(&root);
        inner.declare("b", Value::Number(2.0), true);
        assert!(matches!(inner.lookup("a"), Some(Value::Number(n)) if n == 1.0));
        assert!(matches!(inner.lookup("b"), Some(Value::Number(n)) if n == 2.0));
        assert!(root.lookup("b").is_none());
    }

    #[test]
    fn assignment_mutates_the_defining_frame() {
        let root = Environment::root();
        root.declare("x", Value::Number(1.0), true);
        let inner = Environment::child(&root);
        assert_eq!(inner.assign("x", Value::Number(5.0)), Ok(true));
        assert!(matches!(root.lookup("x"), Some(Value::Number(n)) if n == 5.0));
    }

    #[test]
    fn immutable_bindings_reject_assignment() {
        let root = Environment::root();
        root.declare("c", Value::Number(1.0), false);
        assert_eq!(root.assign("c", Value::Number(2.0)), Ok(false));
    }

    #[test]
    fn unbound_assignment_is_an_error() {
        let root = Environment::root();
        assert!(root.assign("nope", Value::Null).is_err());
    }

    #[test]
    fn closure_sees_later_mutation() {
        // Shared frame: what a closure captures is the frame itself.
        let root = Environment::root();
        root.declare("shared", Value::Number(1.0), true);
        let closure_env = Rc::clone(&root);
        root.assign("shared", Value::Number(2.0)).unwrap();
        assert!(matches!(
            closure_env.lookup("shared"),
            Some(Value::Number(n)) if n == 2.0
        ));
    }
}
