//! # Lexical scope chain
//!
//! A [`Scope`] is one frame of bindings plus an optional parent. Lookup
//! walks innermost-first; a function call pushes a fresh child and the
//! interpreter is responsible for popping it again on every exit path,
//! success or error.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::VmError;
use crate::value::Value;

#[derive(Debug)]
struct Frame {
    parent: Option<Scope>,
    bindings: HashMap<String, Value>,
}

/// Cheap to clone: a scope is a reference-counted pointer to its frame, so
/// `child()` and parent-chasing never copy the bindings map.
#[derive(Debug, Clone)]
pub struct Scope(Rc<std::cell::RefCell<Frame>>);

impl Scope {
    pub fn root() -> Scope {
        Scope(Rc::new(std::cell::RefCell::new(Frame { parent: None, bindings: HashMap::new() })))
    }

    pub fn child(&self) -> Scope {
        Scope(Rc::new(std::cell::RefCell::new(Frame {
            parent: Some(self.clone()),
            bindings: HashMap::new(),
        })))
    }

    /// Bind `symbol` in this, the innermost, frame — shadowing any outer
    /// binding of the same name.
    pub fn set(&self, symbol: String, value: Value) {
        self.0.borrow_mut().bindings.insert(symbol, value);
    }

    /// Search this frame, then each parent in turn.
    pub fn get(&self, symbol: &str) -> Result<Value, VmError> {
        let frame = self.0.borrow();
        if let Some(v) = frame.bindings.get(symbol) {
            return Ok(v.clone());
        }
        match &frame.parent {
            Some(parent) => parent.get(symbol),
            None => Err(VmError::NameError { symbol: symbol.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_at_root_is_name_error() {
        let root = Scope::root();
        assert!(matches!(root.get("x"), Err(VmError::NameError { .. })));
    }

    #[test]
    fn child_sees_parent_bindings() {
        let root = Scope::root();
        root.set("x".to_string(), Value::Int(1));
        let child = root.child();
        assert_eq!(child.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn child_binding_shadows_without_touching_parent() {
        let root = Scope::root();
        root.set("x".to_string(), Value::Int(1));
        let child = root.child();
        child.set("x".to_string(), Value::Int(2));
        assert_eq!(child.get("x").unwrap(), Value::Int(2));
        assert_eq!(root.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn innermost_frame_is_searched_first() {
        let root = Scope::root();
        root.set("x".to_string(), Value::Int(1));
        let child = root.child();
        let grandchild = child.child();
        assert_eq!(grandchild.get("x").unwrap(), Value::Int(1));
        child.set("x".to_string(), Value::Int(9));
        assert_eq!(grandchild.get("x").unwrap(), Value::Int(9));
    }
}
