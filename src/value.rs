//! # Runtime values
//!
//! A [`Value`] is whatever can sit on the operand stack or live in a
//! [`crate::scope::Scope`]. Most variants are plain data; `Function` and
//! `Builtin` wrap their payload in `Rc` so copying a callable value (pushing
//! it, binding it under a second name) is cheap and every copy shares one
//! underlying body or host closure.
//!
//! `Struct` has no variant here at all: the wire format reserves the kind
//! (see [`crate::types::Kind::Struct`]) but this VM never produces one, so
//! there is nothing for an enum arm to hold.

use std::fmt;
use std::rc::Rc;

use crate::types::{Kind, TypeSignature};

/// A host callable registered into the VM. Takes the popped argument values
/// in declaration order and returns the values to push back, in order.
///
/// Builtins have no `Result` channel of their own; a host that wants to
/// abort a call raises by panicking from inside the closure; see the
/// interpreter's call handling.
pub type BuiltinFn = dyn Fn(&[Value]) -> Vec<Value>;

#[derive(Clone)]
pub struct Builtin {
    pub signature: TypeSignature,
    pub f: Rc<BuiltinFn>,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("signature", &self.signature).finish()
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

/// A function value: a declared signature plus the body bytes captured at
/// the point its `Func` instruction was executed.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub signature: TypeSignature,
    pub code: Rc<[u8]>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Widened from the wire's 4-byte `i32` to the platform's natural
    /// signed integer at runtime (§3.1) — arithmetic is computed in 64
    /// bits and only truncated back to `i32` when a value is serialized
    /// (see [`crate::bytecode::Writer::value`]).
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    Function(Function),
    Builtin(Builtin),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Bool(_) => Kind::Bool,
            Value::Str(_) => Kind::String,
            Value::Function(_) => Kind::FuncT,
            Value::Builtin(_) => Kind::FuncT,
        }
    }

    /// The signature carried by a callable value, if this is one.
    pub fn signature(&self) -> Option<&TypeSignature> {
        match self {
            Value::Function(f) => Some(&f.signature),
            Value::Builtin(b) => Some(&b.signature),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Function(_) => write!(f, "<function>"),
            Value::Builtin(_) => write!(f, "<builtin>"),
        }
    }
}
