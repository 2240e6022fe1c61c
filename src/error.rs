//! # Error handling
//!
//! This module defines [`VmError`], the single error type threaded through
//! the codec, code generator, and interpreter.
//!
//! ## Design
//! - Recoverable conditions (a type mismatch, an unbound symbol, a stack
//!   that's too shallow, a truncated bytecode stream) are all variants of
//!   [`VmError`], propagated with `?` and surfaced to the host.
//! - [`VmError::Return`] is the odd one out: it's the internal sentinel the
//!   `Ret` opcode raises to unwind exactly one function body. `Call` catches
//!   it and turns it into a normal return; it must never escape to a host.
//! - Corrupt bytecode (an opcode or kind byte outside the assigned range, or
//!   an attempt to encode a function/struct type as a value tag) is *not*
//!   represented here at all — those are implementation invariants, raised
//!   as panics at the point they're detected, the same way the reference
//!   VM's own decoder panics on an unrecognized tag.
//!
//! ## Display
//! Implements [`fmt::Display`] for human-readable messages and
//! [`std::error::Error`] so `VmError` composes with `?` throughout.

use std::fmt;
use std::io;

use crate::types::Type;

#[derive(Debug)]
pub enum VmError {
    /// An operand or argument did not satisfy the expected type.
    TypeError { expected: Type, actual: Type },
    /// A symbol was looked up but is unbound in the current scope chain.
    NameError { symbol: String },
    /// The operand stack did not hold enough values for the operation.
    StackUnderflow,
    /// The bytecode stream ended, or a read failed, before a value could be
    /// fully decoded.
    Io(io::Error),
    /// Internal sentinel raised by `Ret`. Caught by `Call`; never surfaced
    /// to a host.
    Return,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::TypeError { expected, actual } => {
                write!(f, "type error: expected {expected}, got {actual}")
            }
            VmError::NameError { symbol } => {
                write!(f, "name error: undefined symbol {symbol}")
            }
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::Io(err) => write!(f, "unexpected end of bytecode: {err}"),
            VmError::Return => write!(f, "internal: uncaught return sentinel"),
        }
    }
}

impl std::error::Error for VmError {}

impl From<io::Error> for VmError {
    fn from(err: io::Error) -> Self {
        VmError::Io(err)
    }
}
