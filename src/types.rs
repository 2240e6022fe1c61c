//! # Types and signatures
//!
//! The VM is dynamically typed at the value level but every opcode that
//! consumes or produces a value checks it against a [`Type`], a small
//! bit-set over [`Kind`]. A bit-set lets a single `Type` accept more than
//! one concrete kind — [`TypeNum`] is the running example, accepting both
//! `Int` and `Float` so arithmetic opcodes don't need two signatures.
//!
//! Function-typed values additionally carry a [`TypeSignature`] describing
//! their argument and return kinds; signature equality recurses into that.

use std::fmt;

/// A single value category, represented as a disjoint bit so a [`Type`] can
/// be the union of several kinds.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Int = 0x01,
    Float = 0x02,
    Bool = 0x04,
    String = 0x08,
    FuncT = 0x10,
    Struct = 0x20,
}

impl Kind {
    /// Decode a wire Kind byte. Any value outside the six assigned bits is a
    /// corrupt bytecode stream, not a recoverable runtime condition.
    pub fn from_byte(b: u8) -> Kind {
        match b {
            0x01 => Kind::Int,
            0x02 => Kind::Float,
            0x04 => Kind::Bool,
            0x08 => Kind::String,
            0x10 => Kind::FuncT,
            0x20 => Kind::Struct,
            other => panic!("unknown kind byte 0x{:02x}", other),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    fn bit(self) -> u32 {
        self as u8 as u32
    }
}

/// A set of [`Kind`]s a value may satisfy, plus the extra data a `FuncT`
/// member of the set needs to check against.
///
/// `struct_index` is carried for wire round-tripping of the reserved
/// `Struct` kind; this crate never constructs a `Value` of that kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Type {
    pub kinds: u32,
    pub signature: Option<TypeSignature>,
    pub struct_index: i32,
}

impl Type {
    pub fn single(kind: Kind) -> Type {
        Type { kinds: kind.bit(), signature: None, struct_index: 0 }
    }

    pub fn union(kinds: &[Kind]) -> Type {
        Type {
            kinds: kinds.iter().fold(0, |acc, k| acc | k.bit()),
            signature: None,
            struct_index: 0,
        }
    }

    pub fn func(signature: TypeSignature) -> Type {
        Type { kinds: Kind::FuncT.bit(), signature: Some(signature), struct_index: 0 }
    }

    pub fn contains(&self, kind: Kind) -> bool {
        self.kinds & kind.bit() != 0
    }

    /// Structural equality. Two types are equal when their kind-sets
    /// overlap, with the extra rule that a `FuncT` match also requires the
    /// contained signatures to be equal.
    ///
    /// This mirrors the source's `Type.Equal`, corrected for the inverted
    /// `TypeSignature.Equal` bug documented alongside [`TypeSignature::eq_structural`].
    pub fn accepts(&self, other: &Type) -> bool {
        if other.kinds & Kind::Struct.bit() != 0 {
            panic!("structs not implemented");
        }
        if self.kinds & other.kinds == 0 {
            return false;
        }
        if other.kinds & Kind::FuncT.bit() != 0 {
            let a = self.signature.as_ref();
            let b = other.signature.as_ref();
            return match (a, b) {
                (Some(a), Some(b)) => a.eq_structural(b),
                _ => false,
            };
        }
        true
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kinds & Kind::Int.bit() != 0 && self.kinds & Kind::Float.bit() != 0 {
            return write!(f, "num");
        }
        if self.kinds & Kind::Int.bit() != 0 {
            return write!(f, "int");
        }
        if self.kinds & Kind::Float.bit() != 0 {
            return write!(f, "float");
        }
        if self.kinds & Kind::Bool.bit() != 0 {
            return write!(f, "bool");
        }
        if self.kinds & Kind::String.bit() != 0 {
            return write!(f, "string");
        }
        if self.kinds & Kind::FuncT.bit() != 0 {
            return write!(f, "func");
        }
        if self.kinds & Kind::Struct.bit() != 0 {
            panic!("structs not implemented");
        }
        write!(f, "unknown")
    }
}

/// `TypeInt | TypeFloat`, the accepted type of every arithmetic operand
/// after promotion.
pub fn type_num() -> Type {
    Type::union(&[Kind::Int, Kind::Float])
}

pub fn type_int() -> Type {
    Type::single(Kind::Int)
}

pub fn type_float() -> Type {
    Type::single(Kind::Float)
}

pub fn type_bool() -> Type {
    Type::single(Kind::Bool)
}

pub fn type_string() -> Type {
    Type::single(Kind::String)
}

/// The declared argument and return types of a callable (`Function` or
/// `Builtin` value).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct TypeSignature {
    pub args: Vec<Type>,
    pub ret: Vec<Type>,
}

impl TypeSignature {
    pub fn new(args: Vec<Type>, ret: Vec<Type>) -> TypeSignature {
        TypeSignature { args, ret }
    }

    /// Structural equality of two signatures: same arity on both sides, and
    /// every type pairwise equal.
    ///
    /// The reference source inverts this check (`if Equal(...) { return
    /// false }`), which makes every non-trivial signature compare unequal
    /// to itself. This implementation returns `false` only when a pair
    /// actually differs.
    pub fn eq_structural(&self, other: &TypeSignature) -> bool {
        if self.args.len() != other.args.len() || self.ret.len() != other.ret.len() {
            return false;
        }
        for (a, b) in self.args.iter().zip(&other.args) {
            if !a.accepts(b) {
                return false;
            }
        }
        for (a, b) in self.ret.iter().zip(&other.ret) {
            if !a.accepts(b) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_num_accepts_both_int_and_float() {
        let num = type_num();
        assert!(num.accepts(&type_int()));
        assert!(num.accepts(&type_float()));
        assert!(!num.accepts(&type_bool()));
    }

    #[test]
    fn single_kind_rejects_other_kinds() {
        assert!(!type_int().accepts(&type_string()));
        assert!(type_int().accepts(&type_int()));
    }

    #[test]
    fn signature_equality_requires_matching_arity_and_pairwise_types() {
        let a = TypeSignature::new(vec![type_int()], vec![type_bool()]);
        let b = TypeSignature::new(vec![type_int()], vec![type_bool()]);
        let c = TypeSignature::new(vec![type_int(), type_int()], vec![type_bool()]);
        let d = TypeSignature::new(vec![type_string()], vec![type_bool()]);

        assert!(a.eq_structural(&a));
        assert!(a.eq_structural(&b));
        assert!(!a.eq_structural(&c));
        assert!(!a.eq_structural(&d));
    }

    #[test]
    fn func_type_equality_recurses_into_signature() {
        let sig_a = TypeSignature::new(vec![type_int()], vec![type_string()]);
        let sig_b = TypeSignature::new(vec![type_int()], vec![type_string()]);
        let sig_c = TypeSignature::new(vec![type_float()], vec![type_string()]);

        let f_a = Type::func(sig_a);
        let f_b = Type::func(sig_b);
        let f_c = Type::func(sig_c);

        assert!(f_a.accepts(&f_b));
        assert!(!f_a.accepts(&f_c));
    }

    #[test]
    fn display_prefers_num_over_int_or_float_alone() {
        assert_eq!(type_num().to_string(), "num");
        assert_eq!(type_int().to_string(), "int");
        assert_eq!(type_string().to_string(), "string");
    }
}
