//! # Binary codec
//!
//! This module is the only place that knows the on-disk/on-wire byte
//! layout of values, types, and signatures. Everything is **big-endian**
//! and there is no file header, magic number, or version field — a
//! bytecode file is exactly the concatenation of instruction encodings,
//! nothing more.
//!
//! ## Primitive layout
//! ```text
//! Int            4 bytes, signed, big-endian
//! Float          8 bytes, IEEE-754, big-endian
//! Bool           1 byte, 0x00 = false, else true
//! Bytes          Int length, then that many raw bytes
//! String         Bytes, interpreted as UTF-8
//! Type           1 Kind byte; Struct is followed by an Int table index
//! TypedValue     Type, then the payload for that Kind
//! TypeSignature  Int nargs, nargs * Type, Int nret, nret * Type
//! ```
//!
//! A `Type` can only ever name a primitive kind or a `Struct` index on the
//! wire — `FuncT` cannot be encoded at all, in either direction, which also
//! means a `TypeSignature`'s own `args`/`ret` lists can never contain a
//! function type. Attempting to write one is an implementation error, not
//! a recoverable one: it means the caller handed the codec a value the
//! format was never able to represent.

use std::io::{self, Read, Write};

use crate::error::VmError;
use crate::types::{Kind, Type, TypeSignature};
use crate::value::Value;

pub mod opcode {
    pub const J: u8 = 0x00;
    pub const JT: u8 = 0x01;
    pub const JF: u8 = 0x02;
    pub const JZ: u8 = 0x03;
    pub const JNZ: u8 = 0x04;

    pub const PUSH: u8 = 0x10;
    pub const POP: u8 = 0x11;
    pub const DUP: u8 = 0x12;
    pub const SWP: u8 = 0x13;
    pub const SET: u8 = 0x14;
    pub const GET: u8 = 0x15;

    pub const INC: u8 = 0x20;
    pub const DEC: u8 = 0x21;
    pub const ADD: u8 = 0x22;
    pub const SUB: u8 = 0x23;
    pub const MUL: u8 = 0x24;
    pub const DIV: u8 = 0x25;
    pub const MOD: u8 = 0x26;

    pub const EQ: u8 = 0x30;
    pub const NE: u8 = 0x31;
    pub const LT: u8 = 0x32;
    pub const GT: u8 = 0x33;
    pub const LE: u8 = 0x34;
    pub const GE: u8 = 0x35;

    pub const AND: u8 = 0x36;
    pub const OR: u8 = 0x37;
    pub const XOR: u8 = 0x38;
    pub const NOT: u8 = 0x39;

    pub const BAND: u8 = 0x40;
    pub const BOR: u8 = 0x41;
    pub const BXOR: u8 = 0x42;
    pub const BNOT: u8 = 0x43;
    pub const BLS: u8 = 0x44;
    pub const BRS: u8 = 0x45;

    pub const BSET: u8 = 0x46;
    pub const BCLR: u8 = 0x47;
    pub const BTGL: u8 = 0x48;
    pub const BMTCH: u8 = 0x49;

    pub const CALL: u8 = 0x50;
    pub const FUNC: u8 = 0x51;
    pub const RET: u8 = 0x52;
}

/// Reads primitive, typed, and structured values off anything that's
/// `io::Read`. Used both by the interpreter's code cursor and by callers
/// loading a `Function`'s captured body back out.
pub struct Reader<R> {
    pub r: R,
}

impl<R: Read> Reader<R> {
    pub fn new(r: R) -> Reader<R> {
        Reader { r }
    }

    pub fn byte(&mut self) -> Result<u8, VmError> {
        let mut buf = [0u8; 1];
        self.r.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn int(&mut self) -> Result<i32, VmError> {
        let mut buf = [0u8; 4];
        self.r.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn float(&mut self) -> Result<f64, VmError> {
        let mut buf = [0u8; 8];
        self.r.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    pub fn bool(&mut self) -> Result<bool, VmError> {
        Ok(self.byte()? != 0)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, VmError> {
        let len = self.int()? as usize;
        let mut buf = vec![0u8; len];
        self.r.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn string(&mut self) -> Result<String, VmError> {
        let raw = self.bytes()?;
        String::from_utf8(raw)
            .map_err(|e| VmError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Decode a `Type`. An unrecognized Kind byte is corrupt bytecode, not
    /// a recoverable error — the same way the format it's read from has no
    /// version field to sanity-check against.
    pub fn kind_type(&mut self) -> Result<Type, VmError> {
        let kind = Kind::from_byte(self.byte()?);
        match kind {
            Kind::Struct => {
                let idx = self.int()?;
                Ok(Type { kinds: Kind::Struct as u8 as u32, signature: None, struct_index: idx })
            }
            Kind::FuncT => panic!("function types cannot be read from the wire"),
            Kind::Int => Ok(Type::single(Kind::Int)),
            Kind::Float => Ok(Type::single(Kind::Float)),
            Kind::Bool => Ok(Type::single(Kind::Bool)),
            Kind::String => Ok(Type::single(Kind::String)),
        }
    }

    pub fn type_signature(&mut self) -> Result<TypeSignature, VmError> {
        let nargs = self.int()? as usize;
        let mut args = Vec::with_capacity(nargs);
        for _ in 0..nargs {
            args.push(self.kind_type()?);
        }
        let nret = self.int()? as usize;
        let mut ret = Vec::with_capacity(nret);
        for _ in 0..nret {
            ret.push(self.kind_type()?);
        }
        Ok(TypeSignature { args, ret })
    }

    /// Decode a `Type` followed by the payload it describes.
    pub fn typed_value(&mut self) -> Result<Value, VmError> {
        let ty = self.kind_type()?;
        if ty.contains(Kind::Int) {
            // Widen the wire's 4-byte `i32` to the runtime's 64-bit `Int`.
            Ok(Value::Int(self.int()? as i64))
        } else if ty.contains(Kind::Float) {
            Ok(Value::Float(self.float()?))
        } else if ty.contains(Kind::Bool) {
            Ok(Value::Bool(self.bool()?))
        } else if ty.contains(Kind::String) {
            Ok(Value::Str(self.string()?.into()))
        } else {
            panic!("structs not implemented")
        }
    }
}

/// Writes primitive, typed, and structured values, tracking the running
/// byte offset so jump and function-body-length operands (see
/// [`crate::codegen`]) can be resolved relative to their own position.
pub struct Writer<W> {
    pub w: W,
    pub offset: i64,
}

impl<W: Write> Writer<W> {
    pub fn new(w: W) -> Writer<W> {
        Writer { w, offset: 0 }
    }

    pub fn byte(&mut self, b: u8) -> Result<(), VmError> {
        self.w.write_all(&[b])?;
        self.offset += 1;
        Ok(())
    }

    pub fn int(&mut self, v: i32) -> Result<(), VmError> {
        self.w.write_all(&v.to_be_bytes())?;
        self.offset += 4;
        Ok(())
    }

    pub fn float(&mut self, v: f64) -> Result<(), VmError> {
        self.w.write_all(&v.to_be_bytes())?;
        self.offset += 8;
        Ok(())
    }

    pub fn bool(&mut self, v: bool) -> Result<(), VmError> {
        self.byte(if v { 1 } else { 0 })
    }

    pub fn bytes(&mut self, v: &[u8]) -> Result<(), VmError> {
        self.int(v.len() as i32)?;
        self.w.write_all(v)?;
        self.offset += v.len() as i64;
        Ok(())
    }

    pub fn string(&mut self, v: &str) -> Result<(), VmError> {
        self.bytes(v.as_bytes())
    }

    /// Write a `Type`'s tag byte (plus struct index, if any). Panics if
    /// asked to write a `FuncT` tag: the wire format has no representation
    /// for one.
    pub fn kind_type(&mut self, ty: &Type) -> Result<(), VmError> {
        if ty.contains(Kind::FuncT) {
            panic!("function types cannot be written to the wire");
        }
        if ty.contains(Kind::Struct) {
            self.byte(Kind::Struct.as_byte())?;
            return self.int(ty.struct_index);
        }
        let kind = if ty.contains(Kind::Int) {
            Kind::Int
        } else if ty.contains(Kind::Float) {
            Kind::Float
        } else if ty.contains(Kind::Bool) {
            Kind::Bool
        } else if ty.contains(Kind::String) {
            Kind::String
        } else {
            panic!("type has no representable kind")
        };
        self.byte(kind.as_byte())
    }

    pub fn type_signature(&mut self, sig: &TypeSignature) -> Result<(), VmError> {
        self.int(sig.args.len() as i32)?;
        for t in &sig.args {
            self.kind_type(t)?;
        }
        self.int(sig.ret.len() as i32)?;
        for t in &sig.ret {
            self.kind_type(t)?;
        }
        Ok(())
    }

    /// Write a `Type` tag for `val`'s kind, then the value payload.
    pub fn typed_value(&mut self, val: &Value) -> Result<(), VmError> {
        self.kind_type(&Type::single(val.kind()))?;
        self.value(val)
    }

    pub fn value(&mut self, val: &Value) -> Result<(), VmError> {
        match val {
            // Truncate the runtime's 64-bit `Int` back to the wire's 4-byte
            // field, same as the reference writer's `int32(i)` conversion.
            Value::Int(v) => self.int(*v as i32),
            Value::Float(v) => self.float(*v),
            Value::Bool(v) => self.bool(*v),
            Value::Str(v) => self.string(v),
            Value::Function(_) | Value::Builtin(_) => {
                panic!("function values cannot be written to the wire")
            }
        }
    }
}

pub fn size_of_type(ty: &Type) -> usize {
    if ty.contains(Kind::Struct) {
        return 1 + 4;
    }
    if ty.contains(Kind::FuncT) {
        panic!("function types have no wire size");
    }
    1
}

pub fn size_of_signature(sig: &TypeSignature) -> usize {
    4 + sig.args.iter().map(size_of_type).sum::<usize>()
        + 4
        + sig.ret.iter().map(size_of_type).sum::<usize>()
}

/// The wire size of `val`'s own payload (not including a preceding type
/// tag byte, which `Push` adds separately — see [`crate::codegen`]).
pub fn size_of_value(val: &Value) -> usize {
    match val {
        Value::Int(_) => 4,
        Value::Float(_) => 8,
        Value::Bool(_) => 1,
        Value::Str(s) => 4 + s.len(),
        Value::Function(_) | Value::Builtin(_) => {
            panic!("function values have no wire size")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn typed_value_round_trips() {
        let values = vec![
            Value::Int(-17),
            Value::Float(3.25),
            Value::Bool(true),
            Value::Str("hi there".into()),
        ];
        for v in values {
            let mut buf = Vec::new();
            Writer::new(&mut buf).typed_value(&v).unwrap();
            let decoded = Reader::new(Cursor::new(buf)).typed_value().unwrap();
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn type_signature_round_trips() {
        let sig = TypeSignature::new(vec![Type::single(Kind::Int), Type::single(Kind::String)], vec![Type::single(Kind::Bool)]);
        let mut buf = Vec::new();
        Writer::new(&mut buf).type_signature(&sig).unwrap();
        let decoded = Reader::new(Cursor::new(buf)).type_signature().unwrap();
        assert_eq!(decoded, sig);
    }

    #[test]
    fn truncated_string_is_unexpected_eof() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&10i32.to_be_bytes()); // claims 10 bytes, provides none
        let err = Reader::new(Cursor::new(buf)).string();
        assert!(matches!(err, Err(VmError::Io(_))));
    }

    #[test]
    fn size_accounting_matches_written_bytes() {
        let v = Value::Str("abcdef".into());
        let mut buf = Vec::new();
        Writer::new(&mut buf).typed_value(&v).unwrap();
        assert_eq!(buf.len(), 1 + size_of_value(&v));
    }
}
