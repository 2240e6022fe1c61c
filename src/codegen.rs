//! # Code generator
//!
//! A [`Generator`] accumulates instructions and their operands in order,
//! tracking the running byte size the sequence will occupy once
//! serialized. Jump targets and a function's body-length field are both
//! resolved the same way: each references a [`Label`], a shared cell set by
//! [`Generator::label`] to the generator's current `size` — the offset of
//! whatever instruction comes next. Because a jump only reads its label's
//! cell at [`Generator::generate`] time, forward references just work:
//! the label doesn't need to be defined before it's referenced, only
//! before `generate()` is called.
//!
//! The serialized value of a jump or body-length operand is **signed and
//! relative to the byte position immediately after the 4-byte field
//! itself** — see [`Operand::size`] and the write loop in
//! [`Generator::generate_to`].

use std::cell::Cell;
use std::rc::Rc;

use crate::bytecode::{opcode, size_of_signature, size_of_value, Writer};
use crate::error::VmError;
use crate::types::{Kind, Type, TypeSignature};
use crate::value::Value;

/// A forward-or-backward reference to a byte offset, resolved once
/// [`Generator::label`] has been called to fix its final value.
#[derive(Clone, Debug)]
pub struct Label(Rc<Cell<i32>>);

impl Label {
    pub fn new() -> Label {
        Label(Rc::new(Cell::new(0)))
    }

    pub fn get(&self) -> i32 {
        self.0.get()
    }
}

impl Default for Label {
    fn default() -> Label {
        Label::new()
    }
}

#[derive(Debug)]
enum Operand {
    /// A `Set`/`Get` symbol — a length-prefixed string, no type tag.
    Symbol(String),
    /// A `Push` literal — a full `TypedValue`.
    Typed(Value),
    /// A signed offset relative to the end of its own 4-byte field.
    Offset(Label),
    /// A `Func` signature.
    Signature(TypeSignature),
}

impl Operand {
    fn size(&self) -> usize {
        match self {
            Operand::Symbol(s) => 4 + s.len(),
            Operand::Typed(v) => 1 + size_of_value(v),
            Operand::Offset(_) => 4,
            Operand::Signature(sig) => size_of_signature(sig),
        }
    }
}

#[derive(Debug)]
struct Instruction {
    opcode: u8,
    operands: Vec<Operand>,
}

/// Accumulates instructions and the running byte size they'll occupy once
/// [`generate`](Generator::generate) serializes them.
#[derive(Debug, Default)]
pub struct Generator {
    instructions: Vec<Instruction>,
    size: i32,
}

impl Generator {
    pub fn new() -> Generator {
        Generator { instructions: Vec::new(), size: 0 }
    }

    fn instr(&mut self, opcode: u8, operands: Vec<Operand>) {
        self.size += 1 + operands.iter().map(Operand::size).sum::<usize>() as i32;
        self.instructions.push(Instruction { opcode, operands });
    }

    /// Fix `label` (allocating one if none was passed in) to the current
    /// size — the offset the *next* emitted instruction will occupy.
    /// Returns the label so callers can stash it for a later reference.
    pub fn label(&mut self, label: Option<Label>) -> Label {
        let label = label.unwrap_or_else(Label::new);
        label.0.set(self.size);
        label
    }

    pub fn push(&mut self, val: Value) {
        self.instr(opcode::PUSH, vec![Operand::Typed(val)]);
    }

    pub fn pop(&mut self) {
        self.instr(opcode::POP, vec![]);
    }

    pub fn dup(&mut self) {
        self.instr(opcode::DUP, vec![]);
    }

    pub fn swp(&mut self) {
        self.instr(opcode::SWP, vec![]);
    }

    pub fn set(&mut self, symbol: impl Into<String>) {
        self.instr(opcode::SET, vec![Operand::Symbol(symbol.into())]);
    }

    pub fn get(&mut self, symbol: impl Into<String>) {
        self.instr(opcode::GET, vec![Operand::Symbol(symbol.into())]);
    }

    pub fn inc(&mut self) {
        self.instr(opcode::INC, vec![]);
    }
    pub fn dec(&mut self) {
        self.instr(opcode::DEC, vec![]);
    }
    pub fn add(&mut self) {
        self.instr(opcode::ADD, vec![]);
    }
    pub fn sub(&mut self) {
        self.instr(opcode::SUB, vec![]);
    }
    pub fn mul(&mut self) {
        self.instr(opcode::MUL, vec![]);
    }
    pub fn div(&mut self) {
        self.instr(opcode::DIV, vec![]);
    }
    pub fn modulo(&mut self) {
        self.instr(opcode::MOD, vec![]);
    }

    pub fn eq(&mut self) {
        self.instr(opcode::EQ, vec![]);
    }
    pub fn ne(&mut self) {
        self.instr(opcode::NE, vec![]);
    }
    pub fn lt(&mut self) {
        self.instr(opcode::LT, vec![]);
    }
    pub fn gt(&mut self) {
        self.instr(opcode::GT, vec![]);
    }
    pub fn le(&mut self) {
        self.instr(opcode::LE, vec![]);
    }
    pub fn ge(&mut self) {
        self.instr(opcode::GE, vec![]);
    }

    pub fn and(&mut self) {
        self.instr(opcode::AND, vec![]);
    }
    pub fn or(&mut self) {
        self.instr(opcode::OR, vec![]);
    }
    pub fn xor(&mut self) {
        self.instr(opcode::XOR, vec![]);
    }
    pub fn not(&mut self) {
        self.instr(opcode::NOT, vec![]);
    }

    pub fn band(&mut self) {
        self.instr(opcode::BAND, vec![]);
    }
    pub fn bor(&mut self) {
        self.instr(opcode::BOR, vec![]);
    }
    pub fn bxor(&mut self) {
        self.instr(opcode::BXOR, vec![]);
    }
    pub fn bnot(&mut self) {
        self.instr(opcode::BNOT, vec![]);
    }
    pub fn bls(&mut self) {
        self.instr(opcode::BLS, vec![]);
    }
    pub fn brs(&mut self) {
        self.instr(opcode::BRS, vec![]);
    }
    pub fn bset(&mut self) {
        self.instr(opcode::BSET, vec![]);
    }
    pub fn bclr(&mut self) {
        self.instr(opcode::BCLR, vec![]);
    }
    pub fn btgl(&mut self) {
        self.instr(opcode::BTGL, vec![]);
    }
    pub fn bmtch(&mut self) {
        self.instr(opcode::BMTCH, vec![]);
    }

    pub fn call(&mut self) {
        self.instr(opcode::CALL, vec![]);
    }
    pub fn ret(&mut self) {
        self.instr(opcode::RET, vec![]);
    }

    pub fn j(&mut self, label: &Label) {
        self.instr(opcode::J, vec![Operand::Offset(label.clone())]);
    }
    pub fn jt(&mut self, label: &Label) {
        self.instr(opcode::JT, vec![Operand::Offset(label.clone())]);
    }
    pub fn jf(&mut self, label: &Label) {
        self.instr(opcode::JF, vec![Operand::Offset(label.clone())]);
    }
    pub fn jz(&mut self, label: &Label) {
        self.instr(opcode::JZ, vec![Operand::Offset(label.clone())]);
    }
    pub fn jnz(&mut self, label: &Label) {
        self.instr(opcode::JNZ, vec![Operand::Offset(label.clone())]);
    }

    /// Emit a `Func` prologue: the signature, then a body-length field
    /// resolved against `end`. The caller must follow this with the body's
    /// own instructions and finish by calling `label(Some(end))` at the
    /// point the body ends.
    pub fn func(&mut self, signature: TypeSignature, end: &Label) {
        self.instr(opcode::FUNC, vec![Operand::Signature(signature), Operand::Offset(end.clone())]);
    }

    /// Serialize the accumulated instructions, resolving every label
    /// reference to its relative offset.
    pub fn generate(&self) -> Result<Vec<u8>, VmError> {
        let mut buf = Vec::new();
        self.generate_to(&mut buf)?;
        Ok(buf)
    }

    pub fn generate_to(&self, out: &mut Vec<u8>) -> Result<(), VmError> {
        let mut w = Writer::new(out);
        for instr in &self.instructions {
            w.byte(instr.opcode)?;
            for op in &instr.operands {
                match op {
                    Operand::Symbol(s) => w.string(s)?,
                    Operand::Typed(v) => w.typed_value(v)?,
                    Operand::Signature(sig) => w.type_signature(sig)?,
                    Operand::Offset(label) => {
                        let rel = label.get() as i64 - (w.offset + 4);
                        w.int(rel as i32)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parse a kind name (`int`, `float`, `bool`, `string`, or a nested
/// `func(args->ret)`) into a [`Type`]. Mirrors the assembler's own type
/// grammar (§6.3/§6.4 of the design); a `func(...)` type built this way can
/// be used in a host-constructed signature but — like every `FuncT` type —
/// can never be serialized (see [`crate::bytecode`]).
pub fn parse_type(s: &str) -> Option<Type> {
    match s {
        "int" => Some(Type::single(Kind::Int)),
        "float" => Some(Type::single(Kind::Float)),
        "bool" => Some(Type::single(Kind::Bool)),
        "string" => Some(Type::single(Kind::String)),
        s if s.starts_with("func(") && s.ends_with(')') => {
            let inner = &s[5..s.len() - 1];
            Some(Type::func(parse_signature(inner)))
        }
        _ => None,
    }
}

/// Parse the `argtypes->rettypes` convention (`:`-separated kind names on
/// each side of an optional `->`, empty sides eliding to `:`/nothing).
pub fn parse_signature(s: &str) -> TypeSignature {
    let (args_part, ret_part) = match s.split_once("->") {
        Some((a, r)) => (a, r),
        None => (s, ""),
    };
    let parse_side = |side: &str| -> Vec<Type> {
        let side = side.strip_prefix(':').unwrap_or(side);
        if side.is_empty() {
            return Vec::new();
        }
        side.split(':').filter_map(parse_type).collect()
    };
    TypeSignature::new(parse_side(args_part), parse_side(ret_part))
}

/// Parse the `Name:argtypes->rettypes` symbol convention into the bare
/// name and its signature.
pub fn parse_symbol(s: &str) -> (&str, TypeSignature) {
    match s.split_once(':') {
        Some((name, rest)) => (name, parse_signature(&format!(":{rest}"))),
        None => (s, TypeSignature::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `Main:` with no args, that pushes a string, looks up `Println`,
    /// and calls it — the exact byte layout a Generator must produce.
    #[test]
    fn hello_world_byte_layout() {
        let mut g = Generator::new();
        let main_end = Label::new();
        g.func(TypeSignature::new(vec![], vec![]), &main_end);
        g.push(Value::Str("Hello, world!".into()));
        g.get("Println:string");
        g.call();
        g.label(Some(main_end));
        g.set("Main");

        let code = g.generate().unwrap();

        let mut expected = Vec::new();
        expected.push(opcode::FUNC);
        expected.extend_from_slice(&0i32.to_be_bytes()); // nargs
        expected.extend_from_slice(&0i32.to_be_bytes()); // nret
        expected.extend_from_slice(&39i32.to_be_bytes()); // body length
        expected.push(opcode::PUSH);
        expected.push(Kind::String.as_byte());
        expected.extend_from_slice(&13i32.to_be_bytes());
        expected.extend_from_slice(b"Hello, world!");
        expected.push(opcode::GET);
        expected.extend_from_slice(&14i32.to_be_bytes());
        expected.extend_from_slice(b"Println:string");
        expected.push(opcode::CALL);
        expected.push(opcode::SET);
        expected.extend_from_slice(&4i32.to_be_bytes());
        expected.extend_from_slice(b"Main");

        assert_eq!(code, expected);
    }

    #[test]
    fn forward_jump_offset_is_relative_to_end_of_field() {
        let mut g = Generator::new();
        let skip = Label::new();
        g.j(&skip);
        g.push(Value::Int(1));
        g.label(Some(skip.clone()));
        g.push(Value::Int(2));

        let code = g.generate().unwrap();
        // J opcode (1) + offset (4) = 5 bytes before the skipped Push.
        // Push Int (1) + Kind byte (1) + 4 bytes = 6 bytes to skip over.
        let expected_offset = 6i32;
        assert_eq!(&code[1..5], &expected_offset.to_be_bytes());
    }

    #[test]
    fn parse_signature_handles_bare_and_named_forms() {
        let sig = parse_signature(":int->string");
        assert_eq!(sig.args.len(), 1);
        assert_eq!(sig.ret.len(), 1);

        let (name, sig) = parse_symbol("fizzbuzz:int->string");
        assert_eq!(name, "fizzbuzz");
        assert_eq!(sig.args.len(), 1);
        assert_eq!(sig.ret.len(), 1);

        let (name, sig) = parse_symbol("Main:");
        assert_eq!(name, "Main");
        assert!(sig.args.is_empty());
        assert!(sig.ret.is_empty());
    }
}
