//! # Control flow, calls, and function construction
//!
//! Jumps, the stack-manipulation opcodes that aren't plain arithmetic, and
//! the `Call`/`Func`/`Ret` triad live here. `Call`'s two branches
//! (`Function` vs `Builtin`) are the one place the interpreter touches the
//! scope chain and the code cursor together: a `Function` call swaps both
//! out for the callee and — on every exit path, success or error —
//! restores both before checking return types.

use crate::bytecode::opcode;
use crate::error::VmError;
use crate::types::{type_bool, type_num, Kind, Type};
use crate::value::{Builtin, Function, Value};
use crate::vm::{kind_type, Vm};

fn type_error(expected: Type, actual: &Value) -> VmError {
    VmError::TypeError { expected, actual: kind_type(actual.kind()) }
}

pub fn handle_push(vm: &mut Vm) -> Result<(), VmError> {
    let v = vm.reader().typed_value()?;
    vm.push(v);
    Ok(())
}

pub fn handle_pop(vm: &mut Vm) -> Result<(), VmError> {
    vm.pop()?;
    Ok(())
}

pub fn handle_set(vm: &mut Vm) -> Result<(), VmError> {
    let sym = vm.reader().string()?;
    vm.set(&sym)
}

pub fn handle_get(vm: &mut Vm) -> Result<(), VmError> {
    let sym = vm.reader().string()?;
    vm.get(&sym)
}

/// `J`/`JT`/`JF`/`JZ`/`JNz` all share one encoding: a signed offset,
/// relative to the cursor position right after the 4-byte field, taken
/// when the opcode's predicate holds (unconditionally for `J`).
pub fn handle_jump(vm: &mut Vm, op: u8) -> Result<(), VmError> {
    let offset = vm.reader().int()?;
    let take = match op {
        opcode::J => true,
        opcode::JT => pop_bool(vm)?,
        opcode::JF => !pop_bool(vm)?,
        opcode::JZ => pop_is_zero(vm)?,
        opcode::JNZ => !pop_is_zero(vm)?,
        _ => unreachable!("handle_jump called with non-jump opcode"),
    };
    if take {
        let new_pos = vm.code.position() as i64 + offset as i64;
        vm.code.set_position(new_pos as u64);
    }
    Ok(())
}

fn pop_bool(vm: &mut Vm) -> Result<bool, VmError> {
    match vm.pop()? {
        Value::Bool(b) => Ok(b),
        other => Err(type_error(type_bool(), &other)),
    }
}

fn pop_is_zero(vm: &mut Vm) -> Result<bool, VmError> {
    match vm.pop()? {
        Value::Int(i) => Ok(i == 0),
        Value::Float(f) => Ok(f == 0.0),
        other => Err(type_error(type_num(), &other)),
    }
}

/// Reads a signature and a body-length-prefixed byte range directly off
/// the code cursor and pushes the resulting `Function` value. The length
/// field shares its encoding with a jump's offset (see
/// [`crate::codegen`]), but since the body immediately follows the field,
/// reading it back collapses to "the next `len` raw bytes."
pub fn handle_func(vm: &mut Vm) -> Result<(), VmError> {
    let signature = vm.reader().type_signature()?;
    let len = vm.reader().int()?;
    let code = vm.read_raw(len as usize)?;
    vm.push(Value::Function(Function { signature, code }));
    Ok(())
}

pub fn handle_call(vm: &mut Vm) -> Result<(), VmError> {
    let callable = vm.pop()?;
    match callable {
        Value::Function(f) => call_function(vm, f),
        Value::Builtin(b) => call_builtin(vm, b),
        other => Err(type_error(kind_type(Kind::FuncT), &other)),
    }
}

fn check_types(vm: &Vm, types: &[Type]) -> Result<(), VmError> {
    for (i, t) in types.iter().enumerate() {
        let actual = vm.peek_type(i)?;
        if !t.accepts(&actual) {
            return Err(VmError::TypeError { expected: t.clone(), actual });
        }
    }
    Ok(())
}

fn call_function(vm: &mut Vm, f: Function) -> Result<(), VmError> {
    check_types(vm, &f.signature.args)?;

    let outer_code = std::mem::replace(&mut vm.code, std::io::Cursor::new(f.code.clone()));
    let outer_scope = vm.scope.clone();
    vm.scope = vm.scope.child();

    let result = vm.exec();

    vm.code = outer_code;
    vm.scope = outer_scope;

    match result {
        Ok(()) | Err(VmError::Return) => {}
        Err(e) => return Err(e),
    }

    check_types(vm, &f.signature.ret)
}

fn call_builtin(vm: &mut Vm, b: Builtin) -> Result<(), VmError> {
    check_types(vm, &b.signature.args)?;
    let args = vm.stack.pop_n(b.signature.args.len())?;
    for v in (b.f)(&args) {
        vm.push(v);
    }
    check_types(vm, &b.signature.ret)
}
