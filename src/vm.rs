//! # Interpreter
//!
//! [`Vm`] is a single fetch-decode-dispatch loop over a seekable byte
//! cursor. It owns one operand [`Stack`] and one [`Scope`] chain for the
//! lifetime of a load or call; per-opcode logic lives in the `ops_*`
//! submodules, mirroring how the opcode table splits into jump/stack/call
//! control-flow versus arithmetic/logic/bitwise value operators.
//!
//! `Ret` is modeled as [`VmError::Return`], an internal sentinel that only
//! `Call`'s function-invocation path catches; if it ever reaches
//! [`Vm::exec`]'s own caller outside of a `Call`, that's a bug.

mod ops_arith;
mod ops_control;

use std::io::{Cursor, Read};
use std::rc::Rc;

use crate::bytecode::{opcode, Reader};
use crate::error::VmError;
use crate::scope::Scope;
use crate::stack::Stack;
use crate::types::{Kind, Type, TypeSignature};
use crate::value::{Builtin, Value};

pub struct Vm {
    stack: Stack,
    scope: Scope,
    code: Cursor<Rc<[u8]>>,
}

impl Vm {
    pub fn new() -> Vm {
        Vm { stack: Stack::new(), scope: Scope::root(), code: Cursor::new(Rc::from([])) }
    }

    fn reader(&mut self) -> Reader<&mut Cursor<Rc<[u8]>>> {
        Reader::new(&mut self.code)
    }

    fn read_raw(&mut self, len: usize) -> Result<Rc<[u8]>, VmError> {
        let mut buf = vec![0u8; len];
        self.code.read_exact(&mut buf)?;
        Ok(Rc::from(buf))
    }

    fn read_opcode(&mut self) -> Result<Option<u8>, VmError> {
        let mut buf = [0u8; 1];
        match self.code.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) => Err(VmError::Io(e)),
        }
    }

    /// Run from the current cursor position until the code runs out
    /// (normal termination) or a `Ret` is hit (propagated as
    /// [`VmError::Return`] so the enclosing `Call` can absorb it).
    pub fn exec(&mut self) -> Result<(), VmError> {
        loop {
            let op = match self.read_opcode()? {
                Some(b) => b,
                None => return Ok(()),
            };
            self.dispatch(op)?;
        }
    }

    fn dispatch(&mut self, op: u8) -> Result<(), VmError> {
        use opcode::*;
        match op {
            J | JT | JF | JZ | JNZ => ops_control::handle_jump(self, op),
            PUSH => ops_control::handle_push(self),
            POP => ops_control::handle_pop(self),
            DUP => self.stack.dup(),
            SWP => self.stack.swap(),
            SET => ops_control::handle_set(self),
            GET => ops_control::handle_get(self),
            INC => ops_arith::handle_inc(self),
            DEC => ops_arith::handle_dec(self),
            ADD => ops_arith::handle_add(self),
            SUB => ops_arith::handle_sub(self),
            MUL => ops_arith::handle_mul(self),
            DIV => ops_arith::handle_div(self),
            MOD => ops_arith::handle_mod(self),
            EQ => ops_arith::handle_cmp(self, std::cmp::Ordering::is_eq),
            NE => ops_arith::handle_cmp(self, std::cmp::Ordering::is_ne),
            LT => ops_arith::handle_cmp(self, std::cmp::Ordering::is_lt),
            GT => ops_arith::handle_cmp(self, std::cmp::Ordering::is_gt),
            LE => ops_arith::handle_cmp(self, std::cmp::Ordering::is_le),
            GE => ops_arith::handle_cmp(self, std::cmp::Ordering::is_ge),
            AND => ops_arith::handle_bool2(self, |a, b| a && b),
            OR => ops_arith::handle_bool2(self, |a, b| a || b),
            XOR => ops_arith::handle_bool2(self, |a, b| a ^ b),
            NOT => ops_arith::handle_not(self),
            BAND => ops_arith::handle_int2(self, |a, b| a & b),
            BOR => ops_arith::handle_int2(self, |a, b| a | b),
            BXOR => ops_arith::handle_int2(self, |a, b| a ^ b),
            BNOT => ops_arith::handle_bnot(self),
            BLS => ops_arith::handle_int2(self, |a, b| a << (b & 63)),
            BRS => ops_arith::handle_int2(self, |a, b| a >> (b & 63)),
            BSET => ops_arith::handle_int2(self, |a, b| a | (1 << (b & 63))),
            BCLR => ops_arith::handle_int2(self, |a, b| a & !(1 << (b & 63))),
            BTGL => ops_arith::handle_int2(self, |a, b| a ^ (1 << (b & 63))),
            BMTCH => ops_arith::handle_bmtch(self),
            CALL => ops_control::handle_call(self),
            FUNC => ops_control::handle_func(self),
            RET => Err(VmError::Return),
            other => panic!("unknown opcode 0x{:02x}", other),
        }
    }

    /// Execute `bytes` as top-level code (§6.1): typically a sequence of
    /// `Func ... Set <name>` pairs populating the global scope.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        self.code = Cursor::new(Rc::from(bytes));
        self.exec()
    }

    /// As [`Vm::load`], but reads the bytecode from any `Read` rather than
    /// requiring the caller to buffer it into a slice themselves — the
    /// reader-based entry point the reference CLI exposes (`LoadFrom`)
    /// alongside the slice-based one.
    pub fn load_from(&mut self, mut r: impl Read) -> Result<(), VmError> {
        let mut buf = Vec::new();
        r.read_to_end(&mut buf)?;
        self.load(&buf)
    }

    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Result<Value, VmError> {
        self.stack.pop()
    }

    /// Number of values currently on the operand stack.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// The full structural `Type` of the value `i` slots from the top —
    /// not just its `Kind` — so a `FuncT`-typed parameter can check a
    /// passed `Function`/`Builtin`'s actual signature rather than just its
    /// tag.
    pub(crate) fn peek_type(&self, i: usize) -> Result<Type, VmError> {
        let v = self.stack.peek(i)?;
        Ok(match v.signature() {
            Some(sig) => Type::func(sig.clone()),
            None => Type::single(v.kind()),
        })
    }

    /// Push a host-registered builtin value; follow with `set(name)` to
    /// bind it.
    pub fn builtin(&mut self, signature: TypeSignature, f: impl Fn(&[Value]) -> Vec<Value> + 'static) {
        self.stack.push(Value::Builtin(Builtin { signature, f: Rc::new(f) }));
    }

    /// Pop the top of stack and bind it to `symbol` in the current scope.
    pub fn set(&mut self, symbol: &str) -> Result<(), VmError> {
        let v = self.stack.pop()?;
        self.scope.set(symbol.to_string(), v);
        Ok(())
    }

    /// Look up `symbol` and push its value.
    pub fn get(&mut self, symbol: &str) -> Result<(), VmError> {
        let v = self.scope.get(symbol)?;
        self.stack.push(v);
        Ok(())
    }

    /// Pop the top of stack (which must be callable) and invoke it,
    /// exactly as the `Call` opcode does — the method a host uses to
    /// invoke a looked-up function or builtin.
    pub fn call(&mut self) -> Result<(), VmError> {
        ops_control::handle_call(self)
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}

pub(crate) fn kind_type(k: Kind) -> Type {
    Type::single(k)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::codegen::Generator;
    use crate::types::{type_int, type_string, TypeSignature};

    fn recording_println(vm: &mut Vm) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        vm.builtin(TypeSignature::new(vec![type_string()], vec![]), move |args| {
            if let Value::Str(s) = &args[0] {
                log_clone.borrow_mut().push(s.to_string());
            }
            vec![]
        });
        vm.set("Println:string").unwrap();
        log
    }

    fn register_to_string(vm: &mut Vm) {
        vm.builtin(TypeSignature::new(vec![type_int()], vec![type_string()]), |args| {
            let Value::Int(i) = args[0] else { unreachable!() };
            vec![Value::Str(i.to_string().into())]
        });
        vm.set("ToString:int->string").unwrap();
    }

    #[test]
    fn scenario_a_hello_world() {
        let mut vm = Vm::new();
        let log = recording_println(&mut vm);

        let mut g = Generator::new();
        let end = crate::codegen::Label::new();
        g.func(TypeSignature::new(vec![], vec![]), &end);
        g.push(Value::Str("Hello, world!".into()));
        g.get("Println:string");
        g.call();
        g.label(Some(end));
        g.set("Main:");
        let code = g.generate().unwrap();

        vm.load(&code).unwrap();
        vm.get("Main:").unwrap();
        vm.call().unwrap();

        assert_eq!(*log.borrow(), vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn scenario_b_arithmetic_promotion() {
        let mut vm = Vm::new();
        let mut g = Generator::new();
        g.push(Value::Int(3));
        g.push(Value::Float(4.0));
        g.add();
        vm.load(&g.generate().unwrap()).unwrap();
        assert_eq!(vm.pop().unwrap(), Value::Float(7.0));

        let mut vm2 = Vm::new();
        let mut g2 = Generator::new();
        g2.push(Value::Int(3));
        g2.push(Value::Int(4));
        g2.add();
        vm2.load(&g2.generate().unwrap()).unwrap();
        assert_eq!(vm2.pop().unwrap(), Value::Int(7));
    }

    #[test]
    fn scenario_c_fizzbuzz() {
        let mut vm = Vm::new();
        let log = recording_println(&mut vm);
        register_to_string(&mut vm);

        let mut g = Generator::new();

        let fb_end = crate::codegen::Label::new();
        g.func(TypeSignature::new(vec![type_int()], vec![type_string()]), &fb_end);
        let fizz = crate::codegen::Label::new();
        let buzz = crate::codegen::Label::new();
        let else_ = crate::codegen::Label::new();
        let end_if = crate::codegen::Label::new();

        g.dup();
        g.push(Value::Int(15));
        g.modulo();
        g.jnz(&fizz);
        g.push(Value::Str("FizzBuzz".into()));
        g.j(&end_if);

        g.label(Some(fizz.clone()));
        g.dup();
        g.push(Value::Int(3));
        g.modulo();
        g.jnz(&buzz);
        g.push(Value::Str("Fizz".into()));
        g.j(&end_if);

        g.label(Some(buzz.clone()));
        g.dup();
        g.push(Value::Int(5));
        g.modulo();
        g.jnz(&else_);
        g.push(Value::Str("Buzz".into()));
        g.j(&end_if);

        g.label(Some(else_.clone()));
        g.dup();
        g.get("ToString:int->string");
        g.call();
        g.j(&end_if);

        g.label(Some(end_if));
        // Every branch above leaves `[n, result]`; the signature returns
        // only `result`, so drop the argument before falling into `Ret`.
        g.swp();
        g.pop();
        g.label(Some(fb_end));
        g.set("fizzbuzz:int->string");

        let main_end = crate::codegen::Label::new();
        g.func(TypeSignature::new(vec![], vec![]), &main_end);
        g.push(Value::Int(1));
        let start_loop = g.label(None);
        let end_loop = crate::codegen::Label::new();
        g.dup();
        g.push(Value::Int(100));
        g.lt();
        g.jf(&end_loop);
        g.dup();
        g.get("fizzbuzz:int->string");
        g.call();
        g.get("Println:string");
        g.call();
        g.inc();
        g.j(&start_loop);
        g.label(Some(end_loop));
        // The loop counter is still on the stack once the bound check
        // fails; drop it before `Main` (empty->empty) returns.
        g.pop();
        g.label(Some(main_end));
        g.set("Main:");

        vm.load(&g.generate().unwrap()).unwrap();
        vm.get("Main:").unwrap();
        vm.call().unwrap();

        let expected: Vec<String> = (1..100)
            .map(|i| {
                if i % 15 == 0 {
                    "FizzBuzz".to_string()
                } else if i % 3 == 0 {
                    "Fizz".to_string()
                } else if i % 5 == 0 {
                    "Buzz".to_string()
                } else {
                    i.to_string()
                }
            })
            .collect();
        assert_eq!(*log.borrow(), expected);
        assert_eq!(vm.stack_len(), 0, "stack must be empty on return");
    }

    #[test]
    fn scenario_d_type_error() {
        let mut vm = Vm::new();
        let mut g = Generator::new();
        g.push(Value::Int(1));
        g.push(Value::Bool(true));
        g.add();
        let err = vm.load(&g.generate().unwrap()).unwrap_err();
        assert!(matches!(err, VmError::TypeError { .. }));
    }

    #[test]
    fn scenario_e_forward_jump() {
        let mut vm = Vm::new();
        let mut g = Generator::new();
        let skip = crate::codegen::Label::new();
        g.j(&skip);
        g.push(Value::Int(1));
        g.label(Some(skip));
        g.push(Value::Int(2));

        vm.load(&g.generate().unwrap()).unwrap();
        assert_eq!(vm.pop().unwrap(), Value::Int(2));
        assert!(vm.pop().is_err());
    }

    #[test]
    fn scenario_f_scope_isolation() {
        let mut vm = Vm::new();
        let mut g = Generator::new();
        let end = crate::codegen::Label::new();
        g.func(TypeSignature::new(vec![], vec![]), &end);
        g.push(Value::Int(1));
        g.set("x");
        g.label(Some(end));
        g.set("Holder:");

        vm.load(&g.generate().unwrap()).unwrap();
        vm.get("Holder:").unwrap();
        vm.call().unwrap();

        assert!(matches!(vm.get("x"), Err(VmError::NameError { .. })));
    }

    #[test]
    fn stack_underflow_on_empty_pop() {
        let mut vm = Vm::new();
        assert!(matches!(vm.pop(), Err(VmError::StackUnderflow)));
    }

    /// A `FuncT`-typed parameter must check the *actual* signature of the
    /// callable passed in, not just that the argument happens to be some
    /// callable or other.
    #[test]
    fn func_typed_argument_checks_callee_signature() {
        use crate::types::Type;

        let mut vm = Vm::new();
        let inner_sig = TypeSignature::new(vec![], vec![type_string()]);

        vm.builtin(inner_sig.clone(), |_| vec![Value::Str("inner".into())]);

        let called = Rc::new(RefCell::new(false));
        let called_clone = called.clone();
        vm.builtin(TypeSignature::new(vec![Type::func(inner_sig.clone())], vec![]), move |_| {
            *called_clone.borrow_mut() = true;
            vec![]
        });

        vm.call().unwrap();
        assert!(*called.borrow());
    }

    /// A callable with a mismatched signature must still be rejected, even
    /// though both operands share the `FuncT` kind.
    #[test]
    fn func_typed_argument_rejects_mismatched_signature() {
        use crate::types::Type;

        let mut vm = Vm::new();
        let wrong_sig = TypeSignature::new(vec![type_int()], vec![type_string()]);
        let expected_sig = TypeSignature::new(vec![], vec![type_string()]);

        vm.builtin(wrong_sig, |_| vec![Value::Str("inner".into())]);
        vm.builtin(TypeSignature::new(vec![Type::func(expected_sig)], vec![]), |_| vec![]);

        assert!(matches!(vm.call(), Err(VmError::TypeError { .. })));
    }
}
