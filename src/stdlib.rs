//! # Standard library
//!
//! A minimal set of host builtins, registered into a [`Vm`] by the
//! interpreter binary before it runs a loaded program's `Main`. The VM
//! itself has no notion of "builtin" beyond the generic `Builtin` value
//! kind (§6.2 of the design); everything here is just an ordinary host
//! registration, grounded in the reference standard library's own
//! `Println`/`ToString` entries.
//!
//! Names follow the `Name:argtypes->rettypes` convention (§6.3) so
//! assembler source can `get @ToString:int->string` the same way it would
//! look up any other global.

use crate::types::{type_bool, type_float, type_int, type_string, TypeSignature};
use crate::value::Value;
use crate::vm::Vm;

/// Register every standard-library entry into `vm`'s current (root) scope.
pub fn register(vm: &mut Vm) {
    vm.builtin(TypeSignature::new(vec![type_string()], vec![]), |args| {
        if let Value::Str(s) = &args[0] {
            println!("{s}");
        }
        vec![]
    });
    vm.set("Println:string").expect("stack holds the builtin just pushed");

    vm.builtin(TypeSignature::new(vec![type_int()], vec![type_string()]), |args| {
        let Value::Int(i) = args[0] else { unreachable!("signature checked by the VM") };
        vec![Value::Str(i.to_string().into())]
    });
    vm.set("ToString:int->string").expect("stack holds the builtin just pushed");

    vm.builtin(TypeSignature::new(vec![type_float()], vec![type_string()]), |args| {
        let Value::Float(f) = args[0] else { unreachable!("signature checked by the VM") };
        vec![Value::Str(f.to_string().into())]
    });
    vm.set("ToString:float->string").expect("stack holds the builtin just pushed");

    vm.builtin(TypeSignature::new(vec![type_bool()], vec![type_string()]), |args| {
        let Value::Bool(b) = args[0] else { unreachable!("signature checked by the VM") };
        vec![Value::Str(if b { "true".into() } else { "false".into() })]
    });
    vm.set("ToString:bool->string").expect("stack holds the builtin just pushed");
}
