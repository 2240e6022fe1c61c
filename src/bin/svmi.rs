//! Bytecode interpreter entry point.
//!
//! Behavior summary:
//! - With a path argument, load that bytecode file and run it.
//! - With no path, read bytecode from stdin.
//! - `-h`/`--help` prints usage and exits 0.
//!
//! After loading, the standard library (`Println`, `ToString`) is
//! registered into the root scope, then `Main:` is looked up and called —
//! the convention every worked example in this crate's tests follows.

use std::env;
use std::fs::File;
use std::io::stdin;
use std::process::exit;

use stackvm::stdlib;
use stackvm::Vm;

const VERSION: &str = "0.1.0";

fn usage() -> String {
    format!(
        r#"svmi v{VERSION} — stack-vm interpreter

Usage:
    svmi [file.svb]

Arguments:
    <file.svb>
        Path to a bytecode file to execute. If omitted, bytecode is read
        from stdin.

Options:
    -h, --help
        Show this help message and exit."#
    )
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 && (args[1] == "-h" || args[1] == "--help") {
        println!("{}", usage());
        return;
    }

    let mut vm = Vm::new();
    stdlib::register(&mut vm);

    let result = if let Some(path) = args.get(1) {
        match File::open(path) {
            Ok(f) => vm.load_from(f),
            Err(e) => {
                eprintln!("svmi: could not open {path}: {e}");
                exit(1);
            }
        }
    } else {
        vm.load_from(stdin())
    };

    if let Err(e) = result {
        eprintln!("svmi: {e}");
        exit(1);
    }

    if let Err(e) = vm.get("Main:").and_then(|_| vm.call()) {
        eprintln!("svmi: {e}");
        exit(1);
    }
}
