//! Text-to-bytecode assembler entry point.
//!
//! Behavior summary:
//! - A positional input path is assembled; output defaults to the same
//!   name with its extension swapped to `.svb`, or `-o <path>` to override.
//! - With no positional path, source is read from stdin and bytecode is
//!   written to stdout (no default output filename can be derived).
//! - `-h`/`--help` prints usage and exits 0.

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::exit;

use stackvm::assembler::assemble;

fn usage() -> String {
    r#"svas — stack-vm assembler

Usage:
    svas [-o <output>] [input.sva]

Arguments:
    <input.sva>
        Path to an assembler source file. If omitted, source is read from
        stdin and bytecode is written to stdout.

Options:
    -o <output>
        Write bytecode to <output> instead of the default derived name.
    -h, --help
        Show this help message and exit."#
        .to_string()
}

fn default_output(input: &str) -> PathBuf {
    let mut out = PathBuf::from(input);
    out.set_extension("svb");
    out
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut input_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                println!("{}", usage());
                return;
            }
            "-o" => {
                i += 1;
                match args.get(i) {
                    Some(v) => output_path = Some(v.clone()),
                    None => {
                        eprintln!("svas: -o requires an argument");
                        exit(1);
                    }
                }
            }
            other => input_path = Some(other.to_string()),
        }
        i += 1;
    }

    let source = match &input_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("svas: could not read {path}: {e}");
                exit(1);
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buf) {
                eprintln!("svas: could not read stdin: {e}");
                exit(1);
            }
            buf
        }
    };

    let bytecode = match assemble(&source) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("svas: {e}");
            exit(1);
        }
    };

    match (&input_path, &output_path) {
        (_, Some(out)) => {
            if let Err(e) = fs::write(out, &bytecode) {
                eprintln!("svas: could not write {out}: {e}");
                exit(1);
            }
        }
        (Some(input), None) => {
            let out = default_output(input);
            if let Err(e) = fs::write(&out, &bytecode) {
                eprintln!("svas: could not write {}: {e}", out.display());
                exit(1);
            }
        }
        (None, None) => {
            if let Err(e) = io::stdout().write_all(&bytecode) {
                eprintln!("svas: could not write stdout: {e}");
                exit(1);
            }
        }
    }
}
