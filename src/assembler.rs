//! # Text assembler
//!
//! Converts a line-oriented mnemonic source file into bytecode by driving
//! a [`Generator`]. Tokenization is whitespace-separated with two
//! exceptions: a double-quoted string is scanned as a single token
//! including embedded whitespace (honoring `\"` as an escaped quote), and
//! `//` introduces a comment that runs to the end of the line and produces
//! no token at all.
//!
//! This is an external collaborator per the VM's own design — the VM
//! consumes bytecode, never assembler source — so its error domain
//! ([`AsmError`]) is deliberately separate from [`crate::error::VmError`].

use std::fmt;

use crate::codegen::{parse_signature, Generator, Label};

#[derive(Debug)]
pub enum AsmError {
    UnexpectedEof,
    InvalidOpcode(String),
    UnknownToken(String),
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::UnexpectedEof => write!(f, "unexpected end of input"),
            AsmError::InvalidOpcode(op) => write!(f, "invalid opcode: {op}"),
            AsmError::UnknownToken(tok) => write!(f, "unknown token: {tok}"),
        }
    }
}

impl std::error::Error for AsmError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    QuotedString(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut s = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' if chars.peek() == Some(&'"') => {
                        chars.next();
                        s.push('"');
                    }
                    other => s.push(other),
                }
            }
            tokens.push(Token::QuotedString(s));
            continue;
        }
        if c == '/' {
            let mut lookahead = chars.clone();
            lookahead.next();
            if lookahead.peek() == Some(&'/') {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }
        }
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }
        // `.label` and `j .label` both need the dot attached to the name
        // intact here: a label *definition* (`.skip`) and a label
        // *reference* as a jump operand (`j .skip`) share the same token
        // shape, so splitting it apart at tokenize time would make one of
        // the two forms ambiguous. Both call sites strip the leading dot
        // themselves (see `Converter::define_label`/`read_label_ref`).
        tokens.push(Token::Word(word));
    }
    tokens
}

use std::collections::HashMap;

struct Converter {
    tokens: Vec<Token>,
    pos: usize,
    gen: Generator,
    labels: HashMap<String, Label>,
}

impl Converter {
    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn next_word(&mut self) -> Result<String, AsmError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            Some(Token::QuotedString(_)) => Err(AsmError::UnknownToken("expected a bare token, found a quoted string".to_string())),
            None => Err(AsmError::UnexpectedEof),
        }
    }

    fn label_cell(&mut self, name: String) -> Label {
        self.labels.entry(name).or_insert_with(Label::new).clone()
    }

    /// Fix `name` (allocating its cell on first mention, same as a
    /// definition would) to the generator's current position.
    fn define_label(&mut self, name: String) -> Result<(), AsmError> {
        let cell = self.labels.remove(&name);
        let resolved = self.gen.label(cell);
        self.labels.insert(name, resolved);
        Ok(())
    }

    /// A jump operand names its target with an optional leading dot
    /// (`j .skip` or `j skip` are equivalent) — strip it before resolving
    /// the cell so a reference and its definition share one name.
    fn read_label_ref(&mut self) -> Result<Label, AsmError> {
        let name = self.next_word()?;
        let name = name.strip_prefix('.').map(str::to_string).unwrap_or(name);
        Ok(self.label_cell(name))
    }

    fn read_symbol(&mut self) -> Result<String, AsmError> {
        let word = self.next_word()?;
        word.strip_prefix('@').map(str::to_string).ok_or(AsmError::UnknownToken(word))
    }

    fn read_push_literal(&mut self) -> Result<(), AsmError> {
        match self.next() {
            Some(Token::QuotedString(s)) => {
                self.gen.push(crate::value::Value::Str(s.into()));
                Ok(())
            }
            Some(Token::Word(w)) => {
                if let Ok(i) = w.parse::<i64>() {
                    self.gen.push(crate::value::Value::Int(i));
                } else if let Ok(f) = w.parse::<f64>() {
                    self.gen.push(crate::value::Value::Float(f));
                } else {
                    return Err(AsmError::UnknownToken(w));
                }
                Ok(())
            }
            None => Err(AsmError::UnexpectedEof),
        }
    }

    fn convert_instruction(&mut self, op: &str) -> Result<(), AsmError> {
        if op == "." {
            let name = self.next_word()?;
            return self.define_label(name);
        }
        if let Some(name) = op.strip_prefix('.') {
            if !name.is_empty() {
                return self.define_label(name.to_string());
            }
        }
        match op.to_ascii_lowercase().as_str() {
            "j" => {
                let l = self.read_label_ref()?;
                self.gen.j(&l);
            }
            "jt" => {
                let l = self.read_label_ref()?;
                self.gen.jt(&l);
            }
            "jf" => {
                let l = self.read_label_ref()?;
                self.gen.jf(&l);
            }
            "jz" => {
                let l = self.read_label_ref()?;
                self.gen.jz(&l);
            }
            "jnz" => {
                let l = self.read_label_ref()?;
                self.gen.jnz(&l);
            }
            "push" => self.read_push_literal()?,
            "pop" => self.gen.pop(),
            "dup" => self.gen.dup(),
            "swp" => self.gen.swp(),
            "set" => {
                let s = self.read_symbol()?;
                self.gen.set(s);
            }
            "get" => {
                let s = self.read_symbol()?;
                self.gen.get(s);
            }
            "inc" => self.gen.inc(),
            "dec" => self.gen.dec(),
            "add" => self.gen.add(),
            "sub" => self.gen.sub(),
            "mul" => self.gen.mul(),
            "div" => self.gen.div(),
            "mod" => self.gen.modulo(),
            "eq" => self.gen.eq(),
            "ne" => self.gen.ne(),
            "lt" => self.gen.lt(),
            "gt" => self.gen.gt(),
            "le" => self.gen.le(),
            "ge" => self.gen.ge(),
            "and" => self.gen.and(),
            "or" => self.gen.or(),
            "xor" => self.gen.xor(),
            "not" => self.gen.not(),
            "band" => self.gen.band(),
            "bor" => self.gen.bor(),
            "bxor" => self.gen.bxor(),
            "bnot" => self.gen.bnot(),
            "bls" => self.gen.bls(),
            "brs" => self.gen.brs(),
            "bset" => self.gen.bset(),
            "bclr" => self.gen.bclr(),
            "btgl" => self.gen.btgl(),
            "bmtch" => self.gen.bmtch(),
            "call" => self.gen.call(),
            "ret" => self.gen.ret(),
            "func" => {
                let sig = self.next_word()?;
                self.parse_function(&sig)?;
            }
            other => return Err(AsmError::InvalidOpcode(other.to_string())),
        }
        Ok(())
    }

    fn parse_function(&mut self, sig: &str) -> Result<(), AsmError> {
        let signature = parse_signature(sig);
        let end = Label::new();
        self.gen.func(signature, &end);
        loop {
            match self.next() {
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("endfunc") => {
                    self.gen.label(Some(end));
                    return Ok(());
                }
                Some(Token::Word(w)) => self.convert_instruction(&w)?,
                Some(Token::QuotedString(s)) => return Err(AsmError::UnknownToken(s)),
                None => return Err(AsmError::UnexpectedEof),
            }
        }
    }

    fn parse_toplevel(&mut self) -> Result<(), AsmError> {
        loop {
            match self.next() {
                Some(Token::Word(w)) => self.convert_instruction(&w)?,
                Some(Token::QuotedString(s)) => return Err(AsmError::UnknownToken(s)),
                None => return Ok(()),
            }
        }
    }
}

/// Assemble `source` into bytecode. `parse_signature` (see
/// [`crate::codegen`]) backs the `func <sig>` grammar; everything else is
/// driven straight off the [`Generator`].
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut conv = Converter { tokens: tokenize(source), pos: 0, gen: Generator::new(), labels: HashMap::new() };
    conv.parse_toplevel()?;
    conv.gen.generate().map_err(|_| AsmError::UnexpectedEof)
}
