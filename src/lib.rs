// ----------------------------
// File: src/lib.rs
// ----------------------------
//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable:
//! - `front::lexer` turns source text into tokens with positions.
//! - `front::parser` drives the LL(1) table and fires semantic actions.
//! - `front::codegen` owns the semantic stack and emits three-address code.
//! - `interp` executes the emitted program.
//! - `back` lowers the program to native assembly for supported targets.

pub mod back;
pub mod color;
pub mod front;
pub mod interp;

use std::collections::HashMap;

pub use front::codegen::{Instruction, Op, Operand};
pub use front::token::TokenKind;
pub use front::Diagnostic;
pub use interp::{Interpreter, RuntimeError, Value};

/// Everything the driver needs after the front end has run: the program
/// block (with the conventional trailing `nop`), the collected
/// diagnostics, and the address type table for backends.
pub struct Compilation {
    pub instructions: Vec<Instruction>,
    pub syntax_errors: Vec<Diagnostic>,
    pub semantic_errors: Vec<Diagnostic>,
    pub types: HashMap<usize, TokenKind>,
}

impl Compilation {
    pub fn is_clean(&self) -> bool {
        self.syntax_errors.is_empty() && self.semantic_errors.is_empty()
    }
}

/// Compile a source string down to three-address code.
pub fn compile(source: &str) -> Compilation {
    let mut parser = front::parser::Parser::new(source);
    parser.parse();
    Compilation {
        instructions: parser.ir_code(),
        syntax_errors: parser.syntax_errors().to_vec(),
        semantic_errors: parser.semantic_errors().to_vec(),
        types: parser.codegen().types().clone(),
    }
}
