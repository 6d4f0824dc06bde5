// ----------------------------
// File: src/front/codegen/error.rs
// ----------------------------

use crate::front::codegen::Codegen;
use crate::front::token::{Position, TokenKind};
use crate::front::Diagnostic;

impl Codegen {
    pub(crate) fn add_undefined_variable(&mut self, name: &str, pos: Position) {
        self.push_error(Diagnostic::new(format!("Undefined variable `{name}`"), pos));
    }

    pub(crate) fn add_undefined_function(&mut self, name: &str, pos: Position) {
        self.push_error(Diagnostic::new(format!("Undefined function `{name}`"), pos));
    }

    pub(crate) fn add_type_mismatch(&mut self, expected: TokenKind, found: TokenKind, pos: Position) {
        self.push_error(Diagnostic::new(
            format!("Type mismatch expected `{expected}`, found `{found}`"),
            pos,
        ));
    }

    pub(crate) fn add_redeclaration(&mut self, name: &str, pos: Position) {
        self.push_error(Diagnostic::new(format!("Redeclaration of variable `{name}`"), pos));
    }

    pub(crate) fn add_loop_control_outside_loop(&mut self, what: &str, pos: Position) {
        self.push_error(Diagnostic::new(format!("{what} outside of loop"), pos));
    }
}
