// ----------------------------
// File: src/front/parser/mod.rs
// ----------------------------
//! Predictive LL(1) driver. The parse stack holds grammar symbols; action
//! symbols fire the code generator, terminals consume input, nonterminals
//! expand through the parsing table. Error handling is non-advancing: a
//! mismatch records a diagnostic and parsing continues with the remaining
//! stack, so one mistake may cascade (the driver surfaces only the first).

pub mod grammar;

mod error;

use crate::front::codegen::{Codegen, Instruction};
use crate::front::lexer::Lexer;
use crate::front::token::{Token, TokenKind};
use crate::front::Diagnostic;

use grammar::{NonTerm, ParsingTable, Symbol};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    table: ParsingTable,
    stack: Vec<Symbol>,
    cg: Codegen,
    current: Token,
    errors: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut lexer = Lexer::new(src);
        let current = lexer.next_token();
        Self {
            lexer,
            table: ParsingTable::new(),
            // end marker at the bottom, start symbol on top
            stack: vec![Symbol::T(TokenKind::Eof), Symbol::N(NonTerm::Program)],
            cg: Codegen::new(),
            current,
            errors: Vec::new(),
        }
    }

    pub fn parse(&mut self) {
        while self.stack.len() > 1 {
            let top = match self.stack.pop() {
                Some(sym) => sym,
                None => break,
            };

            match top {
                Symbol::A(action) => self.cg.execute(action),
                Symbol::T(expected) => {
                    if expected == self.current.kind {
                        // the code generator sees the matched token, so
                        // following actions read the right lexeme
                        self.cg.set_current_token(self.current.clone());
                        self.advance();
                    } else {
                        self.handle_terminal_error(expected);
                    }
                }
                Symbol::N(nt) => match self.table.production(nt, self.current.kind) {
                    Some(prod) => {
                        for sym in prod.rhs.iter().rev() {
                            self.stack.push(*sym);
                        }
                    }
                    None => self.handle_nonterminal_error(nt),
                },
            }
        }

        if self.current.kind != TokenKind::Eof {
            let kind = self.current.kind;
            self.add_error(format!("Unexpected token '{kind}' at end of input"));
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    /// The emitted program plus the conventional trailing `nop`.
    pub fn ir_code(&self) -> Vec<Instruction> {
        let mut pb = self.cg.program().to_vec();
        pb.push(Instruction::nop());
        pb
    }

    pub fn syntax_errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn semantic_errors(&self) -> &[Diagnostic] {
        self.cg.errors()
    }

    pub fn codegen(&self) -> &Codegen {
        &self.cg
    }
}
