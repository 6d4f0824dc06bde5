// ----------------------------
// File: src/front/parser/error.rs
// ----------------------------
//! Non-advancing error handlers. Handlers categorize the mismatch into a
//! message and record it at the current token; the parse stack keeps
//! unwinding. Since the token does not advance, several stack symbols can
//! fail at the same stall point; only the first diagnostic per stall
//! point is recorded.

use crate::front::parser::grammar::NonTerm;
use crate::front::parser::Parser;
use crate::front::token::TokenKind;
use crate::front::Diagnostic;

impl<'a> Parser<'a> {
    pub(super) fn add_error(&mut self, message: String) {
        let pos = self.current.pos;
        if let Some(last) = self.errors.last() {
            if last.pos.offset == pos.offset {
                return;
            }
        }
        self.errors.push(Diagnostic::new(message, pos));
    }

    /// A terminal on the stack does not match the current token.
    pub(super) fn handle_terminal_error(&mut self, expected: TokenKind) {
        // expected `;` while the current token clearly starts the next
        // statement or closes a block
        if expected == TokenKind::Semicolon && self.is_statement_boundary(self.current.kind) {
            self.add_error("Missing semicolon".to_string());
            return;
        }

        // assignment without an identifier, as in `let = 42;`
        if expected == TokenKind::Ident && self.current.kind == TokenKind::Assign {
            self.add_error("Missing identifier".to_string());
            return;
        }

        let msg = self.categorize_terminal(expected);
        self.add_error(msg);
    }

    /// No production exists for the nonterminal and the current token.
    pub(super) fn handle_nonterminal_error(&mut self, expected: NonTerm) {
        // an argument list meeting a statement boundary means the call was
        // never closed
        if expected == NonTerm::ArgList
            && (self.current.kind == TokenKind::Semicolon
                || self.current.kind == TokenKind::RBrace
                || self.is_statement_boundary(self.current.kind))
        {
            self.add_error("Missing closing parenthesis".to_string());
            return;
        }

        if expected == NonTerm::Cond && self.current.kind == TokenKind::RParen {
            self.add_error("Empty condition".to_string());
            return;
        }

        if self.is_expression_tail(expected) && self.is_statement_boundary(self.current.kind) {
            self.add_error("Missing semicolon".to_string());
            return;
        }

        let msg = self.categorize_nonterminal(expected);
        self.add_error(msg);
    }

    fn categorize_terminal(&self, expected: TokenKind) -> String {
        let current = self.current.kind;
        match expected {
            TokenKind::RParen => return "Missing closing parenthesis".to_string(),
            TokenKind::RBrace => return "Missing closing brace".to_string(),
            TokenKind::LBrace => return "Missing opening brace".to_string(),
            TokenKind::Semicolon => return "Missing semicolon".to_string(),
            TokenKind::Assign => return "Missing assignment operator".to_string(),
            TokenKind::LParen => {
                if current == TokenKind::LBrace {
                    return "Wrong bracket type - expected parenthesis".to_string();
                }
                return "Missing opening parenthesis".to_string();
            }
            TokenKind::Ident => {
                if current == TokenKind::Assign || current == TokenKind::Semicolon {
                    return "Missing identifier".to_string();
                }
                if current.is_keyword() {
                    return "Cannot use reserved keyword as identifier".to_string();
                }
                return "Expected identifier".to_string();
            }
            TokenKind::Num => return "Expected number".to_string(),
            TokenKind::StrLit => {
                if current == TokenKind::Ident {
                    return "Missing quotes around string".to_string();
                }
                return "Expected string".to_string();
            }
            _ => {}
        }
        "Syntax error".to_string()
    }

    fn categorize_nonterminal(&self, expected: NonTerm) -> String {
        let current = self.current.kind;
        if matches!(expected, NonTerm::Expr | NonTerm::Term | NonTerm::Factor)
            && (current == TokenKind::Semicolon || current == TokenKind::RParen)
        {
            return "Missing expression".to_string();
        }
        if expected == NonTerm::Cond && current == TokenKind::RParen {
            return "Empty condition".to_string();
        }
        "Syntax error".to_string()
    }

    fn is_expression_tail(&self, sym: NonTerm) -> bool {
        matches!(
            sym,
            NonTerm::Expr
                | NonTerm::ExprTail
                | NonTerm::Term
                | NonTerm::TermTail
                | NonTerm::Factor
                | NonTerm::FactorSuffix
        )
    }

    fn is_statement_boundary(&self, kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Let
                | TokenKind::Ident
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return
                | TokenKind::Continue
                | TokenKind::Break
                | TokenKind::Else
                | TokenKind::RBrace
                | TokenKind::Eof
        )
    }
}
