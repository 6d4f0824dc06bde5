// ----------------------------
// File: src/front/lexer/mod.rs
// ----------------------------
//! Tokenizer: a thin stateful wrapper over the `logos` token stream that
//! adds line/column tracking, one-token lookahead, and the previous-token
//! context needed to fold unary minus into numeric literals.

mod raw;

pub use raw::RawToken;

use std::ops::Range;

use logos::Logos;

use crate::front::token::{Position, Token, TokenKind};

pub struct Lexer<'a> {
    src: &'a str,
    inner: logos::Lexer<'a, RawToken>,
    // raw token pulled for lookahead but not yet emitted
    pending: Option<(Result<RawToken, ()>, Range<usize>)>,
    peeked: Option<Token>,
    // kind of the last emitted token; Eof at start of input
    prev: TokenKind,
    line: u32,
    col: u32,
    cursor: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            inner: RawToken::lexer(src),
            pending: None,
            peeked: None,
            prev: TokenKind::Eof,
            line: 1,
            col: 1,
            cursor: 0,
        }
    }

    /// Produce the next token. Once the input is exhausted every call
    /// returns an `Eof` token at the end position.
    pub fn next_token(&mut self) -> Token {
        let tok = match self.peeked.take() {
            Some(t) => t,
            None => self.scan(),
        };
        self.prev = tok.kind;
        tok
    }

    /// Return the next token without consuming it. Position and
    /// previous-token state are unaffected until `next_token`.
    pub fn peek(&mut self) -> &Token {
        if self.peeked.is_none() {
            let t = self.scan();
            self.peeked = Some(t);
        }
        self.peeked.as_ref().expect("just filled")
    }

    pub fn has_more(&self) -> bool {
        self.peeked.is_some() || self.pending.is_some() || self.cursor < self.src.len()
    }

    fn scan(&mut self) -> Token {
        let Some((res, span)) = self.pull() else {
            let pos = self.pos_at(self.src.len());
            return Token::eof(pos);
        };

        match res {
            Err(()) => {
                let pos = self.pos_at(span.start);
                let ch = &self.src[span.clone()];
                Token::new(TokenKind::Illegal, ch, "", pos)
            }
            Ok(RawToken::Minus) if allows_unary(self.prev) => {
                let pos = self.pos_at(span.start);
                // fold `-` into the literal only when a number follows with
                // no intervening characters
                match self.pull() {
                    Some((Ok(RawToken::Num), nspan)) if nspan.start == span.end => {
                        let lexeme = &self.src[span.start..nspan.end];
                        Token::new(TokenKind::Num, lexeme, lexeme, pos)
                    }
                    other => {
                        self.pending = other;
                        Token::new(TokenKind::Minus, "-", "-", pos)
                    }
                }
            }
            Ok(raw) => {
                let pos = self.pos_at(span.start);
                let lexeme = &self.src[span.clone()];
                let kind = raw.kind();
                let literal = match kind {
                    TokenKind::StrLit => lexeme[1..lexeme.len() - 1].to_string(),
                    TokenKind::True => "true".to_string(),
                    TokenKind::False => "false".to_string(),
                    _ => lexeme.to_string(),
                };
                Token::new(kind, lexeme, literal, pos)
            }
        }
    }

    fn pull(&mut self) -> Option<(Result<RawToken, ()>, Range<usize>)> {
        if let Some(p) = self.pending.take() {
            return Some(p);
        }
        let res = self.inner.next()?;
        Some((res, self.inner.span()))
    }

    // advance the line/column cursor to `offset` and return the position
    // there; tokens are emitted in span order so this never runs backwards
    fn pos_at(&mut self, offset: usize) -> Position {
        let bytes = self.src.as_bytes();
        while self.cursor < offset {
            if bytes[self.cursor] == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.cursor += 1;
        }
        Position::new(self.line, self.col, offset)
    }
}

/// Token kinds after which a `-` starts a numeric literal rather than a
/// subtraction: start of input, assignment, opening delimiters, and the
/// arithmetic/relational/logical operators and expression keywords.
fn allows_unary(prev: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        prev,
        Eof | Assign | LParen | Comma | Colon | Semicolon | LBrace
            | Plus | Minus | Star | Slash | Percent
            | Lt | Gt | Le | Ge | Eq | Ne
            | And | Or | Not | Return | If | While | Print
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lx = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lx.next_token();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    fn lexemes(src: &str) -> Vec<String> {
        let mut lx = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lx.next_token();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t.lexeme);
        }
        out
    }

    #[test]
    fn number_forms() {
        for src in [
            "42", "0", "3.14", "0.5", "123.456", "1e5", "1e+5", "1e-5",
            "2.5e10", "3.14e-2", "1.23e+10", "1E5", "1E+5", "1E-5",
            "2.5E10", "3.14E-2", "1.23E+10", "0.0", "0e0", "1000000", "1e6",
        ] {
            let mut lx = Lexer::new(src);
            let t = lx.next_token();
            assert_eq!(t.kind, TokenKind::Num, "input {src}");
            assert_eq!(t.lexeme, src, "input {src}");
            assert_eq!(lx.next_token().kind, TokenKind::Eof);
        }
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(kinds("let"), vec![TokenKind::Let]);
        assert_eq!(kinds("letter"), vec![TokenKind::Ident]);
        assert_eq!(kinds("x1_y"), vec![TokenKind::Ident]);
        assert_eq!(
            kinds("func if else while break continue print return"),
            vec![
                TokenKind::Func,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Break,
                TokenKind::Continue,
                TokenKind::Print,
                TokenKind::Return,
            ]
        );
    }

    #[test]
    fn multi_char_operators_win() {
        assert_eq!(
            kinds("<= >= == != < > ="),
            vec![
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Assign,
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_elided() {
        let src = "let x // trailing comment\n// whole line\n= 1;";
        assert_eq!(
            kinds(src),
            vec![TokenKind::Let, TokenKind::Ident, TokenKind::Assign, TokenKind::Num, TokenKind::Semicolon]
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let mut lx = Lexer::new("let x\n  = 1;");
        let t = lx.next_token();
        assert_eq!((t.pos.line, t.pos.col, t.pos.offset), (1, 1, 0));
        let t = lx.next_token();
        assert_eq!((t.pos.line, t.pos.col, t.pos.offset), (1, 5, 4));
        let t = lx.next_token();
        assert_eq!((t.pos.line, t.pos.col, t.pos.offset), (2, 3, 8));
    }

    #[test]
    fn unary_minus_in_literal_contexts() {
        // after `=`: one Num token
        assert_eq!(lexemes("x = -42;"), vec!["x", "=", "-42", ";"]);
        // after `(` and `,`
        assert_eq!(lexemes("f(-1, -2)"), vec!["f", "(", "-1", ",", "-2", ")"]);
        // after `return`
        assert_eq!(lexemes("return -3;"), vec!["return", "-3", ";"]);
        // after a relational operator
        assert_eq!(lexemes("x < -9"), vec!["x", "<", "-9"]);
    }

    #[test]
    fn binary_minus_stays_an_operator() {
        let mut lx = Lexer::new("a - 5");
        assert_eq!(lx.next_token().kind, TokenKind::Ident);
        assert_eq!(lx.next_token().kind, TokenKind::Minus);
        assert_eq!(lx.next_token().kind, TokenKind::Num);

        let mut lx = Lexer::new("1 - 2");
        assert_eq!(lx.next_token().kind, TokenKind::Num);
        assert_eq!(lx.next_token().kind, TokenKind::Minus);
        assert_eq!(lx.next_token().lexeme, "2");
    }

    #[test]
    fn spaced_minus_is_not_folded() {
        // `-` must be immediately followed by the number
        assert_eq!(lexemes("x = - 42;"), vec!["x", "=", "-", "42", ";"]);
    }

    #[test]
    fn string_literal_strips_quotes() {
        let mut lx = Lexer::new(r#""hello \"world\"""#);
        let t = lx.next_token();
        assert_eq!(t.kind, TokenKind::StrLit);
        assert_eq!(t.literal, r#"hello \"world\""#);
    }

    #[test]
    fn illegal_character_is_reported_not_fatal() {
        let mut lx = Lexer::new("let ? x");
        assert_eq!(lx.next_token().kind, TokenKind::Let);
        let t = lx.next_token();
        assert_eq!(t.kind, TokenKind::Illegal);
        assert_eq!(t.lexeme, "?");
        assert_eq!(lx.next_token().kind, TokenKind::Ident);
    }

    #[test]
    fn peek_does_not_consume_or_disturb_state() {
        let mut lx = Lexer::new("x = -1;");
        assert_eq!(lx.peek().kind, TokenKind::Ident);
        assert_eq!(lx.next_token().kind, TokenKind::Ident);
        assert_eq!(lx.next_token().kind, TokenKind::Assign);
        // peek after `=` must see the folded literal, and so must next
        assert_eq!(lx.peek().lexeme, "-1");
        assert_eq!(lx.next_token().lexeme, "-1");
    }

    #[test]
    fn eof_repeats() {
        let mut lx = Lexer::new("");
        assert_eq!(lx.next_token().kind, TokenKind::Eof);
        assert_eq!(lx.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn lexemes_reproduce_input_modulo_whitespace() {
        let src = "let x : int = 42; // comment\nprint(x);";
        let joined = lexemes(src).concat();
        let stripped: String = "let x : int = 42;\nprint(x);"
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        assert_eq!(joined, stripped);
    }
}
