// ----------------------------
// File: src/front/lexer/raw.rs
// ----------------------------
//! Regex-directed token definitions. `logos` resolves longest-match and
//! literal-over-regex priority, which gives us both multi-character
//! operator precedence (`<=` before `<`) and keyword boundaries
//! (`letter` lexes as an identifier, `let` as the keyword).

use logos::Logos;

use crate::front::token::TokenKind;

#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum RawToken {
    #[token("let")]
    Let,
    #[token("func")]
    Func,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("print")]
    Print,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("int")]
    Int,
    #[token("float")]
    Float,
    #[token("bool")]
    Bool,

    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Num,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,
    #[regex(r"[A-Za-z][A-Za-z0-9_]*")]
    Ident,
}

impl RawToken {
    pub fn kind(self) -> TokenKind {
        use RawToken as R;
        use TokenKind as K;
        match self {
            R::Let => K::Let,
            R::Func => K::Func,
            R::Return => K::Return,
            R::If => K::If,
            R::Else => K::Else,
            R::While => K::While,
            R::Break => K::Break,
            R::Continue => K::Continue,
            R::Print => K::Print,
            R::And => K::And,
            R::Or => K::Or,
            R::Not => K::Not,
            R::True => K::True,
            R::False => K::False,
            R::Int => K::Int,
            R::Float => K::Float,
            R::Bool => K::Bool,
            R::Le => K::Le,
            R::Ge => K::Ge,
            R::Eq => K::Eq,
            R::Ne => K::Ne,
            R::Assign => K::Assign,
            R::Plus => K::Plus,
            R::Minus => K::Minus,
            R::Star => K::Star,
            R::Slash => K::Slash,
            R::Percent => K::Percent,
            R::Lt => K::Lt,
            R::Gt => K::Gt,
            R::Semicolon => K::Semicolon,
            R::Comma => K::Comma,
            R::Colon => K::Colon,
            R::LParen => K::LParen,
            R::RParen => K::RParen,
            R::LBrace => K::LBrace,
            R::RBrace => K::RBrace,
            R::LBracket => K::LBracket,
            R::RBracket => K::RBracket,
            R::Num => K::Num,
            R::Str => K::StrLit,
            R::Ident => K::Ident,
        }
    }
}
