// ----------------------------
// File: src/front/parser/grammar.rs
// ----------------------------
//! Declarative grammar and the generated LL(1) parsing table.
//!
//! Productions are data; the table is computed from them via FIRST/FOLLOW
//! sets. Conflicts resolve in list order (the earlier production wins),
//! which pins the boolean-literal productions of `BoolPrimary` ahead of
//! the general expression production. A final pass removes
//! `break`/`continue` from the top-level rows so loop control outside a
//! loop stays a syntax error.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::front::codegen::Action;
use crate::front::token::TokenKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NonTerm {
    Program,
    DeclList,
    Decl,
    FuncDecl,
    ParamList,
    ParamTail,
    Param,
    Type,
    StmtList,
    Stmt,
    VarDecl,
    Assign,
    AssignSuffix,
    IfStmt,
    ElsePart,
    WhileStmt,
    ContinueStmt,
    BreakStmt,
    PrintStmt,
    ReturnStmt,
    ReturnValue,
    Expr,
    ExprTail,
    Term,
    TermTail,
    Factor,
    FactorSuffix,
    ArgList,
    ArgTail,
    Cond,
    OrExpr,
    OrTail,
    AndExpr,
    AndTail,
    NotExpr,
    RelExpr,
    RelTail,
    BoolPrimary,
    RelOp,
}

impl fmt::Display for NonTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use NonTerm::*;
        let s = match self {
            Program => "Program",
            DeclList => "DeclList",
            Decl => "Decl",
            FuncDecl => "FuncDecl",
            ParamList => "ParamList",
            ParamTail => "Param'",
            Param => "Param",
            Type => "Type",
            StmtList => "StmtList",
            Stmt => "Stmt",
            VarDecl => "VarDecl",
            Assign => "Assign",
            AssignSuffix => "AssignSuffix",
            IfStmt => "IfStmt",
            ElsePart => "ElsePart",
            WhileStmt => "WhileStmt",
            ContinueStmt => "ContinueStmt",
            BreakStmt => "BreakStmt",
            PrintStmt => "PrintStmt",
            ReturnStmt => "ReturnStmt",
            ReturnValue => "ReturnValue",
            Expr => "Expr",
            ExprTail => "Expr'",
            Term => "Term",
            TermTail => "Term'",
            Factor => "Factor",
            FactorSuffix => "FactorSuffix",
            ArgList => "ArgList",
            ArgTail => "ArgList'",
            Cond => "Cond",
            OrExpr => "OrExpr",
            OrTail => "OrExpr'",
            AndExpr => "AndExpr",
            AndTail => "AndExpr'",
            NotExpr => "NotExpr",
            RelExpr => "RelExpr",
            RelTail => "RelExpr'",
            BoolPrimary => "BoolPrimary",
            RelOp => "RelOp",
        };
        f.write_str(s)
    }
}

/// A grammar symbol: terminal, nonterminal, or semantic action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    T(TokenKind),
    N(NonTerm),
    A(Action),
}

pub struct Production {
    pub lhs: NonTerm,
    pub rhs: &'static [Symbol],
}

use Action as Ac;
use NonTerm as NT;
use Symbol::{A, N, T};
use TokenKind as K;

pub static GRAMMAR: &[Production] = &[
    // Top level
    Production { lhs: NT::Program, rhs: &[N(NT::DeclList)] },
    Production { lhs: NT::DeclList, rhs: &[N(NT::Decl), N(NT::DeclList)] },
    Production { lhs: NT::DeclList, rhs: &[] },
    Production { lhs: NT::Decl, rhs: &[N(NT::FuncDecl)] },
    Production { lhs: NT::Decl, rhs: &[N(NT::Stmt)] },
    // Functions
    Production {
        lhs: NT::FuncDecl,
        rhs: &[
            T(K::Func), T(K::Ident), A(Ac::FuncStart), T(K::LParen), N(NT::ParamList),
            T(K::RParen), T(K::Colon), N(NT::Type), A(Ac::FuncReturnType),
            T(K::LBrace), N(NT::StmtList), T(K::RBrace), A(Ac::FuncEnd),
        ],
    },
    Production { lhs: NT::ParamList, rhs: &[N(NT::Param), N(NT::ParamTail)] },
    Production { lhs: NT::ParamList, rhs: &[] },
    Production { lhs: NT::ParamTail, rhs: &[T(K::Comma), N(NT::Param), N(NT::ParamTail)] },
    Production { lhs: NT::ParamTail, rhs: &[] },
    Production {
        lhs: NT::Param,
        rhs: &[T(K::Ident), A(Ac::CaptureParamName), T(K::Colon), N(NT::Type), A(Ac::CaptureType), A(Ac::Param)],
    },
    Production { lhs: NT::Type, rhs: &[T(K::Int)] },
    Production { lhs: NT::Type, rhs: &[T(K::Float)] },
    Production { lhs: NT::Type, rhs: &[T(K::Bool)] },
    // Statements
    Production { lhs: NT::StmtList, rhs: &[N(NT::Stmt), N(NT::StmtList)] },
    Production { lhs: NT::StmtList, rhs: &[] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::VarDecl)] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::Assign)] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::IfStmt)] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::WhileStmt)] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::PrintStmt)] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::ReturnStmt)] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::ContinueStmt)] },
    Production { lhs: NT::Stmt, rhs: &[N(NT::BreakStmt)] },
    Production {
        lhs: NT::VarDecl,
        rhs: &[
            T(K::Let), T(K::Ident), A(Ac::CaptureDeclVar), T(K::Colon), N(NT::Type),
            A(Ac::CaptureType), T(K::Assign), N(NT::Expr), T(K::Semicolon), A(Ac::Define),
        ],
    },
    Production {
        lhs: NT::Assign,
        rhs: &[T(K::Ident), A(Ac::CaptureAssignTarget), N(NT::AssignSuffix), T(K::Semicolon)],
    },
    Production { lhs: NT::AssignSuffix, rhs: &[T(K::Assign), N(NT::Expr), A(Ac::Assign)] },
    Production { lhs: NT::AssignSuffix, rhs: &[T(K::LParen), N(NT::ArgList), T(K::RParen), A(Ac::Call)] },
    Production {
        lhs: NT::IfStmt,
        rhs: &[
            T(K::If), T(K::LParen), N(NT::Cond), T(K::RParen), A(Ac::Save),
            T(K::LBrace), N(NT::StmtList), T(K::RBrace), N(NT::ElsePart),
        ],
    },
    Production {
        lhs: NT::ElsePart,
        rhs: &[A(Ac::Jmpf), A(Ac::Save), T(K::Else), T(K::LBrace), N(NT::StmtList), T(K::RBrace), A(Ac::Jmp)],
    },
    Production { lhs: NT::ElsePart, rhs: &[A(Ac::JmpfNormal)] },
    Production {
        lhs: NT::WhileStmt,
        rhs: &[
            T(K::While), A(Ac::LabelWhile), T(K::LParen), N(NT::Cond), T(K::RParen), A(Ac::Save),
            T(K::LBrace), N(NT::StmtList), T(K::RBrace), A(Ac::JmpfBreak), A(Ac::JmpNonBackpatch),
        ],
    },
    Production { lhs: NT::ContinueStmt, rhs: &[T(K::Continue), T(K::Semicolon), A(Ac::Continue)] },
    Production { lhs: NT::BreakStmt, rhs: &[T(K::Break), T(K::Semicolon), A(Ac::SaveBreak)] },
    Production {
        lhs: NT::PrintStmt,
        rhs: &[T(K::Print), T(K::LParen), T(K::Ident), A(Ac::Load), T(K::RParen), T(K::Semicolon), A(Ac::Print)],
    },
    Production { lhs: NT::ReturnStmt, rhs: &[T(K::Return), N(NT::ReturnValue), T(K::Semicolon), A(Ac::Return)] },
    Production { lhs: NT::ReturnValue, rhs: &[N(NT::Expr)] },
    Production { lhs: NT::ReturnValue, rhs: &[] },
    // Arithmetic expressions
    Production { lhs: NT::Expr, rhs: &[N(NT::Term), N(NT::ExprTail)] },
    Production { lhs: NT::ExprTail, rhs: &[T(K::Plus), N(NT::Term), N(NT::ExprTail), A(Ac::Add)] },
    Production { lhs: NT::ExprTail, rhs: &[T(K::Minus), N(NT::Term), N(NT::ExprTail), A(Ac::Sub)] },
    Production { lhs: NT::ExprTail, rhs: &[] },
    Production { lhs: NT::Term, rhs: &[N(NT::Factor), N(NT::TermTail)] },
    Production { lhs: NT::TermTail, rhs: &[T(K::Star), N(NT::Factor), N(NT::TermTail), A(Ac::Mul)] },
    Production { lhs: NT::TermTail, rhs: &[T(K::Slash), N(NT::Factor), N(NT::TermTail), A(Ac::Div)] },
    Production { lhs: NT::TermTail, rhs: &[T(K::Percent), N(NT::Factor), N(NT::TermTail), A(Ac::Mod)] },
    Production { lhs: NT::TermTail, rhs: &[] },
    Production { lhs: NT::Factor, rhs: &[T(K::Ident), N(NT::FactorSuffix)] },
    Production { lhs: NT::Factor, rhs: &[T(K::Num), A(Ac::Push)] },
    Production { lhs: NT::Factor, rhs: &[T(K::True), A(Ac::Push)] },
    Production { lhs: NT::Factor, rhs: &[T(K::False), A(Ac::Push)] },
    Production { lhs: NT::Factor, rhs: &[T(K::LParen), N(NT::Expr), T(K::RParen)] },
    Production { lhs: NT::FactorSuffix, rhs: &[A(Ac::Load)] },
    Production {
        lhs: NT::FactorSuffix,
        rhs: &[A(Ac::CallStart), T(K::LParen), N(NT::ArgList), T(K::RParen), A(Ac::CallEnd)],
    },
    Production { lhs: NT::ArgList, rhs: &[N(NT::Expr), A(Ac::Arg), N(NT::ArgTail)] },
    Production { lhs: NT::ArgList, rhs: &[] },
    Production { lhs: NT::ArgTail, rhs: &[T(K::Comma), N(NT::Expr), A(Ac::Arg), N(NT::ArgTail)] },
    Production { lhs: NT::ArgTail, rhs: &[] },
    // Conditions
    Production { lhs: NT::Cond, rhs: &[N(NT::OrExpr)] },
    Production { lhs: NT::OrExpr, rhs: &[N(NT::AndExpr), N(NT::OrTail)] },
    Production { lhs: NT::OrTail, rhs: &[T(K::Or), N(NT::AndExpr), N(NT::OrTail), A(Ac::Or)] },
    Production { lhs: NT::OrTail, rhs: &[] },
    Production { lhs: NT::AndExpr, rhs: &[N(NT::NotExpr), N(NT::AndTail)] },
    Production { lhs: NT::AndTail, rhs: &[T(K::And), N(NT::NotExpr), N(NT::AndTail), A(Ac::And)] },
    Production { lhs: NT::AndTail, rhs: &[] },
    Production { lhs: NT::NotExpr, rhs: &[T(K::Not), N(NT::NotExpr), A(Ac::Not)] },
    Production { lhs: NT::NotExpr, rhs: &[N(NT::RelExpr)] },
    Production { lhs: NT::RelExpr, rhs: &[N(NT::BoolPrimary), N(NT::RelTail)] },
    Production { lhs: NT::RelTail, rhs: &[N(NT::RelOp), N(NT::BoolPrimary), A(Ac::Rel)] },
    Production { lhs: NT::RelTail, rhs: &[] },
    Production { lhs: NT::BoolPrimary, rhs: &[T(K::True), A(Ac::Push)] },
    Production { lhs: NT::BoolPrimary, rhs: &[T(K::False), A(Ac::Push)] },
    Production { lhs: NT::BoolPrimary, rhs: &[N(NT::Expr)] },
    Production { lhs: NT::RelOp, rhs: &[T(K::Lt), A(Ac::PushRelop)] },
    Production { lhs: NT::RelOp, rhs: &[T(K::Gt), A(Ac::PushRelop)] },
    Production { lhs: NT::RelOp, rhs: &[T(K::Le), A(Ac::PushRelop)] },
    Production { lhs: NT::RelOp, rhs: &[T(K::Ge), A(Ac::PushRelop)] },
    Production { lhs: NT::RelOp, rhs: &[T(K::Eq), A(Ac::PushRelop)] },
    Production { lhs: NT::RelOp, rhs: &[T(K::Ne), A(Ac::PushRelop)] },
];

/// LL(1) table: (nonterminal, lookahead) -> production.
pub struct ParsingTable {
    map: HashMap<(NonTerm, TokenKind), usize>,
}

impl ParsingTable {
    pub fn new() -> Self {
        let nullable = compute_nullable();
        let first = compute_first(&nullable);
        let follow = compute_follow(&nullable, &first);

        let mut map: HashMap<(NonTerm, TokenKind), usize> = HashMap::new();
        for (idx, prod) in GRAMMAR.iter().enumerate() {
            let (fs, null) = first_of_seq(prod.rhs, &nullable, &first);
            for t in fs {
                map.entry((prod.lhs, t)).or_insert(idx);
            }
            if null {
                if let Some(fl) = follow.get(&prod.lhs) {
                    for &t in fl {
                        map.entry((prod.lhs, t)).or_insert(idx);
                    }
                }
            }
        }

        // loop control is a statement, not a declaration
        for nt in [NonTerm::Program, NonTerm::DeclList, NonTerm::Decl] {
            for k in [TokenKind::Break, TokenKind::Continue] {
                map.remove(&(nt, k));
            }
        }

        Self { map }
    }

    pub fn production(&self, nt: NonTerm, lookahead: TokenKind) -> Option<&'static Production> {
        self.map.get(&(nt, lookahead)).map(|&idx| &GRAMMAR[idx])
    }
}

impl Default for ParsingTable {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_nullable() -> HashSet<NonTerm> {
    let mut nullable = HashSet::new();
    loop {
        let mut changed = false;
        for prod in GRAMMAR {
            if nullable.contains(&prod.lhs) {
                continue;
            }
            let all = prod.rhs.iter().all(|s| match s {
                Symbol::A(_) => true,
                Symbol::T(_) => false,
                Symbol::N(n) => nullable.contains(n),
            });
            if all {
                nullable.insert(prod.lhs);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    nullable
}

fn compute_first(nullable: &HashSet<NonTerm>) -> HashMap<NonTerm, HashSet<TokenKind>> {
    let mut first: HashMap<NonTerm, HashSet<TokenKind>> = HashMap::new();
    loop {
        let mut changed = false;
        for prod in GRAMMAR {
            let (fs, _) = first_of_seq(prod.rhs, nullable, &first);
            let entry = first.entry(prod.lhs).or_default();
            for t in fs {
                changed |= entry.insert(t);
            }
        }
        if !changed {
            break;
        }
    }
    first
}

fn compute_follow(
    nullable: &HashSet<NonTerm>,
    first: &HashMap<NonTerm, HashSet<TokenKind>>,
) -> HashMap<NonTerm, HashSet<TokenKind>> {
    let mut follow: HashMap<NonTerm, HashSet<TokenKind>> = HashMap::new();
    follow.entry(NonTerm::Program).or_default().insert(TokenKind::Eof);
    loop {
        let mut changed = false;
        for prod in GRAMMAR {
            for (i, sym) in prod.rhs.iter().enumerate() {
                let Symbol::N(b) = sym else { continue };
                let (trailer, null) = first_of_seq(&prod.rhs[i + 1..], nullable, first);
                let lhs_follow: Vec<TokenKind> = if null {
                    follow.get(&prod.lhs).map(|s| s.iter().copied().collect()).unwrap_or_default()
                } else {
                    Vec::new()
                };
                let entry = follow.entry(*b).or_default();
                for t in trailer {
                    changed |= entry.insert(t);
                }
                for t in lhs_follow {
                    changed |= entry.insert(t);
                }
            }
        }
        if !changed {
            break;
        }
    }
    follow
}

// FIRST of a symbol sequence; actions are transparent. The boolean is
// true when the whole sequence can derive nothing.
fn first_of_seq(
    rhs: &[Symbol],
    nullable: &HashSet<NonTerm>,
    first: &HashMap<NonTerm, HashSet<TokenKind>>,
) -> (HashSet<TokenKind>, bool) {
    let mut out = HashSet::new();
    for sym in rhs {
        match sym {
            Symbol::A(_) => continue,
            Symbol::T(k) => {
                out.insert(*k);
                return (out, false);
            }
            Symbol::N(n) => {
                if let Some(fs) = first.get(n) {
                    out.extend(fs.iter().copied());
                }
                if !nullable.contains(n) {
                    return (out, false);
                }
            }
        }
    }
    (out, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ParsingTable {
        ParsingTable::new()
    }

    #[test]
    fn else_part_selects_else_production_on_else() {
        let t = table();
        let prod = t.production(NonTerm::ElsePart, TokenKind::Else).expect("entry");
        assert_eq!(prod.rhs.len(), 7);
        assert_eq!(prod.rhs[0], A(Ac::Jmpf));
    }

    #[test]
    fn else_part_is_nullable_on_statement_followers() {
        let t = table();
        for k in [
            TokenKind::Let,
            TokenKind::Ident,
            TokenKind::If,
            TokenKind::While,
            TokenKind::Print,
            TokenKind::Return,
            TokenKind::RBrace,
            TokenKind::Eof,
        ] {
            let prod = t.production(NonTerm::ElsePart, k).expect("entry");
            assert_eq!(prod.rhs, &[A(Ac::JmpfNormal)], "lookahead {k:?}");
        }
    }

    #[test]
    fn expr_tail_row_matches_operator_and_follow_sets() {
        let t = table();
        assert_eq!(t.production(NonTerm::ExprTail, TokenKind::Plus).expect("entry").rhs[0], T(K::Plus));
        assert_eq!(t.production(NonTerm::ExprTail, TokenKind::Minus).expect("entry").rhs[0], T(K::Minus));
        for k in [
            TokenKind::Semicolon,
            TokenKind::RParen,
            TokenKind::Comma,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Le,
            TokenKind::Ge,
            TokenKind::Eq,
            TokenKind::Ne,
        ] {
            let prod = t.production(NonTerm::ExprTail, k).expect("follow entry");
            assert!(prod.rhs.is_empty(), "lookahead {k:?}");
        }
        // nothing else belongs in the row
        assert!(t.production(NonTerm::ExprTail, TokenKind::Ident).is_none());
        assert!(t.production(NonTerm::ExprTail, TokenKind::LBrace).is_none());
    }

    #[test]
    fn bool_primary_prefers_literal_productions() {
        let t = table();
        let prod = t.production(NonTerm::BoolPrimary, TokenKind::True).expect("entry");
        assert_eq!(prod.rhs, &[T(K::True), A(Ac::Push)]);
        let prod = t.production(NonTerm::BoolPrimary, TokenKind::False).expect("entry");
        assert_eq!(prod.rhs, &[T(K::False), A(Ac::Push)]);
        let prod = t.production(NonTerm::BoolPrimary, TokenKind::LParen).expect("entry");
        assert_eq!(prod.rhs, &[N(NT::Expr)]);
        let prod = t.production(NonTerm::BoolPrimary, TokenKind::Ident).expect("entry");
        assert_eq!(prod.rhs, &[N(NT::Expr)]);
    }

    #[test]
    fn factor_suffix_calls_only_on_lparen() {
        let t = table();
        let prod = t.production(NonTerm::FactorSuffix, TokenKind::LParen).expect("entry");
        assert_eq!(prod.rhs[0], A(Ac::CallStart));
        for k in [TokenKind::Star, TokenKind::Plus, TokenKind::Semicolon, TokenKind::RParen, TokenKind::Comma] {
            let prod = t.production(NonTerm::FactorSuffix, k).expect("entry");
            assert_eq!(prod.rhs, &[A(Ac::Load)], "lookahead {k:?}");
        }
    }

    #[test]
    fn loop_control_is_rejected_at_top_level() {
        let t = table();
        for nt in [NonTerm::Program, NonTerm::DeclList, NonTerm::Decl] {
            assert!(t.production(nt, TokenKind::Break).is_none(), "{nt}");
            assert!(t.production(nt, TokenKind::Continue).is_none(), "{nt}");
        }
        // but they stay valid inside statement lists
        assert!(t.production(NonTerm::StmtList, TokenKind::Break).is_some());
        assert!(t.production(NonTerm::Stmt, TokenKind::Continue).is_some());
    }

    #[test]
    fn cond_accepts_not_and_literals() {
        let t = table();
        for k in [
            TokenKind::Not,
            TokenKind::True,
            TokenKind::False,
            TokenKind::Ident,
            TokenKind::Num,
            TokenKind::LParen,
        ] {
            assert!(t.production(NonTerm::Cond, k).is_some(), "lookahead {k:?}");
        }
        assert!(t.production(NonTerm::Cond, TokenKind::RParen).is_none());
    }

    #[test]
    fn type_row_is_exactly_the_type_keywords() {
        let t = table();
        assert!(t.production(NonTerm::Type, TokenKind::Int).is_some());
        assert!(t.production(NonTerm::Type, TokenKind::Float).is_some());
        assert!(t.production(NonTerm::Type, TokenKind::Bool).is_some());
        assert!(t.production(NonTerm::Type, TokenKind::Ident).is_none());
    }
}
