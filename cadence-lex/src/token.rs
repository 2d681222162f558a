#![forbid(unsafe_code)]

use cadence_ast::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A newline separates this token from the previous one.
    pub line_break_before: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwLet,
    KwVar,
    KwFun,
    KwReturn,
    KwIf,
    KwElse,
    KwWhile,
    KwBreak,
    KwContinue,
    KwTrue,
    KwFalse,
    KwNil,
    KwCreate,
    KwDestroy,
    KwEmit,
    KwImport,
    KwFrom,
    KwResource,
    KwStruct,
    KwContract,
    KwInterface,
    KwEvent,
    KwTransaction,
    KwPrepare,
    KwExecute,
    KwInit,
    KwPub,
    KwPriv,
    KwAccess,

    // Operators / punctuation
    LeftArrow,
    Swap,
    Colon,
    Eq,
    EqEq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    AndAnd,
    OrOr,
    Bang,
    Question,
    QuestionQuestion,
    Dot,
    Comma,
    Semicolon,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,

    // Literals / identifiers
    Ident(String),
    Int(u128),
    String(String),
}

impl TokenKind {
    /// Keywords that may still be used as identifiers in member and label position.
    pub fn soft_keyword(&self) -> Option<&'static str> {
        match self {
            TokenKind::KwFrom => Some("from"),
            TokenKind::KwAccess => Some("access"),
            TokenKind::KwPrepare => Some("prepare"),
            TokenKind::KwExecute => Some("execute"),
            TokenKind::KwContract => Some("contract"),
            _ => None,
        }
    }
}
