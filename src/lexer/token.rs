// Foxscream Token Definitions

use crate::error::Span;
use std::fmt;

/// All token types in Foxscream
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    String(String),

    // Identifiers
    Identifier(String),

    // Keywords
    Fn,
    Class,
    Static,
    Trait,
    Of,
    Has,
    Is,
    In,
    Not,
    AndKw,
    OrKw,
    If,
    Elif,
    Else,
    While,
    Do,
    For,
    Match,
    Case,
    Return,
    Break,
    Continue,
    Leave,
    Defer,
    Label,

    // Arithmetic
    Plus,        // +
    Minus,       // -
    Star,        // *
    StarStar,    // **
    Slash,       // /
    SlashSlash,  // //
    Percent,     // %

    // Comparison
    Equal,        // =
    EqualEqual,   // ==
    Bang,         // !
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Logical
    And, // &&
    Or,  // ||

    // Compound assignment
    PlusEqual,       // +=
    MinusEqual,      // -=
    StarEqual,       // *=
    SlashEqual,      // /=
    SlashSlashEqual, // //=
    PercentEqual,    // %=

    // Bitwise
    Ampersand,      // &
    Pipe,           // |
    Caret,          // ^
    Tilde,          // ~
    LessLess,       // <<
    GreaterGreater, // >>

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]
    Comma,        // ,
    Dot,          // .
    Semicolon,    // ;
    Colon,        // :
    ThinArrow,    // ->
    Arrow,        // =>

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::Eof => write!(f, "EOF"),
            other => match other.keyword_text().or_else(|| other.symbol_text()) {
                Some(text) => write!(f, "{}", text),
                None => write!(f, "{:?}", other),
            },
        }
    }
}

impl TokenKind {
    fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Fn => "fn",
            TokenKind::Class => "class",
            TokenKind::Static => "static",
            TokenKind::Trait => "trait",
            TokenKind::Of => "of",
            TokenKind::Has => "has",
            TokenKind::Is => "is",
            TokenKind::In => "in",
            TokenKind::Not => "not",
            TokenKind::AndKw => "and",
            TokenKind::OrKw => "or",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Match => "match",
            TokenKind::Case => "case",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Leave => "leave",
            TokenKind::Defer => "defer",
            TokenKind::Label => "label",
            _ => return None,
        };
        Some(text)
    }

    fn symbol_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::SlashSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::Bang => "!",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            TokenKind::SlashSlashEqual => "//=",
            TokenKind::PercentEqual => "%=",
            TokenKind::Ampersand => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::LessLess => "<<",
            TokenKind::GreaterGreater => ">>",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::ThinArrow => "->",
            TokenKind::Arrow => "=>",
            _ => return None,
        };
        Some(text)
    }
}

/// A token with its kind and position information
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn is_keyword(&self) -> bool {
        self.kind.keyword_text().is_some()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}
