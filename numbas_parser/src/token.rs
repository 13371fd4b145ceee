//! Tokens of the method language.
//!
//! Operator tokens know their spelling ([`TokenKind::symbol`]); layout
//! tokens (`Indent`, `Dedent`, `Newline`, `Eof`) have none and display as a
//! description instead, which is what syntax errors quote.

use crate::ast::BinOp;
use numbas_core::Span;
use std::fmt;

/// A lexed token and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was lexed.
    pub kind: TokenKind,
    /// Byte range in the method source.
    pub span: Span,
}

impl Token {
    /// Pair a kind with its span.
    #[inline]
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// True for the end-of-input marker.
    #[inline]
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

/// Token kinds.
///
/// Only what a method body can contain: no strings, no brackets other than
/// `(` and `[`, no walrus.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Ident(String),
    Keyword(Keyword),

    // arithmetic and bitwise
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LeftShift,
    RightShift,
    Ampersand,
    Pipe,
    Caret,
    Tilde,

    // comparison
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,

    // punctuation; `@` opens a decorator, `->` a return annotation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Dot,
    Semicolon,
    At,
    Arrow,

    // assignment
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    DoubleSlashEqual,
    PercentEqual,
    AmpersandEqual,
    PipeEqual,
    CaretEqual,
    RightShiftEqual,
    LeftShiftEqual,
    DoubleStarEqual,

    // layout
    Indent,
    Dedent,
    Newline,
    Eof,

    /// Lexing failed; carries the message.
    Error(String),
}

impl TokenKind {
    /// True for `< > <= >= == !=`. `is`, `is not` and `not in` are
    /// keywords and handled by the parser.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Greater
                | Self::LessEqual
                | Self::GreaterEqual
                | Self::EqualEqual
                | Self::NotEqual
        )
    }

    /// The operator an augmented assignment token applies: `+=` gives
    /// [`BinOp::Add`].
    #[must_use]
    pub const fn augmented_op(&self) -> Option<BinOp> {
        Some(match self {
            Self::PlusEqual => BinOp::Add,
            Self::MinusEqual => BinOp::Sub,
            Self::StarEqual => BinOp::Mult,
            Self::SlashEqual => BinOp::Div,
            Self::DoubleSlashEqual => BinOp::FloorDiv,
            Self::PercentEqual => BinOp::Mod,
            Self::DoubleStarEqual => BinOp::Pow,
            Self::AmpersandEqual => BinOp::BitAnd,
            Self::PipeEqual => BinOp::BitOr,
            Self::CaretEqual => BinOp::BitXor,
            Self::LeftShiftEqual => BinOp::LShift,
            Self::RightShiftEqual => BinOp::RShift,
            _ => return None,
        })
    }

    /// Source spelling of an operator or punctuation token.
    #[must_use]
    pub const fn symbol(&self) -> Option<&'static str> {
        let s = match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::DoubleStar => "**",
            Self::Slash => "/",
            Self::DoubleSlash => "//",
            Self::Percent => "%",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::Ampersand => "&",
            Self::Pipe => "|",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::EqualEqual => "==",
            Self::NotEqual => "!=",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::LeftBracket => "[",
            Self::RightBracket => "]",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Semicolon => ";",
            Self::At => "@",
            Self::Arrow => "->",
            Self::Equal => "=",
            Self::PlusEqual => "+=",
            Self::MinusEqual => "-=",
            Self::StarEqual => "*=",
            Self::SlashEqual => "/=",
            Self::DoubleSlashEqual => "//=",
            Self::PercentEqual => "%=",
            Self::AmpersandEqual => "&=",
            Self::PipeEqual => "|=",
            Self::CaretEqual => "^=",
            Self::RightShiftEqual => ">>=",
            Self::LeftShiftEqual => "<<=",
            Self::DoubleStarEqual => "**=",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(symbol) = self.symbol() {
            return f.write_str(symbol);
        }
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{:?}", n),
            Self::Ident(name) => f.write_str(name),
            Self::Keyword(kw) => f.write_str(kw.as_str()),
            Self::Indent => f.write_str("indent"),
            Self::Dedent => f.write_str("dedent"),
            Self::Newline => f.write_str("end of line"),
            Self::Eof => f.write_str("end of input"),
            Self::Error(msg) => write!(f, "invalid token ({})", msg),
            _ => Ok(()),
        }
    }
}

/// Reserved words.
///
/// `class`, `lambda` and `yield` are not part of the method language but
/// are still reserved, so using one as a name is a syntax error at the
/// word itself.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    False,
    None,
    True,
    And,
    Break,
    Class,
    Continue,
    Def,
    Elif,
    Else,
    For,
    If,
    In,
    Is,
    Lambda,
    Not,
    Or,
    Pass,
    Return,
    While,
    Yield,
}

const KEYWORDS: [(&str, Keyword); 21] = [
    ("False", Keyword::False),
    ("None", Keyword::None),
    ("True", Keyword::True),
    ("and", Keyword::And),
    ("break", Keyword::Break),
    ("class", Keyword::Class),
    ("continue", Keyword::Continue),
    ("def", Keyword::Def),
    ("elif", Keyword::Elif),
    ("else", Keyword::Else),
    ("for", Keyword::For),
    ("if", Keyword::If),
    ("in", Keyword::In),
    ("is", Keyword::Is),
    ("lambda", Keyword::Lambda),
    ("not", Keyword::Not),
    ("or", Keyword::Or),
    ("pass", Keyword::Pass),
    ("return", Keyword::Return),
    ("while", Keyword::While),
    ("yield", Keyword::Yield),
];

impl Keyword {
    /// The keyword spelled `s`, if any. Case sensitive.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        KEYWORDS.iter().find(|(word, _)| *word == s).map(|&(_, kw)| kw)
    }

    /// Spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == self)
            .map_or("", |&(word, _)| word)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keyword_spells_back() {
        for (word, kw) in KEYWORDS {
            assert_eq!(Keyword::from_str(word), Some(kw));
            assert_eq!(kw.as_str(), word);
        }
        assert_eq!(Keyword::from_str("self"), None);
        assert_eq!(Keyword::from_str("Return"), None);
    }

    #[test]
    fn test_augmented_op() {
        assert_eq!(TokenKind::PlusEqual.augmented_op(), Some(BinOp::Add));
        assert_eq!(TokenKind::DoubleStarEqual.augmented_op(), Some(BinOp::Pow));
        assert_eq!(TokenKind::RightShiftEqual.augmented_op(), Some(BinOp::RShift));
        assert_eq!(TokenKind::Equal.augmented_op(), None);
        assert_eq!(TokenKind::Plus.augmented_op(), None);
    }

    #[test]
    fn test_comparison_tokens() {
        assert!(TokenKind::LessEqual.is_comparison());
        assert!(!TokenKind::Equal.is_comparison());
        assert!(!TokenKind::Keyword(Keyword::Is).is_comparison());
    }

    #[test]
    fn test_display() {
        assert_eq!(TokenKind::DoubleSlashEqual.to_string(), "//=");
        assert_eq!(TokenKind::Float(2.0).to_string(), "2.0");
        assert_eq!(TokenKind::Keyword(Keyword::Def).to_string(), "def");
        assert_eq!(TokenKind::Newline.to_string(), "end of line");
        assert!(TokenKind::Indent.symbol().is_none());
    }
}
