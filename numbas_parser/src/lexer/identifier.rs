//! Identifier and keyword lexing.
//!
//! Identifiers follow the Unicode XID rules, so `σ` or `λ_1` are valid
//! parameter names in numeric methods.

use super::cursor::Cursor;
use crate::token::{Keyword, TokenKind};

/// Check if a character can start an identifier.
#[inline]
#[must_use]
pub fn is_id_start(c: char) -> bool {
    if c.is_ascii_alphabetic() || c == '_' {
        return true;
    }
    unicode_xid::UnicodeXID::is_xid_start(c)
}

/// Check if a character can continue an identifier.
#[inline]
#[must_use]
pub fn is_id_continue(c: char) -> bool {
    if c.is_ascii_alphanumeric() || c == '_' {
        return true;
    }
    unicode_xid::UnicodeXID::is_xid_continue(c)
}

/// Lex an identifier or keyword whose first character was already consumed.
pub fn lex_identifier(cursor: &mut Cursor<'_>, first_char: char) -> TokenKind {
    let start = cursor.pos() - first_char.len_utf8();
    cursor.eat_while(is_id_continue);
    let text = cursor.slice_from(start);

    match Keyword::from_str(text) {
        Some(kw) => TokenKind::Keyword(kw),
        None => TokenKind::Ident(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> TokenKind {
        let mut cursor = Cursor::new(s);
        let first = cursor.bump().unwrap();
        lex_identifier(&mut cursor, first)
    }

    #[test]
    fn test_identifier() {
        assert_eq!(lex("self.x"), TokenKind::Ident("self".to_string()));
        assert_eq!(lex("__fn_f"), TokenKind::Ident("__fn_f".to_string()));
    }

    #[test]
    fn test_keyword() {
        assert_eq!(lex("return x"), TokenKind::Keyword(Keyword::Return));
        assert_eq!(lex("None"), TokenKind::Keyword(Keyword::None));
    }

    #[test]
    fn test_unicode_identifier() {
        assert_eq!(lex("σ2"), TokenKind::Ident("σ2".to_string()));
        assert!(!is_id_start('1'));
        assert!(is_id_continue('1'));
    }
}
