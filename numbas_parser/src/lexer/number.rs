//! Numeric literal lexing.
//!
//! Supported forms:
//! - Decimal integers: `42`, `1_000_000`
//! - Prefixed integers: `0xFF`, `0o755`, `0b1010`
//! - Floats: `3.14`, `.5`, `1e10`, `2.5e-3`
//!
//! Integers that do not fit in `i64` are rejected; the runtime has no
//! arbitrary-precision integers.

use super::cursor::Cursor;
use crate::token::TokenKind;

/// Lex a number whose first character (at byte `start`) was already consumed.
pub fn lex_number(cursor: &mut Cursor<'_>, first_char: char, start: usize) -> TokenKind {
    if first_char == '0' {
        let radix = match cursor.first() {
            'x' | 'X' => Some(16),
            'o' | 'O' => Some(8),
            'b' | 'B' => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            cursor.bump();
            return lex_radix(cursor, radix);
        }
    }
    lex_decimal(cursor, first_char, start)
}

fn lex_radix(cursor: &mut Cursor<'_>, radix: u32) -> TokenKind {
    let start = cursor.pos();
    cursor.eat_while(|c| c == '_' || c.is_digit(radix));
    let digits: String = cursor
        .slice_from(start)
        .chars()
        .filter(|c| *c != '_')
        .collect();

    if digits.is_empty() {
        return TokenKind::Error(format!("invalid base-{} literal", radix));
    }
    match i64::from_str_radix(&digits, radix) {
        Ok(n) => TokenKind::Int(n),
        Err(_) => TokenKind::Error("integer literal too large".to_string()),
    }
}

fn lex_decimal(cursor: &mut Cursor<'_>, first_char: char, start: usize) -> TokenKind {
    let mut is_float = first_char == '.';
    eat_digits(cursor);

    if !is_float && cursor.first() == '.' && cursor.second() != '.' {
        is_float = true;
        cursor.bump();
        eat_digits(cursor);
    }

    if matches!(cursor.first(), 'e' | 'E') {
        let sign = cursor.second();
        let has_sign = sign == '+' || sign == '-';
        cursor.bump();
        if has_sign {
            cursor.bump();
        }
        if !cursor.first().is_ascii_digit() {
            return TokenKind::Error("invalid float exponent".to_string());
        }
        eat_digits(cursor);
        is_float = true;
    }

    let text: String = cursor
        .slice_from(start)
        .chars()
        .filter(|c| *c != '_')
        .collect();

    if is_float {
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Float(n),
            Err(_) => TokenKind::Error("invalid float literal".to_string()),
        }
    } else {
        match text.parse::<i64>() {
            Ok(n) => TokenKind::Int(n),
            Err(_) => TokenKind::Error("integer literal too large".to_string()),
        }
    }
}

fn eat_digits(cursor: &mut Cursor<'_>) {
    cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
}

/// Check if `c` (followed by `next`) starts a number.
#[inline]
#[must_use]
pub fn is_number_start(c: char, next: char) -> bool {
    c.is_ascii_digit() || (c == '.' && next.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> TokenKind {
        let mut cursor = Cursor::new(s);
        let first = cursor.bump().unwrap();
        lex_number(&mut cursor, first, 0)
    }

    #[test]
    fn test_decimal_int() {
        assert_eq!(lex("42"), TokenKind::Int(42));
        assert_eq!(lex("1_000"), TokenKind::Int(1000));
    }

    #[test]
    fn test_prefixed_ints() {
        assert_eq!(lex("0xff"), TokenKind::Int(255));
        assert_eq!(lex("0o17"), TokenKind::Int(15));
        assert_eq!(lex("0b1010"), TokenKind::Int(10));
        assert!(matches!(lex("0x"), TokenKind::Error(_)));
    }

    #[test]
    fn test_floats() {
        assert_eq!(lex("3.5"), TokenKind::Float(3.5));
        assert_eq!(lex(".5"), TokenKind::Float(0.5));
        assert_eq!(lex("1e3"), TokenKind::Float(1000.0));
        assert_eq!(lex("2.5e-1"), TokenKind::Float(0.25));
        assert_eq!(lex("1."), TokenKind::Float(1.0));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(lex("99999999999999999999"), TokenKind::Error(_)));
    }

    #[test]
    fn test_bad_exponent() {
        assert!(matches!(lex("1e+"), TokenKind::Error(_)));
    }

    #[test]
    fn test_is_number_start() {
        assert!(is_number_start('7', ' '));
        assert!(is_number_start('.', '5'));
        assert!(!is_number_start('.', 'x'));
    }
}
