//! Character cursor used by the lexer.

use numbas_core::Span;

/// Returned by lookahead past the end of input.
pub const EOF_CHAR: char = '\0';

/// A cursor over source text with byte-position tracking and lookahead.
#[derive(Debug, Clone)]
pub struct Cursor<'src> {
    source: &'src str,
    chars: std::str::Chars<'src>,
    pos: usize,
}

impl<'src> Cursor<'src> {
    /// Create a cursor at the start of `source`.
    #[inline]
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.chars(),
            pos: 0,
        }
    }

    /// Current byte offset.
    #[inline]
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Check if all input was consumed.
    #[inline]
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Peek at the next character.
    #[inline]
    #[must_use]
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Peek one character past [`first`](Self::first).
    #[inline]
    #[must_use]
    pub fn second(&self) -> char {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next().unwrap_or(EOF_CHAR)
    }

    /// Consume one character.
    #[inline]
    pub fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume characters while `predicate` holds.
    #[inline]
    pub fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while !self.is_eof() && predicate(self.first()) {
            self.bump();
        }
    }

    /// Consume `c` if it is next.
    #[inline]
    pub fn eat(&mut self, c: char) -> bool {
        if self.first() == c {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Source text from `start` to the current position.
    #[inline]
    #[must_use]
    pub fn slice_from(&self, start: usize) -> &'src str {
        &self.source[start..self.pos]
    }

    /// Span from `start` to the current position.
    #[inline]
    #[must_use]
    pub fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_empty() {
        let cursor = Cursor::new("");
        assert!(cursor.is_eof());
        assert_eq!(cursor.first(), EOF_CHAR);
    }

    #[test]
    fn test_cursor_lookahead() {
        let cursor = Cursor::new("ab");
        assert_eq!(cursor.first(), 'a');
        assert_eq!(cursor.second(), 'b');
    }

    #[test]
    fn test_cursor_bump_tracks_bytes() {
        let mut cursor = Cursor::new("αx");
        assert_eq!(cursor.bump(), Some('α'));
        assert_eq!(cursor.pos(), 2);
        assert_eq!(cursor.bump(), Some('x'));
        assert_eq!(cursor.bump(), None);
    }

    #[test]
    fn test_cursor_eat_while_and_slice() {
        let mut cursor = Cursor::new("self.x");
        cursor.eat_while(|c| c != '.');
        assert_eq!(cursor.slice_from(0), "self");
        assert!(cursor.eat('.'));
        assert_eq!(cursor.span_from(0), Span::new(0, 5));
    }
}
