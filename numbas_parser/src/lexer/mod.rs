//! Lexer for the method language.
//!
//! Produces a token stream with Python's layout rules applied: logical
//! NEWLINE tokens, INDENT/DEDENT pairs for blocks, and implicit line joining
//! inside parentheses and brackets. Blank and comment-only lines produce no
//! tokens at all.

mod cursor;
mod identifier;
mod indent;
mod number;

pub use cursor::{Cursor, EOF_CHAR};
pub use identifier::{is_id_continue, is_id_start};
pub use indent::{IndentChange, IndentStack};

use crate::token::{Token, TokenKind};
use numbas_core::Span;
use std::collections::VecDeque;

/// Width a tab advances to, as in CPython's tokenizer.
const TAB_WIDTH: usize = 8;

/// Streaming lexer.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    indent: IndentStack,
    pending: VecDeque<Token>,
    at_line_start: bool,
    line_has_content: bool,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Create a lexer over `source`.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            indent: IndentStack::new(),
            pending: VecDeque::new(),
            at_line_start: true,
            line_has_content: false,
            finished: false,
        }
    }

    /// Produce the next token. After the end of input this keeps returning
    /// [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return tok;
            }
            if self.finished {
                let end = self.cursor.pos() as u32;
                return Token::new(TokenKind::Eof, Span::new(end, end));
            }
            if self.at_line_start && !self.indent.in_brackets() {
                self.lex_line_start();
                continue;
            }
            if let Some(tok) = self.lex_token() {
                return tok;
            }
        }
    }

    /// Measure indentation of a new logical line and queue INDENT/DEDENT.
    fn lex_line_start(&mut self) {
        let start = self.cursor.pos();
        let mut width = 0;
        loop {
            match self.cursor.first() {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' | '\r' => {}
                _ => break,
            }
            self.cursor.bump();
        }

        match self.cursor.first() {
            // Blank or comment-only line: no layout tokens.
            '\n' => {
                self.cursor.bump();
                return;
            }
            '#' => {
                self.cursor.eat_while(|c| c != '\n');
                return;
            }
            _ if self.cursor.is_eof() => {
                self.finish();
                return;
            }
            _ => {}
        }

        self.at_line_start = false;
        let span = self.cursor.span_from(start);
        match self.indent.process(width) {
            Ok(IndentChange::Unchanged) => {}
            Ok(IndentChange::Indent) => {
                self.pending.push_back(Token::new(TokenKind::Indent, span));
            }
            Ok(IndentChange::Dedent(n)) => {
                for _ in 0..n {
                    self.pending.push_back(Token::new(TokenKind::Dedent, span));
                }
            }
            Err(msg) => {
                self.pending
                    .push_back(Token::new(TokenKind::Error(msg.to_string()), span));
            }
        }
    }

    /// Queue the closing NEWLINE and DEDENTs.
    fn finish(&mut self) {
        let end = self.cursor.pos() as u32;
        let span = Span::new(end, end);
        if self.line_has_content {
            self.pending.push_back(Token::new(TokenKind::Newline, span));
            self.line_has_content = false;
        }
        for _ in 0..self.indent.close_all() {
            self.pending.push_back(Token::new(TokenKind::Dedent, span));
        }
        self.finished = true;
    }

    /// Lex one token inside a line. Returns `None` when only trivia was
    /// consumed.
    fn lex_token(&mut self) -> Option<Token> {
        self.cursor.eat_while(|c| matches!(c, ' ' | '\t' | '\r' | '\x0c'));
        let start = self.cursor.pos();

        let Some(c) = self.cursor.bump() else {
            self.finish();
            return None;
        };

        let kind = match c {
            '#' => {
                self.cursor.eat_while(|c| c != '\n');
                return None;
            }
            '\n' => {
                if self.indent.in_brackets() {
                    return None;
                }
                self.at_line_start = true;
                self.line_has_content = false;
                return Some(Token::new(TokenKind::Newline, self.cursor.span_from(start)));
            }
            '\\' if self.cursor.first() == '\n' => {
                self.cursor.bump();
                return None;
            }
            c if identifier::is_id_start(c) => identifier::lex_identifier(&mut self.cursor, c),
            c if number::is_number_start(c, self.cursor.first()) => {
                number::lex_number(&mut self.cursor, c, start)
            }
            '(' => {
                self.indent.open_bracket();
                TokenKind::LeftParen
            }
            ')' => {
                self.indent.close_bracket();
                TokenKind::RightParen
            }
            '[' => {
                self.indent.open_bracket();
                TokenKind::LeftBracket
            }
            ']' => {
                self.indent.close_bracket();
                TokenKind::RightBracket
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '~' => TokenKind::Tilde,
            '@' => TokenKind::At,
            '+' => self.with_equal(TokenKind::Plus, TokenKind::PlusEqual),
            '%' => self.with_equal(TokenKind::Percent, TokenKind::PercentEqual),
            '&' => self.with_equal(TokenKind::Ampersand, TokenKind::AmpersandEqual),
            '|' => self.with_equal(TokenKind::Pipe, TokenKind::PipeEqual),
            '^' => self.with_equal(TokenKind::Caret, TokenKind::CaretEqual),
            '=' => self.with_equal(TokenKind::Equal, TokenKind::EqualEqual),
            '-' => {
                if self.cursor.eat('>') {
                    TokenKind::Arrow
                } else {
                    self.with_equal(TokenKind::Minus, TokenKind::MinusEqual)
                }
            }
            '*' => {
                if self.cursor.eat('*') {
                    self.with_equal(TokenKind::DoubleStar, TokenKind::DoubleStarEqual)
                } else {
                    self.with_equal(TokenKind::Star, TokenKind::StarEqual)
                }
            }
            '/' => {
                if self.cursor.eat('/') {
                    self.with_equal(TokenKind::DoubleSlash, TokenKind::DoubleSlashEqual)
                } else {
                    self.with_equal(TokenKind::Slash, TokenKind::SlashEqual)
                }
            }
            '<' => {
                if self.cursor.eat('<') {
                    self.with_equal(TokenKind::LeftShift, TokenKind::LeftShiftEqual)
                } else {
                    self.with_equal(TokenKind::Less, TokenKind::LessEqual)
                }
            }
            '>' => {
                if self.cursor.eat('>') {
                    self.with_equal(TokenKind::RightShift, TokenKind::RightShiftEqual)
                } else {
                    self.with_equal(TokenKind::Greater, TokenKind::GreaterEqual)
                }
            }
            '!' => {
                if self.cursor.eat('=') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Error("unexpected character '!'".to_string())
                }
            }
            other => TokenKind::Error(format!("unexpected character '{}'", other)),
        };

        self.line_has_content = true;
        Some(Token::new(kind, self.cursor.span_from(start)))
    }

    /// Pick `compound` if the next character is `=`.
    #[inline]
    fn with_equal(&mut self, simple: TokenKind, compound: TokenKind) -> TokenKind {
        if self.cursor.eat('=') { compound } else { simple }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let tok = self.next_token();
        if tok.is_eof() { None } else { Some(tok) }
    }
}

/// Tokenize a whole source string, excluding the final EOF.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}
