//! Recursive descent parser with Pratt parsing for expressions.
//!
//! The parser is fail-fast: the first syntax error aborts the parse. Method
//! sources are small and a partial tree is of no use to the specializer.

mod expr;
mod stmt;

use crate::ast::{Expr, FunctionDef, Module, Stmt, StmtKind};
use crate::lexer::Lexer;
use crate::token::{Keyword, Token, TokenKind};
use numbas_core::{NumbasError, NumbasResult, Span};

pub use expr::ExprParser;
pub use stmt::StmtParser;

// =============================================================================
// Parser Core
// =============================================================================

/// Method-language parser.
pub struct Parser<'src> {
    /// Token source.
    lexer: Lexer<'src>,
    /// Current token.
    current: Token,
    /// Previous token (for span tracking).
    previous: Token,
}

impl<'src> Parser<'src> {
    /// Create a new parser for the given source code.
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let first_token = lexer.next_token();
        Self {
            lexer,
            current: first_token.clone(),
            previous: first_token,
        }
    }

    /// Parse a whole module.
    pub fn parse_module(&mut self) -> NumbasResult<Module> {
        let start = self.current.span.start;
        let mut body = Vec::new();

        self.skip_newlines();
        while !self.is_at_end() {
            body.extend(self.parse_statement()?);
            self.skip_newlines();
        }

        let end = self.current.span.end;
        Ok(Module::new(body, Span::new(start, end)))
    }

    /// Parse one compound statement or one logical line of simple
    /// statements (`a = 1; b = 2` yields two).
    pub fn parse_statement(&mut self) -> NumbasResult<Vec<Stmt>> {
        StmtParser::parse(self)
    }

    /// Parse an expression.
    pub fn parse_expression(&mut self) -> NumbasResult<Expr> {
        ExprParser::parse(self, Precedence::Lowest)
    }

    /// Parse an expression with minimum precedence.
    pub fn parse_expression_with_precedence(&mut self, min_prec: Precedence) -> NumbasResult<Expr> {
        ExprParser::parse(self, min_prec)
    }

    // =========================================================================
    // Token Management
    // =========================================================================

    /// Get the current token.
    #[inline]
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Get the previous token.
    #[inline]
    pub fn previous(&self) -> &Token {
        &self.previous
    }

    /// Advance to the next token, returning the previous.
    pub fn advance(&mut self) -> &Token {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
        &self.previous
    }

    /// Check if the current token has the same kind as `kind`, ignoring
    /// payloads.
    #[inline]
    pub fn check(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(&kind)
    }

    /// Check if the current token is a specific keyword.
    #[inline]
    pub fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(k) if *k == kw)
    }

    /// Consume the current token if it matches.
    pub fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the current token if it's the given keyword.
    pub fn match_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect and consume a specific token, or error.
    pub fn expect(&mut self, kind: TokenKind, msg: &str) -> NumbasResult<&Token> {
        if self.check(kind) {
            self.advance();
            Ok(&self.previous)
        } else {
            Err(self.error_at_current(msg))
        }
    }

    /// Expect and consume a specific keyword, or error.
    pub fn expect_keyword(&mut self, kw: Keyword, msg: &str) -> NumbasResult<&Token> {
        if self.check_keyword(kw) {
            self.advance();
            Ok(&self.previous)
        } else {
            Err(self.error_at_current(msg))
        }
    }

    /// Expect and consume an identifier, returning the name.
    pub fn expect_identifier(&mut self, msg: &str) -> NumbasResult<String> {
        if let TokenKind::Ident(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_at_current(msg))
        }
    }

    /// Skip any newline tokens.
    pub fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Check if at end of file.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    // =========================================================================
    // Span Tracking
    // =========================================================================

    /// Span from `start` to the end of the previous token.
    pub fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.previous.span.end.max(start))
    }

    /// Start offset of the current token.
    pub fn start_span(&self) -> u32 {
        self.current.span.start
    }

    // =========================================================================
    // Error Handling
    // =========================================================================

    /// Create an error at the current token.
    pub fn error_at_current(&self, msg: &str) -> NumbasError {
        Self::error_at(&self.current, msg)
    }

    /// Create an error at the previous token.
    pub fn error_at_previous(&self, msg: &str) -> NumbasError {
        Self::error_at(&self.previous, msg)
    }

    fn error_at(token: &Token, msg: &str) -> NumbasError {
        match &token.kind {
            TokenKind::Error(e) => NumbasError::lex(e.clone(), token.span),
            TokenKind::Eof => NumbasError::syntax(format!("at end of file: {}", msg), token.span),
            kind => NumbasError::syntax(format!("at '{}': {}", kind, msg), token.span),
        }
    }
}

// =============================================================================
// Precedence Levels
// =============================================================================

/// Expression precedence levels for Pratt parsing, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Precedence {
    /// Lowest precedence.
    Lowest = 0,
    /// Conditional `if-else`
    Conditional = 1,
    /// `or`
    Or = 2,
    /// `and`
    And = 3,
    /// `not`
    Not = 4,
    /// Comparisons and `is`
    Comparison = 5,
    /// `|`
    BitwiseOr = 6,
    /// `^`
    BitwiseXor = 7,
    /// `&`
    BitwiseAnd = 8,
    /// `<<`, `>>`
    Shift = 9,
    /// `+`, `-`
    Additive = 10,
    /// `*`, `/`, `//`, `%`
    Multiplicative = 11,
    /// Unary `+`, `-`, `~`
    Unary = 12,
    /// `**`
    Power = 13,
    /// Attribute, subscript, call
    Primary = 14,
}

// =============================================================================
// Public API
// =============================================================================

/// Parse source code into a module.
pub fn parse(source: &str) -> NumbasResult<Module> {
    Parser::new(source).parse_module()
}

/// Parse a single expression; trailing tokens other than a newline are an
/// error.
pub fn parse_expression(source: &str) -> NumbasResult<Expr> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_expression()?;
    parser.skip_newlines();
    if !parser.is_at_end() {
        return Err(parser.error_at_current("unexpected trailing input"));
    }
    Ok(expr)
}

/// Parse a source unit that must contain exactly one function definition,
/// which is returned.
pub fn parse_function(source: &str) -> NumbasResult<FunctionDef> {
    let module = parse(source)?;
    let span = module.span;
    let mut body = module.body.into_iter();
    match (body.next(), body.next()) {
        (
            Some(Stmt {
                kind: StmtKind::FunctionDef(def),
                ..
            }),
            None,
        ) => Ok(*def),
        _ => Err(NumbasError::syntax(
            "expected exactly one function definition",
            span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_creation() {
        let parser = Parser::new("x + 1");
        assert!(!parser.is_at_end());
    }

    #[test]
    fn test_empty_module() {
        let module = parse("").unwrap();
        assert!(module.body.is_empty());
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Primary > Precedence::Lowest);
        assert!(Precedence::Multiplicative > Precedence::Additive);
        assert!(Precedence::Power > Precedence::Unary);
        assert!(Precedence::Not > Precedence::And);
    }

    #[test]
    fn test_parse_function_requires_single_def() {
        assert!(parse_function("x = 1").is_err());
        assert!(parse_function("def f(a):\n    return a\ndef g(b):\n    return b\n").is_err());
        let def = parse_function("def f(a):\n    return a\n").unwrap();
        assert_eq!(def.name, "f");
    }

    #[test]
    fn test_parse_expression_rejects_trailing() {
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("a + b").is_ok());
    }

    #[test]
    fn test_lexer_error_surfaces_as_lex_error() {
        let err = parse("x = 1 $ 2").unwrap_err();
        assert!(matches!(err, NumbasError::LexError { .. }));
    }
}
