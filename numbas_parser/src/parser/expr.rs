//! Expression parsing (Pratt).

use super::{Parser, Precedence};
use crate::ast::{BinOp, BoolOp, CmpOp, Expr, ExprKind, UnaryOp};
use crate::token::{Keyword, TokenKind};
use numbas_core::NumbasResult;

/// Pratt parser for expressions.
pub struct ExprParser;

impl ExprParser {
    /// Parse an expression whose operators all bind tighter than `min_prec`.
    pub fn parse(parser: &mut Parser<'_>, min_prec: Precedence) -> NumbasResult<Expr> {
        let start = parser.start_span();
        let mut left = Self::parse_prefix(parser)?;

        loop {
            let prec = Self::infix_precedence(parser);
            if prec <= min_prec {
                break;
            }
            left = Self::parse_infix(parser, left, prec, start)?;
        }

        Ok(left)
    }

    /// Parse a comma-separated expression list. A single expression without
    /// a trailing comma is returned as is; otherwise a tuple is built.
    pub fn parse_list(parser: &mut Parser<'_>) -> NumbasResult<Expr> {
        let start = parser.start_span();
        let first = parser.parse_expression()?;
        if !parser.check(TokenKind::Comma) {
            return Ok(first);
        }

        let mut elts = vec![first];
        while parser.match_token(TokenKind::Comma) {
            if !Self::starts_expression(parser) {
                break;
            }
            elts.push(parser.parse_expression()?);
        }
        Ok(Expr::new(ExprKind::Tuple(elts), parser.span_from(start)))
    }

    /// Check if the current token can begin an expression.
    pub fn starts_expression(parser: &Parser<'_>) -> bool {
        match &parser.current().kind {
            TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Ident(_)
            | TokenKind::LeftParen
            | TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::Tilde => true,
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::True | Keyword::False | Keyword::None | Keyword::Not
            ),
            _ => false,
        }
    }

    // =========================================================================
    // Prefix
    // =========================================================================

    fn parse_prefix(parser: &mut Parser<'_>) -> NumbasResult<Expr> {
        let start = parser.start_span();
        let unary = match &parser.current().kind {
            TokenKind::Minus => Some((UnaryOp::USub, Precedence::Unary)),
            TokenKind::Plus => Some((UnaryOp::UAdd, Precedence::Unary)),
            TokenKind::Tilde => Some((UnaryOp::Invert, Precedence::Unary)),
            TokenKind::Keyword(Keyword::Not) => Some((UnaryOp::Not, Precedence::Not)),
            _ => None,
        };

        if let Some((op, prec)) = unary {
            parser.advance();
            let operand = Self::parse(parser, prec)?;
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op,
                    operand: Box::new(operand),
                },
                parser.span_from(start),
            ));
        }

        let atom = Self::parse_atom(parser)?;
        Self::parse_trailers(parser, atom, start)
    }

    fn parse_atom(parser: &mut Parser<'_>) -> NumbasResult<Expr> {
        let start = parser.start_span();
        let kind = match parser.current().kind.clone() {
            TokenKind::Int(n) => {
                parser.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(n) => {
                parser.advance();
                ExprKind::Float(n)
            }
            TokenKind::Ident(name) => {
                parser.advance();
                ExprKind::Name(name)
            }
            TokenKind::Keyword(Keyword::True) => {
                parser.advance();
                ExprKind::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                parser.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Keyword(Keyword::None) => {
                parser.advance();
                ExprKind::None
            }
            TokenKind::LeftParen => return Self::parse_paren(parser),
            TokenKind::Keyword(kw @ (Keyword::Lambda | Keyword::Yield)) => {
                return Err(parser.error_at_current(&format!("'{}' is not supported", kw)));
            }
            _ => return Err(parser.error_at_current("expected expression")),
        };
        Ok(Expr::new(kind, parser.span_from(start)))
    }

    /// `()`, `(expr)`, or `(a, b, ...)`.
    fn parse_paren(parser: &mut Parser<'_>) -> NumbasResult<Expr> {
        let start = parser.start_span();
        parser.advance();

        if parser.match_token(TokenKind::RightParen) {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), parser.span_from(start)));
        }

        let first = parser.parse_expression()?;
        if parser.match_token(TokenKind::RightParen) {
            // Parenthesized expressions keep the inner node; the emitter
            // re-derives parentheses from precedence.
            return Ok(first);
        }

        let mut elts = vec![first];
        while parser.match_token(TokenKind::Comma) {
            if parser.check(TokenKind::RightParen) {
                break;
            }
            elts.push(parser.parse_expression()?);
        }
        parser.expect(TokenKind::RightParen, "expected ')'")?;
        Ok(Expr::new(ExprKind::Tuple(elts), parser.span_from(start)))
    }

    /// Attribute access, calls and subscripts, left to right.
    fn parse_trailers(parser: &mut Parser<'_>, mut expr: Expr, start: u32) -> NumbasResult<Expr> {
        loop {
            if parser.match_token(TokenKind::Dot) {
                let attr = parser.expect_identifier("expected attribute name after '.'")?;
                expr = Expr::new(
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                    parser.span_from(start),
                );
            } else if parser.match_token(TokenKind::LeftParen) {
                let mut args = Vec::new();
                while !parser.check(TokenKind::RightParen) {
                    args.push(parser.parse_expression()?);
                    if parser.check(TokenKind::Equal) {
                        return Err(parser.error_at_current("keyword arguments are not supported"));
                    }
                    if !parser.match_token(TokenKind::Comma) {
                        break;
                    }
                }
                parser.expect(TokenKind::RightParen, "expected ')' after arguments")?;
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    parser.span_from(start),
                );
            } else if parser.match_token(TokenKind::LeftBracket) {
                let index = Self::parse_list(parser)?;
                parser.expect(TokenKind::RightBracket, "expected ']'")?;
                expr = Expr::new(
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    parser.span_from(start),
                );
            } else {
                return Ok(expr);
            }
        }
    }

    // =========================================================================
    // Infix
    // =========================================================================

    fn infix_precedence(parser: &Parser<'_>) -> Precedence {
        match &parser.current().kind {
            TokenKind::Keyword(Keyword::If) => Precedence::Conditional,
            TokenKind::Keyword(Keyword::Or) => Precedence::Or,
            TokenKind::Keyword(Keyword::And) => Precedence::And,
            TokenKind::Keyword(Keyword::Is) => Precedence::Comparison,
            kind if kind.is_comparison() => Precedence::Comparison,
            TokenKind::Pipe => Precedence::BitwiseOr,
            TokenKind::Caret => Precedence::BitwiseXor,
            TokenKind::Ampersand => Precedence::BitwiseAnd,
            TokenKind::LeftShift | TokenKind::RightShift => Precedence::Shift,
            TokenKind::Plus | TokenKind::Minus => Precedence::Additive,
            TokenKind::Star | TokenKind::Slash | TokenKind::DoubleSlash | TokenKind::Percent => {
                Precedence::Multiplicative
            }
            TokenKind::DoubleStar => Precedence::Power,
            _ => Precedence::Lowest,
        }
    }

    fn parse_infix(
        parser: &mut Parser<'_>,
        left: Expr,
        prec: Precedence,
        start: u32,
    ) -> NumbasResult<Expr> {
        match prec {
            Precedence::Conditional => Self::parse_conditional(parser, left, start),
            Precedence::Or => Self::parse_bool_op(parser, left, BoolOp::Or, Keyword::Or, start),
            Precedence::And => Self::parse_bool_op(parser, left, BoolOp::And, Keyword::And, start),
            Precedence::Comparison => Self::parse_comparison(parser, left, start),
            Precedence::Power => {
                parser.advance();
                // Right-associative and admits a unary operand: `2 ** -x`.
                let right = Self::parse(parser, Precedence::Unary)?;
                Ok(Self::binop(parser, left, BinOp::Pow, right, start))
            }
            _ => {
                let op = match parser.current().kind {
                    TokenKind::Pipe => BinOp::BitOr,
                    TokenKind::Caret => BinOp::BitXor,
                    TokenKind::Ampersand => BinOp::BitAnd,
                    TokenKind::LeftShift => BinOp::LShift,
                    TokenKind::RightShift => BinOp::RShift,
                    TokenKind::Plus => BinOp::Add,
                    TokenKind::Minus => BinOp::Sub,
                    TokenKind::Star => BinOp::Mult,
                    TokenKind::Slash => BinOp::Div,
                    TokenKind::DoubleSlash => BinOp::FloorDiv,
                    TokenKind::Percent => BinOp::Mod,
                    _ => return Err(parser.error_at_current("expected operator")),
                };
                parser.advance();
                let right = Self::parse(parser, prec)?;
                Ok(Self::binop(parser, left, op, right, start))
            }
        }
    }

    fn binop(parser: &Parser<'_>, left: Expr, op: BinOp, right: Expr, start: u32) -> Expr {
        Expr::new(
            ExprKind::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            parser.span_from(start),
        )
    }

    fn parse_conditional(parser: &mut Parser<'_>, body: Expr, start: u32) -> NumbasResult<Expr> {
        parser.advance();
        let test = Self::parse(parser, Precedence::Conditional)?;
        parser.expect_keyword(Keyword::Else, "expected 'else' in conditional expression")?;
        let orelse = Self::parse(parser, Precedence::Lowest)?;
        Ok(Expr::new(
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            parser.span_from(start),
        ))
    }

    fn parse_bool_op(
        parser: &mut Parser<'_>,
        first: Expr,
        op: BoolOp,
        kw: Keyword,
        start: u32,
    ) -> NumbasResult<Expr> {
        let prec = if op == BoolOp::Or {
            Precedence::Or
        } else {
            Precedence::And
        };
        let mut values = vec![first];
        while parser.match_keyword(kw) {
            values.push(Self::parse(parser, prec)?);
        }
        Ok(Expr::new(
            ExprKind::BoolOp { op, values },
            parser.span_from(start),
        ))
    }

    fn parse_comparison(parser: &mut Parser<'_>, left: Expr, start: u32) -> NumbasResult<Expr> {
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        loop {
            let op = match parser.current().kind {
                TokenKind::EqualEqual => CmpOp::Eq,
                TokenKind::NotEqual => CmpOp::NotEq,
                TokenKind::Less => CmpOp::Lt,
                TokenKind::LessEqual => CmpOp::LtE,
                TokenKind::Greater => CmpOp::Gt,
                TokenKind::GreaterEqual => CmpOp::GtE,
                TokenKind::Keyword(Keyword::Is) => CmpOp::Is,
                _ => break,
            };
            parser.advance();
            let op = if op == CmpOp::Is && parser.match_keyword(Keyword::Not) {
                CmpOp::IsNot
            } else {
                op
            };
            ops.push(op);
            comparators.push(Self::parse(parser, Precedence::Comparison)?);
        }

        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            parser.span_from(start),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinOp, BoolOp, CmpOp, ExprKind, UnaryOp};
    use crate::parser::parse_expression;

    #[test]
    fn test_left_associative() {
        let e = parse_expression("a - b - c").unwrap();
        let ExprKind::BinOp { left, op, .. } = e.kind else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Sub);
        assert!(matches!(left.kind, ExprKind::BinOp { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_power_right_associative_and_binds_over_unary() {
        let e = parse_expression("-2 ** 3 ** 2").unwrap();
        let ExprKind::UnaryOp { op, operand } = e.kind else {
            panic!("expected unary");
        };
        assert_eq!(op, UnaryOp::USub);
        let ExprKind::BinOp { right, op, .. } = operand.kind else {
            panic!("expected power");
        };
        assert_eq!(op, BinOp::Pow);
        assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Pow, .. }));
    }

    #[test]
    fn test_multiplicative_binds_tighter() {
        let e = parse_expression("a + b * c").unwrap();
        let ExprKind::BinOp { right, op, .. } = e.kind else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Mult, .. }));
    }

    #[test]
    fn test_chained_comparison() {
        let e = parse_expression("0 <= x < n").unwrap();
        let ExprKind::Compare { ops, comparators, .. } = e.kind else {
            panic!("expected compare");
        };
        assert_eq!(ops, vec![CmpOp::LtE, CmpOp::Lt]);
        assert_eq!(comparators.len(), 2);
    }

    #[test]
    fn test_is_not() {
        let e = parse_expression("x is not None").unwrap();
        assert!(matches!(e.kind, ExprKind::Compare { ref ops, .. } if ops == &[CmpOp::IsNot]));
    }

    #[test]
    fn test_bool_ops_flatten() {
        let e = parse_expression("a or b or not c and d").unwrap();
        let ExprKind::BoolOp { op, values } = e.kind else {
            panic!("expected boolop");
        };
        assert_eq!(op, BoolOp::Or);
        assert_eq!(values.len(), 3);
        assert!(matches!(values[2].kind, ExprKind::BoolOp { op: BoolOp::And, .. }));
    }

    #[test]
    fn test_conditional() {
        let e = parse_expression("a if a > b else b").unwrap();
        assert!(matches!(e.kind, ExprKind::IfExp { .. }));
    }

    #[test]
    fn test_trailers() {
        let e = parse_expression("self.coef[i].scale(x)").unwrap();
        let ExprKind::Call { func, args } = e.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        let ExprKind::Attribute { value, attr } = func.kind else {
            panic!("expected attribute");
        };
        assert_eq!(attr, "scale");
        assert!(matches!(value.kind, ExprKind::Subscript { .. }));
    }

    #[test]
    fn test_tuples() {
        assert!(matches!(
            parse_expression("()").unwrap().kind,
            ExprKind::Tuple(ref v) if v.is_empty()
        ));
        assert!(matches!(
            parse_expression("(a,)").unwrap().kind,
            ExprKind::Tuple(ref v) if v.len() == 1
        ));
        assert!(matches!(parse_expression("(a)").unwrap().kind, ExprKind::Name(_)));
    }

    #[test]
    fn test_keyword_argument_rejected() {
        assert!(parse_expression("f(x=1)").is_err());
    }

    #[test]
    fn test_lambda_rejected() {
        assert!(parse_expression("lambda: 1").is_err());
    }
}
