//! Statement parsing.

use super::expr::ExprParser;
use super::Parser;
use crate::ast::{Arg, Arguments, Expr, ExprKind, FunctionDef, Stmt, StmtKind};
use crate::token::{Keyword, TokenKind};
use numbas_core::{NumbasError, NumbasResult};

/// Statement parser.
pub struct StmtParser;

impl StmtParser {
    /// Parse a compound statement, or one line of simple statements.
    pub fn parse(parser: &mut Parser<'_>) -> NumbasResult<Vec<Stmt>> {
        match &parser.current().kind {
            TokenKind::At => Ok(vec![Self::parse_decorated(parser)?]),
            TokenKind::Keyword(Keyword::Def) => Ok(vec![Self::parse_function_def(parser, Vec::new())?]),
            TokenKind::Keyword(Keyword::If) => Ok(vec![Self::parse_if(parser)?]),
            TokenKind::Keyword(Keyword::While) => Ok(vec![Self::parse_while(parser)?]),
            TokenKind::Keyword(Keyword::For) => Ok(vec![Self::parse_for(parser)?]),
            TokenKind::Keyword(Keyword::Class) => {
                Err(parser.error_at_current("class definitions are not supported"))
            }
            TokenKind::Indent => Err(parser.error_at_current("unexpected indent")),
            _ => Self::parse_simple_line(parser),
        }
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Parse `: NEWLINE INDENT stmts DEDENT` or `: simple; stmts NEWLINE`.
    fn parse_block(parser: &mut Parser<'_>) -> NumbasResult<Vec<Stmt>> {
        parser.expect(TokenKind::Colon, "expected ':'")?;

        if !parser.match_token(TokenKind::Newline) {
            return Self::parse_simple_line(parser);
        }

        parser.expect(TokenKind::Indent, "expected an indented block")?;
        let mut body = Vec::new();
        while !parser.check(TokenKind::Dedent) && !parser.is_at_end() {
            body.extend(Self::parse(parser)?);
            parser.skip_newlines();
        }
        parser.match_token(TokenKind::Dedent);
        Ok(body)
    }

    fn parse_else(parser: &mut Parser<'_>) -> NumbasResult<Vec<Stmt>> {
        if parser.match_keyword(Keyword::Else) {
            Self::parse_block(parser)
        } else {
            Ok(Vec::new())
        }
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    fn parse_decorated(parser: &mut Parser<'_>) -> NumbasResult<Stmt> {
        let mut decorators = Vec::new();
        while parser.match_token(TokenKind::At) {
            decorators.push(parser.parse_expression()?);
            parser.expect(TokenKind::Newline, "expected newline after decorator")?;
            parser.skip_newlines();
        }
        if !parser.check_keyword(Keyword::Def) {
            return Err(parser.error_at_current("expected 'def' after decorators"));
        }
        Self::parse_function_def(parser, decorators)
    }

    fn parse_function_def(parser: &mut Parser<'_>, decorator_list: Vec<Expr>) -> NumbasResult<Stmt> {
        let start = decorator_list
            .first()
            .map_or_else(|| parser.start_span(), |d| d.span.start.saturating_sub(1));
        parser.expect_keyword(Keyword::Def, "expected 'def'")?;
        let name = parser.expect_identifier("expected function name")?;
        parser.expect(TokenKind::LeftParen, "expected '(' after function name")?;
        let args = Self::parse_parameters(parser)?;
        parser.expect(TokenKind::RightParen, "expected ')' after parameters")?;

        let returns = if parser.match_token(TokenKind::Arrow) {
            Some(Box::new(parser.parse_expression()?))
        } else {
            None
        };

        let body = Self::parse_block(parser)?;
        let span = parser.span_from(start);
        let def = FunctionDef {
            name,
            args,
            body,
            decorator_list,
            returns,
            span,
        };
        Ok(Stmt::new(StmtKind::FunctionDef(Box::new(def)), span))
    }

    fn parse_parameters(parser: &mut Parser<'_>) -> NumbasResult<Arguments> {
        let mut arguments = Arguments::default();

        while !parser.check(TokenKind::RightParen) {
            if parser.check(TokenKind::Star) || parser.check(TokenKind::DoubleStar) {
                return Err(parser.error_at_current("variadic parameters are not supported"));
            }
            let start = parser.start_span();
            let arg = parser.expect_identifier("expected parameter name")?;
            if arguments.names().any(|n| n == arg) {
                return Err(parser.error_at_previous("duplicate parameter name"));
            }
            let annotation = if parser.match_token(TokenKind::Colon) {
                Some(Box::new(parser.parse_expression()?))
            } else {
                None
            };
            let span = parser.span_from(start);

            if parser.match_token(TokenKind::Equal) {
                arguments.defaults.push(parser.parse_expression()?);
            } else if !arguments.defaults.is_empty() {
                return Err(NumbasError::syntax(
                    "non-default parameter follows default parameter",
                    span,
                ));
            }
            arguments.args.push(Arg {
                arg,
                annotation,
                span,
            });

            if !parser.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(arguments)
    }

    // =========================================================================
    // Control Flow
    // =========================================================================

    fn parse_if(parser: &mut Parser<'_>) -> NumbasResult<Stmt> {
        let start = parser.start_span();
        parser.advance(); // 'if' or 'elif'
        let test = parser.parse_expression()?;
        let body = Self::parse_block(parser)?;

        let orelse = if parser.check_keyword(Keyword::Elif) {
            vec![Self::parse_if(parser)?]
        } else {
            Self::parse_else(parser)?
        };

        Ok(Stmt::new(
            StmtKind::If {
                test: Box::new(test),
                body,
                orelse,
            },
            parser.span_from(start),
        ))
    }

    fn parse_while(parser: &mut Parser<'_>) -> NumbasResult<Stmt> {
        let start = parser.start_span();
        parser.advance();
        let test = parser.parse_expression()?;
        let body = Self::parse_block(parser)?;
        let orelse = Self::parse_else(parser)?;

        Ok(Stmt::new(
            StmtKind::While {
                test: Box::new(test),
                body,
                orelse,
            },
            parser.span_from(start),
        ))
    }

    fn parse_for(parser: &mut Parser<'_>) -> NumbasResult<Stmt> {
        let start = parser.start_span();
        parser.advance();
        let target = ExprParser::parse_list(parser)?;
        Self::check_target(&target)?;
        parser.expect_keyword(Keyword::In, "expected 'in' in for statement")?;
        let iter = ExprParser::parse_list(parser)?;
        let body = Self::parse_block(parser)?;
        let orelse = Self::parse_else(parser)?;

        Ok(Stmt::new(
            StmtKind::For {
                target: Box::new(target),
                iter: Box::new(iter),
                body,
                orelse,
            },
            parser.span_from(start),
        ))
    }

    // =========================================================================
    // Simple Statements
    // =========================================================================

    /// `simple (';' simple)* [';'] NEWLINE`
    fn parse_simple_line(parser: &mut Parser<'_>) -> NumbasResult<Vec<Stmt>> {
        let mut stmts = vec![Self::parse_simple(parser)?];
        while parser.match_token(TokenKind::Semicolon) {
            if parser.check(TokenKind::Newline) || parser.is_at_end() {
                break;
            }
            stmts.push(Self::parse_simple(parser)?);
        }
        if !parser.is_at_end() {
            parser.expect(TokenKind::Newline, "expected end of statement")?;
        }
        Ok(stmts)
    }

    fn parse_simple(parser: &mut Parser<'_>) -> NumbasResult<Stmt> {
        let start = parser.start_span();

        let kind = match &parser.current().kind {
            TokenKind::Keyword(Keyword::Pass) => {
                parser.advance();
                StmtKind::Pass
            }
            TokenKind::Keyword(Keyword::Break) => {
                parser.advance();
                StmtKind::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                parser.advance();
                StmtKind::Continue
            }
            TokenKind::Keyword(Keyword::Return) => {
                parser.advance();
                if ExprParser::starts_expression(parser) {
                    StmtKind::Return(Some(Box::new(ExprParser::parse_list(parser)?)))
                } else {
                    StmtKind::Return(None)
                }
            }
            _ => return Self::parse_expression_statement(parser, start),
        };

        Ok(Stmt::new(kind, parser.span_from(start)))
    }

    fn parse_expression_statement(parser: &mut Parser<'_>, start: u32) -> NumbasResult<Stmt> {
        let first = ExprParser::parse_list(parser)?;

        if let Some(op) = parser.current().kind.augmented_op() {
            if !matches!(
                first.kind,
                ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. }
            ) {
                return Err(NumbasError::syntax(
                    "illegal expression for augmented assignment",
                    first.span,
                ));
            }
            parser.advance();
            let value = ExprParser::parse_list(parser)?;
            return Ok(Stmt::new(
                StmtKind::AugAssign {
                    target: Box::new(first),
                    op,
                    value: Box::new(value),
                },
                parser.span_from(start),
            ));
        }

        if !parser.check(TokenKind::Equal) {
            return Ok(Stmt::new(
                StmtKind::Expr(Box::new(first)),
                parser.span_from(start),
            ));
        }

        // `a = b = value`: every expression but the last is a target.
        let mut exprs = vec![first];
        while parser.match_token(TokenKind::Equal) {
            exprs.push(ExprParser::parse_list(parser)?);
        }
        let value = exprs.pop().ok_or_else(|| NumbasError::internal("empty assignment"))?;
        for target in &exprs {
            Self::check_target(target)?;
        }

        Ok(Stmt::new(
            StmtKind::Assign {
                targets: exprs,
                value: Box::new(value),
            },
            parser.span_from(start),
        ))
    }

    /// Only names, attributes, subscripts and tuples of those are
    /// assignable.
    fn check_target(target: &Expr) -> NumbasResult<()> {
        match &target.kind {
            ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
            ExprKind::Tuple(elts) => elts.iter().try_for_each(Self::check_target),
            _ => Err(NumbasError::syntax("cannot assign to expression", target.span)),
        }
    }
}
