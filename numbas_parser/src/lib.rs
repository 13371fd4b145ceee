//! # Numbas Parser
//!
//! Lexer, parser and source emitter for the method language: the numeric
//! Python subset that specializable methods are written in.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod dedent;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod unparse;

pub use ast::*;
pub use dedent::dedent;
pub use lexer::{Lexer, tokenize};
pub use parser::{Parser, parse, parse_expression, parse_function};
pub use token::{Token, TokenKind};
pub use unparse::{unparse, unparse_expr, unparse_function};
