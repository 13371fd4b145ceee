//! # Numbas Core
//!
//! Types shared by every numbas crate: source spans and the error model.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod span;

pub use error::{NumbasError, NumbasResult, RuntimeErrorKind};
pub use span::Span;
