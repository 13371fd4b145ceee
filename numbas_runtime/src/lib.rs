//! # Numbas Runtime
//!
//! The object model that specializable methods run against:
//!
//! - [`Value`]: numbers, tuples, objects and callables
//! - [`Object`] / [`Class`]: instances with an attribute dictionary, classes
//!   with a descriptor table and a defining [`Scope`]
//! - [`Callable`]: anything invocable with positional arguments
//! - [`ops`]: Python-flavoured arithmetic and comparison
//! - [`builtins`]: `abs`, `min`, `range`, ... and the `math` module
//!
//! Instances are reference counted. Dropping the last reference to an
//! [`Object`] notifies every descriptor of its class, which is how per
//! instance caches stay bounded without owning their keys.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod callable;
pub mod class;
pub mod object;
pub mod ops;
pub mod scope;
pub mod value;

pub use callable::{Callable, CallableFlags, NativeFunction};
pub use class::{Class, Descriptor, NativeMethod};
pub use object::{Object, ObjectId};
pub use scope::Scope;
pub use value::Value;
