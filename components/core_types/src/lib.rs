//! Core JavaScript value types and error handling.
//!
//! This crate provides the foundational types shared by the bytecode,
//! interpreter and module components.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`JsError`] - Host-side description of an engine error
//! - [`ErrorKind`] - Types of JavaScript errors
//! - [`StackFrame`] - Activation frame information attached to errors
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let error = JsError::type_error("undefined is not a function");
//! assert_eq!(error.kind, ErrorKind::TypeError);
//! assert_eq!(error.to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;
mod value;

pub use error::{ErrorKind, JsError};
pub use source::StackFrame;
pub use value::{number_to_string, Value};
