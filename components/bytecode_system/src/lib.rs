//! Bytecode system for JavaScript runtime
//!
//! This crate defines the compiled unit the interpreter executes: a closed
//! opcode set for a stack machine, typed local slots, an exception handler
//! table and nested function tables, bundled as an immutable
//! [`FunctionInfo`].
//!
//! # Features
//!
//! - Stack-based opcode set with statically known stack effects
//! - Builder API for assembling functions by hand or from a front end
//! - Structural verifier for jump targets, local kinds and handler ordering
//! - JSON interchange format and a human-readable disassembler
//!
//! # Example
//!
//! ```
//! use bytecode_system::{verify, Constant, FunctionInfo, Opcode};
//!
//! let mut info = FunctionInfo::new("main");
//! info.emit(Opcode::PushConstant(Constant::Integer(42)));
//! info.emit(Opcode::Return);
//!
//! verify(&info).unwrap();
//! let json = info.to_json().unwrap();
//! let restored = FunctionInfo::from_json(&json).unwrap();
//! assert_eq!(restored, info);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constant;
pub mod function_info;
pub mod opcode;
pub mod printer;
pub mod verifier;

// Re-export main types at crate root
pub use constant::Constant;
pub use function_info::{
    FunctionInfo, FunctionKind, HandlerRange, LocalKind, GENERATOR_STATE_LOCAL, NEW_TARGET_LOCAL,
    RECEIVER_LOCAL,
};
pub use opcode::{LocalId, Opcode};
pub use verifier::{verify, VerifyError};
