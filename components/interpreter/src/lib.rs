//! Bytecode interpreter for JavaScript runtime
//!
//! This crate executes [`bytecode_system::FunctionInfo`] bodies:
//! - Stack-based dispatch over typed local slots
//! - Try/catch handler ranges scanned on every throw
//! - Shared environment records for closures and module bindings
//! - Generator activations resumed through a phase jump table
//!
//! All mutable engine state lives in a [`Realm`]: the object heap, the
//! environment arena and the intrinsic prototypes.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{Constant, FunctionInfo, Opcode};
//! use core_types::Value;
//! use interpreter::{ExecutionResult, Interpreter, Realm};
//! use std::rc::Rc;
//!
//! let mut info = FunctionInfo::new("main");
//! info.emit(Opcode::PushConstant(Constant::Integer(40)));
//! info.emit(Opcode::PushConstant(Constant::Integer(2)));
//! info.emit(Opcode::Add);
//! info.emit(Opcode::Return);
//!
//! let mut realm = Realm::new();
//! let env = realm.global_env();
//! let result = Interpreter::new(Rc::new(info), Vec::new(), env).interpret(&mut realm);
//! assert_eq!(result, ExecutionResult::Success(Value::Smi(42)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod environment;
pub mod error;
pub mod generator;
pub mod heap;
pub mod interpreter;
pub mod operations;
pub mod realm;

// Re-export main types at crate root
pub use environment::{
    Binding, BindingError, EnvId, EnvKind, EnvironmentArena, EnvironmentRecord, ExportTarget,
    ModuleId,
};
pub use error::{Abrupt, InternalError, JsResult};
pub use generator::{resume_generator, GeneratorState, ResumeMode};
pub use heap::{Closure, Heap, JsObject, NativeCall, NativeFn, NativeFunction, ObjectKind};
pub use interpreter::{ExecutionResult, Interpreter, Operand};
pub use realm::{Intrinsics, Realm, RealmConfig, RealmId};

#[cfg(test)]
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}
