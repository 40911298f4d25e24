//! ECMAScript module system for the bytecode interpreter.
//!
//! This crate links and evaluates graphs of source text modules:
//! - Static import and export entries handed over by a front end
//! - Host hooks that resolve specifiers and fetch module sources
//! - A module graph driving the link and evaluate state machine
//!
//! # Overview
//!
//! - [`ModuleSource`] - Compiled top-level body plus import/export entries
//! - [`HostHooks`] - Specifier resolution and loading, supplied by the embedder
//! - [`ModuleGraph`] - Registry of [`SourceTextModule`] records
//!
//! Modules move through [`ModuleStatus`] in order. Import cycles link and
//! evaluate as one unit, and every module body runs at most once.
//!
//! # Examples
//!
//! ```
//! use bytecode_system::{Constant, FunctionInfo, Opcode};
//! use core_types::Value;
//! use interpreter::Realm;
//! use module_system::{ExportEntry, ImportEntry, ModuleGraph, ModuleSource, StaticModuleMap};
//!
//! // lib.js: export let answer = 42;
//! let mut lib = FunctionInfo::new("lib");
//! lib.emit(Opcode::PushConstant(Constant::Integer(42)));
//! lib.emit(Opcode::StoreModuleVar("answer".to_string()));
//! lib.emit(Opcode::PushUndefined);
//! lib.emit(Opcode::Return);
//!
//! // main.js: import { answer } from './lib.js'; answer;
//! let mut main = FunctionInfo::new("main");
//! main.emit(Opcode::LoadModuleVar("answer".to_string()));
//! main.emit(Opcode::Return);
//!
//! let host = StaticModuleMap::new()
//!     .with(
//!         "lib.js",
//!         ModuleSource::new(lib).with_export(ExportEntry::Local {
//!             local: "answer".to_string(),
//!             exported: "answer".to_string(),
//!         }),
//!     )
//!     .with(
//!         "main.js",
//!         ModuleSource::new(main).with_import(ImportEntry::Named {
//!             specifier: "./lib.js".to_string(),
//!             imported: "answer".to_string(),
//!             local: "answer".to_string(),
//!         }),
//!     );
//!
//! let mut realm = Realm::new();
//! let mut graph = ModuleGraph::new();
//! assert_eq!(graph.execute(&mut realm, &host, "main.js").unwrap(), Value::Smi(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod graph;
pub mod host;
pub mod record;

// Re-export main types at crate root
pub use entry::{ExportEntry, ImportEntry, ModuleSource, DEFAULT_EXPORT};
pub use error::ModuleError;
pub use graph::ModuleGraph;
pub use host::{resolve_specifier, HostHooks, StaticModuleMap};
pub use record::{ModuleHandle, ModuleStatus, SourceTextModule};

#[cfg(test)]
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}
