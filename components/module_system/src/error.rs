//! Module loading, linking and evaluation errors

use bytecode_system::VerifyError;
use core_types::Value;
use interpreter::{BindingError, InternalError};
use thiserror::Error;

/// Failure of a module operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    /// The host could not map a specifier to a module
    #[error("Cannot resolve module '{specifier}' imported from '{referrer}'")]
    Unresolvable {
        /// Specifier as written
        specifier: String,
        /// Key of the importing module
        referrer: String,
    },

    /// The host could not provide a module's source
    #[error("Failed to fetch module '{key}': {reason}")]
    Fetch {
        /// Resolved module key
        key: String,
        /// Host-supplied reason
        reason: String,
    },

    /// Module body rejected by the bytecode verifier
    #[error("Module '{key}' has an invalid body: {source}")]
    InvalidBody {
        /// Resolved module key
        key: String,
        /// Verifier finding
        source: VerifyError,
    },

    /// Import or re-export of a name the target does not export
    #[error("The requested module '{target}' does not provide an export named '{name}'")]
    MissingExport {
        /// Key of the module that is missing the export
        target: String,
        /// Requested export name
        name: String,
    },

    /// Binding setup failed while creating a module environment
    #[error("{source} (in module '{key}')")]
    Binding {
        /// Module being linked
        key: String,
        /// Environment failure
        source: BindingError,
    },

    /// Evaluation requested before a successful link
    #[error("Module '{0}' is not linked")]
    NotLinked(String),

    /// Operation called with a realm other than the one the graph belongs to
    #[error("Module graph used with a realm it does not belong to")]
    ForeignRealm,

    /// Handle that does not belong to the graph
    #[error("Unknown module handle {0}")]
    UnknownModule(usize),

    /// The module body, or one it depends on, threw
    #[error("Uncaught {description} (in module '{key}')")]
    Uncaught {
        /// Module whose body threw
        key: String,
        /// Thrown value
        value: Value,
        /// Rendering of the thrown value
        description: String,
    },

    /// Engine invariant violation while running a module body
    #[error("Internal error in module '{key}': {source}")]
    Internal {
        /// Module whose body failed
        key: String,
        /// Underlying failure
        source: InternalError,
    },
}

impl ModuleError {
    /// Thrown value of an uncaught exception
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            ModuleError::Uncaught { value, .. } => Some(value),
            _ => None,
        }
    }
}
