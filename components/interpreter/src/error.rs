//! Abrupt completions raised while executing bytecode
//!
//! Two kinds of failure leave an operation early. A [`Abrupt::Throw`] carries
//! a JavaScript value and is subject to handler ranges. An
//! [`Abrupt::Internal`] reports malformed bytecode or a broken engine
//! invariant; it is never caught by script code.

use core_types::Value;
use thiserror::Error;

/// Engine invariant violation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InternalError {
    /// Pop from an empty operand stack
    #[error("operand stack underflow")]
    StackUnderflow,

    /// Operand of the wrong representation on the stack
    #[error("expected {expected} operand, found {found}")]
    OperandKind {
        /// Representation the opcode needs
        expected: &'static str,
        /// Representation found
        found: &'static str,
    },

    /// Local slot that does not exist
    #[error("local [{0}] out of range")]
    LocalOutOfRange(u32),

    /// Typed access to a slot of another kind
    #[error("local [{local}] holds {found}, expected {expected}")]
    LocalKind {
        /// Slot index
        local: u32,
        /// Kind the opcode needs
        expected: &'static str,
        /// Kind held by the slot
        found: &'static str,
    },

    /// Instruction pointer ran off the opcode stream
    #[error("instruction pointer {0} is past the last opcode")]
    IpOutOfRange(usize),

    /// Jump table without an entry for the popped key
    #[error("jump table has no entry for {0}")]
    MissingJumpTarget(i32),

    /// Operand stack height other than 1 at `Return`
    #[error("operand stack height {0} at return, expected 1")]
    StackHeight(usize),

    /// Handle that does not name a heap object
    #[error("invalid object handle {0}")]
    InvalidObject(usize),

    /// Environment id that does not name a record
    #[error("invalid environment {0}")]
    InvalidEnvironment(usize),

    /// Slot index outside an environment record
    #[error("environment {env} has no slot {slot}")]
    InvalidSlot {
        /// Environment id
        env: usize,
        /// Slot index
        slot: u32,
    },

    /// Walk past the outermost environment record
    #[error("environment chain ended while walking outward")]
    EnvironmentChainEnded,

    /// Module variable access outside a module
    #[error("no module environment is active")]
    NoModuleEnvironment,

    /// Indirect binding naming a module that is not linked
    #[error("module {0} has no environment")]
    ModuleNotLinked(usize),

    /// Chain of indirect bindings that never reaches a local binding
    #[error("indirect binding '{0}' does not resolve")]
    UnresolvableIndirection(String),

    /// Closure creation naming a missing nested function
    #[error("nested function {0} out of range")]
    NestedFunction(usize),

    /// Generator opcode outside a generator activation
    #[error("generator opcode in a non-generator activation")]
    NotGenerator,

    /// Yield reached by a plain `interpret` call
    #[error("yield outside a generator drive")]
    UnexpectedYield,

    /// BigInt literal that does not parse
    #[error("malformed BigInt literal {0}")]
    BigIntLiteral(String),
}

/// Early exit from an operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Abrupt {
    /// JavaScript exception carrying the thrown value
    #[error("uncaught exception: {0}")]
    Throw(Value),
    /// Fatal engine error
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Result type of fallible runtime operations
pub type JsResult<T> = Result<T, Abrupt>;
