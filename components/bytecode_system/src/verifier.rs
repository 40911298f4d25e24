//! Structural verification of compiled functions
//!
//! The interpreter treats malformed bytecode as a fatal internal error at the
//! point it is reached. [`verify`] finds the same class of defects up front,
//! before any opcode runs.

use crate::function_info::{FunctionInfo, LocalKind};
use crate::opcode::LocalId;
use thiserror::Error;

/// Defect found in a [`FunctionInfo`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    /// Jump or jump-table target outside the opcode stream
    #[error("{function}: opcode {index} jumps to {target}, but there are only {len} opcodes")]
    JumpOutOfRange {
        /// Function name
        function: String,
        /// Offending opcode index
        index: usize,
        /// Jump target
        target: usize,
        /// Opcode count
        len: usize,
    },

    /// Local slot that does not exist
    #[error("{function}: opcode {index} uses local {local} but only {len} locals exist")]
    LocalOutOfRange {
        /// Function name
        function: String,
        /// Offending opcode index
        index: usize,
        /// Local slot
        local: LocalId,
        /// Local count
        len: usize,
    },

    /// Typed opcode applied to a slot of another kind
    #[error("{function}: opcode {index} expects {expected:?} local {local}, found {found:?}")]
    LocalKindMismatch {
        /// Function name
        function: String,
        /// Offending opcode index
        index: usize,
        /// Local slot
        local: LocalId,
        /// Kind the opcode requires
        expected: LocalKind,
        /// Declared kind
        found: LocalKind,
    },

    /// Handler range that is empty or points outside the stream
    #[error("{function}: handler {start}-{end} -> {handler} is malformed")]
    InvalidHandler {
        /// Function name
        function: String,
        /// Range start
        start: usize,
        /// Range end
        end: usize,
        /// Handler target
        handler: usize,
    },

    /// Handler table not ordered innermost-first
    #[error("{function}: handler #{outer} encloses later handler #{inner}")]
    HandlerOrder {
        /// Function name
        function: String,
        /// Position of the enclosing range
        outer: usize,
        /// Position of the enclosed range
        inner: usize,
    },

    /// Handler ranges that overlap without nesting
    #[error("{function}: handlers #{first} and #{second} partially overlap")]
    HandlerOverlap {
        /// Function name
        function: String,
        /// Position of the first range
        first: usize,
        /// Position of the second range
        second: usize,
    },

    /// Closure creation naming a missing nested function
    #[error("{function}: opcode {index} refers to nested function {nested}, but only {len} exist")]
    NestedFunctionOutOfRange {
        /// Function name
        function: String,
        /// Offending opcode index
        index: usize,
        /// Nested table index
        nested: usize,
        /// Nested function count
        len: usize,
    },

    /// More argument slots than locals
    #[error("{function}: argument count {arg_count} exceeds {locals} locals")]
    ArgumentCount {
        /// Function name
        function: String,
        /// Declared argument count
        arg_count: u32,
        /// Local count
        locals: usize,
    },

    /// Argument slot that cannot hold a value
    #[error("{function}: argument slot {local} has kind {found:?}")]
    ArgumentKind {
        /// Function name
        function: String,
        /// Local slot
        local: LocalId,
        /// Declared kind
        found: LocalKind,
    },
}

/// Verify a function and, recursively, its nested functions
///
/// # Examples
///
/// ```
/// use bytecode_system::{verify, FunctionInfo, Opcode, VerifyError};
///
/// let mut info = FunctionInfo::new("broken");
/// info.emit(Opcode::Jump(5));
/// assert!(matches!(verify(&info), Err(VerifyError::JumpOutOfRange { .. })));
/// ```
pub fn verify(info: &FunctionInfo) -> Result<(), VerifyError> {
    verify_arguments(info)?;
    verify_opcodes(info)?;
    verify_handlers(info)?;
    for nested in &info.nested_functions {
        verify(nested)?;
    }
    Ok(())
}

fn verify_arguments(info: &FunctionInfo) -> Result<(), VerifyError> {
    if info.arg_count as usize > info.locals.len() {
        return Err(VerifyError::ArgumentCount {
            function: info.name.clone(),
            arg_count: info.arg_count,
            locals: info.locals.len(),
        });
    }
    for (slot, kind) in info.locals.iter().take(info.arg_count as usize).enumerate() {
        if *kind != LocalKind::Value {
            return Err(VerifyError::ArgumentKind {
                function: info.name.clone(),
                local: LocalId(slot as u32),
                found: *kind,
            });
        }
    }
    Ok(())
}

fn verify_opcodes(info: &FunctionInfo) -> Result<(), VerifyError> {
    let len = info.opcodes.len();
    for (index, opcode) in info.opcodes.iter().enumerate() {
        for target in opcode.jump_targets() {
            if target >= len {
                return Err(VerifyError::JumpOutOfRange {
                    function: info.name.clone(),
                    index,
                    target,
                    len,
                });
            }
        }

        for (local, expected) in opcode.local_operands() {
            match info.local_kind(local) {
                None => {
                    return Err(VerifyError::LocalOutOfRange {
                        function: info.name.clone(),
                        index,
                        local,
                        len: info.locals.len(),
                    })
                }
                Some(found) if found != expected => {
                    return Err(VerifyError::LocalKindMismatch {
                        function: info.name.clone(),
                        index,
                        local,
                        expected,
                        found,
                    })
                }
                Some(_) => {}
            }
        }

        if let Some(nested) = opcode.nested_function() {
            if nested >= info.nested_functions.len() {
                return Err(VerifyError::NestedFunctionOutOfRange {
                    function: info.name.clone(),
                    index,
                    nested,
                    len: info.nested_functions.len(),
                });
            }
        }
    }
    Ok(())
}

fn verify_handlers(info: &FunctionInfo) -> Result<(), VerifyError> {
    let len = info.opcodes.len();
    for range in &info.handlers {
        if range.start > range.end || range.end >= len || range.handler >= len {
            return Err(VerifyError::InvalidHandler {
                function: info.name.clone(),
                start: range.start,
                end: range.end,
                handler: range.handler,
            });
        }
    }

    for (i, earlier) in info.handlers.iter().enumerate() {
        for (j, later) in info.handlers.iter().enumerate().skip(i + 1) {
            if !earlier.overlaps(later) || later.contains_range(earlier) {
                continue;
            }
            if earlier.contains_range(later) {
                return Err(VerifyError::HandlerOrder {
                    function: info.name.clone(),
                    outer: i,
                    inner: j,
                });
            }
            return Err(VerifyError::HandlerOverlap {
                function: info.name.clone(),
                first: i,
                second: j,
            });
        }
    }
    Ok(())
}
