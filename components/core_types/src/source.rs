//! Activation frame information for error reporting.

use std::fmt;

/// One activation on the interpreter call stack at the time of an error.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame::new("main", 7);
/// assert_eq!(frame.to_string(), "    at main (opcode 7)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the compiled function, empty for anonymous bodies
    pub function_name: String,
    /// Index of the opcode that was executing
    pub opcode_index: usize,
}

impl StackFrame {
    /// Create a new stack frame
    pub fn new(function_name: impl Into<String>, opcode_index: usize) -> Self {
        Self {
            function_name: function_name.into(),
            opcode_index,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.function_name.is_empty() {
            "<anonymous>"
        } else {
            &self.function_name
        };
        write!(f, "    at {} (opcode {})", name, self.opcode_index)
    }
}
