//! Human-readable disassembly of compiled functions

use crate::function_info::FunctionInfo;
use std::fmt::Write;

impl FunctionInfo {
    /// Render the function and its nested functions as text
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{FunctionInfo, Opcode};
    ///
    /// let mut info = FunctionInfo::new("main");
    /// info.emit(Opcode::PushUndefined);
    /// info.emit(Opcode::Return);
    ///
    /// let text = info.disassemble();
    /// assert!(text.starts_with("=== main ==="));
    /// assert!(text.contains("  1.  Return"));
    /// ```
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.write_disassembly(&mut out);
        out
    }

    fn write_disassembly(&self, out: &mut String) {
        // Writing into a String cannot fail
        let _ = writeln!(out, "=== {} ===", self.name);
        let _ = writeln!(out, "Parameter count: {}", self.arg_count);
        let _ = writeln!(out, "Local count: {}", self.locals.len());
        let _ = writeln!(out, "Opcode count: {}", self.opcodes.len());
        let _ = writeln!(out, "Opcodes:");
        for (index, opcode) in self.opcodes.iter().enumerate() {
            let _ = match opcode.nested_function() {
                Some(n) => match self.nested_functions.get(n) {
                    Some(nested) => writeln!(out, "  {:>3}.  {} <{}>", index, opcode.name(), nested.name),
                    None => writeln!(out, "  {:>3}.  {}", index, opcode),
                },
                None => writeln!(out, "  {:>3}.  {}", index, opcode),
            };
        }

        if !self.handlers.is_empty() {
            let _ = writeln!(out, "\nHandlers:");
            for handler in &self.handlers {
                let _ = writeln!(out, "    {}-{}: {}", handler.start, handler.end, handler.handler);
            }
        }

        for nested in &self.nested_functions {
            out.push('\n');
            nested.write_disassembly(out);
        }
    }
}
