//! Compile-time literal operands
//!
//! Literals are embedded directly in [`Opcode::PushConstant`](crate::Opcode)
//! rather than referenced through a constant pool.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value known at compile time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// String literal
    String(String),
    /// Integral number literal
    Integer(i32),
    /// Non-integral or large number literal
    Number(f64),
    /// Boolean literal
    Boolean(bool),
}

impl Constant {
    /// Check if the literal is numeric
    pub fn is_number(&self) -> bool {
        matches!(self, Constant::Integer(_) | Constant::Number(_))
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::String(s.to_string())
    }
}

impl From<i32> for Constant {
    fn from(n: i32) -> Self {
        Constant::Integer(n)
    }
}

impl From<f64> for Constant {
    fn from(n: f64) -> Self {
        Constant::Number(n)
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Constant::Boolean(b)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::String(s) => write!(f, "\"{}\"", s),
            Constant::Integer(n) => write!(f, "{}", n),
            Constant::Number(n) => write!(f, "{}", n),
            Constant::Boolean(b) => write!(f, "{}", b),
        }
    }
}
