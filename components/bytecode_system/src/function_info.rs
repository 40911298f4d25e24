//! Compiled function units
//!
//! A [`FunctionInfo`] is the immutable product of compilation: opcodes, typed
//! local slots, the exception handler table and the nested functions that
//! closure-creation opcodes refer to. The builder methods here are used by
//! front ends and tests to assemble one.

use crate::opcode::{LocalId, Opcode};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Slot holding the receiver (`this`) of a callable body
pub const RECEIVER_LOCAL: LocalId = LocalId(0);

/// Slot holding `new.target` of a callable body
pub const NEW_TARGET_LOCAL: LocalId = LocalId(1);

/// Slot holding the generator state of a generator body
pub const GENERATOR_STATE_LOCAL: LocalId = LocalId(2);

/// Static kind of a local slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalKind {
    /// Raw 32-bit integer
    Int,
    /// Raw boolean
    Boolean,
    /// Any JavaScript value
    Value,
}

/// How a function body is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Runs to completion on each call
    #[default]
    Normal,
    /// Each call produces a suspended generator object
    Generator,
}

/// Exception handler covering opcodes `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRange {
    /// First covered opcode index
    pub start: usize,
    /// Last covered opcode index (inclusive)
    pub end: usize,
    /// Opcode index control transfers to
    pub handler: usize,
}

impl HandlerRange {
    /// Create a new handler range
    pub fn new(start: usize, end: usize, handler: usize) -> Self {
        Self {
            start,
            end,
            handler,
        }
    }

    /// Check if the opcode index falls inside this range
    pub fn covers(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    /// Check if `other` lies entirely within this range
    pub fn contains_range(&self, other: &HandlerRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check if the two ranges share at least one opcode index
    pub fn overlaps(&self, other: &HandlerRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Compiled function body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Function name used in diagnostics
    pub name: String,
    /// Number of leading locals filled from the argument list
    pub arg_count: u32,
    /// Strict mode code
    pub is_strict: bool,
    /// Invocation kind
    pub kind: FunctionKind,
    /// Kind of each local slot
    pub locals: Vec<LocalKind>,
    /// Instruction stream
    pub opcodes: Vec<Opcode>,
    /// Handler table, innermost ranges first
    pub handlers: Vec<HandlerRange>,
    /// Functions referenced by closure-creation opcodes
    pub nested_functions: Vec<Rc<FunctionInfo>>,
}

impl FunctionInfo {
    /// Create an empty function body with no locals
    ///
    /// Suitable for script and module bodies, which receive no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_count: 0,
            is_strict: false,
            kind: FunctionKind::Normal,
            locals: Vec::new(),
            opcodes: Vec::new(),
            handlers: Vec::new(),
            nested_functions: Vec::new(),
        }
    }

    /// Create a callable body with the receiver and new-target slots reserved
    ///
    /// Generator bodies additionally reserve [`GENERATOR_STATE_LOCAL`].
    /// `param_count` further value slots receive the call arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{FunctionInfo, FunctionKind};
    ///
    /// let info = FunctionInfo::callable("add", FunctionKind::Normal, 2);
    /// assert_eq!(info.arg_count, 4);
    /// assert_eq!(info.locals.len(), 4);
    /// ```
    pub fn callable(name: impl Into<String>, kind: FunctionKind, param_count: u32) -> Self {
        let mut info = Self::new(name);
        info.kind = kind;
        info.add_local(LocalKind::Value);
        info.add_local(LocalKind::Value);
        if kind == FunctionKind::Generator {
            info.add_local(LocalKind::Value);
        }
        for _ in 0..param_count {
            info.add_local(LocalKind::Value);
        }
        info.arg_count = info.locals.len() as u32;
        info
    }

    /// Mark the body as strict mode code
    pub fn strict(mut self) -> Self {
        self.is_strict = true;
        self
    }

    /// Check if calls produce generator objects
    pub fn is_generator(&self) -> bool {
        self.kind == FunctionKind::Generator
    }

    /// Allocate a new local slot
    pub fn add_local(&mut self, kind: LocalKind) -> LocalId {
        self.locals.push(kind);
        LocalId((self.locals.len() - 1) as u32)
    }

    /// Kind of a local slot, if it exists
    pub fn local_kind(&self, local: LocalId) -> Option<LocalKind> {
        self.locals.get(local.index()).copied()
    }

    /// Append an opcode and return its index
    pub fn emit(&mut self, opcode: Opcode) -> usize {
        self.opcodes.push(opcode);
        self.opcodes.len() - 1
    }

    /// Point the jump at `index` to `target`
    ///
    /// Returns false if the opcode at `index` is not a single-target jump.
    pub fn patch_jump(&mut self, index: usize, target: usize) -> bool {
        match self.opcodes.get_mut(index).and_then(Opcode::jump_target_mut) {
            Some(slot) => {
                *slot = target;
                true
            }
            None => false,
        }
    }

    /// Index the next emitted opcode will occupy
    pub fn opcode_count(&self) -> usize {
        self.opcodes.len()
    }

    /// Register an exception handler range
    ///
    /// The table stays ordered innermost-first: a range nested inside an
    /// existing one is placed before it, so the first match during lookup is
    /// always the innermost enclosing range.
    pub fn add_handler(&mut self, range: HandlerRange) {
        let position = self
            .handlers
            .iter()
            .position(|existing| existing.contains_range(&range) && *existing != range)
            .unwrap_or(self.handlers.len());
        self.handlers.insert(position, range);
    }

    /// First (innermost) handler covering the opcode index
    pub fn find_handler(&self, index: usize) -> Option<&HandlerRange> {
        self.handlers.iter().find(|h| h.covers(index))
    }

    /// Add a nested function and return its table index
    pub fn add_nested_function(&mut self, info: FunctionInfo) -> usize {
        self.nested_functions.push(Rc::new(info));
        self.nested_functions.len() - 1
    }

    /// Serialize to the JSON interchange format
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from the JSON interchange format
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
