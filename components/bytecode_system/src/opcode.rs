//! Bytecode opcodes for JavaScript runtime
//!
//! Defines the closed instruction set of the stack machine. Every opcode has a
//! static stack effect; typed local opcodes name the slot they touch and jump
//! opcodes carry absolute opcode indices.

use crate::constant::Constant;
use crate::function_info::LocalKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Local slot identifier within a single function activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(pub u32);

impl LocalId {
    /// Slot index as a usize
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// Bytecode opcodes for JavaScript execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Opcode {
    // Stack manipulation
    /// Discard top of stack
    Pop,
    /// Duplicate top of stack
    Dup,
    /// Duplicate top of stack below the second element
    DupX1,
    /// Duplicate top of stack below the third element
    DupX2,
    /// Swap the top two elements
    Swap,

    // Literals
    /// Push undefined
    PushUndefined,
    /// Push null
    PushNull,
    /// Push a compile-time literal
    PushConstant(Constant),
    /// Push a BigInt parsed from its decimal digits
    PushBigInt(String),
    /// Push a raw integer operand (used for typed int locals and phase tables)
    PushInt(i32),
    /// Push boolean true
    PushTrue,
    /// Push boolean false
    PushFalse,

    // Typed locals
    /// Push an int local
    LoadInt(LocalId),
    /// Pop into an int local
    StoreInt(LocalId),
    /// Increment an int local in place
    IncInt(LocalId),
    /// Push a boolean local
    LoadBoolean(LocalId),
    /// Pop into a boolean local
    StoreBoolean(LocalId),
    /// Push a value local
    LoadValue(LocalId),
    /// Pop into a value local
    StoreValue(LocalId),

    // Binary operators: right operand on top, left below
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `**`
    Exp,
    /// `%`
    Mod,
    /// `&`
    BitwiseAnd,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `>>>`
    ShiftRightUnsigned,
    /// `===`
    TestEqualStrict,
    /// `!==`
    TestNotEqualStrict,
    /// `==`
    TestEqual,
    /// `!=`
    TestNotEqual,
    /// `<`
    TestLessThan,
    /// `<=`
    TestLessThanOrEqual,
    /// `>`
    TestGreaterThan,
    /// `>=`
    TestGreaterThanOrEqual,
    /// `instanceof`
    TestInstanceOf,
    /// `in`
    TestIn,

    // Unary operators
    /// `typeof`
    TypeOf,
    /// Unary `+`
    ToNumber,
    /// ToNumeric (keeps BigInt)
    ToNumeric,
    /// ToString
    ToString,
    /// Unary `-`
    Negate,
    /// `~`
    BitwiseNot,
    /// `!`
    ToBooleanLogicalNot,
    /// Numeric increment
    Inc,
    /// Numeric decrement
    Dec,

    // Objects and properties
    /// Pop key and base, push `base[key]`
    LoadKeyedProperty,
    /// Pop value, key and base, perform `base[key] = value`
    StoreKeyedProperty,
    /// Pop base, push `base.name`
    LoadNamedProperty(String),
    /// Pop value and base, perform `base.name = value`
    StoreNamedProperty(String),
    /// Strict-mode `delete base[key]`, throws on failure
    DeletePropertyStrict,
    /// Sloppy-mode `delete base[key]`, pushes the result
    DeletePropertySloppy,
    /// Push a fresh ordinary object
    CreateObject,
    /// Push a fresh empty array
    CreateArray,
    /// Pop a value and append it to the array held in `array` at the int
    /// position held in `index`, then increment `index`
    StoreArray {
        /// Value local holding the array
        array: LocalId,
        /// Int local holding the next index
        index: LocalId,
    },
    /// Pop a value and store it at a fixed index of the array held in `array`
    StoreArrayIndexed {
        /// Value local holding the array
        array: LocalId,
        /// Target element index
        index: u32,
    },
    /// Pop `n` parts and push their string concatenation
    CreateTemplateLiteral(u32),

    // Calls
    /// Pop `n` arguments, the receiver and the callee; push the result
    Call(u32),
    /// Pop `n` arguments, the new target and the constructor; push the result
    Construct(u32),

    // Environments
    /// Declare script-level bindings on the global record
    DeclareGlobals {
        /// `var` names
        vars: Vec<String>,
        /// `let`/`const`/`class` names
        lexicals: Vec<String>,
        /// Function declaration names
        functions: Vec<String>,
    },
    /// Push a declarative record with the given slot count
    PushDeclarativeEnvRecord(u32),
    /// Restore the active record's parent
    PopEnvRecord,
    /// Push a global binding, ReferenceError if absent
    LoadGlobal(String),
    /// Pop into a global binding
    StoreGlobal(String),
    /// Push a slot of the active record
    LoadCurrentEnvSlot(u32),
    /// Pop into a slot of the active record
    StoreCurrentEnvSlot(u32),
    /// Push a slot of a record `distance` parents up
    LoadEnvSlot {
        /// Slot index
        slot: u32,
        /// Parent hops from the active record
        distance: u32,
    },
    /// Pop into a slot of a record `distance` parents up
    StoreEnvSlot {
        /// Slot index
        slot: u32,
        /// Parent hops from the active record
        distance: u32,
    },
    /// Push a binding of the nearest module record
    LoadModuleVar(String),
    /// Pop into a binding of the nearest module record
    StoreModuleVar(String),

    // Errors
    /// Pop a value and throw it
    Throw,
    /// Throw a TypeError for assignment to a constant
    ThrowConstantReassignmentError(String),
    /// Throw a ReferenceError for access before initialization
    ThrowLexicalAccessError(String),

    // Control flow
    /// Unconditional jump
    Jump(usize),
    /// Pop a boolean, jump if true
    JumpIfTrue(usize),
    /// Pop a boolean, jump if false
    JumpIfFalse(usize),
    /// Pop a value, jump if truthy
    JumpIfToBooleanTrue(usize),
    /// Pop a value, jump if falsy
    JumpIfToBooleanFalse(usize),
    /// Pop a value, jump if undefined
    JumpIfUndefined(usize),
    /// Pop a value, jump unless undefined
    JumpIfNotUndefined(usize),
    /// Pop a value, jump unless null or undefined
    JumpIfNotNullish(usize),
    /// Pop an int, jump to the mapped target
    JumpTable(BTreeMap<i32, usize>),
    /// Pop the completion value and finish the activation
    Return,

    // Closures
    /// Push a closure over nested function `n` capturing the active record
    CreateClosure(usize),
    /// Push a generator function over nested function `n`
    CreateGeneratorClosure(usize),

    // Generators
    /// Push the current generator phase as an int
    GetGeneratorPhase,
    /// Record the generator phase
    SetGeneratorPhase(i32),
    /// Consume the pending resume request
    GeneratorSentValue,
    /// Pop a value and suspend the activation with it
    Yield,
}

impl Opcode {
    /// Static stack effect as `(pops, pushes)`
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::Opcode;
    ///
    /// assert_eq!(Opcode::Add.stack_effect(), (2, 1));
    /// assert_eq!(Opcode::Call(2).stack_effect(), (4, 1));
    /// ```
    pub fn stack_effect(&self) -> (u32, u32) {
        use Opcode::*;
        match self {
            Pop => (1, 0),
            Dup => (1, 2),
            DupX1 => (2, 3),
            DupX2 => (3, 4),
            Swap => (2, 2),

            PushUndefined | PushNull | PushConstant(_) | PushBigInt(_) | PushInt(_) | PushTrue
            | PushFalse => (0, 1),

            LoadInt(_) | LoadBoolean(_) | LoadValue(_) => (0, 1),
            StoreInt(_) | StoreBoolean(_) | StoreValue(_) => (1, 0),
            IncInt(_) => (0, 0),

            Add | Sub | Mul | Div | Exp | Mod | BitwiseAnd | BitwiseOr | BitwiseXor | ShiftLeft
            | ShiftRight | ShiftRightUnsigned | TestEqualStrict | TestNotEqualStrict
            | TestEqual | TestNotEqual | TestLessThan | TestLessThanOrEqual | TestGreaterThan
            | TestGreaterThanOrEqual | TestInstanceOf | TestIn => (2, 1),

            TypeOf | ToNumber | ToNumeric | ToString | Negate | BitwiseNot
            | ToBooleanLogicalNot | Inc | Dec => (1, 1),

            LoadKeyedProperty => (2, 1),
            StoreKeyedProperty => (3, 0),
            LoadNamedProperty(_) => (1, 1),
            StoreNamedProperty(_) => (2, 0),
            DeletePropertyStrict | DeletePropertySloppy => (2, 1),
            CreateObject | CreateArray => (0, 1),
            StoreArray { .. } | StoreArrayIndexed { .. } => (1, 0),
            CreateTemplateLiteral(n) => (*n, 1),

            Call(n) | Construct(n) => (n + 2, 1),

            DeclareGlobals { .. } | PushDeclarativeEnvRecord(_) | PopEnvRecord => (0, 0),
            LoadGlobal(_) | LoadCurrentEnvSlot(_) | LoadEnvSlot { .. } | LoadModuleVar(_) => {
                (0, 1)
            }
            StoreGlobal(_) | StoreCurrentEnvSlot(_) | StoreEnvSlot { .. } | StoreModuleVar(_) => {
                (1, 0)
            }

            Throw => (1, 0),
            ThrowConstantReassignmentError(_) | ThrowLexicalAccessError(_) => (0, 0),

            Jump(_) => (0, 0),
            JumpIfTrue(_) | JumpIfFalse(_) | JumpIfToBooleanTrue(_) | JumpIfToBooleanFalse(_)
            | JumpIfUndefined(_) | JumpIfNotUndefined(_) | JumpIfNotNullish(_) => (1, 0),
            JumpTable(_) => (1, 0),
            Return => (1, 0),

            CreateClosure(_) | CreateGeneratorClosure(_) => (0, 1),

            GetGeneratorPhase => (0, 1),
            SetGeneratorPhase(_) => (0, 0),
            GeneratorSentValue => (0, 1),
            Yield => (1, 0),
        }
    }

    /// Absolute opcode indices this instruction may transfer control to
    pub fn jump_targets(&self) -> Vec<usize> {
        use Opcode::*;
        match self {
            Jump(t) | JumpIfTrue(t) | JumpIfFalse(t) | JumpIfToBooleanTrue(t)
            | JumpIfToBooleanFalse(t) | JumpIfUndefined(t) | JumpIfNotUndefined(t)
            | JumpIfNotNullish(t) => vec![*t],
            JumpTable(table) => table.values().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable access to a single jump target, if this is a simple jump
    pub(crate) fn jump_target_mut(&mut self) -> Option<&mut usize> {
        use Opcode::*;
        match self {
            Jump(t) | JumpIfTrue(t) | JumpIfFalse(t) | JumpIfToBooleanTrue(t)
            | JumpIfToBooleanFalse(t) | JumpIfUndefined(t) | JumpIfNotUndefined(t)
            | JumpIfNotNullish(t) => Some(t),
            _ => None,
        }
    }

    /// Typed local slots this instruction reads or writes
    pub fn local_operands(&self) -> Vec<(LocalId, LocalKind)> {
        use Opcode::*;
        match self {
            LoadInt(l) | StoreInt(l) | IncInt(l) => vec![(*l, LocalKind::Int)],
            LoadBoolean(l) | StoreBoolean(l) => vec![(*l, LocalKind::Boolean)],
            LoadValue(l) | StoreValue(l) => vec![(*l, LocalKind::Value)],
            StoreArray { array, index } => {
                vec![(*array, LocalKind::Value), (*index, LocalKind::Int)]
            }
            StoreArrayIndexed { array, .. } => vec![(*array, LocalKind::Value)],
            _ => Vec::new(),
        }
    }

    /// Index into the nested function table, for closure creation opcodes
    pub fn nested_function(&self) -> Option<usize> {
        match self {
            Opcode::CreateClosure(n) | Opcode::CreateGeneratorClosure(n) => Some(*n),
            _ => None,
        }
    }

    /// Check if control never falls through to the next opcode
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Jump(_)
                | Opcode::JumpTable(_)
                | Opcode::Return
                | Opcode::Throw
                | Opcode::ThrowConstantReassignmentError(_)
                | Opcode::ThrowLexicalAccessError(_)
        )
    }

    /// Mnemonic used by the disassembler
    pub fn name(&self) -> &'static str {
        use Opcode::*;
        match self {
            Pop => "Pop",
            Dup => "Dup",
            DupX1 => "DupX1",
            DupX2 => "DupX2",
            Swap => "Swap",
            PushUndefined => "PushUndefined",
            PushNull => "PushNull",
            PushConstant(_) => "PushConstant",
            PushBigInt(_) => "PushBigInt",
            PushInt(_) => "PushInt",
            PushTrue => "PushTrue",
            PushFalse => "PushFalse",
            LoadInt(_) => "LoadInt",
            StoreInt(_) => "StoreInt",
            IncInt(_) => "IncInt",
            LoadBoolean(_) => "LoadBoolean",
            StoreBoolean(_) => "StoreBoolean",
            LoadValue(_) => "LoadValue",
            StoreValue(_) => "StoreValue",
            Add => "Add",
            Sub => "Sub",
            Mul => "Mul",
            Div => "Div",
            Exp => "Exp",
            Mod => "Mod",
            BitwiseAnd => "BitwiseAnd",
            BitwiseOr => "BitwiseOr",
            BitwiseXor => "BitwiseXor",
            ShiftLeft => "ShiftLeft",
            ShiftRight => "ShiftRight",
            ShiftRightUnsigned => "ShiftRightUnsigned",
            TestEqualStrict => "TestEqualStrict",
            TestNotEqualStrict => "TestNotEqualStrict",
            TestEqual => "TestEqual",
            TestNotEqual => "TestNotEqual",
            TestLessThan => "TestLessThan",
            TestLessThanOrEqual => "TestLessThanOrEqual",
            TestGreaterThan => "TestGreaterThan",
            TestGreaterThanOrEqual => "TestGreaterThanOrEqual",
            TestInstanceOf => "TestInstanceOf",
            TestIn => "TestIn",
            TypeOf => "TypeOf",
            ToNumber => "ToNumber",
            ToNumeric => "ToNumeric",
            ToString => "ToString",
            Negate => "Negate",
            BitwiseNot => "BitwiseNot",
            ToBooleanLogicalNot => "ToBooleanLogicalNot",
            Inc => "Inc",
            Dec => "Dec",
            LoadKeyedProperty => "LoadKeyedProperty",
            StoreKeyedProperty => "StoreKeyedProperty",
            LoadNamedProperty(_) => "LoadNamedProperty",
            StoreNamedProperty(_) => "StoreNamedProperty",
            DeletePropertyStrict => "DeletePropertyStrict",
            DeletePropertySloppy => "DeletePropertySloppy",
            CreateObject => "CreateObject",
            CreateArray => "CreateArray",
            StoreArray { .. } => "StoreArray",
            StoreArrayIndexed { .. } => "StoreArrayIndexed",
            CreateTemplateLiteral(_) => "CreateTemplateLiteral",
            Call(_) => "Call",
            Construct(_) => "Construct",
            DeclareGlobals { .. } => "DeclareGlobals",
            PushDeclarativeEnvRecord(_) => "PushDeclarativeEnvRecord",
            PopEnvRecord => "PopEnvRecord",
            LoadGlobal(_) => "LoadGlobal",
            StoreGlobal(_) => "StoreGlobal",
            LoadCurrentEnvSlot(_) => "LoadCurrentEnvSlot",
            StoreCurrentEnvSlot(_) => "StoreCurrentEnvSlot",
            LoadEnvSlot { .. } => "LoadEnvSlot",
            StoreEnvSlot { .. } => "StoreEnvSlot",
            LoadModuleVar(_) => "LoadModuleVar",
            StoreModuleVar(_) => "StoreModuleVar",
            Throw => "Throw",
            ThrowConstantReassignmentError(_) => "ThrowConstantReassignmentError",
            ThrowLexicalAccessError(_) => "ThrowLexicalAccessError",
            Jump(_) => "Jump",
            JumpIfTrue(_) => "JumpIfTrue",
            JumpIfFalse(_) => "JumpIfFalse",
            JumpIfToBooleanTrue(_) => "JumpIfToBooleanTrue",
            JumpIfToBooleanFalse(_) => "JumpIfToBooleanFalse",
            JumpIfUndefined(_) => "JumpIfUndefined",
            JumpIfNotUndefined(_) => "JumpIfNotUndefined",
            JumpIfNotNullish(_) => "JumpIfNotNullish",
            JumpTable(_) => "JumpTable",
            Return => "Return",
            CreateClosure(_) => "CreateClosure",
            CreateGeneratorClosure(_) => "CreateGeneratorClosure",
            GetGeneratorPhase => "GetGeneratorPhase",
            SetGeneratorPhase(_) => "SetGeneratorPhase",
            GeneratorSentValue => "GeneratorSentValue",
            Yield => "Yield",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Opcode::*;
        write!(f, "{}", self.name())?;
        match self {
            PushConstant(c) => write!(f, " {}", c),
            PushBigInt(digits) => write!(f, " {}n", digits),
            PushInt(n) => write!(f, " {}", n),
            LoadInt(l) | StoreInt(l) | IncInt(l) | LoadBoolean(l) | StoreBoolean(l)
            | LoadValue(l) | StoreValue(l) => write!(f, " {}", l),
            LoadNamedProperty(name)
            | StoreNamedProperty(name)
            | LoadGlobal(name)
            | StoreGlobal(name)
            | LoadModuleVar(name)
            | StoreModuleVar(name)
            | ThrowConstantReassignmentError(name)
            | ThrowLexicalAccessError(name) => write!(f, " \"{}\"", name),
            StoreArray { array, index } => write!(f, " {} {}", array, index),
            StoreArrayIndexed { array, index } => write!(f, " {} #{}", array, index),
            CreateTemplateLiteral(n) | Call(n) | Construct(n) => write!(f, " {}", n),
            DeclareGlobals {
                vars,
                lexicals,
                functions,
            } => write!(
                f,
                " vars={:?} lexicals={:?} functions={:?}",
                vars, lexicals, functions
            ),
            PushDeclarativeEnvRecord(n) => write!(f, " {}", n),
            LoadCurrentEnvSlot(slot) | StoreCurrentEnvSlot(slot) => write!(f, " #{}", slot),
            LoadEnvSlot { slot, distance } | StoreEnvSlot { slot, distance } => {
                write!(f, " #{} @{}", slot, distance)
            }
            Jump(t) | JumpIfTrue(t) | JumpIfFalse(t) | JumpIfToBooleanTrue(t)
            | JumpIfToBooleanFalse(t) | JumpIfUndefined(t) | JumpIfNotUndefined(t)
            | JumpIfNotNullish(t) => write!(f, " @{}", t),
            JumpTable(table) => {
                for (key, target) in table {
                    write!(f, " {}: @{}", key, target)?;
                }
                Ok(())
            }
            CreateClosure(n) | CreateGeneratorClosure(n) => write!(f, " <nested {}>", n),
            SetGeneratorPhase(phase) => write!(f, " #{}", phase),
            _ => Ok(()),
        }
    }
}
