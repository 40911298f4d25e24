//! Dispatch loop for bytecode execution
//!
//! An [`Interpreter`] is one activation of a [`FunctionInfo`]: an operand
//! stack, typed local slots, an instruction pointer and the active
//! environment record. It owns its stack and locals; environments are shared
//! through the realm's arena.
//!
//! Every throw raised by an opcode is caught at the top of the loop. The
//! handler table is scanned for the first range covering the faulting opcode;
//! on a match the thrown value is pushed and execution continues at the
//! handler. The operand stack is not unwound. Internal errors are logged and
//! propagate without consulting handlers.

use crate::environment::{BindingError, EnvId};
use crate::error::{Abrupt, InternalError, JsResult};
use crate::generator::GeneratorState;
use crate::operations::{self, BinaryOp};
use crate::realm::Realm;
use bytecode_system::{
    Constant, FunctionInfo, LocalId, LocalKind, Opcode, GENERATOR_STATE_LOCAL,
};
use core_types::{JsError, StackFrame, Value};
use num_bigint::BigInt;
use std::rc::Rc;

/// Entry on the operand stack
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// JavaScript value
    Value(Value),
    /// Raw integer, produced by int locals and phase dispatch
    Int(i32),
    /// Raw boolean, produced by boolean locals
    Boolean(bool),
}

impl Operand {
    fn kind_name(&self) -> &'static str {
        match self {
            Operand::Value(_) => "value",
            Operand::Int(_) => "int",
            Operand::Boolean(_) => "boolean",
        }
    }
}

/// Content of a local slot
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Local {
    Int(i32),
    Boolean(bool),
    Value(Value),
    Generator(GeneratorState),
}

impl Local {
    fn kind_name(&self) -> &'static str {
        match self {
            Local::Int(_) => "int",
            Local::Boolean(_) => "boolean",
            Local::Value(_) => "value",
            Local::Generator(_) => "generator state",
        }
    }

    fn initial(kind: LocalKind) -> Self {
        match kind {
            LocalKind::Int => Local::Int(0),
            LocalKind::Boolean => Local::Boolean(false),
            LocalKind::Value => Local::Value(Value::Undefined),
        }
    }
}

fn kind_name(kind: LocalKind) -> &'static str {
    match kind {
        LocalKind::Int => "int",
        LocalKind::Boolean => "boolean",
        LocalKind::Value => "value",
    }
}

/// Outcome of [`Interpreter::interpret`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Returned normally with a value
    Success(Value),
    /// Terminated by an uncaught throw
    RuntimeError(Value),
    /// Terminated by an engine invariant violation
    InternalError(InternalError),
}

impl ExecutionResult {
    /// Convert into a completion for a calling activation
    pub fn into_completion(self) -> JsResult<Value> {
        match self {
            ExecutionResult::Success(value) => Ok(value),
            ExecutionResult::RuntimeError(value) => Err(Abrupt::Throw(value)),
            ExecutionResult::InternalError(error) => Err(Abrupt::Internal(error)),
        }
    }

    /// Check for normal completion
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }
}

/// How a run of the dispatch loop stopped
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Completion {
    Return(Value),
    Yield(Value),
    Throw(Value),
}

enum Step {
    Continue,
    Return(Value),
    Yield(Value),
}

/// One activation of a compiled function
#[derive(Debug)]
pub struct Interpreter {
    info: Rc<FunctionInfo>,
    stack: Vec<Operand>,
    locals: Vec<Local>,
    active_env: EnvId,
    ip: usize,
    is_done: bool,
}

impl Interpreter {
    /// Create an activation
    ///
    /// `arguments` are copied into the leading local slots; every other slot
    /// starts at the default of its kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{Constant, FunctionInfo, Opcode};
    /// use core_types::Value;
    /// use interpreter::{ExecutionResult, Interpreter, Realm};
    /// use std::rc::Rc;
    ///
    /// let mut info = FunctionInfo::new("main");
    /// info.emit(Opcode::PushConstant(Constant::Integer(1)));
    /// info.emit(Opcode::Return);
    ///
    /// let mut realm = Realm::new();
    /// let env = realm.global_env();
    /// let result = Interpreter::new(Rc::new(info), Vec::new(), env).interpret(&mut realm);
    /// assert_eq!(result, ExecutionResult::Success(Value::Smi(1)));
    /// ```
    pub fn new(info: Rc<FunctionInfo>, arguments: Vec<Value>, env: EnvId) -> Self {
        let mut locals: Vec<Local> = info.locals.iter().copied().map(Local::initial).collect();
        for (slot, argument) in locals.iter_mut().zip(arguments) {
            *slot = Local::Value(argument);
        }
        Self {
            info,
            stack: Vec::new(),
            locals,
            active_env: env,
            ip: 0,
            is_done: false,
        }
    }

    /// Function being executed
    pub fn info(&self) -> &Rc<FunctionInfo> {
        &self.info
    }

    /// Index of the next opcode
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Current operand stack height
    pub fn stack_height(&self) -> usize {
        self.stack.len()
    }

    /// Environment record currently in scope
    pub fn active_env(&self) -> EnvId {
        self.active_env
    }

    /// Check if the activation has finished
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// Run the activation to completion
    pub fn interpret(&mut self, realm: &mut Realm) -> ExecutionResult {
        log::trace!(
            "enter {} ({} locals, depth {})",
            self.info.name,
            self.locals.len(),
            realm.call_depth()
        );
        match self.run(realm) {
            Ok(Completion::Return(value)) => ExecutionResult::Success(value),
            Ok(Completion::Throw(value)) => ExecutionResult::RuntimeError(value),
            Ok(Completion::Yield(_)) => {
                log::error!("{} yielded outside a generator drive", self.info.name);
                ExecutionResult::InternalError(InternalError::UnexpectedYield)
            }
            Err(error) => ExecutionResult::InternalError(error),
        }
    }

    /// Restart dispatch at the first opcode, keeping stack and locals
    pub(crate) fn rewind(&mut self) {
        self.ip = 0;
        self.is_done = false;
    }

    pub(crate) fn install_generator_state(
        &mut self,
        state: GeneratorState,
    ) -> Result<(), InternalError> {
        let slot = self
            .locals
            .get_mut(GENERATOR_STATE_LOCAL.index())
            .ok_or(InternalError::LocalOutOfRange(GENERATOR_STATE_LOCAL.0))?;
        *slot = Local::Generator(state);
        Ok(())
    }

    pub(crate) fn generator_state(&self) -> Result<&GeneratorState, InternalError> {
        match self.locals.get(GENERATOR_STATE_LOCAL.index()) {
            Some(Local::Generator(state)) => Ok(state),
            _ => Err(InternalError::NotGenerator),
        }
    }

    pub(crate) fn generator_state_mut(&mut self) -> Result<&mut GeneratorState, InternalError> {
        match self.locals.get_mut(GENERATOR_STATE_LOCAL.index()) {
            Some(Local::Generator(state)) => Ok(state),
            _ => Err(InternalError::NotGenerator),
        }
    }

    /// Dispatch until the activation returns, yields or throws
    pub(crate) fn run(&mut self, realm: &mut Realm) -> Result<Completion, InternalError> {
        let info = Rc::clone(&self.info);
        while !self.is_done {
            let index = self.ip;
            let step = match info.opcodes.get(index) {
                Some(opcode) => {
                    self.ip += 1;
                    self.execute(realm, opcode)
                }
                None => Err(InternalError::IpOutOfRange(index).into()),
            };

            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Yield(value)) => return Ok(Completion::Yield(value)),
                Ok(Step::Return(value)) => {
                    self.is_done = true;
                    return Ok(Completion::Return(value));
                }
                Err(Abrupt::Throw(value)) => match info.find_handler(index) {
                    Some(handler) => {
                        self.ip = handler.handler;
                        self.stack.push(Operand::Value(value));
                    }
                    None => {
                        self.is_done = true;
                        return Ok(Completion::Throw(value));
                    }
                },
                Err(Abrupt::Internal(error)) => {
                    log::error!(
                        "internal error in {} at opcode {}: {}",
                        info.name,
                        index,
                        error
                    );
                    self.is_done = true;
                    return Err(error);
                }
            }
        }
        Err(InternalError::IpOutOfRange(self.ip))
    }

    // -----------------------------------------------------------------------
    // Stack and local helpers
    // -----------------------------------------------------------------------

    /// Frame of the opcode being executed
    fn frame(&self) -> StackFrame {
        StackFrame::new(self.info.name.clone(), self.ip.saturating_sub(1))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(Operand::Value(value));
    }

    fn pop(&mut self) -> Result<Operand, InternalError> {
        self.stack.pop().ok_or(InternalError::StackUnderflow)
    }

    fn pop_value(&mut self) -> Result<Value, InternalError> {
        match self.pop()? {
            Operand::Value(value) => Ok(value),
            other => Err(InternalError::OperandKind {
                expected: "value",
                found: other.kind_name(),
            }),
        }
    }

    fn pop_int(&mut self) -> Result<i32, InternalError> {
        match self.pop()? {
            Operand::Int(n) => Ok(n),
            other => Err(InternalError::OperandKind {
                expected: "int",
                found: other.kind_name(),
            }),
        }
    }

    fn pop_boolean(&mut self) -> Result<bool, InternalError> {
        match self.pop()? {
            Operand::Boolean(b) | Operand::Value(Value::Boolean(b)) => Ok(b),
            other => Err(InternalError::OperandKind {
                expected: "boolean",
                found: other.kind_name(),
            }),
        }
    }

    fn pop_arguments(&mut self, count: u32) -> Result<Vec<Value>, InternalError> {
        let mut arguments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            arguments.push(self.pop_value()?);
        }
        arguments.reverse();
        Ok(arguments)
    }

    fn check_kind(&self, local: LocalId, expected: LocalKind) -> Result<usize, InternalError> {
        match self.info.local_kind(local) {
            None => Err(InternalError::LocalOutOfRange(local.0)),
            Some(kind) if kind != expected => Err(InternalError::LocalKind {
                local: local.0,
                expected: kind_name(expected),
                found: kind_name(kind),
            }),
            Some(_) => Ok(local.index()),
        }
    }

    fn local(&self, local: LocalId) -> Result<&Local, InternalError> {
        self.locals
            .get(local.index())
            .ok_or(InternalError::LocalOutOfRange(local.0))
    }

    fn load_int(&self, local: LocalId) -> Result<i32, InternalError> {
        self.check_kind(local, LocalKind::Int)?;
        match self.local(local)? {
            Local::Int(n) => Ok(*n),
            other => Err(InternalError::LocalKind {
                local: local.0,
                expected: "int",
                found: other.kind_name(),
            }),
        }
    }

    fn load_value(&self, local: LocalId) -> Result<Value, InternalError> {
        self.check_kind(local, LocalKind::Value)?;
        match self.local(local)? {
            Local::Value(value) => Ok(value.clone()),
            other => Err(InternalError::LocalKind {
                local: local.0,
                expected: "value",
                found: other.kind_name(),
            }),
        }
    }

    fn store(&mut self, local: LocalId, kind: LocalKind, content: Local) -> Result<(), InternalError> {
        let index = self.check_kind(local, kind)?;
        self.locals[index] = content;
        Ok(())
    }

    fn ancestor_env(&self, realm: &Realm, distance: u32) -> Result<EnvId, InternalError> {
        realm.envs.ancestor(self.active_env, distance)
    }

    fn store_array_element(
        &mut self,
        realm: &mut Realm,
        array: LocalId,
        index: usize,
        value: Value,
    ) -> JsResult<()> {
        let id = match self.load_value(array)? {
            Value::HeapObject(id) => id,
            _ => {
                return Err(InternalError::LocalKind {
                    local: array.0,
                    expected: "array object",
                    found: "primitive",
                }
                .into())
            }
        };
        realm.check_array_length(index as u64 + 1)?;
        realm.heap.get_mut(id)?.set_own(&index.to_string(), value);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Opcode semantics
    // -----------------------------------------------------------------------

    fn binary(&mut self, realm: &mut Realm, op: BinaryOp) -> JsResult<Step> {
        let right = self.pop_value()?;
        let left = self.pop_value()?;
        let result = operations::apply_binary(realm, op, &left, &right)?;
        self.push(result);
        Ok(Step::Continue)
    }

    fn compare(&mut self, realm: &mut Realm, opcode: &Opcode) -> JsResult<Step> {
        let right = self.pop_value()?;
        let left = self.pop_value()?;
        let result = match opcode {
            Opcode::TestEqualStrict => operations::strict_equals(&left, &right),
            Opcode::TestNotEqualStrict => !operations::strict_equals(&left, &right),
            Opcode::TestEqual => operations::loose_equals(realm, &left, &right)?,
            Opcode::TestNotEqual => !operations::loose_equals(realm, &left, &right)?,
            Opcode::TestLessThan => {
                operations::less_than(realm, &left, &right, true)?.unwrap_or(false)
            }
            Opcode::TestLessThanOrEqual => {
                operations::less_than(realm, &right, &left, false)? == Some(false)
            }
            Opcode::TestGreaterThan => {
                operations::less_than(realm, &right, &left, false)?.unwrap_or(false)
            }
            Opcode::TestGreaterThanOrEqual => {
                operations::less_than(realm, &left, &right, true)? == Some(false)
            }
            Opcode::TestInstanceOf => operations::instance_of(realm, &left, &right)?,
            Opcode::TestIn => operations::has_property(realm, &right, &left)?,
            _ => false,
        };
        self.push(Value::Boolean(result));
        Ok(Step::Continue)
    }

    fn binding<T>(realm: &mut Realm, result: Result<T, BindingError>) -> JsResult<T> {
        result.map_err(|error| realm.binding_error(error))
    }

    fn execute(&mut self, realm: &mut Realm, opcode: &Opcode) -> JsResult<Step> {
        let strict = self.info.is_strict;
        match opcode {
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let top = self.stack.last().cloned().ok_or(InternalError::StackUnderflow)?;
                self.stack.push(top);
            }
            Opcode::DupX1 | Opcode::DupX2 => {
                let depth = if matches!(opcode, Opcode::DupX1) { 2 } else { 3 };
                if self.stack.len() < depth {
                    return Err(InternalError::StackUnderflow.into());
                }
                let top = self.stack[self.stack.len() - 1].clone();
                let at = self.stack.len() - depth;
                self.stack.insert(at, top);
            }
            Opcode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(InternalError::StackUnderflow.into());
                }
                self.stack.swap(len - 1, len - 2);
            }

            Opcode::PushUndefined => self.push(Value::Undefined),
            Opcode::PushNull => self.push(Value::Null),
            Opcode::PushConstant(constant) => self.push(match constant {
                Constant::String(s) => Value::String(s.clone()),
                Constant::Integer(n) => Value::Smi(*n),
                Constant::Number(n) => Value::number(*n),
                Constant::Boolean(b) => Value::Boolean(*b),
            }),
            Opcode::PushBigInt(digits) => {
                let n: BigInt = digits
                    .parse()
                    .map_err(|_| InternalError::BigIntLiteral(digits.clone()))?;
                self.push(Value::BigInt(n));
            }
            Opcode::PushInt(n) => self.stack.push(Operand::Int(*n)),
            Opcode::PushTrue => self.push(Value::Boolean(true)),
            Opcode::PushFalse => self.push(Value::Boolean(false)),

            Opcode::LoadInt(local) => {
                let n = self.load_int(*local)?;
                self.stack.push(Operand::Int(n));
            }
            Opcode::StoreInt(local) => {
                let n = self.pop_int()?;
                self.store(*local, LocalKind::Int, Local::Int(n))?;
            }
            Opcode::IncInt(local) => {
                let n = self.load_int(*local)?;
                self.store(*local, LocalKind::Int, Local::Int(n.wrapping_add(1)))?;
            }
            Opcode::LoadBoolean(local) => {
                self.check_kind(*local, LocalKind::Boolean)?;
                let b = match self.local(*local)? {
                    Local::Boolean(b) => *b,
                    other => {
                        return Err(InternalError::LocalKind {
                            local: local.0,
                            expected: "boolean",
                            found: other.kind_name(),
                        }
                        .into())
                    }
                };
                self.stack.push(Operand::Boolean(b));
            }
            Opcode::StoreBoolean(local) => {
                let b = self.pop_boolean()?;
                self.store(*local, LocalKind::Boolean, Local::Boolean(b))?;
            }
            Opcode::LoadValue(local) => {
                let value = self.load_value(*local)?;
                self.push(value);
            }
            Opcode::StoreValue(local) => {
                let value = self.pop_value()?;
                self.store(*local, LocalKind::Value, Local::Value(value))?;
            }

            Opcode::Add => return self.binary(realm, BinaryOp::Add),
            Opcode::Sub => return self.binary(realm, BinaryOp::Sub),
            Opcode::Mul => return self.binary(realm, BinaryOp::Mul),
            Opcode::Div => return self.binary(realm, BinaryOp::Div),
            Opcode::Exp => return self.binary(realm, BinaryOp::Exp),
            Opcode::Mod => return self.binary(realm, BinaryOp::Mod),
            Opcode::BitwiseAnd => return self.binary(realm, BinaryOp::BitwiseAnd),
            Opcode::BitwiseOr => return self.binary(realm, BinaryOp::BitwiseOr),
            Opcode::BitwiseXor => return self.binary(realm, BinaryOp::BitwiseXor),
            Opcode::ShiftLeft => return self.binary(realm, BinaryOp::ShiftLeft),
            Opcode::ShiftRight => return self.binary(realm, BinaryOp::ShiftRight),
            Opcode::ShiftRightUnsigned => {
                return self.binary(realm, BinaryOp::ShiftRightUnsigned)
            }

            Opcode::TestEqualStrict
            | Opcode::TestNotEqualStrict
            | Opcode::TestEqual
            | Opcode::TestNotEqual
            | Opcode::TestLessThan
            | Opcode::TestLessThanOrEqual
            | Opcode::TestGreaterThan
            | Opcode::TestGreaterThanOrEqual
            | Opcode::TestInstanceOf
            | Opcode::TestIn => return self.compare(realm, opcode),

            Opcode::TypeOf => {
                let value = self.pop_value()?;
                self.push(Value::string(operations::type_of(realm, &value)));
            }
            Opcode::ToNumber => {
                let value = self.pop_value()?;
                let n = operations::to_number(realm, &value)?;
                self.push(Value::number(n));
            }
            Opcode::ToNumeric => {
                let value = self.pop_value()?;
                let numeric = operations::to_numeric(realm, &value)?;
                self.push(numeric);
            }
            Opcode::ToString => {
                let value = self.pop_value()?;
                let s = operations::to_string(realm, &value)?;
                self.push(Value::String(s));
            }
            Opcode::Negate => {
                let value = self.pop_value()?;
                let result = operations::negate(realm, &value)?;
                self.push(result);
            }
            Opcode::BitwiseNot => {
                let value = self.pop_value()?;
                let result = operations::bitwise_not(realm, &value)?;
                self.push(result);
            }
            Opcode::ToBooleanLogicalNot => {
                let value = self.pop_value()?;
                self.push(Value::Boolean(!operations::to_boolean(&value)));
            }
            Opcode::Inc | Opcode::Dec => {
                let value = self.pop_value()?;
                let delta = if matches!(opcode, Opcode::Inc) { 1 } else { -1 };
                let result = operations::increment(realm, &value, delta)?;
                self.push(result);
            }

            Opcode::LoadKeyedProperty => {
                let key = self.pop_value()?;
                let base = self.pop_value()?;
                let key = operations::to_property_key(realm, &key)?;
                let value = operations::get_value(realm, &base, &key)?;
                self.push(value);
            }
            Opcode::StoreKeyedProperty => {
                let value = self.pop_value()?;
                let key = self.pop_value()?;
                let base = self.pop_value()?;
                let key = operations::to_property_key(realm, &key)?;
                operations::set_value(realm, &base, &key, value, strict)?;
            }
            Opcode::LoadNamedProperty(name) => {
                let base = self.pop_value()?;
                let value = operations::get_value(realm, &base, name)?;
                self.push(value);
            }
            Opcode::StoreNamedProperty(name) => {
                let value = self.pop_value()?;
                let base = self.pop_value()?;
                operations::set_value(realm, &base, name, value, strict)?;
            }
            Opcode::DeletePropertyStrict | Opcode::DeletePropertySloppy => {
                let key = self.pop_value()?;
                let base = self.pop_value()?;
                let key = operations::to_property_key(realm, &key)?;
                let strict_delete = matches!(opcode, Opcode::DeletePropertyStrict);
                let deleted = operations::delete_property(realm, &base, &key, strict_delete)?;
                self.push(Value::Boolean(deleted));
            }
            Opcode::CreateObject => {
                let object = realm.create_object();
                self.push(object);
            }
            Opcode::CreateArray => {
                let array = realm.create_array(Vec::new());
                self.push(array);
            }
            Opcode::StoreArray { array, index } => {
                let value = self.pop_value()?;
                let position = self.load_int(*index)?;
                self.store_array_element(realm, *array, position.max(0) as usize, value)?;
                self.store(*index, LocalKind::Int, Local::Int(position.wrapping_add(1)))?;
            }
            Opcode::StoreArrayIndexed { array, index } => {
                let value = self.pop_value()?;
                self.store_array_element(realm, *array, *index as usize, value)?;
            }
            Opcode::CreateTemplateLiteral(parts) => {
                let parts = self.pop_arguments(*parts)?;
                let mut s = String::new();
                for part in &parts {
                    s.push_str(&operations::to_string(realm, part)?);
                }
                self.push(Value::String(s));
            }

            Opcode::Call(count) => {
                let arguments = self.pop_arguments(*count)?;
                let receiver = self.pop_value()?;
                let target = self.pop_value()?;
                let result = operations::call(realm, &target, receiver, arguments)?;
                self.push(result);
            }
            Opcode::Construct(count) => {
                let arguments = self.pop_arguments(*count)?;
                let new_target = self.pop_value()?;
                let target = self.pop_value()?;
                let result = operations::construct(realm, &target, arguments, &new_target)?;
                self.push(result);
            }

            Opcode::DeclareGlobals {
                vars,
                lexicals,
                functions,
            } => {
                let global = realm.global_env();
                for name in lexicals {
                    if realm.envs.has_binding(global, name) {
                        return Err(realm.binding_error(BindingError::AlreadyDeclared(name.clone())));
                    }
                }
                for name in vars.iter().chain(functions) {
                    if !realm.envs.has_binding(global, name) {
                        let created = realm.envs.create_mutable_binding(global, name, false);
                        Self::binding(realm, created)?;
                        let initialized = realm.envs.initialize_binding(global, name, Value::Undefined);
                        Self::binding(realm, initialized)?;
                    }
                }
                for name in lexicals {
                    let created = realm.envs.create_mutable_binding(global, name, false);
                    Self::binding(realm, created)?;
                }
            }
            Opcode::PushDeclarativeEnvRecord(slots) => {
                self.active_env = realm.envs.new_declarative(self.active_env, *slots);
            }
            Opcode::PopEnvRecord => {
                self.active_env = realm
                    .envs
                    .outer(self.active_env)?
                    .ok_or(InternalError::EnvironmentChainEnded)?;
            }
            Opcode::LoadGlobal(name) => {
                let global = realm.global_env();
                let value = realm.envs.get_binding_value(global, name);
                let value = Self::binding(realm, value)?;
                self.push(value);
            }
            Opcode::StoreGlobal(name) => {
                let value = self.pop_value()?;
                let global = realm.global_env();
                if !realm.envs.has_binding(global, name) {
                    if strict {
                        return Err(realm.binding_error(BindingError::NotDefined(name.clone())));
                    }
                    let created = realm.envs.create_mutable_binding(global, name, true);
                    Self::binding(realm, created)?;
                }
                let stored = realm.envs.store_binding(global, name, value);
                Self::binding(realm, stored)?;
            }
            Opcode::LoadCurrentEnvSlot(slot) => {
                let value = realm.envs.get_slot(self.active_env, *slot);
                let value = Self::binding(realm, value)?;
                self.push(value);
            }
            Opcode::StoreCurrentEnvSlot(slot) => {
                let value = self.pop_value()?;
                let stored = realm.envs.set_slot(self.active_env, *slot, value);
                Self::binding(realm, stored)?;
            }
            Opcode::LoadEnvSlot { slot, distance } => {
                let env = self.ancestor_env(realm, *distance)?;
                let value = realm.envs.get_slot(env, *slot);
                let value = Self::binding(realm, value)?;
                self.push(value);
            }
            Opcode::StoreEnvSlot { slot, distance } => {
                let value = self.pop_value()?;
                let env = self.ancestor_env(realm, *distance)?;
                let stored = realm.envs.set_slot(env, *slot, value);
                Self::binding(realm, stored)?;
            }
            Opcode::LoadModuleVar(name) => {
                let env = realm.envs.nearest_module(self.active_env)?;
                let value = realm.envs.get_binding_value(env, name);
                let value = Self::binding(realm, value)?;
                self.push(value);
            }
            Opcode::StoreModuleVar(name) => {
                let value = self.pop_value()?;
                let env = realm.envs.nearest_module(self.active_env)?;
                let stored = realm.envs.store_binding(env, name, value);
                Self::binding(realm, stored)?;
            }

            Opcode::Throw => {
                let value = self.pop_value()?;
                return Err(Abrupt::Throw(value));
            }
            Opcode::ThrowConstantReassignmentError(name) => {
                let error = JsError::type_error(format!(
                    "Assignment to constant variable '{}'",
                    name
                ));
                return Err(realm.throw(error.with_frame(self.frame())));
            }
            Opcode::ThrowLexicalAccessError(name) => {
                let error = JsError::reference_error(format!(
                    "Cannot access '{}' before initialization",
                    name
                ));
                return Err(realm.throw(error.with_frame(self.frame())));
            }

            Opcode::Jump(target) => self.ip = *target,
            Opcode::JumpIfTrue(target) => {
                if self.pop_boolean()? {
                    self.ip = *target;
                }
            }
            Opcode::JumpIfFalse(target) => {
                if !self.pop_boolean()? {
                    self.ip = *target;
                }
            }
            Opcode::JumpIfToBooleanTrue(target) => {
                if operations::to_boolean(&self.pop_value()?) {
                    self.ip = *target;
                }
            }
            Opcode::JumpIfToBooleanFalse(target) => {
                if !operations::to_boolean(&self.pop_value()?) {
                    self.ip = *target;
                }
            }
            Opcode::JumpIfUndefined(target) => {
                if self.pop_value()?.is_undefined() {
                    self.ip = *target;
                }
            }
            Opcode::JumpIfNotUndefined(target) => {
                if !self.pop_value()?.is_undefined() {
                    self.ip = *target;
                }
            }
            Opcode::JumpIfNotNullish(target) => {
                if !self.pop_value()?.is_nullish() {
                    self.ip = *target;
                }
            }
            Opcode::JumpTable(table) => {
                let key = self.pop_int()?;
                self.ip = *table
                    .get(&key)
                    .ok_or(InternalError::MissingJumpTarget(key))?;
            }
            Opcode::Return => {
                if self.stack.len() != 1 {
                    return Err(InternalError::StackHeight(self.stack.len()).into());
                }
                let value = self.pop_value()?;
                return Ok(Step::Return(value));
            }

            Opcode::CreateClosure(index) | Opcode::CreateGeneratorClosure(index) => {
                let nested = self
                    .info
                    .nested_functions
                    .get(*index)
                    .cloned()
                    .ok_or(InternalError::NestedFunction(*index))?;
                if matches!(opcode, Opcode::CreateGeneratorClosure(_)) && !nested.is_generator() {
                    return Err(InternalError::NotGenerator.into());
                }
                let closure = operations::create_closure(realm, nested, self.active_env);
                self.push(closure);
            }

            Opcode::GetGeneratorPhase => {
                let phase = self.generator_state()?.phase;
                self.stack.push(Operand::Int(phase));
            }
            Opcode::SetGeneratorPhase(phase) => {
                self.generator_state_mut()?.phase = *phase;
            }
            Opcode::GeneratorSentValue => {
                let state = self.generator_state_mut()?;
                let sent = std::mem::replace(&mut state.sent_value, Value::Undefined);
                if state.should_throw {
                    state.should_throw = false;
                    return Err(Abrupt::Throw(sent));
                }
                if state.should_return {
                    state.should_return = false;
                    return Ok(Step::Return(sent));
                }
                self.push(sent);
            }
            Opcode::Yield => {
                let value = self.pop_value()?;
                self.generator_state_mut()?.yielded_value = value.clone();
                return Ok(Step::Yield(value));
            }
        }
        Ok(Step::Continue)
    }
}
