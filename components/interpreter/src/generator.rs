//! Generator objects and their resumption protocol
//!
//! Calling a generator function does not run its body. It creates a
//! generator object owning a suspended [`Interpreter`] whose state slot holds
//! a [`GeneratorState`]. Each `next`, `return` or `throw` stores the sent
//! value and mode in that state and restarts dispatch at opcode 0; the
//! compiled prologue reads the phase and jumps to the resume point. The
//! operand stack and locals survive between drives.

use crate::error::{Abrupt, JsResult};
use crate::heap::{Closure, JsObject, NativeCall, ObjectKind};
use crate::interpreter::{Completion, Interpreter};
use crate::operations;
use crate::realm::Realm;
use core_types::{JsError, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Phase of a generator that has finished
pub const GENERATOR_COMPLETED: i32 = -1;

/// Per-activation generator bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorState {
    /// Resume point selected by the phase jump table; -1 once completed
    pub phase: i32,
    /// Last value produced by `Yield`
    pub yielded_value: Value,
    /// Value passed to the current resumption
    pub sent_value: Value,
    /// The sent value is thrown at the resume point
    pub should_throw: bool,
    /// The sent value completes the generator at the resume point
    pub should_return: bool,
    started: bool,
}

impl GeneratorState {
    /// State of a generator that has not run yet
    pub fn new() -> Self {
        Self {
            phase: 0,
            yielded_value: Value::Undefined,
            sent_value: Value::Undefined,
            should_throw: false,
            should_return: false,
            started: false,
        }
    }

    /// Check if the generator has finished
    pub fn is_completed(&self) -> bool {
        self.phase == GENERATOR_COMPLETED
    }

    /// Check if the body has been entered at least once
    pub fn is_started(&self) -> bool {
        self.started
    }

    fn complete(&mut self) {
        self.phase = GENERATOR_COMPLETED;
        self.sent_value = Value::Undefined;
        self.should_throw = false;
        self.should_return = false;
    }
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self::new()
    }
}

/// How a suspended generator is resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// `next(value)`: the value becomes the result of the paused yield
    Next,
    /// `return(value)`: complete with the value
    Return,
    /// `throw(value)`: throw the value at the paused yield
    Throw,
}

/// Create the generator object for a call to a generator function
pub fn create_generator(
    realm: &mut Realm,
    callee: &Value,
    closure: &Closure,
    this: Value,
    args: Vec<Value>,
) -> JsResult<Value> {
    let mut arguments = Vec::with_capacity(args.len() + 3);
    arguments.push(this);
    arguments.push(Value::Undefined);
    arguments.push(Value::Undefined);
    arguments.extend(args);

    let mut activation = Interpreter::new(Rc::clone(&closure.info), arguments, closure.env);
    activation.install_generator_state(GeneratorState::new())?;

    let prototype = match operations::get_value(realm, callee, "prototype")? {
        Value::HeapObject(id) => id,
        _ => realm.intrinsics().generator_prototype,
    };
    log::trace!("create generator {}", closure.info.name);
    Ok(realm.heap.allocate(JsObject::new(
        ObjectKind::Generator(Rc::new(RefCell::new(activation))),
        Some(prototype),
    )))
}

/// Suspended activation behind a generator object
pub fn generator_activation(realm: &Realm, generator: &Value) -> Option<Rc<RefCell<Interpreter>>> {
    let id = generator.as_object()?;
    match &realm.heap.get(id).ok()?.kind {
        ObjectKind::Generator(activation) => Some(Rc::clone(activation)),
        _ => None,
    }
}

fn finished(realm: &mut Realm, mode: ResumeMode, value: Value) -> JsResult<Value> {
    match mode {
        ResumeMode::Next => Ok(realm.create_iter_result(Value::Undefined, true)),
        ResumeMode::Return => Ok(realm.create_iter_result(value, true)),
        ResumeMode::Throw => Err(Abrupt::Throw(value)),
    }
}

/// Drive a generator one step
///
/// Returns an iterator result object, or the throw completion that ended the
/// generator.
pub fn resume_generator(
    realm: &mut Realm,
    generator: &Value,
    mode: ResumeMode,
    value: Value,
) -> JsResult<Value> {
    let cell = match generator_activation(realm, generator) {
        Some(cell) => cell,
        None => {
            return Err(realm.throw(JsError::type_error(
                "generator method called on incompatible receiver",
            )))
        }
    };
    let mut activation = match cell.try_borrow_mut() {
        Ok(activation) => activation,
        Err(_) => return Err(realm.throw(JsError::type_error("Generator is already running"))),
    };

    let state = activation.generator_state_mut()?;
    if state.is_completed() {
        return finished(realm, mode, value);
    }
    if !state.is_started() && mode != ResumeMode::Next {
        state.complete();
        return finished(realm, mode, value);
    }
    log::trace!("resume generator ({:?}) at phase {}", mode, state.phase);
    state.started = true;
    state.sent_value = value;
    state.should_throw = mode == ResumeMode::Throw;
    state.should_return = mode == ResumeMode::Return;

    activation.rewind();
    realm.enter_call()?;
    let outcome = activation.run(realm);
    realm.exit_call();

    match outcome {
        Ok(Completion::Yield(value)) => Ok(realm.create_iter_result(value, false)),
        Ok(Completion::Return(value)) => {
            activation.generator_state_mut()?.complete();
            Ok(realm.create_iter_result(value, true))
        }
        Ok(Completion::Throw(value)) => {
            activation.generator_state_mut()?.complete();
            Err(Abrupt::Throw(value))
        }
        Err(error) => {
            if let Ok(state) = activation.generator_state_mut() {
                state.complete();
            }
            Err(error.into())
        }
    }
}

/// `Generator.prototype.next`
pub fn generator_next(realm: &mut Realm, call: &NativeCall) -> JsResult<Value> {
    resume_generator(realm, &call.this, ResumeMode::Next, call.argument(0))
}

/// `Generator.prototype.return`
pub fn generator_return(realm: &mut Realm, call: &NativeCall) -> JsResult<Value> {
    resume_generator(realm, &call.this, ResumeMode::Return, call.argument(0))
}

/// `Generator.prototype.throw`
pub fn generator_throw(realm: &mut Realm, call: &NativeCall) -> JsResult<Value> {
    resume_generator(realm, &call.this, ResumeMode::Throw, call.argument(0))
}
