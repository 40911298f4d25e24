//! Realm: the explicit execution context
//!
//! A [`Realm`] owns the object heap, the environment arena, the global
//! environment record and the intrinsic prototypes. Every interpreter and
//! module operation receives it as a parameter; nothing is looked up through
//! process-wide state.

use crate::environment::{BindingError, EnvId, EnvironmentArena};
use crate::error::{Abrupt, JsResult};
use crate::generator;
use crate::heap::{Heap, JsObject, NativeCall, NativeFn, NativeFunction, ObjectKind};
use crate::operations;
use core_types::{ErrorKind, JsError, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_REALM_ID: AtomicUsize = AtomicUsize::new(0);

/// Realm configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealmConfig {
    /// Maximum nesting of bytecode calls before a RangeError is thrown
    pub max_call_depth: usize,
    /// Largest length an array may grow to; larger writes throw a RangeError
    pub max_array_length: usize,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            max_array_length: 1 << 24,
        }
    }
}

/// Process-unique identity of a realm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RealmId(usize);

/// Handles of the built-in prototypes
#[derive(Debug, Clone)]
pub struct Intrinsics {
    /// `Object.prototype`
    pub object_prototype: usize,
    /// `Function.prototype`
    pub function_prototype: usize,
    /// `Array.prototype`
    pub array_prototype: usize,
    /// Shared prototype of generator objects
    pub generator_prototype: usize,
    /// `Error.prototype`
    pub error_prototype: usize,
    /// Prototype of each native error kind
    pub error_prototypes: HashMap<ErrorKind, usize>,
}

/// Execution context shared by every activation
#[derive(Debug)]
pub struct Realm {
    id: RealmId,
    /// Object heap
    pub heap: Heap,
    /// Environment records
    pub envs: EnvironmentArena,
    global_env: EnvId,
    intrinsics: Intrinsics,
    config: RealmConfig,
    call_depth: usize,
}

impl Realm {
    /// Create a realm with the default configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use interpreter::Realm;
    ///
    /// let realm = Realm::new();
    /// assert_eq!(realm.config().max_call_depth, 128);
    /// ```
    pub fn new() -> Self {
        Self::with_config(RealmConfig::default())
    }

    /// Create a realm with the given configuration
    pub fn with_config(config: RealmConfig) -> Self {
        let mut heap = Heap::new();
        let object_prototype = heap.insert(JsObject::ordinary(None));
        let function_prototype = heap.insert(JsObject::ordinary(Some(object_prototype)));
        let array_prototype = heap.insert(JsObject::ordinary(Some(object_prototype)));
        let generator_prototype = heap.insert(JsObject::ordinary(Some(object_prototype)));
        let error_prototype = heap.insert(JsObject::ordinary(Some(object_prototype)));
        let mut error_prototypes = HashMap::new();
        for kind in ErrorKind::ALL {
            error_prototypes.insert(kind, heap.insert(JsObject::ordinary(Some(error_prototype))));
        }

        let mut envs = EnvironmentArena::new();
        let global_env = envs.new_global();

        let mut realm = Self {
            id: RealmId(NEXT_REALM_ID.fetch_add(1, Ordering::Relaxed)),
            heap,
            envs,
            global_env,
            intrinsics: Intrinsics {
                object_prototype,
                function_prototype,
                array_prototype,
                generator_prototype,
                error_prototype,
                error_prototypes,
            },
            config,
            call_depth: 0,
        };
        realm.install_globals();
        realm
    }

    fn install_globals(&mut self) {
        self.define_global("undefined", Value::Undefined);
        self.define_global("NaN", Value::Double(f64::NAN));
        self.define_global("Infinity", Value::Double(f64::INFINITY));

        let error_prototype = self.intrinsics.error_prototype;
        self.install_error_constructor("Error", error_prototype);
        for kind in ErrorKind::ALL {
            if let Some(&prototype) = self.intrinsics.error_prototypes.get(&kind) {
                self.install_error_constructor(kind.name(), prototype);
            }
        }

        let generator_prototype = self.intrinsics.generator_prototype;
        for (name, function) in [
            ("next", generator::generator_next as NativeFn),
            ("return", generator::generator_return as NativeFn),
            ("throw", generator::generator_throw as NativeFn),
        ] {
            let method = self.create_native_function(name, function, false);
            self.set_own_property(generator_prototype, name, method);
        }
    }

    fn install_error_constructor(&mut self, name: &'static str, prototype: usize) {
        let constructor = self.create_native_function(name, error_constructor, true);
        if let Value::HeapObject(id) = constructor {
            self.set_own_property(id, "prototype", Value::HeapObject(prototype));
        }
        self.set_own_property(prototype, "constructor", constructor.clone());
        self.set_own_property(prototype, "name", Value::string(name));
        self.set_own_property(prototype, "message", Value::string(""));
        self.define_global(name, constructor);
    }

    fn set_own_property(&mut self, id: usize, key: &str, value: Value) {
        if let Ok(object) = self.heap.get_mut(id) {
            object.set_own(key, value);
        }
    }

    /// Create or overwrite a global binding
    pub fn define_global(&mut self, name: &str, value: Value) {
        let global = self.global_env;
        if !self.envs.has_binding(global, name) {
            let _ = self.envs.create_mutable_binding(global, name, true);
        }
        let _ = self.envs.store_binding(global, name, value);
    }

    /// Identity of this realm
    ///
    /// Heap handles and environment ids are only meaningful inside the realm
    /// that allocated them.
    pub fn id(&self) -> RealmId {
        self.id
    }

    /// Global environment record
    pub fn global_env(&self) -> EnvId {
        self.global_env
    }

    /// Built-in prototypes
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Active configuration
    pub fn config(&self) -> RealmConfig {
        self.config
    }

    /// Current nesting depth of bytecode calls
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Enter a nested bytecode activation
    pub fn enter_call(&mut self) -> JsResult<()> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(self.throw(JsError::range_error("Maximum call stack size exceeded")));
        }
        self.call_depth += 1;
        Ok(())
    }

    /// Throw a RangeError when an array would grow past the configured length
    pub fn check_array_length(&mut self, length: u64) -> JsResult<()> {
        if length > self.config.max_array_length as u64 {
            return Err(self.throw(JsError::range_error("Invalid array length")));
        }
        Ok(())
    }

    /// Leave a nested bytecode activation
    pub fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    /// Allocate a plain object inheriting from `Object.prototype`
    pub fn create_object(&mut self) -> Value {
        self.heap
            .allocate(JsObject::ordinary(Some(self.intrinsics.object_prototype)))
    }

    /// Allocate an array
    pub fn create_array(&mut self, elements: Vec<Value>) -> Value {
        self.heap.allocate(JsObject::new(
            ObjectKind::Array(elements),
            Some(self.intrinsics.array_prototype),
        ))
    }

    /// Allocate an iterator result object `{ value, done }`
    pub fn create_iter_result(&mut self, value: Value, done: bool) -> Value {
        let mut object = JsObject::ordinary(Some(self.intrinsics.object_prototype));
        object.set_own("value", value);
        object.set_own("done", Value::Boolean(done));
        self.heap.allocate(object)
    }

    /// Allocate a native function object
    pub fn create_native_function(
        &mut self,
        name: &'static str,
        function: NativeFn,
        constructor: bool,
    ) -> Value {
        let mut object = JsObject::new(
            ObjectKind::Native(NativeFunction {
                name,
                function,
                constructor,
            }),
            Some(self.intrinsics.function_prototype),
        );
        object.set_own("name", Value::string(name));
        self.heap.allocate(object)
    }

    /// Materialize an engine error as a heap error object
    pub fn create_error(&mut self, error: &JsError) -> Value {
        let prototype = self
            .intrinsics
            .error_prototypes
            .get(&error.kind)
            .copied()
            .unwrap_or(self.intrinsics.error_prototype);
        let mut object = JsObject::new(ObjectKind::Error, Some(prototype));
        object.set_own("message", Value::string(error.message.clone()));
        if !error.stack.is_empty() {
            let mut stack = error.to_string();
            for frame in &error.stack {
                stack.push('\n');
                stack.push_str(&frame.to_string());
            }
            object.set_own("stack", Value::string(stack));
        }
        self.heap.allocate(object)
    }

    /// Materialize an engine error and wrap it as a throw completion
    pub fn throw(&mut self, error: JsError) -> Abrupt {
        Abrupt::Throw(self.create_error(&error))
    }

    /// Convert a failed binding access into a completion
    pub fn binding_error(&mut self, error: BindingError) -> Abrupt {
        match error {
            BindingError::NotDefined(_) | BindingError::Uninitialized(_) => {
                self.throw(JsError::reference_error(error.to_string()))
            }
            BindingError::ConstantAssignment(_) => {
                self.throw(JsError::type_error(error.to_string()))
            }
            BindingError::AlreadyDeclared(_) => {
                self.throw(JsError::syntax_error(error.to_string()))
            }
            BindingError::Internal(internal) => Abrupt::Internal(internal),
        }
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared implementation of `Error` and the native error constructors
fn error_constructor(realm: &mut Realm, call: &NativeCall) -> JsResult<Value> {
    let prototype = match &call.callee {
        Value::HeapObject(id) => match realm.heap.get(*id)?.get_own("prototype") {
            Some(Value::HeapObject(prototype)) => prototype,
            _ => realm.intrinsics.error_prototype,
        },
        _ => realm.intrinsics.error_prototype,
    };
    let mut object = JsObject::new(ObjectKind::Error, Some(prototype));
    let message = call.argument(0);
    if !message.is_undefined() {
        let message = operations::to_string(realm, &message)?;
        object.set_own("message", Value::string(message));
    }
    Ok(realm.heap.allocate(object))
}
