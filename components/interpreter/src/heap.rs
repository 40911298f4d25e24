//! Object heap
//!
//! Objects live in an append-only arena and are addressed by the index carried
//! in `Value::HeapObject`. Nothing is ever collected; a realm's objects live as
//! long as the realm.

use crate::environment::{EnvId, ModuleId};
use crate::error::{InternalError, JsResult};
use crate::interpreter::Interpreter;
use crate::realm::Realm;
use bytecode_system::FunctionInfo;
use core_types::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Host function callable from bytecode
pub type NativeFn = fn(&mut Realm, &NativeCall) -> JsResult<Value>;

/// Arguments of a native function invocation
#[derive(Debug, Clone)]
pub struct NativeCall {
    /// The function object being invoked
    pub callee: Value,
    /// Receiver
    pub this: Value,
    /// Call arguments
    pub arguments: Vec<Value>,
    /// `new.target`, undefined for plain calls
    pub new_target: Value,
}

impl NativeCall {
    /// Argument at `index`, or undefined when absent
    pub fn argument(&self, index: usize) -> Value {
        self.arguments.get(index).cloned().unwrap_or(Value::Undefined)
    }
}

/// Native function object payload
#[derive(Debug, Clone)]
pub struct NativeFunction {
    /// Function name
    pub name: &'static str,
    /// Implementation
    pub function: NativeFn,
    /// Whether `new` may be applied
    pub constructor: bool,
}

/// Bytecode function object payload
///
/// The captured environment is shared, not copied: closures created in the
/// same scope observe each other's writes.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Compiled body
    pub info: Rc<FunctionInfo>,
    /// Environment active when the closure was created
    pub env: EnvId,
}

/// Internal representation of a heap object
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array with dense element storage
    Array(Vec<Value>),
    /// Bytecode function or generator function
    Function(Closure),
    /// Host function
    Native(NativeFunction),
    /// Suspended generator activation
    Generator(Rc<RefCell<Interpreter>>),
    /// Module namespace exposing the sorted export names of a module
    Namespace {
        /// Module whose exports are exposed
        module: ModuleId,
        /// Export names
        exports: Vec<String>,
    },
    /// Error instance
    Error,
    /// Wrapper produced by ToObject on a primitive
    Primitive(Value),
}

/// Heap-allocated JavaScript object
#[derive(Debug, Clone)]
pub struct JsObject {
    /// Prototype handle, `None` for a null prototype
    pub prototype: Option<usize>,
    /// Own named properties in insertion order
    pub properties: IndexMap<String, Value>,
    /// Representation
    pub kind: ObjectKind,
}

impl JsObject {
    /// Create an object of the given kind
    pub fn new(kind: ObjectKind, prototype: Option<usize>) -> Self {
        Self {
            prototype,
            properties: IndexMap::new(),
            kind,
        }
    }

    /// Create a plain object
    pub fn ordinary(prototype: Option<usize>) -> Self {
        Self::new(ObjectKind::Ordinary, prototype)
    }

    /// Check if the object can be called
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_) | ObjectKind::Native(_))
    }

    /// Check if `new` may be applied to the object
    pub fn is_constructor(&self) -> bool {
        match &self.kind {
            ObjectKind::Function(closure) => !closure.info.is_generator(),
            ObjectKind::Native(native) => native.constructor,
            _ => false,
        }
    }

    /// Look up an own property, ignoring the prototype chain
    ///
    /// Namespace exports are not visible here; they live in module
    /// environments and are resolved by the property operations.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        match &self.kind {
            ObjectKind::Array(elements) => {
                if key == "length" {
                    return Some(Value::number(elements.len() as f64));
                }
                if let Some(index) = array_index(key) {
                    return elements.get(index).cloned();
                }
            }
            ObjectKind::Primitive(Value::String(s)) => {
                if key == "length" {
                    return Some(Value::number(s.chars().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return s.chars().nth(index).map(|c| Value::String(c.to_string()));
                }
            }
            _ => {}
        }
        self.properties.get(key).cloned()
    }

    /// Check for an own property
    pub fn has_own(&self, key: &str) -> bool {
        self.get_own(key).is_some()
    }

    /// Write an own property
    pub fn set_own(&mut self, key: &str, value: Value) {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if let Some(index) = array_index(key) {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return;
            }
        }
        self.properties.insert(key.to_string(), value);
    }

    /// Remove an own property, returning false if it cannot be removed
    pub fn delete_own(&mut self, key: &str) -> bool {
        match &mut self.kind {
            ObjectKind::Array(elements) => {
                if key == "length" {
                    return false;
                }
                if let Some(index) = array_index(key) {
                    if let Some(slot) = elements.get_mut(index) {
                        *slot = Value::Undefined;
                    }
                    return true;
                }
            }
            ObjectKind::Primitive(Value::String(s)) => {
                if key == "length" || array_index(key).is_some_and(|i| i < s.chars().count()) {
                    return false;
                }
            }
            ObjectKind::Namespace { exports, .. } => {
                return !exports.iter().any(|name| name == key);
            }
            _ => {}
        }
        self.properties.shift_remove(key);
        true
    }

    /// Own property keys: indices first, then named properties
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        match &self.kind {
            ObjectKind::Array(elements) => {
                keys.extend((0..elements.len()).map(|i| i.to_string()));
                keys.push("length".to_string());
            }
            ObjectKind::Namespace { exports, .. } => keys.extend(exports.iter().cloned()),
            _ => {}
        }
        keys.extend(self.properties.keys().cloned());
        keys
    }
}

/// Parse a canonical array index
pub fn array_index(key: &str) -> Option<usize> {
    let index: u32 = key.parse().ok()?;
    if index == u32::MAX || index.to_string() != key {
        return None;
    }
    Some(index as usize)
}

/// Arena of heap objects
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<JsObject>,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an object into the heap and return its handle
    pub fn allocate(&mut self, object: JsObject) -> Value {
        Value::HeapObject(self.insert(object))
    }

    /// Move an object into the heap and return its raw index
    pub fn insert(&mut self, object: JsObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Borrow an object by handle
    pub fn get(&self, id: usize) -> Result<&JsObject, InternalError> {
        self.objects.get(id).ok_or(InternalError::InvalidObject(id))
    }

    /// Mutably borrow an object by handle
    pub fn get_mut(&mut self, id: usize) -> Result<&mut JsObject, InternalError> {
        self.objects.get_mut(id).ok_or(InternalError::InvalidObject(id))
    }

    /// Number of allocated objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if nothing has been allocated
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
