//! Environment records
//!
//! Records live in an [`EnvironmentArena`] and refer to their parent through an
//! [`EnvId`], so a scope can be shared by any number of closures and nested
//! scopes without being copied. Every record stores its bindings in slots;
//! named bindings map a name to a slot.
//!
//! Module records additionally carry an export table and may hold indirect
//! bindings. An indirect binding names a module and one of its exports, and is
//! resolved through that module's own record on every access.

use crate::error::InternalError;
use core_types::Value;
use indexmap::IndexMap;
use thiserror::Error;

/// Handle to an environment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub usize);

/// Handle to a module known to the environment arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// State of a single binding
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Created but not yet initialized (temporal dead zone)
    Uninitialized,
    /// Holds a value
    Initialized(Value),
    /// Redirects to an export of another module
    Indirect {
        /// Target module
        module: ModuleId,
        /// Export name in the target module
        name: String,
    },
}

/// What an exported name refers to inside its module
#[derive(Debug, Clone, PartialEq)]
pub enum ExportTarget {
    /// Binding of the module's own record
    Local(String),
    /// Export of another module
    Indirect {
        /// Target module
        module: ModuleId,
        /// Export name in the target module
        name: String,
    },
    /// Namespace object of another module
    Namespace(Value),
}

/// Kind of environment record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKind {
    /// Function or block scope
    Declarative,
    /// Outermost scope of a realm
    Global,
    /// Top-level scope of a module
    Module(ModuleId),
}

/// Failed binding access
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// Name with no binding
    #[error("{0} is not defined")]
    NotDefined(String),
    /// Read or write inside the temporal dead zone
    #[error("Cannot access '{0}' before initialization")]
    Uninitialized(String),
    /// Write to an initialized immutable binding
    #[error("Assignment to constant variable '{0}'")]
    ConstantAssignment(String),
    /// Duplicate declaration
    #[error("Identifier '{0}' has already been declared")]
    AlreadyDeclared(String),
    /// Engine invariant violation
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug, Clone)]
struct Slot {
    binding: Binding,
    mutable: bool,
    deletable: bool,
}

impl Slot {
    fn new(mutable: bool, deletable: bool) -> Self {
        Self {
            binding: Binding::Uninitialized,
            mutable,
            deletable,
        }
    }
}

/// A scope's bindings plus the link to its enclosing scope
#[derive(Debug, Clone)]
pub struct EnvironmentRecord {
    kind: EnvKind,
    outer: Option<EnvId>,
    slots: Vec<Slot>,
    names: IndexMap<String, usize>,
    exports: IndexMap<String, ExportTarget>,
}

impl EnvironmentRecord {
    fn new(kind: EnvKind, outer: Option<EnvId>) -> Self {
        Self {
            kind,
            outer,
            slots: Vec::new(),
            names: IndexMap::new(),
            exports: IndexMap::new(),
        }
    }

    /// Record kind
    pub fn kind(&self) -> EnvKind {
        self.kind
    }

    /// Enclosing record
    pub fn outer(&self) -> Option<EnvId> {
        self.outer
    }

    /// Number of binding slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Names of the named bindings in declaration order
    pub fn binding_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    fn slot_name(&self, slot: usize) -> String {
        self.names
            .iter()
            .find(|(_, index)| **index == slot)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| format!("#{}", slot))
    }
}

/// Arena owning every environment record of a realm
#[derive(Debug, Default)]
pub struct EnvironmentArena {
    records: Vec<EnvironmentRecord>,
    module_envs: Vec<Option<EnvId>>,
}

impl EnvironmentArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, record: EnvironmentRecord) -> EnvId {
        self.records.push(record);
        EnvId(self.records.len() - 1)
    }

    /// Create a global record with no parent
    pub fn new_global(&mut self) -> EnvId {
        self.push(EnvironmentRecord::new(EnvKind::Global, None))
    }

    /// Create a declarative record with `slot_count` uninitialized slots
    pub fn new_declarative(&mut self, outer: EnvId, slot_count: u32) -> EnvId {
        let mut record = EnvironmentRecord::new(EnvKind::Declarative, Some(outer));
        record.slots = (0..slot_count).map(|_| Slot::new(true, false)).collect();
        self.push(record)
    }

    /// Reserve an id for a module whose record is created later
    pub fn allocate_module_id(&mut self) -> ModuleId {
        self.module_envs.push(None);
        ModuleId(self.module_envs.len() - 1)
    }

    /// Create the record of a module and register it under the module's id
    pub fn new_module(&mut self, outer: EnvId, module: ModuleId) -> Result<EnvId, InternalError> {
        let env = self.push(EnvironmentRecord::new(EnvKind::Module(module), Some(outer)));
        match self.module_envs.get_mut(module.0) {
            Some(slot) => {
                *slot = Some(env);
                Ok(env)
            }
            None => Err(InternalError::ModuleNotLinked(module.0)),
        }
    }

    /// Record of a module, once linked
    pub fn module_env(&self, module: ModuleId) -> Option<EnvId> {
        self.module_envs.get(module.0).copied().flatten()
    }

    /// Borrow a record
    pub fn record(&self, env: EnvId) -> Result<&EnvironmentRecord, InternalError> {
        self.records
            .get(env.0)
            .ok_or(InternalError::InvalidEnvironment(env.0))
    }

    fn record_mut(&mut self, env: EnvId) -> Result<&mut EnvironmentRecord, InternalError> {
        self.records
            .get_mut(env.0)
            .ok_or(InternalError::InvalidEnvironment(env.0))
    }

    /// Enclosing record of `env`
    pub fn outer(&self, env: EnvId) -> Result<Option<EnvId>, InternalError> {
        Ok(self.record(env)?.outer)
    }

    /// Record `distance` parents above `env`
    pub fn ancestor(&self, env: EnvId, distance: u32) -> Result<EnvId, InternalError> {
        let mut current = env;
        for _ in 0..distance {
            current = self
                .outer(current)?
                .ok_or(InternalError::EnvironmentChainEnded)?;
        }
        Ok(current)
    }

    /// Nearest module record in the chain starting at `env`
    pub fn nearest_module(&self, env: EnvId) -> Result<EnvId, InternalError> {
        let mut current = Some(env);
        while let Some(id) = current {
            let record = self.record(id)?;
            if matches!(record.kind, EnvKind::Module(_)) {
                return Ok(id);
            }
            current = record.outer;
        }
        Err(InternalError::NoModuleEnvironment)
    }

    /// Check for a named binding in `env` itself
    pub fn has_binding(&self, env: EnvId, name: &str) -> bool {
        self.record(env)
            .map(|record| record.names.contains_key(name))
            .unwrap_or(false)
    }

    fn create_binding(
        &mut self,
        env: EnvId,
        name: &str,
        mutable: bool,
        deletable: bool,
    ) -> Result<usize, BindingError> {
        let record = self.record_mut(env)?;
        if record.names.contains_key(name) {
            return Err(BindingError::AlreadyDeclared(name.to_string()));
        }
        record.slots.push(Slot::new(mutable, deletable));
        let slot = record.slots.len() - 1;
        record.names.insert(name.to_string(), slot);
        Ok(slot)
    }

    /// Create an uninitialized mutable binding
    pub fn create_mutable_binding(
        &mut self,
        env: EnvId,
        name: &str,
        deletable: bool,
    ) -> Result<(), BindingError> {
        self.create_binding(env, name, true, deletable).map(|_| ())
    }

    /// Create an uninitialized immutable binding
    pub fn create_immutable_binding(&mut self, env: EnvId, name: &str) -> Result<(), BindingError> {
        self.create_binding(env, name, false, false).map(|_| ())
    }

    fn slot_of(&self, env: EnvId, name: &str) -> Result<usize, BindingError> {
        self.record(env)?
            .names
            .get(name)
            .copied()
            .ok_or_else(|| BindingError::NotDefined(name.to_string()))
    }

    /// Give an uninitialized binding its first value
    pub fn initialize_binding(
        &mut self,
        env: EnvId,
        name: &str,
        value: Value,
    ) -> Result<(), BindingError> {
        let slot = self.slot_of(env, name)?;
        self.record_mut(env)?.slots[slot].binding = Binding::Initialized(value);
        Ok(())
    }

    /// Read a named binding
    pub fn get_binding_value(&self, env: EnvId, name: &str) -> Result<Value, BindingError> {
        let slot = self.slot_of(env, name)?;
        self.read(env, slot, 0)
    }

    /// Write an initialized named binding
    pub fn set_mutable_binding(
        &mut self,
        env: EnvId,
        name: &str,
        value: Value,
    ) -> Result<(), BindingError> {
        let slot = self.slot_of(env, name)?;
        self.write(env, slot, value, false, 0)
    }

    /// Write a named binding, initializing it if it is still uninitialized
    pub fn store_binding(&mut self, env: EnvId, name: &str, value: Value) -> Result<(), BindingError> {
        let slot = self.slot_of(env, name)?;
        self.write(env, slot, value, true, 0)
    }

    /// Read a binding by slot index
    pub fn get_slot(&self, env: EnvId, slot: u32) -> Result<Value, BindingError> {
        let index = self.checked_slot(env, slot)?;
        self.read(env, index, 0)
    }

    /// Write a binding by slot index, initializing it if needed
    pub fn set_slot(&mut self, env: EnvId, slot: u32, value: Value) -> Result<(), BindingError> {
        let index = self.checked_slot(env, slot)?;
        self.write(env, index, value, true, 0)
    }

    fn checked_slot(&self, env: EnvId, slot: u32) -> Result<usize, InternalError> {
        let record = self.record(env)?;
        if (slot as usize) < record.slots.len() {
            Ok(slot as usize)
        } else {
            Err(InternalError::InvalidSlot { env: env.0, slot })
        }
    }

    /// Remove a deletable named binding
    pub fn delete_binding(&mut self, env: EnvId, name: &str) -> Result<bool, InternalError> {
        let record = self.record_mut(env)?;
        match record.names.get(name).copied() {
            Some(slot) if record.slots[slot].deletable => {
                record.names.shift_remove(name);
                record.slots[slot].binding = Binding::Uninitialized;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(true),
        }
    }

    /// Bind `local` in `env` to the export `remote` of `module`
    ///
    /// Reads and writes of `local` operate on the target module's binding.
    pub fn set_indirect_binding(
        &mut self,
        env: EnvId,
        local: &str,
        module: ModuleId,
        remote: &str,
    ) -> Result<(), BindingError> {
        let slot = self.create_binding(env, local, false, false)?;
        self.record_mut(env)?.slots[slot].binding = Binding::Indirect {
            module,
            name: remote.to_string(),
        };
        Ok(())
    }

    /// Current state of a named binding, without following indirection
    pub fn binding(&self, env: EnvId, name: &str) -> Result<&Binding, BindingError> {
        let slot = self.slot_of(env, name)?;
        Ok(&self.record(env)?.slots[slot].binding)
    }

    /// Register an exported name of a module record
    pub fn set_export(
        &mut self,
        env: EnvId,
        export_name: &str,
        target: ExportTarget,
    ) -> Result<(), InternalError> {
        self.record_mut(env)?
            .exports
            .insert(export_name.to_string(), target);
        Ok(())
    }

    /// Target of an exported name of a module record
    pub fn export_target(&self, env: EnvId, export_name: &str) -> Option<&ExportTarget> {
        self.record(env).ok()?.exports.get(export_name)
    }

    /// Read the current value of a module export
    pub fn resolve_module_export(&self, module: ModuleId, name: &str) -> Result<Value, BindingError> {
        self.resolve_export(module, name, 0)
    }

    fn hop_limit(&self) -> usize {
        self.records.len() * 2 + 2
    }

    fn resolve_export(&self, module: ModuleId, name: &str, hops: usize) -> Result<Value, BindingError> {
        if hops > self.hop_limit() {
            return Err(InternalError::UnresolvableIndirection(name.to_string()).into());
        }
        let env = self
            .module_env(module)
            .ok_or(InternalError::ModuleNotLinked(module.0))?;
        match self.export_target(env, name) {
            Some(ExportTarget::Local(local)) => {
                let slot = self.slot_of(env, local)?;
                self.read(env, slot, hops + 1)
            }
            Some(ExportTarget::Indirect { module, name }) => {
                self.resolve_export(*module, name, hops + 1)
            }
            Some(ExportTarget::Namespace(value)) => Ok(value.clone()),
            None => Err(BindingError::NotDefined(name.to_string())),
        }
    }

    fn read(&self, env: EnvId, slot: usize, hops: usize) -> Result<Value, BindingError> {
        let record = self.record(env)?;
        match &record.slots[slot].binding {
            Binding::Initialized(value) => Ok(value.clone()),
            Binding::Uninitialized => Err(BindingError::Uninitialized(record.slot_name(slot))),
            Binding::Indirect { module, name } => self.resolve_export(*module, name, hops + 1),
        }
    }

    fn write(
        &mut self,
        env: EnvId,
        slot: usize,
        value: Value,
        initialize: bool,
        hops: usize,
    ) -> Result<(), BindingError> {
        if hops > self.hop_limit() {
            let name = self.record(env)?.slot_name(slot);
            return Err(InternalError::UnresolvableIndirection(name).into());
        }
        let record = self.record(env)?;
        let entry = &record.slots[slot];
        let forward = match &entry.binding {
            Binding::Uninitialized if !initialize => {
                return Err(BindingError::Uninitialized(record.slot_name(slot)))
            }
            Binding::Initialized(_) if !entry.mutable => {
                return Err(BindingError::ConstantAssignment(record.slot_name(slot)))
            }
            Binding::Uninitialized | Binding::Initialized(_) => None,
            Binding::Indirect { module, name } => Some((*module, name.clone())),
        };
        match forward {
            None => {
                self.record_mut(env)?.slots[slot].binding = Binding::Initialized(value);
                Ok(())
            }
            Some((module, name)) => {
                let (target_env, target_slot) = self.export_slot(module, &name, hops + 1)?;
                self.write(target_env, target_slot, value, initialize, hops + 1)
            }
        }
    }

    fn export_slot(
        &self,
        module: ModuleId,
        name: &str,
        hops: usize,
    ) -> Result<(EnvId, usize), BindingError> {
        if hops > self.hop_limit() {
            return Err(InternalError::UnresolvableIndirection(name.to_string()).into());
        }
        let env = self
            .module_env(module)
            .ok_or(InternalError::ModuleNotLinked(module.0))?;
        match self.export_target(env, name) {
            Some(ExportTarget::Local(local)) => Ok((env, self.slot_of(env, local)?)),
            Some(ExportTarget::Indirect { module, name }) => self.export_slot(*module, name, hops + 1),
            Some(ExportTarget::Namespace(_)) | None => {
                Err(BindingError::ConstantAssignment(name.to_string()))
            }
        }
    }
}
