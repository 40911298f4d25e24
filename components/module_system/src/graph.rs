//! Module registry and the link/evaluate state machine
//!
//! Linking and evaluation share one depth-first walk over requested
//! modules. Each module entering the walk gets a monotonic index and is
//! pushed on a stack; a module whose lowest reachable index is its own is the
//! root of a strongly connected component, and the whole component leaves the
//! stack together. An import cycle therefore becomes `Linked` or `Evaluated`
//! as a unit.

use crate::entry::{ExportEntry, ImportEntry, ModuleSource, DEFAULT_EXPORT};
use crate::error::ModuleError;
use crate::host::HostHooks;
use crate::record::{ModuleHandle, ModuleStatus, SourceTextModule};
use core_types::Value;
use interpreter::{
    operations, BindingError, ExecutionResult, ExportTarget, Interpreter, InternalError,
    JsObject, ObjectKind, Realm, RealmId,
};
use std::collections::{HashMap, HashSet};

/// Registry of modules keyed by resolved key
///
/// A graph belongs to the realm passed to its first operation. Module
/// environments and namespace objects live in that realm, so every later
/// call must pass the same one; another realm is rejected with
/// [`ModuleError::ForeignRealm`].
///
/// # Examples
///
/// ```
/// use bytecode_system::{Constant, FunctionInfo, Opcode};
/// use core_types::Value;
/// use interpreter::Realm;
/// use module_system::{ModuleGraph, ModuleSource, ModuleStatus, StaticModuleMap};
///
/// let mut body = FunctionInfo::new("main");
/// body.emit(Opcode::PushConstant(Constant::Integer(7)));
/// body.emit(Opcode::Return);
/// let host = StaticModuleMap::new().with("main.js", ModuleSource::new(body));
///
/// let mut realm = Realm::new();
/// let mut graph = ModuleGraph::new();
/// assert_eq!(graph.execute(&mut realm, &host, "main.js").unwrap(), Value::Smi(7));
///
/// let main = graph.lookup("main.js").unwrap();
/// assert_eq!(graph.status(main), Some(ModuleStatus::Evaluated));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: Vec<SourceTextModule>,
    keys: HashMap<String, ModuleHandle>,
    realm: Option<RealmId>,
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

impl ModuleGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no module is registered
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Handle of the module registered under `key`
    pub fn lookup(&self, key: &str) -> Option<ModuleHandle> {
        self.keys.get(key).copied()
    }

    /// Borrow a module record
    pub fn module(&self, handle: ModuleHandle) -> Option<&SourceTextModule> {
        self.modules.get(handle.0)
    }

    /// Lifecycle status of a module
    pub fn status(&self, handle: ModuleHandle) -> Option<ModuleStatus> {
        self.module(handle).map(SourceTextModule::status)
    }

    /// Realm the graph is bound to, once any realm-taking call has run
    pub fn realm(&self) -> Option<RealmId> {
        self.realm
    }

    fn bind_realm(&mut self, realm: &Realm) -> Result<(), ModuleError> {
        match self.realm {
            Some(bound) if bound != realm.id() => Err(ModuleError::ForeignRealm),
            Some(_) => Ok(()),
            None => {
                self.realm = Some(realm.id());
                Ok(())
            }
        }
    }

    fn get(&self, handle: ModuleHandle) -> Result<&SourceTextModule, ModuleError> {
        self.modules
            .get(handle.0)
            .ok_or(ModuleError::UnknownModule(handle.0))
    }

    fn get_mut(&mut self, handle: ModuleHandle) -> Result<&mut SourceTextModule, ModuleError> {
        self.modules
            .get_mut(handle.0)
            .ok_or(ModuleError::UnknownModule(handle.0))
    }

    fn key_of(&self, handle: ModuleHandle) -> Result<String, ModuleError> {
        Ok(self.get(handle)?.key().to_string())
    }

    // -----------------------------------------------------------------------
    // Registration and resolution
    // -----------------------------------------------------------------------

    /// Register a module source under `key`
    ///
    /// The body is verified first; a key already present returns the
    /// existing handle.
    pub fn register(
        &mut self,
        realm: &mut Realm,
        key: &str,
        source: ModuleSource,
    ) -> Result<ModuleHandle, ModuleError> {
        self.bind_realm(realm)?;
        if let Some(handle) = self.lookup(key) {
            return Ok(handle);
        }
        bytecode_system::verify(&source.body).map_err(|source| ModuleError::InvalidBody {
            key: key.to_string(),
            source,
        })?;
        let id = realm.envs.allocate_module_id();
        let handle = ModuleHandle(self.modules.len());
        self.modules
            .push(SourceTextModule::new(key.to_string(), id, source));
        self.keys.insert(key.to_string(), handle);
        log::debug!("registered {} as {}", key, handle);
        Ok(handle)
    }

    /// Fetch and register the module with the given key
    pub fn load(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        key: &str,
    ) -> Result<ModuleHandle, ModuleError> {
        self.bind_realm(realm)?;
        if let Some(handle) = self.lookup(key) {
            return Ok(handle);
        }
        let source = host.fetch_module(key)?;
        self.register(realm, key, source)
    }

    fn resolve(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        referrer: ModuleHandle,
        specifier: &str,
    ) -> Result<ModuleHandle, ModuleError> {
        if let Some(handle) = self.get(referrer)?.resolved_module(specifier) {
            return Ok(handle);
        }
        let referrer_key = self.key_of(referrer)?;
        let key = host.resolve_imported_module(&referrer_key, specifier)?;
        let handle = self.load(realm, host, &key)?;
        self.get_mut(referrer)?
            .resolved
            .insert(specifier.to_string(), handle);
        Ok(handle)
    }

    // -----------------------------------------------------------------------
    // Static export information
    // -----------------------------------------------------------------------

    /// Every name the module exports, including names reached through
    /// `export *`
    ///
    /// Each module is visited once, so `export *` cycles terminate.
    pub fn get_exported_names(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        handle: ModuleHandle,
    ) -> Result<Vec<String>, ModuleError> {
        self.bind_realm(realm)?;
        let mut visited = HashSet::new();
        let mut names = Vec::new();
        self.collect_exported_names(realm, host, handle, &mut visited, &mut names)?;
        Ok(names)
    }

    fn collect_exported_names(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        handle: ModuleHandle,
        visited: &mut HashSet<ModuleHandle>,
        names: &mut Vec<String>,
    ) -> Result<(), ModuleError> {
        if !visited.insert(handle) {
            return Ok(());
        }
        let exports = self.get(handle)?.exports().to_vec();
        for entry in &exports {
            match entry {
                ExportEntry::AllFrom { specifier } => {
                    let target = self.resolve(realm, host, handle, specifier)?;
                    let mut star = Vec::new();
                    self.collect_exported_names(realm, host, target, visited, &mut star)?;
                    for name in star.iter().filter(|n| *n != DEFAULT_EXPORT) {
                        push_unique(names, name);
                    }
                }
                other => {
                    if let Some(name) = other.exported_name() {
                        push_unique(names, name);
                    }
                }
            }
        }
        Ok(())
    }

    /// Names the module imports from `specifier`
    pub fn get_imported_names(
        &self,
        handle: ModuleHandle,
        specifier: &str,
    ) -> Result<Vec<String>, ModuleError> {
        Ok(self.get(handle)?.get_imported_names(specifier))
    }

    fn require_export(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        target: ModuleHandle,
        name: &str,
    ) -> Result<(), ModuleError> {
        let names = self.get_exported_names(realm, host, target)?;
        if names.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(ModuleError::MissingExport {
                target: self.key_of(target)?,
                name: name.to_string(),
            })
        }
    }

    /// Namespace object of a module, created on first request
    ///
    /// The object has no prototype and exposes the module's exported names in
    /// sorted order; property reads go to the live bindings.
    pub fn namespace_object(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        handle: ModuleHandle,
    ) -> Result<Value, ModuleError> {
        self.bind_realm(realm)?;
        if let Some(namespace) = &self.get(handle)?.namespace {
            return Ok(namespace.clone());
        }
        let mut exports = self.get_exported_names(realm, host, handle)?;
        exports.sort();
        let module = self.get(handle)?.id();
        let namespace = realm
            .heap
            .allocate(JsObject::new(ObjectKind::Namespace { module, exports }, None));
        self.get_mut(handle)?.namespace = Some(namespace.clone());
        Ok(namespace)
    }

    // -----------------------------------------------------------------------
    // Linking
    // -----------------------------------------------------------------------

    /// Link a module and everything it requests
    ///
    /// Any failure returns every module of the unfinished pass to
    /// `Unlinked`; components completed earlier in the pass stay linked.
    pub fn link(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        handle: ModuleHandle,
    ) -> Result<(), ModuleError> {
        self.bind_realm(realm)?;
        let mut stack = Vec::new();
        if let Err(error) = self.inner_link(realm, host, handle, &mut stack, 0) {
            for member in stack {
                let module = self.get_mut(member)?;
                log::debug!("link failed, resetting {}", module.key());
                module.reset_link();
            }
            return Err(error);
        }
        Ok(())
    }

    fn inner_link(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        handle: ModuleHandle,
        stack: &mut Vec<ModuleHandle>,
        mut index: usize,
    ) -> Result<usize, ModuleError> {
        let requested = {
            let module = self.get_mut(handle)?;
            if module.status != ModuleStatus::Unlinked {
                return Ok(index);
            }
            log::debug!("linking {}", module.key());
            module.status = ModuleStatus::Linking;
            module.dfs_index = index;
            module.dfs_ancestor_index = index;
            module.requested_modules().to_vec()
        };
        index += 1;
        stack.push(handle);

        for specifier in &requested {
            let required = self.resolve(realm, host, handle, specifier)?;
            index = self.inner_link(realm, host, required, stack, index)?;
            let (status, ancestor) = {
                let module = self.get(required)?;
                (module.status, module.dfs_ancestor_index)
            };
            if status == ModuleStatus::Linking {
                let module = self.get_mut(handle)?;
                module.dfs_ancestor_index = module.dfs_ancestor_index.min(ancestor);
            }
        }

        self.initialize_environment(realm, host, handle)?;

        let module = self.get(handle)?;
        if module.dfs_ancestor_index == module.dfs_index {
            while let Some(member) = stack.pop() {
                let module = self.get_mut(member)?;
                module.status = ModuleStatus::Linked;
                log::debug!("linked {}", module.key());
                if member == handle {
                    break;
                }
            }
        }
        Ok(index)
    }

    fn initialize_environment(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        handle: ModuleHandle,
    ) -> Result<(), ModuleError> {
        let (key, id, imports, exports) = {
            let module = self.get(handle)?;
            (
                module.key().to_string(),
                module.id(),
                module.imports().to_vec(),
                module.exports().to_vec(),
            )
        };
        let internal = |source: InternalError| ModuleError::Internal {
            key: key.clone(),
            source,
        };
        let binding = |source: BindingError| ModuleError::Binding {
            key: key.clone(),
            source,
        };

        let global = realm.global_env();
        let env = realm.envs.new_module(global, id).map_err(internal)?;
        self.get_mut(handle)?.env = Some(env);

        for entry in &imports {
            let target = self.resolve(realm, host, handle, entry.specifier())?;
            match entry {
                ImportEntry::Namespace { local, .. } => {
                    let namespace = self.namespace_object(realm, host, target)?;
                    realm
                        .envs
                        .create_immutable_binding(env, local)
                        .map_err(binding)?;
                    realm
                        .envs
                        .initialize_binding(env, local, namespace)
                        .map_err(binding)?;
                }
                ImportEntry::Named { .. } | ImportEntry::Default { .. } => {
                    self.require_export(realm, host, target, entry.imported_name())?;
                    let target_id = self.get(target)?.id();
                    realm
                        .envs
                        .set_indirect_binding(env, entry.local_name(), target_id, entry.imported_name())
                        .map_err(binding)?;
                }
            }
        }

        let explicit: Vec<&str> = exports.iter().filter_map(ExportEntry::exported_name).collect();
        for entry in &exports {
            match entry {
                ExportEntry::Local { local, exported } => {
                    if !realm.envs.has_binding(env, local) {
                        realm
                            .envs
                            .create_mutable_binding(env, local, false)
                            .map_err(binding)?;
                    }
                    realm
                        .envs
                        .set_export(env, exported, ExportTarget::Local(local.clone()))
                        .map_err(internal)?;
                }
                ExportEntry::Default => {
                    if !realm.envs.has_binding(env, DEFAULT_EXPORT) {
                        realm
                            .envs
                            .create_mutable_binding(env, DEFAULT_EXPORT, false)
                            .map_err(binding)?;
                    }
                    realm
                        .envs
                        .set_export(
                            env,
                            DEFAULT_EXPORT,
                            ExportTarget::Local(DEFAULT_EXPORT.to_string()),
                        )
                        .map_err(internal)?;
                }
                ExportEntry::NamedFrom {
                    specifier,
                    imported,
                    exported,
                } => {
                    let target = self.resolve(realm, host, handle, specifier)?;
                    self.require_export(realm, host, target, imported)?;
                    let module = self.get(target)?.id();
                    realm
                        .envs
                        .set_export(
                            env,
                            exported,
                            ExportTarget::Indirect {
                                module,
                                name: imported.clone(),
                            },
                        )
                        .map_err(internal)?;
                }
                ExportEntry::AllFrom { specifier } => {
                    let target = self.resolve(realm, host, handle, specifier)?;
                    let module = self.get(target)?.id();
                    for name in self.get_exported_names(realm, host, target)? {
                        if name == DEFAULT_EXPORT
                            || explicit.contains(&name.as_str())
                            || realm.envs.export_target(env, &name).is_some()
                        {
                            continue;
                        }
                        realm
                            .envs
                            .set_export(env, &name, ExportTarget::Indirect { module, name: name.clone() })
                            .map_err(internal)?;
                    }
                }
                ExportEntry::AllAsFrom {
                    specifier,
                    exported,
                } => {
                    let target = self.resolve(realm, host, handle, specifier)?;
                    let namespace = self.namespace_object(realm, host, target)?;
                    realm
                        .envs
                        .set_export(env, exported, ExportTarget::Namespace(namespace))
                        .map_err(internal)?;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Evaluate a linked module and everything it requests
    ///
    /// Each body runs at most once. A module that has already been evaluated
    /// returns its recorded outcome. When a body throws, the error is
    /// recorded on every module of the unfinished pass, so later importers
    /// observe the same failure.
    pub fn evaluate(
        &mut self,
        realm: &mut Realm,
        handle: ModuleHandle,
    ) -> Result<Value, ModuleError> {
        self.bind_realm(realm)?;
        let module = self.get(handle)?;
        match module.status {
            ModuleStatus::Unlinked | ModuleStatus::Linking => {
                return Err(ModuleError::NotLinked(module.key().to_string()))
            }
            ModuleStatus::Evaluating => {
                log::debug!("{} is already being evaluated", module.key());
                return Ok(Value::Undefined);
            }
            ModuleStatus::Linked | ModuleStatus::Evaluated => {}
        }

        let mut stack = Vec::new();
        if let Err(error) = self.inner_evaluate(realm, handle, &mut stack, 0) {
            for member in stack {
                let module = self.get_mut(member)?;
                log::debug!("evaluation of {} failed: {}", module.key(), error);
                module.status = ModuleStatus::Evaluated;
                module.result = Some(Err(error.clone()));
            }
        }
        self.get(handle)?
            .result
            .clone()
            .unwrap_or(Ok(Value::Undefined))
    }

    fn inner_evaluate(
        &mut self,
        realm: &mut Realm,
        handle: ModuleHandle,
        stack: &mut Vec<ModuleHandle>,
        mut index: usize,
    ) -> Result<usize, ModuleError> {
        let requested = {
            let module = self.get_mut(handle)?;
            match module.status {
                ModuleStatus::Evaluated => {
                    return match &module.result {
                        Some(Err(error)) => Err(error.clone()),
                        _ => Ok(index),
                    }
                }
                ModuleStatus::Evaluating => return Ok(index),
                ModuleStatus::Unlinked | ModuleStatus::Linking => {
                    return Err(ModuleError::NotLinked(module.key().to_string()))
                }
                ModuleStatus::Linked => {}
            }
            log::debug!("evaluating {}", module.key());
            module.status = ModuleStatus::Evaluating;
            module.dfs_index = index;
            module.dfs_ancestor_index = index;
            module.requested_modules().to_vec()
        };
        index += 1;
        stack.push(handle);

        for specifier in &requested {
            let required = {
                let module = self.get(handle)?;
                module
                    .resolved_module(specifier)
                    .ok_or_else(|| ModuleError::NotLinked(module.key().to_string()))?
            };
            index = self.inner_evaluate(realm, required, stack, index)?;
            let (status, ancestor) = {
                let module = self.get(required)?;
                (module.status, module.dfs_ancestor_index)
            };
            if status == ModuleStatus::Evaluating {
                let module = self.get_mut(handle)?;
                module.dfs_ancestor_index = module.dfs_ancestor_index.min(ancestor);
            }
        }

        let value = self.execute_module(realm, handle)?;
        let module = self.get_mut(handle)?;
        module.result = Some(Ok(value));

        if module.dfs_ancestor_index == module.dfs_index {
            while let Some(member) = stack.pop() {
                let module = self.get_mut(member)?;
                module.status = ModuleStatus::Evaluated;
                log::debug!("evaluated {}", module.key());
                if member == handle {
                    break;
                }
            }
        }
        Ok(index)
    }

    fn execute_module(&mut self, realm: &mut Realm, handle: ModuleHandle) -> Result<Value, ModuleError> {
        let module = self.get(handle)?;
        let key = module.key().to_string();
        let env = module
            .environment()
            .ok_or_else(|| ModuleError::NotLinked(key.clone()))?;
        let body = std::rc::Rc::clone(module.body());

        match Interpreter::new(body, Vec::new(), env).interpret(realm) {
            ExecutionResult::Success(value) => Ok(value),
            ExecutionResult::RuntimeError(value) => {
                let description = operations::describe_error(realm, &value);
                Err(ModuleError::Uncaught {
                    key,
                    value,
                    description,
                })
            }
            ExecutionResult::InternalError(source) => Err(ModuleError::Internal { key, source }),
        }
    }

    /// Load, link and evaluate the module with the given key
    pub fn execute(
        &mut self,
        realm: &mut Realm,
        host: &dyn HostHooks,
        key: &str,
    ) -> Result<Value, ModuleError> {
        let handle = self.load(realm, host, key)?;
        self.link(realm, host, handle)?;
        self.evaluate(realm, handle)
    }
}
