//! Source text module records

use crate::entry::{ExportEntry, ImportEntry, ModuleSource};
use crate::error::ModuleError;
use bytecode_system::FunctionInfo;
use core_types::Value;
use interpreter::{EnvId, ModuleId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// The status of a module in its lifecycle.
///
/// Modules progress through these states:
/// Unlinked → Linking → Linked → Evaluating → Evaluated
///
/// A failed link returns every module of the failed pass to `Unlinked`. A
/// failed evaluation still ends in `Evaluated`, with the error recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Registered, environment not yet created
    Unlinked,
    /// On the stack of an ongoing link pass
    Linking,
    /// Environment created and all dependencies linked
    Linked,
    /// On the stack of an ongoing evaluation pass
    Evaluating,
    /// Body has run; the outcome is recorded
    Evaluated,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleStatus::Unlinked => "unlinked",
            ModuleStatus::Linking => "linking",
            ModuleStatus::Linked => "linked",
            ModuleStatus::Evaluating => "evaluating",
            ModuleStatus::Evaluated => "evaluated",
        };
        f.write_str(name)
    }
}

/// Handle of a module within a [`crate::ModuleGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleHandle(pub usize);

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// One module of the graph
#[derive(Debug, Clone)]
pub struct SourceTextModule {
    key: String,
    id: ModuleId,
    body: Rc<FunctionInfo>,
    imports: Vec<ImportEntry>,
    exports: Vec<ExportEntry>,
    requested: Vec<String>,
    pub(crate) status: ModuleStatus,
    pub(crate) resolved: HashMap<String, ModuleHandle>,
    pub(crate) env: Option<EnvId>,
    pub(crate) dfs_index: usize,
    pub(crate) dfs_ancestor_index: usize,
    pub(crate) namespace: Option<Value>,
    pub(crate) result: Option<Result<Value, ModuleError>>,
}

impl SourceTextModule {
    pub(crate) fn new(key: String, id: ModuleId, source: ModuleSource) -> Self {
        let requested = source.requested_specifiers();
        let mut body = source.body;
        body.is_strict = true;
        Self {
            key,
            id,
            body: Rc::new(body),
            imports: source.imports,
            exports: source.exports,
            requested,
            status: ModuleStatus::Unlinked,
            resolved: HashMap::new(),
            env: None,
            dfs_index: 0,
            dfs_ancestor_index: 0,
            namespace: None,
            result: None,
        }
    }

    /// Resolved key the module was registered under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Id of the module in the realm's environment arena
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Current lifecycle status
    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    /// Compiled top-level body
    pub fn body(&self) -> &Rc<FunctionInfo> {
        &self.body
    }

    /// Import entries
    pub fn imports(&self) -> &[ImportEntry] {
        &self.imports
    }

    /// Export entries
    pub fn exports(&self) -> &[ExportEntry] {
        &self.exports
    }

    /// Requested specifiers in first occurrence order
    pub fn requested_modules(&self) -> &[String] {
        &self.requested
    }

    /// Module a specifier resolved to, once resolved
    pub fn resolved_module(&self, specifier: &str) -> Option<ModuleHandle> {
        self.resolved.get(specifier).copied()
    }

    /// Module environment, once linked
    pub fn environment(&self) -> Option<EnvId> {
        self.env
    }

    /// Recorded evaluation outcome
    pub fn evaluation_result(&self) -> Option<&Result<Value, ModuleError>> {
        self.result.as_ref()
    }

    /// Names imported from `specifier`
    ///
    /// Default imports report `default`; namespace imports report `*`.
    pub fn get_imported_names(&self, specifier: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in self.imports.iter().filter(|e| e.specifier() == specifier) {
            let name = entry.imported_name();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    pub(crate) fn reset_link(&mut self) {
        self.status = ModuleStatus::Unlinked;
        self.env = None;
    }
}
