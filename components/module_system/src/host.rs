//! Host hooks for module resolution
//!
//! The host decides what a specifier means. Every graph operation that may
//! discover new modules takes the hooks as an explicit parameter.

use crate::entry::ModuleSource;
use crate::error::ModuleError;
use indexmap::IndexMap;

/// Host-provided module resolution and loading
pub trait HostHooks {
    /// Map `specifier`, imported by the module with key `referrer`, to a
    /// module key
    fn resolve_imported_module(&self, referrer: &str, specifier: &str)
        -> Result<String, ModuleError>;

    /// Source of the module with the given key
    fn fetch_module(&self, key: &str) -> Result<ModuleSource, ModuleError>;
}

/// Join a relative specifier onto the referrer's directory
///
/// Specifiers starting with `./`, `../` or `/` are paths; anything else is a
/// bare name and maps to itself.
///
/// # Examples
///
/// ```
/// use module_system::resolve_specifier;
///
/// assert_eq!(resolve_specifier("src/main.js", "./lib.js"), "src/lib.js");
/// assert_eq!(resolve_specifier("src/a/b.js", "../c.js"), "src/c.js");
/// assert_eq!(resolve_specifier("src/main.js", "utils"), "utils");
/// ```
pub fn resolve_specifier(referrer: &str, specifier: &str) -> String {
    let absolute = specifier.starts_with('/');
    if !absolute && !specifier.starts_with("./") && !specifier.starts_with("../") {
        return specifier.to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    if !absolute {
        if let Some((directory, _)) = referrer.rsplit_once('/') {
            segments.extend(directory.split('/').filter(|s| !s.is_empty()));
        }
    }
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    let joined = segments.join("/");
    if absolute || referrer.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// In-memory host keyed by normalized path
#[derive(Debug, Clone, Default)]
pub struct StaticModuleMap {
    modules: IndexMap<String, ModuleSource>,
}

impl StaticModuleMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `key`
    pub fn insert(&mut self, key: impl Into<String>, source: ModuleSource) {
        self.modules.insert(key.into(), source);
    }

    /// Register a module, builder style
    pub fn with(mut self, key: impl Into<String>, source: ModuleSource) -> Self {
        self.insert(key, source);
        self
    }

    /// Check for a registered key
    pub fn contains(&self, key: &str) -> bool {
        self.modules.contains_key(key)
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no module is registered
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl HostHooks for StaticModuleMap {
    fn resolve_imported_module(
        &self,
        referrer: &str,
        specifier: &str,
    ) -> Result<String, ModuleError> {
        let key = resolve_specifier(referrer, specifier);
        if self.modules.contains_key(&key) {
            Ok(key)
        } else {
            Err(ModuleError::Unresolvable {
                specifier: specifier.to_string(),
                referrer: referrer.to_string(),
            })
        }
    }

    fn fetch_module(&self, key: &str) -> Result<ModuleSource, ModuleError> {
        self.modules
            .get(key)
            .cloned()
            .ok_or_else(|| ModuleError::Fetch {
                key: key.to_string(),
                reason: "no such module".to_string(),
            })
    }
}
