//! Static import and export entries of a module
//!
//! A front end extracts these from the module's declarations. Together with
//! the compiled top-level body they form a [`ModuleSource`], which is all the
//! module system needs to link and evaluate the module.

use bytecode_system::FunctionInfo;
use serde::{Deserialize, Serialize};

/// Export and binding name used by default exports and imports
pub const DEFAULT_EXPORT: &str = "default";

/// One imported binding
///
/// ```javascript
/// import { foo as bar } from './a.js';  // Named { imported: "foo", local: "bar" }
/// import utils from './utils.js';       // Default { local: "utils" }
/// import * as ns from './b.js';         // Namespace { local: "ns" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportEntry {
    /// `import { imported as local } from specifier`
    Named {
        /// Module specifier as written
        specifier: String,
        /// Export name in the target module
        imported: String,
        /// Binding name in this module
        local: String,
    },
    /// `import local from specifier`
    Default {
        /// Module specifier as written
        specifier: String,
        /// Binding name in this module
        local: String,
    },
    /// `import * as local from specifier`
    Namespace {
        /// Module specifier as written
        specifier: String,
        /// Binding name in this module
        local: String,
    },
}

impl ImportEntry {
    /// Module specifier of the import
    pub fn specifier(&self) -> &str {
        match self {
            ImportEntry::Named { specifier, .. }
            | ImportEntry::Default { specifier, .. }
            | ImportEntry::Namespace { specifier, .. } => specifier,
        }
    }

    /// Binding name created in the importing module
    pub fn local_name(&self) -> &str {
        match self {
            ImportEntry::Named { local, .. }
            | ImportEntry::Default { local, .. }
            | ImportEntry::Namespace { local, .. } => local,
        }
    }

    /// Name requested from the target module; `*` for namespace imports
    pub fn imported_name(&self) -> &str {
        match self {
            ImportEntry::Named { imported, .. } => imported,
            ImportEntry::Default { .. } => DEFAULT_EXPORT,
            ImportEntry::Namespace { .. } => "*",
        }
    }
}

/// One exported name
///
/// ```javascript
/// export { x as y };                 // Local { local: "x", exported: "y" }
/// export default 1;                  // Default
/// export { a as b } from './m.js';   // NamedFrom { imported: "a", exported: "b" }
/// export * from './m.js';            // AllFrom
/// export * as ns from './m.js';      // AllAsFrom { exported: "ns" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExportEntry {
    /// Export of a binding declared in this module
    Local {
        /// Binding name in this module
        local: String,
        /// Exported name
        exported: String,
    },
    /// `export default`; the body initializes the `default` binding
    Default,
    /// Re-export of one name of another module
    NamedFrom {
        /// Module specifier as written
        specifier: String,
        /// Export name in the target module
        imported: String,
        /// Exported name
        exported: String,
    },
    /// Re-export of every name of another module except `default`
    AllFrom {
        /// Module specifier as written
        specifier: String,
    },
    /// Re-export of another module's namespace object under one name
    AllAsFrom {
        /// Module specifier as written
        specifier: String,
        /// Exported name
        exported: String,
    },
}

impl ExportEntry {
    /// Module specifier of a re-export
    pub fn specifier(&self) -> Option<&str> {
        match self {
            ExportEntry::NamedFrom { specifier, .. }
            | ExportEntry::AllFrom { specifier }
            | ExportEntry::AllAsFrom { specifier, .. } => Some(specifier),
            ExportEntry::Local { .. } | ExportEntry::Default => None,
        }
    }

    /// Name this entry exports, if it names exactly one
    pub fn exported_name(&self) -> Option<&str> {
        match self {
            ExportEntry::Local { exported, .. }
            | ExportEntry::NamedFrom { exported, .. }
            | ExportEntry::AllAsFrom { exported, .. } => Some(exported),
            ExportEntry::Default => Some(DEFAULT_EXPORT),
            ExportEntry::AllFrom { .. } => None,
        }
    }
}

/// Statically analyzed module handed over by a front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSource {
    /// Compiled top-level body, run once with no arguments
    pub body: FunctionInfo,
    /// Import declarations in source order
    pub imports: Vec<ImportEntry>,
    /// Export declarations in source order
    pub exports: Vec<ExportEntry>,
}

impl ModuleSource {
    /// Module with a body and no imports or exports
    pub fn new(body: FunctionInfo) -> Self {
        Self {
            body,
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Add an import entry
    pub fn with_import(mut self, entry: ImportEntry) -> Self {
        self.imports.push(entry);
        self
    }

    /// Add an export entry
    pub fn with_export(mut self, entry: ExportEntry) -> Self {
        self.exports.push(entry);
        self
    }

    /// Specifiers of every import and re-export, first occurrence order
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::FunctionInfo;
    /// use module_system::{ExportEntry, ImportEntry, ModuleSource};
    ///
    /// let source = ModuleSource::new(FunctionInfo::new("main"))
    ///     .with_import(ImportEntry::Default {
    ///         specifier: "./a.js".to_string(),
    ///         local: "a".to_string(),
    ///     })
    ///     .with_export(ExportEntry::AllFrom { specifier: "./b.js".to_string() })
    ///     .with_import(ImportEntry::Namespace {
    ///         specifier: "./a.js".to_string(),
    ///         local: "ns".to_string(),
    ///     });
    /// assert_eq!(source.requested_specifiers(), vec!["./a.js", "./b.js"]);
    /// ```
    pub fn requested_specifiers(&self) -> Vec<String> {
        let mut specifiers: Vec<String> = Vec::new();
        let all = self
            .imports
            .iter()
            .map(ImportEntry::specifier)
            .chain(self.exports.iter().filter_map(ExportEntry::specifier));
        for specifier in all {
            if !specifiers.iter().any(|s| s == specifier) {
                specifiers.push(specifier.to_string());
            }
        }
        specifiers
    }

    /// Deserialize from the JSON interchange format
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize to the JSON interchange format
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
