//! Transform configuration.
//!
//! The host API is a single ambient object. Everything the transform knows
//! about it (its reserved global name, which methods are pure, which need the
//! plugin name bound as first argument, and which bundler specifiers map onto
//! it) lives here as data so the passes stay host-agnostic.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, TransformError};

lazy_static! {
    /// Host methods that require the caller identity as their first argument.
    pub static ref DEFAULT_BINDABLE_METHODS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // Styles
        s.insert("injectCSS");
        s.insert("clearCSS");

        // Persistence
        s.insert("loadData");
        s.insert("getData");
        s.insert("saveData");
        s.insert("setData");
        s.insert("deleteData");

        // Patcher
        s.insert("before");
        s.insert("instead");
        s.insert("after");
        s
    };

    /// Host methods whose result is the only observable effect.
    pub static ref DEFAULT_PURE_METHODS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // Legacy module lookups
        s.insert("findModule");
        s.insert("findAllModules");
        s.insert("findModuleByProps");
        s.insert("findModuleByPrototypes");
        s.insert("findModuleByDisplayName");
        s.insert("getInternalInstance");
        s.insert("suppressErrors");
        s.insert("testJSON");
        s.insert("isSettingEnabled");
        s.insert("getBDData");

        // Addon managers and persistence reads
        s.insert("isEnabled");
        s.insert("get");
        s.insert("getAll");
        s.insert("getData");
        s.insert("getPatchesByCaller");

        // Webpack filters and lookups
        s.insert("combine");
        s.insert("byDisplayName");
        s.insert("byStrings");
        s.insert("byRegex");
        s.insert("byPrototypeFields");
        s.insert("byProps");
        s.insert("getModule");
        s.insert("getBulk");
        s.insert("waitForModule");
        s
    };

    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

/// The ambient host object and its method capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalNamespace {
    pub reserved_name: String,
    /// Single-argument helper the bundler emits to normalize default exports.
    pub interop_helper: String,
    /// CommonJS module loader identifier.
    pub loader: String,
    pub pure_methods: HashSet<String>,
    pub bindable_methods: HashSet<String>,
}

impl Default for ExternalNamespace {
    fn default() -> Self {
        ExternalNamespace {
            reserved_name: "BdApi".to_string(),
            interop_helper: "_interopDefaultLegacy".to_string(),
            loader: "require".to_string(),
            pure_methods: DEFAULT_PURE_METHODS.iter().map(|m| m.to_string()).collect(),
            bindable_methods: DEFAULT_BINDABLE_METHODS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl ExternalNamespace {
    pub fn is_pure(&self, method: &str) -> bool {
        self.pure_methods.contains(method)
    }

    pub fn is_bindable(&self, method: &str) -> bool {
        self.bindable_methods.contains(method)
    }
}

/// Maps a loader specifier onto a static property chain, e.g.
/// `bdapi/webpack` -> `BdApi.Webpack`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReplacement {
    pub specifier: String,
    pub chain: Vec<String>,
}

impl ModuleReplacement {
    pub fn new(specifier: &str, chain: &[&str]) -> Self {
        ModuleReplacement {
            specifier: specifier.to_string(),
            chain: chain.iter().map(|c| c.to_string()).collect(),
        }
    }
}

pub fn default_module_replacements() -> Vec<ModuleReplacement> {
    vec![
        ModuleReplacement::new("react", &["BdApi", "React"]),
        ModuleReplacement::new("react-dom", &["BdApi", "ReactDOM"]),
        ModuleReplacement::new("bdapi", &["BdApi"]),
        ModuleReplacement::new("bdapi/patcher", &["BdApi", "Patcher"]),
        ModuleReplacement::new("bdapi/webpack", &["BdApi", "Webpack"]),
        ModuleReplacement::new("bdapi/webpack/filters", &["BdApi", "Webpack", "Filters"]),
    ]
}

/// `container.property = () => accessor`, e.g. `module.exports = () => exports`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConvention {
    pub container: String,
    pub property: String,
    pub accessor: String,
}

impl Default for ExportConvention {
    fn default() -> Self {
        ExportConvention {
            container: "module".to_string(),
            property: "exports".to_string(),
            accessor: "exports".to_string(),
        }
    }
}

impl ExportConvention {
    pub fn statement_source(&self) -> String {
        format!(
            "{}.{} = () => {};",
            self.container, self.property, self.accessor
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformConfig {
    pub namespace: ExternalNamespace,
    pub module_replacements: Vec<ModuleReplacement>,
    pub exports: ExportConvention,
    /// Upper bound on analyze/apply rounds before giving up on a fixed point.
    /// `1` runs a single best-effort pass.
    pub max_passes: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            namespace: ExternalNamespace::default(),
            module_replacements: default_module_replacements(),
            exports: ExportConvention::default(),
            max_passes: 8,
        }
    }
}

impl TransformConfig {
    /// Loads a configuration, filling unspecified fields with the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TransformConfig = serde_json::from_str(json)
            .map_err(|e| TransformError::InvalidConfig(format!("Invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn replacement_for(&self, specifier: &str) -> Option<&[String]> {
        self.module_replacements
            .iter()
            .find(|r| r.specifier == specifier)
            .map(|r| r.chain.as_slice())
    }

    pub fn validate(&self) -> Result<()> {
        let ns = &self.namespace;
        for (field, name) in [
            ("namespace.reservedName", &ns.reserved_name),
            ("namespace.interopHelper", &ns.interop_helper),
            ("namespace.loader", &ns.loader),
            ("exports.container", &self.exports.container),
            ("exports.property", &self.exports.property),
            ("exports.accessor", &self.exports.accessor),
        ] {
            if !is_identifier(name) {
                return Err(TransformError::InvalidConfig(format!(
                    "{} must be a JavaScript identifier, got {:?}",
                    field, name
                )));
            }
        }

        for method in ns.pure_methods.iter().chain(ns.bindable_methods.iter()) {
            if !is_identifier(method) {
                return Err(TransformError::InvalidConfig(format!(
                    "method name {:?} is not a JavaScript identifier",
                    method
                )));
            }
        }

        let mut seen = HashSet::new();
        for replacement in &self.module_replacements {
            if !seen.insert(replacement.specifier.as_str()) {
                return Err(TransformError::InvalidConfig(format!(
                    "duplicate module replacement for {:?}",
                    replacement.specifier
                )));
            }
            if replacement.chain.is_empty() {
                return Err(TransformError::InvalidConfig(format!(
                    "module replacement for {:?} has an empty property chain",
                    replacement.specifier
                )));
            }
            if let Some(bad) = replacement.chain.iter().find(|p| !is_identifier(p)) {
                return Err(TransformError::InvalidConfig(format!(
                    "module replacement for {:?} contains invalid segment {:?}",
                    replacement.specifier, bad
                )));
            }
        }

        if self.max_passes == 0 {
            return Err(TransformError::InvalidConfig(
                "maxPasses must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn is_identifier(name: &str) -> bool {
    IDENT_RE.is_match(name)
}
