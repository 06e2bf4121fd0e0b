//! Error taxonomy for a single module transform.
//!
//! Shapes the transform does not recognize are never errors; they are left
//! untouched. Only input that cannot be parsed, output that cannot be
//! re-parsed, and invalid configuration abort a module.

use thiserror::Error;

pub const ERR_PARSE: &str = "BDT-ERR-PARSE";
pub const ERR_SERIALIZE: &str = "BDT-ERR-SERIALIZE";
pub const ERR_CONFIG: &str = "BDT-ERR-CONFIG";
pub const ERR_METADATA: &str = "BDT-ERR-METADATA";

pub type Result<T> = std::result::Result<T, TransformError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The bundled module text is not valid JavaScript.
    #[error("failed to parse module '{module}': {message}")]
    Parse { module: String, message: String },

    /// The rewritten tree did not serialize to valid JavaScript.
    #[error("rewritten module '{module}' is not valid JavaScript: {message}")]
    Serialize { module: String, message: String },

    #[error("invalid transform configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid metadata key '{key}': {reason}")]
    InvalidMetadata { key: String, reason: String },
}

impl TransformError {
    /// Joins oxc diagnostics into one parse error for `module`.
    pub fn parse_error(module: &str, diagnostics: &[String]) -> Self {
        Self::Parse {
            module: module.to_string(),
            message: diagnostics.join("; "),
        }
    }

    pub fn serialize_error(module: &str, diagnostics: &[String]) -> Self {
        Self::Serialize {
            module: module.to_string(),
            message: diagnostics.join("; "),
        }
    }

    /// Stable code used by the build driver when reporting failures.
    pub fn code(&self) -> &'static str {
        match self {
            TransformError::Parse { .. } => ERR_PARSE,
            TransformError::Serialize { .. } => ERR_SERIALIZE,
            TransformError::InvalidConfig(_) => ERR_CONFIG,
            TransformError::InvalidMetadata { .. } => ERR_METADATA,
        }
    }

    /// The module this error is attached to, if it is module-specific.
    pub fn module(&self) -> Option<&str> {
        match self {
            TransformError::Parse { module, .. } | TransformError::Serialize { module, .. } => {
                Some(module)
            }
            _ => None,
        }
    }
}
