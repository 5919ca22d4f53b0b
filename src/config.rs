use crate::error::ProtoError;
use serde::{Deserialize, Serialize};

/// Per-call parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseParams {
    /// Namespace preferred when a type name exists in several namespaces.
    #[serde(default)]
    pub preferred_namespace: String,
}

impl ParseParams {
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            preferred_namespace: namespace.into(),
        }
    }
}

/// Parser-wide settings. Every field has a default, so a partial YAML or JSON
/// document is enough.
///
/// ```yaml
/// item_tag: Def
/// report_unresolved_references: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Element name of the top-level items inside the container.
    pub item_tag: String,
    /// Element name of collection entries.
    pub list_item_tag: String,
    /// Emit a warning when a reference names no known prototype.
    pub report_unresolved_references: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            item_tag: "Item".to_string(),
            list_item_tag: "li".to_string(),
            report_unresolved_references: true,
        }
    }
}

impl ParserOptions {
    pub fn from_yaml_str(text: &str) -> Result<Self, ProtoError> {
        serde_yaml::from_str(text).map_err(|e| ProtoError::Config {
            message: e.to_string(),
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(text).map_err(|e| ProtoError::Config {
            message: e.to_string(),
        })
    }
}
