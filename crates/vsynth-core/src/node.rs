//! Node instances.
//!
//! A [`Node`] is a live instantiation of a module inside a document: the
//! module type it was created from, its current parameter values, and the
//! module-specific uniform payload the renderer uses to initialize it. The
//! node's key is the key it is stored under in the document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::NodeKey;
use crate::module::ModuleContract;

/// A module instantiated in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub module_type: String,
    /// Current parameter values, in contract order.
    pub parameters: IndexMap<String, f64>,
    /// Opaque initialization data handed to the renderer untouched.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub uniforms: IndexMap<String, serde_json::Value>,
}

impl Node {
    /// Instantiates `contract`, starting from its defaults and applying
    /// `overrides`.
    ///
    /// Override keys must be declared by the contract and values must be
    /// finite. `key` is only used for error reporting.
    pub fn instantiate(
        key: &NodeKey,
        contract: &ModuleContract,
        overrides: &IndexMap<String, f64>,
        uniforms: IndexMap<String, serde_json::Value>,
    ) -> Result<Node, CoreError> {
        let mut parameters = contract.default_parameters();
        for (parameter, value) in overrides {
            check_parameter(key, contract, parameter, *value)?;
            parameters.insert(parameter.clone(), *value);
        }
        Ok(Node {
            module_type: contract.module_type.clone(),
            parameters,
            uniforms,
        })
    }

    /// Current value of a parameter.
    pub fn parameter(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).copied()
    }
}

/// Validates a parameter write against the node's contract.
pub(crate) fn check_parameter(
    node: &NodeKey,
    contract: &ModuleContract,
    parameter: &str,
    value: f64,
) -> Result<(), CoreError> {
    if !contract.has_parameter(parameter) {
        return Err(CoreError::UnknownParameter {
            node: node.clone(),
            parameter: parameter.to_string(),
        });
    }
    if !value.is_finite() {
        return Err(CoreError::InvalidParameterValue {
            parameter: parameter.to_string(),
            value,
        });
    }
    Ok(())
}
