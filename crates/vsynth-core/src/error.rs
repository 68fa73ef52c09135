//! Core error types for vsynth-core.
//!
//! Uses `thiserror` for structured, matchable error variants. [`CoreError`]
//! covers every expected domain failure of a patch edit; callers branch on it
//! and the document they passed in is never modified. [`ContractError`] is
//! raised while registering module contracts, before any document exists.

use thiserror::Error;

use crate::id::{NodeKey, OutletIndex};

/// Errors produced by document mutations and queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// The module type is not registered in the catalog.
    #[error("unknown module type: '{module_type}'")]
    UnknownModuleType { module_type: String },

    /// No node with this key exists in the document.
    #[error("unknown node: '{key}'")]
    UnknownNode { key: NodeKey },

    /// The node's module does not declare this inlet.
    #[error("node '{node}' has no inlet '{inlet}'")]
    UnknownInlet { node: NodeKey, inlet: String },

    /// The node's module declares fewer outlets.
    #[error("node '{node}' has no outlet {outlet}")]
    UnknownOutlet { node: NodeKey, outlet: OutletIndex },

    /// The node's module does not declare this parameter.
    #[error("node '{node}' has no parameter '{parameter}'")]
    UnknownParameter { node: NodeKey, parameter: String },

    /// A node with this key already exists.
    #[error("duplicate node key: '{key}'")]
    DuplicateNodeKey { key: NodeKey },

    /// A bus index outside `[0, bus_count)` that is not the unbound sentinel.
    #[error("bus index {index} out of range (bus count {bus_count})")]
    BusIndexOutOfRange { index: i64, bus_count: u32 },

    /// Shrinking the bus count would orphan a live binding.
    #[error("bus count {requested} too low: live bindings need at least {required}")]
    BusCountTooLow { requested: u32, required: u32 },

    /// Parameter values must be finite numbers.
    #[error("invalid value {value} for parameter '{parameter}'")]
    InvalidParameterValue { parameter: String, value: f64 },

    /// The routing closes a loop and the cycle policy rejects it.
    #[error("routing cycle through nodes {nodes:?}")]
    CycleDetected { nodes: Vec<NodeKey> },

    /// A routing-matrix lane index past the end of the lane list.
    #[error("lane {index} does not exist ({lane_count} lanes)")]
    UnknownLane { index: usize, lane_count: usize },

    /// A loaded document violates a structural invariant.
    #[error("inconsistent document: {reason}")]
    InconsistentDocument { reason: String },
}

/// Errors produced while registering a module contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    /// A contract for this module type is already registered.
    #[error("module type '{module_type}' registered twice")]
    DuplicateModuleType { module_type: String },

    /// A parameter or inlet key is declared twice.
    #[error("module '{module_type}' declares '{key}' twice")]
    DuplicateKey { module_type: String, key: String },

    /// A declared parameter has no default value.
    #[error("module '{module_type}' has no default for parameter '{parameter}'")]
    MissingDefault { module_type: String, parameter: String },

    /// A default value is not a finite number.
    #[error("module '{module_type}' default for '{parameter}' is not finite")]
    InvalidDefault { module_type: String, parameter: String },

    /// A reference names a parameter or inlet the contract does not declare.
    #[error("module '{module_type}' references undeclared key '{key}'")]
    UndeclaredKey { module_type: String, key: String },

    /// Outlet arity must be at least one.
    #[error("module '{module_type}' declares no outlets")]
    NoOutlets { module_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_keys() {
        let err = CoreError::UnknownInlet {
            node: NodeKey::from("oscillator"),
            inlet: "phase offset".into(),
        };
        assert_eq!(err.to_string(), "node 'oscillator' has no inlet 'phase offset'");

        let err = CoreError::BusCountTooLow {
            requested: 2,
            required: 4,
        };
        assert_eq!(
            err.to_string(),
            "bus count 2 too low: live bindings need at least 4"
        );
    }

    #[test]
    fn contract_error_message() {
        let err = ContractError::MissingDefault {
            module_type: "mixer".into(),
            parameter: "mix".into(),
        };
        assert_eq!(err.to_string(), "module 'mixer' has no default for parameter 'mix'");
    }
}
