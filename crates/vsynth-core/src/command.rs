//! Edit commands and the document reducer.
//!
//! Every change to a document goes through [`apply`]. The reducer clones the
//! current snapshot, applies the command to the clone and hands the result
//! back, so the caller's snapshot is untouched whether the command succeeds
//! or fails. [`EditCommand::Batch`] applies several commands with
//! all-or-nothing semantics.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::derive::CyclePolicy;
use crate::document::Document;
use crate::error::CoreError;
use crate::id::{BusIndex, NodeKey, OutletIndex, UNBOUND};
use crate::module::ModuleCatalog;

/// A single document edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditCommand {
    /// Instantiate a module.
    InsertNode {
        /// Module type to instantiate.
        module_type: String,
        /// Explicit key. Generated from the key seed when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<NodeKey>,
        /// Parameter overrides applied on top of the contract defaults.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        parameters: IndexMap<String, f64>,
        /// Renderer initialization payload.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        uniforms: IndexMap<String, serde_json::Value>,
    },
    /// Remove a node and every binding that names it.
    RemoveNode { key: NodeKey },
    /// Replace one parameter value.
    SetParameter {
        key: NodeKey,
        parameter: String,
        value: f64,
    },
    /// Bind an inlet to a bus; `null` or `-1` unbinds.
    SetInletBinding {
        node: NodeKey,
        inlet: String,
        #[serde(default, deserialize_with = "bus_or_unbound")]
        bus: Option<BusIndex>,
    },
    /// Bind an outlet to a bus; `null` or `-1` unbinds.
    SetOutletBinding {
        node: NodeKey,
        #[serde(default)]
        outlet: OutletIndex,
        #[serde(default, deserialize_with = "bus_or_unbound")]
        bus: Option<BusIndex>,
    },
    /// Resize the bus space.
    SetBusCount { count: u32 },
    /// Append one bus.
    AddBus,
    /// Choose the node shown on screen; `null` clears it.
    SetOutputNode {
        #[serde(default)]
        node: Option<NodeKey>,
    },
    /// Apply several commands atomically, in order.
    Batch { commands: Vec<EditCommand> },
}

impl EditCommand {
    /// Short label for logs and history listings.
    pub fn describe(&self) -> String {
        match self {
            EditCommand::InsertNode {
                module_type, key, ..
            } => match key {
                Some(key) => format!("insert {} as '{}'", module_type, key),
                None => format!("insert {}", module_type),
            },
            EditCommand::RemoveNode { key } => format!("remove '{}'", key),
            EditCommand::SetParameter {
                key,
                parameter,
                value,
            } => format!("set '{}'.{} = {}", key, parameter, value),
            EditCommand::SetInletBinding { node, inlet, bus } => {
                format!("bind '{}' inlet '{}' to {}", node, inlet, bus_label(*bus))
            }
            EditCommand::SetOutletBinding { node, outlet, bus } => {
                format!("bind '{}' outlet {} to {}", node, outlet, bus_label(*bus))
            }
            EditCommand::SetBusCount { count } => format!("set bus count to {}", count),
            EditCommand::AddBus => "add bus".to_string(),
            EditCommand::SetOutputNode { node } => match node {
                Some(node) => format!("output '{}'", node),
                None => "clear output".to_string(),
            },
            EditCommand::Batch { commands } => format!("batch of {}", commands.len()),
        }
    }
}

/// Reads a bus field written either as `null`/index or with the matrix's
/// raw [`UNBOUND`] sentinel. Range checks happen when the command applies.
fn bus_or_unbound<'de, D>(deserializer: D) -> Result<Option<BusIndex>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(UNBOUND) => Ok(None),
        Some(raw) => u32::try_from(raw)
            .map(|bus| Some(BusIndex(bus)))
            .map_err(|_| D::Error::custom(format!("invalid bus index {}", raw))),
    }
}

fn bus_label(bus: Option<BusIndex>) -> String {
    match bus {
        Some(bus) => format!("bus {}", bus),
        None => "nothing".to_string(),
    }
}

/// Applies `command` to a copy of `document`.
///
/// Returns the new snapshot. On error `document` is unchanged and no partial
/// result escapes. Under [`CyclePolicy::Reject`] a result containing a
/// feedback loop is an error.
pub fn apply(
    document: &Document,
    catalog: &ModuleCatalog,
    policy: CyclePolicy,
    command: &EditCommand,
) -> Result<Document, CoreError> {
    let mut next = document.clone();
    let result = apply_in_place(&mut next, catalog, command)
        .and_then(|()| policy.enforce(&next));

    match result {
        Ok(()) => {
            debug!(command = %command.describe(), "applied command");
            Ok(next)
        }
        Err(err) => {
            warn!(command = %command.describe(), error = %err, "rejected command");
            Err(err)
        }
    }
}

fn apply_in_place(
    document: &mut Document,
    catalog: &ModuleCatalog,
    command: &EditCommand,
) -> Result<(), CoreError> {
    match command {
        EditCommand::InsertNode {
            module_type,
            key,
            parameters,
            uniforms,
        } => document
            .insert_node(catalog, module_type, key.clone(), parameters, uniforms.clone())
            .map(|_| ()),
        EditCommand::RemoveNode { key } => document.remove_node(key.as_str()).map(|_| ()),
        EditCommand::SetParameter {
            key,
            parameter,
            value,
        } => document.set_parameter(catalog, key.as_str(), parameter, *value),
        EditCommand::SetInletBinding { node, inlet, bus } => {
            document.set_inlet_binding(catalog, node.as_str(), inlet, *bus)
        }
        EditCommand::SetOutletBinding { node, outlet, bus } => {
            document.set_outlet_binding(catalog, node.as_str(), *outlet, *bus)
        }
        EditCommand::SetBusCount { count } => document.set_bus_count(*count),
        EditCommand::AddBus => document.add_bus().map(|_| ()),
        EditCommand::SetOutputNode { node } => document.set_output_node(node.clone()),
        EditCommand::Batch { commands } => commands
            .iter()
            .try_for_each(|command| apply_in_place(document, catalog, command)),
    }
}
