//! Document: the aggregate root of a patch.
//!
//! [`Document`] is the single unit of undo/redo history and persistence. It
//! holds the node store, the bus routing layer, the node insertion order and
//! the key seed used to name new nodes.
//!
//! Every mutation method validates all of its inputs before it touches any
//! field, so a failed call leaves the document exactly as it was. The reducer
//! in [`crate::command`] additionally works on a clone, which is what lets
//! history snapshots stay independent values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{BusIndex, NodeKey, OutletIndex};
use crate::module::{ModuleCatalog, ModuleContract};
use crate::node::{check_parameter, Node};
use crate::routing::BusRouting;

/// Number of buses in a new document.
pub const DEFAULT_BUS_COUNT: u32 = 8;

/// A complete, serializable patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    nodes: IndexMap<NodeKey, Node>,
    routing: BusRouting,
    node_order: Vec<NodeKey>,
    node_key_seed: u64,
    /// Node whose signal is shown on screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_node: Option<NodeKey>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new(DEFAULT_BUS_COUNT)
    }
}

impl Document {
    /// Creates an empty document. A zero bus count is raised to one.
    pub fn new(bus_count: u32) -> Self {
        Document {
            nodes: IndexMap::new(),
            routing: BusRouting::new(bus_count.max(1)),
            node_order: Vec::new(),
            node_key_seed: 0,
            output_node: None,
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn contains_node(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Nodes in insertion order.
    pub fn ordered_nodes(&self) -> impl Iterator<Item = (&NodeKey, &Node)> {
        self.node_order
            .iter()
            .filter_map(|key| self.nodes.get(key.as_str()).map(|node| (key, node)))
    }

    pub fn node_order(&self) -> &[NodeKey] {
        &self.node_order
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_key_seed(&self) -> u64 {
        self.node_key_seed
    }

    pub fn routing(&self) -> &BusRouting {
        &self.routing
    }

    pub fn bus_count(&self) -> u32 {
        self.routing.bus_count()
    }

    pub fn output_node(&self) -> Option<&NodeKey> {
        self.output_node.as_ref()
    }

    /// The key an insert without an explicit key would generate.
    pub fn next_node_key(&self, module_type: &str) -> NodeKey {
        NodeKey::new(format!("{}-{}", module_type, self.node_key_seed))
    }

    // -----------------------------------------------------------------------
    // Node store
    // -----------------------------------------------------------------------

    /// Instantiates a module and appends it to the node order.
    ///
    /// Without an explicit key the node is named `<module_type>-<seed>` and
    /// the seed advances.
    pub fn insert_node(
        &mut self,
        catalog: &ModuleCatalog,
        module_type: &str,
        key: Option<NodeKey>,
        parameters: &IndexMap<String, f64>,
        uniforms: IndexMap<String, serde_json::Value>,
    ) -> Result<NodeKey, CoreError> {
        let contract = catalog.lookup(module_type)?;
        let generated = key.is_none();
        let key = key.unwrap_or_else(|| self.next_node_key(module_type));
        if self.nodes.contains_key(key.as_str()) {
            return Err(CoreError::DuplicateNodeKey { key });
        }
        let node = Node::instantiate(&key, contract, parameters, uniforms)?;

        if generated {
            self.node_key_seed += 1;
        }
        self.nodes.insert(key.clone(), node);
        self.node_order.push(key.clone());
        Ok(key)
    }

    /// Removes a node together with all of its bindings.
    pub fn remove_node(&mut self, key: &str) -> Result<Node, CoreError> {
        let node = self
            .nodes
            .shift_remove(key)
            .ok_or_else(|| CoreError::UnknownNode { key: key.into() })?;
        self.node_order.retain(|k| k.as_str() != key);
        self.routing.purge_node(key);
        if self.output_node.as_ref().is_some_and(|k| k.as_str() == key) {
            self.output_node = None;
        }
        Ok(node)
    }

    /// Replaces one parameter value. No clamping is applied.
    pub fn set_parameter(
        &mut self,
        catalog: &ModuleCatalog,
        key: &str,
        parameter: &str,
        value: f64,
    ) -> Result<(), CoreError> {
        let node_key = NodeKey::from(key);
        let contract = self.contract_of(catalog, key)?;
        check_parameter(&node_key, contract, parameter, value)?;
        if let Some(node) = self.nodes.get_mut(key) {
            node.parameters.insert(parameter.to_string(), value);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bus routing
    // -----------------------------------------------------------------------

    /// Binds an inlet to a bus, or unbinds it with `None`.
    pub fn set_inlet_binding(
        &mut self,
        catalog: &ModuleCatalog,
        node: &str,
        inlet: &str,
        bus: Option<BusIndex>,
    ) -> Result<(), CoreError> {
        let contract = self.contract_of(catalog, node)?;
        if !contract.has_inlet(inlet) {
            return Err(CoreError::UnknownInlet {
                node: node.into(),
                inlet: inlet.to_string(),
            });
        }
        self.routing.set_inlet(&NodeKey::from(node), inlet, bus)
    }

    /// Binds an outlet to a bus, or unbinds it with `None`.
    pub fn set_outlet_binding(
        &mut self,
        catalog: &ModuleCatalog,
        node: &str,
        outlet: OutletIndex,
        bus: Option<BusIndex>,
    ) -> Result<(), CoreError> {
        let contract = self.contract_of(catalog, node)?;
        if !contract.has_outlet(outlet) {
            return Err(CoreError::UnknownOutlet {
                node: node.into(),
                outlet,
            });
        }
        self.routing.set_outlet(&NodeKey::from(node), outlet, bus)
    }

    /// Changes the bus count; refuses to orphan live bindings.
    pub fn set_bus_count(&mut self, count: u32) -> Result<(), CoreError> {
        self.routing.set_bus_count(count)
    }

    /// Appends one bus.
    pub fn add_bus(&mut self) -> Result<BusIndex, CoreError> {
        let index = self.routing.bus_count();
        let count = index
            .checked_add(1)
            .ok_or(CoreError::BusIndexOutOfRange {
                index: i64::from(index) + 1,
                bus_count: index,
            })?;
        self.routing.set_bus_count(count)?;
        Ok(BusIndex(index))
    }

    /// Selects the node shown on screen.
    pub fn set_output_node(&mut self, node: Option<NodeKey>) -> Result<(), CoreError> {
        if let Some(key) = &node {
            if !self.nodes.contains_key(key.as_str()) {
                return Err(CoreError::UnknownNode { key: key.clone() });
            }
        }
        self.output_node = node;
        Ok(())
    }

    fn contract_of<'c>(
        &self,
        catalog: &'c ModuleCatalog,
        key: &str,
    ) -> Result<&'c ModuleContract, CoreError> {
        let node = self
            .nodes
            .get(key)
            .ok_or_else(|| CoreError::UnknownNode { key: key.into() })?;
        catalog.lookup(&node.module_type)
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Checks every structural invariant against `catalog`.
    ///
    /// Mutations preserve these by construction; this exists for documents
    /// that arrive from outside (loaded files, migrated data).
    pub fn validate(&self, catalog: &ModuleCatalog) -> Result<(), CoreError> {
        let inconsistent = |reason: String| CoreError::InconsistentDocument { reason };

        if self.node_order.len() != self.nodes.len()
            || self
                .node_order
                .iter()
                .zip(self.nodes.keys())
                .any(|(a, b)| a != b)
        {
            return Err(inconsistent(
                "node order does not match the node store".to_string(),
            ));
        }

        for (key, node) in &self.nodes {
            let contract = catalog.lookup(&node.module_type)?;
            for parameter in &contract.parameter_keys {
                if !node.parameters.contains_key(parameter) {
                    return Err(inconsistent(format!(
                        "node '{}' is missing parameter '{}'",
                        key, parameter
                    )));
                }
            }
            for (parameter, value) in &node.parameters {
                check_parameter(key, contract, parameter, *value)?;
            }
        }

        if self.routing.bus_count() == 0 {
            return Err(inconsistent("bus count is zero".to_string()));
        }
        for bus in self.routing.bound_buses() {
            bus.check(self.routing.bus_count())?;
        }
        if let Some(key) = self.routing.empty_entry() {
            return Err(inconsistent(format!(
                "node '{}' has an empty binding entry",
                key
            )));
        }
        if let Some(key) = self.routing.bound_nodes().find(|k| !self.contains_node(k.as_str())) {
            return Err(CoreError::UnknownNode { key: key.clone() });
        }
        for (node, inlet, _) in self.routing.inlets() {
            if !self.contract_of(catalog, node.as_str())?.has_inlet(inlet) {
                return Err(CoreError::UnknownInlet {
                    node: node.clone(),
                    inlet: inlet.to_string(),
                });
            }
        }
        for (node, outlet, _) in self.routing.outlets() {
            if !self.contract_of(catalog, node.as_str())?.has_outlet(outlet) {
                return Err(CoreError::UnknownOutlet {
                    node: node.clone(),
                    outlet,
                });
            }
        }

        if let Some(key) = &self.output_node {
            if !self.contains_node(key.as_str()) {
                return Err(CoreError::UnknownNode { key: key.clone() });
            }
        }
        Ok(())
    }
}
