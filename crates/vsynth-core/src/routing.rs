//! The bus routing layer.
//!
//! Producers and consumers never reference each other. An outlet is bound to
//! a bus number and an inlet is bound to a bus number; whatever shares a bus
//! is connected. Storage is sparse: one entry per bound port, so the cost is
//! O(nodes + buses) however many producer/consumer pairs the buses imply.
//!
//! Both binding maps are plain mappings. Binding a port that is already bound
//! replaces the old bus, which is what keeps every inlet fed by at most one
//! bus and every outlet writing to at most one bus.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{BusIndex, NodeKey, OutletIndex};

/// Sparse bus bindings plus the number of buses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusRouting {
    bus_count: u32,
    /// node -> inlet -> bus
    #[serde(default)]
    inlet_bindings: IndexMap<NodeKey, IndexMap<String, BusIndex>>,
    /// node -> outlet -> bus
    #[serde(default)]
    outlet_bindings: IndexMap<NodeKey, IndexMap<OutletIndex, BusIndex>>,
}

impl BusRouting {
    /// Creates an unrouted layer with `bus_count` buses.
    pub fn new(bus_count: u32) -> Self {
        BusRouting {
            bus_count,
            inlet_bindings: IndexMap::new(),
            outlet_bindings: IndexMap::new(),
        }
    }

    pub fn bus_count(&self) -> u32 {
        self.bus_count
    }

    /// Bus an inlet reads from.
    pub fn inlet_bus(&self, node: &str, inlet: &str) -> Option<BusIndex> {
        self.inlet_bindings.get(node)?.get(inlet).copied()
    }

    /// Bus an outlet writes to.
    pub fn outlet_bus(&self, node: &str, outlet: OutletIndex) -> Option<BusIndex> {
        self.outlet_bindings.get(node)?.get(&outlet).copied()
    }

    /// All inlet bindings as `(node, inlet, bus)`, in binding order.
    pub fn inlets(&self) -> impl Iterator<Item = (&NodeKey, &str, BusIndex)> {
        self.inlet_bindings.iter().flat_map(|(node, inlets)| {
            inlets
                .iter()
                .map(move |(inlet, bus)| (node, inlet.as_str(), *bus))
        })
    }

    /// All outlet bindings as `(node, outlet, bus)`, in binding order.
    pub fn outlets(&self) -> impl Iterator<Item = (&NodeKey, OutletIndex, BusIndex)> {
        self.outlet_bindings.iter().flat_map(|(node, outlets)| {
            outlets
                .iter()
                .map(move |(outlet, bus)| (node, *outlet, *bus))
        })
    }

    /// Whether any binding names `node`.
    pub fn references(&self, node: &str) -> bool {
        self.inlet_bindings.contains_key(node) || self.outlet_bindings.contains_key(node)
    }

    /// Every bound bus, inlets first.
    pub fn bound_buses(&self) -> impl Iterator<Item = BusIndex> + '_ {
        self.inlets()
            .map(|(_, _, bus)| bus)
            .chain(self.outlets().map(|(_, _, bus)| bus))
    }

    /// Smallest bus count that keeps every live binding addressable.
    ///
    /// Saturates at `u32::MAX`; a binding on the last representable bus can
    /// only come from unvalidated data.
    pub fn required_bus_count(&self) -> u32 {
        self.bound_buses()
            .map(|bus| bus.0.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Binds (or with `None` unbinds) an inlet. Only the bus range is checked
    /// here; the document checks the node and inlet against the catalog.
    pub fn set_inlet(
        &mut self,
        node: &NodeKey,
        inlet: &str,
        bus: Option<BusIndex>,
    ) -> Result<(), CoreError> {
        match bus {
            Some(bus) => {
                let bus = bus.check(self.bus_count)?;
                self.inlet_bindings
                    .entry(node.clone())
                    .or_default()
                    .insert(inlet.to_string(), bus);
            }
            None => {
                if let Some(inlets) = self.inlet_bindings.get_mut(node.as_str()) {
                    inlets.shift_remove(inlet);
                    if inlets.is_empty() {
                        self.inlet_bindings.shift_remove(node.as_str());
                    }
                }
            }
        }
        Ok(())
    }

    /// Binds (or with `None` unbinds) an outlet.
    pub fn set_outlet(
        &mut self,
        node: &NodeKey,
        outlet: OutletIndex,
        bus: Option<BusIndex>,
    ) -> Result<(), CoreError> {
        match bus {
            Some(bus) => {
                let bus = bus.check(self.bus_count)?;
                self.outlet_bindings
                    .entry(node.clone())
                    .or_default()
                    .insert(outlet, bus);
            }
            None => {
                if let Some(outlets) = self.outlet_bindings.get_mut(node.as_str()) {
                    outlets.shift_remove(&outlet);
                    if outlets.is_empty() {
                        self.outlet_bindings.shift_remove(node.as_str());
                    }
                }
            }
        }
        Ok(())
    }

    /// Drops every binding of `node`. Buses are not owned by nodes, so other
    /// nodes bound to the same buses keep their bindings.
    pub fn purge_node(&mut self, node: &str) {
        self.inlet_bindings.shift_remove(node);
        self.outlet_bindings.shift_remove(node);
    }

    /// Changes the number of buses. Fails if a live binding would fall
    /// outside the new range or if `count` is zero.
    pub fn set_bus_count(&mut self, count: u32) -> Result<(), CoreError> {
        let required = self.required_bus_count().max(1);
        if count < required {
            return Err(CoreError::BusCountTooLow {
                requested: count,
                required,
            });
        }
        self.bus_count = count;
        Ok(())
    }

    /// Node keys named by any binding, for consistency checks.
    pub(crate) fn bound_nodes(&self) -> impl Iterator<Item = &NodeKey> {
        self.inlet_bindings.keys().chain(self.outlet_bindings.keys())
    }

    /// A node entry that holds no bindings. Mutations never leave one behind.
    pub(crate) fn empty_entry(&self) -> Option<&NodeKey> {
        self.inlet_bindings
            .iter()
            .find(|(_, inlets)| inlets.is_empty())
            .map(|(node, _)| node)
            .or_else(|| {
                self.outlet_bindings
                    .iter()
                    .find(|(_, outlets)| outlets.is_empty())
                    .map(|(node, _)| node)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> NodeKey {
        NodeKey::from(k)
    }

    #[test]
    fn inlet_binding_is_last_write_wins() {
        let mut routing = BusRouting::new(4);
        routing.set_inlet(&key("osc"), "rotation", Some(BusIndex(1))).unwrap();
        routing.set_inlet(&key("osc"), "rotation", Some(BusIndex(3))).unwrap();
        assert_eq!(routing.inlet_bus("osc", "rotation"), Some(BusIndex(3)));
        assert_eq!(routing.inlets().count(), 1);
    }

    #[test]
    fn unbinding_leaves_no_empty_entries() {
        let mut routing = BusRouting::new(4);
        routing.set_inlet(&key("osc"), "rotation", Some(BusIndex(1))).unwrap();
        routing.set_outlet(&key("osc"), 0, Some(BusIndex(2))).unwrap();
        routing.set_inlet(&key("osc"), "rotation", None).unwrap();
        routing.set_outlet(&key("osc"), 0, None).unwrap();
        assert_eq!(routing, BusRouting::new(4));
        assert!(!routing.references("osc"));
    }

    #[test]
    fn unbinding_an_unbound_port_is_a_no_op() {
        let mut routing = BusRouting::new(2);
        routing.set_inlet(&key("osc"), "rotation", None).unwrap();
        routing.set_outlet(&key("osc"), 0, None).unwrap();
        assert_eq!(routing, BusRouting::new(2));
    }

    #[test]
    fn out_of_range_bus_rejected() {
        let mut routing = BusRouting::new(2);
        let err = routing
            .set_outlet(&key("constant"), 0, Some(BusIndex(2)))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::BusIndexOutOfRange {
                index: 2,
                bus_count: 2
            }
        );
        assert_eq!(routing.outlets().count(), 0);
    }

    #[test]
    fn purge_only_touches_the_named_node() {
        let mut routing = BusRouting::new(4);
        routing.set_outlet(&key("constant"), 0, Some(BusIndex(0))).unwrap();
        routing.set_inlet(&key("osc"), "phase offset", Some(BusIndex(0))).unwrap();
        routing.purge_node("constant");
        assert_eq!(routing.outlet_bus("constant", 0), None);
        assert_eq!(routing.inlet_bus("osc", "phase offset"), Some(BusIndex(0)));
    }

    #[test]
    fn shrink_guard() {
        let mut routing = BusRouting::new(8);
        routing.set_inlet(&key("osc"), "rotation", Some(BusIndex(5))).unwrap();
        assert_eq!(routing.required_bus_count(), 6);

        assert_eq!(
            routing.set_bus_count(5),
            Err(CoreError::BusCountTooLow {
                requested: 5,
                required: 6
            })
        );
        routing.set_bus_count(6).unwrap();
        assert_eq!(routing.bus_count(), 6);
    }

    #[test]
    fn required_bus_count_saturates_on_the_last_bus() {
        let routing: BusRouting = serde_json::from_value(serde_json::json!({
            "busCount": 2,
            "inletBindings": { "i": { "input": u32::MAX } }
        }))
        .unwrap();
        assert_eq!(routing.required_bus_count(), u32::MAX);
        assert_eq!(routing.bound_buses().collect::<Vec<_>>(), vec![BusIndex(u32::MAX)]);
    }

    #[test]
    fn empty_entry_found_only_in_raw_data() {
        let mut routing = BusRouting::new(2);
        routing.set_inlet(&key("osc"), "rotation", Some(BusIndex(0))).unwrap();
        routing.set_inlet(&key("osc"), "rotation", None).unwrap();
        assert_eq!(routing.empty_entry(), None);

        let raw: BusRouting = serde_json::from_value(serde_json::json!({
            "busCount": 2,
            "outletBindings": { "osc": {} }
        }))
        .unwrap();
        assert_eq!(raw.empty_entry(), Some(&key("osc")));
    }

    #[test]
    fn zero_buses_rejected() {
        let mut routing = BusRouting::new(2);
        assert!(matches!(
            routing.set_bus_count(0),
            Err(CoreError::BusCountTooLow { required: 1, .. })
        ));
    }

    #[test]
    fn serde_shape() {
        let mut routing = BusRouting::new(2);
        routing.set_outlet(&key("constant"), 0, Some(BusIndex(0))).unwrap();
        routing.set_inlet(&key("osc"), "phase offset", Some(BusIndex(0))).unwrap();
        let json = serde_json::to_value(&routing).unwrap();
        assert_eq!(json["busCount"], 2);
        assert_eq!(json["inletBindings"]["osc"]["phase offset"], 0);
        assert_eq!(json["outletBindings"]["constant"]["0"], 0);

        let back: BusRouting = serde_json::from_value(json).unwrap();
        assert_eq!(back, routing);
    }
}
