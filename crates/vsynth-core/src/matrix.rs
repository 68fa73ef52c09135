//! Routing matrix queries.
//!
//! The routing matrix is the editor's view of a document: one row ("lane")
//! per outlet and per inlet of every node, one column per bus, and a mark in
//! each cell where a port is bound. These queries compute that view and turn
//! a click on a cell back into an [`EditCommand`].

use serde::Serialize;

use crate::command::EditCommand;
use crate::document::Document;
use crate::error::CoreError;
use crate::id::{BusIndex, NodeKey, OutletIndex};
use crate::module::ModuleCatalog;

/// Which port a lane stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LanePort {
    Outlet { outlet: OutletIndex },
    Inlet { inlet: String },
}

/// One row of the routing matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lane {
    pub node: NodeKey,
    #[serde(flatten)]
    pub port: LanePort,
}

impl Lane {
    /// Row label: the node key for outlets, the inlet key for inlets.
    /// Extra outlets of a composite get their index appended.
    pub fn name(&self) -> String {
        match &self.port {
            LanePort::Outlet { outlet: 0 } => self.node.to_string(),
            LanePort::Outlet { outlet } => format!("{}[{}]", self.node, outlet),
            LanePort::Inlet { inlet } => inlet.clone(),
        }
    }

    /// Bus this lane is bound to, if any.
    pub fn bus(&self, document: &Document) -> Option<BusIndex> {
        let routing = document.routing();
        match &self.port {
            LanePort::Outlet { outlet } => routing.outlet_bus(self.node.as_str(), *outlet),
            LanePort::Inlet { inlet } => routing.inlet_bus(self.node.as_str(), inlet),
        }
    }

    /// Command that binds this lane to `bus`, or unbinds it with `None`.
    pub fn bind_command(&self, bus: Option<BusIndex>) -> EditCommand {
        match &self.port {
            LanePort::Outlet { outlet } => EditCommand::SetOutletBinding {
                node: self.node.clone(),
                outlet: *outlet,
                bus,
            },
            LanePort::Inlet { inlet } => EditCommand::SetInletBinding {
                node: self.node.clone(),
                inlet: inlet.clone(),
                bus,
            },
        }
    }
}

/// Matrix rows: per node in node order, its outlets then its inlets.
pub fn lanes(document: &Document, catalog: &ModuleCatalog) -> Result<Vec<Lane>, CoreError> {
    let mut lanes = Vec::new();
    for (key, node) in document.ordered_nodes() {
        let contract = catalog.lookup(&node.module_type)?;
        for outlet in 0..contract.outlet_arity() {
            lanes.push(Lane {
                node: key.clone(),
                port: LanePort::Outlet { outlet },
            });
        }
        for inlet in &contract.inlet_keys {
            lanes.push(Lane {
                node: key.clone(),
                port: LanePort::Inlet {
                    inlet: inlet.clone(),
                },
            });
        }
    }
    Ok(lanes)
}

/// Marked cells as `(lane index, bus)`, in lane order.
pub fn connections(document: &Document, lanes: &[Lane]) -> Vec<(usize, BusIndex)> {
    lanes
        .iter()
        .enumerate()
        .filter_map(|(index, lane)| lane.bus(document).map(|bus| (index, bus)))
        .collect()
}

/// Command for a click on cell `(lane, bus)`: binds an unbound or
/// differently bound lane, unbinds a lane already on `bus`.
pub fn toggle_cell(
    document: &Document,
    lanes: &[Lane],
    lane: usize,
    bus: BusIndex,
) -> Result<EditCommand, CoreError> {
    let bus = bus.check(document.bus_count())?;
    let lane = lanes.get(lane).ok_or(CoreError::UnknownLane {
        index: lane,
        lane_count: lanes.len(),
    })?;
    let target = match lane.bus(document) {
        Some(current) if current == bus => None,
        _ => Some(bus),
    };
    Ok(lane.bind_command(target))
}

/// Parameter sliders to show for `inlet` of `node`.
pub fn associated_parameters(
    document: &Document,
    catalog: &ModuleCatalog,
    node: &str,
    inlet: &str,
) -> Result<Vec<String>, CoreError> {
    let module_type = &document
        .node(node)
        .ok_or_else(|| CoreError::UnknownNode { key: node.into() })?
        .module_type;
    let contract = catalog.lookup(module_type)?;
    if !contract.has_inlet(inlet) {
        return Err(CoreError::UnknownInlet {
            node: node.into(),
            inlet: inlet.to_string(),
        });
    }
    Ok(contract
        .associated_parameters(inlet)
        .map(str::to_string)
        .collect())
}

/// Current `(parameter, value)` pairs of `node` in contract order.
pub fn parameters_for_node(
    document: &Document,
    catalog: &ModuleCatalog,
    node: &str,
) -> Result<Vec<(String, f64)>, CoreError> {
    let instance = document
        .node(node)
        .ok_or_else(|| CoreError::UnknownNode { key: node.into() })?;
    let contract = catalog.lookup(&instance.module_type)?;
    Ok(contract
        .parameter_keys
        .iter()
        .filter_map(|key| instance.parameter(key).map(|value| (key.clone(), value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::apply;
    use crate::derive::CyclePolicy;
    use crate::module::ModuleContract;
    use indexmap::IndexMap;

    fn doc(catalog: &ModuleCatalog, nodes: &[(&str, &str)]) -> Document {
        let mut doc = Document::new(3);
        for (key, module_type) in nodes {
            doc.insert_node(
                catalog,
                module_type,
                Some((*key).into()),
                &IndexMap::new(),
                IndexMap::new(),
            )
            .unwrap();
        }
        doc
    }

    #[test]
    fn lanes_list_outlets_before_inlets() {
        let catalog = ModuleCatalog::builtin();
        let doc = doc(&catalog, &[("c", "constant"), ("m", "mixer")]);
        let names: Vec<String> = lanes(&doc, &catalog)
            .unwrap()
            .iter()
            .map(Lane::name)
            .collect();
        assert_eq!(names, vec!["c", "m", "a", "b", "mix"]);
    }

    #[test]
    fn composite_outlets_get_one_lane_each() {
        let mut catalog = ModuleCatalog::builtin();
        catalog
            .register(ModuleContract::composite("split", 2, &["identity"]).inlet("input"))
            .unwrap();
        let doc = doc(&catalog, &[("s", "split")]);
        let names: Vec<String> = lanes(&doc, &catalog)
            .unwrap()
            .iter()
            .map(Lane::name)
            .collect();
        assert_eq!(names, vec!["s", "s[1]", "input"]);
    }

    #[test]
    fn connections_mark_bound_cells() {
        let catalog = ModuleCatalog::builtin();
        let mut doc = doc(&catalog, &[("c", "constant"), ("m", "mixer")]);
        doc.set_outlet_binding(&catalog, "c", 0, Some(BusIndex(2))).unwrap();
        doc.set_inlet_binding(&catalog, "m", "b", Some(BusIndex(2))).unwrap();

        let lanes = lanes(&doc, &catalog).unwrap();
        assert_eq!(
            connections(&doc, &lanes),
            vec![(0, BusIndex(2)), (3, BusIndex(2))]
        );
    }

    #[test]
    fn toggle_binds_then_unbinds() {
        let catalog = ModuleCatalog::builtin();
        let doc = doc(&catalog, &[("c", "constant")]);
        let lanes = lanes(&doc, &catalog).unwrap();

        let bind = toggle_cell(&doc, &lanes, 0, BusIndex(1)).unwrap();
        let bound = apply(&doc, &catalog, CyclePolicy::Allow, &bind).unwrap();
        assert_eq!(bound.routing().outlet_bus("c", 0), Some(BusIndex(1)));

        let unbind = toggle_cell(&bound, &lanes, 0, BusIndex(1)).unwrap();
        let unbound = apply(&bound, &catalog, CyclePolicy::Allow, &unbind).unwrap();
        assert_eq!(unbound.routing().outlet_bus("c", 0), None);

        assert!(matches!(
            toggle_cell(&doc, &lanes, 0, BusIndex(3)),
            Err(CoreError::BusIndexOutOfRange { .. })
        ));
        assert_eq!(
            toggle_cell(&doc, &lanes, 9, BusIndex(0)),
            Err(CoreError::UnknownLane {
                index: 9,
                lane_count: lanes.len(),
            })
        );
    }

    #[test]
    fn sliders_for_inlets() {
        let catalog = ModuleCatalog::builtin();
        let doc = doc(&catalog, &[("osc", "oscillator"), ("m", "mixer")]);
        assert_eq!(
            associated_parameters(&doc, &catalog, "osc", "phase offset").unwrap(),
            vec!["phase offset"]
        );
        assert!(associated_parameters(&doc, &catalog, "m", "a")
            .unwrap()
            .is_empty());
        assert!(matches!(
            associated_parameters(&doc, &catalog, "m", "gain"),
            Err(CoreError::UnknownInlet { .. })
        ));
    }

    #[test]
    fn parameters_in_contract_order() {
        let catalog = ModuleCatalog::builtin();
        let doc = doc(&catalog, &[("osc", "oscillator")]);
        let params = parameters_for_node(&doc, &catalog, "osc").unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["frequency", "rotation", "phase offset", "wave size"]);
        assert_eq!(params[0].1, 0.05);
        assert!(parameters_for_node(&doc, &catalog, "ghost").is_err());
    }
}
