//! Graph derivation.
//!
//! Connections are never stored. [`derive_edges`] reconstructs them from the
//! bus bindings: every outlet on a bus feeds every inlet on the same bus.
//! [`DerivedGraph`] loads those edges into a petgraph digraph so renderers
//! can ask for an evaluation order, find feedback loops, and prune nodes
//! that do not contribute to the output.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::CoreError;
use crate::id::{BusIndex, NodeKey, OutletIndex};

/// A producer -> consumer connection implied by a shared bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivedEdge {
    pub producer: NodeKey,
    pub outlet: OutletIndex,
    pub consumer: NodeKey,
    pub inlet: String,
    pub bus: BusIndex,
}

impl fmt::Display for DerivedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.producer)?;
        if self.outlet != 0 {
            write!(f, "[{}]", self.outlet)?;
        }
        write!(f, " -> {}.{} (bus {})", self.consumer, self.inlet, self.bus)
    }
}

/// Derives every edge implied by the document's bus bindings.
///
/// Order is ascending bus, then outlet binding order, then inlet binding
/// order. Buses with no outlet or no inlet contribute nothing.
pub fn derive_edges(document: &Document) -> Vec<DerivedEdge> {
    let routing = document.routing();
    let mut buses: BTreeMap<BusIndex, (Vec<(&NodeKey, OutletIndex)>, Vec<(&NodeKey, &str)>)> =
        BTreeMap::new();

    for (node, outlet, bus) in routing.outlets() {
        buses.entry(bus).or_default().0.push((node, outlet));
    }
    for (node, inlet, bus) in routing.inlets() {
        buses.entry(bus).or_default().1.push((node, inlet));
    }

    let mut edges = Vec::new();
    for (bus, (outlets, inlets)) in &buses {
        for (producer, outlet) in outlets {
            for (consumer, inlet) in inlets {
                edges.push(DerivedEdge {
                    producer: (*producer).clone(),
                    outlet: *outlet,
                    consumer: (*consumer).clone(),
                    inlet: inlet.to_string(),
                    bus: *bus,
                });
            }
        }
    }
    edges
}

/// Whether commands may leave feedback loops in the routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Cycles are legal; renderers resolve them with a frame of delay.
    #[default]
    Allow,
    /// A command whose result contains a cycle is rejected.
    Reject,
}

impl CyclePolicy {
    /// Checks `document` against the policy.
    pub fn enforce(self, document: &Document) -> Result<(), CoreError> {
        if self == CyclePolicy::Allow {
            return Ok(());
        }
        match DerivedGraph::build(document).find_cycle() {
            Some(nodes) => Err(CoreError::CycleDetected { nodes }),
            None => Ok(()),
        }
    }
}

impl FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(CyclePolicy::Allow),
            "reject" => Ok(CyclePolicy::Reject),
            other => Err(format!("unknown cycle policy '{}'", other)),
        }
    }
}

/// The derived connections as a directed graph over every node.
#[derive(Debug, Clone)]
pub struct DerivedGraph {
    graph: DiGraph<NodeKey, DerivedEdge>,
    indices: HashMap<NodeKey, NodeIndex>,
}

impl DerivedGraph {
    /// Derives the edges of `document` and builds the graph.
    pub fn build(document: &Document) -> Self {
        Self::from_edges(document, &derive_edges(document))
    }

    /// Builds the graph from edges that were already derived.
    ///
    /// Nodes are added in the document's node order, so node indices and
    /// every query result follow that order.
    pub fn from_edges(document: &Document, edges: &[DerivedEdge]) -> Self {
        let mut graph = DiGraph::with_capacity(document.node_count(), edges.len());
        let mut indices = HashMap::with_capacity(document.node_count());
        for key in document.node_order() {
            let idx = graph.add_node(key.clone());
            indices.insert(key.clone(), idx);
        }
        for edge in edges {
            let (Some(&from), Some(&to)) = (
                indices.get(edge.producer.as_str()),
                indices.get(edge.consumer.as_str()),
            ) else {
                continue;
            };
            graph.add_edge(from, to, edge.clone());
        }
        DerivedGraph { graph, indices }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges in derivation order.
    pub fn edges(&self) -> impl Iterator<Item = &DerivedEdge> {
        self.graph.edge_weights()
    }

    /// Producers before consumers. Fails on a feedback loop.
    pub fn render_order(&self) -> Result<Vec<NodeKey>, CoreError> {
        match toposort(&self.graph, None) {
            Ok(sorted) => Ok(sorted.into_iter().map(|idx| self.graph[idx].clone()).collect()),
            Err(cycle) => Err(CoreError::CycleDetected {
                nodes: self
                    .find_cycle()
                    .unwrap_or_else(|| vec![self.graph[cycle.node_id()].clone()]),
            }),
        }
    }

    /// Members of the first feedback loop, in node order.
    ///
    /// A loop is a strongly connected component with more than one node, or
    /// a single node that feeds itself.
    pub fn find_cycle(&self) -> Option<Vec<NodeKey>> {
        let mut components = tarjan_scc(&self.graph);
        for component in &mut components {
            component.sort();
        }
        components.sort();

        components
            .into_iter()
            .find(|component| match component.as_slice() {
                [single] => self.graph.contains_edge(*single, *single),
                _ => true,
            })
            .map(|component| {
                component
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect()
            })
    }

    /// Nodes whose signal reaches `node`, in node order. `node` itself is
    /// excluded.
    pub fn upstream_of(&self, node: &str) -> Result<Vec<NodeKey>, CoreError> {
        let start = *self
            .indices
            .get(node)
            .ok_or_else(|| CoreError::UnknownNode { key: node.into() })?;

        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, start);
        let mut upstream = Vec::new();
        while let Some(idx) = bfs.next(reversed) {
            if idx != start {
                upstream.push(idx);
            }
        }
        upstream.sort();
        Ok(upstream
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect())
    }
}
