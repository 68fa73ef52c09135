//! Memoized edge derivation.
//!
//! Derived edges depend only on the routing inputs of a document: its node
//! order, its bindings and its bus count. Parameter edits, which are by far
//! the most frequent command, leave those untouched. [`DerivationCache`]
//! fingerprints the routing inputs with blake3 and reuses the previous
//! derivation while the fingerprint is unchanged.

use std::sync::Arc;

use tracing::debug;

use crate::derive::{derive_edges, DerivedEdge};
use crate::document::Document;

/// Fingerprint of everything [`derive_edges`] reads.
///
/// Binding order is part of the fingerprint because it fixes the order of
/// derived edges.
pub fn routing_fingerprint(document: &Document) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    let routing = document.routing();

    hasher.update(&routing.bus_count().to_le_bytes());

    hasher.update(b"order");
    for key in document.node_order() {
        update_str(&mut hasher, key.as_str());
    }

    hasher.update(b"outlets");
    for (node, outlet, bus) in routing.outlets() {
        update_str(&mut hasher, node.as_str());
        hasher.update(&outlet.to_le_bytes());
        hasher.update(&bus.0.to_le_bytes());
    }

    hasher.update(b"inlets");
    for (node, inlet, bus) in routing.inlets() {
        update_str(&mut hasher, node.as_str());
        update_str(&mut hasher, inlet);
        hasher.update(&bus.0.to_le_bytes());
    }

    hasher.finalize()
}

/// Length-prefixed so that adjacent strings cannot alias.
fn update_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Single-entry cache of the last derivation.
#[derive(Debug, Default)]
pub struct DerivationCache {
    entry: Option<(blake3::Hash, Arc<[DerivedEdge]>)>,
    hits: u64,
    misses: u64,
}

impl DerivationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edges of `document`, derived again only if its routing changed.
    pub fn edges(&mut self, document: &Document) -> Arc<[DerivedEdge]> {
        let fingerprint = routing_fingerprint(document);
        if let Some((cached, edges)) = &self.entry {
            if *cached == fingerprint {
                self.hits += 1;
                debug!(fingerprint = %fingerprint.to_hex(), "derivation cache hit");
                return Arc::clone(edges);
            }
        }

        self.misses += 1;
        let edges: Arc<[DerivedEdge]> = derive_edges(document).into();
        debug!(
            fingerprint = %fingerprint.to_hex(),
            edges = edges.len(),
            "derivation cache miss"
        );
        self.entry = Some((fingerprint, Arc::clone(&edges)));
        edges
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
