//! Identifier newtypes for patch entities.
//!
//! Node keys are strings chosen by the user or generated from the module type
//! and the document's key seed. Buses are plain numbers; a bus is not an
//! object, only a rendezvous value shared by outlet and inlet bindings.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Raw sentinel used by the routing matrix for "no bus".
pub const UNBOUND: i64 = -1;

/// Index of a node outlet. Primitive modules only have outlet `0`.
pub type OutletIndex = u16;

/// Unique key of a node within a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Creates a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        NodeKey(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        NodeKey(key.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(key: String) -> Self {
        NodeKey(key)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bus number in `[0, bus_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusIndex(pub u32);

impl BusIndex {
    /// Interprets a raw matrix value: [`UNBOUND`] means "no bus", anything
    /// else must be a valid index for `bus_count`.
    pub fn from_raw(raw: i64, bus_count: u32) -> Result<Option<BusIndex>, CoreError> {
        if raw == UNBOUND {
            return Ok(None);
        }
        if raw < 0 || raw >= i64::from(bus_count) {
            return Err(CoreError::BusIndexOutOfRange {
                index: raw,
                bus_count,
            });
        }
        Ok(Some(BusIndex(raw as u32)))
    }

    /// The inverse of [`BusIndex::from_raw`].
    pub fn to_raw(bus: Option<BusIndex>) -> i64 {
        bus.map_or(UNBOUND, |b| i64::from(b.0))
    }

    /// Checks that this index is addressable with `bus_count` buses.
    pub fn check(self, bus_count: u32) -> Result<BusIndex, CoreError> {
        if self.0 < bus_count {
            Ok(self)
        } else {
            Err(CoreError::BusIndexOutOfRange {
                index: i64::from(self.0),
                bus_count,
            })
        }
    }
}

impl fmt::Display for BusIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
