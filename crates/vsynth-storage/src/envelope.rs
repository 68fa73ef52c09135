//! The versioned persistence envelope.
//!
//! A saved patch is `{ "version": <u32>, "document": <Document> }`. Only the
//! document is stored; undo history never leaves the session. The version
//! tag must be bumped whenever the shape of a node, the binding maps or a
//! module contract changes, together with a migration registered in
//! [`crate::migrate::MigrationRegistry::builtin`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vsynth_core::Document;

use crate::error::StorageError;

/// Schema version written by [`save`].
pub const CURRENT_VERSION: u32 = 12;

/// File extension of saved patches.
pub const PATCH_EXTENSION: &str = "vsynth";

/// A stored document whose shape is not yet trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Missing in very old files; read as version 0.
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub document: Value,
}

impl Envelope {
    /// Parses the envelope without interpreting the document.
    pub fn parse(text: &str) -> Result<Envelope, StorageError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    document: &'a Document,
}

/// Serializes `document` as pretty JSON at [`CURRENT_VERSION`].
pub fn save(document: &Document) -> Result<String, StorageError> {
    Ok(serde_json::to_string_pretty(&EnvelopeRef {
        version: CURRENT_VERSION,
        document,
    })?)
}
