//! Schema migrations and loading.
//!
//! Migrations are keyed by the version they migrate *to*. Loading a document
//! stored at version `v` runs every registered migration with a key in
//! `(v, CURRENT_VERSION]`, in ascending order. Versions with no registered
//! migration did not change the shape and pass the document through.
//!
//! A migration may be a destructive [`Migration::Reset`]: the document is
//! discarded and the session starts from an empty patch. That is an
//! accepted policy for incompatible versions, not an error.
//!
//! Loading never leaves the host without a document. Apart from a
//! malformed envelope, every failure degrades to a reset that is reported
//! through [`LoadOutcome::Reset`].

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use vsynth_core::{Document, ModuleCatalog};

use crate::envelope::{Envelope, CURRENT_VERSION};
use crate::error::StorageError;

/// Rewrites a raw document from the previous version's shape.
pub type TransformFn = fn(Value) -> Result<Value, String>;

/// What happens to a document crossing a version boundary.
#[derive(Debug, Clone, Copy)]
pub enum Migration {
    /// Discard the stored document.
    Reset,
    /// Translate the stored document.
    Transform(TransformFn),
}

/// Migrations keyed by target version.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, Migration>,
}

impl MigrationRegistry {
    /// An empty registry: every older version passes through.
    pub fn new() -> Self {
        Self::default()
    }

    /// The migrations shipped with this version of vsynth.
    ///
    /// Version 12 changed the node and binding layout incompatibly, so
    /// anything older is discarded.
    pub fn builtin() -> Self {
        let mut registry = MigrationRegistry::new();
        registry.register(12, Migration::Reset);
        registry
    }

    /// Registers the migration into `version`, replacing any previous one.
    pub fn register(&mut self, version: u32, migration: Migration) -> &mut Self {
        self.migrations.insert(version, migration);
        self
    }

    /// Brings a raw document from `from` to [`CURRENT_VERSION`].
    ///
    /// Returns `Ok(None)` when a reset migration discarded the document.
    pub fn migrate(&self, from: u32, document: Value) -> Result<Option<Value>, StorageError> {
        if from > CURRENT_VERSION {
            return Err(StorageError::MigrationFailed {
                from,
                reason: format!("stored version is newer than {}", CURRENT_VERSION),
            });
        }

        if from == CURRENT_VERSION {
            return Ok(Some(document));
        }

        let mut document = document;
        for (&version, migration) in self.migrations.range(from + 1..=CURRENT_VERSION) {
            match migration {
                Migration::Reset => {
                    info!(from, to = version, "reset migration discarded stored document");
                    return Ok(None);
                }
                Migration::Transform(transform) => {
                    document = transform(document).map_err(|reason| {
                        StorageError::MigrationFailed {
                            from,
                            reason: format!("migration to version {}: {}", version, reason),
                        }
                    })?;
                }
            }
        }
        Ok(Some(document))
    }
}

/// How a load arrived at its document.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Stored at the current version.
    Current,
    /// Stored at an older version and translated.
    Migrated { from: u32 },
    /// A reset migration discarded the stored document.
    Cleared { from: u32 },
    /// The stored document was unusable; the host received an empty one.
    Reset { from: u32, reason: StorageError },
}

/// Result of [`load`]: a document that is consistent with the catalog.
#[derive(Debug)]
pub struct Loaded {
    pub document: Document,
    pub outcome: LoadOutcome,
}

/// Parses, migrates and validates a saved patch.
///
/// Only a malformed envelope is an error. Everything past it resolves to a
/// usable document.
pub fn load(
    text: &str,
    catalog: &ModuleCatalog,
    registry: &MigrationRegistry,
) -> Result<Loaded, StorageError> {
    let envelope = Envelope::parse(text)?;
    let from = envelope.version;

    let loaded = match migrate_and_decode(envelope, catalog, registry) {
        Ok(Some(document)) => Loaded {
            document,
            outcome: if from == CURRENT_VERSION {
                LoadOutcome::Current
            } else {
                LoadOutcome::Migrated { from }
            },
        },
        Ok(None) => Loaded {
            document: Document::default(),
            outcome: LoadOutcome::Cleared { from },
        },
        Err(reason) => {
            warn!(from, error = %reason, "stored document unusable; resetting");
            Loaded {
                document: Document::default(),
                outcome: LoadOutcome::Reset { from, reason },
            }
        }
    };

    info!(
        from,
        nodes = loaded.document.node_count(),
        outcome = ?loaded.outcome,
        "loaded document"
    );
    Ok(loaded)
}

fn migrate_and_decode(
    envelope: Envelope,
    catalog: &ModuleCatalog,
    registry: &MigrationRegistry,
) -> Result<Option<Document>, StorageError> {
    let from = envelope.version;
    let failed = |reason: String| StorageError::MigrationFailed { from, reason };

    let Some(raw) = registry.migrate(from, envelope.document)? else {
        return Ok(None);
    };
    let document: Document =
        serde_json::from_value(raw).map_err(|e| failed(format!("unreadable document: {}", e)))?;
    document
        .validate(catalog)
        .map_err(|e| failed(e.to_string()))?;
    Ok(Some(document))
}
