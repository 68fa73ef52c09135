//! Storage error types for vsynth-storage.
//!
//! [`StorageError`] covers the failure modes of persisting patches:
//! serialization, filesystem I/O, missing or badly named patches, and
//! documents that cannot be brought to the current schema version.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a patch file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No patch with the given name is stored.
    #[error("patch not found: '{name}'")]
    PatchNotFound { name: String },

    /// The name cannot be used as a patch name.
    #[error("invalid patch name '{name}': {reason}")]
    InvalidPatchName { name: String, reason: &'static str },

    /// A stored document could not be brought to the current version.
    #[error("migration from version {from} failed: {reason}")]
    MigrationFailed { from: u32, reason: String },
}
