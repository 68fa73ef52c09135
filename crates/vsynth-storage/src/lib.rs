//! Persistence for vsynth patches.
//!
//! The core defines the serializable [`Document`](vsynth_core::Document);
//! this crate wraps it in a versioned envelope, migrates old envelopes on
//! load, and stores patches by name.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`envelope`]: the `{ version, document }` format and [`save`]
//! - [`migrate`]: migration registry and the [`load`] pipeline
//! - [`store`]: DocumentStore trait, InMemoryStore and FileStore

pub mod envelope;
pub mod error;
pub mod migrate;
pub mod store;

// Re-export key types for ergonomic use.
pub use envelope::{save, Envelope, CURRENT_VERSION, PATCH_EXTENSION};
pub use error::StorageError;
pub use migrate::{load, LoadOutcome, Loaded, Migration, MigrationRegistry};
pub use store::{DocumentStore, FileStore, InMemoryStore};
