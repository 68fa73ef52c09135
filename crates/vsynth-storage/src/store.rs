//! Named patch stores.
//!
//! [`DocumentStore`] is the contract every backend implements: write, read,
//! list and delete patches by name. Backends hold serialized envelopes and
//! know nothing about migrations; [`DocumentStore::open`] runs the full
//! [`load`] pipeline on what they return.
//!
//! [`InMemoryStore`] serves tests and ephemeral sessions. [`FileStore`] keeps
//! one `<name>.vsynth` file per patch in a directory.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use vsynth_core::{Document, ModuleCatalog};

use crate::envelope::{save, PATCH_EXTENSION};
use crate::error::StorageError;
use crate::migrate::{load, Loaded, MigrationRegistry};

/// The storage contract for named patches.
pub trait DocumentStore {
    /// Saves `document` under `name`, replacing any previous patch.
    fn write(&mut self, name: &str, document: &Document) -> Result<(), StorageError>;

    /// Returns the serialized envelope stored under `name`.
    fn read(&self, name: &str) -> Result<String, StorageError>;

    /// Names of all stored patches, sorted.
    fn list(&self) -> Result<Vec<String>, StorageError>;

    /// Deletes the patch stored under `name`.
    fn delete(&mut self, name: &str) -> Result<(), StorageError>;

    /// Reads, migrates and validates the patch stored under `name`.
    fn open(
        &self,
        name: &str,
        catalog: &ModuleCatalog,
        registry: &MigrationRegistry,
    ) -> Result<Loaded, StorageError> {
        load(&self.read(name)?, catalog, registry)
    }
}

/// Rejects names that are empty or could escape a store directory.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let invalid = |reason| {
        Err(StorageError::InvalidPatchName {
            name: name.to_string(),
            reason,
        })
    };
    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name.starts_with('.') {
        return invalid("name starts with '.'");
    }
    if name.chars().any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control()) {
        return invalid("name contains a path separator or control character");
    }
    Ok(())
}

/// Patches kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    patches: BTreeMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw envelope text, e.g. to simulate an old file.
    pub fn insert_raw(&mut self, name: &str, text: impl Into<String>) -> Result<(), StorageError> {
        validate_name(name)?;
        self.patches.insert(name.to_string(), text.into());
        Ok(())
    }
}

impl DocumentStore for InMemoryStore {
    fn write(&mut self, name: &str, document: &Document) -> Result<(), StorageError> {
        validate_name(name)?;
        self.patches.insert(name.to_string(), save(document)?);
        Ok(())
    }

    fn read(&self, name: &str) -> Result<String, StorageError> {
        self.patches
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::PatchNotFound {
                name: name.to_string(),
            })
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.patches.keys().cloned().collect())
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        self.patches
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::PatchNotFound {
                name: name.to_string(),
            })
    }
}

/// Patches kept as `<name>.vsynth` files in one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(format!("{}.{}", name, PATCH_EXTENSION)))
    }
}

fn not_found(name: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::PatchNotFound {
            name: name.to_string(),
        }
    } else {
        StorageError::Io(err)
    }
}

impl DocumentStore for FileStore {
    fn write(&mut self, name: &str, document: &Document) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        let text = save(document)?;
        // Write then rename so a crash never leaves a half-written patch.
        let tmp = path.with_extension(format!("{}.tmp", PATCH_EXTENSION));
        if let Err(err) = fs::write(&tmp, text).and_then(|()| fs::rename(&tmp, &path)) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %cleanup, "temporary patch not removed");
            }
            return Err(err.into());
        }
        debug!(path = %path.display(), "wrote patch");
        Ok(())
    }

    fn read(&self, name: &str) -> Result<String, StorageError> {
        let path = self.path_for(name)?;
        fs::read_to_string(&path).map_err(|e| not_found(name, e))
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(PATCH_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        fs::remove_file(&path).map_err(|e| not_found(name, e))?;
        debug!(path = %path.display(), "deleted patch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::LoadOutcome;

    #[test]
    fn in_memory_round_trip() {
        let catalog = ModuleCatalog::builtin();
        let registry = MigrationRegistry::builtin();
        let mut store = InMemoryStore::new();
        let doc = Document::new(3);

        store.write("b", &doc).unwrap();
        store.write("a", &doc).unwrap();
        assert_eq!(store.list().unwrap(), vec!["a", "b"]);

        let loaded = store.open("a", &catalog, &registry).unwrap();
        assert!(matches!(loaded.outcome, LoadOutcome::Current));
        assert_eq!(loaded.document, doc);

        store.delete("a").unwrap();
        assert!(matches!(
            store.read("a"),
            Err(StorageError::PatchNotFound { .. })
        ));
        assert!(matches!(
            store.delete("a"),
            Err(StorageError::PatchNotFound { .. })
        ));
    }

    #[test]
    fn raw_old_patch_is_cleared_on_open() {
        let mut store = InMemoryStore::new();
        store
            .insert_raw("old", r#"{ "version": 5, "document": { "nodes": [] } }"#)
            .unwrap();
        let loaded = store
            .open("old", &ModuleCatalog::builtin(), &MigrationRegistry::builtin())
            .unwrap();
        assert!(matches!(loaded.outcome, LoadOutcome::Cleared { from: 5 }));
    }

    #[test]
    fn failed_rename_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        // A directory in the patch's place makes the rename fail.
        fs::create_dir(dir.path().join("blocked.vsynth")).unwrap();

        assert!(matches!(
            store.write("blocked", &Document::default()),
            Err(StorageError::Io(_))
        ));
        assert!(!dir.path().join("blocked.vsynth.tmp").exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn names_are_validated() {
        for bad in ["", "  ", ".hidden", "a/b", "..\\up", "tab\there"] {
            assert!(
                matches!(validate_name(bad), Err(StorageError::InvalidPatchName { .. })),
                "{:?} accepted",
                bad
            );
        }
        validate_name("my patch 2").unwrap();
    }
}
