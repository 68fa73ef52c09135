//! Persistence round trips through the envelope and the file store.

use proptest::prelude::*;
use vsynth_core::{apply, demos, BusIndex, CyclePolicy, Document, EditCommand, ModuleCatalog};
use vsynth_storage::{
    load, save, DocumentStore, FileStore, LoadOutcome, MigrationRegistry, StorageError,
};

const MODULES: &[&str] = &["constant", "oscillator", "mixer", "rgbOffset", "autoOsc"];

fn insert(module: usize, value: f64) -> EditCommand {
    let module_type = MODULES[module % MODULES.len()];
    let catalog = ModuleCatalog::builtin();
    let parameters = catalog
        .lookup(module_type)
        .ok()
        .and_then(|c| c.parameter_keys.first().cloned())
        .map(|key| (key, value))
        .into_iter()
        .collect();
    EditCommand::InsertNode {
        module_type: module_type.to_string(),
        key: None,
        parameters,
        uniforms: [("seed".to_string(), serde_json::json!(module))]
            .into_iter()
            .collect(),
    }
}

/// A document with a few nodes, some bindings and an output node.
fn build(nodes: &[(usize, f64)], bindings: &[(usize, u32)], output: Option<usize>) -> Document {
    let catalog = ModuleCatalog::builtin();
    let mut doc = Document::new(6);
    for (module, value) in nodes {
        doc = apply(&doc, &catalog, CyclePolicy::Allow, &insert(*module, *value)).unwrap();
    }
    let keys = doc.node_order().to_vec();
    if keys.is_empty() {
        return doc;
    }
    for (i, (n, bus)) in bindings.iter().enumerate() {
        let node = keys[n % keys.len()].clone();
        let command = if i % 2 == 0 {
            EditCommand::SetOutletBinding {
                node,
                outlet: 0,
                bus: Some(BusIndex(*bus)),
            }
        } else {
            let contract = catalog
                .lookup(&doc.node(node.as_str()).unwrap().module_type)
                .unwrap();
            let Some(inlet) = contract.inlet_keys.first().cloned() else {
                continue;
            };
            EditCommand::SetInletBinding {
                node,
                inlet,
                bus: Some(BusIndex(*bus)),
            }
        };
        doc = apply(&doc, &catalog, CyclePolicy::Allow, &command).unwrap();
    }
    if let Some(n) = output {
        let node = Some(keys[n % keys.len()].clone());
        doc = apply(&doc, &catalog, CyclePolicy::Allow, &EditCommand::SetOutputNode { node })
            .unwrap();
    }
    doc
}

fn finite() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |v| v.is_finite())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// A saved document loads back unchanged at the current version.
    #[test]
    fn save_then_load_is_identity(
        nodes in prop::collection::vec((0..MODULES.len(), finite()), 0..8),
        bindings in prop::collection::vec((any::<usize>(), 0u32..6), 0..12),
        output in prop::option::of(any::<usize>()),
    ) {
        let doc = build(&nodes, &bindings, output);
        let text = save(&doc).unwrap();
        let loaded = load(&text, &ModuleCatalog::builtin(), &MigrationRegistry::builtin()).unwrap();
        prop_assert!(matches!(loaded.outcome, LoadOutcome::Current));
        prop_assert_eq!(loaded.document, doc);
    }
}

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path().join("patches")).unwrap();
    let doc = build(&[(0, 0.25), (1, 0.1)], &[(0, 0), (1, 0)], Some(1));

    store.write("first light", &doc).unwrap();
    assert!(dir.path().join("patches/first light.vsynth").is_file());

    let loaded = store
        .open("first light", &ModuleCatalog::builtin(), &MigrationRegistry::builtin())
        .unwrap();
    assert_eq!(loaded.document, doc);
}

#[test]
fn file_store_lists_only_patches() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();
    store.write("zeta", &Document::default()).unwrap();
    store.write("alpha", &Document::default()).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a patch").unwrap();

    assert_eq!(store.list().unwrap(), vec!["alpha", "zeta"]);
}

#[test]
fn file_store_overwrites_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();
    store.write("patch", &Document::new(2)).unwrap();
    store.write("patch", &Document::new(5)).unwrap();

    let loaded = store
        .open("patch", &ModuleCatalog::builtin(), &MigrationRegistry::builtin())
        .unwrap();
    assert_eq!(loaded.document.bus_count(), 5);

    store.delete("patch").unwrap();
    assert!(store.list().unwrap().is_empty());
    assert!(matches!(
        store.read("patch"),
        Err(StorageError::PatchNotFound { .. })
    ));
}

#[test]
fn file_store_rejects_escaping_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();
    assert!(matches!(
        store.write("../outside", &Document::default()),
        Err(StorageError::InvalidPatchName { .. })
    ));
}

#[test]
fn corrupt_file_resets_to_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    std::fs::write(
        dir.path().join("broken.vsynth"),
        r#"{ "version": 12, "document": { "nodes": 3 } }"#,
    )
    .unwrap();

    let loaded = store
        .open("broken", &ModuleCatalog::builtin(), &MigrationRegistry::builtin())
        .unwrap();
    assert!(matches!(loaded.outcome, LoadOutcome::Reset { from: 12, .. }));
    assert_eq!(loaded.document, Document::default());
}

#[test]
fn demos_survive_the_file_store() {
    let catalog = ModuleCatalog::builtin();
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();
    for demo in demos() {
        let doc = demo.document(&catalog).unwrap();
        store.write(demo.name, &doc).unwrap();
        let loaded = store
            .open(demo.name, &catalog, &MigrationRegistry::builtin())
            .unwrap();
        assert!(matches!(loaded.outcome, LoadOutcome::Current));
        assert_eq!(loaded.document, doc);
    }
    assert_eq!(store.list().unwrap().len(), demos().len());
}
