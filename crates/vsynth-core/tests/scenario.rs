//! End-to-end editing scenarios driven through a [`Session`].

use std::sync::Arc;

use indexmap::IndexMap;
use vsynth_core::matrix::{connections, lanes};
use vsynth_core::{
    derive_edges, BusIndex, CoreError, EditCommand, ModuleCatalog, NodeKey, Session,
    SessionConfig,
};

fn session(bus_count: u32) -> Session {
    Session::new(
        Arc::new(ModuleCatalog::builtin()),
        SessionConfig {
            bus_count,
            ..SessionConfig::default()
        },
    )
}

fn insert(key: &str, module_type: &str) -> EditCommand {
    EditCommand::InsertNode {
        module_type: module_type.to_string(),
        key: Some(key.into()),
        parameters: IndexMap::new(),
        uniforms: IndexMap::new(),
    }
}

/// A constant driving an oscillator's phase offset through bus 0.
fn constant_into_oscillator(session: &mut Session) {
    for command in [
        insert("constant", "constant"),
        insert("oscillator", "oscillator"),
        EditCommand::SetOutletBinding {
            node: "constant".into(),
            outlet: 0,
            bus: Some(BusIndex(0)),
        },
        EditCommand::SetInletBinding {
            node: "oscillator".into(),
            inlet: "phase offset".to_string(),
            bus: Some(BusIndex(0)),
        },
    ] {
        session.dispatch(&command).unwrap();
    }
}

#[test]
fn constant_drives_oscillator_phase() {
    let mut session = session(2);
    constant_into_oscillator(&mut session);

    let edges = derive_edges(&session.document());
    insta::assert_json_snapshot!(edges, @r###"
    [
      {
        "producer": "constant",
        "outlet": 0,
        "consumer": "oscillator",
        "inlet": "phase offset",
        "bus": 0
      }
    ]
    "###);

    let graph = session.graph();
    assert_eq!(
        graph.upstream_of("oscillator").unwrap(),
        vec![NodeKey::from("constant")]
    );
    assert_eq!(
        graph.render_order().unwrap(),
        vec![NodeKey::from("constant"), NodeKey::from("oscillator")]
    );
}

#[test]
fn removing_the_producer_clears_its_routing() {
    let mut session = session(2);
    constant_into_oscillator(&mut session);

    session
        .dispatch(&EditCommand::RemoveNode {
            key: "constant".into(),
        })
        .unwrap();

    let doc = session.document();
    assert!(session.edges().is_empty());
    assert_eq!(doc.routing().outlet_bus("constant", 0), None);
    assert_eq!(
        doc.routing().inlet_bus("oscillator", "phase offset"),
        Some(BusIndex(0))
    );

    assert!(session.undo());
    assert_eq!(session.edges().len(), 1);
}

#[test]
fn matrix_reflects_bindings() {
    let mut session = session(2);
    constant_into_oscillator(&mut session);

    let doc = session.document();
    let lanes = lanes(&doc, session.catalog()).unwrap();
    let names: Vec<String> = lanes.iter().map(|l| l.name()).collect();
    assert_eq!(
        names,
        vec!["constant", "oscillator", "phase offset", "rotation", "frequency"]
    );
    assert_eq!(
        connections(&doc, &lanes),
        vec![(0, BusIndex(0)), (2, BusIndex(0))]
    );
}

#[test]
fn growing_and_shrinking_the_bus_space() {
    let mut session = session(2);
    constant_into_oscillator(&mut session);

    session.dispatch(&EditCommand::AddBus).unwrap();
    assert_eq!(session.document().bus_count(), 3);

    session
        .dispatch(&EditCommand::SetBusCount { count: 1 })
        .unwrap();
    assert_eq!(
        session.dispatch(&EditCommand::SetBusCount { count: 0 }),
        Err(CoreError::BusCountTooLow {
            requested: 0,
            required: 1
        })
    );
    assert_eq!(session.document().bus_count(), 1);
}

#[test]
fn parameter_edits_reuse_the_derivation() {
    let mut session = session(2);
    constant_into_oscillator(&mut session);

    let before = session.edges();
    session
        .dispatch(&EditCommand::SetParameter {
            key: "constant".into(),
            parameter: "value".to_string(),
            value: 0.8,
        })
        .unwrap();
    let after = session.edges();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(
        session.document().node("constant").unwrap().parameter("value"),
        Some(0.8)
    );
}
