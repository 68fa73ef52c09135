//! Demo patches.
//!
//! Small ready-made documents a new user can load instead of an empty
//! patch. Each demo is a list of edit commands replayed through [`apply`]
//! onto an empty document, so a demo can never hold a document the command
//! layer would refuse.

use indexmap::IndexMap;

use crate::command::{apply, EditCommand};
use crate::derive::CyclePolicy;
use crate::document::{Document, DEFAULT_BUS_COUNT};
use crate::error::CoreError;
use crate::id::{BusIndex, OutletIndex};
use crate::module::ModuleCatalog;

/// A named demo patch.
#[derive(Debug, Clone, Copy)]
pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    commands: fn() -> Vec<EditCommand>,
}

impl Demo {
    /// The commands that build this demo.
    pub fn commands(&self) -> Vec<EditCommand> {
        (self.commands)()
    }

    /// Builds the demo document against `catalog`.
    ///
    /// Cycles are allowed; a demo may show off feedback.
    pub fn document(&self, catalog: &ModuleCatalog) -> Result<Document, CoreError> {
        let batch = EditCommand::Batch {
            commands: self.commands(),
        };
        apply(
            &Document::new(DEFAULT_BUS_COUNT),
            catalog,
            CyclePolicy::Allow,
            &batch,
        )
    }
}

/// Every built-in demo, in menu order.
pub fn demos() -> &'static [Demo] {
    &DEMOS
}

/// Looks up a demo by name.
pub fn find_demo(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|demo| demo.name == name)
}

static DEMOS: [Demo; 3] = [
    Demo {
        name: "first light",
        description: "a constant driving an oscillator's phase",
        commands: first_light,
    },
    Demo {
        name: "scan drift",
        description: "a drifting oscillator through scanlines and an RGB split",
        commands: scan_drift,
    },
    Demo {
        name: "feedback mix",
        description: "an oscillator mixed with a delayed copy of the mix",
        commands: feedback_mix,
    },
];

fn insert(key: &str, module_type: &str, parameters: &[(&str, f64)]) -> EditCommand {
    EditCommand::InsertNode {
        module_type: module_type.to_string(),
        key: Some(key.into()),
        parameters: parameters
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<IndexMap<_, _>>(),
        uniforms: IndexMap::new(),
    }
}

fn outlet(node: &str, outlet: OutletIndex, bus: u32) -> EditCommand {
    EditCommand::SetOutletBinding {
        node: node.into(),
        outlet,
        bus: Some(BusIndex(bus)),
    }
}

fn inlet(node: &str, inlet: &str, bus: u32) -> EditCommand {
    EditCommand::SetInletBinding {
        node: node.into(),
        inlet: inlet.to_string(),
        bus: Some(BusIndex(bus)),
    }
}

fn output(node: &str) -> EditCommand {
    EditCommand::SetOutputNode {
        node: Some(node.into()),
    }
}

fn first_light() -> Vec<EditCommand> {
    vec![
        insert("constant", "constant", &[("value", 0.25)]),
        insert("osc", "oscillator", &[]),
        outlet("constant", 0, 0),
        inlet("osc", "phase offset", 0),
        output("osc"),
    ]
}

fn scan_drift() -> Vec<EditCommand> {
    vec![
        insert("drift", "autoOsc", &[("speed", 0.02)]),
        insert("lines", "constant", &[("value", 0.8)]),
        insert("scan", "scanlines", &[]),
        insert("split", "rgbOffset", &[("offset", 0.02)]),
        outlet("drift", 0, 0),
        inlet("scan", "input", 0),
        outlet("lines", 0, 1),
        inlet("scan", "line count", 1),
        outlet("scan", 0, 2),
        inlet("split", "input", 2),
        output("split"),
    ]
}

fn feedback_mix() -> Vec<EditCommand> {
    vec![
        insert("osc", "oscillator", &[("frequency", 0.1)]),
        insert("mix", "mixer", &[("mix", 0.7)]),
        insert("delay", "phaseDelta", &[]),
        outlet("osc", 0, 0),
        inlet("mix", "a", 0),
        outlet("mix", 0, 1),
        inlet("delay", "input", 1),
        outlet("delay", 0, 2),
        inlet("mix", "b", 2),
        output("mix"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{derive_edges, DerivedGraph};
    use crate::id::NodeKey;

    #[test]
    fn every_demo_builds_a_valid_document() {
        let catalog = ModuleCatalog::builtin();
        for demo in demos() {
            let doc = demo.document(&catalog).unwrap();
            doc.validate(&catalog).unwrap();
            assert!(doc.output_node().is_some(), "{} has no output", demo.name);
            assert!(!derive_edges(&doc).is_empty(), "{} has no edges", demo.name);
        }
    }

    #[test]
    fn demo_names_are_unique() {
        let mut names: Vec<&str> = demos().iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), demos().len());
    }

    #[test]
    fn first_light_matches_the_basic_patch() {
        let catalog = ModuleCatalog::builtin();
        let doc = find_demo("first light").unwrap().document(&catalog).unwrap();
        let edges: Vec<String> = derive_edges(&doc).iter().map(|e| e.to_string()).collect();
        assert_eq!(edges, vec!["constant -> osc.phase offset (bus 0)"]);
        assert_eq!(doc.node("constant").unwrap().parameters["value"], 0.25);
    }

    #[test]
    fn feedback_mix_contains_a_loop() {
        let catalog = ModuleCatalog::builtin();
        let doc = find_demo("feedback mix").unwrap().document(&catalog).unwrap();
        let graph = DerivedGraph::build(&doc);
        assert_eq!(
            graph.find_cycle(),
            Some(vec![NodeKey::from("mix"), NodeKey::from("delay")])
        );
        assert!(graph.render_order().is_err());
    }

    #[test]
    fn unknown_demo() {
        assert!(find_demo("nope").is_none());
    }
}
