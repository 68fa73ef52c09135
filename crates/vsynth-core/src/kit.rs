//! The built-in module kit.
//!
//! Texture-valued inlets carry another node's output; the associated
//! parameters are the sliders shown while the inlet is left unpatched.

use crate::module::{ModuleCatalog, ModuleContract, ShaderSpec};

/// Contracts of the built-in modules, in picker order.
pub fn builtin_contracts() -> Vec<ModuleContract> {
    vec![
        ModuleContract::primitive(
            "oscillator",
            ShaderSpec::new("oscillator")
                .inlet_uniform("phase offset", "phaseOffsetTexture")
                .inlet_uniform("rotation", "rotationTexture")
                .inlet_uniform("frequency", "frequencyTexture")
                .parameter_uniform("frequency", "frequency")
                .parameter_uniform("rotation", "rotationTheta")
                .parameter_uniform("phase offset", "phaseOffset")
                .parameter_uniform("wave size", "waveSize"),
        )
        .parameter("frequency", 0.05)
        .parameter("rotation", 0.0)
        .parameter("phase offset", 0.0)
        .parameter("wave size", 0.5)
        .inlet_with("phase offset", &["phase offset"])
        .inlet_with("rotation", &["rotation"])
        .inlet_with("frequency", &["frequency"]),
        ModuleContract::primitive(
            "identity",
            ShaderSpec::new("identity").inlet_uniform("input", "inputTexture"),
        )
        .inlet("input"),
        ModuleContract::primitive(
            "constant",
            ShaderSpec::new("constant").parameter_uniform("value", "value"),
        )
        .parameter("value", 0.5),
        ModuleContract::primitive(
            "addFract",
            ShaderSpec::new("addFract")
                .inlet_uniform("a", "leftTexture")
                .inlet_uniform("b", "rightTexture"),
        )
        .inlet("a")
        .inlet("b"),
        ModuleContract::primitive(
            "phaseDelta",
            ShaderSpec::new("phaseDelta")
                .inlet_uniform("input", "inputTexture")
                .parameter_uniform("delta", "delta"),
        )
        .parameter("delta", 0.01)
        .inlet("input"),
        ModuleContract::primitive(
            "mixer",
            ShaderSpec::new("mixer")
                .inlet_uniform("a", "leftTexture")
                .inlet_uniform("b", "rightTexture")
                .inlet_uniform("mix", "mixTexture")
                .parameter_uniform("mix", "mixAmount"),
        )
        .parameter("mix", 0.5)
        .inlet("a")
        .inlet("b")
        .inlet_with("mix", &["mix"]),
        ModuleContract::primitive(
            "scanlines",
            ShaderSpec::new("scanlines")
                .inlet_uniform("input", "inputTexture")
                .inlet_uniform("line count", "lineCountTexture")
                .parameter_uniform("line count", "lineCount"),
        )
        .parameter("line count", 0.5)
        .inlet("input")
        .inlet_with("line count", &["line count"]),
        ModuleContract::primitive(
            "rgbOffset",
            ShaderSpec::new("rgbOffset")
                .inlet_uniform("input", "inputTexture")
                .inlet_uniform("offset", "offsetTexture")
                .parameter_uniform("offset", "offset"),
        )
        .parameter("offset", 0.01)
        .inlet("input")
        .inlet_with("offset", &["offset"]),
        ModuleContract::primitive(
            "multiply",
            ShaderSpec::new("multiply")
                .inlet_uniform("a", "leftTexture")
                .inlet_uniform("b", "rightTexture"),
        )
        .inlet("a")
        .inlet("b"),
        // A phase accumulator feeding an oscillator's phase offset.
        ModuleContract::composite("autoOsc", 1, &["phaseDelta", "oscillator"])
            .parameter("speed", 0.01)
            .parameter("frequency", 0.05)
            .parameter("rotation", 0.0)
            .inlet_with("speed", &["speed"])
            .inlet_with("frequency", &["frequency"])
            .inlet_with("rotation", &["rotation"]),
    ]
}

impl ModuleCatalog {
    /// The catalog of built-in modules.
    ///
    /// # Panics
    ///
    /// Panics if a built-in contract is malformed. That can only happen
    /// through an edit to this file and is caught by the kit tests.
    pub fn builtin() -> Self {
        let mut catalog = ModuleCatalog::new();
        for contract in builtin_contracts() {
            let module_type = contract.module_type.clone();
            if let Err(err) = catalog.register(contract) {
                panic!("built-in module '{}' is malformed: {}", module_type, err);
            }
        }
        catalog
    }
}
