//! Module contracts and the module catalog.
//!
//! A [`ModuleContract`] is the declared interface of a processing unit: its
//! parameters with defaults, its inlets with the parameters each inlet stands
//! in for, and how many outlets it exposes. The [`ModuleCatalog`] is the
//! read-only registry every other component consults to validate keys and to
//! instantiate nodes.
//!
//! Contracts are checked once, at registration. A contract that fails the
//! check is a programming error in the module author's code; documents never
//! see it.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{ContractError, CoreError};
use crate::id::OutletIndex;

/// Payload of a primitive (single shader pass) module.
///
/// The core never looks inside `program`; a renderer resolves it to a
/// compiled kernel and uses the uniform maps to bind inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderSpec {
    /// Identifier of the shader program the renderer should run.
    pub program: String,
    /// Inlet key -> sampler uniform receiving that inlet's texture.
    pub inlet_uniforms: IndexMap<String, String>,
    /// Parameter key -> uniform receiving that parameter's value.
    pub parameter_uniforms: IndexMap<String, String>,
}

impl ShaderSpec {
    pub fn new(program: impl Into<String>) -> Self {
        ShaderSpec {
            program: program.into(),
            inlet_uniforms: IndexMap::new(),
            parameter_uniforms: IndexMap::new(),
        }
    }

    pub fn inlet_uniform(mut self, inlet: &str, uniform: &str) -> Self {
        self.inlet_uniforms.insert(inlet.to_string(), uniform.to_string());
        self
    }

    pub fn parameter_uniform(mut self, parameter: &str, uniform: &str) -> Self {
        self.parameter_uniforms
            .insert(parameter.to_string(), uniform.to_string());
        self
    }
}

/// Payload of a composite module built from an internal subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphSpec {
    /// Number of independently bindable outlets.
    pub outlet_arity: OutletIndex,
    /// Module types of the internal subgraph, in evaluation order.
    pub members: Vec<String>,
}

/// How a module is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleKind {
    /// A single shader pass with exactly one outlet.
    Primitive(ShaderSpec),
    /// A nested subgraph that may expose several outlets.
    Composite(SubgraphSpec),
}

/// The declared interface of a module type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleContract {
    pub module_type: String,
    /// Parameter keys in display order.
    pub parameter_keys: Vec<String>,
    pub parameter_defaults: IndexMap<String, f64>,
    /// Inlet keys in display order.
    pub inlet_keys: Vec<String>,
    /// Parameters a UI should expose while the inlet is unbound.
    pub associated_parameters: IndexMap<String, IndexSet<String>>,
    #[serde(flatten)]
    pub kind: ModuleKind,
}

impl ModuleContract {
    /// Starts a primitive contract with no parameters or inlets.
    pub fn primitive(module_type: &str, shader: ShaderSpec) -> Self {
        Self::with_kind(module_type, ModuleKind::Primitive(shader))
    }

    /// Starts a composite contract with no parameters or inlets.
    pub fn composite(module_type: &str, outlet_arity: OutletIndex, members: &[&str]) -> Self {
        Self::with_kind(
            module_type,
            ModuleKind::Composite(SubgraphSpec {
                outlet_arity,
                members: members.iter().map(|m| m.to_string()).collect(),
            }),
        )
    }

    fn with_kind(module_type: &str, kind: ModuleKind) -> Self {
        ModuleContract {
            module_type: module_type.to_string(),
            parameter_keys: Vec::new(),
            parameter_defaults: IndexMap::new(),
            inlet_keys: Vec::new(),
            associated_parameters: IndexMap::new(),
            kind,
        }
    }

    /// Declares a parameter with its default value.
    pub fn parameter(mut self, key: &str, default: f64) -> Self {
        self.parameter_keys.push(key.to_string());
        self.parameter_defaults.insert(key.to_string(), default);
        self
    }

    /// Declares an inlet with no associated parameters.
    pub fn inlet(self, key: &str) -> Self {
        self.inlet_with(key, &[])
    }

    /// Declares an inlet and the parameters it stands in for.
    pub fn inlet_with(mut self, key: &str, associated: &[&str]) -> Self {
        self.inlet_keys.push(key.to_string());
        if !associated.is_empty() {
            self.associated_parameters.insert(
                key.to_string(),
                associated.iter().map(|p| p.to_string()).collect(),
            );
        }
        self
    }

    /// Number of outlets. Always 1 for primitive modules.
    pub fn outlet_arity(&self) -> OutletIndex {
        match &self.kind {
            ModuleKind::Primitive(_) => 1,
            ModuleKind::Composite(spec) => spec.outlet_arity,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ModuleKind::Primitive(_))
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameter_defaults.contains_key(key)
    }

    pub fn has_inlet(&self, key: &str) -> bool {
        self.inlet_keys.iter().any(|k| k == key)
    }

    pub fn has_outlet(&self, outlet: OutletIndex) -> bool {
        outlet < self.outlet_arity()
    }

    /// Parameters associated with `inlet`, empty if none are declared.
    pub fn associated_parameters(&self, inlet: &str) -> impl Iterator<Item = &str> {
        self.associated_parameters
            .get(inlet)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Default parameter values in declaration order.
    pub fn default_parameters(&self) -> IndexMap<String, f64> {
        self.parameter_keys
            .iter()
            .filter_map(|k| self.parameter_defaults.get(k).map(|v| (k.clone(), *v)))
            .collect()
    }

    /// Checks the structural shape of the contract.
    pub fn validate(&self) -> Result<(), ContractError> {
        let module_type = &self.module_type;
        let undeclared = |key: &str| ContractError::UndeclaredKey {
            module_type: module_type.clone(),
            key: key.to_string(),
        };

        if self.outlet_arity() == 0 {
            return Err(ContractError::NoOutlets {
                module_type: module_type.clone(),
            });
        }

        let mut seen = IndexSet::new();
        for key in &self.parameter_keys {
            if !seen.insert(key.as_str()) {
                return Err(ContractError::DuplicateKey {
                    module_type: module_type.clone(),
                    key: key.clone(),
                });
            }
            match self.parameter_defaults.get(key) {
                None => {
                    return Err(ContractError::MissingDefault {
                        module_type: module_type.clone(),
                        parameter: key.clone(),
                    })
                }
                Some(v) if !v.is_finite() => {
                    return Err(ContractError::InvalidDefault {
                        module_type: module_type.clone(),
                        parameter: key.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = self
            .parameter_defaults
            .keys()
            .find(|k| !seen.contains(k.as_str()))
        {
            return Err(undeclared(extra));
        }

        let mut inlets = IndexSet::new();
        for key in &self.inlet_keys {
            if !inlets.insert(key.as_str()) {
                return Err(ContractError::DuplicateKey {
                    module_type: module_type.clone(),
                    key: key.clone(),
                });
            }
        }

        for (inlet, params) in &self.associated_parameters {
            if !inlets.contains(inlet.as_str()) {
                return Err(undeclared(inlet));
            }
            if let Some(p) = params.iter().find(|p| !self.has_parameter(p)) {
                return Err(undeclared(p));
            }
        }

        if let ModuleKind::Primitive(shader) = &self.kind {
            if let Some(inlet) = shader
                .inlet_uniforms
                .keys()
                .find(|k| !inlets.contains(k.as_str()))
            {
                return Err(undeclared(inlet));
            }
            if let Some(p) = shader
                .parameter_uniforms
                .keys()
                .find(|k| !self.has_parameter(k))
            {
                return Err(undeclared(p));
            }
        }

        Ok(())
    }
}

/// Registry of module contracts keyed by module type.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: IndexMap<String, ModuleContract>,
}

impl ModuleCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a contract after checking its shape.
    pub fn register(&mut self, contract: ModuleContract) -> Result<(), ContractError> {
        if self.modules.contains_key(&contract.module_type) {
            return Err(ContractError::DuplicateModuleType {
                module_type: contract.module_type,
            });
        }
        contract.validate()?;
        self.modules.insert(contract.module_type.clone(), contract);
        Ok(())
    }

    /// Looks up the contract for `module_type`.
    pub fn lookup(&self, module_type: &str) -> Result<&ModuleContract, CoreError> {
        self.modules
            .get(module_type)
            .ok_or_else(|| CoreError::UnknownModuleType {
                module_type: module_type.to_string(),
            })
    }

    /// Registered module types in registration order.
    pub fn module_types(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleContract> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
