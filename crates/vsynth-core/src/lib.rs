pub mod id;
pub mod error;
pub mod module;
pub mod kit;
pub mod node;
pub mod routing;
pub mod document;
pub mod derive;
pub mod cache;
pub mod command;
pub mod history;
pub mod config;
pub mod session;
pub mod matrix;
pub mod demo;

// Re-export commonly used types
pub use id::{BusIndex, NodeKey, OutletIndex, UNBOUND};
pub use error::{ContractError, CoreError};
pub use module::{ModuleCatalog, ModuleContract, ModuleKind, ShaderSpec, SubgraphSpec};
pub use node::Node;
pub use routing::BusRouting;
pub use document::{Document, DEFAULT_BUS_COUNT};
pub use derive::{derive_edges, CyclePolicy, DerivedEdge, DerivedGraph};
pub use cache::DerivationCache;
pub use command::{apply, EditCommand};
pub use history::History;
pub use config::{ConfigError, SessionConfig};
pub use session::Session;
pub use demo::{demos, find_demo, Demo};
