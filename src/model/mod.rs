//! The simulation model: topology, trait representations, and the tick
//! loop's moving parts.

pub mod analysis;
pub mod cache;
pub mod forest;
pub mod graph;
pub mod population;
pub mod rule;
pub mod traits;

pub use cache::{ActiveLinkCache, ConvergenceDetector};
pub use forest::{TraitForest, TraitSubgraph, balanced_tree_node_count};
pub use graph::Topology;
pub use population::Population;
pub use rule::InteractionRule;
pub use traits::{SetModel, TraitModel, TraitState, TreeModel, VectorModel};
