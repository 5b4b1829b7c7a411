//! Population state: topology plus per-agent traits.

use rand::rngs::StdRng;

use super::graph::Topology;
use super::traits::{TraitModel, TraitState};

/// The agent population of one run.
///
/// Owns every agent's trait state exclusively; all mutation goes through
/// [`set_traits`](Population::set_traits). The topology never changes
/// after construction.
#[derive(Debug)]
pub struct Population {
    topology: Topology,
    traits: Vec<TraitState>,
    interactions: u64,
    last_interaction: u64,
}

impl Population {
    /// Build a population with traits drawn from the given model.
    pub fn new(topology: Topology, model: &dyn TraitModel, rng: &mut StdRng) -> Self {
        let traits = (0..topology.node_count())
            .map(|_| model.initial_state(rng))
            .collect();
        Self {
            topology,
            traits,
            interactions: 0,
            last_interaction: 0,
        }
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    /// The underlying graph.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Trait state of one agent.
    pub fn traits(&self, id: usize) -> &TraitState {
        &self.traits[id]
    }

    /// Trait states of all agents, indexed by agent id.
    pub fn states(&self) -> &[TraitState] {
        &self.traits
    }

    /// Replace one agent's traits. Visible to all subsequent reads.
    pub fn set_traits(&mut self, id: usize, state: TraitState) {
        self.traits[id] = state;
    }

    /// Uniformly random agent id.
    pub fn random_agent(&self, rng: &mut StdRng) -> usize {
        self.topology.random_node(rng)
    }

    /// Uniformly random neighbor of an agent.
    pub fn random_neighbor(&self, id: usize, rng: &mut StdRng) -> Option<usize> {
        self.topology.random_neighbor(id, rng)
    }

    /// Record a successful interaction at the given tick.
    pub fn record_interaction(&mut self, tick: u64) {
        self.interactions += 1;
        self.last_interaction = tick;
    }

    /// Total successful interactions so far.
    pub fn interactions(&self) -> u64 {
        self.interactions
    }

    /// Tick of the most recent successful interaction.
    pub fn last_interaction(&self) -> u64 {
        self.last_interaction
    }
}
