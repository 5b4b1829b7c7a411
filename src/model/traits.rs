//! Trait representation strategies.
//!
//! A strategy knows how to initialize an agent's traits, measure the
//! similarity between two agents, decide whether an interaction is even
//! worth attempting, and produce the focal agent's new traits when a copy
//! fires. The interaction rule is generic over this interface.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};

use crate::schema::{SetParams, TreeParams, VectorParams};

use super::forest::TraitForest;

/// Trait state carried by one agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TraitState {
    /// Fixed-length categorical vector; position = feature.
    Vector(Vec<u32>),
    /// Unordered token set (extensible and tree-structured variants).
    TokenSet(BTreeSet<u32>),
}

impl TraitState {
    /// Number of traits the agent holds.
    pub fn trait_count(&self) -> usize {
        match self {
            Self::Vector(v) => v.len(),
            Self::TokenSet(s) => s.len(),
        }
    }

    fn as_vector(&self) -> &[u32] {
        match self {
            Self::Vector(v) => v,
            Self::TokenSet(_) => unreachable!("vector strategy applied to token-set traits"),
        }
    }

    fn as_token_set(&self) -> &BTreeSet<u32> {
        match self {
            Self::TokenSet(s) => s,
            Self::Vector(_) => unreachable!("set strategy applied to vector traits"),
        }
    }
}

/// A pluggable trait representation.
///
/// `similarity` must be symmetric and lie in `[0, 1]`. `apply_copy` never
/// mutates in place; it returns the focal agent's replacement state, or
/// `None` when the attempt fizzles (e.g. a missing prerequisite).
pub trait TraitModel {
    /// Random initial trait state for one agent.
    fn initial_state(&self, rng: &mut StdRng) -> TraitState;

    /// Normalized overlap between two agents' traits.
    fn similarity(&self, a: &TraitState, b: &TraitState) -> f64;

    /// Whether an interaction between the two states can change anything.
    fn eligible(&self, agent: &TraitState, neighbor: &TraitState) -> bool;

    /// The focal agent's state after copying from `neighbor`.
    fn apply_copy(
        &self,
        agent: &TraitState,
        neighbor: &TraitState,
        rng: &mut StdRng,
    ) -> Option<TraitState>;
}

/// Original Axelrod representation: `features` positions, each holding one
/// of `traits_per_feature` tokens.
#[derive(Debug, Clone)]
pub struct VectorModel {
    params: VectorParams,
}

impl VectorModel {
    pub fn new(params: VectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VectorParams {
        &self.params
    }

    fn differing_positions(a: &[u32], b: &[u32]) -> Vec<usize> {
        a.iter()
            .zip(b)
            .enumerate()
            .filter(|(_, (x, y))| x != y)
            .map(|(i, _)| i)
            .collect()
    }

    /// Drift perturbation: resample one random position to a uniform token.
    pub fn drift(&self, agent: &TraitState, rng: &mut StdRng) -> TraitState {
        let mut v = agent.as_vector().to_vec();
        let position = rng.gen_range(0..v.len());
        v[position] = rng.gen_range(0..self.params.traits_per_feature);
        TraitState::Vector(v)
    }
}

impl TraitModel for VectorModel {
    fn initial_state(&self, rng: &mut StdRng) -> TraitState {
        let v = (0..self.params.features)
            .map(|_| rng.gen_range(0..self.params.traits_per_feature))
            .collect();
        TraitState::Vector(v)
    }

    fn similarity(&self, a: &TraitState, b: &TraitState) -> f64 {
        let (a, b) = (a.as_vector(), b.as_vector());
        let equal = a.iter().zip(b).filter(|(x, y)| x == y).count();
        equal as f64 / a.len() as f64
    }

    fn eligible(&self, agent: &TraitState, neighbor: &TraitState) -> bool {
        // Identical pairs would interact with probability one but change
        // nothing; fully distinct pairs interact with probability zero.
        let differing = Self::differing_positions(agent.as_vector(), neighbor.as_vector());
        !differing.is_empty() && differing.len() < agent.as_vector().len()
    }

    fn apply_copy(
        &self,
        agent: &TraitState,
        neighbor: &TraitState,
        rng: &mut StdRng,
    ) -> Option<TraitState> {
        let (a, b) = (agent.as_vector(), neighbor.as_vector());
        let differing = Self::differing_positions(a, b);
        let &position = differing.choose(rng)?;

        let mut next = a.to_vec();
        next[position] = b[position];
        Some(TraitState::Vector(next))
    }
}

/// Extensible representation: a single multi-occupancy locus holding an
/// unordered set of integer tokens.
#[derive(Debug, Clone)]
pub struct SetModel {
    params: SetParams,
}

impl SetModel {
    pub fn new(params: SetParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SetParams {
        &self.params
    }
}

fn jaccard(a: &BTreeSet<u32>, b: &BTreeSet<u32>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        // Two empty sets are identical.
        return 1.0;
    }
    intersection as f64 / union as f64
}

fn set_pair_eligible(agent: &BTreeSet<u32>, neighbor: &BTreeSet<u32>) -> bool {
    // Nothing changes when the sets are equal, nothing can transmit when
    // they are disjoint, and there is nothing new to learn when the
    // neighbor's set is a subset of the agent's.
    !(agent == neighbor || agent.is_disjoint(neighbor) || neighbor.is_subset(agent))
}

impl TraitModel for SetModel {
    fn initial_state(&self, rng: &mut StdRng) -> TraitState {
        let draws = rng.gen_range(1..=self.params.max_initial_traits);
        let set = (0..draws)
            .map(|_| rng.gen_range(0..self.params.max_trait_value))
            .collect();
        TraitState::TokenSet(set)
    }

    fn similarity(&self, a: &TraitState, b: &TraitState) -> f64 {
        jaccard(a.as_token_set(), b.as_token_set())
    }

    fn eligible(&self, agent: &TraitState, neighbor: &TraitState) -> bool {
        set_pair_eligible(agent.as_token_set(), neighbor.as_token_set())
    }

    fn apply_copy(
        &self,
        agent: &TraitState,
        neighbor: &TraitState,
        rng: &mut StdRng,
    ) -> Option<TraitState> {
        let (a, b) = (agent.as_token_set(), neighbor.as_token_set());
        let learned = *b.difference(a).choose(rng)?;

        let mut next = a.clone();
        if rng.r#gen::<f64>() >= self.params.add_rate {
            // Replace a random existing token instead of growing the set.
            if let Some(&discarded) = a.iter().choose(rng) {
                next.remove(&discarded);
            }
        }
        next.insert(learned);
        Some(TraitState::TokenSet(next))
    }
}

/// Tree-structured representation: tokens are forest nodes and adoption is
/// gated on holding the token's full ancestor chain.
#[derive(Debug, Clone)]
pub struct TreeModel {
    params: TreeParams,
    forest: Arc<TraitForest>,
}

impl TreeModel {
    pub fn new(params: TreeParams, forest: Arc<TraitForest>) -> Self {
        Self { params, forest }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn forest(&self) -> &TraitForest {
        &self.forest
    }
}

impl TraitModel for TreeModel {
    fn initial_state(&self, rng: &mut StdRng) -> TraitState {
        let chains = rng.gen_range(1..=self.params.max_initial_traits);
        let mut set = BTreeSet::new();
        for _ in 0..chains {
            set.extend(self.forest.random_token_with_ancestors(rng));
        }
        TraitState::TokenSet(set)
    }

    fn similarity(&self, a: &TraitState, b: &TraitState) -> f64 {
        jaccard(a.as_token_set(), b.as_token_set())
    }

    fn eligible(&self, agent: &TraitState, neighbor: &TraitState) -> bool {
        set_pair_eligible(agent.as_token_set(), neighbor.as_token_set())
    }

    fn apply_copy(
        &self,
        agent: &TraitState,
        neighbor: &TraitState,
        rng: &mut StdRng,
    ) -> Option<TraitState> {
        let (a, b) = (agent.as_token_set(), neighbor.as_token_set());
        let desired = *b.difference(a).choose(rng)?;

        if self.forest.has_prerequisites(desired, a) {
            let mut next = a.clone();
            if rng.r#gen::<f64>() >= self.params.add_rate {
                if let Some(&discarded) = a.iter().choose(rng) {
                    next.remove(&discarded);
                }
            }
            next.insert(desired);
            return Some(TraitState::TokenSet(next));
        }

        // Missing prerequisites: with the learning rate, make partial
        // progress by adopting the deepest ancestor still missing.
        if rng.r#gen::<f64>() < self.params.learning_rate
            && let Some(ancestor) = self.forest.deepest_missing_ancestor(desired, a)
        {
            let mut next = a.clone();
            next.insert(ancestor);
            return Some(TraitState::TokenSet(next));
        }

        None
    }
}
