//! The per-tick interaction rule.
//!
//! Each tick selects a focal agent and one of its neighbors, attempts a
//! similarity-biased copy, and then runs the variant's independent
//! sub-steps (drift for the vector variant, loss and innovation for the
//! tree variant). Every mutation is propagated to the active-link cache
//! for the edges touching the mutated agent only.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;

use crate::schema::{ConfigError, RuleConfig};

use super::cache::ActiveLinkCache;
use super::forest::TraitForest;
use super::population::Population;
use super::traits::{SetModel, TraitModel, TraitState, TreeModel, VectorModel};

/// The interaction rule of one run.
pub enum InteractionRule {
    /// Original Axelrod copying.
    Axelrod(VectorModel),
    /// Axelrod copying plus independent drift.
    AxelrodDrift(VectorModel),
    /// Extensible token sets.
    Extensible(SetModel),
    /// Tree-structured tokens with prerequisite learning, loss, and
    /// innovation.
    TreePrerequisite(TreeModel),
}

impl InteractionRule {
    /// Build the rule (and its trait model) named by the configuration.
    pub fn from_config(config: &RuleConfig) -> Result<Self, ConfigError> {
        match config {
            RuleConfig::Axelrod(p) => Ok(Self::Axelrod(VectorModel::new(p.clone()))),
            RuleConfig::AxelrodDrift(p) => Ok(Self::AxelrodDrift(VectorModel::new(p.clone()))),
            RuleConfig::Extensible(p) => Ok(Self::Extensible(SetModel::new(p.clone()))),
            RuleConfig::TreePrerequisite(p) => {
                let forest = Arc::new(TraitForest::from_params(p)?);
                Ok(Self::TreePrerequisite(TreeModel::new(p.clone(), forest)))
            }
        }
    }

    /// The trait representation this rule steps.
    pub fn model(&self) -> &dyn TraitModel {
        match self {
            Self::Axelrod(m) | Self::AxelrodDrift(m) => m,
            Self::Extensible(m) => m,
            Self::TreePrerequisite(m) => m,
        }
    }

    /// The trait universe, for tree-structured runs.
    pub fn forest(&self) -> Option<&TraitForest> {
        match self {
            Self::TreePrerequisite(m) => Some(m.forest()),
            _ => None,
        }
    }

    /// Whether this run can ever reach an absorbing state.
    pub fn can_absorb(&self) -> bool {
        match self {
            Self::TreePrerequisite(m) => !m.params().has_constant_perturbation(),
            Self::AxelrodDrift(m) => m.params().drift_rate == 0.0,
            _ => true,
        }
    }

    /// Advance the population by one tick.
    pub fn step(
        &self,
        population: &mut Population,
        cache: &mut ActiveLinkCache,
        rng: &mut StdRng,
        tick: u64,
    ) {
        let focal = population.random_agent(rng);
        self.interact(population, cache, rng, tick, focal);

        // Sub-steps below run every tick, regardless of whether the
        // focal/neighbor pairing was eligible or the copy fired.
        match self {
            Self::AxelrodDrift(model) => {
                if model.params().drift_rate > 0.0 && rng.r#gen::<f64>() < model.params().drift_rate
                {
                    let next = model.drift(population.traits(focal), rng);
                    population.set_traits(focal, next);
                    cache.refresh_agent(population, self.model(), focal);
                }
            }
            Self::TreePrerequisite(model) => {
                self.tree_substeps(model, population, cache, rng);
            }
            _ => {}
        }
    }

    /// The similarity-biased copy attempt between a focal agent and one
    /// of its neighbors.
    fn interact(
        &self,
        population: &mut Population,
        cache: &mut ActiveLinkCache,
        rng: &mut StdRng,
        tick: u64,
        focal: usize,
    ) {
        let Some(neighbor) = population.random_neighbor(focal, rng) else {
            return;
        };
        let model = self.model();

        let (agent_traits, neighbor_traits) = (population.traits(focal), population.traits(neighbor));
        if !model.eligible(agent_traits, neighbor_traits) {
            return;
        }

        let similarity = model.similarity(agent_traits, neighbor_traits);
        if rng.r#gen::<f64>() < similarity
            && let Some(next) = model.apply_copy(agent_traits, neighbor_traits, rng)
        {
            population.set_traits(focal, next);
            population.record_interaction(tick);
            cache.refresh_agent(population, model, focal);
        }
    }

    /// Population-level loss and innovation events for the tree variant.
    fn tree_substeps(
        &self,
        model: &TreeModel,
        population: &mut Population,
        cache: &mut ActiveLinkCache,
        rng: &mut StdRng,
    ) {
        let params = model.params();

        if params.loss_rate > 0.0 && rng.r#gen::<f64>() < params.loss_rate {
            let victim = population.random_agent(rng);
            if let TraitState::TokenSet(held) = population.traits(victim)
                && let Some(&lost) = held.iter().choose(rng)
            {
                // The lost token may be a prerequisite of another held
                // token; closure is deliberately not enforced.
                let mut next: BTreeSet<u32> = held.clone();
                next.remove(&lost);
                population.set_traits(victim, TraitState::TokenSet(next));
                cache.refresh_agent(population, model, victim);
            }
        }

        if params.innovation_rate > 0.0 && rng.r#gen::<f64>() < params.innovation_rate {
            let innovator = population.random_agent(rng);
            if let TraitState::TokenSet(held) = population.traits(innovator)
                && held.len() < model.forest().node_count()
            {
                // Rejection-sample a token the innovator does not hold yet;
                // terminates because the agent's set is not the universe.
                let mut token = model.forest().random_token(rng);
                while held.contains(&token) {
                    token = model.forest().random_token(rng);
                }
                let mut next = held.clone();
                next.extend(model.forest().token_with_ancestors(token));
                population.set_traits(innovator, TraitState::TokenSet(next));
                cache.refresh_agent(population, model, innovator);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::Topology;
    use crate::schema::{SetParams, TreeParams, VectorParams};
    use rand::SeedableRng;

    fn run_setup(rule: &RuleConfig, popsize: usize, seed: u64) -> (InteractionRule, Population, ActiveLinkCache, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let rule = InteractionRule::from_config(rule).unwrap();
        let topology = Topology::square_lattice(popsize, true).unwrap();
        let population = Population::new(topology, rule.model(), &mut rng);
        let cache = ActiveLinkCache::new(&population, rule.model());
        (rule, population, cache, rng)
    }

    #[test]
    fn stepping_keeps_cache_consistent() {
        let config = RuleConfig::Axelrod(VectorParams::default());
        let (rule, mut population, mut cache, mut rng) = run_setup(&config, 25, 5);

        for tick in 1..=2000 {
            rule.step(&mut population, &mut cache, &mut rng, tick);
        }
        assert!(cache.matches_brute_force(&population, rule.model()));
    }

    #[test]
    fn no_interaction_leaves_watermark_untouched() {
        let config = RuleConfig::Extensible(SetParams::default());
        let (rule, mut population, mut cache, mut rng) = run_setup(&config, 9, 7);

        // Make the population homogeneous: every pairing is ineligible.
        let uniform = population.traits(0).clone();
        for id in 0..population.len() {
            population.set_traits(id, uniform.clone());
        }
        cache.rebuild(&population, rule.model());

        for tick in 1..=500 {
            rule.step(&mut population, &mut cache, &mut rng, tick);
        }
        assert_eq!(population.interactions(), 0);
        assert_eq!(population.last_interaction(), 0);
        assert_eq!(cache.active_count(), 0);
    }

    #[test]
    fn innovation_fires_even_when_interaction_is_ineligible() {
        let config = RuleConfig::TreePrerequisite(TreeParams {
            num_trees: 2,
            branching_factor: 2,
            depth: 3,
            innovation_rate: 1.0,
            loss_rate: 0.0,
            ..Default::default()
        });
        let (rule, mut population, mut cache, mut rng) = run_setup(&config, 9, 13);

        // Homogeneous population: every pairing short-circuits as equal,
        // but the innovation sub-step must still run every tick.
        let uniform = TraitState::TokenSet([0u32].into_iter().collect());
        for id in 0..population.len() {
            population.set_traits(id, uniform.clone());
        }
        cache.rebuild(&population, rule.model());

        let before: usize = population.states().iter().map(|s| s.trait_count()).sum();
        for tick in 1..=50 {
            rule.step(&mut population, &mut cache, &mut rng, tick);
        }
        let after: usize = population.states().iter().map(|s| s.trait_count()).sum();
        assert!(after > before, "innovation never fired");
        assert!(cache.matches_brute_force(&population, rule.model()));
    }

    #[test]
    fn innovation_grants_a_token_the_agent_lacks() {
        let config = RuleConfig::TreePrerequisite(TreeParams {
            num_trees: 1,
            branching_factor: 2,
            depth: 1,
            innovation_rate: 1.0,
            loss_rate: 0.0,
            ..Default::default()
        });
        let (rule, mut population, mut cache, mut rng) = run_setup(&config, 4, 31);

        // Universe {0, 1, 2}; everyone holds {0, 1}, so the only possible
        // innovation is token 2.
        let partial = TraitState::TokenSet([0u32, 1].into_iter().collect());
        for id in 0..population.len() {
            population.set_traits(id, partial.clone());
        }
        cache.rebuild(&population, rule.model());

        rule.step(&mut population, &mut cache, &mut rng, 1);
        let full = TraitState::TokenSet([0u32, 1, 2].into_iter().collect());
        assert!(population.states().iter().any(|s| s == &full));

        // Saturated agents cannot innovate further; the sub-step no-ops
        // instead of looping.
        for id in 0..population.len() {
            population.set_traits(id, full.clone());
        }
        cache.rebuild(&population, rule.model());
        for tick in 2..=20 {
            rule.step(&mut population, &mut cache, &mut rng, tick);
        }
        assert!(population.states().iter().all(|s| s == &full));
    }

    #[test]
    fn loss_can_break_prerequisite_closure() {
        let config = RuleConfig::TreePrerequisite(TreeParams {
            num_trees: 1,
            branching_factor: 2,
            depth: 3,
            innovation_rate: 0.0,
            loss_rate: 1.0,
            ..Default::default()
        });
        let (rule, mut population, mut cache, mut rng) = run_setup(&config, 4, 19);

        let chain = TraitState::TokenSet([0u32, 1, 3, 7].into_iter().collect());
        for id in 0..population.len() {
            population.set_traits(id, chain.clone());
        }
        cache.rebuild(&population, rule.model());

        // Loss removes a uniformly chosen token, so sooner or later some
        // agent is left holding a token without its prerequisites.
        let forest = rule.forest().unwrap();
        let mut violated = false;
        for tick in 1..=200 {
            rule.step(&mut population, &mut cache, &mut rng, tick);
            violated |= population.states().iter().any(|state| {
                let TraitState::TokenSet(held) = state else {
                    return false;
                };
                held.iter().any(|&t| !forest.has_prerequisites(t, held))
            });
            if violated {
                break;
            }
        }
        assert!(violated, "expected a prerequisite-closure violation");
    }

    #[test]
    fn drift_perturbs_without_recording_interactions() {
        let config = RuleConfig::AxelrodDrift(VectorParams {
            features: 4,
            traits_per_feature: 10,
            drift_rate: 1.0,
        });
        let (rule, mut population, mut cache, mut rng) = run_setup(&config, 9, 23);

        // Homogeneous start: the copy branch can never fire, so any
        // change comes from drift alone.
        let uniform = TraitState::Vector(vec![0, 0, 0, 0]);
        for id in 0..population.len() {
            population.set_traits(id, uniform.clone());
        }
        cache.rebuild(&population, rule.model());

        for tick in 1..=20 {
            rule.step(&mut population, &mut cache, &mut rng, tick);
        }
        let drifted = population
            .states()
            .iter()
            .any(|s| s != &TraitState::Vector(vec![0, 0, 0, 0]));
        assert!(drifted);
        assert!(cache.matches_brute_force(&population, rule.model()));
    }
}
