//! Final-state measurements taken when a run stops.
//!
//! Nothing here runs inside the tick loop; every function is a full pass
//! over the finished population.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::forest::{TraitForest, TraitSubgraph};
use super::population::Population;
use super::traits::{TraitModel, TraitState};

/// One distinct culture and how many agents carry it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CultureCount {
    /// Stable hash of the packed trait state.
    pub culture_id: u64,
    /// Number of agents holding exactly this state.
    pub count: usize,
}

fn culture_id(state: &TraitState) -> u64 {
    let mut hasher = DefaultHasher::new();
    state.hash(&mut hasher);
    hasher.finish()
}

/// Distinct trait states in the population, largest culture first.
/// Ties break on culture id so the ordering is reproducible.
pub fn culture_counts(population: &Population) -> Vec<CultureCount> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for state in population.states() {
        *counts.entry(culture_id(state)).or_default() += 1;
    }
    let mut cultures: Vec<CultureCount> = counts
        .into_iter()
        .map(|(culture_id, count)| CultureCount { culture_id, count })
        .collect();
    cultures.sort_by(|a, b| b.count.cmp(&a.count).then(a.culture_id.cmp(&b.culture_id)));
    cultures
}

/// One representative trait state per culture, for export collaborators.
pub fn representative_cultures(population: &Population) -> HashMap<u64, TraitState> {
    let mut representatives = HashMap::new();
    for state in population.states() {
        representatives
            .entry(culture_id(state))
            .or_insert_with(|| state.clone());
    }
    representatives
}

/// Normalized order parameter over the population's links.
///
/// `2 / (z * N) * sum over edges of (1 - similarity)`: zero for a fully
/// homogeneous population, approaching one as neighbors share nothing.
pub fn klemm_normalized_l(population: &Population, model: &dyn TraitModel) -> f64 {
    let n = population.len();
    if n == 0 {
        return 0.0;
    }
    let dissimilarity: f64 = population
        .topology()
        .edges()
        .iter()
        .map(|&(a, b)| 1.0 - model.similarity(population.traits(a), population.traits(b)))
        .sum();
    let z = population.topology().coordination_number();
    2.0 * dissimilarity / (z * n) as f64
}

/// Mean and standard deviation of per-agent trait counts.
///
/// Fixed for the vector variant by construction; informative for the
/// extensible and tree variants, where set sizes wander.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TraitCountStats {
    pub mean: f64,
    pub sd: f64,
}

pub fn trait_count_stats(population: &Population) -> TraitCountStats {
    let n = population.len();
    if n == 0 {
        return TraitCountStats::default();
    }
    let counts: Vec<f64> = population
        .states()
        .iter()
        .map(|s| s.trait_count() as f64)
        .collect();
    let mean = counts.iter().sum::<f64>() / n as f64;
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n as f64;
    TraitCountStats {
        mean,
        sd: variance.sqrt(),
    }
}

/// Per-culture connected fragments of the trait forest, keyed by culture.
/// Tree-structured runs only; the caller supplies the run's forest.
pub fn culture_subgraphs(
    population: &Population,
    forest: &TraitForest,
) -> HashMap<u64, Vec<TraitSubgraph>> {
    representative_cultures(population)
        .into_iter()
        .filter_map(|(id, state)| match state {
            TraitState::TokenSet(tokens) => Some((id, forest.induced_subgraphs(&tokens))),
            TraitState::Vector(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::Topology;
    use crate::model::traits::VectorModel;
    use crate::schema::VectorParams;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn uniform_population(state: TraitState) -> Population {
        let mut rng = StdRng::seed_from_u64(3);
        let topology = Topology::square_lattice(25, true).unwrap();
        let model = VectorModel::new(VectorParams::default());
        let mut population = Population::new(topology, &model, &mut rng);
        for id in 0..population.len() {
            population.set_traits(id, state.clone());
        }
        population
    }

    #[test]
    fn homogeneous_population_is_one_culture_with_zero_order_parameter() {
        let population = uniform_population(TraitState::Vector(vec![1, 2, 3, 0]));
        let model = VectorModel::new(VectorParams::default());

        let cultures = culture_counts(&population);
        assert_eq!(cultures.len(), 1);
        assert_eq!(cultures[0].count, 25);
        assert_eq!(klemm_normalized_l(&population, &model), 0.0);
    }

    #[test]
    fn culture_counts_sum_to_population_size() {
        let mut rng = StdRng::seed_from_u64(9);
        let topology = Topology::square_lattice(25, true).unwrap();
        let model = VectorModel::new(VectorParams::default());
        let population = Population::new(topology, &model, &mut rng);

        let cultures = culture_counts(&population);
        let total: usize = cultures.iter().map(|c| c.count).sum();
        assert_eq!(total, 25);
        // Largest culture first.
        assert!(cultures.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn representatives_cover_every_culture() {
        let mut rng = StdRng::seed_from_u64(9);
        let topology = Topology::square_lattice(16, true).unwrap();
        let model = VectorModel::new(VectorParams::default());
        let population = Population::new(topology, &model, &mut rng);

        let cultures = culture_counts(&population);
        let representatives = representative_cultures(&population);
        assert_eq!(representatives.len(), cultures.len());
        for culture in &cultures {
            assert!(representatives.contains_key(&culture.culture_id));
        }
    }

    #[test]
    fn order_parameter_is_maximal_when_no_neighbors_agree() {
        let mut population = uniform_population(TraitState::Vector(vec![0, 0, 0, 0]));
        // Checkerboard on the 5x5 torus is impossible, so hand every agent
        // a distinct token instead; all similarities are zero.
        for id in 0..population.len() {
            population.set_traits(id, TraitState::Vector(vec![id as u32; 4]));
        }
        let model = VectorModel::new(VectorParams {
            features: 4,
            traits_per_feature: 32,
            drift_rate: 0.0,
        });
        // 50 edges, z = 4, N = 25: 2 * 50 / 100 = 1.
        assert_eq!(klemm_normalized_l(&population, &model), 1.0);
    }

    #[test]
    fn trait_count_stats_for_fixed_vectors() {
        let population = uniform_population(TraitState::Vector(vec![1, 2, 3, 0]));
        let stats = trait_count_stats(&population);
        assert_eq!(stats.mean, 4.0);
        assert_eq!(stats.sd, 0.0);
    }

    #[test]
    fn culture_subgraphs_split_per_culture() {
        let forest = TraitForest::balanced(1, 3, 4).unwrap();
        let mut population =
            uniform_population(TraitState::TokenSet([0u32, 3].into_iter().collect()));
        population.set_traits(0, TraitState::TokenSet([0u32, 3, 120].into_iter().collect()));

        let subgraphs = culture_subgraphs(&population, &forest);
        assert_eq!(subgraphs.len(), 2);
        let orphaned = subgraphs
            .values()
            .find(|fragments| fragments.len() == 2)
            .expect("one culture holds a disconnected fragment");
        assert!(orphaned.iter().any(|f| f.tokens == vec![120]));
    }
}
