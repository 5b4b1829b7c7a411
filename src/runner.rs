//! Single-run execution: build, step to absorption or the cutoff, measure.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::model::analysis::{
    self, CultureCount, TraitCountStats, culture_counts, klemm_normalized_l, trait_count_stats,
};
use crate::model::cache::{ActiveLinkCache, ConvergenceDetector};
use crate::model::forest::TraitSubgraph;
use crate::model::graph::Topology;
use crate::model::population::Population;
use crate::model::rule::InteractionRule;
use crate::schema::{ConfigError, RuleConfig, RunConfig};

const PROGRESS_INTERVAL: u64 = 250_000;

/// Final measurements of one finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    /// Interaction rule and its full parameter block, so stored outcomes
    /// carry the representation-specific rates alongside the results.
    pub rule: RuleConfig,
    pub popsize: usize,
    /// Whether the run reached an absorbing state before the cutoff.
    pub converged: bool,
    /// Tick of the last successful interaction for converged runs, i.e.
    /// when the population actually froze; zero for non-converged runs.
    pub convergence_tick: u64,
    /// Tick at which the final state was sampled.
    pub sample_tick: u64,
    /// Successful interactions over the run.
    pub interactions: u64,
    /// Distinct cultures, largest first.
    pub cultures: Vec<CultureCount>,
    /// Normalized order parameter of the final state.
    pub order_parameter: f64,
    /// Mean and sd of per-agent trait counts.
    pub trait_counts: TraitCountStats,
    /// Per-culture fragments of the trait forest (tree-structured runs).
    pub culture_subgraphs: Option<HashMap<u64, Vec<TraitSubgraph>>>,
}

/// External persistence collaborator handed each finished run.
///
/// Implementations may block; the scheduler calls `store` from worker
/// threads, so the sink must be shareable.
pub trait RunSink: Send + Sync {
    fn store(&self, outcome: &RunOutcome);
}

/// Collects outcomes in memory, mostly for tests and small sweeps.
#[derive(Debug, Default)]
pub struct MemorySink {
    outcomes: Mutex<Vec<RunOutcome>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the collected outcomes.
    pub fn take(&self) -> Vec<RunOutcome> {
        std::mem::take(&mut self.outcomes.lock().unwrap())
    }
}

impl RunSink for MemorySink {
    fn store(&self, outcome: &RunOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

/// Writes each outcome as one JSON line on stdout.
#[derive(Debug, Default)]
pub struct JsonLinesSink;

impl RunSink for JsonLinesSink {
    fn store(&self, outcome: &RunOutcome) {
        match serde_json::to_string(outcome) {
            Ok(line) => println!("{line}"),
            Err(err) => log::error!("failed to serialize outcome {}: {err}", outcome.run_id),
        }
    }
}

/// Execute a single run to absorption or the step cutoff.
pub fn run(config: &RunConfig) -> Result<RunOutcome, ConfigError> {
    config.validate()?;

    let mut rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let rule = InteractionRule::from_config(&config.rule)?;
    let topology = Topology::build(&config.topology, config.popsize, &mut rng)?;
    let detector = ConvergenceDetector::new(topology.edge_count());
    let mut population = Population::new(topology, rule.model(), &mut rng);
    let mut cache = ActiveLinkCache::new(&population, rule.model());

    info!(
        "{}: starting, rule={} popsize={} edges={}",
        config.run_id,
        config.rule.name(),
        config.popsize,
        population.topology().edge_count()
    );

    let mut tick = 0u64;
    let mut converged = false;
    while tick < config.max_ticks {
        tick += 1;
        rule.step(&mut population, &mut cache, &mut rng, tick);

        if tick % PROGRESS_INTERVAL == 0 {
            debug!(
                "{}: tick={} interactions={} active={:.4}",
                config.run_id,
                tick,
                population.interactions(),
                cache.fraction_active()
            );
            debug_assert!(cache.matches_brute_force(&population, rule.model()));
        }

        if rule.can_absorb() && detector.absorbed(tick, population.last_interaction(), &cache) {
            converged = true;
            break;
        }
    }

    let outcome = finalize(config, &rule, &population, tick, converged);
    info!(
        "{}: {} at tick {} with {} cultures",
        config.run_id,
        if converged { "converged" } else { "cut off" },
        tick,
        outcome.cultures.len()
    );
    Ok(outcome)
}

fn finalize(
    config: &RunConfig,
    rule: &InteractionRule,
    population: &Population,
    tick: u64,
    converged: bool,
) -> RunOutcome {
    RunOutcome {
        run_id: config.run_id.clone(),
        rule: config.rule.clone(),
        popsize: config.popsize,
        converged,
        convergence_tick: if converged { population.last_interaction() } else { 0 },
        sample_tick: tick,
        interactions: population.interactions(),
        cultures: culture_counts(population),
        order_parameter: klemm_normalized_l(population, rule.model()),
        trait_counts: trait_count_stats(population),
        culture_subgraphs: rule
            .forest()
            .map(|forest| analysis::culture_subgraphs(population, forest)),
    }
}
