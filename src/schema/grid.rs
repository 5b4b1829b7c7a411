//! Parameter-sweep definition and enumeration.
//!
//! A sweep is the Cartesian product of per-parameter value lists crossed
//! with a replication count. Every run configuration is materialized and
//! validated up front, so malformed grids abort before any worker starts.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config::{ConfigError, RuleConfig, RunConfig, TopologyConfig};

/// Errors loading a sweep definition from disk.
#[derive(Debug, thiserror::Error)]
pub enum SweepFileError {
    #[error("failed to read sweep file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse sweep file: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_replications() -> usize {
    10
}

fn default_parallelism() -> usize {
    4
}

/// Definition of a parameter sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Population sizes studied.
    pub population_sizes: Vec<usize>,
    /// Population structure shared by all runs.
    pub topology: TopologyConfig,
    /// Base rule configuration; swept axes override its fields.
    pub rule: RuleConfig,
    /// Value lists for rule-specific parameters. Empty axes fall back to
    /// the base rule's value.
    #[serde(default)]
    pub axes: SweepAxes,
    /// Replicate runs per parameter combination.
    #[serde(default = "default_replications")]
    pub replications: usize,
    /// Worker pool size.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Step cutoff applied to every run.
    #[serde(default)]
    pub max_ticks: Option<u64>,
    /// Base RNG seed; run k is seeded with `base + k` when present.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            population_sizes: vec![100],
            topology: TopologyConfig::default(),
            rule: RuleConfig::default(),
            axes: SweepAxes::default(),
            replications: default_replications(),
            parallelism: default_parallelism(),
            max_ticks: None,
            rng_seed: None,
        }
    }
}

/// Value lists for swept rule parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepAxes {
    #[serde(default)]
    pub features: Vec<usize>,
    #[serde(default)]
    pub traits_per_feature: Vec<u32>,
    #[serde(default)]
    pub drift_rates: Vec<f64>,
    #[serde(default)]
    pub add_rates: Vec<f64>,
    #[serde(default)]
    pub max_initial_traits: Vec<usize>,
    #[serde(default)]
    pub num_trees: Vec<usize>,
    #[serde(default)]
    pub branching_factors: Vec<usize>,
    #[serde(default)]
    pub depths: Vec<usize>,
    #[serde(default)]
    pub learning_rates: Vec<f64>,
    #[serde(default)]
    pub loss_rates: Vec<f64>,
    #[serde(default)]
    pub innovation_rates: Vec<f64>,
}

impl SweepConfig {
    /// Load a sweep definition from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SweepFileError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Materialize every run configuration in the sweep.
    ///
    /// The result has exactly `|combinations| * replications` entries,
    /// each with a distinct `run_id`, and every entry has passed
    /// [`RunConfig::validate`]. Any error aborts the whole sweep.
    pub fn enumerate(&self) -> Result<Vec<RunConfig>, ConfigError> {
        if self.population_sizes.is_empty() {
            return Err(ConfigError::EmptySweepAxis("population_sizes"));
        }
        if self.replications == 0 {
            return Err(ConfigError::ZeroReplications);
        }
        // rayon treats 0 as "all cores"; an explicit zero is a mistake.
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        self.reject_unused_axes()?;

        let rule_combos = self.rule_combinations();
        let mut runs =
            Vec::with_capacity(self.population_sizes.len() * rule_combos.len() * self.replications);

        let mut combo_index = 0usize;
        for &popsize in &self.population_sizes {
            for rule in &rule_combos {
                for replicate in 0..self.replications {
                    let run_index = runs.len() as u64;
                    let config = RunConfig {
                        run_id: format!("run-{combo_index:05}-{replicate:02}"),
                        popsize,
                        topology: self.topology.clone(),
                        rule: rule.clone(),
                        max_ticks: self.max_ticks.unwrap_or(RunConfig::default().max_ticks),
                        rng_seed: self.rng_seed.map(|base| base.wrapping_add(run_index)),
                    };
                    config.validate()?;
                    runs.push(config);
                }
                combo_index += 1;
            }
        }

        Ok(runs)
    }

    /// Cartesian product of the axes that apply to the base rule.
    fn rule_combinations(&self) -> Vec<RuleConfig> {
        let ax = &self.axes;
        let mut combos = Vec::new();

        match &self.rule {
            RuleConfig::Axelrod(base) => {
                for &features in &axis(&ax.features, base.features) {
                    for &traits_per_feature in
                        &axis(&ax.traits_per_feature, base.traits_per_feature)
                    {
                        let mut p = base.clone();
                        p.features = features;
                        p.traits_per_feature = traits_per_feature;
                        combos.push(RuleConfig::Axelrod(p));
                    }
                }
            }
            RuleConfig::AxelrodDrift(base) => {
                for &features in &axis(&ax.features, base.features) {
                    for &traits_per_feature in
                        &axis(&ax.traits_per_feature, base.traits_per_feature)
                    {
                        for &drift_rate in &axis(&ax.drift_rates, base.drift_rate) {
                            let mut p = base.clone();
                            p.features = features;
                            p.traits_per_feature = traits_per_feature;
                            p.drift_rate = drift_rate;
                            combos.push(RuleConfig::AxelrodDrift(p));
                        }
                    }
                }
            }
            RuleConfig::Extensible(base) => {
                for &add_rate in &axis(&ax.add_rates, base.add_rate) {
                    for &max_initial in &axis(&ax.max_initial_traits, base.max_initial_traits) {
                        let mut p = base.clone();
                        p.add_rate = add_rate;
                        p.max_initial_traits = max_initial;
                        combos.push(RuleConfig::Extensible(p));
                    }
                }
            }
            RuleConfig::TreePrerequisite(base) => {
                for &learning_rate in &axis(&ax.learning_rates, base.learning_rate) {
                    for &max_initial in &axis(&ax.max_initial_traits, base.max_initial_traits) {
                        for &num_trees in &axis(&ax.num_trees, base.num_trees) {
                            for &branching in
                                &axis(&ax.branching_factors, base.branching_factor)
                            {
                                for &depth in &axis(&ax.depths, base.depth) {
                                    for &loss_rate in &axis(&ax.loss_rates, base.loss_rate) {
                                        for &innovation_rate in
                                            &axis(&ax.innovation_rates, base.innovation_rate)
                                        {
                                            let mut p = base.clone();
                                            p.learning_rate = learning_rate;
                                            p.max_initial_traits = max_initial;
                                            p.num_trees = num_trees;
                                            p.branching_factor = branching;
                                            p.depth = depth;
                                            p.loss_rate = loss_rate;
                                            p.innovation_rate = innovation_rate;
                                            combos.push(RuleConfig::TreePrerequisite(p));
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        combos
    }

    /// An axis populated for a rule that never reads it is a malformed grid.
    fn reject_unused_axes(&self) -> Result<(), ConfigError> {
        let ax = &self.axes;
        let rule = self.rule.name();
        let vector_rule = matches!(
            self.rule,
            RuleConfig::Axelrod(_) | RuleConfig::AxelrodDrift(_)
        );
        let drift_rule = matches!(self.rule, RuleConfig::AxelrodDrift(_));
        let set_like = matches!(
            self.rule,
            RuleConfig::Extensible(_) | RuleConfig::TreePrerequisite(_)
        );
        let tree_rule = matches!(self.rule, RuleConfig::TreePrerequisite(_));

        let checks: [(&'static str, bool, bool); 11] = [
            ("features", ax.features.is_empty(), vector_rule),
            (
                "traits_per_feature",
                ax.traits_per_feature.is_empty(),
                vector_rule,
            ),
            ("drift_rates", ax.drift_rates.is_empty(), drift_rule),
            ("add_rates", ax.add_rates.is_empty(), set_like),
            (
                "max_initial_traits",
                ax.max_initial_traits.is_empty(),
                set_like,
            ),
            ("num_trees", ax.num_trees.is_empty(), tree_rule),
            (
                "branching_factors",
                ax.branching_factors.is_empty(),
                tree_rule,
            ),
            ("depths", ax.depths.is_empty(), tree_rule),
            ("learning_rates", ax.learning_rates.is_empty(), tree_rule),
            ("loss_rates", ax.loss_rates.is_empty(), tree_rule),
            (
                "innovation_rates",
                ax.innovation_rates.is_empty(),
                tree_rule,
            ),
        ];

        for (axis, empty, applies) in checks {
            if !empty && !applies {
                return Err(ConfigError::UnusedSweepAxis { axis, rule });
            }
        }
        Ok(())
    }
}

fn axis<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}
