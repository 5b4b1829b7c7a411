//! Configuration types for dissemination runs.

use serde::{Deserialize, Serialize};

/// Coordination number of the lattice and small-world topologies.
pub const LATTICE_COORDINATION_NUMBER: usize = 4;

fn default_max_ticks() -> u64 {
    2_000_000
}

/// Configuration for a single simulation run.
///
/// One instance exists per (parameter combination, replicate); the sweep
/// scheduler builds these from a [`SweepConfig`](crate::schema::SweepConfig)
/// before any worker starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Distinct identifier for this run.
    pub run_id: String,
    /// Number of agents.
    pub popsize: usize,
    /// Population structure.
    pub topology: TopologyConfig,
    /// Interaction rule and its trait-representation parameters.
    pub rule: RuleConfig,
    /// Step cutoff for runs that cannot reach an absorbing state.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Optional RNG seed; entropy-seeded when absent.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: "run-00000-00".to_string(),
            popsize: 100,
            topology: TopologyConfig::default(),
            rule: RuleConfig::default(),
            max_ticks: default_max_ticks(),
            rng_seed: None,
        }
    }
}

/// Population structure selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "structure", rename_all = "snake_case")]
pub enum TopologyConfig {
    /// Square lattice sized sqrt(N) x sqrt(N); toroidal when periodic.
    Lattice { periodic: bool },
    /// Watts-Strogatz rewired ring lattice with coordination number 4.
    SmallWorld { rewiring: f64 },
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self::Lattice { periodic: true }
    }
}

/// Interaction rule selection, carrying the parameters of its trait
/// representation. Replaces selection of a rule class by qualified name
/// with a closed set of variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleConfig {
    /// Fixed-length feature vector, original similarity-biased copying.
    Axelrod(VectorParams),
    /// Axelrod copying plus an independent per-tick drift perturbation.
    AxelrodDrift(VectorParams),
    /// Unordered extensible token sets with Jaccard similarity.
    Extensible(SetParams),
    /// Tree-structured tokens with prerequisite-gated adoption,
    /// plus population-level loss and innovation events.
    TreePrerequisite(TreeParams),
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self::Axelrod(VectorParams::default())
    }
}

impl RuleConfig {
    /// Stable name of the rule variant, for logging and stored results.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Axelrod(_) => "axelrod",
            Self::AxelrodDrift(_) => "axelrod_drift",
            Self::Extensible(_) => "extensible",
            Self::TreePrerequisite(_) => "tree_prerequisite",
        }
    }
}

/// Parameters of the fixed-vector trait representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorParams {
    /// Number of features (loci) per agent.
    pub features: usize,
    /// Number of possible trait tokens per feature.
    pub traits_per_feature: u32,
    /// Per-tick probability of perturbing one random feature
    /// (only the drift rule reads this).
    #[serde(default)]
    pub drift_rate: f64,
}

impl Default for VectorParams {
    fn default() -> Self {
        Self {
            features: 4,
            traits_per_feature: 4,
            drift_rate: 0.0,
        }
    }
}

/// Parameters of the extensible-set trait representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetParams {
    /// Agents start with between 1 and this many random tokens.
    pub max_initial_traits: usize,
    /// Tokens are drawn from `[0, max_trait_value)`.
    pub max_trait_value: u32,
    /// Probability that a learned token is added rather than
    /// replacing an existing one.
    pub add_rate: f64,
}

impl Default for SetParams {
    fn default() -> Self {
        Self {
            max_initial_traits: 8,
            max_trait_value: 100,
            add_rate: 0.1,
        }
    }
}

/// Parameters of the tree-structured (prerequisite) trait representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeParams {
    /// Number of disjoint trait trees in the universe.
    pub num_trees: usize,
    /// Branching factor of each balanced tree.
    pub branching_factor: usize,
    /// Depth of each balanced tree.
    pub depth: usize,
    /// Agents start with between 1 and this many random trait chains.
    pub max_initial_traits: usize,
    /// Probability that an adopted token is added rather than swapped
    /// for an existing one.
    pub add_rate: f64,
    /// Probability of learning the deepest missing prerequisite when
    /// the desired token cannot yet be adopted.
    pub learning_rate: f64,
    /// Per-tick probability that a random agent loses a random token.
    pub loss_rate: f64,
    /// Per-tick probability that a random agent gains a brand-new
    /// random token together with its full ancestor chain.
    pub innovation_rate: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            num_trees: 4,
            branching_factor: 3,
            depth: 4,
            max_initial_traits: 4,
            add_rate: 0.1,
            learning_rate: 0.1,
            loss_rate: 0.0,
            innovation_rate: 0.0,
        }
    }
}

impl TreeParams {
    /// True when the run can never reach an absorbing state and must be
    /// sampled at the step cutoff instead.
    pub fn has_constant_perturbation(&self) -> bool {
        self.loss_rate > 0.0 || self.innovation_rate > 0.0
    }
}

impl RunConfig {
    /// Validate the configuration before a worker touches it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.popsize < 2 {
            return Err(ConfigError::PopulationTooSmall {
                popsize: self.popsize,
                minimum: 2,
            });
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::InvalidCutoff);
        }

        match &self.topology {
            TopologyConfig::Lattice { .. } => {
                if !is_perfect_square(self.popsize) {
                    return Err(ConfigError::NotPerfectSquare(self.popsize));
                }
            }
            TopologyConfig::SmallWorld { rewiring } => {
                check_rate("rewiring", *rewiring)?;
                // The ring lattice links each node to 4 neighbors, so the
                // population must exceed the coordination number.
                if self.popsize <= LATTICE_COORDINATION_NUMBER {
                    return Err(ConfigError::PopulationTooSmall {
                        popsize: self.popsize,
                        minimum: LATTICE_COORDINATION_NUMBER + 1,
                    });
                }
            }
        }

        match &self.rule {
            RuleConfig::Axelrod(p) | RuleConfig::AxelrodDrift(p) => {
                if p.features == 0 || p.traits_per_feature == 0 {
                    return Err(ConfigError::InvalidVectorShape);
                }
                check_rate("drift_rate", p.drift_rate)?;
            }
            RuleConfig::Extensible(p) => {
                if p.max_initial_traits == 0 || p.max_trait_value == 0 {
                    return Err(ConfigError::InvalidSetShape);
                }
                check_rate("add_rate", p.add_rate)?;
            }
            RuleConfig::TreePrerequisite(p) => {
                if p.num_trees == 0 || p.branching_factor == 0 || p.depth == 0 {
                    return Err(ConfigError::InvalidTreeShape);
                }
                match tree_universe_size(p.num_trees, p.branching_factor, p.depth) {
                    Some(n) if n <= u32::MAX as u64 => {}
                    _ => return Err(ConfigError::TraitUniverseTooLarge),
                }
                if p.max_initial_traits == 0 {
                    return Err(ConfigError::InvalidSetShape);
                }
                check_rate("add_rate", p.add_rate)?;
                check_rate("learning_rate", p.learning_rate)?;
                check_rate("loss_rate", p.loss_rate)?;
                check_rate("innovation_rate", p.innovation_rate)?;
            }
        }

        Ok(())
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidRate { name, value });
    }
    Ok(())
}

pub(crate) fn is_perfect_square(n: usize) -> bool {
    let side = (n as f64).sqrt().round() as usize;
    side * side == n
}

/// Total tokens in a forest of balanced trees, or `None` on overflow.
/// Token ids are `u32`, so the universe must also fit that range.
pub(crate) fn tree_universe_size(num_trees: usize, branching: usize, depth: usize) -> Option<u64> {
    let mut per_tree = 0u64;
    let mut level = 1u64;
    for i in 0..=depth {
        per_tree = per_tree.checked_add(level)?;
        if i < depth {
            level = level.checked_mul(branching as u64)?;
        }
    }
    (num_trees as u64).checked_mul(per_tree)
}

/// Configuration validation errors. All are fatal and reported before
/// any worker starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("population size {0} is not a perfect square, required by the lattice topology")]
    NotPerfectSquare(usize),
    #[error("population size {popsize} is below the minimum of {minimum} for this topology")]
    PopulationTooSmall { popsize: usize, minimum: usize },
    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("feature count and traits per feature must be non-zero")]
    InvalidVectorShape,
    #[error("maximum initial traits and maximum trait value must be non-zero")]
    InvalidSetShape,
    #[error("tree count, branching factor, and depth must be non-zero")]
    InvalidTreeShape,
    #[error("trait universe exceeds the supported token range")]
    TraitUniverseTooLarge,
    #[error("step cutoff must be non-zero")]
    InvalidCutoff,
    #[error("failed to draw a connected small-world graph for population size {0}")]
    DisconnectedTopology(usize),
    #[error("sweep axis '{0}' is empty")]
    EmptySweepAxis(&'static str),
    #[error("sweep axis '{axis}' does not apply to rule '{rule}'")]
    UnusedSweepAxis {
        axis: &'static str,
        rule: &'static str,
    },
    #[error("replication count must be non-zero")]
    ZeroReplications,
    #[error("worker pool size must be non-zero")]
    ZeroParallelism,
}
