//! Cultural dissemination sweeps over agent populations.
//!
//! An Axelrod-style model: agents sit on a fixed graph and copy traits
//! from neighbors with probability proportional to their similarity. The
//! crate carries the classic fixed-vector rule plus drift, extensible
//! token-set, and tree-structured prerequisite variants, and a scheduler
//! that fans a parameter grid out over a worker pool.
//!
//! # Architecture
//!
//! - `schema`: run and sweep configuration, validation, enumeration
//! - `model`: topologies, trait representations, the tick loop's parts
//! - `runner`: single-run execution and final-state measurement
//! - `sweep`: grid scheduling across a fixed-size thread pool
//!
//! # Example
//!
//! ```rust,no_run
//! use dissemination::{
//!     runner::MemorySink,
//!     schema::{RuleConfig, SweepAxes, SweepConfig, VectorParams},
//!     sweep::run_sweep,
//! };
//!
//! let sweep = SweepConfig {
//!     population_sizes: vec![100, 400],
//!     rule: RuleConfig::Axelrod(VectorParams::default()),
//!     axes: SweepAxes {
//!         traits_per_feature: vec![4, 8, 16],
//!         ..Default::default()
//!     },
//!     replications: 10,
//!     ..Default::default()
//! };
//!
//! let sink = MemorySink::new();
//! let summary = run_sweep(&sweep, &sink).unwrap();
//! println!("{} of {} runs completed", summary.completed, summary.queued);
//! ```

pub mod model;
pub mod runner;
pub mod schema;
pub mod sweep;

// Re-export commonly used types
pub use runner::{MemorySink, RunOutcome, RunSink, run};
pub use schema::{RuleConfig, RunConfig, SweepConfig, TopologyConfig};
pub use sweep::{SweepSummary, run_sweep};
