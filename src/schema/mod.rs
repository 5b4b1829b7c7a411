//! Schema module - Configuration types for runs and sweeps.

mod config;
mod grid;

pub use config::*;
pub use grid::*;

pub(crate) use config::tree_universe_size;
