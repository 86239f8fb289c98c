//! Schema module - Configuration, lattice and metrics types for novelty-search experiments.

mod config;
mod lattice;
mod metrics;

pub use config::*;
pub use lattice::*;
pub use metrics::*;
