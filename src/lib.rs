//! Lattice Novelty - Phased novelty search over generative 3D voxel lattices.
//!
//! Populations of CPPN genomes are decoded into labeled voxel lattices,
//! compressed into latent vectors and rewarded for being far from their
//! neighbours. Evolution runs in phases; between phases the compression
//! model is retrained on the lattices the previous phase discovered.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `schema`: Configuration, lattice and metrics types
//! - `compute`: Worker pool, reference collaborators and the evolution loop
//! - `storage`: Lattice dumps, metrics and model artifacts on disk
//!
//! # Example
//!
//! ```rust,no_run
//! use lattice_novelty::{
//!     compute::{CppnRng, PooledEncoder, StructuralConstraints},
//!     compute::evolution::{CompressionModel, generate_lattice, population_novelty_scores},
//!     schema::ExperimentConfig,
//! };
//!
//! let config = ExperimentConfig::default();
//! let constraints = StructuralConstraints::from_config(&config.constraints);
//! let mut rng = CppnRng::new(42);
//!
//! let lattices: Vec<_> = (0..32)
//!     .map(|_| generate_lattice(&rng.random_genome(), config.lattice_shape, &constraints))
//!     .filter(|(feasible, _)| *feasible)
//!     .map(|(_, lattice)| lattice)
//!     .collect();
//!
//! let encoder = PooledEncoder::fit(config.lattice_shape, config.model.block_size, &lattices);
//! let vectors = encoder.encode_batch(&lattices);
//! println!("Diagnostic novelty: {:?}", population_novelty_scores(&vectors));
//! ```

pub mod compute;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use compute::evolution::{EvolutionError, PhaseOrchestrator};
pub use schema::{ExperimentConfig, Lattice, PhaseArtifacts};
pub use storage::FileStore;
