//! Phased novelty search over voxel lattices.
//!
//! # Overview
//!
//! - **Interfaces** (`interfaces`): the genome, population, feasibility,
//!   compression model, storage and diagnostics seams
//! - **Novelty** (`novelty`): k-nearest-neighbour scoring in latent space
//! - **Archive** (`archive`): growth, deduplication and re-encoding of novel lattices
//! - **Speciation** (`speciation`): step controller for the compatibility threshold
//! - **Generation** (`generation`): the per-generation fitness function
//! - **Phase** (`phase`): phase sequencing, model loading and hand-off
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lattice_novelty::compute::{PooledEncoder, SpeciatedPopulation, StructuralConstraints};
//! use lattice_novelty::compute::evolution::{Collaborators, LogDiagnostics, PhaseOrchestrator};
//! use lattice_novelty::schema::ExperimentConfig;
//! use lattice_novelty::storage::FileStore;
//!
//! let config = ExperimentConfig::default();
//! let store = Arc::new(FileStore::new(&config.results_dir, &config.experiment));
//! let collaborators = Collaborators {
//!     feasibility: Arc::new(StructuralConstraints::from_config(&config.constraints)),
//!     models: store.clone(),
//!     store: store.clone(),
//!     diagnostics: Arc::new(LogDiagnostics),
//! };
//! let population = SpeciatedPopulation::new(config.reproduction.clone(), config.random_seed);
//! let mut orchestrator = PhaseOrchestrator::new(config.clone(), 0, population, collaborators)?;
//!
//! let phases = orchestrator.run_all(|artifacts| {
//!     let encoder = PooledEncoder::fit(config.lattice_shape, config.model.block_size, &artifacts.lattices);
//!     store.save_model(lattice_novelty::compute::evolution::ModelSource::Phase(artifacts.phase), &encoder)
//!         .map(|_| ())
//! })?;
//! println!("Ran {} phases", phases.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod generation;
mod interfaces;
mod novelty;
mod phase;
mod speciation;

#[cfg(test)]
mod test_support;

pub use archive::{ArchiveGrowth, NoveltyArchive, RankedIndividual, rank_ascending};
pub use generation::{GenerationEvaluator, PhaseState, generate_lattice};
pub use interfaces::{
    ArtifactKey, ArtifactSink, CompressionModel, Cppn, Diagnostics, FeasibilityCheck, GenomeId,
    LogDiagnostics, ModelError, ModelLoader, ModelSource, NoveltySnapshot, Population,
};
pub use novelty::{novelty, population_novelty, population_novelty_scores, round2};
pub use phase::{Collaborators, EvolutionError, OrchestratorState, PhaseOrchestrator};
pub use speciation::SpeciationController;
