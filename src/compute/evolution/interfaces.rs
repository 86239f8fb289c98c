//! Collaborator traits consumed by the evolutionary loop.
//!
//! The loop never owns genome representation, feasibility rules, the
//! compression model or storage. It drives them through these seams.

use crate::schema::{Lattice, LatentVector, PhaseMetrics};

/// Identifier of a genome within a population.
pub type GenomeId = u64;

/// A generative network queried at normalized lattice coordinates.
pub trait Cppn: Send + Sync {
    /// Raw activation at `(x, y, z)`, each coordinate in `[0, 1)`.
    fn activate(&self, x: f32, y: f32, z: f32) -> f32;

    /// `(node_count, enabled_connection_count)`.
    fn complexity(&self) -> (usize, usize);
}

/// Evolving population supplied by an evolutionary library.
///
/// Only the orchestrating thread calls the mutating methods.
pub trait Population {
    type Genome: Cppn;

    /// Discard all genomes and start over from the library configuration.
    fn reset(&mut self);

    /// Live genomes in a stable order.
    fn members(&self) -> Vec<(GenomeId, &Self::Genome)>;

    fn len(&self) -> usize {
        self.members().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fitness(&self, id: GenomeId) -> Option<f32>;

    fn set_fitness(&mut self, id: GenomeId, fitness: f32);

    /// Remove a genome from the active population.
    fn remove(&mut self, id: GenomeId) -> bool;

    /// Member count of every current species.
    fn species_sizes(&self) -> Vec<usize>;

    fn compatibility_threshold(&self) -> f32;

    fn set_compatibility_threshold(&mut self, threshold: f32);

    /// Produce the next generation from the current fitness values.
    fn reproduce(&mut self);

    /// Run `generations` rounds of `fitness` followed by reproduction.
    fn run<E, F>(&mut self, generations: usize, mut fitness: F) -> Result<(), E>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<(), E>,
    {
        for _ in 0..generations {
            fitness(self)?;
            self.reproduce();
        }
        Ok(())
    }
}

/// Turns a raw activation grid into a labeled lattice plus a verdict.
pub trait FeasibilityCheck: Send + Sync {
    fn check(&self, raw: &Lattice) -> (bool, Lattice);
}

/// Black-box lattice encoder.
pub trait CompressionModel: Send + Sync {
    fn latent_dim(&self) -> usize;

    fn encode(&self, lattice: &Lattice) -> LatentVector;

    fn encode_batch(&self, lattices: &[Lattice]) -> Vec<LatentVector> {
        lattices.iter().map(|l| self.encode(l)).collect()
    }
}

/// Which model artifact a phase needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// The fixed seed model, clean or noise-trained.
    Seed { noisy: bool },
    /// The model retrained after the given phase.
    Phase(usize),
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSource::Seed { noisy: false } => write!(f, "seed model"),
            ModelSource::Seed { noisy: true } => write!(f, "noisy seed model"),
            ModelSource::Phase(n) => write!(f, "phase {n} model"),
        }
    }
}

/// Model loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("No {model} artifact at {path}")]
    Missing { model: ModelSource, path: String },
    #[error("Malformed {model} artifact: {message}")]
    Malformed { model: ModelSource, message: String },
}

/// Loads compression models by source.
pub trait ModelLoader: Send + Sync {
    fn load(&self, source: ModelSource) -> Result<Box<dyn CompressionModel>, ModelError>;
}

/// Key under which phase artifacts are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub experiment: String,
    pub phase: usize,
    pub population_id: usize,
}

/// Durable storage for phase outputs.
pub trait ArtifactSink: Send + Sync {
    fn write_lattices(
        &self,
        key: &ArtifactKey,
        lattices: &[Lattice],
    ) -> Result<(), crate::storage::StorageError>;

    fn write_metrics(
        &self,
        key: &ArtifactKey,
        metrics: &PhaseMetrics,
    ) -> Result<(), crate::storage::StorageError>;
}

/// Least, median and most novel lattices of one generation.
#[derive(Debug, Clone)]
pub struct NoveltySnapshot<'a> {
    pub experiment: &'a str,
    pub phase: usize,
    pub population_id: usize,
    pub generation: usize,
    pub lattices: [&'a Lattice; 3],
}

/// Fire-and-forget diagnostic output.
pub trait Diagnostics: Send + Sync {
    fn snapshot(&self, snapshot: &NoveltySnapshot<'_>);
}

/// Diagnostics sink that logs a one-line occupancy summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn snapshot(&self, snapshot: &NoveltySnapshot<'_>) {
        let [least, median, most] = snapshot.lattices;
        log::info!(
            "[{} population {} phase {}] generation {} occupancy least/median/most: {}/{}/{}",
            snapshot.experiment,
            snapshot.population_id,
            snapshot.phase,
            snapshot.generation,
            least.occupied(),
            median.occupied(),
            most.occupied()
        );
    }
}
