//! In-memory collaborators shared by the evolution tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::schema::{LatentVector, Lattice, PhaseMetrics};
use crate::storage::StorageError;

use super::interfaces::{
    ArtifactKey, ArtifactSink, CompressionModel, Cppn, Diagnostics, FeasibilityCheck, GenomeId,
    ModelError, ModelLoader, ModelSource, NoveltySnapshot, Population,
};

/// Occupies every cell whose normalized x lies below `fill`.
#[derive(Debug, Clone)]
pub struct FillGenome {
    pub fill: f32,
}

impl FillGenome {
    /// Occupies the first `cells` of `width` cells along x.
    pub fn new(cells: usize, width: usize) -> Self {
        Self {
            fill: cells as f32 / width as f32,
        }
    }

    pub fn infeasible() -> Self {
        Self { fill: 0.0 }
    }
}

impl Cppn for FillGenome {
    fn activate(&self, x: f32, _y: f32, _z: f32) -> f32 {
        if x < self.fill { 1.0 } else { 0.0 }
    }

    fn complexity(&self) -> (usize, usize) {
        (4, 3)
    }
}

/// Population of [`FillGenome`]s; genome `i` occupies `i + 1` cells of a
/// 12-wide lattice unless listed as infeasible.
#[derive(Debug)]
pub struct TestPopulation {
    initial: Vec<FillGenome>,
    genomes: BTreeMap<GenomeId, (FillGenome, Option<f32>)>,
    pub removed: Vec<GenomeId>,
    pub species: Vec<usize>,
    pub threshold: f32,
    pub reproduce_calls: usize,
    pub resets: usize,
}

impl TestPopulation {
    pub fn with_infeasible(size: usize, infeasible: &[GenomeId]) -> Self {
        let initial: Vec<FillGenome> = (0..size)
            .map(|i| {
                if infeasible.contains(&(i as GenomeId)) {
                    FillGenome::infeasible()
                } else {
                    FillGenome::new(i + 1, 12)
                }
            })
            .collect();
        let mut population = Self {
            initial,
            genomes: BTreeMap::new(),
            removed: Vec::new(),
            species: vec![size],
            threshold: 3.0,
            reproduce_calls: 0,
            resets: 0,
        };
        population.fill();
        population
    }

    fn fill(&mut self) {
        self.genomes = self
            .initial
            .iter()
            .enumerate()
            .map(|(i, g)| (i as GenomeId, (g.clone(), None)))
            .collect();
    }
}

impl Population for TestPopulation {
    type Genome = FillGenome;

    fn reset(&mut self) {
        self.resets += 1;
        self.removed.clear();
        self.fill();
    }

    fn members(&self) -> Vec<(GenomeId, &FillGenome)> {
        self.genomes.iter().map(|(id, (g, _))| (*id, g)).collect()
    }

    fn fitness(&self, id: GenomeId) -> Option<f32> {
        self.genomes.get(&id).and_then(|(_, f)| *f)
    }

    fn set_fitness(&mut self, id: GenomeId, fitness: f32) {
        if let Some(entry) = self.genomes.get_mut(&id) {
            entry.1 = Some(fitness);
        }
    }

    fn remove(&mut self, id: GenomeId) -> bool {
        let removed = self.genomes.remove(&id).is_some();
        if removed {
            self.removed.push(id);
        }
        removed
    }

    fn species_sizes(&self) -> Vec<usize> {
        self.species.clone()
    }

    fn compatibility_threshold(&self) -> f32 {
        self.threshold
    }

    fn set_compatibility_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    fn reproduce(&mut self) {
        self.reproduce_calls += 1;
    }
}

/// Feasible iff at least one cell is occupied.
#[derive(Debug, Clone, Copy)]
pub struct NonEmptyFeasibility;

impl FeasibilityCheck for NonEmptyFeasibility {
    fn check(&self, raw: &Lattice) -> (bool, Lattice) {
        (raw.occupied() > 0, raw.clone())
    }
}

/// Panics on lattices with exactly `occupancy` occupied cells.
pub struct PanickingFeasibility {
    pub occupancy: usize,
}

impl FeasibilityCheck for PanickingFeasibility {
    fn check(&self, raw: &Lattice) -> (bool, Lattice) {
        if raw.occupied() == self.occupancy {
            panic!("feasibility failed at occupancy {}", self.occupancy);
        }
        NonEmptyFeasibility.check(raw)
    }
}

/// Encodes a lattice as `[occupied, scale * occupied]`.
#[derive(Debug, Clone, Copy)]
pub struct CountModel {
    scale: f32,
}

impl CountModel {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }
}

impl CompressionModel for CountModel {
    fn latent_dim(&self) -> usize {
        2
    }

    fn encode(&self, lattice: &Lattice) -> LatentVector {
        let n = lattice.occupied() as f32;
        LatentVector::new(vec![n, n * self.scale])
    }
}

/// Hands out [`CountModel`]s: scale 1 for seed models, `n + 2` for the
/// model retrained after phase `n`.
#[derive(Debug, Default)]
pub struct ScaledModels {
    loaded: Mutex<Vec<ModelSource>>,
    forbidden: Mutex<Vec<ModelSource>>,
}

impl ScaledModels {
    pub fn loaded(&self) -> Vec<ModelSource> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn forbid(&self, source: ModelSource) {
        self.forbidden.lock().unwrap().push(source);
    }
}

impl ModelLoader for ScaledModels {
    fn load(&self, source: ModelSource) -> Result<Box<dyn CompressionModel>, ModelError> {
        if self.forbidden.lock().unwrap().contains(&source) {
            return Err(ModelError::Missing {
                model: source,
                path: "memory".into(),
            });
        }
        self.loaded.lock().unwrap().push(source);
        let scale = match source {
            ModelSource::Seed { .. } => 1.0,
            ModelSource::Phase(n) => n as f32 + 2.0,
        };
        Ok(Box::new(CountModel::new(scale)))
    }
}

/// Records artifact writes as `(key, lattice count)` and `(phase, entries)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lattices: Mutex<Vec<(ArtifactKey, usize)>>,
    metrics: Mutex<Vec<(usize, usize)>>,
}

impl MemoryStore {
    pub fn lattice_writes(&self) -> Vec<(ArtifactKey, usize)> {
        self.lattices.lock().unwrap().clone()
    }

    pub fn metrics_writes(&self) -> Vec<(usize, usize)> {
        self.metrics.lock().unwrap().clone()
    }
}

impl ArtifactSink for MemoryStore {
    fn write_lattices(&self, key: &ArtifactKey, lattices: &[Lattice]) -> Result<(), StorageError> {
        self.lattices
            .lock()
            .unwrap()
            .push((key.clone(), lattices.len()));
        Ok(())
    }

    fn write_metrics(&self, key: &ArtifactKey, metrics: &PhaseMetrics) -> Result<(), StorageError> {
        self.metrics
            .lock()
            .unwrap()
            .push((key.phase, metrics.len()));
        Ok(())
    }
}

/// Records `(generation, [least, median, most] occupancy)` per snapshot.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    snapshots: Mutex<Vec<(usize, [usize; 3])>>,
}

impl RecordingDiagnostics {
    pub fn snapshots(&self) -> Vec<(usize, [usize; 3])> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn snapshot(&self, snapshot: &NoveltySnapshot<'_>) {
        self.snapshots
            .lock()
            .unwrap()
            .push((snapshot.generation, snapshot.lattices.map(|l| l.occupied())));
    }
}
