//! Per-generation fitness evaluation.
//!
//! One call to [`GenerationEvaluator::evaluate`] runs a full bulk-synchronous
//! generation: parallel lattice generation, feasibility culling, sequential
//! encoding, parallel novelty scoring, archive growth, diagnostics, metrics
//! and the speciation controller step.

use std::convert::Infallible;
use std::time::Instant;

use rand::rngs::StdRng;

use crate::compute::WorkerPool;
use crate::schema::{
    CellLabel, ExperimentConfig, GenerationRecord, LatentVector, Lattice, PhaseMetrics,
    SpeciesSummary,
};

use super::archive::{NoveltyArchive, RankedIndividual, rank_ascending};
use super::interfaces::{
    ArtifactKey, ArtifactSink, CompressionModel, Cppn, Diagnostics, FeasibilityCheck, GenomeId,
    NoveltySnapshot, Population,
};
use super::novelty::novelty;
use super::phase::EvolutionError;
use super::speciation::SpeciationController;

/// Decode `genome` over every integer coordinate of `shape` and run the
/// result through `feasibility`.
///
/// Coordinates are normalized per axis to `[0, 1)`.
pub fn generate_lattice<G>(
    genome: &G,
    shape: [usize; 3],
    feasibility: &dyn FeasibilityCheck,
) -> (bool, Lattice)
where
    G: Cppn + ?Sized,
{
    let scale = shape.map(|d| d as f32);
    let raw = Lattice::from_fn(shape, |x, y, z| {
        CellLabel::from_activation(genome.activate(
            x as f32 / scale[0],
            y as f32 / scale[1],
            z as f32 / scale[2],
        ))
    });
    feasibility.check(&raw)
}

/// Mutable state of the phase in progress.
#[derive(Debug, Clone)]
pub struct PhaseState {
    /// Phase index.
    pub index: usize,
    /// Generation about to be evaluated.
    pub generation: usize,
    /// Generations in this phase.
    pub generations: usize,
    /// Metrics recorded so far.
    pub metrics: PhaseMetrics,
    /// Top-ranked lattices of the final generation.
    pub best_fit: Vec<Lattice>,
}

impl PhaseState {
    pub fn new(experiment: &str, population_id: usize, index: usize, generations: usize) -> Self {
        Self {
            index,
            generation: 0,
            generations,
            metrics: PhaseMetrics::new(experiment, population_id, index),
            best_fit: Vec::new(),
        }
    }

    #[inline]
    pub fn is_final_generation(&self) -> bool {
        self.generation + 1 == self.generations
    }
}

/// Fitness function invoked once per generation.
pub struct GenerationEvaluator<'a> {
    pub config: &'a ExperimentConfig,
    pub population_id: usize,
    pub pool: &'a WorkerPool,
    pub model: &'a dyn CompressionModel,
    pub feasibility: &'a dyn FeasibilityCheck,
    pub diagnostics: &'a dyn Diagnostics,
    pub store: &'a dyn ArtifactSink,
    pub controller: &'a SpeciationController,
}

impl GenerationEvaluator<'_> {
    /// Evaluate the current generation of `population`.
    ///
    /// Infeasible genomes get fitness 0 and are removed from the population.
    /// Feasible genomes get their novelty score as fitness. A worker failure
    /// in either parallel stage aborts the generation.
    pub fn evaluate<P: Population>(
        &self,
        population: &mut P,
        state: &mut PhaseState,
        archive: &mut NoveltyArchive,
        rng: &mut StdRng,
    ) -> Result<GenerationRecord, EvolutionError> {
        let start = Instant::now();
        let shape = self.config.lattice_shape;
        let feasibility = self.feasibility;

        // Stage 1: lattice generation and feasibility, in parallel.
        let generated = {
            let members = population.members();
            self.pool.dispatch_keyed(&members, |genome| {
                Ok::<_, Infallible>(generate_lattice(*genome, shape, feasibility))
            })?
        };

        let mut infeasible = 0;
        let mut feasible: Vec<(GenomeId, Lattice)> = Vec::with_capacity(generated.len());
        for (id, (ok, lattice)) in generated {
            if ok {
                feasible.push((id, lattice));
            } else {
                population.set_fitness(id, 0.0);
                population.remove(id);
                infeasible += 1;
            }
        }

        // Encoding runs on this thread.
        let vectors: Vec<LatentVector> = feasible
            .iter()
            .map(|(_, lattice)| {
                if self.config.phases.noise {
                    self.model
                        .encode(&lattice.with_noise(self.config.phases.noise_rate, &mut *rng))
                } else {
                    self.model.encode(lattice)
                }
            })
            .collect();

        // Stage 2: novelty scoring, in parallel.
        let k = self.config.novelty.k_nearest;
        let archive_vectors = archive.vectors();
        let keyed: Vec<(GenomeId, &LatentVector)> = feasible
            .iter()
            .map(|(id, _)| *id)
            .zip(vectors.iter())
            .collect();
        let scores = self.pool.dispatch_keyed(&keyed, |vector| {
            Ok::<_, Infallible>(novelty(vector, &vectors, archive_vectors, k))
        })?;

        let mut ranked: Vec<RankedIndividual> = Vec::with_capacity(scores.len());
        for (((id, fitness), (lattice_id, lattice)), vector) in
            scores.into_iter().zip(feasible).zip(vectors)
        {
            debug_assert_eq!(id, lattice_id);
            population.set_fitness(id, fitness);
            ranked.push(RankedIndividual {
                id,
                fitness,
                lattice,
                vector,
            });
        }
        rank_ascending(&mut ranked);

        let growth = archive.grow(&ranked, self.config.novelty.archive_growth, self.model);
        log::debug!(
            "Archive grew by {} lattices, {} vectors",
            growth.lattices_added,
            growth.vectors_added
        );

        let is_final = state.is_final_generation();
        if (state.generation % self.config.phases.snapshot_interval == 0 || is_final)
            && let (Some(least), Some(most)) = (ranked.first(), ranked.last())
        {
            let median = &ranked[ranked.len() / 2];
            self.diagnostics.snapshot(&NoveltySnapshot {
                experiment: &self.config.experiment,
                phase: state.index,
                population_id: self.population_id,
                generation: state.generation,
                lattices: [&least.lattice, &median.lattice, &most.lattice],
            });
        }

        if is_final {
            let key = ArtifactKey {
                experiment: self.config.experiment.clone(),
                phase: state.index,
                population_id: self.population_id,
            };
            let lattices: Vec<Lattice> = ranked.iter().map(|r| r.lattice.clone()).collect();
            self.store.write_lattices(&key, &lattices)?;
            state.best_fit = ranked
                .iter()
                .rev()
                .take(self.config.novelty.best_fit_count)
                .map(|r| r.lattice.clone())
                .collect();
        }

        let (mean_novelty, best_novelty) = fitness_stats(&ranked);
        let (node_complexity, connection_complexity) = mean_complexity(population);
        let species_sizes = population.species_sizes();
        let species = SpeciesSummary::from_sizes(&species_sizes);
        if species_sizes.is_empty() {
            log::warn!(
                "[Population {}] No species reported at generation {}",
                self.population_id,
                state.generation
            );
        }

        let threshold = population.compatibility_threshold();
        let next_threshold = self.controller.next_threshold(species.count, threshold);
        if next_threshold != threshold {
            log::debug!(
                "Compatibility threshold {:.3} -> {:.3} ({} species, target {})",
                threshold,
                next_threshold,
                species.count,
                self.controller.target()
            );
            population.set_compatibility_threshold(next_threshold);
        }

        let record = GenerationRecord {
            generation: state.generation,
            mean_novelty,
            best_novelty,
            node_complexity,
            connection_complexity,
            infeasible,
            feasible: ranked.len(),
            archive_size: archive.len(),
            species,
            compatibility_threshold: next_threshold,
        };
        state.metrics.record(&record);

        log::info!(
            "[Population {}] Phase {} generation {} took {:.2}s: mean novelty {:.2}, max novelty {:.2}, archive {}, infeasible {}, species {}",
            self.population_id,
            state.index,
            state.generation,
            start.elapsed().as_secs_f32(),
            mean_novelty,
            best_novelty,
            record.archive_size,
            infeasible,
            species.count
        );
        log::debug!("Species sizes: {:?}", species_sizes);

        state.generation += 1;
        Ok(record)
    }
}

fn fitness_stats(ranked: &[RankedIndividual]) -> (f32, f32) {
    if ranked.is_empty() {
        return (0.0, 0.0);
    }
    let mean = ranked.iter().map(|r| r.fitness).sum::<f32>() / ranked.len() as f32;
    let best = ranked
        .iter()
        .map(|r| r.fitness)
        .fold(f32::NEG_INFINITY, f32::max);
    (mean, best)
}

fn mean_complexity<P: Population>(population: &P) -> (f32, f32) {
    let members = population.members();
    if members.is_empty() {
        return (0.0, 0.0);
    }
    let (nodes, connections) = members
        .iter()
        .map(|(_, g)| g.complexity())
        .fold((0usize, 0usize), |(n, c), (gn, gc)| (n + gn, c + gc));
    let count = members.len() as f32;
    (nodes as f32 / count, connections as f32 / count)
}
