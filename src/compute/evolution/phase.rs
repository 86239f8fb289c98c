//! Phase orchestration.
//!
//! A [`PhaseOrchestrator`] owns one population and its novelty archive and
//! drives them through consecutive phases. Each phase loads the compression
//! model for its index, re-encodes the archive into that model's latent
//! space, runs the configured number of generations and hands back the
//! lattices used to retrain the next model.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::compute::{WorkerError, WorkerPool};
use crate::schema::{ConfigError, ExperimentConfig, Handoff, PhaseArtifacts};
use crate::storage::StorageError;

use super::archive::NoveltyArchive;
use super::generation::{GenerationEvaluator, PhaseState};
use super::interfaces::{
    ArtifactKey, ArtifactSink, Diagnostics, FeasibilityCheck, ModelError, ModelLoader,
    ModelSource, Population,
};
use super::speciation::SpeciationController;

/// Errors raised while running phases.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Worker pool failure: {0}")]
    Worker(#[from] WorkerError),
    #[error("Model load failure: {0}")]
    Model(#[from] ModelError),
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Phase {requested} requested but phase {expected} is next")]
    PhaseOutOfOrder { expected: usize, requested: usize },
    #[error("All {0} phases have already completed")]
    Completed(usize),
    #[error("Hand-off after phase {phase} failed: {message}")]
    Handoff { phase: usize, message: String },
}

/// Lifecycle of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// No phase has started yet.
    Initializing,
    /// The given phase is running or was the last to finish.
    RunningPhase(usize),
    /// Every configured phase has finished.
    Completed,
}

/// Shared services used by every population.
#[derive(Clone)]
pub struct Collaborators {
    pub feasibility: Arc<dyn FeasibilityCheck>,
    pub models: Arc<dyn ModelLoader>,
    pub store: Arc<dyn ArtifactSink>,
    pub diagnostics: Arc<dyn Diagnostics>,
}

/// Runs the phases of one population.
pub struct PhaseOrchestrator<P: Population> {
    config: ExperimentConfig,
    population_id: usize,
    population: P,
    archive: NoveltyArchive,
    controller: SpeciationController,
    collaborators: Collaborators,
    state: OrchestratorState,
    next_phase: usize,
    rng: StdRng,
}

impl<P: Population> PhaseOrchestrator<P> {
    /// Validates `config` and prepares an orchestrator in the
    /// [`Initializing`](OrchestratorState::Initializing) state.
    pub fn new(
        config: ExperimentConfig,
        population_id: usize,
        population: P,
        collaborators: Collaborators,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let controller = SpeciationController::from_config(&config.speciation);
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(population_id as u64)),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            population_id,
            population,
            archive: NoveltyArchive::new(),
            controller,
            collaborators,
            state: OrchestratorState::Initializing,
            next_phase: 0,
            rng,
        })
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn population(&self) -> &P {
        &self.population
    }

    pub fn archive(&self) -> &NoveltyArchive {
        &self.archive
    }

    pub fn population_id(&self) -> usize {
        self.population_id
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Index of the phase [`run_phase`](Self::run_phase) accepts next.
    pub fn next_phase(&self) -> usize {
        self.next_phase
    }

    fn model_source(&self, phase: usize) -> ModelSource {
        if phase == 0 || self.config.phases.static_model {
            ModelSource::Seed {
                noisy: self.config.phases.noise,
            }
        } else {
            ModelSource::Phase(phase - 1)
        }
    }

    /// Run phase `phase` to completion.
    ///
    /// Phases must be requested in order starting at 0. The worker pool and
    /// compression model live only for the duration of this call.
    pub fn run_phase(&mut self, phase: usize) -> Result<PhaseArtifacts, EvolutionError> {
        let phase_count = self.config.phases.phase_count;
        if self.state == OrchestratorState::Completed {
            return Err(EvolutionError::Completed(phase_count));
        }
        if phase != self.next_phase {
            return Err(EvolutionError::PhaseOutOfOrder {
                expected: self.next_phase,
                requested: phase,
            });
        }
        if phase == 0 {
            self.population.reset();
        }
        if !self.config.phases.persistent_archive {
            self.archive.clear();
        }

        let source = self.model_source(phase);
        log::info!(
            "[Population {}] Phase {} loading {}",
            self.population_id,
            phase,
            source
        );
        let model = self.collaborators.models.load(source)?;
        self.archive.reencode(model.as_ref());

        let pool = WorkerPool::new(self.config.phases.worker_count)?;
        self.state = OrchestratorState::RunningPhase(phase);
        let generations = self.config.phases.generations_per_phase;
        let mut phase_state = PhaseState::new(
            &self.config.experiment,
            self.population_id,
            phase,
            generations,
        );

        let evaluator = GenerationEvaluator {
            config: &self.config,
            population_id: self.population_id,
            pool: &pool,
            model: model.as_ref(),
            feasibility: self.collaborators.feasibility.as_ref(),
            diagnostics: self.collaborators.diagnostics.as_ref(),
            store: self.collaborators.store.as_ref(),
            controller: &self.controller,
        };
        let archive = &mut self.archive;
        let rng = &mut self.rng;
        let outcome = self.population.run(generations, |population| {
            evaluator
                .evaluate(population, &mut phase_state, archive, rng)
                .map(|_| ())
        });

        pool.shutdown();
        drop(model);
        outcome?;

        let lattices = match self.config.phases.handoff {
            Handoff::Archive => self.archive.lattices().to_vec(),
            Handoff::BestFit => std::mem::take(&mut phase_state.best_fit),
        };
        let key = ArtifactKey {
            experiment: self.config.experiment.clone(),
            phase,
            population_id: self.population_id,
        };
        self.collaborators
            .store
            .write_metrics(&key, &phase_state.metrics)?;

        self.next_phase = phase + 1;
        if self.next_phase == phase_count {
            self.state = OrchestratorState::Completed;
        }
        log::info!(
            "[Population {}] Phase {} complete: {} lattices handed off, archive holds {}",
            self.population_id,
            phase,
            lattices.len(),
            self.archive.len()
        );

        Ok(PhaseArtifacts {
            phase,
            population_id: self.population_id,
            metrics: phase_state.metrics,
            lattices,
        })
    }

    /// Run every remaining phase, calling `handoff` between phases.
    ///
    /// The hook typically retrains the compression model the next phase
    /// loads. A hook error stops the run.
    pub fn run_all<H, E>(&mut self, mut handoff: H) -> Result<Vec<PhaseArtifacts>, EvolutionError>
    where
        H: FnMut(&PhaseArtifacts) -> Result<(), E>,
        E: std::fmt::Display,
    {
        let mut artifacts = Vec::new();
        while self.state != OrchestratorState::Completed {
            let phase = self.next_phase;
            let result = self.run_phase(phase)?;
            handoff(&result).map_err(|e| EvolutionError::Handoff {
                phase,
                message: e.to_string(),
            })?;
            artifacts.push(result);
        }
        Ok(artifacts)
    }
}
