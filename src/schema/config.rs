//! Configuration types for phased novelty-search experiments.

use serde::{Deserialize, Serialize};

use super::Handoff;

/// Top-level experiment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name, used to key stored artifacts.
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Root directory for models, lattice dumps and metrics.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    /// Number of independent populations evolved per phase.
    #[serde(default = "default_population_count")]
    pub population_count: usize,
    /// Lattice dimensions (x, y, z), with z vertical.
    #[serde(default = "default_lattice_shape")]
    pub lattice_shape: [usize; 3],
    /// Phase scheduling and hand-off settings.
    #[serde(default)]
    pub phases: PhaseConfig,
    /// Novelty search settings.
    #[serde(default)]
    pub novelty: NoveltyConfig,
    /// Speciation controller settings.
    #[serde(default)]
    pub speciation: SpeciationConfig,
    /// Settings for the reference evolutionary population.
    #[serde(default)]
    pub reproduction: ReproductionConfig,
    /// Structural feasibility limits.
    #[serde(default)]
    pub constraints: ConstraintConfig,
    /// Compression model settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment: default_experiment(),
            results_dir: default_results_dir(),
            population_count: default_population_count(),
            lattice_shape: default_lattice_shape(),
            phases: PhaseConfig::default(),
            novelty: NoveltyConfig::default(),
            speciation: SpeciationConfig::default(),
            reproduction: ReproductionConfig::default(),
            constraints: ConstraintConfig::default(),
            model: ModelConfig::default(),
            random_seed: None,
        }
    }
}

fn default_experiment() -> String {
    "Experiment".to_string()
}
fn default_results_dir() -> String {
    "Results".to_string()
}
fn default_population_count() -> usize {
    1
}
fn default_lattice_shape() -> [usize; 3] {
    [20, 20, 20]
}

/// Phase scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Number of phases to run.
    #[serde(default = "default_phase_count")]
    pub phase_count: usize,
    /// Generations evaluated per phase.
    #[serde(default = "default_generations_per_phase")]
    pub generations_per_phase: usize,
    /// Worker threads in the per-phase pool (0 = one per logical CPU).
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Carry the archive's lattices across phases.
    #[serde(default = "default_persistent_archive")]
    pub persistent_archive: bool,
    /// Which lattices are handed to the next phase.
    #[serde(default)]
    pub handoff: Handoff,
    /// Always use the seed model instead of the previous phase's model.
    #[serde(default)]
    pub static_model: bool,
    /// Encode lattices with injected noise (denoising encoder).
    #[serde(default)]
    pub noise: bool,
    /// Per-cell replacement probability when `noise` is set.
    #[serde(default = "default_noise_rate")]
    pub noise_rate: f32,
    /// Emit a diagnostic snapshot every N generations.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: usize,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            phase_count: default_phase_count(),
            generations_per_phase: default_generations_per_phase(),
            worker_count: default_worker_count(),
            persistent_archive: default_persistent_archive(),
            handoff: Handoff::default(),
            static_model: false,
            noise: false,
            noise_rate: default_noise_rate(),
            snapshot_interval: default_snapshot_interval(),
        }
    }
}

fn default_phase_count() -> usize {
    10
}
fn default_generations_per_phase() -> usize {
    100
}
fn default_worker_count() -> usize {
    0
}
fn default_persistent_archive() -> bool {
    true
}
fn default_noise_rate() -> f32 {
    0.025
}
fn default_snapshot_interval() -> usize {
    100
}

/// Novelty search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltyConfig {
    /// Number of nearest neighbours averaged into a novelty score.
    #[serde(default = "default_k_nearest")]
    pub k_nearest: usize,
    /// Top-ranked individuals added to the archive each generation.
    #[serde(default = "default_archive_growth")]
    pub archive_growth: usize,
    /// Top-ranked lattices retained from a phase's final generation.
    #[serde(default = "default_best_fit_count")]
    pub best_fit_count: usize,
}

impl Default for NoveltyConfig {
    fn default() -> Self {
        Self {
            k_nearest: default_k_nearest(),
            archive_growth: default_archive_growth(),
            best_fit_count: default_best_fit_count(),
        }
    }
}

fn default_k_nearest() -> usize {
    10
}
fn default_archive_growth() -> usize {
    2
}
fn default_best_fit_count() -> usize {
    50
}

/// Speciation controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciationConfig {
    /// Desired number of species.
    #[serde(default = "default_target_species")]
    pub target_species: usize,
    /// Threshold adjustment per generation.
    #[serde(default = "default_speciation_step")]
    pub step: f32,
    /// Optional clamp for the compatibility threshold.
    #[serde(default)]
    pub threshold_bounds: Option<(f32, f32)>,
}

impl Default for SpeciationConfig {
    fn default() -> Self {
        Self {
            target_species: default_target_species(),
            step: default_speciation_step(),
            threshold_bounds: None,
        }
    }
}

fn default_target_species() -> usize {
    6
}
fn default_speciation_step() -> f32 {
    0.05
}

/// Reproduction settings for the reference population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproductionConfig {
    /// Genomes per population.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Initial compatibility threshold.
    #[serde(default = "default_compatibility_threshold")]
    pub compatibility_threshold: f32,
    /// Weight of disjoint genes in compatibility distance.
    #[serde(default = "default_disjoint_coefficient")]
    pub disjoint_coefficient: f32,
    /// Weight of matching-gene weight differences in compatibility distance.
    #[serde(default = "default_weight_coefficient")]
    pub weight_coefficient: f32,
    /// Probability of perturbing each weight and bias.
    #[serde(default = "default_weight_mutation_rate")]
    pub weight_mutation_rate: f32,
    /// Standard deviation of weight perturbations.
    #[serde(default = "default_weight_mutation_power")]
    pub weight_mutation_power: f32,
    /// Probability of splitting a connection with a new node.
    #[serde(default = "default_add_node_rate")]
    pub add_node_rate: f32,
    /// Probability of adding a new connection.
    #[serde(default = "default_add_connection_rate")]
    pub add_connection_rate: f32,
    /// Probability of toggling a connection's enabled flag.
    #[serde(default = "default_toggle_rate")]
    pub toggle_rate: f32,
    /// Probability of crossover when two parents are available.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    /// Best genomes per species copied unchanged.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    /// Fraction of each species allowed to reproduce.
    #[serde(default = "default_survival_threshold")]
    pub survival_threshold: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            compatibility_threshold: default_compatibility_threshold(),
            disjoint_coefficient: default_disjoint_coefficient(),
            weight_coefficient: default_weight_coefficient(),
            weight_mutation_rate: default_weight_mutation_rate(),
            weight_mutation_power: default_weight_mutation_power(),
            add_node_rate: default_add_node_rate(),
            add_connection_rate: default_add_connection_rate(),
            toggle_rate: default_toggle_rate(),
            crossover_rate: default_crossover_rate(),
            elitism: default_elitism(),
            survival_threshold: default_survival_threshold(),
        }
    }
}

fn default_population_size() -> usize {
    100
}
fn default_compatibility_threshold() -> f32 {
    3.0
}
fn default_disjoint_coefficient() -> f32 {
    1.0
}
fn default_weight_coefficient() -> f32 {
    0.5
}
fn default_weight_mutation_rate() -> f32 {
    0.8
}
fn default_weight_mutation_power() -> f32 {
    0.5
}
fn default_add_node_rate() -> f32 {
    0.2
}
fn default_add_connection_rate() -> f32 {
    0.3
}
fn default_toggle_rate() -> f32 {
    0.01
}
fn default_crossover_rate() -> f32 {
    0.75
}
fn default_elitism() -> usize {
    1
}
fn default_survival_threshold() -> f32 {
    0.2
}

/// Structural feasibility limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintConfig {
    /// Minimum fraction of grounded, occupied cells.
    #[serde(default = "default_min_fill")]
    pub min_fill: f32,
    /// Maximum fraction of grounded, occupied cells.
    #[serde(default = "default_max_fill")]
    pub max_fill: f32,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            min_fill: default_min_fill(),
            max_fill: default_max_fill(),
        }
    }
}

fn default_min_fill() -> f32 {
    0.02
}
fn default_max_fill() -> f32 {
    0.6
}

/// Compression model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Edge length of the pooling blocks.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Random feasible lattices generated to fit a missing seed model.
    #[serde(default = "default_bootstrap_samples")]
    pub bootstrap_samples: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            bootstrap_samples: default_bootstrap_samples(),
        }
    }
}

fn default_block_size() -> usize {
    5
}
fn default_bootstrap_samples() -> usize {
    200
}

impl ExperimentConfig {
    /// Total number of cells in one lattice.
    #[inline]
    pub fn lattice_size(&self) -> usize {
        self.lattice_shape.iter().product()
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lattice_shape.contains(&0) {
            return Err(ConfigError::InvalidShape);
        }
        if self.population_count == 0 {
            return Err(ConfigError::NoPopulations);
        }
        if self.phases.phase_count == 0 {
            return Err(ConfigError::InvalidPhaseCount);
        }
        if self.phases.generations_per_phase == 0 {
            return Err(ConfigError::InvalidGenerations);
        }
        if self.phases.snapshot_interval == 0 {
            return Err(ConfigError::InvalidSnapshotInterval);
        }
        if !(0.0..=1.0).contains(&self.phases.noise_rate) {
            return Err(ConfigError::InvalidProbability {
                name: "noise_rate",
                value: self.phases.noise_rate,
            });
        }
        if self.novelty.k_nearest == 0 {
            return Err(ConfigError::InvalidNeighbourCount);
        }
        if !self.speciation.step.is_finite() || self.speciation.step < 0.0 {
            return Err(ConfigError::InvalidStep(self.speciation.step));
        }
        if let Some((low, high)) = self.speciation.threshold_bounds
            && low > high
        {
            return Err(ConfigError::InvalidBounds { low, high });
        }
        if self.reproduction.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }

        let c = &self.constraints;
        if !(0.0..=1.0).contains(&c.min_fill)
            || !(0.0..=1.0).contains(&c.max_fill)
            || c.min_fill > c.max_fill
        {
            return Err(ConfigError::InvalidFill {
                min: c.min_fill,
                max: c.max_fill,
            });
        }
        if self.model.block_size == 0 {
            return Err(ConfigError::InvalidBlockSize);
        }

        let check_probability = |value: f32, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidProbability { name, value })
            }
        };
        let r = &self.reproduction;
        check_probability(r.weight_mutation_rate, "weight_mutation_rate")?;
        check_probability(r.add_node_rate, "add_node_rate")?;
        check_probability(r.add_connection_rate, "add_connection_rate")?;
        check_probability(r.toggle_rate, "toggle_rate")?;
        check_probability(r.crossover_rate, "crossover_rate")?;
        check_probability(r.survival_threshold, "survival_threshold")?;

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Lattice dimensions must be non-zero")]
    InvalidShape,
    #[error("At least one population is required")]
    NoPopulations,
    #[error("Phase count must be non-zero")]
    InvalidPhaseCount,
    #[error("Generations per phase must be non-zero")]
    InvalidGenerations,
    #[error("Snapshot interval must be non-zero")]
    InvalidSnapshotInterval,
    #[error("Nearest-neighbour count must be non-zero")]
    InvalidNeighbourCount,
    #[error("Speciation step must be finite and non-negative, got {0}")]
    InvalidStep(f32),
    #[error("Threshold bounds min ({low}) > max ({high})")]
    InvalidBounds { low: f32, high: f32 },
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Fill range [{min}, {max}] must be an ordered sub-range of [0, 1]")]
    InvalidFill { min: f32, max: f32 },
    #[error("Pooling block size must be non-zero")]
    InvalidBlockSize,
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f32 },
}
