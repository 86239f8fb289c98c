//! Per-phase metrics and hand-off artifacts.

use serde::{Deserialize, Serialize};

use super::Lattice;

/// Time series recorded once per generation over a phase.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhaseMetrics {
    /// Experiment name.
    pub experiment: String,
    /// Population this record belongs to.
    pub population_id: usize,
    /// Phase index.
    pub phase: usize,
    /// Mean novelty of feasible genomes.
    pub mean_novelty: Vec<f32>,
    /// Best novelty of feasible genomes.
    pub best_novelty: Vec<f32>,
    /// Average node count across the surviving population.
    pub node_complexity: Vec<f32>,
    /// Average enabled connection count across the surviving population.
    pub connection_complexity: Vec<f32>,
    /// Genomes culled as infeasible.
    pub infeasible_count: Vec<usize>,
    /// Archive vector count after growth.
    pub archive_size: Vec<usize>,
    /// Number of species.
    pub species_count: Vec<usize>,
    pub min_species_size: Vec<usize>,
    pub max_species_size: Vec<usize>,
    pub mean_species_size: Vec<f32>,
    /// Compatibility threshold after the controller step.
    pub compatibility_threshold: Vec<f32>,
}

impl PhaseMetrics {
    pub fn new(experiment: &str, population_id: usize, phase: usize) -> Self {
        Self {
            experiment: experiment.to_string(),
            population_id,
            phase,
            ..Default::default()
        }
    }

    /// Number of generations recorded.
    pub fn len(&self) -> usize {
        self.mean_novelty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean_novelty.is_empty()
    }

    /// Append one generation's entry.
    pub fn record(&mut self, entry: &GenerationRecord) {
        self.mean_novelty.push(entry.mean_novelty);
        self.best_novelty.push(entry.best_novelty);
        self.node_complexity.push(entry.node_complexity);
        self.connection_complexity.push(entry.connection_complexity);
        self.infeasible_count.push(entry.infeasible);
        self.archive_size.push(entry.archive_size);
        self.species_count.push(entry.species.count);
        self.min_species_size.push(entry.species.min);
        self.max_species_size.push(entry.species.max);
        self.mean_species_size.push(entry.species.mean);
        self.compatibility_threshold.push(entry.compatibility_threshold);
    }
}

/// Species-size extrema for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeciesSummary {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f32,
}

impl SpeciesSummary {
    /// Summarize species sizes. An empty set yields all zeros.
    pub fn from_sizes(sizes: &[usize]) -> Self {
        if sizes.is_empty() {
            return Self::default();
        }
        Self {
            count: sizes.len(),
            min: sizes.iter().copied().min().unwrap_or(0),
            max: sizes.iter().copied().max().unwrap_or(0),
            mean: sizes.iter().sum::<usize>() as f32 / sizes.len() as f32,
        }
    }
}

/// One generation's metrics entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    pub mean_novelty: f32,
    pub best_novelty: f32,
    pub node_complexity: f32,
    pub connection_complexity: f32,
    pub infeasible: usize,
    pub feasible: usize,
    pub archive_size: usize,
    pub species: SpeciesSummary,
    pub compatibility_threshold: f32,
}

/// Which lattices a phase hands to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Handoff {
    /// Every lattice added to the archive.
    #[default]
    Archive,
    /// The top-ranked lattices of the final generation.
    BestFit,
}

/// Output of one completed phase.
#[derive(Debug, Clone)]
pub struct PhaseArtifacts {
    pub phase: usize,
    pub population_id: usize,
    pub metrics: PhaseMetrics,
    pub lattices: Vec<Lattice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_summary() {
        let summary = SpeciesSummary::from_sizes(&[3, 7, 5]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 3);
        assert_eq!(summary.max, 7);
        assert!((summary.mean - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_species_summary_empty() {
        assert_eq!(SpeciesSummary::from_sizes(&[]), SpeciesSummary::default());
    }

    #[test]
    fn test_record_appends() {
        let mut metrics = PhaseMetrics::new("exp", 0, 1);
        let entry = GenerationRecord {
            generation: 0,
            mean_novelty: 1.5,
            best_novelty: 3.0,
            node_complexity: 2.0,
            connection_complexity: 4.0,
            infeasible: 2,
            feasible: 8,
            archive_size: 3,
            species: SpeciesSummary::from_sizes(&[4, 4]),
            compatibility_threshold: 3.0,
        };
        metrics.record(&entry);
        metrics.record(&entry);
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.species_count, vec![2, 2]);
        assert_eq!(metrics.infeasible_count, vec![2, 2]);
    }

    #[test]
    fn test_metrics_serialization() {
        let metrics = PhaseMetrics::new("exp", 2, 3);
        let json = serde_json::to_string(&metrics).unwrap();
        let parsed: PhaseMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population_id, 2);
        assert_eq!(parsed.phase, 3);
    }
}
