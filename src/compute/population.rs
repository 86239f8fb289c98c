//! Speciated CPPN population.

use std::collections::BTreeMap;

use crate::compute::cppn::{CppnGenome, CppnRng};
use crate::compute::evolution::{GenomeId, Population};
use crate::schema::ReproductionConfig;

#[derive(Debug, Clone)]
struct Member {
    genome: CppnGenome,
    fitness: Option<f32>,
}

/// A species: a representative genome and the ids assigned to it.
#[derive(Debug, Clone)]
pub struct Species {
    pub id: usize,
    representative: CppnGenome,
    pub members: Vec<GenomeId>,
}

/// Threshold-speciated population of [`CppnGenome`]s.
///
/// Genomes join the first species whose representative lies within the
/// compatibility threshold. Offspring are allocated to species in
/// proportion to mean member fitness.
pub struct SpeciatedPopulation {
    config: ReproductionConfig,
    rng: CppnRng,
    members: BTreeMap<GenomeId, Member>,
    species: Vec<Species>,
    threshold: f32,
    next_id: GenomeId,
    next_species: usize,
}

impl SpeciatedPopulation {
    /// Create a population of `config.population_size` minimal genomes.
    pub fn new(config: ReproductionConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => CppnRng::new(seed),
            None => CppnRng::random(),
        };
        let mut population = Self {
            threshold: config.compatibility_threshold,
            config,
            rng,
            members: BTreeMap::new(),
            species: Vec::new(),
            next_id: 0,
            next_species: 0,
        };
        population.reset();
        population
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    fn insert(&mut self, genome: CppnGenome) {
        let id = self.next_id;
        self.next_id += 1;
        self.members.insert(
            id,
            Member {
                genome,
                fitness: None,
            },
        );
    }

    fn fill_random(&mut self) {
        while self.members.len() < self.config.population_size {
            let genome = self.rng.random_genome();
            self.insert(genome);
        }
    }

    /// Assign every member to a species, keeping existing representatives.
    fn speciate(&mut self) {
        for species in &mut self.species {
            species.members.clear();
        }
        for (id, member) in &self.members {
            let found = self.species.iter_mut().find(|s| {
                s.representative.distance(
                    &member.genome,
                    self.config.disjoint_coefficient,
                    self.config.weight_coefficient,
                ) < self.threshold
            });
            match found {
                Some(species) => species.members.push(*id),
                None => {
                    self.species.push(Species {
                        id: self.next_species,
                        representative: member.genome.clone(),
                        members: vec![*id],
                    });
                    self.next_species += 1;
                }
            }
        }
        self.species.retain(|s| !s.members.is_empty());
        for species in &mut self.species {
            if let Some(member) = species.members.first().and_then(|id| self.members.get(id)) {
                species.representative = member.genome.clone();
            }
        }
    }

    fn fitness_of(&self, id: GenomeId) -> f32 {
        self.members
            .get(&id)
            .and_then(|m| m.fitness)
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// Offspring count per species, summing to the population size.
    fn allocate(&self) -> Vec<usize> {
        let size = self.config.population_size;
        let means: Vec<f32> = self
            .species
            .iter()
            .map(|s| {
                s.members.iter().map(|id| self.fitness_of(*id)).sum::<f32>()
                    / s.members.len().max(1) as f32
            })
            .collect();
        let total: f32 = means.iter().sum();

        let mut counts: Vec<usize> = if total > 0.0 {
            means
                .iter()
                .map(|m| (m / total * size as f32).floor() as usize)
                .collect()
        } else {
            vec![size / self.species.len().max(1); self.species.len()]
        };

        let assigned: usize = counts.iter().sum();
        if let Some(best) = means
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
        {
            counts[best] += size.saturating_sub(assigned);
        }
        counts
    }

    fn breed(&mut self, species: &Species, count: usize) -> Vec<CppnGenome> {
        let mut ranked = species.members.clone();
        ranked.sort_by(|a, b| self.fitness_of(*b).total_cmp(&self.fitness_of(*a)).then(a.cmp(b)));
        let genome = |id: &GenomeId| self.members.get(id).map(|m| m.genome.clone());
        let ranked: Vec<(f32, CppnGenome)> = ranked
            .iter()
            .filter_map(|id| genome(id).map(|g| (self.fitness_of(*id), g)))
            .collect();
        if ranked.is_empty() {
            return Vec::new();
        }

        let mut children: Vec<CppnGenome> = ranked
            .iter()
            .take(self.config.elitism.min(count))
            .map(|(_, g)| g.clone())
            .collect();

        let survivors = ((ranked.len() as f32 * self.config.survival_threshold).ceil() as usize)
            .clamp(1, ranked.len());
        while children.len() < count {
            let first = self.rng.index(survivors);
            let mut child = if survivors > 1 && self.rng.unit() < self.config.crossover_rate {
                let second = self.rng.index(survivors);
                let (fitter, other) = if ranked[first].0 >= ranked[second].0 {
                    (&ranked[first].1, &ranked[second].1)
                } else {
                    (&ranked[second].1, &ranked[first].1)
                };
                self.rng.crossover(fitter, other)
            } else {
                ranked[first].1.clone()
            };
            self.rng.mutate(&mut child, &self.config);
            children.push(child);
        }
        children
    }
}

impl Population for SpeciatedPopulation {
    type Genome = CppnGenome;

    fn reset(&mut self) {
        self.members.clear();
        self.species.clear();
        self.threshold = self.config.compatibility_threshold;
        self.fill_random();
        self.speciate();
    }

    fn members(&self) -> Vec<(GenomeId, &CppnGenome)> {
        self.members.iter().map(|(id, m)| (*id, &m.genome)).collect()
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    fn fitness(&self, id: GenomeId) -> Option<f32> {
        self.members.get(&id).and_then(|m| m.fitness)
    }

    fn set_fitness(&mut self, id: GenomeId, fitness: f32) {
        if let Some(member) = self.members.get_mut(&id) {
            member.fitness = Some(fitness);
        }
    }

    fn remove(&mut self, id: GenomeId) -> bool {
        if self.members.remove(&id).is_none() {
            return false;
        }
        for species in &mut self.species {
            species.members.retain(|m| *m != id);
        }
        self.species.retain(|s| !s.members.is_empty());
        true
    }

    fn species_sizes(&self) -> Vec<usize> {
        self.species.iter().map(|s| s.members.len()).collect()
    }

    fn compatibility_threshold(&self) -> f32 {
        self.threshold
    }

    fn set_compatibility_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    fn reproduce(&mut self) {
        if self.members.is_empty() {
            log::warn!("Population culled entirely, refilling with random genomes");
            self.species.clear();
            self.fill_random();
            self.speciate();
            return;
        }

        let counts = self.allocate();
        let species = self.species.clone();
        let mut next = Vec::with_capacity(self.config.population_size);
        for (species, count) in species.iter().zip(counts) {
            next.extend(self.breed(species, count));
        }

        self.members.clear();
        for genome in next {
            self.insert(genome);
        }
        self.fill_random();
        self.speciate();
    }
}
