//! Novelty archive of previously rewarded lattices.

use crate::schema::{LatentVector, Lattice};

use super::interfaces::{CompressionModel, GenomeId};

/// A feasible individual after fitness assignment.
#[derive(Debug, Clone)]
pub struct RankedIndividual {
    pub id: GenomeId,
    pub fitness: f32,
    pub lattice: Lattice,
    pub vector: LatentVector,
}

/// Sort individuals by fitness ascending, ties broken by genome id.
pub fn rank_ascending(individuals: &mut [RankedIndividual]) {
    individuals.sort_by(|a, b| a.fitness.total_cmp(&b.fitness).then(a.id.cmp(&b.id)));
}

/// Outcome of one archive growth step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveGrowth {
    pub lattices_added: usize,
    pub vectors_added: usize,
}

/// Archive of novel lattices and their latent vectors.
///
/// The lattice list is the stable record; it grows by one entry per admitted
/// individual, duplicates included. The vector list belongs to the current
/// phase's latent space, holds no two exactly equal vectors, and is rebuilt
/// by [`reencode`](Self::reencode) whenever the model changes.
#[derive(Debug, Default, Clone)]
pub struct NoveltyArchive {
    lattices: Vec<Lattice>,
    vectors: Vec<LatentVector>,
}

impl NoveltyArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lattices(&self) -> &[Lattice] {
        &self.lattices
    }

    pub fn vectors(&self) -> &[LatentVector] {
        &self.vectors
    }

    /// Number of distinct vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Whether an exactly equal vector is already archived.
    pub fn contains(&self, vector: &LatentVector) -> bool {
        self.vectors.iter().any(|v| v == vector)
    }

    /// Record `lattice` unconditionally and `vector` only if it is new.
    ///
    /// Returns true if the vector was added.
    pub fn admit(&mut self, lattice: Lattice, vector: LatentVector) -> bool {
        self.lattices.push(lattice);
        if self.contains(&vector) {
            false
        } else {
            self.vectors.push(vector);
            true
        }
    }

    /// Admit the `count` most novel of `ranked` (sorted ascending), encoding
    /// each lattice under `model`.
    pub fn grow(
        &mut self,
        ranked: &[RankedIndividual],
        count: usize,
        model: &dyn CompressionModel,
    ) -> ArchiveGrowth {
        let mut growth = ArchiveGrowth::default();
        for individual in ranked.iter().rev().take(count) {
            let vector = model.encode(&individual.lattice);
            if self.admit(individual.lattice.clone(), vector) {
                growth.vectors_added += 1;
            }
            growth.lattices_added += 1;
        }
        growth
    }

    /// Rebuild the vector list from the stored lattices under `model`.
    pub fn reencode(&mut self, model: &dyn CompressionModel) {
        self.vectors.clear();
        for lattice in &self.lattices {
            let vector = model.encode(lattice);
            if !self.vectors.contains(&vector) {
                self.vectors.push(vector);
            }
        }
    }

    /// Empty both lists.
    pub fn clear(&mut self) {
        self.lattices.clear();
        self.vectors.clear();
    }
}
