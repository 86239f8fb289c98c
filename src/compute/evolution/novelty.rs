//! Novelty scoring in latent space.
//!
//! Two aggregation policies live here and must stay distinct:
//!
//! - [`novelty`] drives evolution. Exact copies of the candidate are removed
//!   from the comparison set, then the `k` nearest distances are averaged.
//! - [`population_novelty`] is a population-level diagnostic. Nothing is
//!   removed, and the mean covers ranks 2 through 6 (the single nearest
//!   neighbour is skipped).

use crate::schema::LatentVector;

/// Neighbour ranks averaged by [`population_novelty`] (2nd through 6th).
const DIAGNOSTIC_RANKS: std::ops::Range<usize> = 1..6;

/// Round to two decimal places.
#[inline]
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Sorted Euclidean distances from `candidate` to `neighbours`.
fn sorted_distances<'a, I>(candidate: &LatentVector, neighbours: I, skip_equal: bool) -> Vec<f32>
where
    I: IntoIterator<Item = &'a LatentVector>,
{
    let mut distances: Vec<f32> = neighbours
        .into_iter()
        .filter(|n| !(skip_equal && *n == candidate))
        .map(|n| candidate.distance(n))
        .collect();
    distances.sort_by(f32::total_cmp);
    distances
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Novelty of `candidate`: the mean distance to its `k` nearest neighbours
/// among `population` and `archive`, rounded to two decimals.
///
/// Vectors exactly equal to `candidate` never count as neighbours. With fewer
/// than `k` neighbours the mean covers whatever is available; with none the
/// score is `0.0`.
pub fn novelty(
    candidate: &LatentVector,
    population: &[LatentVector],
    archive: &[LatentVector],
    k: usize,
) -> f32 {
    let distances = sorted_distances(candidate, population.iter().chain(archive), true);
    let nearest = &distances[..k.min(distances.len())];
    round2(mean(nearest))
}

/// Diagnostic novelty of `candidate` within `population`: the mean distance
/// to its 2nd..6th nearest members, rounded to two decimals.
///
/// The candidate is not excluded, so when it is a member its zero
/// self-distance occupies the skipped first rank.
pub fn population_novelty(candidate: &LatentVector, population: &[LatentVector]) -> f32 {
    let distances = sorted_distances(candidate, population, false);
    let start = DIAGNOSTIC_RANKS.start.min(distances.len());
    let end = DIAGNOSTIC_RANKS.end.min(distances.len());
    round2(mean(&distances[start..end]))
}

/// [`population_novelty`] for every member of `population`.
pub fn population_novelty_scores(population: &[LatentVector]) -> Vec<f32> {
    population
        .iter()
        .map(|v| population_novelty(v, population))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(values: &[f32]) -> LatentVector {
        LatentVector::new(values.to_vec())
    }

    #[test]
    fn test_k_nearest_mean() {
        let candidate = v(&[0.0, 0.0]);
        let population = vec![v(&[1.0, 0.0]), v(&[0.0, 2.0]), v(&[3.0, 0.0])];
        assert_eq!(novelty(&candidate, &population, &[], 2), 1.5);
    }

    #[test]
    fn test_archive_joins_comparison_set() {
        let candidate = v(&[0.0, 0.0]);
        let population = vec![v(&[4.0, 0.0])];
        let archive = vec![v(&[0.0, 1.0])];
        assert_eq!(novelty(&candidate, &population, &archive, 1), 1.0);
        assert_eq!(novelty(&candidate, &population, &archive, 2), 2.5);
    }

    #[test]
    fn test_self_excluded() {
        // Two-element latent space: the candidate itself is in the population.
        let candidate = v(&[0.5, 0.5]);
        let population = vec![candidate.clone(), v(&[0.5, 1.5])];
        assert_eq!(novelty(&candidate, &population, &[], 1), 1.0);
        assert_eq!(novelty(&candidate, &population, &[], 5), 1.0);
    }

    #[test]
    fn test_exact_copies_in_archive_excluded() {
        let candidate = v(&[1.0, 1.0]);
        let archive = vec![candidate.clone(), candidate.clone(), v(&[1.0, 3.0])];
        assert_eq!(novelty(&candidate, &[], &archive, 3), 2.0);
    }

    #[test]
    fn test_fewer_than_k_neighbours() {
        let candidate = v(&[0.0]);
        let population = vec![v(&[2.0]), v(&[4.0])];
        assert_eq!(novelty(&candidate, &population, &[], 10), 3.0);
    }

    #[test]
    fn test_empty_comparison_set() {
        let candidate = v(&[1.0, 2.0]);
        assert_eq!(novelty(&candidate, &[], &[], 5), 0.0);
        assert_eq!(novelty(&candidate, &[candidate.clone()], &[], 5), 0.0);
    }

    #[test]
    fn test_rounding() {
        let candidate = v(&[0.0]);
        let population = vec![v(&[1.0 / 3.0])];
        assert_eq!(novelty(&candidate, &population, &[], 1), 0.33);
    }

    #[test]
    fn test_population_novelty_skips_nearest_rank() {
        let candidate = v(&[0.0]);
        let population: Vec<LatentVector> = (0..8).map(|i| v(&[i as f32])).collect();
        // Distances 0..7; ranks 2..6 are 1, 2, 3, 4, 5.
        assert_eq!(population_novelty(&candidate, &population), 3.0);
    }

    #[test]
    fn test_policies_differ() {
        let candidate = v(&[0.0]);
        let population: Vec<LatentVector> = (0..8).map(|i| v(&[i as f32])).collect();
        // Evolution policy drops the self-match and averages ranks 1..5: 1..5.
        assert_eq!(novelty(&candidate, &population, &[], 5), 3.0);
        // Without the self-match, the diagnostic skips distance 1 instead.
        let others = &population[1..];
        assert_eq!(population_novelty(&candidate, others), 4.0);
        assert_eq!(novelty(&candidate, others, &[], 5), 3.0);
    }

    #[test]
    fn test_population_novelty_small_population() {
        let candidate = v(&[0.0]);
        assert_eq!(population_novelty(&candidate, &[]), 0.0);
        assert_eq!(population_novelty(&candidate, &[v(&[1.0])]), 0.0);
        assert_eq!(population_novelty(&candidate, &[v(&[1.0]), v(&[3.0])]), 3.0);
    }

    #[test]
    fn test_population_scores_length() {
        let population: Vec<LatentVector> = (0..4).map(|i| v(&[i as f32, 0.0])).collect();
        let scores = population_novelty_scores(&population);
        assert_eq!(scores.len(), 4);
        assert!(scores.iter().all(|s| *s > 0.0));
    }

    fn vectors(dim: usize, max: usize) -> impl Strategy<Value = Vec<LatentVector>> {
        prop::collection::vec(
            prop::collection::vec(-10.0f32..10.0, dim).prop_map(LatentVector::new),
            0..max,
        )
    }

    proptest! {
        #[test]
        fn prop_novelty_order_invariant(
            candidate in prop::collection::vec(-10.0f32..10.0, 3).prop_map(LatentVector::new),
            population in vectors(3, 12),
            archive in vectors(3, 12),
            k in 1usize..8,
        ) {
            let forward = novelty(&candidate, &population, &archive, k);
            let mut rev_pop = population.clone();
            rev_pop.reverse();
            let mut rev_arch = archive.clone();
            rev_arch.reverse();
            // Swapping the two sources is also a reordering of the union.
            let swapped = novelty(&candidate, &rev_arch, &rev_pop, k);
            prop_assert_eq!(forward, swapped);
        }

        #[test]
        fn prop_novelty_non_negative(
            candidate in prop::collection::vec(-10.0f32..10.0, 2).prop_map(LatentVector::new),
            population in vectors(2, 10),
            k in 1usize..12,
        ) {
            prop_assert!(novelty(&candidate, &population, &[], k) >= 0.0);
        }

        #[test]
        fn prop_self_never_contributes(
            population in vectors(2, 10),
            k in 1usize..12,
        ) {
            for candidate in &population {
                let others: Vec<LatentVector> =
                    population.iter().filter(|p| *p != candidate).cloned().collect();
                prop_assert_eq!(
                    novelty(candidate, &population, &[], k),
                    novelty(candidate, &others, &[], k)
                );
            }
        }
    }
}
