//! Block-pooled lattice encoder.
//!
//! The lattice is tiled into cubic blocks; each block contributes one
//! feature per occupied label (the fraction of its cells carrying that
//! label). Features are standardized by a mean and scale fitted on a
//! training set of lattices.

use serde::{Deserialize, Serialize};

use crate::compute::evolution::CompressionModel;
use crate::schema::{LABEL_COUNT, LatentVector, Lattice};

/// Scales below this are treated as constant features.
const MIN_SCALE: f32 = 1e-6;

/// Occupied labels (every label except `Empty`).
const FEATURE_LABELS: usize = LABEL_COUNT - 1;

/// Inconsistent encoder parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncoderError {
    #[error("block_size must be > 0")]
    ZeroBlockSize,
    #[error("mean has {mean} and scale has {scale} entries, shape needs {expected}")]
    DimensionMismatch {
        mean: usize,
        scale: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledEncoder {
    shape: [usize; 3],
    block_size: usize,
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl PooledEncoder {
    /// Unfitted encoder: zero mean, unit scale.
    pub fn identity(shape: [usize; 3], block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let dim = Self::dim_for(shape, block_size);
        Self {
            shape,
            block_size,
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        }
    }

    /// Fit the standardization to `lattices`.
    pub fn fit(shape: [usize; 3], block_size: usize, lattices: &[Lattice]) -> Self {
        let mut encoder = Self::identity(shape, block_size);
        if lattices.is_empty() {
            log::warn!("Fitting encoder on an empty training set, using identity scaling");
            return encoder;
        }

        let features: Vec<Vec<f32>> = lattices.iter().map(|l| encoder.features(l)).collect();
        let n = features.len() as f32;
        let dim = encoder.mean.len();

        for i in 0..dim {
            let mean = features.iter().map(|f| f[i]).sum::<f32>() / n;
            let var = features.iter().map(|f| (f[i] - mean).powi(2)).sum::<f32>() / n;
            encoder.mean[i] = mean;
            encoder.scale[i] = if var.sqrt() > MIN_SCALE { var.sqrt() } else { 1.0 };
        }
        log::debug!(
            "Fitted {}-dimensional encoder on {} lattices",
            dim,
            lattices.len()
        );
        encoder
    }

    fn blocks(shape: [usize; 3], block_size: usize) -> [usize; 3] {
        shape.map(|d| d.div_ceil(block_size))
    }

    fn dim_for(shape: [usize; 3], block_size: usize) -> usize {
        Self::blocks(shape, block_size).iter().product::<usize>() * FEATURE_LABELS
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Check parameters loaded from outside [`PooledEncoder::fit`].
    pub fn validate(&self) -> Result<(), EncoderError> {
        if self.block_size == 0 {
            return Err(EncoderError::ZeroBlockSize);
        }
        let expected = Self::dim_for(self.shape, self.block_size);
        if self.mean.len() != expected || self.scale.len() != expected {
            return Err(EncoderError::DimensionMismatch {
                mean: self.mean.len(),
                scale: self.scale.len(),
                expected,
            });
        }
        Ok(())
    }

    /// Raw pooled label fractions. Cells outside `lattice` count as empty.
    pub fn features(&self, lattice: &Lattice) -> Vec<f32> {
        let [bx, by, bz] = Self::blocks(self.shape, self.block_size);
        let [lx, ly, lz] = lattice.shape();
        let b = self.block_size;
        let mut counts = vec![0.0f32; bx * by * bz * FEATURE_LABELS];
        let mut totals = vec![0.0f32; bx * by * bz];

        for x in 0..self.shape[0] {
            for y in 0..self.shape[1] {
                for z in 0..self.shape[2] {
                    let block = ((x / b) * by + y / b) * bz + z / b;
                    totals[block] += 1.0;
                    if x < lx && y < ly && z < lz {
                        let label = lattice.get(x, y, z) as usize;
                        if label > 0 {
                            counts[block * FEATURE_LABELS + label - 1] += 1.0;
                        }
                    }
                }
            }
        }

        for (i, count) in counts.iter_mut().enumerate() {
            *count /= totals[i / FEATURE_LABELS].max(1.0);
        }
        counts
    }
}

impl CompressionModel for PooledEncoder {
    fn latent_dim(&self) -> usize {
        self.mean.len()
    }

    fn encode(&self, lattice: &Lattice) -> LatentVector {
        let values = self
            .features(lattice)
            .into_iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(f, (m, s))| (f - m) / s)
            .collect();
        LatentVector::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CellLabel;

    fn layered(height: usize) -> Lattice {
        Lattice::from_fn([4, 4, 4], |_, _, z| {
            if z < height { CellLabel::Wall } else { CellLabel::Empty }
        })
    }

    #[test]
    fn test_dimension() {
        let encoder = PooledEncoder::identity([4, 4, 4], 2);
        assert_eq!(encoder.latent_dim(), 8 * FEATURE_LABELS);
        let partial = PooledEncoder::identity([5, 4, 4], 2);
        assert_eq!(partial.latent_dim(), 12 * FEATURE_LABELS);
    }

    #[test]
    fn test_identity_features() {
        let encoder = PooledEncoder::identity([4, 4, 4], 4);
        let vector = encoder.encode(&layered(2));
        // One block: half the cells are walls.
        let wall = CellLabel::Wall as usize - 1;
        assert_eq!(vector.0[wall], 0.5);
        assert_eq!(vector.0.iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn test_fit_standardizes() {
        let training: Vec<Lattice> = (0..=4).map(layered).collect();
        let encoder = PooledEncoder::fit([4, 4, 4], 4, &training);
        let encoded = encoder.encode_batch(&training);

        let wall = CellLabel::Wall as usize - 1;
        let mean: f32 = encoded.iter().map(|v| v.0[wall]).sum::<f32>() / 5.0;
        assert!(mean.abs() < 1e-5);
        // Constant features keep unit scale.
        assert_eq!(encoder.scale[0], 1.0);
    }

    #[test]
    fn test_distinct_lattices_distinct_vectors() {
        let encoder = PooledEncoder::fit([4, 4, 4], 2, &[layered(1), layered(3)]);
        assert_ne!(encoder.encode(&layered(1)), encoder.encode(&layered(3)));
    }

    #[test]
    fn test_validate() {
        let encoder = PooledEncoder::fit([4, 4, 4], 2, &[layered(1), layered(2)]);
        assert_eq!(encoder.validate(), Ok(()));

        let zero_block = PooledEncoder {
            block_size: 0,
            ..encoder.clone()
        };
        assert_eq!(zero_block.validate(), Err(EncoderError::ZeroBlockSize));

        let mut short = encoder.clone();
        short.scale.pop();
        assert!(matches!(
            short.validate(),
            Err(EncoderError::DimensionMismatch { expected: 32, .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let encoder = PooledEncoder::fit([4, 4, 4], 2, &[layered(1), layered(2)]);
        let json = serde_json::to_string(&encoder).unwrap();
        let parsed: PooledEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, encoder);
    }
}
