//! Voxel lattice and latent vector types.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of distinct cell labels.
pub const LABEL_COUNT: usize = 5;

/// Categorical label of a single lattice cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum CellLabel {
    #[default]
    Empty = 0,
    Interior = 1,
    Wall = 2,
    Floor = 3,
    Roof = 4,
}

impl CellLabel {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CellLabel::Empty),
            1 => Some(CellLabel::Interior),
            2 => Some(CellLabel::Wall),
            3 => Some(CellLabel::Floor),
            4 => Some(CellLabel::Roof),
            _ => None,
        }
    }

    /// Round a raw activation to the nearest label, saturating at both ends.
    pub fn from_activation(value: f32) -> Self {
        if !value.is_finite() {
            return CellLabel::Empty;
        }
        let rounded = value.round().clamp(0.0, (LABEL_COUNT - 1) as f32) as u8;
        Self::from_u8(rounded).unwrap_or_default()
    }

    #[inline]
    pub fn is_occupied(self) -> bool {
        self != CellLabel::Empty
    }
}

/// Fixed-shape 3D grid of cell labels.
///
/// Cells are stored x-major: `index = (x * ny + y) * nz + z`, with `z` as the
/// vertical axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lattice {
    shape: [usize; 3],
    cells: Vec<CellLabel>,
}

impl Lattice {
    /// Create an empty lattice.
    pub fn empty(shape: [usize; 3]) -> Self {
        Self {
            shape,
            cells: vec![CellLabel::Empty; shape[0] * shape[1] * shape[2]],
        }
    }

    /// Create a lattice from raw cells. Returns `None` if the cell count does
    /// not match the shape.
    pub fn from_cells(shape: [usize; 3], cells: Vec<CellLabel>) -> Option<Self> {
        (cells.len() == shape[0] * shape[1] * shape[2]).then_some(Self { shape, cells })
    }

    /// Build a lattice by evaluating `f` at every integer coordinate.
    pub fn from_fn<F>(shape: [usize; 3], mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> CellLabel,
    {
        let mut cells = Vec::with_capacity(shape[0] * shape[1] * shape[2]);
        for x in 0..shape[0] {
            for y in 0..shape[1] {
                for z in 0..shape[2] {
                    cells.push(f(x, y, z));
                }
            }
        }
        Self { shape, cells }
    }

    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.shape[1] + y) * self.shape[2] + z
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> CellLabel {
        self.cells[self.index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, label: CellLabel) {
        let idx = self.index(x, y, z);
        self.cells[idx] = label;
    }

    pub fn cells(&self) -> &[CellLabel] {
        &self.cells
    }

    /// Number of non-empty cells.
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_occupied()).count()
    }

    /// Copy with each cell replaced by a uniformly random label with
    /// probability `rate`.
    pub fn with_noise<R: Rng + ?Sized>(&self, rate: f32, rng: &mut R) -> Self {
        let rate = rate.clamp(0.0, 1.0) as f64;
        let cells = self
            .cells
            .iter()
            .map(|&cell| {
                if rng.gen_bool(rate) {
                    CellLabel::from_u8(rng.gen_range(0..LABEL_COUNT as u8)).unwrap_or_default()
                } else {
                    cell
                }
            })
            .collect();
        Self {
            shape: self.shape,
            cells,
        }
    }
}

/// Fixed-dimension latent representation of a lattice.
///
/// Equality is exact element-wise equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentVector(pub Vec<f32>);

impl LatentVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &LatentVector) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

impl From<Vec<f32>> for LatentVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_label_rounding() {
        assert_eq!(CellLabel::from_activation(0.49), CellLabel::Empty);
        assert_eq!(CellLabel::from_activation(0.51), CellLabel::Interior);
        assert_eq!(CellLabel::from_activation(-3.0), CellLabel::Empty);
        assert_eq!(CellLabel::from_activation(9.0), CellLabel::Roof);
        assert_eq!(CellLabel::from_activation(f32::NAN), CellLabel::Empty);
    }

    #[test]
    fn test_from_fn_indexing() {
        let lattice = Lattice::from_fn([2, 3, 4], |x, y, z| {
            if x == 1 && y == 2 && z == 3 {
                CellLabel::Roof
            } else {
                CellLabel::Empty
            }
        });
        assert_eq!(lattice.len(), 24);
        assert_eq!(lattice.get(1, 2, 3), CellLabel::Roof);
        assert_eq!(lattice.occupied(), 1);
        assert_eq!(lattice.index(1, 2, 3), 23);
    }

    #[test]
    fn test_from_cells_rejects_bad_shape() {
        assert!(Lattice::from_cells([2, 2, 2], vec![CellLabel::Empty; 7]).is_none());
        assert!(Lattice::from_cells([2, 2, 2], vec![CellLabel::Empty; 8]).is_some());
    }

    #[test]
    fn test_noise_rate_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        let lattice = Lattice::from_fn([4, 4, 4], |_, _, _| CellLabel::Wall);
        assert_eq!(lattice.with_noise(0.0, &mut rng), lattice);

        let noisy = lattice.with_noise(1.0, &mut rng);
        assert_eq!(noisy.shape(), lattice.shape());
        assert_ne!(noisy, lattice);
    }

    #[test]
    fn test_latent_distance() {
        let a = LatentVector::new(vec![0.0, 0.0]);
        let b = LatentVector::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.distance(&a), 0.0);
    }
}
