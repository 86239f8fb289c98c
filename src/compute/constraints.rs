//! Structural feasibility rules for generated lattices.

use std::collections::VecDeque;

use crate::compute::evolution::FeasibilityCheck;
use crate::schema::{CellLabel, ConstraintConfig, Lattice};

/// Keeps only voxels connected to the ground layer and labels them by
/// exposure.
///
/// A lattice is feasible when its grounded fill fraction lies in
/// `[min_fill, max_fill]`.
#[derive(Debug, Clone, Copy)]
pub struct StructuralConstraints {
    pub min_fill: f32,
    pub max_fill: f32,
}

impl Default for StructuralConstraints {
    fn default() -> Self {
        Self::from_config(&ConstraintConfig::default())
    }
}

impl StructuralConstraints {
    pub fn new(min_fill: f32, max_fill: f32) -> Self {
        Self { min_fill, max_fill }
    }

    pub fn from_config(config: &ConstraintConfig) -> Self {
        Self::new(config.min_fill, config.max_fill)
    }

    /// Occupied cells reachable from `z = 0` through face-adjacent
    /// occupied cells.
    pub fn grounded(raw: &Lattice) -> Vec<bool> {
        let [nx, ny, nz] = raw.shape();
        let mut grounded = vec![false; raw.len()];
        let mut queue = VecDeque::new();

        for x in 0..nx {
            for y in 0..ny {
                if nz > 0 && raw.get(x, y, 0).is_occupied() {
                    grounded[raw.index(x, y, 0)] = true;
                    queue.push_back((x, y, 0));
                }
            }
        }

        while let Some((x, y, z)) = queue.pop_front() {
            for (a, b, c) in neighbours(x, y, z, [nx, ny, nz]) {
                let idx = raw.index(a, b, c);
                if !grounded[idx] && raw.get(a, b, c).is_occupied() {
                    grounded[idx] = true;
                    queue.push_back((a, b, c));
                }
            }
        }
        grounded
    }

    /// Label every grounded cell by its exposure.
    pub fn label(raw: &Lattice) -> Lattice {
        let grounded = Self::grounded(raw);
        let shape = raw.shape();
        let [nx, ny, nz] = shape;
        let solid = |x: usize, y: usize, z: usize| grounded[(x * ny + y) * nz + z];

        Lattice::from_fn(shape, |x, y, z| {
            if !solid(x, y, z) {
                CellLabel::Empty
            } else if z + 1 == nz || !solid(x, y, z + 1) {
                CellLabel::Roof
            } else if z == 0 || !solid(x, y, z - 1) {
                CellLabel::Floor
            } else if x == 0
                || y == 0
                || x + 1 == nx
                || y + 1 == ny
                || !solid(x - 1, y, z)
                || !solid(x + 1, y, z)
                || !solid(x, y - 1, z)
                || !solid(x, y + 1, z)
            {
                CellLabel::Wall
            } else {
                CellLabel::Interior
            }
        })
    }
}

fn neighbours(
    x: usize,
    y: usize,
    z: usize,
    shape: [usize; 3],
) -> impl Iterator<Item = (usize, usize, usize)> {
    let offsets: [(isize, isize, isize); 6] = [
        (-1, 0, 0),
        (1, 0, 0),
        (0, -1, 0),
        (0, 1, 0),
        (0, 0, -1),
        (0, 0, 1),
    ];
    offsets.into_iter().filter_map(move |(dx, dy, dz)| {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        let nz = z.checked_add_signed(dz)?;
        (nx < shape[0] && ny < shape[1] && nz < shape[2]).then_some((nx, ny, nz))
    })
}

impl FeasibilityCheck for StructuralConstraints {
    fn check(&self, raw: &Lattice) -> (bool, Lattice) {
        let labeled = Self::label(raw);
        let fill = labeled.occupied() as f32 / labeled.len().max(1) as f32;
        let feasible = labeled.occupied() > 0 && fill >= self.min_fill && fill <= self.max_fill;
        (feasible, labeled)
    }
}
