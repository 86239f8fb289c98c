//! Step controller for the species compatibility threshold.

use crate::schema::SpeciationConfig;

/// Nudges the compatibility threshold toward a target species count.
///
/// Fewer species than the target lowers the threshold by one step, more
/// raises it, and an exact match leaves it alone. There is no integral or
/// derivative term, so without `bounds` the threshold can drift freely.
#[derive(Debug, Clone)]
pub struct SpeciationController {
    target: usize,
    step: f32,
    bounds: Option<(f32, f32)>,
}

impl SpeciationController {
    pub fn new(target: usize, step: f32) -> Self {
        Self {
            target,
            step,
            bounds: None,
        }
    }

    /// Clamp every adjusted threshold into `[low, high]`.
    pub fn with_bounds(mut self, low: f32, high: f32) -> Self {
        self.bounds = Some((low, high));
        self
    }

    pub fn from_config(config: &SpeciationConfig) -> Self {
        let controller = Self::new(config.target_species, config.step);
        match config.threshold_bounds {
            Some((low, high)) => controller.with_bounds(low, high),
            None => controller,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Threshold for the next generation.
    pub fn next_threshold(&self, species_count: usize, threshold: f32) -> f32 {
        let next = match species_count.cmp(&self.target) {
            std::cmp::Ordering::Less => threshold - self.step,
            std::cmp::Ordering::Greater => threshold + self.step,
            std::cmp::Ordering::Equal => return threshold,
        };
        match self.bounds {
            Some((low, high)) => next.clamp(low, high),
            None => next,
        }
    }
}
