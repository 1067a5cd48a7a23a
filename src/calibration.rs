//! Cost-per-distance calibration from observed capture outcomes.
//!
//! When the lookahead simulator hits its step cap it prices a pursuit as
//! `vapor * factor * distance`. The factor here is learned: every clean
//! capture of a player cloud contributes one `cost / distance / vapor`
//! sample, and the running mean becomes the factor. Samples live in a
//! fixed-capacity ring so long sessions stay bounded.

use serde::{Deserialize, Serialize};

/// Factor used before any capture has been observed.
pub const DEFAULT_CD_FACTOR: f64 = 1e-4;

const DEFAULT_CAPACITY: usize = 256;

/// Real mass costs outside this open interval are lag spikes or already-dead
/// targets, not calibration signal.
const SAMPLE_COST_MIN: f64 = 0.0;
const SAMPLE_COST_MAX: f64 = 0.1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CostCalibration {
    samples: Vec<f64>,
    capacity: usize,
    next: usize,
    factor: f64,
}

impl Default for CostCalibration {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CostCalibration {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::new(),
            capacity: capacity.max(1),
            next: 0,
            factor: DEFAULT_CD_FACTOR,
        }
    }

    /// Current cost-per-distance-per-vapor factor.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Feed one resolved capture into the loop. Returns true when the outcome
    /// passed the outlier gate and was recorded.
    pub fn observe_capture(
        &mut self,
        mass_cost: f64,
        start_distance: f64,
        start_vapor: f64,
    ) -> bool {
        if !(mass_cost > SAMPLE_COST_MIN && mass_cost < SAMPLE_COST_MAX) {
            return false;
        }
        if start_distance <= 0.0 || start_vapor <= 0.0 {
            return false;
        }
        let sample = mass_cost / start_distance / start_vapor;
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.next] = sample;
        }
        self.next = (self.next + 1) % self.capacity;
        self.factor = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        true
    }
}
