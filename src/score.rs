//! Efficiency scorer.
//!
//! Collapses a simulated pursuit into one comparable number: mass gain per
//! net remaining mass dominates, with a small bonus for faster captures.

use crate::sim::SimulationResult;
use crate::world::Cloud;

const GAIN_WEIGHT: f64 = 0.95;
const SPEED_WEIGHT: f64 = 0.05;

/// Raw vapor-per-cost ratio used by the minimum-efficiency filters.
pub fn efficiency(target_vapor: f64, cost: f64) -> f64 {
    target_vapor / cost
}

/// Higher is better.
pub fn pursuit_score(
    me: &Cloud,
    target_vapor: f64,
    sim: &SimulationResult,
    max_steps: u32,
) -> f64 {
    let gain = target_vapor / (me.vapor - sim.cost);
    let speed = 1.0 - sim.steps_taken as f64 / max_steps.max(1) as f64;
    gain * GAIN_WEIGHT + speed * SPEED_WEIGHT
}

/// True when the challenger outscores the incumbent candidate.
pub fn outscores(
    me: &Cloud,
    incumbent_vapor: f64,
    incumbent: &SimulationResult,
    challenger_vapor: f64,
    challenger: &SimulationResult,
    max_steps: u32,
) -> bool {
    pursuit_score(me, challenger_vapor, challenger, max_steps)
        > pursuit_score(me, incumbent_vapor, incumbent, max_steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Position, Velocity};

    fn me(vapor: f64) -> Cloud {
        Cloud {
            uid: "me".to_string(),
            player: "ace".to_string(),
            vapor,
            pos: Position::default(),
            vel: Velocity::default(),
        }
    }

    fn sim(cost: f64, steps: u32) -> SimulationResult {
        SimulationResult {
            cost,
            predicted_capture_point: Position::default(),
            steps_taken: steps,
            initial_pursuer_speed: 0.0,
        }
    }

    #[test]
    fn bigger_gain_at_equal_cost_scores_higher() {
        let agent = me(100.0);
        let cheap = sim(5.0, 50);
        assert!(outscores(&agent, 10.0, &cheap, 30.0, &cheap, 500));
    }

    #[test]
    fn faster_capture_breaks_ties() {
        let agent = me(100.0);
        let slow = sim(5.0, 400);
        let fast = sim(5.0, 20);
        assert!(outscores(&agent, 10.0, &slow, 10.0, &fast, 500));
    }

    #[test]
    fn gain_term_dominates_speed_term() {
        let agent = me(100.0);
        // A fast capture of a tiny target loses to a slow capture of a big
        // one: the 95% weight belongs to mass gain.
        let tiny_fast = sim(2.0, 1);
        let big_slow = sim(4.0, 499);
        assert!(outscores(&agent, 2.0, &tiny_fast, 40.0, &big_slow, 500));
    }
}
