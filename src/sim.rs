//! Physics lookahead simulator.
//!
//! Plays a pursuit forward on deep copies of the pursuer and target to
//! estimate what a capture will cost in vapor and how many steps it takes.
//! The simulation reproduces the authoritative server physics (thrust burns
//! mass, velocity drag, wall rebound) so the predicted cost stays comparable
//! to real outcomes.

use crate::world::{bearing, corrected_thrust, surface_gap, Cloud, Position, Velocity, WorldSnapshot};
use serde::{Deserialize, Serialize};

/// Sentinel cost for a pursuit that gets the pursuer absorbed by a heavier
/// third party before capture. Disqualifying, never surfaced past scoring.
pub const LETHAL_COST: f64 = -1.0;

/// Internal sentinel for a simulation cut short by the step cap, replaced by
/// the linear fallback estimate before returning.
const STEP_CAP_SENTINEL: f64 = -2.0;

/// Every pursuit starts with a fixed one-tick discount.
pub const BASELINE_COST: f64 = -0.1;

/// Wall rebound keeps 60% of the offending velocity component.
pub const WALL_DAMPING: f64 = 0.6;

/// Tunable lookahead parameters. Defaults match the live server tuning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimParams {
    /// Lower clamp on commanded thrust strength.
    pub strength_min: f64,
    /// Upper clamp on commanded thrust strength.
    pub strength_max: f64,
    /// Thrust strength per percent of own vapor.
    pub strength_percentage: f64,
    /// Extra thrust multiplier on the opening step of a pursuit.
    pub initial_boost: f64,
    /// Multiplicative velocity drag per step.
    pub decay: f64,
    /// Velocity-to-position integration factor per step.
    pub velocity_factor: f64,
    /// Cost accrued per unit of velocity component per step.
    pub cost_factor: f64,
    /// Step cap; beyond it the linear fallback estimate is used.
    pub max_steps: u32,
    /// Surface gap at or below which the target counts as captured.
    pub capture_gap: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            strength_min: 1.0,
            strength_max: 25.0,
            strength_percentage: 3.7,
            initial_boost: 1.5,
            decay: 0.999,
            velocity_factor: 0.1,
            cost_factor: 0.001,
            max_steps: 500,
            capture_gap: 2.0,
        }
    }
}

/// Outcome of one lookahead run. Transient; produced fresh per call and at
/// most cached for the remainder of one tick's candidate scan.
#[derive(Clone, Copy, Debug)]
pub struct SimulationResult {
    /// Estimated vapor cost of the pursuit. `LETHAL_COST` disqualifies.
    pub cost: f64,
    /// Where the target ends up at capture (velocity zeroed).
    pub predicted_capture_point: Position,
    pub steps_taken: u32,
    /// Pursuer speed right after the opening thrust, used as an
    /// interception-feasibility gate.
    pub initial_pursuer_speed: f64,
}

impl SimulationResult {
    pub fn is_lethal(&self) -> bool {
        self.cost == LETHAL_COST
    }
}

/// Clamp a cloud back inside the board and rebound the offending velocity
/// component with energy loss: low boundaries force the component positive,
/// high boundaries force it negative.
pub fn reflect_into_bounds(cloud: &mut Cloud, width: f64, height: f64) {
    let r = cloud.radius();
    if cloud.pos.x < r {
        cloud.pos.x = r;
        cloud.vel.x = cloud.vel.x.abs() * WALL_DAMPING;
    }
    if cloud.pos.y < r {
        cloud.pos.y = r;
        cloud.vel.y = cloud.vel.y.abs() * WALL_DAMPING;
    }
    if cloud.pos.x + r > width {
        cloud.pos.x = width - r;
        cloud.vel.x = -cloud.vel.x.abs() * WALL_DAMPING;
    }
    if cloud.pos.y + r > height {
        cloud.pos.y = height - r;
        cloud.vel.y = -cloud.vel.y.abs() * WALL_DAMPING;
    }
}

/// Simulate a pursuit of `target` by `pursuer`.
///
/// `cd_factor` is the learned cost-per-distance calibration used when the
/// step cap cuts the simulation short; `agent_tick_rate` is the measured
/// decision rate used to normalize impulse cost against the server speed.
/// Never mutates the caller's data; third parties are treated as stationary
/// hazards at their snapshot positions.
pub fn simulate_pursuit(
    pursuer: &Cloud,
    target: &Cloud,
    world: &WorldSnapshot,
    params: &SimParams,
    cd_factor: f64,
    agent_tick_rate: f64,
) -> SimulationResult {
    let mut me = pursuer.clone();
    let mut prey = target.clone();
    let mut cost_total = BASELINE_COST;
    let mut step: u32 = 0;
    let mut first_step_speed = 0.0;

    let tick_ratio = if agent_tick_rate > 0.0 {
        (world.game_speed / agent_tick_rate).abs()
    } else {
        1.0
    };

    loop {
        step += 1;
        if step > params.max_steps {
            cost_total = STEP_CAP_SENTINEL;
            step = params.max_steps;
            break;
        }

        // A heavier third party within the combined capture envelope would
        // absorb the pursuer before this hunt completes.
        let mut lethal = false;
        for other in &world.clouds {
            if other.player != me.player
                && other.vapor > me.vapor
                && surface_gap(&me, other) < me.radius() + other.radius()
            {
                lethal = true;
                break;
            }
        }
        if lethal {
            cost_total = LETHAL_COST;
            break;
        }

        if surface_gap(&me, &prey) <= params.capture_gap {
            break;
        }

        let vapor_percentage = me.vapor / 100.0;
        let boost = if step == 1 { params.initial_boost } else { 1.0 };
        let strength = (vapor_percentage * params.strength_percentage * boost)
            .max(params.strength_min)
            .min(params.strength_max);
        let impulse = corrected_thrust(&me, bearing(&me, &prey), strength);
        let mut impulse_strength = impulse.strength();
        // The server rejects impulses below 1 unit; anything above half the
        // remaining vapor is an unsafe spend and skipped.
        if impulse_strength > 1.0 && impulse_strength < me.vapor / 2.0 {
            me.vapor -= impulse_strength;
            let gain = 5.0 / me.vapor.sqrt();
            me.vel.x += impulse.x * gain;
            me.vel.y += impulse.y * gain;
        } else {
            impulse_strength = 0.0;
        }

        if step == 1 {
            first_step_speed = me.wind();
        }

        me.pos.x += me.vel.x * params.velocity_factor;
        me.pos.y += me.vel.y * params.velocity_factor;
        let drift_cost =
            me.vel.x.abs() * params.cost_factor + me.vel.y.abs() * params.cost_factor;
        me.vel.scale(params.decay);

        prey.pos.x += prey.vel.x * params.velocity_factor;
        prey.pos.y += prey.vel.y * params.velocity_factor;
        prey.vel.scale(params.decay);

        reflect_into_bounds(&mut me, world.width, world.height);
        reflect_into_bounds(&mut prey, world.width, world.height);

        cost_total += impulse_strength / tick_ratio + drift_cost;
    }

    prey.vel = Velocity::default();

    // Past the step cap the pursuit is too long to price exactly; fall back
    // to a linear estimate that stays monotonic in distance and size.
    let cost = if cost_total == STEP_CAP_SENTINEL {
        pursuer.vapor * cd_factor * surface_gap(pursuer, target)
    } else {
        cost_total
    };

    SimulationResult {
        cost,
        predicted_capture_point: prey.pos,
        steps_taken: step,
        initial_pursuer_speed: first_step_speed,
    }
}
