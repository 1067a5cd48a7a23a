//! Budgeted target scan.
//!
//! Runs only on ticks with no committed target. Candidates are filtered by a
//! distance sector and a size band, priced by the lookahead simulator, and
//! compared through the efficiency scorer. The scan carries a wall-clock
//! budget: a simulation already running always finishes, but once the budget
//! is spent no new ones start and the scan falls back to the nearest
//! candidate seen so far. Simulation results are cached in a per-tick side
//! table keyed by uid, never written onto the snapshot.

use crate::score::{efficiency, outscores};
use crate::sim::{simulate_pursuit, SimParams, SimulationResult};
use crate::world::{in_sector, surface_gap, Cloud, Position, Velocity, WorldSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TargetSearchConfig {
    /// Opening sector radius as a fraction of the board half-diagonal.
    pub sector_start: f64,
    /// Sector widening per relaxation pass.
    pub sector_step: f64,
    /// Upper candidate size bound as a fraction of own vapor. Fixed.
    pub max_size_ratio: f64,
    /// Lower candidate size bound as a fraction of own vapor. Relaxes.
    pub min_size_ratio: f64,
    /// Lower-bound reduction per relaxation pass.
    pub min_size_step: f64,
    /// General minimum efficiency bar.
    pub min_efficiency: f64,
    /// Additional, lower bar that player-owned candidates must clear.
    pub min_efficiency_player: f64,
    /// Wall-clock budget for the whole scan, in milliseconds.
    pub scan_budget_ms: u64,
    /// Accept the first qualifying player-owned candidate immediately.
    pub force_player_targets: bool,
    /// Targets faster than this are not worth intercept-point pursuit.
    pub intercept_wind_max: f64,
}

impl Default for TargetSearchConfig {
    fn default() -> Self {
        Self {
            sector_start: 1.0 / 6.0,
            sector_step: 1.0 / 6.0,
            max_size_ratio: 0.98,
            min_size_ratio: 0.2,
            min_size_step: 0.0125,
            min_efficiency: 1.2,
            min_efficiency_player: 0.4,
            scan_budget_ms: 1000,
            force_player_targets: true,
            intercept_wind_max: 25.0,
        }
    }
}

/// A committed-to candidate, with everything the pursuit state machine needs
/// to remember at commit time.
#[derive(Clone, Debug)]
pub struct TargetChoice {
    pub uid: String,
    pub vapor: f64,
    pub player_owned: bool,
    pub distance: f64,
    pub cost: f64,
    pub efficiency: f64,
    pub hunt_steps: u32,
    /// Set when pursuing the predicted capture point is cheaper than chasing
    /// the live target.
    pub virtual_intercept: Option<Position>,
}

struct Candidate<'w> {
    cloud: &'w Cloud,
    sim: SimulationResult,
    distance: f64,
}

/// Scan the snapshot for the best pursuit target.
///
/// Returns `None` only when the sector and size-band relaxations are both
/// saturated and still nothing qualifies; that tick then issues no thrust.
pub fn select_target(
    me: &Cloud,
    world: &WorldSnapshot,
    cfg: &TargetSearchConfig,
    sim_params: &SimParams,
    cd_factor: f64,
    agent_tick_rate: f64,
) -> Option<TargetChoice> {
    let started = Instant::now();
    let budget = Duration::from_millis(cfg.scan_budget_ms);
    let mut cache: HashMap<&str, SimulationResult> = HashMap::new();

    let mut sector = cfg.sector_start;
    let mut min_size = cfg.min_size_ratio;
    let mut widen_sector_next = true;

    loop {
        let mut best: Option<Candidate> = None;
        let mut backup: Option<(&Cloud, f64)> = None;
        let mut out_of_time = false;

        for cloud in &world.clouds {
            // The budget only prevents starting more simulations; short
            // circuit to whatever we have once a fallback exists.
            if started.elapsed() >= budget && backup.is_some() {
                out_of_time = true;
                break;
            }
            if cloud.uid == me.uid || cloud.vapor < 1.0 {
                continue;
            }
            if !in_sector(me, cloud, world, sector) {
                continue;
            }
            if me.vapor * cfg.max_size_ratio < cloud.vapor
                || me.vapor * min_size > cloud.vapor
            {
                continue;
            }

            let distance = surface_gap(me, cloud);
            if backup.map_or(true, |(_, d)| distance < d) {
                backup = Some((cloud, distance));
            }

            let sim = *cache.entry(cloud.uid.as_str()).or_insert_with(|| {
                simulate_pursuit(me, cloud, world, sim_params, cd_factor, agent_tick_rate)
            });
            // A pursuit the lookahead predicts ends in the pursuer's own
            // absorption disqualifies outright, before any scoring.
            if sim.is_lethal() {
                continue;
            }
            let eff = efficiency(cloud.vapor, sim.cost);
            let below_general = eff < cfg.min_efficiency;
            let below_player = cloud.is_player_owned() && eff < cfg.min_efficiency_player;
            if below_general && below_player {
                continue;
            }

            let improves = match &best {
                None => true,
                Some(b) => outscores(
                    me,
                    b.cloud.vapor,
                    &b.sim,
                    cloud.vapor,
                    &sim,
                    sim_params.max_steps,
                ),
            };

            let candidate = Candidate {
                cloud,
                sim,
                distance,
            };
            if cfg.force_player_targets && cloud.is_player_owned() {
                return Some(finalize(
                    me, world, candidate, cfg, sim_params, cd_factor, agent_tick_rate,
                ));
            }
            if improves {
                best = Some(candidate);
            }
        }

        if out_of_time {
            if let Some(b) = best {
                return Some(finalize(
                    me, world, b, cfg, sim_params, cd_factor, agent_tick_rate,
                ));
            }
            if let Some((cloud, distance)) = backup {
                let sim = *cache.entry(cloud.uid.as_str()).or_insert_with(|| {
                    simulate_pursuit(me, cloud, world, sim_params, cd_factor, agent_tick_rate)
                });
                // The nearest-candidate fallback gets the same lethality veto
                // as the scored path.
                if !sim.is_lethal() {
                    let chosen = Candidate {
                        cloud,
                        sim,
                        distance,
                    };
                    return Some(finalize(
                        me, world, chosen, cfg, sim_params, cd_factor, agent_tick_rate,
                    ));
                }
            }
            return None;
        }

        if let Some(b) = best {
            return Some(finalize(
                me, world, b, cfg, sim_params, cd_factor, agent_tick_rate,
            ));
        }

        // Nothing qualified: relax one knob per pass, alternating, until both
        // saturate.
        let sector_saturated = sector >= 1.0;
        let size_saturated = min_size <= 0.0;
        if sector_saturated && size_saturated {
            return None;
        }
        let relax_sector = (widen_sector_next && !sector_saturated) || size_saturated;
        if relax_sector {
            sector = (sector + cfg.sector_step).min(1.0);
        } else {
            min_size = (min_size - cfg.min_size_step).max(0.0);
        }
        widen_sector_next = !widen_sector_next;
    }
}

/// Decide whether the predicted capture point is worth pursuing instead of
/// the live target, then package the choice.
fn finalize(
    me: &Cloud,
    world: &WorldSnapshot,
    candidate: Candidate,
    cfg: &TargetSearchConfig,
    sim_params: &SimParams,
    cd_factor: f64,
    agent_tick_rate: f64,
) -> TargetChoice {
    let cloud = candidate.cloud;
    let mut virtual_intercept = None;

    if !cloud.is_player_owned() && cloud.wind() < cfg.intercept_wind_max {
        let stationary = Cloud {
            uid: cloud.uid.clone(),
            player: cloud.player.clone(),
            vapor: cloud.vapor,
            pos: candidate.sim.predicted_capture_point,
            vel: Velocity::default(),
        };
        let re = simulate_pursuit(me, &stationary, world, sim_params, cd_factor, agent_tick_rate);
        if re.cost > 0.0 && re.cost < candidate.sim.cost {
            virtual_intercept = Some(candidate.sim.predicted_capture_point);
        }
    }

    TargetChoice {
        uid: cloud.uid.clone(),
        vapor: cloud.vapor,
        player_owned: cloud.is_player_owned(),
        distance: candidate.distance,
        cost: candidate.sim.cost,
        efficiency: efficiency(cloud.vapor, candidate.sim.cost),
        hunt_steps: candidate.sim.steps_taken,
        virtual_intercept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::DEFAULT_CD_FACTOR;
    use crate::world::Position;

    fn cloud(uid: &str, player: &str, vapor: f64, x: f64, y: f64) -> Cloud {
        Cloud {
            uid: uid.to_string(),
            player: player.to_string(),
            vapor,
            pos: Position::new(x, y),
            vel: Velocity::default(),
        }
    }

    fn world(clouds: Vec<Cloud>) -> WorldSnapshot {
        let world_vapor = clouds.iter().map(|c| c.vapor).sum();
        WorldSnapshot {
            width: 2048.0,
            height: 1152.0,
            game_speed: 60.0,
            iteration: 0,
            world_vapor,
            win_condition: false,
            leader: String::new(),
            clouds,
        }
    }

    fn scan(me: &Cloud, w: &WorldSnapshot, cfg: &TargetSearchConfig) -> Option<TargetChoice> {
        select_target(me, w, cfg, &SimParams::default(), DEFAULT_CD_FACTOR, 40.0)
    }

    #[test]
    fn never_selects_self_or_dead_candidates() {
        let me = cloud("me", "ace", 50.0, 400.0, 400.0);
        let dead = cloud("d1", "", 0.4, 420.0, 400.0);
        let w = world(vec![me.clone(), dead]);
        assert!(scan(&me, &w, &TargetSearchConfig::default()).is_none());
    }

    #[test]
    fn commits_to_the_only_candidate_in_band() {
        let me = cloud("me", "ace", 50.0, 0.0, 0.0);
        let prey = cloud("t1", "", 10.0, 5.0, 0.0);
        let w = world(vec![me.clone(), prey]);
        let choice = scan(&me, &w, &TargetSearchConfig::default()).expect("target expected");
        assert_eq!(choice.uid, "t1");
        assert!(choice.cost < me.vapor);
        assert!(choice.hunt_steps >= 1);
    }

    #[test]
    fn distant_candidate_costs_positive_vapor() {
        let me = cloud("me", "ace", 80.0, 400.0, 400.0);
        let prey = cloud("t1", "", 25.0, 480.0, 400.0);
        let w = world(vec![me.clone(), prey]);
        let choice = scan(&me, &w, &TargetSearchConfig::default()).expect("target expected");
        assert_eq!(choice.uid, "t1");
        assert!(choice.cost > 0.0);
        assert!(choice.efficiency > 0.0);
    }

    #[test]
    fn forced_mode_stops_at_first_qualifying_player() {
        let me = cloud("me", "ace", 100.0, 500.0, 500.0);
        let neutral = cloud("n1", "", 40.0, 540.0, 500.0);
        let rival = cloud("p1", "rival", 30.0, 500.0, 560.0);
        let w = world(vec![me.clone(), neutral, rival]);
        let cfg = TargetSearchConfig::default();
        let choice = scan(&me, &w, &cfg).expect("target expected");
        assert_eq!(choice.uid, "p1");
        assert!(choice.player_owned);
    }

    #[test]
    fn scored_mode_keeps_the_better_candidate() {
        let me = cloud("me", "ace", 100.0, 500.0, 500.0);
        // Same distance, different mass: the heavier prey wins on gain.
        let small = cloud("n1", "", 22.0, 560.0, 500.0);
        let big = cloud("n2", "", 45.0, 500.0, 560.0);
        let w = world(vec![me.clone(), small, big]);
        let cfg = TargetSearchConfig {
            force_player_targets: false,
            ..TargetSearchConfig::default()
        };
        let choice = scan(&me, &w, &cfg).expect("target expected");
        assert_eq!(choice.uid, "n2");
    }

    #[test]
    fn doomed_pursuit_is_never_committed() {
        let me = cloud("me", "ace", 50.0, 400.0, 400.0);
        let prey = cloud("t1", "", 20.0, 500.0, 400.0);
        // A far heavier neutral already overlaps the pursuer: every lookahead
        // ends in the pursuer's own absorption.
        let hazard = cloud("h1", "", 5000.0, 450.0, 400.0);
        let w = world(vec![me.clone(), prey, hazard]);
        assert!(scan(&me, &w, &TargetSearchConfig::default()).is_none());
    }

    #[test]
    fn scan_prefers_a_safe_target_over_a_doomed_chase() {
        let me = cloud("me", "ace", 50.0, 500.0, 500.0);
        // Chasing t1 leads straight into the heavier neutral sitting behind
        // it; t2 lies in the opposite direction.
        let doomed = cloud("t1", "", 20.0, 650.0, 500.0);
        let hazard = cloud("h1", "", 3000.0, 720.0, 500.0);
        let safe = cloud("t2", "", 18.0, 350.0, 500.0);
        let w = world(vec![me.clone(), doomed, hazard, safe]);
        let cfg = TargetSearchConfig {
            force_player_targets: false,
            ..TargetSearchConfig::default()
        };
        let choice = scan(&me, &w, &cfg).expect("target expected");
        assert_eq!(choice.uid, "t2");
        assert!(choice.cost > 0.0);
    }

    #[test]
    fn size_band_excludes_oversized_candidates() {
        let me = cloud("me", "ace", 50.0, 400.0, 400.0);
        let giant = cloud("g1", "", 120.0, 460.0, 400.0);
        let w = world(vec![me.clone(), giant]);
        assert!(scan(&me, &w, &TargetSearchConfig::default()).is_none());
    }

    #[test]
    fn sector_relaxation_reaches_distant_prey() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        // Outside the opening 1/6 sector (half diagonal ~1175 -> ~196 units)
        // but inside a widened one.
        let prey = cloud("t1", "", 20.0, 700.0, 100.0);
        let w = world(vec![me.clone(), prey]);
        let choice = scan(&me, &w, &TargetSearchConfig::default()).expect("target expected");
        assert_eq!(choice.uid, "t1");
    }

    #[test]
    fn exhausted_budget_short_circuits_to_first_scanned_candidate() {
        let me = cloud("me", "ace", 100.0, 500.0, 500.0);
        let first = cloud("n1", "", 40.0, 560.0, 500.0);
        let second = cloud("n2", "", 45.0, 500.0, 560.0);
        let w = world(vec![me.clone(), first, second]);
        let cfg = TargetSearchConfig {
            scan_budget_ms: 0,
            force_player_targets: false,
            ..TargetSearchConfig::default()
        };
        // With a zero budget the scan stops as soon as a fallback exists, so
        // the second candidate is never simulated.
        let choice = scan(&me, &w, &cfg).expect("target expected");
        assert_eq!(choice.uid, "n1");
    }
}
