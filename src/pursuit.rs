//! Pursuit state machine and cross-tick agent state.
//!
//! `AgentState` is the only memory that survives a tick. A commitment records
//! what the lookahead predicted at commit time; every Hunting tick compares
//! that prediction against the live snapshot and either keeps chasing or
//! resolves the hunt.

use crate::calibration::CostCalibration;
use crate::targeting::TargetChoice;
use crate::world::{surface_gap, Cloud, Position, WorldSnapshot};
use serde::Serialize;

/// Surface gap below which a committed target counts as captured.
pub const CAPTURE_RESOLVE_GAP: f64 = 10.0;

/// Distance to the virtual intercept point below which pursuit switches back
/// to the live target.
const INTERCEPT_ARRIVAL_GAP: f64 = 1.0;

/// Tick rate assumed before the first wall-clock measurement.
pub const DEFAULT_TICK_RATE: f64 = 40.0;

/// Why a hunt stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HuntOutcome {
    /// Target absent from the snapshot or below one vapor.
    TargetGone,
    /// Target grew past the size ceiling.
    TooLarge,
    /// Player target lost vapor while we were far away; somebody else is
    /// feeding on it.
    AnomalousLoss,
    /// Elapsed ticks exceeded the predicted hunt length with stall slack.
    Overrun,
    /// Closed to capture range.
    Captured,
}

/// Per-tick verdict while a commitment exists.
#[derive(Clone, Debug)]
pub enum HuntVerdict {
    /// Keep thrusting toward `aim`.
    Pursue { aim: Position },
    /// Commitment resolved; `calibrated` is set when the capture produced a
    /// usable calibration sample.
    Resolved {
        outcome: HuntOutcome,
        calibrated: bool,
    },
}

/// Cross-tick memory. Owned exclusively by the decision loop; mutated only
/// between ticks.
#[derive(Clone, Debug, Serialize)]
pub struct AgentState {
    pub committed_target_uid: String,
    pub expected_target_vapor: f64,
    pub expected_hunt_steps: f64,
    pub elapsed_hunt_ticks: u32,
    pub commitment_start_vapor: f64,
    pub commitment_start_distance: f64,
    pub virtual_intercept_point: Option<Position>,
    pub calibration: CostCalibration,
    /// Own decisions per wall-clock second, measured by the runner.
    pub measured_tick_rate: f64,
    pub self_destruct_on_dominance: bool,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            committed_target_uid: String::new(),
            expected_target_vapor: 0.0,
            expected_hunt_steps: 0.0,
            elapsed_hunt_ticks: 0,
            commitment_start_vapor: 0.0,
            commitment_start_distance: 0.0,
            virtual_intercept_point: None,
            calibration: CostCalibration::default(),
            measured_tick_rate: DEFAULT_TICK_RATE,
            self_destruct_on_dominance: false,
        }
    }
}

impl AgentState {
    pub fn is_committed(&self) -> bool {
        !self.committed_target_uid.is_empty()
    }

    /// Record a fresh commitment. `stall_tolerance` pads the predicted hunt
    /// length before the overrun check fires.
    pub fn commit(&mut self, choice: &TargetChoice, me: &Cloud, stall_tolerance: f64) {
        self.committed_target_uid = choice.uid.clone();
        self.expected_target_vapor = choice.vapor;
        self.expected_hunt_steps = choice.hunt_steps as f64 * stall_tolerance;
        self.elapsed_hunt_ticks = 0;
        self.commitment_start_vapor = me.vapor;
        self.commitment_start_distance = choice.distance;
        self.virtual_intercept_point = choice.virtual_intercept;
    }

    /// The commitment fields are only ever cleared together.
    pub fn clear_commitment(&mut self) {
        self.committed_target_uid.clear();
        self.expected_target_vapor = 0.0;
        self.expected_hunt_steps = 0.0;
        self.elapsed_hunt_ticks = 0;
        self.commitment_start_vapor = 0.0;
        self.commitment_start_distance = 0.0;
        self.virtual_intercept_point = None;
    }
}

/// Advance the state machine by one Hunting tick.
///
/// `max_size_ratio` is the same ceiling the target scan applies; a target
/// outgrowing it mid-hunt aborts the commitment. Resolution clears the
/// commitment before returning.
pub fn evaluate_hunt(
    state: &mut AgentState,
    me: &Cloud,
    world: &WorldSnapshot,
    max_size_ratio: f64,
) -> HuntVerdict {
    let target = match world.find_cloud(&state.committed_target_uid) {
        Some(t) if t.vapor >= 1.0 => t,
        _ => {
            state.clear_commitment();
            return HuntVerdict::Resolved {
                outcome: HuntOutcome::TargetGone,
                calibrated: false,
            };
        }
    };

    state.elapsed_hunt_ticks += 1;

    if me.vapor * max_size_ratio <= target.vapor {
        state.clear_commitment();
        return HuntVerdict::Resolved {
            outcome: HuntOutcome::TooLarge,
            calibrated: false,
        };
    }

    // Only player targets get the divergence checks: neutral clouds drift
    // passively, so vapor loss or a blown prediction carries no signal.
    if target.is_player_owned() {
        if state.expected_target_vapor > target.vapor
            && surface_gap(me, target) > CAPTURE_RESOLVE_GAP
        {
            state.clear_commitment();
            return HuntVerdict::Resolved {
                outcome: HuntOutcome::AnomalousLoss,
                calibrated: false,
            };
        }
        if f64::from(state.elapsed_hunt_ticks) > state.expected_hunt_steps {
            state.clear_commitment();
            return HuntVerdict::Resolved {
                outcome: HuntOutcome::Overrun,
                calibrated: false,
            };
        }
    }

    if surface_gap(me, target) < CAPTURE_RESOLVE_GAP && state.commitment_start_vapor > 0.0 {
        let mass_cost = state.commitment_start_vapor - me.vapor;
        let calibrated = if target.is_player_owned() {
            state.calibration.observe_capture(
                mass_cost,
                state.commitment_start_distance,
                state.commitment_start_vapor,
            )
        } else {
            false
        };
        state.clear_commitment();
        return HuntVerdict::Resolved {
            outcome: HuntOutcome::Captured,
            calibrated,
        };
    }

    let aim = match state.virtual_intercept_point {
        Some(point) if me.pos.distance_to(&point) - me.radius() > INTERCEPT_ARRIVAL_GAP => point,
        _ => target.pos,
    };
    HuntVerdict::Pursue { aim }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Position, Velocity};

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

    fn committed_state(uid: &str, vapor: f64, steps: f64) -> AgentState {
        let mut state = AgentState::default();
        state.committed_target_uid = uid.to_string();
        state.expected_target_vapor = vapor;
        state.expected_hunt_steps = steps;
        state.commitment_start_vapor = 60.0;
        state.commitment_start_distance = 200.0;
        state
    }

    #[test]
    fn missing_target_resolves_to_gone() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        let w = world(vec![me.clone()]);
        let mut state = committed_state("t1", 20.0, 100.0);
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Resolved { outcome, .. } => assert_eq!(outcome, HuntOutcome::TargetGone),
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(!state.is_committed());
    }

    #[test]
    fn outgrown_target_aborts_the_hunt() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        let target = cloud("t1", "", 59.0, 600.0, 100.0);
        let w = world(vec![me.clone(), target]);
        let mut state = committed_state("t1", 20.0, 100.0);
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Resolved { outcome, .. } => assert_eq!(outcome, HuntOutcome::TooLarge),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn player_target_losing_vapor_far_away_is_suspicious() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        let target = cloud("t1", "rival", 15.0, 600.0, 100.0);
        let w = world(vec![me.clone(), target]);
        let mut state = committed_state("t1", 20.0, 100.0);
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Resolved { outcome, .. } => {
                assert_eq!(outcome, HuntOutcome::AnomalousLoss)
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn neutral_target_losing_vapor_is_not_aborted() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        let target = cloud("t1", "", 15.0, 600.0, 100.0);
        let w = world(vec![me.clone(), target.clone()]);
        let mut state = committed_state("t1", 20.0, 100.0);
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Pursue { aim } => assert_eq!(aim, target.pos),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn overrun_applies_only_to_player_targets() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        let rival = cloud("t1", "rival", 25.0, 600.0, 100.0);
        let w = world(vec![me.clone(), rival]);
        let mut state = committed_state("t1", 20.0, 3.0);
        state.elapsed_hunt_ticks = 3;
        state.expected_target_vapor = 20.0; // target grew, no anomalous loss
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Resolved { outcome, .. } => assert_eq!(outcome, HuntOutcome::Overrun),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn capture_of_player_target_feeds_calibration() {
        let mut me = cloud("me", "ace", 60.0, 100.0, 100.0);
        // Started at 60.05 vapor: real mass cost 0.05, inside the gate.
        let target = cloud("t1", "rival", 20.0, 112.0, 100.0);
        let w = world(vec![me.clone(), target]);
        let mut state = committed_state("t1", 20.0, 100.0);
        state.commitment_start_vapor = 60.05;
        me.vapor = 60.0;
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Resolved {
                outcome,
                calibrated,
            } => {
                assert_eq!(outcome, HuntOutcome::Captured);
                assert!(calibrated);
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert_eq!(state.calibration.sample_count(), 1);
        assert!(!state.is_committed());
    }

    #[test]
    fn capture_of_neutral_target_does_not_calibrate() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        let target = cloud("t1", "", 20.0, 112.0, 100.0);
        let w = world(vec![me.clone(), target]);
        let mut state = committed_state("t1", 20.0, 100.0);
        state.commitment_start_vapor = 60.05;
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Resolved {
                outcome,
                calibrated,
            } => {
                assert_eq!(outcome, HuntOutcome::Captured);
                assert!(!calibrated);
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert_eq!(state.calibration.sample_count(), 0);
    }

    #[test]
    fn virtual_intercept_point_is_pursued_until_reached() {
        let me = cloud("me", "ace", 60.0, 100.0, 100.0);
        let target = cloud("t1", "", 20.0, 600.0, 100.0);
        let w = world(vec![me.clone(), target.clone()]);
        let mut state = committed_state("t1", 20.0, 400.0);
        let point = Position::new(500.0, 100.0);
        state.virtual_intercept_point = Some(point);
        match evaluate_hunt(&mut state, &me, &w, 0.98) {
            HuntVerdict::Pursue { aim } => assert_eq!(aim, point),
            other => panic!("unexpected verdict {other:?}"),
        }

        // Standing on the point: switch back to the live target.
        let mut close = me.clone();
        close.pos = Position::new(500.0, 100.0);
        let w2 = world(vec![close.clone(), target.clone()]);
        match evaluate_hunt(&mut state, &close, &w2, 0.98) {
            HuntVerdict::Pursue { aim } => assert_eq!(aim, target.pos),
            other => panic!("unexpected verdict {other:?}"),
        }
    }
}
