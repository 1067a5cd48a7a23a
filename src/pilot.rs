//! Top-level per-tick decision pilot.
//!
//! Composes the layers in fixed priority order: self-preservation overrides
//! (flee, dominance self-destruct) run before anything else, then the pursuit
//! state machine if a commitment exists, then the budgeted target scan. The
//! pilot owns the cross-tick `AgentState`; everything else is recomputed from
//! the snapshot every tick.

use crate::pursuit::{evaluate_hunt, AgentState, HuntOutcome, HuntVerdict};
use crate::sim::SimParams;
use crate::targeting::{select_target, TargetSearchConfig};
use crate::world::{
    bearing, bearing_to_point, corrected_thrust, in_sector, Cloud, Position, Velocity,
    WorldSnapshot,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PilotConfig {
    pub sim: SimParams,
    pub search: TargetSearchConfig,
    /// Strength percentage for an escape burst, applied to own vapor the same
    /// way the hunt law is. Steeper than `strength_percentage`.
    pub flee_burst: f64,
    /// Threat sector radius as a fraction of the board half-diagonal.
    pub avoidance_sector: f64,
    /// Slack multiplier on the predicted hunt length before a hunt counts as
    /// stalled.
    pub stall_tolerance: f64,
    /// Share of world vapor above which the round is decided.
    pub dominance_ratio: f64,
    /// Self-destruct once dominant instead of coasting the round out.
    pub self_destruct_on_dominance: bool,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            sim: SimParams::default(),
            search: TargetSearchConfig::default(),
            flee_burst: 7.1,
            avoidance_sector: 0.05,
            stall_tolerance: 1.25,
            dominance_ratio: 0.5,
            self_destruct_on_dominance: false,
        }
    }
}

/// What the runner should do with the server this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickDecision {
    Thrust(Velocity),
    Coast,
    SelfDestruct,
    /// Own cloud absent from the snapshot or down to its last unit of vapor.
    Dead,
}

/// Noteworthy things that happened while deciding, for the runner's log.
#[derive(Clone, Debug)]
pub enum TickEvent {
    Fled { threat_uid: String },
    Dominant { share: f64 },
    HuntResolved { outcome: HuntOutcome, calibrated: bool },
    Committed { uid: String, cost: f64, efficiency: f64 },
    NoTarget,
}

#[derive(Clone, Debug)]
pub struct TickReport {
    pub decision: TickDecision,
    pub events: Vec<TickEvent>,
}

pub struct DecisionPilot {
    player_name: String,
    config: PilotConfig,
    state: AgentState,
}

impl DecisionPilot {
    pub fn new(player_name: impl Into<String>, config: PilotConfig) -> Self {
        let mut state = AgentState::default();
        state.self_destruct_on_dominance = config.self_destruct_on_dominance;
        Self {
            player_name: player_name.into(),
            config,
            state,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Called by the runner with its measured decision rate.
    pub fn set_tick_rate(&mut self, ticks_per_second: f64) {
        if ticks_per_second > 0.0 {
            self.state.measured_tick_rate = ticks_per_second;
        }
    }

    /// One full decision tick against a fresh snapshot.
    pub fn decide(&mut self, world: &WorldSnapshot) -> TickReport {
        let mut events = Vec::new();

        // The server only reaps below 1 vapor, but a cloud at exactly 1 can no
        // longer issue a legal burst; treat it as lost.
        let me = match world.own_cloud(&self.player_name) {
            Some(c) if c.vapor > 1.0 => c.clone(),
            _ => {
                return TickReport {
                    decision: TickDecision::Dead,
                    events,
                }
            }
        };

        // Overrides come first: a live threat or a decided round preempts any
        // hunt in progress.
        if let Some(threat) = self.nearest_threat(&me, world) {
            self.state.clear_commitment();
            let strength = self.thrust_strength(&me, self.config.flee_burst);
            let thrust = corrected_thrust(&me, bearing(threat, &me), strength);
            events.push(TickEvent::Fled {
                threat_uid: threat.uid.clone(),
            });
            return TickReport {
                decision: TickDecision::Thrust(thrust),
                events,
            };
        }

        let share = me.vapor / world.total_vapor();
        if self.state.self_destruct_on_dominance && share > self.config.dominance_ratio {
            self.state.clear_commitment();
            events.push(TickEvent::Dominant { share });
            return TickReport {
                decision: TickDecision::SelfDestruct,
                events,
            };
        }

        if self.state.is_committed() {
            match evaluate_hunt(
                &mut self.state,
                &me,
                world,
                self.config.search.max_size_ratio,
            ) {
                HuntVerdict::Pursue { aim } => {
                    let strength = self.thrust_strength(&me, self.config.sim.strength_percentage);
                    let thrust = corrected_thrust(&me, bearing_to_point(&me, &aim), strength);
                    return TickReport {
                        decision: TickDecision::Thrust(thrust),
                        events,
                    };
                }
                HuntVerdict::Resolved {
                    outcome,
                    calibrated,
                } => {
                    events.push(TickEvent::HuntResolved {
                        outcome,
                        calibrated,
                    });
                    // A vanished or captured target frees this tick for
                    // re-selection; an aborted hunt coasts it out.
                    if !matches!(outcome, HuntOutcome::TargetGone | HuntOutcome::Captured) {
                        return TickReport {
                            decision: TickDecision::Coast,
                            events,
                        };
                    }
                }
            }
        }

        match select_target(
            &me,
            world,
            &self.config.search,
            &self.config.sim,
            self.state.calibration.factor(),
            self.state.measured_tick_rate,
        ) {
            Some(choice) => {
                events.push(TickEvent::Committed {
                    uid: choice.uid.clone(),
                    cost: choice.cost,
                    efficiency: choice.efficiency,
                });
                let virtual_aim = choice.virtual_intercept;
                let aim = virtual_aim.or_else(|| world.find_cloud(&choice.uid).map(|c| c.pos));
                self.state.commit(&choice, &me, self.config.stall_tolerance);
                match aim {
                    Some(point) => TickReport {
                        decision: TickDecision::Thrust(self.commit_thrust(
                            &me,
                            &point,
                            virtual_aim.is_some(),
                        )),
                        events,
                    },
                    None => TickReport {
                        decision: TickDecision::Coast,
                        events,
                    },
                }
            }
            None => {
                events.push(TickEvent::NoTarget);
                TickReport {
                    decision: TickDecision::Coast,
                    events,
                }
            }
        }
    }

    /// Heavier cloud of another owner inside the avoidance sector, nearest
    /// first.
    fn nearest_threat<'w>(&self, me: &Cloud, world: &'w WorldSnapshot) -> Option<&'w Cloud> {
        world
            .clouds
            .iter()
            .filter(|c| {
                c.uid != me.uid
                    && c.player != me.player
                    && !c.is_dead()
                    && c.vapor > me.vapor
                    && in_sector(me, c, world, self.config.avoidance_sector)
            })
            .min_by(|a, b| {
                let da = me.pos.distance_to(&a.pos);
                let db = me.pos.distance_to(&b.pos);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Opening thrust for a fresh commitment. Direct pursuit gets the opening
    /// boost; an intercept-point approach opens at the plain hunt strength.
    fn commit_thrust(&self, me: &Cloud, point: &Position, intercepting: bool) -> Velocity {
        let boost = if intercepting {
            1.0
        } else {
            self.config.sim.initial_boost
        };
        let strength = self.thrust_strength(me, self.config.sim.strength_percentage * boost);
        corrected_thrust(me, bearing_to_point(me, point), strength)
    }

    /// Impulse strength as a percentage of own vapor, clamped to the legal
    /// command range.
    fn thrust_strength(&self, me: &Cloud, percentage: f64) -> f64 {
        (me.vapor / 100.0 * percentage)
            .max(self.config.sim.strength_min)
            .min(self.config.sim.strength_max)
    }
}
