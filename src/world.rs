//! World data model and geometry helpers.
//!
//! A `WorldSnapshot` is the immutable per-tick view the server hands out:
//! board dimensions, tick counters and the full cloud list. All decision code
//! reads it and nothing mutates it; lookahead simulation works on deep copies.

use serde::{Deserialize, Serialize};

/// 2-component position vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 2-component velocity vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

impl Velocity {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Magnitude of the vector; doubles as impulse strength for move commands.
    pub fn strength(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scale(&mut self, m: f64) {
        self.x *= m;
        self.y *= m;
    }
}

/// A mass-bearing, velocity-carrying cloud. Neutral clouds have an empty
/// `player` name; player clouds carry the owner's registered name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cloud {
    pub uid: String,
    pub player: String,
    pub vapor: f64,
    pub pos: Position,
    pub vel: Velocity,
}

impl Cloud {
    /// Effective collision radius, always `sqrt(vapor)`.
    pub fn radius(&self) -> f64 {
        self.vapor.max(0.0).sqrt()
    }

    /// Clouds below one unit of vapor are dead and ignorable.
    pub fn is_dead(&self) -> bool {
        self.vapor < 1.0
    }

    pub fn is_player_owned(&self) -> bool {
        !self.player.is_empty()
    }

    /// Current speed ("wind"), used as an interception-feasibility gate.
    pub fn wind(&self) -> f64 {
        self.vel.strength()
    }
}

/// Immutable per-tick view of the arena.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub width: f64,
    pub height: f64,
    /// Server updates per second.
    pub game_speed: f64,
    /// Increases with every server update.
    pub iteration: u64,
    /// Vapor of all clouds together, as reported by the server.
    pub world_vapor: f64,
    /// Set by the server once the round is decided.
    pub win_condition: bool,
    /// Player currently in the lead (the winner once `win_condition` holds).
    pub leader: String,
    pub clouds: Vec<Cloud>,
}

impl WorldSnapshot {
    /// World vapor clamped so ratio computations never divide by zero.
    pub fn total_vapor(&self) -> f64 {
        if self.world_vapor > 0.0 {
            self.world_vapor
        } else {
            1.0
        }
    }

    pub fn half_diagonal(&self) -> f64 {
        (self.width * self.width + self.height * self.height).sqrt() * 0.5
    }

    /// The agent's own cloud: first entry owned by `name`, if still alive in
    /// the snapshot.
    pub fn own_cloud(&self, name: &str) -> Option<&Cloud> {
        self.clouds.iter().find(|c| c.player == name)
    }

    pub fn find_cloud(&self, uid: &str) -> Option<&Cloud> {
        self.clouds.iter().find(|c| c.uid == uid)
    }
}

/// Surface gap between two clouds: center distance minus both capture radii.
/// Negative when the clouds overlap.
pub fn surface_gap(a: &Cloud, b: &Cloud) -> f64 {
    a.pos.distance_to(&b.pos) - a.radius() - b.radius()
}

/// Bearing angle of `a` as seen while standing on `b` (atan2 of the a-to-b
/// delta). Feeding `bearing(me, target)` into `corrected_thrust` steers toward
/// the target; `bearing(threat, me)` steers away from the threat.
pub fn bearing(a: &Cloud, b: &Cloud) -> f64 {
    (a.pos.y - b.pos.y).atan2(a.pos.x - b.pos.x)
}

pub fn bearing_to_point(from: &Cloud, point: &Position) -> f64 {
    (from.pos.y - point.y).atan2(from.pos.x - point.x)
}

/// True when the surface gap between the clouds is inside `fraction` of the
/// board's half diagonal.
pub fn in_sector(a: &Cloud, b: &Cloud, world: &WorldSnapshot, fraction: f64) -> bool {
    surface_gap(a, b) < world.half_diagonal() * fraction
}

/// Velocity-corrected thrust: aims for an absolute post-thrust velocity along
/// the bearing rather than a delta, by subtracting the cloud's current
/// velocity from the commanded impulse.
pub fn corrected_thrust(cloud: &Cloud, angle: f64, strength: f64) -> Velocity {
    Velocity {
        x: -angle.cos() * strength - cloud.vel.x,
        y: -angle.sin() * strength - cloud.vel.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(uid: &str, vapor: f64, x: f64, y: f64) -> Cloud {
        Cloud {
            uid: uid.to_string(),
            player: String::new(),
            vapor,
            pos: Position::new(x, y),
            vel: Velocity::default(),
        }
    }

    #[test]
    fn surface_gap_subtracts_both_radii() {
        let a = cloud("a", 16.0, 0.0, 0.0);
        let b = cloud("b", 9.0, 10.0, 0.0);
        assert!((surface_gap(&a, &b) - (10.0 - 4.0 - 3.0)).abs() < 1e-12);
    }

    #[test]
    fn overlapping_clouds_have_negative_gap() {
        let a = cloud("a", 50.0, 0.0, 0.0);
        let b = cloud("b", 10.0, 5.0, 0.0);
        assert!(surface_gap(&a, &b) < 0.0);
    }

    #[test]
    fn corrected_thrust_cancels_current_velocity() {
        let mut c = cloud("a", 100.0, 0.0, 0.0);
        c.vel = Velocity::new(2.0, -1.0);
        let t = corrected_thrust(&c, 0.0, 5.0);
        // Commanded impulse is (-5, 0); the correction removes the cloud's
        // own velocity so the post-thrust velocity lands on the command.
        assert!((t.x - (-5.0 - 2.0)).abs() < 1e-12);
        assert!((t.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hunt_bearing_points_at_target() {
        let me = cloud("me", 25.0, 0.0, 0.0);
        let target = cloud("t", 9.0, 10.0, 0.0);
        let angle = bearing(&me, &target);
        let thrust = corrected_thrust(&me, angle, 4.0);
        assert!(thrust.x > 0.0, "thrust should push toward +x");
        assert!(thrust.y.abs() < 1e-9);
    }

    #[test]
    fn total_vapor_clamps_to_one() {
        let world = WorldSnapshot {
            width: 100.0,
            height: 100.0,
            game_speed: 60.0,
            iteration: 0,
            world_vapor: 0.0,
            win_condition: false,
            leader: String::new(),
            clouds: Vec::new(),
        };
        assert_eq!(world.total_vapor(), 1.0);
    }

    #[test]
    fn dead_cloud_threshold_is_one_vapor() {
        assert!(cloud("a", 0.99, 0.0, 0.0).is_dead());
        assert!(!cloud("a", 1.0, 0.0, 0.0).is_dead());
    }
}
