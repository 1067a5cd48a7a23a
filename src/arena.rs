//! In-process arena server.
//!
//! `LocalArena` hosts a full game world behind the `Transport` trait so runs
//! and benchmarks need no network server. It reproduces the authoritative
//! update rules: velocity integration with drag, one-unit vapor transfer
//! while clouds overlap, damped wall rebound, thrust commands that burn vapor
//! and blow off an exhaust cloud, and the self-destruct explosion ring. The
//! neutral field is seeded from a `u64` so runs are reproducible.

use crate::sim::reflect_into_bounds;
use crate::transport::{CloudColor, Transport, TransportError};
use crate::world::{Cloud, Position, Velocity, WorldSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const VELOCITY_FACTOR: f64 = 0.1;
const VELOCITY_DECAY: f64 = 0.999;
const THRUST_VELOCITY_GAIN: f64 = 5.0;
const EXHAUST_SPAWN_FACTOR: f64 = 1.1;
const EXHAUST_VELOCITY: f64 = 20.0;
const EXPLOSION_SPOKE_DEG: f64 = 10.0;
const EXPLOSION_SPOKE_STRENGTH: f64 = 2.5;
const WIN_VAPOR_PERCENT: f64 = 51.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub width: f64,
    pub height: f64,
    /// World updates per second, reported to clients through the snapshot.
    pub game_speed: f64,
    pub neutral_count: usize,
    pub neutral_max_wind: f64,
    pub neutral_max_vapor: f64,
    pub player_vapor: f64,
    /// Round timeout in world updates.
    pub max_iterations: u64,
    /// World updates applied per snapshot fetch.
    pub updates_per_fetch: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 2048.0,
            height: 1152.0,
            game_speed: 60.0,
            neutral_count: 100,
            neutral_max_wind: 7.0,
            neutral_max_vapor: 200.0,
            player_vapor: 600.0,
            max_iterations: 3 * 60 * 60,
            updates_per_fetch: 1,
        }
    }
}

pub struct LocalArena {
    config: ArenaConfig,
    rng: StdRng,
    clouds: Vec<Cloud>,
    next_uid: u64,
    iteration: u64,
    world_vapor: f64,
    win_condition: bool,
    leader: String,
    registered: Option<(String, CloudColor)>,
    spawned: bool,
    connected: bool,
}

impl LocalArena {
    pub fn new(seed: u64, config: ArenaConfig) -> Self {
        let mut arena = Self {
            rng: StdRng::seed_from_u64(seed),
            clouds: Vec::with_capacity(config.neutral_count + 1),
            next_uid: 0,
            iteration: 0,
            world_vapor: 0.0,
            win_condition: false,
            leader: String::new(),
            registered: None,
            spawned: false,
            connected: true,
            config,
        };

        for _ in 0..arena.config.neutral_count {
            let pos = Position::new(
                arena.rng.gen::<f64>() * arena.config.width,
                arena.rng.gen::<f64>() * arena.config.height,
            );
            let vel = Velocity::new(
                (2.0 * arena.rng.gen::<f64>() - 1.0) * arena.config.neutral_max_wind,
                (2.0 * arena.rng.gen::<f64>() - 1.0) * arena.config.neutral_max_wind,
            );
            let vapor = arena.rng.gen::<f64>() * arena.config.neutral_max_vapor;
            arena.push_cloud(String::new(), vapor, pos, vel);
        }

        // Overlapping neutrals merge through the absorption rule on the first
        // updates, same as the reference field generator allows.
        arena
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    fn push_cloud(&mut self, player: String, vapor: f64, pos: Position, vel: Velocity) {
        self.next_uid += 1;
        self.clouds.push(Cloud {
            uid: format!("c{:06}", self.next_uid),
            player,
            vapor,
            pos,
            vel,
        });
    }

    /// One authoritative world update.
    pub fn update(&mut self) {
        let n = self.clouds.len();
        for i in 0..n {
            if self.clouds[i].is_dead() {
                continue;
            }

            {
                let c = &mut self.clouds[i];
                c.pos.x += c.vel.x * VELOCITY_FACTOR;
                c.pos.y += c.vel.y * VELOCITY_FACTOR;
                c.vel.scale(VELOCITY_DECAY);
            }

            // Vapor flows one unit at a time from the smaller into the bigger
            // cloud for as long as the two keep overlapping.
            for j in 0..n {
                if j == i || self.clouds[j].is_dead() {
                    continue;
                }
                loop {
                    let a = &self.clouds[i];
                    let b = &self.clouds[j];
                    if a.is_dead() || b.is_dead() {
                        break;
                    }
                    if a.pos.distance_to(&b.pos) >= a.radius() + b.radius() {
                        break;
                    }
                    if a.radius() < b.radius() {
                        self.clouds[i].vapor -= 1.0;
                        self.clouds[j].vapor += 1.0;
                    } else {
                        self.clouds[j].vapor -= 1.0;
                        self.clouds[i].vapor += 1.0;
                    }
                }
            }

            let (width, height) = (self.config.width, self.config.height);
            reflect_into_bounds(&mut self.clouds[i], width, height);
        }

        // Dead neutrals leave the world; dead player clouds stay listed so
        // clients can observe their own demise.
        self.clouds.retain(|c| !c.is_dead() || c.is_player_owned());
        self.world_vapor = self.clouds.iter().map(|c| c.vapor).sum();
        self.iteration += 1;
        let (win, leader) = self.judge();
        self.win_condition = win;
        self.leader = leader;
    }

    fn judge(&self) -> (bool, String) {
        let best = self
            .clouds
            .iter()
            .filter(|c| c.is_player_owned() && !c.is_dead())
            .max_by(|a, b| a.vapor.total_cmp(&b.vapor));
        let best = match best {
            Some(c) => c,
            None => return (true, "no player alive".to_string()),
        };
        if self.iteration > self.config.max_iterations {
            return (true, best.player.clone());
        }
        if self.world_vapor > 0.0 && best.vapor / self.world_vapor * 100.0 > WIN_VAPOR_PERCENT {
            return (true, best.player.clone());
        }
        (false, best.player.clone())
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            width: self.config.width,
            height: self.config.height,
            game_speed: self.config.game_speed,
            iteration: self.iteration,
            world_vapor: self.world_vapor,
            win_condition: self.win_condition,
            leader: self.leader.clone(),
            clouds: self.clouds.clone(),
        }
    }

    fn player_index(&self) -> Option<usize> {
        let (name, _) = self.registered.as_ref()?;
        self.clouds.iter().position(|c| c.player == *name)
    }

    /// Apply a thrust command to the cloud at `idx`. Illegal impulses are
    /// refused without side effects, matching the server rules.
    fn apply_thrust(&mut self, idx: usize, wind: Velocity) -> bool {
        let strength = wind.strength();
        if strength < 1.0 || strength > self.clouds[idx].vapor / 2.0 {
            return false;
        }

        let (pos, vel) = {
            let c = &mut self.clouds[idx];
            c.vapor -= strength;
            let gain = THRUST_VELOCITY_GAIN / c.radius();
            c.vel.x += wind.x * gain;
            c.vel.y += wind.y * gain;
            (c.pos, c.vel)
        };

        // The burned vapor blows off as a neutral exhaust cloud behind the
        // thrust direction.
        let distance = (self.clouds[idx].radius() + strength.sqrt()) * EXHAUST_SPAWN_FACTOR;
        let exhaust_pos = Position::new(
            pos.x - wind.x / strength * distance,
            pos.y - wind.y / strength * distance,
        );
        let exhaust_vel = Velocity::new(
            -(wind.x / strength) * EXHAUST_VELOCITY + vel.x,
            -(wind.y / strength) * EXHAUST_VELOCITY + vel.y,
        );
        self.push_cloud(String::new(), strength, exhaust_pos, exhaust_vel);
        true
    }

    /// Self-destruct: blow the cloud apart into a ring of exhaust clouds,
    /// then zero whatever vapor is left.
    fn apply_kill(&mut self, idx: usize) -> bool {
        if self.clouds[idx].is_dead() {
            self.clouds[idx].vapor = 0.0;
            return false;
        }
        let mut angle = 0.0;
        while angle < 360.0 && !self.clouds[idx].is_dead() {
            let rad = angle * std::f64::consts::PI / 180.0;
            let spoke = Velocity::new(
                -rad.cos() * EXPLOSION_SPOKE_STRENGTH,
                -rad.sin() * EXPLOSION_SPOKE_STRENGTH,
            );
            self.apply_thrust(idx, spoke);
            angle += EXPLOSION_SPOKE_DEG;
        }
        self.clouds[idx].vapor = 0.0;
        true
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::Disconnected(
                "arena connection closed".to_string(),
            ))
        }
    }
}

impl Transport for LocalArena {
    fn register(&mut self, name: &str, color: CloudColor) -> Result<(), TransportError> {
        self.ensure_connected()?;
        if self.registered.is_some() {
            return Err(TransportError::Rejected("already registered".to_string()));
        }
        if name.is_empty() {
            return Err(TransportError::Rejected("empty player name".to_string()));
        }
        self.registered = Some((name.to_string(), color));
        Ok(())
    }

    fn spawn(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let (name, _) = self
            .registered
            .clone()
            .ok_or_else(|| TransportError::Rejected("spawn before register".to_string()))?;
        if self.spawned {
            return Err(TransportError::Rejected("already spawned".to_string()));
        }

        let radius = self.config.player_vapor.sqrt();
        let mut pos = Position::default();
        for _ in 0..1000 {
            pos = Position::new(
                self.rng.gen::<f64>() * self.config.width,
                self.rng.gen::<f64>() * self.config.height,
            );
            let clear = self.clouds.iter().all(|c| {
                c.is_dead() || c.pos.distance_to(&pos) >= c.radius() + radius
            });
            if clear {
                break;
            }
        }
        self.push_cloud(
            name,
            self.config.player_vapor,
            pos,
            Velocity::default(),
        );
        self.spawned = true;
        Ok(())
    }

    fn fetch_world_snapshot(&mut self) -> Result<WorldSnapshot, TransportError> {
        self.ensure_connected()?;
        for _ in 0..self.config.updates_per_fetch.max(1) {
            self.update();
        }
        Ok(self.snapshot())
    }

    fn submit_thrust(&mut self, x: f64, y: f64) -> Result<(), TransportError> {
        self.ensure_connected()?;
        if let Some(idx) = self.player_index() {
            // Refused commands are silently dropped, like the live server.
            self.apply_thrust(idx, Velocity::new(x, y));
        }
        Ok(())
    }

    fn submit_self_destruct(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        if let Some(idx) = self.player_index() {
            self.apply_kill(idx);
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        Ok(())
    }
}
