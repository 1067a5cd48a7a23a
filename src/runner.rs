use crate::pilot::{DecisionPilot, PilotConfig, TickDecision, TickEvent};
use crate::pursuit::HuntOutcome;
use crate::transport::{CloudColor, Transport};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

/// Measure the decision rate over windows of this many ticks.
const TICK_RATE_WINDOW: u32 = 64;

/// Short pause after a thrust command so the server applies it before the
/// next snapshot fetch.
const THRUST_SETTLE: Duration = Duration::from_millis(5);

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub player_name: String,
    pub color: CloudColor,
    pub max_ticks: u32,
    pub pilot: PilotConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunMetrics {
    pub player_name: String,
    pub max_ticks: u32,
    pub ticks: u32,
    pub iterations: u64,
    pub final_vapor: f64,
    pub peak_vapor: f64,
    pub final_share: f64,
    pub commitments: u32,
    pub captures: u32,
    pub aborted_hunts: u32,
    pub flees: u32,
    pub calibration_samples: usize,
    pub cd_factor: f64,
    pub self_destructed: bool,
    pub died: bool,
    pub won: bool,
    pub leader: String,
}

/// Drive one pilot against a transport until the round is decided, the pilot
/// dies, or `max_ticks` runs out.
pub fn run_pilot(transport: &mut dyn Transport, config: &RunConfig) -> Result<RunMetrics> {
    if config.max_ticks == 0 {
        return Err(anyhow!("max_ticks must be > 0"));
    }

    transport
        .register(&config.player_name, config.color)
        .context("registration refused")?;
    transport.spawn().context("spawn refused")?;

    let mut pilot = DecisionPilot::new(config.player_name.clone(), config.pilot.clone());

    let mut ticks = 0u32;
    let mut peak_vapor = 0.0f64;
    let mut commitments = 0u32;
    let mut captures = 0u32;
    let mut aborted_hunts = 0u32;
    let mut flees = 0u32;
    let mut self_destructed = false;
    let mut died = false;
    let mut won = false;
    let mut leader = String::new();
    let mut last_snapshot = None;

    let started = Instant::now();
    while ticks < config.max_ticks {
        let snapshot = transport
            .fetch_world_snapshot()
            .context("snapshot fetch failed")?;
        ticks += 1;

        if ticks % TICK_RATE_WINDOW == 0 {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                pilot.set_tick_rate(f64::from(ticks) / elapsed);
            }
        }

        if let Some(me) = snapshot.own_cloud(&config.player_name) {
            peak_vapor = peak_vapor.max(me.vapor);
        }

        if snapshot.win_condition {
            won = snapshot.leader == config.player_name;
            leader = snapshot.leader.clone();
            last_snapshot = Some(snapshot);
            break;
        }
        leader = snapshot.leader.clone();

        let report = pilot.decide(&snapshot);
        for event in &report.events {
            match event {
                TickEvent::Fled { .. } => flees += 1,
                TickEvent::Committed { .. } => commitments += 1,
                TickEvent::HuntResolved { outcome, .. } => match outcome {
                    HuntOutcome::Captured => captures += 1,
                    HuntOutcome::TargetGone => {}
                    _ => aborted_hunts += 1,
                },
                _ => {}
            }
        }

        let decision = report.decision;
        last_snapshot = Some(snapshot);
        match decision {
            TickDecision::Thrust(v) => {
                transport
                    .submit_thrust(v.x, v.y)
                    .context("thrust submit failed")?;
                thread::sleep(THRUST_SETTLE);
            }
            TickDecision::Coast => {}
            TickDecision::SelfDestruct => {
                transport
                    .submit_self_destruct()
                    .context("self-destruct submit failed")?;
                self_destructed = true;
            }
            TickDecision::Dead => {
                died = true;
                break;
            }
        }
    }

    // Disconnect failures are uninteresting once the round is over.
    let _ = transport.disconnect();

    let (iterations, final_vapor, final_share) = match &last_snapshot {
        Some(snap) => {
            let vapor = snap
                .own_cloud(&config.player_name)
                .map(|c| c.vapor)
                .unwrap_or(0.0);
            (snap.iteration, vapor, vapor / snap.total_vapor())
        }
        None => (0, 0.0, 0.0),
    };

    Ok(RunMetrics {
        player_name: config.player_name.clone(),
        max_ticks: config.max_ticks,
        ticks,
        iterations,
        final_vapor,
        peak_vapor,
        final_share,
        commitments,
        captures,
        aborted_hunts,
        flees,
        calibration_samples: pilot.state().calibration.sample_count(),
        cd_factor: pilot.state().calibration.factor(),
        self_destructed,
        died,
        won,
        leader,
    })
}
