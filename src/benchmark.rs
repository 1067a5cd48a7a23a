use crate::arena::{ArenaConfig, LocalArena};
use crate::pilot::PilotConfig;
use crate::runner::{run_pilot, RunConfig, RunMetrics};
use crate::transport::CloudColor;
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub player_name: String,
    pub color: CloudColor,
    pub seeds: Vec<u64>,
    pub max_ticks: u32,
    pub arena: ArenaConfig,
    pub pilot: PilotConfig,
    pub out_dir: PathBuf,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub seed: u64,
    pub seed_hex: String,
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
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkAggregate {
    pub runs: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub deaths: usize,
    pub avg_final_vapor: f64,
    pub max_final_vapor: f64,
    pub avg_peak_vapor: f64,
    pub avg_ticks: f64,
    pub avg_captures: f64,
    pub avg_aborted_hunts: f64,
    pub avg_flees: f64,
    pub avg_cd_factor: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub generated_unix_s: u64,
    pub player_name: String,
    pub max_ticks: u32,
    pub jobs: Option<usize>,
    pub seeds: Vec<u64>,
    pub run_count: usize,
    pub aggregate: BenchmarkAggregate,
    pub runs: Vec<RunRecord>,
}

pub fn run_benchmark(config: BenchmarkConfig) -> Result<BenchmarkReport> {
    if config.seeds.is_empty() {
        return Err(anyhow!("benchmark requires at least one seed"));
    }
    if let Some(jobs) = config.jobs {
        if jobs == 0 {
            return Err(anyhow!("benchmark --jobs must be >= 1 when provided"));
        }
    }
    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("failed creating {}", config.out_dir.display()))?;

    let run_one = |seed: &u64| -> Result<RunRecord> {
        let mut arena = LocalArena::new(*seed, config.arena.clone());
        let metrics = run_pilot(
            &mut arena,
            &RunConfig {
                player_name: config.player_name.clone(),
                color: config.color,
                max_ticks: config.max_ticks,
                pilot: config.pilot.clone(),
            },
        )
        .with_context(|| format!("benchmark run failed for seed={seed:#x}"))?;
        Ok(record_from_metrics(*seed, &metrics))
    };

    let run_results: Vec<Result<RunRecord>> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| config.seeds.par_iter().map(run_one).collect())
    } else {
        config.seeds.par_iter().map(run_one).collect()
    };

    let mut runs = Vec::with_capacity(run_results.len());
    for result in run_results {
        runs.push(result?);
    }

    runs.sort_by(|a, b| {
        b.final_vapor
            .total_cmp(&a.final_vapor)
            .then_with(|| b.captures.cmp(&a.captures))
            .then_with(|| a.seed.cmp(&b.seed))
    });

    let aggregate = aggregate_runs(&runs);
    write_runs_csv(&config.out_dir.join("runs.csv"), &runs)?;

    let report = BenchmarkReport {
        generated_unix_s: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        player_name: config.player_name,
        max_ticks: config.max_ticks,
        jobs: config.jobs,
        seeds: config.seeds,
        run_count: runs.len(),
        aggregate,
        runs,
    };

    let report_path = config.out_dir.join("summary.json");
    fs::write(
        &report_path,
        serde_json::to_vec_pretty(&report).context("failed to serialize summary json")?,
    )
    .with_context(|| format!("failed writing {}", report_path.display()))?;

    Ok(report)
}

fn record_from_metrics(seed: u64, metrics: &RunMetrics) -> RunRecord {
    RunRecord {
        seed,
        seed_hex: format!("{seed:#018x}"),
        ticks: metrics.ticks,
        iterations: metrics.iterations,
        final_vapor: metrics.final_vapor,
        peak_vapor: metrics.peak_vapor,
        final_share: metrics.final_share,
        commitments: metrics.commitments,
        captures: metrics.captures,
        aborted_hunts: metrics.aborted_hunts,
        flees: metrics.flees,
        calibration_samples: metrics.calibration_samples,
        cd_factor: metrics.cd_factor,
        self_destructed: metrics.self_destructed,
        died: metrics.died,
        won: metrics.won,
    }
}

fn aggregate_runs(runs: &[RunRecord]) -> BenchmarkAggregate {
    let count = runs.len().max(1) as f64;
    BenchmarkAggregate {
        runs: runs.len(),
        wins: runs.iter().filter(|r| r.won).count(),
        win_rate: runs.iter().filter(|r| r.won).count() as f64 / count,
        deaths: runs.iter().filter(|r| r.died).count(),
        avg_final_vapor: runs.iter().map(|r| r.final_vapor).sum::<f64>() / count,
        max_final_vapor: runs
            .iter()
            .map(|r| r.final_vapor)
            .fold(0.0, f64::max),
        avg_peak_vapor: runs.iter().map(|r| r.peak_vapor).sum::<f64>() / count,
        avg_ticks: runs.iter().map(|r| f64::from(r.ticks)).sum::<f64>() / count,
        avg_captures: runs.iter().map(|r| f64::from(r.captures)).sum::<f64>() / count,
        avg_aborted_hunts: runs
            .iter()
            .map(|r| f64::from(r.aborted_hunts))
            .sum::<f64>()
            / count,
        avg_flees: runs.iter().map(|r| f64::from(r.flees)).sum::<f64>() / count,
        avg_cd_factor: runs.iter().map(|r| r.cd_factor).sum::<f64>() / count,
    }
}

fn write_runs_csv(path: &Path, rows: &[RunRecord]) -> Result<()> {
    let mut csv = String::from(
        "seed_hex,seed,ticks,iterations,final_vapor,peak_vapor,final_share,commitments,captures,aborted_hunts,flees,calibration_samples,cd_factor,self_destructed,died,won\n",
    );
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{:.2},{:.2},{:.4},{},{},{},{},{},{:.8},{},{},{}\n",
            row.seed_hex,
            row.seed,
            row.ticks,
            row.iterations,
            row.final_vapor,
            row.peak_vapor,
            row.final_share,
            row.commitments,
            row.captures,
            row.aborted_hunts,
            row.flees,
            row.calibration_samples,
            row.cd_factor,
            row.self_destructed,
            row.died,
            row.won
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}
