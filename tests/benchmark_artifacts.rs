use anyhow::Result;
use cloudwars_autopilot::arena::ArenaConfig;
use cloudwars_autopilot::benchmark::{run_benchmark, BenchmarkConfig, BenchmarkReport};
use cloudwars_autopilot::pilot::PilotConfig;
use cloudwars_autopilot::transport::CloudColor;
use std::fs;

fn config(out_dir: std::path::PathBuf) -> BenchmarkConfig {
    BenchmarkConfig {
        player_name: "ace".to_string(),
        color: CloudColor::Blue,
        seeds: vec![0x11, 0x22],
        max_ticks: 10,
        arena: ArenaConfig {
            neutral_count: 8,
            ..ArenaConfig::default()
        },
        pilot: PilotConfig::default(),
        out_dir,
        jobs: Some(2),
    }
}

#[test]
fn benchmark_writes_summary_and_csv() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let report = run_benchmark(config(dir.path().to_path_buf()))?;

    assert_eq!(report.run_count, 2);
    assert_eq!(report.aggregate.runs, 2);
    assert_eq!(report.jobs, Some(2));

    let csv = fs::read_to_string(dir.path().join("runs.csv"))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3, "header plus one row per seed");
    assert!(lines[0].starts_with("seed_hex,seed,ticks"));

    let raw = fs::read(dir.path().join("summary.json"))?;
    let parsed: BenchmarkReport = serde_json::from_slice(&raw)?;
    assert_eq!(parsed.run_count, report.run_count);
    assert_eq!(parsed.seeds, vec![0x11, 0x22]);
    for run in &parsed.runs {
        assert!(run.ticks >= 1 && run.ticks <= 10);
        assert!(run.peak_vapor > 0.0);
    }
    Ok(())
}

#[test]
fn benchmark_rejects_empty_seed_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config(dir.path().to_path_buf());
    cfg.seeds.clear();
    assert!(run_benchmark(cfg).is_err());
}

#[test]
fn benchmark_rejects_zero_jobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config(dir.path().to_path_buf());
    cfg.jobs = Some(0);
    assert!(run_benchmark(cfg).is_err());
}
