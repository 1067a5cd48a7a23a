use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudwars_autopilot::arena::{ArenaConfig, LocalArena};
use cloudwars_autopilot::benchmark::{run_benchmark, BenchmarkConfig};
use cloudwars_autopilot::pilot::PilotConfig;
use cloudwars_autopilot::runner::{run_pilot, RunConfig};
use cloudwars_autopilot::transport::CloudColor;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "cloudwars-autopilot")]
#[command(about = "Autonomous pursuit pilot for CloudWars arenas, with a local arena for benchmarking")]
struct Cli {
    /// Player name registered with the arena
    #[arg(long, default_value = "autopilot")]
    name: String,
    /// Cloud color requested at registration
    #[arg(long, value_enum, default_value_t = CliColor::Blue)]
    color: CliColor,
    /// Optional pilot config JSON (see dump-config for the schema)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the default pilot configuration as JSON
    DumpConfig,
    /// Run the pilot for one round against a seeded local arena
    Run {
        #[arg(long, default_value = "0x1")]
        seed: String,
        #[arg(long, default_value_t = 10_000)]
        max_ticks: u32,
        /// Self-destruct once more than half the world's vapor is held
        #[arg(long, default_value_t = false)]
        suicide_on_win: bool,
        /// Write run metrics as JSON instead of key=value lines
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the pilot across many seeded arenas and aggregate the results
    Benchmark {
        #[arg(long)]
        seeds: Option<String>,
        #[arg(long)]
        seed_file: Option<PathBuf>,
        #[arg(long)]
        seed_start: Option<String>,
        #[arg(long, default_value_t = 12)]
        seed_count: u32,
        #[arg(long, default_value_t = 10_000)]
        max_ticks: u32,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        jobs: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliColor {
    Blue,
    Gray,
    Orange,
    Purple,
    Red,
}

impl From<CliColor> for CloudColor {
    fn from(value: CliColor) -> Self {
        match value {
            CliColor::Blue => CloudColor::Blue,
            CliColor::Gray => CloudColor::Gray,
            CliColor::Orange => CloudColor::Orange,
            CliColor::Purple => CloudColor::Purple,
            CliColor::Red => CloudColor::Red,
        }
    }
}

fn main() -> Result<()> {
    let Cli {
        name,
        color,
        config,
        command,
    } = Cli::parse();

    let pilot_config = load_pilot_config(config.as_deref())?;
    let color: CloudColor = color.into();

    match command {
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&PilotConfig::default())?);
        }
        Commands::Run {
            seed,
            max_ticks,
            suicide_on_win,
            output,
        } => {
            let seed = parse_seed(&seed)?;
            let mut pilot = pilot_config;
            if suicide_on_win {
                pilot.self_destruct_on_dominance = true;
            }

            let mut arena = LocalArena::new(seed, ArenaConfig::default());
            let metrics = run_pilot(
                &mut arena,
                &RunConfig {
                    player_name: name,
                    color,
                    max_ticks,
                    pilot,
                },
            )?;

            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, serde_json::to_vec_pretty(&metrics)?)?;
                println!("output={}", path.display());
            }
            println!("player={}", metrics.player_name);
            println!("seed={seed:#018x}");
            println!("ticks={}", metrics.ticks);
            println!("iterations={}", metrics.iterations);
            println!("final_vapor={:.1}", metrics.final_vapor);
            println!("peak_vapor={:.1}", metrics.peak_vapor);
            println!("final_share={:.3}", metrics.final_share);
            println!("commitments={}", metrics.commitments);
            println!("captures={}", metrics.captures);
            println!("aborted_hunts={}", metrics.aborted_hunts);
            println!("flees={}", metrics.flees);
            println!("calibration_samples={}", metrics.calibration_samples);
            println!("cd_factor={:.8}", metrics.cd_factor);
            println!("self_destructed={}", metrics.self_destructed);
            println!("died={}", metrics.died);
            println!("won={}", metrics.won);
            println!("leader={}", metrics.leader);
        }
        Commands::Benchmark {
            seeds,
            seed_file,
            seed_start,
            seed_count,
            max_ticks,
            out_dir,
            jobs,
        } => {
            let seeds = resolve_seeds(
                seeds.as_deref(),
                seed_file.as_deref(),
                seed_start.as_deref(),
                seed_count,
            )?;
            let out_dir = out_dir
                .unwrap_or_else(|| PathBuf::from(format!("benchmarks/{}", timestamp_suffix())));

            let report = run_benchmark(BenchmarkConfig {
                player_name: name,
                color,
                seeds,
                max_ticks,
                arena: ArenaConfig::default(),
                pilot: pilot_config,
                out_dir: out_dir.clone(),
                jobs,
            })?;

            println!("runs={}", report.run_count);
            println!(
                "jobs={}",
                report
                    .jobs
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("out_dir={}", out_dir.display());
            println!("win_rate={:.2}", report.aggregate.win_rate);
            println!("avg_final_vapor={:.1}", report.aggregate.avg_final_vapor);
            println!("avg_peak_vapor={:.1}", report.aggregate.avg_peak_vapor);
            println!("avg_captures={:.2}", report.aggregate.avg_captures);
            println!("avg_flees={:.2}", report.aggregate.avg_flees);
            println!("avg_cd_factor={:.8}", report.aggregate.avg_cd_factor);
            println!("top runs:");
            for (idx, run) in report.runs.iter().take(5).enumerate() {
                println!(
                    "  {}. seed={} final_vapor={:.1} captures={} ticks={} won={}",
                    idx + 1,
                    run.seed_hex,
                    run.final_vapor,
                    run.captures,
                    run.ticks,
                    run.won,
                );
            }
        }
    }

    Ok(())
}

fn load_pilot_config(path: Option<&Path>) -> Result<PilotConfig> {
    match path {
        None => Ok(PilotConfig::default()),
        Some(path) => {
            let data = fs::read(path)
                .with_context(|| format!("failed reading config {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("invalid pilot config {}", path.display()))
        }
    }
}

/// Accepts decimal or 0x-prefixed hex.
fn parse_seed(seed: &str) -> Result<u64> {
    let s = seed.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => {
            u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex seed: {s}"))
        }
        None if !s.is_empty() => s
            .parse::<u64>()
            .with_context(|| format!("invalid decimal seed: {s}")),
        None => Err(anyhow!("empty seed")),
    }
}

/// Seed list from loose tokens; blanks and #-comments are skipped.
fn parse_seed_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    for token in tokens {
        let token = token.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        out.push(parse_seed(token)?);
    }
    if out.is_empty() {
        return Err(anyhow!("no usable seeds given"));
    }
    Ok(out)
}

fn resolve_seeds(
    seeds: Option<&str>,
    seed_file: Option<&Path>,
    seed_start: Option<&str>,
    seed_count: u32,
) -> Result<Vec<u64>> {
    if let Some(path) = seed_file {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading seed file {}", path.display()))?;
        return parse_seed_tokens(data.lines());
    }

    if let Some(csv) = seeds {
        return parse_seed_tokens(csv.split(','));
    }

    let start = if let Some(start) = seed_start {
        parse_seed(start)?
    } else {
        0xC10D_0001
    };

    let mut out = Vec::with_capacity(seed_count as usize);
    let mut cur = start;
    for _ in 0..seed_count {
        out.push(cur);
        cur = cur
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
    }
    Ok(out)
}

fn timestamp_suffix() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{now}")
}
