//! Tumble Tower entry point
//!
//! Runs a headless session with the demo agent playing, then optionally
//! records the result on the leaderboard.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;

use tumble_tower::consts::SIM_DT;
use tumble_tower::sim::{GamePhase, GameState, TickInput, tick};
use tumble_tower::{HighScores, TowerConfig};

#[derive(Parser, Debug)]
#[command(about = "Headless stacking-tower simulation driven by a demo agent")]
struct Args {
    /// JSON config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed for the demo agent (defaults to the current time)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Maximum number of fixed-timestep ticks to run
    #[arg(short, long, default_value_t = 36_000)]
    ticks: u64,

    /// Leaderboard file to record the final score in
    #[arg(long)]
    scores: Option<PathBuf>,

    /// Print the final observation as JSON
    #[arg(long)]
    observation: bool,
}

fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TowerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TowerConfig::default(),
    };
    let seed = args.seed.unwrap_or_else(|| now_ms() as u64);
    log::info!("Starting session with seed {}", seed);

    let mut state = GameState::new(&config, seed);
    let input = TickInput {
        idle_mode: true,
        ..Default::default()
    };

    for _ in 0..args.ticks {
        tick(&mut state, &input, SIM_DT);
        if state.phase == GamePhase::GameOver {
            break;
        }
    }

    let height = state.tower.get_tower_height();
    log::info!(
        "Finished after {} ticks: {:?}, score {}, height {}",
        state.time_ticks,
        state.phase,
        state.score,
        height
    );

    if let Some(path) = &args.scores {
        let mut scores = HighScores::load(path)
            .with_context(|| format!("failed to load high scores {}", path.display()))?;
        match scores.add_score(state.score, height, now_ms()) {
            Some(rank) => {
                log::info!("New high score at rank {}", rank);
                scores
                    .save(path)
                    .with_context(|| format!("failed to save high scores {}", path.display()))?;
            }
            None => log::info!("Score {} did not make the leaderboard", state.score),
        }
    }

    if args.observation {
        let json = serde_json::to_string_pretty(&state.observation())
            .context("failed to serialize observation")?;
        println!("{json}");
    }

    Ok(())
}
