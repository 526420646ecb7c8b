//! Headless stem growth runner.
//!
//! Loads a settings file, runs `DROP_COUNT` drops and optionally writes the
//! surviving stems as JSON.

mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use stems_core::{Simulation, Tally};
use tracing::info;
use tracing_subscriber::EnvFilter;

use settings::{RunOutput, SettingsFile};

#[derive(Debug, Parser)]
#[command(version, about = "Grow stems from a settings file without a window")]
struct Args {
    /// JSON settings file (`{"settings": {...}}`).
    settings: PathBuf,

    /// Where to write the resulting stems; nothing is written when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overrides `DROP_COUNT` from the settings file.
    #[arg(long)]
    drops: Option<u64>,

    /// Overrides `SEED` from the settings file.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let file = SettingsFile::load(&args.settings)?;

    let drops = args.drops.unwrap_or(file.settings.drop_count);
    let seed = args
        .seed
        .or(file.settings.seed)
        .unwrap_or_else(|| rand::rng().random());

    info!(
        settings = %args.settings.display(),
        drops,
        seed,
        "Starting run"
    );

    let mut sim = Simulation::new(file.settings.config, seed)
        .context("settings rejected")?
        .with_observer(Tally::default());

    let report_every = (drops / 10).max(1);
    for done in 1..=drops {
        sim.step()
            .with_context(|| format!("simulation failed at step {}", sim.steps_completed()))?;
        if done % report_every == 0 {
            info!(
                done,
                drops,
                stems = sim.len(),
                max_height = sim.max_height().unwrap_or(0),
                "Progress"
            );
        }
    }

    let tally = *sim.observer();
    info!(
        stems = sim.len(),
        grounded = tally.grounded,
        stacked = tally.stacked,
        discarded = tally.discarded,
        bounces = tally.bounces,
        melted = tally.melted,
        "Run finished"
    );

    if let Some(path) = &args.output {
        RunOutput::new(&file, seed, &sim.snapshot()).write(path)?;
        info!(output = %path.display(), "Wrote stems");
    }

    Ok(())
}
