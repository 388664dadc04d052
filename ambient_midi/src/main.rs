// Ambient MIDI Generator: CLI entry point.
//
// Loads a song configuration (or uses the built-in three-part demo), generates
// the six-track timeline, and writes it as a Standard MIDI File.
//
// Usage:
//   cargo run -p ambient_midi -- [output.mid] [--config song.json] [--seed N]
//     [--tempo BPM] [--json timeline.json]
//
// Logging is controlled with RUST_LOG (default: info). RUST_LOG=debug shows
// every realization on every track.

use ambient_midi::config::SongSpec;
use ambient_midi::driver::{RandomPolicy, generate_song};
use ambient_midi::midi::write_midi;
use ambient_midi_prng::SongRng;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Generate a multi-track ambient MIDI file", long_about = None)]
struct Cli {
    /// MIDI file to write.
    #[arg(default_value = "midi-output.mid")]
    output: PathBuf,

    /// Song configuration (JSON). Defaults to the built-in demo song.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for reproducible output. Taken from the clock if omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured tempo (beats per minute).
    #[arg(long)]
    tempo: Option<u32>,

    /// Also dump the generated timeline as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing()?;

    let mut spec = match &cli.config {
        Some(path) => SongSpec::load(path)
            .with_context(|| format!("loading song configuration {}", path.display()))?,
        None => SongSpec::default(),
    };
    if let Some(tempo) = cli.tempo {
        spec.tempo_bpm = tempo;
    }

    let seed = match cli.seed {
        Some(seed) => seed,
        None => clock_seed()?,
    };
    info!(
        seed,
        tempo_bpm = spec.tempo_bpm,
        parts = spec.parts.len(),
        output = %cli.output.display(),
        "generating"
    );

    let mut rng = SongRng::new(seed);
    let mut policy = RandomPolicy::new(spec.policy.clone());
    let timeline = generate_song(&spec, &mut policy, &mut rng)?;

    write_midi(&timeline, &cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    if let Some(path) = &cli.json {
        let json = serde_json::to_string_pretty(&timeline)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote timeline JSON");
    }

    let seconds = timeline.length() as f64 / f64::from(spec.ticks_per_beat) * 60.0
        / f64::from(spec.tempo_bpm);
    info!(
        seconds = seconds.round() as u64,
        bars = timeline.length() / u64::from(spec.ticks_per_bar()),
        "done"
    );
    Ok(())
}

fn setup_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to initialise tracing: {err}"))
}

fn clock_seed() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    Ok(elapsed.as_nanos() as u64)
}
