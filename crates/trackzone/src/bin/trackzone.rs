//! trackzone CLI: replay recorded frames through the zone engine.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use trackzone::mask::load_gray;
use trackzone::replay::{load_recording, replay};
use trackzone::zones::{Engine, EngineParams};
use trackzone::GrayImage;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "trackzone")]
#[command(about = "Replay lane-edge recordings through the track zone engine")]
#[command(version)]
struct Cli {
    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a JSON frame recording and print one JSON record per frame.
    Replay(ReplayArgs),

    /// Print the default engine parameters as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// JSON array of `{ "frame": ..., "detections": [...] }` records.
    frames: PathBuf,

    /// Engine parameters (JSON). Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Binarized camera frame used to segment the drivable area for every frame.
    #[arg(long)]
    path_image: Option<PathBuf>,

    /// Write output records here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    #[cfg(feature = "tracing")]
    trackzone::core::init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    {
        use trackzone::core::{init_with_level, parse_level};
        let level = parse_level(&cli.log_level)
            .ok_or_else(|| -> CliError { format!("unknown log level: {}", cli.log_level).into() })?;
        init_with_level(level)?;
    }

    match cli.command {
        Commands::Replay(args) => run_replay(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    let params = match &args.config {
        Some(path) => EngineParams::load_json(path)?,
        None => EngineParams::default(),
    };
    let mut engine = Engine::new(params)?;

    let records = load_recording(&args.frames)?;
    log::info!("replaying {} frames from {}", records.len(), args.frames.display());

    let binary = match &args.path_image {
        Some(path) => Some(load_gray(path)?),
        None => None,
    };
    let outputs = replay(&mut engine, records, binary.as_ref().map(GrayImage::view));

    let sink: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = BufWriter::new(sink);
    for out in &outputs {
        serde_json::to_writer(&mut sink, out)?;
        sink.write_all(b"\n")?;
    }
    sink.flush()?;

    if engine.stopped() {
        log::info!("vehicle stopped after {} frames", outputs.len());
    }
    Ok(())
}

fn run_default_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&EngineParams::default())?;
    println!("{json}");
    Ok(())
}
