mod render;
mod video;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use spin_vision::{
    AnalysisConfig, AnalysisPipeline, CalibrationSession, DiskParameters, FrameSource,
    HsvTolerance, ImageSequenceSource, MarkerConfig, MarkerRole, OmegaStep, ReductionStrategy,
    Report, SampleTable,
};
use std::path::{Path, PathBuf};
use video::OpenCvVideoSource;

#[derive(Parser)]
#[command(name = "spin_tester")]
#[command(about = "Measure the spin of a disk after a collision from a video")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the markers, reduce to angular velocity and energy.
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Directory to write overlay PNGs into.
        #[arg(long)]
        overlays: Option<PathBuf>,

        /// Path to write the instantaneous-velocity table (CSV).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Add an index column to the CSV.
        #[arg(long)]
        csv_index: bool,
    },
    /// Pick marker colours from a reference frame and write them to a config.
    Pick {
        #[command(flatten)]
        input: InputArgs,

        /// Frame to sample colours from (defaults to the config's start frame).
        #[arg(long)]
        frame: Option<usize>,

        /// Pixel on the centre sticker, as `x,y`.
        #[arg(long, value_parser = parse_pixel)]
        center: Option<(u32, u32)>,

        /// Pixel on the rim sticker, as `x,y`.
        #[arg(long, value_parser = parse_pixel)]
        marker: (u32, u32),

        /// Hue half-width of the picked range.
        #[arg(long, default_value_t = 10)]
        hue_tolerance: u8,

        /// Saturation and value half-width of the picked range.
        #[arg(long, default_value_t = 50)]
        sv_tolerance: u8,

        /// Config to start from; missing fields take defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where to write the updated config (TOML).
        #[arg(long)]
        out: PathBuf,
    },
    /// Reduce an edited velocity table with the integral strategy.
    Reduce {
        /// CSV written by `analyze --csv`, possibly edited.
        #[arg(long)]
        csv: PathBuf,

        /// Disk mass in kilograms.
        #[arg(long, default_value_t = 0.20)]
        mass: f64,

        /// Disk radius in metres.
        #[arg(long, default_value_t = 0.05)]
        radius: f64,

        /// Row indices to drop before reducing.
        #[arg(long, value_delimiter = ',')]
        drop: Vec<usize>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// A video file, or a directory of numbered frame images.
    #[arg(long)]
    input: PathBuf,

    /// Frame rate of an image directory (video files carry their own).
    #[arg(long)]
    fps: Option<f64>,
}

#[derive(Args)]
struct RunArgs {
    /// Analysis config (TOML). Command-line values override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    start: Option<usize>,

    /// Last frame, inclusive.
    #[arg(long)]
    end: Option<usize>,

    /// Disk mass in kilograms.
    #[arg(long)]
    mass: Option<f64>,

    /// Disk radius in metres.
    #[arg(long)]
    radius: Option<f64>,

    /// `endpoint` or `integral`.
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<ReductionStrategy>,

    /// Drop frames whose markers are further apart than this (pixels).
    #[arg(long)]
    max_separation: Option<f64>,

    /// `raw` or `wrapped` velocity steps in the table.
    #[arg(long, value_parser = parse_omega_step)]
    omega_step: Option<OmegaStep>,
}

fn parse_pixel(text: &str) -> std::result::Result<(u32, u32), String> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{text}`"))?;
    let coordinate = |value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("bad coordinate `{value}`: {e}"))
    };
    Ok((coordinate(x)?, coordinate(y)?))
}

fn parse_strategy(text: &str) -> std::result::Result<ReductionStrategy, String> {
    match text.to_ascii_lowercase().as_str() {
        "endpoint" => Ok(ReductionStrategy::Endpoint),
        "integral" => Ok(ReductionStrategy::Integral),
        other => Err(format!("unknown strategy `{other}` (endpoint, integral)")),
    }
}

fn parse_omega_step(text: &str) -> std::result::Result<OmegaStep, String> {
    match text.to_ascii_lowercase().as_str() {
        "raw" => Ok(OmegaStep::Raw),
        "wrapped" => Ok(OmegaStep::Wrapped),
        other => Err(format!("unknown omega step `{other}` (raw, wrapped)")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            run,
            overlays,
            csv,
            csv_index,
        } => run_analyze(&input, &run, overlays.as_deref(), csv.as_deref(), csv_index),
        Commands::Pick {
            input,
            frame,
            center,
            marker,
            hue_tolerance,
            sv_tolerance,
            config,
            out,
        } => {
            let tolerance = HsvTolerance {
                hue: hue_tolerance,
                saturation: sv_tolerance,
                value: sv_tolerance,
            };
            run_pick(&input, frame, center, marker, tolerance, config.as_deref(), &out)
        }
        Commands::Reduce {
            csv,
            mass,
            radius,
            drop,
        } => run_reduce(&csv, DiskParameters { mass_kg: mass, radius_m: radius }, &drop),
    }
}

fn open_source(input: &InputArgs) -> Result<Box<dyn FrameSource>> {
    if input.input.is_dir() {
        let fps = input
            .fps
            .context("--fps is required when the input is a directory of images")?;
        let source = ImageSequenceSource::open(&input.input, fps)?;
        return Ok(Box::new(source));
    }
    let source = OpenCvVideoSource::open(&input.input)?;
    Ok(Box::new(source))
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn run_analyze(
    input: &InputArgs,
    args: &RunArgs,
    overlay_dir: Option<&Path>,
    csv_path: Option<&Path>,
    csv_index: bool,
) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(start) = args.start {
        config.start_frame = start;
    }
    if let Some(end) = args.end {
        config.end_frame = end;
    }
    if let Some(mass) = args.mass {
        config.disk.mass_kg = mass;
    }
    if let Some(radius) = args.radius {
        config.disk.radius_m = radius;
    }
    if let Some(strategy) = args.strategy {
        config.reduction = strategy;
    }
    if args.max_separation.is_some() {
        config.max_separation_px = args.max_separation;
    }
    if let Some(step) = args.omega_step {
        config.omega_step = step;
    }
    config.overlay.enabled = overlay_dir.is_some();

    let mut source = open_source(input)?;
    tracing::info!(
        "Loaded {} ({} frames at {:.2} fps)",
        input.input.display(),
        source.total_frames(),
        source.frame_rate()
    );

    let mut pipeline = AnalysisPipeline::new(config);
    let data = match pipeline.run(source.as_mut())? {
        Report::InsufficientData {
            usable,
            skipped,
            frames_visited,
        } => {
            println!("Not enough data: {usable} usable sample(s) out of {frames_visited} frame(s).");
            println!(
                "Skipped: {} without centre, {} without marker, {} too far apart.",
                skipped.center_not_found, skipped.marker_not_found, skipped.separation_exceeded
            );
            return Ok(());
        }
        Report::Kinematics(data) => data,
    };

    println!("{}", data.result);
    println!(
        "{} samples from {} frames ({} skipped)",
        data.series.len(),
        data.frames_visited,
        data.skipped.total()
    );

    if let Some(path) = csv_path {
        data.table
            .save_csv(path, csv_index)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("Velocity table written to {}", path.display());
    }
    if let Some(directory) = overlay_dir {
        let written = render::write_overlays(&data.overlays, directory)?;
        tracing::info!("{} overlay frames written to {}", written.len(), directory.display());
    }
    Ok(())
}

fn run_pick(
    input: &InputArgs,
    frame_index: Option<usize>,
    center: Option<(u32, u32)>,
    marker: (u32, u32),
    tolerance: HsvTolerance,
    config_path: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    let mut source = open_source(input)?;
    let index = frame_index.unwrap_or(config.start_frame);

    let mut session = CalibrationSession::new(tolerance);
    let frame = session.reference_frame(source.as_mut(), index)?;
    if let Some((x, y)) = center {
        session.pick(MarkerRole::Center, &frame, x, y)?;
    }
    session.pick(MarkerRole::Marker, &frame, marker.0, marker.1)?;

    for role in [MarkerRole::Center, MarkerRole::Marker] {
        if let Some(range) = session.range(role) {
            println!("{role}: lower {:?} upper {:?}", range.lower, range.upper);
        }
    }

    if let Some(marker) = session.range(MarkerRole::Marker) {
        config.markers = MarkerConfig {
            center: session.range(MarkerRole::Center),
            marker,
        };
    }
    config
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    session.clear();
    tracing::info!("Config written to {}", out.display());
    Ok(())
}

fn run_reduce(csv: &Path, disk: DiskParameters, drop: &[usize]) -> Result<()> {
    disk.validate()?;
    let mut table =
        SampleTable::load_csv(csv).with_context(|| format!("reading {}", csv.display()))?;
    let removed = table.remove_rows(drop);
    tracing::info!("{} rows loaded, {} dropped", table.len() + removed, removed);

    let pipeline = AnalysisPipeline::new(AnalysisConfig {
        disk,
        ..AnalysisConfig::default()
    });
    match pipeline.reduce_edited(&table) {
        Ok(result) => println!("{result}"),
        Err(err) => println!("Not enough data: {err}"),
    }
    Ok(())
}
