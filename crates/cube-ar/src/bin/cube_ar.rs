//! cube-ar CLI: track the marker in a still image or print its pattern.

use clap::{Args, Parser, Subcommand};
use cube_ar::detect;
use cube_ar::tracker::{TrackReport, TrackerConfig};
use std::path::PathBuf;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "cube-ar")]
#[command(about = "Find a single square marker in an image and report its 4x4 pose")]
#[command(version)]
struct Cli {
    /// Log pipeline decisions at debug level.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the marker in one image and write a JSON report.
    Track(TrackArgs),

    /// Render the configured marker pattern to an image file.
    Pattern(PatternArgs),

    /// Write a config file filled with defaults.
    InitConfig {
        /// Destination JSON path.
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct TrackArgs {
    /// Tracker configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Input image.
    #[arg(long)]
    image: PathBuf,

    /// Report path; overrides `output_path` from the config.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct PatternArgs {
    /// Tracker configuration (JSON); the built-in pattern is used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output image path (format from the extension).
    #[arg(long)]
    out: PathBuf,

    /// Pixels per grid cell.
    #[arg(long, default_value = "40")]
    cell_px: usize,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Pattern(args) => run_pattern(&args),
        Commands::InitConfig { out } => {
            TrackerConfig::default().write_json(&out)?;
            log::info!("wrote default config to {}", out.display());
            Ok(())
        }
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: bool) -> CliResult<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    cube_ar::core::init_with_level(level)?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: bool) -> CliResult<()> {
    cube_ar::core::init_tracing(false);
    Ok(())
}

fn run_track(args: &TrackArgs) -> CliResult<()> {
    let config = TrackerConfig::load_json(&args.config)?;
    let mut tracker = config.build_tracker()?;

    let img = image::open(&args.image)?.to_rgb8();
    let frame = detect::frame_view(&img);
    let mut report = TrackReport::new(&args.image, &args.config, frame.width, frame.height);
    report.candidates = tracker.candidate_quads(&frame)?;

    let outcome = tracker.track(&frame);
    match &outcome {
        Ok(res) => {
            let t = res.pose.translation;
            log::info!(
                "marker found: rotation {}, t = ({:.4}, {:.4}, {:.4}), view angle {:.1} deg",
                res.rotation,
                t.x,
                t.y,
                t.z,
                res.view_angle_deg
            );
            println!("{}", serde_json::to_string(&res.matrix)?);
        }
        Err(err) if err.is_no_pose() => {
            log::info!("no pose: {err}");
            println!("no pose");
        }
        Err(err) => return Err(err.clone().into()),
    }
    report.set_outcome(outcome);

    let out = args.out.clone().unwrap_or_else(|| config.output_path());
    report.write_json(&out)?;
    log::info!(
        "{} candidate quad(s); report written to {}",
        report.candidates.len(),
        out.display()
    );
    Ok(())
}

fn run_pattern(args: &PatternArgs) -> CliResult<()> {
    if args.cell_px == 0 {
        return Err("--cell-px must be positive".into());
    }
    let config = match &args.config {
        Some(path) => TrackerConfig::load_json(path)?,
        None => TrackerConfig::default(),
    };
    let pattern = config.build_pattern()?;
    let img = detect::to_image_gray(&pattern.render(args.cell_px))?;
    img.save(&args.out)?;
    log::info!(
        "wrote {}x{} pattern ({} cells) to {}",
        img.width(),
        img.height(),
        pattern.grid_cells(),
        args.out.display()
    );
    Ok(())
}
