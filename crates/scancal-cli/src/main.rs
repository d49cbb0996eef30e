use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use scancal_core::{CameraPair, PairId, ProjectLayout, ScanCalConfig, parse_camera_pairs};
use scancal_pipeline::{
    AlignedStereo, CalibrationPlan, DetectionFileAnalyzer, PointAligner, StateEvent, StateMachine,
    StateSnapshot, StateStore, WorkerPool,
};

/// Inspection tools for scanner rig calibration projects.
#[derive(Debug, Parser)]
#[command(author, version, about = "Scanner rig calibration tools")]
struct Args {
    /// Optional path to JSON ScanCalConfig. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG overrides it.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a project's images from their detection files and report
    /// pair validity, set rollups and working counts.
    Inspect {
        /// Project directory containing project.scan.
        #[arg(long)]
        project: PathBuf,
        /// Camera pair list as sent by the device.
        #[arg(long)]
        pairs: PathBuf,
        /// Print the full state as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Write the index-aligned stereo observations of one pair as JSON.
    Align {
        #[arg(long)]
        project: PathBuf,
        #[arg(long)]
        pairs: PathBuf,
        /// Pair id to align.
        #[arg(long)]
        pair: PairId,
        /// Output file. Printed to stdout if omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<ScanCalConfig> {
    match path {
        Some(path) => ScanCalConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ScanCalConfig::default()),
    }
}

fn load_pairs(path: &Path) -> Result<Vec<CameraPair>> {
    let payload = fs::read_to_string(path)
        .with_context(|| format!("failed to read pair list {}", path.display()))?;
    parse_camera_pairs(&payload)
        .with_context(|| format!("invalid pair list {}", path.display()))
}

/// Run validation over every image of the project and return the settled state.
fn inspect_project(
    project_dir: &Path,
    pairs_path: &Path,
    config: &ScanCalConfig,
) -> Result<StateSnapshot> {
    let layout = ProjectLayout::new(project_dir);
    let project = layout.load_project()?;
    let pairs = load_pairs(pairs_path)?;

    let pool = Arc::new(WorkerPool::new(config.workers)?);
    let machine = StateMachine::new(Arc::new(layout.clone()), config.working_count);
    let store = StateStore::spawn(machine, pool, Arc::new(DetectionFileAnalyzer), layout)?;

    store.send(StateEvent::PairsChanged(pairs))?;
    store.send(StateEvent::ProjectSelected(project))?;
    loop {
        let snapshot = store.snapshot()?;
        if snapshot.is_settled() {
            return Ok(snapshot);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn render_inspection(snapshot: &StateSnapshot) -> String {
    let mut out = String::new();
    for status in &snapshot.pairs {
        let _ = writeln!(
            out,
            "pair {} ({}): working in {} set(s)",
            status.pair.pair_id,
            status.pair.label(),
            status.working_count
        );
    }
    for set in &snapshot.sets {
        let pairs: Vec<String> = set.pairs.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "set {} {}: {} [{}]",
            set.set_id,
            set.name,
            set.rollup,
            pairs.join(", ")
        );
    }
    let _ = writeln!(
        out,
        "configure: {}",
        if snapshot.can_configure() {
            "available"
        } else {
            "unavailable"
        }
    );
    out
}

fn align_pair(
    project_dir: &Path,
    pairs_path: &Path,
    pair_id: PairId,
    config: &ScanCalConfig,
) -> Result<AlignedStereo> {
    let layout = ProjectLayout::new(project_dir);
    let project = layout.load_project()?;
    let pairs = load_pairs(pairs_path)?;
    let pair = pairs
        .iter()
        .find(|p| p.pair_id == pair_id)
        .copied()
        .ok_or_else(|| anyhow!("pair {pair_id} is not in {}", pairs_path.display()))?;

    let plan = CalibrationPlan::from_project(&project, &pairs, &layout);
    let aligner = PointAligner::new(config.board);
    let aligned = aligner.align_stereo(plan.sources(pair.left_id), plan.sources(pair.right_id));
    log::info!(
        "pair {}: {} aligned view(s), {} skipped",
        pair.label(),
        aligned.len(),
        aligned.skipped.len()
    );
    Ok(aligned)
}

fn write_output<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Inspect {
            project,
            pairs,
            json,
        } => {
            let snapshot = inspect_project(&project, &pairs, &config)?;
            if json {
                write_output(&snapshot, None)?;
            } else {
                print!("{}", render_inspection(&snapshot));
            }
        }
        Command::Align {
            project,
            pairs,
            pair,
            output,
        } => {
            let aligned = align_pair(&project, &pairs, pair, &config)?;
            write_output(&aligned, output.as_deref())?;
        }
    }
    Ok(())
}
