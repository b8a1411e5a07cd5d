//! Point cloud branch ingester.
//!
//! Reads points from a text file (or generates them), routes each one down a
//! quadtree and stores the depth range given in the config as a disk branch.
//!
//! Logging is controlled by `RUST_LOG`, e.g.
//! `RUST_LOG=branch_ingest=debug,point_branch=trace`.

use anyhow::{Context, Result};
use branch_ingest::{ingest, input, Config, BRANCHING_FACTOR};
use clap::Parser;
use point_branch::{BranchConfig, DiskBranch, Schema};
use std::path::PathBuf;
use std::time::Instant;

/// Point cloud branch ingester.
#[derive(Parser, Debug)]
#[command(name = "branch_ingest")]
#[command(about = "Streams points through a quadtree into a disk-backed branch")]
struct Args {
	/// Path to configuration TOML file.
	#[arg(short, long)]
	config: PathBuf,

	/// Text file of `x y z` lines (default: the config's synthetic generator).
	#[arg(short, long)]
	input: Option<PathBuf>,

	/// Continue an existing branch from its branch.json instead of starting
	/// empty.
	#[arg(short, long)]
	restore: bool,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "point_branch=info,branch_ingest=info".into()),
		)
		.init();

	let args = Args::parse();
	let config = Config::load(&args.config)?;

	if let Some(threads) = config.threads {
		rayon::ThreadPoolBuilder::new()
			.num_threads(threads)
			.build_global()
			.context("Failed to configure worker threads")?;
	}

	let bounds = config.bounds();
	let points = match (&args.input, &config.synthetic) {
		(Some(path), _) => input::read_points(path)?,
		(None, Some(synthetic)) => input::synthetic_points(&bounds, synthetic),
		(None, None) => anyhow::bail!("No input: pass --input or add a [synthetic] section"),
	};
	tracing::info!(points = points.len(), threads = rayon::current_num_threads(), "loaded input");

	let branch = if args.restore {
		let branch = DiskBranch::open(&config.output_dir, Schema::xyz())
			.with_context(|| format!("Failed to restore branch: {}", config.output_dir.display()))?;
		config.check_restored(branch.layout())?;
		branch
	} else {
		DiskBranch::new(BranchConfig {
			path: config.output_dir.clone(),
			schema: Schema::xyz(),
			branching_factor: BRANCHING_FACTOR,
			depth_begin: config.depth_begin,
			depth_end: config.depth_end,
		})
		.with_context(|| format!("Failed to create branch: {}", config.output_dir.display()))?
	};

	let start = Instant::now();
	let summary = ingest(&branch, &bounds, &points);
	let elapsed = start.elapsed();

	let meta = branch.save().context("Failed to save branch")?;
	let stats = branch.stats();
	tracing::info!(
		stored = summary.stored,
		overflowed = summary.overflowed,
		out_of_bounds = summary.out_of_bounds,
		failed = summary.failed,
		chunks = meta.chunks.len(),
		displaced = stats.displaced(),
		elapsed_ms = elapsed.as_millis() as u64,
		"ingest complete"
	);

	if !summary.is_conserved() {
		anyhow::bail!("Point accounting mismatch: {summary:?}");
	}
	if summary.failed > 0 {
		anyhow::bail!("{} points could not be stored", summary.failed);
	}
	Ok(())
}
