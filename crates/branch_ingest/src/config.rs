//! Configuration parsing for branch ingestion.

use anyhow::{Context, Result};
use glam::DVec2;
use point_branch::BranchLayout;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::roller::{Bounds, BRANCHING_FACTOR};

/// Root configuration for one ingestion run.
#[derive(Debug, Deserialize)]
pub struct Config {
	/// Directory receiving chunk files and `branch.json`.
	pub output_dir: PathBuf,
	/// Dataset extent; the root node of the tree.
	pub bounds: BoundsConfig,
	/// First depth stored in the branch.
	#[serde(default)]
	pub depth_begin: u64,
	/// One past the last depth stored; deeper points overflow.
	#[serde(default = "default_depth_end")]
	pub depth_end: u64,
	/// Worker threads (default: rayon's global pool size).
	pub threads: Option<usize>,
	/// Generate random points instead of reading an input file.
	pub synthetic: Option<SyntheticConfig>,
}

/// Extent as `min = [x, y]`, `max = [x, y]`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BoundsConfig {
	pub min: [f64; 2],
	pub max: [f64; 2],
}

/// Seeded uniform point generator settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SyntheticConfig {
	/// Number of points to generate.
	pub count: usize,
	#[serde(default = "default_seed")]
	pub seed: u64,
}

fn default_depth_end() -> u64 {
	12
}

fn default_seed() -> u64 {
	42
}

impl From<BoundsConfig> for Bounds {
	fn from(b: BoundsConfig) -> Self {
		Bounds::new(DVec2::from_array(b.min), DVec2::from_array(b.max))
	}
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	/// Parse and validate a TOML document.
	pub fn parse(content: &str) -> Result<Self> {
		let config: Config =
			toml::from_str(content).with_context(|| "Failed to parse config TOML")?;

		if !config.bounds().is_valid() {
			anyhow::bail!(
				"bounds must be finite with min < max, got {:?}",
				config.bounds
			);
		}
		if config.depth_end <= config.depth_begin {
			anyhow::bail!(
				"depth_end ({}) must be greater than depth_begin ({})",
				config.depth_end,
				config.depth_begin
			);
		}
		if config.threads == Some(0) {
			anyhow::bail!("threads must be at least 1");
		}

		Ok(config)
	}

	pub fn bounds(&self) -> Bounds {
		self.bounds.into()
	}

	/// Check that a restored branch can be driven with this configuration.
	pub fn check_restored(&self, layout: &BranchLayout) -> Result<()> {
		if layout.branching_factor != BRANCHING_FACTOR {
			anyhow::bail!(
				"Restored branch has branching factor {}, ingest walks a quadtree ({})",
				layout.branching_factor,
				BRANCHING_FACTOR
			);
		}
		if layout.depth_begin != self.depth_begin || layout.depth_end != self.depth_end {
			anyhow::bail!(
				"Restored branch covers depths {}..{}, config asks for {}..{}",
				layout.depth_begin,
				layout.depth_end,
				self.depth_begin,
				self.depth_end
			);
		}
		Ok(())
	}
}
