//! Point sources: whitespace/comma separated text and a seeded generator.

use anyhow::{Context, Result};
use glam::{DVec2, DVec3};
use point_branch::schema::{X, Y, Z};
use point_branch::{PointInfo, Schema};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

use crate::config::SyntheticConfig;
use crate::roller::Bounds;

/// Read `x y z` (or `x,y,z`) lines from `path`. Blank lines and `#` comments
/// are skipped; a missing z is taken as 0.
pub fn read_points(path: &Path) -> Result<Vec<DVec3>> {
	let content = std::fs::read_to_string(path)
		.with_context(|| format!("Failed to read input file: {}", path.display()))?;
	parse_points(&content).with_context(|| format!("Invalid input file: {}", path.display()))
}

pub fn parse_points(content: &str) -> Result<Vec<DVec3>> {
	let mut points = Vec::new();
	for (n, line) in content.lines().enumerate() {
		let line = match line.split_once('#') {
			Some((data, _)) => data,
			None => line,
		};
		let fields: Vec<&str> = line
			.split(|c: char| c == ',' || c.is_whitespace())
			.filter(|f| !f.is_empty())
			.collect();
		if fields.is_empty() {
			continue;
		}
		if !(2..=3).contains(&fields.len()) {
			anyhow::bail!("line {}: expected 2 or 3 values, found {}", n + 1, fields.len());
		}

		let mut xyz = [0.0f64; 3];
		for (slot, field) in xyz.iter_mut().zip(&fields) {
			*slot = field
				.parse()
				.with_context(|| format!("line {}: bad number {field:?}", n + 1))?;
		}
		points.push(DVec3::from_array(xyz));
	}
	Ok(points)
}

/// Uniform points inside `bounds`, z in [0, 1). The same seed always yields
/// the same sequence.
pub fn synthetic_points(bounds: &Bounds, settings: &SyntheticConfig) -> Vec<DVec3> {
	let mut rng = StdRng::seed_from_u64(settings.seed);
	(0..settings.count)
		.map(|_| {
			DVec3::new(
				rng.random_range(bounds.min.x..bounds.max.x),
				rng.random_range(bounds.min.y..bounds.max.y),
				rng.random::<f64>(),
			)
		})
		.collect()
}

/// Encode a point into a record of `schema`. Dimensions other than X/Y/Z
/// stay zeroed; a schema without Z keeps only the planar position.
pub fn encode(schema: &Schema, p: DVec3) -> Result<PointInfo> {
	let mut data = vec![0u8; schema.point_size()];
	schema.set_f64(&mut data, X, p.x)?;
	schema.set_f64(&mut data, Y, p.y)?;
	if schema.find(Z).is_ok() {
		schema.set_f64(&mut data, Z, p.z)?;
	}
	Ok(PointInfo::from_record(schema, data)?)
}

/// Planar part of an input point.
pub fn planar(p: DVec3) -> DVec2 {
	p.truncate()
}
