//! Traversal driver: routes points from the root down into a branch.
//!
//! Each input point descends to the branch's first depth and competes for the
//! slot there. Whatever point the branch hands back (the newcomer or the
//! evicted resident) continues one level deeper, until a slot accepts it or
//! the branch's last depth is exhausted.

use glam::DVec3;
use point_branch::{DiskBranch, InsertError, Insertion, PointInfo};
use rayon::prelude::*;

use crate::input;
use crate::roller::{Bounds, Roller};

/// Where one insertion chain ended.
#[derive(Debug, PartialEq)]
pub enum Outcome {
	/// Some point of the chain came to rest in an empty slot.
	Stored,
	/// The chain ran past the branch's last depth; this point belongs to a
	/// deeper branch.
	Overflow(PointInfo),
}

/// Insert one point, retrying displaced points deeper until one settles.
///
/// The caller is responsible for `info` lying inside `bounds`. On a storage
/// failure the point in flight comes back inside the error.
pub fn insert_point(
	branch: &DiskBranch,
	bounds: &Bounds,
	mut info: PointInfo,
) -> Result<Outcome, InsertError> {
	let layout = branch.layout();
	let mut roller = Roller::new(*bounds);
	while roller.depth() < layout.depth_begin {
		roller.magnify(info.point());
	}

	loop {
		match branch.add_point(info, &roller.position())? {
			Insertion::Placed => return Ok(Outcome::Stored),
			Insertion::Displaced(next) => {
				if roller.depth() + 1 >= layout.depth_end {
					return Ok(Outcome::Overflow(next));
				}
				roller.magnify(next.point());
				info = next;
			}
		}
	}
}

/// Counts for one ingestion run.
///
/// Every input point lands in exactly one of `stored`, `overflowed`,
/// `out_of_bounds` or `failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
	pub input: u64,
	pub stored: u64,
	pub overflowed: u64,
	pub out_of_bounds: u64,
	pub failed: u64,
}

impl IngestSummary {
	fn single(input: u64, stored: u64, overflowed: u64, out_of_bounds: u64, failed: u64) -> Self {
		Self {
			input,
			stored,
			overflowed,
			out_of_bounds,
			failed,
		}
	}

	fn merge(self, other: Self) -> Self {
		Self {
			input: self.input + other.input,
			stored: self.stored + other.stored,
			overflowed: self.overflowed + other.overflowed,
			out_of_bounds: self.out_of_bounds + other.out_of_bounds,
			failed: self.failed + other.failed,
		}
	}

	/// True when no point went unaccounted for.
	pub fn is_conserved(&self) -> bool {
		self.stored + self.overflowed + self.out_of_bounds + self.failed == self.input
	}
}

/// Insert `points` into `branch` in parallel on the current rayon pool.
pub fn ingest(branch: &DiskBranch, bounds: &Bounds, points: &[DVec3]) -> IngestSummary {
	let schema = branch.schema();
	let summary = points
		.par_iter()
		.map(|&p| {
			if !bounds.contains(input::planar(p)) {
				return IngestSummary::single(1, 0, 0, 1, 0);
			}
			let info = match input::encode(schema, p) {
				Ok(info) => info,
				Err(err) => {
					tracing::warn!(error = %err, "failed to encode point");
					return IngestSummary::single(1, 0, 0, 0, 1);
				}
			};
			match insert_point(branch, bounds, info) {
				Ok(Outcome::Stored) => IngestSummary::single(1, 1, 0, 0, 0),
				Ok(Outcome::Overflow(point)) => {
					tracing::trace!(x = point.point().x, y = point.point().y, "overflow");
					IngestSummary::single(1, 0, 1, 0, 0)
				}
				Err(err) => {
					let point = err.point.point();
					tracing::warn!(error = %err.source, x = point.x, y = point.y, "insertion failed");
					IngestSummary::single(1, 0, 0, 0, 1)
				}
			}
		})
		.reduce(IngestSummary::default, IngestSummary::merge);

	tracing::debug!(
		input = summary.input,
		stored = summary.stored,
		overflowed = summary.overflowed,
		out_of_bounds = summary.out_of_bounds,
		failed = summary.failed,
		"ingest pass finished"
	);
	summary
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod ingest_test;
