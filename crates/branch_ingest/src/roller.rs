//! Quadtree descent: bounds subdivision and linear index tracking.

use glam::DVec2;
use point_branch::TreePosition;

/// Children per node in the quadtree the roller walks.
pub const BRANCHING_FACTOR: u64 = 4;

/// Axis-aligned 2D extent of a tree node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
	pub min: DVec2,
	pub max: DVec2,
}

impl Bounds {
	pub fn new(min: DVec2, max: DVec2) -> Self {
		Self { min, max }
	}

	pub fn mid(&self) -> DVec2 {
		(self.min + self.max) * 0.5
	}

	/// Inclusive on every edge.
	pub fn contains(&self, p: DVec2) -> bool {
		p.x >= self.min.x && p.y >= self.min.y && p.x <= self.max.x && p.y <= self.max.y
	}

	pub fn is_valid(&self) -> bool {
		self.min.is_finite() && self.max.is_finite() && self.min.x < self.max.x && self.min.y < self.max.y
	}

	/// Child direction of `p`: bit 0 is east, bit 1 is north.
	pub fn quadrant(&self, p: DVec2) -> u64 {
		let mid = self.mid();
		(p.x >= mid.x) as u64 | ((p.y >= mid.y) as u64) << 1
	}

	pub fn child(&self, dir: u64) -> Self {
		let mid = self.mid();
		let (min_x, max_x) = if dir & 1 != 0 { (mid.x, self.max.x) } else { (self.min.x, mid.x) };
		let (min_y, max_y) = if dir & 2 != 0 { (mid.y, self.max.y) } else { (self.min.y, mid.y) };
		Self::new(DVec2::new(min_x, min_y), DVec2::new(max_x, max_y))
	}
}

/// Cursor walking from the root toward a point, one level per `magnify`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Roller {
	bounds: Bounds,
	depth: u64,
	index: u64,
}

impl Roller {
	pub fn new(bounds: Bounds) -> Self {
		Self {
			bounds,
			depth: 0,
			index: 0,
		}
	}

	pub fn bounds(&self) -> &Bounds {
		&self.bounds
	}

	pub fn depth(&self) -> u64 {
		self.depth
	}

	pub fn index(&self) -> u64 {
		self.index
	}

	/// Step into the child containing `p`.
	pub fn magnify(&mut self, p: DVec2) {
		let dir = self.bounds.quadrant(p);
		self.index = self.index * BRANCHING_FACTOR + 1 + dir;
		self.bounds = self.bounds.child(dir);
		self.depth += 1;
	}

	pub fn position(&self) -> TreePosition {
		TreePosition::new(self.index, self.bounds.mid())
	}
}
