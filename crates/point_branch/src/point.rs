//! Points in transit between the traversal driver and a branch.
//!
//! A [`PointInfo`] owns one encoded record. It is moved into
//! [`DiskBranch::add_point`](crate::DiskBranch::add_point) and, if it does not
//! stay in the slot, a `PointInfo` comes back out in
//! [`Insertion::Displaced`] for a retry one level deeper. Exactly one side
//! owns each point at any time.

use glam::DVec2;

use crate::error::{BranchError, Result};
use crate::schema::Schema;

/// Coordinate value marking an unoccupied slot.
pub const EMPTY_COORD: f64 = f64::INFINITY;

/// True when `(x, y)` is a real point rather than the empty-slot sentinel.
#[inline]
pub fn point_exists(point: DVec2) -> bool {
  point.x != EMPTY_COORD && point.y != EMPTY_COORD
}

/// A node of the tree as seen by one insertion attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreePosition {
  /// Linear slot index at the attempted depth.
  pub index: u64,
  /// Geometric center of the node; the competition pivot.
  pub center: DVec2,
}

impl TreePosition {
  pub fn new(index: u64, center: DVec2) -> Self {
    Self { index, center }
  }
}

/// An owned point record plus its decoded planar position.
#[derive(Clone, Debug, PartialEq)]
pub struct PointInfo {
  point: DVec2,
  data: Vec<u8>,
}

impl PointInfo {
  /// Wrap an already encoded record, decoding X/Y through `schema`.
  pub fn from_record(schema: &Schema, data: Vec<u8>) -> Result<Self> {
    if data.len() != schema.point_size() {
      return Err(BranchError::RecordSize {
        expected: schema.point_size(),
        actual: data.len(),
      });
    }
    Ok(Self {
      point: schema.xy(&data),
      data,
    })
  }

  /// Encode a planar point, leaving every other dimension zeroed.
  pub fn encode(schema: &Schema, point: DVec2) -> Self {
    let mut data = vec![0u8; schema.point_size()];
    schema.set_xy(&mut data, point);
    // Read back through the layout so narrow X/Y types compete on stored values.
    Self {
      point: schema.xy(&data),
      data,
    }
  }

  pub(crate) fn from_parts(point: DVec2, data: Vec<u8>) -> Self {
    Self { point, data }
  }

  #[inline]
  pub fn point(&self) -> DVec2 {
    self.point
  }

  #[inline]
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn into_data(self) -> Vec<u8> {
    self.data
  }

  /// Squared distance to a node center.
  #[inline]
  pub fn sq_dist(&self, center: DVec2) -> f64 {
    self.point.distance_squared(center)
  }
}

/// Result of offering a point to a slot.
#[derive(Debug, PartialEq)]
#[must_use]
pub enum Insertion {
  /// The point now occupies the slot; nothing further to do.
  Placed,
  /// Retry this point one level deeper. It is either the offered point
  /// (it lost the competition) or the former resident (it was evicted).
  Displaced(PointInfo),
}

impl Insertion {
  #[inline]
  pub fn is_placed(&self) -> bool {
    matches!(self, Insertion::Placed)
  }

  pub fn displaced(self) -> Option<PointInfo> {
    match self {
      Insertion::Placed => None,
      Insertion::Displaced(info) => Some(info),
    }
  }
}
